//! Glyph numbering of the stand-in engine.

use std::sync::LazyLock;

use nh_bridge::engine::TerrainKind;
use nh_bridge::winprocs::{GlyphFlags, GlyphInfo};

pub const HERO: i32 = 0;
const TERRAIN_BASE: i32 = 1;
pub const NEWT: i32 = 30;
const OBJECT_BASE: i32 = 40;
const GLYPH_COUNT: usize = 48;

const TERRAIN_CHARS: [char; 22] = [
    ' ', '-', '.', '#', '.', '|', '+', '.', '<', '>', '<', '>', '_', '{', '#', '\\', '|', '#', '}', '}', '.', '?',
];
const OBJECT_CLASSES: [char; 6] = ['$', '(', '%', ')', '[', '?'];

static TABLE: LazyLock<Vec<char>> = LazyLock::new(build_table);

pub fn terrain(kind: TerrainKind) -> i32 {
    TERRAIN_BASE + kind as i32
}

pub fn object(class: char) -> i32 {
    let slot = OBJECT_CLASSES.iter().position(|&c| c == class).unwrap_or(OBJECT_CLASSES.len() - 1);
    OBJECT_BASE + slot as i32
}

/// Display character per glyph id, for `init_nhwindows`.
pub fn table() -> Vec<char> {
    TABLE.clone()
}

fn build_table() -> Vec<char> {
    let mut chars = vec![' '; GLYPH_COUNT];
    chars[HERO as usize] = '@';
    for (i, ch) in TERRAIN_CHARS.iter().enumerate() {
        chars[TERRAIN_BASE as usize + i] = *ch;
    }
    chars[NEWT as usize] = ':';
    for (i, ch) in OBJECT_CLASSES.iter().enumerate() {
        chars[OBJECT_BASE as usize + i] = *ch;
    }
    chars
}

pub fn info(glyph: i32, color: u8, flags: GlyphFlags) -> GlyphInfo {
    let ch = usize::try_from(glyph)
        .ok()
        .and_then(|i| TABLE.get(i).copied())
        .unwrap_or(' ');
    GlyphInfo { glyph, ch, color, flags }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_glyph() {
        let chars = table();
        assert_eq!(chars[HERO as usize], '@');
        assert_eq!(chars[terrain(TerrainKind::StairsDown) as usize], '>');
        assert_eq!(chars[terrain(TerrainKind::Other) as usize], '?');
        assert_eq!(chars[object('$') as usize], '$');
        assert_eq!(object('*'), object('?'));
        assert_eq!(info(NEWT, 3, GlyphFlags::empty()).ch, ':');
    }
}
