//! In-process copy of the map window.

use crate::config::{MAX_COLNO, MAX_ROWNO};

use super::{GlyphFlags, GlyphInfo, MESSAGE_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapCell {
    pub glyph: i32,
    pub ch: char,
    pub color: u8,
    pub flags: GlyphFlags,
}

impl Default for MapCell {
    fn default() -> Self {
        Self {
            glyph: -1,
            ch: ' ',
            color: 0,
            flags: GlyphFlags::empty(),
        }
    }
}

impl From<&GlyphInfo> for MapCell {
    fn from(g: &GlyphInfo) -> Self {
        Self {
            glyph: g.glyph,
            ch: g.ch,
            color: g.color,
            flags: g.flags,
        }
    }
}

/// Row-major grid, `MAX_COLNO` wide and `MAX_ROWNO + MESSAGE_OFFSET` tall.
/// Row 0 belongs to the message line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapBuffer {
    cells: Vec<MapCell>,
}

impl Default for MapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MapBuffer {
    pub const COLS: usize = MAX_COLNO as usize;
    pub const ROWS: usize = MAX_ROWNO as usize + MESSAGE_OFFSET as usize;

    pub fn new() -> Self {
        Self {
            cells: vec![MapCell::default(); Self::COLS * Self::ROWS],
        }
    }

    fn index(x: i32, row: i32) -> Option<usize> {
        if x < 0 || row < 0 || x as usize >= Self::COLS || row as usize >= Self::ROWS {
            return None;
        }
        Some(row as usize * Self::COLS + x as usize)
    }

    /// Store map coordinate `(x, y)` at buffer row `y + MESSAGE_OFFSET`.
    pub fn set(&mut self, x: i32, y: i32, cell: MapCell) -> bool {
        match Self::index(x, y + MESSAGE_OFFSET) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    /// Cell at map coordinate `(x, y)`.
    pub fn get(&self, x: i32, y: i32) -> Option<&MapCell> {
        Self::index(x, y + MESSAGE_OFFSET).map(|i| &self.cells[i])
    }

    pub fn clear(&mut self) {
        self.cells.fill(MapCell::default());
    }

    pub fn painted(&self) -> usize {
        self.cells.iter().filter(|c| c.glyph >= 0).count()
    }

    pub fn is_blank(&self) -> bool {
        self.painted() == 0
    }

    /// The buffer as text, one line per row, trailing blanks trimmed.
    pub fn to_text(&self) -> String {
        self.cells
            .chunks(Self::COLS)
            .map(|row| row.iter().map(|c| c.ch).collect::<String>().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_offset_applied() {
        let mut map = MapBuffer::new();
        let cell = MapCell {
            glyph: 7,
            ch: '@',
            ..Default::default()
        };
        assert!(map.set(3, 0, cell));
        assert_eq!(map.get(3, 0), Some(&cell));
        let text = map.to_text();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("   @"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut map = MapBuffer::new();
        assert!(!map.set(80, 0, MapCell::default()));
        assert!(!map.set(0, MAX_ROWNO as i32, MapCell::default()));
        assert!(map.get(-1, 0).is_none());
        assert!(map.is_blank());
    }
}
