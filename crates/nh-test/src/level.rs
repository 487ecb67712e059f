//! Levels of the stand-in engine.
//!
//! Every ledger gets the same fixed layout: one lit room with an up and a
//! down staircase, a corridor leading east, a gold pile, a large box and a
//! newt. Ledger 1 has a fountain and ledger 2 an altar, so the snapshot
//! feature scan has something to find.
//!
//! A level record is the ledger number followed by the level as a
//! length-prefixed JSON string.

use nh_bridge::config::{MAX_COLNO, MAX_ROWNO};
use nh_bridge::engine::{ObjectInfo, Stairway, Terrain, TerrainKind};
use nh_bridge::nhfile::NhFile;
use nh_bridge::{BridgeError, Result};
use serde::{Deserialize, Serialize};

use crate::glyphs;

pub const COLS: i32 = MAX_COLNO as i32;
pub const ROWS: i32 = MAX_ROWNO as i32;

/// Longest level or game-state JSON accepted when reading a save.
pub const RECORD_MAX: usize = 1 << 20;

const ROOM_LEFT: i32 = 10;
const ROOM_TOP: i32 = 3;
const ROOM_RIGHT: i32 = 40;
const ROOM_BOTTOM: i32 = 12;
const DOOR_Y: i32 = 7;
const CORRIDOR_END: i32 = 50;

pub const UP_STAIRS: (i32, i32) = (12, 5);

/// Object ids on a level are `ledger * OBJECT_ID_STRIDE + n`.
pub const OBJECT_ID_STRIDE: u32 = 100;

// ============================================================================
// Level contents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorObject {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub name: String,
    pub class: char,
    pub quantity: i64,
    /// Objects inside this one; `None` for non-containers.
    pub contents: Option<Vec<FloorObject>>,
}

impl FloorObject {
    fn info(&self) -> ObjectInfo {
        ObjectInfo {
            id: self.id,
            name: self.name.clone(),
            class: self.class,
            quantity: self.quantity,
            glyph: glyphs::object(self.class),
            contents: self
                .contents
                .as_ref()
                .map(|inner| inner.iter().map(FloorObject::info).collect()),
        }
    }

    fn ids(&self, out: &mut Vec<u32>) {
        out.push(self.id);
        for inner in self.contents.iter().flatten() {
            inner.ids(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimMonster {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub hostile: bool,
}

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    HatchEgg,
    BurnLight,
    RotCorpse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTimer {
    pub id: u32,
    pub kind: TimerKind,
    /// Turn the timer fires on.
    pub when: i64,
    /// Level the timer belongs to; `None` for timers that travel with the
    /// hero.
    pub ledger: Option<i16>,
    /// Object the timer acts on.
    pub object: Option<u32>,
    pub needs_fixup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub ledger: i16,
    cells: Vec<TerrainKind>,
    seen: Vec<bool>,
    pub objects: Vec<FloorObject>,
    pub monsters: Vec<SimMonster>,
    /// Only filled while the level is on disk; a resident level's timers
    /// live on the engine's chain.
    pub timers: Vec<SimTimer>,
}

fn index(x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x >= COLS || y >= ROWS {
        return None;
    }
    Some((y * COLS + x) as usize)
}

impl Level {
    /// The fixed layout for `ledger`.
    pub fn generate(ledger: i16) -> Self {
        let cells = (COLS * ROWS) as usize;
        let mut level = Level {
            ledger,
            cells: vec![TerrainKind::Stone; cells],
            seen: vec![false; cells],
            objects: Vec::new(),
            monsters: Vec::new(),
            timers: Vec::new(),
        };
        for y in ROOM_TOP..=ROOM_BOTTOM {
            for x in ROOM_LEFT..=ROOM_RIGHT {
                let edge = x == ROOM_LEFT || x == ROOM_RIGHT || y == ROOM_TOP || y == ROOM_BOTTOM;
                level.set(x, y, if edge { TerrainKind::Wall } else { TerrainKind::Room });
            }
        }
        level.set(ROOM_RIGHT, DOOR_Y, TerrainKind::Doorway);
        for x in ROOM_RIGHT + 1..=CORRIDOR_END {
            level.set(x, DOOR_Y, TerrainKind::Corridor);
        }
        level.set(UP_STAIRS.0, UP_STAIRS.1, TerrainKind::StairsUp);
        let down = Self::down_stairs_for(ledger);
        level.set(down.0, down.1, TerrainKind::StairsDown);
        match ledger {
            1 => level.set(20, 6, TerrainKind::Fountain),
            2 => level.set(20, 6, TerrainKind::Altar),
            _ => {}
        }

        let base = ledger.max(0) as u32 * OBJECT_ID_STRIDE;
        level.objects.push(FloorObject {
            id: base + 1,
            x: 15,
            y: 4,
            name: "gold piece".into(),
            class: '$',
            quantity: 10 * i64::from(ledger),
            contents: None,
        });
        level.objects.push(FloorObject {
            id: base + 2,
            x: 25,
            y: 10,
            name: "large box".into(),
            class: '(',
            quantity: 1,
            contents: Some(vec![FloorObject {
                id: base + 3,
                x: 25,
                y: 10,
                name: "egg".into(),
                class: '%',
                quantity: 1,
                contents: None,
            }]),
        });
        level.monsters.push(SimMonster {
            id: base + 50,
            name: "newt".into(),
            x: 35,
            y: 8,
            hostile: true,
        });
        level.timers.push(SimTimer {
            id: base + 90,
            kind: TimerKind::HatchEgg,
            when: 500 + i64::from(ledger),
            ledger: Some(ledger),
            object: Some(base + 3),
            needs_fixup: false,
        });
        level
    }

    pub fn down_stairs_for(ledger: i16) -> (i32, i32) {
        (30 + i32::from(ledger.rem_euclid(8)), 9)
    }

    fn set(&mut self, x: i32, y: i32, kind: TerrainKind) {
        if let Some(i) = index(x, y) {
            self.cells[i] = kind;
        }
    }

    pub fn kind_at(&self, x: i32, y: i32) -> Option<TerrainKind> {
        index(x, y).map(|i| self.cells[i])
    }

    pub fn terrain_at(&self, x: i32, y: i32) -> Option<Terrain> {
        let i = index(x, y)?;
        Some(Terrain {
            kind: self.cells[i],
            lit: self.is_lit(x, y),
            seen: self.seen[i],
        })
    }

    fn is_lit(&self, x: i32, y: i32) -> bool {
        (ROOM_LEFT..=ROOM_RIGHT).contains(&x) && (ROOM_TOP..=ROOM_BOTTOM).contains(&y)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.kind_at(x, y)
            .is_some_and(|k| !matches!(k, TerrainKind::Stone | TerrainKind::Wall))
    }

    /// The lit room is seen in full on arrival; the corridor only as far
    /// as the hero has walked.
    pub fn see_room(&mut self) -> usize {
        let mut newly = 0;
        for y in ROOM_TOP..=ROOM_BOTTOM {
            for x in ROOM_LEFT..=ROOM_RIGHT {
                newly += self.see(x, y) as usize;
            }
        }
        newly
    }

    pub fn see(&mut self, x: i32, y: i32) -> bool {
        match index(x, y) {
            Some(i) if !self.seen[i] => {
                self.seen[i] = true;
                true
            }
            _ => false,
        }
    }

    pub fn seen_cells(&self) -> impl Iterator<Item = (i32, i32, TerrainKind)> + '_ {
        self.cells
            .iter()
            .zip(&self.seen)
            .enumerate()
            .filter(|(_, (_, seen))| **seen)
            .map(|(i, (kind, _))| (i as i32 % COLS, i as i32 / COLS, *kind))
    }

    pub fn stairways(&self) -> Vec<Stairway> {
        let down = Self::down_stairs_for(self.ledger);
        vec![
            Stairway {
                x: UP_STAIRS.0,
                y: UP_STAIRS.1,
                up: true,
                ladder: false,
                to_level: i32::from(self.ledger) - 1,
            },
            Stairway {
                x: down.0,
                y: down.1,
                up: false,
                ladder: false,
                to_level: i32::from(self.ledger) + 1,
            },
        ]
    }

    pub fn objects_at(&self, x: i32, y: i32) -> Vec<ObjectInfo> {
        self.objects
            .iter()
            .filter(|o| o.x == x && o.y == y)
            .map(FloorObject::info)
            .collect()
    }

    /// Ids of every object on the level, container contents included.
    pub fn object_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for obj in &self.objects {
            obj.ids(&mut ids);
        }
        ids
    }

    /// Overview features, e.g. "a fountain".
    pub fn features(&self) -> Vec<String> {
        let mut features = Vec::new();
        if self.cells.contains(&TerrainKind::Fountain) {
            features.push("a fountain".to_string());
        }
        if self.cells.contains(&TerrainKind::Altar) {
            features.push("an altar".to_string());
        }
        features
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn write_record(&self, f: &mut NhFile) -> Result<()> {
        f.write_i16(self.ledger)?;
        f.write_str(&serde_json::to_string(self)?)
    }

    pub fn read_record(f: &mut NhFile) -> Result<Self> {
        let ledger = f.read_i16()?;
        let level: Level = serde_json::from_str(&f.read_str(RECORD_MAX)?)?;
        if level.ledger != ledger {
            return Err(BridgeError::SaveFormat {
                path: f.path().to_path_buf(),
                reason: format!("record for ledger {} holds ledger {}", ledger, level.ledger),
            });
        }
        Ok(level)
    }
}
