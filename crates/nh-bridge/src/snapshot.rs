//! Double-buffered game snapshot.
//!
//! The engine thread writes after every turn; any number of host threads
//! read without taking a lock. Each slot carries a sequence counter (odd
//! while being written) and `current` names the slot readers should use.
//! A reader that observes a counter change while copying retries, so it
//! always returns a snapshot the writer finished.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering, fence};
use std::sync::{Mutex, PoisonError};

use crate::engine::{GameView, TerrainKind};

pub const MAX_DOORS: usize = 8;
pub const MAX_ENEMIES: usize = 10;
/// Manhattan radius of the nearby-enemy scan.
pub const ENEMY_RADIUS: i32 = 10;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const NONE: Point = Point { x: -1, y: -1 };

    pub fn is_set(&self) -> bool {
        *self != Self::NONE
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::NONE
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorEntry {
    pub x: i32,
    pub y: i32,
    /// `TerrainKind` discriminant.
    pub kind: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnemyEntry {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub glyph: i32,
    pub distance: i32,
}

/// Plain-data game summary handed to the host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameSnapshot {
    pub turn_number: i64,
    pub player_hp: i32,
    pub player_hp_max: i32,
    pub player_pw: i32,
    pub player_pw_max: i32,
    pub player_level: i32,
    pub player_ac: i32,
    pub gold: i64,
    pub score: i64,
    pub dungeon_level: i32,
    pub depth: i32,
    pub hunger: i32,
    pub position: Point,
    /// `TerrainKind` under the player.
    pub tile_kind: u8,
    pub tile_lit: u8,
    pub tile_object_count: i32,
    pub tile_container_count: i32,
    pub stairs_up: Point,
    pub stairs_down: Point,
    pub altar: Point,
    pub fountain: Point,
    pub door_count: i32,
    pub doors: [DoorEntry; MAX_DOORS],
    pub enemy_count: i32,
    pub enemies: [EnemyEntry; MAX_ENEMIES],
}

impl GameSnapshot {
    /// Build a snapshot from the engine's current state.
    pub fn capture(view: &dyn GameView) -> Self {
        let v = view.vitals();
        let mut snap = GameSnapshot {
            turn_number: view.moves(),
            player_hp: v.hp,
            player_hp_max: v.hp_max,
            player_pw: v.pw,
            player_pw_max: v.pw_max,
            player_level: v.level,
            player_ac: v.ac,
            gold: v.gold,
            score: v.score,
            dungeon_level: v.dungeon_level,
            depth: v.depth,
            hunger: v.hunger,
            position: Point { x: v.x, y: v.y },
            ..Default::default()
        };

        if let Some(tile) = view.terrain_at(v.x, v.y) {
            snap.tile_kind = tile.kind as u8;
            snap.tile_lit = tile.lit as u8;
        }
        let objects = view.objects_at(v.x, v.y);
        snap.tile_object_count = objects.len() as i32;
        snap.tile_container_count = objects.iter().filter(|o| o.contents.is_some()).count() as i32;

        for stair in view.stairways() {
            let p = Point { x: stair.x, y: stair.y };
            let slot = if stair.up { &mut snap.stairs_up } else { &mut snap.stairs_down };
            if !slot.is_set() {
                *slot = p;
            }
        }

        snap.scan_features(view);
        snap.scan_doors(view, v.x, v.y);
        snap.scan_enemies(view, v.x, v.y);
        snap
    }

    fn scan_features(&mut self, view: &dyn GameView) {
        let cols = crate::config::MAX_COLNO as i32;
        let rows = crate::config::MAX_ROWNO as i32;
        for x in 0..cols {
            for y in 0..rows {
                let Some(t) = view.terrain_at(x, y) else { continue };
                if !t.seen {
                    continue;
                }
                match t.kind {
                    TerrainKind::Altar if !self.altar.is_set() => self.altar = Point { x, y },
                    TerrainKind::Fountain if !self.fountain.is_set() => self.fountain = Point { x, y },
                    _ => {}
                }
            }
        }
    }

    fn scan_doors(&mut self, view: &dyn GameView, px: i32, py: i32) {
        let mut n = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) == (0, 0) {
                    continue;
                }
                let (x, y) = (px + dx, py + dy);
                if let Some(t) = view.terrain_at(x, y)
                    && t.kind.is_door()
                {
                    self.doors[n] = DoorEntry { x, y, kind: t.kind as u8 };
                    n += 1;
                }
            }
        }
        self.door_count = n as i32;
    }

    fn scan_enemies(&mut self, view: &dyn GameView, px: i32, py: i32) {
        let mut near: Vec<EnemyEntry> = view
            .monsters()
            .into_iter()
            .filter(|m| m.hostile)
            .map(|m| EnemyEntry {
                id: m.id,
                x: m.x,
                y: m.y,
                glyph: m.glyph,
                distance: (m.x - px).abs() + (m.y - py).abs(),
            })
            .filter(|e| e.distance <= ENEMY_RADIUS)
            .collect();
        near.sort_by_key(|e| (e.distance, e.id));
        near.truncate(MAX_ENEMIES);
        self.enemies[..near.len()].copy_from_slice(&near);
        self.enemy_count = near.len() as i32;
    }
}

struct Slot {
    seq: AtomicU64,
    data: UnsafeCell<GameSnapshot>,
}

/// Two snapshot slots and the index of the one to read.
pub struct SnapshotBuffer {
    slots: [Slot; 2],
    current: AtomicUsize,
    writer: Mutex<()>,
    publishes: AtomicU64,
}

// Writers are serialized by `writer`; readers only copy and validate the
// copy against the slot's sequence counter.
unsafe impl Sync for SnapshotBuffer {}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuffer {
    pub fn new() -> Self {
        let slot = || Slot {
            seq: AtomicU64::new(0),
            data: UnsafeCell::new(GameSnapshot::default()),
        };
        Self {
            slots: [slot(), slot()],
            current: AtomicUsize::new(0),
            writer: Mutex::new(()),
            publishes: AtomicU64::new(0),
        }
    }

    /// Write `snap` into the inactive slot and make it current.
    pub fn publish(&self, snap: &GameSnapshot) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let idx = 1 - self.current.load(Ordering::Acquire);
        let slot = &self.slots[idx];
        let seq = slot.seq.load(Ordering::Relaxed);
        slot.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        unsafe { std::ptr::write_volatile(slot.data.get(), *snap) };
        slot.seq.store(seq.wrapping_add(2), Ordering::Release);
        self.current.store(idx, Ordering::Release);
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current snapshot.
    pub fn read(&self) -> GameSnapshot {
        loop {
            let idx = self.current.load(Ordering::Acquire);
            let slot = &self.slots[idx];
            let before = slot.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let copy = unsafe { std::ptr::read_volatile(slot.data.get()) };
            fence(Ordering::Acquire);
            if slot.seq.load(Ordering::Relaxed) == before {
                return copy;
            }
        }
    }

    /// Number of completed publishes.
    pub fn publishes(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }

    /// Publish an empty snapshot.
    pub fn clear(&self) {
        self.publish(&GameSnapshot::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn uniform(k: i64) -> GameSnapshot {
        let k32 = k as i32;
        let mut s = GameSnapshot {
            turn_number: k,
            player_hp: k32,
            player_hp_max: k32,
            gold: k,
            score: k,
            position: Point { x: k32, y: k32 },
            door_count: k32,
            enemy_count: k32,
            ..Default::default()
        };
        for d in s.doors.iter_mut() {
            d.x = k32;
        }
        for e in s.enemies.iter_mut() {
            e.distance = k32;
        }
        s
    }

    fn is_uniform(s: &GameSnapshot) -> bool {
        let k = s.turn_number;
        let k32 = k as i32;
        s.player_hp == k32
            && s.player_hp_max == k32
            && s.gold == k
            && s.score == k
            && s.position == Point { x: k32, y: k32 }
            && s.door_count == k32
            && s.enemy_count == k32
            && s.doors.iter().all(|d| d.x == k32)
            && s.enemies.iter().all(|e| e.distance == k32)
    }

    #[test]
    fn test_default_features_absent() {
        let s = GameSnapshot::default();
        assert_eq!(s.stairs_up, Point::NONE);
        assert_eq!(s.stairs_down, Point::NONE);
        assert_eq!(s.altar, Point { x: -1, y: -1 });
        assert!(!s.fountain.is_set());
    }

    #[test]
    fn test_read_returns_latest_publish() {
        let buf = SnapshotBuffer::new();
        assert_eq!(buf.read(), GameSnapshot::default());
        buf.publish(&uniform(1));
        buf.publish(&uniform(2));
        assert_eq!(buf.read().turn_number, 2);
        assert_eq!(buf.publishes(), 2);
        buf.clear();
        assert_eq!(buf.read().turn_number, 0);
    }

    #[test]
    fn test_no_torn_reads_under_contention() {
        let buf = Arc::new(SnapshotBuffer::new());
        let writer = {
            let buf = buf.clone();
            thread::spawn(move || {
                for k in 1..=20_000 {
                    buf.publish(&uniform(k));
                }
            })
        };
        let readers: Vec<_> = (0..3)
            .map(|_| {
                let buf = buf.clone();
                thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..20_000 {
                        let s = buf.read();
                        assert!(is_uniform(&s), "torn snapshot at turn {}", s.turn_number);
                        assert!(s.turn_number >= last);
                        last = s.turn_number;
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(buf.read().turn_number, 20_000);
    }
}
