//! What the stand-in engine reports about itself.
//!
//! The engine lives on the worker thread and is out of reach once a session
//! starts, so it publishes a [`SimReport`] at every key wait and after
//! every redraw. Tests read the latest report through [`SimProbe`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use nh_heap::HeapPtr;

/// The read projection compared across save and restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub plname: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub dungeon_level: i32,
    pub moves: i64,
    /// Inventory object ids, in inventory order.
    pub inventory: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub id: u32,
    pub object: Option<u32>,
    pub needs_fixup: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimReport {
    pub projection: Projection,
    pub gold: i64,
    pub luck: i32,
    pub current_ledger: i16,
    /// Ledgers held in memory.
    pub resident: Vec<i16>,
    pub timers: Vec<TimerState>,
    /// Worn-slot pointers, as set through `setworn`.
    pub worn: Vec<HeapPtr>,
    /// Key waits so far, across sessions.
    pub polls: u64,
    pub paints: u64,
    pub ext_cmd_results: Vec<i32>,
    pub saves_requested: u32,
}

#[derive(Debug, Default)]
pub struct SimProbe {
    report: Mutex<SimReport>,
}

impl SimProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimReport> {
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn report(&self) -> SimReport {
        self.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut SimReport)) {
        f(&mut self.lock());
    }

    pub fn polls(&self) -> u64 {
        self.lock().polls
    }

    pub fn projection(&self) -> Projection {
        self.lock().projection.clone()
    }
}
