//! Global-pointer invalidation after a heap reset.
//!
//! A saved game carries pointer values that were valid in the heap image
//! that wrote it. The restore path nulls every pointer global before any
//! engine code can dereference one, group by group, and logs how many
//! non-null values each group held.

use std::fmt;

use nh_heap::{BlockState, FixedHeap};

use crate::roots::EngineRoots;

/// Non-null pointers dropped per group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub worn: usize,
    pub chains: usize,
    pub monster_grid: usize,
    pub combat: usize,
    pub ui_scratch: usize,
    pub misc: usize,
    pub saved: usize,
    pub command_queue: usize,
}

impl InvalidationReport {
    pub fn total(&self) -> usize {
        self.worn
            + self.chains
            + self.monster_grid
            + self.combat
            + self.ui_scratch
            + self.misc
            + self.saved
            + self.command_queue
    }
}

impl fmt::Display for InvalidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worn={} chains={} monster_grid={} combat={} ui={} misc={} saved={} cmdq={}",
            self.worn,
            self.chains,
            self.monster_grid,
            self.combat,
            self.ui_scratch,
            self.misc,
            self.saved,
            self.command_queue
        )
    }
}

impl EngineRoots {
    /// Null the transient globals: worn slots, chain heads, the monster
    /// grid, combat pointers, UI scratch buffers with their capacities, and
    /// the deleted-object, bones-fruit, level-generation and door pointers.
    pub fn invalidate_transient(&mut self) -> InvalidationReport {
        let report = InvalidationReport {
            worn: self.reset_worn(),
            chains: self.reset_chains(),
            monster_grid: self.reset_monster_grid(),
            combat: self.reset_combat(),
            ui_scratch: self.reset_ui_scratch(),
            misc: self.reset_misc(),
            ..Default::default()
        };
        log::info!("invalidated transient globals: {}", report);
        report
    }

    /// Null everything, including the saved bundles and the command queue.
    pub fn invalidate_all(&mut self) -> InvalidationReport {
        let mut report = self.invalidate_transient();
        report.saved = self.reset_saved();
        report.command_queue = self.reset_command_queue();
        report
    }
}

/// A root that points somewhere other than a live block of `heap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPointer {
    pub addr: usize,
    pub state: BlockState,
}

/// Every non-null root that is not a live block in `heap`.
pub fn pointer_sanity(roots: &EngineRoots, heap: &FixedHeap) -> Vec<BadPointer> {
    roots
        .all_pointers()
        .into_iter()
        .map(|p| BadPointer {
            addr: p.addr(),
            state: heap.block_state(p),
        })
        .filter(|b| b.state != BlockState::Live)
        .collect()
}
