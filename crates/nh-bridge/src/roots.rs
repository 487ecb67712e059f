//! The engine's pointer globals, grouped by how they are reset.
//!
//! Every field here holds a pointer into the fixed heap. After
//! `FixedHeap::reset` each of them dangles; the restore path clears them by
//! group before any engine code runs. The reset methods return how many
//! non-null pointers they dropped so the caller can log what was stale.

use bitflags::bitflags;
use nh_heap::HeapPtr;

use crate::config::{MAX_COLNO, MAX_ROWNO};

bitflags! {
    /// `owornmask` bits: which slot an item occupies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WornMask: u32 {
        const ARM = 0x0000_0001;
        const ARMC = 0x0000_0002;
        const ARMH = 0x0000_0004;
        const ARMS = 0x0000_0008;
        const ARMG = 0x0000_0010;
        const ARMF = 0x0000_0020;
        const ARMU = 0x0000_0040;
        const WEP = 0x0000_0100;
        const QUIVER = 0x0000_0200;
        const SWAPWEP = 0x0000_0400;
        const SKIN = 0x0000_0800;
        const AMUL = 0x0001_0000;
        const RINGL = 0x0002_0000;
        const RINGR = 0x0004_0000;
        const TOOL = 0x0008_0000;
        const BALL = 0x0020_0000;
        const CHAIN = 0x0040_0000;
    }
}

/// The 17 worn-item slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WornSlots {
    pub uarm: Option<HeapPtr>,
    pub uarmc: Option<HeapPtr>,
    pub uarmh: Option<HeapPtr>,
    pub uarms: Option<HeapPtr>,
    pub uarmg: Option<HeapPtr>,
    pub uarmf: Option<HeapPtr>,
    pub uarmu: Option<HeapPtr>,
    pub uskin: Option<HeapPtr>,
    pub uamul: Option<HeapPtr>,
    pub uleft: Option<HeapPtr>,
    pub uright: Option<HeapPtr>,
    pub ublindf: Option<HeapPtr>,
    pub uwep: Option<HeapPtr>,
    pub uswapwep: Option<HeapPtr>,
    pub uquiver: Option<HeapPtr>,
    pub uball: Option<HeapPtr>,
    pub uchain: Option<HeapPtr>,
}

impl WornSlots {
    pub const COUNT: usize = 17;

    /// Slot for a single mask bit.
    pub fn slot_mut(&mut self, bit: WornMask) -> Option<&mut Option<HeapPtr>> {
        let slot = match bit {
            WornMask::ARM => &mut self.uarm,
            WornMask::ARMC => &mut self.uarmc,
            WornMask::ARMH => &mut self.uarmh,
            WornMask::ARMS => &mut self.uarms,
            WornMask::ARMG => &mut self.uarmg,
            WornMask::ARMF => &mut self.uarmf,
            WornMask::ARMU => &mut self.uarmu,
            WornMask::SKIN => &mut self.uskin,
            WornMask::AMUL => &mut self.uamul,
            WornMask::RINGL => &mut self.uleft,
            WornMask::RINGR => &mut self.uright,
            WornMask::TOOL => &mut self.ublindf,
            WornMask::WEP => &mut self.uwep,
            WornMask::SWAPWEP => &mut self.uswapwep,
            WornMask::QUIVER => &mut self.uquiver,
            WornMask::BALL => &mut self.uball,
            WornMask::CHAIN => &mut self.uchain,
            _ => return None,
        };
        Some(slot)
    }

    /// All slots with their mask bit.
    pub fn iter(&self) -> impl Iterator<Item = (WornMask, Option<HeapPtr>)> + '_ {
        [
            (WornMask::ARM, self.uarm),
            (WornMask::ARMC, self.uarmc),
            (WornMask::ARMH, self.uarmh),
            (WornMask::ARMS, self.uarms),
            (WornMask::ARMG, self.uarmg),
            (WornMask::ARMF, self.uarmf),
            (WornMask::ARMU, self.uarmu),
            (WornMask::SKIN, self.uskin),
            (WornMask::AMUL, self.uamul),
            (WornMask::RINGL, self.uleft),
            (WornMask::RINGR, self.uright),
            (WornMask::TOOL, self.ublindf),
            (WornMask::WEP, self.uwep),
            (WornMask::SWAPWEP, self.uswapwep),
            (WornMask::QUIVER, self.uquiver),
            (WornMask::BALL, self.uball),
            (WornMask::CHAIN, self.uchain),
        ]
        .into_iter()
    }

    pub fn occupied(&self) -> usize {
        self.iter().filter(|(_, p)| p.is_some()).count()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.occupied();
        *self = Self::default();
        n
    }
}

/// Heads of the engine's singly linked chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainHeads {
    pub timers: Option<HeapPtr>,
    pub stairs: Option<HeapPtr>,
    pub gamelog: Option<HeapPtr>,
    pub objects: Option<HeapPtr>,
    pub monsters: Option<HeapPtr>,
    pub inventory: Option<HeapPtr>,
    pub buried_objects: Option<HeapPtr>,
    pub migrating_objects: Option<HeapPtr>,
    pub migrating_monsters: Option<HeapPtr>,
    pub billed_objects: Option<HeapPtr>,
}

/// Pointers live only while one attack or throw resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatScratch {
    pub thrown_object: Option<HeapPtr>,
    pub kicked_object: Option<HeapPtr>,
    pub current_target: Option<HeapPtr>,
    pub polearm_target: Option<HeapPtr>,
    pub steed: Option<HeapPtr>,
    pub engulfer: Option<HeapPtr>,
}

/// A heap buffer the engine grows by comparing against `capacity`. Both
/// halves must be cleared together or the engine writes past a fresh block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchBuffer {
    pub ptr: Option<HeapPtr>,
    pub capacity: usize,
}

impl ScratchBuffer {
    fn clear(&mut self) -> usize {
        let n = self.ptr.is_some() as usize;
        *self = Self::default();
        n
    }
}

/// UI text buffers owned by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiScratch {
    pub toplines: ScratchBuffer,
    pub status_text: ScratchBuffer,
    pub menu_text: ScratchBuffer,
    pub getlin_buffer: ScratchBuffer,
}

/// Dynamic pointers inside the `saved_*` bundles. Each is freed or
/// overwritten later in restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SavedBundle {
    pub doors: Option<HeapPtr>,
    pub bones_info: Option<HeapPtr>,
    pub damage_list: Option<HeapPtr>,
    pub sp_levchn: Option<HeapPtr>,
    pub fruit_head: Option<HeapPtr>,
    pub old_fruit: Option<HeapPtr>,
    pub timer_head: Option<HeapPtr>,
    pub stairs_head: Option<HeapPtr>,
    pub gamelog_head: Option<HeapPtr>,
}

fn take_all(ptrs: &mut [&mut Option<HeapPtr>]) -> usize {
    ptrs.iter_mut().filter_map(|p| p.take()).count()
}

/// Every pointer global the bridge knows how to reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRoots {
    pub worn: WornSlots,
    pub chains: ChainHeads,
    /// Per-cell monster pointers, `MAX_COLNO * MAX_ROWNO`, column-major.
    pub monster_grid: Vec<Option<HeapPtr>>,
    pub combat: CombatScratch,
    pub ui: UiScratch,
    pub deleted_objects: Option<HeapPtr>,
    pub bones_fruit_table: Option<HeapPtr>,
    pub levgen_scratch: Option<HeapPtr>,
    pub door_alloc: Option<HeapPtr>,
    pub saved: SavedBundle,
    pub command_queue: [Option<HeapPtr>; 2],
    /// Index of the fruit the player named. Never 0 once objects exist.
    pub current_fruit: i32,
}

impl Default for EngineRoots {
    fn default() -> Self {
        Self {
            worn: WornSlots::default(),
            chains: ChainHeads::default(),
            monster_grid: vec![None; MAX_COLNO as usize * MAX_ROWNO as usize],
            combat: CombatScratch::default(),
            ui: UiScratch::default(),
            deleted_objects: None,
            bones_fruit_table: None,
            levgen_scratch: None,
            door_alloc: None,
            saved: SavedBundle::default(),
            command_queue: [None; 2],
            current_fruit: 0,
        }
    }
}

impl EngineRoots {
    /// Index into `monster_grid`, or `None` off the map.
    pub fn grid_index(x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= MAX_COLNO as i32 || y >= MAX_ROWNO as i32 {
            return None;
        }
        Some(x as usize * MAX_ROWNO as usize + y as usize)
    }

    pub fn reset_chains(&mut self) -> usize {
        let c = &mut self.chains;
        take_all(&mut [
            &mut c.timers,
            &mut c.stairs,
            &mut c.gamelog,
            &mut c.objects,
            &mut c.monsters,
            &mut c.inventory,
            &mut c.buried_objects,
            &mut c.migrating_objects,
            &mut c.migrating_monsters,
            &mut c.billed_objects,
        ])
    }

    pub fn reset_monster_grid(&mut self) -> usize {
        self.monster_grid.iter_mut().filter_map(|p| p.take()).count()
    }

    pub fn reset_combat(&mut self) -> usize {
        let c = &mut self.combat;
        take_all(&mut [
            &mut c.thrown_object,
            &mut c.kicked_object,
            &mut c.current_target,
            &mut c.polearm_target,
            &mut c.steed,
            &mut c.engulfer,
        ])
    }

    pub fn reset_ui_scratch(&mut self) -> usize {
        let ui = &mut self.ui;
        ui.toplines.clear() + ui.status_text.clear() + ui.menu_text.clear() + ui.getlin_buffer.clear()
    }

    /// Deleted-object list, bones-fruit table, level-generation scratch and
    /// door allocation.
    pub fn reset_misc(&mut self) -> usize {
        take_all(&mut [
            &mut self.deleted_objects,
            &mut self.bones_fruit_table,
            &mut self.levgen_scratch,
            &mut self.door_alloc,
        ])
    }

    pub fn reset_worn(&mut self) -> usize {
        self.worn.clear()
    }

    pub fn reset_saved(&mut self) -> usize {
        let s = &mut self.saved;
        take_all(&mut [
            &mut s.doors,
            &mut s.bones_info,
            &mut s.damage_list,
            &mut s.sp_levchn,
            &mut s.fruit_head,
            &mut s.old_fruit,
            &mut s.timer_head,
            &mut s.stairs_head,
            &mut s.gamelog_head,
        ])
    }

    pub fn reset_command_queue(&mut self) -> usize {
        let [a, b] = &mut self.command_queue;
        take_all(&mut [a, b])
    }

    /// Every heap pointer currently held, for sanity checks.
    pub fn all_pointers(&self) -> Vec<HeapPtr> {
        let mut out: Vec<HeapPtr> = self.worn.iter().filter_map(|(_, p)| p).collect();
        let c = &self.chains;
        let s = &self.saved;
        let cb = &self.combat;
        out.extend(
            [
                c.timers,
                c.stairs,
                c.gamelog,
                c.objects,
                c.monsters,
                c.inventory,
                c.buried_objects,
                c.migrating_objects,
                c.migrating_monsters,
                c.billed_objects,
                cb.thrown_object,
                cb.kicked_object,
                cb.current_target,
                cb.polearm_target,
                cb.steed,
                cb.engulfer,
                self.ui.toplines.ptr,
                self.ui.status_text.ptr,
                self.ui.menu_text.ptr,
                self.ui.getlin_buffer.ptr,
                self.deleted_objects,
                self.bones_fruit_table,
                self.levgen_scratch,
                self.door_alloc,
                s.doors,
                s.bones_info,
                s.damage_list,
                s.sp_levchn,
                s.fruit_head,
                s.old_fruit,
                s.timer_head,
                s.stairs_head,
                s.gamelog_head,
                self.command_queue[0],
                self.command_queue[1],
            ]
            .into_iter()
            .flatten(),
        );
        out.extend(self.monster_grid.iter().flatten());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(addr: usize) -> Option<HeapPtr> {
        HeapPtr::from_raw(addr as *mut u8)
    }

    #[test]
    fn test_worn_slots_cover_every_bit() {
        let mut slots = WornSlots::default();
        for bit in WornMask::all().iter() {
            *slots.slot_mut(bit).unwrap() = fake(0x1000);
        }
        assert_eq!(slots.occupied(), WornSlots::COUNT);
        assert_eq!(slots.clear(), WornSlots::COUNT);
        assert!(slots.slot_mut(WornMask::ARM | WornMask::WEP).is_none());
    }

    #[test]
    fn test_scratch_capacity_cleared_with_pointer() {
        let mut roots = EngineRoots::default();
        roots.ui.toplines = ScratchBuffer {
            ptr: fake(0x2000),
            capacity: 512,
        };
        roots.ui.menu_text.capacity = 64;
        assert_eq!(roots.reset_ui_scratch(), 1);
        assert_eq!(roots.ui, UiScratch::default());
    }

    #[test]
    fn test_grid_index_bounds() {
        assert_eq!(EngineRoots::grid_index(0, 0), Some(0));
        assert_eq!(EngineRoots::grid_index(1, 0), Some(MAX_ROWNO as usize));
        assert_eq!(EngineRoots::grid_index(-1, 0), None);
        assert_eq!(EngineRoots::grid_index(0, MAX_ROWNO as i32), None);
    }

    #[test]
    fn test_reset_groups_count_non_null() {
        let mut roots = EngineRoots::default();
        roots.chains.timers = fake(0x10);
        roots.chains.inventory = fake(0x20);
        roots.monster_grid[3] = fake(0x30);
        roots.command_queue = [fake(0x40), None];
        roots.saved.fruit_head = fake(0x50);
        assert_eq!(roots.all_pointers().len(), 5);
        assert_eq!(roots.reset_chains(), 2);
        assert_eq!(roots.reset_monster_grid(), 1);
        assert_eq!(roots.reset_command_queue(), 1);
        assert_eq!(roots.reset_saved(), 1);
        assert!(roots.all_pointers().is_empty());
    }
}
