//! The contract between the bridge and the hosted engine.
//!
//! The engine is a black box that owns its globals and its main loop. The
//! bridge reaches it only through [`Engine`] (commands and lifecycle) and
//! [`GameView`] (read-only queries used by the snapshot, status and query
//! caches). Everything runs on the engine thread; `Engine: Send` lets the
//! worker take ownership but the engine itself is never shared.
//!
//! Strings returned by the engine are always owned. Engine name helpers
//! that format into rotating static buffers must be copied before the call
//! returns; nothing here hands out a borrow into engine storage.

use nh_heap::{FixedHeap, HeapPtr};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::config::{GameOptions, SymbolOverrides};
use crate::nhfile::NhFile;
use crate::paths::FilePrefixes;
use crate::roots::{EngineRoots, WornMask};
use crate::winprocs::{WindowIds, WindowProcs, WindowSetup};
use crate::Result;

// ============================================================================
// Query types
// ============================================================================

/// Player numbers shown on the status line and in the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vitals {
    pub hp: i32,
    pub hp_max: i32,
    pub pw: i32,
    pub pw_max: i32,
    pub level: i32,
    pub experience: i64,
    pub ac: i32,
    pub x: i32,
    pub y: i32,
    pub gold: i64,
    pub score: i64,
    /// Dungeon level number as displayed.
    pub dungeon_level: i32,
    pub depth: i32,
    /// 0 = not hungry, 1 = hungry, 2 = weak, 3 = fainting.
    pub hunger: i32,
}

/// Who the character is. All names are copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharacterIdentity {
    pub name: String,
    pub role: String,
    pub race: String,
    pub gender: String,
    pub alignment: String,
}

/// Character choices for a new game. Indices follow the engine's role,
/// race, gender and alignment tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterPreset {
    pub name: String,
    pub role: i32,
    pub race: i32,
    pub gender: i32,
    pub alignment: i32,
}

/// Terrain type of one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TerrainKind {
    Stone = 0,
    Wall,
    Room,
    Corridor,
    Doorway,
    OpenDoor,
    ClosedDoor,
    BrokenDoor,
    StairsUp,
    StairsDown,
    LadderUp,
    LadderDown,
    Altar,
    Fountain,
    Sink,
    Throne,
    Grave,
    Tree,
    Pool,
    Lava,
    Ice,
    Other,
}

impl TerrainKind {
    pub fn is_door(self) -> bool {
        matches!(
            self,
            TerrainKind::Doorway | TerrainKind::OpenDoor | TerrainKind::ClosedDoor | TerrainKind::BrokenDoor
        )
    }
}

/// What the player knows about one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Terrain {
    pub kind: TerrainKind,
    pub lit: bool,
    pub seen: bool,
}

/// A monster on the current level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonsterInfo {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub glyph: i32,
    pub name: String,
    pub hostile: bool,
}

/// An object at a map position or inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub id: u32,
    pub name: String,
    pub class: char,
    pub quantity: i64,
    pub glyph: i32,
    /// `Some` for containers whose contents the player knows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<ObjectInfo>>,
}

/// A staircase or ladder on the current level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stairway {
    pub x: i32,
    pub y: i32,
    pub up: bool,
    pub ladder: bool,
    pub to_level: i32,
}

/// One line of the dungeon overview (the engine's mapseen records).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewEntry {
    pub dungeon: String,
    pub level: i32,
    pub ledger: i16,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredMonster {
    pub name: String,
    pub seen: u32,
    pub killed: u32,
}

// ============================================================================
// Engine state
// ============================================================================

/// Why `moveloop` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoopExit {
    /// The player (or a canned command) asked for a save; the bridge saves
    /// and re-enters the loop with `resume = true`.
    SaveRequested,
    GameOver,
    Quit,
}

/// `program_state.restoring`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum RestoreMode {
    #[default]
    None,
    GameState,
    Levels,
    CurrentLevel,
}

/// The engine's `program_state` and related flags the bridge drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramState {
    pub gameover: bool,
    pub saving: u32,
    pub restoring: RestoreMode,
    pub in_getlev: bool,
    pub beyond_savefile_load: bool,
    pub converted_savefile_loaded: bool,
    pub something_worth_saving: bool,
    pub mon_notifications: bool,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            gameover: false,
            saving: 0,
            restoring: RestoreMode::None,
            in_getlev: false,
            beyond_savefile_load: false,
            converted_savefile_loaded: false,
            something_worth_saving: false,
            mon_notifications: true,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Read-only queries. Window procedures that need game data receive the
/// engine as `&dyn GameView`.
pub trait GameView {
    /// Turn counter (`moves`).
    fn moves(&self) -> i64;
    fn vitals(&self) -> Vitals;
    fn identity(&self) -> CharacterIdentity;
    fn plname(&self) -> String;
    /// `None` for coordinates off the map.
    fn terrain_at(&self, x: i32, y: i32) -> Option<Terrain>;
    fn monsters(&self) -> Vec<MonsterInfo>;
    fn objects_at(&self, x: i32, y: i32) -> Vec<ObjectInfo>;
    fn stairways(&self) -> Vec<Stairway>;
    fn dungeon_overview(&self) -> Vec<OverviewEntry>;
    fn discovered_monsters(&self) -> Vec<DiscoveredMonster>;
    fn is_gameover(&self) -> bool;
}

/// The hosted engine.
pub trait Engine: GameView + Send {
    // --- lifecycle -------------------------------------------------------

    /// Zero every global record bundle.
    fn reset_globals(&mut self);
    /// First-stage init. All engine allocations go to `heap` from here on.
    fn early_init(&mut self, heap: &'static FixedHeap);
    /// Install the savefile I/O procedures.
    fn sf_init(&mut self);
    fn set_file_prefixes(&mut self, prefixes: &FilePrefixes);
    /// Data-file librarian.
    fn dlb_init(&mut self) -> Result<()>;
    fn dlb_cleanup(&mut self);
    fn scripting_init(&mut self);
    fn scripting_shutdown(&mut self);
    /// Free status-line buffers.
    fn status_finish(&mut self);
    /// Free everything the engine allocated for the current game.
    fn free_dynamic_data(&mut self);
    fn apply_options(&mut self, options: &GameOptions);
    fn apply_symbol_overrides(&mut self, symbols: &SymbolOverrides);
    /// Banner and glyph table handed to `init_nhwindows`.
    fn window_setup(&self) -> WindowSetup;
    fn set_window_ids(&mut self, ids: WindowIds);

    // --- play ------------------------------------------------------------

    fn newgame(&mut self, preset: &CharacterPreset, win: &mut dyn WindowProcs) -> Result<()>;
    fn moveloop(&mut self, resume: bool, win: &mut dyn WindowProcs) -> LoopExit;

    // --- globals ---------------------------------------------------------

    fn state(&self) -> &ProgramState;
    fn state_mut(&mut self) -> &mut ProgramState;
    fn roots(&self) -> &EngineRoots;
    fn roots_mut(&mut self) -> &mut EngineRoots;
    fn current_ledger(&self) -> i16;
    fn max_ledger(&self) -> i16;
    /// `LFILE_EXISTS` for `ledger`.
    fn level_file_exists(&self, ledger: i16) -> bool;
    fn hackpid(&self) -> i32;
    fn set_plname(&mut self, name: &str);
    fn save_filename(&self) -> Option<String>;
    fn set_save_filename(&mut self, name: &str);

    // --- save I/O --------------------------------------------------------

    fn store_version(&mut self, f: &mut NhFile) -> Result<()>;
    /// Read and validate the version header.
    fn uptodate(&mut self, f: &mut NhFile) -> Result<()>;
    /// Write the in-memory level under `ledger`. With `FREEING` set the
    /// level is released afterwards.
    fn savelev(&mut self, f: &mut NhFile, ledger: i16) -> Result<()>;
    /// Load the next level record into memory; returns its ledger.
    fn getlev(&mut self, f: &mut NhFile) -> Result<i16>;
    fn savegamestate(&mut self, f: &mut NhFile) -> Result<()>;
    fn restgamestate(&mut self, f: &mut NhFile) -> Result<()>;

    // --- save fixups -----------------------------------------------------

    /// Copy `uswallow`, `uinwater` and `uburied` back from their shadows.
    fn u_restore_save_shadows(&mut self);
    /// Put in-flight objects (thrown, kicked) somewhere savable.
    fn done_object_cleanup(&mut self);
    fn vision_recalc(&mut self, control: i32);
    /// Apply (`+1`) or undo (`-1`) full-moon and Friday-13th luck.
    fn change_luck_for_date(&mut self, sign: i32);

    // --- timers ----------------------------------------------------------

    fn timer_count(&self) -> usize;
    /// Cut the chain to its first `keep` entries, freeing the rest.
    /// Returns how many were removed.
    fn truncate_timers(&mut self, keep: usize) -> usize;
    /// Resolve timer object references; unresolvable ones keep
    /// `needs_fixup` set instead of panicking.
    fn relink_timers(&mut self);
    fn timers_needing_fixup(&self) -> usize;

    // --- worn items ------------------------------------------------------

    /// Inventory objects with their `owornmask`.
    fn worn_inventory(&self) -> Vec<(HeapPtr, WornMask)>;
    fn setworn(&mut self, obj: Option<HeapPtr>, mask: WornMask);

    // --- restore fixups --------------------------------------------------

    fn init_objects_probs(&mut self);
    /// `status_initialize(reassess_only)`.
    fn status_initialize(&mut self, reassess_only: bool);
    /// Clear the status subsystem's "already initialized" latch.
    fn reset_status_blinit(&mut self);
    fn vision_init(&mut self);
    fn vision_reset(&mut self);
    fn run_timers(&mut self);
    fn docrt(&mut self, win: &mut dyn WindowProcs);
    fn flush_screen(&mut self, win: &mut dyn WindowProcs);
    fn welcome(&mut self, win: &mut dyn WindowProcs, new_game: bool);

    fn reset_glyphmap(&mut self) {}
    fn max_rank_sz(&mut self) {}
    fn on_rogue_level(&self) -> bool {
        false
    }
    fn assign_graphics_rogue(&mut self) {}
    fn inven_inuse(&mut self) {}
    fn relight_dark_rooms(&mut self) {}
    fn check_special_room(&mut self) {}
}

/// Builds a fresh engine for every `full_init`.
pub type EngineFactory = std::sync::Arc<dyn Fn() -> Box<dyn Engine> + Send + Sync>;
