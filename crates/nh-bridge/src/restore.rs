//! Restore orchestrator.
//!
//! Rebuilds a session from `save/savegame` in a freshly reset heap. The
//! order of the steps matters throughout: stale pointers are nulled before
//! any engine code can follow them, vision and status exist before the
//! first `getlev`, and the current level is loaded last so the extraction
//! loop cannot leave another level in memory.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use nh_heap::FixedHeap;

use crate::config::SymbolOverrides;
use crate::engine::{Engine, RestoreMode};
use crate::invalidate::{InvalidationReport, pointer_sanity};
use crate::nhfile::{NhFile, NhFileMode};
use crate::paths::{FilePrefixes, SAVEGAME_NAME};
use crate::save::externalize_levels;
use crate::session::{SessionFlags, Shared};
use crate::status::CharacterStatus;
use crate::winprocs::{WIN_MESSAGE, WindowProcs, create_fixed_windows};
use crate::Result;

/// Set after the first restore since process start. Later restores refresh
/// the status buffers instead of initializing them.
static STATUS_FIRST_LOAD_DONE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// There is no save to restore.
    NoSave,
    Restored(RestoreReport),
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub path: PathBuf,
    pub plname: String,
    pub current_ledger: i16,
    /// Levels written back to external files.
    pub levels: Vec<i16>,
    pub invalidated: InvalidationReport,
    pub items_rewoven: usize,
    /// Timers still waiting for their object after the second relink.
    pub timers_pending: usize,
}

/// What a restore needs besides the engine and its windows.
pub struct RestoreContext<'a> {
    pub heap: &'a FixedHeap,
    pub prefixes: &'a FilePrefixes,
    pub symbols: &'a SymbolOverrides,
    pub shared: &'a Shared,
}

/// Restore `save/savegame` into `engine`.
pub fn restore_game(
    engine: &mut dyn Engine,
    win: &mut dyn WindowProcs,
    ctx: &RestoreContext<'_>,
) -> Result<RestoreOutcome> {
    let path = ctx.prefixes.savegame();
    if !path.is_file() {
        log::info!("no save at {}", path.display());
        return Ok(RestoreOutcome::NoSave);
    }
    log::info!("restoring {}", path.display());

    let mut run = Restore {
        engine,
        win,
        ctx,
        path,
        invalidated: InvalidationReport::default(),
    };
    let report = run.execute()?;
    log::info!(
        "restored {} on ledger {} ({} levels externalized)",
        report.plname,
        report.current_ledger,
        report.levels.len()
    );
    Ok(RestoreOutcome::Restored(report))
}

struct Restore<'r, 'c> {
    engine: &'r mut dyn Engine,
    win: &'r mut dyn WindowProcs,
    ctx: &'r RestoreContext<'c>,
    path: PathBuf,
    invalidated: InvalidationReport,
}

impl Restore<'_, '_> {
    fn execute(&mut self) -> Result<RestoreReport> {
        self.clear_exit_flags();
        self.reset_heap();
        self.clear_command_queue();
        self.seed_current_fruit();
        self.invalidate_transient();
        self.invalidate_worn();
        self.invalidate_saved_bundles();
        self.reinit_file_prefixes()?;
        self.init_scripting();
        self.init_windows();
        self.create_windows();
        let mut f = self.open_save()?;
        self.skip_header(&mut f)?;
        let plname = self.read_player_name(&mut f)?;
        self.init_status();
        self.init_vision();
        self.set_restore_flags();
        let current = self.load_current_level(&mut f)?;
        self.bypass_uid_check();
        self.restore_game_state(&mut f, &plname)?;
        self.init_object_probabilities();
        let items_rewoven = self.relink_worn_items();
        self.refresh_status();
        self.write_current_level(current)?;
        let levels = self.extract_levels(&mut f)?;
        self.write_lock_file()?;
        self.reload_current_level(&mut f)?;
        self.clear_restore_flags();
        let timers_pending = self.retry_timer_relink();
        self.post_restore_fixup();
        self.redraw();
        self.welcome_back();
        self.mark_snapshot_loaded();
        self.finish_session();
        self.check_pointers();

        Ok(RestoreReport {
            path: self.path.clone(),
            plname,
            current_ledger: current,
            levels,
            invalidated: self.invalidated,
            items_rewoven,
            timers_pending,
        })
    }

    fn clear_exit_flags(&mut self) {
        SessionFlags::set(&self.ctx.shared.flags.game_should_exit, false);
        self.engine.state_mut().gameover = false;
    }

    fn reset_heap(&mut self) {
        let before = self.ctx.heap.stats();
        self.ctx.heap.reset();
        log::debug!("heap reset ({} bytes in {} blocks released)", before.used, before.block_count);
    }

    fn clear_command_queue(&mut self) {
        let cleared = self.engine.roots_mut().reset_command_queue();
        self.invalidated.command_queue = cleared;
    }

    /// Zero here would be read as a bad fruit if any object is made before
    /// the game state overwrites it.
    fn seed_current_fruit(&mut self) {
        self.engine.roots_mut().current_fruit = 1;
    }

    fn invalidate_transient(&mut self) {
        let report = self.engine.roots_mut().invalidate_transient();
        self.invalidated = InvalidationReport {
            command_queue: self.invalidated.command_queue,
            ..report
        };
    }

    fn invalidate_worn(&mut self) {
        let stale = self.engine.roots_mut().reset_worn();
        self.invalidated.worn += stale;
        if stale > 0 {
            log::warn!("{} worn slots still set after invalidation", stale);
        }
    }

    fn invalidate_saved_bundles(&mut self) {
        self.invalidated.saved = self.engine.roots_mut().reset_saved();
        log::info!("invalidated: {}", self.invalidated);
    }

    fn reinit_file_prefixes(&mut self) -> Result<()> {
        self.ctx.prefixes.ensure_dirs()?;
        self.engine.set_file_prefixes(self.ctx.prefixes);
        Ok(())
    }

    /// Before dungeon setup, which creates and discards a private scripting
    /// state of its own.
    fn init_scripting(&mut self) {
        self.engine.scripting_init();
    }

    fn init_windows(&mut self) {
        let setup = self.engine.window_setup();
        self.win.init_nhwindows(&setup);
        self.engine.apply_symbol_overrides(self.ctx.symbols);
    }

    fn create_windows(&mut self) {
        let ids = create_fixed_windows(&mut *self.win);
        self.engine.set_window_ids(ids);
    }

    fn open_save(&mut self) -> Result<NhFile> {
        let mut f = NhFile::open(&self.path)?;
        f.init_sfprocs();
        f.set_mode(NhFileMode::READING);
        Ok(f)
    }

    /// Plain file reads: `uptodate` needs globals that do not exist yet.
    fn skip_header(&mut self, f: &mut NhFile) -> Result<()> {
        let len = f.skip_version_header()?;
        log::trace!("skipped {} header bytes", len);
        Ok(())
    }

    fn read_player_name(&mut self, f: &mut NhFile) -> Result<String> {
        let plname = f.read_plname()?;
        self.engine.set_plname(&plname);
        Ok(plname)
    }

    fn init_status(&mut self) {
        if STATUS_FIRST_LOAD_DONE.swap(true, Ordering::AcqRel) {
            self.engine.reset_status_blinit();
            self.engine.status_initialize(true);
        } else {
            self.engine.status_initialize(false);
        }
    }

    fn init_vision(&mut self) {
        self.engine.vision_init();
    }

    fn set_restore_flags(&mut self) {
        let state = self.engine.state_mut();
        state.restoring = RestoreMode::GameState;
        state.in_getlev = true;
    }

    /// The current level precedes the game state in the file.
    fn load_current_level(&mut self, f: &mut NhFile) -> Result<i16> {
        self.engine.getlev(f)
    }

    /// The sandbox gives the app a new UID on every launch.
    fn bypass_uid_check(&mut self) {
        self.engine.state_mut().converted_savefile_loaded = true;
    }

    fn restore_game_state(&mut self, f: &mut NhFile, plname: &str) -> Result<()> {
        self.engine.restgamestate(f)?;
        // Wizard mode renames the hero while loading.
        self.engine.set_plname(plname);
        Ok(())
    }

    fn init_object_probabilities(&mut self) {
        self.engine.init_objects_probs();
    }

    fn relink_worn_items(&mut self) -> usize {
        let worn = self.engine.worn_inventory();
        for &(obj, mask) in &worn {
            self.engine.setworn(Some(obj), mask);
        }
        log::debug!("relinked {} worn items", worn.len());
        worn.len()
    }

    fn refresh_status(&mut self) {
        self.engine.status_initialize(true);
    }

    /// The save holds the current level but no external file exists for it
    /// yet. The next level change reads it back from there.
    fn write_current_level(&mut self, current: i16) -> Result<()> {
        let mut out = NhFile::create(self.ctx.prefixes.level_file(current))?;
        out.init_sfprocs();
        out.set_mode(NhFileMode::WRITING);
        self.engine.savelev(&mut out, current)?;
        out.finish()
    }

    fn extract_levels(&mut self, f: &mut NhFile) -> Result<Vec<i16>> {
        self.engine.state_mut().restoring = RestoreMode::Levels;
        externalize_levels(&mut *self.engine, f, self.ctx.prefixes)
    }

    fn write_lock_file(&mut self) -> Result<()> {
        let pid = self.engine.hackpid();
        fs::write(self.ctx.prefixes.lock_file(), pid.to_ne_bytes())?;
        Ok(())
    }

    fn reload_current_level(&mut self, f: &mut NhFile) -> Result<()> {
        f.rewind()?;
        f.skip_version_header()?;
        f.read_plname()?;
        self.engine.state_mut().restoring = RestoreMode::CurrentLevel;
        let ledger = self.engine.getlev(f)?;
        log::trace!("current level {} reloaded", ledger);
        Ok(())
    }

    fn clear_restore_flags(&mut self) {
        let state = self.engine.state_mut();
        state.restoring = RestoreMode::None;
        state.in_getlev = false;
    }

    /// Timers that pointed at objects on levels not yet loaded were left
    /// for later; every level has been in memory once by now.
    fn retry_timer_relink(&mut self) -> usize {
        let waiting = self.engine.timers_needing_fixup();
        if waiting == 0 {
            return 0;
        }
        self.engine.relink_timers();
        let pending = self.engine.timers_needing_fixup();
        log::info!("timer relink retry: {} waiting, {} still unresolved", waiting, pending);
        pending
    }

    fn post_restore_fixup(&mut self) {
        self.engine.reset_glyphmap();
        self.engine.max_rank_sz();
        if self.engine.on_rogue_level() {
            self.engine.assign_graphics_rogue();
        }
        let worn = &mut self.engine.roots_mut().worn;
        if worn.uball.is_some() != worn.uchain.is_some() {
            log::warn!("ball and chain out of step; clearing both");
            worn.uball = None;
            worn.uchain = None;
        }
        self.engine.inven_inuse();
        self.engine.relight_dark_rooms();
        self.engine.vision_reset();
        self.engine.vision_recalc(0);
        self.engine.run_timers();
        self.engine.check_special_room();
    }

    /// Render before the loop starts; the host may read the map right away.
    fn redraw(&mut self) {
        self.engine.state_mut().beyond_savefile_load = true;
        self.engine.docrt(&mut *self.win);
        self.engine.flush_screen(&mut *self.win);
    }

    fn welcome_back(&mut self) {
        self.engine.welcome(&mut *self.win, false);
        self.win.clear_nhwindow(WIN_MESSAGE);
    }

    fn mark_snapshot_loaded(&mut self) {
        SessionFlags::set(&self.ctx.shared.flags.snapshot_loaded, true);
    }

    fn finish_session(&mut self) {
        *self.ctx.shared.status() = CharacterStatus::default();
        self.ctx.shared.fire_game_ready();
        self.engine.set_save_filename(SAVEGAME_NAME);
    }

    fn check_pointers(&self) {
        let bad = pointer_sanity(self.engine.roots(), self.ctx.heap);
        for b in &bad {
            log::warn!("root {:#x} is {:?} after restore", b.addr, b.state);
        }
    }
}
