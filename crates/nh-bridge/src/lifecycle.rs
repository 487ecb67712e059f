//! Lifecycle controller.
//!
//! [`Lifecycle`] owns the engine, the per-session [`Shared`] state and the
//! engine worker thread. While no game runs the engine and its windows sit
//! in a parked slot; starting or restoring a game moves them into the
//! worker, and joining the worker hands them back.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use nh_heap::FixedHeap;
use nh_save::{CharacterStore, SaveMetadata};

use crate::config::BridgeConfig;
use crate::engine::{CharacterPreset, Engine, EngineFactory, LoopExit};
use crate::exit::{ExitReason, run_guarded};
use crate::host::{HostCallbacks, HostEvent};
use crate::paths::{FilePrefixes, SAVEGAME_NAME};
use crate::queue::EngineCommand;
use crate::restore::{RestoreContext, RestoreOutcome, restore_game};
use crate::save::{SaveOutcome, SaveTarget, save_game, store_save};
use crate::session::{SessionFlags, Shared, deliver_save};
use crate::winprocs::{BridgeWindows, WindowProcs, create_fixed_windows};
use crate::{BridgeError, Result};

/// Set by `full_init` step 1 and cleared by `full_shutdown`.
static EARLY_INIT_DONE: AtomicBool = AtomicBool::new(false);

pub const ENGINE_THREAD_NAME: &str = "nethack-engine";

/// How long a host-requested save waits for the engine thread.
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long shutdown waits for the engine thread to unwind.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const JOIN_POLL: Duration = Duration::from_millis(1);

/// The engine and the windows it draws through.
struct EngineSlot {
    engine: Box<dyn Engine>,
    windows: BridgeWindows,
}

enum SessionStart {
    New(CharacterPreset),
    Resume,
}

/// Why the engine thread stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Loop(LoopExit),
    Failed(String),
    Exited(ExitReason),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Loop(exit) => write!(f, "move loop ended: {exit}"),
            SessionEnd::Failed(err) => write!(f, "engine error: {err}"),
            SessionEnd::Exited(reason) => write!(f, "{reason}"),
        }
    }
}

struct WorkerDone {
    slot: EngineSlot,
    end: SessionEnd,
}

pub struct Lifecycle {
    config: BridgeConfig,
    factory: Option<EngineFactory>,
    heap: &'static FixedHeap,
    prefixes: FilePrefixes,
    store: CharacterStore,
    callbacks: Arc<HostCallbacks>,
    shared: Arc<Shared>,
    slot: Option<EngineSlot>,
    worker: Option<JoinHandle<WorkerDone>>,
    initialized: bool,
    last_end: Option<SessionEnd>,
}

impl Lifecycle {
    pub fn new(config: BridgeConfig) -> Self {
        let callbacks = Arc::new(HostCallbacks::default());
        let prefixes = FilePrefixes::under(&config.docs_root);
        let store = CharacterStore::new(&config.docs_root);
        let shared = Arc::new(Shared::new(&config, callbacks.clone()));
        Self {
            config,
            factory: None,
            heap: FixedHeap::global(),
            prefixes,
            store,
            callbacks,
            shared,
            slot: None,
            worker: None,
            initialized: false,
            last_end: None,
        }
    }

    pub fn with_engine_factory(mut self, factory: EngineFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_heap(mut self, heap: &'static FixedHeap) -> Self {
        self.heap = heap;
        self
    }

    /// Share callbacks registered before the controller existed.
    pub fn with_callbacks(mut self, callbacks: Arc<HostCallbacks>) -> Self {
        self.shared = Arc::new(Shared::new(&self.config, callbacks.clone()));
        self.callbacks = callbacks;
        self
    }

    pub fn set_engine_factory(&mut self, factory: EngineFactory) {
        self.factory = Some(factory);
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Options take effect at the next `full_init` or new session.
    pub fn config_mut(&mut self) -> &mut BridgeConfig {
        &mut self.config
    }

    pub fn prefixes(&self) -> &FilePrefixes {
        &self.prefixes
    }

    pub fn store(&self) -> &CharacterStore {
        &self.store
    }

    pub fn heap(&self) -> &'static FixedHeap {
        self.heap
    }

    pub fn callbacks(&self) -> &Arc<HostCallbacks> {
        &self.callbacks
    }

    /// State of the current session. Replaced by every `full_init` and
    /// `reset_for_new_session`.
    pub fn shared(&self) -> Arc<Shared> {
        self.shared.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_running(&mut self) -> bool {
        self.reap();
        self.worker.is_some()
    }

    /// The window procedures while no engine thread holds them.
    pub fn parked_windows(&self) -> Option<&BridgeWindows> {
        self.slot.as_ref().map(|slot| &slot.windows)
    }

    pub fn last_session_end(&self) -> Option<&SessionEnd> {
        self.last_end.as_ref()
    }

    /// Deliver queued host notifications. Call on the UI thread.
    pub fn pump_events(&self) -> Vec<HostEvent> {
        self.shared.pump_events()
    }

    // ------------------------------------------------------------------
    // init / shutdown
    // ------------------------------------------------------------------

    /// Bring the engine up. Call once per load; a second call without
    /// `full_shutdown` in between panics.
    pub fn full_init(&mut self) -> Result<()> {
        assert!(!self.initialized, "full_init called twice without full_shutdown");
        let factory = self.factory.clone().ok_or(BridgeError::NoEngineFactory)?;
        assert!(
            !EARLY_INIT_DONE.swap(true, Ordering::AcqRel),
            "another bridge instance is initialized in this process"
        );
        match self.boot(&factory) {
            Ok(slot) => {
                self.slot = Some(slot);
                self.initialized = true;
                self.last_end = None;
                log::info!("bridge initialized under {}", self.config.docs_root.display());
                Ok(())
            }
            Err(err) => {
                EARLY_INIT_DONE.store(false, Ordering::Release);
                log::error!("full_init failed: {}", err);
                Err(err)
            }
        }
    }

    fn boot(&mut self, factory: &EngineFactory) -> Result<EngineSlot> {
        self.config.options.validate()?;

        self.heap.reset();
        let mut engine = factory();
        engine.reset_globals();
        engine.early_init(self.heap);
        engine.sf_init();

        self.prefixes.ensure_dirs()?;
        engine.set_file_prefixes(&self.prefixes);
        if let Some(bundle) = &self.config.bundle_dir {
            self.prefixes.copy_bundled_data(bundle)?;
        }

        engine.dlb_init()?;
        engine.scripting_init();

        self.shared = Arc::new(Shared::new(&self.config, self.callbacks.clone()));
        let windows = BridgeWindows::new(self.shared.clone(), &self.config);

        engine.apply_options(&self.config.options);
        engine.apply_symbol_overrides(&self.config.options.symbols);
        Ok(EngineSlot { engine, windows })
    }

    fn teardown(&self, mut slot: EngineSlot) {
        let engine = &mut slot.engine;
        engine.status_finish();
        if self.shared.dynamic_freed.take() {
            log::debug!("dynamic data already released by the engine");
        } else {
            engine.free_dynamic_data();
        }
        engine.scripting_shutdown();
        engine.dlb_cleanup();
    }

    pub fn full_shutdown(&mut self) {
        if !self.initialized {
            log::debug!("full_shutdown on an uninitialized bridge");
            return;
        }
        if self.worker.is_some() {
            self.request_exit();
            if let Err(err) = self.wait_for_engine(SHUTDOWN_TIMEOUT) {
                log::error!("engine thread did not stop: {}", err);
            }
        }
        match self.slot.take() {
            Some(slot) => self.teardown(slot),
            None => log::warn!("no engine to shut down"),
        }
        self.shared.input.clear();
        EARLY_INIT_DONE.store(false, Ordering::Release);
        self.initialized = false;
        log::info!("bridge shut down");
    }

    /// Drop the current session and boot a fresh engine with fresh bridge
    /// state. The host callbacks are kept.
    pub fn reset_for_new_session(&mut self) -> Result<()> {
        self.require_idle()?;
        let factory = self.factory.clone().ok_or(BridgeError::NoEngineFactory)?;
        if let Some(slot) = self.slot.take() {
            self.teardown(slot);
        }
        let slot = self.boot(&factory)?;
        self.slot = Some(slot);
        log::info!("session reset");
        Ok(())
    }

    /// Delete every save, backup and character directory.
    ///
    /// Panics if the bridge is initialized.
    pub fn wipe(&self) -> Result<()> {
        assert!(!self.initialized, "wipe called while the bridge is initialized");
        let removed = self.prefixes.wipe_saves()?;
        self.store.wipe()?;
        log::info!("wiped {} save entries", removed);
        Ok(())
    }

    // ------------------------------------------------------------------
    // sessions
    // ------------------------------------------------------------------

    fn require_idle(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(BridgeError::NotInitialized);
        }
        if self.is_running() {
            return Err(BridgeError::EngineRunning);
        }
        Ok(())
    }

    /// Start a new game on the engine thread.
    pub fn new_game(&mut self, preset: CharacterPreset) -> Result<()> {
        self.require_idle()?;
        if self.shared.flags.is_dirty() || self.slot.is_none() {
            self.reset_for_new_session()?;
        }
        let removed = self.prefixes.remove_level_files()?;
        if removed > 0 {
            log::debug!("removed {} stale level files", removed);
        }
        SessionFlags::set(&self.shared.flags.game_started, true);
        log::info!("new game for {} (role {})", preset.name, preset.role);
        self.spawn(SessionStart::New(preset))
    }

    fn spawn(&mut self, start: SessionStart) -> Result<()> {
        let slot = self.slot.take().ok_or(BridgeError::NoGame)?;
        let prefixes = self.prefixes.clone();
        let shared = self.shared.clone();
        SessionFlags::set(&shared.flags.engine_running, true);
        let spawned = thread::Builder::new()
            .name(ENGINE_THREAD_NAME.to_string())
            .spawn(move || run_engine(slot, start, &prefixes));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                SessionFlags::set(&shared.flags.engine_running, false);
                Err(err.into())
            }
        }
    }

    /// Ask the engine thread to leave its loop. Safe to call repeatedly and
    /// when nothing runs.
    pub fn request_exit(&self) {
        let flags = &self.shared.flags;
        if !flags.should_exit() {
            log::info!("exit requested");
        }
        SessionFlags::set(&flags.game_should_exit, true);
        self.shared.input.wake_all();
    }

    /// Join the engine thread, waiting at most `timeout`. Returns how the
    /// session ended, or `None` if no thread was running.
    pub fn wait_for_engine(&mut self, timeout: Duration) -> Result<Option<SessionEnd>> {
        let Some(handle) = self.worker.take() else {
            return Ok(None);
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                self.worker = Some(handle);
                return Err(BridgeError::Timeout("engine thread"));
            }
            thread::sleep(JOIN_POLL);
        }
        self.join(handle).map(Some)
    }

    fn join(&mut self, handle: JoinHandle<WorkerDone>) -> Result<SessionEnd> {
        match handle.join() {
            Ok(done) => {
                self.slot = Some(done.slot);
                self.last_end = Some(done.end.clone());
                Ok(done.end)
            }
            Err(_) => Err(BridgeError::Engine("engine thread panicked outside the guard".into())),
        }
    }

    /// Collect a worker that already stopped on its own.
    fn reap(&mut self) {
        if self.worker.as_ref().is_some_and(JoinHandle::is_finished)
            && let Some(handle) = self.worker.take()
            && let Err(err) = self.join(handle)
        {
            log::error!("{}", err);
        }
    }

    /// Save the current game. While the engine thread runs the save is
    /// performed there; otherwise it runs here on the parked engine.
    pub fn save(&mut self, target: SaveTarget) -> Result<SaveOutcome> {
        if !self.initialized {
            return Err(BridgeError::NotInitialized);
        }
        let outcome = if self.is_running() {
            let (tx, rx) = mpsc::channel();
            self.shared.set_save_reply(tx);
            self.shared.input.push_command(EngineCommand::Save);
            rx.recv_timeout(SAVE_TIMEOUT).map_err(|_| BridgeError::Timeout("save"))??
        } else {
            let slot = self.slot.as_mut().ok_or(BridgeError::NoGame)?;
            let prefixes = &self.prefixes;
            run_guarded(|| save_game(slot.engine.as_mut(), prefixes)).map_err(BridgeError::EngineExited)??
        };
        if let Some(report) = outcome.report() {
            store_save(&self.store, target, report)?;
        }
        Ok(outcome)
    }

    pub fn quicksave(&mut self) -> Result<SaveOutcome> {
        self.save(SaveTarget::Quick)
    }

    pub fn save_character(&mut self) -> Result<SaveOutcome> {
        self.save(SaveTarget::Character)
    }

    pub fn save_slot(&mut self, slot: u32) -> Result<SaveOutcome> {
        self.save(SaveTarget::Slot(slot))
    }

    pub fn save_exists(&self) -> bool {
        self.prefixes.savegame().is_file()
    }

    /// Restore `save/savegame` and resume it on the engine thread.
    pub fn restore(&mut self) -> Result<RestoreOutcome> {
        self.require_idle()?;
        if !self.save_exists() {
            log::info!("nothing to restore");
            return Ok(RestoreOutcome::NoSave);
        }
        if self.shared.flags.is_dirty() || self.slot.is_none() {
            self.reset_for_new_session()?;
        }
        let slot = self.slot.as_mut().ok_or(BridgeError::NoGame)?;
        let ctx = RestoreContext {
            heap: self.heap,
            prefixes: &self.prefixes,
            symbols: &self.config.options.symbols,
            shared: &self.shared,
        };
        let EngineSlot { engine, windows } = slot;
        let outcome =
            run_guarded(|| restore_game(engine.as_mut(), windows, &ctx)).map_err(BridgeError::EngineExited)??;
        if outcome.is_restored() {
            self.spawn(SessionStart::Resume)?;
        }
        Ok(outcome)
    }

    pub fn quickrestore(&mut self) -> Result<RestoreOutcome> {
        self.restore()
    }

    /// Copy a character's save (or one of its slots) into place and
    /// restore it.
    pub fn load_slot(&mut self, name: &str, slot: Option<u32>) -> Result<RestoreOutcome> {
        self.require_idle()?;
        let dest = self.prefixes.savegame();
        let meta = match slot {
            Some(n) => self.store.load_slot(name, n, &dest)?,
            None => self.store.load_character(name, &dest)?,
        };
        log::info!("loaded {} (turn {}) for restore", meta.character_name, meta.turns);
        self.restore()
    }

    pub fn list_characters(&self) -> Result<Vec<nh_save::CharacterSummary>> {
        Ok(self.store.list_characters()?)
    }

    pub fn delete_character(&self, name: &str) -> Result<()> {
        Ok(self.store.delete_character(name)?)
    }

    pub fn character_metadata(&self, name: &str) -> Result<SaveMetadata> {
        Ok(SaveMetadata::load(&self.store.character_dir(name))?)
    }

    pub fn save_path(&self) -> &Path {
        &self.prefixes.save
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if self.initialized {
            self.full_shutdown();
        }
    }
}

/// Body of the engine thread.
fn run_engine(mut slot: EngineSlot, start: SessionStart, prefixes: &FilePrefixes) -> WorkerDone {
    let shared = slot.windows.shared().clone();
    let EngineSlot { engine, windows } = &mut slot;
    let result = run_guarded(|| drive(engine.as_mut(), windows, start, prefixes));
    let end = match result {
        Ok(Ok(exit)) => SessionEnd::Loop(exit),
        Ok(Err(err)) => SessionEnd::Failed(err.to_string()),
        Err(reason) => SessionEnd::Exited(reason),
    };
    log::info!("engine thread finished: {}", end);
    if let Some(reply) = shared.take_save_reply() {
        deliver_save(&reply, Err(BridgeError::NoGame));
    }
    SessionFlags::set(&shared.flags.engine_running, false);
    SessionFlags::set(&shared.flags.awaiting_input, false);
    shared.emit(HostEvent::SessionEnded { reason: end.to_string() });
    WorkerDone { slot, end }
}

fn drive(
    engine: &mut dyn Engine,
    windows: &mut BridgeWindows,
    start: SessionStart,
    prefixes: &FilePrefixes,
) -> Result<LoopExit> {
    let mut resume = match start {
        SessionStart::New(preset) => {
            let setup = engine.window_setup();
            windows.init_nhwindows(&setup);
            let ids = create_fixed_windows(windows);
            engine.set_window_ids(ids);
            engine.newgame(&preset, windows)?;
            engine.set_save_filename(SAVEGAME_NAME);
            SessionFlags::set(&windows.shared().flags.character_creation_complete, true);
            false
        }
        SessionStart::Resume => true,
    };
    loop {
        match engine.moveloop(resume, windows) {
            LoopExit::SaveRequested => {
                let outcome = save_game(engine, prefixes);
                if let Err(err) = &outcome {
                    log::error!("in-game save failed: {}", err);
                }
                windows.shared().reply_save(outcome);
                resume = true;
            }
            exit => return Ok(exit),
        }
    }
}
