//! Per-session state shared between the engine thread and host threads.
//!
//! Everything the host may touch while the engine runs lives in [`Shared`]:
//! the two queues, the snapshot buffer, the caches the query bridges read,
//! and the session flags. A fresh `Shared` is built by every `full_init`
//! and `reset_for_new_session`, so no value survives into the next session
//! except the host callbacks.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::BridgeConfig;
use crate::exit::DynamicDataFreed;
use crate::host::{HostCallbacks, HostEvent};
use crate::query::QueryCache;
use crate::queue::{InputQueue, RenderConsumer, RenderElement};
use crate::save::SaveOutcome;
use crate::snapshot::SnapshotBuffer;
use crate::status::CharacterStatus;
use crate::winprocs::{DeathInfo, MapBuffer, MessageLog};
use crate::Result;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Send a save result down `reply`, logging when the host already gave up.
pub(crate) fn deliver_save(reply: &Sender<Result<SaveOutcome>>, outcome: Result<SaveOutcome>) -> bool {
    match reply.send(outcome) {
        Ok(()) => true,
        Err(mpsc::SendError(outcome)) => {
            log::warn!("save result dropped, host stopped waiting (succeeded: {})", outcome.is_ok());
            false
        }
    }
}

/// Session flags. `game_started`, `character_creation_complete`,
/// `snapshot_loaded` and `game_should_exit` change only at session
/// transitions.
#[derive(Debug, Default)]
pub struct SessionFlags {
    pub game_started: AtomicBool,
    pub character_creation_complete: AtomicBool,
    /// The session came from a restore; the loop resumes.
    pub snapshot_loaded: AtomicBool,
    pub game_should_exit: AtomicBool,
    pub player_has_died: AtomicBool,
    pub game_ready_fired: AtomicBool,
    /// The engine thread is blocked on the input queue.
    pub awaiting_input: AtomicBool,
    pub engine_running: AtomicBool,
    pub game_ready_count: AtomicU32,
}

impl SessionFlags {
    pub fn get(flag: &AtomicBool) -> bool {
        flag.load(Ordering::Acquire)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::Release);
    }

    pub fn should_exit(&self) -> bool {
        Self::get(&self.game_should_exit)
    }

    pub fn has_died(&self) -> bool {
        Self::get(&self.player_has_died)
    }

    /// A game was started or restored and has not been reset since.
    pub fn is_dirty(&self) -> bool {
        Self::get(&self.game_started) || Self::get(&self.snapshot_loaded) || self.has_died()
    }

    /// Clear the per-game flags after the engine finished a game. The death
    /// flag stays so the host can still read it.
    pub fn end_game(&self) {
        for flag in [
            &self.game_started,
            &self.character_creation_complete,
            &self.snapshot_loaded,
            &self.game_ready_fired,
            &self.awaiting_input,
        ] {
            Self::set(flag, false);
        }
    }
}

/// State shared between the engine thread and host threads.
pub struct Shared {
    pub flags: SessionFlags,
    pub input: InputQueue,
    pub snapshot: SnapshotBuffer,
    pub callbacks: Arc<HostCallbacks>,
    pub dynamic_freed: DynamicDataFreed,
    render: Mutex<Option<RenderConsumer>>,
    status: Mutex<CharacterStatus>,
    death: Mutex<DeathInfo>,
    messages: Mutex<MessageLog>,
    queries: Mutex<QueryCache>,
    map: Mutex<MapBuffer>,
    events_tx: Sender<HostEvent>,
    events_rx: Mutex<Receiver<HostEvent>>,
    save_reply: Mutex<Option<Sender<Result<SaveOutcome>>>>,
    pending_yn: AtomicU8,
}

impl Shared {
    pub fn new(config: &BridgeConfig, callbacks: Arc<HostCallbacks>) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            flags: SessionFlags::default(),
            input: InputQueue::new(config.input_capacity),
            snapshot: SnapshotBuffer::new(),
            callbacks,
            dynamic_freed: DynamicDataFreed::default(),
            render: Mutex::new(None),
            status: Mutex::new(CharacterStatus::default()),
            death: Mutex::new(DeathInfo::default()),
            messages: Mutex::new(MessageLog::default()),
            queries: Mutex::new(QueryCache::default()),
            map: Mutex::new(MapBuffer::new()),
            events_tx,
            events_rx: Mutex::new(events_rx),
            save_reply: Mutex::new(None),
            pending_yn: AtomicU8::new(0),
        }
    }

    // --- render ----------------------------------------------------------

    /// Publish the UI half of a new render ring. The old ring, if any, is
    /// dropped with its undelivered elements.
    pub fn install_consumer(&self, consumer: RenderConsumer) {
        *lock(&self.render) = Some(consumer);
    }

    pub fn dequeue_render(&self) -> Option<RenderElement> {
        lock(&self.render).as_mut().and_then(RenderConsumer::pop)
    }

    pub fn drain_render(&self) -> Vec<RenderElement> {
        lock(&self.render).as_mut().map(RenderConsumer::drain).unwrap_or_default()
    }

    pub fn render_len(&self) -> usize {
        lock(&self.render).as_ref().map_or(0, RenderConsumer::len)
    }

    pub fn render_dropped(&self) -> u64 {
        lock(&self.render).as_ref().map_or(0, RenderConsumer::dropped)
    }

    // --- events ----------------------------------------------------------

    pub fn emit(&self, event: HostEvent) {
        log::trace!("host event {:?}", event);
        if let Err(mpsc::SendError(event)) = self.events_tx.send(event) {
            log::debug!("host event {:?} dropped: event channel closed", event);
        }
    }

    /// Deliver queued events to the registered callbacks and return them.
    /// Call on the host UI thread.
    pub fn pump_events(&self) -> Vec<HostEvent> {
        let events: Vec<HostEvent> = lock(&self.events_rx).try_iter().collect();
        for event in &events {
            self.callbacks.dispatch(event);
        }
        events
    }

    /// Emit game-ready unless this session already did. Returns whether it
    /// fired now.
    pub fn fire_game_ready(&self) -> bool {
        if self.flags.game_ready_fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.flags.game_ready_count.fetch_add(1, Ordering::AcqRel);
        log::info!("game ready");
        self.emit(HostEvent::GameReady);
        true
    }

    pub fn game_ready_count(&self) -> u32 {
        self.flags.game_ready_count.load(Ordering::Acquire)
    }

    // --- caches ----------------------------------------------------------

    pub fn status(&self) -> MutexGuard<'_, CharacterStatus> {
        lock(&self.status)
    }

    pub fn death(&self) -> MutexGuard<'_, DeathInfo> {
        lock(&self.death)
    }

    pub fn messages(&self) -> MutexGuard<'_, MessageLog> {
        lock(&self.messages)
    }

    pub fn queries(&self) -> MutexGuard<'_, QueryCache> {
        lock(&self.queries)
    }

    /// The last captured copy of the map window.
    pub fn map(&self) -> MutexGuard<'_, MapBuffer> {
        lock(&self.map)
    }

    pub fn capture_map(&self, map: &MapBuffer) {
        lock(&self.map).clone_from(map);
    }

    // --- one-shot answers ------------------------------------------------

    /// Answer the next yes/no prompt with `answer`, ahead of everything
    /// else.
    pub fn set_pending_yn(&self, answer: u8) {
        self.pending_yn.store(answer, Ordering::Release);
    }

    pub fn take_pending_yn(&self) -> Option<u8> {
        Some(self.pending_yn.swap(0, Ordering::AcqRel)).filter(|&c| c != 0)
    }

    // --- save handshake --------------------------------------------------

    pub fn set_save_reply(&self, reply: Sender<Result<SaveOutcome>>) {
        *lock(&self.save_reply) = Some(reply);
    }

    pub fn take_save_reply(&self) -> Option<Sender<Result<SaveOutcome>>> {
        lock(&self.save_reply).take()
    }

    /// Hand a save result to the host waiting on it. Returns `false` when
    /// nobody was waiting or the host gave up before the save finished.
    pub fn reply_save(&self, outcome: Result<SaveOutcome>) -> bool {
        match self.take_save_reply() {
            Some(reply) => deliver_save(&reply, outcome),
            None => {
                log::debug!("save finished without a waiting host");
                false
            }
        }
    }
}
