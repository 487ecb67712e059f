//! C entry points for the host application.
//!
//! One bridge per process lives behind these functions. The embedder
//! installs the engine from Rust with [`install_engine_factory`] before the
//! host calls `nhb_full_init`.
//!
//! Conventions:
//! - `c_int` results: `1`/`0` for yes/no, `0` success and `-1` failure for
//!   commands, counts where documented.
//! - Strings handed to the host are heap-allocated and must be released
//!   with `nhb_free_string`. A null pointer means "no value".
//! - Snapshot reads, render dequeues and input enqueues go through the
//!   session handle and never wait for the lifecycle lock.

use std::ffi::{CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};
use std::time::Duration;

use libc::{c_char, c_int, c_uint};

use crate::config::{BridgeConfig, GameOptions};
use crate::engine::{CharacterPreset, EngineFactory};
use crate::host::{HostCallbacks, MenuRequest, MenuResponse};
use crate::lifecycle::Lifecycle;
use crate::queue::{RenderElement, StatusLine};
use crate::restore::RestoreOutcome;
use crate::save::SaveOutcome;
use crate::session::{SessionFlags, Shared, lock};
use crate::snapshot::GameSnapshot;
use crate::winprocs::{ESC, PickHow};
use crate::{BridgeError, Result};

static BRIDGE: Mutex<Option<Lifecycle>> = Mutex::new(None);
static SESSION: RwLock<Option<Arc<Shared>>> = RwLock::new(None);
static FACTORY: Mutex<Option<EngineFactory>> = Mutex::new(None);
static CALLBACKS: LazyLock<Arc<HostCallbacks>> = LazyLock::new(|| Arc::new(HostCallbacks::default()));
static PENDING_OPTIONS: LazyLock<Mutex<GameOptions>> = LazyLock::new(|| Mutex::new(GameOptions::default()));

/// Engine the next `nhb_full_init` boots.
pub fn install_engine_factory(factory: EngineFactory) {
    *lock(&FACTORY) = Some(factory);
}

// ============================================================================
// Helpers
// ============================================================================

fn session() -> Option<Arc<Shared>> {
    SESSION.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn publish_session(bridge: &Lifecycle) {
    *SESSION.write().unwrap_or_else(PoisonError::into_inner) = Some(bridge.shared());
}

/// Run `f` on the bridge, logging failures. `None` when there is no bridge.
fn with_bridge<T>(what: &str, f: impl FnOnce(&mut Lifecycle) -> Result<T>) -> Option<T> {
    let mut guard = lock(&BRIDGE);
    let bridge = guard.as_mut()?;
    let result = f(bridge);
    publish_session(bridge);
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::error!("{} failed: {}", what, err);
            None
        }
    }
}

/// # Safety
/// `p` is null or a NUL-terminated string valid for the call.
unsafe fn str_arg<'a>(p: *const c_char) -> Option<&'a str> {
    if p.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(p) }.to_str().ok()
}

fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let mut s = s.into();
    s.retain(|c| c != '\0');
    CString::new(s).map_or(ptr::null_mut(), CString::into_raw)
}

fn json_or_null(json: Result<String>) -> *mut c_char {
    match json {
        Ok(json) => to_c_string(json),
        Err(err) => {
            log::warn!("JSON export failed: {}", err);
            ptr::null_mut()
        }
    }
}

fn flag(b: bool) -> c_int {
    c_int::from(b)
}

fn status<T>(f: impl FnOnce(&crate::status::CharacterStatus) -> T) -> Option<T> {
    session().map(|s| f(&s.status()))
}

fn death<T>(f: impl FnOnce(&crate::winprocs::DeathInfo) -> T) -> Option<T> {
    session().map(|s| f(&s.death()))
}

/// # Safety
/// `p` is null or a pointer previously returned by this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_free_string(p: *mut c_char) {
    if !p.is_null() {
        drop(unsafe { CString::from_raw(p) });
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Boot the bridge with its documents root and optional bundled data
/// directory. Calling it twice without `nhb_full_shutdown` aborts.
///
/// # Safety
/// Both arguments are null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_full_init(docs_root: *const c_char, bundle_dir: *const c_char) -> c_int {
    let Some(docs) = (unsafe { str_arg(docs_root) }) else {
        log::error!("nhb_full_init without a documents root");
        return -1;
    };
    let Some(factory) = lock(&FACTORY).clone() else {
        log::error!("nhb_full_init before an engine factory was installed");
        return -1;
    };
    let mut guard = lock(&BRIDGE);
    if guard.as_ref().is_some_and(Lifecycle::is_initialized) {
        panic!("nhb_full_init called twice without nhb_full_shutdown");
    }
    let mut config = BridgeConfig::new(docs);
    config.bundle_dir = unsafe { str_arg(bundle_dir) }.map(PathBuf::from);
    config.options = lock(&*PENDING_OPTIONS).clone();

    let mut bridge = Lifecycle::new(config)
        .with_callbacks(Arc::clone(&*CALLBACKS))
        .with_engine_factory(factory);
    let result = bridge.full_init();
    publish_session(&bridge);
    *guard = Some(bridge);
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("nhb_full_init failed: {}", err);
            -1
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_full_shutdown() {
    let mut guard = lock(&BRIDGE);
    if let Some(bridge) = guard.as_mut() {
        bridge.full_shutdown();
    }
    *guard = None;
    *SESSION.write().unwrap_or_else(PoisonError::into_inner) = None;
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_is_initialized() -> c_int {
    flag(lock(&BRIDGE).as_ref().is_some_and(Lifecycle::is_initialized))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_reset_for_new_session() -> c_int {
    with_bridge("reset_for_new_session", Lifecycle::reset_for_new_session).map_or(-1, |()| 0)
}

/// Delete every save. Aborts if the bridge is initialized.
///
/// # Safety
/// `docs_root` is a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_wipe_saves(docs_root: *const c_char) -> c_int {
    let Some(docs) = (unsafe { str_arg(docs_root) }) else {
        return -1;
    };
    if lock(&BRIDGE).as_ref().is_some_and(Lifecycle::is_initialized) {
        panic!("nhb_wipe_saves called while the bridge is initialized");
    }
    match Lifecycle::new(BridgeConfig::new(docs)).wipe() {
        Ok(()) => 0,
        Err(err) => {
            log::error!("wipe failed: {}", err);
            -1
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// # Safety
/// `name` is null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_new_game(
    name: *const c_char,
    role: c_int,
    race: c_int,
    gender: c_int,
    alignment: c_int,
) -> c_int {
    let preset = CharacterPreset {
        name: unsafe { str_arg(name) }.unwrap_or("Hero").to_string(),
        role,
        race,
        gender,
        alignment,
    };
    with_bridge("new_game", |b| b.new_game(preset)).map_or(-1, |()| 0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_request_exit() {
    if let Some(bridge) = lock(&BRIDGE).as_ref() {
        bridge.request_exit();
    } else if let Some(shared) = session() {
        SessionFlags::set(&shared.flags.game_should_exit, true);
        shared.input.wake_all();
    }
}

/// Join the engine thread. Returns 1 if it stopped, 0 if nothing ran and
/// -1 on timeout.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_wait_for_engine(timeout_ms: c_uint) -> c_int {
    let timeout = Duration::from_millis(u64::from(timeout_ms));
    match with_bridge("wait_for_engine", |b| b.wait_for_engine(timeout)) {
        Some(Some(_)) => 1,
        Some(None) => 0,
        None => -1,
    }
}

fn save_result(outcome: Option<SaveOutcome>) -> c_int {
    match outcome {
        Some(SaveOutcome::Saved(_)) => 1,
        Some(SaveOutcome::Skipped(_)) => 0,
        None => -1,
    }
}

fn restore_result(outcome: Option<RestoreOutcome>) -> c_int {
    match outcome {
        Some(RestoreOutcome::Restored(_)) => 1,
        Some(RestoreOutcome::NoSave) => 0,
        None => -1,
    }
}

/// 1 saved, 0 skipped, -1 error.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_quicksave() -> c_int {
    save_result(with_bridge("quicksave", Lifecycle::quicksave))
}

/// 1 restored, 0 no save, -1 error.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_quickrestore() -> c_int {
    restore_result(with_bridge("quickrestore", Lifecycle::quickrestore))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_save_exists() -> c_int {
    flag(lock(&BRIDGE).as_ref().is_some_and(Lifecycle::save_exists))
}

/// Save into the current character's directory (`slot == 0`) or one of its
/// numbered slots.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_save_slot(slot: c_uint) -> c_int {
    save_result(with_bridge("save_slot", |b| match slot {
        0 => b.save_character(),
        n => b.save_slot(n),
    }))
}

/// # Safety
/// `name` is a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_load_slot(name: *const c_char, slot: c_uint) -> c_int {
    let Some(name) = (unsafe { str_arg(name) }) else {
        return -1;
    };
    let slot = (slot != 0).then_some(slot);
    restore_result(with_bridge("load_slot", |b| b.load_slot(name, slot)))
}

/// Deliver queued notifications to the registered callbacks. Call on the
/// UI thread. Returns how many were delivered.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_pump_events() -> c_int {
    session().map_or(0, |s| s.pump_events().len() as c_int)
}

// ============================================================================
// Input
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn nhb_queue_input(byte: c_int) -> c_int {
    let Some(shared) = session() else {
        return -1;
    };
    match u8::try_from(byte) {
        Ok(b) => flag(shared.input.push(b)),
        Err(_) => {
            log::warn!("input byte {} out of range", byte);
            -1
        }
    }
}

/// Returns how many bytes were queued.
///
/// # Safety
/// `s` is null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_queue_string(s: *const c_char) -> c_int {
    let (Some(shared), Some(text)) = (session(), unsafe { str_arg(s) }) else {
        return 0;
    };
    shared.input.push_str(text) as c_int
}

/// Drop queued input and send ESC to whatever prompt is waiting.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_cancel_input() {
    if let Some(shared) = session() {
        shared.input.clear();
        shared.input.push(ESC);
    }
}

/// Best-effort: the answer may be stale by the time the caller sees it.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_has_pending_input() -> c_int {
    flag(session().is_some_and(|s| s.input.has_pending()))
}

// ============================================================================
// Snapshot
// ============================================================================

/// Copy the latest snapshot into `out`. Returns 0, or -1 without a session.
///
/// # Safety
/// `out` points to writable memory for one `GameSnapshot`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_get_snapshot(out: *mut GameSnapshot) -> c_int {
    if out.is_null() {
        return -1;
    }
    let Some(shared) = session() else {
        return -1;
    };
    unsafe { out.write(shared.snapshot.read()) };
    0
}

// ============================================================================
// Render queue
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NhbRenderKind {
    MapTile = 0,
    Message = 1,
    Status = 2,
    Clear = 3,
    FlushMap = 4,
    TurnComplete = 5,
}

/// A render element in C layout. Only the fields of its kind are set.
#[repr(C)]
#[derive(Debug)]
pub struct NhbRenderElement {
    pub kind: NhbRenderKind,
    pub x: c_int,
    pub y: c_int,
    pub glyph: c_int,
    /// Unicode scalar of the displayed character.
    pub ch: u32,
    pub color: u8,
    pub glyph_flags: u16,
    pub attr: c_int,
    pub moves: i64,
    /// Owned; released by `nhb_free_render_element`.
    pub text: *mut c_char,
    /// Owned; released by `nhb_free_render_element`.
    pub category: *mut c_char,
    pub status: StatusLine,
}

impl NhbRenderElement {
    fn empty(kind: NhbRenderKind) -> Self {
        Self {
            kind,
            x: 0,
            y: 0,
            glyph: -1,
            ch: 0,
            color: 0,
            glyph_flags: 0,
            attr: 0,
            moves: 0,
            text: ptr::null_mut(),
            category: ptr::null_mut(),
            status: StatusLine::default(),
        }
    }
}

impl From<RenderElement> for NhbRenderElement {
    fn from(element: RenderElement) -> Self {
        match element {
            RenderElement::MapTile(tile) => Self {
                x: tile.x,
                y: tile.y,
                glyph: tile.glyph,
                ch: u32::from(tile.ch),
                color: tile.color,
                glyph_flags: tile.flags.bits(),
                ..Self::empty(NhbRenderKind::MapTile)
            },
            RenderElement::Message { category, text, attr } => Self {
                attr,
                text: to_c_string(text),
                category: to_c_string(category),
                ..Self::empty(NhbRenderKind::Message)
            },
            RenderElement::Status(status) => Self {
                status,
                ..Self::empty(NhbRenderKind::Status)
            },
            RenderElement::Clear => Self::empty(NhbRenderKind::Clear),
            RenderElement::FlushMap => Self::empty(NhbRenderKind::FlushMap),
            RenderElement::TurnComplete { moves } => Self {
                moves,
                ..Self::empty(NhbRenderKind::TurnComplete)
            },
        }
    }
}

/// Pop one element into `out`. Returns 1 if an element was written.
///
/// # Safety
/// `out` points to writable memory for one `NhbRenderElement`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_dequeue_render(out: *mut NhbRenderElement) -> c_int {
    if out.is_null() {
        return 0;
    }
    match session().and_then(|s| s.dequeue_render()) {
        Some(element) => {
            unsafe { out.write(NhbRenderElement::from(element)) };
            1
        }
        None => 0,
    }
}

/// Release the strings of an element filled by `nhb_dequeue_render`.
///
/// # Safety
/// `element` is null or was filled by `nhb_dequeue_render` and not yet
/// freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_free_render_element(element: *mut NhbRenderElement) {
    let Some(element) = (unsafe { element.as_mut() }) else {
        return;
    };
    for p in [&mut element.text, &mut element.category] {
        unsafe { nhb_free_string(*p) };
        *p = ptr::null_mut();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_render_dropped() -> u64 {
    session().map_or(0, |s| s.render_dropped())
}

// ============================================================================
// Character status
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_json() -> *mut c_char {
    status(|s| s.to_json()).map_or(ptr::null_mut(), json_or_null)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_hp() -> c_int {
    status(|s| s.hp).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_hp_max() -> c_int {
    status(|s| s.hp_max).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_pw() -> c_int {
    status(|s| s.pw).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_pw_max() -> c_int {
    status(|s| s.pw_max).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_level() -> c_int {
    status(|s| s.level).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_ac() -> c_int {
    status(|s| s.ac).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_gold() -> i64 {
    status(|s| s.gold).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_turns() -> i64 {
    status(|s| s.turns).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_dungeon_level() -> c_int {
    status(|s| s.dungeon_level).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_name() -> *mut c_char {
    status(|s| to_c_string(s.name.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_role() -> *mut c_char {
    status(|s| to_c_string(s.role.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_status_hunger() -> *mut c_char {
    status(|s| to_c_string(s.hunger.as_str())).unwrap_or(ptr::null_mut())
}

// ============================================================================
// Death info
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn nhb_player_has_died() -> c_int {
    flag(session().is_some_and(|s| s.flags.has_died()))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_possessions() -> *mut c_char {
    death(|d| to_c_string(d.possessions.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_attributes() -> *mut c_char {
    death(|d| to_c_string(d.attributes.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_conduct() -> *mut c_char {
    death(|d| to_c_string(d.conduct.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_overview() -> *mut c_char {
    death(|d| to_c_string(d.overview.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_message() -> *mut c_char {
    death(|d| to_c_string(d.death_message.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_role() -> *mut c_char {
    death(|d| to_c_string(d.role.as_str())).unwrap_or(ptr::null_mut())
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_final_hp() -> c_int {
    death(|d| d.final_hp).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_final_gold() -> i64 {
    death(|d| d.final_gold).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_final_turns() -> i64 {
    death(|d| d.final_turns).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_final_score() -> i64 {
    death(|d| d.final_score).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_death_info_json() -> *mut c_char {
    death(|d| serde_json::to_string(d).map_err(BridgeError::from)).map_or(ptr::null_mut(), json_or_null)
}

// ============================================================================
// Messages
// ============================================================================

/// Take the linear output buffer, leaving it empty.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_take_output() -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| to_c_string(s.messages().take_output()))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_message_history_json() -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| {
        let messages = s.messages();
        let history: Vec<_> = messages.history().collect();
        json_or_null(serde_json::to_string(&history).map_err(BridgeError::from))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_clear_messages() {
    if let Some(s) = session() {
        s.messages().clear();
    }
}

// ============================================================================
// Query bridges
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn nhb_objects_at_json(x: c_int, y: c_int) -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| json_or_null(s.queries().objects_at_json(x, y)))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_containers_at_json(x: c_int, y: c_int) -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| json_or_null(s.queries().containers_at_json(x, y)))
}

/// Terrain kind code at `(x, y)`, or -1 when unknown or out of range.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_terrain_at(x: c_int, y: c_int) -> c_int {
    session()
        .and_then(|s| s.queries().terrain_at(x, y))
        .map_or(-1, |t| t.kind as c_int)
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_terrain_at_json(x: c_int, y: c_int) -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| json_or_null(s.queries().terrain_at_json(x, y)))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_discovered_monsters_json() -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| json_or_null(s.queries().discovered_monsters_json()))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_dungeon_overview_json() -> *mut c_char {
    session().map_or(ptr::null_mut(), |s| json_or_null(s.queries().dungeon_overview_json()))
}

// ============================================================================
// Characters
// ============================================================================

#[unsafe(no_mangle)]
pub extern "C" fn nhb_list_characters_json() -> *mut c_char {
    with_bridge("list_characters", |b| {
        let summaries = b.list_characters()?;
        Ok(serde_json::to_string(&summaries)?)
    })
    .map_or(ptr::null_mut(), to_c_string)
}

/// # Safety
/// `name` is a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_delete_character(name: *const c_char) -> c_int {
    let Some(name) = (unsafe { str_arg(name) }) else {
        return -1;
    };
    with_bridge("delete_character", |b| b.delete_character(name)).map_or(-1, |()| 0)
}

/// # Safety
/// `name` is a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_list_slots_json(name: *const c_char) -> *mut c_char {
    let Some(name) = (unsafe { str_arg(name) }) else {
        return ptr::null_mut();
    };
    with_bridge("list_slots", |b| {
        let slots = b.store().list_slots(name)?;
        Ok(serde_json::to_string(&slots)?)
    })
    .map_or(ptr::null_mut(), to_c_string)
}

/// # Safety
/// `name` is a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_delete_slot(name: *const c_char, slot: c_uint) -> c_int {
    let Some(name) = (unsafe { str_arg(name) }) else {
        return -1;
    };
    with_bridge("delete_slot", |b| Ok(b.store().delete_slot(name, slot)?)).map_or(-1, |()| 0)
}

// ============================================================================
// Configuration
// ============================================================================

/// Apply `options` to the pending options and, if a bridge exists, to its
/// configuration. Takes effect at the next init or session.
fn update_options(f: impl Fn(&mut GameOptions) -> Result<()>) -> c_int {
    let pending = f(&mut *lock(&*PENDING_OPTIONS));
    if let Err(err) = pending {
        log::warn!("option rejected: {}", err);
        return -1;
    }
    if let Some(bridge) = lock(&BRIDGE).as_mut()
        && let Err(err) = f(&mut bridge.config_mut().options)
    {
        log::warn!("option rejected by the running bridge: {}", err);
        return -1;
    }
    0
}

/// Set an option by name; `value` null means "enable" for booleans.
///
/// # Safety
/// Both arguments are null or NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nhb_set_option(name: *const c_char, value: *const c_char) -> c_int {
    let Some(name) = (unsafe { str_arg(name) }) else {
        return -1;
    };
    let value = unsafe { str_arg(value) };
    update_options(|o| o.set_option(name, value))
}

/// Display the boulder with `ch` (a Unicode scalar); 0 restores the default.
#[unsafe(no_mangle)]
pub extern "C" fn nhb_set_boulder_symbol(ch: u32) -> c_int {
    let symbol = match ch {
        0 => None,
        c => match char::from_u32(c) {
            Some(c) => Some(c),
            None => return -1,
        },
    };
    update_options(|o| {
        o.symbols.boulder = symbol;
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_set_map_size(width: c_uint, height: c_uint) -> c_int {
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return -1;
    };
    update_options(|o| o.set_map_size(w, h))
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_set_wizard_mode(on: c_int) -> c_int {
    update_options(|o| {
        o.debug = on != 0;
        Ok(())
    })
}

// ============================================================================
// Callback registration
// ============================================================================

pub type NhbNotifyFn = extern "C" fn();

/// One menu line as the host sees it.
#[repr(C)]
pub struct NhbMenuItem {
    pub selector: c_char,
    pub identifier: i64,
    pub glyph: c_int,
    pub text: *const c_char,
    pub attr: c_int,
    pub selectable: c_int,
}

/// Menu handed to the host menu callback. Valid for the duration of the
/// call only.
#[repr(C)]
pub struct NhbMenuContext {
    /// 0 none, 1 one, 2 any.
    pub how: c_int,
    pub items: *const NhbMenuItem,
    pub count: c_int,
    pub prompt: *const c_char,
    pub window: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct NhbMenuSelection {
    pub item_index: c_int,
    pub count: i64,
}

/// Writes up to `capacity` selections into `out` and returns how many;
/// 0 cancels and a negative value reports an error.
pub type NhbMenuFn = extern "C" fn(ctx: *const NhbMenuContext, out: *mut NhbMenuSelection, capacity: c_int) -> c_int;

/// Returns the chosen byte, or 0 to let the bridge answer.
pub type NhbYnFn = extern "C" fn(query: *const c_char, resp: *const c_char, default: c_char) -> c_char;

#[unsafe(no_mangle)]
pub extern "C" fn nhb_register_map_update(cb: Option<NhbNotifyFn>) {
    match cb {
        Some(cb) => CALLBACKS.set_map_update(move || cb()),
        None => CALLBACKS.set_map_update(|| {}),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_register_game_ready(cb: Option<NhbNotifyFn>) {
    match cb {
        Some(cb) => CALLBACKS.set_game_ready(move || cb()),
        None => CALLBACKS.set_game_ready(|| {}),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_register_death_animation(cb: Option<NhbNotifyFn>) {
    match cb {
        Some(cb) => CALLBACKS.set_death_animation(move || cb()),
        None => CALLBACKS.set_death_animation(|| {}),
    }
}

fn call_host_menu(cb: NhbMenuFn, request: &MenuRequest<'_>) -> MenuResponse {
    let texts: Vec<CString> = request
        .items
        .iter()
        .map(|item| CString::new(item.text.replace('\0', "")).unwrap_or_default())
        .collect();
    let items: Vec<NhbMenuItem> = request
        .items
        .iter()
        .zip(&texts)
        .map(|(item, text)| NhbMenuItem {
            selector: item.selector as c_char,
            identifier: item.identifier,
            glyph: item.glyph,
            text: text.as_ptr(),
            attr: item.attr,
            selectable: flag(item.is_selectable()),
        })
        .collect();
    let prompt = request.prompt.map(|p| CString::new(p.replace('\0', "")).unwrap_or_default());
    let ctx = NhbMenuContext {
        how: match request.how {
            PickHow::None => 0,
            PickHow::One => 1,
            PickHow::Any => 2,
        },
        items: items.as_ptr(),
        count: items.len() as c_int,
        prompt: prompt.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
        window: request.window,
    };
    let mut out = vec![NhbMenuSelection::default(); items.len().max(1)];
    let n = cb(&ctx, out.as_mut_ptr(), out.len() as c_int);
    match n {
        n if n < 0 => MenuResponse::Error,
        0 => MenuResponse::Cancelled,
        n => MenuResponse::Selected(
            out.iter()
                .take(n as usize)
                .filter_map(|sel| usize::try_from(sel.item_index).ok().map(|i| (i, sel.count)))
                .collect(),
        ),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_register_menu_callback(cb: Option<NhbMenuFn>) {
    match cb {
        Some(cb) => CALLBACKS.set_menu(move |request| call_host_menu(cb, request)),
        None => CALLBACKS.clear_menu(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn nhb_register_yn_callback(cb: Option<NhbYnFn>) {
    let Some(cb) = cb else {
        CALLBACKS.clear_yn();
        return;
    };
    CALLBACKS.set_yn(move |query, resp, default| {
        let query = CString::new(query.replace('\0', "")).unwrap_or_default();
        let resp = CString::new(resp.replace('\0', "")).unwrap_or_default();
        cb(query.as_ptr(), resp.as_ptr(), default as c_char) as u8
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MapTile;
    use crate::winprocs::GlyphFlags;

    #[test]
    fn test_message_element_strings_are_freed() {
        let mut el = NhbRenderElement::from(RenderElement::Message {
            category: "combat".into(),
            text: "You hit the jackal!".into(),
            attr: 0,
        });
        assert_eq!(el.kind, NhbRenderKind::Message);
        let text = unsafe { CStr::from_ptr(el.text) }.to_str().unwrap();
        assert_eq!(text, "You hit the jackal!");
        unsafe { nhb_free_render_element(&mut el) };
        assert!(el.text.is_null());
        assert!(el.category.is_null());
    }

    #[test]
    fn test_map_tile_element() {
        let el = NhbRenderElement::from(RenderElement::MapTile(MapTile {
            x: 3,
            y: 4,
            glyph: 42,
            ch: '@',
            color: 7,
            flags: GlyphFlags::HERO,
        }));
        assert_eq!((el.x, el.y, el.glyph), (3, 4, 42));
        assert_eq!(el.ch, u32::from('@'));
        assert_eq!(el.glyph_flags, GlyphFlags::HERO.bits());
        assert!(el.text.is_null());
    }

    #[test]
    fn test_c_strings_drop_interior_nul() {
        let p = to_c_string("a\0b");
        let s = unsafe { CStr::from_ptr(p) }.to_str().unwrap().to_string();
        unsafe { nhb_free_string(p) };
        assert_eq!(s, "ab");
        assert!(unsafe { str_arg(ptr::null()) }.is_none());
    }

    extern "C" fn pick_second(ctx: *const NhbMenuContext, out: *mut NhbMenuSelection, capacity: c_int) -> c_int {
        let ctx = unsafe { &*ctx };
        assert!(ctx.count >= 2 && capacity >= 1);
        unsafe {
            out.write(NhbMenuSelection {
                item_index: 1,
                count: -1,
            })
        };
        1
    }

    #[test]
    fn test_host_menu_translation() {
        use crate::winprocs::{MenuItem, MenuItemFlags};
        let items = vec![
            MenuItem {
                selector: b'a',
                identifier: 1,
                glyph: 0,
                text: "a dagger".into(),
                attr: 0,
                flags: MenuItemFlags::empty(),
            },
            MenuItem {
                selector: b'b',
                identifier: 2,
                glyph: 0,
                text: "a sling".into(),
                attr: 0,
                flags: MenuItemFlags::empty(),
            },
        ];
        let request = MenuRequest {
            how: PickHow::One,
            items: &items,
            prompt: Some("Wield what?"),
            window: 4,
        };
        assert_eq!(call_host_menu(pick_second, &request), MenuResponse::Selected(vec![(1, -1)]));
    }
}
