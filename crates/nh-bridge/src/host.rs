//! Host-facing callbacks and notifications.
//!
//! Notifications (map update, game ready, death animation, pickers) are
//! queued as [`HostEvent`]s and delivered on the host UI thread by
//! `Lifecycle::pump_events`. Menu and yes/no callbacks are synchronous:
//! the engine thread blocks inside them until the host answers.

use std::sync::{Arc, Mutex, PoisonError};

use strum::Display;

use crate::winprocs::{MenuItem, PickHow, WinId};

/// Kind of free-text prompt the host should surface a text sheet for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TextInputKind {
    Genocide,
    Polymorph,
    Name,
    Wish,
    Annotation,
}

/// Picker the host should surface for a yes/no-style prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PickerKind {
    Hand,
    Loot,
}

/// Notification queued for the host UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    MapUpdated,
    GameReady,
    DeathAnimation,
    TurnComplete { moves: i64 },
    TextInputRequested { kind: TextInputKind, prompt: String },
    PickerRequested(PickerKind),
    SessionEnded { reason: String },
}

/// What the engine is asking the host menu callback.
#[derive(Debug)]
pub struct MenuRequest<'a> {
    pub how: PickHow,
    pub items: &'a [MenuItem],
    pub prompt: Option<&'a str>,
    pub window: WinId,
}

/// Answer from the host menu callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuResponse {
    /// The callback failed; the bridge falls back to the input queue.
    Error,
    Cancelled,
    /// `(item_index, count)` pairs; a count of -1 means "all".
    Selected(Vec<(usize, i64)>),
}

type NotifyFn = Arc<dyn Fn() + Send + Sync>;
type MenuFn = Arc<dyn Fn(&MenuRequest<'_>) -> MenuResponse + Send + Sync>;
type YnFn = Arc<dyn Fn(&str, &str, u8) -> u8 + Send + Sync>;

/// Callbacks registered by the host. They outlive sessions: a new game
/// keeps whatever the host registered at startup.
#[derive(Default)]
pub struct HostCallbacks {
    map_update: Mutex<Option<NotifyFn>>,
    game_ready: Mutex<Option<NotifyFn>>,
    death_animation: Mutex<Option<NotifyFn>>,
    menu: Mutex<Option<MenuFn>>,
    yn: Mutex<Option<YnFn>>,
}

fn get<T: Clone>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn set<T>(slot: &Mutex<Option<T>>, value: Option<T>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

impl HostCallbacks {
    pub fn set_map_update(&self, f: impl Fn() + Send + Sync + 'static) {
        set(&self.map_update, Some(Arc::new(f)));
    }

    pub fn set_game_ready(&self, f: impl Fn() + Send + Sync + 'static) {
        set(&self.game_ready, Some(Arc::new(f)));
    }

    pub fn set_death_animation(&self, f: impl Fn() + Send + Sync + 'static) {
        set(&self.death_animation, Some(Arc::new(f)));
    }

    pub fn set_menu(&self, f: impl Fn(&MenuRequest<'_>) -> MenuResponse + Send + Sync + 'static) {
        set(&self.menu, Some(Arc::new(f)));
    }

    pub fn set_yn(&self, f: impl Fn(&str, &str, u8) -> u8 + Send + Sync + 'static) {
        set(&self.yn, Some(Arc::new(f)));
    }

    pub fn clear_menu(&self) {
        set(&self.menu, None);
    }

    pub fn clear_yn(&self) {
        set(&self.yn, None);
    }

    pub fn clear(&self) {
        set(&self.map_update, None);
        set(&self.game_ready, None);
        set(&self.death_animation, None);
        set(&self.menu, None);
        set(&self.yn, None);
    }

    pub fn has_menu(&self) -> bool {
        get(&self.menu).is_some()
    }

    /// Ask the host menu callback. `None` when none is registered.
    pub fn call_menu(&self, request: &MenuRequest<'_>) -> Option<MenuResponse> {
        get(&self.menu).map(|f| f(request))
    }

    /// Ask the host yes/no callback. `None` when none is registered or it
    /// returned 0.
    pub fn call_yn(&self, query: &str, resp: &str, default: u8) -> Option<u8> {
        get(&self.yn).map(|f| f(query, resp, default)).filter(|&c| c != 0)
    }

    /// Run the notification callback matching `event`, if any.
    pub fn dispatch(&self, event: &HostEvent) {
        let callback = match event {
            HostEvent::MapUpdated => get(&self.map_update),
            HostEvent::GameReady => get(&self.game_ready),
            HostEvent::DeathAnimation => get(&self.death_animation),
            _ => None,
        };
        if let Some(f) = callback {
            f();
        }
    }
}
