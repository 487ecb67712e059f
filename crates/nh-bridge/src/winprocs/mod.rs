//! Window procedures: the callback table the engine drives its display
//! through.
//!
//! [`WindowProcs`] is the contract; [`BridgeWindows`] is the only
//! implementation and turns every call into render-queue traffic, cached
//! state for the host, or a blocking read from the input queue.

mod bridge;
pub mod death;
pub mod extcmd;
pub mod glyph;
pub mod map;
pub mod menu;
pub mod messages;
pub mod pacing;
pub mod prompt;

use bitflags::bitflags;
use strum::{Display, EnumString};

use crate::engine::GameView;
use crate::queue::EngineCommand;
use crate::status::StatusField;

pub use bridge::{BridgeWindows, MESSAGE_OFFSET, SAVE_EXIT_SENTINEL};
pub use death::{DeathInfo, DeathStage};
pub use map::{MapBuffer, MapCell};
pub use messages::{MessageCategory, MessageEntry, MessageLog};

/// Window identifier handed to the engine.
pub type WinId = i32;

pub const WIN_ERR: WinId = -1;
pub const WIN_MESSAGE: WinId = 1;
pub const WIN_MAP: WinId = 2;
pub const WIN_STATUS: WinId = 3;
pub const WIN_MENU: WinId = 4;

pub const ESC: u8 = 0x1b;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WindowKind {
    Message,
    Status,
    Map,
    Menu,
    Text,
}

/// The four fixed windows, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowIds {
    pub message: WinId,
    pub status: WinId,
    pub map: WinId,
    pub menu: WinId,
}

impl Default for WindowIds {
    fn default() -> Self {
        Self {
            message: WIN_MESSAGE,
            status: WIN_STATUS,
            map: WIN_MAP,
            menu: WIN_MENU,
        }
    }
}

/// What the engine hands `init_nhwindows`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSetup {
    pub banner: Vec<String>,
    /// Display character per glyph id, used to decode inline glyph escapes.
    pub glyph_chars: Vec<char>,
}

bitflags! {
    /// Glyph rendering hints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GlyphFlags: u16 {
        const PET = 0x0001;
        const DETECTED = 0x0002;
        const INVISIBLE = 0x0004;
        const RIDDEN = 0x0008;
        const PILE = 0x0010;
        const REMEMBERED = 0x0020;
        const HERO = 0x0040;
    }
}

/// The engine's translation of a glyph (its `map_glyphinfo` result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphInfo {
    pub glyph: i32,
    pub ch: char,
    pub color: u8,
    pub flags: GlyphFlags,
}

impl GlyphInfo {
    pub const BLANK: GlyphInfo = GlyphInfo {
        glyph: -1,
        ch: ' ',
        color: 0,
        flags: GlyphFlags::empty(),
    };
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MenuItemFlags: u32 {
        const PRESELECTED = 0x01;
        const SKIP_INVERT = 0x02;
    }
}

/// One accumulated menu line. `selector == 0` marks a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub selector: u8,
    pub identifier: i64,
    pub glyph: i32,
    pub text: String,
    pub attr: i32,
    pub flags: MenuItemFlags,
}

impl MenuItem {
    pub fn is_selectable(&self) -> bool {
        self.selector != 0 && self.identifier != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PickHow {
    None,
    One,
    Any,
}

/// One selected menu entry, owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuPick {
    pub identifier: i64,
    /// -1 means "all".
    pub count: i64,
}

/// Entry of the engine's extended-command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtCmd {
    pub name: String,
    pub description: String,
}

impl ExtCmd {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Procedures the engine calls to talk to its display.
///
/// All calls happen on the engine thread. Strings passed in are borrowed for
/// the duration of the call only.
pub trait WindowProcs {
    fn init_nhwindows(&mut self, setup: &WindowSetup);
    fn create_nhwindow(&mut self, kind: WindowKind) -> WinId;
    fn clear_nhwindow(&mut self, win: WinId);
    fn display_nhwindow(&mut self, win: WinId, blocking: bool);
    fn destroy_nhwindow(&mut self, win: WinId);
    fn curs(&mut self, win: WinId, x: i32, y: i32);
    fn print_glyph(&mut self, win: WinId, x: i32, y: i32, glyph: &GlyphInfo, background: &GlyphInfo);
    fn putstr(&mut self, win: WinId, attr: i32, text: &str);
    /// Like `putstr` but `text` may contain inline glyph escapes.
    fn putmixed(&mut self, win: WinId, attr: i32, text: &str);
    fn start_menu(&mut self, win: WinId);
    fn add_menu(&mut self, win: WinId, item: MenuItem);
    fn end_menu(&mut self, win: WinId, prompt: Option<&str>);
    /// `None` when the menu was cancelled.
    fn select_menu(&mut self, win: WinId, how: PickHow) -> Option<Vec<MenuPick>>;
    fn yn_function(&mut self, view: &dyn GameView, query: &str, resp: Option<&str>, default: u8) -> u8;
    /// Returns `"\x1b"` when the player cancelled.
    fn getlin(&mut self, query: &str) -> String;
    /// Index into `commands`, or -1.
    fn get_ext_cmd(&mut self, commands: &[ExtCmd]) -> i32;
    fn nhgetch(&mut self) -> u8;
    fn poskey(&mut self) -> u8;
    /// End of turn.
    fn wait_synch(&mut self, view: &dyn GameView);
    fn delay_output(&mut self, view: &dyn GameView);
    fn status_update(&mut self, field: StatusField, value: &str);
    fn flush_screen(&mut self);
    fn exit_nhwindows(&mut self, msg: Option<&str>);
    /// Command queued by the host ahead of the next key poll.
    fn take_canned_command(&mut self) -> Option<EngineCommand>;
    /// The engine released its dynamic data on its way out.
    fn mark_dynamic_data_freed(&mut self);
    /// The engine's process-exit routine. Never returns.
    fn nethack_exit(&mut self, status: i32) -> !;
}

/// Create the message, status, map and menu windows, in that order.
pub fn create_fixed_windows(win: &mut dyn WindowProcs) -> WindowIds {
    WindowIds {
        message: win.create_nhwindow(WindowKind::Message),
        status: win.create_nhwindow(WindowKind::Status),
        map: win.create_nhwindow(WindowKind::Map),
        menu: win.create_nhwindow(WindowKind::Menu),
    }
}
