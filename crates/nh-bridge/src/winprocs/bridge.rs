use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::config::BridgeConfig;
use crate::engine::GameView;
use crate::exit;
use crate::host::{HostEvent, MenuRequest, MenuResponse};
use crate::queue::{EngineCommand, MapTile, RenderElement, RenderProducer, WAIT_SLICE, WAKE_BYTE, render_channel};
use crate::session::{SessionFlags, Shared};
use crate::snapshot::GameSnapshot;
use crate::status::StatusField;

use super::death::DeathStage;
use super::extcmd::{ExtCmdMatch, match_ext_cmd};
use super::glyph::decode_glyph_escapes;
use super::map::{MapBuffer, MapCell};
use super::menu::{MenuState, PICK_ANY_AUTOSELECT};
use super::messages::categorize;
use super::pacing::{PaceDecision, Pacer};
use super::prompt::{self, PromptKind};
use super::{
    ESC, ExtCmd, GlyphInfo, MenuItem, MenuPick, PickHow, WIN_MAP, WIN_MENU, WIN_MESSAGE, WIN_STATUS, WinId,
    WindowKind, WindowProcs, WindowSetup,
};

/// Map rows start below the message line.
pub const MESSAGE_OFFSET: i32 = 1;

/// `exit_nhwindows` message the engine prints after a successful save.
pub const SAVE_EXIT_SENTINEL: &str = "Be seeing you...";

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// The bridge's window procedures. Owned by the engine thread.
pub struct BridgeWindows {
    shared: Arc<Shared>,
    render: Option<RenderProducer>,
    render_capacity: usize,
    map: MapBuffer,
    map_dirty: bool,
    glyph_chars: Vec<char>,
    menu: MenuState,
    death_stage: DeathStage,
    pacer: Pacer,
    cursor: (WinId, i32, i32),
    turn: i64,
}

impl BridgeWindows {
    pub fn new(shared: Arc<Shared>, config: &BridgeConfig) -> Self {
        Self {
            shared,
            render: None,
            render_capacity: config.render_capacity,
            map: MapBuffer::new(),
            map_dirty: false,
            glyph_chars: Vec::new(),
            menu: MenuState::default(),
            death_stage: DeathStage::Inactive,
            pacer: Pacer::new(config.steps_per_second),
            cursor: (WIN_MAP, 0, 0),
            turn: 0,
        }
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn map(&self) -> &MapBuffer {
        &self.map
    }

    pub fn menu(&self) -> &MenuState {
        &self.menu
    }

    pub fn death_stage(&self) -> DeathStage {
        self.death_stage
    }

    pub fn cursor(&self) -> (WinId, i32, i32) {
        self.cursor
    }

    fn push(&mut self, element: RenderElement) {
        match self.render.as_mut() {
            Some(render) => {
                render.push(element);
            }
            None => log::trace!("render element before init_nhwindows: {:?}", element),
        }
    }

    fn dropped(&self) -> u64 {
        self.render.as_ref().map_or(0, RenderProducer::dropped)
    }

    /// Copy the map for the host and notify it if anything changed.
    fn publish_map(&mut self) {
        if !self.map_dirty {
            return;
        }
        self.shared.capture_map(&self.map);
        self.shared.emit(HostEvent::MapUpdated);
        self.map_dirty = false;
    }

    fn refresh_caches(&mut self, view: &dyn GameView) {
        self.turn = view.moves();
        if !self.shared.flags.has_died() && !view.is_gameover() {
            self.shared.snapshot.publish(&GameSnapshot::capture(view));
        }
        self.shared.status().refresh_from(view);
        self.shared.queries().refresh(view);
    }

    /// Block until the host queues a byte. Unwinds out of the engine when
    /// the session is asked to exit.
    fn wait_byte(&mut self) -> u8 {
        let shared = self.shared.clone();
        let flags = &shared.flags;
        SessionFlags::set(&flags.awaiting_input, true);
        loop {
            if flags.should_exit() {
                SessionFlags::set(&flags.awaiting_input, false);
                log::debug!("exit requested while waiting for input");
                self.nethack_exit(0);
            }
            if let Some(b) = shared.input.pop_timeout(WAIT_SLICE) {
                SessionFlags::set(&flags.awaiting_input, false);
                return b;
            }
        }
    }

    /// Next byte that is not a wake-up kick.
    fn wait_real_byte(&mut self) -> u8 {
        loop {
            let b = self.wait_byte();
            if b != WAKE_BYTE {
                return b;
            }
        }
    }

    /// Read a UTF-8 line; `None` when ESC cancels.
    fn read_line(&mut self) -> Option<String> {
        let mut line = Vec::new();
        loop {
            match self.wait_real_byte() {
                ESC => return None,
                b'\n' | b'\r' => return Some(String::from_utf8_lossy(&line).into_owned()),
                BACKSPACE | DELETE => erase_last_char(&mut line),
                b => line.push(b),
            }
        }
    }

    fn capture_death_line(&mut self, text: &str) {
        if text.starts_with("You die") || text.contains("killed by") {
            let mut death = self.shared.death();
            if death.death_message.is_empty() {
                death.death_message = text.trim().to_string();
            }
        }
        if self.death_stage.is_active() {
            self.shared.death().capture(self.death_stage, text);
        }
    }

    fn on_death_prompt(&mut self, view: &dyn GameView, prompt: super::death::DeathPrompt) {
        let next = self.death_stage.on_prompt(prompt);
        log::debug!("death capture {} -> {}", self.death_stage, next);
        if next == DeathStage::Possessions && !self.shared.flags.has_died() {
            SessionFlags::set(&self.shared.flags.player_has_died, true);
            let v = view.vitals();
            {
                let mut death = self.shared.death();
                death.final_hp = v.hp;
                death.final_gold = v.gold;
                death.final_turns = view.moves();
                death.final_score = v.score;
                death.role = view.identity().role;
            }
            log::info!("player died on turn {}", view.moves());
            self.shared.emit(HostEvent::DeathAnimation);
        }
        self.death_stage = next;
    }

    fn select_from_host(&self, how: PickHow, win: WinId) -> Option<Option<Vec<MenuPick>>> {
        let request = MenuRequest {
            how,
            items: self.menu.items(),
            prompt: self.menu.prompt(),
            window: win,
        };
        match self.shared.callbacks.call_menu(&request)? {
            MenuResponse::Error => {
                log::warn!("host menu callback failed; using input queue");
                None
            }
            MenuResponse::Cancelled => Some(None),
            MenuResponse::Selected(indices) => Some(Some(self.menu.picks_from_indices(&indices))),
        }
    }

    fn pick_one_from_queue(&mut self) -> Option<Vec<MenuPick>> {
        loop {
            let b = self.wait_real_byte();
            if b == ESC || b == b' ' {
                return None;
            }
            if let Some(pick) = self.menu.pick_for_selector(b) {
                return Some(vec![pick]);
            }
            log::debug!("ignoring {:?} for menu", b as char);
        }
    }

    /// Block until a byte in `resp` (or ESC) arrives.
    fn pick_from_set(&mut self, resp: &str) -> u8 {
        loop {
            let b = self.wait_real_byte();
            if b == ESC || resp.as_bytes().contains(&b) {
                return b;
            }
            log::debug!("ignoring {:?}; expected one of {:?}", b as char, resp);
        }
    }
}

impl WindowProcs for BridgeWindows {
    fn init_nhwindows(&mut self, setup: &WindowSetup) {
        let (producer, consumer) = render_channel(self.render_capacity);
        self.shared.install_consumer(consumer);
        self.render = Some(producer);
        self.map.clear();
        self.map_dirty = false;
        self.menu.clear();
        self.pacer.reset();
        self.glyph_chars = setup.glyph_chars.clone();
        for line in &setup.banner {
            self.putstr(WIN_MESSAGE, 0, line);
        }
        log::debug!("windows initialized ({} glyphs)", self.glyph_chars.len());
    }

    fn create_nhwindow(&mut self, kind: WindowKind) -> WinId {
        match kind {
            WindowKind::Message => WIN_MESSAGE,
            WindowKind::Status => WIN_STATUS,
            WindowKind::Map => WIN_MAP,
            WindowKind::Menu | WindowKind::Text => WIN_MENU,
        }
    }

    fn clear_nhwindow(&mut self, win: WinId) {
        match win {
            WIN_MAP => {
                self.map.clear();
                self.shared.map().clear();
                self.map_dirty = false;
                self.push(RenderElement::Clear);
            }
            WIN_MENU => self.menu.clear(),
            _ => {}
        }
    }

    fn display_nhwindow(&mut self, win: WinId, _blocking: bool) {
        if win == WIN_MAP {
            self.publish_map();
        }
    }

    fn destroy_nhwindow(&mut self, win: WinId) {
        if win == WIN_MENU {
            self.menu.clear();
        }
    }

    fn curs(&mut self, win: WinId, x: i32, y: i32) {
        self.cursor = (win, x, y);
    }

    fn print_glyph(&mut self, win: WinId, x: i32, y: i32, glyph: &GlyphInfo, _background: &GlyphInfo) {
        if win != WIN_MAP {
            return;
        }
        if !self.map.set(x, y, MapCell::from(glyph)) {
            log::debug!("print_glyph outside the map at ({}, {})", x, y);
            return;
        }
        self.push(RenderElement::MapTile(MapTile {
            x,
            y,
            glyph: glyph.glyph,
            ch: glyph.ch,
            color: glyph.color,
            flags: glyph.flags,
        }));
        self.map_dirty = true;
    }

    fn putstr(&mut self, _win: WinId, attr: i32, text: &str) {
        self.capture_death_line(text);
        let category = categorize(text);
        self.shared.messages().push(self.turn, category, text);
        self.push(RenderElement::Message {
            category: category.to_string(),
            text: text.to_string(),
            attr,
        });
    }

    fn putmixed(&mut self, win: WinId, attr: i32, text: &str) {
        let decoded = decode_glyph_escapes(text, &self.glyph_chars);
        self.putstr(win, attr, &decoded);
    }

    fn start_menu(&mut self, win: WinId) {
        self.menu.start(win);
    }

    fn add_menu(&mut self, _win: WinId, item: MenuItem) {
        if self.death_stage.is_active() {
            self.shared.death().capture(self.death_stage, &item.text);
        }
        self.menu.add(item);
    }

    fn end_menu(&mut self, _win: WinId, prompt: Option<&str>) {
        self.menu.end(prompt);
    }

    fn select_menu(&mut self, win: WinId, how: PickHow) -> Option<Vec<MenuPick>> {
        if self.menu.is_tutorial() {
            log::debug!("declining tutorial menu");
            return Some(self.menu.tutorial_pick().into_iter().collect());
        }
        if how == PickHow::None {
            return Some(Vec::new());
        }
        if let Some(answer) = self.select_from_host(how, win) {
            return answer;
        }
        match how {
            PickHow::One => self.pick_one_from_queue(),
            PickHow::Any => Some(self.menu.autoselect(PICK_ANY_AUTOSELECT)),
            PickHow::None => Some(Vec::new()),
        }
    }

    fn yn_function(&mut self, view: &dyn GameView, query: &str, resp: Option<&str>, default: u8) -> u8 {
        let kind = prompt::classify(query);
        if let PromptKind::Death(death) = kind {
            self.on_death_prompt(view, death);
        }

        if let Some(answer) = self.shared.take_pending_yn() {
            return answer;
        }
        if let Some(answer) = self.shared.callbacks.call_yn(query, resp.unwrap_or(""), default) {
            return answer;
        }
        while let Some(b) = self.shared.input.try_pop() {
            if b == WAKE_BYTE {
                continue;
            }
            return match resp {
                Some(r) if !r.as_bytes().contains(&b) => ESC,
                _ => b,
            };
        }

        match kind {
            PromptKind::Save | PromptKind::CharacterCreation => return b'y',
            PromptKind::Death(death) => return death.answer(),
            PromptKind::Picker(picker) => self.shared.emit(HostEvent::PickerRequested(picker)),
            PromptKind::Generic => {}
        }
        if let Some(r) = resp.filter(|r| prompt::is_selection_set(Some(r))) {
            return self.pick_from_set(r);
        }
        if default != 0 {
            default
        } else {
            resp.and_then(|r| r.bytes().next()).unwrap_or(ESC)
        }
    }

    fn getlin(&mut self, query: &str) -> String {
        if let Some(kind) = prompt::text_input_kind(query) {
            self.shared.emit(HostEvent::TextInputRequested {
                kind,
                prompt: query.to_string(),
            });
        }
        self.read_line().unwrap_or_else(|| (ESC as char).to_string())
    }

    fn get_ext_cmd(&mut self, commands: &[ExtCmd]) -> i32 {
        let Some(name) = self.read_line() else {
            return -1;
        };
        match match_ext_cmd(&name, commands) {
            ExtCmdMatch::Found(i) => i as i32,
            ExtCmdMatch::Ambiguous(_) => {
                self.putstr(WIN_MESSAGE, 0, &format!("#{}: ambiguous extended command.", name.trim()));
                -1
            }
            ExtCmdMatch::Unknown => {
                self.putstr(WIN_MESSAGE, 0, &format!("#{}: unknown extended command.", name.trim()));
                -1
            }
        }
    }

    fn nhgetch(&mut self) -> u8 {
        self.shared.fire_game_ready();
        self.wait_byte()
    }

    fn poskey(&mut self) -> u8 {
        self.nhgetch()
    }

    fn wait_synch(&mut self, view: &dyn GameView) {
        let moves = view.moves();
        self.push(RenderElement::TurnComplete { moves });
        self.refresh_caches(view);
        self.publish_map();
        self.shared.emit(HostEvent::TurnComplete { moves });
    }

    fn delay_output(&mut self, view: &dyn GameView) {
        match self.pacer.next(Instant::now(), self.dropped()) {
            PaceDecision::CatchUp(pause) => thread::sleep(pause),
            PaceDecision::Step(sleep) => {
                if !self.shared.flags.has_died() && !view.is_gameover() {
                    self.shared.snapshot.publish(&GameSnapshot::capture(view));
                }
                self.publish_map();
                if !sleep.is_zero() {
                    thread::sleep(sleep);
                }
            }
        }
    }

    fn status_update(&mut self, field: StatusField, value: &str) {
        let line = {
            let mut status = self.shared.status();
            status.apply(field, value).then(|| status.to_status_line())
        };
        if let Some(line) = line {
            self.push(RenderElement::Status(line));
        }
    }

    fn flush_screen(&mut self) {
        self.publish_map();
        self.push(RenderElement::FlushMap);
    }

    fn exit_nhwindows(&mut self, msg: Option<&str>) {
        if msg == Some(SAVE_EXIT_SENTINEL) {
            log::info!("save exit; session continues");
            self.publish_map();
            return;
        }
        if self.shared.flags.has_died() {
            log::info!("game over; clearing session flags");
            self.shared.flags.end_game();
        }
        self.death_stage = DeathStage::Done;
        self.push(RenderElement::FlushMap);
    }

    fn take_canned_command(&mut self) -> Option<EngineCommand> {
        self.shared.input.take_command()
    }

    fn mark_dynamic_data_freed(&mut self) {
        self.shared.dynamic_freed.mark();
    }

    fn nethack_exit(&mut self, status: i32) -> ! {
        if let Some(render) = self.render.as_mut() {
            render.push(RenderElement::FlushMap);
        }
        exit::engine_exit(status)
    }
}

/// Drop the last character of a UTF-8 byte line, continuation bytes included.
fn erase_last_char(line: &mut Vec<u8>) {
    while let Some(b) = line.pop() {
        if b & 0xC0 != 0x80 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        CharacterIdentity, DiscoveredMonster, MonsterInfo, ObjectInfo, OverviewEntry, Stairway, Terrain, Vitals,
    };
    use crate::exit::{ExitReason, run_guarded};
    use crate::host::HostCallbacks;
    use crate::winprocs::{GlyphFlags, MenuItemFlags};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct View;

    impl GameView for View {
        fn moves(&self) -> i64 {
            7
        }
        fn vitals(&self) -> Vitals {
            Vitals {
                hp: 0,
                hp_max: 16,
                gold: 25,
                score: 120,
                dungeon_level: 1,
                ..Default::default()
            }
        }
        fn identity(&self) -> CharacterIdentity {
            CharacterIdentity {
                role: "Valkyrie".into(),
                ..Default::default()
            }
        }
        fn plname(&self) -> String {
            "Hero".into()
        }
        fn terrain_at(&self, _x: i32, _y: i32) -> Option<Terrain> {
            None
        }
        fn monsters(&self) -> Vec<MonsterInfo> {
            Vec::new()
        }
        fn objects_at(&self, _x: i32, _y: i32) -> Vec<ObjectInfo> {
            Vec::new()
        }
        fn stairways(&self) -> Vec<Stairway> {
            Vec::new()
        }
        fn dungeon_overview(&self) -> Vec<OverviewEntry> {
            Vec::new()
        }
        fn discovered_monsters(&self) -> Vec<DiscoveredMonster> {
            Vec::new()
        }
        fn is_gameover(&self) -> bool {
            false
        }
    }

    fn windows() -> BridgeWindows {
        let mut config = BridgeConfig::new("/nonexistent");
        config.steps_per_second = 0;
        let shared = Arc::new(Shared::new(&config, Arc::new(HostCallbacks::default())));
        let mut w = BridgeWindows::new(shared, &config);
        w.init_nhwindows(&WindowSetup {
            banner: vec!["NetHack, Copyright 1985-2023".into()],
            glyph_chars: vec!['.'; 16],
        });
        w
    }

    fn item(selector: u8, identifier: i64, text: &str) -> MenuItem {
        MenuItem {
            selector,
            identifier,
            glyph: -1,
            text: text.into(),
            attr: 0,
            flags: MenuItemFlags::empty(),
        }
    }

    #[test]
    fn test_banner_reaches_render_queue() {
        let w = windows();
        match w.shared().dequeue_render() {
            Some(RenderElement::Message { category, text, .. }) => {
                assert_eq!(category, "system");
                assert!(text.contains("Copyright"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_print_glyph_and_display() {
        let mut w = windows();
        w.shared().drain_render();
        let g = GlyphInfo {
            glyph: 342,
            ch: '@',
            color: 15,
            flags: GlyphFlags::HERO,
        };
        w.print_glyph(WIN_MAP, 10, 5, &g, &GlyphInfo::BLANK);
        assert_eq!(w.map().get(10, 5).map(|c| c.ch), Some('@'));
        assert!(w.shared().map().is_blank());
        w.display_nhwindow(WIN_MAP, false);
        assert_eq!(w.shared().map().get(10, 5).map(|c| c.glyph), Some(342));
        assert_eq!(w.shared().pump_events(), vec![HostEvent::MapUpdated]);
        w.display_nhwindow(WIN_MAP, false);
        assert!(w.shared().pump_events().is_empty());
        w.clear_nhwindow(WIN_MAP);
        assert!(w.shared().map().is_blank());
        let kinds: Vec<_> = w.shared().drain_render();
        assert!(matches!(kinds[0], RenderElement::MapTile(MapTile { x: 10, y: 5, .. })));
        assert_eq!(kinds[1], RenderElement::Clear);
    }

    #[test]
    fn test_fixed_window_ids() {
        let mut w = windows();
        assert_eq!(w.create_nhwindow(WindowKind::Message), WIN_MESSAGE);
        assert_eq!(w.create_nhwindow(WindowKind::Map), WIN_MAP);
        assert_eq!(w.create_nhwindow(WindowKind::Status), WIN_STATUS);
        assert_eq!(w.create_nhwindow(WindowKind::Text), WIN_MENU);
    }

    #[test]
    fn test_yn_queued_byte_outside_resp_is_escape() {
        let mut w = windows();
        w.shared().input.push(b'x');
        assert_eq!(w.yn_function(&View, "Really attack?", Some("yn"), b'n'), ESC);
        w.shared().input.push(b'y');
        assert_eq!(w.yn_function(&View, "Really attack?", Some("yn"), b'n'), b'y');
        assert_eq!(w.yn_function(&View, "Really attack?", Some("yn"), b'n'), b'n');
    }

    #[test]
    fn test_yn_precedence() {
        let mut w = windows();
        w.shared().input.push(b'n');
        w.shared().set_pending_yn(b'q');
        assert_eq!(w.yn_function(&View, "Really save?", Some("ynq"), b'n'), b'q');
        assert_eq!(w.yn_function(&View, "Really save?", Some("ynq"), b'n'), b'n');
        assert_eq!(w.yn_function(&View, "Really save?", Some("ynq"), b'n'), b'y');
        w.shared().callbacks.set_yn(|_, _, _| b'a');
        assert_eq!(w.yn_function(&View, "Shall I pick?", Some("ynaq"), b'y'), b'a');
    }

    #[test]
    fn test_death_capture() {
        let mut w = windows();
        let answer = w.yn_function(&View, "Do you want your possessions identified?", Some("ynq"), b'n');
        assert_eq!(answer, b'y');
        assert!(w.shared().flags.has_died());
        assert_eq!(w.shared().death().final_gold, 25);
        assert_eq!(w.shared().death().role, "Valkyrie");
        w.start_menu(WIN_MENU);
        w.add_menu(WIN_MENU, item(b'a', 1, "a +1 long sword"));
        w.end_menu(WIN_MENU, Some("Your inventory"));
        w.yn_function(&View, "Do you want to see your attributes?", Some("ynq"), b'n');
        w.putstr(WIN_MENU, 0, "You were a Valkyrie.");
        assert_eq!(w.yn_function(&View, "Dump core?", Some("ynq"), b'y'), b'n');
        let death = w.shared().death().clone();
        assert_eq!(death.possessions, "a +1 long sword\n");
        assert_eq!(death.attributes, "You were a Valkyrie.\n");
        assert!(
            w.shared()
                .pump_events()
                .iter()
                .any(|e| *e == HostEvent::DeathAnimation)
        );
    }

    #[test]
    fn test_pick_one_validates_selectors() {
        let mut w = windows();
        w.start_menu(WIN_MENU);
        w.add_menu(WIN_MENU, item(0, 0, "Weapons"));
        w.add_menu(WIN_MENU, item(b'a', 101, "a long sword"));
        w.add_menu(WIN_MENU, item(b'b', 102, "a dagger"));
        w.end_menu(WIN_MENU, Some("Wield what?"));
        w.shared().input.push_str("zb");
        let picked = w.select_menu(WIN_MENU, PickHow::One);
        w.destroy_nhwindow(WIN_MENU);
        assert!(w.menu().is_empty());
        assert_eq!(picked, Some(vec![MenuPick { identifier: 102, count: -1 }]));

        w.start_menu(WIN_MENU);
        w.add_menu(WIN_MENU, item(b'a', 101, "a long sword"));
        w.end_menu(WIN_MENU, None);
        w.shared().input.push(ESC);
        assert_eq!(w.select_menu(WIN_MENU, PickHow::One), None);
    }

    #[test]
    fn test_host_menu_error_falls_back() {
        let mut w = windows();
        w.shared().callbacks.set_menu(|_| MenuResponse::Error);
        w.start_menu(WIN_MENU);
        for (i, c) in b"abcde".iter().enumerate() {
            w.add_menu(WIN_MENU, item(*c, i as i64 + 1, "thing"));
        }
        w.end_menu(WIN_MENU, Some("Pick up what?"));
        let picked = w.select_menu(WIN_MENU, PickHow::Any).unwrap();
        assert_eq!(picked.len(), PICK_ANY_AUTOSELECT);
        w.shared().callbacks.set_menu(|req| MenuResponse::Selected(vec![(req.items.len() - 1, 2)]));
        let picked = w.select_menu(WIN_MENU, PickHow::Any).unwrap();
        assert_eq!(picked, vec![MenuPick { identifier: 5, count: 2 }]);
    }

    #[test]
    fn test_getlin_escape_and_editing() {
        let mut w = windows();
        w.shared().input.push_str("Exca\x08\x08calibur\n");
        assert_eq!(w.getlin("What do you want to name this long sword?"), "Excalibur");
        w.shared().input.push(ESC);
        assert_eq!(w.getlin("For what do you wish?"), "\x1b");
        let events = w.shared().pump_events();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_getlin_keeps_utf8_text() {
        let mut w = windows();
        w.shared().input.push_str("H\u{e9}ro\n");
        assert_eq!(w.getlin("Who are you?"), "H\u{e9}ro");
        w.shared().input.push_str("Mj\u{f6}lnir\u{2020}\x08\n");
        assert_eq!(w.getlin("What do you want to name this war hammer?"), "Mj\u{f6}lnir");
        w.shared().input.push_str("caf\u{e9}\x7f\x7fe\n");
        assert_eq!(w.getlin("Call it:"), "cae");
    }

    #[test]
    fn test_erase_last_char_drops_whole_sequence() {
        let mut line = "a\u{1f409}".as_bytes().to_vec();
        erase_last_char(&mut line);
        assert_eq!(line, b"a");
        erase_last_char(&mut line);
        assert!(line.is_empty());
        erase_last_char(&mut line);
        assert!(line.is_empty());
    }

    #[test]
    fn test_ambiguous_extended_command() {
        let mut w = windows();
        let table = vec![ExtCmd::new("zap", ""), ExtCmd::new("ztest", ""), ExtCmd::new("pray", "")];
        w.shared().input.push_str("z\n");
        assert_eq!(w.get_ext_cmd(&table), -1);
        assert_eq!(
            w.shared().messages().last().map(|m| m.text.clone()).as_deref(),
            Some("#z: ambiguous extended command.")
        );
        w.shared().input.push_str("pr\n");
        assert_eq!(w.get_ext_cmd(&table), 2);
    }

    #[test]
    fn test_exit_flag_unwinds_input_wait() {
        let mut w = windows();
        SessionFlags::set(&w.shared().flags.game_should_exit, true);
        let result = run_guarded(|| w.nhgetch());
        assert_eq!(result, Err(ExitReason::Exited(0)));
        assert_eq!(w.shared().game_ready_count(), 1);
    }

    #[test]
    fn test_wait_synch_marks_turn() {
        let mut w = windows();
        w.shared().drain_render();
        w.wait_synch(&View);
        assert_eq!(w.shared().dequeue_render(), Some(RenderElement::TurnComplete { moves: 7 }));
        assert_eq!(w.shared().snapshot.read().turn_number, 7);
        assert_eq!(w.shared().status().hp_max, 16);
    }

    #[test]
    fn test_status_flush_enqueues_line() {
        let mut w = windows();
        w.shared().drain_render();
        w.status_update(StatusField::HitPoints, "12");
        assert_eq!(w.shared().render_len(), 0);
        w.status_update(StatusField::Flush, "");
        match w.shared().dequeue_render() {
            Some(RenderElement::Status(line)) => assert_eq!(line.hp, 12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_input_wait_wakes_on_push() {
        let mut w = windows();
        let shared = w.shared().clone();
        let pusher = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            shared.input.push(b'k');
        });
        assert_eq!(w.poskey(), b'k');
        pusher.join().unwrap();
        assert!(!w.shared().flags.awaiting_input.load(Ordering::Acquire));
    }
}
