//! `SimEngine`: a small deterministic engine behind the bridge's engine
//! contract.
//!
//! It keeps the parts of the real engine the bridge has to cope with:
//! numbered levels that live either in memory or in their own level file,
//! a timer chain whose entries point at objects, worn items held as heap
//! pointers, a blocking key loop, and a death path that frees its data and
//! calls the exit routine.
//!
//! Keys understood by the move loop:
//!
//! | key | action |
//! |-----|--------|
//! | `h j k l y u b n` | move one square |
//! | `s` `.` | search / rest one turn |
//! | `>` `<` | change level (any square) |
//! | `i` | show inventory |
//! | `S` | save, after confirmation |
//! | `#` | extended command |
//! | `P` | repaint the map [`PAINT_BURST`] times |
//! | `K` | drop to 0 HP and die |

use std::collections::BTreeMap;
use std::sync::Arc;

use nh_bridge::config::{GameOptions, SymbolOverrides};
use nh_bridge::engine::{
    CharacterIdentity, CharacterPreset, DiscoveredMonster, Engine, GameView, LoopExit, MonsterInfo, ObjectInfo,
    OverviewEntry, ProgramState, Stairway, Terrain, Vitals,
};
use nh_bridge::nhfile::{NhFile, NhFileMode, VersionInfo};
use nh_bridge::paths::FilePrefixes;
use nh_bridge::queue::EngineCommand;
use nh_bridge::roots::{EngineRoots, WornMask};
use nh_bridge::status::StatusField;
use nh_bridge::winprocs::{
    ESC, ExtCmd, GlyphFlags, GlyphInfo, MenuItem, MenuItemFlags, PickHow, WindowIds, WindowKind, WindowProcs,
    WindowSetup,
};
use nh_bridge::{BridgeError, Result};
use nh_heap::{FixedHeap, HeapPtr};
use serde::{Deserialize, Serialize};

use crate::glyphs;
use crate::hero::{Hero, InventoryItem, LAMP_ID, ORPHAN_OBJECT, starting_kit};
use crate::level::{Level, RECORD_MAX, SimTimer, TimerKind, UP_STAIRS};
use crate::probe::{Projection, SimProbe, TimerState};

/// Map paints issued by one `P` key.
pub const PAINT_BURST: u32 = 10_000;

pub const DEFAULT_NAME: &str = "Hero";
pub const DUNGEON_NAME: &str = "The Dungeons of Doom";

pub const VERSION: VersionInfo = VersionInfo {
    incarnation: 0x0003_0007_0000_0000,
    feature_set: 0x0000_0000_5349_4d31,
    entity_count: 0x0000_0005_0000_0016,
    struct_sizes: 0x0000_0100_0000_0040,
};
/// Sizes of short, int, long and pointer.
pub const CRITICAL_SIZES: [u8; 4] = [2, 4, 8, 8];

const LEVEL_BLOCK: usize = 256;
const ITEM_BLOCK: usize = 64;
/// Luck from the date; the engine behaves as if every day had a full moon.
const DATE_LUCK: i32 = 1;

const WAKE: u8 = 0;

fn ext_commands() -> Vec<ExtCmd> {
    vec![
        ExtCmd::new("pray", "pray to the gods for help"),
        ExtCmd::new("quit", "exit without saving current game"),
        ExtCmd::new("save", "save the game and continue"),
        ExtCmd::new("zap", "zap a wand"),
        ExtCmd::new("ztest", "run the engine self test"),
    ]
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Everything `savegamestate` writes.
#[derive(Debug, Serialize, Deserialize)]
struct GameState {
    plname: String,
    moves: i64,
    hero: Hero,
    current: i16,
    max_ledger: i16,
    inventory: Vec<InventoryItem>,
    /// Timers that travel with the hero.
    timers: Vec<SimTimer>,
    overview: BTreeMap<i16, Vec<String>>,
    discovered: BTreeMap<String, (u32, u32)>,
    current_fruit: i32,
    wizard: bool,
}

pub struct SimEngine {
    probe: Arc<SimProbe>,
    heap: Option<&'static FixedHeap>,
    prefixes: Option<FilePrefixes>,
    state: ProgramState,
    roots: EngineRoots,
    ids: WindowIds,
    wizard: bool,
    boulder: char,
    plname: String,
    save_filename: Option<String>,
    hero: Hero,
    moves: i64,
    current: i16,
    max_ledger: i16,
    levels: BTreeMap<i16, Level>,
    level_blocks: BTreeMap<i16, HeapPtr>,
    inventory: Vec<InventoryItem>,
    timers: Vec<SimTimer>,
    overview: BTreeMap<i16, Vec<String>>,
    discovered: BTreeMap<String, (u32, u32)>,
    status_ready: bool,
    vision: Option<i32>,
    scripting: bool,
    dlb_open: bool,
}

impl SimEngine {
    pub fn new(probe: Arc<SimProbe>) -> Self {
        Self {
            probe,
            heap: None,
            prefixes: None,
            state: ProgramState::default(),
            roots: EngineRoots::default(),
            ids: WindowIds::default(),
            wizard: false,
            boulder: '0',
            plname: String::new(),
            save_filename: None,
            hero: Hero::default(),
            moves: 0,
            current: 0,
            max_ledger: 0,
            levels: BTreeMap::new(),
            level_blocks: BTreeMap::new(),
            inventory: Vec::new(),
            timers: Vec::new(),
            overview: BTreeMap::new(),
            discovered: BTreeMap::new(),
            status_ready: false,
            vision: None,
            scripting: false,
            dlb_open: false,
        }
    }

    pub fn probe(&self) -> &Arc<SimProbe> {
        &self.probe
    }

    pub fn is_wizard(&self) -> bool {
        self.wizard
    }

    pub fn boulder_symbol(&self) -> char {
        self.boulder
    }

    fn prefixes(&self) -> Result<FilePrefixes> {
        self.prefixes
            .clone()
            .ok_or_else(|| BridgeError::Engine("file prefixes not set".into()))
    }

    // ========================================================================
    // Heap
    // ========================================================================

    fn heap_alloc(&self, tag: u32, size: usize) -> Option<HeapPtr> {
        let heap = self.heap?;
        match heap.alloc(size) {
            Ok(ptr) => {
                if let Err(err) = heap.write_user(ptr, 0, &tag.to_ne_bytes()) {
                    log::warn!("could not tag block {:?}: {}", ptr, err);
                }
                Some(ptr)
            }
            Err(err) => {
                log::error!("allocation of {} bytes failed: {}", size, err);
                None
            }
        }
    }

    fn heap_free(&self, ptr: HeapPtr) {
        if let Some(heap) = self.heap
            && let Err(err) = heap.free(ptr)
        {
            log::debug!("free of {:?} skipped: {}", ptr, err);
        }
    }

    fn alloc_inventory(&mut self) {
        for i in 0..self.inventory.len() {
            let block = self.heap_alloc(self.inventory[i].id, ITEM_BLOCK);
            self.inventory[i].block = block;
        }
        self.roots.chains.inventory = self.inventory.first().and_then(|item| item.block);
    }

    fn free_inventory(&mut self) {
        let blocks: Vec<HeapPtr> = self.inventory.iter_mut().filter_map(|item| item.block.take()).collect();
        for block in blocks {
            self.heap_free(block);
        }
        self.roots.chains.inventory = None;
    }

    // ========================================================================
    // Levels
    // ========================================================================

    fn level(&self) -> Option<&Level> {
        self.levels.get(&self.current)
    }

    /// Make `level` resident, replacing any copy already in memory. Its
    /// timers join the chain.
    fn load_level(&mut self, mut level: Level) {
        let ledger = level.ledger;
        self.timers.retain(|t| t.ledger != Some(ledger));
        self.timers.append(&mut level.timers);
        if let Some(old) = self.level_blocks.remove(&ledger) {
            self.heap_free(old);
        }
        if let Some(block) = self.heap_alloc(ledger as u32, LEVEL_BLOCK) {
            self.level_blocks.insert(ledger, block);
        }
        self.levels.insert(ledger, level);
        self.relink_timers();
    }

    fn release_level(&mut self, ledger: i16) {
        self.levels.remove(&ledger);
        self.timers.retain(|t| t.ledger != Some(ledger));
        if let Some(block) = self.level_blocks.remove(&ledger) {
            self.heap_free(block);
        }
        log::trace!("level {} released", ledger);
    }

    /// The resident level with its timers taken back off the chain.
    fn level_record(&self, ledger: i16) -> Result<Level> {
        let mut level = self
            .levels
            .get(&ledger)
            .cloned()
            .ok_or_else(|| BridgeError::Engine(format!("level {ledger} is not in memory")))?;
        level.timers = self.timers.iter().filter(|t| t.ledger == Some(ledger)).cloned().collect();
        Ok(level)
    }

    fn enter_level(&mut self, ledger: i16) -> Result<()> {
        if self.level_file_exists(ledger) {
            let mut f = NhFile::open(self.prefixes()?.level_file(ledger))?;
            f.init_sfprocs();
            self.getlev(&mut f)?;
        } else {
            let level = Level::generate(ledger);
            self.overview.insert(ledger, level.features());
            for mon in &level.monsters {
                self.discovered.entry(mon.name.clone()).or_default().0 += 1;
            }
            self.load_level(level);
        }
        self.current = ledger;
        self.max_ledger = self.max_ledger.max(ledger);
        if let Some(level) = self.levels.get_mut(&ledger) {
            level.see_room();
        }
        Ok(())
    }

    fn change_level(&mut self, to: i16, win: &mut dyn WindowProcs) -> Result<()> {
        let from = self.current;
        let mut out = NhFile::create(self.prefixes()?.level_file(from))?;
        out.init_sfprocs();
        out.set_mode(NhFileMode::WRITING | NhFileMode::FREEING);
        self.savelev(&mut out, from)?;
        out.finish()?;

        self.enter_level(to)?;
        (self.hero.x, self.hero.y) = if to > from { UP_STAIRS } else { Level::down_stairs_for(to) };
        log::debug!("level change {} -> {}", from, to);
        self.docrt(win);
        Ok(())
    }

    fn object_present(&self, id: u32) -> bool {
        self.inventory.iter().any(|item| item.id == id) || self.levels.values().any(|l| l.object_ids().contains(&id))
    }

    // ========================================================================
    // Display
    // ========================================================================

    fn paint_hero(&self, win: &mut dyn WindowProcs) {
        let hero = glyphs::info(glyphs::HERO, 15, GlyphFlags::HERO);
        win.print_glyph(self.ids.map, self.hero.x, self.hero.y, &hero, &GlyphInfo::BLANK);
    }

    fn paint_cell(&self, win: &mut dyn WindowProcs, x: i32, y: i32) {
        let Some(level) = self.level() else { return };
        let Some(terrain) = level.terrain_at(x, y) else { return };
        let glyph = glyphs::info(glyphs::terrain(terrain.kind), 7, GlyphFlags::empty());
        win.print_glyph(self.ids.map, x, y, &glyph, &GlyphInfo::BLANK);
    }

    fn bot(&self, win: &mut dyn WindowProcs) {
        let h = &self.hero;
        let hunger = match h.hunger {
            0 => "",
            1 => "Hungry",
            2 => "Weak",
            _ => "Fainting",
        };
        let fields = [
            (StatusField::Title, format!("{} the {}", self.plname, h.title())),
            (StatusField::Strength, "18/50".to_string()),
            (StatusField::Dexterity, "14".to_string()),
            (StatusField::Constitution, "18".to_string()),
            (StatusField::Alignment, capitalize(&h.alignment)),
            (StatusField::Gold, h.gold.to_string()),
            (StatusField::HitPoints, h.hp.to_string()),
            (StatusField::HitPointsMax, h.hp_max.to_string()),
            (StatusField::Power, h.pw.to_string()),
            (StatusField::PowerMax, h.pw_max.to_string()),
            (StatusField::ExperienceLevel, h.level.to_string()),
            (StatusField::ArmorClass, h.ac.to_string()),
            (StatusField::Time, self.moves.to_string()),
            (StatusField::Hunger, hunger.to_string()),
            (StatusField::DungeonLevel, self.current.to_string()),
            (StatusField::Flush, String::new()),
        ];
        for (field, value) in &fields {
            win.status_update(*field, value);
        }
    }

    fn text_window(&self, win: &mut dyn WindowProcs, lines: &[String]) {
        let text = win.create_nhwindow(WindowKind::Text);
        for line in lines {
            win.putstr(text, 0, line);
        }
        win.display_nhwindow(text, true);
        win.destroy_nhwindow(text);
    }

    fn show_inventory(&self, win: &mut dyn WindowProcs, how: PickHow) {
        let menu = self.ids.menu;
        win.start_menu(menu);
        win.add_menu(
            menu,
            MenuItem {
                selector: 0,
                identifier: 0,
                glyph: -1,
                text: "Inventory".into(),
                attr: 0,
                flags: MenuItemFlags::empty(),
            },
        );
        for item in &self.inventory {
            win.add_menu(
                menu,
                MenuItem {
                    selector: item.letter as u8,
                    identifier: i64::from(item.id),
                    glyph: glyphs::object(item.class),
                    text: item.describe(),
                    attr: 0,
                    flags: MenuItemFlags::empty(),
                },
            );
        }
        win.end_menu(menu, None);
        let picked = win.select_menu(menu, how);
        log::trace!("inventory menu returned {:?}", picked);
        win.destroy_nhwindow(menu);
    }

    fn attribute_lines(&self) -> Vec<String> {
        let h = &self.hero;
        vec![
            format!("{} the {}'s attributes:", self.plname, h.title()),
            format!("You were a {} {} {} {}.", h.alignment, h.gender, h.race, h.role),
            format!("You were level {} with a maximum of {} hit points.", h.level, h.hp_max),
            format!("You had {} gold pieces.", h.gold),
        ]
    }

    fn conduct_lines(&self) -> Vec<String> {
        vec![
            "Voluntary challenges:".to_string(),
            "You never genocided any monsters.".to_string(),
            "You never polymorphed an object.".to_string(),
        ]
    }

    fn overview_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("{}: levels 1 to {}", DUNGEON_NAME, self.max_ledger)];
        for (ledger, features) in &self.overview {
            if features.is_empty() {
                lines.push(format!("   Level {ledger}:"));
            } else {
                lines.push(format!("   Level {}: {}.", ledger, features.join(", ")));
            }
        }
        lines
    }

    fn publish(&self, polled: bool) {
        let projection = Projection {
            plname: self.plname.clone(),
            x: self.hero.x,
            y: self.hero.y,
            hp: self.hero.hp,
            dungeon_level: i32::from(self.current),
            moves: self.moves,
            inventory: self.inventory.iter().map(|item| item.id).collect(),
        };
        self.probe.update(|r| {
            r.projection = projection;
            r.gold = self.hero.gold;
            r.luck = self.hero.luck;
            r.current_ledger = self.current;
            r.resident = self.levels.keys().copied().collect();
            r.timers = self
                .timers
                .iter()
                .map(|t| TimerState {
                    id: t.id,
                    object: t.object,
                    needs_fixup: t.needs_fixup,
                })
                .collect();
            r.worn = self.roots.worn.iter().filter_map(|(_, ptr)| ptr).collect();
            if polled {
                r.polls += 1;
            }
        });
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn end_turn(&mut self) {
        self.moves += 1;
        self.run_timers();
    }

    /// Returns whether the hero moved.
    fn move_hero(&mut self, dx: i32, dy: i32, win: &mut dyn WindowProcs) -> bool {
        let (x, y) = (self.hero.x + dx, self.hero.y + dy);
        if !self.level().is_some_and(|l| l.is_walkable(x, y)) {
            return false;
        }
        let (ox, oy) = (self.hero.x, self.hero.y);
        (self.hero.x, self.hero.y) = (x, y);
        if let Some(level) = self.levels.get_mut(&self.current) {
            level.see(x, y);
        }
        self.paint_cell(win, ox, oy);
        self.paint_hero(win);
        true
    }

    fn paint_storm(&mut self, win: &mut dyn WindowProcs) {
        let cols = crate::level::COLS as u32;
        let rows = crate::level::ROWS as u32;
        for i in 0..PAINT_BURST {
            let (x, y) = ((i % cols) as i32, ((i / cols) % rows) as i32);
            self.paint_cell(win, x, y);
        }
        self.paint_hero(win);
        self.probe.update(|r| r.paints += u64::from(PAINT_BURST));
        win.delay_output(&*self);
    }

    fn confirm(&self, win: &mut dyn WindowProcs, query: &str) -> bool {
        win.yn_function(&*self, query, Some("yn"), b'n') == b'y'
    }

    fn request_save(&self, win: &mut dyn WindowProcs) -> Option<LoopExit> {
        if !self.confirm(win, "Really save?") {
            win.putstr(self.ids.message, 0, "Never mind.");
            return None;
        }
        self.probe.update(|r| r.saves_requested += 1);
        Some(LoopExit::SaveRequested)
    }

    fn extended(&mut self, win: &mut dyn WindowProcs) -> Option<LoopExit> {
        let table = ext_commands();
        let index = win.get_ext_cmd(&table);
        self.probe.update(|r| r.ext_cmd_results.push(index));
        let cmd = usize::try_from(index).ok().and_then(|i| table.get(i))?;
        let msg = self.ids.message;
        match cmd.name.as_str() {
            "pray" => {
                win.putstr(msg, 0, "You begin praying to Tyr.");
                win.putstr(msg, 0, "You finish your prayer.");
                self.end_turn();
            }
            "quit" => {
                if self.confirm(win, "Really quit?") {
                    return Some(LoopExit::Quit);
                }
            }
            "save" => return self.request_save(win),
            "zap" => win.putstr(msg, 0, "You don't have anything to zap."),
            _ => win.putstr(msg, 0, "Self test passed."),
        }
        None
    }

    fn command(&mut self, key: u8, win: &mut dyn WindowProcs) -> Result<Option<LoopExit>> {
        let step = match key {
            b'h' => Some((-1, 0)),
            b'j' => Some((0, 1)),
            b'k' => Some((0, -1)),
            b'l' => Some((1, 0)),
            b'y' => Some((-1, -1)),
            b'u' => Some((1, -1)),
            b'b' => Some((-1, 1)),
            b'n' => Some((1, 1)),
            _ => None,
        };
        if let Some((dx, dy)) = step {
            if self.move_hero(dx, dy, win) {
                self.end_turn();
            }
            return Ok(None);
        }
        match key {
            WAKE | ESC => {}
            b's' | b'.' => self.end_turn(),
            b'>' => {
                self.change_level(self.current + 1, win)?;
                self.end_turn();
            }
            b'<' if self.current > 1 => {
                self.change_level(self.current - 1, win)?;
                self.end_turn();
            }
            b'<' => win.putstr(self.ids.message, 0, "You can't go up here."),
            b'i' => self.show_inventory(win, PickHow::None),
            b'S' => return Ok(self.request_save(win)),
            b'#' => return Ok(self.extended(win)),
            b'P' => self.paint_storm(win),
            b'K' => self.die(win),
            other => win.putstr(
                self.ids.message,
                0,
                &format!("Unknown command '{}'.", other.escape_ascii()),
            ),
        }
        Ok(None)
    }

    /// The end-of-game sequence. Frees the game and leaves through the exit
    /// routine.
    fn die(&mut self, win: &mut dyn WindowProcs) -> ! {
        let msg = self.ids.message;
        self.hero.hp = 0;
        self.state.gameover = true;
        win.putstr(msg, 0, "You die...");
        self.bot(win);

        if win.yn_function(&*self, "Do you want your possessions identified?", Some("ynq"), b'n') == b'y' {
            self.show_inventory(win, PickHow::None);
        }
        if win.yn_function(&*self, "Do you want to see your attributes?", Some("ynq"), b'n') == b'y' {
            self.text_window(win, &self.attribute_lines());
        }
        if win.yn_function(&*self, "Do you want to see your conduct?", Some("ynq"), b'n') == b'y' {
            self.text_window(win, &self.conduct_lines());
        }
        if win.yn_function(&*self, "Do you want to see the dungeon overview?", Some("ynq"), b'n') == b'y' {
            self.text_window(win, &self.overview_lines());
        }
        if win.yn_function(&*self, "Do you want to see your vanquished monsters?", Some("ynq"), b'n') == b'y' {
            self.text_window(win, &["No creatures were vanquished.".to_string()]);
        }
        if win.yn_function(&*self, "Do you want to see the list of genocided monsters?", Some("ynq"), b'n') == b'y' {
            self.text_window(win, &["No species were genocided.".to_string()]);
        }
        let core = win.yn_function(&*self, "Dump core?", Some("ynq"), b'n');
        log::debug!("dump core answered {:?}", core as char);

        win.putstr(msg, 0, &format!("Goodbye {} the {}...", self.plname, self.hero.role));
        win.putstr(
            msg,
            0,
            &format!(
                "You died in {} on dungeon level {} with {} points, killed by a newt.",
                DUNGEON_NAME,
                self.current,
                self.hero.score(self.moves)
            ),
        );
        win.exit_nhwindows(None);
        self.free_dynamic_data();
        win.mark_dynamic_data_freed();
        win.nethack_exit(0)
    }

    fn game_state(&self) -> GameState {
        GameState {
            plname: self.plname.clone(),
            moves: self.moves,
            hero: self.hero.clone(),
            current: self.current,
            max_ledger: self.max_ledger,
            inventory: self.inventory.clone(),
            timers: self.timers.iter().filter(|t| t.ledger.is_none()).cloned().collect(),
            overview: self.overview.clone(),
            discovered: self.discovered.clone(),
            current_fruit: self.roots.current_fruit,
            wizard: self.wizard,
        }
    }
}

impl GameView for SimEngine {
    fn moves(&self) -> i64 {
        self.moves
    }

    fn vitals(&self) -> Vitals {
        let h = &self.hero;
        Vitals {
            hp: h.hp,
            hp_max: h.hp_max,
            pw: h.pw,
            pw_max: h.pw_max,
            level: h.level,
            experience: h.experience,
            ac: h.ac,
            x: h.x,
            y: h.y,
            gold: h.gold,
            score: h.score(self.moves),
            dungeon_level: i32::from(self.current),
            depth: i32::from(self.current),
            hunger: h.hunger,
        }
    }

    fn identity(&self) -> CharacterIdentity {
        self.hero.identity(&self.plname)
    }

    fn plname(&self) -> String {
        self.plname.clone()
    }

    fn terrain_at(&self, x: i32, y: i32) -> Option<Terrain> {
        self.level()?.terrain_at(x, y)
    }

    fn monsters(&self) -> Vec<MonsterInfo> {
        self.level()
            .map(|l| {
                l.monsters
                    .iter()
                    .map(|m| MonsterInfo {
                        id: m.id,
                        x: m.x,
                        y: m.y,
                        glyph: glyphs::NEWT,
                        name: m.name.clone(),
                        hostile: m.hostile,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn objects_at(&self, x: i32, y: i32) -> Vec<ObjectInfo> {
        self.level().map(|l| l.objects_at(x, y)).unwrap_or_default()
    }

    fn stairways(&self) -> Vec<Stairway> {
        self.level().map(Level::stairways).unwrap_or_default()
    }

    fn dungeon_overview(&self) -> Vec<OverviewEntry> {
        self.overview
            .iter()
            .map(|(&ledger, features)| OverviewEntry {
                dungeon: DUNGEON_NAME.to_string(),
                level: i32::from(ledger),
                ledger,
                features: features.clone(),
                annotation: None,
            })
            .collect()
    }

    fn discovered_monsters(&self) -> Vec<DiscoveredMonster> {
        self.discovered
            .iter()
            .map(|(name, &(seen, killed))| DiscoveredMonster {
                name: name.clone(),
                seen,
                killed,
            })
            .collect()
    }

    fn is_gameover(&self) -> bool {
        self.state.gameover
    }
}

impl Engine for SimEngine {
    fn reset_globals(&mut self) {
        let probe = Arc::clone(&self.probe);
        *self = SimEngine::new(probe);
    }

    fn early_init(&mut self, heap: &'static FixedHeap) {
        self.heap = Some(heap);
        self.state = ProgramState::default();
    }

    fn sf_init(&mut self) {
        log::trace!("savefile procedures installed");
    }

    fn set_file_prefixes(&mut self, prefixes: &FilePrefixes) {
        self.prefixes = Some(prefixes.clone());
    }

    fn dlb_init(&mut self) -> Result<()> {
        let data = self.prefixes()?.data;
        if !data.is_dir() {
            return Err(BridgeError::Engine(format!("data directory {} missing", data.display())));
        }
        self.dlb_open = true;
        Ok(())
    }

    fn dlb_cleanup(&mut self) {
        self.dlb_open = false;
    }

    fn scripting_init(&mut self) {
        self.scripting = true;
    }

    fn scripting_shutdown(&mut self) {
        self.scripting = false;
    }

    fn status_finish(&mut self) {
        self.status_ready = false;
    }

    fn free_dynamic_data(&mut self) {
        self.free_inventory();
        let blocks: Vec<HeapPtr> = std::mem::take(&mut self.level_blocks).into_values().collect();
        for block in blocks {
            self.heap_free(block);
        }
        let levels = self.levels.len();
        self.levels.clear();
        self.timers.clear();
        self.inventory.clear();
        self.roots = EngineRoots::default();
        log::debug!("freed {} resident levels", levels);
    }

    fn apply_options(&mut self, options: &GameOptions) {
        self.wizard = options.debug;
    }

    fn apply_symbol_overrides(&mut self, symbols: &SymbolOverrides) {
        if let Some(boulder) = symbols.boulder {
            self.boulder = boulder;
        }
    }

    fn window_setup(&self) -> WindowSetup {
        WindowSetup {
            banner: vec![
                "NetHack, Copyright 1985-2023".to_string(),
                "         By Stichting Mathematisch Centrum and M. Stephenson.".to_string(),
            ],
            glyph_chars: glyphs::table(),
        }
    }

    fn set_window_ids(&mut self, ids: WindowIds) {
        self.ids = ids;
    }

    fn newgame(&mut self, preset: &CharacterPreset, win: &mut dyn WindowProcs) -> Result<()> {
        self.hero = Hero::from_preset(preset)?;
        self.plname = if preset.name.trim().is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            preset.name.clone()
        };
        self.moves = 1;
        self.inventory = starting_kit(&self.hero.role);
        self.alloc_inventory();
        for (obj, mask) in self.worn_inventory() {
            self.setworn(Some(obj), mask);
        }
        self.timers = vec![
            SimTimer {
                id: 1,
                kind: TimerKind::BurnLight,
                when: 1_500,
                ledger: None,
                object: Some(LAMP_ID),
                needs_fixup: false,
            },
            SimTimer {
                id: 2,
                kind: TimerKind::RotCorpse,
                when: 2_000,
                ledger: None,
                object: Some(ORPHAN_OBJECT),
                needs_fixup: true,
            },
        ];
        self.enter_level(1)?;
        (self.hero.x, self.hero.y) = UP_STAIRS;
        self.roots.current_fruit = 1;
        self.state.something_worth_saving = true;
        self.vision_init();
        self.status_initialize(false);
        self.docrt(win);
        self.welcome(win, true);
        self.flush_screen(win);
        log::info!("new game: {} the {}", self.plname, self.hero.role);
        Ok(())
    }

    fn moveloop(&mut self, resume: bool, win: &mut dyn WindowProcs) -> LoopExit {
        if resume {
            log::debug!("move loop resumed on turn {}", self.moves);
        }
        loop {
            if let Some(command) = win.take_canned_command() {
                match command {
                    EngineCommand::Save => {
                        self.probe.update(|r| r.saves_requested += 1);
                        return LoopExit::SaveRequested;
                    }
                    EngineCommand::Retravel => log::debug!("no travel destination remembered"),
                }
            }
            self.bot(win);
            win.wait_synch(&*self);
            self.publish(true);
            let key = win.poskey();
            match self.command(key, win) {
                Ok(Some(exit)) => return exit,
                Ok(None) => {}
                Err(err) => {
                    log::error!("command {:?} failed: {}", key as char, err);
                    win.putstr(self.ids.message, 0, "You feel a strange vibration.");
                }
            }
        }
    }

    fn state(&self) -> &ProgramState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProgramState {
        &mut self.state
    }

    fn roots(&self) -> &EngineRoots {
        &self.roots
    }

    fn roots_mut(&mut self) -> &mut EngineRoots {
        &mut self.roots
    }

    fn current_ledger(&self) -> i16 {
        self.current
    }

    fn max_ledger(&self) -> i16 {
        self.max_ledger
    }

    fn level_file_exists(&self, ledger: i16) -> bool {
        self.prefixes
            .as_ref()
            .is_some_and(|p| p.level_file(ledger).is_file())
    }

    fn hackpid(&self) -> i32 {
        std::process::id() as i32
    }

    fn set_plname(&mut self, name: &str) {
        self.plname = name.to_string();
    }

    fn save_filename(&self) -> Option<String> {
        self.save_filename.clone()
    }

    fn set_save_filename(&mut self, name: &str) {
        self.save_filename = Some(name.to_string());
    }

    fn store_version(&mut self, f: &mut NhFile) -> Result<()> {
        f.write_version_header(&VERSION, &CRITICAL_SIZES)
    }

    fn uptodate(&mut self, f: &mut NhFile) -> Result<()> {
        let (info, critical) = f.read_version_header()?;
        if info != VERSION || critical != CRITICAL_SIZES {
            return Err(BridgeError::SaveFormat {
                path: f.path().to_path_buf(),
                reason: format!("version {:#x} is not {:#x}", info.incarnation, VERSION.incarnation),
            });
        }
        Ok(())
    }

    fn savelev(&mut self, f: &mut NhFile, ledger: i16) -> Result<()> {
        self.level_record(ledger)?.write_record(f)?;
        if f.is_freeing() {
            self.release_level(ledger);
        }
        Ok(())
    }

    fn getlev(&mut self, f: &mut NhFile) -> Result<i16> {
        let level = Level::read_record(f)?;
        let ledger = level.ledger;
        self.load_level(level);
        Ok(ledger)
    }

    fn savegamestate(&mut self, f: &mut NhFile) -> Result<()> {
        f.write_str(&serde_json::to_string(&self.game_state())?)?;
        if f.is_freeing() {
            self.free_inventory();
        }
        Ok(())
    }

    fn restgamestate(&mut self, f: &mut NhFile) -> Result<()> {
        let state: GameState = serde_json::from_str(&f.read_str(RECORD_MAX)?)?;
        self.free_inventory();
        self.plname = state.plname;
        self.moves = state.moves;
        self.hero = state.hero;
        self.current = state.current;
        self.max_ledger = state.max_ledger;
        self.inventory = state.inventory;
        self.overview = state.overview;
        self.discovered = state.discovered;
        self.wizard = state.wizard;
        self.roots.current_fruit = state.current_fruit;
        self.alloc_inventory();

        self.timers.retain(|t| t.ledger.is_some());
        self.timers.splice(0..0, state.timers);
        self.relink_timers();
        self.state.something_worth_saving = true;
        Ok(())
    }

    fn u_restore_save_shadows(&mut self) {
        log::trace!("save shadows restored");
    }

    fn done_object_cleanup(&mut self) {
        let combat = &mut self.roots.combat;
        let thrown = combat.thrown_object.take();
        let kicked = combat.kicked_object.take();
        if thrown.is_some() || kicked.is_some() {
            log::debug!("in-flight object put down before saving");
        }
    }

    fn vision_recalc(&mut self, control: i32) {
        self.vision = Some(control);
    }

    fn change_luck_for_date(&mut self, sign: i32) {
        self.hero.luck += sign * DATE_LUCK;
    }

    fn timer_count(&self) -> usize {
        self.timers.len()
    }

    fn truncate_timers(&mut self, keep: usize) -> usize {
        let removed = self.timers.len().saturating_sub(keep);
        self.timers.truncate(keep);
        removed
    }

    fn relink_timers(&mut self) {
        let present: Vec<bool> = self
            .timers
            .iter()
            .map(|t| t.object.is_none_or(|id| self.object_present(id)))
            .collect();
        for (timer, found) in self.timers.iter_mut().zip(present) {
            timer.needs_fixup = !found;
        }
    }

    fn timers_needing_fixup(&self) -> usize {
        self.timers.iter().filter(|t| t.needs_fixup).count()
    }

    fn worn_inventory(&self) -> Vec<(HeapPtr, WornMask)> {
        self.inventory
            .iter()
            .filter(|item| item.worn != 0)
            .filter_map(|item| item.block.map(|block| (block, item.worn_mask())))
            .collect()
    }

    fn setworn(&mut self, obj: Option<HeapPtr>, mask: WornMask) {
        for bit in mask.iter() {
            if let Some(slot) = self.roots.worn.slot_mut(bit) {
                *slot = obj;
            }
        }
    }

    fn init_objects_probs(&mut self) {
        log::trace!("object probabilities initialized");
    }

    fn status_initialize(&mut self, reassess_only: bool) {
        if reassess_only && !self.status_ready {
            log::debug!("status reassessed before the first init");
        }
        self.status_ready = true;
    }

    fn reset_status_blinit(&mut self) {
        self.status_ready = false;
    }

    fn vision_init(&mut self) {
        self.vision = Some(0);
    }

    fn vision_reset(&mut self) {
        let (x, y) = (self.hero.x, self.hero.y);
        if let Some(level) = self.levels.get_mut(&self.current) {
            level.see_room();
            level.see(x, y);
        }
    }

    fn run_timers(&mut self) {
        let moves = self.moves;
        let (due, pending): (Vec<SimTimer>, Vec<SimTimer>) = std::mem::take(&mut self.timers)
            .into_iter()
            .partition(|t| t.when <= moves && !t.needs_fixup);
        self.timers = pending;
        for timer in due {
            log::debug!("timer {} ({:?}) fired on turn {}", timer.id, timer.kind, moves);
        }
    }

    fn docrt(&mut self, win: &mut dyn WindowProcs) {
        let map = self.ids.map;
        win.clear_nhwindow(map);
        if let Some(level) = self.level() {
            for (x, y, kind) in level.seen_cells() {
                let glyph = glyphs::info(glyphs::terrain(kind), 7, GlyphFlags::empty());
                win.print_glyph(map, x, y, &glyph, &GlyphInfo::BLANK);
            }
            for obj in &level.objects {
                let flags = if obj.contents.is_some() {
                    GlyphFlags::PILE
                } else {
                    GlyphFlags::empty()
                };
                let glyph = glyphs::info(glyphs::object(obj.class), 11, flags);
                win.print_glyph(map, obj.x, obj.y, &glyph, &GlyphInfo::BLANK);
            }
            for mon in &level.monsters {
                let glyph = glyphs::info(glyphs::NEWT, 3, GlyphFlags::empty());
                win.print_glyph(map, mon.x, mon.y, &glyph, &GlyphInfo::BLANK);
            }
        }
        self.paint_hero(win);
        win.display_nhwindow(map, false);
    }

    fn flush_screen(&mut self, win: &mut dyn WindowProcs) {
        win.flush_screen();
        self.publish(false);
    }

    fn welcome(&mut self, win: &mut dyn WindowProcs, new_game: bool) {
        let h = &self.hero;
        let text = if new_game {
            format!(
                "Hello {}, welcome to NetHack!  You are a {} {} {} {}.",
                self.plname, h.alignment, h.gender, h.race, h.role
            )
        } else {
            format!("Hello {}, welcome back to NetHack!", self.plname)
        };
        win.putstr(self.ids.message, 0, &text);
        self.change_luck_for_date(1);
        win.putstr(self.ids.message, 0, "You are lucky!  Full moon tonight.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_heap() -> SimEngine {
        let heap: &'static FixedHeap = Box::leak(Box::new(FixedHeap::new(1 << 20)));
        let mut engine = SimEngine::new(Arc::new(SimProbe::new()));
        engine.early_init(heap);
        engine
    }

    #[test]
    fn test_resident_level_timers_join_the_chain() {
        let mut engine = engine_with_heap();
        engine.load_level(Level::generate(2));
        assert_eq!(engine.timer_count(), 1);
        assert_eq!(engine.timers_needing_fixup(), 0);

        let record = engine.level_record(2).unwrap();
        assert_eq!(record.timers.len(), 1);
        engine.release_level(2);
        assert_eq!(engine.timer_count(), 0);
        assert!(engine.level_blocks.is_empty());
    }

    #[test]
    fn test_reloading_a_level_does_not_duplicate_timers() {
        let mut engine = engine_with_heap();
        engine.load_level(Level::generate(1));
        engine.load_level(Level::generate(1));
        assert_eq!(engine.timer_count(), 1);
        assert_eq!(engine.level_blocks.len(), 1);
    }

    #[test]
    fn test_orphan_timer_stays_unresolved() {
        let mut engine = engine_with_heap();
        engine.timers.push(SimTimer {
            id: 7,
            kind: TimerKind::RotCorpse,
            when: 10,
            ledger: None,
            object: Some(ORPHAN_OBJECT),
            needs_fixup: false,
        });
        engine.relink_timers();
        assert_eq!(engine.timers_needing_fixup(), 1);
        engine.moves = 20;
        engine.run_timers();
        assert_eq!(engine.timer_count(), 1, "unresolved timers never fire");
    }

    #[test]
    fn test_setworn_fills_every_bit() {
        let mut engine = engine_with_heap();
        let ptr = engine.heap_alloc(1, ITEM_BLOCK);
        engine.setworn(ptr, WornMask::RINGL | WornMask::RINGR);
        assert_eq!(engine.roots.worn.occupied(), 2);
        engine.setworn(None, WornMask::RINGL);
        assert_eq!(engine.roots.worn.occupied(), 1);
    }

    #[test]
    fn test_truncate_reports_removed() {
        let mut engine = engine_with_heap();
        engine.load_level(Level::generate(1));
        engine.load_level(Level::generate(2));
        assert_eq!(engine.truncate_timers(1), 1);
        assert_eq!(engine.truncate_timers(5), 0);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("lawful"), "Lawful");
        assert_eq!(capitalize(""), "");
    }
}
