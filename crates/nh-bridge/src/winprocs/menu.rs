//! Menu accumulator and the fallback selection rules used when the host
//! has no menu callback.

use super::{MenuItem, MenuPick, WinId};

/// Items kept per menu; further `add_menu` calls are dropped.
pub const MAX_MENU_ITEMS: usize = 256;
/// How many items a `PICK_ANY` menu selects without a host callback.
pub const PICK_ANY_AUTOSELECT: usize = 3;

#[derive(Debug, Default)]
pub struct MenuState {
    window: Option<WinId>,
    items: Vec<MenuItem>,
    prompt: Option<String>,
    dropped: usize,
}

impl MenuState {
    pub fn start(&mut self, win: WinId) {
        self.clear();
        self.window = Some(win);
    }

    pub fn add(&mut self, item: MenuItem) -> bool {
        if self.items.len() >= MAX_MENU_ITEMS {
            self.dropped += 1;
            if self.dropped == 1 {
                log::warn!("menu full ({} items); dropping {:?}", MAX_MENU_ITEMS, item.text);
            }
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn end(&mut self, prompt: Option<&str>) {
        self.prompt = prompt.map(str::to_string);
    }

    pub fn window(&self) -> Option<WinId> {
        self.window
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Zero the accumulator.
    pub fn clear(&mut self) {
        self.items.clear();
        self.prompt = None;
        self.window = None;
        self.dropped = 0;
    }

    pub fn is_tutorial(&self) -> bool {
        self.prompt
            .as_deref()
            .is_some_and(|p| p.to_ascii_lowercase().contains("tutorial"))
    }

    /// The "no" answer of a tutorial menu.
    pub fn tutorial_pick(&self) -> Option<MenuPick> {
        self.items
            .iter()
            .filter(|i| i.is_selectable())
            .find(|i| i.selector == b'n' || i.text.to_ascii_lowercase().starts_with("no"))
            .map(|i| MenuPick {
                identifier: i.identifier,
                count: -1,
            })
    }

    /// The selectable item bound to `selector`.
    pub fn pick_for_selector(&self, selector: u8) -> Option<MenuPick> {
        self.items
            .iter()
            .find(|i| i.is_selectable() && i.selector == selector)
            .map(|i| MenuPick {
                identifier: i.identifier,
                count: -1,
            })
    }

    /// The first `limit` selectable items.
    pub fn autoselect(&self, limit: usize) -> Vec<MenuPick> {
        self.items
            .iter()
            .filter(|i| i.is_selectable())
            .take(limit)
            .map(|i| MenuPick {
                identifier: i.identifier,
                count: -1,
            })
            .collect()
    }

    /// Translate host `(item_index, count)` pairs. Out-of-range indices and
    /// headers are ignored.
    pub fn picks_from_indices(&self, selected: &[(usize, i64)]) -> Vec<MenuPick> {
        selected
            .iter()
            .filter_map(|&(idx, count)| {
                let item = self.items.get(idx)?;
                if !item.is_selectable() {
                    log::debug!("host selected non-selectable menu item {}", idx);
                    return None;
                }
                Some(MenuPick {
                    identifier: item.identifier,
                    count,
                })
            })
            .collect()
    }
}
