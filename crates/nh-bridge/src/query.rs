//! Per-turn query cache.
//!
//! Host threads may not call into the engine, so the engine thread copies
//! what the query bridges need at every `wait_synch`. Lookups against the
//! cache are cheap and safe from any thread.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{MAX_COLNO, MAX_ROWNO};
use crate::engine::{DiscoveredMonster, GameView, ObjectInfo, OverviewEntry, Terrain};
use crate::roots::EngineRoots;
use crate::Result;

#[derive(Debug, Clone)]
pub struct QueryCache {
    turn: i64,
    terrain: Vec<Option<Terrain>>,
    objects: HashMap<(i32, i32), Vec<ObjectInfo>>,
    discovered: Vec<DiscoveredMonster>,
    overview: Vec<OverviewEntry>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self {
            turn: 0,
            terrain: vec![None; MAX_COLNO as usize * MAX_ROWNO as usize],
            objects: HashMap::new(),
            discovered: Vec::new(),
            overview: Vec::new(),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

impl QueryCache {
    pub fn turn(&self) -> i64 {
        self.turn
    }

    pub fn refresh(&mut self, view: &dyn GameView) {
        self.turn = view.moves();
        self.objects.clear();
        for x in 0..MAX_COLNO as i32 {
            for y in 0..MAX_ROWNO as i32 {
                let Some(idx) = EngineRoots::grid_index(x, y) else { continue };
                let terrain = view.terrain_at(x, y);
                self.terrain[idx] = terrain;
                if terrain.is_some_and(|t| t.seen) {
                    let here = view.objects_at(x, y);
                    if !here.is_empty() {
                        self.objects.insert((x, y), here);
                    }
                }
            }
        }
        self.discovered = view.discovered_monsters();
        self.overview = view.dungeon_overview();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn check(x: i32, y: i32, what: &str) -> bool {
        if EngineRoots::grid_index(x, y).is_none() {
            log::warn!("{} query at invalid coordinates ({}, {})", what, x, y);
            return false;
        }
        true
    }

    pub fn terrain_at(&self, x: i32, y: i32) -> Option<Terrain> {
        if !Self::check(x, y, "terrain") {
            return None;
        }
        EngineRoots::grid_index(x, y).and_then(|i| self.terrain[i])
    }

    pub fn objects_at(&self, x: i32, y: i32) -> &[ObjectInfo] {
        if !Self::check(x, y, "objects") {
            return &[];
        }
        self.objects.get(&(x, y)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn objects_at_json(&self, x: i32, y: i32) -> Result<String> {
        to_json(self.objects_at(x, y))
    }

    /// Containers at `(x, y)` whose contents are known, with their contents.
    pub fn containers_at_json(&self, x: i32, y: i32) -> Result<String> {
        let containers: Vec<&ObjectInfo> = self.objects_at(x, y).iter().filter(|o| o.contents.is_some()).collect();
        to_json(&containers)
    }

    pub fn terrain_at_json(&self, x: i32, y: i32) -> Result<String> {
        to_json(&self.terrain_at(x, y))
    }

    pub fn discovered_monsters_json(&self) -> Result<String> {
        to_json(&self.discovered)
    }

    pub fn dungeon_overview_json(&self) -> Result<String> {
        to_json(&self.overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TerrainKind;

    #[test]
    fn test_invalid_coordinates_are_empty() {
        let cache = QueryCache::default();
        assert!(cache.objects_at(-1, 0).is_empty());
        assert!(cache.objects_at(80, 0).is_empty());
        assert_eq!(cache.terrain_at(0, 21), None);
        assert_eq!(cache.objects_at_json(500, 500).unwrap(), "[]");
        assert_eq!(cache.terrain_at_json(-5, 2).unwrap(), "null");
    }

    #[test]
    fn test_containers_filter() {
        let mut cache = QueryCache::default();
        let coin = ObjectInfo {
            id: 1,
            name: "gold piece".into(),
            class: '$',
            quantity: 12,
            glyph: 1,
            contents: None,
        };
        let sack = ObjectInfo {
            id: 2,
            name: "sack".into(),
            class: '(',
            quantity: 1,
            glyph: 2,
            contents: Some(vec![coin.clone()]),
        };
        cache.objects.insert((3, 4), vec![coin, sack]);
        cache.terrain[EngineRoots::grid_index(3, 4).unwrap()] = Some(Terrain {
            kind: TerrainKind::Room,
            lit: true,
            seen: true,
        });
        assert_eq!(cache.objects_at(3, 4).len(), 2);
        let json = cache.containers_at_json(3, 4).unwrap();
        assert!(json.contains("sack"));
        assert!(json.starts_with("[{"));
        assert_eq!(json.matches("\"id\":").count(), 2);
        assert!(cache.terrain_at_json(3, 4).unwrap().contains("\"room\""));
    }
}
