//! Character status cache.
//!
//! The engine pushes bottom-line fields one at a time through
//! `status_update`; the cache keeps the latest value of each and is exposed
//! to the host as per-field getters and one JSON document.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::engine::GameView;
use crate::queue::StatusLine;
use crate::Result;

/// Bottom-line fields the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StatusField {
    Title,
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
    Alignment,
    Score,
    Carrying,
    Gold,
    Power,
    PowerMax,
    ExperienceLevel,
    Experience,
    ArmorClass,
    Time,
    Hunger,
    HitPoints,
    HitPointsMax,
    DungeonLevel,
    Conditions,
    /// End of an update batch.
    Flush,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterStatus {
    pub name: String,
    pub role: String,
    pub race: String,
    pub gender: String,
    pub alignment: String,
    pub title: String,
    /// Kept as text for the `18/xx` form.
    pub strength: String,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
    pub score: i64,
    pub carrying: String,
    pub gold: i64,
    pub hp: i32,
    pub hp_max: i32,
    pub pw: i32,
    pub pw_max: i32,
    pub level: i32,
    pub experience: i64,
    pub ac: i32,
    pub turns: i64,
    pub hunger: String,
    pub dungeon_level: i32,
    pub conditions: Vec<String>,
}

fn num<T: std::str::FromStr + Default>(value: &str) -> T {
    let trimmed = value.trim();
    let digits = trimmed
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '-'))
        .split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .next()
        .unwrap_or("");
    digits.parse().unwrap_or_default()
}

impl CharacterStatus {
    /// Store one field. Returns `true` for `Flush`.
    pub fn apply(&mut self, field: StatusField, value: &str) -> bool {
        let text = value.trim().to_string();
        match field {
            StatusField::Title => self.title = text,
            StatusField::Strength => self.strength = text,
            StatusField::Dexterity => self.dexterity = num(value),
            StatusField::Constitution => self.constitution = num(value),
            StatusField::Intelligence => self.intelligence = num(value),
            StatusField::Wisdom => self.wisdom = num(value),
            StatusField::Charisma => self.charisma = num(value),
            StatusField::Alignment => self.alignment = text,
            StatusField::Score => self.score = num(value),
            StatusField::Carrying => self.carrying = text,
            StatusField::Gold => self.gold = num(value),
            StatusField::Power => self.pw = num(value),
            StatusField::PowerMax => self.pw_max = num(value),
            StatusField::ExperienceLevel => self.level = num(value),
            StatusField::Experience => self.experience = num(value),
            StatusField::ArmorClass => self.ac = num(value),
            StatusField::Time => self.turns = num(value),
            StatusField::Hunger => self.hunger = text,
            StatusField::HitPoints => self.hp = num(value),
            StatusField::HitPointsMax => self.hp_max = num(value),
            StatusField::DungeonLevel => self.dungeon_level = num(value),
            StatusField::Conditions => {
                self.conditions = value.split_whitespace().map(str::to_string).collect();
            }
            StatusField::Flush => return true,
        }
        false
    }

    /// Pull the numeric fields and identity straight from the engine.
    pub fn refresh_from(&mut self, view: &dyn GameView) {
        let v = view.vitals();
        let id = view.identity();
        self.name = id.name;
        self.role = id.role;
        self.race = id.race;
        self.gender = id.gender;
        self.alignment = id.alignment;
        self.hp = v.hp;
        self.hp_max = v.hp_max;
        self.pw = v.pw;
        self.pw_max = v.pw_max;
        self.level = v.level;
        self.experience = v.experience;
        self.ac = v.ac;
        self.gold = v.gold;
        self.score = v.score;
        self.dungeon_level = v.dungeon_level;
        self.turns = view.moves();
    }

    pub fn to_status_line(&self) -> StatusLine {
        let mut line = StatusLine {
            hp: self.hp,
            hp_max: self.hp_max,
            pw: self.pw,
            pw_max: self.pw_max,
            level: self.level,
            ac: self.ac,
            gold: self.gold,
            dungeon_level: self.dungeon_level,
            turns: self.turns,
            ..Default::default()
        };
        line.set_alignment(&self.alignment);
        line
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_apply_parses_numbers_loosely() {
        let mut s = CharacterStatus::default();
        s.apply(StatusField::HitPoints, " 14");
        s.apply(StatusField::Gold, "$:37");
        s.apply(StatusField::DungeonLevel, "Dlvl:3");
        s.apply(StatusField::ArmorClass, "-2");
        s.apply(StatusField::Strength, "18/50");
        assert_eq!(s.hp, 14);
        assert_eq!(s.gold, 37);
        assert_eq!(s.dungeon_level, 3);
        assert_eq!(s.ac, -2);
        assert_eq!(s.strength, "18/50");
    }

    #[test]
    fn test_flush_and_conditions() {
        let mut s = CharacterStatus::default();
        assert!(!s.apply(StatusField::Conditions, "Blind Stun"));
        assert_eq!(s.conditions, vec!["Blind", "Stun"]);
        assert!(s.apply(StatusField::Flush, ""));
    }

    #[test]
    fn test_field_names() {
        assert_eq!(StatusField::HitPointsMax.to_string(), "hit_points_max");
        assert_eq!(StatusField::from_str("gold").unwrap(), StatusField::Gold);
    }

    #[test]
    fn test_json_and_status_line() {
        let mut s = CharacterStatus {
            alignment: "Lawful".into(),
            hp: 16,
            hp_max: 16,
            ..Default::default()
        };
        s.turns = 42;
        let line = s.to_status_line();
        assert_eq!(line.alignment_str(), "Lawful");
        assert_eq!(line.turns, 42);
        let back: CharacterStatus = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
