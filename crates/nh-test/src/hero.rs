//! The hero: identity tables, vitals and the starting kit.

use nh_bridge::engine::{CharacterIdentity, CharacterPreset};
use nh_bridge::roots::WornMask;
use nh_bridge::{BridgeError, Result};
use nh_heap::HeapPtr;
use serde::{Deserialize, Serialize};

/// Role table in the engine's order; index 11 is the Valkyrie.
pub const ROLES: [&str; 13] = [
    "Archeologist",
    "Barbarian",
    "Caveman",
    "Healer",
    "Knight",
    "Monk",
    "Priest",
    "Rogue",
    "Ranger",
    "Samurai",
    "Tourist",
    "Valkyrie",
    "Wizard",
];
pub const RACES: [&str; 5] = ["human", "elf", "dwarf", "gnome", "orc"];
pub const GENDERS: [&str; 2] = ["male", "female"];
pub const ALIGNMENTS: [&str; 3] = ["lawful", "neutral", "chaotic"];

pub const VALKYRIE: i32 = 11;

/// Object id no level or inventory ever holds. A timer pointing at it can
/// never be relinked.
pub const ORPHAN_OBJECT: u32 = 9_999;

fn pick(table: &[&str], index: i32, what: &str) -> Result<String> {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .map(|s| s.to_string())
        .ok_or_else(|| BridgeError::Engine(format!("unknown {what} index {index}")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub role: String,
    pub race: String,
    pub gender: String,
    pub alignment: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub hp_max: i32,
    pub pw: i32,
    pub pw_max: i32,
    pub level: i32,
    pub experience: i64,
    pub ac: i32,
    pub gold: i64,
    pub hunger: i32,
    pub luck: i32,
}

impl Hero {
    pub fn from_preset(preset: &CharacterPreset) -> Result<Self> {
        let role = pick(&ROLES, preset.role, "role")?;
        let hp_max = if preset.role == VALKYRIE { 16 } else { 12 };
        Ok(Self {
            role,
            race: pick(&RACES, preset.race, "race")?,
            gender: pick(&GENDERS, preset.gender, "gender")?,
            alignment: pick(&ALIGNMENTS, preset.alignment, "alignment")?,
            hp: hp_max,
            hp_max,
            pw: 1,
            pw_max: 1,
            level: 1,
            ac: 6,
            gold: 42,
            ..Default::default()
        })
    }

    pub fn identity(&self, name: &str) -> CharacterIdentity {
        CharacterIdentity {
            name: name.to_string(),
            role: self.role.clone(),
            race: self.race.clone(),
            gender: self.gender.clone(),
            alignment: self.alignment.clone(),
        }
    }

    /// Rank title for experience level 1-2.
    pub fn title(&self) -> &'static str {
        match self.role.as_str() {
            "Valkyrie" => "Stripling",
            "Wizard" => "Evoker",
            "Samurai" => "Hatamoto",
            _ => "Novice",
        }
    }

    pub fn score(&self, moves: i64) -> i64 {
        self.experience * 4 + self.gold + moves / 10
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: u32,
    pub letter: char,
    pub name: String,
    pub class: char,
    pub quantity: i64,
    /// `owornmask` bits.
    pub worn: u32,
    /// Heap block standing in for the object struct.
    #[serde(skip)]
    pub block: Option<HeapPtr>,
}

impl InventoryItem {
    fn new(id: u32, letter: char, name: &str, class: char, worn: WornMask) -> Self {
        Self {
            id,
            letter,
            name: name.to_string(),
            class,
            quantity: 1,
            worn: worn.bits(),
            block: None,
        }
    }

    pub fn worn_mask(&self) -> WornMask {
        WornMask::from_bits_truncate(self.worn)
    }

    /// Inventory line as the engine prints it.
    pub fn describe(&self) -> String {
        let worn = self.worn_mask();
        let suffix = if worn.contains(WornMask::WEP) {
            " (weapon in hand)"
        } else if worn.intersects(WornMask::ARM | WornMask::ARMS | WornMask::ARMH | WornMask::ARMC) {
            " (being worn)"
        } else {
            ""
        };
        format!("{} - {}{}", self.letter, self.name, suffix)
    }
}

/// Lamp in the starting kit; carries a burn timer.
pub const LAMP_ID: u32 = 5;

pub fn starting_kit(role: &str) -> Vec<InventoryItem> {
    let mut kit = match role {
        "Valkyrie" => vec![
            InventoryItem::new(1, 'a', "+1 long sword", ')', WornMask::WEP),
            InventoryItem::new(2, 'b', "+0 dagger", ')', WornMask::empty()),
            InventoryItem::new(3, 'c', "+3 small shield", '[', WornMask::ARMS),
        ],
        _ => vec![
            InventoryItem::new(1, 'a', "quarterstaff", ')', WornMask::WEP),
            InventoryItem::new(3, 'c', "cloak", '[', WornMask::ARMC),
        ],
    };
    kit.push(InventoryItem::new(4, 'd', "food ration", '%', WornMask::empty()));
    kit.push(InventoryItem::new(LAMP_ID, 'e', "oil lamp (lit)", '(', WornMask::empty()));
    kit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(role: i32) -> CharacterPreset {
        CharacterPreset {
            name: "Hero".into(),
            role,
            race: 0,
            gender: 1,
            alignment: 0,
        }
    }

    #[test]
    fn test_valkyrie_preset() {
        let hero = Hero::from_preset(&preset(VALKYRIE)).unwrap();
        assert_eq!(hero.role, "Valkyrie");
        assert_eq!(hero.race, "human");
        assert_eq!(hero.gender, "female");
        assert_eq!(hero.alignment, "lawful");
        assert_eq!(hero.hp, hero.hp_max);
        assert_eq!(hero.title(), "Stripling");
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(Hero::from_preset(&preset(42)), Err(BridgeError::Engine(_))));
        assert!(Hero::from_preset(&preset(-1)).is_err());
    }

    #[test]
    fn test_kit_describes_worn_items() {
        let kit = starting_kit("Valkyrie");
        assert_eq!(kit[0].describe(), "a - +1 long sword (weapon in hand)");
        assert_eq!(kit[2].describe(), "c - +3 small shield (being worn)");
        assert!(kit.iter().any(|i| i.id == LAMP_ID));
    }
}
