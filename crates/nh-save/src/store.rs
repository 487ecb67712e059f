//! Character-scoped save directories.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{Result, SAVEGAME_FILE, SaveError, SaveMetadata, copy_atomic};

/// Upper bound on numbered slots per character.
pub const MAX_SLOTS_PER_CHARACTER: usize = 3;

const CHARACTERS_DIR: &str = "characters";
const SLOT_PREFIX: &str = "slot_";
const MAX_NAME_LEN: usize = 64;

/// Directory-safe form of a character name.
///
/// ASCII letters, digits, `-` and `_` are kept; everything else becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .take(MAX_NAME_LEN)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        String::from("unnamed")
    } else {
        cleaned
    }
}

/// One entry of [`CharacterStore::list_characters`].
#[derive(Debug, Clone, Serialize)]
pub struct CharacterSummary {
    /// Directory name (sanitized).
    pub dir_name: String,
    pub metadata: SaveMetadata,
    pub slots: Vec<u32>,
}

/// Save directories under `$DOCS/characters`.
#[derive(Debug, Clone)]
pub struct CharacterStore {
    root: PathBuf,
}

impl CharacterStore {
    /// `docs_root` is the host's writable documents directory.
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            root: docs_root.into().join(CHARACTERS_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn character_dir(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_name(name))
    }

    pub fn slot_dir(&self, name: &str, slot: u32) -> PathBuf {
        self.character_dir(name).join(format!("{SLOT_PREFIX}{slot:05}"))
    }

    pub fn character_exists(&self, name: &str) -> bool {
        self.character_dir(name).join(SAVEGAME_FILE).exists()
    }

    /// Copy an engine save into the character directory and write metadata.
    pub fn save_character(&self, source: &Path, metadata: &SaveMetadata) -> Result<SaveMetadata> {
        let dir = self.character_dir(&metadata.character_name);
        Self::store_into(&dir, source, metadata)
    }

    /// Copy the character's save to `dest` (usually `$DOCS/save/savegame`).
    pub fn load_character(&self, name: &str, dest: &Path) -> Result<SaveMetadata> {
        Self::load_from(&self.character_dir(name), dest)
    }

    /// Save into numbered slot `slot`. Overwriting an existing slot is always
    /// allowed; creating a new one fails once the character holds
    /// [`MAX_SLOTS_PER_CHARACTER`] slots.
    pub fn save_slot(&self, slot: u32, source: &Path, metadata: &SaveMetadata) -> Result<SaveMetadata> {
        if slot == 0 {
            return Err(SaveError::InvalidSlot(slot));
        }
        let name = &metadata.character_name;
        let dir = self.slot_dir(name, slot);
        if !dir.exists() && self.list_slots(name)?.len() >= MAX_SLOTS_PER_CHARACTER {
            return Err(SaveError::SlotLimit {
                name: name.clone(),
                max: MAX_SLOTS_PER_CHARACTER,
            });
        }
        Self::store_into(&dir, source, metadata)
    }

    pub fn load_slot(&self, name: &str, slot: u32, dest: &Path) -> Result<SaveMetadata> {
        Self::load_from(&self.slot_dir(name, slot), dest)
    }

    /// Slot numbers in ascending order.
    pub fn list_slots(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.character_dir(name);
        let mut slots = Vec::new();
        if !dir.exists() {
            return Ok(slots);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let slot = entry
                .file_name()
                .to_str()
                .and_then(|n| n.strip_prefix(SLOT_PREFIX))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(slot) = slot {
                slots.push(slot);
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }

    pub fn delete_slot(&self, name: &str, slot: u32) -> Result<()> {
        let dir = self.slot_dir(name, slot);
        if !dir.exists() {
            return Err(SaveError::NotFound(dir));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    /// Every character with readable metadata, most recently saved first.
    pub fn list_characters(&self) -> Result<Vec<CharacterSummary>> {
        let mut found = Vec::new();
        if !self.root.exists() {
            return Ok(found);
        }
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match SaveMetadata::load(&entry.path()) {
                Ok(metadata) => {
                    let slots = self.list_slots(&dir_name)?;
                    found.push(CharacterSummary {
                        dir_name,
                        metadata,
                        slots,
                    });
                }
                Err(err) => log::warn!("skipping character dir {}: {}", dir_name, err),
            }
        }
        found.sort_by(|a, b| b.metadata.last_saved.cmp(&a.metadata.last_saved));
        Ok(found)
    }

    /// Remove the character directory with all its slots.
    pub fn delete_character(&self, name: &str) -> Result<()> {
        let dir = self.character_dir(name);
        if !dir.exists() {
            return Err(SaveError::NotFound(dir));
        }
        fs::remove_dir_all(&dir)?;
        log::info!("deleted character {}", dir.display());
        Ok(())
    }

    /// Remove every character directory.
    pub fn wipe(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn store_into(dir: &Path, source: &Path, metadata: &SaveMetadata) -> Result<SaveMetadata> {
        fs::create_dir_all(dir)?;
        let bytes = copy_atomic(source, &dir.join(SAVEGAME_FILE))?;
        let merged = metadata.store(dir)?;
        log::info!("saved {} ({} bytes) to {}", merged.character_name, bytes, dir.display());
        Ok(merged)
    }

    fn load_from(dir: &Path, dest: &Path) -> Result<SaveMetadata> {
        let save = dir.join(SAVEGAME_FILE);
        if !save.exists() {
            return Err(SaveError::NotFound(save));
        }
        let metadata = match SaveMetadata::load(dir) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("{} in {}; continuing without it", err, dir.display());
                SaveMetadata::new(dir.file_name().and_then(|n| n.to_str()).unwrap_or_default())
            }
        };
        copy_atomic(&save, dest)?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, CharacterStore, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let store = CharacterStore::new(dir.path());
        let save = dir.path().join("savegame");
        fs::write(&save, b"engine save").unwrap();
        (dir, store, save)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Hero"), "Hero");
        assert_eq!(sanitize_name("Sir Lancelot/../x"), "Sir_Lancelot____x");
        assert_eq!(sanitize_name("  "), "unnamed");
        assert_eq!(sanitize_name("../"), "unnamed");
        assert_eq!(sanitize_name(&"a".repeat(100)).len(), 64);
    }

    #[test]
    fn test_character_save_and_load() {
        let (dir, store, save) = fixture();
        let mut meta = SaveMetadata::new("Hero");
        meta.turns = 42;
        store.save_character(&save, &meta).unwrap();
        assert!(store.character_exists("Hero"));

        let dest = dir.path().join("save/savegame");
        let loaded = store.load_character("Hero", &dest).unwrap();
        assert_eq!(loaded.turns, 42);
        assert_eq!(fs::read(dest).unwrap(), b"engine save");
    }

    #[test]
    fn test_slot_limit() {
        let (_dir, store, save) = fixture();
        let meta = SaveMetadata::new("Hero");
        for slot in 1..=3 {
            store.save_slot(slot, &save, &meta).unwrap();
        }
        assert_eq!(store.list_slots("Hero").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            store.save_slot(4, &save, &meta),
            Err(SaveError::SlotLimit { max: 3, .. })
        ));
        // Overwriting an existing slot is fine.
        store.save_slot(2, &save, &meta).unwrap();

        store.delete_slot("Hero", 1).unwrap();
        store.save_slot(4, &save, &meta).unwrap();
        assert_eq!(store.list_slots("Hero").unwrap(), vec![2, 3, 4]);
        assert!(store.slot_dir("Hero", 4).ends_with("slot_00004"));
    }

    #[test]
    fn test_slot_zero_rejected() {
        let (_dir, store, save) = fixture();
        assert!(matches!(
            store.save_slot(0, &save, &SaveMetadata::new("Hero")),
            Err(SaveError::InvalidSlot(0))
        ));
    }

    #[test]
    fn test_list_and_delete_characters() {
        let (_dir, store, save) = fixture();
        store.save_character(&save, &SaveMetadata::new("Alice")).unwrap();
        store.save_character(&save, &SaveMetadata::new("Bob")).unwrap();
        store.save_slot(1, &save, &SaveMetadata::new("Bob")).unwrap();

        let list = store.list_characters().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].dir_name, "Bob");
        assert_eq!(list[0].slots, vec![1]);

        store.delete_character("Alice").unwrap();
        assert_eq!(store.list_characters().unwrap().len(), 1);
        assert!(matches!(store.delete_character("Alice"), Err(SaveError::NotFound(_))));
    }

    #[test]
    fn test_load_missing_slot() {
        let (dir, store, _save) = fixture();
        let result = store.load_slot("Nobody", 1, &dir.path().join("out"));
        assert!(matches!(result, Err(SaveError::NotFound(_))));
    }
}
