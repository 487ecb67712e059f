//! `metadata.json` written beside each save.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{METADATA_FILE, Result, SaveError, write_atomic};

/// Character summary stored next to a save file.
///
/// `created_at`, `synced_at` and `downloaded_at` survive overwrites: the
/// first is set once, the other two are owned by the host's sync layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub character_name: String,
    pub role: String,
    pub race: String,
    pub gender: String,
    pub alignment: String,
    pub level: i32,
    pub hp: i32,
    pub hp_max: i32,
    pub turns: i64,
    pub dungeon_level: i32,
    pub last_saved: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,
}

impl SaveMetadata {
    /// New metadata stamped with the current time.
    pub fn new(character_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            character_name: character_name.into(),
            role: String::new(),
            race: String::new(),
            gender: String::new(),
            alignment: String::new(),
            level: 1,
            hp: 0,
            hp_max: 0,
            turns: 0,
            dungeon_level: 1,
            last_saved: now,
            created_at: now,
            updated_at: now,
            synced_at: None,
            downloaded_at: None,
        }
    }

    /// Read `metadata.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        let text = fs::read_to_string(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => SaveError::NotFound(path.clone()),
            _ => err.into(),
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write `metadata.json` into `dir`, carrying over the preserved
    /// timestamps from any document already there.
    pub fn store(&self, dir: &Path) -> Result<Self> {
        let mut merged = self.clone();
        let now = Utc::now();
        merged.last_saved = now;
        merged.updated_at = now;
        match Self::load(dir) {
            Ok(previous) => {
                merged.created_at = previous.created_at;
                merged.synced_at = merged.synced_at.or(previous.synced_at);
                merged.downloaded_at = merged.downloaded_at.or(previous.downloaded_at);
            }
            Err(SaveError::NotFound(_)) => {}
            Err(err) => {
                log::warn!("previous metadata in {} unreadable: {}", dir.display(), err);
            }
        }
        let json = serde_json::to_string_pretty(&merged)?;
        write_atomic(&dir.join(METADATA_FILE), json.as_bytes())?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> SaveMetadata {
        let mut meta = SaveMetadata::new("Hero");
        meta.role = "Valkyrie".into();
        meta.race = "Human".into();
        meta.gender = "Female".into();
        meta.alignment = "Lawful".into();
        meta.hp = 14;
        meta.hp_max = 16;
        meta.turns = 312;
        meta
    }

    #[test]
    fn test_store_preserves_host_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = sample();
        first.created_at = Utc::now() - Duration::days(3);
        first.synced_at = Some(Utc::now() - Duration::days(1));
        first.downloaded_at = Some(Utc::now() - Duration::days(2));
        let stored = first.store(dir.path()).unwrap();

        let mut second = sample();
        second.turns = 999;
        let merged = second.store(dir.path()).unwrap();

        assert_eq!(merged.created_at, stored.created_at);
        assert_eq!(merged.synced_at, stored.synced_at);
        assert_eq!(merged.downloaded_at, stored.downloaded_at);
        assert_eq!(merged.turns, 999);
        assert!(merged.updated_at >= stored.updated_at);

        let reread = SaveMetadata::load(dir.path()).unwrap();
        assert_eq!(reread, merged);
    }

    #[test]
    fn test_optional_fields_omitted_when_absent() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("synced_at"));
        assert!(!json.contains("downloaded_at"));
        assert!(json.contains("\"character_name\":\"Hero\""));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(SaveMetadata::load(dir.path()), Err(SaveError::NotFound(_))));
    }
}
