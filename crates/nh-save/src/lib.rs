//! nh-save: Save-slot storage for the embedded engine
//!
//! The engine writes its own binary save format; this crate never looks
//! inside it. What it manages is everything around that file:
//!
//! - `metadata`: the `metadata.json` written next to every save
//! - `backup`: versioned rolling backups (`savegame.vNNN_L<dlvl>[_NEW]`)
//! - `store`: per-character directories and numbered slots under
//!   `$DOCS/characters/`
//!
//! Directory layout under the documents root:
//!
//! ```text
//! save/savegame                      active consolidated save
//! save/savegame.v003_L4[_NEW]        rolling backups
//! characters/<name>/savegame         character-scoped save
//! characters/<name>/metadata.json
//! characters/<name>/slot_00001/      numbered slots (max 3)
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod backup;
pub mod metadata;
pub mod store;

pub use backup::{BackupName, BackupSet, next_backup_version, write_backups};
pub use metadata::SaveMetadata;
pub use store::{CharacterStore, CharacterSummary, MAX_SLOTS_PER_CHARACTER, sanitize_name};

/// File name of the engine save inside every save directory.
pub const SAVEGAME_FILE: &str = "savegame";

/// File name of the metadata document inside every save directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Save storage errors
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Save file not found: {0}")]
    NotFound(PathBuf),

    #[error("Character {name} already has {max} slots")]
    SlotLimit { name: String, max: usize },

    #[error("Invalid slot number {0}")]
    InvalidSlot(u32),

    #[error("Invalid character name {0:?}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, SaveError>;

/// Default documents root when the host does not supply one.
pub fn default_documents_root() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("nethack");
    path
}

/// Copy `src` to `dst` through a sibling temp file and a rename, so readers
/// never observe a half-written `dst`.
pub fn copy_atomic(src: &Path, dst: &Path) -> Result<u64> {
    if !src.exists() {
        return Err(SaveError::NotFound(src.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(dst);
    let bytes = match fs::copy(src, &tmp) {
        Ok(bytes) => bytes,
        Err(err) => {
            discard_tmp(&tmp);
            return Err(err.into());
        }
    };
    fs::rename(&tmp, dst)?;
    Ok(bytes)
}

/// Write `contents` to `dst` atomically.
pub fn write_atomic(dst: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(dst);
    if let Err(err) = fs::write(&tmp, contents) {
        discard_tmp(&tmp);
        return Err(err.into());
    }
    fs::rename(&tmp, dst)?;
    Ok(())
}

/// Remove a half-written temp file after a failed write.
fn discard_tmp(tmp: &Path) {
    if let Err(err) = fs::remove_file(tmp)
        && err.kind() != ErrorKind::NotFound
    {
        log::debug!("could not remove {}: {}", tmp.display(), err);
    }
}

/// `path` with `.tmp` appended to its file name.
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_sibling() {
        assert_eq!(
            tmp_sibling(Path::new("/docs/save/savegame")),
            PathBuf::from("/docs/save/savegame.tmp")
        );
    }

    #[test]
    fn test_copy_atomic_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::write(&src, b"engine bytes").unwrap();
        let dst = dir.path().join("a/b/savegame");

        assert_eq!(copy_atomic(&src, &dst).unwrap(), 12);
        assert_eq!(fs::read(&dst).unwrap(), b"engine bytes");
        assert!(!tmp_sibling(&dst).exists());
    }

    #[test]
    fn test_copy_atomic_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = copy_atomic(&dir.path().join("nope"), &dir.path().join("dst"));
        assert!(matches!(result, Err(SaveError::NotFound(_))));
    }

    #[test]
    fn test_default_documents_root_ends_with_nethack() {
        assert!(default_documents_root().ends_with("nethack"));
    }
}
