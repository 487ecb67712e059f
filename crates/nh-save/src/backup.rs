//! Rolling versioned backups of the active save.
//!
//! Every save leaves two files behind in the save directory:
//! `savegame.vNNN_L<dlvl>` (the save being replaced) and
//! `savegame.vNNN_L<dlvl>_NEW` (the save that replaces it). `NNN` cycles
//! through `000..=009`; the next number follows the most recently written
//! backup, so the ring survives gaps and app restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::{Result, SAVEGAME_FILE};

/// Number of distinct backup generations kept.
pub const BACKUP_GENERATIONS: u16 = 10;

/// Parsed backup file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupName {
    pub version: u16,
    pub dungeon_level: i32,
    pub is_new: bool,
}

impl BackupName {
    pub fn file_name(&self) -> String {
        format!(
            "{}.v{:03}_L{}{}",
            SAVEGAME_FILE,
            self.version,
            self.dungeon_level,
            if self.is_new { "_NEW" } else { "" }
        )
    }

    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(SAVEGAME_FILE)?.strip_prefix(".v")?;
        let (version, rest) = rest.split_once("_L")?;
        if version.len() != 3 {
            return None;
        }
        let version: u16 = version.parse().ok()?;
        let (level, is_new) = match rest.strip_suffix("_NEW") {
            Some(level) => (level, true),
            None => (rest, false),
        };
        Some(Self {
            version,
            dungeon_level: level.parse().ok()?,
            is_new,
        })
    }
}

/// Paths written by one call to [`write_backups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub version: u16,
    /// Copy of the save that was about to be replaced, if there was one.
    pub previous: Option<PathBuf>,
    /// Copy of the freshly written save.
    pub new: PathBuf,
}

fn existing_backups(save_dir: &Path) -> Result<Vec<(BackupName, PathBuf, SystemTime)>> {
    let mut found = Vec::new();
    if !save_dir.exists() {
        return Ok(found);
    }
    for entry in fs::read_dir(save_dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().and_then(BackupName::parse) else {
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        found.push((name, entry.path(), modified));
    }
    Ok(found)
}

/// Generation number the next backup pair will use.
pub fn next_backup_version(save_dir: &Path) -> Result<u16> {
    let newest = existing_backups(save_dir)?
        .into_iter()
        .max_by_key(|(name, _, modified)| (*modified, name.is_new))
        .map(|(name, _, _)| name.version);
    Ok(match newest {
        Some(version) => (version + 1) % BACKUP_GENERATIONS,
        None => 0,
    })
}

/// Back up `current` (if present) and `fresh` under the next generation
/// number, after removing whatever that generation held before.
///
/// `current` is the save about to be replaced and `fresh` the temp file that
/// will replace it; neither is moved or modified.
pub fn write_backups(
    save_dir: &Path,
    current: &Path,
    fresh: &Path,
    dungeon_level: i32,
) -> Result<BackupSet> {
    fs::create_dir_all(save_dir)?;
    let version = next_backup_version(save_dir)?;
    for (name, path, _) in existing_backups(save_dir)? {
        if name.version == version {
            log::debug!("recycling backup slot {:03}: removing {}", version, path.display());
            fs::remove_file(&path)?;
        }
    }

    let mut name = BackupName {
        version,
        dungeon_level,
        is_new: false,
    };
    let previous = if current.exists() {
        let path = save_dir.join(name.file_name());
        fs::copy(current, &path)?;
        Some(path)
    } else {
        None
    };

    name.is_new = true;
    let new = save_dir.join(name.file_name());
    fs::copy(fresh, &new)?;
    log::info!(
        "backups written: v{:03} (previous: {}, new: {})",
        version,
        previous.is_some(),
        new.display()
    );
    Ok(BackupSet {
        version,
        previous,
        new,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn touch(path: &Path, secs_ago: u64) {
        fs::write(path, b"x").unwrap();
        let when = SystemTime::now() - Duration::from_secs(secs_ago);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn test_backup_name_format_and_parse() {
        let name = BackupName {
            version: 3,
            dungeon_level: 1,
            is_new: true,
        };
        assert_eq!(name.file_name(), "savegame.v003_L1_NEW");
        assert_eq!(BackupName::parse("savegame.v003_L1_NEW"), Some(name));
        assert_eq!(
            BackupName::parse("savegame.v007_L12"),
            Some(BackupName {
                version: 7,
                dungeon_level: 12,
                is_new: false
            })
        );
        assert_eq!(BackupName::parse("savegame"), None);
        assert_eq!(BackupName::parse("savegame.tmp"), None);
        assert_eq!(BackupName::parse("savegame.v7_L1"), None);
    }

    #[test]
    fn test_next_version_follows_newest_and_wraps() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_backup_version(dir.path()).unwrap(), 0);

        touch(&dir.path().join("savegame.v008_L2"), 30);
        touch(&dir.path().join("savegame.v002_L3"), 20);
        assert_eq!(next_backup_version(dir.path()).unwrap(), 3);

        touch(&dir.path().join("savegame.v009_L3"), 1);
        assert_eq!(next_backup_version(dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_write_backups_pair_and_recycle() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("savegame");
        let fresh = dir.path().join("savegame.tmp");
        fs::write(&current, b"old save").unwrap();
        fs::write(&fresh, b"new save bytes").unwrap();
        touch(&dir.path().join("savegame.v000_L5"), 60);
        touch(&dir.path().join("savegame.v001_L9_NEW"), 120);

        let set = write_backups(dir.path(), &current, &fresh, 1).unwrap();
        assert_eq!(set.version, 1);
        assert!(!dir.path().join("savegame.v001_L9_NEW").exists());
        assert_eq!(fs::read(set.previous.unwrap()).unwrap(), b"old save");
        assert_eq!(set.new, dir.path().join("savegame.v001_L1_NEW"));
        assert_eq!(fs::read(&set.new).unwrap(), b"new save bytes");
        assert!(fresh.exists());
    }

    #[test]
    fn test_write_backups_first_save_has_no_previous() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("savegame.tmp");
        fs::write(&fresh, b"first").unwrap();
        let set = write_backups(dir.path(), &dir.path().join("savegame"), &fresh, 1).unwrap();
        assert!(set.previous.is_none());
        assert!(set.new.exists());
    }
}
