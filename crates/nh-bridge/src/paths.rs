//! Engine file prefixes under the host's documents root.
//!
//! ```text
//! $DOCS/save/      savegame, backups, 1lock.0, 1lock.<ledger>
//! $DOCS/Data/      data files copied from the read-only bundle
//! $DOCS/bones/
//! $DOCS/           record, logfile, config, trouble
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Lock-file base name. Level files are `<LOCK_NAME>.<ledger>`, the
/// INSURANCE sentinel is ledger 0.
pub const LOCK_NAME: &str = "1lock";

/// Active save file name inside the save prefix.
pub const SAVEGAME_NAME: &str = nh_save::SAVEGAME_FILE;

/// The engine's per-purpose directory prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePrefixes {
    pub hack: PathBuf,
    pub level: PathBuf,
    pub save: PathBuf,
    pub bones: PathBuf,
    pub data: PathBuf,
    pub score: PathBuf,
    pub lock: PathBuf,
    pub config: PathBuf,
    pub trouble: PathBuf,
}

impl FilePrefixes {
    /// Lay the prefixes out under `docs`.
    pub fn under(docs: &Path) -> Self {
        let save = docs.join("save");
        Self {
            hack: docs.to_path_buf(),
            level: save.clone(),
            save: save.clone(),
            bones: docs.join("bones"),
            data: docs.join("Data"),
            score: docs.to_path_buf(),
            lock: save,
            config: docs.to_path_buf(),
            trouble: docs.to_path_buf(),
        }
    }

    /// Create every prefix directory.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            &self.hack,
            &self.level,
            &self.save,
            &self.bones,
            &self.data,
            &self.score,
            &self.lock,
            &self.config,
            &self.trouble,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn savegame(&self) -> PathBuf {
        self.save.join(SAVEGAME_NAME)
    }

    pub fn savegame_tmp(&self) -> PathBuf {
        nh_save::tmp_sibling(&self.savegame())
    }

    /// External file holding one level between visits.
    pub fn level_file(&self, ledger: i16) -> PathBuf {
        self.level.join(format!("{LOCK_NAME}.{ledger}"))
    }

    /// INSURANCE sentinel holding the game's PID.
    pub fn lock_file(&self) -> PathBuf {
        self.level_file(0)
    }

    /// Copy regular files from the read-only bundle into the data prefix.
    /// Files already present are left alone. Returns how many were copied.
    pub fn copy_bundled_data(&self, bundle: &Path) -> Result<usize> {
        if !bundle.is_dir() {
            log::debug!("no data bundle at {}", bundle.display());
            return Ok(0);
        }
        fs::create_dir_all(&self.data)?;
        let mut copied = 0;
        for entry in fs::read_dir(bundle)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let target = self.data.join(entry.file_name());
            if target.exists() {
                continue;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
        if copied > 0 {
            log::info!("copied {} bundled data files into {}", copied, self.data.display());
        }
        Ok(copied)
    }

    /// Delete everything in the save prefix and the bones prefix.
    pub fn wipe_saves(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.save, &self.bones] {
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                } else {
                    fs::remove_file(&path)?;
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove leftover external level files (not the lock sentinel).
    pub fn remove_level_files(&self) -> Result<usize> {
        let mut removed = 0;
        if !self.level.exists() {
            return Ok(0);
        }
        let prefix = format!("{LOCK_NAME}.");
        for entry in fs::read_dir(&self.level)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(ledger) = name.to_str().and_then(|n| n.strip_prefix(&prefix)) else {
                continue;
            };
            if ledger.parse::<i16>().is_ok_and(|l| l > 0) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
