//! Save orchestrator.
//!
//! Writes one consolidated save: version header, player name, the current
//! level, game state, then every other visited level preceded by its
//! ledger marker. The file is built as `savegame.tmp`, backed up and renamed
//! over `savegame` only once it is complete.
//!
//! A save never ends the session. Levels folded into the save are written
//! back out to their external files afterwards and the current level is
//! reloaded from the finished file, so the engine can keep playing.

mod fixup;
pub(crate) mod levels;

use std::fs;
use std::path::{Path, PathBuf};

use nh_save::{BackupSet, CharacterStore, SaveMetadata};
use strum::Display;

use crate::engine::{Engine, GameView};
use crate::nhfile::{NhFile, NhFileMode};
use crate::paths::FilePrefixes;
use crate::Result;

pub use fixup::PreSaveFixup;
pub use levels::{consolidate_levels, externalize_levels, level_marker};

/// Why a save request was declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[strum(to_string = "no save filename set")]
    NoSaveFilename,
    #[strum(to_string = "game has not started (moves == 0)")]
    NoMoves,
    #[strum(to_string = "character not alive")]
    NotAlive,
    #[strum(to_string = "nothing worth saving")]
    NothingWorthSaving,
    #[strum(to_string = "no current dungeon level")]
    NoDungeonLevel,
}

/// Where a save ends up besides `save/savegame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SaveTarget {
    Quick,
    Character,
    Slot(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Size of the header records measured by the counting pass.
    pub counted: u64,
    /// Ledgers folded in after the current level.
    pub levels: Vec<i16>,
    pub timers_truncated: usize,
    pub backup: BackupSet,
    /// Offset of the first consolidated level record.
    pub consolidated_offset: u64,
    /// Captured before the save ran.
    pub metadata: SaveMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Box<SaveReport>),
    Skipped(SkipReason),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    pub fn report(&self) -> Option<&SaveReport> {
        match self {
            SaveOutcome::Saved(report) => Some(&**report),
            SaveOutcome::Skipped(_) => None,
        }
    }
}

pub fn check_preconditions(engine: &dyn Engine) -> std::result::Result<(), SkipReason> {
    if engine.save_filename().is_none_or(|name| name.is_empty()) {
        return Err(SkipReason::NoSaveFilename);
    }
    if engine.moves() <= 0 {
        return Err(SkipReason::NoMoves);
    }
    let vitals = engine.vitals();
    if vitals.hp <= 0 {
        return Err(SkipReason::NotAlive);
    }
    if !engine.state().something_worth_saving {
        return Err(SkipReason::NothingWorthSaving);
    }
    if vitals.dungeon_level <= 0 {
        return Err(SkipReason::NoDungeonLevel);
    }
    Ok(())
}

/// Character metadata as of right now. Taken before the save runs, since
/// saving may disturb the transient fields it reads.
pub fn capture_metadata(view: &dyn GameView) -> SaveMetadata {
    let identity = view.identity();
    let vitals = view.vitals();
    let mut meta = SaveMetadata::new(view.plname());
    meta.role = identity.role;
    meta.race = identity.race;
    meta.gender = identity.gender;
    meta.alignment = identity.alignment;
    meta.level = vitals.level;
    meta.hp = vitals.hp;
    meta.hp_max = vitals.hp_max;
    meta.turns = view.moves();
    meta.dungeon_level = vitals.dungeon_level;
    meta
}

/// Save the running game to `save/savegame`.
pub fn save_game(engine: &mut dyn Engine, prefixes: &FilePrefixes) -> Result<SaveOutcome> {
    if let Err(reason) = check_preconditions(engine) {
        log::info!("save skipped: {}", reason);
        return Ok(SaveOutcome::Skipped(reason));
    }
    let metadata = capture_metadata(engine);
    let tmp = prefixes.savegame_tmp();

    let mut guard = PreSaveFixup::apply(engine);
    match write_save(&mut *guard, prefixes, &tmp, metadata) {
        Ok(report) => {
            drop(guard);
            log::info!(
                "saved {} ({} bytes, {} extra levels, backup v{:03})",
                report.path.display(),
                report.bytes,
                report.levels.len(),
                report.backup.version
            );
            Ok(SaveOutcome::Saved(Box::new(report)))
        }
        Err(err) => {
            log::error!("save failed: {}", err);
            if let Err(cleanup) = levels::remove_if_present(&tmp) {
                log::warn!("could not remove {}: {}", tmp.display(), cleanup);
            }
            drop(guard);
            Err(err)
        }
    }
}

fn write_head(engine: &mut dyn Engine, f: &mut NhFile, plname: &str, current: i16) -> Result<()> {
    engine.store_version(f)?;
    f.write_plname(plname)?;
    engine.savelev(f, current)?;
    engine.savegamestate(f)
}

fn write_save(engine: &mut dyn Engine, prefixes: &FilePrefixes, tmp: &Path, metadata: SaveMetadata) -> Result<SaveReport> {
    let final_path = prefixes.savegame();
    let plname = engine.plname();
    let current = engine.current_ledger();
    let dungeon_level = engine.vitals().dungeon_level;
    let timers_before = engine.timer_count();

    let mut f = NhFile::create(tmp)?;
    f.init_sfprocs();

    f.set_mode(NhFileMode::COUNTING);
    write_head(engine, &mut f, &plname, current)?;
    let counted = f.counted();
    log::debug!("counting pass: {} bytes", counted);

    // No FREEING: the session keeps running on these structures.
    f.rewind()?;
    f.set_mode(NhFileMode::WRITING);
    write_head(engine, &mut f, &plname, current)?;
    let consolidated_offset = f.position()?;
    let levels = consolidate_levels(engine, &mut f, prefixes, current)?;
    f.finish()?;

    let timers_truncated = engine.truncate_timers(timers_before);
    if timers_truncated > 0 {
        log::debug!("dropped {} timers picked up during consolidation", timers_truncated);
    }

    if !levels.is_empty() {
        let mut saved = NhFile::open(tmp)?;
        saved.init_sfprocs();
        saved.seek_to(consolidated_offset)?;
        let restored = externalize_levels(engine, &mut saved, prefixes)?;
        log::debug!("re-externalized levels {:?}", restored);
    }

    reload_current_level(engine, tmp)?;

    let backup = nh_save::write_backups(&prefixes.save, &final_path, tmp, dungeon_level)?;
    fs::rename(tmp, &final_path)?;
    let bytes = fs::metadata(&final_path)?.len();

    Ok(SaveReport {
        path: final_path,
        bytes,
        counted,
        levels,
        timers_truncated,
        backup,
        consolidated_offset,
        metadata,
    })
}

/// Consolidation loaded other levels over the current one; read it back.
fn reload_current_level(engine: &mut dyn Engine, path: &Path) -> Result<()> {
    let mut f = NhFile::open(path)?;
    f.init_sfprocs();
    engine.uptodate(&mut f)?;
    f.read_plname()?;
    let ledger = engine.getlev(&mut f)?;
    log::trace!("reloaded current level {}", ledger);
    Ok(())
}

/// Copy a finished save into the character store.
pub fn store_save(store: &CharacterStore, target: SaveTarget, report: &SaveReport) -> Result<Option<SaveMetadata>> {
    let stored = match target {
        SaveTarget::Quick => return Ok(None),
        SaveTarget::Character => store.save_character(&report.path, &report.metadata)?,
        SaveTarget::Slot(slot) => store.save_slot(slot, &report.path, &report.metadata)?,
    };
    log::info!("stored {} save for {}", target, stored.character_name);
    Ok(Some(stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reasons_read_well() {
        assert_eq!(SkipReason::NoSaveFilename.to_string(), "no save filename set");
        assert_eq!(SkipReason::NotAlive.to_string(), "character not alive");
        assert_eq!(SaveTarget::Slot(2).to_string(), "Slot");
    }

    #[test]
    fn test_skipped_outcome_has_no_report() {
        let outcome = SaveOutcome::Skipped(SkipReason::NoMoves);
        assert!(!outcome.is_saved());
        assert!(outcome.report().is_none());
    }
}
