//! Moving levels between external level files and the consolidated save.

use std::fs;
use std::io::ErrorKind;

use crate::engine::Engine;
use crate::nhfile::{NhFile, NhFileMode};
use crate::paths::FilePrefixes;
use crate::{BridgeError, Result};

/// Marker byte that precedes a consolidated level record.
pub fn level_marker(f: &NhFile, ledger: i16) -> Result<u8> {
    u8::try_from(ledger).map_err(|_| BridgeError::SaveFormat {
        path: f.path().to_path_buf(),
        reason: format!("ledger {ledger} does not fit a marker byte"),
    })
}

/// Append every visited level except `current` to `f` and delete its
/// external file. Returns the ledgers written, in order.
///
/// The counter is an `i16`, so the loop covers every ledger the engine can
/// number.
pub fn consolidate_levels(
    engine: &mut dyn Engine,
    f: &mut NhFile,
    prefixes: &FilePrefixes,
    current: i16,
) -> Result<Vec<i16>> {
    let mut written = Vec::new();
    for ledger in 1..=engine.max_ledger() {
        if ledger == current || !engine.level_file_exists(ledger) {
            continue;
        }
        let path = prefixes.level_file(ledger);
        let mut level = NhFile::open(&path)?;
        level.init_sfprocs();
        let loaded = engine.getlev(&mut level)?;
        if loaded != ledger {
            log::warn!("level file {} holds ledger {}", path.display(), loaded);
        }
        drop(level);

        let marker = level_marker(f, ledger)?;
        f.write_u8(marker)?;
        engine.savelev(f, ledger)?;
        fs::remove_file(&path)?;
        log::debug!("consolidated level {} ({} bytes so far)", ledger, f.counted());
        written.push(ledger);
    }
    Ok(written)
}

/// Read `{marker, level}` records from `f` until end of file and write each
/// level back out to its external file, releasing it from memory.
pub fn externalize_levels(engine: &mut dyn Engine, f: &mut NhFile, prefixes: &FilePrefixes) -> Result<Vec<i16>> {
    f.set_eof_ok(true);
    let result = externalize_records(engine, f, prefixes);
    f.set_eof_ok(false);
    result
}

fn externalize_records(engine: &mut dyn Engine, f: &mut NhFile, prefixes: &FilePrefixes) -> Result<Vec<i16>> {
    let mut levels = Vec::new();
    while let Some(marker) = f.try_read_u8()? {
        let ledger = engine.getlev(f)?;
        if i16::from(marker) != ledger {
            log::warn!("level marker {} precedes ledger {}", marker, ledger);
        }
        let mut out = NhFile::create(prefixes.level_file(ledger))?;
        out.init_sfprocs();
        out.set_mode(NhFileMode::WRITING | NhFileMode::FREEING);
        engine.savelev(&mut out, ledger)?;
        out.finish()?;
        levels.push(ledger);
    }
    Ok(levels)
}

/// Remove a file that may already be gone.
pub fn remove_if_present(path: &std::path::Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_marker_range() {
        let dir = tempfile::tempdir().unwrap();
        let f = NhFile::create(dir.path().join("save")).unwrap();
        assert_eq!(level_marker(&f, 5).unwrap(), 5);
        assert_eq!(level_marker(&f, 255).unwrap(), 255);
        assert!(matches!(level_marker(&f, 256), Err(BridgeError::SaveFormat { .. })));
        assert!(level_marker(&f, -1).is_err());
    }

    #[test]
    fn test_remove_if_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1lock.3");
        remove_if_present(&path).unwrap();
        fs::write(&path, b"x").unwrap();
        remove_if_present(&path).unwrap();
        assert!(!path.exists());
    }
}
