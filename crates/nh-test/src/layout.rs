//! Read-only walk over a consolidated save file.

use std::path::Path;

use nh_bridge::{BridgeError, NhFile};
use thiserror::Error;

use crate::level::{Level, RECORD_MAX};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("marker {marker} precedes the record of ledger {ledger}")]
    MarkerMismatch { marker: u8, ledger: i16 },
}

/// Which level records a save holds, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveLayout {
    pub plname: String,
    pub current: i16,
    /// `(marker byte, ledger)` of every level after the game state.
    pub levels: Vec<(u8, i16)>,
}

impl SaveLayout {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let mut f = NhFile::open(path)?;
        f.init_sfprocs();
        f.skip_version_header()?;
        let plname = f.read_plname()?;
        let current = Level::read_record(&mut f)?.ledger;
        f.read_str(RECORD_MAX)?;

        f.set_eof_ok(true);
        let mut levels = Vec::new();
        while let Some(marker) = f.try_read_u8()? {
            let ledger = Level::read_record(&mut f)?.ledger;
            if i16::from(marker) != ledger {
                return Err(LayoutError::MarkerMismatch { marker, ledger });
            }
            levels.push((marker, ledger));
        }
        Ok(Self {
            plname,
            current,
            levels,
        })
    }

    pub fn ledgers(&self) -> Vec<i16> {
        self.levels.iter().map(|&(_, ledger)| ledger).collect()
    }
}
