//! NHFILE: the engine's save-I/O descriptor.
//!
//! One `NhFile` wraps one open file plus the mode flags the engine's save
//! routines consult. Records are native-endian, matching the engine's raw
//! struct dumps.
//!
//! Save stream layout:
//!
//! ```text
//! version header   indicator u8, 4 x u64 version words, count u8, count critical bytes
//! player name      u32 length + bytes
//! current level    engine level record
//! game state       engine game-state record
//! { marker u8, level record }*   consolidated levels, until EOF
//! ```

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::{BridgeError, Result};

bitflags! {
    /// What a save routine should do with the records it visits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NhFileMode: u8 {
        /// Only accumulate sizes.
        const COUNTING = 0x01;
        const WRITING = 0x02;
        /// Release in-memory structures once written.
        const FREEING = 0x04;
        const READING = 0x08;
    }
}

/// First byte of every save stream.
pub const SAVE_INDICATOR: u8 = 0x02;

/// Bytes before the critical-sizes block: indicator, four version words, count.
pub const VERSION_PREFIX_LEN: usize = 1 + 4 * 8 + 1;

/// Longest player name accepted when reading a save.
pub const MAX_PLNAME: usize = 256;

/// The four version words written at the head of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionInfo {
    pub incarnation: u64,
    pub feature_set: u64,
    pub entity_count: u64,
    pub struct_sizes: u64,
}

/// Open save or level file with its mode flags.
pub struct NhFile {
    path: PathBuf,
    file: File,
    mode: NhFileMode,
    procs_ready: bool,
    counted: u64,
    eof_ok: bool,
}

impl NhFile {
    /// Create (truncating) a file for saving.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self::wrap(path, file, NhFileMode::WRITING))
    }

    /// Open an existing file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self::wrap(path, file, NhFileMode::READING))
    }

    fn wrap(path: PathBuf, file: File, mode: NhFileMode) -> Self {
        Self {
            path,
            file,
            mode,
            procs_ready: false,
            counted: 0,
            eof_ok: false,
        }
    }

    /// Install the save-I/O procedures. Until this is called every record
    /// read or write fails.
    pub fn init_sfprocs(&mut self) {
        self.procs_ready = true;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> NhFileMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: NhFileMode) {
        self.mode = mode;
    }

    pub fn is_counting(&self) -> bool {
        self.mode.contains(NhFileMode::COUNTING)
    }

    pub fn is_writing(&self) -> bool {
        self.mode.contains(NhFileMode::WRITING)
    }

    pub fn is_freeing(&self) -> bool {
        self.mode.contains(NhFileMode::FREEING)
    }

    pub fn is_reading(&self) -> bool {
        self.mode.contains(NhFileMode::READING)
    }

    /// Bytes seen by record writes since the last rewind, in any mode.
    pub fn counted(&self) -> u64 {
        self.counted
    }

    /// When set, a record read that hits end of file yields `None` instead
    /// of an error.
    pub fn set_eof_ok(&mut self, eof_ok: bool) {
        self.eof_ok = eof_ok;
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.counted = 0;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Flush and sync to disk, consuming the descriptor.
    pub fn finish(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn check_procs(&self) -> Result<()> {
        if self.procs_ready {
            Ok(())
        } else {
            Err(BridgeError::SaveProcsUninitialized(self.path.clone()))
        }
    }

    fn format_error(&self, reason: impl Into<String>) -> BridgeError {
        BridgeError::SaveFormat {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    // ========================================================================
    // Record writes
    // ========================================================================

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_procs()?;
        self.counted += bytes.len() as u64;
        if self.is_writing() && !self.is_counting() {
            self.file.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.write_bytes(&v.to_ne_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_ne_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_ne_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_ne_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_ne_bytes())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Length-prefixed string.
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len()).map_err(|_| self.format_error("string too long"))?;
        self.write_u32(len)?;
        self.write_bytes(s.as_bytes())
    }

    /// Version header: indicator, version words, critical-sizes block.
    pub fn write_version_header(&mut self, info: &VersionInfo, critical: &[u8]) -> Result<()> {
        let count = u8::try_from(critical.len()).map_err(|_| self.format_error("too many critical bytes"))?;
        self.write_u8(SAVE_INDICATOR)?;
        for word in [info.incarnation, info.feature_set, info.entity_count, info.struct_sizes] {
            self.write_u64(word)?;
        }
        self.write_u8(count)?;
        self.write_bytes(critical)
    }

    pub fn write_plname(&mut self, name: &str) -> Result<()> {
        self.write_str(name)
    }

    // ========================================================================
    // Record reads
    // ========================================================================

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_procs()?;
        match self.file.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                Err(self.format_error(format!("truncated record of {} bytes", buf.len())))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read one byte, or `None` at a clean end of file when EOF is allowed.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>> {
        self.check_procs()?;
        let mut buf = [0u8; 1];
        match self.file.read(&mut buf)? {
            0 if self.eof_ok => Ok(None),
            0 => Err(self.format_error("unexpected end of file")),
            _ => Ok(Some(buf[0])),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(i16::from_ne_bytes(buf))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(i64::from_ne_bytes(buf))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_str(&mut self, max: usize) -> Result<String> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(self.format_error(format!("string of {len} bytes exceeds {max}")));
        }
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf).map_err(|_| self.format_error("string is not UTF-8"))
    }

    /// Read the version header through the record layer.
    pub fn read_version_header(&mut self) -> Result<(VersionInfo, Vec<u8>)> {
        if self.read_u8()? != SAVE_INDICATOR {
            return Err(self.format_error("bad save indicator"));
        }
        let info = VersionInfo {
            incarnation: self.read_u64()?,
            feature_set: self.read_u64()?,
            entity_count: self.read_u64()?,
            struct_sizes: self.read_u64()?,
        };
        let count = self.read_u8()? as usize;
        let mut critical = vec![0u8; count];
        self.read_bytes(&mut critical)?;
        Ok((info, critical))
    }

    pub fn read_plname(&mut self) -> Result<String> {
        self.read_str(MAX_PLNAME)
    }

    /// Skip the version header with plain file reads, without consulting
    /// any engine state. Returns the header length.
    pub fn skip_version_header(&mut self) -> Result<u64> {
        let mut prefix = [0u8; VERSION_PREFIX_LEN];
        match self.file.read_exact(&mut prefix) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                return Err(self.format_error("file shorter than version header"));
            }
            Err(err) => return Err(err.into()),
        }
        if prefix[0] != SAVE_INDICATOR {
            return Err(self.format_error(format!("bad save indicator {:#x}", prefix[0])));
        }
        let total = (VERSION_PREFIX_LEN + prefix[VERSION_PREFIX_LEN - 1] as usize) as u64;
        self.file.seek(SeekFrom::Start(total))?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(dir: &tempfile::TempDir) -> NhFile {
        let mut f = NhFile::create(dir.path().join("save")).unwrap();
        f.init_sfprocs();
        f
    }

    #[test]
    fn test_write_without_sfprocs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = NhFile::create(dir.path().join("save")).unwrap();
        assert!(matches!(f.write_u8(1), Err(BridgeError::SaveProcsUninitialized(_))));
    }

    #[test]
    fn test_counting_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = writer(&dir);
        f.set_mode(NhFileMode::COUNTING);
        f.write_plname("Hero").unwrap();
        f.write_i64(7).unwrap();
        assert_eq!(f.counted(), 4 + 4 + 8);
        f.finish().unwrap();
        assert_eq!(std::fs::metadata(dir.path().join("save")).unwrap().len(), 0);
    }

    #[test]
    fn test_skip_version_header_matches_written_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = writer(&dir);
        f.write_version_header(&VersionInfo::default(), &[8, 4, 2]).unwrap();
        f.write_plname("Hero").unwrap();
        f.finish().unwrap();

        let mut r = NhFile::open(dir.path().join("save")).unwrap();
        r.init_sfprocs();
        assert_eq!(r.skip_version_header().unwrap(), (VERSION_PREFIX_LEN + 3) as u64);
        assert_eq!(r.read_plname().unwrap(), "Hero");
    }

    #[test]
    fn test_eof_handling() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = writer(&dir);
        f.write_u8(5).unwrap();
        f.finish().unwrap();

        let mut r = NhFile::open(dir.path().join("save")).unwrap();
        r.init_sfprocs();
        assert_eq!(r.try_read_u8().unwrap(), Some(5));
        assert!(r.try_read_u8().is_err());
        r.set_eof_ok(true);
        assert_eq!(r.try_read_u8().unwrap(), None);
    }

    #[test]
    fn test_bad_indicator_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("save"), [0u8; 64]).unwrap();
        let mut r = NhFile::open(dir.path().join("save")).unwrap();
        r.init_sfprocs();
        assert!(matches!(r.skip_version_header(), Err(BridgeError::SaveFormat { .. })));
    }
}
