//! Raw heap image save/load.
//!
//! The image is `{magic, used, count, heap_base_addr}` (little-endian u64s)
//! followed by the first `used` bytes of the region. When the image is loaded
//! at a different base, every free block's `next_free` link is relocated by
//! the base delta.
//!
//! Limitation: pointers stored *inside user data* are not relocated. A heap
//! image is therefore only safe to reload at the address it was saved from.
//! Session restore never goes through this path; it replays the engine's own
//! serialized save instead.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::ptr;

use crate::heap::{BlockHeader, FixedHeap};
use crate::HeapError;

/// Magic at the start of a heap image.
pub const STATE_MAGIC: u64 = 0x4E48_4845_4150_0001;

impl FixedHeap {
    /// Write the used portion of the region to `path`.
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), HeapError> {
        let inner = self.lock();
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for word in [STATE_MAGIC, inner.used as u64, inner.block_count as u64, self.base() as u64] {
            writer.write_all(&word.to_le_bytes())?;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.base.as_ptr(), inner.used) };
        writer.write_all(bytes)?;
        writer.flush()?;
        log::debug!(
            "heap image saved to {}: {} bytes, {} blocks",
            path.as_ref().display(),
            inner.used,
            inner.block_count
        );
        Ok(())
    }

    /// Replace the region contents with an image written by `save_state`.
    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<(), HeapError> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let mut words = [0u64; 4];
        for word in words.iter_mut() {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            *word = u64::from_le_bytes(buf);
        }
        let [magic, used, count, saved_base] = words;
        if magic != STATE_MAGIC {
            return Err(HeapError::InvalidState(format!("bad magic {magic:#x}")));
        }
        let used = usize::try_from(used)
            .ok()
            .filter(|&u| u <= self.capacity)
            .ok_or_else(|| HeapError::InvalidState(format!("image of {used} bytes exceeds heap")))?;

        let mut inner = self.lock();
        unsafe { ptr::write_bytes(self.base.as_ptr(), 0, inner.used.max(used)) };
        inner.used = 0;
        inner.block_count = 0;
        inner.free_head = ptr::null_mut();
        inner.generation += 1;

        let region = unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), used) };
        if let Err(err) = reader.read_exact(region) {
            unsafe { ptr::write_bytes(self.base.as_ptr(), 0, used) };
            return Err(err.into());
        }
        inner.used = used;
        inner.block_count = count as usize;

        let delta = self.base().wrapping_sub(saved_base as usize);
        let lo = self.base();
        let hi = self.base() + used;
        let mut free_blocks = Vec::new();
        self.walk_blocks(&inner, |header| unsafe {
            if (*header).is_free == 0 {
                return;
            }
            let next = (*header).next_free;
            if !next.is_null() {
                let moved = (next as usize).wrapping_add(delta);
                (*header).next_free = if moved >= lo && moved < hi {
                    moved as *mut BlockHeader
                } else {
                    log::warn!("free link {:p} outside loaded image; dropped", next);
                    ptr::null_mut()
                };
            }
            free_blocks.push(header);
        });

        let referenced: HashSet<usize> = free_blocks
            .iter()
            .map(|&h| unsafe { (*h).next_free } as usize)
            .filter(|&a| a != 0)
            .collect();
        inner.free_head = free_blocks
            .iter()
            .copied()
            .find(|&h| !referenced.contains(&(h as usize)))
            .unwrap_or(ptr::null_mut());

        if delta != 0 {
            log::warn!(
                "heap image relocated by {:#x}; pointers inside user data were not adjusted",
                delta
            );
        }
        log::info!(
            "heap image loaded from {}: {} bytes, {} blocks, {} free",
            path.as_ref().display(),
            used,
            count,
            free_blocks.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeapPtr;

    #[test]
    fn test_state_round_trip_same_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heap.img");
        let heap = FixedHeap::new(64 * 1024);
        let a = heap.alloc(40).unwrap();
        heap.write_user(a, 0, b"persist").unwrap();
        let b = heap.alloc(40).unwrap();
        heap.save_state(&path).unwrap();

        heap.reset();
        heap.load_state(&path).unwrap();
        let mut buf = [0u8; 7];
        heap.read_user(a, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"persist");
        assert!(heap.is_live(b));
    }

    #[test]
    fn test_state_relocates_free_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heap.img");
        let src = FixedHeap::new(64 * 1024);
        let a = src.alloc(64).unwrap();
        let _keep = src.alloc(64).unwrap();
        let c = src.alloc(64).unwrap();
        src.free(a).unwrap();
        src.free(c).unwrap();
        src.save_state(&path).unwrap();

        let dst = FixedHeap::new(64 * 1024);
        dst.load_state(&path).unwrap();
        let stats = dst.stats();
        assert_eq!(stats.free_blocks, 2);
        assert_eq!(stats.block_count, 3);

        // Both freed blocks come back, at the same offsets, in list order.
        let first = dst.alloc(64).unwrap();
        let second = dst.alloc(64).unwrap();
        assert_eq!(first.addr() - dst.base(), c.addr() - src.base());
        assert_eq!(second.addr() - dst.base(), a.addr() - src.base());
        let third: HeapPtr = dst.alloc(64).unwrap();
        assert_eq!(third.addr() - dst.base(), stats.used + crate::HEADER_SIZE);
    }

    #[test]
    fn test_state_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.img");
        std::fs::write(&path, [0u8; 64]).unwrap();
        let heap = FixedHeap::new(4096);
        assert!(matches!(heap.load_state(&path), Err(HeapError::InvalidState(_))));
    }
}
