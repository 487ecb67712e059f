//! Bump + free-list allocator over one process-lifetime region.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::HeapError;

/// Default region size: large enough for a deep game with bones and
/// several hundred levels' worth of transient allocations.
pub const DEFAULT_CAPACITY: usize = 128 * 1024 * 1024;

/// Magic stamped into every block header.
pub const BLOCK_MAGIC: u32 = 0x4E48_424B;

/// Alignment of every user pointer handed out by the heap.
pub const ALIGN: usize = 16;

const REGION_ALIGN: usize = 4096;

#[repr(C)]
pub(crate) struct BlockHeader {
    pub(crate) total_size: usize,
    pub(crate) magic: u32,
    pub(crate) is_free: u32,
    pub(crate) next_free: *mut BlockHeader,
}

const fn round_up(n: usize, to: usize) -> usize {
    (n + to - 1) & !(to - 1)
}

/// Bytes reserved in front of each user pointer.
pub const HEADER_SIZE: usize = round_up(size_of::<BlockHeader>(), ALIGN);

/// Pointer to the user region of a heap block.
///
/// The engine stores these in its globals. A `HeapPtr` stays numerically
/// valid across `reset()` (the base never moves) but the block behind it does
/// not, which is why the restore path nulls every root before reloading.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPtr(NonNull<u8>);

// The pointee is only touched through `FixedHeap`, which serializes access.
unsafe impl Send for HeapPtr {}
unsafe impl Sync for HeapPtr {}

impl HeapPtr {
    pub fn from_raw(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for HeapPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapPtr({:#x})", self.addr())
    }
}

/// Classification of an arbitrary pointer with respect to the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Not inside the region; owned by some other allocator.
    Foreign,
    /// Live block with a valid header.
    Live,
    /// Block is on the free list.
    Free,
    /// Inside the region but the header is not a valid block header.
    Corrupt,
}

/// Counters reported by [`FixedHeap::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    /// Bump watermark in bytes.
    pub used: usize,
    /// Blocks ever carved out by the bump pointer since the last reset.
    pub block_count: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub alloc_calls: u64,
    pub free_calls: u64,
    pub generation: u64,
}

pub(crate) struct HeapInner {
    pub(crate) used: usize,
    pub(crate) block_count: usize,
    pub(crate) free_head: *mut BlockHeader,
    pub(crate) generation: u64,
    pub(crate) alloc_calls: u64,
    pub(crate) free_calls: u64,
}

// Raw pointers in here all point into the region owned by the heap.
unsafe impl Send for HeapInner {}

/// Fixed-address heap.
///
/// Bytes above the bump watermark are always zero; `reset` and `load_state`
/// rely on that to avoid touching the untouched tail of a 128 MiB region.
pub struct FixedHeap {
    pub(crate) base: NonNull<u8>,
    pub(crate) capacity: usize,
    pub(crate) inner: Mutex<HeapInner>,
}

unsafe impl Send for FixedHeap {}
unsafe impl Sync for FixedHeap {}

impl FixedHeap {
    /// Allocate a new zeroed region of `capacity` bytes (rounded up to `ALIGN`).
    pub fn new(capacity: usize) -> Self {
        let capacity = round_up(capacity.max(ALIGN), ALIGN);
        let layout = match Layout::from_size_align(capacity, REGION_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("invalid fixed heap capacity: {capacity}"),
        };
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        log::debug!("fixed heap of {} bytes at {:p}", capacity, base.as_ptr());
        Self {
            base,
            capacity,
            inner: Mutex::new(HeapInner {
                used: 0,
                block_count: 0,
                free_head: ptr::null_mut(),
                generation: 0,
                alloc_calls: 0,
                free_calls: 0,
            }),
        }
    }

    /// The process-wide heap. Created on first use, never dropped.
    pub fn global() -> &'static FixedHeap {
        static GLOBAL: OnceLock<FixedHeap> = OnceLock::new();
        GLOBAL.get_or_init(|| FixedHeap::new(DEFAULT_CAPACITY))
    }

    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Incremented by every `reset` and `load_state`.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HeapInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if `ptr` lies in the part of the region that can hold user data.
    pub fn contains(&self, ptr: HeapPtr) -> bool {
        let addr = ptr.addr();
        addr >= self.base() + HEADER_SIZE && addr < self.base() + self.capacity
    }

    fn total_for(size: usize) -> Result<usize, HeapError> {
        size.max(1)
            .checked_add(HEADER_SIZE + ALIGN - 1)
            .map(|n| n & !(ALIGN - 1))
            .ok_or(HeapError::SizeOverflow)
    }

    fn header_of(ptr: HeapPtr) -> *mut BlockHeader {
        ptr.as_ptr().wrapping_sub(HEADER_SIZE) as *mut BlockHeader
    }

    fn user_of(header: *mut BlockHeader) -> HeapPtr {
        // Headers are never null and the user region follows directly.
        HeapPtr(unsafe { NonNull::new_unchecked((header as *mut u8).add(HEADER_SIZE)) })
    }

    /// Validate that `ptr` names a block below the watermark and return its header.
    fn checked_header(&self, inner: &HeapInner, ptr: HeapPtr) -> Result<*mut BlockHeader, HeapError> {
        if !self.contains(ptr) {
            return Err(HeapError::ForeignPointer { addr: ptr.addr() });
        }
        let offset = ptr.addr() - self.base() - HEADER_SIZE;
        if offset % ALIGN != 0 || offset >= inner.used {
            return Err(HeapError::HeapCorruption {
                addr: ptr.addr(),
                magic: 0,
            });
        }
        let header = Self::header_of(ptr);
        let magic = unsafe { (*header).magic };
        if magic != BLOCK_MAGIC {
            return Err(HeapError::HeapCorruption {
                addr: ptr.addr(),
                magic,
            });
        }
        Ok(header)
    }

    /// Allocate `size` zeroed bytes.
    pub fn alloc(&self, size: usize) -> Result<HeapPtr, HeapError> {
        let total = Self::total_for(size)?;
        let mut inner = self.lock();
        inner.alloc_calls += 1;

        if let Some(ptr) = self.take_free_block(&mut inner, total) {
            return Ok(ptr);
        }

        let available = self.capacity - inner.used;
        if total > available {
            log::error!(
                "fixed heap exhausted: need {} bytes, {} of {} in use",
                total,
                inner.used,
                self.capacity
            );
            return Err(HeapError::OutOfMemory {
                requested: size,
                available: available.saturating_sub(HEADER_SIZE),
            });
        }

        let header = unsafe { self.base.as_ptr().add(inner.used) } as *mut BlockHeader;
        unsafe {
            header.write(BlockHeader {
                total_size: total,
                magic: BLOCK_MAGIC,
                is_free: 0,
                next_free: ptr::null_mut(),
            });
        }
        inner.used += total;
        inner.block_count += 1;
        Ok(Self::user_of(header))
    }

    /// First-fit scan of the free list. The whole user region of the reused
    /// block is zeroed, not only the requested prefix.
    fn take_free_block(&self, inner: &mut HeapInner, total: usize) -> Option<HeapPtr> {
        let mut prev: *mut BlockHeader = ptr::null_mut();
        let mut cur = inner.free_head;
        while !cur.is_null() {
            // Read the successor before the block is unlinked and reused.
            let (next, magic, is_free, size) = unsafe {
                ((*cur).next_free, (*cur).magic, (*cur).is_free, (*cur).total_size)
            };
            if magic != BLOCK_MAGIC || is_free != 1 {
                log::error!(
                    "free list corrupt at {:p} (magic {:#x}, is_free {}); truncating list",
                    cur,
                    magic,
                    is_free
                );
                if prev.is_null() {
                    inner.free_head = ptr::null_mut();
                } else {
                    unsafe { (*prev).next_free = ptr::null_mut() };
                }
                return None;
            }
            if size >= total {
                if prev.is_null() {
                    inner.free_head = next;
                } else {
                    unsafe { (*prev).next_free = next };
                }
                unsafe {
                    (*cur).is_free = 0;
                    (*cur).next_free = ptr::null_mut();
                    ptr::write_bytes((cur as *mut u8).add(HEADER_SIZE), 0, size - HEADER_SIZE);
                }
                return Some(Self::user_of(cur));
            }
            prev = cur;
            cur = next;
        }
        None
    }

    /// Allocate `n * size` zeroed bytes.
    pub fn calloc(&self, n: usize, size: usize) -> Result<HeapPtr, HeapError> {
        let bytes = n.checked_mul(size).ok_or(HeapError::SizeOverflow)?;
        self.alloc(bytes)
    }

    /// Release a block. Pointers outside the region belong to some other
    /// allocator and are ignored.
    pub fn free(&self, ptr: HeapPtr) -> Result<(), HeapError> {
        if !self.contains(ptr) {
            return Ok(());
        }
        let mut inner = self.lock();
        inner.free_calls += 1;
        let header = match self.checked_header(&inner, ptr) {
            Ok(header) => header,
            Err(err) => {
                log::error!("free({:?}) ignored: {}", ptr, err);
                return Err(err);
            }
        };
        if unsafe { (*header).is_free } != 0 {
            log::warn!("double free of {:?} ignored", ptr);
            return Err(HeapError::DoubleFree { addr: ptr.addr() });
        }
        unsafe {
            (*header).is_free = 1;
            (*header).next_free = inner.free_head;
        }
        inner.free_head = header;
        Ok(())
    }

    /// `realloc` with C semantics: `None` allocates, size 0 frees.
    ///
    /// The old block always goes back through [`FixedHeap::free`] so it lands
    /// on the free list.
    pub fn realloc(&self, ptr: Option<HeapPtr>, size: usize) -> Result<Option<HeapPtr>, HeapError> {
        let Some(old) = ptr else {
            return self.alloc(size).map(Some);
        };
        if size == 0 {
            self.free(old)?;
            return Ok(None);
        }
        let old_user = match self.user_size(old) {
            Ok(n) => n,
            Err(err) => {
                log::error!("realloc({:?}, {}) refused: {}", old, size, err);
                return Err(err);
            }
        };
        let new = self.alloc(size)?;
        {
            let _guard = self.lock();
            let new_user = unsafe { (*Self::header_of(new)).total_size } - HEADER_SIZE;
            unsafe { ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_user.min(new_user)) };
        }
        self.free(old)?;
        Ok(Some(new))
    }

    /// Usable bytes of a live block (the full block, not the original request).
    pub fn user_size(&self, ptr: HeapPtr) -> Result<usize, HeapError> {
        let inner = self.lock();
        let header = self.checked_header(&inner, ptr)?;
        if unsafe { (*header).is_free } != 0 {
            return Err(HeapError::DoubleFree { addr: ptr.addr() });
        }
        Ok(unsafe { (*header).total_size } - HEADER_SIZE)
    }

    pub fn block_state(&self, ptr: HeapPtr) -> BlockState {
        if !self.contains(ptr) {
            return BlockState::Foreign;
        }
        let inner = self.lock();
        match self.checked_header(&inner, ptr) {
            Ok(header) if unsafe { (*header).is_free } == 0 => BlockState::Live,
            Ok(_) => BlockState::Free,
            Err(_) => BlockState::Corrupt,
        }
    }

    pub fn is_live(&self, ptr: HeapPtr) -> bool {
        self.block_state(ptr) == BlockState::Live
    }

    /// Copy `data` into a live block at `offset`.
    pub fn write_user(&self, ptr: HeapPtr, offset: usize, data: &[u8]) -> Result<(), HeapError> {
        let inner = self.lock();
        let size = self.live_size(&inner, ptr)?;
        Self::check_bounds(offset, data.len(), size)?;
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().add(offset), data.len()) };
        Ok(())
    }

    /// Copy bytes out of a live block starting at `offset`.
    pub fn read_user(&self, ptr: HeapPtr, offset: usize, buf: &mut [u8]) -> Result<(), HeapError> {
        let inner = self.lock();
        let size = self.live_size(&inner, ptr)?;
        Self::check_bounds(offset, buf.len(), size)?;
        unsafe { ptr::copy_nonoverlapping(ptr.as_ptr().add(offset), buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    fn live_size(&self, inner: &HeapInner, ptr: HeapPtr) -> Result<usize, HeapError> {
        let header = self.checked_header(inner, ptr)?;
        if unsafe { (*header).is_free } != 0 {
            return Err(HeapError::DoubleFree { addr: ptr.addr() });
        }
        Ok(unsafe { (*header).total_size } - HEADER_SIZE)
    }

    fn check_bounds(offset: usize, len: usize, size: usize) -> Result<(), HeapError> {
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(HeapError::OutOfBounds { offset, len, size }),
        }
    }

    /// Zero the region, drop the free list, reset counters. The base stays put.
    pub fn reset(&self) {
        let mut inner = self.lock();
        unsafe { ptr::write_bytes(self.base.as_ptr(), 0, inner.used) };
        inner.used = 0;
        inner.block_count = 0;
        inner.free_head = ptr::null_mut();
        inner.alloc_calls = 0;
        inner.free_calls = 0;
        inner.generation += 1;
        log::debug!("fixed heap reset (generation {})", inner.generation);
    }

    pub fn stats(&self) -> HeapStats {
        let inner = self.lock();
        let mut free_blocks = 0;
        let mut free_bytes = 0;
        let mut cur = inner.free_head;
        // Bounded by block_count in case the list was corrupted into a cycle.
        while !cur.is_null() && free_blocks <= inner.block_count {
            free_blocks += 1;
            free_bytes += unsafe { (*cur).total_size };
            cur = unsafe { (*cur).next_free };
        }
        HeapStats {
            capacity: self.capacity,
            used: inner.used,
            block_count: inner.block_count,
            free_blocks,
            free_bytes,
            alloc_calls: inner.alloc_calls,
            free_calls: inner.free_calls,
            generation: inner.generation,
        }
    }

    /// Walk every block between the base and the watermark.
    ///
    /// Stops early (with a log line) at a header that cannot be a block.
    pub(crate) fn walk_blocks(&self, inner: &HeapInner, mut visit: impl FnMut(*mut BlockHeader)) {
        let mut offset = 0;
        while offset < inner.used {
            let header = unsafe { self.base.as_ptr().add(offset) } as *mut BlockHeader;
            let (magic, size) = unsafe { ((*header).magic, (*header).total_size) };
            if magic != BLOCK_MAGIC || size < HEADER_SIZE || size % ALIGN != 0 {
                log::error!("block walk stopped at offset {}: magic {:#x}, size {}", offset, magic, size);
                return;
            }
            visit(header);
            offset += size;
        }
    }
}

impl Drop for FixedHeap {
    fn drop(&mut self) {
        if let Ok(layout) = Layout::from_size_align(self.capacity, REGION_ALIGN) {
            unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for FixedHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedHeap")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_heap() -> FixedHeap {
        FixedHeap::new(64 * 1024)
    }

    fn fill(heap: &FixedHeap, ptr: HeapPtr, byte: u8) {
        let size = heap.user_size(ptr).unwrap();
        heap.write_user(ptr, 0, &vec![byte; size]).unwrap();
    }

    fn is_zero(heap: &FixedHeap, ptr: HeapPtr) -> bool {
        let size = heap.user_size(ptr).unwrap();
        let mut buf = vec![0xAAu8; size];
        heap.read_user(ptr, 0, &mut buf).unwrap();
        buf.iter().all(|&b| b == 0)
    }

    #[test]
    fn test_bump_allocation_is_ordered_and_aligned() {
        let heap = small_heap();
        let a = heap.alloc(10).unwrap();
        let b = heap.alloc(100).unwrap();
        assert_eq!(a.addr(), heap.base() + HEADER_SIZE);
        assert!(b.addr() > a.addr());
        assert_eq!(a.addr() % ALIGN, 0);
        assert_eq!(b.addr() % ALIGN, 0);
        assert_eq!(heap.stats().block_count, 2);
    }

    #[test]
    fn test_free_then_alloc_reuses_first_fit() {
        let heap = small_heap();
        let a = heap.alloc(64).unwrap();
        let _b = heap.alloc(64).unwrap();
        heap.free(a).unwrap();
        let used = heap.stats().used;
        let c = heap.alloc(32).unwrap();
        assert_eq!(c, a);
        assert_eq!(heap.stats().used, used);
    }

    #[test]
    fn test_unlink_keeps_successor() {
        let heap = small_heap();
        let small = heap.alloc(16).unwrap();
        let big = heap.alloc(256).unwrap();
        let other = heap.alloc(16).unwrap();
        // Free list after these frees: other -> big -> small
        heap.free(small).unwrap();
        heap.free(big).unwrap();
        heap.free(other).unwrap();

        // Takes `big` from the middle of the list
        let r1 = heap.alloc(200).unwrap();
        assert_eq!(r1, big);
        // Remaining list must still reach `small` through `other`
        let r2 = heap.alloc(16).unwrap();
        let r3 = heap.alloc(16).unwrap();
        let mut got = vec![r2, r3];
        got.sort();
        let mut want = vec![small, other];
        want.sort();
        assert_eq!(got, want);
        assert_eq!(heap.stats().free_blocks, 0);
    }

    #[test]
    fn test_reuse_zeroes_entire_block() {
        let heap = small_heap();
        let a = heap.alloc(200).unwrap();
        fill(&heap, a, 0xFF);
        heap.free(a).unwrap();
        let b = heap.alloc(8).unwrap();
        assert_eq!(a, b);
        assert!(heap.user_size(b).unwrap() >= 200);
        assert!(is_zero(&heap, b));
    }

    #[test]
    fn test_free_foreign_pointer_is_noop() {
        let heap = small_heap();
        let mut outside = [0u8; 32];
        let ptr = HeapPtr::from_raw(outside.as_mut_ptr()).unwrap();
        assert!(heap.free(ptr).is_ok());
        assert_eq!(heap.block_state(ptr), BlockState::Foreign);
        assert_eq!(heap.stats().free_calls, 0);
    }

    #[test]
    fn test_double_free_is_reported() {
        let heap = small_heap();
        let a = heap.alloc(8).unwrap();
        heap.free(a).unwrap();
        assert!(matches!(heap.free(a), Err(HeapError::DoubleFree { .. })));
        assert_eq!(heap.stats().free_blocks, 1);
    }

    #[test]
    fn test_bad_magic_is_reported_not_fatal() {
        let heap = small_heap();
        let a = heap.alloc(8).unwrap();
        unsafe {
            let magic = a.as_ptr().sub(HEADER_SIZE).add(size_of::<usize>()) as *mut u32;
            magic.write(0xDEAD_BEEF);
        }
        assert!(matches!(
            heap.free(a),
            Err(HeapError::HeapCorruption { magic: 0xDEAD_BEEF, .. })
        ));
        assert_eq!(heap.block_state(a), BlockState::Corrupt);
        assert!(heap.realloc(Some(a), 32).is_err());
    }

    #[test]
    fn test_realloc_semantics() {
        let heap = small_heap();
        let a = heap.realloc(None, 24).unwrap().unwrap();
        heap.write_user(a, 0, b"abcdefgh").unwrap();

        let b = heap.realloc(Some(a), 500).unwrap().unwrap();
        let mut buf = [0u8; 8];
        heap.read_user(b, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdefgh");

        // Old block went through free() and is reusable
        assert_eq!(heap.stats().free_blocks, 1);
        let c = heap.alloc(24).unwrap();
        assert_eq!(c, a);

        assert_eq!(heap.realloc(Some(c), 0).unwrap(), None);
        assert!(!heap.is_live(c));
    }

    #[test]
    fn test_out_of_memory() {
        let heap = FixedHeap::new(1024);
        assert!(heap.alloc(512).is_ok());
        assert!(matches!(heap.alloc(1024), Err(HeapError::OutOfMemory { .. })));
        assert!(matches!(heap.calloc(usize::MAX, 2), Err(HeapError::SizeOverflow)));
    }

    #[test]
    fn test_reset_keeps_base_and_clears_everything() {
        let heap = small_heap();
        let base = heap.base();
        let a = heap.alloc(100).unwrap();
        fill(&heap, a, 0x55);
        heap.free(a).unwrap();
        let generation = heap.generation();

        heap.reset();
        let stats = heap.stats();
        assert_eq!(heap.base(), base);
        assert_eq!(stats.used, 0);
        assert_eq!(stats.free_blocks, 0);
        assert_eq!(heap.generation(), generation + 1);
        assert!(!heap.is_live(a));

        let b = heap.alloc(100).unwrap();
        assert_eq!(a, b);
        assert!(is_zero(&heap, b));
    }

    #[test]
    fn test_write_user_bounds() {
        let heap = small_heap();
        let a = heap.alloc(16).unwrap();
        let size = heap.user_size(a).unwrap();
        assert!(heap.write_user(a, size - 4, &[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            heap.write_user(a, size - 2, &[1, 2, 3, 4]),
            Err(HeapError::OutOfBounds { .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Alloc(usize),
        Free(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..512).prop_map(Op::Alloc),
            (0usize..64).prop_map(Op::Free),
        ]
    }

    /// Replay a sequence, returning block offsets from the base.
    fn replay(heap: &FixedHeap, ops: &[Op]) -> Vec<usize> {
        let mut live: Vec<HeapPtr> = Vec::new();
        let mut offsets = Vec::new();
        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let ptr = heap.alloc(*size).unwrap();
                    offsets.push(ptr.addr() - heap.base());
                    live.push(ptr);
                }
                Op::Free(i) if !live.is_empty() => {
                    let ptr = live.remove(i % live.len());
                    heap.free(ptr).unwrap();
                }
                Op::Free(_) => {}
            }
        }
        offsets
    }

    proptest! {
        #[test]
        fn prop_reset_replays_identical_addresses(ops in prop::collection::vec(op_strategy(), 1..80)) {
            let heap = FixedHeap::new(256 * 1024);
            let first = replay(&heap, &ops);
            heap.reset();
            let second = replay(&heap, &ops);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_reused_block_reads_zero(size in 1usize..1024, request in 1usize..1024) {
            let heap = small_heap();
            let a = heap.alloc(size).unwrap();
            fill(&heap, a, 0xFF);
            heap.free(a).unwrap();
            let b = heap.alloc(request).unwrap();
            prop_assert!(is_zero(&heap, b));
            if request <= size {
                prop_assert_eq!(a, b);
            }
        }
    }
}
