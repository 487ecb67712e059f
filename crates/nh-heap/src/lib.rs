//! nh-heap: Fixed-address heap for the embedded engine
//!
//! The engine was written to own a whole process and to die with it. When it
//! is hosted inside a long-lived application, every allocation it makes is
//! routed to one contiguous region whose base address never changes for the
//! life of the process. Offsets into the region therefore survive a session
//! teardown, and a full `reset()` returns the engine to a cold-start memory
//! image without touching the system allocator.
//!
//! Allocation policy is a first-fit free list in front of a bump pointer.
//! Blocks are never split or coalesced; the engine's allocation pattern is
//! dominated by a few record sizes, so reuse is almost always exact.
//!
//! - `heap`: the allocator itself (`FixedHeap`, `HeapPtr`, `HeapStats`)
//! - `state`: raw heap image save/load with free-list relocation
//! - `error`: `HeapError`

mod error;
mod heap;
mod state;

pub use error::HeapError;
pub use heap::{
    ALIGN, BLOCK_MAGIC, BlockState, DEFAULT_CAPACITY, FixedHeap, HEADER_SIZE, HeapPtr, HeapStats,
};
pub use state::STATE_MAGIC;
