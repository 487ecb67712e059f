use thiserror::Error;

/// Errors reported by the fixed-address heap.
///
/// None of these abort the process. Corruption and double frees are logged
/// at the point of detection and the offending operation becomes a no-op.
#[derive(Debug, Error)]
pub enum HeapError {
    #[error("fixed heap exhausted: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    #[error("heap corruption at {addr:#x}: block magic {magic:#x}")]
    HeapCorruption { addr: usize, magic: u32 },

    #[error("double free of block at {addr:#x}")]
    DoubleFree { addr: usize },

    #[error("pointer {addr:#x} does not belong to the fixed heap")]
    ForeignPointer { addr: usize },

    #[error("allocation size overflow")]
    SizeOverflow,

    #[error("access of {len} bytes at offset {offset} exceeds block of {size} bytes")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    #[error("invalid heap state image: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
