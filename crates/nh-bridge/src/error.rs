use std::path::PathBuf;

use nh_heap::HeapError;
use nh_save::SaveError;
use thiserror::Error;

use crate::exit::ExitReason;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    #[error("save storage error: {0}")]
    Storage(#[from] SaveError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bridge is not initialized")]
    NotInitialized,

    #[error("engine thread is running")]
    EngineRunning,

    #[error("no game in progress")]
    NoGame,

    #[error("no engine factory installed")]
    NoEngineFactory,

    #[error("save file {path}: {reason}")]
    SaveFormat { path: PathBuf, reason: String },

    #[error("savefile procedures not initialized for {0}")]
    SaveProcsUninitialized(PathBuf),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("engine exited: {0}")]
    EngineExited(ExitReason),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
