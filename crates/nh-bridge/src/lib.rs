//! nh-bridge: Hosts the single-threaded NetHack engine inside an app
//!
//! The engine expects to own a process: it keeps its state in globals,
//! blocks for keystrokes, and calls `exit` when a game ends. The bridge
//! turns that into a component a host application can start, drive, save,
//! restore and restart any number of times without relaunching.
//!
//! - `lifecycle`: `Lifecycle`, the controller owning the engine and its
//!   worker thread (`full_init`, `full_shutdown`, sessions)
//! - `engine`: the `Engine` / `GameView` contract the hosted engine
//!   implements
//! - `winprocs`: `BridgeWindows`, the window procedures the engine draws
//!   and prompts through
//! - `queue`: the render ring (engine to UI) and the input queue (UI to
//!   engine)
//! - `snapshot`: double-buffered per-turn game snapshot
//! - `save` / `restore`: the consolidated save and the restore sequence
//! - `invalidate`, `roots`: pointer roots nulled after a heap reset
//! - `exit`: the exit trampoline around engine entry points
//! - `status`, `query`: caches behind the host's status and query calls
//! - `exports`: the C entry points

pub mod config;
pub mod engine;
pub mod error;
pub mod exit;
pub mod exports;
pub mod host;
pub mod invalidate;
pub mod lifecycle;
pub mod nhfile;
pub mod paths;
pub mod query;
pub mod queue;
pub mod restore;
pub mod roots;
pub mod save;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod winprocs;

pub use config::{BridgeConfig, GameOptions, SymbolOverrides};
pub use engine::{CharacterPreset, Engine, EngineFactory, GameView, LoopExit, ProgramState, RestoreMode};
pub use error::{BridgeError, Result};
pub use exit::{EngineExited, ExitReason};
pub use host::{HostCallbacks, HostEvent};
pub use lifecycle::{Lifecycle, SessionEnd};
pub use nhfile::{NhFile, NhFileMode};
pub use paths::FilePrefixes;
pub use queue::{EngineCommand, RenderElement};
pub use restore::{RestoreOutcome, RestoreReport};
pub use roots::{EngineRoots, WornMask};
pub use save::{SaveOutcome, SaveReport, SaveTarget, SkipReason};
pub use session::{SessionFlags, Shared};
pub use snapshot::GameSnapshot;
pub use winprocs::{BridgeWindows, WindowProcs};
