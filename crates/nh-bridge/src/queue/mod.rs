//! Engine ↔ host pipelines: the render ring (engine to UI) and the input
//! queue (host to engine).

pub mod input;
pub mod render;

pub use input::{EngineCommand, InputQueue, WAIT_SLICE, WAKE_BYTE};
pub use render::{MapTile, RenderConsumer, RenderElement, RenderProducer, StatusLine, render_channel};
