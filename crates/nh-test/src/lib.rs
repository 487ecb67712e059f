//! nh-test: a deterministic stand-in engine for exercising the NetHack bridge
//!
//! The bridge only ever talks to its engine through the `Engine` and
//! `GameView` traits. [`SimEngine`] implements both with a tiny dungeon of
//! fixed levels, so the integration tests under `tests/` can drive whole
//! sessions (new game, save, restore, death, restart) without the real
//! engine linked in.
//!
//! - `engine`: [`SimEngine`] and its move loop
//! - `level`, `hero`, `glyphs`: the game data it plays with
//! - `probe`: what the engine publishes for tests to read
//! - `layout`: a reader for the records of a consolidated save

pub mod engine;
pub mod glyphs;
pub mod hero;
pub mod layout;
pub mod level;
pub mod probe;

use std::sync::Arc;

use nh_bridge::{CharacterPreset, Engine, EngineFactory};

pub use engine::{PAINT_BURST, SimEngine};
pub use layout::SaveLayout;
pub use probe::{Projection, SimProbe, SimReport};

/// Engine factory building a fresh [`SimEngine`] that reports to `probe`.
pub fn sim_factory(probe: Arc<SimProbe>) -> EngineFactory {
    Arc::new(move || -> Box<dyn Engine> { Box::new(SimEngine::new(Arc::clone(&probe))) })
}

/// Hero the lawful female human Valkyrie.
pub fn valkyrie() -> CharacterPreset {
    CharacterPreset {
        name: "Hero".into(),
        role: hero::VALKYRIE,
        race: 0,
        gender: 1,
        alignment: 0,
    }
}
