//! End-of-game capture.
//!
//! After the hero dies the engine walks a fixed series of yes/no prompts
//! and prints each section it was asked to show. [`DeathStage`] follows
//! those prompts; while a capturing stage is active every line the engine
//! prints is appended to the matching [`DeathInfo`] field.

use serde::Serialize;
use strum::Display;

/// A prompt of the end-of-game sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeathPrompt {
    Possessions,
    Attributes,
    Conduct,
    Overview,
    Vanquished,
    Genocided,
    DumpCore,
}

impl DeathPrompt {
    pub fn detect(query: &str) -> Option<Self> {
        let q = query.to_ascii_lowercase();
        let prompt = if q.contains("possessions identified") {
            DeathPrompt::Possessions
        } else if q.contains("see your attributes") {
            DeathPrompt::Attributes
        } else if q.contains("see your conduct") {
            DeathPrompt::Conduct
        } else if q.contains("dungeon overview") {
            DeathPrompt::Overview
        } else if q.contains("vanquished") {
            DeathPrompt::Vanquished
        } else if q.contains("genocided") {
            DeathPrompt::Genocided
        } else if q.contains("dump core") {
            DeathPrompt::DumpCore
        } else {
            return None;
        };
        Some(prompt)
    }

    /// What the bridge answers when nothing else does.
    pub fn answer(self) -> u8 {
        match self {
            DeathPrompt::Possessions | DeathPrompt::Attributes | DeathPrompt::Conduct | DeathPrompt::Overview => b'y',
            DeathPrompt::Vanquished | DeathPrompt::Genocided | DeathPrompt::DumpCore => b'n',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum DeathStage {
    #[default]
    Inactive,
    Possessions,
    Attributes,
    Conduct,
    Overview,
    /// Past the captured sections.
    Lists,
    Done,
}

impl DeathStage {
    pub fn on_prompt(self, prompt: DeathPrompt) -> DeathStage {
        match prompt {
            DeathPrompt::Possessions => DeathStage::Possessions,
            DeathPrompt::Attributes => DeathStage::Attributes,
            DeathPrompt::Conduct => DeathStage::Conduct,
            DeathPrompt::Overview => DeathStage::Overview,
            DeathPrompt::Vanquished | DeathPrompt::Genocided => DeathStage::Lists,
            DeathPrompt::DumpCore => DeathStage::Done,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, DeathStage::Inactive | DeathStage::Done)
    }
}

/// Everything captured about the finished game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeathInfo {
    pub possessions: String,
    pub attributes: String,
    pub conduct: String,
    pub overview: String,
    pub final_hp: i32,
    pub final_gold: i64,
    pub final_turns: i64,
    pub final_score: i64,
    pub role: String,
    pub death_message: String,
}

impl DeathInfo {
    /// Append `line` to the field `stage` captures into.
    pub fn capture(&mut self, stage: DeathStage, line: &str) {
        let field = match stage {
            DeathStage::Possessions => &mut self.possessions,
            DeathStage::Attributes => &mut self.attributes,
            DeathStage::Conduct => &mut self.conduct,
            DeathStage::Overview => &mut self.overview,
            _ => return,
        };
        if line.trim().is_empty() {
            return;
        }
        field.push_str(line);
        field.push('\n');
    }

    pub fn is_empty(&self) -> bool {
        *self == DeathInfo::default()
    }
}
