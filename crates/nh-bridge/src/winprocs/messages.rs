//! Message categorization and history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

pub const MESSAGE_HISTORY: usize = 200;
pub const OUTPUT_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    Combat,
    Item,
    Food,
    Door,
    Move,
    Magic,
    Prayer,
    Trap,
    Save,
    System,
    Info,
}

// First match wins, so more specific keywords come first.
const KEYWORDS: &[(MessageCategory, &[&str])] = &[
    (MessageCategory::Save, &["save", "saving", "restor", "be seeing you", "welcome back"]),
    (
        MessageCategory::Prayer,
        &["pray", "god", "goddess", "feel a hopeful", "you feel that", "altar"],
    ),
    (MessageCategory::Trap, &["trap", "pit", "bear trap", "web", "land mine", "teleportation"]),
    (
        MessageCategory::Combat,
        &[
            "hit", "miss", "kill", "bite", "attack", "destroy", "die", "dies", "strike", "wound", "fight",
        ],
    ),
    (MessageCategory::Food, &["eat", "food", "hungry", "starv", "corpse", "delicious", "satiated"]),
    (MessageCategory::Door, &["door", "lock", "unlock", "open", "close"]),
    (MessageCategory::Magic, &["spell", "magic", "wand", "zap", "cast", "scroll", "potion"]),
    (MessageCategory::Item, &["you see here", "pick up", "drop", "wield", "wear", "there are", "gold"]),
    (MessageCategory::Move, &["stair", "ladder", "climb", "descend", "ascend", "you move", "swim"]),
    (MessageCategory::System, &["nethack", "copyright", "version", "option", "unknown"]),
];

/// Keyword categorization of one message line.
pub fn categorize(text: &str) -> MessageCategory {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(cat, _)| *cat)
        .unwrap_or(MessageCategory::Info)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEntry {
    pub turn: i64,
    pub category: MessageCategory,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Bounded message history plus the flat output buffer older hosts read.
#[derive(Debug, Default)]
pub struct MessageLog {
    history: VecDeque<MessageEntry>,
    output: String,
}

impl MessageLog {
    pub fn push(&mut self, turn: i64, category: MessageCategory, text: &str) {
        if self.history.len() == MESSAGE_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(MessageEntry {
            turn,
            category,
            text: text.to_string(),
            at: Utc::now(),
        });
        self.append_output(text);
    }

    fn append_output(&mut self, text: &str) {
        let needed = text.len() + 1;
        if self.output.len() + needed > OUTPUT_BUFFER_BYTES {
            // Keep the buffer linear: drop whole lines from the front.
            let excess = self.output.len() + needed - OUTPUT_BUFFER_BYTES;
            let start = excess.min(self.output.len());
            let cut = self.output.as_bytes()[start..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|i| start + i + 1)
                .unwrap_or(self.output.len());
            self.output.drain(..cut);
        }
        if needed <= OUTPUT_BUFFER_BYTES {
            self.output.push_str(text);
            self.output.push('\n');
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &MessageEntry> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last(&self) -> Option<&MessageEntry> {
        self.history.back()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.history.iter().any(|m| m.text.contains(needle))
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Hand the accumulated output to the caller and start over.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.output.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(categorize("You hit the jackal."), MessageCategory::Combat);
        assert_eq!(categorize("This food is delicious!"), MessageCategory::Food);
        assert_eq!(categorize("The door opens."), MessageCategory::Door);
        assert_eq!(categorize("You see here a scroll labeled FOO."), MessageCategory::Magic);
        assert_eq!(categorize("There is a trap door here."), MessageCategory::Trap);
        assert_eq!(categorize("You pray to Tyr."), MessageCategory::Prayer);
        assert_eq!(categorize("Saving..."), MessageCategory::Save);
        assert_eq!(categorize("It's a wall."), MessageCategory::Info);
        assert_eq!(MessageCategory::Combat.to_string(), "combat");
    }

    #[test]
    fn test_history_bounded() {
        let mut log = MessageLog::default();
        for n in 0..(MESSAGE_HISTORY + 5) {
            log.push(n as i64, MessageCategory::Info, &format!("line {n}"));
        }
        assert_eq!(log.len(), MESSAGE_HISTORY);
        assert_eq!(log.history().next().unwrap().text, "line 5");
        assert!(log.contains("line 204"));
    }

    #[test]
    fn test_output_buffer_bounded_and_linear() {
        let mut log = MessageLog::default();
        let line = "x".repeat(1000);
        for n in 0..100 {
            log.push(n, MessageCategory::Info, &line);
        }
        assert!(log.output().len() <= OUTPUT_BUFFER_BYTES);
        assert!(log.output().starts_with('x'));
        assert!(log.output().ends_with('\n'));
        let taken = log.take_output();
        assert!(!taken.is_empty());
        assert!(log.output().is_empty());
    }
}
