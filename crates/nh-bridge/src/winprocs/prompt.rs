//! Prompt classification for `yn_function` and `getlin`.

use crate::host::{PickerKind, TextInputKind};

use super::death::DeathPrompt;

/// What kind of yes/no-style question the engine is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Save,
    Death(DeathPrompt),
    CharacterCreation,
    Picker(PickerKind),
    Generic,
}

pub fn classify(query: &str) -> PromptKind {
    if let Some(death) = DeathPrompt::detect(query) {
        return PromptKind::Death(death);
    }
    let q = query.to_ascii_lowercase();
    if q.contains("save") || q.contains("overwrite the old file") {
        PromptKind::Save
    } else if q.contains("shall i pick")
        || q.contains("is this ok")
        || q.contains("start a new game")
        || q.contains("pick a character")
    {
        PromptKind::CharacterCreation
    } else if q.contains("ring-finger") || q.contains("which hand") || q.contains("right or left") {
        PromptKind::Picker(PickerKind::Hand)
    } else if q.contains("do what with") || q.contains("loot") || q.contains("take something out") {
        PromptKind::Picker(PickerKind::Loot)
    } else {
        PromptKind::Generic
    }
}

/// `true` when `resp` offers more than a yes/no/quit style choice, e.g.
/// inventory letters or directions.
pub fn is_selection_set(resp: Option<&str>) -> bool {
    const TRIVIAL: &str = "ynaq#\x1b";
    resp.is_some_and(|r| !r.is_empty() && r.chars().any(|c| !TRIVIAL.contains(c)))
}

/// `getlin` prompts the host shows a text sheet for.
pub fn text_input_kind(query: &str) -> Option<TextInputKind> {
    let q = query.to_ascii_lowercase();
    if q.contains("genocide") {
        Some(TextInputKind::Genocide)
    } else if q.contains("polymorph") || q.contains("become what kind of monster") {
        Some(TextInputKind::Polymorph)
    } else if q.contains("call ") || q.contains("name") {
        Some(TextInputKind::Name)
    } else if q.contains("wish") {
        Some(TextInputKind::Wish)
    } else if q.contains("annotat") || q.contains("engrave") {
        Some(TextInputKind::Annotation)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("Really save?"), PromptKind::Save);
        assert_eq!(classify("Shall I pick character's race for you? [ynaq]"), PromptKind::CharacterCreation);
        assert_eq!(classify("Is this ok? [ynq]"), PromptKind::CharacterCreation);
        assert_eq!(
            classify("Which ring-finger, Right or Left? [rl]"),
            PromptKind::Picker(PickerKind::Hand)
        );
        assert_eq!(classify("Do what with the chest?"), PromptKind::Picker(PickerKind::Loot));
        assert_eq!(
            classify("Do you want your possessions identified?"),
            PromptKind::Death(DeathPrompt::Possessions)
        );
        assert_eq!(classify("In what direction?"), PromptKind::Generic);
    }

    #[test]
    fn test_selection_sets() {
        assert!(!is_selection_set(None));
        assert!(!is_selection_set(Some("yn")));
        assert!(!is_selection_set(Some("ynaq")));
        assert!(is_selection_set(Some("abcdf or ?*")));
        assert!(is_selection_set(Some("hjklyubn<>.")));
        assert!(is_selection_set(Some("rl")));
    }

    #[test]
    fn test_text_inputs() {
        assert_eq!(text_input_kind("What monster do you want to genocide?"), Some(TextInputKind::Genocide));
        assert_eq!(text_input_kind("For what do you wish?"), Some(TextInputKind::Wish));
        assert_eq!(text_input_kind("What do you want to name this dagger?"), Some(TextInputKind::Name));
        assert_eq!(text_input_kind("What do you want to write in the dust here?"), None);
    }
}
