//! Extended command lookup.

use super::ExtCmd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtCmdMatch {
    Found(usize),
    Ambiguous(Vec<usize>),
    Unknown,
}

/// Exact name first, then a unique prefix.
pub fn match_ext_cmd(name: &str, commands: &[ExtCmd]) -> ExtCmdMatch {
    let name = name.trim();
    if name.is_empty() {
        return ExtCmdMatch::Unknown;
    }
    if let Some(i) = commands.iter().position(|c| c.name.eq_ignore_ascii_case(name)) {
        return ExtCmdMatch::Found(i);
    }
    let lower = name.to_ascii_lowercase();
    let hits: Vec<usize> = commands
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name.to_ascii_lowercase().starts_with(&lower))
        .map(|(i, _)| i)
        .collect();
    match hits.len() {
        0 => ExtCmdMatch::Unknown,
        1 => ExtCmdMatch::Found(hits[0]),
        _ => ExtCmdMatch::Ambiguous(hits),
    }
}
