//! Game options and bridge configuration.
//!
//! Options come either from a JSON document or from nethackrc-style
//! `OPTIONS=` lines. Unknown option names are logged and ignored so a newer
//! host can ship options an older bridge does not know about.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{BridgeError, Result};

/// Widest map the engine supports.
pub const MAX_COLNO: u16 = 80;
/// Tallest map the engine supports.
pub const MAX_ROWNO: u16 = 21;

/// How running and travel are animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    #[strum(to_string = "tportal", serialize = "teleport")]
    #[serde(rename = "tportal", alias = "teleport")]
    Tportal,
    Leap,
    Step,
    Crawl,
}

/// Menu presentation style. Graphical menus require `Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MenuStyle {
    Traditional,
    Combination,
    Partial,
    #[default]
    Full,
}

/// Platform symbol overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolOverrides {
    pub boulder: Option<char>,
}

/// Options handed to the engine at init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    /// Wizard mode.
    pub debug: bool,
    pub randomall: bool,
    pub initrole: Option<String>,
    pub initrace: Option<String>,
    pub initgend: Option<String>,
    pub initalign: Option<String>,
    pub runmode: RunMode,
    pub travelcmd: bool,
    pub num_pad: bool,
    pub num_pad_mode: u8,
    pub menu_style: MenuStyle,
    pub map_width: u16,
    pub map_height: u16,
    pub symbols: SymbolOverrides,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            debug: false,
            randomall: false,
            initrole: None,
            initrace: None,
            initgend: None,
            initalign: None,
            runmode: RunMode::default(),
            travelcmd: true,
            num_pad: false,
            num_pad_mode: 0,
            menu_style: MenuStyle::Full,
            map_width: MAX_COLNO,
            map_height: MAX_ROWNO,
            symbols: SymbolOverrides::default(),
        }
    }
}

fn parse_bool(name: &str, value: Option<&str>) -> Result<bool> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("true") | Some("yes") | Some("on") | Some("1") => Ok(true),
        Some("false") | Some("no") | Some("off") | Some("0") => Ok(false),
        Some(other) => Err(BridgeError::Config(format!("{name}: not a boolean: {other}"))),
    }
}

fn require<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::Config(format!("{name} requires a value")))
}

impl GameOptions {
    /// Load options from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Apply every `OPTIONS=` line of a nethackrc-style document.
    pub fn apply_rc(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, rest)) if key.trim().eq_ignore_ascii_case("OPTIONS") => {
                    for opt in rest.split(',') {
                        self.apply_option_str(opt.trim())?;
                    }
                }
                _ => log::debug!("ignoring rc line {:?}", line),
            }
        }
        self.validate()
    }

    /// Apply one `name`, `!name` or `name:value` option.
    pub fn apply_option_str(&mut self, opt: &str) -> Result<()> {
        if opt.is_empty() {
            return Ok(());
        }
        if let Some(name) = opt.strip_prefix('!').or_else(|| opt.strip_prefix("no"))
            && self.is_boolean(name)
        {
            return self.set_option(name, Some("false"));
        }
        match opt.split_once(':') {
            Some((name, value)) => self.set_option(name.trim(), Some(value.trim())),
            None => self.set_option(opt, None),
        }
    }

    fn is_boolean(&self, name: &str) -> bool {
        matches!(name, "debug" | "wizard" | "randomall" | "travelcmd" | "travel" | "number_pad" | "num_pad")
    }

    /// Set a single option by name.
    pub fn set_option(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        match name.to_ascii_lowercase().as_str() {
            "debug" | "wizard" => self.debug = parse_bool(name, value)?,
            "randomall" => self.randomall = parse_bool(name, value)?,
            "role" | "initrole" => self.initrole = Some(require(name, value)?.to_owned()),
            "race" | "initrace" => self.initrace = Some(require(name, value)?.to_owned()),
            "gender" | "initgend" => self.initgend = Some(require(name, value)?.to_owned()),
            "align" | "initalign" => self.initalign = Some(require(name, value)?.to_owned()),
            "runmode" => {
                let v = require(name, value)?;
                self.runmode = RunMode::from_str(v)
                    .map_err(|_| BridgeError::Config(format!("runmode: unknown mode {v}")))?;
            }
            "travelcmd" | "travel" => self.travelcmd = parse_bool(name, value)?,
            "number_pad" | "num_pad" => match value.and_then(|v| v.parse::<u8>().ok()) {
                Some(mode) => {
                    self.num_pad = mode != 0;
                    self.num_pad_mode = mode;
                }
                None => self.num_pad = parse_bool(name, value)?,
            },
            "num_pad_mode" => {
                let v = require(name, value)?;
                self.num_pad_mode = v
                    .parse()
                    .map_err(|_| BridgeError::Config(format!("num_pad_mode: not a number: {v}")))?;
            }
            "menustyle" | "menu_style" => {
                let v = require(name, value)?;
                self.menu_style = MenuStyle::from_str(v)
                    .map_err(|_| BridgeError::Config(format!("menustyle: unknown style {v}")))?;
            }
            "boulder" => {
                let v = require(name, value)?;
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => self.symbols.boulder = Some(c),
                    _ => return Err(BridgeError::Config(format!("boulder: expected one character, got {v}"))),
                }
            }
            other => log::warn!("unknown option {:?} ignored", other),
        }
        Ok(())
    }

    /// Set the visible map size.
    pub fn set_map_size(&mut self, width: u16, height: u16) -> Result<()> {
        if width == 0 || height == 0 || width > MAX_COLNO || height > MAX_ROWNO {
            return Err(BridgeError::Config(format!(
                "map size {width}x{height} outside 1..={MAX_COLNO} x 1..={MAX_ROWNO}"
            )));
        }
        self.map_width = width;
        self.map_height = height;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.menu_style != MenuStyle::Full {
            return Err(BridgeError::Config(format!(
                "menustyle must be full for graphical menus, not {}",
                self.menu_style
            )));
        }
        if self.map_width == 0 || self.map_width > MAX_COLNO || self.map_height == 0 || self.map_height > MAX_ROWNO {
            return Err(BridgeError::Config(format!(
                "map size {}x{} exceeds {}x{}",
                self.map_width, self.map_height, MAX_COLNO, MAX_ROWNO
            )));
        }
        Ok(())
    }
}

/// Everything the lifecycle controller needs to bring the bridge up.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Writable documents root.
    pub docs_root: PathBuf,
    /// Read-only directory whose files are copied into `Data/` on first run.
    pub bundle_dir: Option<PathBuf>,
    pub options: GameOptions,
    /// Render ring capacity, rounded up to a power of two.
    pub render_capacity: usize,
    /// Input ring capacity in bytes.
    pub input_capacity: usize,
    /// Target engine step rate for `delay_output`. Zero disables pacing.
    pub steps_per_second: u32,
}

impl BridgeConfig {
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            docs_root: docs_root.into(),
            bundle_dir: None,
            options: GameOptions::default(),
            render_capacity: 4096,
            input_capacity: 256,
            steps_per_second: 30,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new(nh_save::default_documents_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = GameOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.runmode, RunMode::Tportal);
        assert!(options.travelcmd);
    }

    #[test]
    fn test_rc_options_line() {
        let mut options = GameOptions::default();
        options
            .apply_rc(
                "# comment\nOPTIONS=debug,role:Valkyrie,race:human,!travelcmd\n\
                 OPTIONS=runmode:crawl,number_pad:2,boulder:0,frobnicate",
            )
            .unwrap();
        assert!(options.debug);
        assert_eq!(options.initrole.as_deref(), Some("Valkyrie"));
        assert_eq!(options.initrace.as_deref(), Some("human"));
        assert!(!options.travelcmd);
        assert_eq!(options.runmode, RunMode::Crawl);
        assert!(options.num_pad);
        assert_eq!(options.num_pad_mode, 2);
        assert_eq!(options.symbols.boulder, Some('0'));
    }

    #[test]
    fn test_menu_style_must_be_full() {
        let mut options = GameOptions::default();
        let err = options.apply_rc("OPTIONS=menustyle:traditional").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_bad_values_rejected() {
        let mut options = GameOptions::default();
        assert!(options.set_option("runmode", Some("sprint")).is_err());
        assert!(options.set_option("boulder", Some("ab")).is_err());
        assert!(options.set_option("debug", Some("maybe")).is_err());
        assert!(options.set_map_size(81, 21).is_err());
        assert!(options.set_map_size(40, 0).is_err());
        options.set_map_size(40, 12).unwrap();
        assert_eq!((options.map_width, options.map_height), (40, 12));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"debug": true, "runmode": "leap", "symbols": {"boulder": "0"}}"#).unwrap();
        let options = GameOptions::from_json_file(&path).unwrap();
        assert!(options.debug);
        assert_eq!(options.runmode, RunMode::Leap);
        assert_eq!(options.symbols.boulder, Some('0'));
        assert_eq!(options.map_width, MAX_COLNO);
    }
}
