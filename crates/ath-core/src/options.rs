//! Caller-facing options and their normalization into an explicit [`Config`].
//!
//! `Options` is what a page (or a TOML file) supplies; every field defaults.
//! `Config` is the validated value the policy and lifecycle read. Derived
//! fields (mandatory implies modal, `detect_homescreen = true` means hash)
//! are resolved once here so no decision logic re-derives them.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_APP_ID, DEFAULT_FONT_SIZE, MANDATORY_START_DELAY};
use crate::environment::{Environment, Os};
use crate::url_token::TokenMode;

/// `debug = true` or `debug = "ios"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DebugSetting {
    Flag(bool),
    Os(Os),
}

impl DebugSetting {
    pub fn enabled(&self) -> bool {
        !matches!(self, DebugSetting::Flag(false))
    }

    pub fn forced_os(&self) -> Option<Os> {
        match self {
            DebugSetting::Os(os) => Some(*os),
            DebugSetting::Flag(_) => None,
        }
    }
}

impl Default for DebugSetting {
    fn default() -> Self {
        DebugSetting::Flag(false)
    }
}

/// `detect_homescreen = false | true | "hash" | "queryString" | "smartURL"`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectSetting {
    Flag(bool),
    Mode(TokenMode),
}

impl DetectSetting {
    pub fn mode(&self) -> Option<TokenMode> {
        match self {
            DetectSetting::Flag(false) => None,
            DetectSetting::Flag(true) => Some(TokenMode::Hash),
            DetectSetting::Mode(mode) => Some(*mode),
        }
    }
}

impl Default for DetectSetting {
    fn default() -> Self {
        DetectSetting::Flag(false)
    }
}

/// Callout text: a literal (or preset name), per-OS, or per-locale-and-OS.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Text(String),
    PerOs(BTreeMap<String, String>),
    PerLocale(BTreeMap<String, BTreeMap<String, String>>),
}

impl Default for Message {
    fn default() -> Self {
        Message::Text(String::new())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Storage key for the session record.
    pub app_id: String,
    /// Base font size in pixels, rescaled by the viewport factor.
    pub font_size: f64,
    pub debug: DebugSetting,
    /// Unset means "on when debugging".
    pub logging: Option<bool>,
    pub modal: bool,
    pub show_close: bool,
    pub mandatory: bool,
    pub autostart: bool,
    pub skip_first_visit: bool,
    /// Seconds after page load before the callout slides in.
    pub start_delay: f64,
    /// Seconds on screen before auto-dismiss (0 = stay).
    pub lifespan: f64,
    /// Minutes between two displays (0 = every time).
    pub display_pace: u64,
    /// Lifetime display cap (0 = no limit).
    pub max_display_count: u32,
    pub icon: bool,
    pub message: Message,
    /// Regex sources; the current URL must match one of them.
    pub valid_location: Vec<String>,
    pub private_mode_override: bool,
    pub detect_homescreen: DetectSetting,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            debug: DebugSetting::default(),
            logging: None,
            modal: false,
            show_close: true,
            mandatory: false,
            autostart: false,
            skip_first_visit: false,
            start_delay: 1.0,
            lifespan: 15.0,
            display_pace: 1440,
            max_display_count: 0,
            icon: true,
            message: Message::default(),
            valid_location: Vec::new(),
            private_mode_override: false,
            detect_homescreen: DetectSetting::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPattern { pattern: String, source: regex::Error },
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPattern { pattern, source } => {
                write!(f, "invalid valid_location pattern '{pattern}': {source}")
            }
            ConfigError::OutOfRange { field, value } => {
                write!(f, "{field} out of range: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPattern { source, .. } => Some(source),
            ConfigError::OutOfRange { .. } => None,
        }
    }
}

/// Fully explicit configuration. Immutable after construction.
#[derive(Clone, Debug)]
pub struct Config {
    pub app_id: String,
    pub font_size: f64,
    pub debug: bool,
    pub forced_os: Option<Os>,
    pub logging: bool,
    pub modal: bool,
    pub show_close: bool,
    pub mandatory: bool,
    pub autostart: bool,
    pub skip_first_visit: bool,
    pub start_delay: f64,
    pub lifespan: f64,
    pub display_pace_minutes: u64,
    pub max_display_count: u32,
    pub icon: bool,
    pub message: Message,
    pub valid_location: Vec<Regex>,
    pub private_mode_override: bool,
    pub detect_homescreen: Option<TokenMode>,
}

impl Options {
    /// Resolve derived fields and compile location patterns.
    ///
    /// Mandatory mode only sticks where the host can actually report
    /// standalone launches (or under debug); otherwise the user could
    /// never get past it.
    pub fn normalize(self, env: &Environment) -> Result<Config, ConfigError> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "font_size",
                value: self.font_size,
            });
        }
        if !self.start_delay.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "start_delay",
                value: self.start_delay,
            });
        }
        if !(self.lifespan.is_finite() && self.lifespan >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "lifespan",
                value: self.lifespan,
            });
        }

        let valid_location = self
            .valid_location
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let debug = self.debug.enabled();
        let logging = self.logging.unwrap_or(debug);
        let mandatory = self.mandatory && (env.standalone_supported || debug);
        let modal = self.modal || mandatory;
        let start_delay = if mandatory {
            MANDATORY_START_DELAY
        } else {
            self.start_delay
        };

        Ok(Config {
            app_id: self.app_id,
            font_size: self.font_size,
            debug,
            forced_os: self.debug.forced_os(),
            logging,
            modal,
            show_close: self.show_close,
            mandatory,
            autostart: self.autostart,
            skip_first_visit: self.skip_first_visit,
            start_delay,
            lifespan: self.lifespan,
            display_pace_minutes: self.display_pace,
            max_display_count: self.max_display_count,
            icon: self.icon,
            message: self.message,
            valid_location,
            private_mode_override: self.private_mode_override,
            detect_homescreen: self.detect_homescreen.mode(),
        })
    }
}

impl Config {
    /// Whether `href` passes the location allow-list (empty list allows all).
    pub fn is_valid_location(&self, href: &str) -> bool {
        self.valid_location.is_empty() || self.valid_location.iter().any(|re| re.is_match(href))
    }

    /// Delay of the show timer in milliseconds, never negative.
    pub fn show_delay_ms(&self) -> u64 {
        let ms = self.start_delay * 1000.0 + crate::constants::SETTLE_BUFFER_MS as f64;
        ms.max(0.0).round() as u64
    }
}
