//! Environment sniffing: classifies the visiting browser once per instance.
//!
//! The rules below encode known user-agent quirks and must stay literal.
//! Android qualifies only for Chrome builds that do not also report a
//! `Version/` token, which in-app and legacy stock browsers do.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::MIN_IOS_VERSION;

static IDEVICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)iphone|ipod|ipad").unwrap());
static CHROME_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Chrome/[.0-9]*").unwrap());
static OS_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(OS|Android) (\d+[_.]\d+)").unwrap());

/// Raw navigator facts supplied by the host page.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Navigator {
    pub user_agent: String,
    /// BCP-47 tag as reported by the browser, e.g. `en-US`.
    pub language: Option<String>,
    pub device_pixel_ratio: f64,
    /// `None` when the host has no `standalone` property at all.
    pub standalone: Option<bool>,
    /// Whether the host can register event listeners. Without it the
    /// instance stays inert.
    pub supports_event_listeners: bool,
}

impl Navigator {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            language: None,
            device_pixel_ratio: 1.0,
            standalone: None,
            supports_event_listeners: true,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_standalone(mut self, standalone: Option<bool>) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Ios,
    Android,
    Windows,
    Unsupported,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Ios => "ios",
            Os::Android => "android",
            Os::Windows => "windows",
            Os::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Os::Ios),
            "android" => Ok(Os::Android),
            "windows" => Ok(Os::Windows),
            "unsupported" => Ok(Os::Unsupported),
            other => Err(format!("unknown OS '{other}'")),
        }
    }
}

/// Immutable snapshot of the runtime, computed once by [`sniff`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Environment {
    pub os: Os,
    pub os_version: f64,
    pub is_tablet: bool,
    pub is_standalone: bool,
    pub is_retina: bool,
    pub is_compatible: bool,
    /// Lowercase with the first hyphen replaced, e.g. `en_us`.
    pub language: String,
    pub is_idevice: bool,
    pub is_mobile_safari: bool,
    pub is_mobile_chrome: bool,
    pub is_mobile_ie: bool,
    /// The host exposes a `standalone` flag, whatever its value.
    pub standalone_supported: bool,
    pub supports_event_listeners: bool,
}

impl Environment {
    /// Integer major version for CSS class names. `None` when undetected.
    pub fn major_version(&self) -> Option<u32> {
        let major = self.os_version.trunc();
        (major >= 1.0).then_some(major as u32)
    }

    /// Debug mode: force compatibility and a plausible OS/version pair.
    pub fn with_debug_override(mut self, forced: Option<Os>) -> Self {
        self.is_compatible = true;
        self.os = match forced {
            Some(os) => os,
            None if self.os == Os::Unsupported => Os::Android,
            None => self.os,
        };
        self.os_version = if self.os == Os::Ios { 8.0 } else { 4.0 };
        self
    }
}

/// Classify the navigator. Pure: the same input always yields the same snapshot.
pub fn sniff(nav: &Navigator) -> Environment {
    let ua = nav.user_agent.as_str();

    let is_idevice = IDEVICE.is_match(ua);
    let is_mobile_chrome =
        ua.contains("Android") && CHROME_VERSION.is_match(ua) && !ua.contains("Version");
    let is_mobile_ie = ua.contains("Windows Phone");
    let is_mobile_safari = is_idevice && ua.contains("Safari") && !ua.contains("CriOS");

    let os = if is_idevice {
        Os::Ios
    } else if is_mobile_chrome {
        Os::Android
    } else if is_mobile_ie {
        Os::Windows
    } else {
        Os::Unsupported
    };

    let os_version = parse_os_version(ua);

    let is_tablet =
        (is_mobile_safari && ua.contains("iPad")) || (is_mobile_chrome && !ua.contains("Mobile"));

    Environment {
        os,
        os_version,
        is_tablet,
        is_standalone: nav.standalone == Some(true),
        is_retina: nav.device_pixel_ratio > 1.0,
        is_compatible: is_mobile_safari && os_version >= MIN_IOS_VERSION,
        language: normalize_language(nav.language.as_deref()),
        is_idevice,
        is_mobile_safari,
        is_mobile_chrome,
        is_mobile_ie,
        standalone_supported: nav.standalone.is_some(),
        supports_event_listeners: nav.supports_event_listeners,
    }
}

/// `OS 9_3` / `Android 4.4` → 9.3 / 4.4; 0 when absent.
fn parse_os_version(ua: &str) -> f64 {
    OS_VERSION
        .captures(ua)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().replacen('_', ".", 1).parse().ok())
        .unwrap_or(0.0)
}

fn normalize_language(tag: Option<&str>) -> String {
    tag.map(|t| t.to_lowercase().replacen('-', "_", 1))
        .unwrap_or_default()
}
