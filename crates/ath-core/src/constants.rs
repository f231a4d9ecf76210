/// Default storage key for the persisted session record.
pub const DEFAULT_APP_ID: &str = "com.camronflanders.addtohomescreen";

/// Storage key written by pre-1.0 releases. Its presence means "opted out".
pub const LEGACY_SESSION_KEY: &str = "addToHome";

/// URL marker used by every homescreen-detection mode.
pub const TOKEN: &str = "ath";

/// Base font size in CSS pixels, rescaled by the viewport scale factor.
pub const DEFAULT_FONT_SIZE: f64 = 15.0;

/// Start delay forced by mandatory mode, in seconds.
/// Combined with [`SETTLE_BUFFER_MS`] the show timer fires immediately.
pub const MANDATORY_START_DELAY: f64 = -0.5;

/// Autostart retry interval while the document is still loading.
pub const AUTOSTART_POLL_MS: u64 = 50;

/// Added to every start delay before the callout slides in.
pub const SETTLE_BUFFER_MS: u64 = 500;

/// Click-to-dismiss is not armed until this long after the callout appears.
pub const CLICK_GRACE_MS: u64 = 1000;

/// Debounce window for resize, scroll and orientation changes.
pub const RESIZE_DEBOUNCE_MS: u64 = 100;

/// Duration of the slide-in transition.
pub const ENTRANCE_TRANSITION: &str = "1.2s";

/// Duration of the fade-out transition.
pub const FADE_TRANSITION: &str = "0.3s";

/// Milliseconds per minute, for the display pace.
pub const MINUTE_MS: i64 = 60_000;

/// Minimum iOS version offered the callout.
pub const MIN_IOS_VERSION: f64 = 6.0;
