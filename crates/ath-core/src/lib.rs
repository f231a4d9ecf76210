//! Add-to-homescreen callout engine.
//!
//! Sniffs the browser, decides from a persisted cross-visit session whether
//! the "add this page to your homescreen" callout may appear, and drives the
//! callout through its show/hide lifecycle.
//!
//! Zero direct I/O: the page is reached through [`Host`], persistence
//! through [`Storage`]. [`SimHost`] and [`MemoryStorage`] run the whole
//! thing in-process.

pub mod constants;
pub mod environment;
pub mod host;
pub mod icon;
pub mod lifecycle;
pub mod markup;
pub mod message;
pub mod options;
pub mod policy;
pub mod session;
pub mod sim;
pub mod storage;
pub mod time;
pub mod url_token;

pub use constants::{DEFAULT_APP_ID, LEGACY_SESSION_KEY, TOKEN};
pub use environment::{Environment, Navigator, Os, sniff};
pub use host::{ElementStyle, EventKind, Host, Layout, Listener, Orientation, Target, Timer, Viewport};
pub use icon::{IconLink, best_icon};
pub use lifecycle::{
    AddToHomescreen, Dispatch, Hooks, InertReason, NoHooks, Phase, ShowOutcome, Status,
    compute_layout,
};
pub use markup::Markup;
pub use message::{MessageTable, render_html};
pub use options::{Config, ConfigError, DebugSetting, DetectSetting, Message, Options};
pub use policy::{Decision, Effect, PolicyInput, Reason, Verdict, decide};
pub use session::{Persisted, Session, SessionStore};
pub use sim::{JournalEntry, SimHost};
pub use storage::{DisabledStorage, MemoryStorage, Storage, StorageError};
pub use url_token::{TokenMode, add_token, has_token, remove_token};
