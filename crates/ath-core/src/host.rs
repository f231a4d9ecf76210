//! The seam between the engine and the page it runs in.
//!
//! A host owns the event loop: it fires [`Timer`]s back into
//! [`crate::AddToHomescreen::on_timer`] and forwards DOM events registered
//! through [`Host::add_listener`] into [`crate::AddToHomescreen::dispatch`].
//! Everything runs on one thread; no callback re-enters while another is
//! in progress.

use std::fmt;

use serde::Serialize;

use crate::environment::{Navigator, Os};
use crate::markup::Markup;

/// Named one-shot timers. At most one of each kind is armed at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timer {
    /// Autostart poll while the document is still loading.
    AutostartRetry,
    /// Start delay elapsed: slide the callout in.
    Show,
    /// Grace period before click-to-dismiss is armed.
    ClickGrace,
    /// Lifespan elapsed.
    AutoRemove,
    /// Resize/scroll/orientation debounce.
    Resize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Window,
    Document,
    /// The callout container.
    Element,
    /// The application icon image.
    Icon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    Load,
    Error,
    OrientationChange,
    Resize,
    Scroll,
    Click,
    TouchMove,
    TransitionEnd,
    WebkitTransitionEnd,
    MsTransitionEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Load,
        EventKind::Error,
        EventKind::OrientationChange,
        EventKind::Resize,
        EventKind::Scroll,
        EventKind::Click,
        EventKind::TouchMove,
        EventKind::TransitionEnd,
        EventKind::WebkitTransitionEnd,
        EventKind::MsTransitionEnd,
    ];

    /// DOM event type name.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Load => "load",
            EventKind::Error => "error",
            EventKind::OrientationChange => "orientationchange",
            EventKind::Resize => "resize",
            EventKind::Scroll => "scroll",
            EventKind::Click => "click",
            EventKind::TouchMove => "touchmove",
            EventKind::TransitionEnd => "transitionend",
            EventKind::WebkitTransitionEnd => "webkitTransitionEnd",
            EventKind::MsTransitionEnd => "MSTransitionEnd",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Listener {
    pub target: Target,
    pub kind: EventKind,
    pub capture: bool,
}

impl Listener {
    pub const fn new(target: Target, kind: EventKind, capture: bool) -> Self {
        Self {
            target,
            kind,
            capture,
        }
    }
}

/// Window and screen metrics, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    pub inner_width: f64,
    pub inner_height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub client_width: f64,
    pub client_height: f64,
    pub screen_width: f64,
    pub screen_height: f64,
}

impl Default for Viewport {
    /// An iPhone 6 in portrait at device-width scale.
    fn default() -> Self {
        Self {
            inner_width: 375.0,
            inner_height: 667.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
            client_width: 375.0,
            client_height: 667.0,
            screen_width: 375.0,
            screen_height: 667.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Geometry of the viewport overlay plus the rescaled font size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Layout {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub orientation: Orientation,
    pub scale: f64,
    pub font_size: f64,
}

/// Inline transition state of the callout element.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ElementStyle {
    pub transition_duration: &'static str,
    /// Vertical translation in pixels; negative is above the viewport.
    pub translate_y: f64,
    pub opacity: f64,
}

pub trait Host {
    /// What the page knows about the browser it runs in.
    fn navigator(&self) -> Navigator;
    fn now_millis(&self) -> i64;
    /// The document has finished loading.
    fn document_ready(&self) -> bool;
    fn href(&self) -> String;
    /// Replace the current history entry. Never navigates.
    fn replace_url(&mut self, href: &str);
    fn viewport(&self) -> Viewport;
    /// Best touch icon declared by the page for this OS.
    fn application_icon(&self, os: Os) -> Option<String>;

    fn set_timer(&mut self, timer: Timer, delay_ms: u64);
    fn clear_timer(&mut self, timer: Timer);

    fn add_listener(&mut self, listener: Listener);
    fn remove_listener(&mut self, listener: Listener);

    /// Attach the callout to the document, positioned off-screen.
    fn mount(&mut self, markup: &Markup);
    fn unmount(&mut self);
    fn set_layout(&mut self, layout: &Layout);
    fn set_style(&mut self, style: &ElementStyle);
}
