//! The add-to-homescreen instance: construction, policy effects and the
//! callout's on-screen lifecycle.
//!
//! ```text
//! Idle ─allow─▶ Armed ─show()─▶ Pending ─icon settled─▶ AnimatingIn
//!                 ▲                                        │ show timer
//!                 │                                        ▼
//!              Removed ◀─transition end─ AnimatingOut ◀─remove()─ Visible
//! ```
//!
//! Suppressed instances stay in `Idle` for good. After `Removed` a new
//! `show()` may run again, subject to pacing and the display cap.

use std::collections::BTreeSet;

use crate::constants::{
    AUTOSTART_POLL_MS, CLICK_GRACE_MS, ENTRANCE_TRANSITION, FADE_TRANSITION, LEGACY_SESSION_KEY,
    MINUTE_MS, RESIZE_DEBOUNCE_MS,
};
use crate::environment::{Environment, Os, sniff};
use crate::host::{
    ElementStyle, EventKind, Host, Layout, Listener, Orientation, Target, Timer,
};
use crate::markup::Markup;
use crate::message::{self, MessageTable};
use crate::options::{Config, ConfigError, Options};
use crate::policy::{self, Effect, PolicyInput, Reason, Verdict, diagnostic};
use crate::session::{Session, SessionStore};
use crate::storage::Storage;
use crate::url_token;

/// Page-supplied callbacks. Every method defaults to a no-op.
pub trait Hooks {
    /// The instance passed the display policy.
    fn on_init(&mut self, _env: &Environment) {}
    /// The callout slid into view.
    fn on_show(&mut self, _session: &Session) {}
    /// The callout left the document.
    fn on_remove(&mut self, _session: &Session) {}
    /// First launch believed to come from the homescreen.
    fn on_add(&mut self) {}
    /// Session persistence turned out to be unavailable.
    fn on_private(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl Hooks for NoHooks {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Armed,
    Pending,
    AnimatingIn,
    Visible,
    AnimatingOut,
    Removed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InertReason {
    /// The host cannot register event listeners.
    NoEventListeners,
    Suppressed(Reason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    Inert(InertReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    /// Autostart is waiting for the document to finish loading.
    Deferred,
    AlreadyShown,
    NotReady,
    TooSoon,
    LimitReached,
}

/// What the host should do with the DOM event it just delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub handled: bool,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Handler {
    IconSettled,
    Resize,
    Remove,
    PreventDefault,
    Detach,
}

/// Event kind → handler.
const EVENT_TABLE: [(EventKind, Handler); 10] = [
    (EventKind::Load, Handler::IconSettled),
    (EventKind::Error, Handler::IconSettled),
    (EventKind::OrientationChange, Handler::Resize),
    (EventKind::Resize, Handler::Resize),
    (EventKind::Scroll, Handler::Resize),
    (EventKind::Click, Handler::Remove),
    (EventKind::TouchMove, Handler::PreventDefault),
    (EventKind::TransitionEnd, Handler::Detach),
    (EventKind::WebkitTransitionEnd, Handler::Detach),
    (EventKind::MsTransitionEnd, Handler::Detach),
];

const ICON_LISTENERS: [Listener; 2] = [
    Listener::new(Target::Icon, EventKind::Load, false),
    Listener::new(Target::Icon, EventKind::Error, false),
];
const VIEWPORT_LISTENERS: [Listener; 3] = [
    Listener::new(Target::Window, EventKind::Resize, false),
    Listener::new(Target::Window, EventKind::Scroll, false),
    Listener::new(Target::Window, EventKind::OrientationChange, false),
];
const MODAL_LISTENER: Listener = Listener::new(Target::Document, EventKind::TouchMove, true);
const DISMISS_LISTENER: Listener = Listener::new(Target::Element, EventKind::Click, true);
const TRANSITION_LISTENERS: [Listener; 3] = [
    Listener::new(Target::Element, EventKind::TransitionEnd, false),
    Listener::new(Target::Element, EventKind::WebkitTransitionEnd, false),
    Listener::new(Target::Element, EventKind::MsTransitionEnd, false),
];

pub struct AddToHomescreen<H, S, K = NoHooks> {
    host: H,
    store: SessionStore<S>,
    hooks: K,
    env: Environment,
    config: Config,
    messages: MessageTable,
    session: Session,
    status: Status,
    phase: Phase,
    application_icon: Option<Option<String>>,
    retry_force: bool,
    timers: BTreeSet<Timer>,
    listeners: BTreeSet<Listener>,
}

impl<H: Host, S: Storage, K: Hooks> AddToHomescreen<H, S, K> {
    /// Build with the built-in message presets.
    pub fn new(options: Options, host: H, storage: S, hooks: K) -> Result<Self, ConfigError> {
        Self::with_messages(options, MessageTable::builtin(), host, storage, hooks)
    }

    /// Sniff, normalize, load, decide and (with autostart) show.
    ///
    /// Only an invalid configuration is an error. Suppression leaves an
    /// inert instance; inspect [`status`](Self::status).
    pub fn with_messages(
        options: Options,
        messages: MessageTable,
        host: H,
        storage: S,
        hooks: K,
    ) -> Result<Self, ConfigError> {
        let raw_env = sniff(&host.navigator());
        let config = options.normalize(&raw_env)?;
        let env = if config.debug {
            raw_env.with_debug_override(config.forced_os)
        } else {
            raw_env
        };
        let store = SessionStore::new(storage, config.app_id.clone());

        let mut ath = Self {
            host,
            store,
            hooks,
            env,
            config,
            messages,
            session: Session::default(),
            status: Status::Inert(InertReason::NoEventListeners),
            phase: Phase::Idle,
            application_icon: None,
            retry_force: false,
            timers: BTreeSet::new(),
            listeners: BTreeSet::new(),
        };

        if !ath.env.supports_event_listeners {
            tracing::error!("add to homescreen needs event listener support; staying inert");
            return Ok(ath);
        }

        ath.initialize();
        Ok(ath)
    }

    fn initialize(&mut self) {
        let loaded = self.store.load();
        let compatible = self.env.is_compatible;

        // Incompatible devices never touch storage beyond the read.
        let mut legacy_record = false;
        if compatible {
            let probe = self.store.probe(&loaded.clone().unwrap_or_default());
            if probe.newly_private() {
                self.hooks.on_private();
            }
            legacy_record = self.store.contains(LEGACY_SESSION_KEY);
        }

        let href = self.host.href();
        let decision = policy::decide(PolicyInput {
            env: &self.env,
            config: &self.config,
            session: loaded,
            legacy_record,
            has_persistence: self.store.has_persistence(),
            href: &href,
        });

        self.session = decision.session;
        for effect in decision.effects {
            self.apply(effect);
        }

        match decision.verdict {
            Verdict::Suppress(reason) => {
                diagnostic(
                    &self.config,
                    format_args!("not displaying callout because {reason}"),
                );
                self.status = Status::Inert(InertReason::Suppressed(reason));
            }
            Verdict::Allow => {
                self.status = Status::Ready;
                self.phase = Phase::Armed;
                self.hooks.on_init(&self.env);
                if self.config.autostart {
                    diagnostic(&self.config, format_args!("autostart displaying callout"));
                    self.show(false);
                }
            }
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::RemoveToken => {
                let href = self.host.href();
                let stripped = url_token::remove_token(&href);
                if stripped != href {
                    self.host.replace_url(&stripped);
                }
            }
            Effect::AddToken(mode) => {
                let tagged = url_token::add_token(&self.host.href(), mode);
                self.host.replace_url(&tagged);
            }
            Effect::Persist => self.persist(),
            Effect::FireOnAdd => {
                if self.store.has_persistence() {
                    self.hooks.on_add();
                }
            }
        }
    }

    fn persist(&mut self) {
        if self.store.save(&self.session).newly_private() {
            self.hooks.on_private();
        }
    }

    // --- Accessors ---

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The callout is in the document (pending, animating or visible).
    pub fn is_shown(&self) -> bool {
        matches!(
            self.phase,
            Phase::Pending | Phase::AnimatingIn | Phase::Visible | Phase::AnimatingOut
        )
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_persistence(&self) -> bool {
        self.store.has_persistence()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn hooks(&self) -> &K {
        &self.hooks
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    /// Timers the instance currently holds.
    pub fn armed_timers(&self) -> impl Iterator<Item = Timer> + '_ {
        self.timers.iter().copied()
    }

    /// Listeners the instance currently holds.
    pub fn attached_listeners(&self) -> impl Iterator<Item = Listener> + '_ {
        self.listeners.iter().copied()
    }

    // --- Session operations ---

    pub fn opt_out(&mut self) {
        self.session.opt_out();
        self.persist();
    }

    pub fn opt_in(&mut self) {
        self.session.opt_in();
        self.persist();
    }

    pub fn clear_session(&mut self) {
        self.session.clear();
        self.persist();
    }

    pub fn clear_display_count(&mut self) {
        self.session.clear_display_count();
        self.persist();
    }

    /// Delete whatever is stored under `key`. Storage errors are swallowed.
    pub fn remove_session(&mut self, key: &str) -> bool {
        self.store.remove(key)
    }

    // --- Display ---

    /// Put the callout on screen. `force` skips readiness, pacing and the
    /// display cap.
    pub fn show(&mut self, force: bool) -> ShowOutcome {
        if self.status == Status::Inert(InertReason::NoEventListeners) {
            return ShowOutcome::NotReady;
        }

        if self.config.autostart && !self.host.document_ready() {
            // Not logged: this would fire every poll.
            self.retry_force = force;
            self.rearm(Timer::AutostartRetry, AUTOSTART_POLL_MS);
            return ShowOutcome::Deferred;
        }

        if self.is_shown() {
            diagnostic(
                &self.config,
                format_args!("not displaying callout because already shown on screen"),
            );
            return ShowOutcome::AlreadyShown;
        }

        let now = self.host.now_millis();

        if !force {
            if !self.is_ready() {
                diagnostic(&self.config, format_args!("not displaying callout because not ready"));
                return ShowOutcome::NotReady;
            }

            let pace = i64::try_from(self.config.display_pace_minutes)
                .unwrap_or(i64::MAX)
                .saturating_mul(MINUTE_MS);
            if now.saturating_sub(self.session.last_display_time) < pace {
                diagnostic(
                    &self.config,
                    format_args!("not displaying callout because displayed recently"),
                );
                return ShowOutcome::TooSoon;
            }

            let cap = self.config.max_display_count;
            if cap > 0 && self.session.display_count >= cap {
                diagnostic(
                    &self.config,
                    format_args!("not displaying callout because displayed too many times already"),
                );
                return ShowOutcome::LimitReached;
            }
        }

        self.phase = Phase::Pending;
        self.session.record_display(now);
        self.persist();

        let icon = if self.config.icon {
            self.resolve_icon()
        } else {
            None
        };
        let template = message::resolve(
            &self.config.message,
            &self.messages,
            &self.env.language,
            self.env.os,
        );
        let markup = Markup::build(&self.env, &self.config, icon, message::render_html(&template));

        self.host.mount(&markup);
        let offscreen = -self.host.viewport().inner_height;
        self.host.set_style(&ElementStyle {
            transition_duration: "0s",
            translate_y: offscreen,
            opacity: 1.0,
        });

        if markup.icon_src.is_some() {
            diagnostic(
                &self.config,
                format_args!("not displaying callout because waiting for img to load"),
            );
            for listener in ICON_LISTENERS {
                self.attach(listener);
            }
        } else {
            self.delayed_show();
        }

        ShowOutcome::Shown
    }

    /// Start the fade-out. Returns false if nothing is on screen.
    pub fn remove(&mut self) -> bool {
        if !matches!(
            self.phase,
            Phase::Pending | Phase::AnimatingIn | Phase::Visible
        ) {
            return false;
        }

        for timer in [Timer::AutoRemove, Timer::Show, Timer::ClickGrace, Timer::Resize] {
            self.disarm(timer);
        }
        let interaction: Vec<Listener> = self.listeners.iter().copied().collect();
        for listener in interaction {
            self.detach(listener);
        }
        for listener in TRANSITION_LISTENERS {
            self.attach(listener);
        }

        let translate_y = if self.phase == Phase::Visible {
            0.0
        } else {
            -self.host.viewport().inner_height
        };
        self.host.set_style(&ElementStyle {
            transition_duration: FADE_TRANSITION,
            translate_y,
            opacity: 0.0,
        });
        self.phase = Phase::AnimatingOut;
        true
    }

    // --- Host re-entry points ---

    /// A timer armed through [`Host::set_timer`] elapsed. Stale timers are ignored.
    pub fn on_timer(&mut self, timer: Timer) {
        if !self.timers.remove(&timer) {
            return;
        }
        match timer {
            Timer::AutostartRetry => {
                let force = self.retry_force;
                self.show(force);
            }
            Timer::Show => self.reveal(),
            Timer::ClickGrace => {
                if self.phase == Phase::Visible {
                    self.attach(DISMISS_LISTENER);
                }
            }
            Timer::AutoRemove => {
                self.remove();
            }
            Timer::Resize => self.update_layout(),
        }
    }

    /// Route a DOM event through the dispatch table.
    pub fn dispatch(&mut self, kind: EventKind) -> Dispatch {
        let Some(handler) = EVENT_TABLE
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, h)| *h)
        else {
            return Dispatch::default();
        };

        let handled = match handler {
            Handler::IconSettled => self.icon_settled(),
            Handler::Resize => {
                if self.is_shown() {
                    self.rearm(Timer::Resize, RESIZE_DEBOUNCE_MS);
                    true
                } else {
                    false
                }
            }
            Handler::Remove => self.remove(),
            Handler::PreventDefault => {
                return Dispatch {
                    handled: true,
                    prevent_default: true,
                    stop_propagation: true,
                };
            }
            Handler::Detach => self.remove_elements(),
        };

        Dispatch {
            handled,
            ..Dispatch::default()
        }
    }

    // --- Internals ---

    fn resolve_icon(&mut self) -> Option<String> {
        if self.application_icon.is_none() {
            self.application_icon = Some(self.host.application_icon(self.env.os));
        }
        self.application_icon.clone().flatten()
    }

    fn icon_settled(&mut self) -> bool {
        if self.phase != Phase::Pending {
            return false;
        }
        for listener in ICON_LISTENERS {
            self.detach(listener);
        }
        self.delayed_show();
        true
    }

    fn delayed_show(&mut self) {
        self.phase = Phase::AnimatingIn;
        self.arm(Timer::Show, self.config.show_delay_ms());
    }

    fn reveal(&mut self) {
        if self.phase != Phase::AnimatingIn {
            return;
        }
        self.phase = Phase::Visible;
        self.update_layout();

        for listener in VIEWPORT_LISTENERS {
            self.attach(listener);
        }
        if self.config.modal {
            self.attach(MODAL_LISTENER);
        }
        if !self.config.mandatory {
            self.arm(Timer::ClickGrace, CLICK_GRACE_MS);
        }

        self.host.set_style(&ElementStyle {
            transition_duration: ENTRANCE_TRANSITION,
            translate_y: 0.0,
            opacity: 1.0,
        });

        if self.config.lifespan > 0.0 {
            let ms = (self.config.lifespan * 1000.0).round() as u64;
            self.arm(Timer::AutoRemove, ms);
        }

        self.hooks.on_show(&self.session);
    }

    fn remove_elements(&mut self) -> bool {
        if self.phase != Phase::AnimatingOut {
            return false;
        }
        for listener in TRANSITION_LISTENERS {
            self.detach(listener);
        }
        self.host.unmount();
        self.phase = Phase::Removed;
        self.hooks.on_remove(&self.session);
        true
    }

    fn update_layout(&mut self) {
        if !self.is_shown() {
            return;
        }
        let layout = compute_layout(&self.host.viewport(), self.env.os, self.config.font_size);
        self.host.set_layout(&layout);
    }

    fn arm(&mut self, timer: Timer, delay_ms: u64) {
        self.timers.insert(timer);
        self.host.set_timer(timer, delay_ms);
    }

    fn disarm(&mut self, timer: Timer) {
        if self.timers.remove(&timer) {
            self.host.clear_timer(timer);
        }
    }

    /// Cancel-and-restart; never stacks.
    fn rearm(&mut self, timer: Timer, delay_ms: u64) {
        self.disarm(timer);
        self.arm(timer, delay_ms);
    }

    fn attach(&mut self, listener: Listener) {
        if self.listeners.insert(listener) {
            self.host.add_listener(listener);
        }
    }

    fn detach(&mut self, listener: Listener) {
        if self.listeners.remove(&listener) {
            self.host.remove_listener(listener);
        }
    }
}

/// Overlay geometry and font scale for the current viewport.
///
/// The scale compares the physical screen width with the layout viewport,
/// so pinch-zoomed or non-responsive pages still get a readable callout.
pub fn compute_layout(vp: &crate::host::Viewport, os: Os, font_size: f64) -> Layout {
    let orientation = if vp.client_width > vp.client_height {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    let screen_width = match (os, orientation) {
        (Os::Ios, Orientation::Landscape) => vp.screen_height,
        _ => vp.screen_width,
    };
    let mut scale = if vp.screen_width > vp.client_width {
        1.0
    } else {
        screen_width / vp.inner_width
    };
    if !(scale.is_finite() && scale > 0.0) {
        scale = 1.0;
    }

    Layout {
        left: vp.scroll_x,
        top: vp.scroll_y,
        width: vp.inner_width,
        height: vp.inner_height,
        orientation,
        scale,
        font_size: font_size / scale,
    }
}
