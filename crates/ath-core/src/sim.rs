//! A deterministic in-process [`Host`] with a virtual clock.
//!
//! Timers and browser-originated events (icon load, transition end) sit in
//! one time-ordered queue. The driver methods on
//! [`AddToHomescreen<SimHost, _, _>`](crate::AddToHomescreen) pop that queue
//! and feed each task back into the instance, so a whole visit can be
//! replayed without a browser.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::constants::FADE_TRANSITION;
use crate::environment::{Navigator, Os};
use crate::host::{ElementStyle, EventKind, Host, Layout, Listener, Target, Timer, Viewport};
use crate::icon::{IconLink, best_icon};
use crate::lifecycle::{AddToHomescreen, Dispatch, Hooks};
use crate::markup::Markup;
use crate::storage::Storage;

/// Upper bound on tasks processed by one `run_until_idle` call.
const MAX_STEPS: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    Timer(Timer),
    Event(Target, EventKind),
}

/// One line of the host's activity log.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JournalEntry {
    pub at_millis: i64,
    pub what: String,
}

#[derive(Debug, Clone)]
pub struct SimHost {
    navigator: Navigator,
    now: i64,
    ready_at: i64,
    href: String,
    history: Vec<String>,
    viewport: Viewport,
    icon_links: Vec<IconLink>,
    icon_latency_ms: u64,
    icon_fails: bool,
    queue: BTreeMap<(i64, u64), Task>,
    seq: u64,
    listeners: BTreeSet<Listener>,
    mounted: Option<Markup>,
    mount_count: usize,
    layout: Option<Layout>,
    style: Option<ElementStyle>,
    journal: Vec<JournalEntry>,
}

impl SimHost {
    /// A fully loaded page at `href`, clock at `now_millis`.
    pub fn new(navigator: Navigator, href: impl Into<String>, now_millis: i64) -> Self {
        Self {
            navigator,
            now: now_millis,
            ready_at: now_millis,
            href: href.into(),
            history: Vec::new(),
            viewport: Viewport::default(),
            icon_links: Vec::new(),
            icon_latency_ms: 0,
            icon_fails: false,
            queue: BTreeMap::new(),
            seq: 0,
            listeners: BTreeSet::new(),
            mounted: None,
            mount_count: 0,
            layout: None,
            style: None,
            journal: Vec::new(),
        }
    }

    /// The document finishes loading `ms` after the current clock.
    pub fn loading_for(mut self, ms: u64) -> Self {
        self.ready_at = self.now + ms as i64;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Declare one `apple-touch-icon` that loads (or fails) after `latency_ms`.
    pub fn with_icon(self, src: &str, latency_ms: u64, fails: bool) -> Self {
        self.with_icon_links(vec![IconLink::new("apple-touch-icon", None, src)], latency_ms, fails)
    }

    /// Declare the document's icon `<link>`s.
    pub fn with_icon_links(mut self, links: Vec<IconLink>, latency_ms: u64, fails: bool) -> Self {
        self.icon_links = links;
        self.icon_latency_ms = latency_ms;
        self.icon_fails = fails;
        self
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn current_href(&self) -> &str {
        &self.href
    }

    /// Every URL passed to `replace_url`, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn mounted(&self) -> Option<&Markup> {
        self.mounted.as_ref()
    }

    pub fn mount_count(&self) -> usize {
        self.mount_count
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    pub fn style(&self) -> Option<&ElementStyle> {
        self.style.as_ref()
    }

    pub fn listeners(&self) -> &BTreeSet<Listener> {
        &self.listeners
    }

    pub fn is_listening(&self, target: Target, kind: EventKind) -> bool {
        self.listeners
            .iter()
            .any(|l| l.target == target && l.kind == kind)
    }

    pub fn pending_timers(&self) -> Vec<Timer> {
        self.queue
            .values()
            .filter_map(|task| match task {
                Task::Timer(t) => Some(*t),
                Task::Event(..) => None,
            })
            .collect()
    }

    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    fn log(&mut self, what: impl Into<String>) {
        self.journal.push(JournalEntry {
            at_millis: self.now,
            what: what.into(),
        });
    }

    fn schedule(&mut self, delay_ms: u64, task: Task) {
        let due = self.now.saturating_add(delay_ms as i64);
        self.seq += 1;
        self.queue.insert((due, self.seq), task);
    }

    fn pop_due(&mut self, deadline: i64) -> Option<Task> {
        let (&key, _) = self.queue.iter().next()?;
        if key.0 > deadline {
            return None;
        }
        let task = self.queue.remove(&key)?;
        self.now = self.now.max(key.0);
        Some(task)
    }
}

impl Host for SimHost {
    fn navigator(&self) -> Navigator {
        self.navigator.clone()
    }

    fn now_millis(&self) -> i64 {
        self.now
    }

    fn document_ready(&self) -> bool {
        self.now >= self.ready_at
    }

    fn href(&self) -> String {
        self.href.clone()
    }

    fn replace_url(&mut self, href: &str) {
        self.log(format!("replace url {href}"));
        self.href = href.to_string();
        self.history.push(self.href.clone());
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn application_icon(&self, os: Os) -> Option<String> {
        best_icon(&self.icon_links, os).map(|link| link.href.clone())
    }

    fn set_timer(&mut self, timer: Timer, delay_ms: u64) {
        self.queue.retain(|_, task| *task != Task::Timer(timer));
        self.schedule(delay_ms, Task::Timer(timer));
    }

    fn clear_timer(&mut self, timer: Timer) {
        self.queue.retain(|_, task| *task != Task::Timer(timer));
    }

    fn add_listener(&mut self, listener: Listener) {
        self.listeners.insert(listener);
        if listener.target == Target::Icon && listener.kind == EventKind::Load {
            let outcome = if self.icon_fails {
                EventKind::Error
            } else {
                EventKind::Load
            };
            self.schedule(self.icon_latency_ms, Task::Event(Target::Icon, outcome));
        }
    }

    fn remove_listener(&mut self, listener: Listener) {
        self.listeners.remove(&listener);
    }

    fn mount(&mut self, markup: &Markup) {
        self.log(format!("mount {}", markup.container_class));
        self.mounted = Some(markup.clone());
        self.mount_count += 1;
    }

    fn unmount(&mut self) {
        self.log("unmount");
        self.mounted = None;
        self.layout = None;
        self.style = None;
    }

    fn set_layout(&mut self, layout: &Layout) {
        self.layout = Some(*layout);
    }

    fn set_style(&mut self, style: &ElementStyle) {
        self.log(format!(
            "style {} translateY({}px) opacity {}",
            style.transition_duration, style.translate_y, style.opacity
        ));
        self.style = Some(*style);
        if style.transition_duration == FADE_TRANSITION {
            // Engines that emit both the prefixed and unprefixed name.
            let ms = transition_millis(style.transition_duration);
            self.schedule(ms, Task::Event(Target::Element, EventKind::WebkitTransitionEnd));
            self.schedule(ms, Task::Event(Target::Element, EventKind::TransitionEnd));
        }
    }
}

/// `"0.3s"` → 300.
fn transition_millis(duration: &str) -> u64 {
    duration
        .strip_suffix('s')
        .and_then(|secs| secs.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0).round() as u64)
        .unwrap_or(0)
}

// --- Driver ---

impl<S: Storage, K: Hooks> AddToHomescreen<SimHost, S, K> {
    /// Move the clock forward `ms`, running every task that falls due.
    pub fn advance(&mut self, ms: u64) -> usize {
        let deadline = self.host().now.saturating_add(ms as i64);
        let mut steps = 0;
        while let Some(task) = self.host_mut().pop_due(deadline) {
            self.run_task(task);
            steps += 1;
        }
        self.host_mut().now = deadline;
        steps
    }

    /// Run queued tasks until none remain. Returns the number processed.
    pub fn run_until_idle(&mut self) -> usize {
        let mut steps = 0;
        while steps < MAX_STEPS {
            let Some(task) = self.host_mut().pop_due(i64::MAX) else {
                break;
            };
            self.run_task(task);
            steps += 1;
        }
        steps
    }

    /// Deliver a DOM event now, as the browser would. Returns `None` when
    /// nothing is listening for it.
    pub fn trigger(&mut self, target: Target, kind: EventKind) -> Option<Dispatch> {
        if !self.host().is_listening(target, kind) {
            return None;
        }
        self.host_mut().log(format!("event {kind}"));
        Some(self.dispatch(kind))
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::Timer(timer) => {
                self.host_mut().log(format!("timer {timer:?}"));
                self.on_timer(timer);
            }
            Task::Event(target, kind) => {
                self.trigger(target, kind);
            }
        }
    }
}
