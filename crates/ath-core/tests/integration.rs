//! Whole-visit scenarios driven through the simulated host:
//! construct → decide → show → animate → dismiss, across repeat visits.

use ath_core::{
    AddToHomescreen, DEFAULT_APP_ID, DebugSetting, DetectSetting, DisabledStorage, Environment,
    EventKind, Hooks, IconLink, InertReason, LEGACY_SESSION_KEY, MemoryStorage, Navigator,
    Options, Orientation, Os, Phase, Reason, Session, ShowOutcome, SimHost, Status, Storage,
    Target, Timer, TokenMode, Viewport,
};

const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46 (KHTML, like Gecko) Version/9.0 Mobile/13B143 Safari/601.1";
const ANDROID: &str = "Mozilla/5.0 (Linux; Android 6.0.1; Nexus 5X Build/MMB29P) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/47.0.2526.83 Mobile Safari/537.36";
const DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";

const T0: i64 = 1_771_632_000_000;
const MINUTE: i64 = 60_000;

#[derive(Default)]
struct Recorder {
    calls: Vec<&'static str>,
}

impl Recorder {
    fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| **c == name).count()
    }
}

impl Hooks for Recorder {
    fn on_init(&mut self, _env: &Environment) {
        self.calls.push("init");
    }
    fn on_show(&mut self, _session: &Session) {
        self.calls.push("show");
    }
    fn on_remove(&mut self, _session: &Session) {
        self.calls.push("remove");
    }
    fn on_add(&mut self) {
        self.calls.push("add");
    }
    fn on_private(&mut self) {
        self.calls.push("private");
    }
}

type Ath<S = MemoryStorage> = AddToHomescreen<SimHost, S, Recorder>;

fn iphone_host(href: &str) -> SimHost {
    SimHost::new(Navigator::new(IPHONE).with_language("en-US"), href, T0)
}

fn visit(options: Options, host: SimHost, storage: MemoryStorage) -> Ath {
    AddToHomescreen::new(options, host, storage, Recorder::default()).unwrap()
}

fn seeded(session: &Session) -> MemoryStorage {
    let mut storage = MemoryStorage::new();
    storage
        .set_item(DEFAULT_APP_ID, &session.to_json().unwrap())
        .unwrap();
    storage
}

fn stored_session(storage: &MemoryStorage) -> Option<Session> {
    storage
        .get_item(DEFAULT_APP_ID)
        .unwrap()
        .map(|json| Session::from_json(&json).unwrap())
}

fn returning(last_display: i64, count: u32) -> Session {
    Session {
        last_display_time: last_display,
        returning_visitor: true,
        display_count: count,
        ..Session::default()
    }
}

/// Show and run the entrance until the callout is on screen.
fn bring_on_screen(ath: &mut Ath) {
    assert_eq!(ath.show(false), ShowOutcome::Shown);
    ath.advance(1_500);
    assert_eq!(ath.phase(), Phase::Visible);
}

// --- Full lifecycle ---

#[test]
fn test_first_visit_full_lifecycle() {
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), MemoryStorage::new());

    assert_eq!(ath.status(), Status::Ready);
    assert_eq!(ath.phase(), Phase::Armed);
    assert!(ath.session().returning_visitor);
    assert_eq!(ath.hooks().calls, vec!["init"]);

    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert_eq!(ath.session().display_count, 1);
    assert_eq!(ath.session().last_display_time, T0);
    // Persisted before anything animates.
    assert_eq!(stored_session(ath.storage()).unwrap().display_count, 1);

    let mounted = ath.host().mounted().unwrap();
    assert!(mounted.container_class.contains("ath-ios9"));
    assert!(mounted.message_html.contains("ath-action-icon"));
    assert_eq!(ath.phase(), Phase::AnimatingIn);
    assert_eq!(ath.host().style().unwrap().translate_y, -667.0);

    // start delay 1s + settle buffer
    ath.advance(1_499);
    assert_eq!(ath.phase(), Phase::AnimatingIn);
    ath.advance(1);
    assert_eq!(ath.phase(), Phase::Visible);
    assert_eq!(ath.host().style().unwrap().translate_y, 0.0);
    assert!(ath.host().is_listening(Target::Window, EventKind::Resize));
    assert!(ath.host().layout().is_some());

    // lifespan 15s, then 0.3s fade
    ath.run_until_idle();
    assert_eq!(ath.phase(), Phase::Removed);
    assert!(ath.host().mounted().is_none());
    assert!(ath.host().listeners().is_empty());
    assert!(ath.host().pending_timers().is_empty());
    assert_eq!(ath.hooks().calls, vec!["init", "show", "remove"]);
    assert_eq!(ath.host().now(), T0 + 1_500 + 15_000 + 300);
}

#[test]
fn test_second_show_while_on_screen_is_noop() {
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);
    assert_eq!(ath.show(true), ShowOutcome::AlreadyShown);
    assert_eq!(ath.session().display_count, 1);
    assert_eq!(ath.host().mount_count(), 1);
}

// --- Pacing and caps ---

#[test]
fn test_pacing_blocks_recent_display() {
    let options = Options {
        display_pace: 60,
        ..Options::default()
    };
    let storage = seeded(&returning(T0 - 30 * MINUTE, 1));
    let mut ath = visit(options, iphone_host("http://example.com/"), storage);

    assert_eq!(ath.show(false), ShowOutcome::TooSoon);
    assert!(ath.host().mounted().is_none());
    assert_eq!(ath.session().display_count, 1);
}

#[test]
fn test_pacing_allows_after_interval() {
    let options = Options {
        display_pace: 60,
        ..Options::default()
    };
    let storage = seeded(&returning(T0 - 61 * MINUTE, 1));
    let mut ath = visit(options, iphone_host("http://example.com/"), storage);

    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert_eq!(ath.session().display_count, 2);
    assert_eq!(ath.session().last_display_time, T0);
}

#[test]
fn test_corrupt_last_display_time_does_not_block_display() {
    let mut storage = MemoryStorage::new();
    storage
        .set_item(
            DEFAULT_APP_ID,
            r#"{"lastDisplayTime":-9223372036854775808,"returningVisitor":true}"#,
        )
        .unwrap();
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), storage);

    assert!(ath.is_ready());
    assert_eq!(ath.session().last_display_time, i64::MIN);
    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert_eq!(ath.session().last_display_time, T0);
}

#[test]
fn test_huge_pace_still_blocks() {
    let options = Options {
        display_pace: u64::MAX,
        ..Options::default()
    };
    let storage = seeded(&returning(T0 - 30 * MINUTE, 1));
    let mut ath = visit(options, iphone_host("http://example.com/"), storage);

    assert_eq!(ath.show(false), ShowOutcome::TooSoon);
    assert!(ath.host().mounted().is_none());
}

#[test]
fn test_display_cap_and_force() {
    let options = Options {
        display_pace: 0,
        max_display_count: 3,
        ..Options::default()
    };
    let storage = seeded(&returning(T0 - MINUTE, 3));
    let mut ath = visit(options, iphone_host("http://example.com/"), storage);

    assert_eq!(ath.show(false), ShowOutcome::LimitReached);
    assert_eq!(ath.show(true), ShowOutcome::Shown);
    assert_eq!(ath.session().display_count, 4);
}

#[test]
fn test_show_again_after_removal_respects_pace() {
    let options = Options {
        lifespan: 1.0,
        ..Options::default()
    };
    let mut ath = visit(options, iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);
    ath.run_until_idle();
    assert_eq!(ath.phase(), Phase::Removed);
    assert_eq!(ath.show(false), ShowOutcome::TooSoon);
    assert_eq!(ath.show(true), ShowOutcome::Shown);
    assert_eq!(ath.host().mount_count(), 2);
}

// --- Suppression ---

#[test]
fn test_skip_first_visit_then_show_on_return() {
    let options = Options {
        skip_first_visit: true,
        ..Options::default()
    };
    let mut ath = visit(options.clone(), iphone_host("http://example.com/"), MemoryStorage::new());
    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::FirstVisit)));
    assert_eq!(ath.show(false), ShowOutcome::NotReady);

    let storage = ath.storage().clone();
    assert!(stored_session(&storage).unwrap().returning_visitor);

    let ath = visit(options, iphone_host("http://example.com/"), storage);
    assert!(ath.is_ready());
}

#[test]
fn test_standalone_fires_on_add_once() {
    let standalone = || {
        SimHost::new(
            Navigator::new(IPHONE).with_standalone(Some(true)),
            "http://example.com/",
            T0,
        )
    };

    let first = visit(Options::default(), standalone(), MemoryStorage::new());
    assert_eq!(first.status(), Status::Inert(InertReason::Suppressed(Reason::Standalone)));
    assert_eq!(first.hooks().count("add"), 1);
    assert!(stored_session(first.storage()).unwrap().added);

    let second = visit(Options::default(), standalone(), first.storage().clone());
    assert_eq!(second.status(), Status::Inert(InertReason::Suppressed(Reason::AlreadyAdded)));
    assert_eq!(second.hooks().count("add"), 0);
}

#[test]
fn test_opted_out_user_stays_suppressed() {
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), MemoryStorage::new());
    ath.opt_out();
    let storage = ath.storage().clone();
    assert!(stored_session(&storage).unwrap().opted_out);

    let ath = visit(Options::default(), iphone_host("http://example.com/"), storage);
    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::OptedOut)));
}

#[test]
fn test_legacy_record_opts_out() {
    let mut storage = MemoryStorage::new();
    storage.set_item(LEGACY_SESSION_KEY, "{}").unwrap();

    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), storage);
    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::OptedOut)));
    assert!(stored_session(ath.storage()).unwrap().opted_out);

    assert!(ath.remove_session(LEGACY_SESSION_KEY));
    assert_eq!(ath.storage().get_item(LEGACY_SESSION_KEY).unwrap(), None);
}

#[test]
fn test_invalid_location() {
    let options = Options {
        valid_location: vec![r"/shop/".to_string()],
        ..Options::default()
    };
    let ath = visit(options.clone(), iphone_host("http://example.com/blog/"), MemoryStorage::new());
    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::InvalidLocation)));

    let ath = visit(options, iphone_host("http://example.com/shop/cart"), MemoryStorage::new());
    assert!(ath.is_ready());
}

#[test]
fn test_invalid_location_pattern_is_config_error() {
    let options = Options {
        valid_location: vec!["(".to_string()],
        ..Options::default()
    };
    let result = AddToHomescreen::new(
        options,
        iphone_host("http://example.com/"),
        MemoryStorage::new(),
        Recorder::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_incompatible_device_strips_token_and_never_writes() {
    let host = SimHost::new(Navigator::new(ANDROID), "http://example.com/#ath", T0);
    let ath = visit(Options::default(), host, MemoryStorage::new());

    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::Incompatible)));
    assert_eq!(ath.host().current_href(), "http://example.com/");
    assert!(ath.storage().is_empty());
    assert!(ath.hooks().calls.is_empty());
}

#[test]
fn test_debug_forces_compatibility() {
    let options = Options {
        debug: DebugSetting::Os(Os::Ios),
        ..Options::default()
    };
    let host = SimHost::new(Navigator::new(DESKTOP), "http://example.com/", T0);
    let mut ath = visit(options, host, MemoryStorage::new());

    assert!(ath.is_ready());
    assert_eq!(ath.environment().os, Os::Ios);
    assert!(ath.config().logging);
    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert!(ath.host().mounted().unwrap().container_class.contains("ath-ios8"));
}

#[test]
fn test_without_event_listeners_stays_inert() {
    let mut nav = Navigator::new(IPHONE);
    nav.supports_event_listeners = false;
    let host = SimHost::new(nav, "http://example.com/", T0);
    let mut ath = visit(Options::default(), host, MemoryStorage::new());

    assert_eq!(ath.status(), Status::Inert(InertReason::NoEventListeners));
    assert_eq!(ath.show(true), ShowOutcome::NotReady);
    assert!(ath.storage().is_empty());
}

// --- Private mode ---

#[test]
fn test_private_mode_suppresses_and_reports_once() {
    let ath = AddToHomescreen::new(
        Options::default(),
        iphone_host("http://example.com/"),
        DisabledStorage,
        Recorder::default(),
    )
    .unwrap();
    assert_eq!(ath.status(), Status::Inert(InertReason::Suppressed(Reason::PrivateMode)));
    assert!(!ath.has_persistence());
    assert_eq!(ath.hooks().count("private"), 1);
}

#[test]
fn test_private_mode_override_shows_anyway() {
    let options = Options {
        private_mode_override: true,
        ..Options::default()
    };
    let mut ath = AddToHomescreen::new(
        options,
        iphone_host("http://example.com/"),
        DisabledStorage,
        Recorder::default(),
    )
    .unwrap();
    assert!(ath.is_ready());
    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert_eq!(ath.session().display_count, 1);
    assert_eq!(ath.hooks().count("private"), 1);
}

// --- Homescreen detection ---

#[test]
fn test_hash_detection_round_trip() {
    let options = Options {
        detect_homescreen: DetectSetting::Flag(true),
        ..Options::default()
    };

    let first = visit(options.clone(), iphone_host("http://example.com/app"), MemoryStorage::new());
    assert!(first.is_ready());
    assert_eq!(first.host().current_href(), "http://example.com/app#ath");

    // The bookmark carries the token; launching from it counts as added.
    let second = visit(options, iphone_host("http://example.com/app#ath"), first.storage().clone());
    assert_eq!(
        second.status(),
        Status::Inert(InertReason::Suppressed(Reason::ReturnedFromHomescreen))
    );
    assert_eq!(second.host().current_href(), "http://example.com/app");
    assert_eq!(second.hooks().count("add"), 1);
    assert!(stored_session(second.storage()).unwrap().added);
}

#[test]
fn test_query_string_detection_appends_token() {
    let options = Options {
        detect_homescreen: DetectSetting::Mode(TokenMode::QueryString),
        ..Options::default()
    };
    let ath = visit(options, iphone_host("http://example.com/app?x=1"), MemoryStorage::new());
    assert_eq!(ath.host().current_href(), "http://example.com/app?x=1&ath=");
    assert_eq!(ath.host().history().len(), 1);
}

// --- Autostart, icon and interaction ---

#[test]
fn test_autostart_polls_until_document_ready() {
    let options = Options {
        autostart: true,
        ..Options::default()
    };
    let host = iphone_host("http://example.com/").loading_for(120);
    let mut ath = visit(options, host, MemoryStorage::new());

    assert_eq!(ath.phase(), Phase::Armed);
    assert_eq!(ath.host().pending_timers(), vec![Timer::AutostartRetry]);

    ath.advance(100);
    assert_eq!(ath.host().mount_count(), 0);
    ath.advance(50);
    assert_eq!(ath.host().mount_count(), 1);
    assert_eq!(ath.session().display_count, 1);
    assert_eq!(ath.phase(), Phase::AnimatingIn);
}

#[test]
fn test_icon_load_gates_entrance() {
    let host = iphone_host("http://example.com/").with_icon("/touch-icon.png", 200, false);
    let mut ath = visit(Options::default(), host, MemoryStorage::new());

    assert_eq!(ath.show(false), ShowOutcome::Shown);
    assert_eq!(ath.phase(), Phase::Pending);
    let markup = ath.host().mounted().unwrap();
    assert_eq!(markup.icon_src.as_deref(), Some("/touch-icon.png"));
    assert!(markup.container_class.ends_with(" ath-icon"));
    assert!(ath.host().pending_timers().is_empty());

    ath.advance(200);
    assert_eq!(ath.phase(), Phase::AnimatingIn);
    assert!(!ath.host().is_listening(Target::Icon, EventKind::Load));
    ath.advance(1_500);
    assert_eq!(ath.phase(), Phase::Visible);
}

#[test]
fn test_largest_touch_icon_is_used() {
    let links = vec![
        IconLink::new("apple-touch-icon", Some("120x120"), "/t120.png"),
        IconLink::new("apple-touch-icon", Some("152x152"), "/t152.png"),
    ];
    let host = iphone_host("http://example.com/").with_icon_links(links, 0, false);
    let mut ath = visit(Options::default(), host, MemoryStorage::new());
    ath.show(false);
    assert_eq!(
        ath.host().mounted().unwrap().icon_src.as_deref(),
        Some("/t152.png")
    );
}

#[test]
fn test_icon_error_still_shows() {
    let host = iphone_host("http://example.com/").with_icon("/missing.png", 50, true);
    let mut ath = visit(Options::default(), host, MemoryStorage::new());
    ath.show(false);
    ath.advance(50 + 1_500);
    assert_eq!(ath.phase(), Phase::Visible);
}

#[test]
fn test_icon_option_off_skips_lookup() {
    let options = Options {
        icon: false,
        ..Options::default()
    };
    let host = iphone_host("http://example.com/").with_icon("/touch-icon.png", 200, false);
    let mut ath = visit(options, host, MemoryStorage::new());
    ath.show(false);
    assert!(ath.host().mounted().unwrap().icon_src.is_none());
    assert_eq!(ath.phase(), Phase::AnimatingIn);
}

#[test]
fn test_click_dismiss_after_grace() {
    let options = Options {
        lifespan: 0.0,
        ..Options::default()
    };
    let mut ath = visit(options, iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);

    assert_eq!(ath.trigger(Target::Element, EventKind::Click), None);
    ath.advance(1_000);
    let dispatch = ath.trigger(Target::Element, EventKind::Click).unwrap();
    assert!(dispatch.handled);
    assert_eq!(ath.phase(), Phase::AnimatingOut);
    assert_eq!(ath.host().style().unwrap().opacity, 0.0);

    // Both transition end flavours arrive; removal happens once.
    ath.advance(300);
    assert_eq!(ath.phase(), Phase::Removed);
    assert_eq!(ath.hooks().count("remove"), 1);
    assert!(ath.host().listeners().is_empty());
}

#[test]
fn test_lifespan_zero_stays_on_screen() {
    let options = Options {
        lifespan: 0.0,
        ..Options::default()
    };
    let mut ath = visit(options, iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);
    ath.run_until_idle();
    assert_eq!(ath.phase(), Phase::Visible);
    assert!(ath.armed_timers().next().is_none());
}

#[test]
fn test_remove_before_entrance_cancels_show_timer() {
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), MemoryStorage::new());
    ath.show(false);
    assert!(ath.remove());
    assert!(!ath.host().pending_timers().contains(&Timer::Show));
    ath.run_until_idle();
    assert_eq!(ath.phase(), Phase::Removed);
    assert_eq!(ath.hooks().count("show"), 0);
    assert!(!ath.remove());
}

#[test]
fn test_modal_blocks_touchmove() {
    let options = Options {
        modal: true,
        ..Options::default()
    };
    let mut ath = visit(options, iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);
    assert!(ath.host().mounted().unwrap().viewport_class.contains("ath-modal"));

    let dispatch = ath.trigger(Target::Document, EventKind::TouchMove).unwrap();
    assert!(dispatch.prevent_default);
    assert!(dispatch.stop_propagation);
}

#[test]
fn test_mandatory_shows_immediately_without_dismiss() {
    let options = Options {
        mandatory: true,
        lifespan: 0.0,
        ..Options::default()
    };
    let host = SimHost::new(
        Navigator::new(IPHONE).with_standalone(Some(false)),
        "http://example.com/",
        T0,
    );
    let mut ath = visit(options, host, MemoryStorage::new());
    assert!(ath.config().mandatory);
    assert!(ath.config().modal);

    ath.show(false);
    ath.advance(0);
    assert_eq!(ath.phase(), Phase::Visible);
    ath.run_until_idle();
    assert!(!ath.host().is_listening(Target::Element, EventKind::Click));
    assert!(ath.host().is_listening(Target::Document, EventKind::TouchMove));
}

#[test]
fn test_resize_is_debounced() {
    let options = Options {
        lifespan: 0.0,
        ..Options::default()
    };
    let mut ath = visit(options, iphone_host("http://example.com/"), MemoryStorage::new());
    bring_on_screen(&mut ath);
    assert_eq!(ath.host().layout().unwrap().orientation, Orientation::Portrait);

    ath.host_mut().set_viewport(Viewport {
        inner_width: 667.0,
        inner_height: 375.0,
        client_width: 667.0,
        client_height: 375.0,
        ..Viewport::default()
    });
    for _ in 0..3 {
        ath.trigger(Target::Window, EventKind::Resize);
        ath.advance(40);
    }
    ath.trigger(Target::Window, EventKind::Scroll);
    let resizes = ath
        .host()
        .pending_timers()
        .into_iter()
        .filter(|t| *t == Timer::Resize)
        .count();
    assert_eq!(resizes, 1);
    assert_eq!(ath.host().layout().unwrap().orientation, Orientation::Portrait);

    ath.advance(100);
    assert_eq!(ath.host().layout().unwrap().orientation, Orientation::Landscape);
}

// --- Session operations ---

#[test]
fn test_session_operations_persist() {
    let storage = seeded(&returning(T0 - MINUTE, 5));
    let mut ath = visit(Options::default(), iphone_host("http://example.com/"), storage);

    ath.clear_display_count();
    assert_eq!(stored_session(ath.storage()).unwrap().display_count, 0);

    ath.opt_out();
    ath.opt_in();
    assert!(!stored_session(ath.storage()).unwrap().opted_out);

    ath.clear_session();
    assert_eq!(stored_session(ath.storage()).unwrap(), Session::default());
}
