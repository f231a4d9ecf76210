//! Display policy: decides once per instance whether the callout may show.
//!
//! [`decide`] is pure. It returns the verdict, the session as it stands
//! after the checks, and an ordered list of side effects for the caller to
//! apply (URL rewrites, write-through persistence, the `on_add` hook).
//! Checks short-circuit in a fixed order; earlier checks may still have
//! mutated the session or the URL by the time a later one suppresses.

use std::fmt;

use crate::environment::Environment;
use crate::options::Config;
use crate::session::Session;
use crate::url_token::{self, TokenMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    Incompatible,
    OptedOut,
    AlreadyAdded,
    InvalidLocation,
    Standalone,
    ReturnedFromHomescreen,
    FirstVisit,
    PrivateMode,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Reason::Incompatible => "device not supported",
            Reason::OptedOut => "user opted out",
            Reason::AlreadyAdded => "already added to the homescreen",
            Reason::InvalidLocation => "not a valid location",
            Reason::Standalone => "in standalone mode",
            Reason::ReturnedFromHomescreen => {
                "URL has token, so we are likely coming from homescreen"
            }
            Reason::FirstVisit => "skipping first visit",
            Reason::PrivateMode => "browser is in private mode",
        };
        f.write_str(msg)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Suppress(Reason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Strip every token encoding from the current URL.
    RemoveToken,
    /// Append the token for this mode to the current URL.
    AddToken(TokenMode),
    /// Write the session through to storage.
    Persist,
    /// Fire `on_add`, provided persistence is still available.
    FireOnAdd,
}

/// Everything [`decide`] looks at.
pub struct PolicyInput<'a> {
    pub env: &'a Environment,
    pub config: &'a Config,
    /// The record as loaded; `None` when nothing was persisted.
    pub session: Option<Session>,
    /// A record exists under the legacy key.
    pub legacy_record: bool,
    pub has_persistence: bool,
    pub href: &'a str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub verdict: Verdict,
    pub session: Session,
    pub effects: Vec<Effect>,
}

pub fn decide(input: PolicyInput<'_>) -> Decision {
    let PolicyInput {
        env,
        config,
        session,
        legacy_record,
        has_persistence,
        href,
    } = input;

    let has_token = url_token::has_token(href);
    let mut session = session.unwrap_or_default();
    let mut effects = Vec::new();

    let suppress = |reason: Reason, session: Session, effects: Vec<Effect>| Decision {
        verdict: Verdict::Suppress(reason),
        session,
        effects,
    };

    // 1. Nothing below runs on an unsupported device; a token that
    //    arrived through a shared link is scrubbed.
    if !env.is_compatible {
        if has_token {
            effects.push(Effect::RemoveToken);
        }
        return suppress(Reason::Incompatible, session, effects);
    }

    // 2. An old-release record means the user already dealt with us.
    if legacy_record && !session.opted_out {
        session.opt_out();
        effects.push(Effect::Persist);
    }

    // 3-4.
    if session.opted_out {
        return suppress(Reason::OptedOut, session, effects);
    }
    if session.added {
        return suppress(Reason::AlreadyAdded, session, effects);
    }

    // 5.
    if !config.is_valid_location(href) {
        return suppress(Reason::InvalidLocation, session, effects);
    }

    // 6.
    if env.is_standalone {
        mark_added(&mut session, &mut effects, has_persistence);
        return suppress(Reason::Standalone, session, effects);
    }

    // 7-8. Tag the URL so a homescreen shortcut created from this page
    //      carries the token back to us on launch.
    if let Some(mode) = config.detect_homescreen {
        if has_token {
            effects.push(Effect::RemoveToken);
            mark_added(&mut session, &mut effects, has_persistence);
            return suppress(Reason::ReturnedFromHomescreen, session, effects);
        }
        effects.push(Effect::AddToken(mode));
    }

    // 9.
    if session.mark_returning() {
        effects.push(Effect::Persist);
        if config.skip_first_visit {
            return suppress(Reason::FirstVisit, session, effects);
        }
    }

    // 10.
    if !has_persistence && !config.private_mode_override {
        return suppress(Reason::PrivateMode, session, effects);
    }

    Decision {
        verdict: Verdict::Allow,
        session,
        effects,
    }
}

fn mark_added(session: &mut Session, effects: &mut Vec<Effect>, has_persistence: bool) {
    if session.mark_added() {
        effects.push(Effect::Persist);
        if has_persistence {
            effects.push(Effect::FireOnAdd);
        }
    }
}

/// Emit a "not displaying" style diagnostic. Loud only when logging is on.
pub(crate) fn diagnostic(config: &Config, msg: fmt::Arguments<'_>) {
    if config.logging {
        tracing::info!("Add to homescreen: {msg}");
    } else {
        tracing::debug!("Add to homescreen: {msg}");
    }
}
