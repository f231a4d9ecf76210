//! The persisted cross-visit session record and its fail-soft store.

use serde::{Deserialize, Serialize};

use crate::storage::{Storage, StorageError};

/// Cross-visit state, stored as JSON under the configured app id.
///
/// Missing fields fall back to defaults, so a partial record from an older
/// release merges cleanly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Unix millis of the last display; 0 = never.
    #[serde(rename = "lastDisplayTime", alias = "lastDisplayTimeMillis")]
    pub last_display_time: i64,
    #[serde(rename = "returningVisitor")]
    pub returning_visitor: bool,
    #[serde(rename = "displayCount")]
    pub display_count: u32,
    #[serde(rename = "optedout", alias = "optedOut")]
    pub opted_out: bool,
    /// The user is believed to have added the page to the homescreen.
    pub added: bool,
}

impl Session {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn record_display(&mut self, now_millis: i64) {
        self.last_display_time = now_millis;
        self.display_count = self.display_count.saturating_add(1);
    }

    /// Returns true if this call flipped `added`.
    pub fn mark_added(&mut self) -> bool {
        let first = !self.added;
        self.added = true;
        first
    }

    /// Returns true on the first visit.
    pub fn mark_returning(&mut self) -> bool {
        let first = !self.returning_visitor;
        self.returning_visitor = true;
        first
    }

    pub fn opt_out(&mut self) {
        self.opted_out = true;
    }

    pub fn opt_in(&mut self) {
        self.opted_out = false;
    }

    pub fn clear_display_count(&mut self) {
        self.display_count = 0;
    }

    /// The only way `added` and `opted_out` are ever reset.
    pub fn clear(&mut self) {
        *self = Session::default();
    }

    /// Milliseconds since the last display, or `None` if never shown.
    pub fn since_last_display(&self, now_millis: i64) -> Option<i64> {
        (self.last_display_time > 0).then(|| now_millis.saturating_sub(self.last_display_time))
    }
}

/// Outcome of a write-through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Persisted {
    Saved,
    /// Persistence is already known to be unavailable; nothing was written.
    Skipped,
    /// The write failed. `first` is true exactly once per store.
    Failed { first: bool },
}

impl Persisted {
    pub fn newly_private(&self) -> bool {
        matches!(self, Persisted::Failed { first: true })
    }
}

/// Session persistence that never fails past its boundary.
///
/// Any storage error downgrades the store to `has_persistence = false`;
/// after that `save` is a no-op.
pub struct SessionStore<S> {
    storage: S,
    key: String,
    has_persistence: bool,
    failure_reported: bool,
}

impl<S: Storage> SessionStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            has_persistence: true,
            failure_reported: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn has_persistence(&self) -> bool {
        self.has_persistence
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the record. Unreadable storage or malformed JSON yields `None`.
    pub fn load(&mut self) -> Option<Session> {
        let key = self.key.clone();
        let raw = self.read(&key)?;
        match Session::from_json(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("ignoring malformed session under '{}': {e}", self.key);
                None
            }
        }
    }

    /// Whether any value exists under `key`. Read failures count as absent.
    pub fn contains(&mut self, key: &str) -> bool {
        self.read(key).is_some()
    }

    /// First write of the session, which decides `has_persistence`.
    /// Runs even if an earlier read failed.
    pub fn probe(&mut self, session: &Session) -> Persisted {
        match self.write(session) {
            Ok(()) => {
                self.has_persistence = true;
                Persisted::Saved
            }
            Err(e) => self.downgrade(e),
        }
    }

    /// Write-through after a mutation.
    pub fn save(&mut self, session: &Session) -> Persisted {
        if !self.has_persistence {
            return Persisted::Skipped;
        }
        match self.write(session) {
            Ok(()) => Persisted::Saved,
            Err(e) => self.downgrade(e),
        }
    }

    /// Delete the record under `key`. Errors are swallowed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.storage.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("could not remove '{key}': {e}");
                false
            }
        }
    }

    fn read(&mut self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("storage read of '{key}' failed: {e}");
                self.has_persistence = false;
                None
            }
        }
    }

    fn write(&mut self, session: &Session) -> Result<(), StorageError> {
        let json = session
            .to_json()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        self.storage.set_item(&self.key, &json)
    }

    fn downgrade(&mut self, err: StorageError) -> Persisted {
        self.has_persistence = false;
        let first = !self.failure_reported;
        self.failure_reported = true;
        if first {
            tracing::warn!("session persistence unavailable, continuing without it: {err}");
        }
        Persisted::Failed { first }
    }
}
