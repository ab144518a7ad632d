// src/store.rs
//
// Account-scoped persistence for cached events and polling metadata.
// The filesystem layout is one directory per account with one JSON
// document per event, named by the event id; the poll-state record
// lives in the same directory under the reserved name `poll-info`.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::event::Event;

/// Reserved file name inside an account directory; never a valid event id.
const POLL_STATE_FILE: &str = "poll-info";

/// Per-account polling metadata, persisted atomically as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// Opaque cache validator from the upstream's `etag` header.
    pub etag: String,
    pub polled_at: DateTime<Utc>,
    /// Server-dictated minimum spacing between polls.
    pub poll_interval_secs: u64,
}

impl PollState {
    /// Three-line text record: validator, ISO-8601 UTC timestamp, interval.
    fn to_record(&self) -> String {
        format!(
            "{}\n{}\n{}",
            self.etag,
            self.polled_at.format("%Y-%m-%dT%H:%M:%SZ"),
            self.poll_interval_secs
        )
    }

    fn from_record(s: &str) -> Result<Self> {
        let mut lines = s.lines();
        let etag = lines.next().ok_or_else(|| anyhow!("missing etag line"))?;
        let polled_at = lines
            .next()
            .ok_or_else(|| anyhow!("missing timestamp line"))?;
        let interval = lines
            .next()
            .ok_or_else(|| anyhow!("missing interval line"))?;

        let polled_at = DateTime::parse_from_rfc3339(polled_at.trim())
            .with_context(|| format!("parsing poll timestamp {polled_at:?}"))?
            .with_timezone(&Utc);
        let poll_interval_secs = interval
            .trim()
            .parse::<u64>()
            .with_context(|| format!("parsing poll interval {interval:?}"))?;

        Ok(Self {
            etag: etag.trim().to_string(),
            polled_at,
            poll_interval_secs,
        })
    }
}

pub trait EventStore: Send + Sync {
    /// Store an event unless one with the same id is already cached.
    /// Returns `true` when the event was new. Idempotent under re-delivery.
    fn insert_event(&self, account: &str, event: &Event) -> Result<bool>;

    /// Every cached event for the account, in no particular order.
    /// Individually unreadable documents are skipped with a warning.
    fn list_events(&self, account: &str) -> Result<Vec<Event>>;

    fn load_poll_state(&self, account: &str) -> Result<Option<PollState>>;

    /// Overwrites all three fields as a unit; a partial write must never
    /// leave validator and interval inconsistent.
    fn save_poll_state(&self, account: &str, state: &PollState) -> Result<()>;
}

pub struct FsEventStore {
    root: PathBuf,
}

impl FsEventStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn account_dir(&self, account: &str) -> PathBuf {
        self.root.join("users").join(account)
    }

    fn ensure_account_dir(&self, account: &str) -> Result<PathBuf> {
        let dir = self.account_dir(account);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating cache dir {}", dir.display()))?;
        Ok(dir)
    }
}

impl EventStore for FsEventStore {
    fn insert_event(&self, account: &str, event: &Event) -> Result<bool> {
        let dir = self.ensure_account_dir(account)?;
        let path = dir.join(&event.id);
        if path.exists() {
            return Ok(false);
        }
        let doc = serde_json::to_string(event).context("serializing event")?;
        fs::write(&path, doc).with_context(|| format!("writing {}", path.display()))?;
        Ok(true)
    }

    fn list_events(&self, account: &str) -> Result<Vec<Event>> {
        let dir = self.account_dir(account);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            if name.to_str() == Some(POLL_STATE_FILE) || !path.is_file() {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = ?e, file = %path.display(), "unreadable cached event, skipping");
                    continue;
                }
            };
            match serde_json::from_str::<Event>(&content) {
                Ok(ev) => events.push(ev),
                Err(e) => {
                    tracing::warn!(error = %e, file = %path.display(), "malformed cached event, skipping");
                }
            }
        }
        Ok(events)
    }

    fn load_poll_state(&self, account: &str) -> Result<Option<PollState>> {
        let path = self.account_dir(account).join(POLL_STATE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let state = PollState::from_record(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(state))
    }

    fn save_poll_state(&self, account: &str, state: &PollState) -> Result<()> {
        let dir = self.ensure_account_dir(account)?;
        // Write to a sibling temp file, then swap, so the three fields
        // land all-or-nothing.
        let tmp = dir.join(format!("{POLL_STATE_FILE}.tmp"));
        let path = dir.join(POLL_STATE_FILE);
        fs::write(&tmp, state.to_record())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {} into place", tmp.display()))?;
        Ok(())
    }
}

// --- Test helper ---
/// In-memory store with the same contract as `FsEventStore`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    events: HashMap<String, HashMap<String, Event>>,
    states: HashMap<String, PollState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self, account: &str) -> usize {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.events.get(account).map_or(0, HashMap::len)
    }
}

impl EventStore for MemoryStore {
    fn insert_event(&self, account: &str, event: &Event) -> Result<bool> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let cached = inner.events.entry(account.to_string()).or_default();
        if cached.contains_key(&event.id) {
            return Ok(false);
        }
        cached.insert(event.id.clone(), event.clone());
        Ok(true)
    }

    fn list_events(&self, account: &str) -> Result<Vec<Event>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .events
            .get(account)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }

    fn load_poll_state(&self, account: &str) -> Result<Option<PollState>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.states.get(account).cloned())
    }

    fn save_poll_state(&self, account: &str, state: &PollState) -> Result<()> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.states.insert(account.to_string(), state.clone());
        Ok(())
    }
}
