// src/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type tag used for synthetic aggregated pushes (never seen upstream).
pub const AGG_PUSH_TAG: &str = "AggPushEvent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// Full name, e.g. "octocat/hello-world".
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    pub message: String,
}

/// One unit of upstream activity, as cached on disk.
///
/// `id` is stable and unique within an account's cache; the cache layer
/// relies on it for at-most-once ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub actor: Actor,
    pub repo: Repo,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// The heterogeneous `type`/`payload` pair of an upstream event.
///
/// Each variant carries only the payload fields that filtering or rendering
/// consumes. Tags outside the known vocabulary land in `Other` and are
/// dropped by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    #[serde(rename = "WatchEvent")]
    Watch {},
    #[serde(rename = "ForkEvent")]
    Fork {},
    #[serde(rename = "PublicEvent")]
    Public {},
    #[serde(rename = "PullRequestEvent")]
    PullRequest {
        action: String,
        number: u64,
        pull_request: PullRequestInfo,
    },
    #[serde(rename = "CreateEvent")]
    Create {
        ref_type: String,
        #[serde(rename = "ref", default)]
        ref_name: Option<String>,
    },
    #[serde(rename = "ReleaseEvent")]
    Release { release: ReleaseInfo },
    #[serde(rename = "PushEvent")]
    Push {
        #[serde(default)]
        commits: Vec<Commit>,
        #[serde(default)]
        distinct_size: u64,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub html_url: String,
    pub title: String,
    #[serde(default)]
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
}

impl EventKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            EventKind::Watch {} => "WatchEvent",
            EventKind::Fork {} => "ForkEvent",
            EventKind::Public {} => "PublicEvent",
            EventKind::PullRequest { .. } => "PullRequestEvent",
            EventKind::Create { .. } => "CreateEvent",
            EventKind::Release { .. } => "ReleaseEvent",
            EventKind::Push { .. } => "PushEvent",
            EventKind::Other => "Other",
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, EventKind::Push { .. })
    }
}

/// Synthetic record standing in for two or more folded push events on the
/// same repo. `begin` is the most recent constituent's timestamp, `end`
/// the least recent; `begin` doubles as the item's display timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct PushGroup {
    pub actor: Actor,
    pub repo: Repo,
    pub commits: Vec<Commit>,
    pub distinct_size: u64,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// What the aggregator emits: raw events plus synthetic push groups.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem {
    Event(Event),
    PushGroup(PushGroup),
}

impl TimelineItem {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            TimelineItem::Event(e) => e.created_at,
            TimelineItem::PushGroup(g) => g.begin,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            TimelineItem::Event(e) => e.kind.type_tag(),
            TimelineItem::PushGroup(_) => AGG_PUSH_TAG,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            TimelineItem::Event(e) => Some(e),
            TimelineItem::PushGroup(_) => None,
        }
    }
}
