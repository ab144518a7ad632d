// tests/poll_throttle.rs
//
// Poll scheduling against a scripted feed: the server-dictated interval
// is honored without network access, ingestion is idempotent, and a
// failed poll leaves the stored state untouched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use github_activity_dashboard::clock::{Clock, FixedClock};
use github_activity_dashboard::event::{Actor, Event, EventKind, Repo};
use github_activity_dashboard::feed::{ActivityFeed, FeedResponse};
use github_activity_dashboard::poll::{PollOutcome, Poller};
use github_activity_dashboard::store::{EventStore, MemoryStore};

struct ScriptedFeed {
    calls: AtomicUsize,
    responses: Mutex<VecDeque<FeedResponse>>,
}

impl ScriptedFeed {
    fn new(responses: Vec<FeedResponse>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            responses: Mutex::new(responses.into()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityFeed for ScriptedFeed {
    async fn fetch(&self, _account: &str, _etag: Option<&str>) -> Result<FeedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("responses mutex poisoned")
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected extra fetch"))
    }
}

/// A feed whose transport always fails (timeout, DNS, ...).
struct UnreachableFeed;

#[async_trait]
impl ActivityFeed for UnreachableFeed {
    async fn fetch(&self, _account: &str, _etag: Option<&str>) -> Result<FeedResponse> {
        Err(anyhow!("connection timed out"))
    }
}

fn watch_event(id: &str) -> Event {
    Event {
        id: id.to_string(),
        actor: Actor {
            login: "alice".to_string(),
        },
        repo: Repo {
            name: "x/y".to_string(),
        },
        created_at: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        kind: EventKind::Watch {},
    }
}

fn events_response(ids: &[&str], etag: &str, interval: u64) -> FeedResponse {
    FeedResponse::Events {
        events: ids.iter().map(|id| watch_event(id)).collect(),
        etag: etag.to_string(),
        poll_interval_secs: interval,
        rate: None,
    }
}

fn fixture(
    responses: Vec<FeedResponse>,
) -> (Arc<ScriptedFeed>, Arc<MemoryStore>, Arc<FixedClock>, Poller) {
    let feed = Arc::new(ScriptedFeed::new(responses));
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
    ));
    let poller = Poller::new(feed.clone(), store.clone(), clock.clone());
    (feed, store, clock, poller)
}

#[tokio::test]
async fn second_poll_inside_window_never_touches_the_network() {
    let (feed, _store, clock, poller) = fixture(vec![events_response(&["1"], "e1", 60)]);

    let first = poller.poll("alice").await.unwrap();
    assert_eq!(first, PollOutcome::Fetched { new_events: 1 });
    assert_eq!(feed.calls(), 1);

    clock.advance(Duration::seconds(30));
    let second = poller.poll("alice").await.unwrap();
    assert_eq!(second, PollOutcome::Skipped { remaining_secs: 30 });
    assert_eq!(feed.calls(), 1, "a throttled poll must not issue a request");
}

#[tokio::test]
async fn redelivered_events_never_change_the_cached_count() {
    let (_feed, store, clock, poller) = fixture(vec![
        events_response(&["1", "2"], "e1", 60),
        events_response(&["1", "2"], "e2", 60),
    ]);

    assert_eq!(
        poller.poll("alice").await.unwrap(),
        PollOutcome::Fetched { new_events: 2 }
    );
    clock.advance(Duration::seconds(61));
    assert_eq!(
        poller.poll("alice").await.unwrap(),
        PollOutcome::Fetched { new_events: 0 }
    );
    assert_eq!(store.event_count("alice"), 2);
}

#[tokio::test]
async fn not_modified_only_moves_the_poll_timestamp() {
    let (_feed, store, clock, poller) = fixture(vec![
        events_response(&["1"], "e1", 60),
        FeedResponse::NotModified { rate: None },
    ]);

    poller.poll("alice").await.unwrap();
    clock.advance(Duration::seconds(120));
    assert_eq!(poller.poll("alice").await.unwrap(), PollOutcome::UpToDate);

    let state = store.load_poll_state("alice").unwrap().expect("state saved");
    assert_eq!(state.etag, "e1");
    assert_eq!(state.poll_interval_secs, 60);
    assert_eq!(state.polled_at, clock.now());
}

#[tokio::test]
async fn failed_poll_leaves_state_untouched() {
    let (_feed, store, clock, poller) = fixture(vec![
        events_response(&["1"], "e1", 60),
        FeedResponse::Failed { status: 500 },
    ]);

    poller.poll("alice").await.unwrap();
    let before = store.load_poll_state("alice").unwrap().expect("state saved");

    clock.advance(Duration::seconds(120));
    assert_eq!(
        poller.poll("alice").await.unwrap(),
        PollOutcome::Failed { status: Some(500) }
    );

    let after = store.load_poll_state("alice").unwrap().expect("still there");
    assert_eq!(after, before, "a failed poll must not rewrite poll state");
}

#[tokio::test]
async fn failed_first_poll_creates_no_state() {
    let (_feed, store, _clock, poller) = fixture(vec![FeedResponse::Failed { status: 403 }]);

    assert_eq!(
        poller.poll("alice").await.unwrap(),
        PollOutcome::Failed { status: Some(403) }
    );
    assert!(store.load_poll_state("alice").unwrap().is_none());
}

#[tokio::test]
async fn transport_error_is_a_failed_outcome_not_a_crash() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
    ));
    let poller = Poller::new(Arc::new(UnreachableFeed), store.clone(), clock);

    assert_eq!(
        poller.poll("alice").await.unwrap(),
        PollOutcome::Failed { status: None }
    );
    assert!(store.load_poll_state("alice").unwrap().is_none());
}

#[tokio::test]
async fn one_bad_account_does_not_block_the_batch() {
    // "alice" gets a working response, "bob" a server error.
    let (_feed, store, _clock, poller) = fixture(vec![
        events_response(&["1"], "e1", 60),
        FeedResponse::Failed { status: 500 },
    ]);

    poller
        .poll_all(&["alice".to_string(), "bob".to_string()])
        .await;
    assert_eq!(store.event_count("alice"), 1);
    assert_eq!(store.event_count("bob"), 0);
}
