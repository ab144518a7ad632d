// src/poll.rs
//
// Decides whether an account is due for a poll, performs the conditional
// fetch, and applies the outcome to the store. The upstream's own rate
// policy (etag + x-poll-interval) is the throttle; we never poll inside
// the server-dictated window.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::clock::Clock;
use crate::feed::{ActivityFeed, FeedResponse, RateLimit};
use crate::store::{EventStore, PollState};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_requests_total", "Feed requests actually sent upstream.");
        describe_counter!(
            "poll_skipped_total",
            "Polls skipped because the poll interval had not elapsed."
        );
        describe_counter!("poll_events_new_total", "Events newly added to the cache.");
        describe_counter!(
            "poll_failures_total",
            "Feed requests that failed (non-200/304 or transport error)."
        );
        describe_gauge!("poll_last_run_ts", "Unix ts when a poll batch last finished.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The poll interval has not elapsed; no network access happened.
    Skipped { remaining_secs: u64 },
    /// 304: nothing changed upstream.
    UpToDate,
    /// 200: `new_events` events entered the cache.
    Fetched { new_events: usize },
    /// Non-200/304 status, or `None` for a transport error / timeout.
    /// Poll state is left untouched so the account retries next cycle.
    Failed { status: Option<u16> },
}

pub struct Poller {
    feed: Arc<dyn ActivityFeed>,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl Poller {
    pub fn new(
        feed: Arc<dyn ActivityFeed>,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ensure_metrics_described();
        Self { feed, store, clock }
    }

    /// Poll a single account. Side effects are confined to this account's
    /// cache and poll state. `Err` means storage failed; every upstream
    /// outcome maps to an `Ok(PollOutcome)`.
    pub async fn poll(&self, account: &str) -> anyhow::Result<PollOutcome> {
        let now = self.clock.now();
        let state = self.store.load_poll_state(account)?;

        if let Some(st) = &state {
            let elapsed = (now - st.polled_at).num_seconds();
            if elapsed >= 0 && (elapsed as u64) < st.poll_interval_secs {
                let remaining = st.poll_interval_secs - elapsed as u64;
                counter!("poll_skipped_total").increment(1);
                tracing::info!(
                    account,
                    elapsed,
                    remaining,
                    "polled recently, next poll not yet allowed"
                );
                return Ok(PollOutcome::Skipped {
                    remaining_secs: remaining,
                });
            }
        }

        counter!("poll_requests_total").increment(1);
        let etag = state.as_ref().map(|s| s.etag.as_str());
        let resp = match self.feed.fetch(account, etag).await {
            Ok(r) => r,
            Err(e) => {
                counter!("poll_failures_total").increment(1);
                tracing::warn!(error = ?e, account, "events feed unreachable");
                return Ok(PollOutcome::Failed { status: None });
            }
        };

        match resp {
            FeedResponse::NotModified { rate } => {
                // A 304 implies we sent a validator, so a state existed;
                // only the poll timestamp moves.
                if let Some(mut st) = state {
                    st.polled_at = now;
                    self.store.save_poll_state(account, &st)?;
                }
                log_poll(account, "up-to-date", rate);
                Ok(PollOutcome::UpToDate)
            }
            FeedResponse::Events {
                events,
                etag,
                poll_interval_secs,
                rate,
            } => {
                let mut new_events = 0;
                for event in &events {
                    if self.store.insert_event(account, event)? {
                        new_events += 1;
                    }
                }
                self.store.save_poll_state(
                    account,
                    &PollState {
                        etag,
                        polled_at: now,
                        poll_interval_secs,
                    },
                )?;
                counter!("poll_events_new_total").increment(new_events as u64);
                let noun = if new_events == 1 { "event" } else { "events" };
                log_poll(account, &format!("{new_events} new {noun}"), rate);
                Ok(PollOutcome::Fetched { new_events })
            }
            FeedResponse::Failed { status } => {
                counter!("poll_failures_total").increment(1);
                tracing::warn!(account, status, "events feed request failed");
                Ok(PollOutcome::Failed {
                    status: Some(status),
                })
            }
        }
    }

    /// Poll a batch sequentially. A failure on one account is logged and
    /// never blocks the others.
    pub async fn poll_all(&self, accounts: &[String]) {
        for account in accounts {
            if let Err(e) = self.poll(account).await {
                tracing::warn!(error = ?e, account = %account, "poll failed");
            }
        }
        gauge!("poll_last_run_ts").set(self.clock.now().timestamp().max(0) as f64);
    }
}

fn log_poll(account: &str, outcome: &str, rate: Option<RateLimit>) {
    match rate {
        Some(r) => tracing::info!(
            account,
            outcome,
            ratelimit_remaining = r.remaining,
            ratelimit_limit = r.limit,
            "poll finished"
        ),
        None => tracing::info!(account, outcome, "poll finished"),
    }
}
