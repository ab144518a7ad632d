// src/feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{HeaderMap, ACCEPT, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;

use crate::event::Event;

/// Fallback when a 200 carries no usable `x-poll-interval` header.
/// Matches the upstream's documented floor for unauthenticated clients.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub remaining: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub enum FeedResponse {
    /// 304: the stored validator still matches; no body.
    NotModified { rate: Option<RateLimit> },
    /// 200: fresh page of events plus new polling metadata.
    Events {
        events: Vec<Event>,
        etag: String,
        poll_interval_secs: u64,
        rate: Option<RateLimit>,
    },
    /// Anything else.
    Failed { status: u16 },
}

#[async_trait]
pub trait ActivityFeed: Send + Sync {
    /// Conditional fetch of an account's public activity feed. `etag` is
    /// the stored validator from the previous poll, when one exists.
    async fn fetch(&self, account: &str, etag: Option<&str>) -> Result<FeedResponse>;
}

/// GitHub public-events client over reqwest.
pub struct GithubFeed {
    client: reqwest::Client,
    base_url: String,
}

impl GithubFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ActivityFeed for GithubFeed {
    async fn fetch(&self, account: &str, etag: Option<&str>) -> Result<FeedResponse> {
        let url = format!("{}/users/{}/events/public", self.base_url, account);

        let mut req = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            // GitHub rejects requests without a User-Agent.
            .header(USER_AGENT, concat!("github-activity-dashboard/", env!("CARGO_PKG_VERSION")));
        if let Some(tag) = etag {
            req = req.header(IF_NONE_MATCH, tag);
        }

        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        let rate = rate_limit(resp.headers());

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FeedResponse::NotModified { rate });
        }
        if status != StatusCode::OK {
            return Ok(FeedResponse::Failed {
                status: status.as_u16(),
            });
        }

        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let poll_interval_secs = resp
            .headers()
            .get("x-poll-interval")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let body = resp.text().await.with_context(|| format!("reading body of {url}"))?;
        let raw: Vec<serde_json::Value> =
            serde_json::from_str(&body).context("parsing events feed body")?;

        // Lenient per element: one malformed record must not sink its siblings.
        let mut events = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<Event>(value) {
                Ok(ev) => events.push(ev),
                Err(e) => {
                    tracing::warn!(error = %e, account, "skipping malformed event in feed");
                    counter!("feed_malformed_events_total").increment(1);
                }
            }
        }

        Ok(FeedResponse::Events {
            events,
            etag,
            poll_interval_secs,
            rate,
        })
    }
}

fn rate_limit(headers: &HeaderMap) -> Option<RateLimit> {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    Some(RateLimit {
        remaining: get("x-ratelimit-remaining")?,
        limit: get("x-ratelimit-limit")?,
    })
}
