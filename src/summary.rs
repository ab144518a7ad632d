// src/summary.rs
//
// Rendering rules for timeline items.
//
// Different event types carry different payloads and render differently.
// The `Registry` maps type tags (e.g. "PushEvent") to rendering rules;
// each rule returns `{icon, body}` for an interesting item or `None` to
// drop it. The registry is built at startup and passed into the
// `SummaryBuilder`, which appends the timestamp and relative-time string
// and produces the final ordered list.

use chrono::{DateTime, Duration, Utc};
use html_escape::encode_double_quoted_attribute;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::event::{EventKind, TimelineItem, AGG_PUSH_TAG};

/// Output record handed to the renderer. `body` may carry inline markup.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub icon: &'static str,
    pub body: String,
    pub time: DateTime<Utc>,
    pub timeago: String,
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub icon: &'static str,
    pub body: String,
}

pub trait RenderRule: Send + Sync {
    /// `None` means the item is not interesting and is dropped.
    fn render(&self, item: &TimelineItem) -> Option<Rendered>;
}

/// Type tag → rendering rule. Tags without a rule are dropped.
pub struct Registry {
    rules: HashMap<&'static str, Box<dyn RenderRule>>,
}

impl Registry {
    pub fn with_default_rules() -> Self {
        let mut rules: HashMap<&'static str, Box<dyn RenderRule>> = HashMap::new();
        rules.insert("WatchEvent", Box::new(WatchRule));
        rules.insert("ForkEvent", Box::new(ForkRule));
        rules.insert("PublicEvent", Box::new(PublicRule));
        rules.insert("PullRequestEvent", Box::new(PullRequestRule));
        rules.insert("CreateEvent", Box::new(CreateRule));
        rules.insert("ReleaseEvent", Box::new(ReleaseRule));
        rules.insert("PushEvent", Box::new(PushRule));
        rules.insert(AGG_PUSH_TAG, Box::new(PushRule));
        Self { rules }
    }

    pub fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        self.rules.get(item.type_tag())?.render(item)
    }
}

pub struct SummaryBuilder {
    registry: Registry,
    clock: Arc<dyn Clock>,
}

impl SummaryBuilder {
    pub fn new(registry: Registry, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// Sort newest-first, render each item through the registry, and
    /// attach timestamps. Uninteresting items disappear here.
    pub fn build(&self, mut items: Vec<TimelineItem>) -> Vec<Summary> {
        items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        let now = self.clock.now();

        items
            .iter()
            .filter_map(|item| {
                let rendered = self.registry.render(item)?;
                Some(Summary {
                    icon: rendered.icon,
                    body: rendered.body,
                    time: item.created_at(),
                    timeago: timeago(item, now),
                })
            })
            .collect()
    }
}

/// An `<a>` tag linking to github.com. Logins and repo names are
/// URL-safe; no escaping needed.
fn gh_link(s: &str) -> String {
    format!(r#"<a href="https://github.com/{s}">{s}</a>"#)
}

fn simple_body(actor: &str, action: &str, repo: &str) -> String {
    format!("{} {} {}", gh_link(actor), action, gh_link(repo))
}

struct WatchRule;

impl RenderRule for WatchRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        Some(Rendered {
            icon: "star",
            body: simple_body(&e.actor.login, "starred", &e.repo.name),
        })
    }
}

struct ForkRule;

impl RenderRule for ForkRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        Some(Rendered {
            icon: "repo-forked",
            body: simple_body(&e.actor.login, "forked", &e.repo.name),
        })
    }
}

struct PublicRule;

impl RenderRule for PublicRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        Some(Rendered {
            icon: "heart",
            body: simple_body(&e.actor.login, "open-sourced", &e.repo.name),
        })
    }
}

/// Only new and merged pull requests are interesting.
struct PullRequestRule;

impl RenderRule for PullRequestRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        let EventKind::PullRequest {
            action,
            number,
            pull_request,
        } = &e.kind
        else {
            return None;
        };

        // A merged PR arrives as "closed" with the merged flag set.
        let action = if action == "closed" && pull_request.merged {
            "merged"
        } else {
            action.as_str()
        };
        if action != "opened" && action != "merged" {
            return None;
        }

        let body = format!(
            r##"{} {} pull request <a href="{}" title="{}">#{}</a> on {}"##,
            gh_link(&e.actor.login),
            action,
            encode_double_quoted_attribute(&pull_request.html_url),
            encode_double_quoted_attribute(&pull_request.title),
            number,
            gh_link(&e.repo.name),
        );
        Some(Rendered {
            icon: "git-pull-request",
            body,
        })
    }
}

/// New repositories and tags, but not branches.
struct CreateRule;

impl RenderRule for CreateRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        let EventKind::Create { ref_type, ref_name } = &e.kind else {
            return None;
        };

        match ref_type.as_str() {
            "repository" => Some(Rendered {
                icon: "repo",
                body: format!(
                    "{} created {}",
                    gh_link(&e.actor.login),
                    gh_link(&e.repo.name)
                ),
            }),
            "tag" => {
                let tag = ref_name.as_deref()?;
                Some(Rendered {
                    icon: "tag",
                    body: format!(
                        "{} tagged {} on {}",
                        gh_link(&e.actor.login),
                        tag,
                        gh_link(&e.repo.name)
                    ),
                })
            }
            _ => None,
        }
    }
}

struct ReleaseRule;

impl RenderRule for ReleaseRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let e = item.as_event()?;
        let EventKind::Release { release } = &e.kind else {
            return None;
        };
        Some(Rendered {
            icon: "package",
            body: format!(
                "{} released {} of {}",
                gh_link(&e.actor.login),
                release.tag_name,
                gh_link(&e.repo.name)
            ),
        })
    }
}

/// Handles both raw pushes and aggregated push groups; the commit count
/// links a hover listing the first line of every commit message.
struct PushRule;

impl RenderRule for PushRule {
    fn render(&self, item: &TimelineItem) -> Option<Rendered> {
        let (actor, repo, commits, distinct_size) = match item {
            TimelineItem::Event(e) => match &e.kind {
                EventKind::Push {
                    commits,
                    distinct_size,
                } => (&e.actor, &e.repo, commits, *distinct_size),
                _ => return None,
            },
            TimelineItem::PushGroup(g) => (&g.actor, &g.repo, &g.commits, g.distinct_size),
        };

        let hover = commits
            .iter()
            .map(|c| c.message.lines().next().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n");

        let body = format!(
            r#"{} pushed <a title="{}">{} commits</a> to {}"#,
            gh_link(&actor.login),
            encode_double_quoted_attribute(&hover),
            distinct_size,
            gh_link(&repo.name),
        );
        Some(Rendered {
            icon: "git-commit",
            body,
        })
    }
}

/// Bucket a (non-negative) age into the display phrase.
pub fn format_time_delta(delta: Duration) -> String {
    let days = delta.num_days();
    let seconds = (delta - Duration::days(days)).num_seconds();

    if days > 1 {
        format!("{days} days ago")
    } else if days == 1 {
        "1 day ago".to_string()
    } else if seconds > 7200 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds > 3600 {
        "1 hour ago".to_string()
    } else if seconds > 120 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds > 60 {
        "1 minute ago".to_string()
    } else {
        "just now".to_string()
    }
}

/// A push group spans a time range; when both ends round to the same
/// bucket a single phrase is enough.
fn timeago(item: &TimelineItem, now: DateTime<Utc>) -> String {
    match item {
        TimelineItem::PushGroup(g) => {
            let s1 = format_time_delta(now - g.begin);
            let s2 = format_time_delta(now - g.end);
            if s1 == s2 {
                s1
            } else {
                format!("{s1} &ndash; {s2}")
            }
        }
        TimelineItem::Event(e) => format_time_delta(now - e.created_at),
    }
}
