// src/aggregate.rs
//
// Two passes over an account's cached events:
//  1. drop pushes generated by pull-request merges (noise),
//  2. fold bursts of same-repo pushes into one synthetic item.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::event::{Commit, Event, EventKind, PushGroup, TimelineItem};

/// A push whose newest (last) commit message starts with the upstream's
/// auto-merge phrase. Zero-commit pushes are never merge pushes.
pub fn is_merge_push(event: &Event) -> bool {
    if let EventKind::Push { commits, .. } = &event.kind {
        if let Some(last) = commits.last() {
            return last
                .message
                .trim()
                .to_lowercase()
                .starts_with("merge pull request");
        }
    }
    false
}

pub fn filter_merge_pushes(events: Vec<Event>) -> Vec<Event> {
    events.into_iter().filter(|e| !is_merge_push(e)).collect()
}

/// Fold temporally adjacent same-repo pushes into `PushGroup`s.
///
/// Events are sorted newest-first and partitioned by repo. Within a repo a
/// push joins the running group while its gap from the group head (the
/// most recent member) is under one day; a gap of a day or more closes the
/// group. Non-push events pass through and do not interrupt a group.
/// Output order across repos is unspecified; callers re-sort for display.
pub fn aggregate_pushes(mut events: Vec<Event>) -> Vec<TimelineItem> {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut by_repo: HashMap<String, Vec<Event>> = HashMap::new();
    for event in events {
        by_repo
            .entry(event.repo.name.clone())
            .or_default()
            .push(event);
    }

    let mut out = Vec::new();
    for (_, repo_events) in by_repo {
        let mut group: Vec<Event> = Vec::new();
        let mut head_time: Option<DateTime<Utc>> = None;

        for event in repo_events {
            if !event.kind.is_push() {
                out.push(TimelineItem::Event(event));
                continue;
            }

            match head_time {
                None => {
                    head_time = Some(event.created_at);
                    group.push(event);
                }
                // num_days() floors at whole days, reproducing the
                // original day-component comparison: a gap under 86400s
                // merges, a day or more splits.
                Some(t1) if (t1 - event.created_at).num_days() < 1 => {
                    group.push(event);
                }
                Some(_) => {
                    out.push(combine_pushes(std::mem::take(&mut group)));
                    head_time = Some(event.created_at);
                    group.push(event);
                }
            }
        }

        if !group.is_empty() {
            out.push(combine_pushes(group));
        }
    }

    out
}

/// Merge-filter then aggregate; the shape the pipeline consumes.
pub fn build_timeline(events: Vec<Event>) -> Vec<TimelineItem> {
    aggregate_pushes(filter_merge_pushes(events))
}

/// Combine a non-empty newest-first run of pushes. A group of one is the
/// original event; no synthetic wrapping when there is nothing to merge.
fn combine_pushes(mut group: Vec<Event>) -> TimelineItem {
    debug_assert!(!group.is_empty());
    if group.len() == 1 {
        return TimelineItem::Event(group.remove(0));
    }

    let begin = group[0].created_at;
    let end = group[group.len() - 1].created_at;

    let mut commits: Vec<Commit> = Vec::new();
    let mut distinct_size = 0u64;
    for event in &group {
        if let EventKind::Push {
            commits: c,
            distinct_size: d,
        } = &event.kind
        {
            commits.extend(c.iter().cloned());
            distinct_size += d;
        }
    }

    let head = group.remove(0);
    TimelineItem::PushGroup(PushGroup {
        actor: head.actor,
        repo: head.repo,
        commits,
        distinct_size,
        begin,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Actor, Repo};
    use chrono::{TimeZone, Utc};

    fn push(id: &str, repo: &str, at: DateTime<Utc>, msgs: &[&str], distinct: u64) -> Event {
        Event {
            id: id.to_string(),
            actor: Actor {
                login: "octocat".to_string(),
            },
            repo: Repo {
                name: repo.to_string(),
            },
            created_at: at,
            kind: EventKind::Push {
                commits: msgs
                    .iter()
                    .map(|m| Commit {
                        sha: None,
                        message: (*m).to_string(),
                    })
                    .collect(),
                distinct_size: distinct,
            },
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    #[test]
    fn merge_pull_request_push_is_dropped() {
        let ev = push(
            "1",
            "x/y",
            at(12, 0),
            &["add feature", "Merge pull request #12 from x/y"],
            2,
        );
        assert!(is_merge_push(&ev));
        assert!(filter_merge_pushes(vec![ev]).is_empty());
    }

    #[test]
    fn merge_check_only_looks_at_last_commit() {
        let ev = push(
            "1",
            "x/y",
            at(12, 0),
            &["Merge pull request #12 from x/y", "followup fix"],
            2,
        );
        assert!(!is_merge_push(&ev));
    }

    #[test]
    fn zero_commit_push_is_kept() {
        let ev = push("1", "x/y", at(12, 0), &[], 0);
        assert!(!is_merge_push(&ev));
        assert_eq!(filter_merge_pushes(vec![ev]).len(), 1);
    }

    #[test]
    fn gap_of_a_day_or_more_splits_groups() {
        let newer = push("1", "x/y", at(12, 0), &["b"], 1);
        let older = push(
            "2",
            "x/y",
            Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap(),
            &["a"],
            1,
        );
        let items = aggregate_pushes(vec![older, newer]);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| matches!(i, TimelineItem::Event(_))));
    }

    #[test]
    fn gap_is_measured_from_group_head() {
        // 23h steps: each neighbor is within a day of the previous one,
        // but the third sits 46h from the head, so it starts a new group.
        let a = push("1", "x/y", Utc.with_ymd_and_hms(2024, 5, 10, 22, 0, 0).unwrap(), &["c"], 1);
        let b = push("2", "x/y", Utc.with_ymd_and_hms(2024, 5, 9, 23, 0, 0).unwrap(), &["b"], 1);
        let c = push("3", "x/y", Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap(), &["a"], 1);
        let items = aggregate_pushes(vec![a, b, c]);
        assert_eq!(items.len(), 2);
        let group = items
            .iter()
            .find_map(|i| match i {
                TimelineItem::PushGroup(g) => Some(g),
                TimelineItem::Event(_) => None,
            })
            .expect("two of the three should merge");
        assert_eq!(group.distinct_size, 2);
    }

    #[test]
    fn non_push_events_pass_through_without_closing_groups() {
        let newer = push("1", "x/y", at(12, 0), &["b"], 2);
        let watch = Event {
            id: "2".to_string(),
            actor: Actor {
                login: "octocat".to_string(),
            },
            repo: Repo {
                name: "x/y".to_string(),
            },
            created_at: at(11, 30),
            kind: EventKind::Watch {},
        };
        let older = push("3", "x/y", at(11, 0), &["a"], 3);

        let items = aggregate_pushes(vec![watch, older, newer]);
        assert_eq!(items.len(), 2);
        let group = items
            .iter()
            .find_map(|i| match i {
                TimelineItem::PushGroup(g) => Some(g),
                TimelineItem::Event(_) => None,
            })
            .expect("pushes around the watch should still merge");
        assert_eq!(group.distinct_size, 5);
        assert_eq!(group.begin, at(12, 0));
        assert_eq!(group.end, at(11, 0));
        assert_eq!(group.commits.len(), 2);
    }

    #[test]
    fn different_repos_never_merge() {
        let a = push("1", "x/y", at(12, 0), &["b"], 1);
        let b = push("2", "x/z", at(11, 0), &["a"], 1);
        let items = aggregate_pushes(vec![a, b]);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| matches!(i, TimelineItem::Event(_))));
    }
}
