// src/pipeline.rs
use crate::aggregate;
use crate::store::EventStore;
use crate::summary::{Summary, SummaryBuilder};

/// Read every tracked account's cache, aggregate per account, and render
/// one ordered summary list. A failing account is logged and skipped;
/// the others still make it onto the page.
pub fn collect_summaries(
    store: &dyn EventStore,
    builder: &SummaryBuilder,
    accounts: &[String],
) -> Vec<Summary> {
    let mut items = Vec::new();
    for account in accounts {
        let events = match store.list_events(account) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, account = %account, "reading cached events failed");
                continue;
            }
        };
        items.extend(aggregate::build_timeline(events));
    }
    builder.build(items)
}
