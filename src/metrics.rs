// src/metrics.rs
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and hand back the `/metrics` route in
/// exposition format. Call once at startup, before the first poll
/// increments anything.
pub fn install(tracked_accounts: usize) -> Router {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder");

    gauge!("dashboard_tracked_accounts").set(tracked_accounts as f64);

    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
