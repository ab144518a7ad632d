use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::accounts;
use crate::pipeline;
use crate::poll::Poller;
use crate::store::EventStore;
use crate::summary::{Summary, SummaryBuilder};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EventStore>,
    pub poller: Arc<Poller>,
    pub builder: Arc<SummaryBuilder>,
    pub accounts_file: PathBuf,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/feed", get(feed_json))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, String)> {
    let summaries = refresh_and_collect(&state).await.map_err(internal_error)?;
    Ok(Html(render_page(&summaries)))
}

async fn feed_json(
    State(state): State<AppState>,
) -> Result<Json<Vec<Summary>>, (StatusCode, String)> {
    let summaries = refresh_and_collect(&state).await.map_err(internal_error)?;
    Ok(Json(summaries))
}

/// Poll every tracked account (each isolated; failures only warn), then
/// rebuild the summary list from the caches.
async fn refresh_and_collect(state: &AppState) -> anyhow::Result<Vec<Summary>> {
    let accounts = accounts::read_accounts(&state.accounts_file)?;
    state.poller.poll_all(&accounts).await;
    Ok(pipeline::collect_summaries(
        state.store.as_ref(),
        &state.builder,
        &accounts,
    ))
}

fn internal_error(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!(error = ?e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

fn render_page(summaries: &[Summary]) -> String {
    let mut rows = String::new();
    for s in summaries {
        rows.push_str(&format!(
            "      <li class=\"event\"><span class=\"octicon octicon-{}\"></span> {} \
             <span class=\"timeago\">{}</span></li>\n",
            s.icon, s.body, s.timeago
        ));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>activity</title>\n\
         <link rel=\"stylesheet\" href=\"https://cdnjs.cloudflare.com/ajax/libs/octicons/4.4.0/font/octicons.min.css\">\n\
         <style>\n\
         body {{ font-family: sans-serif; max-width: 46em; margin: 2em auto; color: #333; }}\n\
         li.event {{ list-style: none; padding: 0.3em 0; }}\n\
         .timeago {{ color: #999; font-size: 85%; }}\n\
         a {{ color: #4078c0; text-decoration: none; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         <ul>\n{rows}    </ul>\n\
         </body>\n\
         </html>\n"
    )
}
