use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::blog::timeline::latest;
use crate::errors::AppError;
use crate::feeds::{render_feed, render_sitemap, FeedSource};
use crate::models::Kind;
use crate::state::AppState;

const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";

async fn serve_feed(state: &AppState, source: FeedSource) -> Result<Response, AppError> {
    let items = latest(state.store.as_ref(), source.kinds(), source.limit()).await?;
    debug!("Rendering {} feed with {} items", source.as_str(), items.len());
    let xml = render_feed(&state.config, source, &items)?;

    Ok((
        [
            (header::CONTENT_TYPE, ATOM_CONTENT_TYPE.to_string()),
            // Lets intermediary caches hold the feed for a short while.
            (
                header::CACHE_CONTROL,
                format!("s-maxage={}", state.config.feed_cache_seconds),
            ),
        ],
        xml,
    )
        .into_response())
}

/// GET /atom/entries/
pub async fn handle_entries_feed(State(state): State<AppState>) -> Result<Response, AppError> {
    serve_feed(&state, FeedSource::Entries).await
}

/// GET /atom/links/
pub async fn handle_blogmarks_feed(State(state): State<AppState>) -> Result<Response, AppError> {
    serve_feed(&state, FeedSource::Blogmarks).await
}

/// GET /atom/everything/
pub async fn handle_everything_feed(State(state): State<AppState>) -> Result<Response, AppError> {
    serve_feed(&state, FeedSource::Everything).await
}

/// GET /sitemap.xml
pub async fn handle_sitemap(State(state): State<AppState>) -> Result<Response, AppError> {
    let mut permalinks = Vec::new();
    for kind in Kind::ALL {
        permalinks.extend(state.store.permalinks(kind).await?);
    }
    let xml = render_sitemap(&state.config, &permalinks);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}
