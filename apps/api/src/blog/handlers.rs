use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blog::loader::load_mixed;
use crate::blog::tags::{TagCount, TagRegistry, DEFAULT_RELATED_LIMIT};
use crate::blog::timeline::{by_tag, DEFAULT_PAGE_SIZE};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Content, Kind, Tag};
use crate::state::AppState;
use crate::store::{SearchHit, SearchQuery};

const MAX_LIMIT: usize = 200;
const DEFAULT_SEARCH_LIMIT: usize = 20;

/// A record as listed on tag pages and search results.
#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub kind: Kind,
    pub id: i64,
    pub title: String,
    pub url: String,
    pub created: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

impl ItemSummary {
    pub fn new(content: &Content, config: &Config) -> Self {
        ItemSummary {
            kind: content.kind(),
            id: content.id(),
            title: content.display_title(),
            url: config.absolute_url(&content.canonical_path()),
            created: content.created(),
            tags: content.tags().to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TagPageResponse {
    pub tag: Tag,
    pub counts: TagCount,
    pub related: Vec<Tag>,
    pub items: Vec<ItemSummary>,
}

/// GET /tags/:tag
pub async fn handle_tag_page(
    State(state): State<AppState>,
    Path(raw_tag): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<TagPageResponse>, AppError> {
    let tag = Tag::parse(&raw_tag).map_err(|_| AppError::NotFound(format!("Tag {raw_tag}")))?;
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_LIMIT);
    let store = state.store.as_ref();

    let mut registry = TagRegistry::new(store);
    let counts = registry.tag_count(&tag).await?;
    if counts.total == 0 {
        return Err(AppError::NotFound(format!("Tag {tag}")));
    }
    let related = registry.related_tags(&tag, DEFAULT_RELATED_LIMIT).await?;

    let items = by_tag(store, tag.clone())
        .with_page_size(limit)
        .take(limit)
        .await?
        .iter()
        .map(|c| ItemSummary::new(c, &state.config))
        .collect();

    Ok(Json(TagPageResponse {
        tag,
        counts,
        related,
        items,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    /// Comma-separated; every tag must be present.
    pub tags: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub hit: SearchHit,
    pub item: ItemSummary,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: Option<String>,
    pub tags: Vec<Tag>,
    pub results: Vec<SearchResult>,
}

/// GET /search
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let text = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let tags = params
        .tags
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Tag::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if text.is_none() && tags.is_empty() {
        return Err(AppError::Validation(
            "Provide a query (q) and/or tags".to_string(),
        ));
    }

    let query = SearchQuery {
        text: text.clone(),
        tags: tags.clone(),
        limit: params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).min(MAX_LIMIT),
    };
    let store = state.store.as_ref();
    let hits = store.search(&query).await?;

    // Records deleted since the search ran are dropped from the listing.
    let results = load_mixed(store, hits)
        .await?
        .into_iter()
        .flatten()
        .map(|loaded| SearchResult {
            item: ItemSummary::new(&loaded.record, &state.config),
            hit: loaded.origin,
        })
        .collect();

    Ok(Json(SearchResponse {
        query: text,
        tags,
        results,
    }))
}
