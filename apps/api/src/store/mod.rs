//! The storage seam. Everything above this module talks to content through
//! [`ContentStore`]; `AppState` carries an `Arc<dyn ContentStore>` picked at
//! startup (Postgres when `DATABASE_URL` is set, in-memory otherwise).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{canonical_path, Content, ContentRef, Draft, Kind, Tag};

pub use memory::MemoryContentStore;
pub use postgres::PgContentStore;

/// Restricts which records of a kind are visible to a timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineFilter {
    pub tag: Option<Tag>,
    /// Inclusive lower bound on `created`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created`.
    pub until: Option<DateTime<Utc>>,
}

impl TimelineFilter {
    pub fn tagged(tag: Tag) -> Self {
        TimelineFilter {
            tag: Some(tag),
            ..Default::default()
        }
    }

    pub fn matches(&self, content: &Content) -> bool {
        let created = content.created();
        self.tag.as_ref().map_or(true, |t| content.tags().contains(t))
            && self.since.map_or(true, |since| created >= since)
            && self.until.map_or(true, |until| created < until)
    }
}

/// Keyset position within one kind: pages return records strictly after
/// this one in `(created desc, id desc)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created: DateTime<Utc>,
    pub id: i64,
}

impl PageCursor {
    pub fn after(content: &Content) -> Self {
        PageCursor {
            created: content.created(),
            id: content.id(),
        }
    }

    /// True when `(created, id)` sorts after the cursor in descending order.
    pub fn admits(&self, created: DateTime<Utc>, id: i64) -> bool {
        (created, id) < (self.created, self.id)
    }
}

/// The minimum needed to build a record's permalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    pub created: DateTime<Utc>,
    pub slug: String,
}

impl Permalink {
    pub fn path(&self) -> String {
        canonical_path(self.created, &self.slug)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Free text; `None` lists everything carrying `tags`.
    pub text: Option<String>,
    /// Every listed tag must be present on a hit.
    pub tags: Vec<Tag>,
    pub limit: usize,
}

/// One ranked search result, before the record itself is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub kind: Kind,
    pub id: i64,
    pub rank: f32,
    pub created: DateTime<Utc>,
}

impl SearchHit {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// Durable content storage. Every method is a single round trip (or a single
/// transaction for `insert`); cross-request consistency is left to the
/// backend.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Up to `limit` records of `kind` matching `filter`, newest first
    /// (`created desc, id desc`), strictly after `after` when given.
    async fn page(
        &self,
        kind: Kind,
        filter: &TimelineFilter,
        after: Option<PageCursor>,
        limit: usize,
    ) -> Result<Vec<Content>, AppError>;

    /// Batch lookup. Missing ids are silently absent; order is unspecified.
    async fn fetch_by_ids(&self, kind: Kind, ids: &[i64]) -> Result<Vec<Content>, AppError>;

    async fn count_tagged(&self, kind: Kind, tag: &Tag) -> Result<u64, AppError>;

    /// The full tag set of each record of `kind` carrying `tag`, in timeline
    /// order, each set sorted alphabetically.
    async fn tag_sets(&self, kind: Kind, tag: &Tag) -> Result<Vec<Vec<Tag>>, AppError>;

    async fn permalinks(&self, kind: Kind) -> Result<Vec<Permalink>, AppError>;

    /// Ranked hits across all kinds, best first.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, AppError>;

    /// Persists the record, its tag links and its search document atomically.
    async fn insert(&self, draft: Draft) -> Result<Content, AppError>;
}
