use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Content, Draft, Kind, Tag};
use crate::store::{ContentStore, PageCursor, Permalink, SearchHit, SearchQuery, TimelineFilter};

/// Relative bucket weights, matching Postgres' default `ts_rank` weights.
const WEIGHT_A: f32 = 1.0;
const WEIGHT_B: f32 = 0.4;
const WEIGHT_C: f32 = 0.2;

/// A process-local content store. Used when no database is configured and
/// by the test suite.
#[derive(Default)]
pub struct MemoryContentStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: Vec<Content>,
}

impl Inner {
    /// Records of `kind` in `(created desc, id desc)` order.
    fn ordered(&self, kind: Kind) -> Vec<&Content> {
        let mut records: Vec<&Content> =
            self.records.iter().filter(|c| c.kind() == kind).collect();
        records.sort_by(|a, b| (b.created(), b.id()).cmp(&(a.created(), a.id())));
        records
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes a record, as an administrator would between a query and a
    /// follow-up fetch.
    #[cfg(test)]
    pub async fn remove(&self, kind: Kind, id: i64) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|c| !(c.kind() == kind && c.id() == id));
        inner.records.len() != before
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn page(
        &self,
        kind: Kind,
        filter: &TimelineFilter,
        after: Option<PageCursor>,
        limit: usize,
    ) -> Result<Vec<Content>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered(kind)
            .into_iter()
            .filter(|c| filter.matches(c))
            .filter(|c| after.map_or(true, |cursor| cursor.admits(c.created(), c.id())))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_by_ids(&self, kind: Kind, ids: &[i64]) -> Result<Vec<Content>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|c| c.kind() == kind && ids.contains(&c.id()))
            .cloned()
            .collect())
    }

    async fn count_tagged(&self, kind: Kind, tag: &Tag) -> Result<u64, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|c| c.kind() == kind && c.tags().contains(tag))
            .count() as u64)
    }

    async fn tag_sets(&self, kind: Kind, tag: &Tag) -> Result<Vec<Vec<Tag>>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered(kind)
            .into_iter()
            .filter(|c| c.tags().contains(tag))
            .map(|c| c.tags().to_vec())
            .collect())
    }

    async fn permalinks(&self, kind: Kind) -> Result<Vec<Permalink>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered(kind)
            .into_iter()
            .map(|c| Permalink {
                created: c.created(),
                slug: c.meta.slug.clone(),
            })
            .collect())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, AppError> {
        let terms: Vec<String> = query
            .text
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let inner = self.inner.read().await;
        let mut hits: Vec<(SearchHit, &Content)> = inner
            .records
            .iter()
            .filter(|c| query.tags.iter().all(|t| c.tags().contains(t)))
            .filter_map(|c| {
                let components = c.index_components();
                let buckets = [
                    (components.a.to_lowercase(), WEIGHT_A),
                    (components.b.to_lowercase(), WEIGHT_B),
                    (components.c.to_lowercase(), WEIGHT_C),
                ];
                let mut rank = 0.0_f32;
                for term in &terms {
                    let weight: f32 = buckets
                        .iter()
                        .filter(|(text, _)| text.contains(term.as_str()))
                        .map(|(_, w)| *w)
                        .sum();
                    if weight == 0.0 {
                        return None;
                    }
                    rank += weight;
                }
                Some((
                    SearchHit {
                        kind: c.kind(),
                        id: c.id(),
                        rank,
                        created: c.created(),
                    },
                    c,
                ))
            })
            .collect();

        hits.sort_by(|(a, ca), (b, cb)| {
            b.rank
                .total_cmp(&a.rank)
                .then_with(|| cb.timeline_key().cmp(&ca.timeline_key()))
        });
        debug!("Memory search matched {} records", hits.len());
        Ok(hits
            .into_iter()
            .take(query.limit)
            .map(|(hit, _)| hit)
            .collect())
    }

    async fn insert(&self, draft: Draft) -> Result<Content, AppError> {
        let mut inner = self.inner.write().await;

        if let Some(import_ref) = &draft.import_ref {
            if inner
                .records
                .iter()
                .any(|c| c.meta.import_ref.as_deref() == Some(import_ref.as_str()))
            {
                return Err(AppError::Conflict(format!(
                    "import_ref '{import_ref}' already exists"
                )));
            }
        }

        let kind = draft.payload.kind();
        let day = draft.created.date_naive();
        if inner.records.iter().any(|c| {
            c.kind() == kind && c.meta.slug == draft.slug && c.created().date_naive() == day
        }) {
            return Err(AppError::Conflict(format!(
                "slug '{}' is already used on {day}",
                draft.slug
            )));
        }

        inner.next_id += 1;
        let content = draft.into_content(inner.next_id);
        inner.records.push(content.clone());
        Ok(content)
    }
}
