//! Reassembles typed records from a heterogeneous list of `(kind, id)`
//! references, e.g. the ranked ids coming back from a search query.
//!
//! Fetches are batched: one `fetch_by_ids` per kind present in the input,
//! never one per reference.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Content, ContentRef, Kind};
use crate::store::{ContentStore, SearchHit};

/// Anything that points at a content record.
pub trait Referent {
    fn content_ref(&self) -> ContentRef;
}

impl Referent for ContentRef {
    fn content_ref(&self) -> ContentRef {
        *self
    }
}

impl Referent for SearchHit {
    fn content_ref(&self) -> ContentRef {
        SearchHit::content_ref(self)
    }
}

/// A fetched record paired with the reference that asked for it, so callers
/// keep whatever context (rank, snippet) travelled with the id.
#[derive(Debug, Clone, Serialize)]
pub struct Loaded<R> {
    pub record: Content,
    pub origin: R,
}

/// Loads every referenced record, preserving input order and length.
///
/// A reference whose record no longer exists (deleted after the ids were
/// selected) yields `None` in its slot. That is an expected race, not an
/// error.
pub async fn load_mixed<R: Referent>(
    store: &dyn ContentStore,
    refs: Vec<R>,
) -> Result<Vec<Option<Loaded<R>>>, AppError> {
    let mut to_fetch: BTreeMap<Kind, BTreeSet<i64>> = BTreeMap::new();
    for r in &refs {
        let content_ref = r.content_ref();
        to_fetch
            .entry(content_ref.kind)
            .or_default()
            .insert(content_ref.id);
    }

    let mut fetched: HashMap<ContentRef, Content> = HashMap::new();
    for (kind, ids) in to_fetch {
        let ids: Vec<i64> = ids.into_iter().collect();
        let records = store.fetch_by_ids(kind, &ids).await?;
        debug!("Loaded {}/{} {kind} records", records.len(), ids.len());
        for record in records {
            fetched.insert(record.content_ref(), record);
        }
    }

    Ok(refs
        .into_iter()
        .map(|origin| {
            fetched
                .get(&origin.content_ref())
                .cloned()
                .map(|record| Loaded { record, origin })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Blogmark, Draft, Entry, Payload, Quotation};
    use crate::store::MemoryContentStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded() -> (MemoryContentStore, Vec<ContentRef>) {
        let store = MemoryContentStore::new();
        let t = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let e = store
            .insert(Draft::new(
                t,
                "e",
                Payload::Entry(Entry {
                    title: "E".into(),
                    body: "b".into(),
                }),
            ))
            .await
            .unwrap();
        let b = store
            .insert(Draft::new(
                t,
                "b",
                Payload::Blogmark(Blogmark {
                    link_url: "https://example.com/".into(),
                    link_title: "B".into(),
                    commentary: "c".into(),
                    via_url: None,
                    via_title: None,
                }),
            ))
            .await
            .unwrap();
        let q = store
            .insert(Draft::new(
                t,
                "q",
                Payload::Quotation(Quotation {
                    quotation: "Q".into(),
                    source: "s".into(),
                    source_url: None,
                }),
            ))
            .await
            .unwrap();
        (store, vec![e.content_ref(), b.content_ref(), q.content_ref()])
    }

    #[tokio::test]
    async fn test_preserves_order_and_length() {
        let (store, refs) = seeded().await;
        let input = vec![refs[2], refs[0], refs[1], refs[0]];
        let loaded = load_mixed(&store, input.clone()).await.unwrap();
        assert_eq!(loaded.len(), 4);
        for (slot, expected) in loaded.iter().zip(&input) {
            let slot = slot.as_ref().unwrap();
            assert_eq!(slot.record.content_ref(), *expected);
            assert_eq!(slot.origin, *expected);
        }
    }

    #[tokio::test]
    async fn test_deleted_record_becomes_empty_slot() {
        let (store, refs) = seeded().await;
        assert!(store.remove(refs[1].kind, refs[1].id).await);

        let loaded = load_mixed(&store, refs.clone()).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded[0].is_some());
        assert!(loaded[1].is_none());
        assert!(loaded[2].is_some());
    }

    #[tokio::test]
    async fn test_same_id_different_kind_is_distinct() {
        let (store, refs) = seeded().await;
        // Ids are global in the memory store, so an entry id never names a quotation.
        let bogus = ContentRef {
            kind: Kind::Quotation,
            id: refs[0].id,
        };
        let loaded = load_mixed(&store, vec![bogus]).await.unwrap();
        assert!(loaded[0].is_none());
    }

    #[tokio::test]
    async fn test_origin_context_is_carried() {
        let (store, refs) = seeded().await;
        let hit = SearchHit {
            kind: refs[1].kind,
            id: refs[1].id,
            rank: 0.75,
            created: Utc::now(),
        };
        let loaded = load_mixed(&store, vec![hit]).await.unwrap();
        let slot = loaded[0].as_ref().unwrap();
        assert_eq!(slot.origin.rank, 0.75);
        assert_eq!(slot.record.display_title(), "B");
    }

    struct CountingStore {
        inner: MemoryContentStore,
        batch_calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentStore for CountingStore {
        async fn page(
            &self,
            kind: Kind,
            filter: &crate::store::TimelineFilter,
            after: Option<crate::store::PageCursor>,
            limit: usize,
        ) -> Result<Vec<Content>, AppError> {
            self.inner.page(kind, filter, after, limit).await
        }

        async fn fetch_by_ids(&self, kind: Kind, ids: &[i64]) -> Result<Vec<Content>, AppError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_by_ids(kind, ids).await
        }

        async fn count_tagged(&self, kind: Kind, tag: &crate::models::Tag) -> Result<u64, AppError> {
            self.inner.count_tagged(kind, tag).await
        }

        async fn tag_sets(
            &self,
            kind: Kind,
            tag: &crate::models::Tag,
        ) -> Result<Vec<Vec<crate::models::Tag>>, AppError> {
            self.inner.tag_sets(kind, tag).await
        }

        async fn permalinks(&self, kind: Kind) -> Result<Vec<crate::store::Permalink>, AppError> {
            self.inner.permalinks(kind).await
        }

        async fn search(
            &self,
            query: &crate::store::SearchQuery,
        ) -> Result<Vec<SearchHit>, AppError> {
            self.inner.search(query).await
        }

        async fn insert(&self, draft: Draft) -> Result<Content, AppError> {
            self.inner.insert(draft).await
        }
    }

    #[tokio::test]
    async fn test_one_batch_per_kind() {
        let (inner, refs) = seeded().await;
        let store = CountingStore {
            inner,
            batch_calls: AtomicUsize::new(0),
        };
        let input: Vec<ContentRef> = refs.iter().cycle().take(9).copied().collect();
        let loaded = load_mixed(&store, input).await.unwrap();
        assert_eq!(loaded.len(), 9);
        assert_eq!(store.batch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (store, _) = seeded().await;
        let loaded = load_mixed::<ContentRef>(&store, vec![]).await.unwrap();
        assert!(loaded.is_empty());
    }
}
