//! Per-tag statistics: how many records of each kind carry a tag, and which
//! other tags most often appear alongside it.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::models::{Kind, Tag};
use crate::store::ContentStore;

pub const DEFAULT_RELATED_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub entries: u64,
    pub links: u64,
    pub quotes: u64,
    pub total: u64,
}

/// Read-only tag statistics over a [`ContentStore`].
///
/// Related-tag rankings are memoised for the registry's lifetime, which is
/// one request: tag associations change as content is authored.
pub struct TagRegistry<'a> {
    store: &'a dyn ContentStore,
    related: HashMap<Tag, Vec<Tag>>,
}

impl<'a> TagRegistry<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        TagRegistry {
            store,
            related: HashMap::new(),
        }
    }

    pub async fn tag_count(&self, tag: &Tag) -> Result<TagCount, AppError> {
        let entries = self.store.count_tagged(Kind::Entry, tag).await?;
        let links = self.store.count_tagged(Kind::Blogmark, tag).await?;
        let quotes = self.store.count_tagged(Kind::Quotation, tag).await?;
        Ok(TagCount {
            entries,
            links,
            quotes,
            total: entries + links + quotes,
        })
    }

    /// The `limit` tags that most often co-occur with `tag`, most frequent
    /// first. Equal counts keep the order in which the tags were first seen
    /// while tallying entries, then blogmarks, then quotations.
    pub async fn related_tags(&mut self, tag: &Tag, limit: usize) -> Result<Vec<Tag>, AppError> {
        if !self.related.contains_key(tag) {
            let ranking = self.rank_related(tag).await?;
            self.related.insert(tag.clone(), ranking);
        } else {
            debug!("Related tags for '{tag}' served from request cache");
        }
        Ok(self.related[tag].iter().take(limit).cloned().collect())
    }

    async fn rank_related(&self, tag: &Tag) -> Result<Vec<Tag>, AppError> {
        let mut tally: Vec<(Tag, u64)> = Vec::new();
        let mut position: HashMap<Tag, usize> = HashMap::new();

        for kind in Kind::ALL {
            for tag_set in self.store.tag_sets(kind, tag).await? {
                for other in tag_set.into_iter().filter(|t| t != tag) {
                    match position.get(&other) {
                        Some(&i) => tally[i].1 += 1,
                        None => {
                            position.insert(other.clone(), tally.len());
                            tally.push((other, 1));
                        }
                    }
                }
            }
        }

        // Stable: ties stay in first-seen order.
        tally.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(tally.into_iter().map(|(t, _)| t).collect())
    }
}
