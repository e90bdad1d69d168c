//! The merged, newest-first view across content kinds.
//!
//! Each kind is read as its own keyset-paged stream and the streams are
//! combined with a k-way merge on
//! [`crate::models::content::TimelineKey`], so the combined view never
//! under-fetches no matter how prolific one kind is relative to the others.

use std::collections::VecDeque;

use tracing::debug;

use crate::errors::AppError;
use crate::models::{Content, Kind, Tag};
use crate::store::{ContentStore, PageCursor, TimelineFilter};

pub const DEFAULT_PAGE_SIZE: usize = 30;

struct KindStream {
    kind: Kind,
    buffer: VecDeque<Content>,
    cursor: Option<PageCursor>,
    exhausted: bool,
}

impl KindStream {
    fn new(kind: Kind) -> Self {
        KindStream {
            kind,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }
}

/// A lazy, restartable sequence of records ordered by `(created desc, kind,
/// id desc)`. Records are pulled from storage one page per kind at a time.
pub struct Timeline<'a> {
    store: &'a dyn ContentStore,
    filter: TimelineFilter,
    page_size: usize,
    streams: Vec<KindStream>,
}

impl<'a> Timeline<'a> {
    pub fn new(store: &'a dyn ContentStore, kinds: &[Kind], filter: TimelineFilter) -> Self {
        let mut kinds = kinds.to_vec();
        kinds.sort();
        kinds.dedup();
        Timeline {
            store,
            filter,
            page_size: DEFAULT_PAGE_SIZE,
            streams: kinds.into_iter().map(KindStream::new).collect(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Rewinds to the newest record. Nothing fetched so far is reused.
    pub fn restart(&mut self) {
        for stream in &mut self.streams {
            *stream = KindStream::new(stream.kind);
        }
    }

    pub async fn next(&mut self) -> Result<Option<Content>, AppError> {
        for stream in self.streams.iter_mut() {
            if stream.buffer.is_empty() && !stream.exhausted {
                let page = self
                    .store
                    .page(stream.kind, &self.filter, stream.cursor, self.page_size)
                    .await?;
                debug!("Fetched {} {} records", page.len(), stream.kind);
                stream.exhausted = page.len() < self.page_size;
                if let Some(last) = page.last() {
                    stream.cursor = Some(PageCursor::after(last));
                }
                stream.buffer.extend(page);
            }
        }

        let newest = self
            .streams
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.buffer.front().map(|c| (i, c.timeline_key())))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i);

        Ok(newest.and_then(|i| self.streams[i].buffer.pop_front()))
    }

    /// Pulls up to `n` more records.
    pub async fn take(&mut self, n: usize) -> Result<Vec<Content>, AppError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.next().await? {
                Some(content) => out.push(content),
                None => break,
            }
        }
        Ok(out)
    }
}

/// The `limit` newest records across every kind.
pub async fn latest_across_kinds(
    store: &dyn ContentStore,
    limit: usize,
) -> Result<Vec<Content>, AppError> {
    latest(store, &Kind::ALL, limit).await
}

/// The `limit` newest records of the given kinds.
pub async fn latest(
    store: &dyn ContentStore,
    kinds: &[Kind],
    limit: usize,
) -> Result<Vec<Content>, AppError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    Timeline::new(store, kinds, TimelineFilter::default())
        .with_page_size(limit)
        .take(limit)
        .await
}

/// Every record carrying `tag`, across all kinds, newest first.
pub fn by_tag(store: &dyn ContentStore, tag: Tag) -> Timeline<'_> {
    Timeline::new(store, &Kind::ALL, TimelineFilter::tagged(tag))
}
