use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::models::tag::Tag;

/// The closed set of content kinds. Declaration order is the tie-break
/// priority used when two records share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Entry,
    Blogmark,
    Quotation,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Entry, Kind::Blogmark, Kind::Quotation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Entry => "entry",
            Kind::Blogmark => "blogmark",
            Kind::Quotation => "quotation",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Kind::Entry),
            "blogmark" => Ok(Kind::Blogmark),
            "quotation" => Ok(Kind::Quotation),
            other => Err(AppError::Validation(format!("Unknown content kind '{other}'"))),
        }
    }
}

/// A `(kind, id)` pair identifying one content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub kind: Kind,
    pub id: i64,
}

/// Fields shared by every content kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMeta {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub slug: String,
    /// Sorted and deduplicated.
    pub tags: Vec<Tag>,
    pub metadata: Value,
    pub import_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub title: String,
    /// HTML.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blogmark {
    pub link_url: String,
    pub link_title: String,
    pub commentary: String,
    pub via_url: Option<String>,
    pub via_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quotation {
    pub quotation: String,
    pub source: String,
    pub source_url: Option<String>,
}

/// Kind-specific fields. The variant is the record's kind and never changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Entry(Entry),
    Blogmark(Blogmark),
    Quotation(Quotation),
}

impl Payload {
    pub fn kind(&self) -> Kind {
        match self {
            Payload::Entry(_) => Kind::Entry,
            Payload::Blogmark(_) => Kind::Blogmark,
            Payload::Quotation(_) => Kind::Quotation,
        }
    }
}

/// One stored Entry, Blogmark or Quotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    #[serde(flatten)]
    pub meta: ContentMeta,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Content {
    pub fn kind(&self) -> Kind {
        self.payload.kind()
    }

    pub fn id(&self) -> i64 {
        self.meta.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.meta.created
    }

    pub fn tags(&self) -> &[Tag] {
        &self.meta.tags
    }

    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            kind: self.kind(),
            id: self.meta.id,
        }
    }

    pub fn timeline_key(&self) -> TimelineKey {
        TimelineKey {
            created: self.meta.created,
            kind: self.kind(),
            id: self.meta.id,
        }
    }

    /// Site-relative permalink, e.g. `/2024/Jan/5/hello-world/`.
    pub fn canonical_path(&self) -> String {
        canonical_path(self.meta.created, &self.meta.slug)
    }

    /// Human-facing title used by listings and the combined feed.
    pub fn display_title(&self) -> String {
        match &self.payload {
            Payload::Entry(entry) => entry.title.clone(),
            Payload::Blogmark(blogmark) => blogmark.link_title.clone(),
            Payload::Quotation(quotation) => format!("Quoting {}", quotation.source),
        }
    }
}

pub fn canonical_path(created: DateTime<Utc>, slug: &str) -> String {
    format!("/{}/{}/", created.format("%Y/%b/%-d"), slug)
}

/// Position of a record on the merged timeline.
///
/// Ordering is ascending by `created`, then descending by kind priority, then
/// ascending by id, so sorting keys in *descending* order yields the timeline:
/// newest first, entries before blogmarks before quotations on equal
/// timestamps, higher ids first within a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineKey {
    pub created: DateTime<Utc>,
    pub kind: Kind,
    pub id: i64,
}

impl Ord for TimelineKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.created
            .cmp(&other.created)
            .then_with(|| other.kind.cmp(&self.kind))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for TimelineKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub created: DateTime<Utc>,
    pub slug: String,
    pub tags: Vec<Tag>,
    pub metadata: Value,
    pub import_ref: Option<String>,
    pub payload: Payload,
}

impl Draft {
    pub fn new(created: DateTime<Utc>, slug: impl Into<String>, payload: Payload) -> Self {
        Draft {
            created,
            slug: slug.into(),
            tags: Vec::new(),
            metadata: Value::Object(Default::default()),
            import_ref: None,
            payload,
        }
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_import_ref(mut self, import_ref: impl Into<String>) -> Self {
        self.import_ref = Some(import_ref.into());
        self
    }

    /// Assigns the storage id, normalising tags to a sorted set.
    pub fn into_content(self, id: i64) -> Content {
        let mut tags = self.tags;
        tags.sort();
        tags.dedup();
        Content {
            meta: ContentMeta {
                id,
                created: self.created,
                slug: self.slug,
                tags,
                metadata: self.metadata,
                import_ref: self.import_ref,
            },
            payload: self.payload,
        }
    }
}
