//! Weighted search-index text for content records.
//!
//! Bucket A carries the primary text, B the tags and C the secondary text.
//! Tokenisation and weighting belong to the full-text index; this module only
//! guarantees the same record always yields the same three strings.

use serde::Serialize;

use crate::html::strip_tags;
use crate::models::{join_tags, Content, Payload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexComponents {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
}

impl Content {
    pub fn index_components(&self) -> IndexComponents {
        let b = join_tags(self.tags());
        match &self.payload {
            Payload::Entry(entry) => IndexComponents {
                a: entry.title.clone(),
                b,
                c: strip_tags(&entry.body),
            },
            Payload::Blogmark(blogmark) => IndexComponents {
                a: blogmark.link_title.clone(),
                b,
                c: [
                    blogmark.commentary.as_str(),
                    link_domain(&blogmark.link_url).as_str(),
                    blogmark.via_title.as_deref().unwrap_or(""),
                ]
                .join(" "),
            },
            Payload::Quotation(quotation) => IndexComponents {
                a: quotation.quotation.clone(),
                b,
                c: quotation.source.clone(),
            },
        }
    }
}

/// Host component of a URL, or an empty string when it has none.
pub fn link_domain(link_url: &str) -> String {
    url::Url::parse(link_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}
