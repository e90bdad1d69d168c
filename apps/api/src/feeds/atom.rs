//! Atom rendering for the three syndication feeds.

use atom_syndication::{Category, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, Utc};

use crate::config::Config;
use crate::errors::AppError;
use crate::html::{escape_href, escape_html, strip_tags};
use crate::models::{Blogmark, Content, Entry, Kind, Payload, Quotation};

/// Which slice of the timeline a feed publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Entries,
    Blogmarks,
    Everything,
}

impl FeedSource {
    /// Used in the feed URL and in each item's `#atom-<source>` fragment.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSource::Entries => "entries",
            FeedSource::Blogmarks => "blogmarks",
            FeedSource::Everything => "everything",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            FeedSource::Entries => "/atom/entries/",
            FeedSource::Blogmarks => "/atom/links/",
            FeedSource::Everything => "/atom/everything/",
        }
    }

    pub fn kinds(&self) -> &'static [Kind] {
        match self {
            FeedSource::Entries => &[Kind::Entry],
            FeedSource::Blogmarks => &[Kind::Blogmark],
            FeedSource::Everything => &Kind::ALL,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            FeedSource::Entries | FeedSource::Blogmarks => 15,
            FeedSource::Everything => 30,
        }
    }

    fn title(&self, config: &Config) -> String {
        match self {
            FeedSource::Entries => format!("{}: Writing", config.site_title),
            FeedSource::Blogmarks => format!("{}: Blogmarks", config.site_title),
            FeedSource::Everything => config.site_title.clone(),
        }
    }
}

/// Renders `items` (already newest first) as an Atom document.
pub fn render_feed(
    config: &Config,
    source: FeedSource,
    items: &[Content],
) -> Result<String, AppError> {
    let updated: DateTime<FixedOffset> = items
        .first()
        .map(Content::created)
        .unwrap_or_else(Utc::now)
        .into();

    let feed = Feed {
        title: Text::plain(source.title(config)),
        id: config.absolute_url(source.path()),
        updated,
        authors: vec![author(config)],
        links: vec![
            Link {
                href: config.absolute_url("/"),
                rel: "alternate".to_string(),
                ..Default::default()
            },
            Link {
                href: config.absolute_url(source.path()),
                rel: "self".to_string(),
                ..Default::default()
            },
        ],
        entries: items
            .iter()
            .map(|item| feed_entry(config, source, item))
            .collect(),
        ..Default::default()
    };

    let bytes = feed
        .write_to(Vec::new())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Atom serialisation failed: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Atom output was not UTF-8: {e}")))
}

fn author(config: &Config) -> Person {
    Person {
        name: config.author_name.clone(),
        ..Default::default()
    }
}

fn feed_entry(config: &Config, source: FeedSource, item: &Content) -> atom_syndication::Entry {
    let link = format!(
        "{}#atom-{}",
        config.absolute_url(&item.canonical_path()),
        source.as_str()
    );
    let created: DateTime<FixedOffset> = item.created().into();

    atom_syndication::Entry {
        title: Text::plain(item.display_title()),
        id: link.clone(),
        updated: created,
        published: Some(created),
        authors: vec![author(config)],
        links: vec![Link {
            href: link,
            rel: "alternate".to_string(),
            ..Default::default()
        }],
        categories: item
            .tags()
            .iter()
            .map(|t| Category {
                term: t.to_string(),
                ..Default::default()
            })
            .collect(),
        summary: Some(Text::html(description(source, item))),
        ..Default::default()
    }
}

/// Words of an entry's text kept in its combined-feed summary.
const ENTRY_SUMMARY_WORDS: usize = 50;

/// The entries feed publishes each entry's raw body. Everywhere else a
/// record gets a short HTML summary.
pub fn description(source: FeedSource, item: &Content) -> String {
    match &item.payload {
        Payload::Entry(entry) if source == FeedSource::Entries => entry.body.clone(),
        Payload::Entry(entry) => entry_summary(entry),
        Payload::Blogmark(blogmark) => blogmark_summary(blogmark),
        Payload::Quotation(quotation) => quotation_summary(quotation),
    }
}

fn entry_summary(entry: &Entry) -> String {
    let text = strip_tags(&entry.body);
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut summary = words
        .iter()
        .take(ENTRY_SUMMARY_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > ENTRY_SUMMARY_WORDS {
        summary.push_str(" \u{2026}");
    }
    format!("<p>{}</p>", escape_html(&summary))
}

fn blogmark_summary(blogmark: &Blogmark) -> String {
    let mut html = format!(
        "<p><strong><a href=\"{}\">{}</a></strong>",
        escape_href(&blogmark.link_url),
        escape_html(&blogmark.link_title)
    );
    if let Some(via_url) = &blogmark.via_url {
        html.push_str(&format!(
            " (<a href=\"{}\">via</a>)",
            escape_href(via_url)
        ));
    }
    html.push_str("</p>");
    if !blogmark.commentary.is_empty() {
        html.push_str(&format!("<p>{}</p>", escape_html(&blogmark.commentary)));
    }
    html
}

fn quotation_summary(quotation: &Quotation) -> String {
    let source = match &quotation.source_url {
        Some(url) => format!(
            "<a href=\"{}\">{}</a>",
            escape_href(url),
            escape_html(&quotation.source)
        ),
        None => escape_html(&quotation.source),
    };
    format!(
        "<blockquote><p>{}</p></blockquote><p>&mdash; {}</p>",
        escape_html(&quotation.quotation),
        source
    )
}
