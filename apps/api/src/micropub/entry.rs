use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use crate::errors::AppError;
use crate::micropub::MicropubPayload;
use crate::models::{Draft, Entry, Payload, Tag};

pub const SUPPORTED_TYPE: &str = "h-entry";
const MAX_SLUG_LEN: usize = 64;

/// Maps a decoded `h-entry` onto a new Entry draft.
///
/// `name` becomes the title, `mp-slug` the slug and `content` the body,
/// wrapped in a paragraph. Valid `category` values become tags. Any other
/// property is ignored.
pub fn construct_entry(
    payload: &MicropubPayload,
    created: DateTime<Utc>,
) -> Result<Draft, AppError> {
    match payload.types.first().map(String::as_str) {
        Some(SUPPORTED_TYPE) => {}
        Some(other) => {
            return Err(AppError::Unsupported(format!(
                "Micropub type '{other}' is not supported"
            )))
        }
        None => return Err(AppError::Unsupported("Micropub type is missing".to_string())),
    }

    let title = payload.first_str("name").unwrap_or_default().to_string();
    let body = payload
        .property("content")
        .first()
        .and_then(content_html)
        .ok_or_else(|| AppError::Validation("content is required".to_string()))?;

    let slug = match payload.first_str("mp-slug") {
        Some(slug) => slug.to_string(),
        None => derive_slug(payload),
    };
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Could not derive a slug; provide mp-slug or name".to_string(),
        ));
    }

    let tags = payload
        .property("category")
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|raw| match Tag::parse(raw) {
            Ok(tag) => Some(tag),
            Err(_) => {
                warn!("Skipping Micropub category '{raw}': not a valid tag");
                None
            }
        })
        .collect();

    Ok(Draft::new(created, slug, Payload::Entry(Entry { title, body })).with_tags(tags))
}

/// String content is wrapped in `<p>` as given; `{"html": ...}` content is
/// taken as-is.
fn content_html(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(format!("<p>{text}</p>")),
        Value::Object(map) => match (map.get("html"), map.get("value")) {
            (Some(Value::String(html)), _) => Some(html.clone()),
            (_, Some(Value::String(text))) => Some(format!("<p>{text}</p>")),
            _ => None,
        },
        _ => None,
    }
}

fn derive_slug(payload: &MicropubPayload) -> String {
    let source = payload
        .first_str("name")
        .filter(|name| !name.trim().is_empty())
        .or_else(|| payload.first_str("content"))
        .unwrap_or("");
    let mut slug = slug::slugify(source);
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}
