use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A validated tag: non-empty, lowercase ASCII letters and digits only.
///
/// Construction goes through [`Tag::parse`], so every `Tag` in the system
/// already satisfies the format and downstream code never re-checks it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if is_valid_tag(raw) {
            Ok(Tag(raw.to_string()))
        } else {
            Err(AppError::Validation(format!(
                "Tag '{raw}' must match ^[a-z0-9]+$"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_tag(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Tag, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Tag::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Joins tags with single spaces, in the order given.
pub fn join_tags(tags: &[Tag]) -> String {
    tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags() {
        for raw in ["python", "web20", "2024", "a"] {
            assert!(Tag::parse(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn test_invalid_tags() {
        for raw in ["", "Python", "open-source", "two words", "café", "a_b"] {
            assert!(Tag::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_deserialize_rejects_bad_format() {
        let ok: Result<Vec<Tag>, _> = serde_json::from_str(r#"["rust","web"]"#);
        assert_eq!(ok.unwrap().len(), 2);
        let bad: Result<Vec<Tag>, _> = serde_json::from_str(r#"["Rust"]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_join_tags() {
        let tags = vec![Tag::parse("a").unwrap(), Tag::parse("b").unwrap()];
        assert_eq!(join_tags(&tags), "a b");
        assert_eq!(join_tags(&[]), "");
    }
}
