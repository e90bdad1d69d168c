//! Normalises the two Micropub encodings (JSON and form-encoded) into one
//! shape: a list of types plus a map of property name to value sequence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MicropubPayload {
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub properties: BTreeMap<String, Vec<Value>>,
}

impl MicropubPayload {
    pub fn property(&self, name: &str) -> &[Value] {
        self.properties.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of a property when it is a string.
    pub fn first_str(&self, name: &str) -> Option<&str> {
        self.property(name).first().and_then(Value::as_str)
    }
}

/// Picks the decoder from the request's `Content-Type`.
pub fn parse_payload(content_type: Option<&str>, body: &[u8]) -> Result<MicropubPayload, AppError> {
    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match media_type.as_deref() {
        Some("application/json") => decode_json(body),
        Some("application/x-www-form-urlencoded") => Ok(decode_form(body)),
        Some(other) => Err(AppError::Unsupported(format!(
            "Content-Type '{other}' is not supported"
        ))),
        None => Err(AppError::Unsupported("Missing Content-Type".to_string())),
    }
}

#[derive(Deserialize)]
struct RawJsonPayload {
    #[serde(rename = "type", default)]
    types: Value,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Decodes `{"type": [...], "properties": {...}}`. Scalars, in either the
/// type or a property, become one-element sequences.
pub fn decode_json(body: &[u8]) -> Result<MicropubPayload, AppError> {
    let raw: RawJsonPayload = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON payload: {e}")))?;

    let types = into_sequence(raw.types)
        .into_iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect();
    let properties = raw
        .properties
        .into_iter()
        .map(|(name, value)| (name, into_sequence(value)))
        .collect();

    Ok(MicropubPayload { types, properties })
}

fn into_sequence(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}

/// Decodes `application/x-www-form-urlencoded` bodies.
///
/// `h=entry` sets the type to `h-entry`; `key[]` entries collect into one
/// ordered sequence under `key`; a bare key becomes a one-element sequence.
/// `access_token` is a credential, never a property.
pub fn decode_form(body: &[u8]) -> MicropubPayload {
    let mut payload = MicropubPayload::default();
    for (key, value) in url::form_urlencoded::parse(body) {
        match &*key {
            "h" => payload.types.push(format!("h-{value}")),
            "access_token" => {}
            key => {
                let name = key.strip_suffix("[]").unwrap_or(key);
                payload
                    .properties
                    .entry(name.to_string())
                    .or_default()
                    .push(Value::String(value.into_owned()));
            }
        }
    }
    payload
}

/// The `access_token` field of a form-encoded body, for clients that send
/// the credential there instead of in `Authorization`.
pub fn form_access_token(body: &[u8]) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

/// True for `application/x-www-form-urlencoded`, ignoring parameters.
pub fn is_form_encoded(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map_or(false, |ct| {
            ct.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}
