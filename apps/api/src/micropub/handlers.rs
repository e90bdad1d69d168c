use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::micropub::auth::bearer_token;
use crate::micropub::decode::{form_access_token, is_form_encoded};
use crate::micropub::{construct_entry, parse_payload};
use crate::state::AppState;

/// GET /micropub
/// Configuration query; nothing beyond the defaults is advertised.
pub async fn handle_micropub_get() -> Json<Value> {
    Json(json!({}))
}

/// POST /micropub
/// Creates an Entry and answers 201 with its permalink in `Location`.
pub async fn handle_micropub_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    // The header wins; form posts may carry the token in the body instead.
    let token = match bearer_token(&headers) {
        Ok(token) => token.to_string(),
        Err(AppError::Unauthorized) if is_form_encoded(content_type) => {
            form_access_token(&body).ok_or(AppError::Unauthorized)?
        }
        Err(e) => return Err(e),
    };
    let identity = state.token_verifier.verify(&token).await?;
    debug!("Micropub request authorised for {}", identity.me);

    let payload = parse_payload(content_type, &body)?;
    let draft = construct_entry(&payload, Utc::now())?;

    let created = state.store.insert(draft).await?;
    let location = state.config.absolute_url(&created.canonical_path());
    info!("Micropub created entry {} at {location}", created.id());

    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}
