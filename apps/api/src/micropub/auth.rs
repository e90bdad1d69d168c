//! Micropub bearer-token verification against an IndieAuth token endpoint.
//!
//! The handler depends only on [`TokenVerifier`]; the IndieAuth client is the
//! production implementation and tests substitute a stub.
use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::AppError;

/// The identity an accepted token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub me: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub scope: String,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Forbidden` for a token that was rejected or does not grant posting.
    async fn verify(&self, token: &str) -> Result<Identity, AppError>;
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let (scheme, token) = value.split_once(' ').ok_or(AppError::Unauthorized)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok(token)
}

pub struct IndieAuthVerifier {
    client: Client,
    token_endpoint: String,
    me: String,
}

impl IndieAuthVerifier {
    pub fn new(token_endpoint: String, me: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token_endpoint,
            me,
        })
    }
}

#[async_trait]
impl TokenVerifier for IndieAuthVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let response = self
            .client
            .get(&self.token_endpoint)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::TokenEndpoint(e.to_string()))?;

        let status = response.status();
        if is_rejection(status.as_u16()) {
            debug!("Token endpoint rejected token (status {status})");
            return Err(AppError::Forbidden);
        }
        if !status.is_success() {
            return Err(AppError::TokenEndpoint(format!(
                "token endpoint returned {status}"
            )));
        }

        let identity: Identity = response
            .json()
            .await
            .map_err(|e| AppError::TokenEndpoint(format!("unreadable token response: {e}")))?;
        check_identity(&identity, &self.me)?;
        Ok(identity)
    }
}

fn is_rejection(status: u16) -> bool {
    status == StatusCode::BAD_REQUEST.as_u16()
        || status == StatusCode::UNAUTHORIZED.as_u16()
        || status == StatusCode::FORBIDDEN.as_u16()
}

/// The token must belong to this site's owner and grant `create` (or the
/// older `post`) scope.
pub fn check_identity(identity: &Identity, expected_me: &str) -> Result<(), AppError> {
    if normalize_me(&identity.me) != normalize_me(expected_me) {
        warn!("Micropub token issued for {}, not this site", identity.me);
        return Err(AppError::Forbidden);
    }
    let can_post = identity
        .scope
        .split_whitespace()
        .any(|s| s == "create" || s == "post");
    if !can_post {
        warn!("Micropub token lacks create scope: '{}'", identity.scope);
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn normalize_me(me: &str) -> &str {
    me.trim().trim_end_matches('/')
}
