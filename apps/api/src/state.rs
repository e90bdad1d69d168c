use std::sync::Arc;

use crate::config::Config;
use crate::micropub::auth::TokenVerifier;
use crate::store::ContentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production, in-memory when no `DATABASE_URL` is configured.
    pub store: Arc<dyn ContentStore>,
    /// Checks Micropub bearer tokens. Default: IndieAuth token endpoint.
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub config: Config,
}
