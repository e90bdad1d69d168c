mod blog;
mod config;
mod db;
mod errors;
mod feeds;
mod html;
mod micropub;
mod models;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::micropub::auth::IndieAuthVerifier;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{ContentStore, MemoryContentStore, PgContentStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting weblog v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ContentStore> = match &config.database_url {
        Some(url) => Arc::new(PgContentStore::new(create_pool(url).await?)),
        None => {
            warn!("DATABASE_URL not set; content lives in memory and is lost on restart");
            Arc::new(MemoryContentStore::new())
        }
    };

    let token_verifier = Arc::new(IndieAuthVerifier::new(
        config.token_endpoint.clone(),
        config.micropub_me.clone(),
    )?);
    info!("Micropub tokens verified against {}", config.token_endpoint);

    let state = AppState {
        store,
        token_verifier,
        config: config.clone(),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
