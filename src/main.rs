mod config;
mod db;
mod error;
mod models;
mod occupancy;
mod routes;
mod store;

use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::models::AppState;
use crate::store::{HospitalStore, MemoryStore, PgStore};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;

    let store: Arc<dyn HospitalStore> = match (cfg.store_backend, cfg.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = db::connect_pg(url, cfg.db_max_connections).await?;
            Arc::new(PgStore::new(pool))
        }
        (StoreBackend::Postgres, None) => anyhow::bail!("DATABASE_URL is not set"),
        (StoreBackend::Memory, _) => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState { store };

    // The browser frontend is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
