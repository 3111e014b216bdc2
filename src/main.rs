use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mindreveal_api_rust::app::{router, AppState};
use mindreveal_api_rust::auth::PrincipalKind;
use mindreveal_api_rust::config::{self, AppConfig};
use mindreveal_api_rust::store::{PgStore, PrincipalDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up secrets and DATABASE_URL
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::config();
    tracing::info!("Starting MindReveal API in {:?} mode", config.environment);

    let directory = directory(config).await?;
    let state = AppState::from_config(config, directory).context("invalid security configuration")?;

    let mut app = router(state);
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    if config.security.enable_cors {
        app = app.layer(cors(config));
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MindReveal API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server")?;
    Ok(())
}

async fn directory(config: &AppConfig) -> anyhow::Result<PrincipalDirectory> {
    if config.database.url.is_none() {
        tracing::warn!("DATABASE_URL not set, principals are kept in memory");
        return Ok(PrincipalDirectory::in_memory());
    }

    let pool = PgStore::connect(&config.database)
        .await
        .context("failed to connect to principal database")?;

    Ok(PrincipalDirectory::new(
        Arc::new(PgStore::new(pool.clone(), PrincipalKind::User)),
        Arc::new(PgStore::new(pool, PrincipalKind::Admin)),
    ))
}

fn cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<axum::http::HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
