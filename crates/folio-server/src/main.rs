mod config;

use std::sync::Arc;

use tracing::{error, info};

use folio_api::auth::{AppState, AppStateInner};
use folio_api::routes;
use folio_crypto::token::TokenCodec;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,folio_api=debug,folio_db=info,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: {:#}", e);
            eprintln!("FATAL: {:#}. Set it in your .env file and restart.", e);
            std::process::exit(1);
        }
    };

    // Init database
    let db = folio_db::Database::open(&config.db_path)?;

    let tokens = TokenCodec::new(&config.jwt_secret, config.token_ttl)
        .map_err(|e| anyhow::anyhow!("token codec: {}", e))?;

    let state: AppState = Arc::new(AppStateInner { db, tokens });
    let app = routes::router(state);

    info!("Folio server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
