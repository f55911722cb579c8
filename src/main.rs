//! HTTP server for the drive file tree.

use axum::http::HeaderValue;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cts_drive::api::{create_router, ApiSettings, AppState, TokenIssuer};
use cts_drive::config::Config;
use cts_drive::drive::{GoogleConnector, OAuthApp};
use cts_drive::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cts-drive");
    tracing::info!("Drive root folder name: {}", config.drive_root_folder_name);
    tracing::info!("Frontend URL: {}", config.frontend_url);

    // Ensure database directory exists
    let db_path = std::path::Path::new(&config.db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = store::connect(&config.database_url()).await?;

    let connector = GoogleConnector::new(OAuthApp::from_config(&config))?;
    let tokens = TokenIssuer::new(&config.jwt_secret, config.access_token_ttl_minutes);
    let settings = ApiSettings {
        frontend_url: config.frontend_url.clone(),
        drive_root_folder_name: config.drive_root_folder_name.clone(),
    };
    let state = AppState::new(db, Arc::new(connector), tokens, settings);

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let addr: SocketAddr = config.bind_addr().parse()?;
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
