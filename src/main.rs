//! Odds Backend Service
//!
//! Main entry point for the odds backend.
//! This service provides:
//! - gRPC API for coefficient updates, market lookups and registration
//! - Best-effort fan-out of committed odds changes to Centrifugo

use odds_backend::config::{AppConfig, LogFormat};
use odds_backend::database::Database;
use odds_backend::error::{AppError, AppResult};
use odds_backend::grpc_service::{proto, OddsGrpcService};
use odds_backend::services::seed_demo_data;
use odds_backend::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info, warn};

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("odds_backend={},sqlx=warn,tonic=info", config.log_level).into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("Odds backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("gRPC port: {}", config.grpc_port);
    info!("Centrifugo API: {} (channel {})", config.broker.api_url, config.broker.channel);
    if config.broker.api_key.is_empty() {
        warn!("CENTRIFUGO_API_KEY is empty - publications will likely be rejected");
    }

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let database = Database::connect(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    let version = database.health_check().await.map_err(|e| {
        error!("Database is not reachable: {}", e);
        AppError::Database(e)
    })?;
    info!(
        "Connected to PostgreSQL {} (max connections: {})",
        version, config.database.max_connections
    );

    info!("Running database migrations from {}...", config.migrations_path);
    database.migrate(&config.migrations_path).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    // =========================================================================
    // CORE SERVICES
    // =========================================================================
    let app_state = Arc::new(AppState::new(database, &config.broker)?);
    info!("✓ Application state initialized");

    if config.seed_demo_data {
        let created = seed_demo_data(&app_state.catalog_repo, &app_state.market_repo).await?;
        info!("✓ Demo data seeded ({} markets)", created);
    }

    let grpc_service = OddsGrpcService::new(app_state.gateway.clone(), app_state.users.clone());

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build reflection service: {}", e)))?;

    // =========================================================================
    // START SERVER
    // =========================================================================
    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid gRPC address: {}", e)))?;

    info!("Starting gRPC server on {}...", grpc_addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received, shutting down gracefully...");
    };

    Server::builder()
        .add_service(reflection)
        .add_service(grpc_service.into_server())
        .serve_with_shutdown(grpc_addr, shutdown)
        .await
        .map_err(|e| AppError::Message(format!("gRPC server error: {}", e)))?;

    app_state.database.close().await;
    info!("Odds backend shutdown complete");
    Ok(())
}
