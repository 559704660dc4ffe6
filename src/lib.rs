//! Odds Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod grpc_service;
pub mod models;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use config::BrokerConfig;
use database::Database;
use repositories::*;
use services::{CentrifugoClient, UpdateGateway, UserService};
use std::sync::Arc;

/// Application state containing all repositories and services.
///
/// Built once by the entry point; every component receives its collaborators
/// from here instead of reaching for globals.
pub struct AppState {
    pub database: Database,
    pub user_repo: Arc<UserRepository>,
    pub market_repo: Arc<MarketRepository>,
    pub catalog_repo: Arc<CatalogRepository>,
    pub centrifugo: Arc<CentrifugoClient>,
    pub gateway: Arc<UpdateGateway>,
    pub users: Arc<UserService>,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(database: Database, broker: &BrokerConfig) -> AppResult<Self> {
        let pool = database.pool().clone();

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let market_repo = Arc::new(MarketRepository::new(pool.clone()));
        let catalog_repo = Arc::new(CatalogRepository::new(pool));

        let centrifugo = Arc::new(
            CentrifugoClient::new(broker)
                .map_err(|e| AppError::Config(format!("Invalid broker client: {}", e)))?,
        );

        let gateway = Arc::new(
            UpdateGateway::new(market_repo.clone(), centrifugo.clone())
                .with_notify_timeout(broker.timeout()),
        );
        let users = Arc::new(UserService::new(user_repo.clone()));

        Ok(Self {
            database,
            user_repo,
            market_repo,
            catalog_repo,
            centrifugo,
            gateway,
            users,
        })
    }
}
