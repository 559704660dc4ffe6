pub mod catalog_repository;
pub mod market_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use catalog_repository::CatalogRepository;
pub use market_repository::{MarketRepository, MarketStore};
pub use user_repository::UserRepository;
