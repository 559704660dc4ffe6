//! Domain models for the odds backend.
//!
//! This module contains all database-backed models: the sports catalog,
//! users, and markets with their coefficient history.

pub mod catalog;
pub mod market;
pub mod user;

// Re-export all models for convenient access
pub use catalog::{Competition, Country, Event, Sport, Team};
pub use market::{CoefficientHistoryEntry, CommittedUpdate, Market, MarketDetails, NewMarket};
pub use user::User;
