//! Connection pool, health check and schema migrations.

pub mod pool;

pub use pool::{Database, DatabaseError};
