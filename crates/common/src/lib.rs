//! UnitForge Common Library
//!
//! Shared code for the UnitForge services including:
//! - The unit entity and the unit store
//! - Code normalization and the starter seed list
//! - Error types and handling
//! - Configuration management
//! - Request-scoped caching
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod normalize;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::models::Unit;
pub use db::{DbPool, UnitOption, UnitStore};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
