pub mod config;
pub mod database;
pub mod error;

pub use config::Config;
pub use database::DatabasePool;
pub use error::{Error, ErrorCode, ErrorContext, Result};

// Re-export commonly used types from dependencies
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
