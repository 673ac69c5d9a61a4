//! # Error Handling Framework
//!
//! Structured, technical-category error handling shared across the
//! workspace:
//!
//! - **Structured error types**: [`ErrorCode`] gives every failure a stable
//!   machine-readable tag; [`Error`] wraps it with a human message, optional
//!   details, and a [`ErrorContext`] for debugging.
//! - **Severity classification**: [`ErrorSeverity`] drives whether a failure
//!   is worth paging on versus logging and moving on.
//! - **Conversions**: `From<sqlx::Error>`, `From<serde_json::Error>`, and
//!   `From<config::ConfigError>` so `?` works across the usual I/O
//!   boundaries without manual mapping at every call site.
//!
//! This crate's `Error` is infrastructure-level. Domain operations (product
//! matching, price comparison, ...) should surface their own error enum —
//! see `catalog_engine::error::CatalogError` — and convert from this one
//! where a database or config failure bubbles up through them.

pub mod codes;
pub mod context;
pub mod framework;

pub use codes::ErrorCode;
pub use context::ErrorContext;
pub use framework::{Error, ErrorCategory, ErrorSeverity, Result};
