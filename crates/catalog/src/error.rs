//! Domain error kinds for the catalog engine.
//!
//! These mirror the technical categories in `catalog_core::error` but are
//! scoped to the operations this crate exposes. Infrastructure failures
//! (database, config) convert into `CatalogError::Internal` or a more
//! specific variant via `#[from]`; callers match on `CatalogError` rather
//! than on `catalog_core::Error` directly.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Missing required field, non-positive price, empty normalized name.
    /// The offending record is rejected; the surrounding batch continues.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A unit string has no entry in the closed conversion table. Soft
    /// failure at C1 — callers keep the record with `size = None` rather
    /// than aborting.
    #[error("unrecognized unit: {0}")]
    UnknownUnit(String),

    /// The source file could not be opened or decoded.
    #[error("failed to parse input: {0}")]
    ParseFailure(String),

    /// Product/supplier lookup miss. Not treated as exceptional — callers
    /// that want an error should match and convert; the Store itself
    /// returns `Option`/empty collections for lookups.
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted to merge a product that has already been merged.
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    /// A Store operation exceeded its deadline; the transaction was rolled
    /// back.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Unexpected programming error.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] catalog_core::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl From<catalog_core::ErrorCode> for CatalogError {
    fn from(code: catalog_core::ErrorCode) -> Self {
        CatalogError::Internal(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_formats_message() {
        let err = CatalogError::InvalidInput("price must be positive".to_string());
        assert_eq!(err.to_string(), "invalid input: price must be positive");
    }

    #[test]
    fn deadline_exceeded_has_fixed_message() {
        assert_eq!(CatalogError::DeadlineExceeded.to_string(), "deadline exceeded");
    }
}
