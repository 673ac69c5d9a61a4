use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Context information attached to an [`Error`](super::Error), for debugging
/// and log correlation rather than end-user display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique identifier for this error instance.
    pub error_id: String,
    /// Correlation id of the batch/import/operation that raised this error, if any.
    pub operation_id: Option<String>,
    /// Additional structured data (file name, row/column, supplier, etc).
    pub metadata: HashMap<String, serde_json::Value>,
    /// Stack of human-readable error origins, innermost first.
    pub trace: Vec<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            error_id: Uuid::new_v4().to_string(),
            operation_id: None,
            metadata: HashMap::new(),
            trace: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace.push(trace.into());
        self
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}
