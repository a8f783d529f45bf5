//! Extraction backend contract.

use crate::Document;
use async_trait::async_trait;
use fieldmark_model::RawFieldRecord;
use serde::{Deserialize, Serialize};

/// Why a backend produced nothing for a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendError {
    /// The backend could not run at all (missing tool, timeout, crash).
    #[error("backend unavailable: {reason}")]
    Unavailable { reason: String },

    /// The backend ran but its output could not be used.
    #[error("extraction failed: {reason}")]
    Extraction { reason: String },
}

impl BackendError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        BackendError::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn extraction(reason: impl Into<String>) -> Self {
        BackendError::Extraction {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            BackendError::Unavailable { reason } | BackendError::Extraction { reason } => reason,
        }
    }
}

/// One independent source of field metadata.
///
/// Adapters hold no per-document state between calls. A failing adapter
/// never aborts the pipeline; the runner records its error and moves on.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Stable, unique backend identifier.
    fn id(&self) -> &str;

    /// Whether this backend can rename and write fields (the primary).
    fn can_mutate(&self) -> bool {
        false
    }

    /// Report every interactive field in the document.
    async fn extract(&self, document: &Document) -> Result<Vec<RawFieldRecord>, BackendError>;
}
