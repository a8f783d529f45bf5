//! Field ingestion for Fieldmark
//!
//! Pulls interactive form-field metadata out of a document through several
//! independent extraction backends and merges their reports:
//! - [`BackendAdapter`]: the contract every backend implements
//! - [`MemoryBackend`], [`JsonDumpBackend`]: adapters shipped with the crate
//! - [`run_backends`]: concurrent extraction with per-backend timeouts
//! - [`Aggregator`]: precedence-ordered merge into [`UnifiedField`]s
//!
//! **Untrusted boundary**: backends are black boxes. Anything they report is
//! validated here before it reaches the reconciliation stages.
//!
//! [`UnifiedField`]: fieldmark_model::UnifiedField

use anyhow::{Context, Result};
use fieldmark_model::digest::fnv1a64_digest_bytes;
use fieldmark_model::BackendId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod aggregate;
pub mod backend;
pub mod json_dump;
pub mod memory;
pub mod runner;

pub use aggregate::{
    Aggregation, AggregationReport, Aggregator, BackendStatus, BackendSummary, DroppedRecord,
    TypeConflict,
};
pub use backend::{BackendAdapter, BackendError};
pub use json_dump::JsonDumpBackend;
pub use memory::MemoryBackend;
pub use runner::{run_backends, BackendOutcome, BackendRun, DEFAULT_BACKEND_TIMEOUT};

// ============================================================================
// Documents
// ============================================================================

/// Identity of one version of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub name: String,
    pub digest: String,
}

/// A document handed to every backend.
///
/// Bytes are shared, so cloning a document into each extraction task is
/// cheap.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    path: Option<PathBuf>,
    bytes: Arc<[u8]>,
    digest: String,
}

impl Document {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let digest = fnv1a64_digest_bytes(&bytes);
        Self {
            name: name.into(),
            path: None,
            bytes: Arc::from(bytes),
            digest,
        }
    }

    /// Read a document from disk. The file name becomes the document name.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read document {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut doc = Self::from_bytes(name, bytes);
        doc.path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn id(&self) -> DocumentId {
        DocumentId {
            name: self.name.clone(),
            digest: self.digest.clone(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal ingestion failures. Individual backend failures are not errors at
/// this level; they are recorded in the [`AggregationReport`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no extraction backend succeeded ({} attempted)", failures.len())]
    NoBackendSucceeded {
        failures: Vec<(BackendId, BackendError)>,
    },

    #[error("primary backend `{0}` is not among the configured backends")]
    UnknownPrimary(BackendId),

    #[error("backend id `{0}` is configured more than once")]
    DuplicateBackend(BackendId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn document_identity_tracks_content() {
        let a = Document::from_bytes("form.pdf", b"%PDF-1.7 a".to_vec());
        let b = Document::from_bytes("form.pdf", b"%PDF-1.7 b".to_vec());
        assert_eq!(a.id().name, b.id().name);
        assert_ne!(a.id(), b.id());
        assert!(a.digest().starts_with("fnv1a64:"));
        assert!(a.path().is_none());
    }

    #[test]
    fn document_from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.pdf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"%PDF-1.7").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.name(), "application.pdf");
        assert_eq!(doc.bytes(), b"%PDF-1.7");
        assert_eq!(doc.path(), Some(path.as_path()));
    }

    #[test]
    fn missing_document_reports_path() {
        let err = Document::from_path(Path::new("/nonexistent/fieldmark.pdf")).unwrap_err();
        assert!(format!("{err:#}").contains("fieldmark.pdf"));
    }
}
