//! Backend that reads a JSON field dump written by an external extractor.
//!
//! The dump is either a bare array of records or an object with a `fields`
//! array. Each record has the [`RawFieldRecord`] shape; `source_backend` may
//! be omitted and `field_type` accepts any label understood by
//! [`FieldType::from_label`](fieldmark_model::FieldType::from_label).
//!
//! By default the dump is a sidecar next to the document:
//! `<document file name>.<backend id>.fields.json`.

use crate::backend::{BackendAdapter, BackendError};
use crate::Document;
use async_trait::async_trait;
use fieldmark_model::RawFieldRecord;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone)]
enum DumpSource {
    Sidecar,
    File(PathBuf),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DumpFile {
    Records(Vec<RawFieldRecord>),
    Wrapped { fields: Vec<RawFieldRecord> },
}

impl DumpFile {
    fn into_records(self) -> Vec<RawFieldRecord> {
        match self {
            DumpFile::Records(records) | DumpFile::Wrapped { fields: records } => records,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonDumpBackend {
    id: String,
    source: DumpSource,
    can_mutate: bool,
}

impl JsonDumpBackend {
    /// Read `<document>.<id>.fields.json` next to each document.
    pub fn sidecar(id: &str) -> Self {
        Self {
            id: id.to_string(),
            source: DumpSource::Sidecar,
            can_mutate: false,
        }
    }

    /// Read one fixed dump file regardless of the document.
    pub fn from_file(id: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.to_string(),
            source: DumpSource::File(path.into()),
            can_mutate: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.can_mutate = true;
        self
    }

    /// Where this backend looks for the dump of `document`.
    pub fn dump_path(&self, document: &Document) -> Option<PathBuf> {
        match &self.source {
            DumpSource::File(path) => Some(path.clone()),
            DumpSource::Sidecar => {
                let path = document.path()?;
                let file_name = path.file_name()?.to_string_lossy();
                Some(path.with_file_name(format!("{file_name}.{}.fields.json", self.id)))
            }
        }
    }
}

#[async_trait]
impl BackendAdapter for JsonDumpBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_mutate(&self) -> bool {
        self.can_mutate
    }

    async fn extract(&self, document: &Document) -> Result<Vec<RawFieldRecord>, BackendError> {
        let path = self.dump_path(document).ok_or_else(|| {
            BackendError::unavailable(format!(
                "document `{}` has no path to locate a field dump",
                document.name()
            ))
        })?;

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BackendError::unavailable(format!(
                    "no field dump at {}",
                    path.display()
                )));
            }
            Err(err) => {
                return Err(BackendError::unavailable(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        let dump: DumpFile = serde_json::from_str(&text).map_err(|err| {
            BackendError::extraction(format!("invalid field dump {}: {err}", path.display()))
        })?;

        let records = dump
            .into_records()
            .into_iter()
            .map(|mut record| {
                if record.source_backend.is_empty() {
                    record.source_backend = self.id.clone();
                }
                record
            })
            .collect();
        Ok(records)
    }
}
