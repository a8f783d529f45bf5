//! Backend that replays records already held in memory.
//!
//! Front ends that ran extraction themselves hand their output to the
//! pipeline through this adapter.

use crate::backend::{BackendAdapter, BackendError};
use crate::Document;
use async_trait::async_trait;
use fieldmark_model::RawFieldRecord;

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    id: String,
    can_mutate: bool,
    records: Result<Vec<RawFieldRecord>, BackendError>,
}

impl MemoryBackend {
    /// Replay `records`, stamping this backend's id on each.
    pub fn new(id: &str, records: Vec<RawFieldRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.source_backend.is_empty() {
                    record.source_backend = id.to_string();
                }
                record
            })
            .collect();
        Self {
            id: id.to_string(),
            can_mutate: false,
            records: Ok(records),
        }
    }

    /// A backend that always fails with `error`.
    pub fn failing(id: &str, error: BackendError) -> Self {
        Self {
            id: id.to_string(),
            can_mutate: false,
            records: Err(error),
        }
    }

    /// Mark this backend as the mutation-capable primary.
    pub fn primary(mut self) -> Self {
        self.can_mutate = true;
        self
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn can_mutate(&self) -> bool {
        self.can_mutate
    }

    async fn extract(&self, _document: &Document) -> Result<Vec<RawFieldRecord>, BackendError> {
        self.records.clone()
    }
}
