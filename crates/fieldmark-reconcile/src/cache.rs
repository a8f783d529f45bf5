//! Per-document result cache.
//!
//! Entries are keyed by document name and remember the document digest and
//! the run-options digest they were computed for. A lookup with either
//! digest changed is a miss and drops the stale entry.

use crate::pipeline::EngineOutput;
use fieldmark_ingest::DocumentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct CacheEntry {
    document_digest: String,
    options_digest: String,
    output: Arc<EngineOutput>,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document: &DocumentId, options_digest: &str) -> Option<Arc<EngineOutput>> {
        {
            let entries = self.entries.read();
            match entries.get(&document.name) {
                None => return None,
                Some(entry)
                    if entry.document_digest == document.digest
                        && entry.options_digest == options_digest =>
                {
                    return Some(Arc::clone(&entry.output));
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        let stale = entries.get(&document.name).is_some_and(|entry| {
            entry.document_digest != document.digest || entry.options_digest != options_digest
        });
        if stale {
            tracing::debug!(document = %document.name, "evicting stale cached result");
            entries.remove(&document.name);
        }
        None
    }

    pub fn insert(&self, document: &DocumentId, options_digest: &str, output: Arc<EngineOutput>) {
        self.entries.write().insert(
            document.name.clone(),
            CacheEntry {
                document_digest: document.digest.clone(),
                options_digest: options_digest.to_string(),
                output,
            },
        );
    }

    /// Drop the entry for `name`. Returns whether one existed.
    pub fn invalidate(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
