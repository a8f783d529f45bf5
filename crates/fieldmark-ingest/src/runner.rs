//! Concurrent backend extraction.
//!
//! Every adapter runs on its own tokio task under a timeout. A backend that
//! times out or panics is reported as unavailable; the others are not
//! affected. Results come back in the configured priority order regardless
//! of completion order.
//!
//! The timeout only bounds adapters that yield to the runtime. An adapter
//! doing blocking work should move it onto `tokio::task::spawn_blocking`.

use crate::backend::{BackendAdapter, BackendError};
use crate::Document;
use fieldmark_model::{BackendId, RawFieldRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendOutcome {
    Succeeded { records: Vec<RawFieldRecord> },
    Failed { error: BackendError },
}

/// Result of running one backend against one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRun {
    pub backend_id: BackendId,
    pub outcome: BackendOutcome,
    pub elapsed_ms: u64,
}

impl BackendRun {
    pub fn succeeded(backend_id: &str, records: Vec<RawFieldRecord>) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            outcome: BackendOutcome::Succeeded { records },
            elapsed_ms: 0,
        }
    }

    pub fn failed(backend_id: &str, error: BackendError) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            outcome: BackendOutcome::Failed { error },
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BackendOutcome::Succeeded { .. })
    }
}

/// Run every adapter against `document` concurrently.
///
/// The returned runs are in the same order as `adapters`.
pub async fn run_backends(
    adapters: &[Arc<dyn BackendAdapter>],
    document: &Document,
    timeout: Duration,
) -> Vec<BackendRun> {
    let mut tasks = JoinSet::new();
    for (index, adapter) in adapters.iter().enumerate() {
        let adapter = Arc::clone(adapter);
        let document = document.clone();
        tasks.spawn(async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, adapter.extract(&document)).await {
                Ok(Ok(records)) => BackendOutcome::Succeeded { records },
                Ok(Err(error)) => BackendOutcome::Failed { error },
                Err(_) => BackendOutcome::Failed {
                    error: BackendError::unavailable(format!(
                        "timed out after {} ms",
                        timeout.as_millis()
                    )),
                },
            };
            let run = BackendRun {
                backend_id: adapter.id().to_string(),
                outcome,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            };
            (index, run)
        });
    }

    let mut slots: Vec<Option<BackendRun>> = vec![None; adapters.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, run)) => {
                match &run.outcome {
                    BackendOutcome::Succeeded { records } => tracing::debug!(
                        backend = %run.backend_id,
                        records = records.len(),
                        elapsed_ms = run.elapsed_ms,
                        "backend extraction finished"
                    ),
                    BackendOutcome::Failed { error } => tracing::warn!(
                        backend = %run.backend_id,
                        error = %error,
                        "backend extraction failed"
                    ),
                }
                slots[index] = Some(run);
            }
            Err(err) => {
                // The slot is filled below once every task has settled.
                tracing::warn!(error = %err, "backend task aborted");
            }
        }
    }

    slots
        .into_iter()
        .zip(adapters)
        .map(|(slot, adapter)| {
            slot.unwrap_or_else(|| {
                BackendRun::failed(
                    adapter.id(),
                    BackendError::unavailable("backend task panicked or was cancelled"),
                )
            })
        })
        .collect()
}
