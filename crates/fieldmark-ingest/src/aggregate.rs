//! Precedence-ordered merge of backend reports.
//!
//! The primary backend seeds the field set; every field it reports is
//! accessible. Other backends are folded in by priority: a record joins an
//! existing field when its raw name matches exactly, otherwise it starts a
//! new inaccessible field. On type disagreement the earlier backend wins and
//! the disagreement is recorded. `Unknown` carries no information and is
//! upgraded silently.

use crate::runner::{BackendOutcome, BackendRun};
use crate::{BackendError, IngestError};
use fieldmark_model::{BackendId, FieldType, RawFieldRecord, UnifiedField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// Report types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackendStatus {
    Available { field_count: usize },
    Failed { error: BackendError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSummary {
    pub backend_id: BackendId,
    pub is_primary: bool,
    pub status: BackendStatus,
    pub elapsed_ms: u64,
}

impl BackendSummary {
    /// Distinct fields reported, or `None` when the backend failed.
    pub fn field_count(&self) -> Option<usize> {
        match self.status {
            BackendStatus::Available { field_count } => Some(field_count),
            BackendStatus::Failed { .. } => None,
        }
    }
}

/// Two backends disagreed on a field's type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeConflict {
    pub field_key: String,
    pub kept: FieldType,
    pub kept_from: BackendId,
    pub rejected: FieldType,
    pub rejected_from: BackendId,
}

/// A record discarded before aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    pub backend_id: BackendId,
    pub raw_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub primary_backend: BackendId,
    pub backends: Vec<BackendSummary>,
    pub total_unique_fields: usize,
    /// Keys of fields seen by exactly one backend.
    pub single_source_fields: Vec<String>,
    pub type_conflicts: Vec<TypeConflict>,
    pub dropped_records: Vec<DroppedRecord>,
    pub warnings: Vec<String>,
}

impl AggregationReport {
    pub fn backend(&self, backend_id: &str) -> Option<&BackendSummary> {
        self.backends.iter().find(|b| b.backend_id == backend_id)
    }

    pub fn primary_available(&self) -> bool {
        self.backend(&self.primary_backend)
            .is_some_and(|b| b.field_count().is_some())
    }
}

/// Aggregated fields in first-seen order, plus what happened on the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    pub fields: Vec<UnifiedField>,
    pub report: AggregationReport,
}

// ============================================================================
// Aggregator
// ============================================================================

#[derive(Debug, Clone)]
pub struct Aggregator {
    primary: BackendId,
}

impl Aggregator {
    pub fn new(primary: impl Into<BackendId>) -> Self {
        Self {
            primary: primary.into(),
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Merge `runs`, which must be in priority order.
    pub fn aggregate(&self, runs: &[BackendRun]) -> Result<Aggregation, IngestError> {
        self.check_configuration(runs)?;

        let failures: Vec<(BackendId, BackendError)> = runs
            .iter()
            .filter_map(|run| match &run.outcome {
                BackendOutcome::Failed { error } => Some((run.backend_id.clone(), error.clone())),
                BackendOutcome::Succeeded { .. } => None,
            })
            .collect();
        if failures.len() == runs.len() {
            return Err(IngestError::NoBackendSucceeded { failures });
        }

        let mut merge = Merge::default();
        let mut report = AggregationReport {
            primary_backend: self.primary.clone(),
            ..AggregationReport::default()
        };

        // The primary seeds the field set even when it is not listed first.
        let ordered = runs
            .iter()
            .filter(|run| run.backend_id == self.primary)
            .chain(runs.iter().filter(|run| run.backend_id != self.primary));

        for run in ordered {
            let is_primary = run.backend_id == self.primary;
            let status = match &run.outcome {
                BackendOutcome::Failed { error } => {
                    if is_primary {
                        let warning = format!(
                            "primary backend `{}` failed ({error}); every field is inaccessible",
                            run.backend_id
                        );
                        tracing::warn!(backend = %run.backend_id, error = %error, "primary backend failed");
                        report.warnings.push(warning);
                    }
                    BackendStatus::Failed {
                        error: error.clone(),
                    }
                }
                BackendOutcome::Succeeded { records } => {
                    let (valid, dropped) = validate_records(&run.backend_id, records);
                    report.dropped_records.extend(dropped);
                    let mut seen = BTreeSet::new();
                    for record in valid {
                        seen.insert(record.raw_name.clone());
                        merge.absorb(record, is_primary);
                    }
                    BackendStatus::Available {
                        field_count: seen.len(),
                    }
                }
            };
            report.backends.push(BackendSummary {
                backend_id: run.backend_id.clone(),
                is_primary,
                status,
                elapsed_ms: run.elapsed_ms,
            });
        }

        // Summaries follow the caller's priority order.
        report.backends.sort_by_key(|summary| {
            runs.iter()
                .position(|run| run.backend_id == summary.backend_id)
                .unwrap_or(usize::MAX)
        });

        let fields = merge.fields;
        report.total_unique_fields = fields.len();
        report.single_source_fields = fields
            .iter()
            .filter(|f| f.reporting_backends.len() == 1)
            .map(|f| f.canonical_key.clone())
            .collect();
        report.type_conflicts = merge.conflicts;

        tracing::debug!(
            fields = report.total_unique_fields,
            conflicts = report.type_conflicts.len(),
            dropped = report.dropped_records.len(),
            "aggregated backend reports"
        );
        Ok(Aggregation { fields, report })
    }

    fn check_configuration(&self, runs: &[BackendRun]) -> Result<(), IngestError> {
        let mut ids = BTreeSet::new();
        for run in runs {
            if !ids.insert(run.backend_id.as_str()) {
                return Err(IngestError::DuplicateBackend(run.backend_id.clone()));
            }
        }
        if !runs.is_empty() && !ids.contains(self.primary.as_str()) {
            return Err(IngestError::UnknownPrimary(self.primary.clone()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Merge {
    fields: Vec<UnifiedField>,
    /// Backend whose type each field currently carries.
    type_sources: Vec<BackendId>,
    by_raw_name: HashMap<String, usize>,
    conflicts: Vec<TypeConflict>,
}

impl Merge {
    fn absorb(&mut self, record: RawFieldRecord, is_primary: bool) {
        let Some(&index) = self.by_raw_name.get(&record.raw_name) else {
            self.by_raw_name
                .insert(record.raw_name.clone(), self.fields.len());
            self.type_sources.push(record.source_backend.clone());
            self.fields.push(UnifiedField::from_record(&record, is_primary));
            return;
        };

        let field = &mut self.fields[index];
        field
            .reporting_backends
            .insert(record.source_backend.clone());

        if record.field_type != field.field_type {
            if field.field_type == FieldType::Unknown {
                field.field_type = record.field_type;
                self.type_sources[index] = record.source_backend.clone();
            } else if record.field_type != FieldType::Unknown {
                self.conflicts.push(TypeConflict {
                    field_key: field.canonical_key.clone(),
                    kept: field.field_type,
                    kept_from: self.type_sources[index].clone(),
                    rejected: record.field_type,
                    rejected_from: record.source_backend.clone(),
                });
            }
        }

        if field.position.is_none() {
            field.position = record.position;
        }
        for (key, value) in record.properties {
            field.properties.entry(key).or_insert(value);
        }
        field.is_container |= record.is_container || field.field_type.is_container();
    }
}

// ============================================================================
// Record validation
// ============================================================================

/// Split a backend's records into usable ones and dropped ones.
///
/// An empty `source_backend` is filled in; a foreign one, a blank raw name or
/// a non-finite position drops the record.
pub fn validate_records(
    backend_id: &str,
    records: &[RawFieldRecord],
) -> (Vec<RawFieldRecord>, Vec<DroppedRecord>) {
    let mut valid = Vec::with_capacity(records.len());
    let mut dropped = Vec::new();

    for record in records {
        let reason = if record.raw_name.trim().is_empty() {
            Some("empty raw name".to_string())
        } else if record.position.is_some_and(|p| !p.is_finite()) {
            Some("non-finite position".to_string())
        } else if !record.source_backend.is_empty() && record.source_backend != backend_id {
            Some(format!(
                "reported by `{}` but attributed to `{}`",
                backend_id, record.source_backend
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::warn!(
                    backend = %backend_id,
                    raw_name = %record.raw_name,
                    reason = %reason,
                    "dropping invalid field record"
                );
                dropped.push(DroppedRecord {
                    backend_id: backend_id.to_string(),
                    raw_name: record.raw_name.clone(),
                    reason,
                });
            }
            None => {
                let mut record = record.clone();
                if record.source_backend.is_empty() {
                    record.source_backend = backend_id.to_string();
                }
                valid.push(record);
            }
        }
    }

    (valid, dropped)
}
