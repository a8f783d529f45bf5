//! Structured run report.

use crate::accessibility::SuggestionReport;
use crate::naming::{NameCollision, RejectedOverride};
use crate::normalize::{PrefixConflict, PrefixFold};
use crate::radio::AmbiguousGrouping;
use fieldmark_ingest::{BackendSummary, DocumentId, DroppedRecord, TypeConflict};
use fieldmark_model::{BackendId, Confidence, MappingEntry, RadioGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceHistogram {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ConfidenceHistogram {
    pub fn from_mappings(mappings: &[MappingEntry]) -> Self {
        let mut histogram = Self::default();
        for mapping in mappings {
            match mapping.confidence {
                Confidence::High => histogram.high += 1,
                Confidence::Medium => histogram.medium += 1,
                Confidence::Low => histogram.low += 1,
            }
        }
        histogram
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// Everything a reviewer needs to judge one run. Recoverable problems
/// (failed backends, dropped records, ambiguous groups, collisions, rejected
/// overrides) end up here instead of failing the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    pub document: DocumentId,
    pub primary_backend: BackendId,
    /// Best-matching configured form type, if any scored high enough.
    pub form_type: Option<String>,
    pub form_id: Option<String>,
    /// Per-backend counts; a failed backend carries its error, not zero.
    pub backends: Vec<BackendSummary>,
    /// Distinct fields after aggregation, before prefix folding.
    pub total_unique_fields: usize,
    pub reconciled_fields: usize,
    pub accessible_fields: usize,
    pub inaccessible_fields: usize,
    pub single_source_fields: Vec<String>,
    pub type_conflicts: Vec<TypeConflict>,
    pub dropped_records: Vec<DroppedRecord>,
    pub prefix_folds: Vec<PrefixFold>,
    pub unmatched_prefixed_fields: Vec<String>,
    pub prefix_conflicts: Vec<PrefixConflict>,
    pub radio_groups: Vec<RadioGroup>,
    pub grouping_warnings: Vec<AmbiguousGrouping>,
    pub accessibility_suggestions: Vec<SuggestionReport>,
    pub naming_conflicts: Vec<NameCollision>,
    pub rejected_overrides: Vec<RejectedOverride>,
    pub confidence: ConfidenceHistogram,
    /// Blocks the names landed in, other than the fallback block.
    pub detected_sections: Vec<String>,
    pub field_type_distribution: BTreeMap<String, usize>,
    /// Subjects named under the fallback block.
    pub missing_sections: Vec<String>,
    /// Low-confidence or collision-renamed subjects.
    pub review_required: Vec<String>,
    pub warnings: Vec<String>,
}

impl EngineReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
