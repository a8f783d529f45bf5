//! Accessibility suggestions for fields the primary backend cannot write.
//!
//! Suggestions are advisory: they are stored on the field and reported, but
//! never change `is_accessible` or any mapping.

use crate::tokens::token_set_similarity;
use fieldmark_model::{AccessibilitySuggestion, UnifiedField};
use serde::{Deserialize, Serialize};

/// Ranked accessible candidates for one inaccessible field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionReport {
    pub field_key: String,
    pub candidates: Vec<AccessibilitySuggestion>,
    /// Top candidate, when it clears the acceptance threshold.
    pub accepted: Option<AccessibilitySuggestion>,
}

#[derive(Debug, Clone, Copy)]
pub struct AccessibilityClassifier {
    threshold: f64,
    max_candidates: usize,
}

impl AccessibilityClassifier {
    pub fn new(threshold: f64, max_candidates: usize) -> Self {
        Self {
            threshold,
            max_candidates,
        }
    }

    /// Accessible keys ranked by best similarity to any of `field`'s raw
    /// names. Ties go to the smaller key; zero scores are left out.
    pub fn rank(&self, field: &UnifiedField, accessible: &[&str]) -> Vec<AccessibilitySuggestion> {
        let mut ranked: Vec<AccessibilitySuggestion> = accessible
            .iter()
            .map(|key| {
                let score = field
                    .raw_names
                    .iter()
                    .map(|raw| token_set_similarity(raw, key))
                    .fold(0.0, f64::max);
                AccessibilitySuggestion {
                    target_key: key.to_string(),
                    score,
                }
            })
            .filter(|s| s.score > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.target_key.cmp(&b.target_key))
        });
        ranked
    }

    /// Annotate every inaccessible field. A no-op without accessible fields.
    pub fn classify(&self, fields: &mut [UnifiedField]) -> Vec<SuggestionReport> {
        let accessible: Vec<String> = fields
            .iter()
            .filter(|f| f.is_accessible)
            .map(|f| f.canonical_key.clone())
            .collect();
        if accessible.is_empty() {
            return Vec::new();
        }
        let accessible: Vec<&str> = accessible.iter().map(String::as_str).collect();

        let mut reports = Vec::new();
        for field in fields.iter_mut().filter(|f| !f.is_accessible) {
            let mut candidates = self.rank(field, &accessible);
            let accepted = candidates
                .first()
                .filter(|top| top.score > self.threshold)
                .cloned();
            candidates.truncate(self.max_candidates);

            if let Some(top) = &accepted {
                tracing::debug!(
                    field = %field.canonical_key,
                    target = %top.target_key,
                    score = top.score,
                    "accessible counterpart suggested"
                );
            }
            field.accessibility_suggestion = accepted.clone();
            reports.push(SuggestionReport {
                field_key: field.canonical_key.clone(),
                candidates,
                accepted,
            });
        }
        reports
    }
}
