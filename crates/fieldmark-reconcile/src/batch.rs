//! Several documents through one engine, plus cross-form consistency.
//!
//! A document that fails is listed with its error; the rest of the batch
//! still completes.

use crate::pipeline::EngineOutput;
use crate::report::ConfidenceHistogram;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub document: String,
    pub error: String,
}

/// Totals and consistency metrics over the successful documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_forms: usize,
    pub total_fields: usize,
    pub overall_confidence: ConfidenceHistogram,
    /// `block[_element]` name stems used by more than one document, with
    /// the number of documents using them.
    pub common_patterns: BTreeMap<String, usize>,
    /// Per normalized field label seen more than once: `1.0` when every
    /// occurrence got the same name, lower as the names diverge.
    pub naming_consistency: BTreeMap<String, f64>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Successful outputs, in input order.
    pub outputs: Vec<Arc<EngineOutput>>,
    pub summary: BatchSummary,
}

impl BatchSummary {
    pub fn new(outputs: &[Arc<EngineOutput>], failures: Vec<BatchFailure>) -> Self {
        let mut overall_confidence = ConfidenceHistogram::default();
        for output in outputs {
            let c = output.report.confidence;
            overall_confidence.high += c.high;
            overall_confidence.medium += c.medium;
            overall_confidence.low += c.low;
        }

        Self {
            total_forms: outputs.len(),
            total_fields: outputs.iter().map(|o| o.fields.len()).sum(),
            overall_confidence,
            common_patterns: common_patterns(outputs),
            naming_consistency: if outputs.len() > 1 {
                naming_consistency(outputs)
            } else {
                BTreeMap::new()
            },
            failures,
        }
    }
}

fn common_patterns(outputs: &[Arc<EngineOutput>]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for output in outputs {
        let patterns: BTreeSet<String> = output
            .mappings
            .iter()
            .map(|m| m.rendered_name())
            .filter(|name| name.contains('_'))
            .map(|name| match name.split_once("__") {
                Some((stem, _)) => stem.to_string(),
                None => name,
            })
            .collect();
        for pattern in patterns {
            *counts.entry(pattern).or_insert(0) += 1;
        }
    }
    counts.retain(|_, n| *n > 1);
    counts
}

fn naming_consistency(outputs: &[Arc<EngineOutput>]) -> BTreeMap<String, f64> {
    let mut names: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for mapping in outputs.iter().flat_map(|o| &o.mappings) {
        names
            .entry(normalize_label(&mapping.unified_field_key))
            .or_default()
            .push(mapping.rendered_name());
    }
    names
        .into_iter()
        .filter(|(label, names)| !label.is_empty() && names.len() > 1)
        .map(|(label, names)| {
            let distinct = names.iter().collect::<BTreeSet<_>>().len();
            let score = 1.0 - (distinct - 1) as f64 / names.len() as f64;
            (label, score)
        })
        .collect()
}

/// Lowercased label without widget words (`text_`, `_box`) or a leading
/// number, separators collapsed to `_`.
pub fn normalize_label(label: &str) -> String {
    let mut label = label.to_lowercase();
    if let Some(rest) = ["text", "input", "field", "box", "button"]
        .iter()
        .find_map(|w| label.strip_prefix(w))
    {
        label = rest.strip_prefix('_').unwrap_or(rest).to_string();
    }
    if let Some(rest) = ["field", "box", "button", "input"]
        .iter()
        .find_map(|w| label.strip_suffix(w))
    {
        label = rest.strip_suffix('_').unwrap_or(rest).to_string();
    }

    let mut collapsed = String::with_capacity(label.len());
    let mut in_separator = false;
    for c in label.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !in_separator {
                collapsed.push('_');
            }
            in_separator = true;
        } else {
            collapsed.push(c);
            in_separator = false;
        }
    }

    let unnumbered = collapsed.trim_start_matches(|c: char| c.is_ascii_digit());
    let unnumbered = if unnumbered.len() < collapsed.len() {
        unnumbered.strip_prefix('_').unwrap_or(unnumbered)
    } else {
        unnumbered
    };
    unnumbered.trim_matches('_').to_string()
}
