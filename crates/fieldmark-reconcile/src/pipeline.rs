//! The reconciliation engine.
//!
//! [`Engine::run`] extracts a document through every backend concurrently,
//! then runs the deterministic stages in order:
//!
//! aggregate → normalize prefixes → reconstruct groups → classify
//! accessibility → generate names
//!
//! Each stage only sees the previous stage's output. [`Engine::reconcile`]
//! is the same pipeline over backend runs that were collected elsewhere, and
//! [`Engine::run_batch`] runs it over several documents.

use crate::accessibility::AccessibilityClassifier;
use crate::batch::{BatchFailure, BatchOutcome, BatchSummary};
use crate::cache::ResultCache;
use crate::config::{validate_section, ConfigError, EngineConfig, SectionRule};
use crate::naming::NameGenerator;
use crate::normalize::PrefixNormalizer;
use crate::profile;
use crate::radio::reconstruct_groups;
use crate::report::{ConfidenceHistogram, EngineReport};
use fieldmark_ingest::{
    run_backends, Aggregator, BackendAdapter, BackendRun, Document, DocumentId, IngestError,
};
use fieldmark_model::digest::fnv1a64_digest_parts;
use fieldmark_model::{BackendId, MappingEntry, MappingSubject, RadioGroup, UnifiedField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Per-run inputs from outside collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Extra section rules, tried before the configured ones. Invalid hints
    /// are reported and skipped.
    pub section_hints: Vec<SectionRule>,
    /// Fixed names keyed by canonical key (field or group).
    pub overrides: BTreeMap<String, String>,
}

impl RunOptions {
    /// Stable digest of everything that can change the output.
    pub fn digest(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for hint in &self.section_hints {
            parts.push(format!("hint:{}", hint.block));
            parts.extend(hint.keywords.iter().cloned());
        }
        for (key, name) in &self.overrides {
            parts.push(format!("override:{key}"));
            parts.push(name.clone());
        }
        fnv1a64_digest_parts(parts.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    pub mappings: Vec<MappingEntry>,
    pub fields: Vec<UnifiedField>,
    pub groups: Vec<RadioGroup>,
    pub report: EngineReport,
}

impl EngineOutput {
    pub fn mapping_for(&self, key: &str) -> Option<&MappingEntry> {
        self.mappings.iter().find(|m| m.unified_field_key == key)
    }

    pub fn field(&self, key: &str) -> Option<&UnifiedField> {
        self.fields.iter().find(|f| f.canonical_key == key)
    }

    pub fn group_mappings(&self) -> impl Iterator<Item = &MappingEntry> {
        self.mappings
            .iter()
            .filter(|m| matches!(m.subject, MappingSubject::Group))
    }

    /// `canonical_key → rendered name` for every subject the primary
    /// backend can rename. Inferred groups have no field of their own and
    /// are left out.
    pub fn rename_plan(&self) -> BTreeMap<String, String> {
        let accessible: HashSet<&str> = self
            .fields
            .iter()
            .filter(|f| f.is_accessible)
            .map(|f| f.canonical_key.as_str())
            .collect();
        self.mappings
            .iter()
            .filter(|m| accessible.contains(m.unified_field_key.as_str()))
            .map(|m| (m.unified_field_key.clone(), m.rendered_name()))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no extraction backends configured")]
    NoBackends,
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    config: EngineConfig,
    adapters: Vec<Arc<dyn BackendAdapter>>,
    primary: BackendId,
    cache: ResultCache,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.adapters.iter().map(|a| a.id()).collect();
        f.debug_struct("Engine")
            .field("primary", &self.primary)
            .field("adapters", &ids)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl Engine {
    /// `adapters` are in priority order.
    pub fn new(
        config: EngineConfig,
        adapters: Vec<Arc<dyn BackendAdapter>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if adapters.is_empty() {
            return Err(EngineError::NoBackends);
        }

        let mut ids = BTreeSet::new();
        for adapter in &adapters {
            if !ids.insert(adapter.id()) {
                return Err(IngestError::DuplicateBackend(adapter.id().to_string()).into());
            }
        }

        let primary = match &config.primary_backend {
            Some(id) if ids.contains(id.as_str()) => id.clone(),
            Some(id) => return Err(IngestError::UnknownPrimary(id.clone()).into()),
            None => adapters
                .iter()
                .find(|a| a.can_mutate())
                .unwrap_or(&adapters[0])
                .id()
                .to_string(),
        };
        tracing::debug!(primary = %primary, backends = adapters.len(), "engine configured");

        Ok(Self {
            config,
            adapters,
            primary,
            cache: ResultCache::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn primary_backend(&self) -> &str {
        &self.primary
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Reconcile `document`, reusing the cached result when neither the
    /// document nor the options changed.
    pub async fn run(
        &self,
        document: &Document,
        options: &RunOptions,
    ) -> Result<Arc<EngineOutput>, EngineError> {
        let id = document.id();
        let options_digest = options.digest();
        if let Some(hit) = self.cache.get(&id, &options_digest) {
            tracing::debug!(document = %id.name, "reusing cached result");
            return Ok(hit);
        }

        let runs = run_backends(&self.adapters, document, self.config.backend_timeout()).await;
        let output = Arc::new(self.reconcile(id.clone(), &runs, options)?);
        self.cache.insert(&id, &options_digest, Arc::clone(&output));
        Ok(output)
    }

    /// Run every document in order. Failed documents are reported in the
    /// summary and do not stop the batch.
    pub async fn run_batch(&self, documents: &[Document], options: &RunOptions) -> BatchOutcome {
        let mut outputs = Vec::with_capacity(documents.len());
        let mut failures = Vec::new();
        for document in documents {
            match self.run(document, options).await {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    tracing::error!(document = %document.name(), error = %err, "document failed");
                    failures.push(BatchFailure {
                        document: document.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let summary = BatchSummary::new(&outputs, failures);
        tracing::info!(
            forms = summary.total_forms,
            failed = summary.failures.len(),
            fields = summary.total_fields,
            "batch reconciled"
        );
        BatchOutcome { outputs, summary }
    }

    /// Run the deterministic stages over `runs`, in priority order.
    pub fn reconcile(
        &self,
        document: DocumentId,
        runs: &[BackendRun],
        options: &RunOptions,
    ) -> Result<EngineOutput, EngineError> {
        let aggregation = Aggregator::new(self.primary.clone()).aggregate(runs)?;
        let mut warnings = aggregation.report.warnings.clone();

        let normalizer = PrefixNormalizer::new(&self.config.prefixes);
        let (mut fields, normalization) = normalizer.normalize(aggregation.fields);

        let grouping = reconstruct_groups(&fields, &normalizer);

        let classifier = AccessibilityClassifier::new(
            self.config.similarity_threshold,
            self.config.suggestion_candidates,
        );
        let suggestions = classifier.classify(&mut fields);

        let mut hints = Vec::with_capacity(options.section_hints.len());
        for hint in &options.section_hints {
            match validate_section(hint) {
                Ok(()) => hints.push(hint.clone()),
                Err(err) => {
                    tracing::warn!(block = %hint.block, error = %err, "section hint ignored");
                    warnings.push(format!("section hint ignored: {err}"));
                }
            }
        }
        let naming = NameGenerator::new(&self.config, &hints)?.generate(
            &fields,
            &grouping.groups,
            &options.overrides,
        );

        let accessible_fields = fields.iter().filter(|f| f.is_accessible).count();
        let rendered: Vec<String> = naming.mappings.iter().map(|m| m.rendered_name()).collect();
        let form_type = profile::detect_form_type(
            &self.config.form_types,
            self.config.form_type_min_score,
            fields
                .iter()
                .flat_map(|f| f.raw_names.iter().map(String::as_str))
                .chain(rendered.iter().map(String::as_str)),
        );
        let form_id = profile::extract_form_id(
            &document.name,
            fields.iter().map(|f| f.canonical_key.as_str()),
        );
        let fallback_block = &self.config.fallback_block;
        let detected_sections = profile::detected_sections(&naming.mappings, fallback_block);
        let missing_sections =
            profile::missing_sections(&naming.mappings, fallback_block, &options.overrides);
        let review_required = profile::review_required(&naming.mappings, &naming.collisions);

        let report = EngineReport {
            document,
            primary_backend: self.primary.clone(),
            form_type,
            form_id,
            backends: aggregation.report.backends,
            total_unique_fields: aggregation.report.total_unique_fields,
            reconciled_fields: fields.len(),
            accessible_fields,
            inaccessible_fields: fields.len() - accessible_fields,
            single_source_fields: aggregation.report.single_source_fields,
            type_conflicts: aggregation.report.type_conflicts,
            dropped_records: aggregation.report.dropped_records,
            prefix_folds: normalization.folds,
            unmatched_prefixed_fields: normalization.unmatched,
            prefix_conflicts: normalization.prefix_conflicts,
            radio_groups: grouping.groups.clone(),
            grouping_warnings: grouping.warnings,
            accessibility_suggestions: suggestions,
            naming_conflicts: naming.collisions,
            rejected_overrides: naming.rejected_overrides,
            confidence: ConfidenceHistogram::from_mappings(&naming.mappings),
            detected_sections,
            field_type_distribution: profile::field_type_distribution(&fields),
            missing_sections,
            review_required,
            warnings,
        };

        tracing::info!(
            document = %report.document.name,
            fields = report.reconciled_fields,
            groups = report.radio_groups.len(),
            collisions = report.naming_conflicts.len(),
            "document reconciled"
        );

        Ok(EngineOutput {
            mappings: naming.mappings,
            fields,
            groups: grouping.groups,
            report,
        })
    }
}

