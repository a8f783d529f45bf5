//! Fieldmark reconciliation: unified fields → canonical names
//!
//! Takes the merged field set produced by `fieldmark-ingest` and turns it
//! into one validated BEM-style name per field and per radio group.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌───────────────┐   ┌────────┐
//! │ backends │──►│ aggregate │──►│ prefix  │──►│ radio groups  │──►│ access │
//! │ (tokio)  │   │ (ingest)  │   │ folding │   │ (3 signals)   │   │ class. │
//! └──────────┘   └───────────┘   └─────────┘   └───────────────┘   └───┬────┘
//!                                                                      │
//!                               ┌──────────┐   ┌───────────────────┐   │
//!                               │  report  │◄──│ name generation + │◄──┘
//!                               │ + cache  │   │ grammar check     │
//!                               └──────────┘   └───────────────────┘
//! ```
//!
//! Only extraction runs concurrently. Every later stage is a pure,
//! deterministic function of its input, so the same backend runs always
//! produce the same names.
//!
//! ## Example
//!
//! ```no_run
//! use fieldmark_ingest::{BackendAdapter, Document, JsonDumpBackend};
//! use fieldmark_reconcile::{Engine, EngineConfig, RunOptions};
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let adapters: Vec<Arc<dyn BackendAdapter>> = vec![
//!     Arc::new(JsonDumpBackend::sidecar("acroform").primary()),
//!     Arc::new(JsonDumpBackend::sidecar("layout")),
//! ];
//! let engine = Engine::new(EngineConfig::default(), adapters)?;
//! let document = Document::from_path("forms/change-request.pdf".as_ref())?;
//! let output = engine.run(&document, &RunOptions::default()).await?;
//! for (key, name) in output.rename_plan() {
//!     println!("{key} -> {name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod accessibility;
pub mod batch;
pub mod cache;
pub mod config;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod radio;
pub mod report;
pub mod tokens;

pub use accessibility::{AccessibilityClassifier, SuggestionReport};
pub use batch::{BatchFailure, BatchOutcome, BatchSummary};
pub use cache::ResultCache;
pub use config::{ConfigError, EngineConfig, FormTypeRule, SectionRule};
pub use naming::{NameCollision, NameGenerator, NamingOutcome, OverrideRejection, RejectedOverride};
pub use normalize::{NormalizationReport, PrefixConflict, PrefixFold, PrefixNormalizer};
pub use pipeline::{Engine, EngineError, EngineOutput, RunOptions};
pub use radio::{reconstruct_groups, Ambiguity, AmbiguousGrouping, GroupingOutcome};
pub use report::{ConfidenceHistogram, EngineReport};
