//! Integration tests for the complete Fieldmark pipeline
//!
//! These tests drive every crate together:
//! - sidecar JSON dumps → backends → aggregation
//! - prefix folding → radio groups → accessibility → names
//! - report serialization and the result cache
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use fieldmark_ingest::{
    BackendAdapter, BackendError, BackendStatus, Document, JsonDumpBackend,
};
use fieldmark_model::{validate_name, Confidence, RawFieldRecord};
use fieldmark_reconcile::{Engine, EngineConfig, EngineOutput, RunOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

struct StalledBackend;

#[async_trait]
impl BackendAdapter for StalledBackend {
    fn id(&self) -> &str {
        "ocr-layout"
    }

    async fn extract(&self, _document: &Document) -> Result<Vec<RawFieldRecord>, BackendError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

fn write_form(dir: &Path) -> Document {
    let path = dir.join("dividend-election.pdf");
    std::fs::write(&path, b"%PDF-1.7\n% dividend election form\n").unwrap();

    // The mutation backend sees the flat widgets.
    std::fs::write(
        dir.join("dividend-election.pdf.acroform.fields.json"),
        r#"[
            {"raw_name": "FIRST_NAME", "field_type": "Tx"},
            {"raw_name": "POL_NUM", "field_type": "Tx"},
            {"raw_name": "DIV_OPT_A", "field_type": "radio",
             "position": {"page": 0, "x": 72.0, "y": 500.0, "width": 10.0, "height": 10.0}},
            {"raw_name": "DIV_OPT_B", "field_type": "radio",
             "position": {"page": 0, "x": 72.0, "y": 480.0, "width": 10.0, "height": 10.0}},
            {"raw_name": "DIV_OPT_C", "field_type": "radio",
             "position": {"page": 0, "x": 72.0, "y": 460.0, "width": 10.0, "height": 10.0}},
            {"raw_name": "SIG_DATE", "field_type": "signature date"}
        ]"#,
    )
    .unwrap();

    // The layout backend sees role-qualified names and a field the
    // mutation backend misses.
    std::fs::write(
        dir.join("dividend-election.pdf.layout.fields.json"),
        r#"{"fields": [
            {"raw_name": "OWNER.FIRST_NAME", "field_type": "text"},
            {"raw_name": "POL_NUM", "field_type": "text"},
            {"raw_name": "OWNER_SIGNATURE", "field_type": "signature"},
            {"raw_name": "", "field_type": "text"}
        ]}"#,
    )
    .unwrap();

    Document::from_path(&path).unwrap()
}

fn engine() -> Engine {
    let config = EngineConfig {
        backend_timeout_ms: 200,
        ..EngineConfig::default()
    };
    let adapters: Vec<Arc<dyn BackendAdapter>> = vec![
        Arc::new(JsonDumpBackend::sidecar("acroform").primary()),
        Arc::new(JsonDumpBackend::sidecar("layout")),
        Arc::new(StalledBackend),
    ];
    Engine::new(config, adapters).unwrap()
}

fn name_of(output: &EngineOutput, key: &str) -> String {
    output.mapping_for(key).unwrap().rendered_name()
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_dividend_election_form_end_to_end() {
    let dir = tempdir().unwrap();
    let document = write_form(dir.path());
    let engine = engine();

    let output = engine.run(&document, &RunOptions::default()).await.unwrap();
    let report = &output.report;

    // Backends
    assert_eq!(report.primary_backend, "acroform");
    assert_eq!(report.backends.len(), 3);
    assert!(matches!(
        report.backends[2].status,
        BackendStatus::Failed {
            error: BackendError::Unavailable { .. }
        }
    ));
    assert_eq!(report.dropped_records.len(), 1);

    // Prefix folding
    assert_eq!(report.prefix_folds.len(), 1);
    assert!(output.field("OWNER.FIRST_NAME").is_none());
    assert_eq!(name_of(&output, "FIRST_NAME"), "owner-information_first-name");

    // Radio group
    assert_eq!(report.radio_groups.len(), 1);
    assert_eq!(name_of(&output, "DIV_OPT"), "dividend_option--group");
    assert_eq!(name_of(&output, "DIV_OPT_B"), "dividend_option__b");

    // Accessibility
    let signature = output.field("OWNER_SIGNATURE").unwrap();
    assert!(!signature.is_accessible);
    assert_eq!(report.inaccessible_fields, 1);
    assert_eq!(report.accessible_fields, output.fields.len() - 1);

    // Names
    assert_eq!(name_of(&output, "SIG_DATE"), "signature_date");
    for mapping in &output.mappings {
        assert!(validate_name(&mapping.rendered_name()).is_ok());
    }
    assert_eq!(report.confidence.total(), output.mappings.len());
    assert!(output
        .mappings
        .iter()
        .filter(|m| m.unified_field_key.starts_with("DIV_OPT"))
        .all(|m| m.confidence == Confidence::High));

    // Rename plan covers what the mutation backend can touch.
    let plan = output.rename_plan();
    assert!(plan.contains_key("FIRST_NAME"));
    assert!(plan.contains_key("DIV_OPT_A"));
    assert!(!plan.contains_key("OWNER_SIGNATURE"));
    assert!(!plan.contains_key("DIV_OPT"));
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    let dir = tempdir().unwrap();
    let document = write_form(dir.path());
    let output = engine().run(&document, &RunOptions::default()).await.unwrap();

    let json = serde_json::to_value(output.as_ref()).unwrap();
    assert_eq!(json["report"]["document"]["name"], "dividend-election.pdf");
    assert_eq!(json["report"]["backends"][2]["status"]["status"], "failed");
    assert_eq!(
        json["report"]["backends"][2]["status"]["error"]["kind"],
        "unavailable"
    );

    let restored: EngineOutput = serde_json::from_value(json).unwrap();
    assert_eq!(&restored, output.as_ref());
}

#[tokio::test]
async fn test_edited_document_invalidates_cache() {
    let dir = tempdir().unwrap();
    let document = write_form(dir.path());
    let engine = engine();

    let first = engine.run(&document, &RunOptions::default()).await.unwrap();
    let again = engine.run(&document, &RunOptions::default()).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    // Same file name, new bytes, new sidecar contents.
    let path = dir.path().join("dividend-election.pdf");
    std::fs::write(&path, b"%PDF-1.7\n% revised\n").unwrap();
    std::fs::write(
        dir.path().join("dividend-election.pdf.acroform.fields.json"),
        r#"[{"raw_name": "BEN_PCT", "field_type": "Tx"}]"#,
    )
    .unwrap();
    let revised = Document::from_path(&path).unwrap();

    let updated = engine.run(&revised, &RunOptions::default()).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &updated));
    assert_eq!(name_of(&updated, "BEN_PCT"), "beneficiary_percent");
    assert_eq!(engine.cache().len(), 1);
}
