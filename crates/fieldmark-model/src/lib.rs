//! Fieldmark field model
//!
//! Shared vocabulary for every stage of the reconciliation pipeline:
//!
//! - raw records as reported by one extraction backend ([`RawFieldRecord`]),
//! - reconciled fields ([`UnifiedField`]) and reconstructed groups
//!   ([`RadioGroup`]),
//! - canonical BEM-style names ([`CanonicalName`]) and the final
//!   [`MappingEntry`] output.
//!
//! The name grammar lives in [`grammar`]; document version digests in
//! [`digest`].

pub mod digest;
pub mod grammar;

pub use grammar::{
    is_valid_segment, parse_canonical_name, validate_name, CanonicalName, GrammarViolation,
    NameValidator, DEFAULT_MAX_NAME_LENGTH, GROUP_SUFFIX,
};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of an extraction backend (e.g. `"acroform"`, `"widgets"`).
pub type BackendId = String;

// ============================================================================
// Field types
// ============================================================================

/// Interactive field kinds, normalized across backends.
///
/// Serializes as snake_case; deserializes from any backend label accepted by
/// [`FieldType::from_label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum FieldType {
    Text,
    Checkbox,
    RadioButton,
    RadioGroup,
    Group,
    Dropdown,
    ListBox,
    Signature,
    SignatureDate,
    Button,
    Unknown,
}

impl FieldType {
    /// Map a backend's type label onto a [`FieldType`].
    ///
    /// Matching ignores case and any non-alphanumeric characters, so
    /// `"Radio Button"`, `"radio_button"` and `"RadioButton"` are the same.
    pub fn from_label(label: &str) -> Self {
        let norm: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match norm.as_str() {
            "text" | "textfield" | "tx" | "textbox" => FieldType::Text,
            "checkbox" | "check" | "cb" => FieldType::Checkbox,
            "radio" | "radiobutton" | "option" => FieldType::RadioButton,
            "radiogroup" => FieldType::RadioGroup,
            "group" => FieldType::Group,
            "dropdown" | "combobox" | "combo" | "choice" | "ch" => FieldType::Dropdown,
            "listbox" | "list" => FieldType::ListBox,
            "signature" | "sig" => FieldType::Signature,
            "signaturedate" => FieldType::SignatureDate,
            "button" | "pushbutton" | "btn" => FieldType::Button,
            _ => FieldType::Unknown,
        }
    }

    /// Options that can take part in a radio/checkbox group.
    pub fn is_selectable(self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::RadioButton)
    }

    /// Group containers reported by a backend.
    pub fn is_container(self) -> bool {
        matches!(self, FieldType::RadioGroup | FieldType::Group)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Checkbox => "checkbox",
            FieldType::RadioButton => "radio_button",
            FieldType::RadioGroup => "radio_group",
            FieldType::Group => "group",
            FieldType::Dropdown => "dropdown",
            FieldType::ListBox => "list_box",
            FieldType::Signature => "signature",
            FieldType::SignatureDate => "signature_date",
            FieldType::Button => "button",
            FieldType::Unknown => "unknown",
        }
    }
}

impl From<String> for FieldType {
    fn from(label: String) -> Self {
        FieldType::from_label(&label)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Widget rectangle in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Page index (0-based).
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Position {
    pub fn new(page: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Top edge (larger y is higher on the page).
    pub fn top(&self) -> f64 {
        self.y + self.height.max(0.0)
    }

    /// `[bottom, top]` interval occupied on the page.
    pub fn vertical_band(&self) -> (f64, f64) {
        (self.y, self.top())
    }

    /// Same page and intersecting vertical bands (touching counts).
    pub fn overlaps_vertically(&self, other: &Position) -> bool {
        if self.page != other.page {
            return false;
        }
        let (a0, a1) = self.vertical_band();
        let (b0, b1) = other.vertical_band();
        a0 <= b1 && b0 <= a1
    }

    /// Reading order: page, then top to bottom, then left to right.
    pub fn document_order(&self, other: &Position) -> Ordering {
        self.page
            .cmp(&other.page)
            .then_with(|| other.top().total_cmp(&self.top()))
            .then_with(|| self.x.total_cmp(&other.x))
    }
}

// ============================================================================
// Records and reconciled fields
// ============================================================================

/// One field as reported by one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFieldRecord {
    #[serde(default)]
    pub source_backend: BackendId,
    pub raw_name: String,
    #[serde(default = "unknown_field_type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub is_container: bool,
}

fn unknown_field_type() -> FieldType {
    FieldType::Unknown
}

impl RawFieldRecord {
    pub fn new(source_backend: &str, raw_name: &str, field_type: FieldType) -> Self {
        Self {
            source_backend: source_backend.to_string(),
            raw_name: raw_name.to_string(),
            field_type,
            position: None,
            properties: BTreeMap::new(),
            is_container: field_type.is_container(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn as_container(mut self) -> Self {
        self.is_container = true;
        self
    }
}

/// Best accessible match for a field the primary backend cannot write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilitySuggestion {
    pub target_key: String,
    pub score: f64,
}

/// A logical field after merging every backend's report of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedField {
    pub canonical_key: String,
    pub raw_names: BTreeSet<String>,
    pub reporting_backends: BTreeSet<BackendId>,
    pub field_type: FieldType,
    pub normalized_prefix: Option<String>,
    pub position: Option<Position>,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    pub is_accessible: bool,
    pub accessibility_suggestion: Option<AccessibilitySuggestion>,
}

impl UnifiedField {
    /// Seed a field from its first record.
    pub fn from_record(record: &RawFieldRecord, is_accessible: bool) -> Self {
        Self {
            canonical_key: record.raw_name.clone(),
            raw_names: BTreeSet::from([record.raw_name.clone()]),
            reporting_backends: BTreeSet::from([record.source_backend.clone()]),
            field_type: record.field_type,
            normalized_prefix: None,
            position: record.position,
            is_container: record.is_container || record.field_type.is_container(),
            properties: record.properties.clone(),
            is_accessible,
            accessibility_suggestion: None,
        }
    }

    pub fn is_selectable(&self) -> bool {
        self.field_type.is_selectable()
    }

    pub fn is_group_anchor(&self) -> bool {
        self.is_container || self.field_type.is_container()
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Which heuristic produced a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSignal {
    ExplicitContainer,
    NamingStem,
    PositionalAdjacency,
}

/// A set of selectable options that behave as one choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioGroup {
    pub group_key: String,
    /// Member canonical keys in document order.
    pub member_keys: Vec<String>,
    pub group_field_type: FieldType,
    pub signal: GroupSignal,
}

impl RadioGroup {
    pub fn contains(&self, key: &str) -> bool {
        self.member_keys.iter().any(|k| k == key)
    }
}

// ============================================================================
// Mapping output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// The lower of two confidences.
    pub fn min(self, other: Confidence) -> Confidence {
        std::cmp::max(self, other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mapping entry names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MappingSubject {
    Field,
    Group,
    GroupOption { group_key: String },
}

/// Final naming decision for one field or group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub unified_field_key: String,
    pub canonical_name: CanonicalName,
    pub confidence: Confidence,
    pub subject: MappingSubject,
    pub reasoning: String,
}

impl MappingEntry {
    pub fn rendered_name(&self) -> String {
        self.canonical_name.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_labels_are_forgiving() {
        assert_eq!(FieldType::from_label("Radio Button"), FieldType::RadioButton);
        assert_eq!(FieldType::from_label("radio_group"), FieldType::RadioGroup);
        assert_eq!(FieldType::from_label("Tx"), FieldType::Text);
        assert_eq!(FieldType::from_label("/Btn"), FieldType::Button);
        assert_eq!(FieldType::from_label("hologram"), FieldType::Unknown);
    }

    #[test]
    fn vertical_overlap_requires_same_page() {
        let a = Position::new(0, 10.0, 100.0, 12.0, 12.0);
        let b = Position::new(0, 60.0, 105.0, 12.0, 12.0);
        let c = Position::new(1, 60.0, 105.0, 12.0, 12.0);
        let d = Position::new(0, 60.0, 140.0, 12.0, 12.0);
        assert!(a.overlaps_vertically(&b));
        assert!(!a.overlaps_vertically(&c));
        assert!(!a.overlaps_vertically(&d));
    }

    #[test]
    fn document_order_is_top_down_then_left_right() {
        let top_left = Position::new(0, 10.0, 700.0, 10.0, 10.0);
        let top_right = Position::new(0, 300.0, 700.0, 10.0, 10.0);
        let lower = Position::new(0, 10.0, 400.0, 10.0, 10.0);
        let next_page = Position::new(1, 10.0, 750.0, 10.0, 10.0);
        assert_eq!(top_left.document_order(&top_right), Ordering::Less);
        assert_eq!(top_right.document_order(&lower), Ordering::Less);
        assert_eq!(lower.document_order(&next_page), Ordering::Less);
    }

    #[test]
    fn confidence_min_picks_lower() {
        assert_eq!(Confidence::High.min(Confidence::Medium), Confidence::Medium);
        assert_eq!(Confidence::Low.min(Confidence::Medium), Confidence::Low);
    }

    #[test]
    fn raw_record_deserializes_with_defaults() {
        let record: RawFieldRecord =
            serde_json::from_str(r#"{"raw_name": "FIRST_NAME", "field_type": "text"}"#).unwrap();
        assert_eq!(record.raw_name, "FIRST_NAME");
        assert_eq!(record.field_type, FieldType::Text);
        assert!(record.source_backend.is_empty());

        let radio: RawFieldRecord =
            serde_json::from_str(r#"{"raw_name": "DIV_OPT_A", "field_type": "RadioButton"}"#).unwrap();
        assert_eq!(radio.field_type, FieldType::RadioButton);
        assert_eq!(serde_json::to_string(&radio.field_type).unwrap(), "\"radio_button\"");
        assert!(record.position.is_none());
    }
}
