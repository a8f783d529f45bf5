//! Form-level profile and naming quality.
//!
//! Describes the form as a whole: which known form type it looks like, the
//! form ID printed in its file name or field names, which sections its names
//! landed in, and which names a reviewer should look at first.

use crate::config::FormTypeRule;
use crate::naming::NameCollision;
use fieldmark_model::{Confidence, MappingEntry, UnifiedField};
use nom::{
    bytes::complete::{tag_no_case, take_while_m_n},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{opt, recognize},
    sequence::{pair, tuple},
    IResult,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

// ============================================================================
// Form type
// ============================================================================

/// Best-scoring form type, where a rule scores one point per keyword found
/// anywhere in `texts`. Ties go to the earlier rule.
pub fn detect_form_type<'a>(
    rules: &[FormTypeRule],
    min_score: usize,
    texts: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let haystack = texts
        .into_iter()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mut best: Option<(&FormTypeRule, usize)> = None;
    for rule in rules {
        let score = rule
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty() && haystack.contains(k.as_str()))
            .count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((rule, score));
        }
    }
    best.filter(|&(_, score)| score >= min_score)
        .map(|(rule, _)| rule.name.clone())
}

// ============================================================================
// Form ID
// ============================================================================

type IdScanner = fn(&str) -> IResult<&str, &str>;

/// Tried in order; an earlier shape anywhere beats a later one.
const FORM_ID_SHAPES: [IdScanner; 3] = [numbered_id, lettered_id, form_number];

/// `1234`, `1234A`
fn numbered_id(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
        opt(satisfy(|c| c.is_ascii_alphabetic())),
    ))(input)
}

/// `ABC-1234`
fn lettered_id(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while_m_n(2, 4, |c: char| c.is_ascii_alphabetic()),
        char('-'),
        take_while_m_n(4, 4, |c: char| c.is_ascii_digit()),
    )))(input)
}

/// `Form123`, `form_12`, `FORM-7`
fn form_number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((tag_no_case("form"), opt(one_of("_-")), digit1)))(input)
}

/// Leftmost match of `scanner` in `text`.
fn scan<'a>(text: &'a str, scanner: IdScanner) -> Option<&'a str> {
    text.char_indices()
        .find_map(|(i, _)| scanner(&text[i..]).ok().map(|(_, id)| id))
}

fn find_form_id(text: &str) -> Option<&str> {
    FORM_ID_SHAPES.iter().find_map(|&scanner| scan(text, scanner))
}

/// Form ID from the document's file stem, else from the first field name
/// carrying one.
pub fn extract_form_id<'a>(
    document_name: &str,
    field_names: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let stem = Path::new(document_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(document_name);
    find_form_id(stem)
        .or_else(|| field_names.into_iter().find_map(find_form_id))
        .map(str::to_string)
}

// ============================================================================
// Quality
// ============================================================================

/// Distinct blocks the names use, other than `fallback_block`.
pub fn detected_sections(mappings: &[MappingEntry], fallback_block: &str) -> Vec<String> {
    mappings
        .iter()
        .map(|m| m.canonical_name.block())
        .filter(|block| *block != fallback_block)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Unified fields per field type label.
pub fn field_type_distribution(fields: &[UnifiedField]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for field in fields {
        *distribution
            .entry(field.field_type.as_str().to_string())
            .or_insert(0) += 1;
    }
    distribution
}

/// Subjects that found no section and were named under `fallback_block`.
/// Names fixed by an accepted override are not counted.
pub fn missing_sections(
    mappings: &[MappingEntry],
    fallback_block: &str,
    overrides: &BTreeMap<String, String>,
) -> Vec<String> {
    mappings
        .iter()
        .filter(|m| m.canonical_name.block() == fallback_block)
        .filter(|m| overrides.get(&m.unified_field_key) != Some(&m.rendered_name()))
        .map(|m| m.unified_field_key.clone())
        .collect()
}

/// Subjects named with low confidence or renamed to resolve a collision.
pub fn review_required(mappings: &[MappingEntry], collisions: &[NameCollision]) -> Vec<String> {
    let renamed: HashSet<&str> = collisions.iter().map(|c| c.key.as_str()).collect();
    mappings
        .iter()
        .filter(|m| {
            m.confidence == Confidence::Low || renamed.contains(m.unified_field_key.as_str())
        })
        .map(|m| m.unified_field_key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use fieldmark_model::{CanonicalName, FieldType, MappingSubject, RawFieldRecord};

    fn mapping(key: &str, block: &str, confidence: Confidence) -> MappingEntry {
        MappingEntry {
            unified_field_key: key.to_string(),
            canonical_name: CanonicalName::new(block, Some("x"), None).unwrap(),
            confidence,
            subject: MappingSubject::Field,
            reasoning: String::new(),
        }
    }

    #[test]
    fn form_type_needs_two_keyword_hits() {
        let rules = EngineConfig::default().form_types;
        assert_eq!(
            detect_form_type(&rules, 2, ["BENEFICIARY_NAME", "CONTINGENT_PCT"]).as_deref(),
            Some("Beneficiary Designation")
        );
        assert_eq!(
            detect_form_type(&rules, 2, ["NEW_MAILING_ADDRESS", "RESIDENCE_PHONE"]).as_deref(),
            Some("Change of Address")
        );
        assert_eq!(detect_form_type(&rules, 2, ["ADDRESS"]), None);
        assert_eq!(detect_form_type(&rules, 2, std::iter::empty()), None);
    }

    #[test]
    fn form_type_ties_go_to_earlier_rule() {
        let rules = vec![
            FormTypeRule::new("First", &["alpha", "beta"]),
            FormTypeRule::new("Second", &["beta", "alpha"]),
        ];
        assert_eq!(
            detect_form_type(&rules, 1, ["ALPHA_BETA"]).as_deref(),
            Some("First")
        );
    }

    #[test]
    fn form_id_shapes_in_priority_order() {
        assert_eq!(extract_form_id("ICC-1234.pdf", []).as_deref(), Some("1234"));
        assert_eq!(extract_form_id("ABCDE-123.pdf", []), None);
        assert_eq!(extract_form_id("svc-2024b-final.pdf", []).as_deref(), Some("2024b"));
        assert_eq!(extract_form_id("lf-form_12.pdf", []).as_deref(), Some("form_12"));
        assert_eq!(extract_form_id("AB-CD.pdf", []), None);
    }

    #[test]
    fn form_id_falls_back_to_field_names() {
        assert_eq!(
            extract_form_id("change-request.pdf", ["OWNER_NAME", "FORM7_REV"]).as_deref(),
            Some("FORM7")
        );
        assert_eq!(extract_form_id("change-request.pdf", ["OWNER_NAME"]), None);
    }

    #[test]
    fn quality_lists() {
        let mappings = vec![
            mapping("OWNER_CITY", "owner-information", Confidence::High),
            mapping("FAVORITE_COLOR", "general", Confidence::Medium),
            mapping("12", "general", Confidence::Low),
            mapping("BEN_PCT", "beneficiary", Confidence::High),
            mapping("BEN PCT", "beneficiary", Confidence::Medium),
        ];
        assert_eq!(
            detected_sections(&mappings, "general"),
            ["beneficiary", "owner-information"]
        );

        let overrides = BTreeMap::from([("FAVORITE_COLOR".to_string(), "general_x".to_string())]);
        assert_eq!(missing_sections(&mappings, "general", &overrides), ["12"]);

        let collisions = vec![NameCollision {
            key: "BEN PCT".to_string(),
            attempted: "beneficiary_x".to_string(),
            resolved: "beneficiary_x-2".to_string(),
        }];
        assert_eq!(review_required(&mappings, &collisions), ["12", "BEN PCT"]);
    }

    #[test]
    fn distribution_counts_field_types() {
        let fields: Vec<UnifiedField> = [
            ("A", FieldType::Text),
            ("B", FieldType::Text),
            ("C", FieldType::RadioButton),
        ]
        .iter()
        .map(|(name, ty)| UnifiedField::from_record(&RawFieldRecord::new("acroform", name, *ty), true))
        .collect();
        let distribution = field_type_distribution(&fields);
        assert_eq!(distribution.get("text"), Some(&2));
        assert_eq!(distribution.get("radio_button"), Some(&1));
        assert_eq!(distribution.len(), 2);
    }
}
