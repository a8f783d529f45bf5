//! Canonical name generation.
//!
//! Each standalone field and each radio group gets a BEM-style name:
//!
//! - **block**: the section, inferred from the role prefix and then from the
//!   name itself; `general` when nothing matches
//! - **element**: the cleaned, abbreviation-expanded base name with the
//!   section keyword removed
//! - **modifier**: for group options, the part that tells the options apart
//!
//! Names are unique across the output. A collision appends `-2`, `-3`, ...
//! to the most specific segment and lowers confidence. External overrides
//! are validated and reserved before anything is generated.

use crate::config::{ConfigError, EngineConfig, SectionRule};
use crate::normalize::PrefixNormalizer;
use crate::radio::anchor_base;
use crate::tokens::{to_segment, tokenize, Abbreviations, SectionMatch, SectionTable};
use fieldmark_model::{
    CanonicalName, Confidence, GrammarViolation, GroupSignal, MappingEntry, MappingSubject,
    NameValidator, RadioGroup, UnifiedField, GROUP_SUFFIX,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Property holding an option's export value.
pub const EXPORT_VALUE_PROPERTY: &str = "export_value";

const OPTION_SEPARATORS: [char; 3] = ['.', '_', '-'];

// ============================================================================
// Outcome types
// ============================================================================

/// A generated name that was already taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCollision {
    pub key: String,
    pub attempted: String,
    pub resolved: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideRejection {
    Grammar { violation: GrammarViolation },
    Collision { with_key: String },
    UnknownSubject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedOverride {
    pub key: String,
    pub name: String,
    pub rejection: OverrideRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamingOutcome {
    pub mappings: Vec<MappingEntry>,
    pub collisions: Vec<NameCollision>,
    pub rejected_overrides: Vec<RejectedOverride>,
}

// ============================================================================
// Generator
// ============================================================================

#[derive(Debug, Clone)]
pub struct NameGenerator {
    sections: SectionTable,
    abbreviations: Abbreviations,
    normalizer: PrefixNormalizer,
    validator: NameValidator,
    fallback_block: String,
    fallback_element: String,
    /// `fallback_block_fallback_element`, used when a generated name fails
    /// validation.
    fallback_field: CanonicalName,
    fallback_group: CanonicalName,
    disambiguation_start: u32,
    strong_similarity: f64,
}

/// Where the block came from.
#[derive(Debug, Clone)]
enum Section {
    Prefix(SectionMatch),
    Keyword(SectionMatch),
    Fallback,
}

struct Inference {
    section: Section,
    element: Option<String>,
}

struct Draft {
    key: String,
    subject: MappingSubject,
    name: CanonicalName,
    confidence: Confidence,
    reasoning: Vec<String>,
}

#[derive(Default)]
struct Assignment {
    taken: HashSet<String>,
    overrides: HashMap<String, CanonicalName>,
    outcome: NamingOutcome,
}

impl NameGenerator {
    /// `hints` are tried before the configured sections.
    pub fn new(config: &EngineConfig, hints: &[SectionRule]) -> Result<Self, ConfigError> {
        config.validate()?;
        for hint in hints {
            crate::config::validate_section(hint)?;
        }
        let invalid_fallback = |_| ConfigError::InvalidBlock {
            block: config.fallback_block.clone(),
        };
        let element = Some(config.fallback_element.as_str());
        let fallback_field =
            CanonicalName::new(&config.fallback_block, element, None).map_err(invalid_fallback)?;
        let fallback_group =
            CanonicalName::group(&config.fallback_block, element).map_err(invalid_fallback)?;

        let abbreviations = Abbreviations::new(&config.abbreviations);
        let sections = SectionTable::new(hints.iter().chain(&config.sections), &abbreviations);
        Ok(Self {
            sections,
            abbreviations,
            normalizer: PrefixNormalizer::new(&config.prefixes),
            validator: NameValidator::new(config.max_name_length),
            fallback_block: config.fallback_block.clone(),
            fallback_element: config.fallback_element.clone(),
            fallback_field,
            fallback_group,
            disambiguation_start: config.disambiguation_start,
            strong_similarity: config.strong_similarity,
        })
    }

    /// Name every standalone field and every group, in field order. A
    /// group is emitted where its anchor or first member appears, followed
    /// by its options in member order.
    pub fn generate(
        &self,
        fields: &[UnifiedField],
        groups: &[RadioGroup],
        overrides: &BTreeMap<String, String>,
    ) -> NamingOutcome {
        let by_key: HashMap<&str, &UnifiedField> =
            fields.iter().map(|f| (f.canonical_key.as_str(), f)).collect();
        let mut group_of: HashMap<&str, usize> = HashMap::new();
        for (g, group) in groups.iter().enumerate() {
            group_of.insert(group.group_key.as_str(), g);
            for member in &group.member_keys {
                group_of.insert(member.as_str(), g);
            }
        }

        let mut state = Assignment::default();
        self.reserve_overrides(overrides, &by_key, &group_of, &mut state);

        let mut emitted = vec![false; groups.len()];
        for field in fields {
            match group_of.get(field.canonical_key.as_str()) {
                Some(&g) => {
                    if !emitted[g] {
                        emitted[g] = true;
                        self.emit_group(&groups[g], &by_key, &mut state);
                    }
                }
                None => {
                    let draft = self.field_draft(field, &state);
                    self.commit(draft, &mut state);
                }
            }
        }
        for (g, group) in groups.iter().enumerate() {
            if !emitted[g] {
                self.emit_group(group, &by_key, &mut state);
            }
        }

        state.outcome
    }

    fn reserve_overrides(
        &self,
        overrides: &BTreeMap<String, String>,
        by_key: &HashMap<&str, &UnifiedField>,
        group_of: &HashMap<&str, usize>,
        state: &mut Assignment,
    ) {
        let mut owners: HashMap<String, String> = HashMap::new();
        for (key, name) in overrides {
            let known = by_key.contains_key(key.as_str()) || group_of.contains_key(key.as_str());
            let rejection = if !known {
                Some(OverrideRejection::UnknownSubject)
            } else {
                match self.validator.check(name) {
                    Err(violation) => Some(OverrideRejection::Grammar { violation }),
                    Ok(parsed) => match owners.get(name) {
                        Some(owner) => Some(OverrideRejection::Collision {
                            with_key: owner.clone(),
                        }),
                        None => {
                            owners.insert(name.clone(), key.clone());
                            state.taken.insert(parsed.render());
                            state.overrides.insert(key.clone(), parsed);
                            None
                        }
                    },
                }
            };

            if let Some(rejection) = rejection {
                tracing::warn!(key = %key, name = %name, rejection = ?rejection, "rejected name override");
                state.outcome.rejected_overrides.push(RejectedOverride {
                    key: key.clone(),
                    name: name.clone(),
                    rejection,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Drafting
    // ------------------------------------------------------------------------

    fn infer(&self, prefix: Option<&str>, base: &str) -> Inference {
        let mut tokens = self.abbreviations.expand(&tokenize(base));
        let from_prefix =
            prefix.and_then(|p| self.sections.find(&self.abbreviations.expand(&tokenize(p))));

        let section = match from_prefix {
            Some(hit) => Section::Prefix(hit),
            None => match self.sections.find(&tokens) {
                Some(hit) => {
                    tokens.drain(hit.start..hit.start + hit.len);
                    Section::Keyword(hit)
                }
                None => Section::Fallback,
            },
        };
        Inference {
            section,
            element: to_segment(&tokens),
        }
    }

    fn block_of(&self, section: &Section, reasoning: &mut Vec<String>) -> Option<String> {
        match section {
            Section::Prefix(hit) => {
                reasoning.push(format!("section `{}` from role prefix", hit.block));
                Some(hit.block.clone())
            }
            Section::Keyword(hit) => {
                reasoning.push(format!("section `{}` from keyword `{}`", hit.block, hit.keyword));
                Some(hit.block.clone())
            }
            Section::Fallback => {
                reasoning.push(format!("no section keyword, fallback block `{}`", self.fallback_block));
                None
            }
        }
    }

    fn field_draft(&self, field: &UnifiedField, state: &Assignment) -> Draft {
        let key = field.canonical_key.clone();
        if let Some(name) = state.overrides.get(&key) {
            return Draft {
                key,
                subject: MappingSubject::Field,
                name: name.clone(),
                confidence: Confidence::High,
                reasoning: vec!["external override".to_string()],
            };
        }

        let base = self.normalizer.base_name(&field.canonical_key);
        let inference = self.infer(field.normalized_prefix.as_deref(), base);
        let mut reasoning = Vec::new();
        let block = self.block_of(&inference.section, &mut reasoning);

        let (element, confidence) = match (&block, inference.element) {
            (Some(_), Some(element)) => {
                reasoning.push(format!("element from `{base}`"));
                (Some(element), Confidence::High)
            }
            (Some(_), None) => {
                reasoning.push("name is only the section keyword".to_string());
                (None, Confidence::Medium)
            }
            (None, Some(element)) => {
                reasoning.push(format!("element from `{base}`"));
                (Some(element), Confidence::Medium)
            }
            (None, None) => {
                reasoning.push(format!("nothing usable in `{base}`, fallback element"));
                (Some(self.fallback_element.clone()), Confidence::Low)
            }
        };
        let confidence = self.accessibility_confidence(field, confidence, &mut reasoning);

        let parts = Parts {
            block: block.unwrap_or_else(|| self.fallback_block.clone()),
            element,
            modifier: None,
            is_group: false,
        };
        self.draft(key, MappingSubject::Field, parts, confidence, reasoning)
    }

    fn accessibility_confidence(
        &self,
        field: &UnifiedField,
        confidence: Confidence,
        reasoning: &mut Vec<String>,
    ) -> Confidence {
        match &field.accessibility_suggestion {
            Some(s) if !field.is_accessible && s.score < self.strong_similarity => {
                reasoning.push(format!(
                    "not writable; closest accessible field `{}` scores {:.2}",
                    s.target_key, s.score
                ));
                confidence.min(Confidence::Medium)
            }
            _ => confidence,
        }
    }

    fn emit_group(
        &self,
        group: &RadioGroup,
        by_key: &HashMap<&str, &UnifiedField>,
        state: &mut Assignment,
    ) {
        let members: Vec<&UnifiedField> = group
            .member_keys
            .iter()
            .filter_map(|k| by_key.get(k.as_str()).copied())
            .collect();
        let anchor = by_key.get(group.group_key.as_str()).copied();
        let prefix = anchor
            .into_iter()
            .chain(members.iter().copied())
            .find_map(|f| f.normalized_prefix.as_deref());

        let group_base = anchor_base(&group.group_key);
        let draft = match state.overrides.get(&group.group_key) {
            Some(name) => Draft {
                key: group.group_key.clone(),
                subject: MappingSubject::Group,
                name: name.clone(),
                confidence: Confidence::High,
                reasoning: vec!["external override".to_string()],
            },
            None => {
                let inference = self.infer(prefix, self.normalizer.base_name(group_base));
                let mut reasoning = Vec::new();
                let block = self.block_of(&inference.section, &mut reasoning);
                let confidence = match (&block, &inference.element) {
                    (Some(_), _) => Confidence::High,
                    (None, Some(_)) => Confidence::Medium,
                    (None, None) => Confidence::Low,
                };
                reasoning.push(format!(
                    "{} options grouped by {}",
                    group.member_keys.len(),
                    signal_label(group.signal)
                ));
                let parts = Parts {
                    block: block.unwrap_or_else(|| self.fallback_block.clone()),
                    element: inference.element,
                    modifier: None,
                    is_group: true,
                };
                self.draft(group.group_key.clone(), MappingSubject::Group, parts, confidence, reasoning)
            }
        };
        let group_confidence = draft.confidence;
        let group_name = self.commit(draft, state);

        let shared = shared_option_prefix(&group.member_keys);
        for (ordinal, member) in members.into_iter().enumerate() {
            let key = member.canonical_key.clone();
            let subject = MappingSubject::GroupOption {
                group_key: group.group_key.clone(),
            };
            if let Some(name) = state.overrides.get(&key) {
                let draft = Draft {
                    key,
                    subject,
                    name: name.clone(),
                    confidence: Confidence::High,
                    reasoning: vec!["external override".to_string()],
                };
                self.commit(draft, state);
                continue;
            }

            let mut reasoning = vec![format!("option of `{}`", group_name.render())];
            let suffix = option_suffix(group_base, shared, &member.canonical_key);
            let (modifier, mut confidence) = match to_segment(&tokenize(suffix)) {
                Some(m) => (m, group_confidence),
                None => match member
                    .properties
                    .get(EXPORT_VALUE_PROPERTY)
                    .and_then(|v| to_segment(&tokenize(v)))
                {
                    Some(m) => {
                        reasoning.push("modifier from export value".to_string());
                        (m, group_confidence)
                    }
                    None => {
                        reasoning.push("no distinguishing suffix, positional modifier".to_string());
                        (format!("option-{}", ordinal + 1), group_confidence.min(Confidence::Medium))
                    }
                },
            };
            confidence = self.accessibility_confidence(member, confidence, &mut reasoning);

            let parts = Parts {
                block: group_name.block().to_string(),
                element: group_name.element().map(str::to_string),
                modifier: Some(modifier),
                is_group: false,
            };
            let draft = self.draft(key, subject, parts, confidence, reasoning);
            self.commit(draft, state);
        }
    }

    /// Fit to the length limit and gate through the validator.
    fn draft(
        &self,
        key: String,
        subject: MappingSubject,
        parts: Parts,
        confidence: Confidence,
        mut reasoning: Vec<String>,
    ) -> Draft {
        let built = parts
            .fit(self.validator.max_length)
            .build()
            .and_then(|name| self.validator.check_name(&name).map(|()| name));
        match built {
            Ok(name) => Draft {
                key,
                subject,
                name,
                confidence,
                reasoning,
            },
            Err(violation) => {
                tracing::warn!(key = %key, violation = %violation, "generated name failed validation");
                reasoning.push(format!("generated name rejected ({violation}), fallback name"));
                let name = match subject {
                    MappingSubject::Group => self.fallback_group.clone(),
                    _ => self.fallback_field.clone(),
                };
                Draft {
                    key,
                    subject,
                    name,
                    confidence: Confidence::Low,
                    reasoning,
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Uniqueness
    // ------------------------------------------------------------------------

    /// Record `draft`, disambiguating if its name is taken. Returns the name
    /// actually assigned.
    fn commit(&self, mut draft: Draft, state: &mut Assignment) -> CanonicalName {
        let is_override = state
            .overrides
            .get(&draft.key)
            .is_some_and(|name| *name == draft.name);
        let rendered = draft.name.render();

        if !is_override && !state.taken.insert(rendered.clone()) {
            let resolved = self.disambiguate(&draft.name, &state.taken);
            let resolved_rendered = resolved.render();
            tracing::debug!(
                key = %draft.key,
                attempted = %rendered,
                resolved = %resolved_rendered,
                "name collision resolved"
            );
            state.outcome.collisions.push(NameCollision {
                key: draft.key.clone(),
                attempted: rendered,
                resolved: resolved_rendered.clone(),
            });
            state.taken.insert(resolved_rendered.clone());
            draft.reasoning.push(format!("renamed to `{resolved_rendered}` to stay unique"));
            draft.confidence = draft.confidence.min(Confidence::Medium);
            draft.name = resolved;
        }

        let assigned = draft.name.clone();
        state.outcome.mappings.push(MappingEntry {
            unified_field_key: draft.key,
            canonical_name: draft.name,
            confidence: draft.confidence,
            subject: draft.subject,
            reasoning: draft.reasoning.join("; "),
        });
        assigned
    }

    fn disambiguate(&self, name: &CanonicalName, taken: &HashSet<String>) -> CanonicalName {
        let mut n = self.disambiguation_start;
        loop {
            let candidate = Parts::from_name(name)
                .with_suffix(n, self.validator.max_length)
                .build()
                .and_then(|c| self.validator.check_name(&c).map(|()| c));
            if let Ok(candidate) = candidate {
                if !taken.contains(&candidate.render()) {
                    return candidate;
                }
            }
            n += 1;
        }
    }
}

// ============================================================================
// Name parts
// ============================================================================

/// Unvalidated segments, used while shaping a name.
#[derive(Debug, Clone)]
struct Parts {
    block: String,
    element: Option<String>,
    modifier: Option<String>,
    is_group: bool,
}

impl Parts {
    fn from_name(name: &CanonicalName) -> Self {
        Self {
            block: name.block().to_string(),
            element: name.element().map(str::to_string),
            modifier: name.modifier().map(str::to_string),
            is_group: name.is_group(),
        }
    }

    fn len(&self) -> usize {
        self.block.len()
            + self.element.as_ref().map_or(0, |e| e.len() + 1)
            + self.modifier.as_ref().map_or(0, |m| m.len() + 2)
            + if self.is_group { GROUP_SUFFIX.len() } else { 0 }
    }

    fn build(&self) -> Result<CanonicalName, GrammarViolation> {
        if self.is_group {
            CanonicalName::group(&self.block, self.element.as_deref())
        } else {
            CanonicalName::new(&self.block, self.element.as_deref(), self.modifier.as_deref())
        }
    }

    /// Shorten element, then modifier, then block until the name fits.
    fn fit(mut self, max: usize) -> Self {
        for slot in [Slot::Element, Slot::Modifier, Slot::Block] {
            let overflow = self.len().saturating_sub(max);
            if overflow == 0 {
                break;
            }
            if let Some(segment) = self.slot_mut(slot) {
                *segment = shorten(segment, overflow);
            }
        }
        self
    }

    /// Append `-n` to the most specific segment, making room for it first.
    fn with_suffix(mut self, n: u32, max: usize) -> Self {
        let suffix = format!("-{n}");
        let overflow = (self.len() + suffix.len()).saturating_sub(max);
        let slot = if self.modifier.is_some() {
            Slot::Modifier
        } else if self.element.is_some() {
            Slot::Element
        } else {
            Slot::Block
        };
        if let Some(segment) = self.slot_mut(slot) {
            if overflow > 0 {
                *segment = shorten(segment, overflow);
            }
            segment.push_str(&suffix);
        }
        // A short suffixed segment cannot absorb the whole overflow.
        for other in [Slot::Element, Slot::Block] {
            let overflow = self.len().saturating_sub(max);
            if overflow == 0 {
                break;
            }
            if other != slot {
                if let Some(segment) = self.slot_mut(other) {
                    *segment = shorten(segment, overflow);
                }
            }
        }
        self
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut String> {
        match slot {
            Slot::Block => Some(&mut self.block),
            Slot::Element => self.element.as_mut(),
            Slot::Modifier => self.modifier.as_mut(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Block,
    Element,
    Modifier,
}

/// Drop `by` bytes from the end of an ASCII segment, backing off to a token
/// boundary when the cut lands inside a token. At least one letter remains.
fn shorten(segment: &str, by: usize) -> String {
    let keep = segment.len().saturating_sub(by).max(1);
    let mut head = &segment[..keep];
    let mid_token = segment.as_bytes().get(keep).is_some_and(|&b| b != b'-');
    if mid_token {
        if let Some(i) = head.rfind('-').filter(|&i| i > 0) {
            head = &head[..i];
        }
    }
    head.trim_end_matches('-').to_string()
}

/// Common prefix of option keys, cut after its last separator.
fn shared_option_prefix(keys: &[String]) -> &str {
    let Some(first) = keys.first() else {
        return "";
    };
    let mut len = first.len();
    for key in &keys[1..] {
        len = len.min(
            first
                .bytes()
                .zip(key.bytes())
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    while len > 0 && !first.is_char_boundary(len) {
        len -= 1;
    }
    let common = &first[..len];
    match common.rfind(OPTION_SEPARATORS) {
        Some(i) => &first[..=i],
        None => "",
    }
}

/// The part of an option key that tells it apart from its siblings.
fn option_suffix<'a>(group_base: &str, shared: &str, key: &'a str) -> &'a str {
    if let Some(rest) = key.strip_prefix(group_base).filter(|rest| !rest.is_empty()) {
        return rest;
    }
    if !shared.is_empty() {
        if let Some(rest) = key.strip_prefix(shared) {
            return rest;
        }
    }
    key
}

fn signal_label(signal: GroupSignal) -> &'static str {
    match signal {
        GroupSignal::ExplicitContainer => "explicit container",
        GroupSignal::NamingStem => "naming stem",
        GroupSignal::PositionalAdjacency => "page position",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmark_model::{AccessibilitySuggestion, FieldType, RawFieldRecord};

    fn field(name: &str, ty: FieldType, accessible: bool) -> UnifiedField {
        UnifiedField::from_record(&RawFieldRecord::new("acroform", name, ty), accessible)
    }

    fn generator() -> NameGenerator {
        NameGenerator::new(&EngineConfig::default(), &[]).unwrap()
    }

    fn rendered(outcome: &NamingOutcome) -> Vec<String> {
        outcome.mappings.iter().map(|m| m.rendered_name()).collect()
    }

    #[test]
    fn prefix_drives_the_block() {
        let mut first = field("FIRST_NAME", FieldType::Text, true);
        first.normalized_prefix = Some("OWNER".to_string());
        let outcome = generator().generate(&[first], &[], &BTreeMap::new());
        assert_eq!(rendered(&outcome), ["owner-information_first-name"]);
        assert_eq!(outcome.mappings[0].confidence, Confidence::High);
    }

    #[test]
    fn keyword_is_removed_and_abbreviations_expand() {
        let fields = vec![
            field("BEN_DOB", FieldType::Text, true),
            field("SIG_DATE", FieldType::SignatureDate, true),
            field("SIGNATURE", FieldType::Signature, true),
        ];
        let outcome = generator().generate(&fields, &[], &BTreeMap::new());
        assert_eq!(
            rendered(&outcome),
            ["beneficiary_date-of-birth", "signature_date", "signature"]
        );
        assert_eq!(outcome.mappings[2].confidence, Confidence::Medium);
    }

    #[test]
    fn fallbacks_lower_confidence() {
        let fields = vec![
            field("FAVORITE_COLOR", FieldType::Text, true),
            field("12", FieldType::Text, true),
        ];
        let outcome = generator().generate(&fields, &[], &BTreeMap::new());
        assert_eq!(rendered(&outcome), ["general_favorite-color", "general_field"]);
        assert_eq!(outcome.mappings[0].confidence, Confidence::Medium);
        assert_eq!(outcome.mappings[1].confidence, Confidence::Low);
    }

    #[test]
    fn collisions_get_numeric_suffix() {
        let fields = vec![
            field("OWNER_FIRST_NAME", FieldType::Text, true),
            field("OwnerFirstName", FieldType::Text, true),
        ];
        let outcome = generator().generate(&fields, &[], &BTreeMap::new());
        assert_eq!(
            rendered(&outcome),
            ["owner-information_first-name", "owner-information_first-name-2"]
        );
        assert_eq!(outcome.mappings[0].confidence, Confidence::High);
        assert_eq!(outcome.mappings[1].confidence, Confidence::Medium);
        assert_eq!(outcome.collisions.len(), 1);
        assert_eq!(outcome.collisions[0].key, "OwnerFirstName");
    }

    #[test]
    fn groups_name_their_options() {
        let fields = vec![
            field("DIV_OPT_A", FieldType::RadioButton, false),
            field("DIV_OPT_B", FieldType::RadioButton, false),
            field("PHONE", FieldType::Text, true),
        ];
        let group = RadioGroup {
            group_key: "DIV_OPT".to_string(),
            member_keys: vec!["DIV_OPT_A".to_string(), "DIV_OPT_B".to_string()],
            group_field_type: FieldType::RadioGroup,
            signal: GroupSignal::NamingStem,
        };
        let outcome = generator().generate(&fields, &[group], &BTreeMap::new());
        assert_eq!(
            rendered(&outcome),
            [
                "dividend_option--group",
                "dividend_option__a",
                "dividend_option__b",
                "general_phone"
            ]
        );
        assert_eq!(outcome.mappings[0].subject, MappingSubject::Group);
        assert_eq!(
            outcome.mappings[1].subject,
            MappingSubject::GroupOption {
                group_key: "DIV_OPT".to_string()
            }
        );
    }

    #[test]
    fn options_without_suffix_use_export_value_then_ordinal() {
        let mut yes = field("Check Box1", FieldType::Checkbox, true);
        yes.properties.insert(EXPORT_VALUE_PROPERTY.to_string(), "Yes".to_string());
        let fields = vec![yes, field("Check Box2", FieldType::Checkbox, true)];
        let group = RadioGroup {
            group_key: "Check Box".to_string(),
            member_keys: vec!["Check Box1".to_string(), "Check Box2".to_string()],
            group_field_type: FieldType::Group,
            signal: GroupSignal::PositionalAdjacency,
        };
        let outcome = generator().generate(&fields, &[group], &BTreeMap::new());
        assert_eq!(
            rendered(&outcome),
            [
                "general_check-box--group",
                "general_check-box__yes",
                "general_check-box__option-2"
            ]
        );
    }

    #[test]
    fn overrides_are_reserved_and_validated() {
        let fields = vec![
            field("FIRST_NAME", FieldType::Text, true),
            field("OWNER_FIRST_NAME", FieldType::Text, true),
            field("LAST_NAME", FieldType::Text, true),
        ];
        let overrides = BTreeMap::from([
            ("FIRST_NAME".to_string(), "owner-information_first-name".to_string()),
            ("LAST_NAME".to_string(), "Owner_Last".to_string()),
            ("NOPE".to_string(), "general_nope".to_string()),
        ]);
        let outcome = generator().generate(&fields, &[], &overrides);
        assert_eq!(
            rendered(&outcome),
            [
                "owner-information_first-name",
                "owner-information_first-name-2",
                "general_last-name"
            ]
        );
        assert_eq!(outcome.mappings[0].confidence, Confidence::High);
        assert_eq!(outcome.rejected_overrides.len(), 2);
        assert!(outcome
            .rejected_overrides
            .iter()
            .any(|r| matches!(r.rejection, OverrideRejection::UnknownSubject)));
        assert!(outcome.rejected_overrides.iter().any(|r| matches!(
            r.rejection,
            OverrideRejection::Grammar {
                violation: GrammarViolation::Uppercase { .. }
            }
        )));
    }

    #[test]
    fn weak_suggestion_lowers_confidence() {
        let mut field = field("OWNER_SSN", FieldType::Text, false);
        field.accessibility_suggestion = Some(AccessibilitySuggestion {
            target_key: "SSN".to_string(),
            score: 0.5,
        });
        let outcome = generator().generate(&[field], &[], &BTreeMap::new());
        assert_eq!(rendered(&outcome), ["owner-information_social-security-number"]);
        assert_eq!(outcome.mappings[0].confidence, Confidence::Medium);
    }

    #[test]
    fn long_names_are_truncated_to_fit() {
        let config = EngineConfig {
            max_name_length: 24,
            ..EngineConfig::default()
        };
        let generator = NameGenerator::new(&config, &[]).unwrap();
        let fields = vec![
            field("BENEFICIARY_EXTRAORDINARILY_LONG_DESCRIPTION", FieldType::Text, true),
            field("BENEFICIARY_EXTRAORDINARILY_LONG_DESCRIPTION_2", FieldType::Text, true),
        ];
        let outcome = generator.generate(&fields, &[], &BTreeMap::new());
        let names = rendered(&outcome);
        assert!(names.iter().all(|n| n.len() <= 24), "{names:?}");
        assert_eq!(names[0], "beneficiary_extraordinar");
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn numeric_suffix_respects_length_limit() {
        let config = EngineConfig {
            max_name_length: 16,
            ..EngineConfig::default()
        };
        let hints = [SectionRule::new("abcdefghijklmn", &["zz"])];
        let generator = NameGenerator::new(&config, &hints).unwrap();
        let fields = vec![
            field("ZZ_Q", FieldType::Text, true),
            field("ZZ Q", FieldType::Text, true),
        ];
        let outcome = generator.generate(&fields, &[], &BTreeMap::new());
        let names = rendered(&outcome);

        assert!(names.contains(&"abcdefghijklmn_q".to_string()), "{names:?}");
        assert!(names.contains(&"abcdefghijkl_q-2".to_string()), "{names:?}");
        let validator = NameValidator::new(16);
        assert!(names.iter().all(|n| validator.is_valid(n)), "{names:?}");
    }

    #[test]
    fn shorten_prefers_token_boundaries() {
        assert_eq!(shorten("first-name-line", 3), "first-name");
        assert_eq!(shorten("first-name", 2), "first");
        assert_eq!(shorten("abc", 10), "a");
    }

    #[test]
    fn hints_take_precedence() {
        let hints = [SectionRule::new("insured-details", &["first name"])];
        let generator = NameGenerator::new(&EngineConfig::default(), &hints).unwrap();
        let outcome = generator.generate(
            &[field("OWNER_FIRST_NAME", FieldType::Text, true)],
            &[],
            &BTreeMap::new(),
        );
        assert_eq!(rendered(&outcome), ["insured-details_owner"]);
    }
}
