//! BEM-style canonical names: `block[_element][__modifier | --group]`
//!
//! Accepted shapes (every segment matches `^[a-z][a-z0-9-]*$`):
//!
//! ```text
//! block
//! block_element
//! block__modifier
//! block_element__modifier
//! block--group
//! block_element--group
//! ```
//!
//! A trailing `--group` is always read as the group suffix, never as part of
//! the last segment. The parser is the single source of truth: the generator
//! gates its own output through it and external overrides go through the
//! same path.

use nom::{
    bytes::complete::{tag, take_while},
    character::complete::satisfy,
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Suffix marking a group container name.
pub const GROUP_SUFFIX: &str = "--group";

/// Default upper bound for rendered names.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 100;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum GrammarViolation {
    #[error("name is empty")]
    Empty,
    #[error("uppercase character {ch:?} at byte {position}")]
    Uppercase { ch: char, position: usize },
    #[error("invalid character {ch:?} at byte {position}")]
    InvalidCharacter { ch: char, position: usize },
    #[error("name starts with a separator")]
    LeadingSeparator,
    #[error("name ends with a separator")]
    TrailingSeparator,
    #[error("empty segment")]
    EmptySegment,
    #[error("more than one modifier/group suffix")]
    MultipleSuffixes,
    #[error("more than one element segment")]
    TooManyElements,
    #[error("segment {segment:?} must match ^[a-z][a-z0-9-]*$")]
    InvalidSegment { segment: String },
    #[error("name is {length} characters long (max {max})")]
    TooLong { length: usize, max: usize },
}

// ============================================================================
// CanonicalName
// ============================================================================

/// A validated BEM-style name.
///
/// Fields are private: every value went through segment validation, and a
/// name never carries both a modifier and the group suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "CanonicalNameRepr", into = "CanonicalNameRepr")]
pub struct CanonicalName {
    block: String,
    element: Option<String>,
    modifier: Option<String>,
    is_group: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CanonicalNameRepr {
    block: String,
    #[serde(default)]
    element: Option<String>,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    is_group: bool,
}

impl TryFrom<CanonicalNameRepr> for CanonicalName {
    type Error = GrammarViolation;

    fn try_from(repr: CanonicalNameRepr) -> Result<Self, Self::Error> {
        if repr.is_group {
            if repr.modifier.is_some() {
                return Err(GrammarViolation::MultipleSuffixes);
            }
            CanonicalName::group(&repr.block, repr.element.as_deref())
        } else {
            CanonicalName::new(&repr.block, repr.element.as_deref(), repr.modifier.as_deref())
        }
    }
}

impl From<CanonicalName> for CanonicalNameRepr {
    fn from(name: CanonicalName) -> Self {
        Self {
            block: name.block,
            element: name.element,
            modifier: name.modifier,
            is_group: name.is_group,
        }
    }
}

impl CanonicalName {
    /// `block[_element][__modifier]`
    pub fn new(
        block: &str,
        element: Option<&str>,
        modifier: Option<&str>,
    ) -> Result<Self, GrammarViolation> {
        check_segment(block)?;
        if let Some(e) = element {
            check_segment(e)?;
        }
        if let Some(m) = modifier {
            check_segment(m)?;
        }
        Ok(Self {
            block: block.to_string(),
            element: element.map(str::to_string),
            modifier: modifier.map(str::to_string),
            is_group: false,
        })
    }

    /// `block[_element]--group`
    pub fn group(block: &str, element: Option<&str>) -> Result<Self, GrammarViolation> {
        let mut name = Self::new(block, element, None)?;
        name.is_group = true;
        Ok(name)
    }

    pub fn block(&self) -> &str {
        &self.block
    }

    pub fn element(&self) -> Option<&str> {
        self.element.as_deref()
    }

    pub fn modifier(&self) -> Option<&str> {
        self.modifier.as_deref()
    }

    pub fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn render(&self) -> String {
        let mut out = self.block.clone();
        if let Some(e) = &self.element {
            out.push('_');
            out.push_str(e);
        }
        if let Some(m) = &self.modifier {
            out.push_str("__");
            out.push_str(m);
        }
        if self.is_group {
            out.push_str(GROUP_SUFFIX);
        }
        out
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for CanonicalName {
    type Err = GrammarViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical_name(s)
    }
}

// ============================================================================
// Parser
// ============================================================================

fn is_segment_continue(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

/// `true` when `s` matches `^[a-z][a-z0-9-]*$` and does not contain the
/// reserved group suffix.
pub fn is_valid_segment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            chars.all(is_segment_continue) && !s.contains(GROUP_SUFFIX)
        }
        _ => false,
    }
}

fn check_segment(s: &str) -> Result<(), GrammarViolation> {
    if s.is_empty() {
        return Err(GrammarViolation::EmptySegment);
    }
    if is_valid_segment(s) {
        Ok(())
    } else {
        Err(GrammarViolation::InvalidSegment {
            segment: s.to_string(),
        })
    }
}

fn segment(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_lowercase()),
        take_while(is_segment_continue),
    ))(input)
}

/// `block [_element] [__modifier]`
fn name_body(input: &str) -> IResult<&str, (&str, Option<&str>, Option<&str>)> {
    tuple((
        segment,
        opt(preceded(tag("_"), segment)),
        opt(preceded(tag("__"), segment)),
    ))(input)
}

/// Parse a rendered name, rejecting anything outside the grammar.
pub fn parse_canonical_name(name: &str) -> Result<CanonicalName, GrammarViolation> {
    let (body, is_group) = match name.strip_suffix(GROUP_SUFFIX) {
        Some(body) => (body, true),
        None => (name, false),
    };

    match all_consuming(name_body)(body) {
        Ok((_, (block, element, modifier))) => {
            if is_group && modifier.is_some() {
                return Err(GrammarViolation::MultipleSuffixes);
            }
            if is_group && body.ends_with(GROUP_SUFFIX) {
                return Err(GrammarViolation::MultipleSuffixes);
            }
            // `--group` only ever terminates a whole name.
            for part in std::iter::once(block).chain(element).chain(modifier) {
                check_segment(part)?;
            }
            Ok(CanonicalName {
                block: block.to_string(),
                element: element.map(str::to_string),
                modifier: modifier.map(str::to_string),
                is_group,
            })
        }
        Err(_) => Err(diagnose(name)),
    }
}

/// Structural validation only (no length limit).
pub fn validate_name(name: &str) -> Result<(), GrammarViolation> {
    parse_canonical_name(name).map(|_| ())
}

/// Explain why `name` did not parse.
fn diagnose(name: &str) -> GrammarViolation {
    if name.is_empty() {
        return GrammarViolation::Empty;
    }
    for (position, ch) in name.char_indices() {
        if ch.is_ascii_uppercase() {
            return GrammarViolation::Uppercase { ch, position };
        }
        if !(is_segment_continue(ch) || ch == '_') {
            return GrammarViolation::InvalidCharacter { ch, position };
        }
    }
    if name.starts_with('_') || name.starts_with('-') {
        return GrammarViolation::LeadingSeparator;
    }

    let (body, is_group) = match name.strip_suffix(GROUP_SUFFIX) {
        Some(body) => (body, true),
        None => (name, false),
    };
    if body.is_empty() {
        return GrammarViolation::EmptySegment;
    }
    if body.ends_with('_') {
        return GrammarViolation::TrailingSeparator;
    }
    if body.contains("___") {
        return GrammarViolation::EmptySegment;
    }

    let modifiers = body.matches("__").count();
    if modifiers > 1 || (is_group && modifiers == 1) {
        return GrammarViolation::MultipleSuffixes;
    }

    let (head, modifier) = match body.split_once("__") {
        Some((head, modifier)) => (head, Some(modifier)),
        None => (body, None),
    };
    let parts: Vec<&str> = head.split('_').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return GrammarViolation::EmptySegment;
    }
    if parts.len() > 2 {
        return GrammarViolation::TooManyElements;
    }
    for part in parts.into_iter().chain(modifier) {
        if let Err(violation) = check_segment(part) {
            return violation;
        }
    }

    GrammarViolation::InvalidSegment {
        segment: name.to_string(),
    }
}

// ============================================================================
// Validator with limits
// ============================================================================

/// Grammar plus a length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValidator {
    pub max_length: usize,
}

impl Default for NameValidator {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }
}

impl NameValidator {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn check(&self, name: &str) -> Result<CanonicalName, GrammarViolation> {
        let parsed = parse_canonical_name(name)?;
        self.check_length(name.len())?;
        Ok(parsed)
    }

    pub fn check_name(&self, name: &CanonicalName) -> Result<(), GrammarViolation> {
        let rendered = name.render();
        parse_canonical_name(&rendered)?;
        self.check_length(rendered.len())
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.check(name).is_ok()
    }

    fn check_length(&self, length: usize) -> Result<(), GrammarViolation> {
        if length > self.max_length {
            Err(GrammarViolation::TooLong {
                length,
                max: self.max_length,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_six_shapes() {
        for name in [
            "owner",
            "owner_first-name",
            "owner__primary",
            "owner_first-name__primary",
            "dividend-option--group",
            "dividend-option_payout--group",
        ] {
            let parsed = parse_canonical_name(name).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(parsed.render(), name);
        }
    }

    #[test]
    fn parses_components() {
        let name = parse_canonical_name("owner-information_first-name__primary").unwrap();
        assert_eq!(name.block(), "owner-information");
        assert_eq!(name.element(), Some("first-name"));
        assert_eq!(name.modifier(), Some("primary"));
        assert!(!name.is_group());

        let group = parse_canonical_name("billing_frequency--group").unwrap();
        assert_eq!(group.element(), Some("frequency"));
        assert!(group.is_group());
        assert_eq!(group.modifier(), None);
    }

    #[test]
    fn modifier_without_element() {
        let name = parse_canonical_name("block__mod").unwrap();
        assert_eq!(name.element(), None);
        assert_eq!(name.modifier(), Some("mod"));
    }

    #[test]
    fn rejects_with_specific_violation() {
        assert_eq!(parse_canonical_name(""), Err(GrammarViolation::Empty));
        assert!(matches!(
            parse_canonical_name("Owner_name"),
            Err(GrammarViolation::Uppercase { ch: 'O', position: 0 })
        ));
        assert!(matches!(
            parse_canonical_name("owner name"),
            Err(GrammarViolation::InvalidCharacter { ch: ' ', .. })
        ));
        assert_eq!(
            parse_canonical_name("_owner"),
            Err(GrammarViolation::LeadingSeparator)
        );
        assert_eq!(
            parse_canonical_name("owner_"),
            Err(GrammarViolation::TrailingSeparator)
        );
        assert_eq!(
            parse_canonical_name("owner__"),
            Err(GrammarViolation::TrailingSeparator)
        );
        assert_eq!(
            parse_canonical_name("owner___name"),
            Err(GrammarViolation::EmptySegment)
        );
        assert_eq!(
            parse_canonical_name("a_b__c__d"),
            Err(GrammarViolation::MultipleSuffixes)
        );
        assert_eq!(
            parse_canonical_name("a_b__c--group"),
            Err(GrammarViolation::MultipleSuffixes)
        );
        assert_eq!(
            parse_canonical_name("a--group--group"),
            Err(GrammarViolation::MultipleSuffixes)
        );
        assert_eq!(
            parse_canonical_name("a_b_c"),
            Err(GrammarViolation::TooManyElements)
        );
        assert!(matches!(
            parse_canonical_name("owner_2nd"),
            Err(GrammarViolation::InvalidSegment { .. })
        ));
        assert!(matches!(
            parse_canonical_name("--group"),
            Err(GrammarViolation::LeadingSeparator)
        ));
    }

    #[test]
    fn group_suffix_is_reserved_inside_segments() {
        assert!(!is_valid_segment("agent--group"));
        assert!(!is_valid_segment("agent--groups"));
        assert!(is_valid_segment("agent--grp"));
        assert!(CanonicalName::new("agent--group", None, None).is_err());
        assert!(CanonicalName::new("agent", Some("code--group"), None).is_err());

        assert_eq!(
            parse_canonical_name("agent--group_code"),
            Err(GrammarViolation::InvalidSegment {
                segment: "agent--group".to_string()
            })
        );
        assert!(matches!(
            parse_canonical_name("agent--group__a"),
            Err(GrammarViolation::InvalidSegment { .. })
        ));
        assert!(parse_canonical_name("agent--group").unwrap().is_group());
    }

    #[test]
    fn constructors_enforce_segments() {
        assert!(CanonicalName::new("owner", Some("first-name"), None).is_ok());
        assert!(CanonicalName::new("owner", Some(""), None).is_err());
        assert!(CanonicalName::new("Owner", None, None).is_err());
        assert!(CanonicalName::group("owner", Some("x_y")).is_err());
        assert_eq!(
            CanonicalName::group("billing", None).unwrap().render(),
            "billing--group"
        );
    }

    #[test]
    fn validator_enforces_length() {
        let validator = NameValidator::new(10);
        assert!(validator.is_valid("abc_def"));
        assert_eq!(
            validator.check("abcdef_ghijkl"),
            Err(GrammarViolation::TooLong { length: 13, max: 10 })
        );
    }

    #[test]
    fn serde_rejects_invalid_names() {
        let ok: CanonicalName =
            serde_json::from_str(r#"{"block":"owner","element":"city","is_group":false}"#)
                .unwrap();
        assert_eq!(ok.render(), "owner_city");

        let bad = serde_json::from_str::<CanonicalName>(
            r#"{"block":"owner","modifier":"x","is_group":true}"#,
        );
        assert!(bad.is_err());
    }
}
