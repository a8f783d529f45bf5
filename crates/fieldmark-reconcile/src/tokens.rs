//! Name tokenization, abbreviation expansion and section keyword matching.
//!
//! Every stage that compares or rewrites names goes through [`tokenize`], so
//! `OWNER.FIRST_NAME`, `owner-first-name` and `ownerFirstName` all yield
//! `["owner", "first", "name"]`.

use crate::config::SectionRule;
use std::collections::{BTreeMap, BTreeSet};

/// Lowercase ASCII alphanumeric tokens.
///
/// Any other character separates tokens. A lowercase or digit followed by an
/// uppercase letter starts a new token, as does the last capital of an
/// acronym followed by a lowercase letter (`SSNNumber` → `ssn`, `number`).
pub fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_ascii_alphanumeric() {
            flush(&mut current, &mut tokens);
            continue;
        }
        if ch.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                flush(&mut current, &mut tokens);
            }
        }
        current.push(ch.to_ascii_lowercase());
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Join tokens into a segment: `-` separated, leading non-letters removed.
///
/// Returns `None` when nothing usable is left.
pub fn to_segment(tokens: &[String]) -> Option<String> {
    let joined = tokens.join("-");
    let trimmed = joined.trim_start_matches(|c: char| !c.is_ascii_lowercase());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Token-set Jaccard similarity in `[0, 1]`.
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let b: BTreeSet<String> = tokenize(b).into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

// ============================================================================
// Abbreviations
// ============================================================================

/// Token-for-token abbreviation table, longest key first.
#[derive(Debug, Clone, Default)]
pub struct Abbreviations {
    entries: Vec<(Vec<String>, Vec<String>)>,
}

impl Abbreviations {
    pub fn new(table: &BTreeMap<String, String>) -> Self {
        let mut entries: Vec<(Vec<String>, Vec<String>)> = table
            .iter()
            .map(|(short, long)| (tokenize(short), tokenize(long)))
            .filter(|(short, long)| !short.is_empty() && !long.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { entries }
    }

    pub fn expand(&self, tokens: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let hit = self
                .entries
                .iter()
                .find(|(short, _)| tokens[i..].starts_with(short));
            match hit {
                Some((short, long)) => {
                    out.extend(long.iter().cloned());
                    i += short.len();
                }
                None => {
                    out.push(tokens[i].clone());
                    i += 1;
                }
            }
        }
        out
    }
}

// ============================================================================
// Sections
// ============================================================================

/// A section keyword found inside a token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMatch {
    pub block: String,
    pub keyword: String,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    rules: Vec<(String, Vec<Vec<String>>)>,
}

impl SectionTable {
    /// Rules are tried in order; `abbreviations` also apply to keywords so
    /// they line up with expanded name tokens.
    pub fn new<'a>(
        rules: impl IntoIterator<Item = &'a SectionRule>,
        abbreviations: &Abbreviations,
    ) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let keywords = rule
                    .keywords
                    .iter()
                    .map(|k| abbreviations.expand(&tokenize(k)))
                    .filter(|k| !k.is_empty())
                    .collect();
                (rule.block.clone(), keywords)
            })
            .collect();
        Self { rules }
    }

    /// First rule with a keyword occurring contiguously in `tokens`.
    pub fn find(&self, tokens: &[String]) -> Option<SectionMatch> {
        for (block, keywords) in &self.rules {
            for keyword in keywords {
                if let Some(start) = find_run(tokens, keyword) {
                    return Some(SectionMatch {
                        block: block.clone(),
                        keyword: keyword.join(" "),
                        start,
                        len: keyword.len(),
                    });
                }
            }
        }
        None
    }
}

fn find_run(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
