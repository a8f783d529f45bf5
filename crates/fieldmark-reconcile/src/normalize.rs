//! Role-prefix normalization.
//!
//! Secondary backends often report a field under a role-qualified name
//! (`OWNER.FIRST_NAME`) that the primary backend knows as `FIRST_NAME`. Such
//! inaccessible fields are folded into the accessible field; the role is
//! kept as `normalized_prefix` for section inference.

use fieldmark_model::UnifiedField;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An inaccessible prefixed field merged into its accessible base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixFold {
    pub role: String,
    pub from_key: String,
    pub into_key: String,
}

/// A second role folded onto a field that already carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixConflict {
    pub field_key: String,
    pub kept: String,
    pub ignored: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub folds: Vec<PrefixFold>,
    /// Prefixed fields with no accessible base; they stay standalone.
    pub unmatched: Vec<String>,
    pub prefix_conflicts: Vec<PrefixConflict>,
}

#[derive(Debug, Clone)]
pub struct PrefixNormalizer {
    /// (uppercased match form, reported form)
    prefixes: Vec<(String, String)>,
}

impl PrefixNormalizer {
    /// `prefixes` may be written with or without a trailing `.`.
    pub fn new<S: AsRef<str>>(prefixes: &[S]) -> Self {
        let prefixes = prefixes
            .iter()
            .map(|p| p.as_ref().trim().trim_end_matches('.'))
            .filter(|p| !p.is_empty())
            .map(|p| (p.to_ascii_uppercase(), p.to_string()))
            .collect();
        Self { prefixes }
    }

    /// Split `ROLE.BASE` into the configured role and `BASE`.
    pub fn split_prefix<'a>(&self, key: &'a str) -> Option<(&str, &'a str)> {
        let (head, base) = key.split_once('.')?;
        if base.is_empty() {
            return None;
        }
        let head = head.to_ascii_uppercase();
        self.prefixes
            .iter()
            .find(|(upper, _)| *upper == head)
            .map(|(_, role)| (role.as_str(), base))
    }

    /// `true` when `s` is a configured role and nothing else.
    pub fn is_role(&self, s: &str) -> bool {
        let upper = s.trim_end_matches('.').to_ascii_uppercase();
        self.prefixes.iter().any(|(role, _)| *role == upper)
    }

    /// `key` with a recognized role prefix removed.
    pub fn base_name<'a>(&self, key: &'a str) -> &'a str {
        self.split_prefix(key).map_or(key, |(_, base)| base)
    }

    /// Fold prefixed fields. Running this on its own output changes nothing.
    pub fn normalize(&self, fields: Vec<UnifiedField>) -> (Vec<UnifiedField>, NormalizationReport) {
        let mut report = NormalizationReport::default();
        let mut fields: Vec<Option<UnifiedField>> = fields.into_iter().map(Some).collect();

        let accessible: HashMap<String, usize> = fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                f.as_ref()
                    .filter(|f| f.is_accessible)
                    .map(|f| (f.canonical_key.clone(), i))
            })
            .collect();

        for i in 0..fields.len() {
            let Some(field) = fields[i].as_ref() else {
                continue;
            };
            let Some((role, base)) = self.split_prefix(&field.canonical_key) else {
                continue;
            };
            let role = role.to_string();

            let target = if field.is_accessible {
                None
            } else {
                accessible.get(base).copied().filter(|&t| t != i)
            };

            match target {
                Some(t) => {
                    let Some(source) = fields[i].take() else {
                        continue;
                    };
                    let Some(target) = fields[t].as_mut() else {
                        continue;
                    };
                    absorb(target, &source, &role, &mut report);
                    report.folds.push(PrefixFold {
                        role,
                        from_key: source.canonical_key,
                        into_key: target.canonical_key.clone(),
                    });
                }
                None => {
                    let Some(field) = fields[i].as_mut() else {
                        continue;
                    };
                    if field.normalized_prefix.is_none() {
                        field.normalized_prefix = Some(role);
                    }
                    if !field.is_accessible {
                        report.unmatched.push(field.canonical_key.clone());
                    }
                }
            }
        }

        if !report.folds.is_empty() {
            tracing::debug!(
                folds = report.folds.len(),
                unmatched = report.unmatched.len(),
                "folded role-prefixed fields"
            );
        }
        (fields.into_iter().flatten().collect(), report)
    }
}

fn absorb(target: &mut UnifiedField, source: &UnifiedField, role: &str, report: &mut NormalizationReport) {
    target.raw_names.extend(source.raw_names.iter().cloned());
    target
        .reporting_backends
        .extend(source.reporting_backends.iter().cloned());
    if target.position.is_none() {
        target.position = source.position;
    }
    match &target.normalized_prefix {
        None => target.normalized_prefix = Some(role.to_string()),
        Some(kept) if kept != role => {
            tracing::warn!(
                field = %target.canonical_key,
                kept = %kept,
                ignored = %role,
                "field folded under more than one role prefix"
            );
            report.prefix_conflicts.push(PrefixConflict {
                field_key: target.canonical_key.clone(),
                kept: kept.clone(),
                ignored: role.to_string(),
            });
        }
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldmark_model::{FieldType, RawFieldRecord};

    fn field(backend: &str, name: &str, accessible: bool) -> UnifiedField {
        UnifiedField::from_record(&RawFieldRecord::new(backend, name, FieldType::Text), accessible)
    }

    fn normalizer() -> PrefixNormalizer {
        PrefixNormalizer::new(&["OWNER.", "PREMIUM_PAYOR", "JOINT_OWNER"])
    }

    #[test]
    fn folds_owner_prefix_onto_accessible_base() {
        let fields = vec![
            field("acroform", "FIRST_NAME", true),
            field("widgets", "OWNER.FIRST_NAME", false),
        ];
        let (fields, report) = normalizer().normalize(fields);

        assert_eq!(fields.len(), 1);
        let f = &fields[0];
        assert_eq!(f.canonical_key, "FIRST_NAME");
        assert!(f.is_accessible);
        assert_eq!(f.normalized_prefix.as_deref(), Some("OWNER"));
        assert!(f.raw_names.contains("OWNER.FIRST_NAME"));
        assert!(f.reporting_backends.contains("widgets"));
        assert_eq!(report.folds.len(), 1);
    }

    #[test]
    fn unmatched_prefix_stays_standalone() {
        let fields = vec![field("widgets", "PREMIUM_PAYOR.SSN", false)];
        let (fields, report) = normalizer().normalize(fields);
        assert_eq!(fields.len(), 1);
        assert!(!fields[0].is_accessible);
        assert_eq!(fields[0].normalized_prefix.as_deref(), Some("PREMIUM_PAYOR"));
        assert_eq!(report.unmatched, vec!["PREMIUM_PAYOR.SSN"]);
    }

    #[test]
    fn never_folds_onto_inaccessible_base() {
        let fields = vec![
            field("widgets", "FIRST_NAME", false),
            field("widgets", "OWNER.FIRST_NAME", false),
        ];
        let (fields, report) = normalizer().normalize(fields);
        assert_eq!(fields.len(), 2);
        assert!(report.folds.is_empty());
    }

    #[test]
    fn accessible_prefixed_field_is_only_annotated() {
        let fields = vec![
            field("acroform", "FIRST_NAME", true),
            field("acroform", "owner.FIRST_NAME", true),
        ];
        let (fields, report) = normalizer().normalize(fields);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].normalized_prefix.as_deref(), Some("OWNER"));
        assert!(report.folds.is_empty() && report.unmatched.is_empty());
    }

    #[test]
    fn second_role_is_a_conflict() {
        let fields = vec![
            field("acroform", "FIRST_NAME", true),
            field("widgets", "OWNER.FIRST_NAME", false),
            field("widgets", "JOINT_OWNER.FIRST_NAME", false),
        ];
        let (fields, report) = normalizer().normalize(fields);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].normalized_prefix.as_deref(), Some("OWNER"));
        assert_eq!(fields[0].raw_names.len(), 3);
        assert_eq!(report.prefix_conflicts.len(), 1);
        assert_eq!(report.prefix_conflicts[0].ignored, "JOINT_OWNER");
    }

    #[test]
    fn normalization_is_idempotent() {
        let fields = vec![
            field("acroform", "FIRST_NAME", true),
            field("widgets", "OWNER.FIRST_NAME", false),
            field("widgets", "PREMIUM_PAYOR.SSN", false),
        ];
        let n = normalizer();
        let (once, _) = n.normalize(fields);
        let (twice, report) = n.normalize(once.clone());
        assert_eq!(once, twice);
        assert!(report.folds.is_empty());
    }
}
