//! Engine configuration.
//!
//! Every option has a default, so a partial JSON file only needs the keys it
//! changes:
//!
//! ```json
//! { "primary_backend": "acroform", "similarity_threshold": 0.6 }
//! ```

use anyhow::{Context, Result};
use fieldmark_model::{is_valid_segment, BackendId, DEFAULT_MAX_NAME_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Maps section keywords onto a block name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    pub block: String,
    pub keywords: Vec<String>,
}

impl SectionRule {
    pub fn new(block: &str, keywords: &[&str]) -> Self {
        Self {
            block: block.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// A form type and the words that suggest it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTypeRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl FormTypeRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("block `{block}` is not a valid name segment")]
    InvalidBlock { block: String },

    #[error("section `{block}` has no keywords")]
    EmptySection { block: String },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("{name} must be at least {min}")]
    TooSmall { name: &'static str, min: u64 },

    #[error("prefix `{0}` is empty")]
    EmptyPrefix(String),

    #[error("form type `{0}` has no name or no keywords")]
    EmptyFormType(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mutation-capable backend. When unset, the first adapter reporting
    /// `can_mutate()` is used, then the first adapter.
    pub primary_backend: Option<BackendId>,
    pub backend_timeout_ms: u64,
    /// Role prefixes folded onto unprefixed fields (`OWNER.FIRST_NAME`).
    pub prefixes: Vec<String>,
    /// Section rules, tried in order. Run-time hints go in front.
    pub sections: Vec<SectionRule>,
    pub abbreviations: BTreeMap<String, String>,
    /// Suggestions must score strictly above this.
    pub similarity_threshold: f64,
    /// Suggestions below this lower confidence to medium.
    pub strong_similarity: f64,
    pub suggestion_candidates: usize,
    /// First numeric suffix used to break name collisions.
    pub disambiguation_start: u32,
    pub max_name_length: usize,
    pub fallback_block: String,
    pub fallback_element: String,
    /// Known form types, scored by how many of their keywords occur in the
    /// field names.
    pub form_types: Vec<FormTypeRule>,
    /// Fewest keyword hits before a form type is reported.
    pub form_type_min_score: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_backend: None,
            backend_timeout_ms: 30_000,
            prefixes: default_prefixes(),
            sections: default_sections(),
            abbreviations: default_abbreviations(),
            similarity_threshold: 0.5,
            strong_similarity: 0.8,
            suggestion_candidates: 3,
            disambiguation_start: 2,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            fallback_block: "general".to_string(),
            fallback_element: "field".to_string(),
            form_types: default_form_types(),
            form_type_min_score: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.sections {
            validate_section(rule)?;
        }
        for block in [&self.fallback_block, &self.fallback_element] {
            if !is_valid_segment(block) {
                return Err(ConfigError::InvalidBlock {
                    block: block.clone(),
                });
            }
        }
        for prefix in &self.prefixes {
            if prefix.trim().trim_end_matches('.').is_empty() {
                return Err(ConfigError::EmptyPrefix(prefix.clone()));
            }
        }
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("strong_similarity", self.strong_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        if self.backend_timeout_ms == 0 {
            return Err(ConfigError::TooSmall {
                name: "backend_timeout_ms",
                min: 1,
            });
        }
        for rule in &self.form_types {
            if rule.name.trim().is_empty() || rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(ConfigError::EmptyFormType(rule.name.clone()));
            }
        }
        if self.form_type_min_score == 0 {
            return Err(ConfigError::TooSmall {
                name: "form_type_min_score",
                min: 1,
            });
        }
        if self.disambiguation_start < 2 {
            return Err(ConfigError::TooSmall {
                name: "disambiguation_start",
                min: 2,
            });
        }
        // Room for `block_element__modifier` with one-character segments.
        if self.max_name_length < 16 {
            return Err(ConfigError::TooSmall {
                name: "max_name_length",
                min: 16,
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_section(rule: &SectionRule) -> Result<(), ConfigError> {
    if !is_valid_segment(&rule.block) {
        return Err(ConfigError::InvalidBlock {
            block: rule.block.clone(),
        });
    }
    if rule.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(ConfigError::EmptySection {
            block: rule.block.clone(),
        });
    }
    Ok(())
}

// ============================================================================
// Default tables
// ============================================================================

fn default_prefixes() -> Vec<String> {
    [
        "OWNER",
        "PREMIUM_PAYOR",
        "POLICY_OWNER",
        "PRIMARY_INSURED",
        "INSURED",
        "JOINT_OWNER",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Role sections come first so `policy owner` is not read as `owner`.
fn default_sections() -> Vec<SectionRule> {
    vec![
        SectionRule::new("premium-payor", &["premium payor", "payor"]),
        SectionRule::new("policy-owner", &["policy owner"]),
        SectionRule::new("joint-owner", &["joint owner"]),
        SectionRule::new("primary-insured", &["primary insured"]),
        SectionRule::new("insured-information", &["insured"]),
        SectionRule::new(
            "owner-information",
            &["owner", "policy holder", "account holder"],
        ),
        SectionRule::new("beneficiary", &["beneficiary", "contingent"]),
        SectionRule::new("address", &["address", "contact", "mailing", "residence"]),
        SectionRule::new("payment", &["payment", "billing", "bank", "financial"]),
        SectionRule::new("withdrawal", &["withdrawal", "distribution", "payout"]),
        SectionRule::new(
            "signature",
            &["signature", "sign", "authorization", "consent"],
        ),
        SectionRule::new(
            "change-request",
            &["change", "modification", "update", "amendment"],
        ),
        SectionRule::new(
            "employment",
            &["employment", "occupation", "employer", "income"],
        ),
        SectionRule::new("medical", &["medical", "health", "physician", "condition"]),
        SectionRule::new(
            "investment",
            &["investment", "allocation", "portfolio", "funds"],
        ),
        SectionRule::new("dividend", &["dividend"]),
    ]
}

fn default_form_types() -> Vec<FormTypeRule> {
    vec![
        FormTypeRule::new(
            "Life Policy Owner's Service Request",
            &["owner", "policy", "service", "request", "life", "beneficiary"],
        ),
        FormTypeRule::new(
            "Change of Address",
            &["address", "change", "mailing", "residence", "contact"],
        ),
        FormTypeRule::new(
            "Withdrawal Request",
            &["withdrawal", "distribution", "amount", "frequency", "payment"],
        ),
        FormTypeRule::new(
            "Name Change Request",
            &["name", "change", "marriage", "divorce", "legal"],
        ),
        FormTypeRule::new(
            "Beneficiary Designation",
            &["beneficiary", "primary", "contingent", "designation", "percentage"],
        ),
    ]
}

fn default_abbreviations() -> BTreeMap<String, String> {
    [
        ("acct", "account"),
        ("addl", "additional"),
        ("addr", "address"),
        ("alloc", "allocation"),
        ("alt", "alternate"),
        ("amt", "amount"),
        ("auth", "authorization"),
        ("bal", "balance"),
        ("ben", "beneficiary"),
        ("benef", "beneficiary"),
        ("chg", "change"),
        ("chk", "checking"),
        ("cont", "contingent"),
        ("curr", "current"),
        ("dep", "deposit"),
        ("desc", "description"),
        ("div", "dividend"),
        ("dob", "date-of-birth"),
        ("dt", "date"),
        ("eff", "effective"),
        ("eft", "electronic-funds-transfer"),
        ("emp", "employer"),
        ("fname", "first-name"),
        ("info", "information"),
        ("ins", "insured"),
        ("inv", "investment"),
        ("lname", "last-name"),
        ("med", "medical"),
        ("mi", "middle-initial"),
        ("num", "number"),
        ("opt", "option"),
        ("pct", "percent"),
        ("ph", "phone"),
        ("pmt", "payment"),
        ("pol", "policy"),
        ("prev", "previous"),
        ("prim", "primary"),
        ("pymt", "payment"),
        ("qty", "quantity"),
        ("ref", "reference"),
        ("req", "request"),
        ("ret", "retirement"),
        ("rsn", "reason"),
        ("sav", "savings"),
        ("sec", "secondary"),
        ("sig", "signature"),
        ("soc sec", "social-security"),
        ("ssn", "social-security-number"),
        ("st", "state"),
        ("stmt", "statement"),
        ("tel", "telephone"),
        ("yr", "year"),
    ]
    .iter()
    .map(|(short, long)| (short.to_string(), long.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.backend_timeout(), Duration::from_secs(30));
        assert_eq!(config.prefixes.len(), 6);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"primary_backend": "acroform", "similarity_threshold": 0.6}"#,
        )
        .unwrap();
        assert_eq!(config.primary_backend.as_deref(), Some("acroform"));
        assert_eq!(config.similarity_threshold, 0.6);
        assert_eq!(config.fallback_block, "general");
        assert!(!config.sections.is_empty());
    }

    #[test]
    fn rejects_bad_values() {
        let err = EngineConfig::from_json_str(r#"{"similarity_threshold": 1.5}"#).unwrap_err();
        assert!(format!("{err:#}").contains("similarity_threshold"));

        let config = EngineConfig {
            sections: vec![SectionRule::new("Owner", &["owner"])],
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBlock {
                block: "Owner".to_string()
            })
        );

        let config = EngineConfig {
            disambiguation_start: 1,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::TooSmall { .. })));

        let config = EngineConfig {
            form_types: vec![FormTypeRule::new("Empty", &[" "])],
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyFormType("Empty".to_string()))
        );
    }

    #[test]
    fn block_may_not_carry_group_suffix() {
        let rule = SectionRule::new("agent--group", &["agent"]);
        assert_eq!(
            validate_section(&rule),
            Err(ConfigError::InvalidBlock {
                block: "agent--group".to_string()
            })
        );

        let config = EngineConfig {
            fallback_block: "general--group".to_string(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldmark.json");
        std::fs::write(&path, r#"{"prefixes": ["OWNER."], "max_name_length": 64}"#).unwrap();
        let config = EngineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.prefixes, vec!["OWNER."]);
        assert_eq!(config.max_name_length, 64);

        let err = EngineConfig::from_json_file(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
