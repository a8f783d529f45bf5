//! Radio group reconstruction.
//!
//! Backends disagree on whether a radio group is one field or many, so
//! groups are rebuilt from the flat field list. Three signals run in
//! priority order, each over the fields the earlier ones left unclaimed:
//!
//! 1. explicit containers reported by a backend,
//! 2. a shared naming stem (`DIV_OPT_A`, `DIV_OPT_B`),
//! 3. positional adjacency on the page.
//!
//! A group needs at least two members. A stem that spans pages or mixes
//! option types is reported as ambiguous and its fields are withheld from
//! the positional pass rather than guessed at. A stem that is only a role
//! prefix (`OWNER.SMOKER`, `OWNER.MARRIED`) is not a grouping signal.

use crate::normalize::PrefixNormalizer;
use fieldmark_model::{FieldType, GroupSignal, Position, RadioGroup, UnifiedField, GROUP_SUFFIX};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Property linking an option to its container's key.
pub const PARENT_PROPERTY: &str = "parent";

const STEM_SEPARATORS: [char; 3] = ['.', '_', '-'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ambiguity {
    SpansPages { pages: Vec<u32> },
    MixedTypes { types: Vec<FieldType> },
}

/// A cluster that looked like a group but was left ungrouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousGrouping {
    pub stem: String,
    pub member_keys: Vec<String>,
    pub ambiguity: Ambiguity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingOutcome {
    pub groups: Vec<RadioGroup>,
    pub warnings: Vec<AmbiguousGrouping>,
}

impl GroupingOutcome {
    /// Group containing `key`, as a member or as its anchor.
    pub fn group_of(&self, key: &str) -> Option<&RadioGroup> {
        self.groups
            .iter()
            .find(|g| g.group_key == key || g.contains(key))
    }
}

/// Run every signal and finalize group keys and ordering.
pub fn reconstruct_groups(fields: &[UnifiedField], roles: &PrefixNormalizer) -> GroupingOutcome {
    let mut claimed: HashSet<String> = HashSet::new();

    let explicit = explicit_container_groups(fields, &claimed);
    claim(&mut claimed, &explicit);

    let (stem, warnings) = naming_stem_groups(fields, &claimed, roles);
    claim(&mut claimed, &stem);
    for warning in &warnings {
        tracing::warn!(
            stem = %warning.stem,
            members = warning.member_keys.len(),
            ambiguity = ?warning.ambiguity,
            "ambiguous naming stem left ungrouped"
        );
        claimed.extend(warning.member_keys.iter().cloned());
    }

    let positional = positional_groups(fields, &claimed);

    let order: HashMap<&str, usize> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.canonical_key.as_str(), i))
        .collect();

    let mut groups: Vec<RadioGroup> = explicit.into_iter().chain(stem).chain(positional).collect();
    make_keys_unique(&mut groups, fields);
    groups.sort_by_key(|g| {
        std::iter::once(&g.group_key)
            .chain(&g.member_keys)
            .filter_map(|k| order.get(k.as_str()).copied())
            .min()
            .unwrap_or(usize::MAX)
    });

    GroupingOutcome { groups, warnings }
}

fn claim(claimed: &mut HashSet<String>, groups: &[RadioGroup]) {
    for group in groups {
        claimed.insert(group.group_key.clone());
        claimed.extend(group.member_keys.iter().cloned());
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Groups anchored on container fields a backend reported.
///
/// Members are selectable fields naming the anchor as `parent`, or whose key
/// extends the anchor key by a separator. More specific anchors claim first.
pub fn explicit_container_groups(
    fields: &[UnifiedField],
    claimed: &HashSet<String>,
) -> Vec<RadioGroup> {
    let mut anchors: Vec<(usize, &UnifiedField)> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_group_anchor() && !claimed.contains(&f.canonical_key))
        .collect();
    anchors.sort_by(|(ia, a), (ib, b)| {
        anchor_base(&b.canonical_key)
            .len()
            .cmp(&anchor_base(&a.canonical_key).len())
            .then(ia.cmp(ib))
    });

    let mut taken: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();
    for (_, anchor) in anchors {
        if taken.contains(anchor.canonical_key.as_str()) {
            continue;
        }
        let base = anchor_base(&anchor.canonical_key);
        let members: Vec<(usize, &UnifiedField)> = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.canonical_key != anchor.canonical_key
                    && f.is_selectable()
                    && !claimed.contains(&f.canonical_key)
                    && !taken.contains(f.canonical_key.as_str())
                    && (f.properties.get(PARENT_PROPERTY) == Some(&anchor.canonical_key)
                        || extends_with_separator(&f.canonical_key, base))
            })
            .collect();
        if members.len() < 2 {
            continue;
        }

        taken.insert(anchor.canonical_key.as_str());
        taken.extend(members.iter().map(|(_, f)| f.canonical_key.as_str()));
        let group_field_type = if anchor.field_type.is_container() {
            anchor.field_type
        } else {
            inferred_group_type(members[0].1.field_type)
        };
        groups.push(RadioGroup {
            group_key: anchor.canonical_key.clone(),
            member_keys: in_document_order(members),
            group_field_type,
            signal: GroupSignal::ExplicitContainer,
        });
    }
    groups
}

/// Groups of options sharing everything but a final suffix.
pub fn naming_stem_groups(
    fields: &[UnifiedField],
    claimed: &HashSet<String>,
    roles: &PrefixNormalizer,
) -> (Vec<RadioGroup>, Vec<AmbiguousGrouping>) {
    let mut stems: Vec<(&str, Vec<(usize, &UnifiedField)>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, field) in fields.iter().enumerate() {
        if !field.is_selectable() || claimed.contains(&field.canonical_key) {
            continue;
        }
        let Some(stem) = naming_stem(&field.canonical_key).filter(|s| !roles.is_role(s)) else {
            continue;
        };
        let slot = *index.entry(stem).or_insert_with(|| {
            stems.push((stem, Vec::new()));
            stems.len() - 1
        });
        stems[slot].1.push((i, field));
    }

    let mut groups = Vec::new();
    let mut warnings = Vec::new();
    for (stem, members) in stems {
        if members.len() < 2 {
            continue;
        }
        let types: BTreeSet<FieldType> = members.iter().map(|(_, f)| f.field_type).collect();
        let pages: BTreeSet<u32> = members
            .iter()
            .filter_map(|(_, f)| f.position.map(|p| p.page))
            .collect();

        let ambiguity = if types.len() > 1 {
            Some(Ambiguity::MixedTypes {
                types: types.into_iter().collect(),
            })
        } else if pages.len() > 1 {
            Some(Ambiguity::SpansPages {
                pages: pages.into_iter().collect(),
            })
        } else {
            None
        };

        match ambiguity {
            Some(ambiguity) => warnings.push(AmbiguousGrouping {
                stem: stem.to_string(),
                member_keys: members.iter().map(|(_, f)| f.canonical_key.clone()).collect(),
                ambiguity,
            }),
            None => {
                let group_field_type = inferred_group_type(members[0].1.field_type);
                groups.push(RadioGroup {
                    group_key: stem.to_string(),
                    member_keys: in_document_order(members),
                    group_field_type,
                    signal: GroupSignal::NamingStem,
                });
            }
        }
    }
    (groups, warnings)
}

/// Same-page, same-type options chained by overlapping vertical bands.
pub fn positional_groups(fields: &[UnifiedField], claimed: &HashSet<String>) -> Vec<RadioGroup> {
    let mut buckets: Vec<((u32, FieldType), Vec<(usize, &UnifiedField)>)> = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if !field.is_selectable() || claimed.contains(&field.canonical_key) {
            continue;
        }
        let Some(position) = field.position else {
            continue;
        };
        let bucket = (position.page, field.field_type);
        match buckets.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, members)) => members.push((i, field)),
            None => buckets.push((bucket, vec![(i, field)])),
        }
    }
    buckets.sort_by_key(|((page, _), members)| (*page, members[0].0));

    let mut groups = Vec::new();
    let mut synthetic = 0usize;
    for ((page, field_type), mut members) in buckets {
        members.sort_by(|(_, a), (_, b)| {
            let (pa, pb) = (position_of(a), position_of(b));
            pb.top().total_cmp(&pa.top())
        });

        let mut clusters: Vec<Vec<(usize, &UnifiedField)>> = Vec::new();
        let mut floor = f64::INFINITY;
        for member in members {
            let position = position_of(member.1);
            match clusters.last_mut() {
                Some(cluster) if position.top() >= floor => {
                    floor = floor.min(position.y);
                    cluster.push(member);
                }
                _ => {
                    floor = position.y;
                    clusters.push(vec![member]);
                }
            }
        }

        for cluster in clusters.into_iter().filter(|c| c.len() >= 2) {
            let keys: Vec<&str> = cluster.iter().map(|(_, f)| f.canonical_key.as_str()).collect();
            let group_key = match common_key_prefix(&keys) {
                Some(prefix) => prefix,
                None => {
                    synthetic += 1;
                    format!("positional-p{page}-{synthetic}")
                }
            };
            groups.push(RadioGroup {
                group_key,
                member_keys: in_document_order(cluster),
                group_field_type: inferred_group_type(field_type),
                signal: GroupSignal::PositionalAdjacency,
            });
        }
    }
    groups
}

// ============================================================================
// Helpers
// ============================================================================

/// Anchor key without a trailing `--group`.
pub fn anchor_base(key: &str) -> &str {
    key.strip_suffix(GROUP_SUFFIX).unwrap_or(key)
}

/// Key before the last separator, if both sides are non-empty.
pub fn naming_stem(key: &str) -> Option<&str> {
    let cut = key.rfind(STEM_SEPARATORS)?;
    let stem = key[..cut].trim_end_matches(STEM_SEPARATORS);
    (!stem.is_empty() && cut + 1 < key.len()).then_some(stem)
}

fn extends_with_separator(key: &str, base: &str) -> bool {
    key.strip_prefix(base)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| STEM_SEPARATORS.contains(&c))
}

fn inferred_group_type(member_type: FieldType) -> FieldType {
    match member_type {
        FieldType::Checkbox => FieldType::Group,
        _ => FieldType::RadioGroup,
    }
}

fn common_key_prefix(keys: &[&str]) -> Option<String> {
    let first = keys.first()?;
    let mut len = first.len();
    for key in &keys[1..] {
        len = first
            .char_indices()
            .zip(key.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(len);
    }
    let prefix = first[..len].trim_end_matches(|c: char| STEM_SEPARATORS.contains(&c) || c.is_whitespace());
    (!prefix.is_empty()).then(|| prefix.to_string())
}

fn position_of(field: &UnifiedField) -> Position {
    field
        .position
        .unwrap_or_else(|| Position::new(u32::MAX, 0.0, 0.0, 0.0, 0.0))
}

/// Page, top edge descending, x, then aggregation order. Fields without a
/// position go last.
fn in_document_order(mut members: Vec<(usize, &UnifiedField)>) -> Vec<String> {
    members.sort_by(|(ia, a), (ib, b)| {
        let by_position = match (&a.position, &b.position) {
            (Some(pa), Some(pb)) => pa.document_order(pb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_position.then(ia.cmp(ib))
    });
    members
        .into_iter()
        .map(|(_, f)| f.canonical_key.clone())
        .collect()
}

/// Inferred group keys must not shadow a field or another group.
fn make_keys_unique(groups: &mut [RadioGroup], fields: &[UnifiedField]) {
    let field_keys: HashSet<&str> = fields.iter().map(|f| f.canonical_key.as_str()).collect();
    let mut used: HashSet<String> = HashSet::new();
    for group in groups.iter_mut() {
        let own_anchor = group.signal == GroupSignal::ExplicitContainer;
        let clashes = |key: &str, used: &HashSet<String>| {
            used.contains(key) || (!own_anchor && field_keys.contains(key))
        };
        if clashes(&group.group_key, &used) {
            let base = group.group_key.clone();
            let mut n = 2;
            while clashes(&format!("{base}-{n}"), &used) {
                n += 1;
            }
            group.group_key = format!("{base}-{n}");
        }
        used.insert(group.group_key.clone());
    }
}
