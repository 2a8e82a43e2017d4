//! Reply-side privacy filter.
//!
//! A reply tells the requester *that* their phenotype overlapped with a local patient, and by how
//! much, without naming the local patient's features when the scorer chose to hide them. The
//! input is the scorer's per-feature match detail; the output is the feature list that is safe
//! to put on the wire.

use crate::validation::TermPattern;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The "Phenotypic abnormality" root term, reported when neither the matched feature nor its
/// category may be disclosed.
pub const MOST_GENERIC_PHENOTYPE_TERM: &str = "HP:0000118";

/// One group of the scorer's match detail.
///
/// `category` is the term the group was matched under; empty means the features did not match
/// anything in the query. Entries of `matches` may be empty strings, meaning the scorer matched a
/// feature but hid its identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct FeatureMatchGroup {
    #[serde(default, deserialize_with = "category_id")]
    pub category: String,
    #[serde(default, rename = "match")]
    pub matches: Vec<String>,
}

impl FeatureMatchGroup {
    pub fn new(category: impl Into<String>, matches: Vec<String>) -> Self {
        Self {
            category: category.into(),
            matches,
        }
    }
}

/// Accepts either `"HP:..."` or `{"id": "HP:..."}` for the category.
fn category_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Category {
        Plain(String),
        Term {
            #[serde(default)]
            id: Option<String>,
        },
    }

    Ok(match Option::<Category>::deserialize(deserializer)? {
        Some(Category::Plain(id)) => id,
        Some(Category::Term { id }) => id.unwrap_or_default(),
        None => String::new(),
    })
}

/// A reply feature derived from match detail. Always reported as observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObfuscatedFeature {
    pub id: String,
    /// `false` when the feature came from a group with no matching category.
    pub matched: bool,
    /// `true` when the feature's own identity was replaced by its category or the generic term.
    pub obfuscated: bool,
    pub count: usize,
}

#[derive(Default)]
struct Tally {
    count: usize,
    obfuscated: bool,
    not_matched: bool,
}

/// Derive the caller-safe feature list from the scorer's match detail.
///
/// Output is ordered by term id. Ids that fail `pattern` are dropped.
pub fn obfuscate_feature_matches(
    groups: &[FeatureMatchGroup],
    pattern: &TermPattern,
) -> Vec<ObfuscatedFeature> {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for group in groups {
        let category = group.category.trim();
        for entry in &group.matches {
            let entry = entry.trim();
            let (id, substituted) = if !entry.is_empty() {
                (entry, false)
            } else if !category.is_empty() {
                (category, true)
            } else {
                (MOST_GENERIC_PHENOTYPE_TERM, true)
            };

            let tally = tallies.entry(id.to_uppercase()).or_default();
            tally.count += 1;
            tally.obfuscated |= substituted;
            tally.not_matched |= category.is_empty();
        }
    }

    tallies
        .into_iter()
        .filter(|(id, _)| {
            let ok = pattern.matches(id);
            if !ok {
                tracing::warn!("dropping match detail term [{}] from reply", id);
            }
            ok
        })
        .map(|(id, tally)| ObfuscatedFeature {
            id,
            matched: !tally.not_matched,
            obfuscated: tally.obfuscated,
            count: tally.count,
        })
        .collect()
}
