//! Condition taxonomy and template merging
//!
//! The taxonomy is an externally supplied `category -> subcategory ->
//! [leaf, ...]` mapping. Merging marks each leaf as checked (and, for valued
//! leaves, carries the stored value) so a saved selection can be shown and
//! edited again.

use super::token::ConditionSet;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// `category -> subcategory -> leaves`
pub type Taxonomy = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// `category -> subcategory -> annotated leaves`, keys sorted
pub type AnnotatedTaxonomy = BTreeMap<String, BTreeMap<String, Vec<AnnotatedLeaf>>>;

/// A taxonomy leaf with its selection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLeaf {
    pub leaf: String,
    pub checked: bool,
    /// Stored value of a valued leaf
    pub value: Option<String>,
}

/// Serializes as `[leaf, "checked", value]` or `[leaf, ""]`, the shape the
/// condition form templates consume.
impl Serialize for AnnotatedLeaf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = if self.value.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.leaf)?;
        seq.serialize_element(if self.checked { "checked" } else { "" })?;
        if let Some(value) = &self.value {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

pub fn parse_taxonomy(json: &str) -> serde_json::Result<Taxonomy> {
    serde_json::from_str(json)
}

/// A leaf written `name&unit` describes a valued condition.
pub fn is_param_descriptor(leaf: &str) -> bool {
    leaf.split('&').count() == 2
}

/// Annotate every taxonomy leaf against a stored selection.
///
/// Matching is by substring, as the stored strings always were: a valued
/// leaf is checked when any token contains the descriptor's name, and a
/// plain leaf when `category&subcategory&leaf` occurs anywhere in the
/// comma-joined selection.
pub fn merge(taxonomy: &Taxonomy, target: &ConditionSet) -> AnnotatedTaxonomy {
    let target_string = target.legacy_string();
    let target_tokens: Vec<String> = target.tokens().iter().map(|t| t.legacy()).collect();

    taxonomy
        .iter()
        .map(|(category, subcategories)| {
            let annotated = subcategories
                .iter()
                .map(|(subcategory, leaves)| {
                    let mut leaves: Vec<AnnotatedLeaf> = leaves
                        .iter()
                        .map(|leaf| annotate(category, subcategory, leaf, &target_string, &target_tokens))
                        .collect();
                    leaves.sort_by(|a, b| a.leaf.cmp(&b.leaf));
                    (subcategory.clone(), leaves)
                })
                .collect();
            (category.clone(), annotated)
        })
        .collect()
}

fn annotate(
    category: &str,
    subcategory: &str,
    leaf: &str,
    target_string: &str,
    target_tokens: &[String],
) -> AnnotatedLeaf {
    if is_param_descriptor(leaf) {
        let param_name = leaf.split('&').next().unwrap_or(leaf);
        let found = target_tokens
            .iter()
            .find(|token| token.contains(param_name))
            .map(|token| token.rsplit('&').next().unwrap_or(token).to_string());

        return AnnotatedLeaf {
            leaf: leaf.to_string(),
            checked: found.is_some(),
            value: found,
        };
    }

    let qualified = format!("{category}&{subcategory}&{leaf}");
    AnnotatedLeaf {
        leaf: leaf.to_string(),
        checked: target_string.contains(&qualified),
        value: None,
    }
}
