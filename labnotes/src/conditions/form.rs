//! Condition encoding from submitted form fields
//!
//! Checkbox leaves arrive as `condition&<path>` keys, valued leaves as a
//! `PARAM&<path>` key paired with a `PARAMVALUE&<path>` key whose value
//! carries the entered value. Template forms prefix `<path>` with the
//! template name; entry forms do not.

use super::token::{ConditionSet, ConditionToken};
use crate::config::DEFAULT_TEMPLATE_NAME;

pub const CONDITION_PREFIX: &str = "condition";
pub const PARAM_PREFIX: &str = "PARAM";
pub const PARAM_VALUE_PREFIX: &str = "PARAMVALUE";
pub const DELETE_PREFIX: &str = "delete";
pub const NEW_TEMPLATE_FIELD: &str = "new_template_name";

/// Ordered key/value pairs of a submitted form
pub type FormFields = [(String, String)];

/// Value of the first field named `key`
pub fn field<'a>(fields: &'a FormFields, key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// A condition-bearing field after its prefix has been stripped
#[derive(Debug, Clone, PartialEq, Eq)]
struct PostedCondition<'a> {
    segments: Vec<&'a str>,
    /// Present for `PARAM` fields
    value: Option<String>,
}

impl PostedCondition<'_> {
    fn into_token(self) -> Option<ConditionToken> {
        let segments = self.segments;
        match self.value {
            None => match segments.as_slice() {
                [] => None,
                [category, subcategory, leaf] => {
                    Some(ConditionToken::boolean(*category, *subcategory, *leaf))
                }
                _ => Some(ConditionToken::from_legacy(&segments.join("&"))),
            },
            Some(value) => {
                let (param, scope) = segments.split_last()?;
                Some(ConditionToken::parametrized(scope.join("&"), *param, value))
            }
        }
    }
}

/// Collect every `condition&` and `PARAM&` field in submission order.
///
/// A `PARAM` field without its `PARAMVALUE` partner is dropped with a
/// warning rather than rejected.
fn posted_conditions(fields: &FormFields) -> Vec<PostedCondition<'_>> {
    let mut posted = Vec::new();

    for (key, _) in fields {
        let Some((prefix, remainder)) = key.split_once('&') else {
            continue;
        };

        match prefix {
            CONDITION_PREFIX => posted.push(PostedCondition {
                segments: remainder.split('&').collect(),
                value: None,
            }),
            PARAM_PREFIX => {
                let value_key = format!("{PARAM_VALUE_PREFIX}&{remainder}");
                match field(fields, &value_key) {
                    Some(raw) => posted.push(PostedCondition {
                        segments: remainder.split('&').collect(),
                        value: Some(raw.rsplit('&').next().unwrap_or(raw).to_string()),
                    }),
                    None => {
                        tracing::warn!("Dropping '{}': no matching '{}' field", key, value_key);
                    }
                }
            }
            _ => {}
        }
    }

    posted
}

/// Conditions submitted with an entry insert or update form.
pub fn entry_conditions(fields: &FormFields) -> ConditionSet {
    posted_conditions(fields)
        .into_iter()
        .filter_map(PostedCondition::into_token)
        .collect()
}

/// Everything a template management form asks for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFormBatch {
    /// Conditions per template name, in order of first appearance
    pub groups: Vec<(String, ConditionSet)>,
    /// Templates named by `delete&<name>` keys
    pub deletions: Vec<String>,
    /// Name for the template saved from the `default` group
    pub new_template_name: Option<String>,
}

impl TemplateFormBatch {
    pub fn from_fields(fields: &FormFields) -> Self {
        let mut batch = Self {
            new_template_name: field(fields, NEW_TEMPLATE_FIELD)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            ..Self::default()
        };

        for mut posted in posted_conditions(fields) {
            if posted.segments.is_empty() {
                continue;
            }
            let template = posted.segments.remove(0).to_string();
            let Some(token) = posted.into_token() else {
                continue;
            };

            match batch.groups.iter_mut().find(|(name, _)| *name == template) {
                Some((_, set)) => set.push(token),
                None => batch.groups.push((template, ConditionSet::new(vec![token]))),
            }
        }

        for (key, _) in fields {
            if let Some((DELETE_PREFIX, name)) = key.split_once('&') {
                let name = name.split('&').next().unwrap_or(name);
                if !name.is_empty() && !batch.deletions.iter().any(|d| d == name) {
                    batch.deletions.push(name.to_string());
                }
            }
        }

        batch
    }

    /// Conditions posted under the `default` template
    pub fn default_group(&self) -> Option<&ConditionSet> {
        self.groups
            .iter()
            .find(|(name, _)| name == DEFAULT_TEMPLATE_NAME)
            .map(|(_, set)| set)
    }

    /// Groups that overwrite an existing named template
    pub fn updates(&self) -> impl Iterator<Item = (&str, &ConditionSet)> {
        self.groups
            .iter()
            .filter(|(name, _)| !name.is_empty() && name != DEFAULT_TEMPLATE_NAME)
            .map(|(name, set)| (name.as_str(), set))
    }
}
