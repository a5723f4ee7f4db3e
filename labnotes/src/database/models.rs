//! Database models
//!
//! Rust structs representing stored rows and the shapes returned to callers.
//! All models use serde for JSON output.

use crate::conditions::ConditionSet;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A laboratory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: i64,
    /// External identifier shown to users
    pub id_hash: String,
    /// Comma-separated tag list
    pub tags: String,
    pub extra_txt: String,
    pub file_path: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub author: String,
    /// Encoded condition set
    pub conditions: String,
    pub entry_name: String,
    /// `id_hash` of the parent entry
    pub entry_parent: Option<String>,
}

impl Entry {
    pub fn tag_list(&self) -> Vec<String> {
        split_tags(&self.tags)
    }

    pub fn condition_set(&self) -> ConditionSet {
        ConditionSet::parse_lenient(&self.conditions)
    }

    pub fn view(&self) -> EntryView {
        EntryView {
            hash_id: self.id_hash.clone(),
            tags: self.tag_list(),
            author: self.author.clone(),
            date: self.date.clone(),
            conditions: self.condition_set().display_labels(),
            title: self.entry_name.clone(),
            id: self.id,
        }
    }
}

/// Split a comma-separated tag list, dropping blanks.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Entry as listed in search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    pub hash_id: String,
    pub tags: Vec<String>,
    pub author: String,
    pub date: String,
    /// Display labels of the entry's conditions
    pub conditions: Vec<String>,
    pub title: String,
    pub id: i64,
}

/// Create entry request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEntryRequest {
    pub author: String,
    pub date: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub extra_txt: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub conditions: ConditionSet,
    pub entry_name: String,
    #[serde(default)]
    pub entry_parent: Option<String>,
}

/// Update entry request; the author never changes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEntryRequest {
    pub id: i64,
    pub date: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub extra_txt: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub conditions: ConditionSet,
    pub entry_name: String,
    #[serde(default)]
    pub entry_parent: Option<String>,
}

/// A user's saved condition selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConditionTemplate {
    pub id: i64,
    pub author: String,
    pub template_name: String,
    /// Encoded condition set
    pub conditions: String,
}

impl ConditionTemplate {
    pub fn condition_set(&self) -> ConditionSet {
        ConditionSet::parse_lenient(&self.conditions)
    }
}

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub entries: Vec<EntryView>,
    /// Rows matching the whole query
    pub total: i64,
    pub has_more: bool,
    pub next_offset: Option<i64>,
}

impl Page {
    pub fn new(entries: Vec<EntryView>, total: i64, offset: i64) -> Self {
        let next = offset + entries.len() as i64;
        let has_more = next < total;
        Self {
            entries,
            total,
            has_more,
            next_offset: has_more.then_some(next),
        }
    }
}

/// Name and id of an entry in a family tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct EntryLink {
    pub entry_name: String,
    pub id: i64,
}

/// An entry with its parent and children
#[derive(Debug, Clone, Serialize)]
pub struct FamilyTree {
    #[serde(rename = "self")]
    pub this: EntryLink,
    pub parent: Option<EntryLink>,
    pub children: Vec<EntryLink>,
}

/// What a template batch changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateBatchOutcome {
    pub created: Option<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    /// Templates named for update or deletion that do not exist
    pub not_found: Vec<String>,
}

/// Free-text match with surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextExcerpt {
    pub excerpt: String,
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(conditions: &str) -> Entry {
        Entry {
            id: 7,
            id_hash: "ABCDE12345".to_string(),
            tags: "pcr, ,gel".to_string(),
            extra_txt: String::new(),
            file_path: String::new(),
            date: "2024-05-01".to_string(),
            author: "alice".to_string(),
            conditions: conditions.to_string(),
            entry_name: "Run 7".to_string(),
            entry_parent: None,
        }
    }

    #[test]
    fn test_view_decodes_tags_and_conditions() {
        let view = entry("v1:b&Buffer&pH&acidic,p&Cell&Temperature&37").view();

        assert_eq!(view.tags, vec!["pcr", "gel"]);
        assert_eq!(view.conditions, vec!["acidic", "Temperature->37"]);
        assert_eq!(view.title, "Run 7");
        assert_eq!(view.hash_id, "ABCDE12345");
    }

    #[test]
    fn test_view_reads_legacy_conditions() {
        let view = entry("Buffer&pH&acidic,Cell&Temperature&37&C").view();
        assert_eq!(view.conditions, vec!["acidic", "37->C"]);
    }

    #[test]
    fn test_page_bookkeeping() {
        let views = vec![entry("").view(); 10];

        let page = Page::new(views.clone(), 25, 10);
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(20));

        let last = Page::new(views[..5].to_vec(), 25, 20);
        assert!(!last.has_more);
        assert_eq!(last.next_offset, None);
    }
}
