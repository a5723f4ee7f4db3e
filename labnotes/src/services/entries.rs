//! Entries service
//!
//! Entry lifecycle as driven by submitted forms: field extraction, condition
//! encoding and the bulk actions on a selection of entries.

use crate::conditions::{entry_conditions, field, FormFields};
use crate::database::{
    CreateEntryRequest, Entry, FamilyTree, Repository, UpdateEntryRequest,
};
use crate::error::{AppError, Result};

/// Prefix of the checkbox fields selecting entries for a bulk action
pub const SELECT_PREFIX: &str = "Select";

fn form_value(fields: &FormFields, key: &str) -> String {
    field(fields, key).unwrap_or_default().to_string()
}

fn parent_value(fields: &FormFields) -> Option<String> {
    field(fields, "parent_entry")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Entry ids ticked as `Select&<id>`
pub fn selected_ids(fields: &FormFields) -> Vec<i64> {
    fields
        .iter()
        .filter_map(|(key, _)| {
            let (prefix, id) = key.split_once('&')?;
            if prefix != SELECT_PREFIX {
                return None;
            }
            id.trim().parse().ok()
        })
        .collect()
}

/// Service for managing entries
#[derive(Clone)]
pub struct EntriesService {
    repo: Repository,
}

impl EntriesService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create an entry from an insert form submitted by `author`.
    pub async fn create_from_form(&self, author: &str, fields: &FormFields) -> Result<Entry> {
        let req = CreateEntryRequest {
            author: author.to_string(),
            date: form_value(fields, "date"),
            tags: form_value(fields, "Tags"),
            extra_txt: form_value(fields, "Notes"),
            file_path: form_value(fields, "File_Path"),
            conditions: entry_conditions(fields),
            entry_name: form_value(fields, "entry_name"),
            entry_parent: parent_value(fields),
        };

        self.create_entry(req).await
    }

    pub async fn create_entry(&self, req: CreateEntryRequest) -> Result<Entry> {
        tracing::info!("Creating entry '{}' for {}", req.entry_name, req.author);

        let entry = self.repo.create_entry(req).await?;

        tracing::info!("Entry created: {} ({})", entry.id, entry.id_hash);
        Ok(entry)
    }

    /// Rewrite entry `id` from an edit form. Conditions are re-encoded from
    /// the submitted checkboxes, so unticked conditions are removed.
    pub async fn update_from_form(&self, id: i64, fields: &FormFields) -> Result<Entry> {
        let req = UpdateEntryRequest {
            id,
            date: form_value(fields, "date"),
            tags: form_value(fields, "Tags"),
            extra_txt: form_value(fields, "Notes"),
            file_path: form_value(fields, "File_Path"),
            conditions: entry_conditions(fields),
            entry_name: form_value(fields, "entry_name"),
            entry_parent: parent_value(fields),
        };

        tracing::debug!("Updating entry: {}", id);
        let entry = self.repo.update_entry(req).await?;
        tracing::debug!("Entry updated: {}", entry.id);
        Ok(entry)
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry> {
        self.repo.get_entry(id).await
    }

    pub async fn get_entry_by_hash(&self, hash_id: &str) -> Result<Entry> {
        self.repo.get_entry_by_hash(hash_id).await
    }

    /// Delete an entry; its children lose their parent reference.
    pub async fn delete_entry(&self, id: i64) -> Result<()> {
        tracing::info!("Deleting entry: {}", id);
        self.repo.delete_entry(id).await?;
        tracing::info!("Entry deleted: {}", id);
        Ok(())
    }

    /// Point every selected entry at `parent_hash`. Returns how many changed.
    pub async fn set_parent_for_selection(&self, fields: &FormFields, parent_hash: &str) -> Result<u64> {
        let ids = selected_ids(fields);
        if ids.is_empty() {
            return Err(AppError::Validation("No entries were selected".to_string()));
        }

        let changed = self.repo.set_parent(&ids, parent_hash.trim()).await?;
        tracing::info!("Set parent {} on {} entries", parent_hash, changed);
        Ok(changed)
    }

    pub async fn family_tree(&self, hash_id: &str) -> Result<FamilyTree> {
        self.repo.family_tree(hash_id).await
    }

    /// An author's most recent entries
    pub async fn timeline(&self, author: &str) -> Result<Vec<Entry>> {
        self.repo.timeline(author).await
    }
}
