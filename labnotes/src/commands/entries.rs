//! Entry commands
//!
//! Insert, update, delete and view entries, plus bulk actions on a selection.

use super::{user_message, Response};
use crate::app::AppState;
use crate::conditions::FormFields;
use crate::database::{Entry, EntryView, FamilyTree};
use crate::error::Result;
use serde::Serialize;

/// An entry with its relatives
#[derive(Debug, Clone, Serialize)]
pub struct EntryDetails {
    pub entry: EntryView,
    pub extra_txt: String,
    pub file_path: String,
    pub family: FamilyTree,
}

/// Create an entry from an insert form. Replies with the new hash id.
pub async fn insert_entry(state: &AppState, author: &str, fields: &FormFields) -> Response<String> {
    match state.entries_service.create_from_form(author, fields).await {
        Ok(entry) => {
            let message = format!("entry is added successfully! hash_id: {}", entry.id_hash);
            Response::ok_with_message(entry.id_hash, message)
        }
        Err(e) => Response::failed(user_message(&e)),
    }
}

pub async fn update_entry(state: &AppState, id: i64, fields: &FormFields) -> Response<EntryView> {
    state
        .entries_service
        .update_from_form(id, fields)
        .await
        .map(|entry| entry.view())
        .into()
}

pub async fn delete_entry(state: &AppState, id: i64) -> Response<()> {
    state.entries_service.delete_entry(id).await.into()
}

async fn details(state: &AppState, entry: Entry) -> Result<EntryDetails> {
    let family = state.entries_service.family_tree(&entry.id_hash).await?;
    Ok(EntryDetails {
        entry: entry.view(),
        extra_txt: entry.extra_txt,
        file_path: entry.file_path,
        family,
    })
}

pub async fn get_entry(state: &AppState, id: i64) -> Response<EntryDetails> {
    let result = match state.entries_service.get_entry(id).await {
        Ok(entry) => details(state, entry).await,
        Err(e) => Err(e),
    };
    result.into()
}

pub async fn get_entry_by_hash(state: &AppState, hash_id: &str) -> Response<EntryDetails> {
    let result = match state.entries_service.get_entry_by_hash(hash_id).await {
        Ok(entry) => details(state, entry).await,
        Err(e) => Err(e),
    };
    result.into()
}

/// Point the entries ticked in `fields` at `parent_hash`.
pub async fn set_parent_entry(state: &AppState, fields: &FormFields, parent_hash: &str) -> Response<u64> {
    match state
        .entries_service
        .set_parent_for_selection(fields, parent_hash)
        .await
    {
        Ok(changed) => Response::ok_with_message(changed, "Parent entry was set successfully"),
        Err(e) => Response::failed(user_message(&e)),
    }
}

pub async fn timeline(state: &AppState, author: &str) -> Response<Vec<EntryView>> {
    state
        .entries_service
        .timeline(author)
        .await
        .map(|entries| entries.iter().map(Entry::view).collect())
        .into()
}
