//! Condition template commands

use super::{user_message, Response};
use crate::app::AppState;
use crate::conditions::FormFields;
use crate::database::TemplateBatchOutcome;
use crate::services::MergedTemplate;

/// Apply a template management form for `author`.
pub async fn save_templates(
    state: &AppState,
    author: &str,
    fields: &FormFields,
) -> Response<TemplateBatchOutcome> {
    match state.template_store.save_or_update(author, fields).await {
        Ok(outcome) if outcome.not_found.is_empty() => {
            Response::ok_with_message(outcome, "Templates saved")
        }
        Ok(outcome) => {
            let message = format!("Templates not found: {}", outcome.not_found.join(", "));
            Response::ok_with_message(outcome, message)
        }
        Err(e) => Response::failed(user_message(&e)),
    }
}

/// A saved template laid over the taxonomy of one method
pub async fn conditions_by_template_and_method(
    state: &AppState,
    author: &str,
    template_name: &str,
    method: &str,
) -> Response<MergedTemplate> {
    state
        .template_store
        .merged_template(author, template_name, method)
        .await
        .into()
}

pub async fn list_templates(state: &AppState, author: &str) -> Response<Vec<MergedTemplate>> {
    state.template_store.list_merged(author).await.into()
}

pub async fn list_methods(state: &AppState) -> Response<Vec<String>> {
    state.template_store.methods().await.into()
}

/// Set up a newly registered user.
pub async fn provision_user(state: &AppState, author: &str) -> Response<()> {
    state.template_store.provision_user(author).await.into()
}
