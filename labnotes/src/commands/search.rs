//! Search commands
//!
//! Form filtering, paginated realtime filtering, free-text search and the
//! autocomplete lookups.

use super::{user_message, Response};
use crate::app::AppState;
use crate::conditions::FormFields;
use crate::database::{EntryView, Page, TextExcerpt};
use crate::search::FilterCriteria;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct NlSearchRequest {
    pub query: String,
}

/// Free-text search reply
#[derive(Debug, Clone, Serialize)]
pub struct NlSearchResponse {
    pub success: bool,
    pub entries: Vec<EntryView>,
    pub message: String,
}

/// Window of a paginated listing
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Every entry matching the criteria
pub async fn filter_entries(state: &AppState, criteria: &FilterCriteria) -> Response<Vec<EntryView>> {
    state.search_service.filter(criteria).await.into()
}

/// Every entry matching a submitted search form
pub async fn filter_form(state: &AppState, fields: &FormFields) -> Response<Vec<EntryView>> {
    filter_entries(state, &FilterCriteria::from_fields(fields)).await
}

/// One page of matches with the running total
pub async fn realtime_filter_entries(
    state: &AppState,
    criteria: &FilterCriteria,
    page: PageRequest,
) -> Response<Page> {
    state
        .search_service
        .filter_page(criteria, page.offset, page.limit)
        .await
        .into()
}

pub async fn count_matching_entries(state: &AppState, criteria: &FilterCriteria) -> Response<i64> {
    state.search_service.count(criteria).await.into()
}

/// Interpret a free-text query and return matches with an explanation.
pub async fn nl_search(state: &AppState, request: NlSearchRequest) -> NlSearchResponse {
    let query = request.query.trim();
    if query.is_empty() {
        return NlSearchResponse {
            success: false,
            entries: Vec::new(),
            message: "Please enter a search query".to_string(),
        };
    }

    match state.search_service.nl_search(query).await {
        Ok(outcome) => NlSearchResponse {
            success: true,
            message: outcome.message().to_string(),
            entries: outcome.entries,
        },
        Err(e) => NlSearchResponse {
            success: false,
            entries: Vec::new(),
            message: user_message(&e),
        },
    }
}

pub async fn author_search(state: &AppState, text: &str) -> Response<Vec<String>> {
    state.search_service.suggest_authors(text).await.into()
}

pub async fn tags_search(state: &AppState, text: &str) -> Response<Vec<String>> {
    state.search_service.suggest_tags(text).await.into()
}

pub async fn text_search(state: &AppState, text: &str) -> Response<Vec<TextExcerpt>> {
    state.search_service.text_excerpts(text).await.into()
}

pub async fn title_search(state: &AppState, text: &str) -> Response<Vec<String>> {
    state.search_service.suggest_titles(text).await.into()
}

pub async fn keyword_search(state: &AppState, text: &str) -> Response<Vec<String>> {
    state.search_service.suggest_keywords(text).await.into()
}
