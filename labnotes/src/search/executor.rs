//! Runs extracted [`SearchParams`] against the entries table

use super::filter::{contains_pattern, FilterQuery, SqlParam};
use super::params::SearchParams;
use crate::config::MIN_SEARCH_TERM_LEN;
use crate::database::{Entry, Repository};
use crate::error::Result;
use std::collections::BTreeSet;

const TERM_COLUMNS: [&str; 4] = ["entry_name", "extra_txt", "tags", "conditions"];

fn title_case(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// LIKE patterns tried for one term: as written and lowercase, each bare and
/// wrapped in single-character wildcards, then uppercase and title case.
fn term_patterns(term: &str) -> [SqlParam; 6] {
    let lower = term.to_lowercase();
    [
        contains_pattern(term),
        contains_pattern(&format!("_{term}_")),
        contains_pattern(&lower),
        contains_pattern(&format!("_{lower}_")),
        contains_pattern(&term.to_uppercase()),
        contains_pattern(&title_case(term)),
    ]
}

/// Distinct terms of title, text, tags and keyword, split on spaces and commas.
fn search_terms(params: &SearchParams) -> BTreeSet<String> {
    [&params.title, &params.text, &params.tags, &params.keyword]
        .into_iter()
        .flatten()
        .flat_map(|value| value.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|term| term.chars().count() >= MIN_SEARCH_TERM_LEN)
        .map(str::to_string)
        .collect()
}

/// Predicate for a free-text search. Every term must match in at least one
/// column; author and dates narrow further.
pub fn nl_query(params: &SearchParams) -> FilterQuery {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(hash_id) = &params.hash_id {
        clauses.push("id_hash LIKE ?".to_string());
        values.push(contains_pattern(hash_id));
    }

    for term in search_terms(params) {
        let patterns = term_patterns(&term);
        let ors: Vec<String> = TERM_COLUMNS
            .iter()
            .flat_map(|column| std::iter::repeat(format!("{column} LIKE ?")).take(patterns.len()))
            .collect();
        clauses.push(format!("({})", ors.join(" OR ")));
        for _ in TERM_COLUMNS {
            values.extend(patterns.iter().cloned());
        }
    }

    if let Some(author) = &params.author {
        clauses.push("LOWER(author) LIKE ?".to_string());
        values.push(contains_pattern(&author.to_lowercase()));
    }

    if let Some(start) = &params.date_start {
        clauses.push("date >= ?".to_string());
        values.push(start.as_str().into());
    }

    if let Some(end) = &params.date_end {
        clauses.push("date <= ?".to_string());
        values.push(end.as_str().into());
    }

    FilterQuery::from_clauses(clauses, values)
}

/// Executes free-text searches
#[derive(Clone)]
pub struct SearchExecutor {
    repo: Repository,
}

impl SearchExecutor {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Matching entries, newest first. A usage question matches nothing.
    pub async fn execute(&self, params: &SearchParams) -> Result<Vec<Entry>> {
        if params.is_usage_question {
            return Ok(Vec::new());
        }

        let query = nl_query(params);
        tracing::debug!("Free-text search: {} {:?}", query.predicate, query.params);

        let entries = self.repo.fetch_matching(&query).await?;
        tracing::debug!("Free-text search found {} entries", entries.len());
        Ok(entries)
    }
}
