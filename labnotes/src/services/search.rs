//! Search service
//!
//! Form filtering with pagination, free-text search and the autocomplete
//! lookups behind the search boxes.

use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use crate::database::{Entry, EntryView, Page, Repository, TextExcerpt};
use crate::error::Result;
use crate::search::{ExtractorChain, FilterCriteria, SearchExecutor, SearchParams};

/// Outcome of a free-text search
#[derive(Debug, Clone)]
pub struct NlSearchOutcome {
    pub params: SearchParams,
    pub entries: Vec<EntryView>,
}

impl NlSearchOutcome {
    /// Text shown to the user alongside the results
    pub fn message(&self) -> &str {
        &self.params.explanation
    }
}

fn views(entries: &[Entry]) -> Vec<EntryView> {
    entries.iter().map(Entry::view).collect()
}

/// Page size within `1..=MAX_PAGE_LIMIT`; absent means the default.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

/// Service for searching entries
#[derive(Clone)]
pub struct SearchService {
    repo: Repository,
    executor: SearchExecutor,
    extractors: ExtractorChain,
}

impl SearchService {
    pub fn new(repo: Repository, extractors: ExtractorChain) -> Self {
        Self {
            executor: SearchExecutor::new(repo.clone()),
            repo,
            extractors,
        }
    }

    /// Every entry matching the form criteria.
    pub async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<EntryView>> {
        let query = criteria.build();
        tracing::debug!("Filter: {} {:?}", query.predicate, query.params);

        let entries = self.repo.fetch_matching(&query).await?;
        Ok(views(&entries))
    }

    /// One page of matches plus the total the page belongs to.
    pub async fn filter_page(
        &self,
        criteria: &FilterCriteria,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page> {
        let query = criteria.build();
        let limit = clamp_limit(limit);
        let offset = offset.unwrap_or(0).max(0);
        tracing::debug!(
            "Realtime filter (offset {}, limit {}): {} {:?}",
            offset,
            limit,
            query.predicate,
            query.params
        );

        let entries = self.repo.fetch_page(&query, limit, offset).await?;
        let total = self.repo.count_matching(&query).await?;

        Ok(Page::new(views(&entries), total, offset))
    }

    pub async fn count(&self, criteria: &FilterCriteria) -> Result<i64> {
        self.repo.count_matching(&criteria.build()).await
    }

    /// Interpret `query` and run it. Extraction itself cannot fail; only the
    /// database can.
    pub async fn nl_search(&self, query: &str) -> Result<NlSearchOutcome> {
        tracing::info!("Free-text search: {}", query);

        let params = self.extractors.extract(query).await;
        let entries = self.executor.execute(&params).await?;

        tracing::info!("Free-text search returned {} entries", entries.len());
        Ok(NlSearchOutcome {
            entries: views(&entries),
            params,
        })
    }

    pub async fn suggest_authors(&self, input: &str) -> Result<Vec<String>> {
        self.repo.suggest_authors(input).await
    }

    pub async fn suggest_tags(&self, input: &str) -> Result<Vec<String>> {
        self.repo.suggest_tags(input).await
    }

    pub async fn suggest_titles(&self, fragment: &str) -> Result<Vec<String>> {
        self.repo.suggest_titles(fragment).await
    }

    pub async fn suggest_keywords(&self, fragment: &str) -> Result<Vec<String>> {
        self.repo.suggest_keywords(fragment).await
    }

    pub async fn text_excerpts(&self, keyword: &str) -> Result<Vec<TextExcerpt>> {
        self.repo.text_excerpts(keyword).await
    }
}
