//! Free text to [`SearchParams`]
//!
//! Strategies are tried in order; the first that succeeds answers. The last
//! strategy of a chain is expected to be infallible in practice, and the
//! chain still degrades to a bare explanation if every strategy fails.

use super::params::SearchParams;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unparseable reply: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ExtractError {
    fn from(e: reqwest::Error) -> Self {
        ExtractError::Transport(e.to_string())
    }
}

pub type ExtractResult<T> = std::result::Result<T, ExtractError>;

#[async_trait]
pub trait SearchParamExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn extract(&self, query: &str) -> ExtractResult<SearchParams>;
}

/// Ordered list of strategies
#[derive(Clone, Default)]
pub struct ExtractorChain {
    strategies: Vec<Arc<dyn SearchParamExtractor>>,
}

impl ExtractorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, strategy: Arc<dyn SearchParamExtractor>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies until one answers. Never fails.
    pub async fn extract(&self, query: &str) -> SearchParams {
        for strategy in &self.strategies {
            match strategy.extract(query).await {
                Ok(params) => {
                    tracing::debug!("Extractor '{}' answered: {:?}", strategy.name(), params);
                    return params.normalized();
                }
                Err(e) => {
                    tracing::warn!("Extractor '{}' failed, falling back: {}", strategy.name(), e);
                }
            }
        }

        SearchParams::explained("I could not interpret your query.")
    }
}
