//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::conditions::TaxonomyCatalog;
use crate::database::{create_pool, Repository};
use crate::error::{AppError, Result};
use crate::search::{ExtractorChain, KeywordExtractor, LlmExtractor};
use crate::services::settings::{AppSettings, LlmSettings};
use crate::services::{EntriesService, SearchService, TemplateStore};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub entries_service: EntriesService,
    pub search_service: SearchService,
    pub template_store: TemplateStore,
}

/// Completion service first when enabled, keyword matching always last.
pub fn build_extractor_chain(llm: &LlmSettings) -> Result<ExtractorChain> {
    let mut chain = ExtractorChain::new();

    if llm.enabled {
        let extractor = LlmExtractor::new(llm.to_config())
            .map_err(|e| AppError::Generic(format!("Failed to build HTTP client: {}", e)))?;
        if extractor.is_configured() {
            chain = chain.with(Arc::new(extractor));
        }
    }

    let chain = chain.with(Arc::new(KeywordExtractor::new()));
    tracing::info!("Free-text search strategies: {:?}", chain.names());
    Ok(chain)
}

impl AppState {
    /// Wire services from already-resolved settings.
    pub async fn initialize(settings: &AppSettings) -> Result<Self> {
        tracing::info!("Initializing application");

        let pool = create_pool(&settings.database.file, settings.database.pool_config()).await?;
        let repo = Repository::new(pool);

        let catalog = TaxonomyCatalog::new(
            &settings.conditions.taxonomy_dir,
            &settings.conditions.default_method,
        );
        let extractors = build_extractor_chain(&settings.llm)?;

        let state = Self {
            entries_service: EntriesService::new(repo.clone()),
            search_service: SearchService::new(repo.clone(), extractors),
            template_store: TemplateStore::new(repo, catalog),
        };

        tracing::info!("Application initialized successfully");
        Ok(state)
    }
}
