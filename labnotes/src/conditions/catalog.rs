//! Per-method taxonomy files
//!
//! Each experimental method has its own taxonomy stored as `<method>.json`
//! in one folder.

use super::taxonomy::{parse_taxonomy, Taxonomy};
use crate::error::{AppError, Result};
use std::path::PathBuf;
use tokio::fs;

const TAXONOMY_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct TaxonomyCatalog {
    folder: PathBuf,
    default_method: String,
}

impl TaxonomyCatalog {
    pub fn new(folder: impl Into<PathBuf>, default_method: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            default_method: default_method.into(),
        }
    }

    pub fn default_method(&self) -> &str {
        &self.default_method
    }

    /// Available methods, the default one first and the rest sorted.
    pub async fn methods(&self) -> Result<Vec<String>> {
        let mut methods = Vec::new();
        let mut dir = fs::read_dir(&self.folder).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TAXONOMY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if stem != self.default_method {
                    methods.push(stem.to_string());
                }
            }
        }

        methods.sort();
        methods.insert(0, self.default_method.clone());
        Ok(methods)
    }

    pub async fn load(&self, method: &str) -> Result<Taxonomy> {
        if method.is_empty()
            || method.contains(['/', '\\'])
            || method.starts_with('.')
        {
            return Err(AppError::Taxonomy(format!("Invalid method name '{}'", method)));
        }

        let path = self.folder.join(format!("{method}.{TAXONOMY_EXTENSION}"));
        tracing::debug!("Loading taxonomy from {:?}", path);

        let content = fs::read_to_string(&path).await.map_err(|e| {
            AppError::Taxonomy(format!("Cannot read taxonomy for '{}': {}", method, e))
        })?;

        parse_taxonomy(&content)
            .map_err(|e| AppError::Taxonomy(format!("Malformed taxonomy for '{}': {}", method, e)))
    }

    pub async fn load_default(&self) -> Result<Taxonomy> {
        self.load(&self.default_method).await
    }
}
