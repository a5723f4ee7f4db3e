//! Condition template store
//!
//! Saved condition selections per user, edited through one batch form and
//! shown merged against a method's taxonomy.

use crate::conditions::{merge, AnnotatedTaxonomy, FormFields, TaxonomyCatalog, TemplateFormBatch};
use crate::config::DEFAULT_TEMPLATE_NAME;
use crate::database::{Repository, TemplateBatchOutcome};
use crate::error::Result;
use serde::Serialize;

/// A template ready for display
#[derive(Debug, Clone, Serialize)]
pub struct MergedTemplate {
    pub template_name: String,
    pub conditions: AnnotatedTaxonomy,
}

/// Service for condition templates
#[derive(Clone)]
pub struct TemplateStore {
    repo: Repository,
    catalog: TaxonomyCatalog,
}

impl TemplateStore {
    pub fn new(repo: Repository, catalog: TaxonomyCatalog) -> Self {
        Self { repo, catalog }
    }

    pub fn catalog(&self) -> &TaxonomyCatalog {
        &self.catalog
    }

    /// Give a new user their empty `default` template.
    pub async fn provision_user(&self, author: &str) -> Result<()> {
        tracing::info!("Provisioning templates for {}", author);
        self.repo.ensure_default_template(author).await
    }

    /// Apply a submitted template form: the `default` group is saved under
    /// `new_template_name`, other groups overwrite their template, and
    /// `delete&<name>` removes one. All or nothing.
    pub async fn save_or_update(&self, author: &str, fields: &FormFields) -> Result<TemplateBatchOutcome> {
        let batch = TemplateFormBatch::from_fields(fields);
        tracing::debug!(
            "Template batch for {}: {} groups, {} deletions",
            author,
            batch.groups.len(),
            batch.deletions.len()
        );

        let outcome = self.repo.apply_template_batch(author, &batch).await?;

        if !outcome.not_found.is_empty() {
            tracing::warn!("Templates not found for {}: {:?}", author, outcome.not_found);
        }
        tracing::info!(
            "Templates saved for {}: created {:?}, updated {}, deleted {}",
            author,
            outcome.created,
            outcome.updated.len(),
            outcome.deleted.len()
        );

        Ok(outcome)
    }

    /// One template merged against the taxonomy of `method`.
    pub async fn merged_template(
        &self,
        author: &str,
        template_name: &str,
        method: &str,
    ) -> Result<MergedTemplate> {
        let taxonomy = self.catalog.load(method).await?;
        let template = self.repo.get_template(author, template_name).await?;

        Ok(MergedTemplate {
            conditions: merge(&taxonomy, &template.condition_set()),
            template_name: template.template_name,
        })
    }

    /// Every template of `author` merged against the default taxonomy,
    /// `default` first.
    pub async fn list_merged(&self, author: &str) -> Result<Vec<MergedTemplate>> {
        let taxonomy = self.catalog.load_default().await?;
        let mut templates = self.repo.list_templates(author).await?;
        templates.sort_by_key(|t| t.template_name != DEFAULT_TEMPLATE_NAME);

        Ok(templates
            .into_iter()
            .map(|template| MergedTemplate {
                conditions: merge(&taxonomy, &template.condition_set()),
                template_name: template.template_name,
            })
            .collect())
    }

    pub async fn methods(&self) -> Result<Vec<String>> {
        self.catalog.methods().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use crate::error::AppError;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    const WESTERN: &str = r#"{
        "Buffer": {"pH": ["basic", "acidic"]},
        "Transfer": {"Settings": ["Voltage&V", "wet"]}
    }"#;

    async fn create_test_store() -> (TemplateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("western.json"), WESTERN).unwrap();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();

        let catalog = TaxonomyCatalog::new(temp_dir.path(), "western");
        (TemplateStore::new(Repository::new(pool), catalog), temp_dir)
    }

    fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn leaf<'a>(merged: &'a MergedTemplate, category: &str, sub: &str, name: &str) -> &'a crate::conditions::AnnotatedLeaf {
        merged.conditions[category][sub]
            .iter()
            .find(|l| l.leaf == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_merge() {
        let (store, _temp) = create_test_store().await;
        store.provision_user("alice").await.unwrap();

        let outcome = store
            .save_or_update(
                "alice",
                &form(&[
                    ("condition&default&Buffer&pH&acidic", "on"),
                    ("PARAM&default&Transfer&Voltage", "on"),
                    ("PARAMVALUE&default&Transfer&Voltage", "Voltage&100"),
                    ("new_template_name", "blot"),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcome.created.as_deref(), Some("blot"));

        let merged = store.merged_template("alice", "blot", "western").await.unwrap();
        assert!(leaf(&merged, "Buffer", "pH", "acidic").checked);
        assert!(!leaf(&merged, "Buffer", "pH", "basic").checked);

        let voltage = leaf(&merged, "Transfer", "Settings", "Voltage&V");
        assert!(voltage.checked);
        assert_eq!(voltage.value.as_deref(), Some("100"));

        let leaves: Vec<&str> = merged.conditions["Buffer"]["pH"]
            .iter()
            .map(|l| l.leaf.as_str())
            .collect();
        assert_eq!(leaves, vec!["acidic", "basic"]);
    }

    #[tokio::test]
    async fn test_list_merged_puts_default_first() {
        let (store, _temp) = create_test_store().await;
        store.provision_user("bob").await.unwrap();
        store
            .save_or_update(
                "bob",
                &form(&[
                    ("condition&default&Transfer&Settings&wet", "on"),
                    ("new_template_name", "alpha"),
                ]),
            )
            .await
            .unwrap();

        let templates = store.list_merged("bob").await.unwrap();
        let names: Vec<&str> = templates.iter().map(|t| t.template_name.as_str()).collect();
        assert_eq!(names, vec!["default", "alpha"]);
        assert!(leaf(&templates[1], "Transfer", "Settings", "wet").checked);
    }

    #[tokio::test]
    async fn test_unknown_template_and_method() {
        let (store, _temp) = create_test_store().await;
        store.provision_user("carol").await.unwrap();

        let missing = store.merged_template("carol", "ghost", "western").await;
        assert!(matches!(missing, Err(AppError::TemplateNotFound { .. })));

        let bad_method = store.merged_template("carol", "default", "../etc").await;
        assert!(matches!(bad_method, Err(AppError::Taxonomy(_))));
    }
}
