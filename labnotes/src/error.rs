//! Error types for labnotes
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized into command responses.

use crate::conditions::ConditionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Condition encoding error: {0}")]
    Conditions(#[from] ConditionError),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Parent entry does not exist: {0}")]
    ParentNotFound(String),

    #[error("Template '{template}' not found for {author}")]
    TemplateNotFound { author: String, template: String },

    #[error("Template '{template}' already exists for {author}")]
    TemplateExists { author: String, template: String },

    #[error("Taxonomy error: {0}")]
    Taxonomy(String),

    #[error("Could not allocate a unique hash id after {0} attempts")]
    HashIdExhausted(usize),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Whether the error means "nothing matched" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::EntryNotFound(_)
                | AppError::ParentNotFound(_)
                | AppError::TemplateNotFound { .. }
        )
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
