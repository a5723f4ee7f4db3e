//! Commands exposed to callers
//!
//! This module organizes commands into logical submodules:
//! - `search`: form filtering, pagination, free-text search, autocomplete
//! - `entries`: entry lifecycle and bulk actions
//! - `templates`: condition templates and taxonomy lookups
//!
//! All commands follow the pattern:
//! - Take `&AppState` as first parameter
//! - Never return an error; failures become `success: false` with a message

pub mod entries;
pub mod search;
pub mod templates;

pub use entries::*;
pub use search::*;
pub use templates::*;

use crate::error::AppError;
use serde::Serialize;

/// Uniform command reply
#[derive(Debug, Clone, Serialize)]
pub struct Response<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: String::new(),
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::ok(data)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }
}

/// Message shown for a failed command. Lookup and validation failures are
/// told as they are; anything else is logged and reported generically.
pub fn user_message(error: &AppError) -> String {
    match error {
        AppError::Validation(_)
        | AppError::TemplateExists { .. }
        | AppError::Taxonomy(_) => error.to_string(),
        e if e.is_not_found() => e.to_string(),
        e => {
            tracing::error!("Command failed: {}", e);
            "Something went wrong".to_string()
        }
    }
}

impl<T> From<crate::error::Result<T>> for Response<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Response::ok(data),
            Err(e) => Response::failed(user_message(&e)),
        }
    }
}
