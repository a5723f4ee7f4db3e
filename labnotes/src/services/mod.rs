//! Services module
//!
//! Business logic services that coordinate between commands and repository.

pub mod entries;
pub mod search;
pub mod settings;
pub mod templates;

pub use entries::EntriesService;
pub use search::{NlSearchOutcome, SearchService};
pub use settings::SettingsService;
pub use templates::{MergedTemplate, TemplateStore};
