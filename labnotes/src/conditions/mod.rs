//! Experiment conditions
//!
//! Encoding of selected conditions for storage, their recovery from form
//! submissions, and merging against a method's taxonomy for display.

pub mod catalog;
pub mod form;
pub mod taxonomy;
pub mod token;

pub use catalog::TaxonomyCatalog;
pub use form::{entry_conditions, field, FormFields, TemplateFormBatch};
pub use taxonomy::{merge, AnnotatedLeaf, AnnotatedTaxonomy, Taxonomy};
pub use token::{decode_for_display, parse_tokens, ConditionError, ConditionSet, ConditionToken};
