//! Entry search
//!
//! Two paths lead to the same table: form criteria compile to a
//! [`FilterQuery`] directly, while free text is first turned into
//! [`SearchParams`] by an [`ExtractorChain`] and then run by the
//! [`SearchExecutor`].

pub mod dates;
pub mod executor;
pub mod extractor;
pub mod filter;
pub mod keyword;
pub mod llm;
pub mod params;
pub mod usage;

pub use dates::resolve_relative_date;
pub use executor::{nl_query, SearchExecutor};
pub use extractor::{ExtractError, ExtractResult, ExtractorChain, SearchParamExtractor};
pub use filter::{contains_pattern, FilterCriteria, FilterQuery, SqlParam};
pub use keyword::KeywordExtractor;
pub use llm::{LlmConfig, LlmExtractor};
pub use params::SearchParams;
