//! Application configuration constants
//!
//! Central location for identifiers, limits and defaults used by the
//! search engine, the condition codec and the remote extractor.

// ===== Entry Identity =====

/// Length of the external hash id assigned to every entry
pub const HASH_ID_LENGTH: usize = 10;

/// Characters a hash id is drawn from (uppercase base-36)
pub const HASH_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Upper bound on hash id allocation attempts.
/// With a 36^10 keyspace a second attempt is already rare.
pub const MAX_HASH_ID_ATTEMPTS: usize = 32;

// ===== Search Limits =====

/// Page size used by realtime search when the caller gives none
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page a caller may request
pub const MAX_PAGE_LIMIT: i64 = 200;

/// Lower bound of the unconstrained date range
pub const DATE_RANGE_FLOOR: &str = "0001-01-01";

/// Upper bound of the unconstrained date range
pub const DATE_RANGE_CEILING: &str = "9999-12-31";

/// Free-text search terms shorter than this are ignored
pub const MIN_SEARCH_TERM_LEN: usize = 3;

/// Number of suggestions returned by autocomplete lookups
pub const SUGGESTION_LIMIT: i64 = 10;

/// Characters of context kept on each side of a text excerpt
pub const EXCERPT_RADIUS: usize = 20;

/// Entries shown on an author's timeline
pub const TIMELINE_LENGTH: i64 = 12;

// ===== Condition Templates =====

/// Template created for every user at provisioning time.
/// Posting conditions under this name saves a new template.
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

// ===== Remote Extractor =====

/// Default completion endpoint
pub const DEFAULT_LLM_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default completion model
pub const DEFAULT_LLM_MODEL: &str = "claude-3-haiku-20240307";

/// Protocol version header sent with every completion request
pub const LLM_API_VERSION: &str = "2023-06-01";

/// Request timeout in seconds; a timeout hands control to the fallback
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 10;

/// Token budget for a single completion
pub const DEFAULT_LLM_MAX_TOKENS: u32 = 500;

/// Sampling temperature; extraction wants near-deterministic output
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.1;

/// Environment variable holding the completion API key
pub const DEFAULT_LLM_API_KEY_ENV: &str = "LABNOTES_LLM_API_KEY";
