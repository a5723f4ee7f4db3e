//! Remote language-model extraction
//!
//! Sends the query and today's date to a messages-style completion endpoint
//! and reads the reply either as a JSON object or as `<field>value</field>`
//! tags. When the first reply cannot be read, one stricter follow-up request
//! is made before giving up.

use super::dates::{format_date, today};
use super::extractor::{ExtractError, ExtractResult, SearchParamExtractor};
use super::filter::deserialize_flag;
use super::params::SearchParams;
use super::usage::usage_help;
use crate::config::{
    DEFAULT_LLM_API_URL, DEFAULT_LLM_MAX_TOKENS, DEFAULT_LLM_MODEL, DEFAULT_LLM_TEMPERATURE,
    DEFAULT_LLM_TIMEOUT_SECS, LLM_API_VERSION,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_EXPLANATION: &str = "I processed your request based on keywords.";

/// Longest reply excerpt kept in a parse error
const REPLY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    /// No key means the extractor reports itself unavailable
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LLM_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            max_tokens: DEFAULT_LLM_MAX_TOKENS,
            temperature: DEFAULT_LLM_TEMPERATURE,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Reply fields; `keywords` is accepted as a list or a comma string.
#[derive(Debug, Default, Deserialize)]
struct ReplyFields {
    #[serde(default, deserialize_with = "deserialize_flag")]
    is_usage_question: bool,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    keywords: Option<Keywords>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    date_start: Option<String>,
    #[serde(default)]
    date_end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Keywords {
    List(Vec<String>),
    Joined(String),
}

impl Keywords {
    fn is_blank(&self) -> bool {
        match self {
            Keywords::List(list) => list.iter().all(|k| k.trim().is_empty()),
            Keywords::Joined(s) => s.trim().is_empty(),
        }
    }

    fn joined(self) -> String {
        match self {
            Keywords::List(list) => list.join(", "),
            Keywords::Joined(s) => s,
        }
    }
}

impl ReplyFields {
    /// A usage answer, or a search naming at least one field
    fn is_usable(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|v| !v.trim().is_empty());

        self.is_usage_question
            || self.keywords.as_ref().is_some_and(|k| !k.is_blank())
            || [
                &self.text,
                &self.title,
                &self.author,
                &self.tags,
                &self.date_start,
                &self.date_end,
            ]
            .into_iter()
            .any(filled)
    }

    fn into_params(self, query: &str, today: NaiveDate) -> SearchParams {
        if self.is_usage_question {
            let explanation = self
                .explanation
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| usage_help(query).to_string());
            return SearchParams::usage_answer(explanation);
        }

        SearchParams {
            text: self.text.or_else(|| self.keywords.map(Keywords::joined)),
            title: self.title,
            author: self.author,
            tags: self.tags,
            date_start: self.date_start,
            date_end: self.date_end,
            explanation: self
                .explanation
                .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
            ..SearchParams::default()
        }
        .normalized()
        .with_resolved_dates(today)
    }
}

fn json_object_re() -> &'static Regex {
    static JSON_OBJECT_RE: OnceLock<Regex> = OnceLock::new();
    JSON_OBJECT_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"))
}

fn tag_value(reply: &str, tag: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?is)<{tag}>(.*?)</{tag}>")).ok()?;
    re.captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Read a completion reply, JSON first and tags second. A reply that is
/// neither a usage answer nor names any search field is unreadable.
fn parse_reply(reply: &str) -> Option<ReplyFields> {
    if let Some(object) = json_object_re().find(reply) {
        match serde_json::from_str::<ReplyFields>(object.as_str()) {
            Ok(fields) if fields.is_usable() => return Some(fields),
            Ok(_) => tracing::debug!("Reply object names no search fields"),
            Err(e) => tracing::debug!("Reply object is not usable JSON: {}", e),
        }
    }

    let fields = ReplyFields {
        is_usage_question: tag_value(reply, "is_usage_question")
            .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        explanation: tag_value(reply, "explanation"),
        keywords: tag_value(reply, "keywords").map(Keywords::Joined),
        text: tag_value(reply, "text"),
        title: tag_value(reply, "title"),
        author: tag_value(reply, "author"),
        tags: tag_value(reply, "tags"),
        date_start: tag_value(reply, "date_start"),
        date_end: tag_value(reply, "date_end"),
    };

    fields.is_usable().then_some(fields)
}

fn search_prompt(query: &str, today: NaiveDate) -> String {
    format!(
        r#"You help people use a laboratory notebook application and find entries in it.
Only answer questions about using the application or searching entries. Politely decline anything else.
Never introduce yourself and never discuss source code.

Decide whether the message below asks how to use the application or asks for entries.

Reply with a single JSON object and nothing else:
{{
  "is_usage_question": true or false,
  "explanation": "for usage questions, a short helpful answer; for searches, how you read the request",
  "keywords": ["important search terms, without dates and without the word entry"],
  "title": "entry title words, if named",
  "author": "author name, if named",
  "tags": "comma separated tags, if named",
  "date_start": "YYYY-MM-DD, or a phrase such as '2 weeks ago', only if a time is mentioned",
  "date_end": "YYYY-MM-DD, only if a time is mentioned"
}}
Leave out fields that do not apply.

Message: "{query}"
Today's date: {today}"#,
        today = format_date(today),
    )
}

fn follow_up_prompt(query: &str, today: NaiveDate) -> String {
    format!(
        r#"Analyse this message and answer ONLY with the tags below.

Message: "{query}"
Today's date: {today}

If it is a question about using the software or unrelated to finding entries:
<is_usage_question>true</is_usage_question>
<explanation>your answer</explanation>

If it asks for entries:
<is_usage_question>false</is_usage_question>
<keywords>comma separated keywords</keywords>
<date_start>YYYY-MM-DD</date_start> (only if a start date applies)
<date_end>YYYY-MM-DD</date_end> (only if an end date applies)
<explanation>how you read the request</explanation>"#,
        today = format_date(today),
    )
}

fn excerpt(reply: &str) -> String {
    reply.chars().take(REPLY_EXCERPT_LEN).collect()
}

/// Completion-service extractor
#[derive(Clone)]
pub struct LlmExtractor {
    client: Client,
    config: LlmConfig,
}

impl LlmExtractor {
    pub fn new(config: LlmConfig) -> ExtractResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> ExtractResult<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!("Sending completion request to {}", self.config.api_url);

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", LLM_API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status { status, body });
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(format!("Failed to read response: {}", e)))?;

        let text: String = result
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(ExtractError::Parse("Reply has no text content".to_string()));
        }

        Ok(text)
    }

    /// Extract against an explicit current date.
    pub async fn extract_at(&self, query: &str, today: NaiveDate) -> ExtractResult<SearchParams> {
        let api_key = self
            .api_key()
            .ok_or_else(|| ExtractError::Unavailable("no API key configured".to_string()))?;

        let reply = self.complete(api_key, &search_prompt(query, today)).await?;
        if let Some(fields) = parse_reply(&reply) {
            return Ok(fields.into_params(query, today));
        }

        tracing::warn!("Could not read completion reply, sending follow-up request");

        let reply = self.complete(api_key, &follow_up_prompt(query, today)).await?;
        parse_reply(&reply)
            .map(|fields| fields.into_params(query, today))
            .ok_or_else(|| ExtractError::Parse(excerpt(&reply)))
    }
}

#[async_trait]
impl SearchParamExtractor for LlmExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(&self, query: &str) -> ExtractResult<SearchParams> {
        self.extract_at(query, today()).await
    }
}
