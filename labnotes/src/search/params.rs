//! Search parameters shared by every extractor and the executor

use super::dates::resolve_relative_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Structured form of a free-text search request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    #[serde(default)]
    pub is_usage_question: bool,
    #[serde(default)]
    pub explanation: String,
}

impl SearchParams {
    pub fn explained(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            ..Self::default()
        }
    }

    /// A reply to a question about using the application
    pub fn usage_answer(explanation: impl Into<String>) -> Self {
        Self {
            is_usage_question: true,
            explanation: explanation.into(),
            ..Self::default()
        }
    }

    /// Whether a title, author or tags value was recognised
    pub fn has_field_match(&self) -> bool {
        self.title.is_some() || self.author.is_some() || self.tags.is_some()
    }

    /// Whether nothing narrows the search
    pub fn is_unconstrained(&self) -> bool {
        [
            &self.author,
            &self.hash_id,
            &self.title,
            &self.text,
            &self.tags,
            &self.keyword,
            &self.date_start,
            &self.date_end,
        ]
        .iter()
        .all(|field| field.is_none())
    }

    /// Blank values become absent and surrounding whitespace is dropped.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.author,
            &mut self.hash_id,
            &mut self.title,
            &mut self.text,
            &mut self.tags,
            &mut self.keyword,
            &mut self.date_start,
            &mut self.date_end,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self
    }

    /// Rewrite relative date phrases in both date fields as ISO dates.
    pub fn with_resolved_dates(mut self, today: NaiveDate) -> Self {
        for field in [&mut self.date_start, &mut self.date_end] {
            if let Some(value) = field.take() {
                *field = Some(resolve_relative_date(&value, today));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_blank_fields() {
        let params = SearchParams {
            author: Some("  ".to_string()),
            text: Some(" protein ".to_string()),
            ..SearchParams::default()
        }
        .normalized();

        assert_eq!(params.author, None);
        assert_eq!(params.text.as_deref(), Some("protein"));
        assert!(!params.is_unconstrained());
    }

    #[test]
    fn test_serialized_shape_skips_absent_fields() {
        let params = SearchParams::usage_answer("Use the search page");
        let json = serde_json::to_value(&params).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"is_usage_question": true, "explanation": "Use the search page"})
        );
    }

    #[test]
    fn test_with_resolved_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let params = SearchParams {
            date_start: Some("2 weeks ago".to_string()),
            date_end: Some("today".to_string()),
            ..SearchParams::default()
        }
        .with_resolved_dates(today);

        assert_eq!(params.date_start.as_deref(), Some("2024-06-01"));
        assert_eq!(params.date_end.as_deref(), Some("2024-06-15"));
    }
}
