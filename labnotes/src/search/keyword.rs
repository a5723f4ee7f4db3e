//! Rule-based query interpretation
//!
//! The last link of every extractor chain. It needs no network and always
//! produces an answer: a usage reply, or whatever title, author, tag, text
//! and date hints its patterns recognise.

use super::dates::{days_before, format_date, today};
use super::extractor::{ExtractResult, SearchParamExtractor};
use super::params::SearchParams;
use super::usage::{is_usage_question, usage_help};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

const KEYWORD_EXPLANATION: &str = "I'm searching based on keywords I extracted from your query.";

/// Words that end a captured value
const BOUNDARY_WORDS: &str = "about|by|from|since|before|after|between|during|last|this|\
    yesterday|today|with|tagged|titled|called|named|regarding|containing|mentioning";

/// Words never used as free-text search terms
const STOP_WORDS: &[&str] = &[
    "find", "search", "show", "me", "entries", "entry", "with", "about", "that", "have",
    "containing", "get", "list", "display", "i", "want", "need", "looking", "for", "related",
    "to", "the", "all", "from", "since", "before", "after", "between", "during", "last", "this",
    "week", "weeks", "month", "months", "days", "today", "yesterday",
];

const MAX_TEXT_TERMS: usize = 3;
const MIN_TEXT_TERM_LEN: usize = 4;

struct FieldPatterns {
    title: Vec<Regex>,
    author: Vec<Regex>,
    tags: Vec<Regex>,
    text: Vec<Regex>,
    last_n: Regex,
    iso_date: Regex,
}

/// `lead` followed by a value that runs until a boundary word, punctuation
/// or the end of the query. Tag lists keep their commas.
fn field_pattern(lead: &str, allow_commas: bool) -> Regex {
    let punctuation = if allow_commas { "[.;!?]" } else { "[.,;!?]" };
    let pattern = format!(
        r#"{lead}["']?([^"']+?)["']?(?:\s+(?:{BOUNDARY_WORDS})\b|{punctuation}|$)"#
    );
    Regex::new(&pattern).expect("valid field pattern")
}

fn patterns() -> &'static FieldPatterns {
    static PATTERNS: OnceLock<FieldPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| FieldPatterns {
        title: [
            r"\btitle\s+(?:contains?|has|with|like)\s+",
            r"\bname\s+(?:contains?|has|with|like)\s+",
            r"\b(?:called|named|titled)\s+",
            r"\btitle\s*:\s*",
            r"\bwith\s+(?:the\s+)?title\s+",
        ]
        .iter()
        .map(|lead| field_pattern(lead, false))
        .collect(),
        author: [
            r"\bby\s+(?:author\s+)?",
            r"\bauthor\s*:\s*",
            r"\bauthor\s+(?:is|named|called)\s+",
            r"\bwritten\s+by\s+",
        ]
        .iter()
        .map(|lead| field_pattern(lead, false))
        .collect(),
        tags: [
            r"\btagged\s+(?:with|as)\s+",
            r"\bwith\s+tags?\s+",
            r"\btags?\s*:\s*",
            r"\btag(?:s|ged)?\s+",
        ]
        .iter()
        .map(|lead| field_pattern(lead, true))
        .collect(),
        text: [r"\b(?:about|regarding|related\s+to|containing|mentioning)\s+"]
            .iter()
            .map(|lead| field_pattern(lead, false))
            .collect(),
        last_n: Regex::new(r"\blast\s+(\d+)\s+(day|week|month)s?\b").expect("valid range pattern"),
        iso_date: Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date pattern"),
    })
}

/// First value captured by any of `patterns`, tried in order
fn first_capture(query: &str, patterns: &[Regex], skip: impl Fn(&str, usize) -> bool) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures_iter(query).find_map(|caps| {
            let whole = caps.get(0)?;
            if skip(query, whole.start()) {
                return None;
            }
            let value = caps.get(1)?.as_str().trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    })
}

fn never(_: &str, _: usize) -> bool {
    false
}

/// "author named x" names an author, not a title
fn follows_author(query: &str, start: usize) -> bool {
    query[..start].trim_end().ends_with("author")
}

/// Up to three words after a bare "title"
fn words_after_title(query: &str) -> Option<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let idx = words.iter().position(|w| *w == "title")?;
    let following = &words[idx + 1..words.len().min(idx + 4)];
    (!following.is_empty()).then(|| following.join(" "))
}

/// Free-text terms left after dropping stop words, numbers and dates
fn remaining_terms(query: &str) -> Option<String> {
    let terms: Vec<&str> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_'))
        .filter(|w| w.chars().count() >= MIN_TEXT_TERM_LEN)
        .filter(|w| !STOP_WORDS.contains(w))
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit() || c == '-'))
        .take(MAX_TEXT_TERMS)
        .collect();

    (!terms.is_empty()).then(|| terms.join(" "))
}

/// Date bounds named in the query: a numeric "last N units" range, then a
/// fixed phrase, then literal ISO dates.
fn date_bounds(query: &str, today: NaiveDate) -> (Option<String>, Option<String>) {
    let p = patterns();
    let range_to_today = |days: u64| (days_before(today, days).map(format_date), Some(format_date(today)));

    if let Some(caps) = p.last_n.captures(query) {
        let count = caps[1].parse::<u64>().unwrap_or(1);
        let unit = match &caps[2] {
            "week" => 7,
            "month" => 30,
            _ => 1,
        };
        return range_to_today(count.saturating_mul(unit));
    }

    if query.contains("last week") {
        return range_to_today(7);
    }
    if query.contains("last month") {
        return range_to_today(30);
    }
    if query.contains("this week") {
        return range_to_today(u64::from(today.weekday().num_days_from_monday()));
    }
    if query.contains("this month") {
        return range_to_today(u64::from(today.day0()));
    }
    if query.contains("yesterday") {
        let yesterday = days_before(today, 1).map(format_date);
        return (yesterday.clone(), yesterday);
    }
    if query.contains("today") {
        return (Some(format_date(today)), Some(format_date(today)));
    }

    let dates: Vec<&str> = p.iso_date.find_iter(query).map(|m| m.as_str()).collect();
    match dates.as_slice() {
        [] => (None, None),
        [start, end, ..] => (Some(start.to_string()), Some(end.to_string())),
        [only] if query.contains("before") => (None, Some(only.to_string())),
        [only] if query.contains("after") || query.contains("since") => {
            (Some(only.to_string()), None)
        }
        [only] => (Some(only.to_string()), Some(only.to_string())),
    }
}

/// Keyword and pattern based extractor
#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Interpret `query` with relative dates taken from `today`.
    pub fn extract_at(&self, query: &str, today: NaiveDate) -> SearchParams {
        if is_usage_question(query) {
            return SearchParams::usage_answer(usage_help(query));
        }

        let query = query.to_lowercase();
        let p = patterns();
        let mut params = SearchParams::explained(KEYWORD_EXPLANATION);

        params.title =
            first_capture(&query, &p.title, follows_author).or_else(|| words_after_title(&query));
        params.author = first_capture(&query, &p.author, never);
        params.tags = first_capture(&query, &p.tags, never);
        params.text = first_capture(&query, &p.text, never);

        let (date_start, date_end) = date_bounds(&query, today);
        params.date_start = date_start;
        params.date_end = date_end;

        if !params.has_field_match() && params.text.is_none() {
            params.text = remaining_terms(&query);
        }

        tracing::debug!("Keyword extraction for '{}': {:?}", query, params);
        params
    }
}

#[async_trait]
impl SearchParamExtractor for KeywordExtractor {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn extract(&self, query: &str) -> ExtractResult<SearchParams> {
        Ok(self.extract_at(query, today()))
    }
}
