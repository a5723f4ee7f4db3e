//! Form search criteria to parameterized SQL
//!
//! Only column names and operators are written into the SQL text; every
//! user-supplied value travels as a bound parameter. The same predicate backs
//! the full listing, the paged listing and the count, so a page never holds
//! rows the count does not include.

use crate::conditions::{field, FormFields};
use crate::config::{DATE_RANGE_CEILING, DATE_RANGE_FLOOR};
use serde::{Deserialize, Deserializer, Serialize};

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

/// `%value%` for a substring LIKE
pub fn contains_pattern(value: &str) -> SqlParam {
    SqlParam::Text(format!("%{value}%"))
}

/// A WHERE predicate and the values for its placeholders, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub predicate: String,
    pub params: Vec<SqlParam>,
}

impl FilterQuery {
    /// Build from clauses that are ANDed together; no clauses matches every row.
    pub fn from_clauses(clauses: Vec<String>, params: Vec<SqlParam>) -> Self {
        let predicate = if clauses.is_empty() {
            "1".to_string()
        } else {
            clauses.join(" AND ")
        };
        Self { predicate, params }
    }

    pub fn select_sql(&self) -> String {
        format!(
            "SELECT * FROM entries WHERE {} ORDER BY date DESC, id DESC",
            self.predicate
        )
    }

    /// Paged select; bind [`FilterQuery::page_params`] with it.
    pub fn page_sql(&self) -> String {
        format!("{} LIMIT ? OFFSET ?", self.select_sql())
    }

    pub fn page_params(&self, limit: i64, offset: i64) -> Vec<SqlParam> {
        let mut params = self.params.clone();
        params.push(SqlParam::Integer(limit));
        params.push(SqlParam::Integer(offset));
        params
    }

    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM entries WHERE {}", self.predicate)
    }
}

/// Search form values. Both the capitalised and the lowercase key of every
/// field are accepted; when both are sent the capitalised one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PostedCriteria")]
pub struct FilterCriteria {
    pub author: Option<String>,
    pub hash_id: Option<String>,
    pub text: Option<String>,
    pub tags: Option<String>,
    pub title: Option<String>,
    pub keyword: Option<String>,
    /// Date bounds apply only when this is set
    pub date_bool: bool,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
}

/// Criteria as posted, before the two spellings of each key are merged
#[derive(Debug, Default, Deserialize)]
struct PostedCriteria {
    #[serde(default, rename = "Author")]
    author_form: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, rename = "Hash_ID")]
    hash_id_form: Option<String>,
    #[serde(default)]
    hash_id: Option<String>,
    #[serde(default, rename = "Text")]
    text_form: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "Tags")]
    tags_form: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default, rename = "Title")]
    title_form: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "Keyword")]
    keyword_form: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    date_bool: bool,
    #[serde(default)]
    date_start: Option<String>,
    #[serde(default)]
    date_end: Option<String>,
}

impl From<PostedCriteria> for FilterCriteria {
    fn from(posted: PostedCriteria) -> Self {
        Self {
            author: posted.author_form.or(posted.author),
            hash_id: posted.hash_id_form.or(posted.hash_id),
            text: posted.text_form.or(posted.text),
            tags: posted.tags_form.or(posted.tags),
            title: posted.title_form.or(posted.title),
            keyword: posted.keyword_form.or(posted.keyword),
            date_bool: posted.date_bool,
            date_start: posted.date_start,
            date_end: posted.date_end,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off"
    )
}

pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => is_truthy(&s),
        Some(_) => true,
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl FilterCriteria {
    /// Read criteria from submitted form fields. The capitalised key is
    /// looked up before the lowercase one.
    pub fn from_fields(fields: &FormFields) -> Self {
        let pick = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| field(fields, key))
                .map(str::to_string)
        };

        Self {
            author: pick(&["Author", "author"]),
            hash_id: pick(&["Hash_ID", "hash_id"]),
            text: pick(&["Text", "text"]),
            tags: pick(&["Tags", "tags"]),
            title: pick(&["Title", "title"]),
            keyword: pick(&["Keyword", "keyword"]),
            date_bool: pick(&["date_bool"]).is_some_and(|v| is_truthy(&v)),
            date_start: pick(&["date_start"]),
            date_end: pick(&["date_end"]),
        }
    }

    /// Build the shared predicate.
    ///
    /// A hash id overrides everything else. Otherwise, in order: authors
    /// (comma list, any may match), keyword across name, tags, conditions
    /// and text, title, text, the date range, then one clause per tag.
    pub fn build(&self) -> FilterQuery {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(hash_id) = non_empty(&self.hash_id) {
            clauses.push("id_hash LIKE ?".to_string());
            params.push(contains_pattern(hash_id));
            return FilterQuery::from_clauses(clauses, params);
        }

        if let Some(authors) = non_empty(&self.author) {
            let authors: Vec<&str> = authors
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .collect();
            if !authors.is_empty() {
                let ors = vec!["author LIKE ?"; authors.len()].join(" OR ");
                clauses.push(format!("({ors})"));
                params.extend(authors.into_iter().map(contains_pattern));
            }
        }

        if let Some(keyword) = non_empty(&self.keyword) {
            clauses.push(
                "(entry_name LIKE ? OR tags LIKE ? OR conditions LIKE ? OR extra_txt LIKE ?)"
                    .to_string(),
            );
            params.extend(std::iter::repeat(contains_pattern(keyword)).take(4));
        }

        if let Some(title) = non_empty(&self.title) {
            clauses.push("entry_name LIKE ?".to_string());
            params.push(contains_pattern(title));
        }

        if let Some(text) = non_empty(&self.text) {
            clauses.push("extra_txt LIKE ?".to_string());
            params.push(contains_pattern(text));
        }

        if self.date_bool {
            let start = non_empty(&self.date_start).unwrap_or(DATE_RANGE_FLOOR);
            let end = non_empty(&self.date_end).unwrap_or(DATE_RANGE_CEILING);
            clauses.push("date >= ?".to_string());
            params.push(start.into());
            clauses.push("date <= ?".to_string());
            params.push(end.into());
        }

        if let Some(tags) = non_empty(&self.tags) {
            for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                clauses.push("tags LIKE ?".to_string());
                params.push(contains_pattern(tag));
            }
        }

        FilterQuery::from_clauses(clauses, params)
    }
}
