//! Condition tokens and their stored encodings
//!
//! A stored `conditions` column holds either the legacy flat form
//! (`cat&sub&leaf,cat&param&value`) or the versioned form written by this
//! crate (`v1:b&cat&sub&leaf,p&cat&param&value`). The versioned form tags
//! every token with its kind and escapes `\`, `,` and `&` inside fields, so
//! decoding never has to guess from `&`-arity. Legacy strings stay readable
//! through the arity rule: three parts is a boolean leaf, anything else is
//! treated as a trailing `param&value` pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const V1_HEADER: &str = "v1:";
const ESCAPE: char = '\\';
const TOKEN_SEPARATOR: char = ',';
const FIELD_SEPARATOR: char = '&';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("unknown token kind '{0}'")]
    UnknownKind(String),

    #[error("token '{token}' has {found} fields, expected {expected}")]
    Arity {
        token: String,
        expected: usize,
        found: usize,
    },

    #[error("dangling escape at end of '{0}'")]
    DanglingEscape(String),
}

/// One selected condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionToken {
    /// Checkbox-style leaf; presence means selected
    Boolean {
        category: String,
        subcategory: String,
        leaf: String,
    },
    /// Leaf carrying a user-entered value
    Parametrized {
        category: String,
        param: String,
        value: String,
    },
    /// Legacy token with a single segment
    Unstructured { raw: String },
}

impl ConditionToken {
    pub fn boolean(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        leaf: impl Into<String>,
    ) -> Self {
        Self::Boolean {
            category: category.into(),
            subcategory: subcategory.into(),
            leaf: leaf.into(),
        }
    }

    pub fn parametrized(
        category: impl Into<String>,
        param: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Parametrized {
            category: category.into(),
            param: param.into(),
            value: value.into(),
        }
    }

    /// Interpret a legacy `&`-joined token by its arity.
    pub fn from_legacy(raw: &str) -> Self {
        let parts: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
        match parts.as_slice() {
            [category, subcategory, leaf] => Self::boolean(*category, *subcategory, *leaf),
            [single] => Self::Unstructured {
                raw: (*single).to_string(),
            },
            [scope @ .., param, value] => {
                Self::parametrized(scope.join("&"), *param, *value)
            }
            [] => Self::Unstructured { raw: String::new() },
        }
    }

    /// Legacy `&`-joined rendering, as matched by containment checks and
    /// registered in the conditions side table.
    pub fn legacy(&self) -> String {
        match self {
            Self::Boolean {
                category,
                subcategory,
                leaf,
            } => format!("{category}&{subcategory}&{leaf}"),
            Self::Parametrized {
                category,
                param,
                value,
            } if category.is_empty() => format!("{param}&{value}"),
            Self::Parametrized {
                category,
                param,
                value,
            } => format!("{category}&{param}&{value}"),
            Self::Unstructured { raw } => raw.clone(),
        }
    }

    /// Short label shown next to an entry: the leaf, or `param->value`.
    pub fn display_label(&self) -> String {
        match self {
            Self::Boolean { leaf, .. } => leaf.clone(),
            Self::Parametrized { param, value, .. } => format!("{param}->{value}"),
            Self::Unstructured { raw } => raw.clone(),
        }
    }

    fn encode_v1(&self) -> String {
        let (kind, fields): (&str, Vec<&str>) = match self {
            Self::Boolean {
                category,
                subcategory,
                leaf,
            } => ("b", vec![category, subcategory, leaf]),
            Self::Parametrized {
                category,
                param,
                value,
            } => ("p", vec![category, param, value]),
            Self::Unstructured { raw } => ("u", vec![raw]),
        };

        let mut out = kind.to_string();
        for field in fields {
            out.push(FIELD_SEPARATOR);
            out.push_str(&escape(field));
        }
        out
    }

    fn decode_v1(raw: &str) -> Result<Self, ConditionError> {
        let fields = split_unescaped(raw, FIELD_SEPARATOR)?;
        let (kind, rest) = fields
            .split_first()
            .ok_or_else(|| ConditionError::UnknownKind(String::new()))?;
        let rest: Vec<String> = rest.iter().map(|f| unescape(f)).collect();

        let expected = match *kind {
            "b" | "p" => 3,
            "u" => 1,
            other => return Err(ConditionError::UnknownKind(other.to_string())),
        };
        if rest.len() != expected {
            return Err(ConditionError::Arity {
                token: raw.to_string(),
                expected,
                found: rest.len(),
            });
        }

        let mut rest = rest.into_iter();
        let mut next = || rest.next().unwrap_or_default();
        Ok(match *kind {
            "b" => Self::boolean(next(), next(), next()),
            "p" => Self::parametrized(next(), next(), next()),
            _ => Self::Unstructured { raw: next() },
        })
    }
}

impl fmt::Display for ConditionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.legacy())
    }
}

/// Ordered set of conditions attached to an entry or a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    tokens: Vec<ConditionToken>,
}

impl ConditionSet {
    pub fn new(tokens: Vec<ConditionToken>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[ConditionToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn push(&mut self, token: ConditionToken) {
        self.tokens.push(token);
    }

    /// Decode a stored column value, versioned or legacy.
    pub fn parse(stored: &str) -> Result<Self, ConditionError> {
        let stored = stored.trim();
        let Some(body) = stored.strip_prefix(V1_HEADER) else {
            return Ok(Self::from_legacy(stored));
        };

        if body.is_empty() {
            return Ok(Self::default());
        }

        let tokens = split_unescaped(body, TOKEN_SEPARATOR)?
            .into_iter()
            .filter(|raw| !raw.is_empty())
            .map(ConditionToken::decode_v1)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens })
    }

    /// Like [`ConditionSet::parse`], but a corrupt versioned value is read
    /// with the legacy rule instead of failing.
    pub fn parse_lenient(stored: &str) -> Self {
        Self::parse(stored).unwrap_or_else(|e| {
            tracing::warn!("Reading malformed conditions '{}' as legacy: {}", stored, e);
            Self::from_legacy(stored)
        })
    }

    pub fn from_legacy(conditions_csv: &str) -> Self {
        Self {
            tokens: parse_tokens(conditions_csv)
                .iter()
                .map(|raw| ConditionToken::from_legacy(raw))
                .collect(),
        }
    }

    /// Versioned encoding written to the store. An empty set encodes as "".
    pub fn encode(&self) -> String {
        if self.tokens.is_empty() {
            return String::new();
        }

        let body: Vec<String> = self.tokens.iter().map(ConditionToken::encode_v1).collect();
        format!("{V1_HEADER}{}", body.join(","))
    }

    /// Comma-joined legacy rendering
    pub fn legacy_string(&self) -> String {
        self.tokens
            .iter()
            .map(ConditionToken::legacy)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn display_labels(&self) -> Vec<String> {
        self.tokens.iter().map(ConditionToken::display_label).collect()
    }
}

impl FromIterator<ConditionToken> for ConditionSet {
    fn from_iter<I: IntoIterator<Item = ConditionToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

/// Split a legacy conditions string into trimmed raw tokens.
pub fn parse_tokens(conditions_csv: &str) -> Vec<String> {
    conditions_csv
        .split(TOKEN_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Display labels for raw legacy tokens.
///
/// Exactly three `&` parts shows the last part; any other arity shows the
/// last two parts joined with `->`.
pub fn decode_for_display<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| {
            let parts: Vec<&str> = token.as_ref().split(FIELD_SEPARATOR).collect();
            if parts.len() == 3 {
                parts[2].to_string()
            } else {
                let tail = parts.len().saturating_sub(2);
                parts[tail..].join("->")
            }
        })
        .collect()
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        if matches!(ch, ESCAPE | TOKEN_SEPARATOR | FIELD_SEPARATOR) {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
    out
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch == ESCAPE {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Split on `delimiter` where it is not preceded by an escape. Escape
/// sequences are kept in the returned slices.
fn split_unescaped(input: &str, delimiter: char) -> Result<Vec<&str>, ConditionError> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == ESCAPE {
            escaped = true;
        } else if ch == delimiter {
            parts.push(&input[start..idx]);
            start = idx + ch.len_utf8();
        }
    }

    if escaped {
        return Err(ConditionError::DanglingEscape(input.to_string()));
    }

    parts.push(&input[start..]);
    Ok(parts)
}
