//! ── Keyword Value ──────────────────────────────────────────────────────────

use std::fmt;

/// A value carried by one keyword read/write on the bus. Kept as a small
/// closed union rather than `serde_json::Value` so gateway callers pattern
/// match instead of re-parsing JSON at every call site.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum KeywordValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl KeywordValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeywordValue::Float(v) => Some(*v),
            KeywordValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeywordValue::Int(v) => Some(*v),
            KeywordValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KeywordValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeywordValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for KeywordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeywordValue::Float(v) => write!(f, "{v}"),
            KeywordValue::Int(v) => write!(f, "{v}"),
            KeywordValue::Bool(v) => write!(f, "{v}"),
            KeywordValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for KeywordValue {
    fn from(v: f64) -> Self {
        KeywordValue::Float(v)
    }
}

impl From<i64> for KeywordValue {
    fn from(v: i64) -> Self {
        KeywordValue::Int(v)
    }
}

impl From<bool> for KeywordValue {
    fn from(v: bool) -> Self {
        KeywordValue::Bool(v)
    }
}

impl From<String> for KeywordValue {
    fn from(v: String) -> Self {
        KeywordValue::Text(v)
    }
}

impl From<&str> for KeywordValue {
    fn from(v: &str) -> Self {
        KeywordValue::Text(v.to_string())
    }
}
