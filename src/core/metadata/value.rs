//! core::metadata::value
//!
//! A single metadata value and its scalar payload.
//!
//! Two values are equal when their scalars are equal (same type, same
//! content) and their languages match. Authority and confidence are carried
//! along but do not take part in equality.

use serde::{Deserialize, Serialize};

/// Confidence recorded when no authority control has been applied.
pub const CONFIDENCE_UNSET: i32 = -1;

/// The scalar payload of a metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaScalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl MetaScalar {
    /// Get the scalar as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaScalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaScalar {
    fn from(s: &str) -> Self {
        MetaScalar::Text(s.to_string())
    }
}

impl From<String> for MetaScalar {
    fn from(s: String) -> Self {
        MetaScalar::Text(s)
    }
}

impl From<bool> for MetaScalar {
    fn from(b: bool) -> Self {
        MetaScalar::Bool(b)
    }
}

impl From<i64> for MetaScalar {
    fn from(n: i64) -> Self {
        MetaScalar::Number(n.into())
    }
}

impl std::fmt::Display for MetaScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaScalar::Bool(b) => write!(f, "{}", b),
            MetaScalar::Number(n) => write!(f, "{}", n),
            MetaScalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One metadata value: a scalar with optional language, authority and
/// confidence.
///
/// # Example
///
/// ```
/// use metasync::core::metadata::MetaValue;
///
/// let en = MetaValue::new("Hello").with_language("en");
/// let fr = MetaValue::new("Hello").with_language("fr");
/// assert_ne!(en, fr);
///
/// // Authority is not part of identity
/// assert_eq!(en.clone().with_authority("ark:/1"), en);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaValue {
    value: MetaScalar,
    #[serde(default, deserialize_with = "de_language")]
    language: Option<String>,
    #[serde(default)]
    authority: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: i32,
}

fn default_confidence() -> i32 {
    CONFIDENCE_UNSET
}

fn de_language<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let language: Option<String> = Option::deserialize(deserializer)?;
    Ok(language.filter(|l| !l.is_empty()))
}

impl MetaValue {
    /// Create a value with no language, no authority and unset confidence.
    pub fn new(value: impl Into<MetaScalar>) -> Self {
        Self {
            value: value.into(),
            language: None,
            authority: None,
            confidence: CONFIDENCE_UNSET,
        }
    }

    /// Set the language. An empty language means none.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.language = (!language.is_empty()).then_some(language);
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }

    pub fn with_confidence(mut self, confidence: i32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn value(&self) -> &MetaScalar {
        &self.value
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn confidence(&self) -> i32 {
        self.confidence
    }

    pub(crate) fn set_value(&mut self, value: MetaScalar) {
        self.value = value;
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.language == other.language
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::new(s)
    }
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.language {
            Some(lang) => write!(f, "{} [{}]", self.value, lang),
            None => write!(f, "{}", self.value),
        }
    }
}
