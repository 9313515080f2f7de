//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Tag`] - Validated metadata field name (`schema.element[.qualifier]`)
//! - [`ObjectId`] - Persisted identifier of a remote object (UUID)
//! - [`ObjectKind`] - The kind of remote object, mapped to its REST collection
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. A malformed tag can
//! never reach a metadata store or a patch path.
//!
//! # Examples
//!
//! ```
//! use metasync::core::types::{ObjectKind, Tag};
//!
//! let tag = Tag::new("dc.title.alternative").unwrap();
//! assert_eq!(tag.schema(), "dc");
//! assert_eq!(tag.qualifier(), Some("alternative"));
//!
//! assert!(Tag::new("dc").is_err());
//! assert!(Tag::new("dc.ti tle").is_err());
//! assert_eq!(ObjectKind::Community.collection(), "communities");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid metadata tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("unknown object kind: {0}")]
    UnknownKind(String),
}

/// A validated metadata tag.
///
/// Tags have the form `schema.element` or `schema.element.qualifier`, where
/// every part is a non-empty run of ASCII letters, digits or `-`.
///
/// # Example
///
/// ```
/// use metasync::core::types::Tag;
///
/// let tag = Tag::new("dc.contributor.author").unwrap();
/// assert_eq!(tag.as_str(), "dc.contributor.author");
/// assert_eq!(tag.element(), "contributor");
///
/// assert!(Tag::new("").is_err());
/// assert!(Tag::new("dc..title").is_err());
/// assert!(Tag::new("a.b.c.d").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Create a new validated tag.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTag` if the tag does not match
    /// `schema.element[.qualifier]`.
    pub fn new(tag: impl Into<String>) -> Result<Self, TypeError> {
        let tag = tag.into();
        Self::validate(&tag)?;
        Ok(Self(tag))
    }

    fn validate(tag: &str) -> Result<(), TypeError> {
        let invalid = |reason: &str| TypeError::InvalidTag {
            tag: tag.to_string(),
            reason: reason.to_string(),
        };

        if tag.is_empty() {
            return Err(invalid("tag cannot be empty"));
        }

        let parts: Vec<&str> = tag.split('.').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(invalid("expected schema.element[.qualifier]"));
        }

        for part in parts {
            if part.is_empty() {
                return Err(invalid("tag parts cannot be empty"));
            }
            if let Some(c) = part
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
            {
                return Err(invalid(&format!("tag cannot contain '{c}'")));
            }
        }

        Ok(())
    }

    /// Get the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The schema part, e.g. `dc`.
    pub fn schema(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// The element part, e.g. `title`.
    pub fn element(&self) -> &str {
        self.0.split('.').nth(1).unwrap_or_default()
    }

    /// The qualifier part, if present.
    pub fn qualifier(&self) -> Option<&str> {
        self.0.split('.').nth(2)
    }
}

impl TryFrom<String> for Tag {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Tag {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an object persisted on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Parse an identifier from its hyphenated UUID form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypeError::InvalidObjectId(s.to_string()))
    }

    /// Generate a random identifier. Mostly useful for tests and fixtures.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// The kind of a remote object carrying metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Item,
    Collection,
    Community,
    Bundle,
    Bitstream,
}

impl ObjectKind {
    /// The REST collection segment for this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            ObjectKind::Item => "items",
            ObjectKind::Collection => "collections",
            ObjectKind::Community => "communities",
            ObjectKind::Bundle => "bundles",
            ObjectKind::Bitstream => "bitstreams",
        }
    }

    /// Parse the `type` field of a REST document.
    pub fn from_type_name(name: &str) -> Result<Self, TypeError> {
        match name.to_ascii_lowercase().as_str() {
            "item" => Ok(ObjectKind::Item),
            "collection" => Ok(ObjectKind::Collection),
            "community" => Ok(ObjectKind::Community),
            "bundle" => Ok(ObjectKind::Bundle),
            "bitstream" => Ok(ObjectKind::Bitstream),
            _ => Err(TypeError::UnknownKind(name.to_string())),
        }
    }

    /// Path of an object of this kind, relative to the API root.
    pub fn object_path(&self, id: &ObjectId) -> String {
        format!("core/{}/{}", self.collection(), id)
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ObjectKind::Item => "item",
            ObjectKind::Collection => "collection",
            ObjectKind::Community => "community",
            ObjectKind::Bundle => "bundle",
            ObjectKind::Bitstream => "bitstream",
        };
        write!(f, "{}", name)
    }
}

/// A UTC timestamp, serialized as RFC3339.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod tag {
        use super::*;

        #[test]
        fn two_part_tag() {
            let tag = Tag::new("dc.title").unwrap();
            assert_eq!(tag.schema(), "dc");
            assert_eq!(tag.element(), "title");
            assert_eq!(tag.qualifier(), None);
        }

        #[test]
        fn three_part_tag() {
            let tag = Tag::new("dc.date.issued").unwrap();
            assert_eq!(tag.qualifier(), Some("issued"));
        }

        #[test]
        fn hyphens_and_digits_allowed() {
            assert!(Tag::new("local-2.field-a.q1").is_ok());
        }

        #[test]
        fn rejects_single_part() {
            assert!(matches!(
                Tag::new("title"),
                Err(TypeError::InvalidTag { .. })
            ));
        }

        #[test]
        fn rejects_four_parts() {
            assert!(Tag::new("a.b.c.d").is_err());
        }

        #[test]
        fn rejects_empty_parts() {
            assert!(Tag::new(".title").is_err());
            assert!(Tag::new("dc.").is_err());
            assert!(Tag::new("dc..x").is_err());
        }

        #[test]
        fn rejects_invalid_chars() {
            assert!(Tag::new("dc.ti tle").is_err());
            assert!(Tag::new("dc.title_x").is_err());
            assert!(Tag::new("dc/title").is_err());
            assert!(Tag::new("dc.tïtle").is_err());
        }

        #[test]
        fn error_names_the_tag() {
            let err = Tag::new("bad tag").unwrap_err();
            assert!(err.to_string().contains("bad tag"));
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<Tag, _> = serde_json::from_str("\"nope\"");
            assert!(result.is_err());
            let tag: Tag = serde_json::from_str("\"dc.title\"").unwrap();
            assert_eq!(tag.as_str(), "dc.title");
        }
    }

    mod object_kind {
        use super::*;

        #[test]
        fn collections() {
            assert_eq!(ObjectKind::Item.collection(), "items");
            assert_eq!(ObjectKind::Collection.collection(), "collections");
            assert_eq!(ObjectKind::Community.collection(), "communities");
            assert_eq!(ObjectKind::Bundle.collection(), "bundles");
            assert_eq!(ObjectKind::Bitstream.collection(), "bitstreams");
        }

        #[test]
        fn from_type_name_is_case_insensitive() {
            assert_eq!(ObjectKind::from_type_name("Item").unwrap(), ObjectKind::Item);
            assert!(ObjectKind::from_type_name("eperson").is_err());
        }

        #[test]
        fn object_path() {
            let id = ObjectId::parse("0a1b2c3d-0000-4000-8000-000000000001").unwrap();
            assert_eq!(
                ObjectKind::Item.object_path(&id),
                "core/items/0a1b2c3d-0000-4000-8000-000000000001"
            );
        }
    }

    #[test]
    fn object_id_rejects_garbage() {
        assert!(matches!(
            ObjectId::parse("not-a-uuid"),
            Err(TypeError::InvalidObjectId(_))
        ));
    }
}
