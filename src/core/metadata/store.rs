//! core::metadata::store
//!
//! In-memory metadata container.
//!
//! # Architecture
//!
//! `MetaStore` maps a validated [`Tag`] to an ordered list of
//! [`MetaValue`]s. The position of a value in its list is the index used
//! by remote patch paths, so every operation here is position-exact.
//! Order across tags is not meaningful; iteration is sorted by tag.
//!
//! The store knows nothing about journaling. The sync engine wraps each
//! call and records what changed.
//!
//! # Example
//!
//! ```
//! use metasync::core::metadata::{MetaStore, MetaValue};
//! use metasync::core::types::Tag;
//!
//! let title = Tag::new("dc.title").unwrap();
//! let mut store = MetaStore::new();
//! store.add(&title, MetaValue::new("Hello").with_language("en"));
//! store.add(&title, MetaValue::new("Bonjour").with_language("fr"));
//!
//! store.move_value(&title, 1, 0).unwrap();
//! assert_eq!(store.first("dc.title").unwrap().language(), Some("fr"));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::{MetaScalar, MetaValue};
use crate::core::types::{Tag, TypeError};

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The tag does not follow `schema.element[.qualifier]`.
    #[error(transparent)]
    Grammar(#[from] TypeError),

    /// Move source index outside the list.
    #[error("cannot move '{tag}': source index {index} out of range for {len} value(s)")]
    SourceOutOfRange { tag: String, index: isize, len: usize },

    /// Move target index outside the list.
    #[error("cannot move '{tag}': target index {index} out of range for {len} value(s)")]
    TargetOutOfRange { tag: String, index: isize, len: usize },

    /// Insert position past the end of the list.
    #[error("cannot insert into '{tag}' at {index}: only {len} value(s)")]
    InsertOutOfRange { tag: String, index: usize, len: usize },

    /// Metadata document could not be parsed.
    #[error("invalid metadata document: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a `remove` call actually removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Nothing matched; the store is unchanged.
    Nothing,
    /// The whole tag was dropped.
    Field,
    /// Matching values were removed one at a time. Each index is relative
    /// to the list as it stood when that value was removed.
    Values(Vec<usize>),
}

impl Removal {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Removal::Nothing)
    }
}

/// Ordered mapping of tag to metadata values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaStore(BTreeMap<Tag, Vec<MetaValue>>);

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. Duplicates are kept.
    pub fn add(&mut self, tag: &Tag, value: MetaValue) {
        self.0.entry(tag.clone()).or_default().push(value);
    }

    /// Append several values in order. An empty iterator leaves the store
    /// unchanged.
    pub fn add_all(&mut self, tag: &Tag, values: impl IntoIterator<Item = MetaValue>) {
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return;
        }
        self.0.entry(tag.clone()).or_default().extend(values);
    }

    /// Insert a value at `position`, shifting later values right.
    pub fn insert(
        &mut self,
        tag: &Tag,
        position: usize,
        value: MetaValue,
    ) -> Result<(), MetadataError> {
        let len = self.get(tag.as_str()).len();
        if position > len {
            return Err(MetadataError::InsertOutOfRange {
                tag: tag.to_string(),
                index: position,
                len,
            });
        }
        self.0.entry(tag.clone()).or_default().insert(position, value);
        Ok(())
    }

    /// Remove a whole tag (`value == None`) or every value whose scalar
    /// equals `value`.
    ///
    /// A tag left with no values is dropped.
    pub fn remove(&mut self, tag: &Tag, value: Option<&MetaScalar>) -> Removal {
        let Some(value) = value else {
            return match self.0.remove(tag.as_str()) {
                Some(_) => Removal::Field,
                None => Removal::Nothing,
            };
        };

        let Some(list) = self.0.get_mut(tag.as_str()) else {
            return Removal::Nothing;
        };

        let mut removed = Vec::new();
        while let Some(index) = list.iter().position(|v| v.value() == value) {
            list.remove(index);
            removed.push(index);
        }

        if list.is_empty() {
            self.0.remove(tag.as_str());
        }

        if removed.is_empty() {
            Removal::Nothing
        } else {
            Removal::Values(removed)
        }
    }

    /// Drop every value of `tag` and store `value` as its only value.
    ///
    /// Returns whether the tag existed before.
    pub fn replace(&mut self, tag: &Tag, value: MetaValue) -> bool {
        self.0.insert(tag.clone(), vec![value]).is_some()
    }

    /// Move the value at `from` to `to`.
    ///
    /// Negative indices count from the end. Both indices are checked against
    /// the length before the move. The value is removed first, then
    /// inserted at `to` in the shortened list, with a negative `to` clamped
    /// to the front.
    pub fn move_value(&mut self, tag: &Tag, from: isize, to: isize) -> Result<(), MetadataError> {
        let n = self.get(tag.as_str()).len();
        let len = n as isize;

        let source = if from < 0 { from + len } else { from };
        if n == 0 || source < 0 || source >= len {
            return Err(MetadataError::SourceOutOfRange {
                tag: tag.to_string(),
                index: from,
                len: n,
            });
        }
        if to >= len || to <= -len {
            return Err(MetadataError::TargetOutOfRange {
                tag: tag.to_string(),
                index: to,
                len: n,
            });
        }

        let Some(list) = self.0.get_mut(tag.as_str()) else {
            return Err(MetadataError::SourceOutOfRange {
                tag: tag.to_string(),
                index: from,
                len: 0,
            });
        };

        let value = list.remove(source as usize);
        let target = if to >= 0 {
            to as usize
        } else {
            (to + list.len() as isize).max(0) as usize
        };
        list.insert(target, value);
        Ok(())
    }

    /// Replace the whole list of `tag`. An empty list removes the tag.
    ///
    /// Returns the previous list, if any.
    pub fn set(&mut self, tag: &Tag, values: Vec<MetaValue>) -> Option<Vec<MetaValue>> {
        if values.is_empty() {
            self.0.remove(tag.as_str())
        } else {
            self.0.insert(tag.clone(), values)
        }
    }

    /// The values of `tag` in order, empty if absent.
    pub fn get(&self, tag: &str) -> &[MetaValue] {
        self.0.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first(&self, tag: &str) -> Option<&MetaValue> {
        self.get(tag).first()
    }

    /// The scalars of `tag` in order.
    pub fn values(&self, tag: &str) -> Vec<&MetaScalar> {
        self.get(tag).iter().map(MetaValue::value).collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &[MetaValue])> {
        self.0.iter().map(|(tag, values)| (tag, values.as_slice()))
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn get_mut(&mut self, tag: &str) -> Option<&mut Vec<MetaValue>> {
        self.0.get_mut(tag)
    }

    /// Render in the REST form `{tag: [{value, language, authority, confidence}]}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Parse the REST form. Every key must be a valid tag.
    pub fn from_json(doc: &serde_json::Value) -> Result<Self, MetadataError> {
        let store: MetaStore = serde_json::from_value(doc.clone())?;
        Ok(store.without_empty())
    }

    fn without_empty(mut self) -> Self {
        self.0.retain(|_, values| !values.is_empty());
        self
    }
}

impl<'a> IntoIterator for &'a MetaStore {
    type Item = (&'a Tag, &'a Vec<MetaValue>);
    type IntoIter = std::collections::btree_map::Iter<'a, Tag, Vec<MetaValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
