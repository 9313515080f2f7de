//! rest::patch
//!
//! Translation of journal entries into JSON-Patch descriptors.
//!
//! # Wire format
//!
//! ```text
//! {op: "add",     path: "/metadata/<tag>/-",     value: {value, language?}}
//! {op: "add",     path: "/metadata/<tag>/<i>",   value: {value, language?}}
//! {op: "remove",  path: "/metadata/<tag>[/<i>]"}
//! {op: "replace", path: "/metadata/<tag>[/<i>]", value: {..} | [{..}, ..]}
//! {op: "move",    from: "/metadata/<tag>/<i>",   path: "/metadata/<tag>/<j>"}
//! ```
//!
//! Only `move` carries `from`. Descriptor order within one entry is the
//! order in which the server must apply them.
//!
//! # Example
//!
//! ```
//! use metasync::core::metadata::MetaValue;
//! use metasync::core::ops::{OpKind, Operation};
//! use metasync::core::types::Tag;
//! use metasync::rest::patch::PatchTranslator;
//!
//! let op = Operation::new(
//!     Tag::new("dc.title").unwrap(),
//!     OpKind::add(MetaValue::new("Hello").with_language("en")),
//! );
//! let patch = PatchTranslator::translate(&op).unwrap();
//!
//! let json = serde_json::to_value(&patch).unwrap();
//! assert_eq!(
//!     json,
//!     serde_json::json!([{
//!         "op": "add",
//!         "path": "/metadata/dc.title/-",
//!         "value": {"value": "Hello", "language": "en"}
//!     }])
//! );
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::metadata::{MetaScalar, MetaValue};
use crate::core::ops::{DeleteTarget, OpKind, Operation, Position};
use crate::core::types::Tag;

/// Errors from patch translation.
///
/// Each variant is a caller mistake that the wire format cannot express.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatchError {
    /// One explicit position was applied to several tags.
    #[error("cannot apply position {position} to {count} tags")]
    PositionAcrossTags { position: usize, count: usize },

    /// One explicit position was applied to several values.
    #[error("cannot apply position {position} to {count} values of '{tag}'")]
    PositionAcrossValues {
        tag: String,
        position: usize,
        count: usize,
    },

    /// An operation with nothing to send.
    #[error("empty {op} for '{tag}'")]
    Empty { op: &'static str, tag: String },
}

/// JSON-Patch operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
}

/// The value carried by `add` and `replace`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchValue {
    pub value: MetaScalar,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl From<&MetaValue> for PatchValue {
    fn from(v: &MetaValue) -> Self {
        Self {
            value: v.value().clone(),
            language: v.language().map(str::to_string),
        }
    }
}

/// A single value, or a full list when a whole field is replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchPayload {
    One(PatchValue),
    Many(Vec<PatchValue>),
}

/// One wire-level patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    pub op: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PatchPayload>,
}

impl PatchDescriptor {
    fn new(op: PatchOp, path: String) -> Self {
        Self {
            op,
            from: None,
            path,
            value: None,
        }
    }

    fn with_value(mut self, value: PatchPayload) -> Self {
        self.value = Some(value);
        self
    }
}

/// Path of a whole field.
pub fn field_path(tag: &Tag) -> String {
    format!("/metadata/{}", tag)
}

fn index_path(tag: &Tag, index: impl std::fmt::Display) -> String {
    format!("/metadata/{}/{}", tag, index)
}

/// Converts journal entries into patch descriptors.
pub struct PatchTranslator;

impl PatchTranslator {
    /// Translate one journal entry.
    pub fn translate(op: &Operation) -> Result<Vec<PatchDescriptor>, PatchError> {
        match &op.kind {
            OpKind::Add { values, position } => Self::add_values(&op.tag, values, *position),
            OpKind::Delete {
                target: DeleteTarget::Field,
            } => Self::remove_fields(std::slice::from_ref(&op.tag), None),
            OpKind::Delete {
                target: DeleteTarget::Indices(indices),
            } => Self::remove_indices(&op.tag, indices),
            OpKind::Move { from, to } => Ok(vec![Self::move_value(&op.tag, *from, *to)]),
        }
    }

    /// One `add` per value, in order.
    pub fn add_values(
        tag: &Tag,
        values: &[MetaValue],
        position: Position,
    ) -> Result<Vec<PatchDescriptor>, PatchError> {
        if values.is_empty() {
            return Err(PatchError::Empty {
                op: "add",
                tag: tag.to_string(),
            });
        }

        let path = match position {
            Position::End => index_path(tag, "-"),
            Position::Index(i) if values.len() > 1 => {
                return Err(PatchError::PositionAcrossValues {
                    tag: tag.to_string(),
                    position: i,
                    count: values.len(),
                })
            }
            Position::Index(i) => index_path(tag, i),
        };

        Ok(values
            .iter()
            .map(|v| {
                PatchDescriptor::new(PatchOp::Add, path.clone())
                    .with_value(PatchPayload::One(v.into()))
            })
            .collect())
    }

    /// Remove whole fields, or the value at `position` of a single field.
    pub fn remove_fields(
        tags: &[Tag],
        position: Option<usize>,
    ) -> Result<Vec<PatchDescriptor>, PatchError> {
        if let Some(position) = position {
            if tags.len() > 1 {
                return Err(PatchError::PositionAcrossTags {
                    position,
                    count: tags.len(),
                });
            }
        }

        Ok(tags
            .iter()
            .map(|tag| {
                let path = match position {
                    Some(i) => index_path(tag, i),
                    None => field_path(tag),
                };
                PatchDescriptor::new(PatchOp::Remove, path)
            })
            .collect())
    }

    /// One `remove` per index, in order.
    pub fn remove_indices(tag: &Tag, indices: &[usize]) -> Result<Vec<PatchDescriptor>, PatchError> {
        if indices.is_empty() {
            return Err(PatchError::Empty {
                op: "remove",
                tag: tag.to_string(),
            });
        }
        Ok(indices
            .iter()
            .map(|i| PatchDescriptor::new(PatchOp::Remove, index_path(tag, i)))
            .collect())
    }

    /// Reorder within a field. Indices are sent as given.
    pub fn move_value(tag: &Tag, from: isize, to: isize) -> PatchDescriptor {
        let mut descriptor = PatchDescriptor::new(PatchOp::Move, index_path(tag, to));
        descriptor.from = Some(index_path(tag, from));
        descriptor
    }

    /// Replace a field outright, or a single value at `position`.
    ///
    /// Without a position the whole list is sent; a position requires
    /// exactly one value.
    pub fn replace_field(
        tag: &Tag,
        values: &[MetaValue],
        position: Option<usize>,
    ) -> Result<PatchDescriptor, PatchError> {
        match (values, position) {
            ([], _) => Err(PatchError::Empty {
                op: "replace",
                tag: tag.to_string(),
            }),
            ([value], Some(i)) => Ok(PatchDescriptor::new(PatchOp::Replace, index_path(tag, i))
                .with_value(PatchPayload::One(value.into()))),
            (_, Some(i)) => Err(PatchError::PositionAcrossValues {
                tag: tag.to_string(),
                position: i,
                count: values.len(),
            }),
            ([value], None) => Ok(PatchDescriptor::new(PatchOp::Replace, field_path(tag))
                .with_value(PatchPayload::One(value.into()))),
            (_, None) => Ok(PatchDescriptor::new(PatchOp::Replace, field_path(tag))
                .with_value(PatchPayload::Many(values.iter().map(Into::into).collect()))),
        }
    }
}
