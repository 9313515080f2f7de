//! core::ops::journal
//!
//! In-memory mutation journal.
//!
//! # Architecture
//!
//! The journal is the source of truth for what a commit must send. Every
//! local mutation made while tracking appends one normalized [`Operation`];
//! the sync engine later replays them strictly in FIFO order, one remote
//! patch per entry.
//!
//! # Invariants
//!
//! - Entries accumulate only while tracking is enabled
//! - Starting or stopping tracking clears all entries
//! - Entries leave the journal only from the front, after their patch
//!   was accepted
//! - The journal is never persisted
//!
//! # Example
//!
//! ```
//! use metasync::core::ops::journal::{MutationJournal, OpKind, Position};
//! use metasync::core::metadata::MetaValue;
//! use metasync::core::types::Tag;
//!
//! let title = Tag::new("dc.title").unwrap();
//! let mut journal = MutationJournal::new();
//!
//! // Ignored: not tracking yet
//! assert!(!journal.record(title.clone(), OpKind::add(MetaValue::new("x"))));
//!
//! journal.start();
//! journal.record(title.clone(), OpKind::Move { from: 1, to: 0 });
//! assert_eq!(journal.len(), 1);
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::metadata::MetaValue;
use crate::core::types::{Tag, UtcTimestamp};

/// Where an `add` places its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Append after the last value.
    End,
    /// Insert at an explicit index.
    Index(usize),
}

/// What a `delete` removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteTarget {
    /// The whole tag.
    Field,
    /// Single values, applied in order. Each index is relative to the list
    /// after the previous removals.
    Indices(Vec<usize>),
}

/// The kind of journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpKind {
    Add {
        values: Vec<MetaValue>,
        position: Position,
    },
    Delete {
        target: DeleteTarget,
    },
    /// Indices exactly as supplied by the caller, negative ones included.
    Move {
        from: isize,
        to: isize,
    },
}

impl OpKind {
    /// Append a single value at the end.
    pub fn add(value: MetaValue) -> Self {
        OpKind::Add {
            values: vec![value],
            position: Position::End,
        }
    }

    /// Delete the whole tag.
    pub fn delete_field() -> Self {
        OpKind::Delete {
            target: DeleteTarget::Field,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Add { .. } => "add",
            OpKind::Delete { .. } => "delete",
            OpKind::Move { .. } => "move",
        }
    }
}

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub tag: Tag,
    #[serde(flatten)]
    pub kind: OpKind,
    pub recorded_at: UtcTimestamp,
}

impl Operation {
    pub fn new(tag: Tag, kind: OpKind) -> Self {
        Self {
            tag,
            kind,
            recorded_at: UtcTimestamp::now(),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            OpKind::Add { values, position } => match position {
                Position::End => write!(f, "add {} value(s) to {}", values.len(), self.tag),
                Position::Index(i) => {
                    write!(f, "add {} value(s) to {} at {}", values.len(), self.tag, i)
                }
            },
            OpKind::Delete {
                target: DeleteTarget::Field,
            } => write!(f, "delete {}", self.tag),
            OpKind::Delete {
                target: DeleteTarget::Indices(indices),
            } => write!(f, "delete {} value(s) from {}", indices.len(), self.tag),
            OpKind::Move { from, to } => write!(f, "move {} {} -> {}", self.tag, from, to),
        }
    }
}

/// Ordered log of pending mutations, gated by a tracking flag.
#[derive(Debug, Clone, Default)]
pub struct MutationJournal {
    tracking: bool,
    entries: VecDeque<Operation>,
}

impl MutationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable tracking with an empty journal.
    pub fn start(&mut self) {
        self.tracking = true;
        self.entries.clear();
    }

    /// Disable tracking and drop pending entries.
    pub fn stop(&mut self) {
        self.tracking = false;
        self.entries.clear();
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Append an entry if tracking. Returns whether it was recorded.
    pub fn record(&mut self, tag: Tag, kind: OpKind) -> bool {
        if !self.tracking {
            return false;
        }
        self.entries.push_back(Operation::new(tag, kind));
        true
    }

    /// The oldest pending entry.
    pub fn front(&self) -> Option<&Operation> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Option<Operation> {
        self.entries.pop_front()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Operation> {
        self.entries.iter()
    }

    /// Drop pending entries without changing the tracking flag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
