//! core::ops
//!
//! Mutation journaling.
//!
//! # Modules
//!
//! - [`journal`] - Ordered log of pending metadata mutations
//!
//! # Architecture
//!
//! Every journaled metadata mutation:
//! 1. Validates its arguments before touching anything
//! 2. Applies the change to the local store
//! 3. Appends one normalized entry while tracking is enabled
//!
//! A commit then drains the journal front to back.

pub mod journal;

pub use journal::{DeleteTarget, MutationJournal, OpKind, Operation, Position};
