//! core
//!
//! Domain types, metadata storage, the mutation journal and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Tag, ObjectId, ObjectKind, UtcTimestamp
//! - [`metadata`] - Metadata values and the per-object store
//! - [`ops`] - Mutation journaling
//! - [`config`] - Configuration schema and loading
//!
//! Nothing in here performs I/O except config loading.

pub mod config;
pub mod metadata;
pub mod ops;
pub mod types;
