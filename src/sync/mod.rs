//! sync
//!
//! Local editing of remote objects and replay of the changes.
//!
//! # Modules
//!
//! - [`engine`] - `SyncEngine`: journaled mutations, commit and reload
//! - [`remote`] - Object documents, single-object fetch and discovery

pub mod engine;
pub mod remote;

pub use engine::{CommitSummary, SyncEngine, SyncError};
pub use remote::{fetch_object, list_children, search_objects, RemoteObject};
