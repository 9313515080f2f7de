//! sync::engine
//!
//! Journaled metadata editing for one remote object.
//!
//! # Architecture
//!
//! A `SyncEngine` owns the local [`MetaStore`] of one object and a
//! [`MutationJournal`]. Every mutation is validated first, then applied to
//! the store, then (while tracking) recorded as one normalized journal
//! entry. `commit` replays the journal against the server; `load` throws
//! local state away and rebuilds it from the server.
//!
//! # Invariants
//!
//! - Invalid calls fail before the store or the journal change
//! - Tracking requires a persisted identifier
//! - Replay is strictly FIFO, one PATCH per journal entry, never batched
//!   across entries
//! - An entry leaves the journal only after its PATCH succeeded
//!
//! # Example
//!
//! ```
//! use metasync::core::config::Config;
//! use metasync::core::metadata::MetaValue;
//! use metasync::core::types::{ObjectId, ObjectKind};
//! use metasync::rest::mock::MockTransport;
//! use metasync::sync::SyncEngine;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let id = ObjectId::random();
//! let transport = MockTransport::new();
//! transport.add_document(
//!     &ObjectKind::Item.object_path(&id),
//!     json!({"uuid": id.to_string(), "type": "item", "metadata": {}}),
//! );
//!
//! let mut item = SyncEngine::new(ObjectKind::Item, id, Config::default());
//! item.track().unwrap();
//! item.add("dc.title", MetaValue::new("Hello").with_language("en")).unwrap();
//!
//! let summary = item.commit(&transport, true).await.unwrap();
//! assert_eq!(summary.patches, 1);
//! assert!(!item.is_tracking());
//! # });
//! ```

use thiserror::Error;
use tracing::{debug, info, warn};

use super::remote::{fetch_object, RemoteObject};
use crate::core::config::Config;
use crate::core::metadata::{MetaScalar, MetaStore, MetaValue, MetadataError, Removal};
use crate::core::ops::{DeleteTarget, MutationJournal, OpKind, Operation, Position};
use crate::core::types::{ObjectId, ObjectKind, Tag};
use crate::rest::{PatchError, PatchTranslator, RestError, Transport};

/// Errors from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid tag or index.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The object is not in a state that allows the call.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A journal entry cannot be expressed as a patch.
    #[error("invalid patch: {0}")]
    Patch(#[from] PatchError),

    /// The server call failed.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// A fetched document does not describe an object.
    #[error("invalid object document: {0}")]
    InvalidDocument(String),
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// PATCH requests sent (one per journal entry).
    pub patches: usize,
    /// Patch descriptors sent in total.
    pub operations: usize,
}

/// Local metadata of one remote object, with change tracking.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    kind: ObjectKind,
    id: Option<ObjectId>,
    handle: Option<String>,
    name: Option<String>,
    store: MetaStore,
    journal: MutationJournal,
    config: Config,
}

impl SyncEngine {
    /// An engine for a persisted object with empty local metadata.
    pub fn new(kind: ObjectKind, id: ObjectId, config: Config) -> Self {
        Self {
            id: Some(id),
            ..Self::detached(kind, config)
        }
    }

    /// An engine for an object that does not exist remotely yet.
    pub fn detached(kind: ObjectKind, config: Config) -> Self {
        Self {
            kind,
            id: None,
            handle: None,
            name: None,
            store: MetaStore::new(),
            journal: MutationJournal::new(),
            config,
        }
    }

    /// An engine seeded from a fetched object.
    pub fn from_remote(object: RemoteObject, config: Config) -> Self {
        Self {
            kind: object.kind,
            id: Some(object.id),
            handle: object.handle,
            name: object.name,
            store: object.metadata,
            journal: MutationJournal::new(),
            config,
        }
    }

    /// Give a detached object its identifier once it has been created
    /// remotely.
    pub fn attach(&mut self, id: ObjectId) {
        self.id = Some(id);
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn metadata(&self) -> &MetaStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Values of `tag`, empty if absent.
    pub fn get(&self, tag: &str) -> &[MetaValue] {
        self.store.get(tag)
    }

    fn object_path(&self, action: &str) -> Result<String, SyncError> {
        self.id
            .as_ref()
            .map(|id| self.kind.object_path(id))
            .ok_or_else(|| {
                SyncError::Precondition(format!(
                    "cannot {} a {} without an identifier",
                    action, self.kind
                ))
            })
    }

    // =========================================================================
    // Tracking
    // =========================================================================

    /// Start recording mutations. Clears any pending entries.
    pub fn track(&mut self) -> Result<(), SyncError> {
        self.object_path("track")?;
        self.journal.start();
        debug!(kind = %self.kind, "tracking enabled");
        Ok(())
    }

    /// Stop recording and drop pending entries.
    pub fn stop(&mut self) {
        self.journal.stop();
    }

    pub fn is_tracking(&self) -> bool {
        self.journal.is_tracking()
    }

    /// Entries waiting for the next commit, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &Operation> {
        self.journal.entries()
    }

    // =========================================================================
    // Journaled mutations
    // =========================================================================

    /// Append a value to `tag`.
    pub fn add(&mut self, tag: &str, value: MetaValue) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        self.store.add(&tag, value.clone());
        self.journal.record(tag, OpKind::add(value));
        Ok(())
    }

    /// Append several values to `tag`, recorded as one entry.
    pub fn add_all(&mut self, tag: &str, values: Vec<MetaValue>) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        if values.is_empty() {
            return Ok(());
        }
        self.store.add_all(&tag, values.iter().cloned());
        self.journal.record(
            tag,
            OpKind::Add {
                values,
                position: Position::End,
            },
        );
        Ok(())
    }

    /// Insert a value at `position` of `tag`.
    pub fn insert(&mut self, tag: &str, position: usize, value: MetaValue) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        self.store.insert(&tag, position, value.clone())?;
        self.journal.record(
            tag,
            OpKind::Add {
                values: vec![value],
                position: Position::Index(position),
            },
        );
        Ok(())
    }

    /// Remove a whole tag, or every value of it equal to `value`.
    ///
    /// Nothing is recorded when nothing was removed.
    pub fn remove(&mut self, tag: &str, value: Option<&MetaScalar>) -> Result<Removal, SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        let removal = self.store.remove(&tag, value);
        match &removal {
            Removal::Nothing => {}
            Removal::Field => {
                self.journal.record(tag, OpKind::delete_field());
            }
            Removal::Values(indices) => {
                self.journal.record(
                    tag,
                    OpKind::Delete {
                        target: DeleteTarget::Indices(indices.clone()),
                    },
                );
            }
        }
        Ok(removal)
    }

    /// Make `value` the only value of `tag`.
    pub fn replace(&mut self, tag: &str, value: MetaValue) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        if self.store.replace(&tag, value.clone()) {
            self.journal.record(tag.clone(), OpKind::delete_field());
        }
        self.journal.record(tag, OpKind::add(value));
        Ok(())
    }

    /// Move the value at `from` to `to`. Negative indices count from the end.
    pub fn move_value(&mut self, tag: &str, from: isize, to: isize) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        self.store.move_value(&tag, from, to)?;
        self.journal.record(tag, OpKind::Move { from, to });
        Ok(())
    }

    /// Replace the whole list of `tag`. An empty list removes the tag.
    pub fn set(&mut self, tag: &str, values: Vec<MetaValue>) -> Result<(), SyncError> {
        let tag = Tag::new(tag).map_err(MetadataError::from)?;
        let previous = self.store.set(&tag, values.clone());
        if previous.is_some() {
            self.journal.record(tag.clone(), OpKind::delete_field());
        }
        if !values.is_empty() {
            self.journal.record(
                tag,
                OpKind::Add {
                    values,
                    position: Position::End,
                },
            );
        }
        Ok(())
    }

    // =========================================================================
    // Remote
    // =========================================================================

    /// Replay the journal against the server.
    ///
    /// Every entry is translated before anything is sent. Entries are then
    /// sent one PATCH each, in order; an entry is dropped from the journal
    /// once its PATCH succeeded. On failure the failed entry and all later
    /// ones stay pending and the same commit can be retried.
    ///
    /// Patch values carry only the scalar and the language. Authority and
    /// confidence of committed values are not sent, so after a `load` they
    /// are whatever the server assigned (usually none and -1).
    pub async fn commit<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        stop_tracking: bool,
    ) -> Result<CommitSummary, SyncError> {
        let mut summary = CommitSummary::default();

        if !self.journal.is_empty() {
            let path = self.object_path("commit")?;
            let bodies = self
                .journal
                .entries()
                .map(PatchTranslator::translate)
                .collect::<Result<Vec<_>, _>>()?;

            info!(%path, entries = bodies.len(), "committing metadata changes");

            for body in bodies {
                if let Err(err) = transport.patch(&path, &body).await {
                    warn!(
                        %path,
                        pending = self.journal.len(),
                        error = %err,
                        "commit aborted, pending entries kept"
                    );
                    return Err(err.into());
                }
                if let Some(op) = self.journal.pop_front() {
                    debug!(%path, %op, "applied");
                }
                summary.patches += 1;
                summary.operations += body.len();
            }
        }

        if stop_tracking {
            self.journal.stop();
        }
        Ok(summary)
    }

    /// Replace local metadata with the server's, dropping pending entries.
    ///
    /// Tracking stays as it was.
    pub async fn load<T: Transport + ?Sized>(&mut self, transport: &T) -> Result<(), SyncError> {
        let Some(id) = self.id else {
            return Err(SyncError::Precondition(format!(
                "cannot load a {} without an identifier",
                self.kind
            )));
        };

        let object = fetch_object(transport, &self.config, self.kind, &id).await?;
        if object.kind != self.kind || object.id != id {
            return Err(SyncError::InvalidDocument(format!(
                "expected {} {}, got {} {}",
                self.kind, id, object.kind, object.id
            )));
        }

        if !self.journal.is_empty() {
            warn!(
                discarded = self.journal.len(),
                "load discards uncommitted changes"
            );
        }

        self.handle = object.handle;
        self.name = object.name;
        self.store = object.metadata;
        self.journal.clear();
        info!(kind = %self.kind, %id, tags = self.store.len(), "loaded metadata");
        Ok(())
    }
}
