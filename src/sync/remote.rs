//! sync::remote
//!
//! Remote object documents and discovery helpers.
//!
//! A remote object document carries the identity fields needed to rebuild
//! a local object (`type`, `uuid`, `handle`, `name`) plus its `metadata`
//! in the REST form. Everything else in the document is ignored.

use serde_json::Value;
use tracing::debug;

use super::engine::SyncError;
use crate::core::config::Config;
use crate::core::metadata::MetaStore;
use crate::core::types::{ObjectId, ObjectKind};
use crate::rest::{PagedFetcher, Transport};

/// Search endpoint for repository objects.
pub const SEARCH_ENDPOINT: &str = "discover/search/objects";

/// A remote object with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteObject {
    pub kind: ObjectKind,
    pub id: ObjectId,
    pub handle: Option<String>,
    pub name: Option<String>,
    pub metadata: MetaStore,
}

impl RemoteObject {
    /// Parse a REST object document.
    pub fn from_json(doc: &Value) -> Result<Self, SyncError> {
        let field = |name: &str| doc.get(name).and_then(Value::as_str);

        let kind = field("type")
            .ok_or_else(|| SyncError::InvalidDocument("missing 'type'".to_string()))
            .and_then(|t| {
                ObjectKind::from_type_name(t).map_err(|e| SyncError::InvalidDocument(e.to_string()))
            })?;
        let id = field("uuid")
            .ok_or_else(|| SyncError::InvalidDocument("missing 'uuid'".to_string()))
            .and_then(|u| ObjectId::parse(u).map_err(|e| SyncError::InvalidDocument(e.to_string())))?;

        let metadata = match doc.get("metadata") {
            Some(metadata) => MetaStore::from_json(metadata)?,
            None => MetaStore::new(),
        };

        Ok(Self {
            kind,
            id,
            handle: field("handle").map(str::to_string),
            name: field("name").map(str::to_string),
            metadata,
        })
    }

    /// Path of this object relative to the API root.
    pub fn path(&self) -> String {
        self.kind.object_path(&self.id)
    }
}

/// Fetch one object with all its metadata.
pub async fn fetch_object<T: Transport + ?Sized>(
    transport: &T,
    config: &Config,
    kind: ObjectKind,
    id: &ObjectId,
) -> Result<RemoteObject, SyncError> {
    let doc = PagedFetcher::new(transport, config)
        .fetch_document(&kind.object_path(id))
        .await?;
    RemoteObject::from_json(&doc)
}

/// Run a discovery search, optionally restricted to one kind of object.
///
/// Search hits wrap the object in `_embedded.indexableObject`.
pub async fn search_objects<T: Transport + ?Sized>(
    transport: &T,
    config: &Config,
    query: &str,
    kind: Option<ObjectKind>,
) -> Result<Vec<RemoteObject>, SyncError> {
    let mut params = vec![("query".to_string(), query.to_string())];
    if let Some(kind) = kind {
        params.push(("dsoType".to_string(), kind.to_string()));
    }

    let hits = PagedFetcher::new(transport, config)
        .fetch_all(SEARCH_ENDPOINT, "objects", &params)
        .await?;
    debug!(query, hits = hits.len(), "search complete");

    hits.iter()
        .map(|hit| {
            let object = hit
                .get("_embedded")
                .and_then(|e| e.get("indexableObject"))
                .unwrap_or(hit);
            RemoteObject::from_json(object)
        })
        .collect()
}

/// List the objects under `relation` of a parent, e.g. an item's
/// `bundles` or a bundle's `bitstreams`.
pub async fn list_children<T: Transport + ?Sized>(
    transport: &T,
    config: &Config,
    parent_kind: ObjectKind,
    parent_id: &ObjectId,
    relation: &str,
) -> Result<Vec<RemoteObject>, SyncError> {
    let endpoint = format!("{}/{}", parent_kind.object_path(parent_id), relation);
    let docs = PagedFetcher::new(transport, config)
        .fetch_all(&endpoint, relation, &[])
        .await?;
    docs.iter().map(RemoteObject::from_json).collect()
}
