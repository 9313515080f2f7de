//! rest::mock
//!
//! Mock transport for deterministic testing.
//!
//! # Design
//!
//! The mock transport stores documents and paginated collections in memory,
//! records every call, and applies metadata patches to the stored documents
//! the way the server would. A commit followed by a reload therefore sees
//! the patched state.
//!
//! # Example
//!
//! ```
//! use metasync::rest::mock::MockTransport;
//! use metasync::rest::Transport;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new();
//! transport.add_document("core/items/1", json!({"uuid": "1", "metadata": {}}));
//!
//! let doc = transport.get("core/items/1", &[]).await.unwrap();
//! assert_eq!(doc["uuid"], "1");
//! assert_eq!(transport.get_count(), 1);
//! # });
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::patch::{PatchDescriptor, PatchOp, PatchPayload, PatchValue};
use super::traits::{RestError, Transport};
use crate::core::metadata::{MetaStore, MetaValue};
use crate::core::types::Tag;

/// Page size used when a request does not name one.
const DEFAULT_MOCK_PAGE_SIZE: usize = 20;

/// Mock transport for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    /// Single documents by path.
    documents: HashMap<String, Value>,
    /// Paginated collections by endpoint.
    collections: HashMap<String, MockCollection>,
    /// Call to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Number of patch calls seen so far.
    patch_calls: usize,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct MockCollection {
    key: String,
    items: Vec<Value>,
}

/// Configuration for which call should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail every get with the given error.
    Get(RestError),
    /// Fail the request for this page number of any collection.
    Page(u32),
    /// Fail the patch call with this zero-based sequence number.
    Patch { nth: usize, error: RestError },
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOperation {
    Get {
        path: String,
        params: Vec<(String, String)>,
    },
    Patch {
        path: String,
        body: Vec<PatchDescriptor>,
    },
}

impl MockTransport {
    /// Create a new empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on a specific call.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on = None;
    }

    /// Store a single document.
    pub fn add_document(&self, path: &str, doc: Value) {
        self.inner
            .lock()
            .unwrap()
            .documents
            .insert(path.to_string(), doc);
    }

    /// Current state of a stored document.
    pub fn document(&self, path: &str) -> Option<Value> {
        self.inner.lock().unwrap().documents.get(path).cloned()
    }

    /// Store a paginated collection under `endpoint`, embedded as `key`.
    pub fn add_collection(&self, endpoint: &str, key: &str, items: Vec<Value>) {
        self.inner.lock().unwrap().collections.insert(
            endpoint.to_string(),
            MockCollection {
                key: key.to_string(),
                items,
            },
        );
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Recorded gets as `(path, params)`.
    pub fn gets(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOperation::Get { path, params } => Some((path, params)),
                _ => None,
            })
            .collect()
    }

    /// Recorded patches as `(path, body)`.
    pub fn patches(&self) -> Vec<(String, Vec<PatchDescriptor>)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOperation::Patch { path, body } => Some((path, body)),
                _ => None,
            })
            .collect()
    }

    pub fn get_count(&self) -> usize {
        self.gets().len()
    }

    pub fn patch_count(&self) -> usize {
        self.patches().len()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }
}

impl MockTransportInner {
    fn page(&self, path: &str, params: &[(String, String)]) -> Option<Result<Value, RestError>> {
        let collection = self.collections.get(path)?;

        let param = |name: &str| {
            params
                .iter()
                .rev()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let size = param("size").unwrap_or(DEFAULT_MOCK_PAGE_SIZE).max(1);
        let number = param("page").unwrap_or(0);

        if let Some(FailOn::Page(failing)) = &self.fail_on {
            if *failing as usize == number {
                return Some(Err(RestError::Api {
                    status: 500,
                    endpoint: path.to_string(),
                    message: format!("page {} unavailable", number),
                }));
            }
        }

        let total = collection.items.len();
        let items: Vec<Value> = collection
            .items
            .iter()
            .skip(number * size)
            .take(size)
            .cloned()
            .collect();

        let mut embedded = serde_json::Map::new();
        embedded.insert(collection.key.clone(), Value::Array(items));

        Some(Ok(json!({
            "_embedded": embedded,
            "page": {
                "size": size,
                "totalElements": total,
                "totalPages": total.div_ceil(size),
                "number": number,
            }
        })))
    }
}

fn unprocessable(path: &str, message: impl Into<String>) -> RestError {
    RestError::Api {
        status: 422,
        endpoint: path.to_string(),
        message: message.into(),
    }
}

fn to_meta_value(value: &PatchValue) -> MetaValue {
    MetaValue::new(value.value.clone()).with_language(value.language.clone().unwrap_or_default())
}

fn payload_values(payload: Option<&PatchPayload>) -> Vec<MetaValue> {
    match payload {
        Some(PatchPayload::One(v)) => vec![to_meta_value(v)],
        Some(PatchPayload::Many(vs)) => vs.iter().map(to_meta_value).collect(),
        None => Vec::new(),
    }
}

/// Split `/metadata/<tag>[/<index>]`.
fn parse_metadata_path(path: &str) -> Option<(Tag, Option<&str>)> {
    let rest = path.strip_prefix("/metadata/")?;
    let mut parts = rest.splitn(2, '/');
    let tag = Tag::new(parts.next()?).ok()?;
    Some((tag, parts.next()))
}

fn parse_index(endpoint: &str, index: &str) -> Result<isize, RestError> {
    index
        .parse()
        .map_err(|_| unprocessable(endpoint, format!("invalid index '{}'", index)))
}

/// Apply one descriptor the way the server would.
fn apply(store: &mut MetaStore, endpoint: &str, d: &PatchDescriptor) -> Result<(), RestError> {
    let (tag, index) = parse_metadata_path(&d.path)
        .ok_or_else(|| unprocessable(endpoint, format!("invalid path '{}'", d.path)))?;
    let out_of_range = || unprocessable(endpoint, format!("index out of range in '{}'", d.path));

    match (d.op, index) {
        (PatchOp::Add, None | Some("-")) => {
            store.add_all(&tag, payload_values(d.value.as_ref()));
        }
        (PatchOp::Add, Some(i)) => {
            let i = usize::try_from(parse_index(endpoint, i)?).map_err(|_| out_of_range())?;
            for (offset, value) in payload_values(d.value.as_ref()).into_iter().enumerate() {
                store
                    .insert(&tag, i + offset, value)
                    .map_err(|_| out_of_range())?;
            }
        }
        (PatchOp::Remove, None) => {
            store.remove(&tag, None);
        }
        (PatchOp::Remove, Some(i)) => {
            let i = usize::try_from(parse_index(endpoint, i)?).map_err(|_| out_of_range())?;
            let mut values = store.get(tag.as_str()).to_vec();
            if i >= values.len() {
                return Err(out_of_range());
            }
            values.remove(i);
            store.set(&tag, values);
        }
        (PatchOp::Replace, None) => {
            store.set(&tag, payload_values(d.value.as_ref()));
        }
        (PatchOp::Replace, Some(i)) => {
            let i = usize::try_from(parse_index(endpoint, i)?).map_err(|_| out_of_range())?;
            let Some(PatchPayload::One(new)) = &d.value else {
                return Err(unprocessable(endpoint, "replace at an index needs one value"));
            };
            let slot = store
                .get_mut(tag.as_str())
                .and_then(|values| values.get_mut(i))
                .ok_or_else(out_of_range)?;
            slot.set_value(new.value.clone());
            *slot = slot
                .clone()
                .with_language(new.language.clone().unwrap_or_default());
        }
        (PatchOp::Move, Some(to)) => {
            let from = d
                .from
                .as_deref()
                .and_then(parse_metadata_path)
                .filter(|(from_tag, _)| *from_tag == tag)
                .and_then(|(_, i)| i)
                .ok_or_else(|| unprocessable(endpoint, "move needs a 'from' in the same field"))?;
            let from = parse_index(endpoint, from)?;
            let to = parse_index(endpoint, to)?;
            store
                .move_value(&tag, from, to)
                .map_err(|e| unprocessable(endpoint, e.to_string()))?;
        }
        (PatchOp::Move, None) => {
            return Err(unprocessable(endpoint, "move needs a target index"));
        }
    }
    Ok(())
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, RestError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Get {
            path: path.to_string(),
            params: params.to_vec(),
        });

        if let Some(FailOn::Get(err)) = &inner.fail_on {
            return Err(err.clone());
        }

        if let Some(page) = inner.page(path, params) {
            return page;
        }

        inner
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| RestError::NotFound {
                endpoint: path.to_string(),
            })
    }

    async fn patch(
        &self,
        path: &str,
        body: &[PatchDescriptor],
    ) -> Result<Option<Value>, RestError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Patch {
            path: path.to_string(),
            body: body.to_vec(),
        });

        let nth = inner.patch_calls;
        inner.patch_calls += 1;
        if let Some(FailOn::Patch { nth: failing, error }) = &inner.fail_on {
            if *failing == nth {
                return Err(error.clone());
            }
        }

        let doc = inner
            .documents
            .get_mut(path)
            .ok_or_else(|| RestError::NotFound {
                endpoint: path.to_string(),
            })?;

        let mut store = match doc.get("metadata") {
            Some(metadata) => {
                MetaStore::from_json(metadata).map_err(|e| unprocessable(path, e.to_string()))?
            }
            None => MetaStore::new(),
        };

        // All or nothing, like a single server transaction
        for descriptor in body {
            apply(&mut store, path, descriptor)?;
        }

        doc["metadata"] = store.to_json();
        Ok(Some(doc.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::patch::PatchTranslator;

    fn title() -> Tag {
        Tag::new("dc.title").unwrap()
    }

    fn item(metadata: Value) -> Value {
        json!({"uuid": "1", "type": "item", "metadata": metadata})
    }

    fn titles(doc: &Value) -> Vec<String> {
        doc["metadata"]["dc.title"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .map(|v| v["value"].as_str().unwrap().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let mock = MockTransport::new();
        assert!(matches!(
            mock.get("core/items/x", &[]).await,
            Err(RestError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn pages_collection() {
        let mock = MockTransport::new();
        mock.add_collection("core/items", "items", (0..5).map(|i| json!(i)).collect());

        let params = vec![("size".to_string(), "2".to_string()), ("page".to_string(), "2".to_string())];
        let page = mock.get("core/items", &params).await.unwrap();
        assert_eq!(page["_embedded"]["items"], json!([4]));
        assert_eq!(page["page"]["totalPages"], 3);
    }

    #[tokio::test]
    async fn applies_add_and_move() {
        let mock = MockTransport::new();
        mock.add_document("core/items/1", item(json!({"dc.title": [{"value": "a"}]})));

        let mut body =
            PatchTranslator::add_values(&title(), &[MetaValue::new("b")], crate::core::ops::Position::End)
                .unwrap();
        body.push(PatchTranslator::move_value(&title(), 1, 0));

        let doc = mock.patch("core/items/1", &body).await.unwrap().unwrap();
        assert_eq!(titles(&doc), ["b", "a"]);
        assert_eq!(titles(&mock.document("core/items/1").unwrap()), ["b", "a"]);
    }

    #[tokio::test]
    async fn applies_replace_at_index() {
        let mock = MockTransport::new();
        mock.add_document(
            "core/items/1",
            item(json!({"dc.title": [{"value": "a", "authority": "x", "confidence": 600}]})),
        );

        let body = vec![PatchTranslator::replace_field(&title(), &[MetaValue::new("z")], Some(0)).unwrap()];
        let doc = mock.patch("core/items/1", &body).await.unwrap().unwrap();
        assert_eq!(titles(&doc), ["z"]);
        assert_eq!(doc["metadata"]["dc.title"][0]["authority"], "x");
    }

    #[tokio::test]
    async fn bad_index_rejects_whole_patch() {
        let mock = MockTransport::new();
        mock.add_document("core/items/1", item(json!({"dc.title": [{"value": "a"}]})));

        let body = vec![
            PatchTranslator::remove_fields(&[title()], None).unwrap().remove(0),
            PatchTranslator::remove_indices(&title(), &[3]).unwrap().remove(0),
        ];
        let err = mock.patch("core/items/1", &body).await.unwrap_err();
        assert!(matches!(err, RestError::Api { status: 422, .. }));
        assert_eq!(titles(&mock.document("core/items/1").unwrap()), ["a"]);
    }

    #[tokio::test]
    async fn fail_on_nth_patch() {
        let mock = MockTransport::new().fail_on(FailOn::Patch {
            nth: 1,
            error: RestError::Network("reset".into()),
        });
        mock.add_document("core/items/1", item(json!({})));
        let body = PatchTranslator::remove_fields(&[title()], None).unwrap();

        assert!(mock.patch("core/items/1", &body).await.is_ok());
        assert!(mock.patch("core/items/1", &body).await.is_err());
        assert!(mock.patch("core/items/1", &body).await.is_ok());
        assert_eq!(mock.patch_count(), 3);
    }
}
