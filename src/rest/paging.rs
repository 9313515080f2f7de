//! rest::paging
//!
//! Order-preserving retrieval of paginated collections.
//!
//! # Algorithm
//!
//! 1. Fetch page 0 to learn `page.totalPages` and the first items.
//! 2. With one page or fewer, return those items.
//! 3. Otherwise fetch pages `1..totalPages`, one at a time when `workers`
//!    is 0, else with at most `workers` requests in flight.
//! 4. Concatenate in ascending page order, whatever order the pages
//!    completed in.
//!
//! Any failing page aborts the whole fetch.
//!
//! # Envelopes
//!
//! A page looks like `{_embedded: {<key>: [...]}, page: {totalPages, ..}}`.
//! Search endpoints wrap that once more in `_embedded.searchResult`, which
//! is unwrapped transparently.

use futures::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info};

use super::traits::{RestError, Transport};
use crate::core::config::Config;

/// One decoded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: u32,
    pub total_pages: u32,
    pub items: Vec<Value>,
}

/// Fetches complete collections through a [`Transport`].
pub struct PagedFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    page_size: u32,
    workers: usize,
}

impl<'a, T: Transport + ?Sized> PagedFetcher<'a, T> {
    /// Use the page size and worker count from `config`.
    pub fn new(transport: &'a T, config: &Config) -> Self {
        Self {
            transport,
            page_size: config.page_size(),
            workers: config.workers(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch one page of `endpoint` and extract the `key` array.
    pub async fn fetch_page(
        &self,
        endpoint: &str,
        key: &str,
        params: &[(String, String)],
        page: u32,
    ) -> Result<Page, RestError> {
        let mut query = params.to_vec();
        query.push(("size".to_string(), self.page_size.to_string()));
        query.push(("page".to_string(), page.to_string()));

        let doc = self.transport.get(endpoint, &query).await?;
        let page = parse_page(endpoint, key, doc)?;
        debug!(
            endpoint,
            page = page.number,
            total = page.total_pages,
            items = page.items.len(),
            "fetched page"
        );
        Ok(page)
    }

    /// Fetch every page and concatenate the items in page order.
    pub async fn fetch_all(
        &self,
        endpoint: &str,
        key: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Value>, RestError> {
        let first = self.fetch_page(endpoint, key, params, 0).await?;
        if first.total_pages <= 1 {
            return Ok(first.items);
        }

        info!(
            endpoint,
            pages = first.total_pages,
            workers = self.workers,
            "fetching paginated collection"
        );

        let mut items = first.items;
        let rest = 1..first.total_pages;

        if self.workers == 0 {
            for number in rest {
                let page = self.fetch_page(endpoint, key, params, number).await?;
                items.extend(page.items);
            }
        } else {
            let pages: Vec<Page> = stream::iter(rest)
                .map(|number| self.fetch_page(endpoint, key, params, number))
                .buffered(self.workers)
                .try_collect()
                .await?;
            items.extend(pages.into_iter().flat_map(|page| page.items));
        }

        debug!(endpoint, items = items.len(), "collection complete");
        Ok(items)
    }

    /// Fetch a single document, e.g. one object with all its metadata.
    pub async fn fetch_document(&self, endpoint: &str) -> Result<Value, RestError> {
        self.transport.get(endpoint, &[]).await
    }
}

/// Decode a page envelope.
pub fn parse_page(endpoint: &str, key: &str, doc: Value) -> Result<Page, RestError> {
    let mut doc = unwrap_search_result(doc);

    let (number, total_pages) = {
        let info = doc
            .get("page")
            .ok_or_else(|| RestError::malformed(endpoint, "missing page information"))?;
        let total = info
            .get("totalPages")
            .and_then(Value::as_u64)
            .ok_or_else(|| RestError::malformed(endpoint, "missing page.totalPages"))?;
        let number = info.get("number").and_then(Value::as_u64).unwrap_or(0);
        let narrow = |n: u64, field: &str| {
            u32::try_from(n).map_err(|_| {
                RestError::malformed(endpoint, format!("page.{} out of range: {}", field, n))
            })
        };
        (narrow(number, "number")?, narrow(total, "totalPages")?)
    };

    let items = match doc.get_mut("_embedded").and_then(|e| e.get_mut(key)) {
        Some(Value::Array(items)) => std::mem::take(items),
        Some(_) => {
            return Err(RestError::malformed(
                endpoint,
                format!("_embedded.{} is not a list", key),
            ))
        }
        // An empty collection may omit the key entirely
        None if total_pages == 0 => Vec::new(),
        None => {
            return Err(RestError::malformed(
                endpoint,
                format!("missing _embedded.{}", key),
            ))
        }
    };

    Ok(Page {
        number,
        total_pages,
        items,
    })
}

fn unwrap_search_result(mut doc: Value) -> Value {
    match doc
        .get_mut("_embedded")
        .and_then(|e| e.get_mut("searchResult"))
    {
        Some(inner) => inner.take(),
        None => doc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::mock::{FailOn, MockTransport};
    use serde_json::json;

    fn numbered(count: usize) -> Vec<Value> {
        (0..count).map(|i| json!({"n": i})).collect()
    }

    mod parse {
        use super::*;

        #[test]
        fn plain_envelope() {
            let doc = json!({
                "_embedded": {"items": [{"n": 0}, {"n": 1}]},
                "page": {"size": 2, "totalElements": 5, "totalPages": 3, "number": 0}
            });
            let page = parse_page("core/items", "items", doc).unwrap();
            assert_eq!(page.total_pages, 3);
            assert_eq!(page.items.len(), 2);
        }

        #[test]
        fn search_envelope() {
            let doc = json!({
                "_embedded": {"searchResult": {
                    "_embedded": {"objects": [{"n": 0}]},
                    "page": {"totalPages": 1, "number": 0}
                }}
            });
            let page = parse_page("discover/search/objects", "objects", doc).unwrap();
            assert_eq!(page.items, vec![json!({"n": 0})]);
        }

        #[test]
        fn missing_key_is_malformed() {
            let doc = json!({"_embedded": {"other": []}, "page": {"totalPages": 1}});
            assert!(matches!(
                parse_page("core/items", "items", doc),
                Err(RestError::Malformed { .. })
            ));
        }

        #[test]
        fn missing_page_is_malformed() {
            let doc = json!({"_embedded": {"items": []}});
            assert!(matches!(
                parse_page("core/items", "items", doc),
                Err(RestError::Malformed { .. })
            ));
        }

        #[test]
        fn oversized_page_count_is_malformed() {
            let doc = json!({
                "_embedded": {"items": []},
                "page": {"totalPages": u64::from(u32::MAX) + 1, "number": 0}
            });
            assert!(matches!(
                parse_page("core/items", "items", doc),
                Err(RestError::Malformed { .. })
            ));
        }

        #[test]
        fn empty_collection_without_key() {
            let doc = json!({"page": {"totalPages": 0, "number": 0}});
            let page = parse_page("core/items", "items", doc).unwrap();
            assert!(page.items.is_empty());
        }
    }

    #[tokio::test]
    async fn single_page() {
        let mock = MockTransport::new();
        mock.add_collection("core/items", "items", numbered(3));
        let config = Config::default().with_page_size(10);

        let items = PagedFetcher::new(&mock, &config)
            .fetch_all("core/items", "items", &[])
            .await
            .unwrap();
        assert_eq!(items, numbered(3));
        assert_eq!(mock.get_count(), 1);
    }

    #[tokio::test]
    async fn order_is_stable_across_worker_counts() {
        let mock = MockTransport::new();
        mock.add_collection("core/items", "items", numbered(47));

        for workers in [0, 1, 4, 16] {
            let config = Config::default().with_page_size(20).with_workers(workers);
            let items = PagedFetcher::new(&mock, &config)
                .fetch_all("core/items", "items", &[])
                .await
                .unwrap();
            assert_eq!(items, numbered(47), "workers = {}", workers);
        }
    }

    #[tokio::test]
    async fn page_params_are_sent() {
        let mock = MockTransport::new();
        mock.add_collection("core/items", "items", numbered(5));
        let config = Config::default().with_page_size(2);

        PagedFetcher::new(&mock, &config)
            .fetch_all("core/items", "items", &[("sort".into(), "dc.title".into())])
            .await
            .unwrap();

        let pages: Vec<String> = mock
            .gets()
            .iter()
            .filter_map(|(_, params)| {
                params
                    .iter()
                    .find(|(k, _)| k == "page")
                    .map(|(_, v)| v.clone())
            })
            .collect();
        assert_eq!(pages, ["0", "1", "2"]);
        assert!(mock.gets()[0]
            .1
            .contains(&("sort".to_string(), "dc.title".to_string())));
    }

    #[tokio::test]
    async fn failing_page_aborts() {
        let mock = MockTransport::new().fail_on(FailOn::Page(2));
        mock.add_collection("core/items", "items", numbered(5));
        let config = Config::default().with_page_size(2).with_workers(2);

        let result = PagedFetcher::new(&mock, &config)
            .fetch_all("core/items", "items", &[])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let mock = MockTransport::new();
        let config = Config::default();
        let result = PagedFetcher::new(&mock, &config)
            .fetch_all("core/items", "items", &[])
            .await;
        assert!(matches!(result, Err(RestError::NotFound { .. })));
    }
}
