//! REST client tests against a local HTTP server.
//!
//! Covers request priming, anti-forgery token echo, the single retry on a
//! refused request, paging order under concurrency, and login.

use std::time::Duration;

use metasync::core::config::Config;
use metasync::core::metadata::MetaValue;
use metasync::core::ops::Position;
use metasync::core::types::Tag;
use metasync::rest::session::{TOKEN_REQUEST_HEADER, TOKEN_RESPONSE_HEADER};
use metasync::rest::{PagedFetcher, PatchTranslator, RestClient, RestError, Transport};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const ITEM: &str = "/server/api/core/items/7d3c5f3a-1a2b-4c5d-8e9f-0a1b2c3d4e5f";
const ITEM_PATH: &str = "core/items/7d3c5f3a-1a2b-4c5d-8e9f-0a1b2c3d4e5f";

/// Matches requests that carry a body, i.e. real requests, not primers.
struct HasBody;

impl Match for HasBody {
    fn matches(&self, request: &Request) -> bool {
        !request.body.is_empty()
    }
}

fn config(server: &MockServer) -> Config {
    Config::default().with_api_endpoint(format!("{}/server/api", server.uri()))
}

fn title_patch() -> Vec<metasync::rest::PatchDescriptor> {
    let tag = Tag::new("dc.title").unwrap();
    PatchTranslator::add_values(&tag, &[MetaValue::new("Hello")], Position::End).unwrap()
}

fn item_doc() -> Value {
    json!({
        "uuid": "7d3c5f3a-1a2b-4c5d-8e9f-0a1b2c3d4e5f",
        "type": "item",
        "metadata": {"dc.title": [{"value": "Hello"}]}
    })
}

fn with_token(template: ResponseTemplate, token: &str) -> ResponseTemplate {
    template.insert_header(TOKEN_RESPONSE_HEADER, token)
}

async fn real_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !r.body.is_empty())
        .collect()
}

mod priming {
    use super::*;

    #[tokio::test]
    async fn primed_token_is_echoed() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(ITEM))
            .respond_with(with_token(
                ResponseTemplate::new(200).set_body_json(item_doc()),
                "token-1",
            ))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        let doc = client.patch(ITEM_PATH, &title_patch()).await.unwrap();
        assert_eq!(doc.unwrap()["type"], "item");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].body.is_empty(), "first request primes");

        let real = &requests[1];
        assert_eq!(
            real.headers.get(TOKEN_REQUEST_HEADER).unwrap(),
            "token-1"
        );
        assert_eq!(
            real.headers.get("cookie").unwrap(),
            "DSPACE-XSRF-COOKIE=token-1"
        );
        let body: Value = serde_json::from_slice(&real.body).unwrap();
        assert_eq!(body[0]["op"], "add");
        assert_eq!(body[0]["path"], "/metadata/dc.title/-");
    }

    #[tokio::test]
    async fn primer_status_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(HasBody)
            .respond_with(ResponseTemplate::new(200).set_body_json(item_doc()))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(with_token(ResponseTemplate::new(422), "token-1"))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        assert!(client.patch(ITEM_PATH, &title_patch()).await.is_ok());
        assert_eq!(client.session().token().as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn refused_request_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(HasBody)
            .respond_with(ResponseTemplate::new(403))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(with_token(
                ResponseTemplate::new(200).set_body_json(item_doc()),
                "token-2",
            ))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        assert!(client.patch(ITEM_PATH, &title_patch()).await.is_ok());

        // primer, refused, primer, accepted
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
        assert_eq!(real_requests(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn second_refusal_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(HasBody)
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden"})))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(with_token(ResponseTemplate::new(200), "token-3"))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        let err = client.patch(ITEM_PATH, &title_patch()).await.unwrap_err();
        assert!(matches!(err, RestError::AuthFailed { ref message, .. } if message == "Forbidden"));
        assert_eq!(real_requests(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn delete_without_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(ITEM))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        client.delete(ITEM_PATH).await.unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        let err = client.get(ITEM_PATH, &[]).await.unwrap_err();
        assert!(matches!(err, RestError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "Unprocessable index"})),
            )
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        let err = client.patch(ITEM_PATH, &title_patch()).await.unwrap_err();
        match err {
            RestError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 422);
                assert_eq!(message, "Unprocessable index");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_absorbs_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ITEM))
            .respond_with(with_token(
                ResponseTemplate::new(200).set_body_json(item_doc()),
                "from-get",
            ))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        client.get(ITEM_PATH, &[]).await.unwrap();
        assert_eq!(client.session().token().as_deref(), Some("from-get"));
    }
}

mod paging {
    use super::*;

    fn page_body(number: usize, items: std::ops::Range<usize>) -> Value {
        json!({
            "_embedded": {"items": items.map(|n| json!({"n": n})).collect::<Vec<_>>()},
            "page": {"size": 20, "totalElements": 47, "totalPages": 3, "number": number}
        })
    }

    async fn collection_server() -> MockServer {
        let server = MockServer::start().await;
        // Later pages answer first so completion order differs from page order
        let pages = [(0, 0..20, 0), (1, 20..40, 150), (2, 40..47, 10)];
        for (number, items, delay) in pages {
            Mock::given(method("GET"))
                .and(path("/server/api/core/items"))
                .and(query_param("page", number.to_string()))
                .and(query_param("size", "20"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(page_body(number, items))
                        .set_delay(Duration::from_millis(delay)),
                )
                .mount(&server)
                .await;
        }
        server
    }

    #[tokio::test]
    async fn order_is_independent_of_workers() {
        let server = collection_server().await;
        let expected: Vec<Value> = (0..47).map(|n| json!({"n": n})).collect();

        for workers in [0, 1, 4] {
            let config = config(&server).with_page_size(20).with_workers(workers);
            let client = RestClient::new(&config).unwrap();
            let items = PagedFetcher::new(&client, &config)
                .fetch_all("core/items", "items", &[])
                .await
                .unwrap();
            assert_eq!(items, expected, "workers = {}", workers);
        }
    }

    #[tokio::test]
    async fn concurrent_pages_refresh_token_consistently() {
        let server = MockServer::start().await;
        let pages = [(0, 0..20, 0), (1, 20..40, 80), (2, 40..47, 20)];
        for (number, items, delay) in pages {
            Mock::given(method("GET"))
                .and(path("/server/api/core/items"))
                .and(query_param("page", number.to_string()))
                .respond_with(with_token(
                    ResponseTemplate::new(200)
                        .set_body_json(page_body(number, items))
                        .set_delay(Duration::from_millis(delay)),
                    &format!("page-{}", number),
                ))
                .mount(&server)
                .await;
        }

        let config = config(&server).with_page_size(20).with_workers(4);
        let client = RestClient::new(&config).unwrap();
        let items = PagedFetcher::new(&client, &config)
            .fetch_all("core/items", "items", &[])
            .await
            .unwrap();
        assert_eq!(items.len(), 47);

        let served = ["page-0", "page-1", "page-2"];
        let last = client.session().token().unwrap();
        assert!(served.contains(&last.as_str()), "unexpected token {}", last);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        for request in &requests[1..] {
            let token = request
                .headers
                .get(TOKEN_REQUEST_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap();
            assert!(served.contains(&token));
            let cookie = request.headers.get("cookie").unwrap().to_str().unwrap();
            assert_eq!(cookie, format!("DSPACE-XSRF-COOKIE={}", token));
        }
    }

    #[tokio::test]
    async fn missing_key_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_embedded": {"collections": []},
                "page": {"totalPages": 1, "number": 0}
            })))
            .mount(&server)
            .await;

        let config = config(&server);
        let client = RestClient::new(&config).unwrap();
        let err = PagedFetcher::new(&client, &config)
            .fetch_all("core/items", "items", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RestError::Malformed { .. }));
    }
}

mod session {
    use super::*;

    fn root() -> Value {
        json!({
            "dspaceUI": "https://demo.example.org",
            "dspaceName": "Demo Repository",
            "dspaceServer": "https://demo.example.org/server",
            "dspaceVersion": "DSpace 7.6",
            "type": "root"
        })
    }

    #[tokio::test]
    async fn endpoint_info_describes_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/server/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(root()))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        let info = client.endpoint_info().await.unwrap();
        assert_eq!(info.name, "Demo Repository");
        assert_eq!(info.version, "DSpace 7.6");
    }

    #[tokio::test]
    async fn endpoint_info_rejects_other_documents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hello": "world"})))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        assert!(matches!(
            client.endpoint_info().await,
            Err(RestError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn login_stores_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/server/api/authn/login"))
            .respond_with(with_token(
                ResponseTemplate::new(200).insert_header("Authorization", "Bearer abc"),
                "token-login",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/server/api/authn/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "okay": true,
                "authenticated": true,
                "type": "status"
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        client.login("admin@example.org", "secret").await.unwrap();
        assert!(client.session().is_authenticated());

        let requests = server.received_requests().await.unwrap();
        let login = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && !r.body.is_empty())
            .unwrap();
        let form = String::from_utf8(login.body.clone()).unwrap();
        assert!(form.contains("user=admin%40example.org"));

        let status = requests.last().unwrap();
        assert_eq!(status.headers.get("authorization").unwrap(), "Bearer abc");
    }

    #[tokio::test]
    async fn rejected_login_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/server/api/authn/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authenticated": false})))
            .mount(&server)
            .await;

        let client = RestClient::new(&config(&server)).unwrap();
        assert!(matches!(
            client.login("admin@example.org", "wrong").await,
            Err(RestError::AuthFailed { .. })
        ));
    }
}
