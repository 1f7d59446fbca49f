//! Typed GET/POST helpers against a mock server

use crate::support::test_config;
use dredge::{combine_url, Client, DredgeError, RequestContext};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Method, StatusCode};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u32,
    name: String,
}

#[derive(Serialize)]
struct Search<'a> {
    term: &'a str,
    limit: u32,
}

#[tokio::test]
async fn test_default_headers_applied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", "dredge-test/1.0"))
        .and(header("accept", "*/*"))
        .and(header("cache-control", "max-age=0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let body = client
        .get(&RequestContext::new(), &server.uri(), &[], HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn test_caller_headers_take_precedence() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", "custom-agent/2.0"))
        .and(header("accept", "application/xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("custom-agent/2.0"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/xml"));

    let client = Client::new(test_config(1)).unwrap();
    client
        .get(&RequestContext::new(), &server.uri(), &[], headers)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_merges_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .and(query_param("q", "oak desk"))
        .respond_with(ResponseTemplate::new(200).set_body_string("results"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let body = client
        .get(
            &RequestContext::new(),
            &format!("{}/search?page=2", server.uri()),
            &[("q", "oak desk")],
            HeaderMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(body, b"results");
}

#[tokio::test]
async fn test_get_json_marks_ajax_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/items/7"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Lamp"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let url = combine_url(&server.uri(), "/api/items/7", &[]).unwrap();

    let item: Item = client
        .get_json(&RequestContext::new(), url.as_str(), &[], HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(
        item,
        Item {
            id: 7,
            name: "Lamp".to_string()
        }
    );
}

#[tokio::test]
async fn test_decode_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(5)).unwrap();
    let result: Result<Item, _> = client
        .get_json(&RequestContext::new(), &server.uri(), &[], HeaderMap::new())
        .await;

    assert!(matches!(result, Err(DredgeError::Decode(_))));
    assert_eq!(client.requests_sent(), 1);
}

#[tokio::test]
async fn test_get_document() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><body>
                    <ul><li class="item">Desk</li><li class="item">Lamp</li></ul>
                    </body></html>"#,
                    "text/html",
                ),
        )
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let document = client
        .get_document(
            &RequestContext::new(),
            &format!("{}/catalog", server.uri()),
            &[],
            HeaderMap::new(),
        )
        .await
        .unwrap();

    let selector = Selector::parse("li.item").unwrap();
    let names: Vec<String> = document
        .select(&selector)
        .map(|el| el.text().collect())
        .collect();
    assert_eq!(names, vec!["Desk", "Lamp"]);
}

#[tokio::test]
async fn test_get_file_derives_jpeg_extension() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for (route, content_type) in [("/a", "image/jpeg"), ("/b", "image/jpg")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![0xff, 0xd8, 0xff], content_type),
            )
            .mount(&server)
            .await;
    }

    let client = Client::new(test_config(1)).unwrap();
    let ctx = RequestContext::new();

    for (route, name) in [("/a", "first"), ("/b", "second")] {
        let saved = client
            .get_file(
                &ctx,
                &format!("{}{}", server.uri(), route),
                &[],
                HeaderMap::new(),
                dir.path().join(name),
            )
            .await
            .unwrap();

        assert!(saved.is_absolute());
        assert_eq!(saved, dir.path().join(format!("{}.jpeg", name)));
        assert_eq!(std::fs::read(&saved).unwrap(), vec![0xff, 0xd8, 0xff]);
    }
}

#[tokio::test]
async fn test_get_file_keeps_given_extension() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("a,b\n1,2\n", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let saved = client
        .get_file(
            &RequestContext::new(),
            &server.uri(),
            &[],
            HeaderMap::new(),
            dir.path().join("export.csv"),
        )
        .await
        .unwrap();

    assert_eq!(saved, dir.path().join("export.csv"));
}

#[tokio::test]
async fn test_get_file_unknown_content_type() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("???", "application/x-made-up"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(3)).unwrap();
    let result = client
        .get_file(
            &RequestContext::new(),
            &server.uri(),
            &[],
            HeaderMap::new(),
            dir.path().join("blob"),
        )
        .await;

    assert!(matches!(result, Err(DredgeError::UnknownExtension { .. })));
    assert!(!dir.path().join("blob").exists());
}

#[tokio::test]
async fn test_post_form() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=me&pass=s3cret+word"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let body = client
        .post_form(
            &RequestContext::new(),
            &format!("{}/login", server.uri()),
            &[("user", "me"), ("pass", "s3cret word")],
            HeaderMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(body, b"welcome");
}

#[tokio::test]
async fn test_post_body_resent_on_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string("payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(3)).unwrap();
    let body = client
        .post(
            &RequestContext::new(),
            &server.uri(),
            HeaderMap::new(),
            b"payload".to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(body, b"stored");
    assert_eq!(client.requests_sent(), 2);
}

#[tokio::test]
async fn test_post_json_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"term": "lamp", "limit": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "name": "Lamp"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let item: Item = client
        .post_json_json(
            &RequestContext::new(),
            &format!("{}/api/search", server.uri()),
            &Search {
                term: "lamp",
                limit: 1,
            },
            HeaderMap::new(),
        )
        .await
        .unwrap();

    assert_eq!(item.id, 3);
}

#[tokio::test]
async fn test_post_form_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string("id=5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Desk"})))
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let item: Item = client
        .post_form_json(&RequestContext::new(), &server.uri(), &[("id", "5")], HeaderMap::new())
        .await
        .unwrap();

    assert_eq!(item.name, "Desk");
}

#[tokio::test]
async fn test_execute_returns_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/items/9"))
        .and(body_string("name=Chair"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_raw("created", "text/plain; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let url = combine_url(&server.uri(), "items/9", &[]).unwrap();

    let exchange = client
        .execute(
            &RequestContext::new(),
            Method::PUT,
            url,
            HeaderMap::new(),
            b"name=Chair".to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(exchange.status(), StatusCode::CREATED);
    assert_eq!(exchange.content_type(), Some("text/plain; charset=utf-8"));
    assert_eq!(exchange.url().path(), "/items/9");
    assert_eq!(exchange.body, b"created");
}

#[tokio::test]
async fn test_external_ip_info() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/country_code"))
        .respond_with(ResponseTemplate::new(200).set_body_string("NL\n"))
        .mount(&server)
        .await;

    let client = Client::new(test_config(1)).unwrap();
    let info = client
        .external_ip_info(&RequestContext::new(), &format!("{}/", server.uri()))
        .await
        .unwrap();

    assert_eq!(info, "address: 203.0.113.7, region: NL");
}
