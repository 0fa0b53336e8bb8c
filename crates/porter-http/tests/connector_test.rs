//! Connector behaviour against a live mock server.

mod common;

use common::{connector, unused_url, TestHttpServer};
use porter_common_config::ConfigLoader;
use porter_http::{Connector, ErrorCategory, RequestDescriptor, TransferOptions};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_fetch_ok() {
    let server = TestHttpServer::start().await;
    server.respond("/hello", 200, "hi").await;

    let response = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(server.url_for("/hello")))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.reason_phrase(), "OK");
    assert_eq!(response.text(), "hi");
    assert_eq!(response.to_string(), "hi");
    assert!(response.previous().is_none());
    assert_eq!(response.redirect_count(), 0);
}

#[tokio::test]
async fn test_fetch_sends_headers_and_body() {
    let server = TestHttpServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(server.inner())
        .await;

    let source = RequestDescriptor::new(server.url_for("/items"))
        .with_method("PUT")
        .with_header("X-Api-Key", "secret")
        .with_body("payload");

    let response = connector(TransferOptions::default()).fetch(&source).await.unwrap();
    assert_eq!(response.status_code(), 201);

    let received = server.received_at("/items").await;
    assert_eq!(received[0].body, b"payload");
}

#[tokio::test]
async fn test_redirect_chain_is_reported() {
    let server = TestHttpServer::start().await;
    server.redirect("/old", 302, "/new").await;
    server.respond("/new", 200, "moved").await;

    let old_url = server.url_for("/old");
    let response = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(&old_url))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "moved");
    assert_eq!(response.redirect_count(), 1);

    let previous = response.previous().unwrap();
    assert_eq!(previous.status_code(), 302);
    assert!(previous.previous().is_none());
    assert_eq!(previous.header("location"), ["/new".to_string()]);

    let received = server.received_at("/new").await;
    assert_eq!(received[0].headers.get("referer").unwrap(), old_url.as_str());
}

#[tokio::test]
async fn test_redirects_disabled_returns_redirect_response() {
    let server = TestHttpServer::start().await;
    server.redirect("/old", 302, "/new").await;
    server.respond("/new", 200, "moved").await;

    let options = TransferOptions::builder().max_redirects(0).build();
    let response = connector(options)
        .fetch(&RequestDescriptor::new(server.url_for("/old")))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 302);
    assert!(response.previous().is_none());
    assert!(server.received_at("/new").await.is_empty());
}

#[tokio::test]
async fn test_too_many_redirects_is_fatal() {
    let server = TestHttpServer::start().await;
    server.redirect("/loop", 302, "/loop").await;

    let options = TransferOptions::builder().max_redirects(2).build();
    let err = connector(options)
        .fetch(&RequestDescriptor::new(server.url_for("/loop")))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::TooManyRedirects);
    assert_eq!(server.received_at("/loop").await.len(), 3);
}

#[tokio::test]
async fn test_see_other_switches_to_get() {
    let server = TestHttpServer::start().await;
    server
        .route(
            "POST",
            "/submit",
            ResponseTemplate::new(303).insert_header("Location", "/result"),
        )
        .await;
    server
        .route("GET", "/result", ResponseTemplate::new(200).set_body_string("done"))
        .await;

    let source = RequestDescriptor::new(server.url_for("/submit"))
        .with_method("POST")
        .with_header("Content-Type", "text/plain")
        .with_body("form");

    let response = connector(TransferOptions::default()).fetch(&source).await.unwrap();
    assert_eq!(response.text(), "done");

    let received = server.received_at("/result").await;
    assert_eq!(received[0].method.as_str(), "GET");
    assert!(received[0].body.is_empty());
    assert!(received[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn test_error_status_is_fatal_with_response() {
    let server = TestHttpServer::start().await;
    server.respond("/missing", 404, "foo").await;

    let err = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(server.url_for("/missing")))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::ServerStatusError);
    assert_eq!(
        err.to_string(),
        "HTTP server responded with error: 404 \"Not Found\".\n\nfoo"
    );
    assert_eq!(err.response().unwrap().status_code(), 404);
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let server = TestHttpServer::start().await;
    server.respond("/boom", 503, "down").await;

    let err = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(server.url_for("/boom")))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::ServerStatusError);
}

#[tokio::test]
async fn test_error_status_returned_when_enabled() {
    let server = TestHttpServer::start().await;
    server.respond("/missing", 404, "foo").await;

    let options = TransferOptions::builder().return_error_responses(true).build();
    let response = connector(options)
        .fetch(&RequestDescriptor::new(server.url_for("/missing")))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 404);
    assert_eq!(response.text(), "foo");
}

#[tokio::test]
async fn test_connection_refused_is_retryable() {
    let err = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(unused_url()))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::ConnectionFailure);
}

#[tokio::test]
async fn test_transfer_timeout_is_retryable() {
    let server = TestHttpServer::start().await;
    server.with_latency("/slow", Duration::from_secs(5)).await;

    let options = TransferOptions::builder()
        .transfer_timeout(Duration::from_millis(100))
        .build();
    let err = connector(options)
        .fetch(&RequestDescriptor::new(server.url_for("/slow")))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::ConnectionFailure);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_invalid_url_is_fatal() {
    let err = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new("not a url"))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::InvalidRequest);
}

#[tokio::test]
async fn test_body_limit_is_fatal() {
    let server = TestHttpServer::start().await;
    server.respond("/large", 200, &"x".repeat(100)).await;

    let options = TransferOptions::builder().max_body_length(10).build();
    let connector = connector(options);

    let err = connector
        .fetch(&RequestDescriptor::new(server.url_for("/large")))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.category(), ErrorCategory::MalformedResponse);

    let source = RequestDescriptor::new(server.url_for("/large")).with_max_body_length(1000);
    let response = connector.fetch(&source).await.unwrap();
    assert_eq!(response.body().len(), 100);
}

#[tokio::test]
async fn test_cookies_persist_across_fetches() {
    let server = TestHttpServer::start().await;
    server
        .route(
            "GET",
            "/login",
            ResponseTemplate::new(200).insert_header("Set-Cookie", "session=abc; Path=/"),
        )
        .await;
    Mock::given(path("/account"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(server.inner())
        .await;
    server.respond("/account", 401, "who are you").await;

    let connector = connector(TransferOptions::default());
    connector
        .fetch(&RequestDescriptor::new(server.url_for("/login")))
        .await
        .unwrap();
    assert_eq!(
        connector
            .cookie_jar()
            .get(&Url::parse(&server.url_for("/")).unwrap(), "session")
            .as_deref(),
        Some("abc")
    );

    let response = connector
        .fetch(&RequestDescriptor::new(server.url_for("/account")))
        .await
        .unwrap();
    assert_eq!(response.text(), "welcome");
}

#[tokio::test]
async fn test_clone_has_independent_cookies() {
    let server = TestHttpServer::start().await;
    server
        .route(
            "GET",
            "/login",
            ResponseTemplate::new(200).insert_header("Set-Cookie", "session=abc"),
        )
        .await;

    let original = connector(TransferOptions::default());
    let copy = original.clone();
    copy.fetch(&RequestDescriptor::new(server.url_for("/login")))
        .await
        .unwrap();

    assert_eq!(copy.cookie_jar().len(), 1);
    assert!(original.cookie_jar().is_empty());
}

#[tokio::test]
async fn test_connector_from_config_file() {
    let server = TestHttpServer::start().await;
    server.redirect("/a", 302, "/b").await;
    server.respond("/b", 200, "b").await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.yaml");
    std::fs::write(&file, "http:\n  max_redirects: 0\n  user_agent: porter-test\n").unwrap();

    let config = ConfigLoader::from_file(&file).load().unwrap();
    let connector = Connector::from_config(&config).unwrap();
    assert_eq!(connector.options().max_redirects(), 0);

    let response = connector
        .fetch(&RequestDescriptor::new(server.url_for("/a")))
        .await
        .unwrap();
    assert_eq!(response.status_code(), 302);

    let received = server.received_at("/a").await;
    assert_eq!(received[0].headers.get("user-agent").unwrap(), "porter-test");
}

#[tokio::test]
async fn test_caller_cookie_merged_with_jar() {
    let server = TestHttpServer::start().await;
    server
        .route(
            "GET",
            "/login",
            ResponseTemplate::new(200).insert_header("Set-Cookie", "session=abc"),
        )
        .await;
    server.respond("/account", 200, "ok").await;

    let connector = connector(TransferOptions::default());
    connector
        .fetch(&RequestDescriptor::new(server.url_for("/login")))
        .await
        .unwrap();
    connector
        .fetch(&RequestDescriptor::new(server.url_for("/account")).with_header("Cookie", "a=1"))
        .await
        .unwrap();

    let received = server.received_at("/account").await;
    let cookies: Vec<_> = received[0].headers.get_all("cookie").iter().collect();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0], "a=1; session=abc");
}

#[tokio::test]
async fn test_zero_body_limit_disables_connector_limit() {
    let server = TestHttpServer::start().await;
    server.respond("/large", 200, &"x".repeat(100)).await;

    let connector = connector(TransferOptions::builder().max_body_length(10).build());
    let source = RequestDescriptor::new(server.url_for("/large")).with_max_body_length(0);

    let response = connector.fetch(&source).await.unwrap();
    assert_eq!(response.body().len(), 100);
}

#[tokio::test]
async fn test_non_standard_status_has_empty_reason() {
    let server = TestHttpServer::start().await;
    server.respond("/odd", 599, "odd").await;

    let err = connector(TransferOptions::default())
        .fetch(&RequestDescriptor::new(server.url_for("/odd")))
        .await
        .unwrap_err();

    assert_eq!(err.response().unwrap().reason_phrase(), "");
    assert_eq!(err.to_string(), "HTTP server responded with error: 599 \"\".\n\nodd");
}
