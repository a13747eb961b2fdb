use std::time::Duration;

use serde_json::{Value, json};
use veracity_http::{HttpClient, HttpError, RequestOpts};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(2);
    let got: Value = client.get_json("/v1/items", RequestOpts::default()).await.unwrap();
    assert_eq!(got["ok"], json!(true));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(3);
    let err = client
        .post_json::<_, Value>("/v1/responses", Some("sk-test"), &json!({"input": "hi"}))
        .await
        .unwrap_err();
    match err {
        HttpError::Api { status, message, .. } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "bad key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_exposes_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(0);
    let err = client
        .get_json::<Value>("/limited", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Api { retry_after: Some(7), .. }));
}

#[tokio::test]
async fn slow_responses_become_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let opts = RequestOpts {
        timeout: Some(Duration::from_millis(50)),
        retries: Some(0),
        ..Default::default()
    };
    let err = client.get_text("/slow", opts).await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)));
}

#[tokio::test]
async fn get_text_returns_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Hi</title>"))
        .mount(&server)
        .await;

    let client = HttpClient::new("https://unused.invalid").unwrap();
    let opts = RequestOpts {
        allow_absolute: true,
        ..Default::default()
    };
    let body = client
        .get_text(&format!("{}/page", server.uri()), opts)
        .await
        .unwrap();
    assert_eq!(body, "<title>Hi</title>");
}
