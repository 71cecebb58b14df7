use notewriter_http::{FetchOpts, HttpClient, HttpError, RequestOpts};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_json_retries_on_503_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(1);
    let got: Value = client
        .get_json("/v1/items", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn api_error_carries_x_detail_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/notes"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"detail": "You already created a note for this post"}]
        })))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json_opts::<_, Value>(
            "/2/notes",
            &json!({"post_id": "1"}),
            RequestOpts {
                auth: Some(notewriter_http::Auth::Bearer("tok")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 400);
            assert!(message.contains("already created a note"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn query_auth_is_sent_as_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let _: Value = client
        .get_json(
            "/models",
            RequestOpts {
                auth: Some(notewriter_http::Auth::Query {
                    name: "key",
                    value: "secret".into(),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_page_returns_not_found_without_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let page = client
        .fetch_page(&format!("{}/gone", server.uri()), &FetchOpts::default())
        .await
        .unwrap();
    assert_eq!(page.status, 404);
    assert!(!page.is_success());
    assert_eq!(page.body, "not here");
}

#[tokio::test]
async fn fetch_page_caps_body_size() {
    let server = MockServer::start().await;
    let big = "a".repeat(10_000);
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_string(big))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let opts = FetchOpts {
        max_bytes: 1024,
        ..FetchOpts::default()
    };
    let page = client
        .fetch_page(&format!("{}/big", server.uri()), &opts)
        .await
        .unwrap();
    assert!(page.is_success());
    assert!(page.truncated);
    assert_eq!(page.body.len(), 1024);
}

#[tokio::test]
async fn fetch_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let opts = FetchOpts {
        timeout: Duration::from_millis(100),
        ..FetchOpts::default()
    };
    let err = client
        .fetch_page(&format!("{}/slow", server.uri()), &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn get_bytes_maps_non_success_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_bytes(
            &format!("{}/img.png", server.uri()),
            RequestOpts {
                allow_absolute: true,
                retries: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
}
