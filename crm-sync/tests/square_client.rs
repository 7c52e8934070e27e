use crm_sync::square::SquareClient;
use crm_sync_core::config::{SquareConfig, DEFAULT_SQUARE_VERSION};
use crm_sync_core::contract::{Resource, SourceApi};
use crm_sync_core::error::FetchError;
use crm_sync_core::fetch::fetch_all;
use crm_sync_core::models::Payment;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

struct NoCursor;

impl Match for NoCursor {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(k, _)| k == "cursor")
    }
}

fn client_for(server: &MockServer) -> SquareClient {
    let config = SquareConfig {
        base_url: format!("{}/v2", server.uri()),
        access_token: "sq-token".into(),
        ..SquareConfig::default()
    };
    SquareClient::new(&config).expect("client builds")
}

#[tokio::test]
async fn sends_auth_version_and_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/payments"))
        .and(header("authorization", "Bearer sq-token"))
        .and(header("Square-Version", DEFAULT_SQUARE_VERSION))
        .and(header("content-type", "application/json"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"payments": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let params = vec![("limit".to_string(), "100".to_string())];
    let body = client.get_page(Resource::Payments, &params).await.unwrap();
    assert_eq!(body, json!({"payments": []}));
}

#[tokio::test]
async fn follows_cursor_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/payments"))
        .and(NoCursor)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payments": [{"id": "P1", "customer_id": "C1", "status": "COMPLETED"}],
            "cursor": "opaque/+cursor=="
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/payments"))
        .and(query_param("cursor", "opaque/+cursor=="))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payments": [{"id": "P2", "customer_id": "C2", "status": "FAILED"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let params = vec![("limit".to_string(), "100".to_string())];
    let payments: Vec<Payment> = fetch_all(&client, Resource::Payments, &params)
        .await
        .unwrap();
    let ids: Vec<&str> = payments.iter().filter_map(|p| p.id.as_deref()).collect();
    assert_eq!(ids, ["P1", "P2"]);
    assert!(payments[0].is_completed());
    assert!(!payments[1].is_completed());
}

#[tokio::test]
async fn error_status_carries_code_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/customers"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"errors":[{"code":"UNAUTHORIZED"}]}"#))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_page(Resource::Customers, &[]).await.unwrap_err();
    match err {
        FetchError::Status {
            resource,
            status,
            body,
        } => {
            assert_eq!(resource, Resource::Customers);
            assert_eq!(status, 401);
            assert!(body.contains("UNAUTHORIZED"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

/// Server that promises a longer body than it sends, then hangs up.
async fn truncating_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"customers\": [")
            .await;
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/v2")
}

#[tokio::test]
async fn truncated_body_is_a_transport_error() {
    let config = SquareConfig {
        base_url: truncating_server().await,
        access_token: "sq-token".into(),
        ..SquareConfig::default()
    };
    let client = SquareClient::new(&config).unwrap();
    let err = client.get_page(Resource::Customers, &[]).await.unwrap_err();
    assert!(
        matches!(err, FetchError::Transport { resource: Resource::Customers, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn invalid_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_page(Resource::Bookings, &[]).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }), "got {err:?}");
}
