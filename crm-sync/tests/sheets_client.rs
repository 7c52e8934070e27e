use crm_sync::sheets::SheetsClient;
use crm_sync_core::config::SheetConfig;
use crm_sync_core::contract::{AccessToken, MockTokenProvider};
use crm_sync_core::error::DestinationError;
use crm_sync_core::models::{Customer, COLUMNS};
use crm_sync_core::synchronise::sync;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET: &str = "/v4/spreadsheets/sheet-1";

fn client_for(server: &MockServer) -> SheetsClient {
    let config = SheetConfig {
        sheet_id: "sheet-1".into(),
        base_url: format!("{}/v4/spreadsheets", server.uri()),
        ..SheetConfig::default()
    };
    let mut tokens = MockTokenProvider::new();
    tokens
        .expect_get_token()
        .returning(|| Ok(AccessToken::new("sheets-token")));
    SheetsClient::new(&config, Box::new(tokens)).expect("client builds")
}

async fn mount_tabs(server: &MockServer, titles: &[&str]) {
    let sheets: Vec<Value> = titles
        .iter()
        .map(|t| json!({"properties": {"title": t}}))
        .collect();
    Mock::given(method("GET"))
        .and(path(SHEET))
        .and(query_param("fields", "sheets.properties.title"))
        .and(header("authorization", "Bearer sheets-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sheets": sheets })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_replace_reads_clears_then_writes_raw() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Customers", "Archive"]).await;
    Mock::given(method("GET"))
        .and(path(format!("{SHEET}/values/'Customers'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Customers!A1:I3",
            "values": [["id"], ["OLD1"], ["OLD2", 42]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{SHEET}/values/'Customers':clear")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{SHEET}/values/'Customers'!A1")))
        .and(query_param("valueInputOption", "RAW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedRows": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let mut ada = Customer::new("C1");
    ada.given_name = Some("Ada".into());
    ada.last_booked_date = "2025-06-05T00:00:00Z".into();

    let client = client_for(&server);
    let report = sync(&client, 0, &[ada], &COLUMNS).await.unwrap();
    assert_eq!(report.tab_name, "Customers");
    assert_eq!(report.rows_replaced, 3);
    assert_eq!(report.rows_written, 1);

    let requests = server.received_requests().await.unwrap();
    let methods: Vec<String> = requests.iter().map(|r| r.method.to_string()).collect();
    assert_eq!(methods, ["GET", "GET", "POST", "PUT"]);

    let put: Value = serde_json::from_slice(&requests[3].body).unwrap();
    assert_eq!(put["majorDimension"], "ROWS");
    assert_eq!(put["values"][0][0], "id");
    assert_eq!(put["values"][0][8], "last_booked_date");
    assert_eq!(put["values"][1][0], "C1");
    assert_eq!(put["values"][1][1], "Ada");
    assert_eq!(put["values"][1][2], "");
    assert_eq!(put["values"][1][8], "2025-06-05T00:00:00Z");
}

#[tokio::test]
async fn tab_index_out_of_range_touches_nothing() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Customers"]).await;

    let client = client_for(&server);
    let err = sync(&client, 3, &[Customer::new("C1")], &COLUMNS)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DestinationError::TabOutOfRange { index: 3, count: 1 }),
        "got {err:?}"
    );
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn rejected_clear_stops_before_write() {
    let server = MockServer::start().await;
    mount_tabs(&server, &["Customers"]).await;
    Mock::given(method("GET"))
        .and(path(format!("{SHEET}/values/'Customers'")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "Customers!A1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{SHEET}/values/'Customers':clear")))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = sync(&client, 0, &[Customer::new("C1")], &COLUMNS)
        .await
        .unwrap_err();
    match err {
        DestinationError::Api { status, body } => {
            assert_eq!(status, 403);
            assert!(body.contains("PERMISSION_DENIED"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}
