/// Integration tests with a mocked Google token endpoint and Sheets API
/// Tests the complete append workflow without hitting real external services
use lead_relay_api::config::Config;
use lead_relay_api::credentials::{
    load_service_account, ServiceAccountAuthority, SPREADSHEETS_SCOPE,
};
use lead_relay_api::errors::AppError;
use lead_relay_api::models::{LeadRecord, NOT_PROVIDED, SHEET_HEADERS};
use lead_relay_api::sheets::{GoogleSheetsSink, LeadSink};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_service_account.pem");
const APPEND_PATH: &str = "/v4/spreadsheets/sheet-123/values/Leads!A1:append";
const HEADER_PATH: &str = "/v4/spreadsheets/sheet-123/values/Leads!A1:J1";

fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "bunny-honey",
        "private_key_id": "key-1",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "leads@bunny-honey.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri
    })
    .to_string()
}

/// Helper function to create test config
fn create_test_config(server_uri: &str) -> Config {
    Config {
        port: 3001,
        allowed_origins: vec![],
        google_service_account_json: service_account_json(&format!("{}/token", server_uri)),
        spreadsheet_id: "sheet-123".to_string(),
        vertex_api_key: "test_key".to_string(),
        gemini_model: "gemini-2.5-flash".to_string(),
        vertex_base_url: server_uri.to_string(),
        sheets_base_url: server_uri.to_string(),
        system_instruction_path: None,
        rate_limit_max: 100,
        rate_limit_window_secs: 900,
        body_limit_bytes: 10 * 1024,
        verify_sheet_header: false,
    }
}

fn create_sink(config: &Config) -> GoogleSheetsSink {
    let key =
        load_service_account(Some(config.google_service_account_json.as_str())).unwrap();
    let authority = Arc::new(ServiceAccountAuthority::new(&key, SPREADSHEETS_SCOPE).unwrap());
    GoogleSheetsSink::new(config, authority).unwrap()
}

async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.test-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn append_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|req| req.url.path().ends_with(":append"))
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_append_lead_writes_one_row() {
    let mock_server = MockServer::start().await;
    mount_token_endpoint(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .and(header("authorization", "Bearer ya29.test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "spreadsheetId": "sheet-123",
            "updates": {"updatedRows": 1}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = create_sink(&config);

    let lead_json = json!({
        "name": "John Doe",
        "email": "test@example.com",
        "phone": "Not provided",
        "interest": "AI Websites",
        "budget": "",
        "customerType": "b2b",
        "usecase": "Not provided",
        "otherInfo": "Wants a demo",
        "company": "Acme"
    });
    let lead = LeadRecord::from_value(lead_json.clone()).unwrap();

    sink.append_lead(&lead).await.unwrap();

    let bodies = append_bodies(&mock_server).await;
    assert_eq!(bodies.len(), 1);

    let rows = bodies[0]["values"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let row: Vec<&str> = rows[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();

    assert_eq!(row.len(), SHEET_HEADERS.len());
    assert!(row[0].ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(row[0]).is_ok());
    assert_eq!(
        &row[1..9],
        &[
            "John Doe",
            "test@example.com",
            "Acme",
            NOT_PROVIDED,
            "Not provided",
            "AI Websites",
            NOT_PROVIDED,
            "Wants a demo",
        ]
    );
    let raw: Value = serde_json::from_str(row[9]).unwrap();
    assert_eq!(raw, lead_json);
}

#[tokio::test]
async fn test_access_token_reused_across_appends() {
    let mock_server = MockServer::start().await;
    mount_token_endpoint(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = Arc::new(create_sink(&config));

    let first = LeadRecord::from_value(json!({"email": "one@example.com"})).unwrap();
    let second = LeadRecord::from_value(json!({"email": "two@example.com"})).unwrap();

    let (a, b) = tokio::join!(sink.append_lead(&first), sink.append_lead(&second));
    assert!(a.is_ok());
    assert!(b.is_ok());

    let bodies = append_bodies(&mock_server).await;
    let mut emails: Vec<String> = bodies
        .iter()
        .map(|body| body["values"][0][2].as_str().unwrap().to_string())
        .collect();
    emails.sort();
    assert_eq!(emails, vec!["one@example.com", "two@example.com"]);
}

#[tokio::test]
async fn test_append_failure_is_generic_persistence_error() {
    let mock_server = MockServer::start().await;
    mount_token_endpoint(&mock_server, 1).await;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "status": "PERMISSION_DENIED",
                      "message": "The caller does not have permission"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = create_sink(&config);
    let lead = LeadRecord::from_value(json!({"email": "test@example.com"})).unwrap();

    match sink.append_lead(&lead).await {
        Err(AppError::Persistence(msg)) => {
            assert_eq!(msg, "Failed to append row to Google Sheet.");
            assert!(!msg.contains("PERMISSION_DENIED"));
        }
        other => panic!("Expected persistence error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_failure_skips_append() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(APPEND_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = create_sink(&config);
    let lead = LeadRecord::from_value(json!({"email": "test@example.com"})).unwrap();

    assert!(matches!(
        sink.append_lead(&lead).await,
        Err(AppError::Persistence(_))
    ));
}

#[tokio::test]
async fn test_empty_spreadsheet_id_is_configuration_error() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config(&mock_server.uri());
    config.spreadsheet_id = String::new();

    let key =
        load_service_account(Some(config.google_service_account_json.as_str())).unwrap();
    let authority = Arc::new(ServiceAccountAuthority::new(&key, SPREADSHEETS_SCOPE).unwrap());

    assert!(matches!(
        GoogleSheetsSink::new(&config, authority),
        Err(AppError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_verify_header_accepts_expected_row() {
    let mock_server = MockServer::start().await;
    mount_token_endpoint(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path(HEADER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Leads!A1:J1",
            "majorDimension": "ROWS",
            "values": [SHEET_HEADERS]
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = create_sink(&config);
    assert!(sink.verify_header().await.is_ok());
}

#[tokio::test]
async fn test_verify_header_rejects_drifted_row() {
    let mock_server = MockServer::start().await;
    mount_token_endpoint(&mock_server, 1).await;

    Mock::given(method("GET"))
        .and(path(HEADER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Leads!A1:J1",
            "majorDimension": "ROWS",
            "values": [["timestamp", "email", "name"]]
        })))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri());
    let sink = create_sink(&config);
    assert!(matches!(
        sink.verify_header().await,
        Err(AppError::Configuration(_))
    ));
}
