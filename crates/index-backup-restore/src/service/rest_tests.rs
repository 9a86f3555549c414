//! Tests for the REST search service client.

use super::*;
use wiremock::matchers::{body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(endpoint: &str) -> ServiceConfig {
    ServiceConfig {
        service: "test-svc".to_string(),
        index: "hotels".to_string(),
        endpoint: Some(endpoint.to_string()),
        api_key: Some("admin-key".to_string()),
        bearer_token: None,
    }
}

fn client(server: &MockServer) -> RestSearchService {
    RestSearchService::new(test_config(&server.uri()), "2023-11-01".to_string()).unwrap()
}

#[test]
fn test_strip_annotations() {
    let doc: Document = serde_json::from_str(
        r#"{"@search.score":1.0,"@search.highlights":{},"HotelId":"1","Rating":4}"#,
    )
    .unwrap();
    let stripped = strip_annotations(doc);
    assert_eq!(stripped.len(), 2);
    assert!(stripped.contains_key("HotelId"));
    assert!(!stripped.contains_key("@search.score"));
}

#[test]
fn test_parse_count_with_bom() {
    assert_eq!(parse_count("\u{feff}1203").unwrap(), 1203);
    assert_eq!(parse_count(" 42\n").unwrap(), 42);
    assert!(parse_count("many").is_err());
}

#[test]
fn test_rejects_non_http_endpoint() {
    let result = RestSearchService::new(test_config("ftp://example.com"), "v".to_string());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_fetch_schema_returns_raw_body() {
    let server = MockServer::start().await;
    let raw = r#"{"@odata.context":"x","name":"hotels","fields":[]}"#;
    Mock::given(method("GET"))
        .and(path("/indexes/hotels"))
        .and(query_param("api-version", "2023-11-01"))
        .and(header("api-key", "admin-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(raw))
        .expect(1)
        .mount(&server)
        .await;

    let schema = client(&server).fetch_schema("hotels").await.unwrap();
    assert_eq!(schema, raw);
}

#[tokio::test]
async fn test_fetch_schema_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/hotels"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_schema("hotels").await.unwrap_err();
    assert!(matches!(err, Error::AuthFailure(_)));
}

#[tokio::test]
async fn test_bearer_token_used_without_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indexes/hotels/docs/$count"))
        .and(header("Authorization", "Bearer token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("7"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.api_key = None;
    config.bearer_token = Some("token-123".to_string());
    let service = RestSearchService::new(config, "2023-11-01".to_string()).unwrap();

    assert_eq!(service.count_documents("hotels").await.unwrap(), 7);
}

#[tokio::test]
async fn test_delete_missing_index_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/indexes/hotels-copy"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).delete_index("hotels-copy").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_index_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already exists"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_index(r#"{"name":"hotels-copy","fields":[]}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_fetch_page_sends_window_and_strips_annotations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/hotels/docs/search"))
        .and(body_partial_json(serde_json::json!({
            "search": "*",
            "searchMode": "all",
            "skip": 500,
            "top": 500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {"@search.score": 1.0, "HotelId": "501", "HotelName": "Fancy Stay"},
                {"@search.score": 1.0, "HotelId": "502", "HotelName": "Roach Motel"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let docs = client(&server).fetch_page("hotels", 500, 500).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["HotelId"], "501");
    assert!(docs.iter().all(|d| !d.contains_key("@search.score")));
}

#[tokio::test]
async fn test_fetch_page_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/hotels/docs/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"value\": [ {\"Hotel"))
        .mount(&server)
        .await;

    let err = client(&server).fetch_page("hotels", 0, 10).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_upload_sends_body_verbatim() {
    let server = MockServer::start().await;
    let envelope = "{\"value\":[{\"HotelId\":\"1\"}]}";
    Mock::given(method("POST"))
        .and(path("/indexes/hotels-copy/docs/index"))
        .and(body_string(envelope))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"key": "1", "status": true, "statusCode": 201}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .upload_documents("hotels-copy", envelope.as_bytes().to_vec())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/hotels-copy/docs/index"))
        .respond_with(ResponseTemplate::new(207).set_body_json(serde_json::json!({
            "value": [
                {"key": "1", "status": true, "statusCode": 201},
                {"key": "2", "status": false, "statusCode": 400, "errorMessage": "bad geo"}
            ]
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .upload_documents("hotels-copy", b"{\"value\":[]}".to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ValidationFailed(_)));
    let msg = err.to_string();
    assert!(msg.contains("1 document(s) rejected"));
    assert!(msg.contains("bad geo"));
}
