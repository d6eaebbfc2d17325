//! Upload client tests against a mocked document endpoint.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use palaver_core::api::upload::{CandidateFile, UploadClient};
use palaver_core::api::ApiErrorKind;

fn candidate(name: &str) -> CandidateFile {
    CandidateFile {
        name: name.to_string(),
        bytes: b"contents".to_vec(),
    }
}

fn document_body(id: &str) -> serde_json::Value {
    serde_json::json!({
        "document": {
            "document_id": id,
            "document_url": format!("https://docs.example/{id}")
        }
    })
}

#[tokio::test]
async fn test_upload_pairs_documents_with_input_names() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "namespace_id": "ns-1",
            "document_responses": [document_body("doc-a"), document_body("doc-b")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = UploadClient::new(server.uri());
    let result = client
        .upload(vec![candidate("a.pdf"), candidate("b.txt")], None)
        .await
        .unwrap();

    assert_eq!(result.namespace_id, "ns-1");
    assert_eq!(result.documents.len(), 2);
    assert_eq!(result.documents[0].name, "a.pdf");
    assert_eq!(result.documents[0].document_id, "doc-a");
    assert_eq!(result.documents[1].name, "b.txt");
    assert_eq!(result.documents[1].document_id, "doc-b");
}

#[tokio::test]
async fn test_upload_rejects_short_document_list() {
    let server = MockServer::start().await;
    // One response for two files must not silently drop the second.
    Mock::given(method("POST"))
        .and(path("/api/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "namespace_id": "ns-1",
            "document_responses": [document_body("doc-a")]
        })))
        .mount(&server)
        .await;

    let client = UploadClient::new(server.uri());
    let err = client
        .upload(vec![candidate("a.pdf"), candidate("b.txt")], None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::Parse);
    assert!(err.message.contains("1 documents for 2 files"));
}

#[tokio::test]
async fn test_upload_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/documents"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_raw(r#"{"msg": "storage unavailable"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = UploadClient::new(server.uri());
    let err = client.upload(vec![candidate("a.pdf")], None).await.unwrap_err();

    assert_eq!(err.kind, ApiErrorKind::HttpStatus);
    assert_eq!(err.message, "HTTP 500: storage unavailable");
}
