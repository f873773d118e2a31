#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use axum::http::StatusCode;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use courier_server::proto::courier::v1 as proto;
use prost::Message;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
mod common;

#[tokio::test]
async fn test_send_returns_pending_record() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["alice@example.com"]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    assert_eq!(body["message"], "Email queued for sending");
    assert!(body["id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());
    assert!(OffsetDateTime::parse(body["created_at"].as_str().unwrap(), &Rfc3339).is_ok());
}

#[tokio::test]
async fn test_successful_delivery_is_marked_sent() {
    let app = common::TestApp::spawn().await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["alice@example.com"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["id"].as_str().unwrap();

    let record = app.wait_for_outcome(id).await;
    assert_eq!(record["status"], "sent");
    assert!(record["error_message"].is_null());

    let created = OffsetDateTime::parse(record["created_at"].as_str().unwrap(), &Rfc3339).unwrap();
    let sent = OffsetDateTime::parse(record["sent_at"].as_str().unwrap(), &Rfc3339).unwrap();
    assert!(sent >= created);
}

#[tokio::test]
async fn test_refused_connection_is_marked_failed() {
    let app = common::TestApp::spawn_with(1, common::ScriptedTransport::failing("connection refused")).await;

    let body: serde_json::Value = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["alice@example.com"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let record = app.wait_for_outcome(body["id"].as_str().unwrap()).await;
    assert_eq!(record["status"], "failed");
    assert!(record["error_message"].as_str().unwrap().contains("connection refused"));
    assert!(record["sent_at"].is_null());
}

#[tokio::test]
async fn test_no_relay_configured_is_unavailable() {
    let app = common::TestApp::spawn_with(0, common::ScriptedTransport::default()).await;

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["alice@example.com"]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("relay"));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_invalid_address_is_rejected() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["bad-address"]))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("bad-address"));
    assert!(app.store.is_empty());
    assert!(app.transport.relays_used().is_empty());
}

#[tokio::test]
async fn test_recipient_limit() {
    let app = common::TestApp::spawn().await;
    let addresses: Vec<String> = (0..101).map(|i| format!("user{i}@example.com")).collect();

    let mut body = common::email_body(&[]);
    body["to"] = serde_json::to_value(&addresses[..100]).unwrap();
    let resp = app.client.post(format!("{}/v1/emails", app.api_url)).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    body["to"] = serde_json::to_value(&addresses).unwrap();
    let resp = app.client.post(format!("{}/v1/emails", app.api_url)).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .header("content-type", "application/json")
        .body("{\"to\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_sequential_sends_rotate_relays() {
    let app = common::TestApp::spawn().await;

    for recipient in ["first@example.com", "second@example.com", "third@example.com"] {
        let resp = app
            .client
            .post(format!("{}/v1/emails", app.api_url))
            .json(&common::email_body(&[recipient]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        app.settle().await;
    }

    let sent = app.transport.sent.lock().unwrap();
    let routed: Vec<(String, String)> = sent.iter().map(|(relay, msg)| (msg.to[0].clone(), relay.clone())).collect();
    assert_eq!(
        routed,
        [
            ("first@example.com".to_string(), "R0".to_string()),
            ("second@example.com".to_string(), "R1".to_string()),
            ("third@example.com".to_string(), "R0".to_string()),
        ]
    );
    assert_eq!(sent[1].1.from, "noreply1@example.com");
}

#[tokio::test]
async fn test_attachments_round_trip_through_fetch() {
    let app = common::TestApp::spawn().await;

    let mut body = common::email_body(&["alice@example.com"]);
    body["cc"] = serde_json::json!(["carol@example.com"]);
    body["is_html"] = serde_json::json!(true);
    body["attachments"] = serde_json::json!([
        {"filename": "report.csv", "content": STANDARD.encode("a,b\n1,2\n"), "content_type": "text/csv"},
        {"filename": "logo.png", "content": STANDARD.encode([0x89_u8, 0x50, 0x4e, 0x47]), "content_type": "image/png"},
    ]);

    let created: serde_json::Value = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&body)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let record = app.wait_for_outcome(created["id"].as_str().unwrap()).await;
    assert_eq!(record["cc"], serde_json::json!(["carol@example.com"]));
    assert_eq!(record["is_html"], true);
    assert_eq!(record["attachments"][0]["filename"], "report.csv");
    assert_eq!(record["attachments"][0]["size"], 8);
    assert_eq!(record["attachments"][1]["content_type"], "image/png");

    let sent = app.transport.sent.lock().unwrap();
    assert_eq!(sent[0].1.attachments.len(), 2);
    assert_eq!(sent[0].1.attachments[1].content, vec![0x89, 0x50, 0x4e, 0x47]);
}

#[tokio::test]
async fn test_escaped_body_at_limit_with_attachment_is_accepted() {
    let app = common::TestApp::spawn().await;

    // Every quote doubles when JSON escaped, so the wire body is well past 2 MiB.
    let mut body = common::email_body(&["alice@example.com"]);
    body["body"] = serde_json::json!("\"".repeat(1_048_576));
    body["attachments"] = serde_json::json!([
        {"filename": "blob.bin", "content": STANDARD.encode(vec![0x5a_u8; 1_000_000]), "content_type": "application/octet-stream"},
    ]);

    let resp = app.client.post(format!("{}/v1/emails", app.api_url)).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: serde_json::Value = resp.json().await.unwrap();
    let record = app.wait_for_outcome(created["id"].as_str().unwrap()).await;
    assert_eq!(record["body"].as_str().unwrap().len(), 1_048_576);
    assert_eq!(record["attachments"][0]["size"], 1_000_000);
}

#[tokio::test]
async fn test_body_over_request_limit_is_too_large() {
    let mut config = common::get_test_config();
    config.server.max_request_bytes = 64 * 1024;
    let app = common::TestApp::spawn_with_config(config, 1, common::ScriptedTransport::default()).await;

    let mut body = common::email_body(&["alice@example.com"]);
    body["body"] = serde_json::json!("b".repeat(128 * 1024));

    let resp = app.client.post(format!("{}/v1/emails", app.api_url)).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.store.len(), 0);
}

#[tokio::test]
async fn test_null_lists_are_accepted() {
    let app = common::TestApp::spawn().await;

    let mut body = common::email_body(&["alice@example.com"]);
    body["cc"] = serde_json::Value::Null;
    body["bcc"] = serde_json::Value::Null;
    body["attachments"] = serde_json::Value::Null;

    let resp = app.client.post(format!("{}/v1/emails", app.api_url)).json(&body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_malformed_id_is_bad_request() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/v1/emails/not-a-uuid", app.api_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid email id"));
}

#[tokio::test]
async fn test_fetch_unknown_email_is_not_found() {
    let app = common::TestApp::spawn().await;

    let resp =
        app.client.get(format!("{}/v1/emails/{}", app.api_url, uuid::Uuid::new_v4())).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Not found");
}

#[tokio::test]
async fn test_protobuf_request_gets_protobuf_response() {
    let app = common::TestApp::spawn().await;

    let request = proto::SendEmailRequest {
        to: vec!["alice@example.com".to_string()],
        subject: "Binary hello".to_string(),
        body: "sent as protobuf".to_string(),
        attachments: vec![proto::Attachment {
            filename: "note.txt".to_string(),
            content: b"raw bytes".to_vec(),
            content_type: "text/plain".to_string(),
        }],
        ..Default::default()
    };

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .header("content-type", "application/x-protobuf")
        .body(request.encode_to_vec())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()["content-type"], "application/x-protobuf");

    let response = proto::SendEmailResponse::decode(resp.bytes().await.unwrap()).unwrap();
    assert_eq!(response.status, "pending");
    assert_eq!(response.message, "Email queued for sending");

    let record = app.wait_for_outcome(&response.id).await;
    assert_eq!(record["status"], "sent");
    assert_eq!(record["attachments"][0]["size"], 9);
}

#[tokio::test]
async fn test_invalid_protobuf_is_rejected() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .header("content-type", "application/x-protobuf")
        .body(vec![0xff, 0xff, 0xff])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_drain_waits_for_in_flight_delivery() {
    let app = common::TestApp::spawn_with(1, common::ScriptedTransport::slow(Duration::from_millis(200))).await;

    let created: serde_json::Value = app
        .client
        .post(format!("{}/v1/emails", app.api_url))
        .json(&common::email_body(&["alice@example.com"]))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["status"], "pending");

    assert!(app.dispatcher.drain(Duration::from_secs(5)).await);
    assert_eq!(app.dispatcher.in_flight(), 0);

    let record = app.wait_for_outcome(created["id"].as_str().unwrap()).await;
    assert_eq!(record["status"], "sent");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/v1/emails/{}", app.api_url, uuid::Uuid::new_v4()))
        .header("x-request-id", "trace-me-123")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.headers()["x-request-id"], "trace-me-123");
}
