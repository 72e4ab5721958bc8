mod common;

use common::{TestApp, receive_new_message};
use reqwest::StatusCode;
use std::time::Duration;

#[tokio::test]
async fn test_gateway_rejects_missing_or_invalid_token() {
    let app = TestApp::spawn().await;
    let ws_base = app.address.replace("http://", "ws://");

    let result = tokio_tungstenite::connect_async(format!("{ws_base}/gateway")).await;
    assert!(result.is_err());

    let result = tokio_tungstenite::connect_async(format!("{ws_base}/gateway?token=not-a-jwt")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_new_message_event_reaches_recipient_channel() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("gw_doc").await;
    let patient = app.create_patient("gw_pat", Some(&doctor)).await;

    let mut ws = app.connect_ws(&doctor.user.token).await;
    // Give the server a moment to register the channel subscription.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app.send_text_message(&patient.token, doctor.user.user_id, "env-1", "env-2").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    let message_id = body["messageId"].as_i64().unwrap();

    let event = receive_new_message(&mut ws, Duration::from_secs(5)).await.expect("no new_message event");

    assert_eq!(event["message_id"].as_i64().unwrap(), message_id);
    assert_eq!(event["sender_id"].as_i64().unwrap(), patient.user_id);
    assert_eq!(event["recipient_id"].as_i64().unwrap(), doctor.user.user_id);
    assert_eq!(event["is_from_doctor"], false);
    assert_eq!(event["has_file"], false);
    // Text events inline both ciphertext copies.
    assert_eq!(event["recipient_encrypted_message"], "env-2");
    assert_eq!(event["sender_encrypted_message"], "env-1");
    assert!(event["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_file_message_event_carries_metadata_only() {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("gw_file_doc").await;
    let patient = app.create_patient("gw_file_pat", Some(&doctor)).await;

    let mut ws = app.connect_ws(&doctor.user.token).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({
            "recipientId": doctor.user.user_id,
            "senderEncryptedFile": BASE64.encode(b"cipher-a"),
            "recipientEncryptedFile": BASE64.encode(b"cipher-b"),
            "fileMetadata": { "filename": "gait-video.mp4", "type": "video/mp4" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let event = receive_new_message(&mut ws, Duration::from_secs(5)).await.expect("no new_message event");

    assert_eq!(event["has_file"], true);
    assert_eq!(event["file_metadata"]["filename"], "gait-video.mp4");
    assert!(event.get("sender_encrypted_message").is_none());
    assert!(event.get("recipient_encrypted_message").is_none());
}

#[tokio::test]
async fn test_message_is_durable_without_active_connection() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("gw_offline_doc").await;
    let patient = app.create_patient("gw_offline_pat", Some(&doctor)).await;

    // Nobody is connected; the push is a no-op but the store keeps the row.
    let response = app.send_text_message(&patient.token, doctor.user.user_id, "s", "r").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let doctor_view = app.get_history(&doctor.user.token, patient.user_id).await;
    assert_eq!(doctor_view.len(), 1);
    assert_eq!(doctor_view[0]["encryptedMessage"], "r");
}

#[tokio::test]
async fn test_events_are_scoped_to_recipient() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("gw_scope_doc").await;
    let patient_a = app.create_patient("gw_scope_a", Some(&doctor)).await;
    let patient_b = app.create_patient("gw_scope_b", Some(&doctor)).await;

    let mut ws_b = app.connect_ws(&patient_b.token).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // A message to the doctor must not reach patient B's channel.
    app.send_text_message(&patient_a.token, doctor.user.user_id, "s", "r").await;

    let event = receive_new_message(&mut ws_b, Duration::from_secs(2)).await;
    assert!(event.is_none());
}
