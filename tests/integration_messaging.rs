mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::TestApp;
use reqwest::StatusCode;
use telereach_server::domain::envelope::Envelope;
use telereach_server::services::crypto_service::CryptoService;

#[tokio::test]
async fn test_dual_encrypted_text_flow() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("msg_doc").await;
    let patient = app.create_patient("msg_pat", Some(&doctor)).await;

    let response = app.send_text_message(&patient.token, doctor.user.user_id, "env-sender", "env-recipient").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    let message_id = body["messageId"].as_i64().unwrap();
    assert!(body["timestamp"].as_str().is_some());

    // Both parties see the same conversation, each through their own copy.
    let patient_view = app.get_history(&patient.token, doctor.user.user_id).await;
    let doctor_view = app.get_history(&doctor.user.token, patient.user_id).await;
    assert_eq!(patient_view.len(), 1);
    assert_eq!(doctor_view.len(), 1);

    assert_eq!(patient_view[0]["id"].as_i64().unwrap(), message_id);
    assert_eq!(patient_view[0]["encryptedMessage"], "env-sender");
    assert_eq!(doctor_view[0]["encryptedMessage"], "env-recipient");
    assert_eq!(patient_view[0]["isFromDoctor"], false);
    assert_eq!(doctor_view[0]["isFromDoctor"], false);
}

#[tokio::test]
async fn test_history_marks_incoming_read() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("read_doc").await;
    let patient = app.create_patient("read_pat", Some(&doctor)).await;

    app.send_text_message(&patient.token, doctor.user.user_id, "s1", "r1").await;

    // Unread until the recipient looks at it.
    let sender_view = app.get_history(&patient.token, doctor.user.user_id).await;
    assert_eq!(sender_view[0]["isRead"], false);

    app.get_history(&doctor.user.token, patient.user_id).await;

    let sender_view = app.get_history(&patient.token, doctor.user.user_id).await;
    assert_eq!(sender_view[0]["isRead"], true);
}

#[tokio::test]
async fn test_history_ordering_follows_insert_order() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("order_doc").await;
    let patient = app.create_patient("order_pat", Some(&doctor)).await;

    for i in 0..5 {
        let response = app
            .send_text_message(&patient.token, doctor.user.user_id, &format!("s{i}"), &format!("r{i}"))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    app.send_text_message(&doctor.user.token, patient.user_id, "s-doc", "r-doc").await;

    let view = app.get_history(&doctor.user.token, patient.user_id).await;
    assert_eq!(view.len(), 6);
    let ids: Vec<i64> = view.iter().map(|m| m["id"].as_i64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(view[5]["isFromDoctor"], true);
}

#[tokio::test]
async fn test_send_without_relationship_rejected() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("rel_doc").await;
    let stranger = app.create_patient("rel_stranger", None).await;

    let response = app.send_text_message(&stranger.token, doctor.user.user_id, "s", "r").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let row_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_messages WHERE sender_id = $1 AND recipient_id = $2",
    )
    .bind(stranger.user_id)
    .bind(doctor.user.user_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(row_count, 0);
}

#[tokio::test]
async fn test_doctor_cannot_message_foreign_patient() {
    let app = TestApp::spawn().await;
    let doctor_a = app.create_doctor("rel_doc_a").await;
    let doctor_b = app.create_doctor("rel_doc_b").await;
    let patient_of_b = app.create_patient("rel_pat_b", Some(&doctor_b)).await;

    let response = app.send_text_message(&doctor_a.user.token, patient_of_b.user_id, "s", "r").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_to_patient_rejected() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("rel_doc_pp").await;
    let patient_a = app.create_patient("rel_pat_pp_a", Some(&doctor)).await;
    let patient_b = app.create_patient("rel_pat_pp_b", Some(&doctor)).await;

    let response = app.send_text_message(&patient_a.token, patient_b.user_id, "s", "r").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_incomplete_payload_rejected() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("val_doc").await;
    let patient = app.create_patient("val_pat", Some(&doctor)).await;

    // Only the sender copy: no.
    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({
            "recipientId": doctor.user.user_id,
            "senderEncryptedMessage": "env-sender",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No payload at all: no.
    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({ "recipientId": doctor.user.user_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_recipient_not_found() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("nf_doc").await;

    let response = app.send_text_message(&doctor.user.token, 999_999_999, "s", "r").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_file_attachment_flow() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("file_doc").await;
    let patient = app.create_patient("file_pat", Some(&doctor)).await;

    let sender_blob = b"sender-side ciphertext bytes".to_vec();
    let recipient_blob = b"recipient-side ciphertext bytes".to_vec();

    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({
            "recipientId": doctor.user.user_id,
            "senderEncryptedFile": BASE64.encode(&sender_blob),
            "recipientEncryptedFile": BASE64.encode(&recipient_blob),
            "fileMetadata": { "filename": "frt-results.pdf", "type": "application/pdf" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    let message_id = body["messageId"].as_i64().unwrap();

    // History shows the attachment without inlining the blob.
    let doctor_view = app.get_history(&doctor.user.token, patient.user_id).await;
    assert_eq!(doctor_view[0]["hasFile"], true);
    assert_eq!(doctor_view[0]["fileMetadata"]["filename"], "frt-results.pdf");
    assert!(doctor_view[0].get("encryptedMessage").is_none());

    // Each party downloads their own copy.
    let response = app
        .client
        .get(format!("{}/chat/file/{message_id}", app.address))
        .bearer_auth(&doctor.user.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert!(
        response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("frt-results.pdf")
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), recipient_blob.as_slice());

    let response = app
        .client
        .get(format!("{}/chat/file/{message_id}", app.address))
        .bearer_auth(&patient.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.bytes().await.unwrap().as_ref(), sender_blob.as_slice());
}

#[tokio::test]
async fn test_file_access_denied_to_third_party() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("file_acl_doc").await;
    let patient = app.create_patient("file_acl_pat", Some(&doctor)).await;
    let outsider = app.create_patient("file_acl_outsider", Some(&doctor)).await;

    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({
            "recipientId": doctor.user.user_id,
            "senderEncryptedFile": BASE64.encode(b"a"),
            "recipientEncryptedFile": BASE64.encode(b"b"),
            "fileMetadata": { "filename": "note.txt", "type": "text/plain" },
        }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    let message_id = body["messageId"].as_i64().unwrap();

    let response = app
        .client
        .get(format!("{}/chat/file/{message_id}", app.address))
        .bearer_auth(&outsider.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_file_fetch_on_text_message_not_found() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("file_nf_doc").await;
    let patient = app.create_patient("file_nf_pat", Some(&doctor)).await;

    let response = app.send_text_message(&patient.token, doctor.user.user_id, "s", "r").await;
    let body: serde_json::Value = response.json().await.unwrap();
    let message_id = body["messageId"].as_i64().unwrap();

    let response = app
        .client
        .get(format!("{}/chat/file/{message_id}", app.address))
        .bearer_auth(&patient.token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_file_encoding_rejected() {
    let app = TestApp::spawn().await;
    let doctor = app.create_doctor("file_b64_doc").await;
    let patient = app.create_patient("file_b64_pat", Some(&doctor)).await;

    let response = app
        .client
        .post(format!("{}/chat/send", app.address))
        .bearer_auth(&patient.token)
        .json(&serde_json::json!({
            "recipientId": doctor.user.user_id,
            "senderEncryptedFile": "!!! not base64 !!!",
            "recipientEncryptedFile": "!!! also not !!!",
            "fileMetadata": { "filename": "x", "type": "text/plain" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// The whole protocol end to end: keys provisioned over HTTP, both copies
// encrypted with the codec, stored ciphertext recovered and decrypted by
// each party with their own private key.
#[tokio::test]
async fn test_end_to_end_envelope_exchange() {
    let app = TestApp::spawn().await;
    let crypto = CryptoService::new();
    let doctor = app.create_doctor("e2e_doc").await;
    let patient = app.create_patient("e2e_pat", Some(&doctor)).await;

    for token in [&doctor.user.token, &patient.token] {
        let response = app
            .client
            .post(format!("{}/encryption-keys/generate", app.address))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The patient encrypts one copy per key, as the web client does.
    let doctor_public: serde_json::Value = app
        .client
        .get(format!("{}/encryption-keys/{}", app.address, doctor.user.user_id))
        .bearer_auth(&patient.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let own_keys: serde_json::Value = app
        .client
        .get(format!("{}/encryption-keys/user", app.address))
        .bearer_auth(&patient.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let plaintext = "I have been feeling unsteady when reaching forward.";
    let sender_env = crypto.encrypt(plaintext, own_keys["public_key"].as_str().unwrap()).unwrap();
    let recipient_env = crypto.encrypt(plaintext, doctor_public["public_key"].as_str().unwrap()).unwrap();

    let response = app
        .send_text_message(
            &patient.token,
            doctor.user.user_id,
            &serde_json::to_string(&sender_env).unwrap(),
            &serde_json::to_string(&recipient_env).unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The doctor recovers the plaintext from their copy.
    let doctor_keys: serde_json::Value = app
        .client
        .get(format!("{}/encryption-keys/user", app.address))
        .bearer_auth(&doctor.user.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let doctor_view = app.get_history(&doctor.user.token, patient.user_id).await;
    let stored_envelope: Envelope =
        serde_json::from_str(doctor_view[0]["encryptedMessage"].as_str().unwrap()).unwrap();
    let recovered = crypto.decrypt(&stored_envelope, doctor_keys["private_key"].as_str().unwrap()).unwrap();
    assert_eq!(recovered, plaintext);

    // And the patient from theirs.
    let patient_view = app.get_history(&patient.token, doctor.user.user_id).await;
    let stored_envelope: Envelope =
        serde_json::from_str(patient_view[0]["encryptedMessage"].as_str().unwrap()).unwrap();
    let recovered = crypto.decrypt(&stored_envelope, own_keys["private_key"].as_str().unwrap()).unwrap();
    assert_eq!(recovered, plaintext);
}
