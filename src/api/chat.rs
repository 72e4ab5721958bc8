use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::chat::{HistoryEntry, SendMessageRequest, SendMessageResponse};
use crate::domain::message::OutgoingPayload;
use crate::error::{AppError, Result};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Message history with a peer, oldest first, each row carrying only the
/// caller's own ciphertext copy. Fetching marks the peer's messages read.
///
/// # Errors
/// Returns `AppError::Database` if a query fails.
pub async fn history(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let entries = state.message_service.history(auth_user.user_id, auth_user.role, peer_id).await?;

    Ok(Json(entries.into_iter().map(HistoryEntry::from).collect::<Vec<_>>()))
}

/// Accepts a dual-encrypted message (text and/or file) and stores it. The
/// response carries the assigned id and timestamp, nothing more; this server
/// never held the plaintext.
///
/// # Errors
/// `AppError::BadRequest` for incomplete payloads or undecodable base64,
/// `AppError::NotFound` for an unknown recipient,
/// `AppError::Forbidden` without a doctor-patient relationship.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let payload = OutgoingPayload {
        sender_encrypted_text: request.sender_encrypted_message,
        recipient_encrypted_text: request.recipient_encrypted_message,
        sender_encrypted_file: decode_file(request.sender_encrypted_file)?,
        recipient_encrypted_file: decode_file(request.recipient_encrypted_file)?,
        file_metadata: request.file_metadata,
    };

    let stored = state.message_service.send(auth_user.user_id, auth_user.role, request.recipient_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully".to_string(),
            message_id: stored.id,
            timestamp: stored.created_at,
        }),
    ))
}

/// Downloads the caller's encrypted copy of a file attachment. Decryption
/// happens client-side with the caller's private key.
///
/// # Errors
/// `AppError::NotFound` for an unknown message or one without a file,
/// `AppError::Forbidden` when the caller is neither sender nor recipient.
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let download = state.message_service.fetch_file(auth_user.user_id, message_id).await?;

    let mut response = Response::new(Body::from(download.bytes));

    let content_type = download.content_type.parse().unwrap_or(header::HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);

    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(&download.filename));
    if let Ok(value) = disposition.parse() {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

fn decode_file(encoded: Option<String>) -> Result<Option<Vec<u8>>> {
    encoded
        .map(|data| BASE64.decode(data).map_err(|_| AppError::BadRequest("Invalid file encoding".to_string())))
        .transpose()
}

// Keeps the quoted-string form of Content-Disposition intact.
fn sanitize_filename(filename: &str) -> String {
    filename.chars().map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_quotes() {
        assert_eq!(sanitize_filename("sca\"n.pdf"), "sca_n.pdf");
        assert_eq!(sanitize_filename("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_decode_file_rejects_bad_base64() {
        assert!(decode_file(Some("!!!not-base64!!!".to_string())).is_err());
        assert!(decode_file(None).unwrap().is_none());
    }
}
