use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::keys::{
    GenerateKeysRequest, GenerateKeysResponse, KeyPairBody, PublicKeyResponse, TriggerGenerationResponse,
};
use crate::domain::keys::{PemKeyPair, ProvisionOutcome};
use crate::error::{AppError, Result};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

/// Provisions (or overwrites) the caller's key pair. Accepts an optional
/// client-generated PEM pair so deployments can keep generation off the
/// server; otherwise generates one here. An empty body means server-side
/// generation.
///
/// # Errors
/// Returns `AppError::BadRequest` for a half-supplied or unparseable pair.
pub async fn generate_keys(
    auth_user: AuthUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let request: GenerateKeysRequest = if body.is_empty() {
        GenerateKeysRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))?
    };

    let client_keys = match (request.public_key, request.private_key) {
        (Some(public_key), Some(private_key)) => Some(PemKeyPair { public_key, private_key }),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest("Both public_key and private_key are required".to_string()));
        }
    };

    let stored = state.key_service.provision(auth_user.user_id, client_keys).await?;

    Ok(Json(GenerateKeysResponse {
        message: "Encryption keys generated successfully".to_string(),
        keys: KeyPairBody::from(stored),
    }))
}

/// Provisions keys for a peer that has none yet, e.g. a doctor bootstrapping
/// a patient who never opened the chat. Existing keys are never overwritten
/// through this route.
///
/// # Errors
/// Returns `AppError::NotFound` if the target user does not exist.
pub async fn trigger_generation(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let message = match state.key_service.provision_if_absent(user_id).await? {
        ProvisionOutcome::Created => "Encryption keys generated for user",
        ProvisionOutcome::AlreadyExists => "User already has encryption keys",
    };

    Ok(Json(TriggerGenerationResponse { message: message.to_string() }))
}

/// Public key of any user, for encrypting their copy of a message.
///
/// # Errors
/// Returns `AppError::NotFound` when the user has no keys yet.
pub async fn get_public_key(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let public_key = state.key_service.get_public_key(user_id).await?;

    Ok(Json(PublicKeyResponse { public_key }))
}

/// The caller's own key pair, private half included. The route scope IS the
/// authorization: the id comes from the session, never from the request.
///
/// # Errors
/// Returns `AppError::NotFound` when the caller has no keys yet.
pub async fn get_user_keys(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let pair = state.key_service.get_key_pair(auth_user.user_id).await?;

    Ok(Json(KeyPairBody::from(pair)))
}
