use crate::api::AppState;
use crate::api::schemas::gateway::GatewayFrame;
use crate::domain::auth::Claims;
use axum::{
    extract::{
        Query, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use opentelemetry::global;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: String,
}

/// Realtime gateway. The upgrade is refused without a valid session token;
/// an accepted connection joins exactly one channel, the caller's own.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match Claims::decode(&params.token, &state.config.auth.jwt_secret) {
        Ok(claims) => ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub)),
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake failed: invalid token");
            axum::http::StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: i64) {
    let span = tracing::info_span!(
        "websocket_session",
        user_id = %user_id,
        otel.kind = "server",
        ws.session_id = %Uuid::new_v4()
    );

    async move {
        let meter = global::meter("telereach-server");
        let active_connections = meter
            .i64_up_down_counter("telereach_websocket_active_connections")
            .with_description("Open gateway connections")
            .build();
        active_connections.add(1, &[]);

        tracing::info!("WebSocket connected");
        let mut rx = state.notification_service.subscribe(user_id).await;
        let mut shutdown_rx = state.shutdown_rx.clone();

        let (mut ws_sink, mut ws_stream) = socket.split();

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Shutdown signal received, closing WebSocket");
                        let _ = ws_sink
                            .send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
                                code: axum::extract::ws::close_code::AWAY,
                                reason: "Server shutting down".into(),
                            })))
                            .await;
                        break;
                    }
                }

                msg = ws_stream.next() => {
                    match msg {
                        // Clients only listen on this socket; anything but a
                        // close is ignored.
                        Some(Ok(WsMessage::Close(_))) => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WebSocket error");
                            break;
                        }
                        None => break,
                    }
                }

                event = rx.recv() => {
                    match event {
                        Ok(event) => {
                            let frame = GatewayFrame::NewMessage(event);
                            match serde_json::to_string(&frame) {
                                Ok(text) => {
                                    if ws_sink.send(WsMessage::Text(text.into())).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "Failed to serialize gateway frame");
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Dropped hints are harmless; history refetch
                            // remains the source of truth.
                            tracing::warn!(missed, "Gateway subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;
        // Dropping the receiver leaves the channel; GC reclaims it once the
        // last subscriber is gone.
        drop(rx);
        active_connections.add(-1, &[]);
        tracing::info!("WebSocket disconnected");
    }
    .instrument(span)
    .await;
}
