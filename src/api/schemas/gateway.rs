use crate::domain::notification::NewMessageEvent;
use serde::Serialize;

/// A server-to-client websocket frame. Only `new_message` exists today; the
/// event tag keeps room for more without breaking clients.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayFrame {
    NewMessage(NewMessageEvent),
}
