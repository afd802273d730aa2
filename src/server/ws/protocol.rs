use serde::Deserialize;

pub const WS_APP_PROTOCOL: &str = "beacon.v1";

/// Message submitted by the client over the websocket.
#[derive(Debug, Deserialize)]
pub struct WsIncomingMessage {
    pub message: Option<String>,
}
