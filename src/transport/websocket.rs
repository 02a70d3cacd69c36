//! ==============================================================================
//! transport/websocket.rs - device-direct socket adapter
//! ==============================================================================
//!
//! purpose:
//!     talks to the websocket served by the device firmware at
//!     ws://<device>/ws, for setups without a broker.
//!
//! frame format:
//!     every text (or utf-8 binary) frame is one envelope
//!
//! ```text
//!         {"topic": "ppr/temp/t1", "payload": "47.5"}
//!         {"topic": "ppr/power",   "payload": {"voltage": 12.0, ...}}
//!
//!     `payload` may be a string or an inline json value; either way it is
//!     handed to the engine as text, so decoding is identical to the broker
//!     path. an envelope without a string `topic` is reported as malformed.
//! ```
//!
//! relationships:
//!     - used by: transport/mod.rs (spawned for `kind = "device-socket"`)
//!
//! ==============================================================================

use super::{emit, emit_status, wait_backoff, EventSender, TransportEvent};
use crate::health::LinkEvent;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type DeviceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct DeviceSocketAdapter {
    url: String,
    backoff: Duration,
}

/// why a live session ended
enum SessionEnd {
    Cancelled,
    EngineGone,
    Lost(String),
}

impl DeviceSocketAdapter {
    pub fn new(url: impl Into<String>, backoff: Duration) -> Self {
        Self { url: url.into(), backoff }
    }

    pub async fn run(self, events: EventSender, shutdown: CancellationToken) {
        loop {
            if !emit_status(&events, LinkEvent::Connecting).await {
                return;
            }
            tracing::info!(url = %self.url, "connecting to device socket");

            let connected = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            let reason = match connected {
                Ok((stream, _)) => {
                    tracing::info!("device socket connected");
                    if !emit_status(&events, LinkEvent::Connected).await {
                        return;
                    }
                    match self.pump(stream, &events, &shutdown).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::EngineGone => return,
                        SessionEnd::Lost(reason) => reason,
                    }
                }
                Err(e) => e.to_string(),
            };

            tracing::warn!(error = %reason, backoff_ms = self.backoff.as_millis() as u64, "device socket lost, retrying");
            if !emit_status(&events, LinkEvent::Disconnected { error: Some(reason) }).await {
                return;
            }
            if !wait_backoff(self.backoff, &shutdown).await {
                break;
            }
        }

        emit_status(&events, LinkEvent::Disconnected { error: None }).await;
        tracing::info!("device socket adapter stopped");
    }

    async fn pump(&self, stream: DeviceStream, events: &EventSender, shutdown: &CancellationToken) -> SessionEnd {
        let (mut write, mut read) = stream.split();

        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }
                frame = read.next() => frame,
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text.to_string(),
                Some(Ok(Message::Binary(bin))) => match String::from_utf8(bin.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        if !emit(events, TransportEvent::Malformed { reason: "binary frame is not utf-8".to_string() }).await {
                            return SessionEnd::EngineGone;
                        }
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Lost("Disconnected".to_string()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
            };

            let event = match split_envelope(&text) {
                Ok((topic, payload)) => TransportEvent::Message { topic, payload },
                Err(reason) => TransportEvent::Malformed { reason },
            };
            if !emit(events, event).await {
                return SessionEnd::EngineGone;
            }
        }
    }
}

/// split a `{topic, payload}` envelope into the topic and raw payload text
pub fn split_envelope(text: &str) -> Result<(String, Vec<u8>), String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("envelope is not json: {}", e))?;
    let Value::Object(mut envelope) = value else {
        return Err("envelope is not a json object".to_string());
    };

    let topic = match envelope.remove("topic") {
        Some(Value::String(topic)) => topic,
        _ => return Err("envelope has no topic".to_string()),
    };

    let payload = match envelope.remove("payload") {
        Some(Value::String(raw)) => raw.into_bytes(),
        Some(Value::Null) | None => Vec::new(),
        Some(inline) => inline.to_string().into_bytes(),
    };

    Ok((topic, payload))
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payload_passes_through() {
        let (topic, payload) = split_envelope(r#"{"topic":"ppr/temp/t1","payload":"47.5"}"#).unwrap();
        assert_eq!(topic, "ppr/temp/t1");
        assert_eq!(payload, b"47.5");
    }

    #[test]
    fn inline_payload_is_reserialized() {
        let (topic, payload) =
            split_envelope(r#"{"topic":"ppr/power","payload":{"voltage":12.0,"current":500,"power":6000}}"#).unwrap();
        assert_eq!(topic, "ppr/power");
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["power"], 6000);
    }

    #[test]
    fn numeric_payload_becomes_text() {
        let (_, payload) = split_envelope(r#"{"topic":"ppr/temp/t2","payload":31.25}"#).unwrap();
        assert_eq!(payload, b"31.25");
    }

    #[test]
    fn missing_payload_is_empty() {
        let (_, payload) = split_envelope(r#"{"topic":"ppr/tilt/angle"}"#).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn bad_envelopes_are_rejected() {
        assert!(split_envelope("hello").is_err());
        assert!(split_envelope("[1,2,3]").is_err());
        assert!(split_envelope(r#"{"payload":"1"}"#).is_err());
        assert!(split_envelope(r#"{"topic":7,"payload":"1"}"#).is_err());
    }

    #[tokio::test]
    async fn cancelled_adapter_reports_final_disconnect() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let token = CancellationToken::new();
        token.cancel();

        DeviceSocketAdapter::new("ws://127.0.0.1:9/ws", Duration::from_secs(60))
            .run(tx, token)
            .await;

        assert_eq!(rx.recv().await, Some(TransportEvent::Status(LinkEvent::Connecting)));
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(TransportEvent::Status(LinkEvent::Disconnected { error: None })));
    }
}
