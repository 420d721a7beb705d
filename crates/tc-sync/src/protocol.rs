//! Push-socket frames.
//!
//! The server sends `{"type": "state", "payload": <Session>}` after every
//! mutation and once on connect. Keep-alive `"pong"` text frames carry no
//! state.

use serde::{Deserialize, Serialize};
use tc_core::Session;

const KEEPALIVE: &str = "pong";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum PushMessage {
    State(Session),
}

impl PushMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decode one text frame. `Ok(None)` for keep-alives.
pub fn decode_push(text: &str) -> Result<Option<Session>, serde_json::Error> {
    if text.trim() == KEEPALIVE {
        return Ok(None);
    }
    let PushMessage::State(session) = serde_json::from_str(text)?;
    Ok(Some(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_frame_decodes() {
        let text = r#"{"type":"state","payload":{"id":"ABC123","tokens":[]}}"#;
        let session = decode_push(text).unwrap().unwrap();
        assert_eq!(session.id, "ABC123");
    }

    #[test]
    fn keepalive_is_not_state() {
        assert_eq!(decode_push("pong").unwrap(), None);
    }

    #[test]
    fn unknown_frames_are_errors() {
        assert!(decode_push(r#"{"type":"hello"}"#).is_err());
        assert!(decode_push("not json").is_err());
    }

    #[test]
    fn encode_matches_wire_shape() {
        let text = PushMessage::State(Session::new("XYZ789")).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["payload"]["id"], "XYZ789");
    }
}
