//! Wire messages: one JSON object per line, tagged by `op`.

use serde::{Deserialize, Serialize};

/// A protocol message in either direction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ControlMsg {
    /// Public-key request (no body) or response (PEM, base64-wrapped).
    #[serde(rename = "PUB")]
    Pub {
        #[serde(skip_serializing_if = "Option::is_none")]
        public_pem_b64: Option<String>,
    },
    /// RSA-OAEP enrollment envelope.
    #[serde(rename = "ENROLL")]
    Enroll { payload_b64: String },
    /// Authentication verdict; the ciphertext is under the session key.
    #[serde(rename = "AUTH")]
    Auth {
        ok: bool,
        nonce_b64: String,
        ct_b64: String,
    },
    /// An authenticated application message under the current rotating key.
    #[serde(rename = "RK_MSG")]
    RkMsg { nonce_b64: String, ct_b64: String },
}

/// Terminal error report, sent instead of a `ControlMsg` before closing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub error: String,
}

/// Anything that may appear on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Msg(ControlMsg),
    Error(ErrorMsg),
}

/// Plaintext of an `RK_MSG` ciphertext.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotatingPayload {
    pub payload: String,
    pub counter: u64,
}

/// Plaintext of the successful `AUTH` ciphertext: the first rotating key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyIssue {
    /// Base64 of the 32-byte initial rotating key.
    pub rk: String,
    pub counter: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pub_request_omits_empty_body() {
        let line = serde_json::to_string(&ControlMsg::Pub {
            public_pem_b64: None,
        })
        .unwrap();
        assert_eq!(line, r#"{"op":"PUB"}"#);
    }

    #[test]
    fn test_frames_parse_both_shapes() {
        match serde_json::from_str::<Frame>(r#"{"op":"PUB"}"#).unwrap() {
            Frame::Msg(ControlMsg::Pub { public_pem_b64 }) => assert!(public_pem_b64.is_none()),
            other => panic!("unexpected frame: {other:?}"),
        }
        match serde_json::from_str::<Frame>(r#"{"error":"bad counter"}"#).unwrap() {
            Frame::Error(e) => assert_eq!(e.error, "bad counter"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_rk_msg_round_trip() {
        let msg = ControlMsg::RkMsg {
            nonce_b64: "bm9uY2U=".into(),
            ct_b64: "Y3Q=".into(),
        };
        let line = serde_json::to_string(&msg).unwrap();
        assert!(line.contains(r#""op":"RK_MSG""#));
        let back: Frame = serde_json::from_str(&line).unwrap();
        assert!(matches!(back, Frame::Msg(ControlMsg::RkMsg { .. })));
    }
}
