use thiserror::Error;

/// Errors on the control channel. Any of these closes the connection; the
/// server reports at most the generic message to the remote side.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("rsa: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("key storage: {0}")]
    KeyStore(String),

    #[error("authenticated decryption failed")]
    Aead,

    #[error("counter mismatch: got {got}, expected {expected}")]
    CounterMismatch { expected: u64, got: u64 },

    #[error("authentication failed")]
    AuthFailed,

    #[error("malformed enrollment envelope")]
    MalformedEnvelope,

    #[error("unexpected message: {0}")]
    Unexpected(String),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("remote error: {0}")]
    Remote(String),
}
