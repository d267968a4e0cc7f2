use thiserror::Error;

/// Errors produced by the DUORAM data plane.
///
/// Every variant is fatal to the request (or connection) that raised it and
/// to nothing else; servers keep accepting after reporting one.
#[derive(Debug, Error)]
pub enum DuoramError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad opcode {got:#04x}, expected {expected:#04x}")]
    BadOp { expected: u8, got: u8 },

    #[error("dimension mismatch: got {got}, expected {expected}")]
    DimMismatch { expected: u32, got: u32 },

    #[error("dimension must be non-zero")]
    ZeroDim,

    #[error("dimension {0} exceeds the supported maximum")]
    DimTooLarge(u32),

    #[error("session mismatch on peer channel: got sid {got_sid:#018x} tag {got_tag:#04x}, awaiting sid {want_sid:#018x} tag {want_tag:#04x}")]
    SessionMismatch {
        want_sid: u64,
        want_tag: u8,
        got_sid: u64,
        got_tag: u8,
    },

    #[error("index {idx} out of range for dimension {dim}")]
    OutOfRange { idx: u32, dim: u32 },

    #[error("no inverse modulo 2^31 for even element {0}")]
    NoInverse(u32),

    #[error("timed out awaiting peer residual for sid {0:#018x}")]
    PeerTimeout(u64),

    #[error("write not acknowledged by party {0}")]
    WriteNotAcked(usize),

    #[error("internal: {0}")]
    Internal(String),
}
