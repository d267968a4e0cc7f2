//! Authenticated control channel with a per-message rotating key.
//!
//! A hybrid protocol over newline-delimited JSON: an RSA-OAEP envelope
//! bootstraps a 32-byte session key, a password hash gates access, and every
//! message after authentication is protected by AES-256-GCM under a key that
//! ratchets via HMAC-SHA256 after each message, indexed by a monotonic
//! counter kept in lockstep on both peers.
//!
//! Rotation is forward-only bookkeeping, not post-compromise secrecy: given
//! any rotating key, every later one is derivable.

pub mod client;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod msg;
pub mod server;
pub mod session;
pub mod transport;
pub mod users;

pub use client::ControlClient;
pub use envelope::Envelope;
pub use error::ChannelError;
pub use server::ControlServer;
pub use session::RotatingKey;
pub use users::UserDb;
