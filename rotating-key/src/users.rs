//! In-memory user table.
//!
//! Usernames map to the hex-encoded SHA-256 of the password. Verification is
//! constant-time over fixed-width digests, and an unknown username walks the
//! same comparison as a known one so neither content nor timing reveals
//! which of the two was wrong.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Stand-in record compared against when the username is unknown.
const DUMMY_RECORD: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Clone, Debug, Default)]
pub struct UserDb {
    users: HashMap<String, String>,
}

impl UserDb {
    pub fn new() -> Self {
        UserDb::default()
    }

    /// Built-in demo user.
    pub fn with_demo_user() -> Self {
        let mut db = UserDb::new();
        db.add_password("alice", "correct horse battery staple");
        db
    }

    /// Register a user from a plaintext password.
    pub fn add_password(&mut self, username: &str, password: &str) {
        let hash = hex::encode(Sha256::digest(password.as_bytes()));
        self.add_hash(username, &hash);
    }

    /// Register a user from an already-hashed credential.
    pub fn add_hash(&mut self, username: &str, password_sha256_hex: &str) {
        self.users
            .insert(username.to_owned(), password_sha256_hex.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Constant-time credential check.
    ///
    /// Both sides are hashed once more so the compared operands always have
    /// the same width regardless of what the client presented.
    pub fn verify(&self, username: &str, presented_sha256_hex: &str) -> bool {
        let stored = self.users.get(username);
        let stored_digest = Sha256::digest(stored.map_or(DUMMY_RECORD, |s| s.as_str()).as_bytes());
        let presented_digest = Sha256::digest(presented_sha256_hex.as_bytes());
        let matches: bool = stored_digest
            .as_slice()
            .ct_eq(presented_digest.as_slice())
            .into();
        matches && stored.is_some()
    }
}
