//! The RSA-OAEP enrollment envelope.
//!
//! Plaintext layout: `K_c (32) || len8(username) || username ||
//! len8(hex_sha256_password) || hex_sha256_password`, with single-byte
//! length prefixes (so both fields are capped at 255 bytes).

use crate::error::ChannelError;
use crate::session::KEY_LEN;

/// Decrypted enrollment contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// The client-chosen session key protecting the AUTH reply.
    pub session_key: [u8; KEY_LEN],
    pub username: String,
    /// Hex-encoded SHA-256 of the password.
    pub password_sha256_hex: String,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        let user = self.username.as_bytes();
        let hash = self.password_sha256_hex.as_bytes();
        if user.len() > 255 || hash.len() > 255 {
            return Err(ChannelError::MalformedEnvelope);
        }
        let mut blob = Vec::with_capacity(KEY_LEN + 2 + user.len() + hash.len());
        blob.extend_from_slice(&self.session_key);
        blob.push(user.len() as u8);
        blob.extend_from_slice(user);
        blob.push(hash.len() as u8);
        blob.extend_from_slice(hash);
        Ok(blob)
    }

    pub fn decode(blob: &[u8]) -> Result<Self, ChannelError> {
        let mut cur = Cursor { blob, at: 0 };
        let session_key: [u8; KEY_LEN] = cur
            .take(KEY_LEN)?
            .try_into()
            .map_err(|_| ChannelError::MalformedEnvelope)?;
        let ulen = cur.take(1)?[0] as usize;
        let username = String::from_utf8(cur.take(ulen)?.to_vec())
            .map_err(|_| ChannelError::MalformedEnvelope)?;
        let hlen = cur.take(1)?[0] as usize;
        let password_sha256_hex = String::from_utf8(cur.take(hlen)?.to_vec())
            .map_err(|_| ChannelError::MalformedEnvelope)?;
        if cur.at != blob.len() {
            return Err(ChannelError::MalformedEnvelope);
        }
        Ok(Envelope {
            session_key,
            username,
            password_sha256_hex,
        })
    }
}

/// Bounds-checked reader; an overrun is a malformed envelope, never a panic.
struct Cursor<'a> {
    blob: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ChannelError> {
        let end = self
            .at
            .checked_add(n)
            .filter(|end| *end <= self.blob.len())
            .ok_or(ChannelError::MalformedEnvelope)?;
        let out = &self.blob[self.at..end];
        self.at = end;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            session_key: [0xAB; KEY_LEN],
            username: "alice".into(),
            password_sha256_hex: "ff".repeat(32),
        }
    }

    #[test]
    fn test_round_trip() {
        let env = sample();
        let blob = env.encode().unwrap();
        assert_eq!(blob.len(), 32 + 1 + 5 + 1 + 64);
        assert_eq!(Envelope::decode(&blob).unwrap(), env);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let blob = sample().encode().unwrap();
        for cut in [0, 10, 33, 40, blob.len() - 1] {
            assert!(
                Envelope::decode(&blob[..cut]).is_err(),
                "cut at {cut} must fail"
            );
        }
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        let mut blob = sample().encode().unwrap();
        blob.push(0);
        assert!(Envelope::decode(&blob).is_err());
    }

    #[test]
    fn test_overlong_username_is_rejected() {
        let env = Envelope {
            username: "x".repeat(256),
            ..sample()
        };
        assert!(env.encode().is_err());
    }
}
