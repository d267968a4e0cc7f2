//! AEAD sealing and the rotating-key schedule.
//!
//! Every post-authentication message is AES-256-GCM with a fresh random
//! 12-byte nonce and empty associated data. After each message is processed
//! (received *or* sent), both peers derive
//! `rk <- HMAC-SHA256(key = rk, msg = "rotate" || be64(counter))` and
//! increment the counter, so keys and counters advance in lockstep.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::ChannelError;
use crate::msg::{ControlMsg, RotatingPayload};

type HmacSha256 = Hmac<Sha256>;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

/// Encrypt under a 32-byte key with a fresh random nonce.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ChannelError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ChannelError::Aead)?;
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ct = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| ChannelError::Aead)?;
    Ok((nonce.to_vec(), ct))
}

/// Decrypt and verify; any tampering or key/nonce mismatch is [`ChannelError::Aead`].
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8], ct: &[u8]) -> Result<Vec<u8>, ChannelError> {
    if nonce.len() != NONCE_LEN {
        return Err(ChannelError::Aead);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| ChannelError::Aead)?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), ct)
        .map_err(|_| ChannelError::Aead)
}

/// One side's rotating-key state: the current key and message counter.
#[derive(Clone, Debug)]
pub struct RotatingKey {
    key: [u8; KEY_LEN],
    counter: u64,
}

impl RotatingKey {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self::with_counter(key, 0)
    }

    pub fn with_counter(key: [u8; KEY_LEN], counter: u64) -> Self {
        RotatingKey { key, counter }
    }

    /// Fresh random initial key, counter zero.
    pub fn issue() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        RotatingKey::new(key)
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn key_b64(&self) -> String {
        B64.encode(self.key)
    }

    /// Build an `RK_MSG` for `payload` under the current key and counter.
    pub fn seal_payload(&self, payload: &str) -> Result<ControlMsg, ChannelError> {
        let pt = serde_json::to_vec(&RotatingPayload {
            payload: payload.to_owned(),
            counter: self.counter,
        })?;
        let (nonce, ct) = seal(&self.key, &pt)?;
        Ok(ControlMsg::RkMsg {
            nonce_b64: B64.encode(nonce),
            ct_b64: B64.encode(ct),
        })
    }

    /// Open an inbound `RK_MSG` body and check its embedded counter against
    /// the local one.
    pub fn open_payload(&self, nonce_b64: &str, ct_b64: &str) -> Result<String, ChannelError> {
        let pt = open(&self.key, &B64.decode(nonce_b64)?, &B64.decode(ct_b64)?)?;
        let body: RotatingPayload = serde_json::from_slice(&pt)?;
        if body.counter != self.counter {
            return Err(ChannelError::CounterMismatch {
                expected: self.counter,
                got: body.counter,
            });
        }
        Ok(body.payload)
    }

    /// Ratchet the key over the current counter, then advance the counter.
    /// Called once after every processed message, on both peers.
    pub fn advance(&mut self) {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(b"rotate");
        mac.update(&self.counter.to_be_bytes());
        self.key = mac.finalize().into_bytes().into();
        self.counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let key = [7u8; KEY_LEN];
        let (nonce, ct) = seal(&key, b"attack at dawn").unwrap();
        assert_eq!(nonce.len(), NONCE_LEN);
        // 16-byte tag appended.
        assert_eq!(ct.len(), 14 + 16);
        assert_eq!(open(&key, &nonce, &ct).unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [7u8; KEY_LEN];
        let (nonce, mut ct) = seal(&key, b"payload").unwrap();
        ct[0] ^= 1;
        assert!(matches!(open(&key, &nonce, &ct), Err(ChannelError::Aead)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (nonce, ct) = seal(&[1u8; KEY_LEN], b"payload").unwrap();
        assert!(open(&[2u8; KEY_LEN], &nonce, &ct).is_err());
    }

    #[test]
    fn test_ratchet_stays_in_lockstep() {
        let mut left = RotatingKey::new([9u8; KEY_LEN]);
        let mut right = left.clone();
        for _ in 0..6 {
            left.advance();
            right.advance();
        }
        assert_eq!(left.counter(), 6);
        assert_eq!(left.key, right.key);

        // A message sealed by one side opens on the other.
        let msg = left.seal_payload("hello").unwrap();
        let ControlMsg::RkMsg { nonce_b64, ct_b64 } = msg else {
            panic!("expected RK_MSG");
        };
        assert_eq!(right.open_payload(&nonce_b64, &ct_b64).unwrap(), "hello");
    }

    #[test]
    fn test_desynced_key_fails_the_next_exchange() {
        let mut left = RotatingKey::new([3u8; KEY_LEN]);
        let right = left.clone();
        left.advance();

        let msg = left.seal_payload("x").unwrap();
        let ControlMsg::RkMsg { nonce_b64, ct_b64 } = msg else {
            panic!("expected RK_MSG");
        };
        // One rotation apart: the AEAD must reject.
        assert!(right.open_payload(&nonce_b64, &ct_b64).is_err());
    }

    #[test]
    fn test_counter_mismatch_is_detected_before_rotation() {
        let key = RotatingKey::with_counter([5u8; KEY_LEN], 4);
        let stale = RotatingKey::with_counter([5u8; KEY_LEN], 3);

        let msg = stale.seal_payload("replayed").unwrap();
        let ControlMsg::RkMsg { nonce_b64, ct_b64 } = msg else {
            panic!("expected RK_MSG");
        };
        assert!(matches!(
            key.open_payload(&nonce_b64, &ct_b64),
            Err(ChannelError::CounterMismatch {
                expected: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn test_rotation_depends_on_counter() {
        let mut a = RotatingKey::with_counter([1u8; KEY_LEN], 0);
        let mut b = RotatingKey::with_counter([1u8; KEY_LEN], 1);
        a.advance();
        b.advance();
        assert_ne!(a.key, b.key);
    }
}
