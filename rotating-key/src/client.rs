//! The control-channel client half.

use std::net::{TcpStream, ToSocketAddrs};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::envelope::Envelope;
use crate::error::ChannelError;
use crate::msg::{ControlMsg, KeyIssue};
use crate::session::{self, RotatingKey, KEY_LEN};
use crate::transport::JsonLines;

/// An authenticated session speaking `RK_MSG`s.
#[derive(Debug)]
pub struct ControlClient {
    transport: JsonLines,
    rk: RotatingKey,
}

impl ControlClient {
    /// Full handshake: fetch the server's public key, enroll under a fresh
    /// session key, and take delivery of the initial rotating key.
    pub fn connect(
        addr: impl ToSocketAddrs,
        username: &str,
        password: &str,
    ) -> Result<Self, ChannelError> {
        let mut transport = JsonLines::new(TcpStream::connect(addr)?)?;

        transport.send(&ControlMsg::Pub {
            public_pem_b64: None,
        })?;
        let ControlMsg::Pub {
            public_pem_b64: Some(pem_b64),
        } = transport.recv_msg()?
        else {
            return Err(ChannelError::Unexpected("expected PUB reply".into()));
        };
        let pem = String::from_utf8(B64.decode(pem_b64)?)
            .map_err(|_| ChannelError::Unexpected("public key PEM is not UTF-8".into()))?;
        let public = RsaPublicKey::from_public_key_pem(&pem)
            .map_err(|e| ChannelError::KeyStore(e.to_string()))?;
        debug!("received server public key");

        let mut session_key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut session_key);
        let envelope = Envelope {
            session_key,
            username: username.to_owned(),
            password_sha256_hex: hex::encode(Sha256::digest(password.as_bytes())),
        };
        let mut rng = OsRng;
        let ct = public.encrypt(&mut rng, Oaep::new::<Sha256>(), &envelope.encode()?)?;
        transport.send(&ControlMsg::Enroll {
            payload_b64: B64.encode(ct),
        })?;

        let ControlMsg::Auth {
            ok,
            nonce_b64,
            ct_b64,
        } = transport.recv_msg()?
        else {
            return Err(ChannelError::Unexpected("expected AUTH reply".into()));
        };
        let verdict = session::open(&session_key, &B64.decode(nonce_b64)?, &B64.decode(ct_b64)?)?;
        if !ok {
            // The plaintext is the fixed failure marker; nothing else to learn.
            debug!("server verdict: {}", String::from_utf8_lossy(&verdict));
            return Err(ChannelError::AuthFailed);
        }

        let issue: KeyIssue = serde_json::from_slice(&verdict)?;
        let key: [u8; KEY_LEN] = B64
            .decode(issue.rk)?
            .try_into()
            .map_err(|_| ChannelError::Unexpected("rotating key is not 32 bytes".into()))?;
        info!("authenticated as {username:?}");

        Ok(ControlClient {
            transport,
            rk: RotatingKey::with_counter(key, issue.counter),
        })
    }

    /// Current message counter (advances twice per round trip).
    pub fn counter(&self) -> u64 {
        self.rk.counter()
    }

    /// Send one application payload and return the server's ACK payload.
    pub fn send(&mut self, payload: &str) -> Result<String, ChannelError> {
        let msg = self.rk.seal_payload(payload)?;
        self.transport.send(&msg)?;
        self.rk.advance();

        let ControlMsg::RkMsg { nonce_b64, ct_b64 } = self.transport.recv_msg()? else {
            return Err(ChannelError::Unexpected("expected RK_MSG reply".into()));
        };
        let ack = self.rk.open_payload(&nonce_b64, &ct_b64)?;
        self.rk.advance();
        Ok(ack)
    }
}
