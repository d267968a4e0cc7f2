//! The control-channel server half.
//!
//! Per connection: optional `PUB` (public-key handout), then `ENROLL`
//! (RSA-OAEP envelope), then the authenticated `RK_MSG` echo loop. A failed
//! authentication is answered with the fixed `AUTH_FAIL` plaintext under the
//! client's session key and nothing else, so the reply does not reveal
//! whether the username or the password was wrong.

use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use rsa::Oaep;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::envelope::Envelope;
use crate::error::ChannelError;
use crate::keys::{self, KeyPair};
use crate::msg::{ControlMsg, ErrorMsg, KeyIssue};
use crate::session::{self, RotatingKey};
use crate::transport::JsonLines;
use crate::users::UserDb;

/// Fixed plaintext of the failure verdict.
pub const AUTH_FAIL: &[u8] = b"AUTH_FAIL";

pub struct ControlServer {
    users: UserDb,
    keys: KeyPair,
}

impl ControlServer {
    /// Load or create the keypair under `key_dir` and take the user table.
    pub fn new(users: UserDb, key_dir: &Path) -> Result<Self, ChannelError> {
        assert!(!users.is_empty(), "server needs at least one user");
        let keys = keys::load_or_generate(key_dir)?;
        Ok(ControlServer { users, keys })
    }

    /// PEM of the public key, as handed to clients.
    pub fn public_pem(&self) -> &str {
        &self.keys.public_pem
    }

    /// Accept loop; one thread per connection.
    pub fn serve(self, listener: TcpListener) -> Result<(), ChannelError> {
        info!(
            "control server listening on {}",
            listener.local_addr()?
        );
        let server = Arc::new(self);
        for conn in listener.incoming() {
            match conn {
                Ok(sock) => {
                    let server = Arc::clone(&server);
                    thread::spawn(move || server.handle_conn(sock));
                }
                Err(e) => warn!("accept failed: {e}"),
            }
        }
        Ok(())
    }

    fn handle_conn(&self, sock: TcpStream) {
        let peer = sock
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".into());
        let mut transport = match JsonLines::new(sock) {
            Ok(t) => t,
            Err(e) => {
                warn!("failed to set up transport for {peer}: {e}");
                return;
            }
        };
        match self.session(&mut transport, &peer) {
            Ok(()) | Err(ChannelError::PeerClosed) => {}
            Err(e) => {
                warn!("session with {peer} ended: {e}");
                let _ = transport.send(&ErrorMsg {
                    error: e.to_string(),
                });
            }
        }
    }

    /// One full connection lifetime: handshake, then the echo loop.
    fn session(&self, t: &mut JsonLines, peer: &str) -> Result<(), ChannelError> {
        let mut msg = t.recv_msg()?;

        if matches!(msg, ControlMsg::Pub { .. }) {
            t.send(&ControlMsg::Pub {
                public_pem_b64: Some(B64.encode(self.keys.public_pem.as_bytes())),
            })?;
            msg = t.recv_msg()?;
        }

        let ControlMsg::Enroll { payload_b64 } = msg else {
            return Err(ChannelError::Unexpected("expected ENROLL".into()));
        };

        let blob = self
            .keys
            .private
            .decrypt(Oaep::new::<Sha256>(), &B64.decode(payload_b64)?)?;
        let envelope = Envelope::decode(&blob)?;

        if !self
            .users
            .verify(&envelope.username, &envelope.password_sha256_hex)
        {
            let (nonce, ct) = session::seal(&envelope.session_key, AUTH_FAIL)?;
            t.send(&ControlMsg::Auth {
                ok: false,
                nonce_b64: B64.encode(nonce),
                ct_b64: B64.encode(ct),
            })?;
            info!("rejected enrollment from {peer}");
            return Ok(());
        }

        let mut rk = RotatingKey::issue();
        let issue = serde_json::to_vec(&KeyIssue {
            rk: rk.key_b64(),
            counter: rk.counter(),
        })?;
        let (nonce, ct) = session::seal(&envelope.session_key, &issue)?;
        t.send(&ControlMsg::Auth {
            ok: true,
            nonce_b64: B64.encode(nonce),
            ct_b64: B64.encode(ct),
        })?;
        info!("{peer} authenticated as {:?}", envelope.username);

        loop {
            let msg = t.recv_msg()?;
            let ControlMsg::RkMsg { nonce_b64, ct_b64 } = msg else {
                return Err(ChannelError::Unexpected("expected RK_MSG".into()));
            };
            let payload = rk.open_payload(&nonce_b64, &ct_b64)?;
            debug!("{peer} message at counter {}", rk.counter());
            rk.advance();

            let reply = rk.seal_payload(&format!("ACK:{payload}"))?;
            t.send(&reply)?;
            rk.advance();
        }
    }
}
