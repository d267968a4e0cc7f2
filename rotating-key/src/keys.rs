//! RSA keypair persistence.
//!
//! The server keeps a 2048-bit RSA keypair in `private.pem` / `public.pem`
//! under its key directory, generating both on first start.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use tracing::info;

use crate::error::ChannelError;

pub const RSA_BITS: usize = 2048;

/// The server's long-lived keypair plus the public half's PEM for handout.
pub struct KeyPair {
    pub private: RsaPrivateKey,
    pub public_pem: String,
}

/// Load the keypair from `dir`, or generate and persist a fresh one.
pub fn load_or_generate(dir: &Path) -> Result<KeyPair, ChannelError> {
    fs::create_dir_all(dir)?;
    let priv_path = dir.join("private.pem");
    let pub_path = dir.join("public.pem");

    if priv_path.exists() && pub_path.exists() {
        let pem = fs::read_to_string(&priv_path)?;
        let private = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| ChannelError::KeyStore(e.to_string()))?;
        let public_pem = fs::read_to_string(&pub_path)?;
        info!("loaded RSA keypair from {}", dir.display());
        return Ok(KeyPair {
            private,
            public_pem,
        });
    }

    info!("generating a fresh {RSA_BITS}-bit RSA keypair");
    let mut rng = OsRng;
    let private = RsaPrivateKey::new(&mut rng, RSA_BITS)?;
    let priv_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| ChannelError::KeyStore(e.to_string()))?;
    let public_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| ChannelError::KeyStore(e.to_string()))?;

    fs::write(&priv_path, priv_pem.as_bytes())?;
    fs::write(&pub_path, public_pem.as_bytes())?;
    info!("persisted keypair under {}", dir.display());

    Ok(KeyPair {
        private,
        public_pem,
    })
}
