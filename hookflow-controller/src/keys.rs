//! Secret material generation
//!
//! Webhook tokens and deploy-key pairs are drawn from the operating system's
//! CSPRNG on every call and never reused across create or rotate cycles.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hookflow_core::domain::{KeyPair, Repository};
use rand::RngCore;
use rand::rngs::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};

const WEBHOOK_TOKEN_BYTES: usize = 32;

/// Generates a webhook secret token
///
/// # Returns
/// 32 random bytes, base64-encoded. The encoded text is what GitHub signs
/// deliveries with and what is stored under `secret-token`.
pub fn generate_webhook_token() -> String {
    let mut bytes = [0u8; WEBHOOK_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

/// Generates an Ed25519 key pair for `repository`'s deploy key
pub fn generate_key_pair(repository: &Repository) -> Result<KeyPair, ssh_key::Error> {
    let private = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)?;
    let private_key = private.to_openssh(LineEnding::LF)?.as_bytes().to_vec();
    let public_key = private.public_key().to_openssh()?;

    Ok(KeyPair {
        private_key,
        public_key,
        repository: repository.clone(),
    })
}
