//! Webhook signature verification
//!
//! GitHub signs every delivery with the webhook's secret token and sends the
//! digest as `X-Hub-Signature-256: sha256=<hex>`.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

const SIGNATURES_MATCH: &str =
    "Access permitted: the signature we calculated match the provided signature.";

const SIGNATURES_DIFFER: &str = "Access denied: HMAC signatures don't match. The request signature we calculated does not match the provided signature.";

/// Outcome of a signature check, with a message suitable for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub message: String,
}

/// Computes the `sha256=<hex>` signature GitHub would send for `body`
pub fn sign(body: &[u8], secret: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Checks `signature` against the digest of `body` under `secret`
///
/// # Arguments
/// * `body` - Raw request body, exactly as received
/// * `signature` - Value of the signature header, possibly empty
/// * `secret` - The workflow's webhook secret token
pub fn verify(body: &[u8], signature: &str, secret: &[u8]) -> Verification {
    if signature.is_empty() {
        return Verification {
            valid: false,
            message: format!(
                "Access denied: Github signature header {} is missing",
                SIGNATURE_HEADER
            ),
        };
    }

    let provided = signature.as_bytes();
    let valid = match sign(body, secret) {
        Ok(expected) => {
            expected.len() == provided.len() && bool::from(expected.as_bytes().ct_eq(provided))
        }
        Err(_) => false,
    };

    Verification {
        valid,
        message: if valid { SIGNATURES_MATCH } else { SIGNATURES_DIFFER }.to_string(),
    }
}
