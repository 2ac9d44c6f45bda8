//! `X-Line-Signature` verification: base64(HMAC-SHA256(channel secret, raw body)).

use std::fmt;

use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(channel_secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: channel_secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, body: &[u8]) -> Result<HmacSha256, InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)?;
        mac.update(body);
        Ok(mac)
    }

    /// Computes the signature the platform sends for `body`.
    pub fn sign(&self, body: &[u8]) -> Result<String, InvalidLength> {
        let tag = self.mac(body)?.finalize().into_bytes();
        Ok(base64::engine::general_purpose::STANDARD.encode(tag))
    }

    /// Checks `signature` against `body` in constant time. Undecodable signatures fail.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim().as_bytes()) else {
            return false;
        };
        match self.mac(body) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}
