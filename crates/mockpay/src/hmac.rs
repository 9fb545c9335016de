use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::DeliveryError;

type HmacSha256 = Hmac<Sha256>;

/// Signs webhook bodies with HMAC-SHA256.
///
/// The signature covers the exact bytes sent on the wire, so callers must sign
/// the serialized body once and send those same bytes on every attempt.
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
}

impl Signer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Whether a usable secret is present.
    pub fn is_configured(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Standard base64 (padded) HMAC-SHA256 of `body`.
    ///
    /// Fails with [`DeliveryError::Configuration`] when the secret is empty.
    pub fn sign(&self, body: &[u8]) -> Result<String, DeliveryError> {
        if self.secret.is_empty() {
            return Err(DeliveryError::Configuration(
                "PAYMENT_WEBHOOK_SECRET must be set to sign webhooks".to_string(),
            ));
        }
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| DeliveryError::Configuration(e.to_string()))?;
        mac.update(body);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("secret", &if self.is_configured() { "[REDACTED]" } else { "<unset>" })
            .finish()
    }
}

/// Verify a base64 HMAC-SHA256 signature the way a webhook receiver would.
///
/// Malformed base64 is compared against a zero MAC so the rejection path
/// takes the same time as a mismatch.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);

    let expected = BASE64.decode(signature).unwrap_or_else(|_| vec![0u8; 32]);

    mac.verify_slice(&expected).is_ok()
}
