//! HMAC signing of outbound payloads.
//!
//! When a shared secret is configured, every delivery carries an
//! `X-Signature` header holding the lowercase hex HMAC of the exact request
//! body. The digest depends only on payload and secret, so it is computed
//! once per dispatch and reused for every endpoint.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Keyed hash used for signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    /// HMAC-SHA1, 40 hex characters. What existing receivers verify.
    #[default]
    HmacSha1,
    /// HMAC-SHA256, 64 hex characters.
    HmacSha256,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacSha1 => write!(f, "hmac_sha1"),
            Self::HmacSha256 => write!(f, "hmac_sha256"),
        }
    }
}

/// Signing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The secret could not be used as an HMAC key.
    #[error("invalid secret key")]
    InvalidSecret,
}

/// Hex-encoded payload digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HMAC state keyed with the shared secret.
///
/// Keyed once at construction; each signature clones the keyed state, so
/// signing a payload cannot fail.
#[derive(Clone)]
pub struct PayloadSigner {
    mac: KeyedMac,
}

#[derive(Clone)]
enum KeyedMac {
    Sha1(HmacSha1),
    Sha256(HmacSha256),
}

impl PayloadSigner {
    /// Keys a signer with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureError::InvalidSecret` if the key is rejected.
    pub fn new(secret: &str, algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let key = secret.as_bytes();
        let mac = match algorithm {
            SignatureAlgorithm::HmacSha1 => KeyedMac::Sha1(
                HmacSha1::new_from_slice(key).map_err(|_| SignatureError::InvalidSecret)?,
            ),
            SignatureAlgorithm::HmacSha256 => KeyedMac::Sha256(
                HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidSecret)?,
            ),
        };

        Ok(Self { mac })
    }

    /// Builds a signer from an optional secret.
    ///
    /// An absent or empty secret means deliveries go out unsigned, which is
    /// not an error.
    pub fn from_secret(
        secret: Option<&str>,
        algorithm: SignatureAlgorithm,
    ) -> Result<Option<Self>, SignatureError> {
        match secret {
            Some(secret) if !secret.is_empty() => Self::new(secret, algorithm).map(Some),
            _ => Ok(None),
        }
    }

    /// Returns the algorithm this signer uses.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self.mac {
            KeyedMac::Sha1(_) => SignatureAlgorithm::HmacSha1,
            KeyedMac::Sha256(_) => SignatureAlgorithm::HmacSha256,
        }
    }

    /// Signs the exact payload bytes.
    pub fn sign(&self, payload: &[u8]) -> Signature {
        let digest = match &self.mac {
            KeyedMac::Sha1(mac) => {
                let mut mac = mac.clone();
                mac.update(payload);
                hex::encode(mac.finalize().into_bytes())
            },
            KeyedMac::Sha256(mac) => {
                let mut mac = mac.clone();
                mac.update(payload);
                hex::encode(mac.finalize().into_bytes())
            },
        };

        Signature(digest)
    }

    /// Checks a hex signature against the payload in constant time.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        match &self.mac {
            KeyedMac::Sha1(mac) => {
                let mut mac = mac.clone();
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            },
            KeyedMac::Sha256(mac) => {
                let mut mac = mac.clone();
                mac.update(payload);
                mac.verify_slice(&expected).is_ok()
            },
        }
    }
}

impl fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadSigner")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Signs `payload` with `secret`, or returns `None` when no secret is set.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the key is rejected.
pub fn sign_payload(
    payload: &[u8],
    secret: Option<&str>,
    algorithm: SignatureAlgorithm,
) -> Result<Option<Signature>, SignatureError> {
    Ok(PayloadSigner::from_secret(secret, algorithm)?.map(|signer| signer.sign(payload)))
}

/// Verifies a received `X-Signature` value against the raw body.
///
/// Returns `false` for an empty secret, a malformed signature, or a mismatch.
pub fn verify_signature(
    payload: &[u8],
    signature: &str,
    secret: &str,
    algorithm: SignatureAlgorithm,
) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }

    PayloadSigner::new(secret, algorithm).is_ok_and(|signer| signer.verify(payload, signature))
}
