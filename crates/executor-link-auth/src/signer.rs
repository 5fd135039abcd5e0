//! Identity signing for the connection handshake.

use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pss, RsaPrivateKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::credentials::Credentials;

/// Credential generation failure.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(#[from] rsa::Error),
}

/// Signs the executor identifier to prove identity without transmitting a
/// shared secret.
///
/// Without a key the signer is a no-op and the connection proceeds
/// unauthenticated.
#[derive(Debug)]
pub struct IdentitySigner {
    key: Option<RsaPrivateKey>,
}

impl IdentitySigner {
    /// Create a signer from an existing private key.
    #[must_use]
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key: Some(key) }
    }

    /// Create a no-op signer for unauthenticated mode.
    #[must_use]
    pub fn disabled() -> Self {
        Self { key: None }
    }

    /// Parse a PKCS#8 PEM private key.
    ///
    /// # Errors
    /// Returns `SigningError::InvalidKey` if the PEM is malformed.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SigningError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key))
    }

    /// Whether a signing key is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Produce handshake credentials for `executor_id`.
    ///
    /// The signature is RSA-PSS over the SHA-256 digest of the identifier,
    /// rendered as lowercase hex sized to the key's modulus. PSS salts are
    /// random, so repeated calls yield different signatures that all verify
    /// against the same public key. The identifier itself is not attached
    /// here; see `Credentials::executor_id`.
    ///
    /// # Errors
    /// Returns `SigningError::Signing` if the signing operation fails.
    pub fn credentials(&self, executor_id: &str) -> Result<Credentials, SigningError> {
        let Some(key) = &self.key else {
            return Ok(Credentials::default());
        };
        let digest = Sha256::digest(executor_id.as_bytes());
        let signature = key.sign_with_rng(&mut rand::thread_rng(), Pss::new::<Sha256>(), &digest)?;
        Ok(Credentials {
            executor_id: None,
            signature: Some(hex::encode(signature)),
        })
    }
}
