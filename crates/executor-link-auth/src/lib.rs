//! Executor identity: RSA-PSS signing and handshake credentials.

pub mod credentials;
pub mod signer;

pub use credentials::{Credentials, EXECUTOR_ID_COOKIE, SIGNATURE_COOKIE};
pub use signer::{IdentitySigner, SigningError};
