//! Handshake credentials carried as cookies.

/// Cookie holding the hex-encoded identity signature.
pub const SIGNATURE_COOKIE: &str = "executor-signature";

/// Cookie holding the raw executor identifier.
///
/// Defined alongside the signature cookie but never attached implicitly;
/// callers opt in by setting `executor_id` on the credentials.
pub const EXECUTOR_ID_COOKIE: &str = "executor-id";

/// Credentials attached to the outbound connection handshake.
///
/// The two fields are independent; either, both, or neither may be set.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Executor identifier to send in the clear.
    pub executor_id: Option<String>,
    /// Hex-encoded signature over the executor identifier.
    pub signature: Option<String>,
}

impl Credentials {
    /// Render the `Cookie` header value, or `None` when nothing is set.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let mut pairs = Vec::new();
        if let Some(id) = &self.executor_id {
            pairs.push(format!("{EXECUTOR_ID_COOKIE}={id}"));
        }
        if let Some(signature) = &self.signature {
            pairs.push(format!("{SIGNATURE_COOKIE}={signature}"));
        }
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}
