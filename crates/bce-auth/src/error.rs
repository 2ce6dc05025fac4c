//! Error types for `bce-signer-v1` signing and verification.
//!
//! [`AuthError`] is a rejection of a request under verification.
//! [`SignerError`] means the signer was handed bad configuration and cannot
//! produce a signature at all.

/// Reasons a request fails authentication.
///
/// Every variant is terminal for the request it was produced for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request carries no authentication string, neither in the
    /// `Authorization` header nor in the `authorization` query parameter.
    #[error("Missing authentication string")]
    MissingAuthString,

    /// The authentication string or its embedded timestamp could not be parsed.
    #[error("Invalid authentication string: {0}")]
    InvalidFormat(String),

    /// The access key is not known to the credential store.
    #[error("Unknown access key: {0}")]
    UnknownCredential(String),

    /// The current time is past `timestamp + validity`.
    #[error("Authentication string has expired")]
    Expired,

    /// The recomputed authentication string differs from the supplied one.
    #[error("Signature does not match")]
    SignatureMismatch,
}

/// Configuration errors raised while preparing to sign.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The credential is unusable (empty key, or an access key containing `/`).
    #[error("Invalid credential: {0}")]
    InvalidCredential(&'static str),

    /// The signing timestamp is not `YYYY-MM-DDTHH:MM:SSZ`.
    #[error("Invalid signing timestamp: {0}")]
    InvalidTimestamp(String),

    /// The authentication string could not be stored as a header value.
    #[error("Authentication string is not a valid header value")]
    InvalidHeaderValue,

    /// The request URI could not be rebuilt with the `authorization` parameter.
    #[error("Invalid request URI: {0}")]
    InvalidUri(String),
}
