//! Verification of `bce-signer-v1` authentication strings.
//!
//! The verifier runs the signing pipeline again on the received request:
//!
//! 1. Parse the authentication string into its fields.
//! 2. Reject it once `now` is past `timestamp + validity`.
//! 3. Resolve the secret key via the credential provider.
//! 4. Re-sign the request with the same timestamp and validity.
//! 5. Compare the two authentication strings in constant time.
//!
//! The main entry point is [`verify`]; [`verify_at`] takes the current time
//! explicitly.

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;
use tracing::{debug, error};

use crate::credentials::{Credential, CredentialProvider};
use crate::error::AuthError;
use crate::request::RequestDescriptor;
use crate::signing::{AuthString, SigningContext, parse_timestamp, sign};

/// The result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// The access key that signed the request.
    pub access_key: String,
    /// When the request was signed.
    pub signed_at: DateTime<Utc>,
    /// The last instant at which the signature is accepted.
    pub expires_at: DateTime<Utc>,
    /// The headers that were bound into the signature.
    pub signed_headers: Vec<String>,
}

/// Verify a request against the authentication string it carried, using the
/// current wall-clock time.
///
/// # Errors
///
/// See [`verify_at`].
pub fn verify(
    request: &RequestDescriptor,
    auth_string: &str,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    verify_at(request, auth_string, credential_provider, Utc::now())
}

/// Verify a request against the authentication string it carried, as of `now`.
///
/// # Errors
///
/// Returns an [`AuthError`] if:
/// - The authentication string or its timestamp is malformed (`InvalidFormat`)
/// - `now` is past the validity window (`Expired`)
/// - The access key is not known (`UnknownCredential`)
/// - The recomputed string differs from the supplied one (`SignatureMismatch`)
pub fn verify_at(
    request: &RequestDescriptor,
    auth_string: &str,
    credential_provider: &dyn CredentialProvider,
    now: DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let parsed: AuthString = auth_string.parse()?;

    debug!(
        access_key = %parsed.access_key(),
        timestamp = %parsed.timestamp(),
        validity_secs = parsed.validity_secs(),
        "Verifying bce-signer-v1 authentication string"
    );

    let signed_at = parse_timestamp(parsed.timestamp())
        .ok_or_else(|| AuthError::InvalidFormat("unparsable timestamp".to_owned()))?;
    let expires_at = parsed
        .expires_at()
        .ok_or_else(|| AuthError::InvalidFormat("validity window out of range".to_owned()))?;

    if now > expires_at {
        debug!(%now, %expires_at, "Authentication string expired");
        return Err(AuthError::Expired);
    }

    let secret_key = credential_provider.get_secret_key(parsed.access_key())?;
    let credential = Credential::new(parsed.access_key(), secret_key).map_err(|e| {
        error!(
            access_key = %parsed.access_key(),
            error = %e,
            "credential store returned an unusable credential"
        );
        AuthError::UnknownCredential(parsed.access_key().to_owned())
    })?;

    let ctx = SigningContext::new(credential, parsed.timestamp(), parsed.validity_secs())
        .map_err(|e| AuthError::InvalidFormat(e.to_string()))?;
    let expected = sign(request, &ctx).to_string();

    if auth_string.as_bytes().ct_eq(expected.as_bytes()).into() {
        debug!(access_key = %parsed.access_key(), "Signature verification succeeded");
        Ok(AuthResult {
            access_key: parsed.access_key().to_owned(),
            signed_at,
            expires_at,
            signed_headers: parsed.signed_headers().to_vec(),
        })
    } else {
        debug!(
            access_key = %parsed.access_key(),
            provided = %auth_string,
            "Signature mismatch"
        );
        Err(AuthError::SignatureMismatch)
    }
}
