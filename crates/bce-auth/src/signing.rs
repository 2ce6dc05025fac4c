//! Signing key derivation and request signing for `bce-signer-v1`.
//!
//! The signer never uses the secret key directly on the canonical request.
//! It first derives a per-request key bound to the access key, timestamp and
//! validity window:
//!
//! ```text
//! AuthStringPrefix = "bce-signer-v1/" + AccessKey + "/" + Timestamp + "/" + ValiditySeconds
//! SigningKey       = HexLower(HMAC-SHA256(SecretKey, AuthStringPrefix))
//! Signature        = HexLower(HMAC-SHA256(SigningKey, CanonicalRequest))
//! AuthString       = AuthStringPrefix + "/" + SignedHeaders + "/" + Signature
//! ```
//!
//! Note that the hex text of the signing key, not its raw bytes, keys the
//! second HMAC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::credentials::Credential;
use crate::error::{AuthError, SignerError};
use crate::request::RequestDescriptor;

/// Scheme tag that opens every authentication string.
pub const SCHEME: &str = "bce-signer-v1";

/// Layout of the signing timestamp: ISO 8601, UTC, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Header that carries the signing timestamp on the wire.
pub const DATE_HEADER: &str = "x-bce-date";

/// Length of a hex-encoded HMAC-SHA256 digest.
const SIGNATURE_HEX_LEN: usize = 64;

type HmacSha256 = Hmac<Sha256>;

/// Everything needed to sign one request besides the request itself.
#[derive(Debug, Clone)]
pub struct SigningContext {
    credential: Credential,
    timestamp: String,
    validity_secs: u64,
}

impl SigningContext {
    /// Create a context from a pre-formatted timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidTimestamp`] unless the timestamp is
    /// exactly `YYYY-MM-DDTHH:MM:SSZ`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bce_auth::{Credential, SigningContext};
    ///
    /// let credential = Credential::new("AK1", "SK1").unwrap();
    /// let ctx = SigningContext::new(credential.clone(), "2024-01-01T00:00:00Z", 1800).unwrap();
    /// assert_eq!(ctx.validity_secs(), 1800);
    /// assert!(SigningContext::new(credential, "2024-01-01 00:00:00", 1800).is_err());
    /// ```
    pub fn new(
        credential: Credential,
        timestamp: impl Into<String>,
        validity_secs: u64,
    ) -> Result<Self, SignerError> {
        let timestamp = timestamp.into();
        if parse_timestamp(&timestamp).is_none() {
            return Err(SignerError::InvalidTimestamp(timestamp));
        }

        Ok(Self {
            credential,
            timestamp,
            validity_secs,
        })
    }

    /// Create a context for the given instant, truncated to whole seconds.
    #[must_use]
    pub fn at(credential: Credential, time: DateTime<Utc>, validity_secs: u64) -> Self {
        Self {
            credential,
            timestamp: format_timestamp(time),
            validity_secs,
        }
    }

    /// The credential used to sign.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The signing timestamp as it appears on the wire.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// How many seconds after the timestamp the signature stays valid.
    #[must_use]
    pub fn validity_secs(&self) -> u64 {
        self.validity_secs
    }
}

/// A complete `bce-signer-v1` authentication string.
///
/// `Display` renders the wire form and `FromStr` parses it:
///
/// ```text
/// bce-signer-v1/<accessKey>/<timestamp>/<validitySeconds>/<signedHeaders>/<signature>
/// ```
///
/// # Examples
///
/// ```
/// use bce_auth::AuthString;
///
/// let raw = format!(
///     "bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host;x-bce-date/{}",
///     "0".repeat(64)
/// );
/// let auth: AuthString = raw.parse().unwrap();
/// assert_eq!(auth.access_key(), "AK1");
/// assert_eq!(auth.signed_headers(), ["host", "x-bce-date"]);
/// assert_eq!(auth.to_string(), raw);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthString {
    access_key: String,
    timestamp: String,
    validity_secs: u64,
    signed_headers: Vec<String>,
    signature: String,
}

impl AuthString {
    /// The access key that signed the request.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The signing timestamp.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The validity window in seconds.
    #[must_use]
    pub fn validity_secs(&self) -> u64 {
        self.validity_secs
    }

    /// The lowercase names of the headers bound into the signature.
    #[must_use]
    pub fn signed_headers(&self) -> &[String] {
        &self.signed_headers
    }

    /// The hex-encoded signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// `bce-signer-v1/<accessKey>/<timestamp>/<validitySeconds>`.
    #[must_use]
    pub fn prefix(&self) -> String {
        build_auth_string_prefix(&self.access_key, &self.timestamp, self.validity_secs)
    }

    /// The instant after which the string is no longer accepted.
    ///
    /// `None` when the timestamp does not parse or the window overflows.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let issued = parse_timestamp(&self.timestamp)?;
        let window = TimeDelta::try_seconds(i64::try_from(self.validity_secs).ok()?)?;
        issued.checked_add_signed(window)
    }
}

impl fmt::Display for AuthString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.prefix(),
            build_signed_headers_string(&self.signed_headers),
            self.signature
        )
    }
}

impl FromStr for AuthString {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AuthError::InvalidFormat(reason.to_owned());

        let mut fields = s.splitn(6, '/');
        let scheme = fields.next().ok_or_else(|| invalid("empty"))?;
        if scheme != SCHEME {
            return Err(invalid("unsupported scheme"));
        }

        let access_key = fields.next().ok_or_else(|| invalid("missing access key"))?;
        let timestamp = fields.next().ok_or_else(|| invalid("missing timestamp"))?;
        let validity = fields.next().ok_or_else(|| invalid("missing validity"))?;
        let signed_headers = fields
            .next()
            .ok_or_else(|| invalid("missing signed headers"))?;
        let signature = fields.next().ok_or_else(|| invalid("missing signature"))?;

        if access_key.is_empty() {
            return Err(invalid("empty access key"));
        }
        if timestamp.is_empty() {
            return Err(invalid("empty timestamp"));
        }
        if validity.is_empty() || !validity.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("validity is not a non-negative integer"));
        }
        let validity_secs: u64 = validity
            .parse()
            .map_err(|_| invalid("validity out of range"))?;

        let signed_headers: Vec<String> = if signed_headers.is_empty() {
            Vec::new()
        } else {
            signed_headers.split(';').map(ToOwned::to_owned).collect()
        };
        if signed_headers.iter().any(String::is_empty) {
            return Err(invalid("empty signed header name"));
        }

        if signature.len() != SIGNATURE_HEX_LEN
            || !signature
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid("signature is not 64 lowercase hex digits"));
        }

        Ok(Self {
            access_key: access_key.to_owned(),
            timestamp: timestamp.to_owned(),
            validity_secs,
            signed_headers,
            signature: signature.to_owned(),
        })
    }
}

/// Build the authentication string prefix.
///
/// # Examples
///
/// ```
/// use bce_auth::signing::build_auth_string_prefix;
///
/// assert_eq!(
///     build_auth_string_prefix("AK1", "2024-01-01T00:00:00Z", 1800),
///     "bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800"
/// );
/// ```
#[must_use]
pub fn build_auth_string_prefix(access_key: &str, timestamp: &str, validity_secs: u64) -> String {
    format!("{SCHEME}/{access_key}/{timestamp}/{validity_secs}")
}

/// Derive the authentication string prefix and the per-request signing key.
///
/// Returns `(prefix, signing_key)`; the key is lowercase hex.
#[must_use]
pub fn derive_signing_key(
    credential: &Credential,
    timestamp: &str,
    validity_secs: u64,
) -> (String, String) {
    let prefix = build_auth_string_prefix(credential.access_key(), timestamp, validity_secs);
    let signing_key = hmac_sha256_hex(credential.secret_key().as_bytes(), &prefix);
    (prefix, signing_key)
}

/// Compute the final signature of a canonical request with a derived key.
#[must_use]
pub fn compute_signature(signing_key: &str, canonical_request: &str) -> String {
    hmac_sha256_hex(signing_key.as_bytes(), canonical_request)
}

/// Sign a request.
///
/// Pure: the result depends only on the request and the context.
///
/// # Examples
///
/// ```
/// use bce_auth::{Credential, RequestDescriptor, SigningContext, sign};
///
/// let request = RequestDescriptor::new("GET", "/meiyou")
///     .header("Host", "jowin-dev.bj.bcebos.com")
///     .header("x-bce-date", "2024-01-01T00:00:00Z");
/// let ctx = SigningContext::new(
///     Credential::new("AK1", "SK1").unwrap(),
///     "2024-01-01T00:00:00Z",
///     1800,
/// )
/// .unwrap();
///
/// let auth = sign(&request, &ctx).to_string();
/// assert!(auth.starts_with("bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host;x-bce-date/"));
/// ```
#[must_use]
pub fn sign(request: &RequestDescriptor, ctx: &SigningContext) -> AuthString {
    let (prefix, signing_key) =
        derive_signing_key(&ctx.credential, &ctx.timestamp, ctx.validity_secs);
    let (canonical_request, signed_headers) = build_canonical_request(request);

    if !binds_host_or_date(&signed_headers) {
        warn!(
            method = %request.method(),
            path = %request.path(),
            "signing a request without host or x-bce-date header; the signature does not bind them"
        );
    }

    debug!(auth_string_prefix = %prefix, canonical_request, "Built canonical request");

    let signature = compute_signature(&signing_key, &canonical_request);

    AuthString {
        access_key: ctx.credential.access_key().to_owned(),
        timestamp: ctx.timestamp.clone(),
        validity_secs: ctx.validity_secs,
        signed_headers,
        signature,
    }
}

/// Whether the signed headers include `host` or `x-bce-date`.
fn binds_host_or_date(signed_headers: &[String]) -> bool {
    signed_headers
        .iter()
        .any(|name| name == "host" || name == DATE_HEADER)
}

/// Parse a signing timestamp in [`TIMESTAMP_FORMAT`].
///
/// Returns `None` unless the input is the canonical rendering of a valid instant.
#[must_use]
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let parsed = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    (format_timestamp(parsed) == timestamp).then_some(parsed)
}

/// Render an instant in [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Compute HMAC-SHA256 and return it as lowercase hex.
fn hmac_sha256_hex(key: &[u8], data: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_TIMESTAMP: &str = "2024-01-01T00:00:00Z";
    const REFERENCE_PREFIX: &str = "bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800";
    const REFERENCE_SIGNING_KEY: &str =
        "0a83f39ad77be5686555a6b88e2584333a14a09a6f6fc7a35a6d8b3084c4e7e6";
    const REFERENCE_CANONICAL_REQUEST: &str =
        "GET\n/meiyou\n\nhost:jowin-dev.bj.bcebos.com\nx-bce-date:2024-01-01T00%3A00%3A00Z";
    const REFERENCE_SIGNATURE: &str =
        "730e128f9d0a6fbce300bff45ec9725b55176bb774f309ebf59a0c88717108d6";

    fn reference_context() -> SigningContext {
        SigningContext::new(
            Credential::new("AK1", "SK1").unwrap(),
            REFERENCE_TIMESTAMP,
            1800,
        )
        .unwrap()
    }

    fn reference_request() -> RequestDescriptor {
        RequestDescriptor::new("GET", "/meiyou")
            .header("Host", "jowin-dev.bj.bcebos.com")
            .header("x-bce-date", REFERENCE_TIMESTAMP)
    }

    #[test]
    fn test_should_detect_requests_without_anchor_headers() {
        let (_, bare) = build_canonical_request(
            &RequestDescriptor::new("GET", "/meiyou").header("x-bce-meta-owner", "jowin"),
        );
        assert_eq!(bare, ["x-bce-meta-owner"]);
        assert!(!binds_host_or_date(&bare));
        assert!(!binds_host_or_date(&[]));

        let (_, with_host) = build_canonical_request(
            &RequestDescriptor::new("GET", "/meiyou").header("Host", "jowin-dev.bj.bcebos.com"),
        );
        assert!(binds_host_or_date(&with_host));
        assert!(binds_host_or_date(&["x-bce-date".to_owned()]));

        let (_, both) = build_canonical_request(&reference_request());
        assert!(binds_host_or_date(&both));
    }

    #[test]
    fn test_should_compute_hmac_sha256_rfc4231_vector() {
        // RFC 4231 test case 2.
        assert_eq!(
            hmac_sha256_hex(b"Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_should_derive_reference_signing_key() {
        let ctx = reference_context();
        let (prefix, signing_key) =
            derive_signing_key(ctx.credential(), ctx.timestamp(), ctx.validity_secs());
        assert_eq!(prefix, REFERENCE_PREFIX);
        assert_eq!(signing_key, REFERENCE_SIGNING_KEY);
    }

    #[test]
    fn test_should_sign_reference_scenario_with_exact_intermediates() {
        let (canonical_request, signed_headers) = build_canonical_request(&reference_request());
        assert_eq!(canonical_request, REFERENCE_CANONICAL_REQUEST);
        assert_eq!(signed_headers, vec!["host", "x-bce-date"]);

        let signature = compute_signature(REFERENCE_SIGNING_KEY, &canonical_request);
        assert_eq!(signature, REFERENCE_SIGNATURE);

        let auth = sign(&reference_request(), &reference_context());
        assert_eq!(
            auth.to_string(),
            format!("{REFERENCE_PREFIX}/host;x-bce-date/{REFERENCE_SIGNATURE}")
        );
    }

    #[test]
    fn test_should_sign_deterministically() {
        let first = sign(&reference_request(), &reference_context());
        let second = sign(&reference_request(), &reference_context());
        assert_eq!(first, second);
    }

    #[test]
    fn test_should_bind_timestamp_and_validity_into_signature() {
        let base = sign(&reference_request(), &reference_context());

        let longer = SigningContext::new(
            Credential::new("AK1", "SK1").unwrap(),
            REFERENCE_TIMESTAMP,
            3600,
        )
        .unwrap();
        let later = SigningContext::new(
            Credential::new("AK1", "SK1").unwrap(),
            "2024-01-01T00:00:01Z",
            1800,
        )
        .unwrap();

        assert_ne!(base.signature(), sign(&reference_request(), &longer).signature());
        assert_ne!(base.signature(), sign(&reference_request(), &later).signature());
    }

    #[test]
    fn test_should_sign_request_without_signed_headers() {
        let auth = sign(&RequestDescriptor::new("GET", "/"), &reference_context());
        assert!(auth.signed_headers().is_empty());
        let rendered = auth.to_string();
        assert!(rendered.starts_with(&format!("{REFERENCE_PREFIX}//")));
        assert_eq!(rendered.parse::<AuthString>().unwrap(), auth);
    }

    #[test]
    fn test_should_reject_malformed_timestamps() {
        let credential = Credential::new("AK1", "SK1").unwrap();
        for bad in [
            "",
            "2024-01-01",
            "2024-01-01T00:00:00",
            "2024-01-01T00:00:00.123Z",
            "2024-01-01T00:00:00+00:00",
            "2024-1-1T00:00:00Z",
            "2024-02-30T00:00:00Z",
        ] {
            assert!(
                matches!(
                    SigningContext::new(credential.clone(), bad, 60),
                    Err(SignerError::InvalidTimestamp(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_should_format_context_timestamp_from_instant() {
        let time = parse_timestamp("2024-05-06T07:08:09Z").unwrap();
        let ctx = SigningContext::at(Credential::new("AK1", "SK1").unwrap(), time, 60);
        assert_eq!(ctx.timestamp(), "2024-05-06T07:08:09Z");
    }

    #[test]
    fn test_should_parse_auth_string_fields() {
        let raw = format!("{REFERENCE_PREFIX}/host;x-bce-date/{REFERENCE_SIGNATURE}");
        let auth: AuthString = raw.parse().unwrap();
        assert_eq!(auth.access_key(), "AK1");
        assert_eq!(auth.timestamp(), REFERENCE_TIMESTAMP);
        assert_eq!(auth.validity_secs(), 1800);
        assert_eq!(auth.signed_headers(), ["host", "x-bce-date"]);
        assert_eq!(auth.signature(), REFERENCE_SIGNATURE);
        assert_eq!(auth.prefix(), REFERENCE_PREFIX);
        assert_eq!(
            auth.expires_at(),
            parse_timestamp("2024-01-01T00:30:00Z")
        );
    }

    #[test]
    fn test_should_reject_malformed_auth_strings() {
        let sig = "a".repeat(64);
        for bad in [
            String::new(),
            "bce-signer-v1".to_owned(),
            format!("bce-signer-v2/AK1/2024-01-01T00:00:00Z/1800/host/{sig}"),
            format!("bce-signer-v1//2024-01-01T00:00:00Z/1800/host/{sig}"),
            format!("bce-signer-v1/AK1/2024-01-01T00:00:00Z/-5/host/{sig}"),
            format!("bce-signer-v1/AK1/2024-01-01T00:00:00Z/+5/host/{sig}"),
            format!("bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host;;x-bce-date/{sig}"),
            "bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host/abc".to_owned(),
            format!("bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host/{}", "A".repeat(64)),
            format!("bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host/{sig}/extra"),
            "bce-signer-v1/AK1/2024-01-01T00:00:00Z/1800/host".to_owned(),
        ] {
            assert!(
                matches!(bad.parse::<AuthString>(), Err(AuthError::InvalidFormat(_))),
                "accepted {bad:?}"
            );
        }
    }
}
