//! Adapter between `http` requests and the signing core.
//!
//! Outgoing requests are signed in place with [`sign_request`], which carries
//! the authentication string either in the `Authorization` header or in the
//! `authorization` query parameter (a pre-signed URL). Incoming requests are
//! checked with [`verify_request`], which extracts the string from the same
//! two places.

use chrono::{DateTime, Utc};
use http::header::{AUTHORIZATION, HOST};
use http::uri::PathAndQuery;
use http::{HeaderMap, HeaderValue, Method, Uri};
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::canonical::AUTHORIZATION_PARAM;
use crate::credentials::CredentialProvider;
use crate::error::{AuthError, SignerError};
use crate::request::RequestDescriptor;
use crate::signing::{AuthString, DATE_HEADER, SigningContext, sign};
use crate::verify::{AuthResult, verify_at};

/// Where the authentication string travels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// The `Authorization` header.
    #[default]
    Header,
    /// The `authorization` query parameter.
    Query,
}

impl TryFrom<&http::request::Parts> for RequestDescriptor {
    type Error = AuthError;

    fn try_from(parts: &http::request::Parts) -> Result<Self, Self::Error> {
        build_descriptor(&parts.method, &parts.uri, &parts.headers)
            .ok_or_else(|| AuthError::InvalidFormat("request path is not valid UTF-8".to_owned()))
    }
}

/// Sign an outgoing request and attach the authentication string.
///
/// Before signing, the request gets a `host` header taken from the URI
/// authority when it has none. With [`Placement::Header`] it also gets an
/// `x-bce-date` header carrying the context timestamp when it has none.
/// [`Placement::Query`] leaves the headers at `host` so the resulting URL
/// verifies on its own; the timestamp travels in the authentication string.
///
/// # Errors
///
/// Returns [`SignerError::InvalidHeaderValue`] if a header cannot hold the
/// value, or [`SignerError::InvalidUri`] if the percent-decoded path is not
/// valid UTF-8 or the URI cannot take the query parameter.
///
/// # Examples
///
/// ```
/// use bce_auth::transport::{Placement, sign_request};
/// use bce_auth::{Credential, SigningContext};
///
/// let mut request = http::Request::builder()
///     .method("GET")
///     .uri("https://jowin-dev.bj.bcebos.com/meiyou")
///     .body(())
///     .unwrap();
/// let ctx = SigningContext::new(
///     Credential::new("AK1", "SK1").unwrap(),
///     "2024-01-01T00:00:00Z",
///     1800,
/// )
/// .unwrap();
///
/// let auth = sign_request(&mut request, &ctx, Placement::Header).unwrap();
/// assert_eq!(auth.signed_headers(), ["host", "x-bce-date"]);
/// assert_eq!(request.headers()["authorization"], auth.to_string().as_str());
/// ```
pub fn sign_request<B>(
    request: &mut http::Request<B>,
    ctx: &SigningContext,
    placement: Placement,
) -> Result<AuthString, SignerError> {
    if placement == Placement::Header && !request.headers().contains_key(DATE_HEADER) {
        let date = HeaderValue::from_str(ctx.timestamp())
            .map_err(|_| SignerError::InvalidHeaderValue)?;
        request.headers_mut().insert(DATE_HEADER, date);
    }
    if !request.headers().contains_key(HOST) {
        if let Some(authority) = request.uri().authority() {
            let host = HeaderValue::from_str(authority.as_str())
                .map_err(|_| SignerError::InvalidHeaderValue)?;
            request.headers_mut().insert(HOST, host);
        }
    }

    let descriptor = build_descriptor(request.method(), request.uri(), request.headers())
        .ok_or_else(|| SignerError::InvalidUri("path is not valid UTF-8".to_owned()))?;
    let auth = sign(&descriptor, ctx);
    let rendered = auth.to_string();

    match placement {
        Placement::Header => {
            let value =
                HeaderValue::from_str(&rendered).map_err(|_| SignerError::InvalidHeaderValue)?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Placement::Query => {
            let uri = append_query_param(request.uri(), AUTHORIZATION_PARAM, &rendered)?;
            *request.uri_mut() = uri;
        }
    }

    debug!(
        access_key = %ctx.credential().access_key(),
        ?placement,
        "Signed outgoing request"
    );

    Ok(auth)
}

/// Extract the authentication string from a received request.
///
/// The `Authorization` header wins over the `authorization` query parameter.
///
/// # Errors
///
/// Returns [`AuthError::MissingAuthString`] if neither is present, or
/// [`AuthError::InvalidFormat`] if the header is not valid UTF-8.
pub fn extract_auth_string(parts: &http::request::Parts) -> Result<String, AuthError> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        return value
            .to_str()
            .map(ToOwned::to_owned)
            .map_err(|_| AuthError::InvalidFormat("non UTF-8 Authorization header".to_owned()));
    }

    parts
        .uri
        .query()
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == AUTHORIZATION_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .ok_or(AuthError::MissingAuthString)
}

/// Verify a received request using the current wall-clock time.
///
/// # Errors
///
/// See [`verify_request_at`].
pub fn verify_request(
    parts: &http::request::Parts,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    verify_request_at(parts, credential_provider, Utc::now())
}

/// Verify a received request as of `now`.
///
/// # Errors
///
/// Returns [`AuthError::MissingAuthString`] when the request carries no
/// authentication string, [`AuthError::InvalidFormat`] when its decoded path
/// is not valid UTF-8, otherwise whatever [`verify_at`] reports.
pub fn verify_request_at(
    parts: &http::request::Parts,
    credential_provider: &dyn CredentialProvider,
    now: DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let auth_string = extract_auth_string(parts)?;
    let descriptor = RequestDescriptor::try_from(parts)?;
    verify_at(&descriptor, &auth_string, credential_provider, now)
}

/// Build a descriptor from the request line and headers.
///
/// The path is percent-decoded and the query is form-decoded, so that
/// canonicalization escapes the original values exactly once. Header values
/// that are not valid UTF-8 are skipped.
///
/// Returns `None` if the decoded path is not valid UTF-8.
fn build_descriptor(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> Option<RequestDescriptor> {
    let path = percent_decode_str(uri.path()).decode_utf8().ok()?;
    let mut descriptor = RequestDescriptor::new(method.as_str(), path);

    if let Some(query) = uri.query() {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            descriptor = descriptor.query(key, value);
        }
    }

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            descriptor = descriptor.header(name.as_str(), value);
        }
    }

    Some(descriptor)
}

/// Return `uri` with `key=value` appended to its query string.
fn append_query_param(uri: &Uri, key: &str, value: &str) -> Result<Uri, SignerError> {
    let pair: String = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    let path_and_query = match uri.query() {
        Some(query) if !query.is_empty() => format!("{}?{query}&{pair}", uri.path()),
        _ => format!("{}?{pair}", uri.path()),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| SignerError::InvalidUri(e.to_string()))?,
    );
    Uri::from_parts(parts).map_err(|e| SignerError::InvalidUri(e.to_string()))
}
