//! BCE AK/SK request signing (`bce-signer-v1`).
//!
//! This crate turns an HTTP request and a secret key into an authentication
//! string, and verifies such strings on the receiving side. Client and server
//! run the same deterministic pipeline:
//!
//! 1. Build the canonical request (method, URI, query string, selected headers).
//! 2. Derive a per-request signing key from the secret key, access key,
//!    timestamp and validity window.
//! 3. HMAC-SHA256 the canonical request with the derived key.
//! 4. Assemble `bce-signer-v1/<ak>/<timestamp>/<validity>/<signedHeaders>/<signature>`.
//!
//! # Usage
//!
//! ```rust
//! use bce_auth::{Credential, RequestDescriptor, SigningContext, StaticCredentialProvider};
//! use bce_auth::{sign, verify_at};
//! use bce_auth::signing::parse_timestamp;
//!
//! let credential = Credential::new("AK1", "SK1").unwrap();
//! let ctx = SigningContext::new(credential.clone(), "2024-01-01T00:00:00Z", 1800).unwrap();
//! let request = RequestDescriptor::new("GET", "/meiyou")
//!     .header("Host", "jowin-dev.bj.bcebos.com")
//!     .header("x-bce-date", "2024-01-01T00:00:00Z");
//!
//! let auth = sign(&request, &ctx).to_string();
//!
//! let provider = StaticCredentialProvider::from(&credential);
//! let now = parse_timestamp("2024-01-01T00:05:00Z").unwrap();
//! assert!(verify_at(&request, &auth, &provider, now).is_ok());
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical request construction
//! - [`credentials`] - Credentials, the credential provider trait and an in-memory store
//! - [`error`] - Rejection and configuration error types
//! - [`request`] - Transport-independent request description
//! - [`signing`] - Signing key derivation, signing and the authentication string type
//! - [`transport`] - Signing and verifying `http::Request` values
//! - [`verify`] - Verification of received authentication strings

pub mod canonical;
pub mod credentials;
pub mod error;
pub mod request;
pub mod signing;
pub mod transport;
pub mod verify;

pub use credentials::{Credential, CredentialProvider, StaticCredentialProvider};
pub use error::{AuthError, SignerError};
pub use request::RequestDescriptor;
pub use signing::{AuthString, SigningContext, derive_signing_key, sign};
pub use transport::{Placement, sign_request, verify_request};
pub use verify::{AuthResult, verify, verify_at};
