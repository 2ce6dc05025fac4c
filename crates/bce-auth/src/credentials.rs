//! Credentials and credential lookup.
//!
//! A [`Credential`] is the AK/SK pair a client signs with. On the verifying
//! side a [`CredentialProvider`] resolves the secret key for the access key
//! embedded in an incoming authentication string.

use std::collections::HashMap;
use std::fmt;

use crate::error::{AuthError, SignerError};

/// An access key / secret key pair.
///
/// The access key is public and travels inside every authentication string;
/// the secret key never leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_key: String,
    secret_key: String,
}

impl Credential {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidCredential`] if either key is empty or the
    /// access key contains `/`, which would corrupt the authentication string.
    ///
    /// # Examples
    ///
    /// ```
    /// use bce_auth::Credential;
    ///
    /// let credential = Credential::new("AK1", "SK1").unwrap();
    /// assert_eq!(credential.access_key(), "AK1");
    /// assert!(Credential::new("", "SK1").is_err());
    /// ```
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, SignerError> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();

        if access_key.is_empty() {
            return Err(SignerError::InvalidCredential("access key is empty"));
        }
        if access_key.contains('/') {
            return Err(SignerError::InvalidCredential("access key contains '/'"));
        }
        if secret_key.is_empty() {
            return Err(SignerError::InvalidCredential("secret key is empty"));
        }

        Ok(Self {
            access_key,
            secret_key,
        })
    }

    /// The public access key identifier.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The shared secret.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Trait for looking up secret keys by access key.
///
/// Implementations may back this with a database, configuration file,
/// or any other credential store. Lookups must be safe to call concurrently.
pub trait CredentialProvider: Send + Sync {
    /// Retrieve the secret key for the given access key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownCredential`] if the access key is not recognized.
    fn get_secret_key(&self, access_key: &str) -> Result<String, AuthError>;
}

/// A simple in-memory credential provider backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use bce_auth::credentials::{CredentialProvider, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(vec![
///     ("00862f7e445143478fa2b1483874d365".to_owned(), "31dab24594ca410d9ecd3d65874938cb".to_owned()),
/// ]);
///
/// let secret = provider.get_secret_key("00862f7e445143478fa2b1483874d365").unwrap();
/// assert_eq!(secret, "31dab24594ca410d9ecd3d65874938cb");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, String>,
}

impl StaticCredentialProvider {
    /// Create a new `StaticCredentialProvider` from an iterable of (access_key, secret_key) pairs.
    pub fn new(credentials: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            credentials: credentials.into_iter().collect(),
        }
    }
}

impl From<&Credential> for StaticCredentialProvider {
    fn from(credential: &Credential) -> Self {
        Self::new([(
            credential.access_key.clone(),
            credential.secret_key.clone(),
        )])
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_secret_key(&self, access_key: &str) -> Result<String, AuthError> {
        self.credentials
            .get(access_key)
            .cloned()
            .ok_or_else(|| AuthError::UnknownCredential(access_key.to_owned()))
    }
}
