//! Configuration for the `bce-signer` binary.
//!
//! All configuration is driven by environment variables; command-line flags
//! override individual fields.

use std::fmt;

use anyhow::{Context, Result};
use bce_auth::Credential;

/// Default validity window of a signature, in seconds.
pub const DEFAULT_EXPIRATION_SECS: u64 = 1800;

/// Configuration for the signer binary.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerConfig {
    /// Access key identifier.
    pub access_key: Option<String>,
    /// Secret key. Never serialized.
    #[serde(skip_serializing, default)]
    pub secret_key: Option<String>,
    /// Validity window of produced signatures.
    pub expiration_secs: u64,
    /// Log level.
    pub log_level: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            expiration_secs: DEFAULT_EXPIRATION_SECS,
            log_level: "info".to_owned(),
        }
    }
}

impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("expiration_secs", &self.expiration_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl SignerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BCE_EXPIRATION_SECONDS` is not a non-negative integer.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("BCE_ACCESS_KEY") {
            config.access_key = Some(v);
        }
        if let Some(v) = lookup("BCE_SECRET_KEY") {
            config.secret_key = Some(v);
        }
        if let Some(v) = lookup("BCE_EXPIRATION_SECONDS") {
            config.expiration_secs = v
                .trim()
                .parse()
                .with_context(|| format!("invalid BCE_EXPIRATION_SECONDS: {v}"))?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Build the signing credential.
    ///
    /// # Errors
    ///
    /// Returns an error if either key is missing or unusable.
    pub fn credential(&self) -> Result<Credential> {
        let access_key = self
            .access_key
            .as_deref()
            .context("no access key configured (set BCE_ACCESS_KEY or pass --access-key)")?;
        let secret_key = self
            .secret_key
            .as_deref()
            .context("no secret key configured (set BCE_SECRET_KEY or pass --secret-key)")?;

        Credential::new(access_key, secret_key).context("invalid credential configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_should_create_default_config() {
        let config = SignerConfig::default();
        assert_eq!(config.expiration_secs, 1800);
        assert_eq!(config.log_level, "info");
        assert!(config.access_key.is_none());
        assert!(config.credential().is_err());
    }

    #[test]
    fn test_should_load_config_from_variables() {
        let config = SignerConfig::from_lookup(lookup_from(&[
            ("BCE_ACCESS_KEY", "AK1"),
            ("BCE_SECRET_KEY", "SK1"),
            ("BCE_EXPIRATION_SECONDS", "600"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.expiration_secs, 600);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.credential().unwrap().access_key(), "AK1");
    }

    #[test]
    fn test_should_reject_invalid_expiration() {
        let result = SignerConfig::from_lookup(lookup_from(&[("BCE_EXPIRATION_SECONDS", "-1")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_should_not_serialize_or_debug_secret() {
        let config = SignerConfig {
            access_key: Some("AK1".to_owned()),
            secret_key: Some("very-secret".to_owned()),
            ..SignerConfig::default()
        };

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"accessKey\":\"AK1\""));
        assert!(!json.contains("very-secret"));
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
