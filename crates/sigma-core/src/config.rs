//! Configuration structures for CloudSigma clients.
//!
//! This module provides the user-facing configuration (endpoint, credentials,
//! timeouts), region endpoint resolution and credential verification.

use crate::client::{
    ClientConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_OPERATION_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_READ_WRITE_TIMEOUT_MS,
};
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;
use validator::{Validate, ValidationError};

/// Default CloudSigma region.
pub const DEFAULT_REGION: &str = "zrh";

/// Known region short names and their API endpoints.
pub const REGIONS: &[(&str, &str)] = &[
    ("zrh", "https://zrh.cloudsigma.com/api/2.0/"),
    ("lvs", "https://lvs.cloudsigma.com/api/2.0/"),
];

/// Authentication scheme used by a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// HTTP basic authentication
    #[default]
    Basic,
    /// HTTP digest authentication (not supported)
    Digest,
    /// Session cookie authentication (not supported)
    Cookie,
}

/// Account credentials.
#[derive(Serialize, Deserialize)]
pub struct Credentials {
    /// Authentication scheme
    #[serde(default)]
    pub auth_type: AuthType,

    /// Account user name (usually the e-mail address)
    pub user: String,

    /// Account password
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Credentials {
    /// Create basic-auth credentials.
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic,
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Expose the password for header construction.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Verify the credentials can be used.
    ///
    /// # Errors
    ///
    /// Returns an error for unsupported schemes or empty user/password.
    pub fn verify(&self) -> Result<(), Error> {
        match self.auth_type {
            AuthType::Basic => {}
            AuthType::Digest | AuthType::Cookie => {
                return Err(Error::Config(format!(
                    "authentication type {:?} is not supported",
                    self.auth_type
                )))
            }
        }

        if self.user.is_empty() {
            return Err(Error::Config("username is not allowed to be empty".into()));
        }
        if self.password().is_empty() {
            return Err(Error::Config("password is not allowed to be empty".into()));
        }
        Ok(())
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self {
            auth_type: self.auth_type,
            user: self.user.clone(),
            password: SecretString::from(self.password().to_string()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_type", &self.auth_type)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for a CloudSigma client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Configuration {
    /// Region short name (`zrh`, `lvs`) or API URL
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Account credentials
    pub credentials: Credentials,

    /// Connect timeout in milliseconds (0 disables)
    #[validate(range(max = 600_000))]
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout per request in milliseconds (0 disables)
    #[validate(range(max = 3_600_000))]
    #[serde(default = "default_read_write_timeout_ms")]
    pub read_write_timeout_ms: u64,

    /// Deadline for `*_wait` operations in milliseconds (0 waits unboundedly)
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Extra delay between polls of a waited operation in milliseconds
    #[validate(range(max = 60_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Permit plain `http` endpoints (local test doubles only)
    #[serde(default)]
    pub allow_http: bool,
}

const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

const fn default_read_write_timeout_ms() -> u64 {
    DEFAULT_READ_WRITE_TIMEOUT_MS
}

const fn default_operation_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_MS
}

const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Configuration {
    /// Create a new configuration with required parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or credentials are invalid.
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            credentials,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_write_timeout_ms: default_read_write_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            allow_http: false,
        };
        config.check()?;
        Ok(config)
    }

    /// Run field validation, credential and endpoint checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::InvalidEndpoint`] on failure.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
        self.credentials.verify()?;
        self.resolve_endpoint()?;
        Ok(())
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the per-request read/write timeout.
    #[must_use]
    pub fn with_read_write_timeout(mut self, timeout: Duration) -> Self {
        self.read_write_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the deadline for `*_wait` operations.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the extra delay between polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Permit plain `http` endpoints.
    #[must_use]
    pub const fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Resolve the configured endpoint into an API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be resolved.
    pub fn resolve_endpoint(&self) -> Result<Url, Error> {
        if self.allow_http {
            resolve_endpoint_with(&self.endpoint, &["https", "http"])
        } else {
            resolve_endpoint(&self.endpoint)
        }
    }

    /// Derive the HTTP client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_read_write_timeout(Duration::from_millis(self.read_write_timeout_ms))
            .with_operation_timeout(Duration::from_millis(self.operation_timeout_ms))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolve a region short name or https URL into an API base URL.
///
/// URLs get a trailing slash so relative resource paths join below them.
///
/// # Errors
///
/// Returns an error for empty, non-https, credential-bearing or query-bearing endpoints.
pub fn resolve_endpoint(endpoint: &str) -> Result<Url, Error> {
    resolve_endpoint_with(endpoint, &["https"])
}

/// Resolve an endpoint accepting any of the given URL schemes.
///
/// # Errors
///
/// Returns an error for empty, credential-bearing or query-bearing endpoints,
/// and for schemes not listed in `schemes`.
pub fn resolve_endpoint_with(endpoint: &str, schemes: &[&str]) -> Result<Url, Error> {
    let endpoint = endpoint.trim();
    if let Some((_, url)) = REGIONS.iter().find(|(name, _)| *name == endpoint) {
        return Ok(Url::parse(url)?);
    }

    if endpoint.is_empty() {
        return Err(Error::InvalidEndpoint(
            "endpoint is not allowed to be empty".into(),
        ));
    }

    let mut endpoint = endpoint.to_string();
    if !endpoint.ends_with('/') {
        endpoint.push('/');
    }

    let url = Url::parse(&endpoint)?;
    verify_endpoint(&url, schemes)?;
    Ok(url)
}

fn verify_endpoint(url: &Url, schemes: &[&str]) -> Result<(), Error> {
    if !schemes.contains(&url.scheme()) {
        return Err(Error::InvalidEndpoint(format!(
            "endpoint must use {} scheme",
            schemes.join(" or ")
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(Error::InvalidEndpoint(
            "auth information is not allowed in the endpoint string".into(),
        ));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::InvalidEndpoint(
            "query information is not allowed in the endpoint string".into(),
        ));
    }
    Ok(())
}

/// Validator hook usable on string fields holding an endpoint.
///
/// # Errors
///
/// Returns a validation error when [`resolve_endpoint`] fails.
pub fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    resolve_endpoint(endpoint)
        .map(|_| ())
        .map_err(|_| ValidationError::new("endpoint"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::basic("user@example.com", "secret")
    }

    #[test]
    fn test_resolve_region_names() {
        assert_eq!(
            resolve_endpoint("zrh").unwrap().as_str(),
            "https://zrh.cloudsigma.com/api/2.0/"
        );
        assert_eq!(
            resolve_endpoint("lvs").unwrap().as_str(),
            "https://lvs.cloudsigma.com/api/2.0/"
        );
    }

    #[test]
    fn test_resolve_appends_trailing_slash() {
        let url = resolve_endpoint(" https://example.com/api/2.0 ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/2.0/");
        assert_eq!(url.join("servers/").unwrap().path(), "/api/2.0/servers/");
    }

    #[test]
    fn test_resolve_rejects_bad_endpoints() {
        assert!(resolve_endpoint("").is_err());
        assert!(resolve_endpoint("http://example.com/api/2.0/").is_err());
        assert!(resolve_endpoint("https://user:pw@example.com/api/2.0/").is_err());
        assert!(resolve_endpoint("https://example.com/api/2.0/?x=1").is_err());
        assert!(resolve_endpoint("https://example.com/api/2.0/#frag").is_err());
        assert!(validate_endpoint("ftp://example.com/").is_err());
        assert!(validate_endpoint("zrh").is_ok());
    }

    #[test]
    fn test_allow_http_for_local_doubles() {
        let config = Configuration::new("zrh", creds())
            .unwrap()
            .with_allow_http(true);
        let config = Configuration {
            endpoint: "http://127.0.0.1:8080/api/2.0".into(),
            ..config
        };
        assert!(config.check().is_ok());
        assert_eq!(
            config.resolve_endpoint().unwrap().as_str(),
            "http://127.0.0.1:8080/api/2.0/"
        );
    }

    #[test]
    fn test_credentials_verify() {
        assert!(creds().verify().is_ok());
        assert!(Credentials::basic("", "secret").verify().is_err());
        assert!(Credentials::basic("user", "").verify().is_err());

        let mut digest = creds();
        digest.auth_type = AuthType::Digest;
        assert!(digest.verify().is_err());
    }

    #[test]
    fn test_credentials_are_redacted() {
        let creds = creds();
        assert!(!format!("{creds:?}").contains("secret"));
        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("secret"));
        assert_eq!(creds.clone().password(), "secret");
    }

    #[test]
    fn test_configuration_defaults() {
        let config = Configuration::new("zrh", creds()).unwrap();
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
        assert_eq!(config.read_write_timeout_ms, DEFAULT_READ_WRITE_TIMEOUT_MS);
        assert_eq!(config.operation_timeout_ms, DEFAULT_OPERATION_TIMEOUT_MS);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(!config.allow_http);
    }

    #[test]
    fn test_configuration_rejects_invalid() {
        assert!(Configuration::new("", creds()).is_err());
        assert!(Configuration::new("http://example.com/", creds()).is_err());
        assert!(Configuration::new("zrh", Credentials::basic("u", "")).is_err());
    }

    #[test]
    fn test_configuration_deserialize() {
        let json = r#"{
            "endpoint": "lvs",
            "credentials": {"user": "me@example.com", "password": "pw"},
            "operation_timeout_ms": 1500
        }"#;
        let config: Configuration = serde_json::from_str(json).unwrap();
        assert!(config.check().is_ok());
        assert_eq!(config.credentials.auth_type, AuthType::Basic);
        assert_eq!(config.credentials.password(), "pw");
        assert_eq!(config.operation_timeout_ms, 1500);
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[test]
    fn test_configuration_range_validation() {
        let mut config = Configuration::new("zrh", creds()).unwrap();
        config.poll_interval_ms = 120_000;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_client_config_from_configuration() {
        let config = Configuration::new("zrh", creds())
            .unwrap()
            .with_operation_timeout(Duration::from_millis(250))
            .with_poll_interval(Duration::from_millis(20));
        let http = config.client_config();
        assert_eq!(http.operation_timeout, Duration::from_millis(250));
        assert_eq!(http.poll_interval, Duration::from_millis(20));
    }
}
