//! Request transport seam.
//!
//! Everything above this module talks to the service through [`Transport`]:
//! one request in, one status/headers/body triple out. [`HttpTransport`] is
//! the reqwest-backed implementation used against the real API; in-process
//! doubles implement the same trait.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use url::Url;

use crate::client::{ClientConfig, MAX_REDIRECTS};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::query::QueryParams;

/// Header carrying the correlation identifier of a request.
pub const CORRELATION_HEADER: &str = "x-sigma-id";

/// Content type sent with JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const USER_AGENT: &str = concat!("sigma-rust/", env!("CARGO_PKG_VERSION"));

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Path below the API base, e.g. `servers/{uuid}/action/`
    pub path: String,
    /// Query parameters
    pub query: QueryParams,
    /// Extra request headers
    pub headers: HeaderMap,
    /// JSON body, if any
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a request without query, headers or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Shorthand for a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Replace the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Attach a raw JSON body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `payload` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if serialization fails.
    pub fn with_json<T>(self, payload: &T) -> Result<Self>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)?;
        Ok(self.with_body(body))
    }

    /// Set the correlation identifier header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the identifier is not a valid header value.
    pub fn with_correlation_id(mut self, id: impl AsRef<str>) -> Result<Self> {
        let value = HeaderValue::from_str(id.as_ref())
            .map_err(|e| Error::Precondition(format!("invalid correlation id: {e}")))?;
        self.headers
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
        Ok(self)
    }

    /// Correlation identifier header, if set.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        header_str(&self.headers, CORRELATION_HEADER)
    }
}

/// A response as seen by the core.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
}

impl Response {
    /// Create a response with no headers.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the body does not decode into `T`.
    pub fn json<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::Parse(format!(
                "{e} (status {}, body {:?})",
                self.status,
                String::from_utf8_lossy(&self.body)
            ))
        })
    }

    /// Body as lossy UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Correlation identifier header, if present.
    #[must_use]
    pub fn correlation_id(&self) -> Option<&str> {
        header_str(&self.headers, CORRELATION_HEADER)
    }

    /// Succeed only when the status equals `expected`; otherwise build a service error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Service`] carrying the status and parsed payload.
    pub fn expect_status(self, expected: StatusCode) -> Result<Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(Error::from_service_response(self.status.as_u16(), &self.body))
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Carries a request to the service and returns its response.
///
/// Implementations never retry and never interpret the status code.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request.
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Transport over HTTPS using reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: Url,
    client: reqwest::Client,
    user: Option<String>,
    password: Option<std::sync::Arc<SecretString>>,
    enable_logging: bool,
}

impl HttpTransport {
    /// Create a transport for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS));
        if !config.connect_timeout.is_zero() {
            builder = builder.connect_timeout(config.connect_timeout);
        }
        if !config.read_write_timeout.is_zero() {
            builder = builder.timeout(config.read_write_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            client,
            user: None,
            password: None,
            enable_logging: config.enable_logging,
        })
    }

    /// Create an authenticated transport from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_configuration(config: &Configuration) -> Result<Self> {
        config.check()?;
        let base_url = config.resolve_endpoint()?;
        Ok(Self::new(base_url, &config.client_config())?
            .with_basic_auth(&config.credentials.user, config.credentials.password()))
    }

    /// Attach basic-auth credentials to every request.
    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(std::sync::Arc::new(SecretString::from(password.into())));
        self
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &Request) -> Result<Url> {
        let mut url = self.base_url.join(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.as_pairs().iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let url = self.url_for(&request)?;
        if self.enable_logging {
            debug!(method = %request.method, %url, "sending request");
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .headers(request.headers.clone())
            .header("Accept", "application/json");
        if let Some(user) = &self.user {
            let password = self.password.as_ref().map(|p| p.expose_secret().to_string());
            builder = builder.basic_auth(user, password);
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if self.enable_logging {
            debug!(%url, status = status.as_u16(), bytes = body.len(), "received response");
        }

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, config: &ClientConfig) -> HttpTransport {
        let base = Url::parse(&format!("{}/api/2.0/", server.uri())).unwrap();
        HttpTransport::new(base, config).unwrap()
    }

    #[tokio::test]
    async fn send_joins_path_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/drives/d1/action/"))
            .and(query_param("do", "clone"))
            .and(query_param("avoid", "u1,u2"))
            .respond_with(ResponseTemplate::new(202).set_body_string("{}"))
            .mount(&server)
            .await;

        let mut query = QueryParams::new();
        query.push("do", "clone");
        query.push_list("avoid", ["u1", "u2"]);
        let request = Request::post("drives/d1/action/").with_query(query);

        let response = transport(&server, &ClientConfig::new())
            .send(request)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn send_applies_basic_auth_and_json_body() {
        let server = MockServer::start().await;
        // "user:pass" base64 encoded
        Mock::given(method("POST"))
            .and(path("/api/2.0/servers/"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(header("content-type", JSON_CONTENT_TYPE))
            .and(body_json(serde_json::json!({"name": "vm"})))
            .respond_with(ResponseTemplate::new(201).set_body_string("{}"))
            .mount(&server)
            .await;

        let request = Request::post("servers/")
            .with_json(&serde_json::json!({"name": "vm"}))
            .unwrap();
        let response = transport(&server, &ClientConfig::new())
            .with_basic_auth("user", "pass")
            .send(request)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn send_returns_non_success_without_interpreting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/2.0/servers/missing/"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"[{"error_point":null,"error_type":"notexist","error_message":"notfound"}]"#,
            ))
            .mount(&server)
            .await;

        let response = transport(&server, &ClientConfig::new())
            .send(Request::get("servers/missing/"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        let err = response.expect_status(StatusCode::OK).unwrap_err();
        assert_eq!(err.service_message(), Some("notfound"));
    }

    #[tokio::test]
    async fn read_timeout_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let config = ClientConfig::new().with_read_write_timeout(Duration::from_millis(50));
        let err = transport(&server, &config)
            .send(Request::get("servers/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn correlation_header_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header(CORRELATION_HEADER, "42"))
            .respond_with(ResponseTemplate::new(200).insert_header(CORRELATION_HEADER, "42"))
            .mount(&server)
            .await;

        let request = Request::get("jobs/").with_correlation_id("42").unwrap();
        assert_eq!(request.correlation_id(), Some("42"));

        let response = transport(&server, &ClientConfig::new())
            .send(request)
            .await
            .unwrap();
        assert_eq!(response.correlation_id(), Some("42"));
    }

    #[test]
    fn from_configuration_requires_valid_config() {
        let config = Configuration::new("zrh", Credentials::basic("me", "pw")).unwrap();
        let transport = HttpTransport::from_configuration(&config).unwrap();
        assert_eq!(
            transport.base_url().as_str(),
            "https://zrh.cloudsigma.com/api/2.0/"
        );
        assert!(!format!("{transport:?}").contains("pw"));
    }

    #[test]
    fn response_json_reports_body_on_failure() {
        let response = Response::new(StatusCode::OK, "not json");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.to_string().contains("not json"));
    }
}
