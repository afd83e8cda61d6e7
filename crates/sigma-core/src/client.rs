//! HTTP client settings and defaults.
//!
//! The core never retries a request on its own; these settings only bound how
//! long a single request and a single waited operation may take.

use std::time::Duration;

use crate::wait::WaitOptions;

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default read/write timeout per request in milliseconds
pub const DEFAULT_READ_WRITE_TIMEOUT_MS: u64 = 60_000;

/// Default deadline for `*_wait` operations in milliseconds
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 300_000;

/// Default extra delay between polls in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 0;

/// Maximum number of redirects followed by the HTTP transport
pub const MAX_REDIRECTS: usize = 10;

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Connect timeout (zero disables)
    pub connect_timeout: Duration,

    /// Read/write timeout per request (zero disables)
    pub read_write_timeout: Duration,

    /// Deadline for `*_wait` operations (zero waits unboundedly)
    pub operation_timeout: Duration,

    /// Extra delay between polls of a waited operation
    pub poll_interval: Duration,

    /// Enable request/response logging
    pub enable_logging: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_write_timeout: Duration::from_millis(DEFAULT_READ_WRITE_TIMEOUT_MS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            enable_logging: true,
        }
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read/write timeout.
    #[must_use]
    pub const fn with_read_write_timeout(mut self, timeout: Duration) -> Self {
        self.read_write_timeout = timeout;
        self
    }

    /// Set the deadline for `*_wait` operations.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the extra delay between polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Wait options derived from the operation timeout and poll interval.
    #[must_use]
    pub const fn wait_options(&self) -> WaitOptions {
        WaitOptions::new(self.operation_timeout).with_poll_interval(self.poll_interval)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
