//! # sigma-core
//!
//! Core types and operation tracking for the CloudSigma API.
//!
//! This crate provides the error taxonomy, configuration, the request
//! transport seam and the completion waiter that the typed client builds on.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and structured service errors
//! - [`ids`] - Strongly-typed resource identifiers
//! - [`types`] - Resource state machines (server, drive, job)
//! - [`config`] - Client configuration, endpoint resolution and credentials
//! - [`client`] - HTTP client settings and defaults
//! - [`query`] - Query parameter builder
//! - [`transport`] - The `Transport` trait and its reqwest implementation
//! - [`wait`] - Completion waiter with cancellable timeout watcher

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod query;
pub mod transport;
pub mod types;
pub mod wait;

// Re-export commonly used types
pub use error::{Error, Result, ServiceErrorPayload};
pub use transport::{HttpTransport, Request, Response, Transport};
pub use wait::{wait_for, Observe, WaitOptions};
