//! # sigma-mock
//!
//! In-process stand-in for the CloudSigma API.
//!
//! [`SimulatedBackend`] implements [`sigma_core::Transport`], so a
//! [`sigma_api::SigmaClient`] built with [`SimulatedBackend::client`] runs
//! every operation, wait included, without a network. Accepted actions settle
//! after a configurable delay and every request is recorded in a [`Journal`]
//! under its correlation identifier.
//!
//! ## Modules
//!
//! - [`backend`] - Request routing, handlers and test helpers
//! - [`store`] - Per-collection resource storage
//! - [`scheduler`] - Cancellable delayed transitions
//! - [`journal`] - Correlation-keyed request log

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod journal;
pub mod scheduler;
pub mod store;

pub use backend::{BackendOptions, SimulatedBackend, DEFAULT_REQUEST_LATENCY, DEFAULT_TRANSITION_DELAY};
pub use journal::{Journal, JournalEntry};
pub use scheduler::Scheduler;
pub use store::{MemoryStore, ResourceStore};
