//! Typed CloudSigma client, resource handles and job tracking.
//!
//! [`SigmaClient`] issues requests through a [`sigma_core::Transport`] and
//! hands out [`Server`], [`Drive`] and [`Job`] handles. Handles own a snapshot
//! of their record; `refresh` replaces it and the `*_wait` operations refresh
//! until the asynchronous action has settled.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod client;
pub mod drive;
pub mod job;
pub mod models;
pub mod server;

pub use client::{SigmaClient, SigmaClientBuilder};
pub use drive::Drive;
pub use job::{track_job, Job};
pub use models::{
    Action, ActionResult, AttachedDrive, AvoidList, CloneParams, ContextDrive, ContextIp,
    ContextIpV4Conf, ContextNic, DriveRecord, DriveSummary, JobData, JobRecord, ListEnvelope,
    Meta, NicKind, NicRecord, NicSpec, Resource, RuntimeNic, ServerComponents, ServerContext,
    ServerRecord, ServerSummary, ServerTemplate,
};
pub use server::Server;

/// Convenient result alias that reuses the shared sigma error type.
pub type Result<T> = sigma_core::Result<T>;
