//! # sync-types
//!
//! Shared data types for the Bastion connectivity-aware write queue.
//!
//! This crate provides the foundational types used across all Bastion crates:
//! - [`PendingChange`], [`ChangeOperation`], [`StoredChange`] - Queued mutations
//! - [`ChangeId`], [`RecordId`] - Identity types
//! - [`Record`] - A JSON object as stored remotely
//! - [`BackendError`], [`ErrorKind`] - Structured backend failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod change;
mod error;
mod ids;

pub use change::{ChangeOperation, PendingChange, Record, StoredChange};
pub use error::{BackendError, ErrorKind};
pub use ids::{ChangeId, RecordId};
