//! # sync-core
//!
//! Pure logic for Bastion (no I/O, instant tests).
//!
//! This crate implements the state machines, queues and validation rules
//! for the write queue and the submission resources without any network or
//! disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (backend calls, timers, storage) is performed by
//! `sync-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod queue;
pub mod schema;
pub mod schemas;
pub mod state;

pub use queue::OperationQueue;
pub use schema::{
    FieldError, FieldKind, FieldSpec, ParseStatusError, ResourceSchema, SubmissionStatus,
    SYSTEM_FIELDS,
};
pub use state::{Action, ConnectionState, Event, RetryPolicy, BASE_DELAY, MAX_RETRIES};
