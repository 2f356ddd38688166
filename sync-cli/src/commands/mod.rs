//! CLI command implementations.

pub mod admin;
pub mod queue;
pub mod status;
pub mod submit;
