#![deny(unsafe_code)]

//! Shared test utilities for the auxproc workspace.
//!
//! Provides reusable fixtures, config builders, record builders, and
//! tracing helpers so that individual crate tests stay concise and
//! consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! auxproc-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod records;
pub mod tracing_setup;
