#![deny(unsafe_code)]

//! Shared test utilities for the hydrator workspace.
//!
//! Provides reusable fixtures, config builders, provider doubles, a fake
//! Redis server and tracing helpers so that individual crate tests stay
//! concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! hydrator-test-utils = { workspace = true }
//! ```

pub mod books;
pub mod config;
pub mod fake_redis;
pub mod providers;
pub mod tracing_setup;
