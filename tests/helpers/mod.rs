//! Shared helpers for the integration tests.
//!
//! Note: `helpers/mod.rs` rather than `helpers.rs`, since Cargo would compile a
//! top-level `tests/helpers.rs` as a test binary of its own.

pub mod scripted_source;
pub mod settle;
