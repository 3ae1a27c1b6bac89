//! Combo Check - Credential Batch Checker
//!
//! This is a combo list checker with proxy rotation and multi-threading support.
//! It reads `identifier:secret` pairs from a line-oriented file, attempts each
//! pair against a configured authentication endpoint through every proxy in a
//! proxy list, and splits the classified results into accepted, challenge and
//! rejected output files.

pub mod check;
pub mod config;

pub use check::*;
pub use config::RunConfig;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
