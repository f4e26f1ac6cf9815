//! Shared utilities for the dcp engine.
//!
//! This crate provides common utilities used across the dcp workspace:
//! - Prefixed identifier generation (ULID-backed and deterministic synthetic)
//! - Logging setup with tracing
//! - Path shortening for display
//! - Glob matching for protected-file patterns
//! - Token estimation heuristics

pub mod glob;
pub mod id;
pub mod log;
pub mod path;
pub mod token;

pub use glob::{matches_any, matches_glob};
pub use id::Identifier;
pub use token::{estimate_tokens, CharEstimator, TokenEstimator};
