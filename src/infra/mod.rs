//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides configuration file support and the top-level error type used by
//! the command-line surface.

pub mod config;
pub mod error;
