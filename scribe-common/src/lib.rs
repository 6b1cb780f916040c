//! # Scribe Common Library
//!
//! Shared code for the Scribe services:
//! - Configuration loading (TOML file, environment, compiled defaults)
//! - Backend credential resolution
//! - Common error types

pub mod config;
pub mod error;

pub use config::FailurePolicy;
pub use error::{Error, Result};
