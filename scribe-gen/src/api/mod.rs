//! HTTP API handlers for scribe-gen
//!
//! JSON in, JSON out. Every handler is a thin shim over [`crate::pipeline::Pipeline`];
//! pipeline errors map to HTTP statuses in [`crate::error::ApiError`].

pub mod generate;
pub mod health;
pub mod matrix;
pub mod rewrite;

pub use generate::generate_routes;
pub use health::health_routes;
pub use matrix::matrix_routes;
pub use rewrite::rewrite_routes;
