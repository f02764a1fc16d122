//! Axum HTTP API server.
//!
//! This crate provides:
//! - The generate / status / cancel surface over the run registry
//! - Static serving of the public asset directory
//! - Liveness and readiness probes
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
