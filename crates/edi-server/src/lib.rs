#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-server
//!
//! HTTP front end of the EDI processor.
//!
//! [`router`] builds the `axum` application: ingest, document and profile
//! endpoints behind request-id, panic recovery, access logging and security
//! header middleware, with per-route timeout, bulkhead and rate limiting.
//! The ingest route additionally sits behind a circuit breaker.
//!
//! Errors leave handlers as [`ApiError`] and are rendered as
//! `{error, message, request_id, details?}` with a status derived from
//! [`edi_pipeline::ErrorKind`].

pub mod config;
pub mod decode;
pub mod error;
pub mod middleware;
pub mod resilience;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
