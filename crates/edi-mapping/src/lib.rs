#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-mapping
//!
//! Decomposition of load tenders (204) into shipments and ordered stops.
//!
//! The decomposer reads the uniform segment tree produced by the X12 parser; no
//! per-segment types are involved. Unreadable dates and numbers are reported as `warn`
//! issues and leave the field empty.

pub mod dates;
pub mod decompose;
pub mod model;
pub mod references;

pub use decompose::{LOAD_TENDER, decompose};
pub use model::{Address, Party, Reference, Shipment, ShipmentStatus, Stop, StopType};
pub use references::business_reference;

use thiserror::Error;

/// Errors that can occur while rendering mapped data
#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
