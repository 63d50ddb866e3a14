#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-profile
//!
//! Trading partner profiles.
//!
//! A profile tells the engine how a partner writes X12: which delimiters to expect,
//! how strictly to judge deviations, which transaction sets are recognized and which
//! partner-specific rules apply. Profiles are imported from JSON, persisted behind the
//! [`ProfileStore`] trait and optionally fronted by a [`ProfileCache`].

pub mod loader;
pub mod model;
pub mod registry;
pub mod store;

pub use loader::{FieldViolation, export, import};
pub use model::{
    AcknowledgmentConfig, DateFormat, Delimiters, EnvelopeConfig, FormatConfig, PartnerProfile,
    ProfileConfiguration, RateLimitConfig, Strictness, ValidationConfig,
};
pub use registry::ProfileCache;
pub use store::ProfileStore;

use thiserror::Error;

/// Errors that can occur when working with partner profiles
#[derive(Error, Debug)]
pub enum Error {
    #[error("Profile not found: {partner_id}")]
    NotFound { partner_id: String },

    #[error("Invalid profile: {}", summarize(.violations))]
    Invalid { violations: Vec<FieldViolation> },

    #[error("Invalid profile format: {0}")]
    InvalidFormat(String),

    #[error("Profile conflict: {0}")]
    Conflict(String),

    #[error("Profile storage unavailable: {0}")]
    Unavailable(String),

    #[error("Profile storage error: {0}")]
    Storage(String),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn not_found(partner_id: impl Into<String>) -> Self {
        Self::NotFound {
            partner_id: partner_id.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_error_lists_every_field() {
        let err = Error::Invalid {
            violations: vec![
                FieldViolation::new("partner_id", "must be 3-50 characters", "pattern"),
                FieldViolation::new("configuration.format.delimiters.element", "required", "required"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Invalid profile: partner_id: must be 3-50 characters; configuration.format.delimiters.element: required"
        );
    }
}
