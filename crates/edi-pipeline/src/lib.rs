#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-pipeline
//!
//! The EDI processor service and its error taxonomy.
//!
//! [`EdiProcessor::process`] runs profile lookup, parsing, validation and
//! decomposition, then persists the whole document tree in one transaction.
//! [`AckService`] renders functional acknowledgments for stored documents on demand.
//!
//! Every failure leaving this crate is one of the kinds in [`ErrorKind`]; the
//! transport maps those to status codes without looking at lower-layer errors.

pub mod ack;
pub mod processor;

pub use ack::AckService;
pub use processor::{EdiProcessor, ProcessOutcome};

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl From<edi_profile::FieldViolation> for FieldError {
    fn from(violation: edi_profile::FieldViolation) -> Self {
        Self {
            field: violation.field,
            message: violation.message,
            code: violation.code,
        }
    }
}

/// Errors that can occur while serving EDI requests
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    RateLimit,
    Unavailable,
    Internal,
}

impl ErrorKind {
    /// Machine-readable code used in error responses.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::RateLimit => "RATE_LIMITED",
            ErrorKind::Unavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// A validation failure attributed to a single field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation {
            fields: vec![FieldError::new(field, message.clone(), code)],
            message,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::RateLimit(_) => ErrorKind::RateLimit,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unavailable | ErrorKind::Internal)
    }

    pub fn fields(&self) -> &[FieldError] {
        match self {
            Error::Validation { fields, .. } => fields,
            _ => &[],
        }
    }
}

impl From<edi_adapter_db::Error> for Error {
    fn from(err: edi_adapter_db::Error) -> Self {
        match err {
            edi_adapter_db::Error::Conflict { details } => Error::Conflict(details),
            edi_adapter_db::Error::NotFound { entity, id } => Error::NotFound(format!("{entity} not found: {id}")),
            edi_adapter_db::Error::Invalid { details } => Error::validation(details),
            err if err.is_unavailable() => Error::Unavailable(err.to_string()),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<edi_profile::Error> for Error {
    fn from(err: edi_profile::Error) -> Self {
        match err {
            edi_profile::Error::NotFound { partner_id } => {
                Error::NotFound(format!("partner profile not found: {partner_id}"))
            }
            edi_profile::Error::Invalid { violations } => Error::Validation {
                message: "invalid partner profile".to_string(),
                fields: violations.into_iter().map(FieldError::from).collect(),
            },
            edi_profile::Error::InvalidFormat(message) => Error::validation(message),
            edi_profile::Error::Conflict(message) => Error::Conflict(message),
            edi_profile::Error::Unavailable(message) => Error::Unavailable(message),
            edi_profile::Error::Storage(message) => Error::Internal(message),
        }
    }
}

impl From<edi_adapter_x12::Error> for Error {
    fn from(err: edi_adapter_x12::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<edi_ir::Error> for Error {
    fn from(err: edi_ir::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<edi_mapping::Error> for Error {
    fn from(err: edi_mapping::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
