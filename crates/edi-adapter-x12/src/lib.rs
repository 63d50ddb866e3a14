#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-adapter-x12
//!
//! ANSI X12 parser/serializer, envelope handling and functional acknowledgments.
//!
//! Parsing is pure: bytes and options in, an [`Interchange`](edi_ir::Interchange) tree
//! plus issues out. Structural violations that prevent continuing are reported as a
//! [`ParseError`]; everything else (count and control number mismatches, unknown
//! segments, delimiter deviations under lax strictness) becomes an issue.

pub mod ack;
pub mod dictionary;
pub mod envelopes;
pub mod parser;
pub mod serializer;
pub mod syntax;

pub use ack::{AckGenerator, AckOptions, AckStatus, AckType, Acknowledgment};
pub use parser::{ParseOptions, X12Parser, parse};
pub use serializer::X12Serializer;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a fatal parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParseErrorKind {
    /// Input does not start with an ISA segment
    MissingIsa,
    /// ISA is shorter than 106 bytes or not fixed-width
    InvalidIsa,
    /// Delimiters are unusable (repeated, alphanumeric)
    InvalidDelimiters,
    /// Declared and detected delimiters disagree under strict handling
    DelimiterMismatch,
    /// Segment terminator found inside an element value under strict handling
    EmbeddedSegmentTerminator,
    /// A segment appeared where the envelope does not allow it
    UnexpectedSegment,
    /// Input ended before the envelope was closed
    UnexpectedEnd,
    /// An envelope segment lacks a required element
    InvalidEnvelope,
    /// Non-whitespace data follows IEA
    TrailingData,
}

impl ParseErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseErrorKind::MissingIsa => "MISSING_ISA",
            ParseErrorKind::InvalidIsa => "INVALID_ISA",
            ParseErrorKind::InvalidDelimiters => "INVALID_DELIMITERS",
            ParseErrorKind::DelimiterMismatch => "DELIMITER_MISMATCH",
            ParseErrorKind::EmbeddedSegmentTerminator => "EMBEDDED_SEGMENT_TERMINATOR",
            ParseErrorKind::UnexpectedSegment => "UNEXPECTED_SEGMENT",
            ParseErrorKind::UnexpectedEnd => "UNEXPECTED_END",
            ParseErrorKind::InvalidEnvelope => "INVALID_ENVELOPE",
            ParseErrorKind::TrailingData => "TRAILING_DATA",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal parse failure with the byte offset it was detected at.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} at offset {offset}: {context}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub context: String,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, offset: usize, context: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            context: context.into(),
        }
    }

    /// The failure as an `error` issue, for audit trails.
    pub fn to_issue(&self) -> edi_ir::Issue {
        edi_ir::Issue::error(edi_ir::issue::codes::PARSE_ERROR, self.to_string())
            .with_field(self.kind.as_str())
    }
}

/// Errors that can occur when handling X12
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Envelope error: {0}")]
    Envelope(String),

    #[error("Acknowledgment error: {0}")]
    Acknowledgment(String),
}

pub type Result<T> = std::result::Result<T, Error>;
