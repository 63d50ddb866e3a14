#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-ir
//!
//! Intermediate representation of ANSI X12 interchanges.
//!
//! The tree is deliberately uniform: an [`Interchange`] holds functional groups,
//! groups hold transaction sets, and every transaction set is an ordered list of
//! [`Segment`]s whose elements are either primitives or composites. Transaction
//! specific interpretation (e.g. load tender decomposition) reads this tree rather
//! than a type per segment.

/// Interchange, functional group and transaction set containers.
pub mod document;
/// Problems found while parsing, validating or mapping a document.
pub mod issue;
/// Envelope metadata, delimiters and source positions.
pub mod metadata;
/// Segments and elements.
pub mod segment;
/// Cursor for splitting segment loops.
pub mod traversal;

pub use document::{FunctionalGroup, Interchange, TransactionSet};
pub use issue::{Issue, Severity};
pub use metadata::{Delimiters, GroupHeader, InterchangeHeader, Position};
pub use segment::{Element, Segment};
pub use traversal::SegmentCursor;

use thiserror::Error;

/// Errors that can occur when working with the IR
#[derive(Error, Debug)]
pub enum Error {
    #[error("Segment not found: {tag}")]
    SegmentNotFound { tag: String },

    #[error("Element {tag}{position:02} not found")]
    ElementNotFound { tag: String, position: usize },

    #[error("Conversion error in {context}: {message}")]
    Conversion { context: String, message: String },
}

impl Error {
    /// Build a segment-not-found error for a tag.
    pub fn segment_not_found(tag: impl Into<String>) -> Self {
        Self::SegmentNotFound { tag: tag.into() }
    }

    /// Build an element-not-found error using X12 reference notation (e.g. `B204`).
    pub fn element_not_found(tag: impl Into<String>, position: usize) -> Self {
        Self::ElementNotFound {
            tag: tag.into(),
            position,
        }
    }

    /// Build a conversion error with conversion context.
    pub fn conversion(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Crate-local result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_not_found_uses_reference_notation() {
        let err = Error::element_not_found("B2", 4);
        assert_eq!(err.to_string(), "Element B204 not found");
    }

    #[test]
    fn conversion_error_keeps_context() {
        match Error::conversion("canonical json", "bad value") {
            Error::Conversion { context, message } => {
                assert_eq!(context, "canonical json");
                assert_eq!(message, "bad value");
            }
            _ => panic!("expected conversion variant"),
        }
    }
}
