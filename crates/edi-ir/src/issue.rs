//! Problems found while parsing, validating or mapping a document
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)] // Fluent builder methods return Self for ergonomics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

/// Issue codes shared by the parser, validator and decomposer.
pub mod codes {
    pub const SE_COUNT_MISMATCH: &str = "SE_COUNT_MISMATCH";
    pub const SE_CONTROL_MISMATCH: &str = "SE_CONTROL_MISMATCH";
    pub const GE_COUNT_MISMATCH: &str = "GE_COUNT_MISMATCH";
    pub const GE_CONTROL_MISMATCH: &str = "GE_CONTROL_MISMATCH";
    pub const IEA_COUNT_MISMATCH: &str = "IEA_COUNT_MISMATCH";
    pub const IEA_CONTROL_MISMATCH: &str = "IEA_CONTROL_MISMATCH";
    pub const DELIMITER_MISMATCH: &str = "DELIMITER_MISMATCH";
    pub const EMBEDDED_SEGMENT_TERMINATOR: &str = "EMBEDDED_SEGMENT_TERMINATOR";
    pub const UNKNOWN_SEGMENT: &str = "UNKNOWN_SEGMENT";
    pub const SENDER_MISMATCH: &str = "SENDER_MISMATCH";
    pub const RECEIVER_MISMATCH: &str = "RECEIVER_MISMATCH";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const UNRECOGNIZED_TRANSACTION_SET: &str = "UNRECOGNIZED_TRANSACTION_SET";
    pub const MISSING_REFERENCE: &str = "MISSING_REFERENCE";
    pub const INVALID_DATE: &str = "INVALID_DATE";
    pub const MISSING_SCAC: &str = "MISSING_SCAC";
    pub const INVALID_SCAC: &str = "INVALID_SCAC";
    pub const MISSING_SHIPMENT_ID: &str = "MISSING_SHIPMENT_ID";
    pub const MISSING_PICKUP: &str = "MISSING_PICKUP";
    pub const MISSING_DELIVERY: &str = "MISSING_DELIVERY";
    pub const INVALID_NUMBER: &str = "INVALID_NUMBER";
    pub const DECOMPOSITION_SKIPPED: &str = "DECOMPOSITION_SKIPPED";
    pub const DUPLICATE_TRANSACTION: &str = "DUPLICATE_TRANSACTION";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
}

/// A single finding attached to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,

    pub code: String,

    /// Segment reference such as `SE@7` (tag plus ordinal within its transaction set
    /// or envelope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_ref: Option<String>,

    pub message: String,

    /// Element reference such as `B204`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// ST02 of the transaction set the issue belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl Issue {
    pub fn new(severity: Severity, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            segment_ref: None,
            message: message.into(),
            field: None,
            transaction: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    pub fn warn(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Attach a `TAG@ordinal` segment reference.
    pub fn with_segment_ref(mut self, tag: &str, ordinal: usize) -> Self {
        self.segment_ref = Some(format!("{tag}@{ordinal}"));
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn in_transaction(mut self, control_number: impl Into<String>) -> Self {
        self.transaction = Some(control_number.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(segment_ref) = &self.segment_ref {
            write!(f, " at {segment_ref}")?;
        }
        Ok(())
    }
}

/// Whether any issue has `error` severity.
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

/// Whether any `error` issue belongs to the given transaction set.
pub fn transaction_has_errors(issues: &[Issue], control_number: &str) -> bool {
    issues
        .iter()
        .any(|i| i.is_error() && i.transaction.as_deref() == Some(control_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_builder() {
        let issue = Issue::error(codes::SE_COUNT_MISMATCH, "SE01 is 9, counted 8")
            .with_segment_ref("SE", 8)
            .in_transaction("0001");
        assert_eq!(issue.segment_ref.as_deref(), Some("SE@8"));
        assert_eq!(issue.transaction.as_deref(), Some("0001"));
        assert!(issue.is_error());
        assert_eq!(
            issue.to_string(),
            "[error] SE_COUNT_MISMATCH: SE01 is 9, counted 8 at SE@8"
        );
    }

    #[test]
    fn test_issue_json_omits_empty_optionals() {
        let json = serde_json::to_value(Issue::warn("UNKNOWN_SEGMENT", "x")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"severity": "warn", "code": "UNKNOWN_SEGMENT", "message": "x"})
        );
    }

    #[test]
    fn test_transaction_scoped_errors() {
        let issues = vec![
            Issue::warn("A", "a").in_transaction("0001"),
            Issue::error("B", "b").in_transaction("0002"),
        ];
        assert!(has_errors(&issues));
        assert!(!transaction_has_errors(&issues, "0001"));
        assert!(transaction_has_errors(&issues, "0002"));
    }
}
