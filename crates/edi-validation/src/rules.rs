//! Validation rules
//!
//! Each rule appends its findings to the caller's issue list. Segment references use
//! the position inside the transaction set (ST = 1).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use edi_ir::issue::codes;
use edi_ir::{Issue, Severity, TransactionSet};
use edi_profile::DateFormat;
use regex::Regex;

/// Standard Carrier Alpha Code: two to four capital letters.
static SCAC: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new("^[A-Z]{2,4}$"));

/// Compare an expected interchange party with the one in the envelope.
///
/// Returns a description of the mismatch; unset expectations always pass.
pub fn identity_mismatch(
    field: &str,
    expected_qualifier: Option<&str>,
    expected_id: Option<&str>,
    qualifier: &str,
    id: &str,
) -> Option<String> {
    let expected_id = expected_id.map(str::trim).filter(|v| !v.is_empty());
    if let Some(expected) = expected_id {
        if expected != id.trim() {
            return Some(format!("{field} is '{id}', partner expects '{expected}'"));
        }
    }
    let expected_qualifier = expected_qualifier.map(str::trim).filter(|v| !v.is_empty());
    if let Some(expected) = expected_qualifier {
        if expected != qualifier.trim() {
            return Some(format!(
                "{field} qualifier is '{qualifier}', partner expects '{expected}'"
            ));
        }
    }
    None
}

/// A version expectation matches ISA12 exactly or prefixes GS08 (`004010` ~ `004010X...`).
pub fn version_matches(expected: &str, isa_version: &str, group_version: &str) -> bool {
    isa_version == expected || group_version.starts_with(expected)
}

/// Every required qualifier must appear as an L11-02 or REF-01.
pub fn check_references(
    transaction: &TransactionSet,
    required: &[String],
    severity: Severity,
    issues: &mut Vec<Issue>,
) {
    if required.is_empty() {
        return;
    }
    let present: BTreeSet<&str> = transaction
        .segments
        .iter()
        .filter_map(|segment| match segment.tag.as_str() {
            "L11" => segment.trimmed(2),
            "REF" => segment.trimmed(1),
            _ => None,
        })
        .collect();

    for qualifier in required {
        if !present.contains(qualifier.trim()) {
            issues.push(
                Issue::new(
                    severity,
                    codes::MISSING_REFERENCE,
                    format!("required reference qualifier '{qualifier}' is missing"),
                )
                .with_field("L1102"),
            );
        }
    }
}

/// G62-02 must be a calendar date in the partner's layout.
pub fn check_dates(
    transaction: &TransactionSet,
    format: DateFormat,
    severity: Severity,
    issues: &mut Vec<Issue>,
) {
    for (index, segment) in transaction.segments.iter().enumerate() {
        if !segment.is("G62") {
            continue;
        }
        let Some(value) = segment.trimmed(2) else {
            continue;
        };
        if !is_valid_date(value, format) {
            issues.push(
                Issue::new(
                    severity,
                    codes::INVALID_DATE,
                    format!("'{value}' is not a {} date", format.label()),
                )
                .with_segment_ref("G62", TransactionSet::ordinal(index))
                .with_field("G6202"),
            );
        }
    }
}

/// Whether a value is a calendar date in the given layout.
pub fn is_valid_date(value: &str, format: DateFormat) -> bool {
    value.len() == format.width()
        && value.bytes().all(|b| b.is_ascii_digit())
        && NaiveDate::parse_from_str(value, format.pattern()).is_ok()
}

/// B2-02 must carry a well-formed SCAC.
pub fn check_scac(transaction: &TransactionSet, severity: Severity, issues: &mut Vec<Issue>) {
    let Some((index, b2)) = transaction
        .segments
        .iter()
        .enumerate()
        .find(|(_, segment)| segment.is("B2"))
    else {
        issues.push(
            Issue::new(severity, codes::MISSING_SCAC, "load tender has no B2 segment")
                .with_field("B202"),
        );
        return;
    };
    let ordinal = TransactionSet::ordinal(index);

    match b2.trimmed(2) {
        None => issues.push(
            Issue::new(severity, codes::MISSING_SCAC, "B2-02 carrier SCAC is required")
                .with_segment_ref("B2", ordinal)
                .with_field("B202"),
        ),
        Some(scac) if !is_valid_scac(scac) => issues.push(
            Issue::new(
                severity,
                codes::INVALID_SCAC,
                format!("'{scac}' is not a valid SCAC"),
            )
            .with_segment_ref("B2", ordinal)
            .with_field("B202"),
        ),
        Some(_) => {}
    }
}

pub fn is_valid_scac(value: &str) -> bool {
    match SCAC.as_ref() {
        Ok(pattern) => pattern.is_match(value),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::Segment;

    fn tender(body: Vec<Segment>) -> TransactionSet {
        TransactionSet {
            transaction_type: "204".to_string(),
            control_number: "0001".to_string(),
            st: Segment::from_values("ST", ["204", "0001"]),
            se: Segment::from_values("SE", [(body.len() + 2).to_string(), "0001".to_string()]),
            segments: body,
        }
    }

    #[test]
    fn test_identity_mismatch() {
        assert_eq!(identity_mismatch("ISA06", None, None, "ZZ", "ACME"), None);
        assert_eq!(identity_mismatch("ISA06", Some("ZZ"), Some("ACME"), "ZZ", "ACME   "), None);
        assert!(identity_mismatch("ISA06", None, Some("ACME"), "ZZ", "OTHER").is_some());
        let message = identity_mismatch("ISA06", Some("01"), Some("ACME"), "ZZ", "ACME").unwrap();
        assert!(message.contains("qualifier"));
    }

    #[test]
    fn test_version_matches() {
        assert!(version_matches("004010", "00401", "004010"));
        assert!(version_matches("005010", "00501", "005010X214"));
        assert!(version_matches("00501", "00501", "005010"));
        assert!(!version_matches("005010", "00401", "004010"));
    }

    #[test]
    fn test_references_from_l11_and_ref() {
        let transaction = tender(vec![
            Segment::from_values("L11", ["PO-1", "PO"]),
            Segment::from_values("REF", ["BM", "BOL-9"]),
        ]);
        let mut issues = Vec::new();
        let required = vec!["PO".to_string(), "BM".to_string(), "CR".to_string()];
        check_references(&transaction, &required, Severity::Error, &mut issues);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, codes::MISSING_REFERENCE);
        assert!(issues[0].message.contains("'CR'"));
    }

    #[test]
    fn test_dates_follow_layout() {
        let transaction = tender(vec![
            Segment::from_values("G62", ["37", "20240230"]),
            Segment::from_values("G62", ["53", "240301"]),
            Segment::from_values("G62", ["10", "20240301"]),
        ]);
        let mut issues = Vec::new();
        check_dates(&transaction, DateFormat::Ccyymmdd, Severity::Warn, &mut issues);
        let refs: Vec<_> = issues.iter().map(|i| i.segment_ref.as_deref().unwrap()).collect();
        assert_eq!(refs, vec!["G62@2", "G62@3"]);
        assert!(issues.iter().all(|i| i.severity == Severity::Warn));

        assert!(is_valid_date("240301", DateFormat::Yymmdd));
        assert!(!is_valid_date("20240301", DateFormat::Yymmdd));
    }

    #[test]
    fn test_scac() {
        let mut issues = Vec::new();
        check_scac(&tender(vec![Segment::from_values("B2", ["", "ACME"])]), Severity::Error, &mut issues);
        assert!(issues.is_empty());

        check_scac(&tender(vec![Segment::from_values("B2", ["", ""])]), Severity::Error, &mut issues);
        check_scac(&tender(vec![Segment::from_values("B2", ["", "acme1"])]), Severity::Error, &mut issues);
        check_scac(&tender(vec![]), Severity::Error, &mut issues);
        let found: Vec<_> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(found, vec![codes::MISSING_SCAC, codes::INVALID_SCAC, codes::MISSING_SCAC]);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("B2@2"));
    }
}
