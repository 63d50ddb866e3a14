//! X12 envelope handling (ISA/IEA, GS/GE, ST/SE)
//!
//! Header extraction, the count and control number balance checks shared by the
//! parser and the validator, and construction of outbound envelopes.

use edi_ir::issue::codes;
use edi_ir::{
    Delimiters, FunctionalGroup, GroupHeader, Interchange, InterchangeHeader, Issue, Segment,
    TransactionSet,
};

use crate::syntax::{self, ISA_LENGTH, NO_REPETITION};

// ============================================================================
// Header extraction
// ============================================================================

/// Decode ISA fields. Identifiers are trimmed; the segment keeps the padded values.
pub fn interchange_header(isa: &Segment) -> InterchangeHeader {
    let field = |position: usize| isa.raw(position).trim().to_string();
    InterchangeHeader {
        sender_qualifier: field(5),
        sender_id: field(6),
        receiver_qualifier: field(7),
        receiver_id: field(8),
        date: field(9),
        time: field(10),
        version: field(12),
        control_number: field(13),
        ack_requested: isa.raw(14).trim() == "1",
        usage_indicator: field(15),
    }
}

/// Decode GS fields.
pub fn group_header(gs: &Segment) -> GroupHeader {
    let field = |position: usize| gs.raw(position).trim().to_string();
    GroupHeader {
        functional_id: field(1),
        sender_code: field(2),
        receiver_code: field(3),
        date: field(4),
        time: field(5),
        control_number: field(6),
        agency: field(7),
        version: field(8),
    }
}

/// ISA13 of raw input, when the ISA header is readable.
///
/// Works on input that fails to parse further on, so rejected documents can still be
/// recorded under their interchange control number.
pub fn peek_control_number(data: &[u8]) -> Option<String> {
    let start = syntax::skip_preamble(data);
    let rest = data.get(start..)?;
    if !rest.starts_with(b"ISA") || rest.len() < 4 {
        return None;
    }
    let element = rest[3];
    let header = &rest[..rest.len().min(ISA_LENGTH)];
    let control = header.split(|&b| b == element).nth(13)?;
    let control = syntax::text(control).trim().to_string();
    (!control.is_empty() && control.bytes().all(|b| b.is_ascii_digit())).then_some(control)
}

/// Functional identifier code (GS01) for a transaction set.
pub fn functional_id(transaction_type: &str) -> &'static str {
    match transaction_type {
        "204" => "SM",
        "210" => "IM",
        "214" => "QM",
        "990" => "GF",
        "997" | "999" => "FA",
        "850" => "PO",
        "856" => "SH",
        "810" => "IN",
        _ => "ZZ",
    }
}

// ============================================================================
// Balance checks
// ============================================================================

fn parse_count(value: &str) -> Option<usize> {
    value.trim().parse().ok()
}

/// SE01 must equal the ST..SE segment count; SE02 must equal ST02.
///
/// Issues reference SE by its position within the transaction set (ST = 1).
pub fn check_transaction(transaction: &TransactionSet) -> Vec<Issue> {
    let mut issues = Vec::new();
    let counted = transaction.segment_count();
    let se_ordinal = counted;
    let declared = transaction.se.raw(1);

    if parse_count(declared) != Some(counted) {
        issues.push(
            Issue::error(
                codes::SE_COUNT_MISMATCH,
                format!("SE01 declares '{declared}' segments, transaction set has {counted}"),
            )
            .with_segment_ref("SE", se_ordinal)
            .with_field("SE01")
            .in_transaction(&transaction.control_number),
        );
    }

    let trailer_control = transaction.se.raw(2).trim();
    if trailer_control != transaction.control_number {
        issues.push(
            Issue::error(
                codes::SE_CONTROL_MISMATCH,
                format!(
                    "SE02 '{trailer_control}' does not match ST02 '{}'",
                    transaction.control_number
                ),
            )
            .with_segment_ref("SE", se_ordinal)
            .with_field("SE02")
            .in_transaction(&transaction.control_number),
        );
    }
    issues
}

/// GE01 must equal the number of transaction sets; GE02 must equal GS06.
///
/// `ge_ordinal` is the GE position within the interchange (ISA = 1).
pub fn check_group(group: &FunctionalGroup, ge_ordinal: usize) -> Vec<Issue> {
    let mut issues = Vec::new();
    let counted = group.transactions.len();
    let declared = group.ge.raw(1);

    if parse_count(declared) != Some(counted) {
        issues.push(
            Issue::error(
                codes::GE_COUNT_MISMATCH,
                format!(
                    "GE01 declares '{declared}' transaction sets, group {} has {counted}",
                    group.header.control_number
                ),
            )
            .with_segment_ref("GE", ge_ordinal)
            .with_field("GE01"),
        );
    }

    let trailer_control = group.ge.raw(2).trim();
    if trailer_control != group.header.control_number {
        issues.push(
            Issue::error(
                codes::GE_CONTROL_MISMATCH,
                format!(
                    "GE02 '{trailer_control}' does not match GS06 '{}'",
                    group.header.control_number
                ),
            )
            .with_segment_ref("GE", ge_ordinal)
            .with_field("GE02"),
        );
    }
    issues
}

/// IEA01 must equal the number of groups; IEA02 must equal ISA13.
pub fn check_interchange(interchange: &Interchange, iea_ordinal: usize) -> Vec<Issue> {
    let mut issues = Vec::new();
    let counted = interchange.groups.len();
    let declared = interchange.iea.raw(1);

    if parse_count(declared) != Some(counted) {
        issues.push(
            Issue::error(
                codes::IEA_COUNT_MISMATCH,
                format!("IEA01 declares '{declared}' functional groups, interchange has {counted}"),
            )
            .with_segment_ref("IEA", iea_ordinal)
            .with_field("IEA01"),
        );
    }

    let trailer_control = interchange.iea.raw(2).trim();
    if trailer_control != interchange.header.control_number {
        issues.push(
            Issue::error(
                codes::IEA_CONTROL_MISMATCH,
                format!(
                    "IEA02 '{trailer_control}' does not match ISA13 '{}'",
                    interchange.header.control_number
                ),
            )
            .with_segment_ref("IEA", iea_ordinal)
            .with_field("IEA02"),
        );
    }
    issues
}

/// Every balance check over a whole interchange, in document order.
pub fn check_all(interchange: &Interchange) -> Vec<Issue> {
    let mut issues = Vec::new();
    // ISA is segment 1 of the interchange.
    let mut ordinal = 1;
    for group in &interchange.groups {
        ordinal += 1;
        for transaction in &group.transactions {
            issues.extend(check_transaction(transaction));
            ordinal += transaction.segment_count();
        }
        ordinal += 1;
        issues.extend(check_group(group, ordinal));
    }
    issues.extend(check_interchange(interchange, ordinal + 1));
    issues
}

/// Whether a group passes its own GE checks.
pub fn group_is_balanced(group: &FunctionalGroup) -> bool {
    check_group(group, 0).is_empty()
}

// ============================================================================
// Outbound envelopes
// ============================================================================

/// Parameters for a new outbound ISA.
#[derive(Debug, Clone)]
pub struct IsaParams<'a> {
    pub sender_qualifier: &'a str,
    pub sender_id: &'a str,
    pub receiver_qualifier: &'a str,
    pub receiver_id: &'a str,
    /// YYMMDD
    pub date: &'a str,
    /// HHMM
    pub time: &'a str,
    pub version: &'a str,
    pub control_number: u32,
    pub usage_indicator: &'a str,
}

fn fixed(value: &str, width: usize) -> String {
    let truncated: String = value.chars().take(width).collect();
    format!("{truncated:<width$}")
}

/// Build a fixed-width ISA segment for the given delimiters.
pub fn build_isa(params: &IsaParams<'_>, delimiters: &Delimiters) -> Segment {
    let repetition = delimiters.repetition.unwrap_or(NO_REPETITION);
    Segment::from_values(
        "ISA",
        [
            "00".to_string(),
            fixed("", 10),
            "00".to_string(),
            fixed("", 10),
            fixed(params.sender_qualifier, 2),
            fixed(params.sender_id, 15),
            fixed(params.receiver_qualifier, 2),
            fixed(params.receiver_id, 15),
            fixed(params.date, 6),
            fixed(params.time, 4),
            char::from(repetition).to_string(),
            fixed(params.version, 5),
            format!("{:09}", params.control_number),
            "0".to_string(),
            fixed(params.usage_indicator, 1),
            char::from(delimiters.sub_element).to_string(),
        ],
    )
}

/// Build an IEA trailer.
pub fn build_iea(group_count: usize, control_number: u32) -> Segment {
    Segment::from_values(
        "IEA",
        [group_count.to_string(), format!("{control_number:09}")],
    )
}

/// Build a GE trailer.
pub fn build_ge(transaction_count: usize, control_number: &str) -> Segment {
    Segment::from_values("GE", [transaction_count.to_string(), control_number.to_string()])
}

/// Build an SE trailer for a body of `body_len` segments.
pub fn build_se(body_len: usize, control_number: &str) -> Segment {
    Segment::from_values("SE", [(body_len + 2).to_string(), control_number.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::X12Serializer;

    fn transaction(se: &[&str]) -> TransactionSet {
        TransactionSet {
            transaction_type: "204".to_string(),
            control_number: "0001".to_string(),
            st: Segment::from_values("ST", ["204", "0001"]),
            segments: vec![Segment::from_values("B2", ["", "ACME"])],
            se: Segment::from_values("SE", se.iter().copied()),
        }
    }

    #[test]
    fn test_balanced_transaction() {
        assert!(check_transaction(&transaction(&["3", "0001"])).is_empty());
    }

    #[test]
    fn test_transaction_count_and_control_mismatch() {
        let issues = check_transaction(&transaction(&["9", "0002"]));
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].code, codes::SE_COUNT_MISMATCH);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("SE@3"));
        assert_eq!(issues[0].transaction.as_deref(), Some("0001"));
        assert_eq!(issues[1].code, codes::SE_CONTROL_MISMATCH);
    }

    #[test]
    fn test_non_numeric_count_is_mismatch() {
        let issues = check_transaction(&transaction(&["X", "0001"]));
        assert_eq!(issues[0].code, codes::SE_COUNT_MISMATCH);
    }

    #[test]
    fn test_group_checks() {
        let group = FunctionalGroup {
            header: GroupHeader {
                control_number: "7".to_string(),
                ..Default::default()
            },
            gs: Segment::from_values("GS", ["SM"]),
            transactions: vec![transaction(&["3", "0001"])],
            ge: Segment::from_values("GE", ["2", "8"]),
        };
        let issues = check_group(&group, 6);
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["GE_COUNT_MISMATCH", "GE_CONTROL_MISMATCH"]);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("GE@6"));
        assert!(!group_is_balanced(&group));
    }

    #[test]
    fn test_peek_control_number() {
        let data = b"  ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*U*00401*000000042*0*P*>~GS*garbage";
        assert_eq!(peek_control_number(data).as_deref(), Some("000000042"));
        assert_eq!(peek_control_number(b"hello"), None);
        assert_eq!(peek_control_number(b"ISA*00*short"), None);
    }

    #[test]
    fn test_build_isa_is_fixed_width() {
        let isa = build_isa(
            &IsaParams {
                sender_qualifier: "ZZ",
                sender_id: "CARRIER",
                receiver_qualifier: "ZZ",
                receiver_id: "ACME",
                date: "240101",
                time: "1200",
                version: "00401",
                control_number: 17,
                usage_indicator: "P",
            },
            &Delimiters {
                repetition: None,
                ..Delimiters::default()
            },
        );
        let bytes = X12Serializer::new()
            .segment_bytes(&isa, &Delimiters::default())
            .unwrap();
        assert_eq!(bytes.len(), ISA_LENGTH);
        let header = interchange_header(&isa);
        assert_eq!(header.sender_id, "CARRIER");
        assert_eq!(header.control_number, "000000017");
        assert_eq!(isa.raw(11), "U");
    }

    #[test]
    fn test_functional_ids() {
        assert_eq!(functional_id("204"), "SM");
        assert_eq!(functional_id("997"), "FA");
    }
}
