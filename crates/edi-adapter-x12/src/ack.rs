//! Functional acknowledgment generation (997 / 999)
//!
//! One acknowledgment transaction set is produced per received functional group:
//!
//! ```text
//! ST*997 → AK1 (group) → { AK2 (transaction) → { AK3 → AK4* }* → AK5 }* → AK9 → SE
//! ```
//!
//! The 999 variant uses IK3/IK4/IK5 in place of AK3/AK4/AK5. The acknowledgment
//! interchange swaps sender and receiver of the source interchange.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Utc};
use edi_ir::issue::codes;
use edi_ir::{FunctionalGroup, Interchange, Issue, Segment, Severity, TransactionSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelopes::{self, IsaParams};
use crate::serializer::X12Serializer;
use crate::{Error, Result};

const DEFAULT_VERSION: &str = "00401";
const DEFAULT_GROUP_VERSION: &str = "004010";
const IMPLEMENTATION_VERSION: &str = "00501";
const IMPLEMENTATION_GROUP_VERSION: &str = "005010X231A1";

/// Acknowledgment transaction set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckType {
    /// 997 Functional Acknowledgment
    #[default]
    #[serde(rename = "997")]
    Functional,
    /// 999 Implementation Acknowledgment
    #[serde(rename = "999")]
    Implementation,
}

impl AckType {
    pub fn code(self) -> &'static str {
        match self {
            AckType::Functional => "997",
            AckType::Implementation => "999",
        }
    }
}

impl fmt::Display for AckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AckType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "997" => Ok(AckType::Functional),
            "999" => Ok(AckType::Implementation),
            other => Err(Error::Acknowledgment(format!(
                "unsupported acknowledgment type '{other}'"
            ))),
        }
    }
}

/// Overall verdict of an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    AcceptedWithErrors,
    Rejected,
}

impl AckStatus {
    /// Rejected on any `error`, accepted with errors on any `warn`.
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> Self {
        let mut status = AckStatus::Accepted;
        for issue in issues {
            match issue.severity {
                Severity::Error => return AckStatus::Rejected,
                Severity::Warn => status = AckStatus::AcceptedWithErrors,
                Severity::Info => {}
            }
        }
        status
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AckStatus::Accepted => "accepted",
            AckStatus::AcceptedWithErrors => "accepted_with_errors",
            AckStatus::Rejected => "rejected",
        }
    }

    /// AK5-01 / IK5-01 / AK9-01 code.
    fn code(self) -> &'static str {
        match self {
            AckStatus::Accepted => "A",
            AckStatus::AcceptedWithErrors => "E",
            AckStatus::Rejected => "R",
        }
    }
}

impl fmt::Display for AckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one generated acknowledgment.
#[derive(Debug, Clone)]
pub struct AckOptions {
    pub ack_type: AckType,
    /// Used for ISA13 (zero padded) and GS06
    pub control_number: u32,
    pub timestamp: NaiveDateTime,
}

impl AckOptions {
    pub fn new(ack_type: AckType, control_number: u32) -> Self {
        Self {
            ack_type,
            control_number,
            timestamp: Utc::now().naive_utc(),
        }
    }

    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A rendered acknowledgment.
#[derive(Debug, Clone)]
pub struct Acknowledgment {
    pub ack_type: AckType,
    pub status: AckStatus,
    /// ISA13 of the acknowledgment interchange
    pub control_number: String,
    pub interchange: Interchange,
    /// X12 text
    pub content: String,
}

/// Renders 997/999 acknowledgments for parsed interchanges.
#[derive(Debug, Clone, Default)]
pub struct AckGenerator {
    serializer: X12Serializer,
}

impl AckGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serializer(serializer: X12Serializer) -> Self {
        Self { serializer }
    }

    /// Acknowledge `source` given every issue recorded against it.
    pub fn generate(
        &self,
        source: &Interchange,
        issues: &[Issue],
        options: &AckOptions,
    ) -> Result<Acknowledgment> {
        if source.groups.is_empty() {
            return Err(Error::Acknowledgment(
                "interchange has no functional groups to acknowledge".to_string(),
            ));
        }

        let ack_type = options.ack_type;
        let delimiters = source.delimiters;
        let date = options.timestamp.format("%y%m%d").to_string();
        let long_date = options.timestamp.format("%Y%m%d").to_string();
        let time = options.timestamp.format("%H%M").to_string();
        let control = options.control_number.to_string();

        let (isa_version, group_version) = match ack_type {
            AckType::Functional => (
                non_empty(&source.header.version, DEFAULT_VERSION),
                non_empty(&source.groups[0].header.version, DEFAULT_GROUP_VERSION),
            ),
            AckType::Implementation => (IMPLEMENTATION_VERSION, IMPLEMENTATION_GROUP_VERSION),
        };

        let header = &source.header;
        let isa = envelopes::build_isa(
            &IsaParams {
                sender_qualifier: &header.receiver_qualifier,
                sender_id: &header.receiver_id,
                receiver_qualifier: &header.sender_qualifier,
                receiver_id: &header.sender_id,
                date: &date,
                time: &time,
                version: isa_version,
                control_number: options.control_number,
                usage_indicator: non_empty(&header.usage_indicator, "P"),
            },
            &delimiters,
        );

        let first = &source.groups[0].header;
        let gs = Segment::from_values(
            "GS",
            [
                "FA",
                first.receiver_code.as_str(),
                first.sender_code.as_str(),
                long_date.as_str(),
                time.as_str(),
                control.as_str(),
                "X",
                group_version,
            ],
        );

        let transactions: Vec<TransactionSet> = source
            .groups
            .iter()
            .enumerate()
            .map(|(index, group)| acknowledge_group(group, issues, ack_type, index + 1))
            .collect();

        let ge = envelopes::build_ge(transactions.len(), &control);
        let iea = envelopes::build_iea(1, options.control_number);

        let interchange = Interchange {
            header: envelopes::interchange_header(&isa),
            delimiters,
            groups: vec![FunctionalGroup {
                header: envelopes::group_header(&gs),
                gs,
                transactions,
                ge,
            }],
            isa,
            iea,
        };
        let content = self.serializer.serialize_to_string(&interchange)?;
        let status = AckStatus::from_issues(issues);

        debug!(
            ack_type = %ack_type,
            status = %status,
            source_control_number = %source.header.control_number,
            "Generated acknowledgment"
        );

        Ok(Acknowledgment {
            ack_type,
            status,
            control_number: interchange.header.control_number.clone(),
            interchange,
            content,
        })
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn acknowledge_group(
    group: &FunctionalGroup,
    issues: &[Issue],
    ack_type: AckType,
    sequence: usize,
) -> TransactionSet {
    let control_number = format!("{sequence:04}");
    let mut body = Vec::new();

    let mut ak1 = vec![group.header.functional_id.clone(), group.header.control_number.clone()];
    if ack_type == AckType::Implementation {
        ak1.push(group.header.version.clone());
    }
    body.push(Segment::from_values("AK1", ak1));

    let mut accepted = 0;
    let mut statuses = Vec::with_capacity(group.transactions.len());
    for transaction in &group.transactions {
        let scoped: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.transaction.as_deref() == Some(transaction.control_number.as_str()))
            .collect();
        let status = AckStatus::from_issues(scoped.iter().copied());
        if status != AckStatus::Rejected {
            accepted += 1;
        }
        statuses.push(status);
        acknowledge_transaction(&mut body, transaction, &scoped, status, ack_type, &group.header.version);
    }

    let group_errors = envelopes::check_group(group, 0);
    let status_code = group_status(&statuses, !group_errors.is_empty());
    let mut ak9 = vec![
        status_code.to_string(),
        group.ge.raw(1).trim().parse::<usize>().unwrap_or(group.transactions.len()).to_string(),
        group.transactions.len().to_string(),
        accepted.to_string(),
    ];
    ak9.extend(group_errors.iter().filter_map(|i| group_error_code(&i.code)).map(str::to_string));
    body.push(Segment::from_values("AK9", ak9));

    let transaction_type = ack_type.code().to_string();
    TransactionSet {
        st: Segment::from_values("ST", [transaction_type.as_str(), control_number.as_str()]),
        se: envelopes::build_se(body.len(), &control_number),
        transaction_type,
        control_number,
        segments: body,
    }
}

fn acknowledge_transaction(
    body: &mut Vec<Segment>,
    transaction: &TransactionSet,
    issues: &[&Issue],
    status: AckStatus,
    ack_type: AckType,
    version: &str,
) {
    let mut ak2 = vec![transaction.transaction_type.clone(), transaction.control_number.clone()];
    if ack_type == AckType::Implementation {
        ak2.push(version.to_string());
    }
    body.push(Segment::from_values("AK2", ak2));

    let (segment_tag, element_tag, trailer_tag) = match ack_type {
        AckType::Functional => ("AK3", "AK4", "AK5"),
        AckType::Implementation => ("IK3", "IK4", "IK5"),
    };

    for issue in issues.iter().filter(|i| i.severity != Severity::Info) {
        let Some((tag, ordinal)) = issue.segment_ref.as_deref().and_then(split_segment_ref) else {
            continue;
        };
        let Some(code) = segment_error_code(issue) else {
            continue;
        };
        body.push(Segment::from_values(
            segment_tag,
            [tag.to_string(), ordinal.to_string(), String::new(), code.to_string()],
        ));
        if let Some(position) = element_position(issue, tag) {
            body.push(Segment::from_values(
                element_tag,
                [position.to_string(), String::new(), element_error_code(&issue.code).to_string()],
            ));
        }
    }

    let mut trailer = vec![status.code().to_string()];
    if status != AckStatus::Accepted {
        let mut reasons: Vec<&str> = issues
            .iter()
            .filter_map(|i| transaction_error_code(i))
            .collect();
        reasons.dedup();
        trailer.extend(reasons.into_iter().take(5).map(str::to_string));
    }
    body.push(Segment::from_values(trailer_tag, trailer));
}

/// AK901: A, E, P (partially accepted) or R.
fn group_status(statuses: &[AckStatus], envelope_errors: bool) -> &'static str {
    let rejected = statuses.iter().filter(|s| **s == AckStatus::Rejected).count();
    if envelope_errors || (rejected > 0 && rejected == statuses.len()) {
        "R"
    } else if rejected > 0 {
        "P"
    } else if statuses.contains(&AckStatus::AcceptedWithErrors) {
        "E"
    } else {
        "A"
    }
}

/// `TAG@N` into its parts.
fn split_segment_ref(segment_ref: &str) -> Option<(&str, usize)> {
    let (tag, ordinal) = segment_ref.split_once('@')?;
    Some((tag, ordinal.parse().ok()?))
}

/// AK304 / IK304: segment syntax error code. Envelope findings are reported on AK5.
fn segment_error_code(issue: &Issue) -> Option<&'static str> {
    match issue.code.as_str() {
        codes::SE_COUNT_MISMATCH | codes::SE_CONTROL_MISMATCH => None,
        codes::UNKNOWN_SEGMENT => Some("2"),
        codes::EMBEDDED_SEGMENT_TERMINATOR => Some("8"),
        _ if issue.field.is_some() => Some("8"),
        _ => None,
    }
}

/// AK403 / IK403: element syntax error code.
fn element_error_code(code: &str) -> &'static str {
    match code {
        codes::MISSING_SCAC | codes::MISSING_SHIPMENT_ID | codes::MISSING_REFERENCE => "1",
        codes::INVALID_DATE => "8",
        codes::INVALID_NUMBER => "6",
        _ => "7",
    }
}

/// AK502+ / IK502+: transaction set syntax error code.
fn transaction_error_code(issue: &Issue) -> Option<&'static str> {
    if issue.severity != Severity::Error {
        return None;
    }
    Some(match issue.code.as_str() {
        codes::UNRECOGNIZED_TRANSACTION_SET => "1",
        codes::SE_CONTROL_MISMATCH => "3",
        codes::SE_COUNT_MISMATCH => "4",
        _ => "5",
    })
}

/// AK905+: functional group syntax error code.
fn group_error_code(code: &str) -> Option<&'static str> {
    match code {
        codes::GE_CONTROL_MISMATCH => Some("4"),
        codes::GE_COUNT_MISMATCH => Some("5"),
        _ => None,
    }
}

/// Element position from a field reference such as `B204` or `G6202`.
fn element_position(issue: &Issue, tag: &str) -> Option<usize> {
    let field = issue.field.as_deref()?;
    let digits = field.strip_prefix(tag)?;
    digits.get(..2)?.parse().ok()
}
