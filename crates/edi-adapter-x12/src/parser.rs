//! X12 parser
//!
//! Walks the envelope state machine
//!
//! ```text
//! START → ISA → { GS → { ST → { SEGMENT* → SE } → }* → GE → }* → IEA → END
//! ```
//!
//! and builds an [`Interchange`]. Segments that break the state machine are fatal;
//! count and control number mismatches are recorded as issues and parsing continues.

use edi_ir::issue::codes;
use edi_ir::{Delimiters, FunctionalGroup, Interchange, Issue, Position, Segment, TransactionSet};
use edi_profile::{PartnerProfile, Strictness};
use tracing::{debug, trace};

use crate::envelopes::{self, check_group, check_interchange, check_transaction};
use crate::syntax::{self, ISA_LENGTH, RawSegment, SegmentReader};
use crate::{ParseError, ParseErrorKind, dictionary};

/// How the parser treats deviations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Declared delimiters to check the ISA against; `None` accepts whatever the ISA says
    pub delimiters: Option<Delimiters>,
    pub strictness: Strictness,
    /// Flag segments missing from the transaction set dictionary
    pub check_segments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiters: None,
            strictness: Strictness::Strict,
            check_segments: true,
        }
    }
}

impl ParseOptions {
    /// Options derived from a partner profile.
    pub fn from_profile(profile: &PartnerProfile) -> Self {
        Self {
            delimiters: Some(profile.configuration.format.delimiters.to_x12()),
            strictness: profile.strictness(),
            check_segments: true,
        }
    }

    pub fn lax() -> Self {
        Self {
            strictness: Strictness::Lax,
            ..Self::default()
        }
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = Some(delimiters);
        self
    }
}

/// Parser for X12 interchanges
#[derive(Debug, Clone, Default)]
pub struct X12Parser {
    options: ParseOptions,
}

impl X12Parser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse one interchange. Issues are returned whether or not parsing succeeded.
    pub fn parse(&self, data: &[u8]) -> (Result<Interchange, ParseError>, Vec<Issue>) {
        parse(data, &self.options)
    }
}

/// Parse one interchange. Issues are returned whether or not parsing succeeded.
pub fn parse(data: &[u8], options: &ParseOptions) -> (Result<Interchange, ParseError>, Vec<Issue>) {
    let mut issues = Vec::new();
    let result = run(data, options, &mut issues);
    match &result {
        Ok(interchange) => debug!(
            control_number = %interchange.header.control_number,
            groups = interchange.groups.len(),
            transactions = interchange.transaction_count(),
            issues = issues.len(),
            "Parsed interchange"
        ),
        Err(e) => debug!(kind = %e.kind, offset = e.offset, "Interchange parse failed"),
    }
    (result, issues)
}

fn run(data: &[u8], options: &ParseOptions, issues: &mut Vec<Issue>) -> Result<Interchange, ParseError> {
    let start = syntax::skip_preamble(data);
    let detected = syntax::detect_delimiters(data, start)?;
    let (delimiters, delimiter_issues) =
        syntax::reconcile(detected, options.delimiters, options.strictness, start)?;
    issues.extend(delimiter_issues);

    // The ISA is read at fixed offsets; its values may legally contain the terminator.
    let isa_bytes = &data[start..start + ISA_LENGTH - 1];
    let (line, column) = syntax::line_column(data, start);
    let isa = Segment::new("ISA", syntax::split_isa(isa_bytes, &delimiters))
        .with_position(Position::new(line, column, start, ISA_LENGTH - 1));

    let mut state = State {
        reader: SegmentReader::new(data, start + ISA_LENGTH, delimiters),
        options,
        issues,
        ordinal: 1,
        current_transaction: None,
    };
    state.interchange(isa, delimiters)
}

struct State<'a, 'i> {
    reader: SegmentReader<'a>,
    options: &'a ParseOptions,
    issues: &'i mut Vec<Issue>,
    /// Position of the last segment read within the interchange (ISA = 1)
    ordinal: usize,
    current_transaction: Option<String>,
}

impl State<'_, '_> {
    fn interchange(&mut self, isa: Segment, delimiters: Delimiters) -> Result<Interchange, ParseError> {
        let header = envelopes::interchange_header(&isa);
        if header.control_number.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidEnvelope,
                isa.position.offset,
                "ISA13 interchange control number is empty",
            ));
        }

        let mut groups = Vec::new();
        let iea = loop {
            let segment = self.expect("GS or IEA")?;
            match segment.tag.as_str() {
                "GS" => groups.push(self.group(segment)?),
                "IEA" => break segment,
                _ => return Err(unexpected(&segment, "GS or IEA")),
            }
        };
        let iea_ordinal = self.ordinal;

        if !self.reader.is_exhausted() {
            return Err(ParseError::new(
                ParseErrorKind::TrailingData,
                self.reader.position(),
                format!(
                    "data after IEA: '{}'",
                    syntax::preview(self.reader.remaining(), 16)
                ),
            ));
        }

        let interchange = Interchange {
            header,
            delimiters,
            isa,
            groups,
            iea,
        };
        self.issues.extend(check_interchange(&interchange, iea_ordinal));
        Ok(interchange)
    }

    fn group(&mut self, gs: Segment) -> Result<FunctionalGroup, ParseError> {
        let header = envelopes::group_header(&gs);
        if header.control_number.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidEnvelope,
                gs.position.offset,
                "GS06 group control number is empty",
            ));
        }

        let mut transactions = Vec::new();
        let ge = loop {
            let segment = self.expect("ST or GE")?;
            match segment.tag.as_str() {
                "ST" => transactions.push(self.transaction(segment)?),
                "GE" => break segment,
                _ => return Err(unexpected(&segment, "ST or GE")),
            }
        };

        let group = FunctionalGroup {
            header,
            gs,
            transactions,
            ge,
        };
        self.issues.extend(check_group(&group, self.ordinal));
        Ok(group)
    }

    fn transaction(&mut self, st: Segment) -> Result<TransactionSet, ParseError> {
        let transaction_type = st.raw(1).trim().to_string();
        let control_number = st.raw(2).trim().to_string();
        if transaction_type.is_empty() || control_number.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidEnvelope,
                st.position.offset,
                "ST01 and ST02 are required",
            ));
        }
        trace!(transaction_type = %transaction_type, control_number = %control_number, "Transaction set");
        self.current_transaction = Some(control_number.clone());

        let dictionary = if self.options.check_segments {
            dictionary::known_segments(&transaction_type)
        } else {
            None
        };

        let mut segments = Vec::new();
        let se = loop {
            let segment = self.expect("SE")?;
            match segment.tag.as_str() {
                "SE" => break segment,
                "ISA" | "IEA" | "GS" | "GE" | "ST" => return Err(unexpected(&segment, "SE")),
                tag => {
                    if dictionary.is_some_and(|known| !known.contains(&tag)) {
                        self.issues.push(
                            Issue::new(
                                self.options.strictness.severity(),
                                codes::UNKNOWN_SEGMENT,
                                format!("segment {tag} is not part of transaction set {transaction_type}"),
                            )
                            .with_segment_ref(tag, TransactionSet::ordinal(segments.len()))
                            .in_transaction(&control_number),
                        );
                    }
                    segments.push(segment);
                }
            }
        };
        self.current_transaction = None;

        let transaction = TransactionSet {
            transaction_type,
            control_number,
            st,
            segments,
            se,
        };
        self.issues.extend(check_transaction(&transaction));
        Ok(transaction)
    }

    /// Next segment, failing at end of input.
    fn expect(&mut self, expected: &str) -> Result<Segment, ParseError> {
        match self.next()? {
            Some(segment) => Ok(segment),
            None => Err(ParseError::new(
                ParseErrorKind::UnexpectedEnd,
                self.reader.position(),
                format!("input ended, expected {expected}"),
            )),
        }
    }

    /// Next well-formed segment.
    ///
    /// A chunk without a valid tag means the previous terminator sat inside an
    /// element value: fatal when strict, dropped with an issue when lax.
    fn next(&mut self) -> Result<Option<Segment>, ParseError> {
        loop {
            let Some(raw) = self.reader.next_segment() else {
                return Ok(None);
            };
            let delimiters = *self.reader.delimiters();
            let tag = raw.tag(&delimiters);
            if syntax::is_valid_tag(tag) {
                self.ordinal += 1;
                return Ok(Some(build_segment(&raw, tag, &delimiters)));
            }

            let terminator = char::from(delimiters.segment);
            let context = format!(
                "segment terminator '{terminator}' inside an element value before '{}'",
                syntax::preview(raw.bytes, 24)
            );
            if self.options.strictness.is_strict() {
                return Err(ParseError::new(
                    ParseErrorKind::EmbeddedSegmentTerminator,
                    raw.position.offset,
                    context,
                ));
            }

            let mut issue = Issue::warn(
                codes::EMBEDDED_SEGMENT_TERMINATOR,
                format!("{context}; fragment dropped"),
            )
            .with_segment_ref("?", self.ordinal + 1);
            if let Some(control_number) = &self.current_transaction {
                issue = issue.in_transaction(control_number);
            }
            self.issues.push(issue);
        }
    }
}

fn build_segment(raw: &RawSegment<'_>, tag: &[u8], delimiters: &Delimiters) -> Segment {
    Segment::new(syntax::text(tag), syntax::split_elements(raw.bytes, delimiters))
        .with_position(raw.position)
}

fn unexpected(segment: &Segment, expected: &str) -> ParseError {
    ParseError::new(
        ParseErrorKind::UnexpectedSegment,
        segment.position.offset,
        format!(
            "found {} at line {}, expected {expected}",
            segment.tag, segment.position.line
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{Element, Severity};

    const ISA: &str = "ISA*00*          *00*          *ZZ*ACME           *ZZ*CARRIER        *240115*1030*U*00401*000000001*0*P*>~";

    fn interchange(body: &[&str], se_count: usize) -> String {
        let mut out = String::from(ISA);
        out.push_str("GS*SM*ACME*CARRIER*20240115*1030*1*X*004010~");
        out.push_str("ST*204*0001~");
        for segment in body {
            out.push_str(segment);
            out.push('~');
        }
        out.push_str(&format!("SE*{se_count}*0001~GE*1*1~IEA*1*000000001~"));
        out
    }

    fn load_tender() -> String {
        interchange(
            &[
                "B2**ACME**SHIP123**PP",
                "B2A*00",
                "N1*SH*ORIGIN WAREHOUSE",
                "N4*DALLAS*TX*75201",
                "N1*CN*DEST DC",
                "N4*ATLANTA*GA*30301",
            ],
            8,
        )
    }

    fn strict() -> ParseOptions {
        ParseOptions::default().with_delimiters(Delimiters::default())
    }

    #[test]
    fn test_parse_load_tender() {
        let (result, issues) = parse(load_tender().as_bytes(), &strict());
        let interchange = result.unwrap();
        assert!(issues.is_empty(), "{issues:?}");

        assert_eq!(interchange.header.sender_id, "ACME");
        assert_eq!(interchange.header.receiver_id, "CARRIER");
        assert_eq!(interchange.control_number(), "000000001");
        assert_eq!(interchange.version(), "00401");
        assert_eq!(interchange.groups[0].header.version, "004010");
        assert_eq!(interchange.delimiters.repetition, None);

        let tx = &interchange.groups[0].transactions[0];
        assert_eq!(tx.transaction_type, "204");
        assert_eq!(tx.control_number, "0001");
        assert_eq!(tx.segments.len(), 6);
        assert_eq!(tx.segment_count(), 8);
        assert_eq!(tx.segments[0].value(4), Some("SHIP123"));
        assert_eq!(tx.segments[0].element(1), Some(&Element::Primitive(String::new())));
    }

    #[test]
    fn test_se_count_mismatch_is_an_issue() {
        let data = interchange(&["B2**ACME**SHIP123**PP", "N1*SH*A", "N1*CN*B"], 9);
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(result.is_ok());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, codes::SE_COUNT_MISMATCH);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("SE@5"));
        assert_eq!(issues[0].transaction.as_deref(), Some("0001"));
    }

    #[test]
    fn test_group_and_interchange_mismatches() {
        let data = load_tender()
            .replace("GE*1*1~", "GE*2*9~")
            .replace("IEA*1*000000001~", "IEA*1*000000002~");
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(result.is_ok());
        let found: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(
            found,
            vec!["GE_COUNT_MISMATCH", "GE_CONTROL_MISMATCH", "IEA_CONTROL_MISMATCH"]
        );
        assert_eq!(issues[0].segment_ref.as_deref(), Some("GE@11"));
        assert_eq!(issues[2].segment_ref.as_deref(), Some("IEA@12"));
    }

    #[test]
    fn test_trailing_whitespace_is_ignored() {
        let data = load_tender().replace('~', "~\r\n") + "\n\n  ";
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(result.is_ok());
        assert!(issues.is_empty());
        let tx = &result.unwrap().groups[0].transactions[0];
        assert_eq!(tx.segments[1].position.line, 5);
    }

    #[test]
    fn test_unknown_segment_severity_follows_strictness() {
        let data = interchange(&["B2**ACME**SHIP123**PP", "ZZ1*X", "N1*SH*A", "N1*CN*B"], 6);

        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(result.is_ok());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, codes::UNKNOWN_SEGMENT);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("ZZ1@3"));

        let (result, issues) = parse(data.as_bytes(), &ParseOptions::lax());
        let tx = &result.unwrap().groups[0].transactions[0];
        assert_eq!(tx.segments[1].tag, "ZZ1");
        assert_eq!(issues[0].severity, Severity::Warn);
    }

    #[test]
    fn test_unchecked_transaction_set() {
        let data = interchange(&["BEG*00*SA*PO1"], 3).replace("ST*204", "ST*850");
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(result.is_ok());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_embedded_terminator_strict_fails() {
        let data = interchange(&["B2**ACME**SHIP123**PP", "NTE**FRAGILE~ handle with care", "N1*SH*A", "N1*CN*B"], 7);
        let (result, _) = parse(data.as_bytes(), &strict());
        let err = result.unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmbeddedSegmentTerminator);
        assert!(err.context.contains("handle with care"));
    }

    #[test]
    fn test_embedded_terminator_lax_drops_fragment() {
        let data = interchange(&["B2**ACME**SHIP123**PP", "NTE**FRAGILE~ handle with care", "N1*SH*A", "N1*CN*B"], 6);
        let (result, issues) = parse(data.as_bytes(), &ParseOptions::lax());
        let interchange = result.unwrap();
        let tx = &interchange.groups[0].transactions[0];
        assert_eq!(tx.segments[1].value(2), Some("FRAGILE"));
        assert_eq!(tx.segments.len(), 4);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, codes::EMBEDDED_SEGMENT_TERMINATOR);
        assert_eq!(issues[0].transaction.as_deref(), Some("0001"));
    }

    #[test]
    fn test_missing_se_is_fatal() {
        let data = load_tender().replace("SE*8*0001~", "");
        let (result, _) = parse(data.as_bytes(), &strict());
        let err = result.unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedSegment);
        assert!(err.context.contains("found GE"));
    }

    #[test]
    fn test_truncated_input() {
        let data = load_tender();
        let cut = data.find("N1*CN").unwrap();
        let (result, _) = parse(&data.as_bytes()[..cut], &strict());
        assert_eq!(result.unwrap_err().kind, ParseErrorKind::UnexpectedEnd);
    }

    #[test]
    fn test_trailing_data_is_fatal() {
        let data = load_tender() + "GARBAGE";
        let (result, _) = parse(data.as_bytes(), &strict());
        assert_eq!(result.unwrap_err().kind, ParseErrorKind::TrailingData);
    }

    #[test]
    fn test_delimiter_mismatch_strict_vs_lax() {
        let data = load_tender().replace('~', "\n");
        let (result, _) = parse(data.as_bytes(), &strict());
        assert_eq!(result.unwrap_err().kind, ParseErrorKind::DelimiterMismatch);

        let lax = ParseOptions::lax().with_delimiters(Delimiters::default());
        let (result, issues) = parse(data.as_bytes(), &lax);
        let interchange = result.unwrap();
        assert_eq!(interchange.delimiters.segment, b'\n');
        assert_eq!(interchange.transaction_count(), 1);
        assert_eq!(issues[0].code, codes::DELIMITER_MISMATCH);
        assert_eq!(issues[0].severity, Severity::Info);
    }

    #[test]
    fn test_repetition_separator_parsed_when_declared() {
        let data = load_tender()
            .replace("*U*00401*", "*^*00501*")
            .replace("B2A*00", "B2A*00^04");
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(issues.is_empty(), "{issues:?}");
        let tx = &result.unwrap().groups[0].transactions[0];
        assert!(matches!(tx.segments[1].element(1), Some(Element::Repeated { repeats }) if repeats.len() == 2));
    }

    #[test]
    fn test_multiple_groups_and_transactions() {
        let tx = "ST*990*0002~B1*ACME*SHIP123*20240115*A~SE*3*0002~";
        let data = load_tender().replace(
            "GE*1*1~IEA*1*000000001~",
            &format!("GE*1*1~GS*GF*ACME*CARRIER*20240115*1030*2*X*004010~{tx}{}GE*2*2~IEA*2*000000001~", tx.replace("0002", "0003")),
        );
        let (result, issues) = parse(data.as_bytes(), &strict());
        assert!(issues.is_empty(), "{issues:?}");
        let interchange = result.unwrap();
        assert_eq!(interchange.groups.len(), 2);
        assert_eq!(interchange.transaction_count(), 3);
        assert_eq!(interchange.groups[1].transactions[1].control_number, "0003");
    }
}
