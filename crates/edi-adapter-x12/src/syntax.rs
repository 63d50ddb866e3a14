//! X12 syntax: delimiter detection and segment tokenizing
//!
//! The ISA segment is fixed-width (106 bytes), which is what makes delimiter
//! detection possible before anything else is known:
//!
//! ```text
//! ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*^*00401*000000001*0*P*>~
//!    ^ offset 3: element separator                                        ^ 82: ISA11     offset 104 ^^ 105
//! ```

use edi_ir::issue::codes;
use edi_ir::{Delimiters, Element, Issue, Position};
use edi_profile::Strictness;

use crate::{ParseError, ParseErrorKind};

/// Length of the fixed-width ISA segment, terminator included.
pub const ISA_LENGTH: usize = 106;

const ELEMENT_SEPARATOR_OFFSET: usize = 3;
const REPETITION_OFFSET: usize = 82;
const SUB_ELEMENT_OFFSET: usize = 104;
const SEGMENT_TERMINATOR_OFFSET: usize = 105;

/// Offsets (relative to the `I` of ISA) of the 16 element separators.
const ISA_SEPARATOR_OFFSETS: [usize; 16] = [
    3, 6, 17, 20, 31, 34, 50, 53, 69, 76, 81, 83, 89, 99, 101, 103,
];

/// ISA11 value meaning "no repetition separator" (pre-5010 standards identifier).
pub const NO_REPETITION: u8 = b'U';

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Offset of the first meaningful byte (skips a UTF-8 BOM and leading whitespace).
pub fn skip_preamble(data: &[u8]) -> usize {
    let mut pos = if data.starts_with(UTF8_BOM) {
        UTF8_BOM.len()
    } else {
        0
    };
    while data.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

/// Read the delimiters out of the fixed-width ISA starting at `start`.
pub fn detect_delimiters(data: &[u8], start: usize) -> Result<Delimiters, ParseError> {
    let rest = &data[start.min(data.len())..];
    if !rest.starts_with(b"ISA") {
        return Err(ParseError::new(
            ParseErrorKind::MissingIsa,
            start,
            format!("input starts with '{}'", preview(rest, 8)),
        ));
    }
    if rest.len() < ISA_LENGTH {
        return Err(ParseError::new(
            ParseErrorKind::InvalidIsa,
            start,
            format!("ISA needs {ISA_LENGTH} bytes, input has {}", rest.len()),
        ));
    }

    let element = rest[ELEMENT_SEPARATOR_OFFSET];
    if let Some(offset) = ISA_SEPARATOR_OFFSETS
        .iter()
        .copied()
        .find(|&offset| rest[offset] != element)
    {
        return Err(ParseError::new(
            ParseErrorKind::InvalidIsa,
            start + offset,
            format!(
                "ISA is not fixed-width: expected '{}' at position {offset}, found '{}'",
                char::from(element),
                char::from(rest[offset])
            ),
        ));
    }

    let repetition = rest[REPETITION_OFFSET];
    let delimiters = Delimiters {
        element,
        segment: rest[SEGMENT_TERMINATOR_OFFSET],
        sub_element: rest[SUB_ELEMENT_OFFSET],
        repetition: (repetition != NO_REPETITION).then_some(repetition),
    };
    check_usable(&delimiters, start)?;
    Ok(delimiters)
}

/// Reject delimiter sets the tokenizer cannot work with.
fn check_usable(delimiters: &Delimiters, offset: usize) -> Result<(), ParseError> {
    let mut all = vec![delimiters.element, delimiters.segment, delimiters.sub_element];
    all.extend(delimiters.repetition);
    if let Some(bad) = all.iter().find(|b| b.is_ascii_alphanumeric()) {
        return Err(ParseError::new(
            ParseErrorKind::InvalidDelimiters,
            offset,
            format!("delimiter '{}' is alphanumeric", char::from(*bad)),
        ));
    }
    for (i, a) in all.iter().enumerate() {
        if all[i + 1..].contains(a) {
            return Err(ParseError::new(
                ParseErrorKind::InvalidDelimiters,
                offset,
                format!("delimiter '{}' is used twice", char::from(*a)),
            ));
        }
    }
    Ok(())
}

/// Compare detected delimiters against the declared ones.
///
/// Strict handling fails on any difference. Lax handling keeps the detected
/// delimiters and reports the difference as an advisory issue. The repetition
/// separator is only compared when ISA11 declares one.
pub fn reconcile(
    detected: Delimiters,
    declared: Option<Delimiters>,
    strictness: Strictness,
    offset: usize,
) -> Result<(Delimiters, Vec<Issue>), ParseError> {
    let Some(declared) = declared else {
        return Ok((detected, Vec::new()));
    };

    let mut differences = Vec::new();
    let mut compare = |name: &str, found: u8, expected: u8| {
        if found != expected {
            differences.push(format!(
                "{name} is '{}', profile declares '{}'",
                printable(found),
                printable(expected)
            ));
        }
    };
    compare("element separator", detected.element, declared.element);
    compare("segment terminator", detected.segment, declared.segment);
    compare("sub-element separator", detected.sub_element, declared.sub_element);
    if let Some(found) = detected.repetition {
        match declared.repetition {
            Some(expected) => compare("repetition separator", found, expected),
            None => compare("repetition separator", found, NO_REPETITION),
        }
    }

    if differences.is_empty() {
        return Ok((detected, Vec::new()));
    }

    let message = differences.join("; ");
    if strictness.is_strict() {
        return Err(ParseError::new(
            ParseErrorKind::DelimiterMismatch,
            offset,
            message,
        ));
    }
    let issue = Issue::info(
        codes::DELIMITER_MISMATCH,
        format!("using delimiters found in ISA: {message}"),
    )
    .with_segment_ref("ISA", 1);
    Ok((detected, vec![issue]))
}

/// One segment's bytes, without its terminator.
#[derive(Debug, Clone, Copy)]
pub struct RawSegment<'a> {
    pub bytes: &'a [u8],
    pub position: Position,
}

impl RawSegment<'_> {
    /// Segment tag: the bytes before the first element separator.
    pub fn tag(&self, delimiters: &Delimiters) -> &[u8] {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == delimiters.element)
            .unwrap_or(self.bytes.len());
        &self.bytes[..end]
    }
}

/// Splits input into segments at the segment terminator.
///
/// Whitespace between a terminator and the next tag is skipped unless it is itself a
/// delimiter (some partners terminate segments with `\n`).
pub struct SegmentReader<'a> {
    data: &'a [u8],
    pos: usize,
    delimiters: Delimiters,
    line: usize,
    column: usize,
}

impl<'a> SegmentReader<'a> {
    /// Reader positioned at `start`, which must be the first byte of a segment.
    pub fn new(data: &'a [u8], start: usize, delimiters: Delimiters) -> Self {
        let (line, column) = line_column(data, start);
        Self {
            data,
            pos: start,
            delimiters,
            line,
            column,
        }
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether only filler remains.
    pub fn is_exhausted(&mut self) -> bool {
        self.skip_filler();
        self.pos >= self.data.len()
    }

    /// Remaining bytes from the current position.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn advance(&mut self, count: usize) {
        let end = (self.pos + count).min(self.data.len());
        for &b in &self.data[self.pos..end] {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = end;
    }

    fn skip_filler(&mut self) {
        let mut count = 0;
        while let Some(&b) = self.data.get(self.pos + count) {
            if b.is_ascii_whitespace() && !self.delimiters.is_separator(b) {
                count += 1;
            } else if b == self.delimiters.segment && b.is_ascii_whitespace() {
                // Blank lines when the terminator is itself a newline.
                count += 1;
            } else {
                break;
            }
        }
        self.advance(count);
    }

    /// Next segment, or `None` at end of input. A final segment without a
    /// terminator is returned as-is.
    pub fn next_segment(&mut self) -> Option<RawSegment<'a>> {
        self.skip_filler();
        if self.pos >= self.data.len() {
            return None;
        }

        let start = self.pos;
        let position_line = self.line;
        let position_column = self.column;
        let rest = &self.data[start..];
        let length = rest
            .iter()
            .position(|&b| b == self.delimiters.segment)
            .unwrap_or(rest.len());

        let bytes = &rest[..length];
        let terminated = length < rest.len();
        self.advance(length + usize::from(terminated));

        Some(RawSegment {
            bytes,
            position: Position::new(position_line, position_column, start, length),
        })
    }
}

/// Whether bytes form a plausible segment tag: 2-3 characters, an uppercase letter
/// followed by uppercase letters or digits.
pub fn is_valid_tag(tag: &[u8]) -> bool {
    (2..=3).contains(&tag.len())
        && tag[0].is_ascii_uppercase()
        && tag[1..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Split a segment's element data into elements.
///
/// `bytes` is the whole segment without terminator. Empty elements are kept so
/// positions stay stable.
pub fn split_elements(bytes: &[u8], delimiters: &Delimiters) -> Vec<Element> {
    let Some(first) = bytes.iter().position(|&b| b == delimiters.element) else {
        return Vec::new();
    };
    bytes[first + 1..]
        .split(|&b| b == delimiters.element)
        .map(|field| to_element(field, delimiters))
        .collect()
}

/// Split the ISA segment: every element is primitive, since ISA11 and ISA16 carry
/// the separators themselves.
pub fn split_isa(bytes: &[u8], delimiters: &Delimiters) -> Vec<Element> {
    let Some(first) = bytes.iter().position(|&b| b == delimiters.element) else {
        return Vec::new();
    };
    bytes[first + 1..]
        .split(|&b| b == delimiters.element)
        .map(|field| Element::Primitive(text(field)))
        .collect()
}

fn to_element(field: &[u8], delimiters: &Delimiters) -> Element {
    if let Some(repetition) = delimiters.repetition {
        if field.contains(&repetition) {
            return Element::Repeated {
                repeats: field
                    .split(|&b| b == repetition)
                    .map(|occurrence| to_simple_or_composite(occurrence, delimiters))
                    .collect(),
            };
        }
    }
    to_simple_or_composite(field, delimiters)
}

fn to_simple_or_composite(field: &[u8], delimiters: &Delimiters) -> Element {
    if field.contains(&delimiters.sub_element) {
        Element::Composite(
            field
                .split(|&b| b == delimiters.sub_element)
                .map(text)
                .collect(),
        )
    } else {
        Element::Primitive(text(field))
    }
}

/// Decode element bytes; invalid UTF-8 is replaced rather than rejected.
pub fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// 1-based line and column of a byte offset.
pub fn line_column(data: &[u8], offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for &b in &data[..offset.min(data.len())] {
        if b == b'\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}

/// Short printable excerpt for error context.
pub fn preview(bytes: &[u8], max: usize) -> String {
    let end = bytes.len().min(max);
    let mut excerpt = text(&bytes[..end]);
    if bytes.len() > max {
        excerpt.push_str("...");
    }
    excerpt
}

fn printable(byte: u8) -> String {
    match byte {
        b'\n' => "\\n".to_string(),
        b'\r' => "\\r".to_string(),
        b'\t' => "\\t".to_string(),
        other => char::from(other).to_string(),
    }
}
