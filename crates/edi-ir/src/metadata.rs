//! Envelope metadata, delimiters and source positions
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].

use serde::{Deserialize, Serialize};

/// Source position information for error reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,

    /// Byte offset from start of input
    pub offset: usize,

    /// Length in bytes
    pub length: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize, offset: usize, length: usize) -> Self {
        Self {
            line,
            column,
            offset,
            length,
        }
    }
}

/// Delimiters of an X12 interchange.
///
/// All delimiters are single ASCII bytes. `repetition` is `None` when ISA11 carries
/// the legacy `U` standards identifier instead of a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    #[serde(with = "ascii_char")]
    pub element: u8,
    #[serde(with = "ascii_char")]
    pub segment: u8,
    #[serde(with = "ascii_char")]
    pub sub_element: u8,
    #[serde(with = "ascii_char::optional", default)]
    pub repetition: Option<u8>,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element: b'*',
            segment: b'~',
            sub_element: b'>',
            repetition: Some(b'^'),
        }
    }
}

impl Delimiters {
    /// Whether a byte is one of the active separators.
    pub fn is_separator(&self, byte: u8) -> bool {
        byte == self.element
            || byte == self.segment
            || byte == self.sub_element
            || self.repetition == Some(byte)
    }
}

/// Interchange control header (ISA) fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeHeader {
    /// ISA05
    pub sender_qualifier: String,
    /// ISA06 (trimmed)
    pub sender_id: String,
    /// ISA07
    pub receiver_qualifier: String,
    /// ISA08 (trimmed)
    pub receiver_id: String,
    /// ISA09 (YYMMDD)
    pub date: String,
    /// ISA10 (HHMM)
    pub time: String,
    /// ISA12
    pub version: String,
    /// ISA13
    pub control_number: String,
    /// ISA14
    pub ack_requested: bool,
    /// ISA15 (`P` production, `T` test)
    pub usage_indicator: String,
}

/// Functional group header (GS) fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHeader {
    /// GS01 functional identifier code (e.g. `SM` for 204)
    pub functional_id: String,
    /// GS02
    pub sender_code: String,
    /// GS03
    pub receiver_code: String,
    /// GS04 (CCYYMMDD)
    pub date: String,
    /// GS05
    pub time: String,
    /// GS06
    pub control_number: String,
    /// GS07
    pub agency: String,
    /// GS08 (e.g. `004010`)
    pub version: String,
}

mod ascii_char {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(char::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let c = char::deserialize(deserializer)?;
        to_byte(c).map_err(D::Error::custom)
    }

    fn to_byte(c: char) -> Result<u8, String> {
        u8::try_from(c)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| format!("delimiter '{c}' is not an ASCII character"))
    }

    pub mod optional {
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(value: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(byte) => serializer.serialize_some(&char::from(*byte)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u8>, D::Error> {
            Option::<char>::deserialize(deserializer)?
                .map(|c| super::to_byte(c).map_err(D::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delimiters() {
        let d = Delimiters::default();
        assert_eq!(d.element, b'*');
        assert_eq!(d.segment, b'~');
        assert_eq!(d.sub_element, b'>');
        assert_eq!(d.repetition, Some(b'^'));
        assert!(d.is_separator(b'^'));
        assert!(!d.is_separator(b'A'));
    }

    #[test]
    fn test_delimiters_serialize_as_characters() {
        let json = serde_json::to_value(Delimiters::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"element": "*", "segment": "~", "sub_element": ">", "repetition": "^"})
        );
    }

    #[test]
    fn test_delimiters_without_repetition() {
        let d: Delimiters = serde_json::from_value(
            serde_json::json!({"element": "*", "segment": "~", "sub_element": ":"}),
        )
        .unwrap();
        assert_eq!(d.repetition, None);
        assert_eq!(d.sub_element, b':');
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let result: Result<Delimiters, _> = serde_json::from_value(
            serde_json::json!({"element": "é", "segment": "~", "sub_element": ":"}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_position_creation() {
        let p = Position::new(2, 5, 120, 30);
        assert_eq!(p.line, 2);
        assert_eq!(p.column, 5);
        assert_eq!(p.offset, 120);
        assert_eq!(p.length, 30);
    }
}
