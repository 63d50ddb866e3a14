//! Partner profile model

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A trading partner profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerProfile {
    /// Synthetic identifier, stable across updates
    pub id: Uuid,
    pub partner_id: String,
    pub partner_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub configuration: ProfileConfiguration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped on every save
    pub version: i64,
}

impl PartnerProfile {
    /// A fresh, active profile with default configuration.
    pub fn new(partner_id: impl Into<String>, partner_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            partner_id: partner_id.into(),
            partner_name: partner_name.into(),
            description: None,
            active: true,
            configuration: ProfileConfiguration::default(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn strictness(&self) -> Strictness {
        self.configuration.validation_config.strictness
    }

    /// Whether `ST01` is in the recognized set.
    pub fn recognizes(&self, transaction_type: &str) -> bool {
        self.configuration
            .transaction_sets
            .iter()
            .any(|t| t == transaction_type)
    }
}

/// The `configuration` object of a profile.
///
/// Unknown keys are kept in `extensions` and written back on export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfiguration {
    #[serde(default)]
    pub format: FormatConfig,

    #[serde(default)]
    pub envelope: EnvelopeConfig,

    #[serde(default)]
    pub validation_config: ValidationConfig,

    /// Recognized transaction sets (`ST01` values)
    #[serde(default, alias = "recognized_transaction_sets")]
    pub transaction_sets: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,

    #[serde(default)]
    pub acknowledgment: AcknowledgmentConfig,

    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default)]
    pub delimiters: Delimiters,

    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Expected ISA12/GS08 version, e.g. `004010`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            delimiters: Delimiters::default(),
            encoding: default_encoding(),
            version: None,
        }
    }
}

pub(crate) fn default_encoding() -> String {
    "UTF-8".to_string()
}

/// Declared delimiters; each is a single ASCII character and all four are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub element: char,
    pub segment: char,
    pub sub_element: char,
    pub repetition: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element: '*',
            segment: '~',
            sub_element: '>',
            repetition: '^',
        }
    }
}

impl Delimiters {
    /// Byte-level delimiters as the parser uses them.
    ///
    /// Non-ASCII characters are rejected at import, so the narrowing only falls back
    /// to the X12 defaults for hand-built profiles.
    pub fn to_x12(&self) -> edi_ir::Delimiters {
        let defaults = edi_ir::Delimiters::default();
        let byte = |c: char, fallback: u8| u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(fallback);
        edi_ir::Delimiters {
            element: byte(self.element, defaults.element),
            segment: byte(self.segment, defaults.segment),
            sub_element: byte(self.sub_element, defaults.sub_element),
            repetition: Some(byte(self.repetition, defaults.repetition.unwrap_or(b'^'))),
        }
    }
}

/// Expected envelope identifiers. Empty fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_qualifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_qualifier: Option<String>,
}

/// How deviations from the profile are judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    #[default]
    Strict,
    Lax,
}

impl Strictness {
    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }

    /// Severity for findings that are errors when strict and warnings when lax.
    pub fn severity(self) -> edi_ir::Severity {
        match self {
            Strictness::Strict => edi_ir::Severity::Error,
            Strictness::Lax => edi_ir::Severity::Warn,
        }
    }
}

/// Date layout a partner writes in G62 and similar elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "CCYYMMDD")]
    Ccyymmdd,
    #[serde(rename = "YYMMDD")]
    Yymmdd,
}

impl DateFormat {
    /// `chrono` format string for the layout.
    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::Ccyymmdd => "%Y%m%d",
            DateFormat::Yymmdd => "%y%m%d",
        }
    }

    /// Number of digits the layout occupies.
    pub fn width(self) -> usize {
        match self {
            DateFormat::Ccyymmdd => 8,
            DateFormat::Yymmdd => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateFormat::Ccyymmdd => "CCYYMMDD",
            DateFormat::Yymmdd => "YYMMDD",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub strictness: Strictness,

    /// L11/REF qualifiers every load tender must carry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_reference_qualifiers: Vec<String>,

    #[serde(default)]
    pub date_format: DateFormat,

    /// Require a carrier SCAC (B2-02) on load tenders
    #[serde(default)]
    pub require_scac: bool,
}

/// Per-partner override of the default token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgmentConfig {
    /// `997` or `999`
    #[serde(default = "default_ack_type")]
    pub ack_type: String,
}

impl Default for AcknowledgmentConfig {
    fn default() -> Self {
        Self {
            ack_type: default_ack_type(),
        }
    }
}

fn default_ack_type() -> String {
    "997".to_string()
}
