//! Profile import and export
//!
//! Import accepts a single JSON document carrying partner metadata plus the embedded
//! `configuration` object. Every violation is collected before failing so that a
//! caller sees all field problems at once.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::model::{PartnerProfile, ProfileConfiguration, default_encoding};
use crate::{Error, Result};

const PARTNER_ID_PATTERN: &str = "^[A-Za-z0-9_-]{3,50}$";

static PARTNER_ID: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(PARTNER_ID_PATTERN));

const DELIMITER_KEYS: [&str; 4] = ["element", "segment", "sub_element", "repetition"];

const ACK_TYPES: [&str; 2] = ["997", "999"];

/// One failed field rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    partner_id: Option<String>,
    #[serde(default)]
    partner_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    configuration: Option<Value>,
}

/// Check a partner identifier against the allowed format.
pub fn validate_partner_id(partner_id: &str) -> Result<()> {
    let pattern = PARTNER_ID
        .as_ref()
        .map_err(|e| Error::InvalidFormat(format!("partner id pattern: {e}")))?;
    if pattern.is_match(partner_id) {
        Ok(())
    } else {
        Err(Error::Invalid {
            violations: vec![partner_id_violation()],
        })
    }
}

fn partner_id_violation() -> FieldViolation {
    FieldViolation::new(
        "partner_id",
        "must be 3-50 characters of letters, digits, '-' or '_'",
        "pattern",
    )
}

/// Parse and validate an import document into a new profile.
///
/// The returned profile carries a fresh id and timestamps; the store decides whether
/// it replaces an existing profile.
pub fn import(json: &[u8]) -> Result<PartnerProfile> {
    let file: ProfileFile = serde_json::from_slice(json)
        .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;

    let mut violations = Vec::new();

    let partner_id = file.partner_id.unwrap_or_default();
    if partner_id.is_empty() {
        violations.push(FieldViolation::new("partner_id", "is required", "required"));
    } else if validate_partner_id(&partner_id).is_err() {
        violations.push(partner_id_violation());
    }

    let partner_name = file.partner_name.unwrap_or_default();
    if partner_name.trim().is_empty() {
        violations.push(FieldViolation::new("partner_name", "is required", "required"));
    }

    let mut configuration = match file.configuration {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(value @ Value::Object(_)) => value,
        Some(_) => {
            violations.push(FieldViolation::new(
                "configuration",
                "must be an object",
                "type",
            ));
            Value::Object(Map::new())
        }
    };

    let delimiters_ok = check_delimiters(&configuration, &mut violations);
    fill_defaults(&mut configuration);

    let configuration = if delimiters_ok {
        match serde_json::from_value::<ProfileConfiguration>(configuration) {
            Ok(config) => {
                check_configuration(&config, &mut violations);
                Some(config)
            }
            Err(e) => {
                violations.push(FieldViolation::new("configuration", e.to_string(), "invalid"));
                None
            }
        }
    } else {
        None
    };

    if !violations.is_empty() {
        debug!(partner_id = %partner_id, count = violations.len(), "Profile import rejected");
        return Err(Error::Invalid { violations });
    }

    let mut profile = PartnerProfile::new(partner_id, partner_name);
    profile.description = file.description.filter(|d| !d.is_empty());
    profile.active = file.active.unwrap_or(true);
    if let Some(configuration) = configuration {
        profile.configuration = configuration;
    }
    Ok(profile)
}

/// Import-shaped JSON for a stored profile.
pub fn export(profile: &PartnerProfile) -> Result<Value> {
    let configuration = serde_json::to_value(&profile.configuration)
        .map_err(|e| Error::InvalidFormat(format!("JSON serialization error: {e}")))?;
    let mut document = json!({
        "partner_id": profile.partner_id,
        "partner_name": profile.partner_name,
        "active": profile.active,
        "configuration": configuration,
    });
    if let (Some(description), Some(object)) = (&profile.description, document.as_object_mut()) {
        object.insert("description".to_string(), Value::String(description.clone()));
    }
    Ok(document)
}

/// Returns whether all four delimiters passed.
fn check_delimiters(configuration: &Value, violations: &mut Vec<FieldViolation>) -> bool {
    let before = violations.len();
    let Some(delimiters) = configuration.pointer("/format/delimiters") else {
        violations.push(FieldViolation::new(
            "configuration.format.delimiters",
            "is required",
            "required",
        ));
        return false;
    };

    let mut seen: Vec<(char, &str)> = Vec::with_capacity(DELIMITER_KEYS.len());
    for key in DELIMITER_KEYS {
        let field = format!("configuration.format.delimiters.{key}");
        match delimiters.get(key) {
            None | Some(Value::Null) => {
                violations.push(FieldViolation::new(field, "is required", "required"));
            }
            Some(Value::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii() => {
                        if let Some((_, other)) = seen.iter().find(|(d, _)| *d == c) {
                            violations.push(FieldViolation::new(
                                field,
                                format!("must differ from the {other} delimiter"),
                                "distinct",
                            ));
                        } else {
                            seen.push((c, key));
                        }
                    }
                    (Some(_), None) => violations.push(FieldViolation::new(
                        field,
                        "must be an ASCII character",
                        "ascii",
                    )),
                    _ => violations.push(FieldViolation::new(
                        field,
                        "must be exactly one character",
                        "length",
                    )),
                }
            }
            Some(_) => violations.push(FieldViolation::new(field, "must be a string", "type")),
        }
    }
    violations.len() == before
}

fn fill_defaults(configuration: &mut Value) {
    let Some(format) = configuration
        .pointer_mut("/format")
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    let blank = format
        .get("encoding")
        .is_none_or(|v| v.as_str().is_some_and(str::is_empty) || v.is_null());
    if blank {
        format.insert("encoding".to_string(), Value::String(default_encoding()));
    }
}

fn check_configuration(config: &ProfileConfiguration, violations: &mut Vec<FieldViolation>) {
    if let Some(limit) = config.rate_limit {
        if limit.requests_per_second.is_nan() || limit.requests_per_second <= 0.0 {
            violations.push(FieldViolation::new(
                "configuration.rate_limit.requests_per_second",
                "must be greater than zero",
                "min",
            ));
        }
        if limit.burst == 0 {
            violations.push(FieldViolation::new(
                "configuration.rate_limit.burst",
                "must be at least 1",
                "min",
            ));
        }
    }

    if !ACK_TYPES.contains(&config.acknowledgment.ack_type.as_str()) {
        violations.push(FieldViolation::new(
            "configuration.acknowledgment.ack_type",
            "must be 997 or 999",
            "oneof",
        ));
    }

    for (index, set) in config.transaction_sets.iter().enumerate() {
        if set.len() != 3 || !set.bytes().all(|b| b.is_ascii_digit()) {
            violations.push(FieldViolation::new(
                format!("configuration.transaction_sets[{index}]"),
                "must be a three-digit transaction set identifier",
                "pattern",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateFormat, Strictness};

    fn document() -> Value {
        json!({
            "partner_id": "ACME",
            "partner_name": "Acme Freight",
            "description": "Primary shipper",
            "active": true,
            "configuration": {
                "format": {
                    "delimiters": {"element": "*", "segment": "~", "sub_element": ">", "repetition": "^"}
                },
                "transaction_sets": ["204", "990"]
            }
        })
    }

    fn violations(value: Value) -> Vec<FieldViolation> {
        match import(value.to_string().as_bytes()) {
            Err(Error::Invalid { violations }) => violations,
            other => panic!("expected violations, got {other:?}"),
        }
    }

    #[test]
    fn test_import_fills_defaults() {
        let profile = import(document().to_string().as_bytes()).unwrap();
        assert_eq!(profile.partner_id, "ACME");
        assert_eq!(profile.configuration.format.encoding, "UTF-8");
        assert_eq!(profile.strictness(), Strictness::Strict);
        assert_eq!(
            profile.configuration.validation_config.date_format,
            DateFormat::Ccyymmdd
        );
        assert_eq!(profile.configuration.format.delimiters.sub_element, '>');
        assert!(profile.recognizes("204"));
    }

    #[test]
    fn test_missing_delimiter_is_reported() {
        let mut doc = document();
        doc["configuration"]["format"]["delimiters"]
            .as_object_mut()
            .unwrap()
            .remove("repetition");
        let v = violations(doc);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].field, "configuration.format.delimiters.repetition");
        assert_eq!(v[0].code, "required");
    }

    #[test]
    fn test_duplicate_delimiters_are_rejected() {
        let mut doc = document();
        doc["configuration"]["format"]["delimiters"]["segment"] = json!("*");
        let v = violations(doc);
        assert_eq!(v[0].code, "distinct");
        assert!(v[0].message.contains("element"));
    }

    #[test]
    fn test_multi_character_delimiter_is_rejected() {
        let mut doc = document();
        doc["configuration"]["format"]["delimiters"]["element"] = json!("**");
        let v = violations(doc);
        assert_eq!(v[0].code, "length");
    }

    #[test]
    fn test_partner_id_format() {
        let mut doc = document();
        doc["partner_id"] = json!("A!");
        let v = violations(doc);
        assert_eq!(v[0].field, "partner_id");

        assert!(validate_partner_id("acme_freight-01").is_ok());
        assert!(validate_partner_id("AC").is_err());
        assert!(validate_partner_id(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_collects_all_violations() {
        let v = violations(json!({"configuration": {"format": {}}}));
        let fields: Vec<&str> = v.iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"partner_id"));
        assert!(fields.contains(&"partner_name"));
        assert!(fields.contains(&"configuration.format.delimiters"));
    }

    #[test]
    fn test_strictness_must_be_known() {
        let mut doc = document();
        doc["configuration"]["validation_config"] = json!({"strictness": "relaxed"});
        let v = violations(doc);
        assert_eq!(v[0].field, "configuration");
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(import(b"{not json"), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_export_roundtrips_configuration() {
        let mut doc = document();
        doc["configuration"]["custom"] = json!({"nested": [1, 2]});
        let profile = import(doc.to_string().as_bytes()).unwrap();
        let exported = export(&profile).unwrap();

        assert_eq!(exported["partner_id"], "ACME");
        assert_eq!(exported["description"], "Primary shipper");
        assert_eq!(exported["configuration"]["custom"]["nested"], json!([1, 2]));
        assert_eq!(
            exported["configuration"]["format"]["delimiters"],
            doc["configuration"]["format"]["delimiters"]
        );

        let again = import(exported.to_string().as_bytes()).unwrap();
        assert_eq!(again.configuration, profile.configuration);
    }
}
