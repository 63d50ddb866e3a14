//! Validation engine

use edi_adapter_x12::envelopes;
use edi_ir::issue::codes;
use edi_ir::{Interchange, Issue, TransactionSet};
use edi_profile::{PartnerProfile, Strictness};
use tracing::debug;

use crate::rules;

/// Validates interchanges for one partner.
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'p> {
    profile: &'p PartnerProfile,
}

impl<'p> ValidationEngine<'p> {
    pub fn new(profile: &'p PartnerProfile) -> Self {
        Self { profile }
    }

    pub fn strictness(&self) -> Strictness {
        self.profile.strictness()
    }

    /// Run every check over the interchange.
    pub fn validate(&self, interchange: &Interchange) -> Vec<Issue> {
        let mut issues = envelopes::check_all(interchange);
        self.check_identity(interchange, &mut issues);

        for transaction in interchange.transactions() {
            if !self.check_recognized(transaction, &mut issues) {
                continue;
            }
            self.check_partner_rules(transaction, &mut issues);
        }

        debug!(
            partner_id = %self.profile.partner_id,
            control_number = %interchange.control_number(),
            issues = issues.len(),
            "Validated interchange"
        );
        issues
    }

    /// Sender, receiver and version against the profile's expectations.
    fn check_identity(&self, interchange: &Interchange, issues: &mut Vec<Issue>) {
        let config = &self.profile.configuration;
        let severity = self.strictness().severity();
        let header = &interchange.header;

        let expected = &config.envelope;
        if let Some(mismatch) = rules::identity_mismatch(
            "ISA06",
            expected.sender_qualifier.as_deref(),
            expected.sender_id.as_deref(),
            &header.sender_qualifier,
            &header.sender_id,
        ) {
            issues.push(
                Issue::new(severity, codes::SENDER_MISMATCH, mismatch)
                    .with_segment_ref("ISA", 1)
                    .with_field("ISA06"),
            );
        }
        if let Some(mismatch) = rules::identity_mismatch(
            "ISA08",
            expected.receiver_qualifier.as_deref(),
            expected.receiver_id.as_deref(),
            &header.receiver_qualifier,
            &header.receiver_id,
        ) {
            issues.push(
                Issue::new(severity, codes::RECEIVER_MISMATCH, mismatch)
                    .with_segment_ref("ISA", 1)
                    .with_field("ISA08"),
            );
        }

        let Some(version) = config.format.version.as_deref().filter(|v| !v.is_empty()) else {
            return;
        };
        // ISA is segment 1; each group contributes GS, its transaction sets and GE.
        let mut ordinal = 1;
        for group in &interchange.groups {
            ordinal += 1;
            if !rules::version_matches(version, &header.version, &group.header.version) {
                issues.push(
                    Issue::new(
                        severity,
                        codes::VERSION_MISMATCH,
                        format!(
                            "group {} declares version '{}', partner expects '{version}'",
                            group.header.control_number, group.header.version
                        ),
                    )
                    .with_segment_ref("GS", ordinal)
                    .with_field("GS08"),
                );
            }
            ordinal += group.transactions.iter().map(TransactionSet::segment_count).sum::<usize>() + 1;
        }
    }

    fn check_recognized(&self, transaction: &TransactionSet, issues: &mut Vec<Issue>) -> bool {
        if self.profile.recognizes(&transaction.transaction_type) {
            return true;
        }
        issues.push(
            Issue::new(
                self.strictness().severity(),
                codes::UNRECOGNIZED_TRANSACTION_SET,
                format!(
                    "transaction set {} is not recognized for partner {}",
                    transaction.transaction_type, self.profile.partner_id
                ),
            )
            .with_segment_ref("ST", 1)
            .with_field("ST01")
            .in_transaction(&transaction.control_number),
        );
        false
    }

    fn check_partner_rules(&self, transaction: &TransactionSet, issues: &mut Vec<Issue>) {
        let config = &self.profile.configuration.validation_config;
        let severity = config.strictness.severity();
        let before = issues.len();

        if transaction.transaction_type == "204" {
            rules::check_references(transaction, &config.required_reference_qualifiers, severity, issues);
            if config.require_scac {
                rules::check_scac(transaction, severity, issues);
            }
        }
        rules::check_dates(transaction, config.date_format, severity, issues);

        for issue in &mut issues[before..] {
            issue.transaction = Some(transaction.control_number.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_adapter_x12::{ParseOptions, parse};
    use edi_ir::Severity;

    const TENDER: &str = "ISA*00*          *00*          *ZZ*ACME           *ZZ*CARRIER        *240115*1030*U*00401*000000001*0*P*>~\
GS*SM*ACME*CARRIER*20240115*1030*1*X*004010~\
ST*204*0001~B2**ACME**SHIP123**PP~L11*PO-1*PO~G62*37*20240120~N1*SH*A~N1*CN*B~SE*7*0001~\
GE*1*1~IEA*1*000000001~";

    fn interchange(data: &str) -> Interchange {
        let (result, _) = parse(data.as_bytes(), &ParseOptions::lax());
        result.unwrap()
    }

    fn profile() -> PartnerProfile {
        let mut profile = PartnerProfile::new("ACME", "Acme Logistics");
        profile.configuration.transaction_sets = vec!["204".to_string()];
        profile
    }

    fn codes_of(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn test_clean_tender() {
        let issues = ValidationEngine::new(&profile()).validate(&interchange(TENDER));
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_envelope_recheck() {
        let data = TENDER.replace("SE*7*0001", "SE*9*0001");
        let issues = ValidationEngine::new(&profile()).validate(&interchange(&data));
        assert_eq!(codes_of(&issues), vec![codes::SE_COUNT_MISMATCH]);
        assert_eq!(issues[0].segment_ref.as_deref(), Some("SE@7"));
    }

    #[test]
    fn test_unrecognized_follows_strictness() {
        let mut profile = profile();
        profile.configuration.transaction_sets = vec!["990".to_string()];
        let issues = ValidationEngine::new(&profile).validate(&interchange(TENDER));
        assert_eq!(codes_of(&issues), vec![codes::UNRECOGNIZED_TRANSACTION_SET]);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].transaction.as_deref(), Some("0001"));

        profile.configuration.validation_config.strictness = Strictness::Lax;
        let issues = ValidationEngine::new(&profile).validate(&interchange(TENDER));
        assert_eq!(issues[0].severity, Severity::Warn);
    }

    #[test]
    fn test_unrecognized_skips_partner_rules() {
        let mut profile = profile();
        profile.configuration.transaction_sets.clear();
        profile.configuration.validation_config.require_scac = true;
        let data = TENDER.replace("B2**ACME**", "B2****");
        let issues = ValidationEngine::new(&profile).validate(&interchange(&data));
        assert_eq!(codes_of(&issues), vec![codes::UNRECOGNIZED_TRANSACTION_SET]);
    }

    #[test]
    fn test_identity_checks() {
        let mut profile = profile();
        profile.configuration.envelope.sender_id = Some("OTHER".to_string());
        profile.configuration.envelope.receiver_id = Some("CARRIER".to_string());
        profile.configuration.format.version = Some("005010".to_string());

        let issues = ValidationEngine::new(&profile).validate(&interchange(TENDER));
        assert_eq!(
            codes_of(&issues),
            vec![codes::SENDER_MISMATCH, codes::VERSION_MISMATCH]
        );
        assert_eq!(issues[0].segment_ref.as_deref(), Some("ISA@1"));
        assert_eq!(issues[1].segment_ref.as_deref(), Some("GS@2"));
    }

    #[test]
    fn test_partner_rules_are_scoped_to_transaction() {
        let mut profile = profile();
        profile.configuration.validation_config.required_reference_qualifiers =
            vec!["PO".to_string(), "BM".to_string()];
        let issues = ValidationEngine::new(&profile).validate(&interchange(TENDER));
        assert_eq!(codes_of(&issues), vec![codes::MISSING_REFERENCE]);
        assert_eq!(issues[0].transaction.as_deref(), Some("0001"));
        assert!(issues[0].message.contains("BM"));
    }
}
