//! Integration tests for edi-validation
//!
//! Profiles are imported from JSON exactly as partners submit them.

use edi_adapter_x12::{ParseOptions, parse};
use edi_ir::Severity;
use edi_ir::issue::{codes, has_errors};
use edi_profile::PartnerProfile;
use edi_validation::{ValidationReport, validate};

const TENDER: &str = "ISA*00*          *00*          *ZZ*ACME           *ZZ*CARRIER        *240115*1030*U*00401*000000001*0*P*>~\
GS*SM*ACME*CARRIER*20240115*1030*1*X*004010~\
ST*204*0001~B2**ACME**SHIP123**PP~B2A*00~L11*PO-1*PO~S5*1*CL~G62*37*20240120~N1*SH*ORIGIN~S5*2*CU~G62*53*2024-01-22~N1*CN*DEST~SE*11*0001~\
ST*204*0002~B2****SHIP124**PP~S5*1*CL~N1*SH*ORIGIN~S5*2*CU~N1*CN*DEST~SE*7*0002~\
GE*2*1~IEA*1*000000001~";

fn profile(strictness: &str) -> anyhow::Result<PartnerProfile> {
    let json = serde_json::json!({
        "partner_id": "ACME",
        "partner_name": "Acme Logistics",
        "configuration": {
            "format": {
                "delimiters": {"element": "*", "segment": "~", "sub_element": ">", "repetition": "^"},
                "version": "004010"
            },
            "envelope": {"sender_id": "ACME", "receiver_id": "CARRIER"},
            "validation_config": {
                "strictness": strictness,
                "required_reference_qualifiers": ["PO"],
                "date_format": "CCYYMMDD",
                "require_scac": true
            },
            "transaction_sets": ["204", "990"]
        }
    });
    Ok(edi_profile::import(json.to_string().as_bytes())?)
}

fn parsed() -> anyhow::Result<edi_ir::Interchange> {
    let (result, issues) = parse(TENDER.as_bytes(), &ParseOptions::default());
    assert!(issues.is_empty(), "{issues:?}");
    Ok(result?)
}

#[test]
fn test_strict_profile_reports_errors_per_transaction() -> anyhow::Result<()> {
    let issues = validate(&parsed()?, &profile("strict")?);
    let report = ValidationReport::new(issues);

    let first: Vec<_> = report.for_transaction("0001").map(|i| i.code.as_str()).collect();
    assert_eq!(first, vec![codes::INVALID_DATE]);

    let second: Vec<_> = report.for_transaction("0002").map(|i| i.code.as_str()).collect();
    assert_eq!(second, vec![codes::MISSING_REFERENCE, codes::MISSING_SCAC]);

    assert_eq!(report.errors, 3);
    assert!(has_errors(&report.issues));
    Ok(())
}

#[test]
fn test_lax_profile_downgrades_partner_rules() -> anyhow::Result<()> {
    let issues = validate(&parsed()?, &profile("lax")?);
    assert_eq!(issues.len(), 3);
    assert!(issues.iter().all(|i| i.severity == Severity::Warn));
    assert!(!has_errors(&issues));
    Ok(())
}

#[test]
fn test_envelope_errors_stay_errors_under_lax() -> anyhow::Result<()> {
    let data = TENDER.replace("GE*2*1", "GE*3*1");
    let (result, _) = parse(data.as_bytes(), &ParseOptions::lax());
    let issues = validate(&result?, &profile("lax")?);

    let mismatch = issues
        .iter()
        .find(|i| i.code == codes::GE_COUNT_MISMATCH)
        .expect("GE01 mismatch reported");
    assert_eq!(mismatch.severity, Severity::Error);
    assert_eq!(mismatch.segment_ref.as_deref(), Some("GE@21"));
    Ok(())
}
