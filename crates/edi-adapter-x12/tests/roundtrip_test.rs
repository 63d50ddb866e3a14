//! Parse / serialize round trips over complete load tenders

use edi_adapter_x12::{AckGenerator, AckOptions, AckType, ParseOptions, X12Serializer, parse};
use edi_ir::issue::has_errors;
use edi_profile::Strictness;

const TENDER: &str = "\
ISA*00*          *00*          *ZZ*SHIPPERCO      *ZZ*FASTFREIGHT    *240301*0915*^*00501*000000120*1*T*:~
GS*SM*SHIPPERCO*FASTFREIGHT*20240301*0915*120*X*005010~
ST*204*0001~
B2**FFRT**LOAD-7781**PP~
B2A*00*LT~
L11*PO-55012*PO~
L11*BOL-99*BM^SI~
S5*1*CL~
G62*37*20240305*Y*0800~
N1*SH*SHIPPERCO DC*93*DC-01~
N3*100 INDUSTRIAL WAY~
N4*MEMPHIS*TN*38118*US~
S5*2*CU~
G62*53*20240307*Z*1700~
N1*CN*BIG BOX STORE 44~
N3*4400 MARKET ST~
N4*DENVER*CO*80216*US~
L3*42000*G***1850****11*24~
SE*17*0001~
GE*1*120~
IEA*1*000000120~
";

fn options() -> ParseOptions {
    ParseOptions {
        strictness: Strictness::Strict,
        ..ParseOptions::default()
    }
}

#[test]
fn test_full_tender_round_trip() -> anyhow::Result<()> {
    let (result, issues) = parse(TENDER.as_bytes(), &options());
    assert!(issues.is_empty(), "{issues:?}");
    let interchange = result?;

    assert_eq!(interchange.control_number(), "000000120");
    assert_eq!(interchange.header.usage_indicator, "T");
    assert_eq!(interchange.delimiters.repetition, Some(b'^'));
    assert_eq!(interchange.delimiters.sub_element, b':');

    let transaction = interchange.transactions().next().expect("one transaction");
    assert_eq!(transaction.segment_count(), 17);
    assert_eq!(transaction.find_all("L11").count(), 2);
    assert_eq!(transaction.require("B2", 4)?, "LOAD-7781");

    let rendered = X12Serializer::new()
        .with_line_breaks(true)
        .serialize_to_string(&interchange)?;
    assert_eq!(rendered, TENDER);

    let (again, issues) = parse(rendered.as_bytes(), &options());
    assert!(issues.is_empty());
    assert_eq!(again?, interchange);
    Ok(())
}

#[test]
fn test_compact_output_reparses() -> anyhow::Result<()> {
    let (result, _) = parse(TENDER.as_bytes(), &options());
    let interchange = result?;
    let compact = X12Serializer::new().serialize(&interchange)?;
    assert!(!compact.contains(&b'\n'));

    let (again, issues) = parse(&compact, &options());
    assert!(!has_errors(&issues));
    assert_eq!(again?, interchange);
    Ok(())
}

#[test]
fn test_acknowledgment_for_parsed_tender() -> anyhow::Result<()> {
    let (result, issues) = parse(TENDER.as_bytes(), &options());
    let interchange = result?;
    let ack = AckGenerator::new().generate(
        &interchange,
        &issues,
        &AckOptions::new(AckType::Functional, 7),
    )?;

    assert!(ack.content.starts_with("ISA*00*          *00*          *ZZ*FASTFREIGHT    *ZZ*SHIPPERCO      *"));
    assert!(ack.content.contains("*^*00501*000000007*0*T*:~"));
    assert!(ack.content.contains("AK1*SM*120~AK2*204*0001~AK5*A~AK9*A*1*1*1~"));

    let (parsed, ack_issues) = parse(ack.content.as_bytes(), &options());
    assert!(ack_issues.is_empty(), "{ack_issues:?}");
    assert_eq!(parsed?.primary_transaction_type(), Some("997"));
    Ok(())
}
