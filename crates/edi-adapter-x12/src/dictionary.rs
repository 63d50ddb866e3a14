//! Segment dictionaries for the transaction sets the engine knows about
//!
//! Only body segments are listed; envelope segments are handled by the parser.
//! Transaction sets without a dictionary are not tag-checked.

/// 204 Motor Carrier Load Tender
const LOAD_TENDER_204: &[&str] = &[
    "B2", "B2A", "L11", "G62", "MS3", "AT5", "RTT", "C3", "NTE", "N1", "N2", "N3", "N4", "G61",
    "N7", "N7A", "N7B", "MEA", "M7", "S5", "AT8", "LAD", "OID", "PLD", "SPO", "L5", "H1", "H2",
    "L4", "LH1", "LH2", "LH3", "LFH", "LEP", "LH4", "LHT", "LHR", "PER", "REF", "L3", "G82",
];

/// 210 Motor Carrier Freight Details and Invoice
const FREIGHT_INVOICE_210: &[&str] = &[
    "B3", "C2", "C3", "ITD", "N9", "G62", "R3", "H3", "K1", "N1", "N2", "N3", "N4", "N7", "M7",
    "S5", "LX", "L5", "L0", "L1", "L4", "L7", "SL1", "L3", "REF", "L11", "NTE", "G61", "POD",
];

/// 214 Transportation Carrier Shipment Status Message
const SHIPMENT_STATUS_214: &[&str] = &[
    "B10", "L11", "MAN", "K1", "N1", "N2", "N3", "N4", "G62", "G61", "MS3", "LX", "AT7", "MS1",
    "MS2", "AT5", "AT8", "CD3", "Q7", "SPO", "NTE", "REF",
];

/// 990 Response to a Load Tender
const TENDER_RESPONSE_990: &[&str] = &["B1", "N9", "G62", "V9", "K1", "REF", "L11", "NTE"];

/// 997 Functional Acknowledgment
const FUNCTIONAL_ACK_997: &[&str] = &["AK1", "AK2", "AK3", "AK4", "AK5", "AK9"];

/// 999 Implementation Acknowledgment
const IMPLEMENTATION_ACK_999: &[&str] = &["AK1", "AK2", "IK3", "CTX", "IK4", "IK5", "AK9"];

/// Known body segments of a transaction set, if a dictionary exists for it.
pub fn known_segments(transaction_type: &str) -> Option<&'static [&'static str]> {
    match transaction_type {
        "204" => Some(LOAD_TENDER_204),
        "210" => Some(FREIGHT_INVOICE_210),
        "214" => Some(SHIPMENT_STATUS_214),
        "990" => Some(TENDER_RESPONSE_990),
        "997" => Some(FUNCTIONAL_ACK_997),
        "999" => Some(IMPLEMENTATION_ACK_999),
        _ => None,
    }
}

/// `Some(false)` when the tag is not in the dictionary of a known transaction set,
/// `None` when the transaction set has no dictionary.
pub fn is_known(transaction_type: &str, tag: &str) -> Option<bool> {
    known_segments(transaction_type).map(|tags| tags.contains(&tag))
}
