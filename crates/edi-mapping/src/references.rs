//! Business reference extraction

use edi_ir::TransactionSet;

/// The partner-facing identifier of a transaction set, when one can be found.
///
/// Each known set has a designated element; anything else falls back to the first
/// `REF-02` or `L11-01`.
pub fn business_reference(transaction: &TransactionSet) -> Option<String> {
    let designated = match transaction.transaction_type.as_str() {
        "204" => Some(("B2", 4)),
        "990" => Some(("B1", 2)),
        "214" => Some(("B10", 1)),
        "210" => Some(("B3", 2)),
        "850" => Some(("BEG", 3)),
        _ => None,
    };
    if let Some((tag, position)) = designated {
        if let Some(value) = transaction.find(tag).and_then(|s| s.trimmed(position)) {
            return Some(value.to_string());
        }
    }

    transaction
        .segments
        .iter()
        .find_map(|segment| match segment.tag.as_str() {
            "REF" => segment.trimmed(2),
            "L11" => segment.trimmed(1),
            _ => None,
        })
        .map(str::to_string)
}
