//! Interchange, functional group and transaction set containers
#![allow(clippy::must_use_candidate)] // Accessors are clear at call sites without #[must_use].

use serde::{Deserialize, Serialize};

use crate::metadata::{Delimiters, GroupHeader, InterchangeHeader};
use crate::segment::Segment;
use crate::{Error, Result};

/// A complete X12 interchange (ISA ... IEA).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interchange {
    /// Decoded ISA fields
    pub header: InterchangeHeader,

    /// Delimiters the interchange was written with
    pub delimiters: Delimiters,

    /// ISA segment as received
    pub isa: Segment,

    /// Functional groups in input order
    pub groups: Vec<FunctionalGroup>,

    /// IEA trailer as received
    pub iea: Segment,
}

/// A functional group (GS ... GE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalGroup {
    pub header: GroupHeader,
    pub gs: Segment,
    pub transactions: Vec<TransactionSet>,
    pub ge: Segment,
}

/// A transaction set (ST ... SE).
///
/// `segments` holds the body only; the ST header and SE trailer are kept separately
/// so that body traversal never has to skip them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSet {
    /// ST01 (e.g. `204`)
    pub transaction_type: String,

    /// ST02
    pub control_number: String,

    pub st: Segment,

    /// Body segments between ST and SE
    pub segments: Vec<Segment>,

    pub se: Segment,
}

impl Interchange {
    /// ISA13
    pub fn control_number(&self) -> &str {
        &self.header.control_number
    }

    /// ISA12
    pub fn version(&self) -> &str {
        &self.header.version
    }

    /// Iterate over every transaction set in every group.
    pub fn transactions(&self) -> impl Iterator<Item = &TransactionSet> {
        self.groups.iter().flat_map(|g| g.transactions.iter())
    }

    /// Total number of transaction sets across all groups.
    pub fn transaction_count(&self) -> usize {
        self.groups.iter().map(|g| g.transactions.len()).sum()
    }

    /// Transaction type of the first transaction set, if any.
    pub fn primary_transaction_type(&self) -> Option<&str> {
        self.transactions().next().map(|t| t.transaction_type.as_str())
    }

    /// GS08 of the first group, falling back to ISA12.
    pub fn primary_version(&self) -> &str {
        self.groups
            .first()
            .map(|g| g.header.version.as_str())
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.header.version)
    }

    /// Canonical JSON of the whole tree.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::conversion("interchange json", e.to_string()))
    }
}

impl FunctionalGroup {
    /// GS06
    pub fn control_number(&self) -> &str {
        &self.header.control_number
    }
}

impl TransactionSet {
    /// Segment count as SE01 should report it (ST and SE included).
    pub fn segment_count(&self) -> usize {
        self.segments.len() + 2
    }

    /// First body segment with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is(tag))
    }

    /// All body segments with the given tag, in order.
    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |s| s.is(tag))
    }

    /// Value of `tag` element `position`, or an error naming the missing reference.
    pub fn require(&self, tag: &str, position: usize) -> Result<&str> {
        let segment = self.find(tag).ok_or_else(|| Error::segment_not_found(tag))?;
        segment
            .value(position)
            .ok_or_else(|| Error::element_not_found(tag, position))
    }

    /// Index of a body segment in the ST-through-SE numbering (ST is 1).
    pub fn ordinal(index: usize) -> usize {
        index + 2
    }

    /// Canonical JSON of this transaction set.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::conversion("transaction json", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction() -> TransactionSet {
        TransactionSet {
            transaction_type: "204".to_string(),
            control_number: "0001".to_string(),
            st: Segment::from_values("ST", ["204", "0001"]),
            segments: vec![
                Segment::from_values("B2", ["", "ACME", "", "SHIP123"]),
                Segment::from_values("N1", ["SH", "Origin"]),
                Segment::from_values("N1", ["CN", "Destination"]),
            ],
            se: Segment::from_values("SE", ["5", "0001"]),
        }
    }

    fn interchange() -> Interchange {
        Interchange {
            header: InterchangeHeader {
                control_number: "000000001".to_string(),
                version: "00401".to_string(),
                ..Default::default()
            },
            delimiters: Delimiters::default(),
            isa: Segment::from_values("ISA", ["00"]),
            groups: vec![FunctionalGroup {
                header: GroupHeader {
                    control_number: "1".to_string(),
                    version: "004010".to_string(),
                    ..Default::default()
                },
                gs: Segment::from_values("GS", ["SM"]),
                transactions: vec![transaction()],
                ge: Segment::from_values("GE", ["1", "1"]),
            }],
            iea: Segment::from_values("IEA", ["1", "000000001"]),
        }
    }

    #[test]
    fn test_segment_count_includes_envelope() {
        assert_eq!(transaction().segment_count(), 5);
    }

    #[test]
    fn test_find_and_require() {
        let tx = transaction();
        assert_eq!(tx.find_all("N1").count(), 2);
        assert_eq!(tx.require("B2", 4).unwrap(), "SHIP123");
        assert!(matches!(
            tx.require("B2", 6),
            Err(Error::ElementNotFound { position: 6, .. })
        ));
        assert!(matches!(
            tx.require("L3", 1),
            Err(Error::SegmentNotFound { .. })
        ));
    }

    #[test]
    fn test_interchange_accessors() {
        let ic = interchange();
        assert_eq!(ic.control_number(), "000000001");
        assert_eq!(ic.transaction_count(), 1);
        assert_eq!(ic.primary_transaction_type(), Some("204"));
        assert_eq!(ic.primary_version(), "004010");
    }

    #[test]
    fn test_json_roundtrip_preserves_tree() {
        let ic = interchange();
        let json = ic.to_json().unwrap();
        assert_eq!(json["groups"][0]["transactions"][0]["transaction_type"], "204");
        let back: Interchange = serde_json::from_value(json).unwrap();
        assert_eq!(back, ic);
    }
}
