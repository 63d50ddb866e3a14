//! Load tender (204) decomposition
//!
//! Stops come from `S5` loops and from every `N1` loop outside them that names a
//! shipper (`SH`/`SF`) or consignee (`CN`/`ST`), numbered in document order. Other
//! `N1` loops are kept as parties.

use edi_ir::issue::codes;
use edi_ir::{Issue, Segment, SegmentCursor, TransactionSet};
use edi_profile::DateFormat;
use tracing::debug;

use crate::dates::{self, Window};
use crate::model::{Address, Party, Reference, Shipment, ShipmentStatus, Stop, StopType};

pub const LOAD_TENDER: &str = "204";

/// Tags that end a stop or party loop.
const STOP_BOUNDARY: &[&str] = &["S5", "L3"];
const PARTY_BOUNDARY: &[&str] = &["N1", "N7", "S5", "L3"];

/// Decompose one transaction set.
///
/// Returns `None` without issues for anything but a load tender. A load tender without
/// a shipment id, a pickup or a delivery yields `None` plus the `error` issues saying why.
pub fn decompose(
    transaction: &TransactionSet,
    date_format: DateFormat,
) -> (Option<Shipment>, Vec<Issue>) {
    if transaction.transaction_type != LOAD_TENDER {
        return (None, Vec::new());
    }
    let mut decomposer = Decomposer::new(transaction, date_format);
    decomposer.run();
    decomposer.finish()
}

struct Decomposer<'a> {
    transaction: &'a TransactionSet,
    date_format: DateFormat,
    shipment_id: Option<String>,
    b2_ordinal: Option<usize>,
    carrier_scac: Option<String>,
    payment_method: Option<String>,
    purpose_code: Option<String>,
    total_weight: Option<f64>,
    weight_qualifier: Option<String>,
    total_pieces: Option<u32>,
    service_level: Option<String>,
    references: Vec<Reference>,
    parties: Vec<Party>,
    notes: Vec<String>,
    stops: Vec<Stop>,
    issues: Vec<Issue>,
}

impl<'a> Decomposer<'a> {
    fn new(transaction: &'a TransactionSet, date_format: DateFormat) -> Self {
        Self {
            transaction,
            date_format,
            shipment_id: None,
            b2_ordinal: None,
            carrier_scac: None,
            payment_method: None,
            purpose_code: None,
            total_weight: None,
            weight_qualifier: None,
            total_pieces: None,
            service_level: None,
            references: Vec::new(),
            parties: Vec::new(),
            notes: Vec::new(),
            stops: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn run(&mut self) {
        let transaction = self.transaction;
        let mut cursor = SegmentCursor::new(&transaction.segments);

        let mut header = SegmentCursor::new(cursor.take_until(&["S5"]));
        self.section(&mut header, 0);

        while cursor.peek_tag() == Some("S5") {
            let start = cursor.offset();
            let Some(body) = cursor.take_loop(STOP_BOUNDARY) else {
                break;
            };
            self.stop_loop(body, start);
        }

        let offset = cursor.offset();
        let mut trailer = SegmentCursor::new(cursor.take_until(&[]));
        self.section(&mut trailer, offset);
    }

    /// Segments outside `S5` loops, with embedded N1 loops. A stop-like N1 loop here
    /// is a stop without an `S5`.
    fn section(&mut self, cursor: &mut SegmentCursor<'a>, offset: usize) {
        while !cursor.is_empty() {
            let start = cursor.offset();
            for (index, segment) in cursor.take_until(&["N1"]).iter().enumerate() {
                self.shipment_segment(segment, offset + start + index);
            }

            let start = offset + cursor.offset();
            let Some(body) = cursor.take_loop(PARTY_BOUNDARY) else {
                break;
            };
            match body[0].trimmed(1).and_then(StopType::from_entity) {
                Some(stop_type) => self.push_stop(body, start, stop_type, None),
                None => self.party(body),
            }
        }
    }

    fn shipment_segment(&mut self, segment: &Segment, index: usize) {
        match segment.tag.as_str() {
            "B2" => {
                self.b2_ordinal = Some(TransactionSet::ordinal(index));
                self.carrier_scac = owned(segment.trimmed(2));
                self.shipment_id = owned(segment.trimmed(4));
                self.payment_method = owned(segment.trimmed(6));
            }
            "B2A" => self.purpose_code = owned(segment.trimmed(1)),
            "L11" | "REF" => self.references.extend(reference(segment)),
            "AT5" => {
                if self.service_level.is_none() {
                    self.service_level = owned(segment.trimmed(1));
                }
            }
            "NTE" => self.notes.extend(owned(segment.trimmed(2))),
            "L3" => {
                self.total_weight = self.number(segment, index, 1, "L301");
                self.weight_qualifier = owned(segment.trimmed(2));
                self.total_pieces = self.count(segment, index, 11, "L311");
            }
            _ => {}
        }
    }

    fn stop_loop(&mut self, body: &[Segment], start: usize) {
        let s5 = &body[0];
        let reason = s5.trimmed(2);
        let stop_type = reason.and_then(StopType::from_reason).or_else(|| {
            body.iter()
                .find(|s| s.is("N1"))
                .and_then(|n1| n1.trimmed(1))
                .and_then(StopType::from_entity)
        });

        let Some(stop_type) = stop_type else {
            self.issues.push(
                Issue::warn(
                    codes::DECOMPOSITION_SKIPPED,
                    format!(
                        "stop with reason '{}' is neither a pickup nor a delivery",
                        reason.unwrap_or_default()
                    ),
                )
                .with_segment_ref("S5", TransactionSet::ordinal(start))
                .with_field("S502"),
            );
            return;
        };
        self.push_stop(body, start, stop_type, reason);
    }

    fn push_stop(&mut self, body: &[Segment], start: usize, stop_type: StopType, reason: Option<&str>) {
        let stop_number = u32::try_from(self.stops.len() + 1).unwrap_or(u32::MAX);
        let mut stop = Stop::new(stop_number, stop_type);
        stop.reason_code = owned(reason);

        for (index, segment) in body.iter().enumerate() {
            let index = start + index;
            match segment.tag.as_str() {
                "S5" => {
                    stop.weight = self.number(segment, index, 3, "S503");
                    stop.pieces = self.count(segment, index, 5, "S505");
                }
                "N1" if stop.location_name.is_none() && stop.location_code.is_none() => {
                    stop.location_name = owned(segment.trimmed(2));
                    stop.location_code = owned(segment.trimmed(4));
                }
                "N3" | "N4" => address(&mut stop.address, segment),
                "G62" => self.window(&mut stop, segment, index),
                "L11" | "REF" => stop.references.extend(reference(segment)),
                _ => {}
            }
        }
        self.stops.push(stop);
    }

    fn party(&mut self, body: &[Segment]) {
        let n1 = &body[0];
        let mut party = Party {
            entity: n1.trimmed(1).unwrap_or_default().to_string(),
            name: owned(n1.trimmed(2)),
            code: owned(n1.trimmed(4)),
            address: Address::default(),
        };
        for segment in &body[1..] {
            if segment.is("N3") || segment.is("N4") {
                address(&mut party.address, segment);
            }
        }
        self.parties.push(party);
    }

    fn window(&mut self, stop: &mut Stop, g62: &Segment, index: usize) {
        let Some(window) = g62.trimmed(1).and_then(Window::from_qualifier) else {
            return;
        };
        let Some(date) = g62.trimmed(2) else {
            return;
        };
        let time = g62.trimmed(4);
        match dates::parse_datetime(date, time, self.date_format) {
            Some(at) => match window {
                Window::Earliest => stop.earliest_date = Some(at),
                Window::Latest => stop.latest_date = Some(at),
            },
            None => self.issues.push(
                Issue::warn(
                    codes::INVALID_DATE,
                    format!(
                        "G62 '{date}{}' is not a {} date, left empty",
                        time.map(|t| format!(" {t}")).unwrap_or_default(),
                        self.date_format.label()
                    ),
                )
                .with_segment_ref("G62", TransactionSet::ordinal(index))
                .with_field("G6202"),
            ),
        }
    }

    fn number(&mut self, segment: &Segment, index: usize, position: usize, field: &str) -> Option<f64> {
        let raw = segment.trimmed(position)?;
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                self.invalid_number(segment, index, field, raw);
                None
            }
        }
    }

    fn count(&mut self, segment: &Segment, index: usize, position: usize, field: &str) -> Option<u32> {
        let raw = segment.trimmed(position)?;
        match raw.parse::<u32>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.invalid_number(segment, index, field, raw);
                None
            }
        }
    }

    fn invalid_number(&mut self, segment: &Segment, index: usize, field: &str, raw: &str) {
        self.issues.push(
            Issue::warn(codes::INVALID_NUMBER, format!("{field} '{raw}' is not a number"))
                .with_segment_ref(&segment.tag, TransactionSet::ordinal(index))
                .with_field(field),
        );
    }

    fn finish(self) -> (Option<Shipment>, Vec<Issue>) {
        let control_number = self.transaction.control_number.clone();
        let mut issues = self.issues;
        let mut complete = true;

        if self.shipment_id.is_none() {
            let mut issue = Issue::error(codes::MISSING_SHIPMENT_ID, "B2-04 shipment id is required")
                .with_field("B204");
            if let Some(ordinal) = self.b2_ordinal {
                issue = issue.with_segment_ref("B2", ordinal);
            }
            issues.push(issue);
            complete = false;
        }
        if !self.stops.iter().any(Stop::is_pickup) {
            issues.push(Issue::error(codes::MISSING_PICKUP, "load tender has no pickup stop"));
            complete = false;
        }
        if !self.stops.iter().any(|s| !s.is_pickup()) {
            issues.push(Issue::error(codes::MISSING_DELIVERY, "load tender has no delivery stop"));
            complete = false;
        }

        let issues: Vec<Issue> = issues
            .into_iter()
            .map(|i| i.in_transaction(&control_number))
            .collect();

        let Some(shipment_id) = self.shipment_id.filter(|_| complete) else {
            debug!(control_number = %control_number, issues = issues.len(), "Load tender not decomposed");
            return (None, issues);
        };

        let pickup_date = self
            .stops
            .iter()
            .find(|s| s.is_pickup())
            .and_then(|s| s.earliest_date.or(s.latest_date));
        let delivery_date = self
            .stops
            .iter()
            .rev()
            .find(|s| !s.is_pickup())
            .and_then(|s| s.latest_date.or(s.earliest_date));
        let total_weight = self.total_weight.or_else(|| {
            let weights: Vec<f64> = self.stops.iter().filter(|s| s.is_pickup()).filter_map(|s| s.weight).collect();
            (!weights.is_empty()).then(|| weights.iter().sum())
        });

        let shipment = Shipment {
            shipment_id,
            carrier_scac: self.carrier_scac,
            status: self
                .purpose_code
                .as_deref()
                .map_or(ShipmentStatus::Tendered, ShipmentStatus::from_purpose),
            payment_method: self.payment_method,
            purpose_code: self.purpose_code,
            pickup_date,
            delivery_date,
            total_weight,
            weight_qualifier: self.weight_qualifier,
            total_pieces: self.total_pieces,
            service_level: self.service_level,
            references: self.references,
            parties: self.parties,
            notes: self.notes,
            stops: self.stops,
        };
        debug!(
            control_number = %control_number,
            shipment_id = %shipment.shipment_id,
            stops = shipment.stops.len(),
            "Decomposed load tender"
        );
        (Some(shipment), issues)
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// L11 carries value then qualifier; REF carries qualifier then value.
fn reference(segment: &Segment) -> Option<Reference> {
    let (qualifier, value) = if segment.is("L11") {
        (segment.trimmed(2), segment.trimmed(1))
    } else {
        (segment.trimmed(1), segment.trimmed(2))
    };
    Some(Reference {
        qualifier: qualifier.unwrap_or_default().to_string(),
        value: value?.to_string(),
    })
}

fn address(address: &mut Address, segment: &Segment) {
    if segment.is("N3") {
        address.address_line1 = owned(segment.trimmed(1));
        address.address_line2 = owned(segment.trimmed(2));
    } else {
        address.city = owned(segment.trimmed(1));
        address.state = owned(segment.trimmed(2));
        address.postal_code = owned(segment.trimmed(3));
        address.country = owned(segment.trimmed(4));
    }
}
