//! Shipment model produced from load tenders

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tendered shipment, from B2A-01.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    Tendered,
    Cancelled,
    Changed,
    Replaced,
}

impl ShipmentStatus {
    /// Map a transaction set purpose code.
    pub fn from_purpose(code: &str) -> Self {
        match code {
            "01" => ShipmentStatus::Cancelled,
            "04" => ShipmentStatus::Changed,
            "05" => ShipmentStatus::Replaced,
            _ => ShipmentStatus::Tendered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Tendered => "tendered",
            ShipmentStatus::Cancelled => "cancelled",
            ShipmentStatus::Changed => "changed",
            ShipmentStatus::Replaced => "replaced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    Pickup,
    Delivery,
}

impl StopType {
    /// S5-02 stop reason code.
    pub fn from_reason(code: &str) -> Option<Self> {
        match code {
            "CL" | "LD" | "PL" => Some(StopType::Pickup),
            "CU" | "UL" | "PU" => Some(StopType::Delivery),
            _ => None,
        }
    }

    /// N1-01 entity identifier of a stop location.
    pub fn from_entity(code: &str) -> Option<Self> {
        match code {
            "SH" | "SF" => Some(StopType::Pickup),
            "CN" | "ST" => Some(StopType::Delivery),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StopType::Pickup => "pickup",
            StopType::Delivery => "delivery",
        }
    }
}

/// Postal address assembled from N3/N4.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// A reference number from L11 or REF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub qualifier: String,
    pub value: String,
}

/// A named party of the tender that is not a stop (bill-to, broker...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// N1-01
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// N1-04
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// 1-based, contiguous within a shipment
    pub stop_number: u32,
    pub stop_type: StopType,
    /// S5-02
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_code: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    pub earliest_date: Option<NaiveDateTime>,
    pub latest_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pieces: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

impl Stop {
    pub fn new(stop_number: u32, stop_type: StopType) -> Self {
        Self {
            stop_number,
            stop_type,
            reason_code: None,
            location_name: None,
            location_code: None,
            address: Address::default(),
            earliest_date: None,
            latest_date: None,
            weight: None,
            pieces: None,
            references: Vec::new(),
        }
    }

    pub fn is_pickup(&self) -> bool {
        self.stop_type == StopType::Pickup
    }
}

/// A load tender reduced to what carriers plan against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    pub carrier_scac: Option<String>,
    /// B2-06 shipment method of payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// B2A-01
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose_code: Option<String>,
    pub status: ShipmentStatus,
    pub pickup_date: Option<NaiveDateTime>,
    pub delivery_date: Option<NaiveDateTime>,
    pub total_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_qualifier: Option<String>,
    pub total_pieces: Option<u32>,
    pub service_level: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parties: Vec<Party>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    pub stops: Vec<Stop>,
}

impl Shipment {
    pub fn pickups(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| s.stop_type == StopType::Pickup)
    }

    pub fn deliveries(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| s.stop_type == StopType::Delivery)
    }

    /// First reference carrying the qualifier.
    pub fn reference(&self, qualifier: &str) -> Option<&str> {
        self.references
            .iter()
            .find(|r| r.qualifier == qualifier)
            .map(|r| r.value.as_str())
    }

    /// Canonical JSON kept alongside the shipment row.
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
