//! Typed rows of the EDI tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use edi_ir::Issue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{DbValue, NULL, Row};
use crate::tables;
use crate::{Error, Result};

/// Conversion between a typed record and its table row.
pub trait Record: Sized {
    const TABLE: &'static str;

    fn to_row(&self) -> Result<Row>;

    fn from_row(row: &Row) -> Result<Self>;
}

/// Processing outcome of a document or one of its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processed,
    ProcessedWithErrors,
    Rejected,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::ProcessedWithErrors => "processed_with_errors",
            ProcessingStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processed" => Ok(ProcessingStatus::Processed),
            "processed_with_errors" => Ok(ProcessingStatus::ProcessedWithErrors),
            "rejected" => Ok(ProcessingStatus::Rejected),
            other => Err(Error::invalid(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(Error::invalid(format!("unknown direction '{other}'"))),
        }
    }
}

/// One received interchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub partner_id: String,
    pub transaction_set: Option<String>,
    pub version: Option<String>,
    /// ISA13
    pub control_number: String,
    pub direction: Direction,
    pub status: ProcessingStatus,
    /// Exact bytes received
    #[serde(with = "raw_text")]
    pub raw_content: Vec<u8>,
    pub parsed_content: Option<Value>,
    pub error_messages: Vec<Issue>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub record_version: i64,
}

impl DocumentRecord {
    /// A pending inbound document stamped now.
    pub fn new(partner_id: impl Into<String>, control_number: impl Into<String>, raw_content: Vec<u8>) -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4(),
            partner_id: partner_id.into(),
            transaction_set: None,
            version: None,
            control_number: control_number.into(),
            direction: Direction::Inbound,
            status: ProcessingStatus::Pending,
            raw_content,
            parsed_content: None,
            error_messages: Vec::new(),
            processed_at: None,
            created_at: now,
            updated_at: now,
            record_version: 1,
        }
    }
}

impl Record for DocumentRecord {
    const TABLE: &'static str = tables::DOCUMENTS;

    fn to_row(&self) -> Result<Row> {
        Ok(Row::from([
            ("id".to_string(), uuid_value(self.id)),
            ("partner_id".to_string(), self.partner_id.as_str().into()),
            ("transaction_set".to_string(), self.transaction_set.clone().into()),
            ("version".to_string(), self.version.clone().into()),
            ("control_number".to_string(), self.control_number.as_str().into()),
            ("direction".to_string(), self.direction.as_str().into()),
            ("status".to_string(), self.status.as_str().into()),
            ("raw_content".to_string(), DbValue::Blob(self.raw_content.clone())),
            ("parsed_content".to_string(), opt_json_value(self.parsed_content.as_ref())?),
            ("error_messages".to_string(), json_value(&self.error_messages)?),
            ("processed_at".to_string(), self.processed_at.map(timestamp_value).into()),
            ("created_at".to_string(), timestamp_value(self.created_at).into()),
            ("updated_at".to_string(), timestamp_value(self.updated_at).into()),
            ("record_version".to_string(), self.record_version.into()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let reader = RowReader::new(Self::TABLE, row);
        Ok(Self {
            id: reader.uuid("id")?,
            partner_id: reader.text("partner_id")?,
            transaction_set: reader.opt_text("transaction_set")?,
            version: reader.opt_text("version")?,
            control_number: reader.text("control_number")?,
            direction: reader.text("direction")?.parse()?,
            status: reader.text("status")?.parse()?,
            raw_content: reader.blob("raw_content")?,
            parsed_content: reader.opt_json("parsed_content")?,
            error_messages: reader.json("error_messages")?,
            processed_at: reader.opt_timestamp("processed_at")?,
            created_at: reader.timestamp("created_at")?,
            updated_at: reader.timestamp("updated_at")?,
            record_version: reader.integer("record_version")?,
        })
    }
}

/// One ST/SE transaction set of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub transaction_type: String,
    /// ST02
    pub control_number: String,
    pub reference_id: Option<String>,
    pub status: ProcessingStatus,
    pub data: Value,
    pub validation_errors: Vec<Issue>,
    pub created_at: DateTime<Utc>,
}

impl Record for TransactionRecord {
    const TABLE: &'static str = tables::TRANSACTIONS;

    fn to_row(&self) -> Result<Row> {
        Ok(Row::from([
            ("id".to_string(), uuid_value(self.id)),
            ("document_id".to_string(), uuid_value(self.document_id)),
            ("transaction_type".to_string(), self.transaction_type.as_str().into()),
            ("control_number".to_string(), self.control_number.as_str().into()),
            ("reference_id".to_string(), self.reference_id.clone().into()),
            ("status".to_string(), self.status.as_str().into()),
            ("data".to_string(), json_value(&self.data)?),
            ("validation_errors".to_string(), json_value(&self.validation_errors)?),
            ("created_at".to_string(), timestamp_value(self.created_at).into()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let reader = RowReader::new(Self::TABLE, row);
        Ok(Self {
            id: reader.uuid("id")?,
            document_id: reader.uuid("document_id")?,
            transaction_type: reader.text("transaction_type")?,
            control_number: reader.text("control_number")?,
            reference_id: reader.opt_text("reference_id")?,
            status: reader.text("status")?.parse()?,
            data: reader.json("data")?,
            validation_errors: reader.json("validation_errors")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub shipment_id: String,
    pub carrier_scac: Option<String>,
    pub pickup_date: Option<NaiveDateTime>,
    pub delivery_date: Option<NaiveDateTime>,
    pub total_weight: Option<f64>,
    pub total_pieces: Option<i64>,
    pub service_level: Option<String>,
    pub status: String,
    /// Full shipment JSON, including references and parties
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Record for ShipmentRecord {
    const TABLE: &'static str = tables::SHIPMENTS;

    fn to_row(&self) -> Result<Row> {
        Ok(Row::from([
            ("id".to_string(), uuid_value(self.id)),
            ("transaction_id".to_string(), uuid_value(self.transaction_id)),
            ("shipment_id".to_string(), self.shipment_id.as_str().into()),
            ("carrier_scac".to_string(), self.carrier_scac.clone().into()),
            ("pickup_date".to_string(), self.pickup_date.map(local_value).into()),
            ("delivery_date".to_string(), self.delivery_date.map(local_value).into()),
            ("total_weight".to_string(), self.total_weight.map_or(DbValue::Null, DbValue::Decimal)),
            ("total_pieces".to_string(), self.total_pieces.into()),
            ("service_level".to_string(), self.service_level.clone().into()),
            ("status".to_string(), self.status.as_str().into()),
            ("data".to_string(), json_value(&self.data)?),
            ("created_at".to_string(), timestamp_value(self.created_at).into()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let reader = RowReader::new(Self::TABLE, row);
        Ok(Self {
            id: reader.uuid("id")?,
            transaction_id: reader.uuid("transaction_id")?,
            shipment_id: reader.text("shipment_id")?,
            carrier_scac: reader.opt_text("carrier_scac")?,
            pickup_date: reader.opt_local("pickup_date")?,
            delivery_date: reader.opt_local("delivery_date")?,
            total_weight: reader.opt_decimal("total_weight")?,
            total_pieces: reader.opt_integer("total_pieces")?,
            service_level: reader.opt_text("service_level")?,
            status: reader.text("status")?,
            data: reader.json("data")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub stop_number: i64,
    pub stop_type: String,
    pub reason_code: Option<String>,
    pub location_name: Option<String>,
    pub location_code: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub earliest_date: Option<NaiveDateTime>,
    pub latest_date: Option<NaiveDateTime>,
    pub weight: Option<f64>,
    pub pieces: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Record for StopRecord {
    const TABLE: &'static str = tables::STOPS;

    fn to_row(&self) -> Result<Row> {
        Ok(Row::from([
            ("id".to_string(), uuid_value(self.id)),
            ("shipment_id".to_string(), uuid_value(self.shipment_id)),
            ("stop_number".to_string(), self.stop_number.into()),
            ("stop_type".to_string(), self.stop_type.as_str().into()),
            ("reason_code".to_string(), self.reason_code.clone().into()),
            ("location_name".to_string(), self.location_name.clone().into()),
            ("location_code".to_string(), self.location_code.clone().into()),
            ("address_line1".to_string(), self.address_line1.clone().into()),
            ("address_line2".to_string(), self.address_line2.clone().into()),
            ("city".to_string(), self.city.clone().into()),
            ("state".to_string(), self.state.clone().into()),
            ("postal_code".to_string(), self.postal_code.clone().into()),
            ("country".to_string(), self.country.clone().into()),
            ("earliest_date".to_string(), self.earliest_date.map(local_value).into()),
            ("latest_date".to_string(), self.latest_date.map(local_value).into()),
            ("weight".to_string(), self.weight.map_or(DbValue::Null, DbValue::Decimal)),
            ("pieces".to_string(), self.pieces.into()),
            ("created_at".to_string(), timestamp_value(self.created_at).into()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let reader = RowReader::new(Self::TABLE, row);
        Ok(Self {
            id: reader.uuid("id")?,
            shipment_id: reader.uuid("shipment_id")?,
            stop_number: reader.integer("stop_number")?,
            stop_type: reader.text("stop_type")?,
            reason_code: reader.opt_text("reason_code")?,
            location_name: reader.opt_text("location_name")?,
            location_code: reader.opt_text("location_code")?,
            address_line1: reader.opt_text("address_line1")?,
            address_line2: reader.opt_text("address_line2")?,
            city: reader.opt_text("city")?,
            state: reader.opt_text("state")?,
            postal_code: reader.opt_text("postal_code")?,
            country: reader.opt_text("country")?,
            earliest_date: reader.opt_local("earliest_date")?,
            latest_date: reader.opt_local("latest_date")?,
            weight: reader.opt_decimal("weight")?,
            pieces: reader.opt_integer("pieces")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcknowledgmentRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    /// `997` or `999`
    pub ack_type: String,
    /// ISA13 of the acknowledgment interchange
    pub control_number: String,
    pub status: String,
    pub ack_content: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Record for AcknowledgmentRecord {
    const TABLE: &'static str = tables::ACKNOWLEDGMENTS;

    fn to_row(&self) -> Result<Row> {
        Ok(Row::from([
            ("id".to_string(), uuid_value(self.id)),
            ("document_id".to_string(), uuid_value(self.document_id)),
            ("ack_type".to_string(), self.ack_type.as_str().into()),
            ("control_number".to_string(), self.control_number.as_str().into()),
            ("status".to_string(), self.status.as_str().into()),
            ("ack_content".to_string(), self.ack_content.as_str().into()),
            ("sent_at".to_string(), self.sent_at.map(timestamp_value).into()),
            ("created_at".to_string(), timestamp_value(self.created_at).into()),
        ]))
    }

    fn from_row(row: &Row) -> Result<Self> {
        let reader = RowReader::new(Self::TABLE, row);
        Ok(Self {
            id: reader.uuid("id")?,
            document_id: reader.uuid("document_id")?,
            ack_type: reader.text("ack_type")?,
            control_number: reader.text("control_number")?,
            status: reader.text("status")?,
            ack_content: reader.text("ack_content")?,
            sent_at: reader.opt_timestamp("sent_at")?,
            created_at: reader.timestamp("created_at")?,
        })
    }
}

/// A shipment with its ordered stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentTree {
    #[serde(flatten)]
    pub shipment: ShipmentRecord,
    pub stops: Vec<StopRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionTree {
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    pub shipment: Option<ShipmentTree>,
}

/// Everything written for one interchange, inserted atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    #[serde(flatten)]
    pub document: DocumentRecord,
    pub transactions: Vec<TransactionTree>,
}

/// A document as returned to callers: its tree plus generated acknowledgments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub tree: DocumentTree,
    pub acknowledgments: Vec<AcknowledgmentRecord>,
}

/// The current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Sortable UTC text: fixed width, microsecond precision.
pub(crate) fn timestamp_value(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn local_value(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub(crate) fn uuid_value(id: Uuid) -> DbValue {
    DbValue::String(id.to_string())
}

pub(crate) fn json_value<T: Serialize>(value: &T) -> Result<DbValue> {
    Ok(DbValue::String(serde_json::to_string(value)?))
}

fn opt_json_value<T: Serialize>(value: Option<&T>) -> Result<DbValue> {
    value.map_or(Ok(DbValue::Null), json_value)
}

/// Typed column access with decode errors naming the table and column.
pub(crate) struct RowReader<'r> {
    table: &'static str,
    row: &'r Row,
}

impl<'r> RowReader<'r> {
    pub fn new(table: &'static str, row: &'r Row) -> Self {
        Self { table, row }
    }

    fn decode_error(&self, column: &str, details: impl fmt::Display) -> Error {
        Error::Decode {
            table: self.table.to_string(),
            details: format!("column '{column}': {details}"),
        }
    }

    fn value(&self, column: &str) -> &'r DbValue {
        self.row.get(column).unwrap_or(&NULL)
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column) {
            DbValue::Null => Ok(None),
            DbValue::String(value) => Ok(Some(value.clone())),
            DbValue::Blob(bytes) => String::from_utf8(bytes.clone())
                .map(Some)
                .map_err(|err| self.decode_error(column, err)),
            other => Err(self.decode_error(column, format!("expected text, found {other:?}"))),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.decode_error(column, "unexpected NULL"))
    }

    pub fn blob(&self, column: &str) -> Result<Vec<u8>> {
        match self.value(column) {
            DbValue::Blob(bytes) => Ok(bytes.clone()),
            DbValue::String(text) => Ok(text.clone().into_bytes()),
            other => Err(self.decode_error(column, format!("expected blob, found {other:?}"))),
        }
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column) {
            DbValue::Null => Ok(None),
            DbValue::Integer(value) => Ok(Some(*value)),
            other => Err(self.decode_error(column, format!("expected integer, found {other:?}"))),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64> {
        self.opt_integer(column)?
            .ok_or_else(|| self.decode_error(column, "unexpected NULL"))
    }

    pub fn opt_decimal(&self, column: &str) -> Result<Option<f64>> {
        match self.value(column) {
            DbValue::Null => Ok(None),
            DbValue::Decimal(value) => Ok(Some(*value)),
            DbValue::Integer(value) => Ok(Some(*value as f64)),
            other => Err(self.decode_error(column, format!("expected decimal, found {other:?}"))),
        }
    }

    pub fn boolean(&self, column: &str) -> Result<bool> {
        match self.value(column) {
            DbValue::Boolean(value) => Ok(*value),
            DbValue::Integer(value) => Ok(*value != 0),
            other => Err(self.decode_error(column, format!("expected boolean, found {other:?}"))),
        }
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid> {
        let text = self.text(column)?;
        Uuid::parse_str(&text).map_err(|err| self.decode_error(column, err))
    }

    pub fn opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>> {
        self.opt_text(column)?
            .map(|text| {
                DateTime::parse_from_rfc3339(&text)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|err| self.decode_error(column, err))
            })
            .transpose()
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        self.opt_timestamp(column)?
            .ok_or_else(|| self.decode_error(column, "unexpected NULL"))
    }

    pub fn opt_local(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        self.opt_text(column)?
            .map(|text| {
                NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S")
                    .map_err(|err| self.decode_error(column, err))
            })
            .transpose()
    }

    pub fn opt_json<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>> {
        self.opt_text(column)?
            .map(|text| serde_json::from_str(&text).map_err(|err| self.decode_error(column, err)))
            .transpose()
    }

    pub fn json<T: DeserializeOwned>(&self, column: &str) -> Result<T> {
        self.opt_json(column)?
            .ok_or_else(|| self.decode_error(column, "unexpected NULL"))
    }
}

/// Raw X12 bytes travel as text in JSON.
mod raw_text {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_row_round_trip() {
        let mut document = DocumentRecord::new("ACME", "000000905", b"ISA*00~".to_vec());
        document.transaction_set = Some("204".to_string());
        document.status = ProcessingStatus::ProcessedWithErrors;
        document.error_messages = vec![Issue::error("SE_COUNT_MISMATCH", "count").with_segment_ref("SE", 9)];
        document.parsed_content = Some(serde_json::json!({ "groups": [] }));

        let row = document.to_row().unwrap();
        assert_eq!(row["status"], DbValue::from("processed_with_errors"));
        assert_eq!(row["raw_content"], DbValue::Blob(b"ISA*00~".to_vec()));
        assert!(row["version"].is_null());

        let decoded = DocumentRecord::from_row(&row).unwrap();
        assert_eq!(decoded, document);
    }

    #[test]
    fn test_decode_errors_name_the_column() {
        let row = Row::from([("id".to_string(), DbValue::from("not-a-uuid"))]);
        let err = AcknowledgmentRecord::from_row(&row).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("edi_acknowledgments"), "{message}");
        assert!(message.contains("'id'"), "{message}");
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let earlier = DateTime::parse_from_rfc3339("2024-03-01T09:15:00Z").unwrap().with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-03-01T10:00:00.5Z").unwrap().with_timezone(&Utc);
        assert!(timestamp_value(earlier) < timestamp_value(later));
        assert_eq!(timestamp_value(earlier), "2024-03-01T09:15:00.000000Z");
    }

    #[test]
    fn test_document_json_shows_raw_text() {
        let document = DocumentRecord::new("ACME", "1", b"ISA*00~".to_vec());
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["raw_content"], "ISA*00~");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["direction"], "inbound");
    }
}
