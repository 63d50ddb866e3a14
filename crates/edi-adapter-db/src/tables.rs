//! The persisted EDI schema.

use crate::schema::{ColumnDef, ColumnType, SchemaMapping, TableSchema};

pub const DOCUMENTS: &str = "edi_documents";
pub const TRANSACTIONS: &str = "edi_transactions";
pub const SHIPMENTS: &str = "edi_shipments";
pub const STOPS: &str = "edi_stops";
pub const ACKNOWLEDGMENTS: &str = "edi_acknowledgments";
pub const PARTNER_PROFILES: &str = "edi_partner_profiles";

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::String)
}

fn optional_text(name: &str) -> ColumnDef {
    text(name).nullable(true)
}

fn id() -> ColumnDef {
    text("id").primary_key()
}

/// All six tables, parents before children.
pub fn edi_schema() -> SchemaMapping {
    let mut mapping = SchemaMapping::new();
    for table in [
        documents(),
        transactions(),
        shipments(),
        stops(),
        acknowledgments(),
        partner_profiles(),
    ] {
        mapping.add_table(table);
    }
    mapping
}

fn documents() -> TableSchema {
    TableSchema::new(DOCUMENTS)
        .with_column(id())
        .with_column(text("partner_id"))
        .with_column(optional_text("transaction_set"))
        .with_column(optional_text("version"))
        .with_column(text("control_number"))
        .with_column(text("direction"))
        .with_column(text("status"))
        .with_column(ColumnDef::new("raw_content", ColumnType::Blob))
        .with_column(optional_text("parsed_content"))
        .with_column(text("error_messages"))
        .with_column(optional_text("processed_at"))
        .with_column(text("created_at"))
        .with_column(text("updated_at"))
        .with_column(ColumnDef::new("record_version", ColumnType::Integer))
        .with_unique_index(&["partner_id", "control_number"])
        .with_index(&["status"])
        .with_index(&["created_at"])
}

fn transactions() -> TableSchema {
    TableSchema::new(TRANSACTIONS)
        .with_column(id())
        .with_column(text("document_id").references(DOCUMENTS, "id"))
        .with_column(text("transaction_type"))
        .with_column(text("control_number"))
        .with_column(optional_text("reference_id"))
        .with_column(text("status"))
        .with_column(text("data"))
        .with_column(text("validation_errors"))
        .with_column(text("created_at"))
        .with_unique_index(&["document_id", "control_number"])
}

fn shipments() -> TableSchema {
    TableSchema::new(SHIPMENTS)
        .with_column(id())
        .with_column(text("transaction_id").unique().references(TRANSACTIONS, "id"))
        .with_column(text("shipment_id"))
        .with_column(optional_text("carrier_scac"))
        .with_column(optional_text("pickup_date"))
        .with_column(optional_text("delivery_date"))
        .with_column(ColumnDef::new("total_weight", ColumnType::Decimal).nullable(true))
        .with_column(ColumnDef::new("total_pieces", ColumnType::Integer).nullable(true))
        .with_column(optional_text("service_level"))
        .with_column(text("status"))
        .with_column(text("data"))
        .with_column(text("created_at"))
        .with_index(&["shipment_id"])
        .with_index(&["carrier_scac"])
        .with_index(&["pickup_date"])
}

fn stops() -> TableSchema {
    TableSchema::new(STOPS)
        .with_column(id())
        .with_column(text("shipment_id").references(SHIPMENTS, "id"))
        .with_column(ColumnDef::new("stop_number", ColumnType::Integer))
        .with_column(text("stop_type"))
        .with_column(optional_text("reason_code"))
        .with_column(optional_text("location_name"))
        .with_column(optional_text("location_code"))
        .with_column(optional_text("address_line1"))
        .with_column(optional_text("address_line2"))
        .with_column(optional_text("city"))
        .with_column(optional_text("state"))
        .with_column(optional_text("postal_code"))
        .with_column(optional_text("country"))
        .with_column(optional_text("earliest_date"))
        .with_column(optional_text("latest_date"))
        .with_column(ColumnDef::new("weight", ColumnType::Decimal).nullable(true))
        .with_column(ColumnDef::new("pieces", ColumnType::Integer).nullable(true))
        .with_column(text("created_at"))
        .with_unique_index(&["shipment_id", "stop_number"])
}

fn acknowledgments() -> TableSchema {
    TableSchema::new(ACKNOWLEDGMENTS)
        .with_column(id())
        .with_column(text("document_id").references(DOCUMENTS, "id"))
        .with_column(text("ack_type"))
        .with_column(text("control_number"))
        .with_column(text("status"))
        .with_column(text("ack_content"))
        .with_column(optional_text("sent_at"))
        .with_column(text("created_at"))
        .with_unique_index(&["document_id"])
}

fn partner_profiles() -> TableSchema {
    TableSchema::new(PARTNER_PROFILES)
        .with_column(id())
        .with_column(text("partner_id").unique())
        .with_column(text("partner_name"))
        .with_column(optional_text("description"))
        .with_column(ColumnDef::new("active", ColumnType::Boolean))
        .with_column(text("configuration"))
        .with_column(text("created_at"))
        .with_column(text("updated_at"))
        .with_column(ColumnDef::new("version", ColumnType::Integer))
        .with_index(&["partner_name"])
}
