#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # edi-adapter-db
//!
//! Persistence for processed EDI documents and partner profiles.
//!
//! Documents are stored as a tree (document, transactions, shipments, stops,
//! acknowledgments) written in a single transaction. The uniqueness of
//! `(partner_id, control_number)` is enforced by the schema and surfaces as
//! [`Error::Conflict`]. Two backends share one API: libsql (local file, `:memory:`
//! or remote) and, with the `memory` feature, an in-process store that enforces the
//! same unique and cascade rules.

pub mod connection;
pub mod documents;
#[cfg(feature = "memory")]
mod memory;
pub mod profiles;
pub mod records;
pub mod schema;
pub mod sql;
pub mod tables;

pub use connection::{ConnectionConfig, DbConnection, DbTransaction};
pub use documents::{DocumentRepository, MAX_PAGE_SIZE, Page, UnitOfWork};
pub use profiles::ProfileRepository;
pub use records::{
    AcknowledgmentRecord, Direction, DocumentDetail, DocumentRecord, DocumentTree,
    ProcessingStatus, Record, ShipmentRecord, ShipmentTree, StopRecord, TransactionRecord,
    TransactionTree,
};
pub use schema::{ColumnDef, ColumnType, DbValue, ForeignKey, Row, SchemaMapping, TableSchema};
pub use sql::{Query, SortOrder};
pub use tables::edi_schema;

use std::fmt;

use thiserror::Error;

/// Errors that can occur when working with the database.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Connection error: {details}")]
    Connection { details: String },

    #[error("Libsql error during {context}: {source}")]
    Libsql {
        context: String,
        #[source]
        source: libsql::Error,
    },

    #[error("SQL error executing `{statement}`: {source}")]
    Sql {
        statement: String,
        #[source]
        source: libsql::Error,
    },

    #[error("Query error on `{table}`: {details}")]
    Query { table: String, details: String },

    #[error("Schema error: {details}")]
    Schema { details: String },

    #[error("Transaction error: {details}")]
    Transaction { details: String },

    #[error("Conflict: {details}")]
    Conflict { details: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid record: {details}")]
    Invalid { details: String },

    #[error("Cannot decode `{table}` row: {details}")]
    Decode { table: String, details: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(details: impl Into<String>) -> Self {
        Self::Invalid {
            details: details.into(),
        }
    }

    /// Failures of the database itself rather than of the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::Connection { .. } | Error::Transaction { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
