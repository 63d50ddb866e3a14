//! Table schema primitives shared by both backends.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::sql::quote_identifier;
use crate::{Error, Result};

/// Column value as stored by either backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DbValue {
    String(String),
    Blob(Vec<u8>),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Null,
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Total order used for sorting in the memory backend; NULL sorts first.
    pub fn compare(&self, other: &DbValue) -> Ordering {
        match (self, other) {
            (DbValue::Null, DbValue::Null) => Ordering::Equal,
            (DbValue::Null, _) => Ordering::Less,
            (_, DbValue::Null) => Ordering::Greater,
            (DbValue::String(a), DbValue::String(b)) => a.cmp(b),
            (DbValue::Blob(a), DbValue::Blob(b)) => a.cmp(b),
            (DbValue::Integer(a), DbValue::Integer(b)) => a.cmp(b),
            (DbValue::Boolean(a), DbValue::Boolean(b)) => a.cmp(b),
            (DbValue::Decimal(a), DbValue::Decimal(b)) => a.total_cmp(b),
            (DbValue::Integer(a), DbValue::Decimal(b)) => (*a as f64).total_cmp(b),
            (DbValue::Decimal(a), DbValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DbValue::Null => 0,
            DbValue::Boolean(_) | DbValue::Integer(_) | DbValue::Decimal(_) => 1,
            DbValue::String(_) => 2,
            DbValue::Blob(_) => 3,
        }
    }
}

impl From<&str> for DbValue {
    fn from(value: &str) -> Self {
        DbValue::String(value.to_string())
    }
}

impl From<String> for DbValue {
    fn from(value: String) -> Self {
        DbValue::String(value)
    }
}

impl From<i64> for DbValue {
    fn from(value: i64) -> Self {
        DbValue::Integer(value)
    }
}

impl From<bool> for DbValue {
    fn from(value: bool) -> Self {
        DbValue::Boolean(value)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DbValue::Null, Into::into)
    }
}

/// Shared NULL for lookups of absent columns.
pub(crate) static NULL: DbValue = DbValue::Null;

/// Canonical row representation.
pub type Row = BTreeMap<String, DbValue>;

/// Supported column types for schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Blob,
    Integer,
    Decimal,
    Boolean,
}

/// Foreign key description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub on_delete_cascade: bool,
}

/// Column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: false,
            unique: false,
            foreign_key: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Reference a parent row; children are removed with the parent.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            on_delete_cascade: true,
        });
        self
    }
}

/// Secondary index, optionally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Table schema used for DDL and memory-backend validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, columns: &[&str]) -> Self {
        self.push_index(columns, false);
        self
    }

    pub fn with_unique_index(mut self, columns: &[&str]) -> Self {
        self.push_index(columns, true);
        self
    }

    fn push_index(&mut self, columns: &[&str], unique: bool) {
        let prefix = if unique { "ux" } else { "ix" };
        self.indexes.push(IndexDef {
            name: format!("{prefix}_{}_{}", self.name, columns.join("_")),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        });
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.primary_key)
    }

    /// Column sets whose values must be unique across the table.
    pub fn unique_keys(&self) -> Vec<Vec<&str>> {
        let single = self
            .columns
            .iter()
            .filter(|c| c.primary_key || c.unique)
            .map(|c| vec![c.name.as_str()]);
        let composite = self
            .indexes
            .iter()
            .filter(|i| i.unique)
            .map(|i| i.columns.iter().map(String::as_str).collect());
        single.chain(composite).collect()
    }

    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(column_definition_sql).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_identifier(&self.name),
            columns.join(", ")
        )
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                let columns: Vec<String> = index.columns.iter().map(|c| quote_identifier(c)).collect();
                format!(
                    "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                    if index.unique { "UNIQUE " } else { "" },
                    quote_identifier(&index.name),
                    quote_identifier(&self.name),
                    columns.join(", ")
                )
            })
            .collect()
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        for (column_name, value) in row {
            let column = self.column(column_name).ok_or_else(|| Error::Schema {
                details: format!("Unknown column '{column_name}' for table '{}'", self.name),
            })?;

            if value.is_null() {
                if !column.nullable {
                    return Err(Error::Schema {
                        details: format!(
                            "Column '{column_name}' in table '{}' cannot be null",
                            self.name
                        ),
                    });
                }
                continue;
            }

            if !value_matches_type(value, column.column_type) {
                return Err(Error::Schema {
                    details: format!(
                        "Type mismatch for '{}.{}': expected {:?}, found {:?}",
                        self.name, column_name, column.column_type, value
                    ),
                });
            }
        }

        for column in &self.columns {
            if !column.nullable && !row.contains_key(&column.name) {
                return Err(Error::Schema {
                    details: format!("Missing required column '{}.{}'", self.name, column.name),
                });
            }
        }

        Ok(())
    }
}

/// Collection of table schemas, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMapping {
    tables: Vec<TableSchema>,
    positions: HashMap<String, usize>,
}

impl SchemaMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, schema: TableSchema) {
        match self.positions.get(&schema.name) {
            Some(&position) => self.tables[position] = schema,
            None => {
                self.positions.insert(schema.name.clone(), self.tables.len());
                self.tables.push(schema);
            }
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.positions.get(name).map(|&position| &self.tables[position])
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Tables in creation order, parents before children.
    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// `(child table, child column, parent column)` for every cascading reference to `parent`.
    pub fn dependents(&self, parent: &str) -> Vec<(&str, &str, &str)> {
        self.tables
            .iter()
            .flat_map(|table| {
                table.columns.iter().filter_map(move |column| {
                    column
                        .foreign_key
                        .as_ref()
                        .filter(|fk| fk.table == parent && fk.on_delete_cascade)
                        .map(|fk| (table.name.as_str(), column.name.as_str(), fk.column.as_str()))
                })
            })
            .collect()
    }

    pub fn validate_row(&self, table_name: &str, row: &Row) -> Result<()> {
        let schema = self.table(table_name).ok_or_else(|| Error::Schema {
            details: format!("Unknown table '{table_name}'"),
        })?;
        schema.validate_row(row)
    }
}

fn column_definition_sql(column: &ColumnDef) -> String {
    let mut parts = vec![
        quote_identifier(&column.name),
        column_type_sql(column.column_type).to_string(),
    ];

    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }

    if column.primary_key {
        parts.push("PRIMARY KEY".to_string());
    } else if column.unique {
        parts.push("UNIQUE".to_string());
    }

    if let Some(foreign_key) = &column.foreign_key {
        parts.push(format!(
            "REFERENCES {}({})",
            quote_identifier(&foreign_key.table),
            quote_identifier(&foreign_key.column)
        ));
        if foreign_key.on_delete_cascade {
            parts.push("ON DELETE CASCADE".to_string());
        }
    }

    parts.join(" ")
}

fn column_type_sql(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::String => "TEXT",
        ColumnType::Blob => "BLOB",
        ColumnType::Integer => "INTEGER",
        ColumnType::Decimal => "REAL",
        ColumnType::Boolean => "BOOLEAN",
    }
}

fn value_matches_type(value: &DbValue, column_type: ColumnType) -> bool {
    matches!(
        (value, column_type),
        (DbValue::String(_), ColumnType::String)
            | (DbValue::Blob(_), ColumnType::Blob)
            | (DbValue::Integer(_), ColumnType::Integer)
            | (DbValue::Decimal(_) | DbValue::Integer(_), ColumnType::Decimal)
            | (DbValue::Boolean(_), ColumnType::Boolean)
            | (DbValue::Null, _)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents() -> TableSchema {
        TableSchema::new("documents")
            .with_column(ColumnDef::new("id", ColumnType::String).primary_key())
            .with_column(ColumnDef::new("partner_id", ColumnType::String))
            .with_column(ColumnDef::new("control_number", ColumnType::String))
            .with_column(ColumnDef::new("raw_content", ColumnType::Blob))
            .with_column(ColumnDef::new("processed_at", ColumnType::String).nullable(true))
            .with_unique_index(&["partner_id", "control_number"])
            .with_index(&["processed_at"])
    }

    fn transactions() -> TableSchema {
        TableSchema::new("transactions")
            .with_column(ColumnDef::new("id", ColumnType::String).primary_key())
            .with_column(ColumnDef::new("document_id", ColumnType::String).references("documents", "id"))
    }

    #[test]
    fn test_create_table_sql() {
        let sql = transactions().create_table_sql();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"transactions\" (\"id\" TEXT NOT NULL PRIMARY KEY, \
             \"document_id\" TEXT NOT NULL REFERENCES \"documents\"(\"id\") ON DELETE CASCADE)"
        );
    }

    #[test]
    fn test_create_index_sql() {
        let sql = documents().create_index_sql();
        assert_eq!(sql.len(), 2);
        assert_eq!(
            sql[0],
            "CREATE UNIQUE INDEX IF NOT EXISTS \"ux_documents_partner_id_control_number\" \
             ON \"documents\" (\"partner_id\", \"control_number\")"
        );
        assert!(sql[1].starts_with("CREATE INDEX IF NOT EXISTS \"ix_documents_processed_at\""));
    }

    #[test]
    fn test_unique_keys() {
        let schema = documents();
        assert_eq!(
            schema.unique_keys(),
            vec![vec!["id"], vec!["partner_id", "control_number"]]
        );
    }

    #[test]
    fn test_dependents() {
        let mut mapping = SchemaMapping::new();
        mapping.add_table(documents());
        mapping.add_table(transactions());
        assert_eq!(mapping.dependents("documents"), vec![("transactions", "document_id", "id")]);
        assert!(mapping.dependents("transactions").is_empty());
        assert_eq!(mapping.table_names(), vec!["documents", "transactions"]);
    }

    #[test]
    fn test_schema_validation() {
        let schema = documents();
        let mut row = Row::new();
        row.insert("id".to_string(), "d1".into());
        row.insert("partner_id".to_string(), "ACME".into());
        row.insert("control_number".to_string(), "000000001".into());
        row.insert("raw_content".to_string(), DbValue::Blob(b"ISA".to_vec()));
        row.insert("processed_at".to_string(), DbValue::Null);
        assert!(schema.validate_row(&row).is_ok());

        row.insert("raw_content".to_string(), "text".into());
        assert!(schema.validate_row(&row).is_err());

        row.remove("raw_content");
        assert!(schema.validate_row(&row).is_err());
    }

    #[test]
    fn test_value_ordering() {
        let mut values = vec![
            DbValue::String("b".into()),
            DbValue::Null,
            DbValue::Integer(3),
            DbValue::Decimal(1.5),
            DbValue::String("a".into()),
        ];
        values.sort_by(DbValue::compare);
        assert_eq!(
            values,
            vec![
                DbValue::Null,
                DbValue::Decimal(1.5),
                DbValue::Integer(3),
                DbValue::String("a".into()),
                DbValue::String("b".into()),
            ]
        );
    }
}
