use edi_adapter_db::{
    ColumnDef, ColumnType, DbConnection, DbValue, DocumentRepository, Error, Query, Row,
    SchemaMapping, TableSchema,
};
use uuid::Uuid;

fn invalid_row() -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), DbValue::String("wrong-type".to_string()));
    row
}

#[tokio::test]
async fn test_write_without_connect_fails() {
    let connection = DbConnection::new();

    let mut row = Row::new();
    row.insert("id".to_string(), DbValue::Integer(1));

    let err = connection.insert_row("documents", row).await.unwrap_err();
    assert!(err.to_string().contains("not connected"));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_read_missing_table_fails() {
    let connection = DbConnection::new();
    connection.connect().await.unwrap();

    let err = connection.select_rows("missing", &Query::new()).await.unwrap_err();
    assert!(matches!(err, Error::Sql { .. }));
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_schema_validation_error_is_reported() {
    let connection = DbConnection::memory();
    connection.connect().await.unwrap();

    let table = TableSchema::new("documents").with_column(ColumnDef::new("id", ColumnType::Integer));
    let mut mapping = SchemaMapping::new();
    mapping.add_table(table);
    connection.apply_schema(&mapping).await.unwrap();

    let err = connection.insert_row("documents", invalid_row()).await.unwrap_err();
    assert!(err.to_string().contains("Type mismatch"));
}

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let connection = DbConnection::new();
    connection.connect().await.unwrap();
    connection.apply_schema(&edi_adapter_db::edi_schema()).await.unwrap();

    let repository = DocumentRepository::new(connection);
    let id = Uuid::new_v4();
    let err = repository.get_by_id(id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "document", .. }));
    assert!(matches!(repository.delete(id).await, Err(Error::NotFound { .. })));
}
