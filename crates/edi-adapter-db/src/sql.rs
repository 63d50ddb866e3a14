//! SQL text builders for the libsql backend, plus the query description both backends share.

use crate::schema::{DbValue, Row};
use crate::{Error, Result};

pub(crate) fn quote_identifier(value: &str) -> String {
    let escaped = value.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Equality filter, ordering and paging for a single-table select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Row,
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows where `column = value` (`IS NULL` for [`DbValue::Null`]).
    pub fn filter(mut self, column: &str, value: impl Into<DbValue>) -> Self {
        self.filter.insert(column.to_string(), value.into());
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by.push((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

pub(crate) fn db_value_to_libsql(value: &DbValue) -> libsql::Value {
    match value {
        DbValue::String(value) => libsql::Value::Text(value.clone()),
        DbValue::Blob(value) => libsql::Value::Blob(value.clone()),
        DbValue::Integer(value) => libsql::Value::Integer(*value),
        DbValue::Decimal(value) => libsql::Value::Real(*value),
        DbValue::Boolean(value) => libsql::Value::Integer(i64::from(*value)),
        DbValue::Null => libsql::Value::Null,
    }
}

fn where_clause(filter: &Row, params: &mut Vec<libsql::Value>) -> String {
    let clauses: Vec<String> = filter
        .iter()
        .map(|(column, value)| {
            if value.is_null() {
                format!("{} IS NULL", quote_identifier(column))
            } else {
                params.push(db_value_to_libsql(value));
                format!("{} = ?{}", quote_identifier(column), params.len())
            }
        })
        .collect();

    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

pub(crate) fn build_insert_sql(table: &str, row: &Row) -> Result<(String, Vec<libsql::Value>)> {
    if row.is_empty() {
        return Err(Error::Query {
            table: table.to_string(),
            details: "Insert row cannot be empty".to_string(),
        });
    }

    let mut columns = Vec::new();
    let mut params = Vec::new();
    for (column, value) in row {
        columns.push(quote_identifier(column));
        params.push(db_value_to_libsql(value));
    }

    let placeholders: Vec<String> = (1..=columns.len()).map(|idx| format!("?{idx}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns.join(", "),
        placeholders.join(", ")
    );

    Ok((sql, params))
}

pub(crate) fn build_select_sql(table: &str, query: &Query) -> (String, Vec<libsql::Value>) {
    let mut params = Vec::new();
    let mut sql = format!("SELECT * FROM {}", quote_identifier(table));
    sql.push_str(&where_clause(&query.filter, &mut params));

    if !query.order_by.is_empty() {
        let order: Vec<String> = query
            .order_by
            .iter()
            .map(|(column, direction)| {
                let direction = match direction {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                format!("{} {direction}", quote_identifier(column))
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }

    if let Some(limit) = query.limit {
        params.push(libsql::Value::Integer(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", params.len()));
    } else if query.offset > 0 {
        sql.push_str(" LIMIT -1");
    }

    if query.offset > 0 {
        params.push(libsql::Value::Integer(query.offset as i64));
        sql.push_str(&format!(" OFFSET ?{}", params.len()));
    }

    (sql, params)
}

pub(crate) fn build_count_sql(table: &str, filter: &Row) -> (String, Vec<libsql::Value>) {
    let mut params = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    sql.push_str(&where_clause(filter, &mut params));
    (sql, params)
}

pub(crate) fn build_update_sql(
    table: &str,
    filter: &Row,
    updates: &Row,
) -> Result<(String, Vec<libsql::Value>)> {
    if updates.is_empty() {
        return Err(Error::Query {
            table: table.to_string(),
            details: "Update row cannot be empty".to_string(),
        });
    }
    if filter.is_empty() {
        return Err(Error::Query {
            table: table.to_string(),
            details: "Update filter cannot be empty".to_string(),
        });
    }

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for (column, value) in updates {
        params.push(db_value_to_libsql(value));
        assignments.push(format!("{} = ?{}", quote_identifier(column), params.len()));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(table),
        assignments.join(", ")
    );
    sql.push_str(&where_clause(filter, &mut params));

    Ok((sql, params))
}

pub(crate) fn build_delete_sql(table: &str, filter: &Row) -> Result<(String, Vec<libsql::Value>)> {
    if filter.is_empty() {
        return Err(Error::Query {
            table: table.to_string(),
            details: "Delete filter cannot be empty".to_string(),
        });
    }

    let mut params = Vec::new();
    let mut sql = format!("DELETE FROM {}", quote_identifier(table));
    sql.push_str(&where_clause(filter, &mut params));
    Ok((sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_with_order_and_paging() {
        let query = Query::new()
            .filter("partner_id", "ACME")
            .filter("deleted_at", DbValue::Null)
            .order_by("created_at", SortOrder::Desc)
            .limit(50)
            .offset(100);
        let (sql, params) = build_select_sql("edi_documents", &query);
        assert_eq!(
            sql,
            "SELECT * FROM \"edi_documents\" WHERE \"deleted_at\" IS NULL AND \"partner_id\" = ?1 \
             ORDER BY \"created_at\" DESC LIMIT ?2 OFFSET ?3"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_offset_without_limit() {
        let (sql, _) = build_select_sql("t", &Query::new().offset(5));
        assert_eq!(sql, "SELECT * FROM \"t\" LIMIT -1 OFFSET ?1");
    }

    #[test]
    fn test_delete_requires_filter() {
        let err = build_delete_sql("t", &Row::new()).unwrap_err();
        assert!(matches!(err, Error::Query { .. }));

        let (sql, params) = build_delete_sql("t", &Query::new().filter("id", "x").filter).unwrap();
        assert_eq!(sql, "DELETE FROM \"t\" WHERE \"id\" = ?1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
