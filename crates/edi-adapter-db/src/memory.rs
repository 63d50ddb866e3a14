//! In-memory table store with the same constraint behavior as the SQL backend.

use std::collections::HashMap;

use crate::connection::WriteOp;
use crate::schema::{DbValue, NULL, Row, SchemaMapping};
use crate::sql::{Query, SortOrder};
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub tables: HashMap<String, Vec<Row>>,
}

impl DatabaseState {
    pub fn apply(&mut self, schema: Option<&SchemaMapping>, op: &WriteOp) -> Result<usize> {
        match op {
            WriteOp::Insert { table, row } => {
                self.insert(schema, table, row.clone())?;
                Ok(1)
            }
            WriteOp::Update {
                table,
                filter,
                updates,
            } => self.update(schema, table, filter, updates),
            WriteOp::Delete { table, filter } => {
                if filter.is_empty() {
                    return Err(Error::Query {
                        table: table.clone(),
                        details: "Delete filter cannot be empty".to_string(),
                    });
                }
                let removed = self.remove_where(table, |row| row_matches_filter(row, filter));
                let count = removed.len();
                self.cascade(schema, table, &removed);
                Ok(count)
            }
        }
    }

    pub fn select(&self, schema: Option<&SchemaMapping>, table: &str, query: &Query) -> Result<Vec<Row>> {
        let Some(rows) = self.rows(schema, table)? else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<Row> = rows
            .iter()
            .filter(|row| row_matches_filter(row, &query.filter))
            .cloned()
            .collect();

        if !query.order_by.is_empty() {
            selected.sort_by(|a, b| {
                query
                    .order_by
                    .iter()
                    .map(|(column, order)| {
                        let left = a.get(column).unwrap_or(&NULL);
                        let right = b.get(column).unwrap_or(&NULL);
                        match order {
                            SortOrder::Asc => left.compare(right),
                            SortOrder::Desc => right.compare(left),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(selected.into_iter().skip(query.offset).take(limit).collect())
    }

    pub fn count(&self, schema: Option<&SchemaMapping>, table: &str, filter: &Row) -> Result<usize> {
        Ok(self
            .rows(schema, table)?
            .map(|rows| rows.iter().filter(|row| row_matches_filter(row, filter)).count())
            .unwrap_or(0))
    }

    fn rows(&self, schema: Option<&SchemaMapping>, table: &str) -> Result<Option<&Vec<Row>>> {
        if let Some(schema) = schema {
            if schema.table(table).is_none() {
                return Err(Error::Query {
                    table: table.to_string(),
                    details: "Table not found".to_string(),
                });
            }
        }
        Ok(self.tables.get(table))
    }

    fn insert(&mut self, schema: Option<&SchemaMapping>, table: &str, row: Row) -> Result<()> {
        if let Some(schema) = schema {
            schema.validate_row(table, &row)?;
            self.check_unique(schema, table, &row, None)?;
        }
        self.tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    fn update(
        &mut self,
        schema: Option<&SchemaMapping>,
        table: &str,
        filter: &Row,
        updates: &Row,
    ) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::Query {
                table: table.to_string(),
                details: "Update filter cannot be empty".to_string(),
            });
        }

        let Some(rows) = self.tables.get(table) else {
            return Ok(0);
        };
        let matching: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row_matches_filter(row, filter))
            .map(|(index, _)| index)
            .collect();

        for &index in &matching {
            let mut candidate = self.tables[table][index].clone();
            candidate.extend(updates.iter().map(|(k, v)| (k.clone(), v.clone())));
            if let Some(schema) = schema {
                schema.validate_row(table, &candidate)?;
                self.check_unique(schema, table, &candidate, Some(index))?;
            }
            if let Some(rows) = self.tables.get_mut(table) {
                rows[index] = candidate;
            }
        }

        Ok(matching.len())
    }

    fn check_unique(&self, schema: &SchemaMapping, table: &str, row: &Row, skip: Option<usize>) -> Result<()> {
        let (Some(definition), Some(rows)) = (schema.table(table), self.tables.get(table)) else {
            return Ok(());
        };

        for columns in definition.unique_keys() {
            let values: Option<Vec<&DbValue>> = columns
                .iter()
                .map(|column| row.get(*column).filter(|value| !value.is_null()))
                .collect();
            let Some(values) = values else {
                continue;
            };

            let clash = rows.iter().enumerate().any(|(index, other)| {
                Some(index) != skip
                    && columns
                        .iter()
                        .zip(&values)
                        .all(|(column, value)| other.get(*column) == Some(*value))
            });

            if clash {
                let qualified: Vec<String> = columns.iter().map(|c| format!("{table}.{c}")).collect();
                return Err(Error::Conflict {
                    details: format!("UNIQUE constraint failed: {}", qualified.join(", ")),
                });
            }
        }

        Ok(())
    }

    fn remove_where(&mut self, table: &str, predicate: impl Fn(&Row) -> bool) -> Vec<Row> {
        let Some(rows) = self.tables.get_mut(table) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<Row>, Vec<Row>) = std::mem::take(rows).into_iter().partition(|row| predicate(row));
        *rows = kept;
        removed
    }

    fn cascade(&mut self, schema: Option<&SchemaMapping>, table: &str, removed: &[Row]) {
        let Some(schema) = schema else {
            return;
        };

        for (child, child_column, parent_column) in schema.dependents(table) {
            let keys: Vec<&DbValue> = removed.iter().filter_map(|row| row.get(parent_column)).collect();
            if keys.is_empty() {
                continue;
            }
            let orphans = self.remove_where(child, |row| {
                row.get(child_column).is_some_and(|value| keys.contains(&value))
            });
            self.cascade(Some(schema), child, &orphans);
        }
    }
}

fn row_matches_filter(row: &Row, filter: &Row) -> bool {
    filter.iter().all(|(column, value)| match row.get(column) {
        Some(found) => found == value,
        None => value.is_null(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, ColumnType, TableSchema};

    fn schema() -> SchemaMapping {
        let mut mapping = SchemaMapping::new();
        mapping.add_table(
            TableSchema::new("parents")
                .with_column(ColumnDef::new("id", ColumnType::String).primary_key())
                .with_column(ColumnDef::new("code", ColumnType::String).unique())
                .with_column(ColumnDef::new("rank", ColumnType::Integer)),
        );
        mapping.add_table(
            TableSchema::new("children")
                .with_column(ColumnDef::new("id", ColumnType::String).primary_key())
                .with_column(ColumnDef::new("parent_id", ColumnType::String).references("parents", "id"))
                .with_column(ColumnDef::new("seq", ColumnType::Integer))
                .with_unique_index(&["parent_id", "seq"]),
        );
        mapping
    }

    fn parent(id: &str, code: &str, rank: i64) -> Row {
        Row::from([
            ("id".to_string(), id.into()),
            ("code".to_string(), code.into()),
            ("rank".to_string(), rank.into()),
        ])
    }

    fn child(id: &str, parent_id: &str, seq: i64) -> Row {
        Row::from([
            ("id".to_string(), id.into()),
            ("parent_id".to_string(), parent_id.into()),
            ("seq".to_string(), seq.into()),
        ])
    }

    fn insert(state: &mut DatabaseState, schema: &SchemaMapping, table: &str, row: Row) -> Result<usize> {
        state.apply(
            Some(schema),
            &WriteOp::Insert {
                table: table.to_string(),
                row,
            },
        )
    }

    #[test]
    fn test_unique_constraints() {
        let schema = schema();
        let mut state = DatabaseState::default();
        insert(&mut state, &schema, "parents", parent("p1", "A", 1)).unwrap();

        let err = insert(&mut state, &schema, "parents", parent("p2", "A", 2)).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        insert(&mut state, &schema, "children", child("c1", "p1", 1)).unwrap();
        let err = insert(&mut state, &schema, "children", child("c2", "p1", 1)).unwrap_err();
        assert!(err.to_string().contains("children.parent_id, children.seq"));
        insert(&mut state, &schema, "children", child("c2", "p1", 2)).unwrap();
    }

    #[test]
    fn test_delete_cascades() {
        let schema = schema();
        let mut state = DatabaseState::default();
        insert(&mut state, &schema, "parents", parent("p1", "A", 1)).unwrap();
        insert(&mut state, &schema, "parents", parent("p2", "B", 2)).unwrap();
        insert(&mut state, &schema, "children", child("c1", "p1", 1)).unwrap();
        insert(&mut state, &schema, "children", child("c2", "p2", 1)).unwrap();

        let removed = state
            .apply(
                Some(&schema),
                &WriteOp::Delete {
                    table: "parents".to_string(),
                    filter: Row::from([("id".to_string(), "p1".into())]),
                },
            )
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(state.count(Some(&schema), "children", &Row::new()).unwrap(), 1);
    }

    #[test]
    fn test_select_orders_and_pages() {
        let schema = schema();
        let mut state = DatabaseState::default();
        for (id, rank) in [("p1", 2), ("p2", 3), ("p3", 1)] {
            insert(&mut state, &schema, "parents", parent(id, id, rank)).unwrap();
        }

        let query = Query::new().order_by("rank", SortOrder::Desc).offset(1).limit(5);
        let rows = state.select(Some(&schema), "parents", &query).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![DbValue::from("p1"), DbValue::from("p3")]);

        let err = state.select(Some(&schema), "missing", &Query::new()).unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[test]
    fn test_update_checks_uniqueness() {
        let schema = schema();
        let mut state = DatabaseState::default();
        insert(&mut state, &schema, "parents", parent("p1", "A", 1)).unwrap();
        insert(&mut state, &schema, "parents", parent("p2", "B", 1)).unwrap();

        let op = WriteOp::Update {
            table: "parents".to_string(),
            filter: Row::from([("id".to_string(), "p2".into())]),
            updates: Row::from([("code".to_string(), "A".into())]),
        };
        assert!(matches!(state.apply(Some(&schema), &op), Err(Error::Conflict { .. })));

        let op = WriteOp::Update {
            table: "parents".to_string(),
            filter: Row::from([("rank".to_string(), 1i64.into())]),
            updates: Row::from([("rank".to_string(), 7i64.into())]),
        };
        assert_eq!(state.apply(Some(&schema), &op).unwrap(), 2);
    }
}
