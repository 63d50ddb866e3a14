//! Document repository: atomic persistence of the document tree.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::{DbConnection, DbTransaction};
use crate::records::{
    AcknowledgmentRecord, DocumentDetail, DocumentRecord, DocumentTree, Record, ShipmentRecord,
    ShipmentTree, StopRecord, TransactionRecord, TransactionTree, now, uuid_value,
};
use crate::schema::Row;
use crate::sql::{Query, SortOrder};
use crate::tables;
use crate::{Error, Result};

/// Largest page `list` returns.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Validated paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    limit: usize,
    offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Result<Self> {
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(Error::invalid(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        Ok(Self { limit, offset })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentRepository {
    db: DbConnection,
}

impl DocumentRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Start a unit of work; nothing is visible to others until it commits.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        Ok(UnitOfWork {
            tx: self.db.begin_transaction().await?,
        })
    }

    /// Insert the whole tree in one transaction.
    ///
    /// A second document with the same `(partner_id, control_number)` fails with
    /// [`Error::Conflict`] and leaves nothing behind.
    pub async fn create(&self, tree: &DocumentTree) -> Result<()> {
        let mut work = self.begin().await?;
        match work.insert_tree(tree).await {
            Ok(()) => work.commit().await?,
            Err(err) => {
                if let Err(rollback) = work.rollback().await {
                    warn!(document_id = %tree.document.id, error = %rollback, "rollback failed");
                }
                return Err(err);
            }
        }

        debug!(
            document_id = %tree.document.id,
            partner_id = %tree.document.partner_id,
            control_number = %tree.document.control_number,
            transactions = tree.transactions.len(),
            "document tree persisted"
        );
        Ok(())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<DocumentRecord> {
        let row = self
            .db
            .select_one(tables::DOCUMENTS, &Query::new().filter("id", uuid_value(id)))
            .await?
            .ok_or_else(|| Error::not_found("document", id))?;
        DocumentRecord::from_row(&row)
    }

    pub async fn get_by_control_number(&self, partner_id: &str, control_number: &str) -> Result<DocumentRecord> {
        let query = Query::new()
            .filter("partner_id", partner_id)
            .filter("control_number", control_number);
        let row = self
            .db
            .select_one(tables::DOCUMENTS, &query)
            .await?
            .ok_or_else(|| Error::not_found("document", format!("{partner_id}/{control_number}")))?;
        DocumentRecord::from_row(&row)
    }

    /// The document with its transactions, shipments, stops and acknowledgments.
    pub async fn get_detail(&self, id: Uuid) -> Result<DocumentDetail> {
        let document = self.get_by_id(id).await?;

        let query = Query::new()
            .filter("document_id", uuid_value(id))
            .order_by("control_number", SortOrder::Asc);
        let mut transactions = Vec::new();
        for row in self.db.select_rows(tables::TRANSACTIONS, &query).await? {
            let transaction = TransactionRecord::from_row(&row)?;
            let shipment = self.shipment_for(transaction.id).await?;
            transactions.push(TransactionTree { transaction, shipment });
        }

        Ok(DocumentDetail {
            tree: DocumentTree {
                document,
                transactions,
            },
            acknowledgments: self.acknowledgments(id).await?,
        })
    }

    async fn shipment_for(&self, transaction_id: Uuid) -> Result<Option<ShipmentTree>> {
        let query = Query::new().filter("transaction_id", uuid_value(transaction_id));
        let Some(row) = self.db.select_one(tables::SHIPMENTS, &query).await? else {
            return Ok(None);
        };
        let shipment = ShipmentRecord::from_row(&row)?;

        let query = Query::new()
            .filter("shipment_id", uuid_value(shipment.id))
            .order_by("stop_number", SortOrder::Asc);
        let stops = self
            .db
            .select_rows(tables::STOPS, &query)
            .await?
            .iter()
            .map(StopRecord::from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(ShipmentTree { shipment, stops }))
    }

    /// Most recent first.
    pub async fn list(&self, partner_id: Option<&str>, page: Page) -> Result<Vec<DocumentRecord>> {
        let mut query = Query::new()
            .order_by("created_at", SortOrder::Desc)
            .order_by("id", SortOrder::Asc)
            .limit(page.limit())
            .offset(page.offset());
        if let Some(partner_id) = partner_id {
            query = query.filter("partner_id", partner_id);
        }

        self.db
            .select_rows(tables::DOCUMENTS, &query)
            .await?
            .iter()
            .map(DocumentRecord::from_row)
            .collect()
    }

    /// Persist `status`, `processed_at` and `error_messages`; nothing else changes after create.
    ///
    /// The write only applies if the stored `record_version` still matches the caller's copy.
    pub async fn update(&self, document: &DocumentRecord) -> Result<DocumentRecord> {
        let mut updated = document.clone();
        updated.record_version = document.record_version + 1;
        updated.updated_at = now();

        let row = updated.to_row()?;
        let updates: Row = ["status", "processed_at", "error_messages", "updated_at", "record_version"]
            .into_iter()
            .filter_map(|column| row.get(column).map(|value| (column.to_string(), value.clone())))
            .collect();
        let filter = Query::new()
            .filter("id", uuid_value(document.id))
            .filter("record_version", document.record_version)
            .filter;

        let changed = self.db.update_rows(tables::DOCUMENTS, &filter, &updates).await?;
        if changed == 0 {
            let current = self.get_by_id(document.id).await?;
            return Err(Error::Conflict {
                details: format!(
                    "document {} is at version {}, update was based on {}",
                    document.id, current.record_version, document.record_version
                ),
            });
        }

        self.get_by_id(document.id).await
    }

    /// Hard delete; transactions, shipments, stops and acknowledgments go with it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let filter = Query::new().filter("id", uuid_value(id)).filter;
        let deleted = self.db.delete_rows(tables::DOCUMENTS, &filter).await?;
        if deleted == 0 {
            return Err(Error::not_found("document", id));
        }
        debug!(document_id = %id, "document deleted");
        Ok(())
    }

    /// Acknowledgments of a document, oldest first.
    pub async fn acknowledgments(&self, document_id: Uuid) -> Result<Vec<AcknowledgmentRecord>> {
        let query = Query::new()
            .filter("document_id", uuid_value(document_id))
            .order_by("created_at", SortOrder::Asc);
        self.db
            .select_rows(tables::ACKNOWLEDGMENTS, &query)
            .await?
            .iter()
            .map(AcknowledgmentRecord::from_row)
            .collect()
    }

    pub async fn insert_acknowledgment(&self, acknowledgment: &AcknowledgmentRecord) -> Result<()> {
        self.db
            .insert_row(tables::ACKNOWLEDGMENTS, acknowledgment.to_row()?)
            .await
    }
}

/// Inserts within a single database transaction.
///
/// Dropping it without [`commit`](UnitOfWork::commit) discards every write.
pub struct UnitOfWork {
    tx: DbTransaction,
}

impl UnitOfWork {
    pub async fn insert_document(&mut self, document: &DocumentRecord) -> Result<()> {
        self.insert(document).await
    }

    pub async fn insert_transaction(&mut self, transaction: &TransactionRecord) -> Result<()> {
        self.insert(transaction).await
    }

    pub async fn insert_shipment(&mut self, shipment: &ShipmentRecord) -> Result<()> {
        self.insert(shipment).await
    }

    /// Append the next stop of a shipment; numbers must continue the sequence from 1.
    pub async fn create_stop(&mut self, stop: &StopRecord) -> Result<()> {
        let filter = Query::new().filter("shipment_id", uuid_value(stop.shipment_id)).filter;
        let existing = self.tx.count_rows(tables::STOPS, &filter).await?;
        let expected = existing as i64 + 1;
        if stop.stop_number != expected {
            return Err(Error::invalid(format!(
                "stop {} of shipment {} breaks the sequence, expected {expected}",
                stop.stop_number, stop.shipment_id
            )));
        }
        self.insert(stop).await
    }

    pub async fn insert_acknowledgment(&mut self, acknowledgment: &AcknowledgmentRecord) -> Result<()> {
        self.insert(acknowledgment).await
    }

    /// Document, then each transaction with its shipment and stops.
    pub async fn insert_tree(&mut self, tree: &DocumentTree) -> Result<()> {
        self.insert_document(&tree.document).await?;
        for entry in &tree.transactions {
            self.insert_transaction(&entry.transaction).await?;
            if let Some(shipment) = &entry.shipment {
                if !shipment.stops.iter().any(|s| s.stop_type == "pickup")
                    || !shipment.stops.iter().any(|s| s.stop_type == "delivery")
                {
                    return Err(Error::invalid(format!(
                        "shipment {} needs at least one pickup and one delivery",
                        shipment.shipment.shipment_id
                    )));
                }
                self.insert_shipment(&shipment.shipment).await?;
                for stop in &shipment.stops {
                    self.create_stop(stop).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await
    }

    async fn insert<R: Record>(&mut self, record: &R) -> Result<()> {
        self.tx.insert_row(R::TABLE, record.to_row()?).await
    }
}
