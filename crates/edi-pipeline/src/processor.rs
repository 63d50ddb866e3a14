//! Ingest: profile → parse → validate → decompose → persist

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use edi_adapter_db::records::now;
use edi_adapter_db::{
    DocumentRecord, DocumentRepository, DocumentTree, ProcessingStatus, ShipmentRecord,
    ShipmentTree, StopRecord, TransactionRecord, TransactionTree,
};
use edi_adapter_x12::envelopes::peek_control_number;
use edi_adapter_x12::{ParseError, ParseOptions};
use edi_ir::issue::{codes, transaction_has_errors};
use edi_ir::{Interchange, Issue, TransactionSet};
use edi_mapping::{LOAD_TENDER, Shipment};
use edi_profile::{PartnerProfile, ProfileStore};
use edi_validation::ValidationReport;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// A persisted document and every issue found while processing it.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub document: DocumentRecord,
    pub issues: Vec<Issue>,
}

/// Single entry point for inbound interchanges.
#[derive(Clone)]
pub struct EdiProcessor {
    profiles: Arc<dyn ProfileStore>,
    documents: DocumentRepository,
}

impl EdiProcessor {
    pub fn new(profiles: Arc<dyn ProfileStore>, documents: DocumentRepository) -> Self {
        Self { profiles, documents }
    }

    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    pub fn documents(&self) -> &DocumentRepository {
        &self.documents
    }

    /// Process one interchange received from `partner_id`.
    ///
    /// Parse failures are stored as `rejected` documents and returned like any other
    /// outcome. A second interchange with the same ISA13 from the same partner fails
    /// with [`Error::Conflict`].
    pub async fn process(&self, partner_id: &str, raw: &[u8]) -> Result<ProcessOutcome> {
        let started = Instant::now();
        let profile = self.active_profile(partner_id).await?;

        let (parsed, parse_issues) = edi_adapter_x12::parse(raw, &ParseOptions::from_profile(&profile));
        let interchange = match parsed {
            Ok(interchange) => interchange,
            Err(err) => return self.reject(&profile, raw, &err, parse_issues).await,
        };

        let mut report = ValidationReport::new(parse_issues);
        report.extend(edi_validation::validate(&interchange, &profile));
        let tree = build_tree(&profile, raw, &interchange, &mut report)?;

        self.documents.create(&tree).await?;
        let document = tree.document;

        info!(
            partner_id = %profile.partner_id,
            control_number = %document.control_number,
            document_id = %document.id,
            status = %document.status,
            transactions = tree.transactions.len(),
            issues = %report.summary(),
            duration_ms = started.elapsed().as_millis() as u64,
            "document processed"
        );

        Ok(ProcessOutcome {
            document,
            issues: report.into_issues(),
        })
    }

    async fn active_profile(&self, partner_id: &str) -> Result<PartnerProfile> {
        let profile = match self.profiles.get(partner_id).await {
            Ok(profile) => profile,
            Err(edi_profile::Error::NotFound { .. }) => {
                return Err(Error::invalid_field("partner_id", "partner not found", "PARTNER_NOT_FOUND"));
            }
            Err(err) => return Err(err.into()),
        };
        if !profile.active {
            return Err(Error::invalid_field(
                "partner_id",
                "partner profile is inactive",
                "PARTNER_INACTIVE",
            ));
        }
        Ok(profile)
    }

    async fn reject(
        &self,
        profile: &PartnerProfile,
        raw: &[u8],
        err: &ParseError,
        parse_issues: Vec<Issue>,
    ) -> Result<ProcessOutcome> {
        let mut report = ValidationReport::new(parse_issues);
        report.push(err.to_issue());

        let id = Uuid::new_v4();
        let control_number = peek_control_number(raw).unwrap_or_else(|| format!("UNPARSED-{id}"));
        let mut document = DocumentRecord::new(&profile.partner_id, control_number, raw.to_vec());
        document.id = id;
        document.status = ProcessingStatus::Rejected;
        document.error_messages = report.issues.clone();
        document.processed_at = Some(now());

        self.documents
            .create(&DocumentTree {
                document: document.clone(),
                transactions: Vec::new(),
            })
            .await?;

        warn!(
            partner_id = %profile.partner_id,
            control_number = %document.control_number,
            document_id = %document.id,
            error = %err,
            "document rejected"
        );
        Ok(ProcessOutcome {
            document,
            issues: report.into_issues(),
        })
    }
}

/// The document tree for a parsed interchange.
///
/// Decomposition issues are added to `report`, so the statuses reflect them.
fn build_tree(
    profile: &PartnerProfile,
    raw: &[u8],
    interchange: &Interchange,
    report: &mut ValidationReport,
) -> Result<DocumentTree> {
    let mut document = DocumentRecord::new(&profile.partner_id, interchange.control_number(), raw.to_vec());
    document.transaction_set = interchange.primary_transaction_type().map(str::to_string);
    document.version = Some(interchange.primary_version().to_string()).filter(|v| !v.is_empty());
    document.parsed_content = Some(interchange.to_json()?);

    let date_format = profile.configuration.validation_config.date_format;
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    for transaction in interchange.transactions() {
        if !seen.insert(transaction.control_number.clone()) {
            let stored_as = unique_control_number(&transaction.control_number, &seen);
            report.push(
                Issue::error(
                    codes::DUPLICATE_TRANSACTION,
                    format!(
                        "transaction set control number {} is used more than once, stored as {stored_as}",
                        transaction.control_number
                    ),
                )
                .with_segment_ref("ST", 1)
                .with_field("ST02")
                .in_transaction(&transaction.control_number),
            );
            seen.insert(stored_as.clone());
            pending.push((transaction, stored_as, None));
            continue;
        }

        let mut shipment = None;
        if transaction.transaction_type == LOAD_TENDER {
            if transaction_has_errors(&report.issues, &transaction.control_number) {
                debug!(
                    control_number = %transaction.control_number,
                    "load tender has errors, not decomposed"
                );
            } else {
                let (decomposed, issues) = edi_mapping::decompose(transaction, date_format);
                report.extend(issues);
                shipment = decomposed;
            }
        }
        pending.push((transaction, transaction.control_number.clone(), shipment));
    }

    let mut transactions = Vec::with_capacity(pending.len());
    for (transaction, stored_as, shipment) in pending {
        transactions.push(transaction_tree(document.id, transaction, stored_as, shipment, report)?);
    }

    document.status = status_of(report.is_valid());
    document.error_messages = report.issues.clone();
    document.processed_at = Some(now());
    Ok(DocumentTree { document, transactions })
}

/// Key for a repeated ST02: the control number with the first free `#n` suffix.
fn unique_control_number(control_number: &str, taken: &HashSet<String>) -> String {
    (2..)
        .map(|n| format!("{control_number}#{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| control_number.to_string())
}

fn transaction_tree(
    document_id: Uuid,
    transaction: &TransactionSet,
    control_number: String,
    shipment: Option<Shipment>,
    report: &ValidationReport,
) -> Result<TransactionTree> {
    let validation_errors: Vec<Issue> = report
        .for_transaction(&transaction.control_number)
        .cloned()
        .collect();
    let record = TransactionRecord {
        id: Uuid::new_v4(),
        document_id,
        transaction_type: transaction.transaction_type.clone(),
        control_number,
        reference_id: edi_mapping::business_reference(transaction),
        status: status_of(!validation_errors.iter().any(Issue::is_error)),
        data: transaction.to_json()?,
        validation_errors,
        created_at: now(),
    };

    let shipment = match shipment {
        Some(shipment) => Some(shipment_tree(record.id, &shipment)?),
        None => None,
    };
    Ok(TransactionTree {
        transaction: record,
        shipment,
    })
}

fn shipment_tree(transaction_id: Uuid, shipment: &Shipment) -> Result<ShipmentTree> {
    let created_at = now();
    let record = ShipmentRecord {
        id: Uuid::new_v4(),
        transaction_id,
        shipment_id: shipment.shipment_id.clone(),
        carrier_scac: shipment.carrier_scac.clone(),
        pickup_date: shipment.pickup_date,
        delivery_date: shipment.delivery_date,
        total_weight: shipment.total_weight,
        total_pieces: shipment.total_pieces.map(i64::from),
        service_level: shipment.service_level.clone(),
        status: shipment.status.as_str().to_string(),
        data: shipment.to_json()?,
        created_at,
    };
    let stops = shipment
        .stops
        .iter()
        .map(|stop| StopRecord {
            id: Uuid::new_v4(),
            shipment_id: record.id,
            stop_number: i64::from(stop.stop_number),
            stop_type: stop.stop_type.as_str().to_string(),
            reason_code: stop.reason_code.clone(),
            location_name: stop.location_name.clone(),
            location_code: stop.location_code.clone(),
            address_line1: stop.address.address_line1.clone(),
            address_line2: stop.address.address_line2.clone(),
            city: stop.address.city.clone(),
            state: stop.address.state.clone(),
            postal_code: stop.address.postal_code.clone(),
            country: stop.address.country.clone(),
            earliest_date: stop.earliest_date,
            latest_date: stop.latest_date,
            weight: stop.weight,
            pieces: stop.pieces.map(i64::from),
            created_at,
        })
        .collect();
    Ok(ShipmentTree { shipment: record, stops })
}

fn status_of(valid: bool) -> ProcessingStatus {
    if valid {
        ProcessingStatus::Processed
    } else {
        ProcessingStatus::ProcessedWithErrors
    }
}
