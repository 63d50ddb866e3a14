//! Acknowledgments for stored documents

use std::sync::Arc;

use edi_adapter_db::records::now;
use edi_adapter_db::{AcknowledgmentRecord, DocumentRecord, DocumentRepository, ProcessingStatus};
use edi_adapter_x12::{AckGenerator, AckOptions, AckType, ParseOptions};
use edi_profile::ProfileStore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Error, Result};

/// Renders and stores 997/999 acknowledgments, at most one per document.
#[derive(Clone)]
pub struct AckService {
    profiles: Arc<dyn ProfileStore>,
    documents: DocumentRepository,
    generator: AckGenerator,
}

impl AckService {
    pub fn new(profiles: Arc<dyn ProfileStore>, documents: DocumentRepository) -> Self {
        Self {
            profiles,
            documents,
            generator: AckGenerator::new(),
        }
    }

    /// The acknowledgment of a document, generated on first request.
    ///
    /// The ack type comes from the partner profile; a deleted profile falls back to 997.
    /// Rejected documents have nothing to acknowledge.
    pub async fn acknowledge(&self, document_id: Uuid) -> Result<AcknowledgmentRecord> {
        let document = self.documents.get_by_id(document_id).await?;
        if let Some(existing) = self.documents.acknowledgments(document_id).await?.into_iter().next() {
            debug!(document_id = %document_id, ack_id = %existing.id, "acknowledgment already generated");
            return Ok(existing);
        }
        if document.status == ProcessingStatus::Rejected || document.parsed_content.is_none() {
            return Err(Error::invalid_field(
                "id",
                "document was rejected and cannot be acknowledged",
                "DOCUMENT_REJECTED",
            ));
        }

        let ack_type = self.ack_type(&document.partner_id).await?;
        let record = self.render(&document, ack_type)?;
        match self.documents.insert_acknowledgment(&record).await {
            Ok(()) => {}
            // a concurrent request stored its acknowledgment first
            Err(edi_adapter_db::Error::Conflict { .. }) => {
                if let Some(existing) = self.documents.acknowledgments(document_id).await?.into_iter().next() {
                    return Ok(existing);
                }
                return Err(Error::Conflict(format!("acknowledgment for document {document_id} already exists")));
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            document_id = %document_id,
            partner_id = %document.partner_id,
            ack_type = %record.ack_type,
            status = %record.status,
            "acknowledgment generated"
        );
        Ok(record)
    }

    async fn ack_type(&self, partner_id: &str) -> Result<AckType> {
        match self.profiles.get(partner_id).await {
            Ok(profile) => profile
                .configuration
                .acknowledgment
                .ack_type
                .parse()
                .map_err(|err: edi_adapter_x12::Error| Error::validation(err.to_string())),
            Err(edi_profile::Error::NotFound { .. }) => Ok(AckType::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn render(&self, document: &DocumentRecord, ack_type: AckType) -> Result<AcknowledgmentRecord> {
        // Reparse the stored bytes leniently; the issues that count are the stored ones.
        let (parsed, _) = edi_adapter_x12::parse(&document.raw_content, &ParseOptions::lax());
        let interchange = parsed.map_err(|err| Error::internal(format!("stored document no longer parses: {err}")))?;

        let control_number = document.control_number.parse::<u32>().unwrap_or(1);
        let options = AckOptions::new(ack_type, control_number);
        let ack = self.generator.generate(&interchange, &document.error_messages, &options)?;

        Ok(AcknowledgmentRecord {
            id: Uuid::new_v4(),
            document_id: document.id,
            ack_type: ack.ack_type.code().to_string(),
            control_number: ack.control_number,
            status: ack.status.as_str().to_string(),
            ack_content: ack.content,
            sent_at: None,
            created_at: now(),
        })
    }
}
