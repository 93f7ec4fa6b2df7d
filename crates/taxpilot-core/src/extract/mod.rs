//! Field extraction: the external service contract and its implementations.

pub mod confidence;
mod remote;

pub use confidence::{
    ConfidenceReport, ScoreTier, confidence_label, detailed_assessment, score_fields,
};
pub use remote::RemoteExtractor;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ExtractionError;
use crate::models::invoice::{ExtractedFields, Invoice};

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Reference to the document an invoice was created from.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    pub invoice_id: Uuid,
    pub uri: String,
}

impl DocumentRef {
    /// Build a reference from an invoice, failing when it has no document.
    pub fn for_invoice(invoice: &Invoice) -> Result<Self> {
        match &invoice.document_uri {
            Some(uri) => Ok(Self {
                invoice_id: invoice.id,
                uri: uri.clone(),
            }),
            None => Err(ExtractionError::MissingDocument(invoice.id)),
        }
    }
}

/// Trait for services that turn a document into structured field guesses.
///
/// Vendor failures surface as `ExtractionError`; the orchestrator treats
/// them as fatal once retries are exhausted.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, document: &DocumentRef) -> Result<ExtractedFields>;
}

/// Extraction source that replays the fields already recorded on the
/// invoice. Used when no extraction endpoint is configured, and for
/// re-runs over previously extracted invoices.
pub struct RecordedExtractor {
    fields: Option<ExtractedFields>,
}

impl RecordedExtractor {
    pub fn new(invoice: &Invoice) -> Self {
        Self {
            fields: invoice.extracted.clone(),
        }
    }
}

#[async_trait]
impl ExtractionService for RecordedExtractor {
    async fn extract(&self, document: &DocumentRef) -> Result<ExtractedFields> {
        self.fields
            .clone()
            .ok_or(ExtractionError::NoRecordedFields(document.invoice_id))
    }
}
