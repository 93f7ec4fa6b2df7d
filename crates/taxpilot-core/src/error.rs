//! Error types for the taxpilot-core library.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the taxpilot library.
#[derive(Error, Debug)]
pub enum TaxpilotError {
    /// Field extraction error from the document recognition service.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Persistence layer error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The acting user does not own the invoice's client.
    #[error("unauthorized access to invoice {0}")]
    Unauthorized(Uuid),

    /// Batch request exceeds the configured cap.
    #[error("batch of {requested} invoices exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors from the external field-extraction service.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No extraction endpoint is configured and no recorded fields exist.
    #[error("no recorded fields for invoice {0} and no extraction endpoint configured")]
    NoRecordedFields(Uuid),

    /// The invoice has no document to extract from.
    #[error("invoice {0} has no document reference")]
    MissingDocument(Uuid),

    /// The vendor rejected or failed the request.
    #[error("extraction service returned {status}: {message}")]
    Vendor { status: u16, message: String },

    /// Transport-level failure talking to the vendor.
    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor response did not match the declared contract.
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    /// The API key environment variable is not set.
    #[error("extraction API key not set in ${0}")]
    MissingApiKey(String),
}

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invoice does not exist.
    #[error("invoice not found: {0}")]
    InvoiceNotFound(Uuid),

    /// Client does not exist.
    #[error("client not found: {0}")]
    ClientNotFound(Uuid),

    /// Lifecycle transition is not allowed.
    #[error("invalid status transition for invoice {invoice_id}: {reason}")]
    InvalidTransition { invoice_id: Uuid, reason: String },

    /// Rejection requires a reason.
    #[error("rejection of invoice {0} requires a reason")]
    MissingRejectionReason(Uuid),

    /// Shared state lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Lock(String),

    /// Snapshot (de)serialization failed.
    #[error("failed to read or write ledger snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// I/O error while loading or saving a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the taxpilot library.
pub type Result<T> = std::result::Result<T, TaxpilotError>;
