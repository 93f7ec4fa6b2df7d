//! Persistence seams for invoices, clients, the activity log and rollups.
//!
//! [`InvoiceStore`] is the async capability the pipeline runs against; the
//! bundled implementation is the snapshot-backed [`MemoryStore`]. Approval
//! operations are free functions over the trait so every backend shares the
//! same transition rules.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::categorize::CategorizationResult;
use crate::error::StoreError;
use crate::models::invoice::{Client, ExtractedFields, Invoice, InvoiceStatus};
use crate::validate::duplicate::DuplicateCandidate;

pub use memory::{LedgerSnapshot, MemoryStore};

/// Actor recorded on pipeline-driven decisions.
pub const SYSTEM_ACTOR: &str = "system:pipeline";

/// Origin of a confidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    /// Per-field score from the extraction service.
    Extraction,
    /// Per-rule score from the compliance validator.
    AutoValidation,
}

impl ConfidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceSource::Extraction => "extraction",
            ConfidenceSource::AutoValidation => "auto_validation",
        }
    }
}

/// Append-only confidence audit record, one per field or rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfidenceRecord {
    pub invoice_id: Uuid,

    /// Scored field name, or rule name for validation records.
    pub field_name: String,

    pub confidence_score: f32,

    /// Extracted value rendered as text; absent for rule scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_value: Option<String>,

    pub source: ConfidenceSource,
}

/// Append-only audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Acting user id, or [`SYSTEM_ACTOR`] for automated decisions.
    pub user_id: String,

    pub client_id: Uuid,

    pub action: String,

    pub entity_type: String,

    pub entity_id: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_values: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_values: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Entry for an invoice action, without a value diff.
    pub fn new(
        user_id: impl Into<String>,
        client_id: Uuid,
        action: impl Into<String>,
        entity_id: Uuid,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            client_id,
            action: action.into(),
            entity_type: "invoice".to_string(),
            entity_id,
            old_values: None,
            new_values: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the before/after values.
    pub fn with_values(mut self, old: serde_json::Value, new: serde_json::Value) -> Self {
        self.old_values = Some(old);
        self.new_values = Some(new);
        self
    }
}

/// Per-client, per-calendar-month compliance rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub client_id: Uuid,

    pub year: i32,

    /// Calendar month, 1-12.
    pub month: u32,

    pub invoices_approved: u32,

    pub gst_amount: Decimal,
}

/// Candidate query for duplicate detection: one client's non-rejected
/// invoices from one vendor, excluding the invoice under check.
#[derive(Debug, Clone)]
pub struct DuplicateQuery {
    pub client_id: Uuid,

    /// Vendor GSTIN to match. `None` matches nothing.
    pub vendor_gstin: Option<String>,

    pub exclude: Uuid,
}

/// Partial invoice update persisted when a decision lands.
///
/// `None` fields are left untouched on the stored invoice.
#[derive(Debug, Clone)]
pub struct DecisionUpdate {
    pub invoice_id: Uuid,

    pub status: InvoiceStatus,

    pub confidence_score: Option<f32>,

    pub review_notes: Option<String>,

    pub approved_by: Option<String>,

    pub approved_at: Option<DateTime<Utc>>,
}

/// Persistence capability the pipeline and approval operations run against.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn invoice(&self, id: Uuid) -> Result<Invoice, StoreError>;

    async fn client(&self, id: Uuid) -> Result<Client, StoreError>;

    /// Record extraction output on the invoice, replacing any prior run.
    async fn save_extraction(
        &self,
        invoice_id: Uuid,
        fields: &ExtractedFields,
        confidence: f32,
    ) -> Result<(), StoreError>;

    /// Record the categorization outcome on the invoice.
    async fn save_categorization(
        &self,
        invoice_id: Uuid,
        result: &CategorizationResult,
    ) -> Result<(), StoreError>;

    /// Apply a decision's field updates to the invoice.
    async fn apply_decision(&self, update: DecisionUpdate) -> Result<(), StoreError>;

    /// Invoices eligible as duplicate candidates for the query.
    async fn duplicate_candidates(
        &self,
        query: &DuplicateQuery,
    ) -> Result<Vec<DuplicateCandidate>, StoreError>;

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError>;

    /// Activity entries for one invoice, oldest first.
    async fn activities(&self, invoice_id: Uuid) -> Result<Vec<ActivityEntry>, StoreError>;

    async fn append_field_confidence(
        &self,
        records: &[FieldConfidenceRecord],
    ) -> Result<(), StoreError>;

    /// Add one approved invoice and its GST amount to the month of `period`.
    async fn bump_monthly_summary(
        &self,
        client_id: Uuid,
        period: NaiveDate,
        gst_amount: Decimal,
    ) -> Result<(), StoreError>;

    async fn monthly_summary(
        &self,
        client_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlySummary>, StoreError>;
}

/// Result of an approval operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub invoice_id: Uuid,

    pub previous_status: InvoiceStatus,

    pub new_status: InvoiceStatus,

    pub message: String,
}

/// Approve a high-confidence invoice on behalf of the pipeline.
///
/// Sets the approval fields, appends an `invoice_auto_approved` activity and
/// bumps the monthly rollup. Approving an already approved invoice is an
/// invalid transition.
pub async fn auto_approve(
    store: &dyn InvoiceStore,
    invoice_id: Uuid,
    confidence: f32,
    notes: &str,
) -> Result<ApprovalOutcome, StoreError> {
    let invoice = store.invoice(invoice_id).await?;
    ensure_not_approved(&invoice)?;

    store
        .apply_decision(DecisionUpdate {
            invoice_id,
            status: InvoiceStatus::Approved,
            confidence_score: Some(confidence),
            review_notes: Some(notes.to_string()),
            approved_by: Some(SYSTEM_ACTOR.to_string()),
            approved_at: Some(Utc::now()),
        })
        .await?;

    store
        .append_activity(
            ActivityEntry::new(
                SYSTEM_ACTOR,
                invoice.client_id,
                "invoice_auto_approved",
                invoice_id,
            )
            .with_values(
                json!({
                    "status": invoice.status.as_str(),
                    "confidence_score": invoice.confidence_score,
                }),
                json!({ "status": "approved", "confidence_score": confidence }),
            ),
        )
        .await?;

    bump_ledger(store, &invoice).await;

    Ok(ApprovalOutcome {
        invoice_id,
        previous_status: invoice.status,
        new_status: InvoiceStatus::Approved,
        message: "Invoice auto-approved due to high confidence score".to_string(),
    })
}

/// Approve an invoice on behalf of a user, with optional notes.
pub async fn approve(
    store: &dyn InvoiceStore,
    invoice_id: Uuid,
    approved_by: &str,
    notes: Option<&str>,
) -> Result<ApprovalOutcome, StoreError> {
    let invoice = store.invoice(invoice_id).await?;
    ensure_not_approved(&invoice)?;

    store
        .apply_decision(DecisionUpdate {
            invoice_id,
            status: InvoiceStatus::Approved,
            confidence_score: None,
            review_notes: Some(notes.unwrap_or_default().to_string()),
            approved_by: Some(approved_by.to_string()),
            approved_at: Some(Utc::now()),
        })
        .await?;

    store
        .append_activity(
            ActivityEntry::new(
                approved_by,
                invoice.client_id,
                "invoice_manually_approved",
                invoice_id,
            )
            .with_values(
                json!({
                    "status": invoice.status.as_str(),
                    "review_notes": invoice.review_notes,
                }),
                json!({
                    "status": "approved",
                    "review_notes": notes.unwrap_or_default(),
                }),
            ),
        )
        .await?;

    bump_ledger(store, &invoice).await;

    let message = match notes {
        Some(notes) => format!("Invoice approved manually with notes: {notes}"),
        None => "Invoice approved manually".to_string(),
    };
    Ok(ApprovalOutcome {
        invoice_id,
        previous_status: invoice.status,
        new_status: InvoiceStatus::Approved,
        message,
    })
}

/// Reject an invoice. The reason is required and lands in the review notes.
pub async fn reject(
    store: &dyn InvoiceStore,
    invoice_id: Uuid,
    rejected_by: &str,
    reason: &str,
) -> Result<ApprovalOutcome, StoreError> {
    if reason.trim().is_empty() {
        return Err(StoreError::MissingRejectionReason(invoice_id));
    }

    let invoice = store.invoice(invoice_id).await?;

    store
        .apply_decision(DecisionUpdate {
            invoice_id,
            status: InvoiceStatus::Rejected,
            confidence_score: None,
            review_notes: Some(format!("Rejected: {reason}")),
            approved_by: Some(rejected_by.to_string()),
            approved_at: Some(Utc::now()),
        })
        .await?;

    store
        .append_activity(
            ActivityEntry::new(
                rejected_by,
                invoice.client_id,
                "invoice_rejected",
                invoice_id,
            )
            .with_values(
                json!({ "status": invoice.status.as_str() }),
                json!({ "status": "rejected", "rejection_reason": reason }),
            ),
        )
        .await?;

    Ok(ApprovalOutcome {
        invoice_id,
        previous_status: invoice.status,
        new_status: InvoiceStatus::Rejected,
        message: format!("Invoice rejected. Reason: {reason}"),
    })
}

fn ensure_not_approved(invoice: &Invoice) -> Result<(), StoreError> {
    if invoice.status == InvoiceStatus::Approved {
        return Err(StoreError::InvalidTransition {
            invoice_id: invoice.id,
            reason: "invoice is already approved".to_string(),
        });
    }
    Ok(())
}

// The rollup is a secondary record; failures are logged, not propagated.
async fn bump_ledger(store: &dyn InvoiceStore, invoice: &Invoice) {
    let Some(date) = invoice.invoice_date else {
        return;
    };
    if let Err(e) = store
        .bump_monthly_summary(invoice.client_id, date, invoice.gst_amount)
        .await
    {
        warn!(invoice_id = %invoice.id, error = %e, "monthly summary update failed");
    }
}
