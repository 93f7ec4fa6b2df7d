//! Invoice and client data models for the GST compliance pipeline.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorize::CategorizationResult;

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Uploaded but not yet decided, or sent back for correction.
    Pending,
    /// Waiting for manual review.
    Review,
    /// Accepted into the compliance ledger.
    Approved,
    /// Explicitly rejected; excluded from duplicate matching.
    Rejected,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl InvoiceStatus {
    /// Stable lowercase name used in logs and notes.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Review => "review",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven extracted fields that carry a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredField {
    VendorGstin,
    TotalAmount,
    GstAmount,
    HsnCode,
    VendorName,
    InvoiceNumber,
    InvoiceDate,
}

impl ScoredField {
    /// All scored fields, in weight order (heaviest first).
    pub fn all() -> [ScoredField; 7] {
        [
            ScoredField::TotalAmount,
            ScoredField::GstAmount,
            ScoredField::VendorGstin,
            ScoredField::HsnCode,
            ScoredField::VendorName,
            ScoredField::InvoiceNumber,
            ScoredField::InvoiceDate,
        ]
    }

    /// Stable snake_case name used in confidence records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoredField::VendorGstin => "vendor_gstin",
            ScoredField::TotalAmount => "total_amount",
            ScoredField::GstAmount => "gst_amount",
            ScoredField::HsnCode => "hsn_code",
            ScoredField::VendorName => "vendor_name",
            ScoredField::InvoiceNumber => "invoice_number",
            ScoredField::InvoiceDate => "invoice_date",
        }
    }
}

impl fmt::Display for ScoredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured field guesses produced by the extraction service.
///
/// Immutable once stored on an invoice; a re-extraction replaces the whole
/// record rather than patching individual fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,

    /// Vendor GSTIN, uppercased; dropped at the extraction boundary unless
    /// it is exactly 15 alphanumeric characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_gstin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxable_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgst_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgst_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub igst_amount: Option<Decimal>,

    /// Combined GST amount across all components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-field confidence in [0, 1]. A missing key means confidence 0.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub confidence: HashMap<ScoredField, f32>,
}

impl ExtractedFields {
    /// Confidence for a field; absent keys degrade to 0 rather than erroring.
    pub fn confidence_for(&self, field: ScoredField) -> f32 {
        self.confidence.get(&field).copied().unwrap_or(0.0)
    }

    /// Render a field's extracted value as text for confidence records.
    pub fn value_text(&self, field: ScoredField) -> Option<String> {
        match field {
            ScoredField::VendorGstin => self.vendor_gstin.clone(),
            ScoredField::TotalAmount => self.total_amount.map(|d| d.to_string()),
            ScoredField::GstAmount => self.gst_amount.map(|d| d.to_string()),
            ScoredField::HsnCode => self.hsn_code.clone(),
            ScoredField::VendorName => self.vendor_name.clone(),
            ScoredField::InvoiceNumber => self.invoice_number.clone(),
            ScoredField::InvoiceDate => self.invoice_date.map(|d| d.to_string()),
        }
    }
}

/// A tax invoice owned by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,

    /// Owning client.
    pub client_id: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_gstin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsn_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Gross total including all tax components.
    pub total_amount: Decimal,

    /// Net amount before tax. Falls back to `total - gst` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxable_amount: Option<Decimal>,

    /// Combined GST amount.
    #[serde(default)]
    pub gst_amount: Decimal,

    /// Central GST component (intra-state split).
    #[serde(default)]
    pub cgst_amount: Decimal,

    /// State GST component (intra-state split).
    #[serde(default)]
    pub sgst_amount: Decimal,

    /// Integrated GST component (inter-state).
    #[serde(default)]
    pub igst_amount: Decimal,

    #[serde(default)]
    pub status: InvoiceStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,

    /// Reference to the uploaded document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uri: Option<String>,

    /// Fields recorded by the last extraction run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedFields>,

    /// Result recorded by the last categorization run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorization: Option<CategorizationResult>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Create a pending invoice with the given identity and total.
    pub fn new(id: Uuid, client_id: Uuid, total_amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id,
            client_id,
            invoice_number: None,
            invoice_date: None,
            vendor_name: None,
            vendor_gstin: None,
            hsn_code: None,
            description: None,
            total_amount,
            taxable_amount: None,
            gst_amount: Decimal::ZERO,
            cgst_amount: Decimal::ZERO,
            sgst_amount: Decimal::ZERO,
            igst_amount: Decimal::ZERO,
            status: InvoiceStatus::Pending,
            confidence_score: None,
            review_notes: None,
            document_uri: None,
            extracted: None,
            categorization: None,
            created_at: now,
            updated_at: now,
            approved_by: None,
            approved_at: None,
        }
    }

    /// Sum of the individual tax components.
    pub fn tax_component_sum(&self) -> Decimal {
        self.cgst_amount + self.sgst_amount + self.igst_amount
    }

    /// Net amount before tax, derived from the total when not recorded.
    pub fn taxable_or_derived(&self) -> Decimal {
        self.taxable_amount
            .unwrap_or(self.total_amount - self.gst_amount)
    }
}

/// A registered client whose invoices flow through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,

    /// User who owns this client's data; pipeline runs must match it.
    pub owner_id: Uuid,

    pub name: String,

    /// The client's own GSTIN; its state prefix drives tax-split treatment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}
