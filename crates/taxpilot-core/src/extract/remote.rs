//! HTTP client for a remote field-extraction service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::gst::gstin;
use crate::models::config::ExtractorConfig;
use crate::models::invoice::{ExtractedFields, ScoredField};

use super::{DocumentRef, ExtractionService, Result};

/// Extraction client that posts the document reference to a configured
/// endpoint and receives structured field guesses back.
///
/// Document storage is external; the service fetches the document itself
/// from the submitted URI.
pub struct RemoteExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ExtractionRequest<'a> {
    invoice_id: &'a str,
    document_uri: &'a str,
}

/// Raw vendor payload before sanitization.
#[derive(Debug, Default, Deserialize)]
struct VendorFields {
    invoice_number: Option<String>,
    invoice_date: Option<String>,
    vendor_name: Option<String>,
    vendor_gstin: Option<String>,
    total_amount: Option<Decimal>,
    taxable_amount: Option<Decimal>,
    cgst_amount: Option<Decimal>,
    sgst_amount: Option<Decimal>,
    igst_amount: Option<Decimal>,
    gst_amount: Option<Decimal>,
    hsn_code: Option<String>,
    description: Option<String>,
    #[serde(default)]
    confidence_per_field: HashMap<String, f32>,
}

impl RemoteExtractor {
    /// Build a client for the given endpoint, reading the API key from the
    /// environment variable named in the configuration.
    pub fn new(endpoint: impl Into<String>, config: &ExtractorConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ExtractionError::MissingApiKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ExtractionService for RemoteExtractor {
    async fn extract(&self, document: &DocumentRef) -> Result<ExtractedFields> {
        let invoice_id = document.invoice_id.to_string();
        debug!(invoice_id = %invoice_id, uri = %document.uri, "requesting extraction");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ExtractionRequest {
                invoice_id: &invoice_id,
                document_uri: &document.uri,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Vendor {
                status: status.as_u16(),
                message,
            });
        }

        let raw: VendorFields = response
            .json()
            .await
            .map_err(|e| ExtractionError::MalformedResponse(e.to_string()))?;

        Ok(sanitize(raw))
    }
}

/// Normalize a vendor payload into the declared contract: confidences
/// clamped to [0, 1], GSTIN dropped unless 15 alphanumeric characters,
/// dates dropped unless they parse as YYYY-MM-DD.
fn sanitize(raw: VendorFields) -> ExtractedFields {
    let invoice_date = raw.invoice_date.as_deref().and_then(|s| {
        let parsed = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        if parsed.is_none() {
            warn!(value = %s, "dropping unparseable invoice date");
        }
        parsed
    });

    let vendor_gstin = raw.vendor_gstin.as_deref().and_then(gstin::normalize);

    let mut confidence = HashMap::new();
    for field in ScoredField::all() {
        let score = raw
            .confidence_per_field
            .get(field.as_str())
            .copied()
            .unwrap_or(0.0);
        confidence.insert(field, score.clamp(0.0, 1.0));
    }

    ExtractedFields {
        invoice_number: raw.invoice_number,
        invoice_date,
        vendor_name: raw.vendor_name,
        vendor_gstin,
        total_amount: raw.total_amount,
        taxable_amount: raw.taxable_amount,
        cgst_amount: raw.cgst_amount,
        sgst_amount: raw.sgst_amount,
        igst_amount: raw.igst_amount,
        gst_amount: raw.gst_amount,
        hsn_code: raw.hsn_code,
        description: raw.description,
        confidence,
    }
}
