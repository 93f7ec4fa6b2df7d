//! Weighted confidence scoring over extracted fields.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::config::ScoringConfig;
use crate::models::invoice::{ExtractedFields, ScoredField};

/// Decision tier for one extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    AutoApprove,
    Review,
    Reject,
}

impl ScoreTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreTier::AutoApprove => "auto_approve",
            ScoreTier::Review => "review",
            ScoreTier::Reject => "reject",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scoring one set of extracted fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Weighted average over all scored fields, rounded to 2 decimals.
    pub overall_score: f32,

    /// The per-field scores that fed the average.
    pub field_scores: HashMap<ScoredField, f32>,

    pub tier: ScoreTier,

    pub reason: String,
}

/// Round a confidence to 2 decimals.
pub(crate) fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Score extracted fields with the configured weights.
///
/// Pure function: missing confidence keys degrade to 0 and nothing here can
/// fail. The tier is decided on the unrounded score; the reported score is
/// rounded to 2 decimals.
pub fn score_fields(fields: &ExtractedFields, config: &ScoringConfig) -> ConfidenceReport {
    let w = &config.weights;

    let weight_of = |field: ScoredField| -> f32 {
        match field {
            ScoredField::VendorGstin => w.vendor_gstin,
            ScoredField::TotalAmount => w.total_amount,
            ScoredField::GstAmount => w.gst_amount,
            ScoredField::HsnCode => w.hsn_code,
            ScoredField::VendorName => w.vendor_name,
            ScoredField::InvoiceNumber => w.invoice_number,
            ScoredField::InvoiceDate => w.invoice_date,
        }
    };

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for field in ScoredField::all() {
        weighted_sum += fields.confidence_for(field) * weight_of(field);
        weight_total += weight_of(field);
    }

    let overall = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };

    let mut tier = ScoreTier::Review;
    let mut reason = "Manual review required".to_string();

    if overall >= config.auto_approve_threshold {
        tier = ScoreTier::AutoApprove;
        reason = format!(
            "High confidence extraction ({:.0}%+)",
            config.auto_approve_threshold * 100.0
        );
    } else if overall < config.reject_threshold {
        tier = ScoreTier::Reject;
        reason = format!(
            "Low confidence extraction (<{:.0}%). Client clarification needed.",
            config.reject_threshold * 100.0
        );
    }

    // Critical fields override the aggregate, unless already rejected
    let critical_low = [
        ScoredField::VendorGstin,
        ScoredField::TotalAmount,
        ScoredField::GstAmount,
    ]
    .iter()
    .any(|f| fields.confidence_for(*f) < config.critical_field_floor);

    if tier != ScoreTier::Reject && critical_low {
        tier = ScoreTier::Review;
        reason = "Critical field(s) have low confidence - requires admin review".to_string();
    }

    debug!(score = overall, tier = %tier, "scored extracted fields");

    ConfidenceReport {
        overall_score: round2(overall),
        field_scores: fields.confidence.clone(),
        tier,
        reason,
    }
}

/// Human-readable label for a confidence score.
pub fn confidence_label(score: f32) -> &'static str {
    if score >= 0.95 {
        "Very High"
    } else if score >= 0.85 {
        "High"
    } else if score >= 0.75 {
        "Medium"
    } else if score >= 0.60 {
        "Low"
    } else {
        "Very Low"
    }
}

/// One-line assessment of weak fields, for review notes and CLI display.
pub fn detailed_assessment(fields: &ExtractedFields) -> String {
    let mut issues: Vec<&str> = Vec::new();

    if fields.confidence_for(ScoredField::VendorGstin) < 0.80 {
        issues.push("Vendor GSTIN confidence is low");
    }
    if fields.confidence_for(ScoredField::TotalAmount) < 0.80 {
        issues.push("Total amount extraction uncertain");
    }
    if fields.confidence_for(ScoredField::GstAmount) < 0.80 {
        issues.push("GST amount confidence is low");
    }
    if fields.confidence_for(ScoredField::HsnCode) < 0.80 {
        issues.push("HSN code could not be extracted clearly");
    }
    if fields.confidence_for(ScoredField::InvoiceDate) < 0.70 {
        issues.push("Invoice date may be incorrect");
    }

    if issues.is_empty() {
        "All critical fields extracted with good confidence".to_string()
    } else {
        issues.join("; ")
    }
}
