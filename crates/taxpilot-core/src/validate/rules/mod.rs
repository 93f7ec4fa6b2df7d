//! Compliance rules for GST invoices.
//!
//! Each rule is independent: it reads one [`RuleContext`], produces a score
//! in `[0, 1]`, and reports findings as data. Rules never abort validation.

pub mod amounts;
pub mod dates;
pub mod duplicates;
pub mod gstin;
pub mod hsn;
pub mod number;
pub mod patterns;
pub mod rate;
pub mod state;
pub mod tax_split;

pub use amounts::AmountCalculation;
pub use dates::DateValid;
pub use duplicates::DuplicateCheck;
pub use gstin::GstinFormat;
pub use hsn::HsnConsistency;
pub use number::NumberFormat;
pub use rate::RateValid;
pub use state::StateCode;
pub use tax_split::TaxSplit;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::categorize::RateEntry;
use crate::models::config::ValidationConfig;

use super::duplicate::DuplicateCheckResult;

/// Violation severity. A single critical violation fails validation
/// outright regardless of the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Major => "major",
            Severity::Minor => "minor",
        }
    }
}

/// A failed compliance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub rule_name: String,

    pub severity: Severity,

    pub field_name: String,

    pub expected_value: String,

    pub actual_value: String,

    pub message: String,
}

/// A non-blocking observation attached to the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub rule_name: String,

    pub field_name: String,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<String>,
}

/// Everything a rule needs to evaluate one invoice.
///
/// Field values are the merged view of stored and extracted data.
/// History-dependent inputs (the duplicate check, the rate table entry
/// for the invoice's HSN code) are resolved before rules run, so every
/// rule is a pure function of this context.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub invoice_number: Option<String>,

    pub invoice_date: Option<NaiveDate>,

    pub vendor_gstin: Option<String>,

    /// Two-digit state prefix of the vendor GSTIN, when usable.
    pub vendor_state_code: Option<String>,

    /// Two-digit state prefix of the owning client's GSTIN.
    pub client_state_code: Option<String>,

    pub total_amount: Decimal,

    pub taxable_amount: Decimal,

    pub cgst_amount: Decimal,

    pub sgst_amount: Decimal,

    pub igst_amount: Decimal,

    pub hsn_code: Option<String>,

    /// Effective GST rate in percent, `tax / taxable * 100`.
    pub effective_rate: Decimal,

    /// Tolerance when comparing rates against canonical values.
    pub rate_tolerance: Decimal,

    /// Rate table entry for the invoice's HSN code, if it resolved.
    pub hsn_entry: Option<RateEntry>,

    /// Pre-computed duplicate findings.
    pub duplicate: DuplicateCheckResult,

    /// Date the age checks are relative to.
    pub as_of: NaiveDate,
}

/// Score and findings from one rule.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// Rule confidence in `[0, 1]`.
    pub score: f32,

    pub violation: Option<Violation>,

    pub warning: Option<Warning>,
}

impl RuleOutcome {
    pub fn new(score: f32) -> Self {
        Self {
            score,
            violation: None,
            warning: None,
        }
    }

    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.violation = Some(violation);
        self
    }

    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warning = Some(warning);
        self
    }
}

/// One independent compliance check.
pub trait ComplianceRule: Send + Sync {
    /// Stable identifier, also the key in the per-rule score map.
    fn name(&self) -> &'static str;

    /// Weight of this rule in the overall confidence.
    fn weight(&self, config: &ValidationConfig) -> f32;

    /// Evaluate the rule against one invoice.
    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome;
}

/// The standard nine-rule registry, in evaluation order.
pub fn registry() -> Vec<Box<dyn ComplianceRule>> {
    vec![
        Box::new(GstinFormat),
        Box::new(StateCode),
        Box::new(RateValid),
        Box::new(AmountCalculation),
        Box::new(TaxSplit),
        Box::new(DateValid),
        Box::new(NumberFormat),
        Box::new(HsnConsistency),
        Box::new(DuplicateCheck),
    ]
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// A context that passes every rule, for tests to vary one field at a time.
    pub fn passing_context() -> RuleContext {
        RuleContext {
            invoice_number: Some("INV-2025-0042".to_string()),
            invoice_date: NaiveDate::from_ymd_opt(2025, 8, 1),
            vendor_gstin: Some("27AAPFU0939F1ZV".to_string()),
            vendor_state_code: Some("27".to_string()),
            client_state_code: Some("27".to_string()),
            total_amount: Decimal::from(1180),
            taxable_amount: Decimal::from(1000),
            cgst_amount: Decimal::from(90),
            sgst_amount: Decimal::from(90),
            igst_amount: Decimal::ZERO,
            hsn_code: Some("8471".to_string()),
            effective_rate: Decimal::from(18),
            rate_tolerance: Decimal::new(5, 1),
            hsn_entry: Some(RateEntry {
                hsn_code: "8471".to_string(),
                category: "Electronics".to_string(),
                description: "Automatic data processing machines".to_string(),
                gst_rate: Decimal::from(18),
                is_exempt: false,
                exemption_reason: None,
            }),
            duplicate: DuplicateCheckResult::clean(),
            as_of: NaiveDate::from_ymd_opt(2025, 8, 21).unwrap(),
        }
    }
}
