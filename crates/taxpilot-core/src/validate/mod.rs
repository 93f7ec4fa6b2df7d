//! Compliance validation for GST invoices.
//!
//! A [`Validator`] runs every registered [`ComplianceRule`] over a merged
//! view of an invoice's stored and extracted fields, weights the per-rule
//! scores into an overall confidence, applies violation penalties, and maps
//! the result onto a pass / review / fail status.
//!
//! Rules are pure: anything that needs history (duplicate candidates) or
//! reference data (the rate table entry) is resolved up front into the
//! [`RuleContext`], so a rule set evaluation is deterministic for a given
//! input and `as_of` date.

pub mod duplicate;
pub mod rules;

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::categorize::RateTable;
use crate::extract::confidence::round2;
use crate::gst::{self, gstin};
use crate::models::config::ValidationConfig;
use crate::models::invoice::{Client, Invoice};

pub use duplicate::{detect, DuplicateCandidate, DuplicateCheckResult, MatchKind};
pub use rules::{
    registry, ComplianceRule, RuleContext, RuleOutcome, Severity, Violation, Warning,
};

/// Final disposition of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Review,
    Fail,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pass => "pass",
            ValidationStatus::Review => "review",
            ValidationStatus::Fail => "fail",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running the full rule set over one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub invoice_id: Uuid,

    /// No critical violations and confidence at or above the review bar.
    pub is_valid: bool,

    /// Weighted rule score after violation penalties, in [0, 1].
    pub overall_confidence: f32,

    /// Per-rule scores, keyed by rule name.
    pub rule_scores: HashMap<String, f32>,

    pub violations: Vec<Violation>,

    pub warnings: Vec<Warning>,

    /// Duplicate findings, absent when validation never ran the rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_info: Option<DuplicateCheckResult>,

    pub status: ValidationStatus,

    /// Human-readable summary shown in review notes.
    pub reason: String,
}

/// Runs the compliance rule set with a given configuration.
pub struct Validator {
    rules: Vec<Box<dyn ComplianceRule>>,
    config: ValidationConfig,
}

impl Validator {
    /// Validator with the standard nine-rule registry.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            rules: rules::registry(),
            config,
        }
    }

    /// Validator with a custom rule set.
    pub fn with_rules(config: ValidationConfig, rules: Vec<Box<dyn ComplianceRule>>) -> Self {
        Self { rules, config }
    }

    /// Run every rule over the invoice and aggregate the outcome.
    ///
    /// `candidates` are the client's non-rejected invoices from the same
    /// vendor, excluding this invoice; `None` means the history could not
    /// be fetched and degrades the duplicate check instead of failing.
    /// `as_of` anchors the date checks.
    pub fn validate(
        &self,
        invoice: &Invoice,
        client: &Client,
        table: &dyn RateTable,
        candidates: Option<&[DuplicateCandidate]>,
        as_of: NaiveDate,
    ) -> ValidationResult {
        let ctx = self.context_for(invoice, client, table, candidates, as_of);

        let mut rule_scores = HashMap::with_capacity(self.rules.len());
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        let mut weighted = 0.0f32;

        for rule in &self.rules {
            let outcome = rule.evaluate(&ctx);
            debug!(
                invoice_id = %invoice.id,
                rule = rule.name(),
                score = outcome.score,
                "rule evaluated"
            );

            weighted += outcome.score * rule.weight(&self.config);
            rule_scores.insert(rule.name().to_string(), outcome.score);
            if let Some(violation) = outcome.violation {
                violations.push(violation);
            }
            if let Some(warning) = outcome.warning {
                warnings.push(warning);
            }
        }

        let mut overall = weighted;
        for violation in &violations {
            match violation.severity {
                Severity::Critical => {
                    overall = 0.0;
                    break;
                }
                Severity::Major => overall = (overall - self.config.major_penalty).max(0.0),
                Severity::Minor => overall = (overall - self.config.minor_penalty).max(0.0),
            }
        }
        let overall = round2(overall.clamp(0.0, 1.0));

        let has_critical = violations
            .iter()
            .any(|v| v.severity == Severity::Critical);
        let is_valid = !has_critical && overall >= self.config.review_threshold;
        let (status, reason) = self.disposition(overall, &violations);

        ValidationResult {
            invoice_id: invoice.id,
            is_valid,
            overall_confidence: overall,
            rule_scores,
            violations,
            warnings,
            duplicate_info: Some(ctx.duplicate),
            status,
            reason,
        }
    }

    /// Result for a validation run that could not execute at all.
    ///
    /// Carries a critical `VALIDATION_ERROR` violation so downstream decision
    /// logic treats the invoice as failed rather than unvalidated.
    pub fn internal_failure(&self, invoice_id: Uuid, message: &str) -> ValidationResult {
        let rule_scores = self
            .rules
            .iter()
            .map(|rule| (rule.name().to_string(), 0.0))
            .collect();

        ValidationResult {
            invoice_id,
            is_valid: false,
            overall_confidence: 0.0,
            rule_scores,
            violations: vec![Violation {
                rule_name: "VALIDATION_ERROR".to_string(),
                severity: Severity::Critical,
                field_name: "system".to_string(),
                expected_value: "Successful validation".to_string(),
                actual_value: message.to_string(),
                message: format!("Validation failed: {message}"),
            }],
            warnings: Vec::new(),
            duplicate_info: None,
            status: ValidationStatus::Fail,
            reason: format!("Validation error: {message}"),
        }
    }

    fn disposition(&self, overall: f32, violations: &[Violation]) -> (ValidationStatus, String) {
        if overall >= self.config.pass_threshold {
            return (
                ValidationStatus::Pass,
                "All validations passed with high confidence".to_string(),
            );
        }

        if overall >= self.config.review_threshold {
            let reason = violations
                .first()
                .map(|v| v.message.clone())
                .unwrap_or_else(|| "Some validations need manual review".to_string());
            return (ValidationStatus::Review, reason);
        }

        let reason = violations
            .iter()
            .find(|v| v.severity == Severity::Critical)
            .map(|v| v.message.clone())
            .unwrap_or_else(|| "Multiple validation failures detected".to_string());
        (ValidationStatus::Fail, reason)
    }

    /// Assemble the rule context from stored fields, extraction output,
    /// reference data and history.
    ///
    /// Stored values win over extracted ones; a stored amount of zero is
    /// treated as unset so extraction can fill it.
    fn context_for(
        &self,
        invoice: &Invoice,
        client: &Client,
        table: &dyn RateTable,
        candidates: Option<&[DuplicateCandidate]>,
        as_of: NaiveDate,
    ) -> RuleContext {
        let extracted = invoice.extracted.clone().unwrap_or_default();

        let invoice_number = invoice.invoice_number.clone().or(extracted.invoice_number);
        let invoice_date = invoice.invoice_date.or(extracted.invoice_date);
        let vendor_gstin = invoice.vendor_gstin.clone().or(extracted.vendor_gstin);
        let hsn_code = invoice.hsn_code.clone().or(extracted.hsn_code);

        let total_amount = merged_amount(invoice.total_amount, extracted.total_amount);
        let gst_amount = merged_amount(invoice.gst_amount, extracted.gst_amount);
        let cgst_amount = merged_amount(invoice.cgst_amount, extracted.cgst_amount);
        let sgst_amount = merged_amount(invoice.sgst_amount, extracted.sgst_amount);
        let igst_amount = merged_amount(invoice.igst_amount, extracted.igst_amount);
        let taxable_amount = invoice
            .taxable_amount
            .or(extracted.taxable_amount)
            .unwrap_or(total_amount - gst_amount);

        // The state prefix is only meaningful on a full-length GSTIN.
        let vendor_state_code = vendor_gstin
            .as_deref()
            .filter(|g| g.len() == 15)
            .and_then(gstin::state_code)
            .map(str::to_string);
        let client_state_code = client
            .gstin
            .as_deref()
            .and_then(gstin::state_code)
            .map(str::to_string);

        let effective_rate = gst::effective_rate(gst_amount, taxable_amount);
        let rate_tolerance =
            Decimal::try_from(self.config.rate_tolerance).unwrap_or(Decimal::new(5, 1));

        let hsn_entry = hsn_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .and_then(|c| table.exact(c));

        let duplicate = match candidates {
            Some(candidates) => duplicate::detect(
                invoice_number.as_deref(),
                invoice_date,
                total_amount,
                candidates,
            ),
            None => DuplicateCheckResult::unavailable(),
        };

        RuleContext {
            invoice_number,
            invoice_date,
            vendor_gstin,
            vendor_state_code,
            client_state_code,
            total_amount,
            taxable_amount,
            cgst_amount,
            sgst_amount,
            igst_amount,
            hsn_code,
            effective_rate,
            rate_tolerance,
            hsn_entry,
            duplicate,
            as_of,
        }
    }
}

/// Label for a validation confidence score.
pub fn validation_label(confidence: f32) -> &'static str {
    if confidence >= 0.95 {
        "Validated"
    } else if confidence >= 0.80 {
        "Needs Review"
    } else if confidence >= 0.60 {
        "Issues Found"
    } else {
        "Failed"
    }
}

fn merged_amount(stored: Decimal, extracted: Option<Decimal>) -> Decimal {
    if stored != Decimal::ZERO {
        stored
    } else {
        extracted.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::InMemoryRateTable;
    use crate::models::invoice::ExtractedFields;
    use pretty_assertions::assert_eq;

    const AS_OF: Option<NaiveDate> = NaiveDate::from_ymd_opt(2025, 8, 21);

    fn passing_invoice() -> (Invoice, Client) {
        let client_id = Uuid::new_v4();

        let mut invoice = Invoice::new(Uuid::new_v4(), client_id, Decimal::from(1180));
        invoice.invoice_number = Some("INV-2025-0042".to_string());
        invoice.invoice_date = NaiveDate::from_ymd_opt(2025, 8, 1);
        invoice.vendor_name = Some("Acme Traders".to_string());
        invoice.vendor_gstin = Some("27AAPFU0939F1ZV".to_string());
        invoice.hsn_code = Some("8471".to_string());
        invoice.taxable_amount = Some(Decimal::from(1000));
        invoice.gst_amount = Decimal::from(180);
        invoice.cgst_amount = Decimal::from(90);
        invoice.sgst_amount = Decimal::from(90);

        let client = Client {
            id: client_id,
            owner_id: Uuid::new_v4(),
            name: "Menon & Associates".to_string(),
            gstin: Some("27AABCU9603R1ZN".to_string()),
            state: Some("Maharashtra".to_string()),
        };

        (invoice, client)
    }

    #[test]
    fn test_clean_invoice_passes() {
        let (invoice, client) = passing_invoice();
        let validator = Validator::new(ValidationConfig::default());

        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            Some(&[]),
            AS_OF.unwrap(),
        );

        assert_eq!(result.overall_confidence, 1.0);
        assert_eq!(result.status, ValidationStatus::Pass);
        assert_eq!(result.reason, "All validations passed with high confidence");
        assert!(result.is_valid);
        assert!(result.violations.is_empty());
        assert_eq!(result.rule_scores.len(), 9);
        assert!(!result.duplicate_info.unwrap().is_duplicate);
    }

    #[test]
    fn test_critical_violation_forces_fail() {
        let (mut invoice, client) = passing_invoice();
        // Intra-state invoice carrying IGST instead of the CGST/SGST split.
        invoice.cgst_amount = Decimal::ZERO;
        invoice.sgst_amount = Decimal::ZERO;
        invoice.igst_amount = Decimal::from(180);

        let validator = Validator::new(ValidationConfig::default());
        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            Some(&[]),
            AS_OF.unwrap(),
        );

        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(!result.is_valid);
        assert_eq!(
            result.reason,
            "Intra-state transaction must use CGST+SGST only (no IGST)"
        );
    }

    #[test]
    fn test_extracted_fields_fill_missing_stored_values() {
        let (mut invoice, client) = passing_invoice();
        invoice.invoice_number = None;
        invoice.vendor_gstin = None;
        invoice.hsn_code = None;
        invoice.gst_amount = Decimal::ZERO;
        invoice.cgst_amount = Decimal::ZERO;
        invoice.sgst_amount = Decimal::ZERO;

        let mut extracted = ExtractedFields::default();
        extracted.invoice_number = Some("INV-2025-0042".to_string());
        extracted.vendor_gstin = Some("27AAPFU0939F1ZV".to_string());
        extracted.hsn_code = Some("8471".to_string());
        extracted.gst_amount = Some(Decimal::from(180));
        extracted.cgst_amount = Some(Decimal::from(90));
        extracted.sgst_amount = Some(Decimal::from(90));
        invoice.extracted = Some(extracted);

        let validator = Validator::new(ValidationConfig::default());
        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            Some(&[]),
            AS_OF.unwrap(),
        );

        assert_eq!(result.status, ValidationStatus::Pass);
        assert_eq!(result.overall_confidence, 1.0);
    }

    #[test]
    fn test_fuzzy_duplicate_lands_in_review() {
        let (invoice, client) = passing_invoice();
        let existing = DuplicateCandidate {
            id: Uuid::new_v4(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: NaiveDate::from_ymd_opt(2025, 8, 4),
            total_amount: Decimal::from(1175),
            vendor_name: invoice.vendor_name.clone(),
        };

        let validator = Validator::new(ValidationConfig::default());
        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            Some(&[existing]),
            AS_OF.unwrap(),
        );

        // weighted 0.9925 (duplicate rule at 0.85), minus the major penalty
        assert_eq!(result.overall_confidence, 0.84);
        assert_eq!(result.status, ValidationStatus::Review);
        assert!(result.is_valid); // no critical violation
        assert!(result.reason.starts_with("Potential duplicate"));
        assert!(result.duplicate_info.unwrap().is_duplicate);
    }

    #[test]
    fn test_exact_duplicate_fails() {
        let (invoice, client) = passing_invoice();
        let existing = DuplicateCandidate {
            id: Uuid::new_v4(),
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date,
            total_amount: invoice.total_amount,
            vendor_name: invoice.vendor_name.clone(),
        };

        let validator = Validator::new(ValidationConfig::default());
        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            Some(&[existing]),
            AS_OF.unwrap(),
        );

        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert!(result.reason.starts_with("Exact duplicate found"));
    }

    #[test]
    fn test_unavailable_history_degrades_duplicate_check() {
        let (invoice, client) = passing_invoice();

        let validator = Validator::new(ValidationConfig::default());
        let result = validator.validate(
            &invoice,
            &client,
            &InMemoryRateTable::builtin(),
            None,
            AS_OF.unwrap(),
        );

        // Everything else is clean, so only the 0.5 duplicate score drags
        // the weighted sum: 1.0 - 0.05 * 0.5 = 0.975.
        assert_eq!(result.overall_confidence, 0.98);
        assert_eq!(result.status, ValidationStatus::Pass);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.rule_name == "DUPLICATE_CHECK_FAILED"));
    }

    #[test]
    fn test_internal_failure_result() {
        let validator = Validator::new(ValidationConfig::default());
        let invoice_id = Uuid::new_v4();

        let result = validator.internal_failure(invoice_id, "storage offline");

        assert_eq!(result.invoice_id, invoice_id);
        assert_eq!(result.status, ValidationStatus::Fail);
        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.reason, "Validation error: storage offline");
        assert!(result.rule_scores.values().all(|s| *s == 0.0));
        assert_eq!(result.rule_scores.len(), 9);

        let violation = &result.violations[0];
        assert_eq!(violation.rule_name, "VALIDATION_ERROR");
        assert_eq!(violation.severity, Severity::Critical);
    }

    #[test]
    fn test_validation_labels() {
        assert_eq!(validation_label(0.98), "Validated");
        assert_eq!(validation_label(0.85), "Needs Review");
        assert_eq!(validation_label(0.65), "Issues Found");
        assert_eq!(validation_label(0.20), "Failed");
    }
}
