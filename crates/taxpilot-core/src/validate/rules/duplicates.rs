//! Duplicate detection rule.
//!
//! Detection itself runs against pre-fetched candidates before the rule set
//! (see [`crate::validate::duplicate`]); this rule folds the result into the
//! weighted score and raises the violation or warning.

use crate::models::config::ValidationConfig;
use crate::validate::duplicate::MatchKind;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation, Warning};

pub struct DuplicateCheck;

impl ComplianceRule for DuplicateCheck {
    fn name(&self) -> &'static str {
        "duplicate_check"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.duplicate_check
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let dup = &ctx.duplicate;
        let outcome = RuleOutcome::new(dup.confidence);

        if dup.is_duplicate {
            let severity = match dup.match_type {
                MatchKind::Exact => Severity::Critical,
                _ => Severity::Major,
            };
            return outcome.with_violation(Violation {
                rule_name: "DUPLICATE_INVOICE".to_string(),
                severity,
                field_name: "invoice_number".to_string(),
                expected_value: "Unique invoice".to_string(),
                actual_value: ctx
                    .invoice_number
                    .clone()
                    .unwrap_or_else(|| "none".to_string()),
                message: dup.reason.clone(),
            });
        }

        if !dup.candidates.is_empty() {
            return outcome.with_warning(Warning {
                rule_name: "POTENTIAL_DUPLICATE".to_string(),
                field_name: "invoice_number".to_string(),
                message: dup.reason.clone(),
                suggested_value: None,
            });
        }

        // A degraded check (history unavailable) scores 0.5 with no
        // candidates; surface that instead of passing silently.
        if dup.confidence < 1.0 {
            return outcome.with_warning(Warning {
                rule_name: "DUPLICATE_CHECK_FAILED".to_string(),
                field_name: "invoice_number".to_string(),
                message: dup.reason.clone(),
                suggested_value: None,
            });
        }

        outcome
    }
}
