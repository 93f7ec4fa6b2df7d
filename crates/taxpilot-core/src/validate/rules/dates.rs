//! Invoice date rule.

use crate::gst::in_current_fiscal_year;
use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation, Warning};

/// Date must exist, must not be in the future, and loses confidence with
/// age. Dates outside the current financial year are capped at 0.60.
pub struct DateValid;

impl ComplianceRule for DateValid {
    fn name(&self) -> &'static str {
        "date_valid"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.date_valid
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let Some(date) = ctx.invoice_date else {
            return RuleOutcome::new(0.0)
                .with_violation(violation("none", "Invoice date is missing"));
        };

        if date > ctx.as_of {
            return RuleOutcome::new(0.0).with_violation(violation(
                &date.to_string(),
                "Invoice date cannot be in the future",
            ));
        }

        let days_old = (ctx.as_of - date).num_days();
        let mut confidence: f32 = if days_old > 180 {
            0.50
        } else if days_old > 90 {
            0.70
        } else if days_old > 30 {
            0.90
        } else {
            1.0
        };

        if !in_current_fiscal_year(date, ctx.as_of) {
            confidence = confidence.min(0.60);
        }

        let mut outcome = RuleOutcome::new(confidence);
        if days_old > 90 {
            outcome = outcome.with_warning(Warning {
                rule_name: "DATE_OLD".to_string(),
                field_name: "invoice_date".to_string(),
                message: format!("Invoice is {days_old} days old"),
                suggested_value: None,
            });
        }
        outcome
    }
}

fn violation(actual: &str, message: &str) -> Violation {
    Violation {
        rule_name: "DATE_INVALID".to_string(),
        severity: Severity::Critical,
        field_name: "invoice_date".to_string(),
        expected_value: "Valid date not in future".to_string(),
        actual_value: actual.to_string(),
        message: message.to_string(),
    }
}
