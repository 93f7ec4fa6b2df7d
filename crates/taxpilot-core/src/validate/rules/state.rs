//! State-code rule on the GSTIN prefix.

use crate::gst::gstin;
use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation};

/// Known-state check on the vendor GSTIN prefix.
pub struct StateCode;

impl ComplianceRule for StateCode {
    fn name(&self) -> &'static str {
        "state_code_valid"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.state_code_valid
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let Some(code) = ctx.vendor_state_code.as_deref() else {
            return RuleOutcome::new(0.0)
                .with_violation(violation("none", "State code is missing"));
        };

        match gstin::state_name(code) {
            Some(_) => RuleOutcome::new(1.0),
            None => RuleOutcome::new(0.0)
                .with_violation(violation(code, &format!("Invalid state code: {code}"))),
        }
    }
}

fn violation(actual: &str, message: &str) -> Violation {
    Violation {
        rule_name: "STATE_CODE_INVALID".to_string(),
        severity: Severity::Major,
        field_name: "vendor_gstin".to_string(),
        expected_value: "Valid state code (01-38)".to_string(),
        actual_value: actual.to_string(),
        message: message.to_string(),
    }
}
