//! GSTIN format and checksum rule.

use crate::gst::gstin;
use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation, Warning};

/// Vendor GSTIN structure and check character.
pub struct GstinFormat;

impl ComplianceRule for GstinFormat {
    fn name(&self) -> &'static str {
        "gstin_format"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.gstin_format
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let raw = ctx.vendor_gstin.as_deref().unwrap_or("").trim();
        if raw.is_empty() {
            return RuleOutcome::new(0.0).with_violation(violation("none", "GSTIN is required"));
        }

        let cleaned = raw.to_uppercase();
        if cleaned.len() != 15 {
            let message = format!("GSTIN must be 15 characters (found {})", cleaned.len());
            return RuleOutcome::new(0.0).with_violation(violation(&cleaned, &message));
        }

        if !gstin::is_well_formed(&cleaned) {
            return RuleOutcome::new(0.3).with_violation(violation(
                &cleaned,
                "GSTIN format is invalid (expected: XX-AAAAA99999-X-Z-X)",
            ));
        }

        if !gstin::checksum_valid(&cleaned) {
            return RuleOutcome::new(0.85).with_warning(Warning {
                rule_name: "GSTIN_CHECKSUM".to_string(),
                field_name: "vendor_gstin".to_string(),
                message: "GSTIN format valid but checksum verification failed".to_string(),
                suggested_value: None,
            });
        }

        RuleOutcome::new(1.0)
    }
}

fn violation(actual: &str, message: &str) -> Violation {
    Violation {
        rule_name: "GSTIN_FORMAT".to_string(),
        severity: Severity::Critical,
        field_name: "vendor_gstin".to_string(),
        expected_value: "15-character GSTIN format".to_string(),
        actual_value: actual.to_string(),
        message: message.to_string(),
    }
}
