//! Invoice number format rule.

use crate::models::config::ValidationConfig;

use super::patterns::{INVOICE_NUMBER_ALNUM, INVOICE_NUMBER_STANDARD};
use super::{ComplianceRule, RuleContext, RuleOutcome, Warning};

/// Invoice number shape. Findings are warnings only; an odd number never
/// blocks approval by itself.
pub struct NumberFormat;

impl ComplianceRule for NumberFormat {
    fn name(&self) -> &'static str {
        "invoice_number_format"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.invoice_number_format
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let number = ctx
            .invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let Some(number) = number else {
            return RuleOutcome::new(0.0).with_warning(warning("Invoice number is required"));
        };

        if number.len() < 3 {
            return RuleOutcome::new(0.3).with_warning(warning("Invoice number is too short"));
        }
        if number.len() > 50 {
            return RuleOutcome::new(0.4).with_warning(warning("Invoice number is too long"));
        }

        if INVOICE_NUMBER_STANDARD.is_match(number) {
            return RuleOutcome::new(1.0);
        }
        if INVOICE_NUMBER_ALNUM.is_match(number) {
            return RuleOutcome::new(0.8);
        }

        RuleOutcome::new(0.6).with_warning(warning("Invoice number contains unusual characters"))
    }
}

fn warning(message: &str) -> Warning {
    Warning {
        rule_name: "INVOICE_NUMBER_FORMAT".to_string(),
        field_name: "invoice_number".to_string(),
        message: message.to_string(),
        suggested_value: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::rules::testutil::passing_context;
    use pretty_assertions::assert_eq;

    fn with_number(number: Option<&str>) -> RuleContext {
        let mut ctx = passing_context();
        ctx.invoice_number = number.map(str::to_string);
        ctx
    }

    #[test]
    fn test_standard_format() {
        let outcome = NumberFormat.evaluate(&with_number(Some("INV-2025-0042")));
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn test_acceptable_alphanumeric() {
        let outcome = NumberFormat.evaluate(&with_number(Some("2025/KA/99")));
        assert_eq!(outcome.score, 0.8);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn test_unusual_characters() {
        let outcome = NumberFormat.evaluate(&with_number(Some("INV #42!")));
        assert_eq!(outcome.score, 0.6);
        assert_eq!(
            outcome.warning.unwrap().message,
            "Invoice number contains unusual characters"
        );
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(NumberFormat.evaluate(&with_number(Some("A1"))).score, 0.3);

        let long = "X".repeat(51);
        assert_eq!(NumberFormat.evaluate(&with_number(Some(&long))).score, 0.4);
    }

    #[test]
    fn test_missing_number() {
        let outcome = NumberFormat.evaluate(&with_number(None));
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.warning.unwrap().message, "Invoice number is required");
    }
}
