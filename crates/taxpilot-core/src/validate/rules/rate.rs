//! Effective GST rate rule.

use rust_decimal::Decimal;

use crate::gst::STANDARD_RATES;
use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation};

/// Effective rate against the canonical GST rate list.
pub struct RateValid;

impl ComplianceRule for RateValid {
    fn name(&self) -> &'static str {
        "gst_rate_valid"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.gst_rate_valid
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let rate = ctx.effective_rate.round_dp(2);

        let canonical = STANDARD_RATES
            .iter()
            .any(|standard| (rate - standard).abs() < ctx.rate_tolerance);
        if canonical {
            return RuleOutcome::new(1.0);
        }

        if rate >= Decimal::ZERO && rate <= Decimal::from(30) {
            let message = format!(
                "GST rate {rate}% is not standard. Valid rates: 0%, 0.25%, 3%, 5%, 12%, 18%, 28%"
            );
            return RuleOutcome::new(0.5).with_violation(violation(rate, &message));
        }

        RuleOutcome::new(0.0).with_violation(violation(rate, &format!("GST rate {rate}% is invalid")))
    }
}

fn violation(rate: Decimal, message: &str) -> Violation {
    Violation {
        rule_name: "GST_RATE_INVALID".to_string(),
        severity: Severity::Major,
        field_name: "gst_rate".to_string(),
        expected_value: "One of: 0%, 0.25%, 3%, 5%, 12%, 18%, 28%".to_string(),
        actual_value: format!("{rate:.2}%"),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::rules::testutil::passing_context;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn test_canonical_rate_passes() {
        let outcome = RateValid.evaluate(&passing_context());
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_rate_within_tolerance_passes() {
        let mut ctx = passing_context();
        // 179.5 GST on 1000 taxable
        ctx.effective_rate = Decimal::new(1795, 2);

        let outcome = RateValid.evaluate(&ctx);
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_nonstandard_rate_in_range() {
        let mut ctx = passing_context();
        ctx.effective_rate = Decimal::from(15);

        let outcome = RateValid.evaluate(&ctx);
        assert_eq!(outcome.score, 0.5);

        let violation = outcome.violation.unwrap();
        assert_eq!(violation.severity, Severity::Major);
        assert!(violation.message.contains("not standard"));
    }

    #[test]
    fn test_rate_out_of_range() {
        let mut ctx = passing_context();
        ctx.effective_rate = Decimal::from(45);

        let outcome = RateValid.evaluate(&ctx);
        assert_eq!(outcome.score, 0.0);
        assert_eq!(
            outcome.violation.unwrap().message,
            "GST rate 45% is invalid"
        );
    }
}
