//! Amount reconciliation rule.

use rust_decimal::Decimal;

use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation, Warning};

/// Total must equal taxable plus the tax components.
///
/// Confidence degrades through the tolerance bands 0 / ±1 / ±10 / ±100;
/// anything past rounding tolerance is a critical mismatch.
pub struct AmountCalculation;

impl ComplianceRule for AmountCalculation {
    fn name(&self) -> &'static str {
        "amount_calculation"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.amount_calculation
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let expected = ctx.taxable_amount + ctx.cgst_amount + ctx.sgst_amount + ctx.igst_amount;
        let difference = (ctx.total_amount - expected).abs();

        if difference.is_zero() {
            return RuleOutcome::new(1.0);
        }

        if difference <= Decimal::ONE {
            return RuleOutcome::new(0.95).with_warning(Warning {
                rule_name: "AMOUNT_ROUNDING".to_string(),
                field_name: "total_amount".to_string(),
                message: format!("Minor rounding difference of ₹{difference:.2}"),
                suggested_value: None,
            });
        }

        let (score, message) = if difference <= Decimal::TEN {
            (
                0.70,
                format!(
                    "Amount mismatch: ₹{:.2} vs expected ₹{:.2} (diff: ₹{:.2})",
                    ctx.total_amount, expected, difference
                ),
            )
        } else if difference <= Decimal::ONE_HUNDRED {
            (0.40, format!("Significant amount mismatch: ₹{difference:.2}"))
        } else {
            (0.0, format!("Critical amount mismatch: ₹{difference:.2}"))
        };

        RuleOutcome::new(score).with_violation(Violation {
            rule_name: "AMOUNT_MISMATCH".to_string(),
            severity: Severity::Critical,
            field_name: "total_amount".to_string(),
            expected_value: format!("₹{expected:.2}"),
            actual_value: format!("₹{:.2}", ctx.total_amount),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::rules::testutil::passing_context;
    use pretty_assertions::assert_eq;

    fn with_total(total: Decimal) -> RuleContext {
        let mut ctx = passing_context();
        ctx.total_amount = total;
        ctx
    }

    #[test]
    fn test_exact_total_passes() {
        let outcome = AmountCalculation.evaluate(&passing_context());
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.violation.is_none());
    }

    #[test]
    fn test_rounding_difference_warns_only() {
        let outcome = AmountCalculation.evaluate(&with_total(Decimal::new(118050, 2)));

        assert_eq!(outcome.score, 0.95);
        assert!(outcome.violation.is_none());
        assert_eq!(
            outcome.warning.unwrap().message,
            "Minor rounding difference of ₹0.50"
        );
    }

    #[test]
    fn test_confidence_non_increasing_with_difference() {
        // Expected total is 1180; step through the tolerance bands
        let totals = [
            Decimal::from(1180),
            Decimal::new(118050, 2),
            Decimal::from(1185),
            Decimal::from(1230),
            Decimal::from(1680),
        ];

        let scores: Vec<f32> = totals
            .iter()
            .map(|total| AmountCalculation.evaluate(&with_total(*total)).score)
            .collect();

        assert_eq!(scores, vec![1.0, 0.95, 0.70, 0.40, 0.0]);
        assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn test_mismatch_beyond_rounding_is_critical() {
        let outcome = AmountCalculation.evaluate(&with_total(Decimal::from(1330)));

        assert_eq!(outcome.score, 0.0);
        let violation = outcome.violation.unwrap();
        assert_eq!(violation.severity, Severity::Critical);
        assert_eq!(violation.message, "Critical amount mismatch: ₹150.00");
    }
}
