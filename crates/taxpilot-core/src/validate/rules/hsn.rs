//! HSN / rate consistency rule.

use rust_decimal::Decimal;

use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Warning};

/// Cross-checks the effective GST rate against the rate the invoice's HSN
/// code carries in the rate table. Scores neutrally when the code is absent
/// or unknown so the other rules decide.
pub struct HsnConsistency;

impl ComplianceRule for HsnConsistency {
    fn name(&self) -> &'static str {
        "hsn_rate_consistent"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.hsn_rate_consistent
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        let code = ctx
            .hsn_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let Some(code) = code else {
            return RuleOutcome::new(0.5);
        };
        let Some(entry) = ctx.hsn_entry.as_ref() else {
            return RuleOutcome::new(0.6);
        };

        let rate_diff = (ctx.effective_rate - entry.gst_rate).abs();
        if rate_diff < ctx.rate_tolerance {
            return RuleOutcome::new(1.0);
        }

        if rate_diff <= Decimal::from(5) {
            let message = format!(
                "HSN {} ({}) typically has {}% GST, invoice shows {:.2}%",
                code, entry.category, entry.gst_rate, ctx.effective_rate
            );
            return RuleOutcome::new(0.70).with_warning(warning(message, entry.gst_rate));
        }

        let message = format!(
            "Significant rate mismatch: HSN {} expects {}%, invoice has {:.2}%",
            code, entry.gst_rate, ctx.effective_rate
        );
        RuleOutcome::new(0.40).with_warning(warning(message, entry.gst_rate))
    }
}

fn warning(message: String, table_rate: Decimal) -> Warning {
    Warning {
        rule_name: "HSN_RATE_MISMATCH".to_string(),
        field_name: "hsn_code".to_string(),
        message,
        suggested_value: Some(format!("{table_rate}%")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::rules::testutil::passing_context;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rate_matches_table() {
        let outcome = HsnConsistency.evaluate(&passing_context());
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn test_no_hsn_code_is_neutral() {
        let mut ctx = passing_context();
        ctx.hsn_code = None;
        ctx.hsn_entry = None;

        assert_eq!(HsnConsistency.evaluate(&ctx).score, 0.5);
    }

    #[test]
    fn test_unknown_code_is_neutral() {
        let mut ctx = passing_context();
        ctx.hsn_code = Some("9999".to_string());
        ctx.hsn_entry = None;

        assert_eq!(HsnConsistency.evaluate(&ctx).score, 0.6);
    }

    #[test]
    fn test_small_mismatch_warns() {
        let mut ctx = passing_context();
        ctx.effective_rate = Decimal::from(15); // table says 18

        let outcome = HsnConsistency.evaluate(&ctx);
        assert_eq!(outcome.score, 0.70);

        let warning = outcome.warning.unwrap();
        assert_eq!(
            warning.message,
            "HSN 8471 (Electronics) typically has 18% GST, invoice shows 15.00%"
        );
        assert_eq!(warning.suggested_value.as_deref(), Some("18%"));
    }

    #[test]
    fn test_large_mismatch() {
        let mut ctx = passing_context();
        ctx.effective_rate = Decimal::from(5); // table says 18

        let outcome = HsnConsistency.evaluate(&ctx);
        assert_eq!(outcome.score, 0.40);
        assert_eq!(
            outcome.warning.unwrap().message,
            "Significant rate mismatch: HSN 8471 expects 18%, invoice has 5.00%"
        );
    }
}
