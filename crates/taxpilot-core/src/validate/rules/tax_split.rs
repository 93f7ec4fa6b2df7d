//! CGST/SGST versus IGST split rule.

use rust_decimal::Decimal;

use crate::gst::{GstSplit, expected_split};
use crate::models::config::ValidationConfig;

use super::{ComplianceRule, RuleContext, RuleOutcome, Severity, Violation};

/// Tax components must match the transaction geography: IGST alone for
/// inter-state supplies, an equal CGST/SGST split for intra-state.
pub struct TaxSplit;

impl ComplianceRule for TaxSplit {
    fn name(&self) -> &'static str {
        "tax_split_correct"
    }

    fn weight(&self, config: &ValidationConfig) -> f32 {
        config.weights.tax_split_correct
    }

    fn evaluate(&self, ctx: &RuleContext) -> RuleOutcome {
        // Geography is unknown without both state prefixes; score neutrally
        // instead of guessing a direction.
        let (Some(vendor), Some(client)) = (
            ctx.vendor_state_code.as_deref(),
            ctx.client_state_code.as_deref(),
        ) else {
            return RuleOutcome::new(1.0);
        };

        let inter_state = vendor != client;
        let split = expected_split(ctx.taxable_amount, ctx.effective_rate, inter_state);

        if inter_state {
            if !ctx.cgst_amount.is_zero() || !ctx.sgst_amount.is_zero() {
                return RuleOutcome::new(0.0).with_violation(violation(
                    true,
                    &split,
                    ctx,
                    "Inter-state transaction must use IGST only (no CGST/SGST)",
                ));
            }

            let diff = (ctx.igst_amount - split.igst).abs();
            if diff <= Decimal::ONE {
                return RuleOutcome::new(if diff.is_zero() { 1.0 } else { 0.95 });
            }

            let message = format!(
                "IGST mismatch: Expected ₹{:.2}, got ₹{:.2}",
                split.igst, ctx.igst_amount
            );
            RuleOutcome::new(0.5).with_violation(violation(true, &split, ctx, &message))
        } else {
            if !ctx.igst_amount.is_zero() {
                return RuleOutcome::new(0.0).with_violation(violation(
                    false,
                    &split,
                    ctx,
                    "Intra-state transaction must use CGST+SGST only (no IGST)",
                ));
            }

            let cgst_diff = (ctx.cgst_amount - split.cgst).abs();
            let sgst_diff = (ctx.sgst_amount - split.sgst).abs();
            if cgst_diff <= Decimal::ONE && sgst_diff <= Decimal::ONE {
                let exact = cgst_diff.is_zero() && sgst_diff.is_zero();
                return RuleOutcome::new(if exact { 1.0 } else { 0.95 });
            }

            let message = format!(
                "CGST/SGST mismatch: Expected ₹{:.2} each, got CGST ₹{:.2}, SGST ₹{:.2}",
                split.cgst, ctx.cgst_amount, ctx.sgst_amount
            );
            RuleOutcome::new(0.5).with_violation(violation(false, &split, ctx, &message))
        }
    }
}

fn violation(inter_state: bool, split: &GstSplit, ctx: &RuleContext, message: &str) -> Violation {
    let (field, expected, actual) = if inter_state {
        (
            "igst_amount",
            format!("IGST: ₹{:.2}", split.igst),
            format!("IGST: ₹{:.2}", ctx.igst_amount),
        )
    } else {
        (
            "cgst_sgst_amount",
            format!("CGST: ₹{:.2}, SGST: ₹{:.2}", split.cgst, split.sgst),
            format!("CGST: ₹{:.2}, SGST: ₹{:.2}", ctx.cgst_amount, ctx.sgst_amount),
        )
    };

    Violation {
        rule_name: "TAX_SPLIT_INCORRECT".to_string(),
        severity: Severity::Critical,
        field_name: field.to_string(),
        expected_value: expected,
        actual_value: actual,
        message: message.to_string(),
    }
}
