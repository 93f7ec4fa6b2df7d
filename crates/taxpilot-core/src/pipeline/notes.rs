//! Review-notes rendering.
//!
//! Every decision writes a plain-text summary onto the invoice so a
//! reviewer can see what the pipeline did without digging through logs:
//! a headline for the decision, one line per stage, then numbered
//! violations and warnings from validation.

use std::fmt::Write;

use crate::validate::ValidationResult;

use super::stage::{FinalDecision, StageResult, StageSet, StageStatus};

/// Render the notes stored on the invoice for a decision.
pub(crate) fn review_notes(
    decision: FinalDecision,
    stages: &StageSet,
    aggregate: f32,
    validation: Option<&ValidationResult>,
) -> String {
    let mut notes = String::new();

    let fallback = format!("aggregate confidence {}", percent(aggregate));
    let reason = validation.map(|v| v.reason.as_str()).unwrap_or(&fallback);
    match decision {
        FinalDecision::AutoApproved => {
            let _ = writeln!(notes, "Auto-approved: {fallback}");
        }
        FinalDecision::Rejected => {
            let _ = writeln!(notes, "REJECTED: {reason}");
        }
        _ => {
            let _ = writeln!(notes, "MANUAL REVIEW REQUIRED: {reason}");
        }
    }

    notes.push('\n');
    notes.push_str(&stage_line("extraction", &stages.extraction));
    notes.push_str(&stage_line("categorization", &stages.categorization));
    notes.push_str(&stage_line("validation", &stages.validation));

    if let Some(validation) = validation {
        if !validation.violations.is_empty() {
            notes.push_str("\nViolations:\n");
            for (i, violation) in validation.violations.iter().enumerate() {
                let _ = writeln!(
                    notes,
                    "{}. [{}] {}",
                    i + 1,
                    violation.severity.as_str().to_uppercase(),
                    violation.message
                );
            }
        }
        if !validation.warnings.is_empty() {
            notes.push_str("\nWarnings:\n");
            for (i, warning) in validation.warnings.iter().enumerate() {
                let _ = writeln!(notes, "{}. {}", i + 1, warning.message);
            }
        }
    }

    notes.trim_end().to_string()
}

fn stage_line(name: &str, stage: &StageResult) -> String {
    if stage.status == StageStatus::Skipped {
        return format!("- {name}: skipped\n");
    }
    let mark = if stage.success { '✓' } else { '✗' };
    let mut line = format!(
        "{} {}: {} ({} confidence)",
        mark,
        name,
        stage.status.as_str(),
        percent(stage.confidence)
    );
    if let Some(error) = &stage.error {
        let _ = write!(line, " - {error}");
    }
    line.push('\n');
    line
}

fn percent(confidence: f32) -> String {
    format!("{:.0}%", confidence * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{Severity, Violation, Warning};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn stages(validation_status: StageStatus, validation_ok: bool) -> StageSet {
        StageSet {
            extraction: StageResult::completed(0.92, 10),
            categorization: StageResult::completed(0.95, 2),
            validation: StageResult {
                success: validation_ok,
                confidence: 0.84,
                status: validation_status,
                error: None,
                duration_ms: 3,
            },
            approval: StageResult::pending(),
        }
    }

    fn validation_fixture() -> ValidationResult {
        ValidationResult {
            invoice_id: Uuid::new_v4(),
            is_valid: true,
            overall_confidence: 0.84,
            rule_scores: HashMap::new(),
            violations: vec![Violation {
                rule_name: "DUPLICATE_INVOICE".to_string(),
                severity: Severity::Major,
                field_name: "invoice_number".to_string(),
                expected_value: "Unique invoice".to_string(),
                actual_value: "INV-42".to_string(),
                message: "Potential duplicate: same vendor and amount".to_string(),
            }],
            warnings: vec![Warning {
                rule_name: "DATE_OLD".to_string(),
                field_name: "invoice_date".to_string(),
                message: "Invoice is 120 days old".to_string(),
                suggested_value: None,
            }],
            duplicate_info: None,
            status: crate::validate::ValidationStatus::Review,
            reason: "Potential duplicate: same vendor and amount".to_string(),
        }
    }

    #[test]
    fn test_review_notes_layout() {
        let notes = review_notes(
            FinalDecision::NeedsReview,
            &stages(StageStatus::Review, false),
            0.88,
            Some(&validation_fixture()),
        );

        let expected = "\
MANUAL REVIEW REQUIRED: Potential duplicate: same vendor and amount

✓ extraction: completed (92% confidence)
✓ categorization: completed (95% confidence)
✗ validation: review (84% confidence)

Violations:
1. [MAJOR] Potential duplicate: same vendor and amount

Warnings:
1. Invoice is 120 days old";
        assert_eq!(notes, expected);
    }

    #[test]
    fn test_auto_approved_notes_use_aggregate() {
        let notes = review_notes(
            FinalDecision::AutoApproved,
            &stages(StageStatus::Pass, true),
            0.97,
            None,
        );

        assert!(notes.starts_with("Auto-approved: aggregate confidence 97%"));
        assert!(notes.contains("✓ validation: pass (84% confidence)"));
        assert!(!notes.contains("Violations:"));
    }

    #[test]
    fn test_skipped_stage_line() {
        let mut set = stages(StageStatus::Pass, true);
        set.categorization = StageResult::skipped();

        let notes = review_notes(FinalDecision::NeedsReview, &set, 0.9, None);
        assert!(notes.contains("- categorization: skipped\n"));
    }

    #[test]
    fn test_rejected_notes_fall_back_to_aggregate() {
        let mut set = stages(StageStatus::Fail, false);
        set.validation = StageResult::skipped();

        let notes = review_notes(FinalDecision::Rejected, &set, 0.42, None);
        assert!(notes.starts_with("REJECTED: aggregate confidence 42%"));
    }

    #[test]
    fn test_failed_stage_line_carries_error() {
        let mut set = stages(StageStatus::Pass, true);
        set.categorization = StageResult::failed("storage offline", 5);

        let notes = review_notes(FinalDecision::NeedsReview, &set, 0.7, None);
        assert!(notes.contains("✗ categorization: failed (0% confidence) - storage offline"));
    }
}
