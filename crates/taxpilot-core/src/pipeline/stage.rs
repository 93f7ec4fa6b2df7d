//! Result types for pipeline runs.
//!
//! A run produces one [`PipelineResult`] with a [`StageResult`] per stage;
//! batches wrap those in a [`BatchOutcome`] with counters. All of these
//! serialize with snake_case status strings so reports stay stable across
//! backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;
use crate::validate::ValidationStatus;

/// Status of a single pipeline stage.
///
/// Extraction and categorization move through `pending`, `completed`,
/// `skipped` and `failed`; validation reports its own verdict
/// (`pass`/`review`/`fail`), and the approval stage reports the decision
/// that was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Completed,
    Skipped,
    Failed,
    Pass,
    Review,
    Fail,
    AutoApproved,
    ReviewRequired,
    LowConfidence,
    FailedApproval,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Completed => "completed",
            StageStatus::Skipped => "skipped",
            StageStatus::Failed => "failed",
            StageStatus::Pass => "pass",
            StageStatus::Review => "review",
            StageStatus::Fail => "fail",
            StageStatus::AutoApproved => "auto_approved",
            StageStatus::ReviewRequired => "review_required",
            StageStatus::LowConfidence => "low_confidence",
            StageStatus::FailedApproval => "failed_approval",
        }
    }
}

impl From<ValidationStatus> for StageStatus {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Pass => StageStatus::Pass,
            ValidationStatus::Review => StageStatus::Review,
            ValidationStatus::Fail => StageStatus::Fail,
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Whether the stage reached an acceptable outcome. For validation
    /// this means the verdict was `pass`, not merely that rules ran.
    pub success: bool,

    /// Stage confidence in `[0, 1]`.
    pub confidence: f32,

    pub status: StageStatus,

    /// Failure detail, present only when something went wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock time the stage took.
    pub duration_ms: u64,
}

impl StageResult {
    /// A stage that has not run (and will not, after a fatal failure).
    pub fn pending() -> Self {
        Self {
            success: false,
            confidence: 0.0,
            status: StageStatus::Pending,
            error: None,
            duration_ms: 0,
        }
    }

    /// A stage disabled by configuration. Skipped stages count as
    /// successful and do not drag the aggregate down.
    pub fn skipped() -> Self {
        Self {
            success: true,
            confidence: 1.0,
            status: StageStatus::Skipped,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn completed(confidence: f32, duration_ms: u64) -> Self {
        Self {
            success: true,
            confidence,
            status: StageStatus::Completed,
            error: None,
            duration_ms,
        }
    }

    pub fn failed(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            confidence: 0.0,
            status: StageStatus::Failed,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

impl Default for StageResult {
    fn default() -> Self {
        Self::pending()
    }
}

/// The four stage results of a run, in execution order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSet {
    pub extraction: StageResult,
    pub categorization: StageResult,
    pub validation: StageResult,
    pub approval: StageResult,
}

/// Overall health of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every stage that ran succeeded.
    Completed,
    /// A decision was reached but at least one recoverable error occurred.
    Partial,
    /// The run stopped before a decision.
    Failed,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Completed => "completed",
            PipelineStatus::Partial => "partial",
            PipelineStatus::Failed => "failed",
        }
    }
}

/// Decision the pipeline took for an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalDecision {
    AutoApproved,
    NeedsReview,
    Rejected,
    Pending,
}

impl FinalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalDecision::AutoApproved => "auto_approved",
            FinalDecision::NeedsReview => "needs_review",
            FinalDecision::Rejected => "rejected",
            FinalDecision::Pending => "pending",
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error collected during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineError {
    /// Stage the error belongs to (`extraction`, `categorization`,
    /// `approval`, or `orchestrator` for run-level failures).
    pub stage: String,

    /// Stable machine-readable error kind.
    pub kind: String,

    pub message: String,

    /// Whether the run continued past this error.
    pub recoverable: bool,
}

impl PipelineError {
    pub fn fatal(stage: &str, kind: &str, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            kind: kind.to_string(),
            message: message.into(),
            recoverable: false,
        }
    }

    pub fn recoverable(stage: &str, kind: &str, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            kind: kind.to_string(),
            message: message.into(),
            recoverable: true,
        }
    }
}

/// Full outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub invoice_id: Uuid,

    /// Whether the run reached a decision at all.
    pub success: bool,

    pub pipeline_status: PipelineStatus,

    pub stages: StageSet,

    /// Weighted confidence across stages, in `[0, 1]`.
    pub aggregate_confidence: f32,

    pub final_decision: FinalDecision,

    /// Invoice status the run left behind in the store.
    pub final_status: InvoiceStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PipelineError>,

    pub processing_time_ms: u64,
}

impl PipelineResult {
    /// Result shape for a run that stopped before reaching a decision.
    pub fn failure(
        invoice_id: Uuid,
        stages: StageSet,
        errors: Vec<PipelineError>,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            invoice_id,
            success: false,
            pipeline_status: PipelineStatus::Failed,
            stages,
            aggregate_confidence: 0.0,
            final_decision: FinalDecision::Rejected,
            final_status: InvoiceStatus::Pending,
            errors,
            processing_time_ms,
        }
    }
}

/// Counters over a batch of runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub partial: usize,
    pub failed: usize,
    pub auto_approved: usize,
    pub needs_review: usize,
    pub rejected: usize,

    /// Mean aggregate confidence across all runs, failures included.
    pub average_confidence: f32,

    pub total_processing_time_ms: u64,
}

impl BatchSummary {
    pub fn of(results: &[PipelineResult]) -> Self {
        let total = results.len();
        let mut summary = Self {
            total,
            completed: 0,
            partial: 0,
            failed: 0,
            auto_approved: 0,
            needs_review: 0,
            rejected: 0,
            average_confidence: 0.0,
            total_processing_time_ms: 0,
        };

        let mut confidence_sum = 0.0f32;
        for result in results {
            match result.pipeline_status {
                PipelineStatus::Completed => summary.completed += 1,
                PipelineStatus::Partial => summary.partial += 1,
                PipelineStatus::Failed => summary.failed += 1,
            }
            match result.final_decision {
                FinalDecision::AutoApproved => summary.auto_approved += 1,
                FinalDecision::NeedsReview => summary.needs_review += 1,
                FinalDecision::Rejected => summary.rejected += 1,
                FinalDecision::Pending => {}
            }
            confidence_sum += result.aggregate_confidence;
            summary.total_processing_time_ms += result.processing_time_ms;
        }

        if total > 0 {
            summary.average_confidence =
                (confidence_sum / total as f32 * 100.0).round() / 100.0;
        }
        summary
    }
}

/// Batch results in input order, plus the rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub results: Vec<PipelineResult>,
}

/// Point-in-time view of how far an invoice has moved through the
/// pipeline, reconstructed from stored data and the activity log.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub invoice_id: Uuid,
    pub invoice_number: Option<String>,
    pub status: InvoiceStatus,
    pub confidence_score: Option<f32>,
    pub extraction: StageSnapshot,
    pub categorization: StageSnapshot,
    pub validation: StageSnapshot,
    pub approval: ApprovalSnapshot,
}

/// Progress of one stage in a [`PipelineSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct StageSnapshot {
    pub completed: bool,
    pub confidence: Option<f32>,
}

impl StageSnapshot {
    pub fn not_run() -> Self {
        Self {
            completed: false,
            confidence: None,
        }
    }
}

/// Approval progress in a [`PipelineSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalSnapshot {
    pub completed: bool,
    pub approved_at: Option<DateTime<Utc>>,
}
