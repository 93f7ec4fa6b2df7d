//! Pipeline orchestration: extract, categorize, validate, decide.
//!
//! [`Pipeline::process`] runs the stages in order for one invoice and
//! applies the decision to the store. Extraction failures are fatal to the
//! run; categorization and approval persistence failures are recoverable
//! and downgrade the run to `partial`. Batches run the same path per
//! invoice with bounded concurrency, and one bad invoice never aborts the
//! others.

mod notes;
mod stage;

pub use stage::{
    ApprovalSnapshot, BatchOutcome, BatchSummary, FinalDecision, PipelineError, PipelineResult,
    PipelineSnapshot, PipelineStatus, StageResult, StageSet, StageSnapshot, StageStatus,
};

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::categorize::{InMemoryRateTable, RateTable, Resolver};
use crate::error::{ExtractionError, Result, TaxpilotError};
use crate::extract::confidence::round2;
use crate::extract::{
    self, DocumentRef, ExtractionService, RecordedExtractor, RemoteExtractor, score_fields,
};
use crate::models::config::{PipelineConfig, TaxpilotConfig};
use crate::models::invoice::{ExtractedFields, Invoice, InvoiceStatus, ScoredField};
use crate::store::{
    self, ActivityEntry, ConfidenceSource, DecisionUpdate, DuplicateQuery, FieldConfidenceRecord,
    InvoiceStore,
};
use crate::validate::{ValidationResult, ValidationStatus, Validator};

/// Aggregate weight of the extraction stage.
const EXTRACTION_WEIGHT: f32 = 0.40;
/// Aggregate weight of the categorization stage.
const CATEGORIZATION_WEIGHT: f32 = 0.20;
/// Aggregate weight of the validation stage.
const VALIDATION_WEIGHT: f32 = 0.40;

/// The invoice decision pipeline.
///
/// Construction wires the stages from configuration: a remote extractor
/// when an endpoint is set (recorded fields otherwise), the standard
/// categorization chain, the full rule set, and the builtin rate table.
pub struct Pipeline {
    store: Arc<dyn InvoiceStore>,
    config: TaxpilotConfig,
    extractor: Option<Box<dyn ExtractionService>>,
    resolver: Resolver,
    validator: Validator,
    table: Box<dyn RateTable>,
    reference_date: Option<NaiveDate>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn InvoiceStore>, config: TaxpilotConfig) -> Result<Self> {
        let extractor: Option<Box<dyn ExtractionService>> = match &config.extractor.endpoint {
            Some(endpoint) => Some(Box::new(RemoteExtractor::new(endpoint, &config.extractor)?)),
            None => None,
        };
        Ok(Self {
            extractor,
            resolver: Resolver::new(),
            validator: Validator::new(config.validation.clone()),
            table: Box::new(InMemoryRateTable::builtin()),
            reference_date: None,
            store,
            config,
        })
    }

    /// Replace the extraction service.
    pub fn with_extractor(mut self, extractor: Box<dyn ExtractionService>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the rate table used for categorization and validation.
    pub fn with_rate_table(mut self, table: Box<dyn RateTable>) -> Self {
        self.table = table;
        self
    }

    /// Pin the date used for invoice-age checks instead of today.
    pub fn with_reference_date(mut self, as_of: NaiveDate) -> Self {
        self.reference_date = Some(as_of);
        self
    }

    fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Run the full pipeline for one invoice on behalf of a user.
    ///
    /// A missing invoice or client, a foreign owner, or a failed decision
    /// write is an error. An extraction failure is returned as a failed
    /// [`PipelineResult`] instead, so batch callers keep their per-invoice
    /// accounting.
    pub async fn process(&self, invoice_id: Uuid, user_id: Uuid) -> Result<PipelineResult> {
        let started = Instant::now();
        let mut stages = StageSet::default();
        let mut errors: Vec<PipelineError> = Vec::new();

        let mut invoice = self.store.invoice(invoice_id).await?;
        let client = self.store.client(invoice.client_id).await?;
        if client.owner_id != user_id {
            return Err(TaxpilotError::Unauthorized(invoice_id));
        }

        info!(invoice_id = %invoice_id, "pipeline started");

        // Stage 1: extraction.
        let extraction_started = Instant::now();
        if self.config.pipeline.skip_extraction {
            if invoice.extracted.is_none() {
                let message = ExtractionError::NoRecordedFields(invoice_id).to_string();
                warn!(invoice_id = %invoice_id, "extraction skipped with no recorded fields");
                stages.extraction = StageResult::failed(message.as_str(), 0);
                errors.push(PipelineError::fatal("extraction", "extraction_error", message));
                return Ok(PipelineResult::failure(
                    invoice_id,
                    stages,
                    errors,
                    elapsed_ms(started),
                ));
            }
            stages.extraction = StageResult::skipped();
        } else {
            match self.run_extraction(&invoice).await {
                Ok(fields) => {
                    let confidence = score_fields(&fields, &self.config.scoring).overall_score;
                    self.store
                        .save_extraction(invoice_id, &fields, confidence)
                        .await?;
                    self.record_field_confidence(invoice_id, &fields).await;
                    invoice.extracted = Some(fields);
                    stages.extraction =
                        StageResult::completed(confidence, elapsed_ms(extraction_started));
                    debug!(invoice_id = %invoice_id, confidence, "extraction completed");
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(invoice_id = %invoice_id, error = %message, "extraction failed");
                    stages.extraction =
                        StageResult::failed(message.as_str(), elapsed_ms(extraction_started));
                    errors.push(PipelineError::fatal("extraction", "extraction_error", message));
                    return Ok(PipelineResult::failure(
                        invoice_id,
                        stages,
                        errors,
                        elapsed_ms(started),
                    ));
                }
            }
        }

        // Stage 2: categorization. Infallible in itself; only the write back
        // to the store can fail, and that failure is recoverable.
        if self.config.pipeline.skip_categorization {
            stages.categorization = StageResult::skipped();
        } else {
            let stage_started = Instant::now();
            let extracted = invoice.extracted.as_ref();
            let hsn_code = extracted
                .and_then(|f| f.hsn_code.as_deref())
                .or(invoice.hsn_code.as_deref());
            let amount = extracted
                .and_then(|f| f.total_amount)
                .unwrap_or(invoice.total_amount);
            let description = extracted
                .and_then(|f| f.description.as_deref())
                .or(invoice.description.as_deref());

            let result =
                self.resolver
                    .resolve(self.table.as_ref(), hsn_code, Some(amount), description);
            let confidence = result.confidence_score;

            match self.store.save_categorization(invoice_id, &result).await {
                Ok(()) => {
                    stages.categorization =
                        StageResult::completed(confidence, elapsed_ms(stage_started));
                    debug!(invoice_id = %invoice_id, confidence, "categorization completed");
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(invoice_id = %invoice_id, error = %message, "categorization was not persisted");
                    stages.categorization =
                        StageResult::failed(message.as_str(), elapsed_ms(stage_started));
                    errors.push(PipelineError::recoverable(
                        "categorization",
                        "categorization_error",
                        message,
                    ));
                }
            }
        }

        // Stage 3: validation. A failed candidate query degrades the
        // duplicate check rather than failing the stage.
        let mut validation_result: Option<ValidationResult> = None;
        if self.config.pipeline.skip_validation {
            stages.validation = StageResult::skipped();
        } else {
            let stage_started = Instant::now();
            let vendor_gstin = invoice.vendor_gstin.clone().or_else(|| {
                invoice
                    .extracted
                    .as_ref()
                    .and_then(|f| f.vendor_gstin.clone())
            });
            let query = DuplicateQuery {
                client_id: invoice.client_id,
                vendor_gstin,
                exclude: invoice_id,
            };
            let candidates = match self.store.duplicate_candidates(&query).await {
                Ok(list) => Some(list),
                Err(e) => {
                    warn!(invoice_id = %invoice_id, error = %e, "duplicate candidate query failed");
                    None
                }
            };

            let result = self.validator.validate(
                &invoice,
                &client,
                self.table.as_ref(),
                candidates.as_deref(),
                self.reference_date(),
            );
            self.record_rule_confidence(invoice_id, &result).await;

            stages.validation = StageResult {
                success: result.status == ValidationStatus::Pass,
                confidence: result.overall_confidence,
                status: StageStatus::from(result.status),
                error: None,
                duration_ms: elapsed_ms(stage_started),
            };
            debug!(
                invoice_id = %invoice_id,
                status = %result.status,
                confidence = result.overall_confidence,
                "validation completed"
            );
            validation_result = Some(result);
        }

        // Stage 4: decision.
        let aggregate = aggregate_confidence(&stages, &self.config.pipeline);
        let approval_started = Instant::now();
        let final_decision;
        let final_status;

        if aggregate >= self.config.pipeline.auto_approve_threshold && stages.validation.success {
            if invoice.status == InvoiceStatus::Approved {
                // A re-run over an already approved invoice stays approved.
                final_decision = FinalDecision::AutoApproved;
                final_status = InvoiceStatus::Approved;
                stages.approval =
                    approval_stage(true, aggregate, StageStatus::AutoApproved, approval_started);
            } else {
                let notes = notes::review_notes(
                    FinalDecision::AutoApproved,
                    &stages,
                    aggregate,
                    validation_result.as_ref(),
                );
                match store::auto_approve(self.store.as_ref(), invoice_id, aggregate, &notes).await
                {
                    Ok(outcome) => {
                        info!(invoice_id = %invoice_id, aggregate, "{}", outcome.message);
                        final_decision = FinalDecision::AutoApproved;
                        final_status = InvoiceStatus::Approved;
                        stages.approval = approval_stage(
                            true,
                            aggregate,
                            StageStatus::AutoApproved,
                            approval_started,
                        );
                    }
                    Err(e) => {
                        let message = e.to_string();
                        warn!(invoice_id = %invoice_id, error = %message, "auto-approval failed, parking in review");
                        errors.push(PipelineError::recoverable(
                            "approval",
                            "approval_error",
                            message.clone(),
                        ));
                        final_decision = FinalDecision::NeedsReview;
                        final_status = InvoiceStatus::Review;
                        stages.approval = StageResult {
                            success: false,
                            confidence: aggregate,
                            status: StageStatus::FailedApproval,
                            error: Some(message),
                            duration_ms: elapsed_ms(approval_started),
                        };
                    }
                }
            }
        } else if aggregate >= self.config.pipeline.review_threshold {
            let notes = notes::review_notes(
                FinalDecision::NeedsReview,
                &stages,
                aggregate,
                validation_result.as_ref(),
            );
            self.store
                .apply_decision(DecisionUpdate {
                    invoice_id,
                    status: InvoiceStatus::Review,
                    confidence_score: Some(aggregate),
                    review_notes: Some(notes),
                    approved_by: None,
                    approved_at: None,
                })
                .await?;
            final_decision = FinalDecision::NeedsReview;
            final_status = InvoiceStatus::Review;
            stages.approval =
                approval_stage(true, aggregate, StageStatus::ReviewRequired, approval_started);
        } else {
            let notes = notes::review_notes(
                FinalDecision::Rejected,
                &stages,
                aggregate,
                validation_result.as_ref(),
            );
            // Low-confidence invoices stay pending so the data can be
            // corrected and the pipeline re-run.
            self.store
                .apply_decision(DecisionUpdate {
                    invoice_id,
                    status: InvoiceStatus::Pending,
                    confidence_score: Some(aggregate),
                    review_notes: Some(notes),
                    approved_by: None,
                    approved_at: None,
                })
                .await?;
            final_decision = FinalDecision::Rejected;
            final_status = InvoiceStatus::Pending;
            stages.approval =
                approval_stage(false, aggregate, StageStatus::LowConfidence, approval_started);
        }

        self.log_pipeline_activity(user_id, &invoice, &stages, aggregate, final_decision, &errors)
            .await;

        let pipeline_status = if errors.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Partial
        };
        let processing_time_ms = elapsed_ms(started);
        info!(
            invoice_id = %invoice_id,
            decision = final_decision.as_str(),
            aggregate,
            elapsed_ms = processing_time_ms,
            "pipeline finished"
        );

        Ok(PipelineResult {
            invoice_id,
            success: true,
            pipeline_status,
            stages,
            aggregate_confidence: aggregate,
            final_decision,
            final_status,
            errors,
            processing_time_ms,
        })
    }

    /// Process a batch of invoices with bounded concurrency.
    ///
    /// Results come back in input order. A run that errors out (missing
    /// invoice, unauthorized) becomes a failed entry rather than aborting
    /// the rest of the batch.
    pub async fn process_batch(&self, invoice_ids: &[Uuid], user_id: Uuid) -> Result<BatchOutcome> {
        let limit = self.config.pipeline.max_batch_size;
        if invoice_ids.len() > limit {
            return Err(TaxpilotError::BatchTooLarge {
                requested: invoice_ids.len(),
                limit,
            });
        }

        info!(count = invoice_ids.len(), "batch processing started");
        let workers = self.config.pipeline.batch_workers.max(1);

        let results: Vec<PipelineResult> = stream::iter(invoice_ids.iter().copied())
            .map(|invoice_id| async move {
                match self.process(invoice_id, user_id).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(invoice_id = %invoice_id, error = %e, "pipeline run failed");
                        PipelineResult::failure(
                            invoice_id,
                            StageSet::default(),
                            vec![PipelineError::fatal(
                                "orchestrator",
                                "pipeline_error",
                                e.to_string(),
                            )],
                            0,
                        )
                    }
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let summary = BatchSummary::of(&results);
        info!(
            total = summary.total,
            completed = summary.completed,
            failed = summary.failed,
            "batch processing finished"
        );
        Ok(BatchOutcome { summary, results })
    }

    /// How far an invoice has moved through the pipeline, reconstructed
    /// from stored data and the activity log.
    pub async fn status(&self, invoice_id: Uuid, user_id: Uuid) -> Result<PipelineSnapshot> {
        let invoice = self.store.invoice(invoice_id).await?;
        let client = self.store.client(invoice.client_id).await?;
        if client.owner_id != user_id {
            return Err(TaxpilotError::Unauthorized(invoice_id));
        }

        let extraction = match &invoice.extracted {
            Some(fields) => StageSnapshot {
                completed: true,
                confidence: Some(score_fields(fields, &self.config.scoring).overall_score),
            },
            None => StageSnapshot::not_run(),
        };
        let categorization = match &invoice.categorization {
            Some(result) => StageSnapshot {
                completed: true,
                confidence: Some(result.confidence_score),
            },
            None => StageSnapshot::not_run(),
        };

        // Validation leaves no trace on the invoice itself; read the last
        // pipeline activity entry instead.
        let activities = self.store.activities(invoice_id).await?;
        let validation = activities
            .iter()
            .rev()
            .find(|a| a.action == "invoice_pipeline_processed")
            .and_then(|a| a.new_values.as_ref())
            .map(|values| {
                let status = values
                    .get("validation_status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("pending");
                let completed = matches!(status, "pass" | "review" | "fail");
                let confidence = values
                    .get("validation_confidence")
                    .and_then(|c| c.as_f64())
                    .map(|c| c as f32)
                    .filter(|_| completed);
                StageSnapshot {
                    completed,
                    confidence,
                }
            })
            .unwrap_or_else(StageSnapshot::not_run);

        Ok(PipelineSnapshot {
            invoice_id,
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.status,
            confidence_score: invoice.confidence_score,
            extraction,
            categorization,
            validation,
            approval: ApprovalSnapshot {
                completed: invoice.status == InvoiceStatus::Approved,
                approved_at: invoice.approved_at,
            },
        })
    }

    async fn run_extraction(&self, invoice: &Invoice) -> extract::Result<ExtractedFields> {
        match &self.extractor {
            Some(service) => {
                let document = DocumentRef::for_invoice(invoice)?;
                self.extract_with_retry(service.as_ref(), &document).await
            }
            None => {
                // Recorded replay needs no document and never retries.
                let document = DocumentRef {
                    invoice_id: invoice.id,
                    uri: invoice.document_uri.clone().unwrap_or_default(),
                };
                RecordedExtractor::new(invoice).extract(&document).await
            }
        }
    }

    async fn extract_with_retry(
        &self,
        service: &dyn ExtractionService,
        document: &DocumentRef,
    ) -> extract::Result<ExtractedFields> {
        let retries = if self.config.pipeline.retry_on_error {
            self.config.pipeline.max_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match service.extract(document).await {
                Ok(fields) => return Ok(fields),
                Err(e) if attempt < retries && retryable(&e) => {
                    attempt += 1;
                    warn!(
                        invoice_id = %document.invoice_id,
                        attempt,
                        error = %e,
                        "extraction attempt failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist one confidence record per extracted field. These are audit
    /// data, so failures are logged and swallowed.
    async fn record_field_confidence(&self, invoice_id: Uuid, fields: &ExtractedFields) {
        let records: Vec<FieldConfidenceRecord> = ScoredField::all()
            .iter()
            .map(|field| FieldConfidenceRecord {
                invoice_id,
                field_name: field.as_str().to_string(),
                confidence_score: fields.confidence_for(*field),
                extracted_value: fields.value_text(*field),
                source: ConfidenceSource::Extraction,
            })
            .collect();
        if let Err(e) = self.store.append_field_confidence(&records).await {
            warn!(invoice_id = %invoice_id, error = %e, "failed to record field confidence");
        }
    }

    /// Persist one confidence record per validation rule, same rules as
    /// [`Self::record_field_confidence`].
    async fn record_rule_confidence(&self, invoice_id: Uuid, validation: &ValidationResult) {
        let records: Vec<FieldConfidenceRecord> = validation
            .rule_scores
            .iter()
            .map(|(rule, score)| FieldConfidenceRecord {
                invoice_id,
                field_name: rule.clone(),
                confidence_score: *score,
                extracted_value: None,
                source: ConfidenceSource::AutoValidation,
            })
            .collect();
        if let Err(e) = self.store.append_field_confidence(&records).await {
            warn!(invoice_id = %invoice_id, error = %e, "failed to record rule confidence");
        }
    }

    async fn log_pipeline_activity(
        &self,
        user_id: Uuid,
        invoice: &Invoice,
        stages: &StageSet,
        aggregate: f32,
        decision: FinalDecision,
        errors: &[PipelineError],
    ) {
        let mut entry = ActivityEntry::new(
            user_id.to_string(),
            invoice.client_id,
            "invoice_pipeline_processed",
            invoice.id,
        );
        entry.new_values = Some(json!({
            "aggregate_confidence": aggregate,
            "final_decision": decision.as_str(),
            "extraction_confidence": stages.extraction.confidence,
            "categorization_confidence": stages.categorization.confidence,
            "validation_confidence": stages.validation.confidence,
            "extraction_status": stages.extraction.status.as_str(),
            "categorization_status": stages.categorization.status.as_str(),
            "validation_status": stages.validation.status.as_str(),
            "error_count": errors.len(),
        }));
        if let Err(e) = self.store.append_activity(entry).await {
            warn!(invoice_id = %invoice.id, error = %e, "failed to log pipeline activity");
        }
    }
}

/// Weighted stage confidence with the decision penalties applied.
///
/// A failed extraction zeroes the aggregate outright. A validation stage
/// that failed to run (as opposed to producing a `fail` verdict) caps the
/// aggregate just below the review threshold so the invoice can never
/// auto-approve on extraction confidence alone. A failed categorization
/// write knocks 10% off.
fn aggregate_confidence(stages: &StageSet, config: &PipelineConfig) -> f32 {
    let mut aggregate = stages.extraction.confidence * EXTRACTION_WEIGHT
        + stages.categorization.confidence * CATEGORIZATION_WEIGHT
        + stages.validation.confidence * VALIDATION_WEIGHT;

    if !stages.extraction.success {
        return 0.0;
    }
    if stages.validation.status == StageStatus::Failed {
        aggregate = aggregate.min(config.review_threshold - 0.01);
    }
    if !stages.categorization.success {
        aggregate *= 0.90;
    }
    round2(aggregate.clamp(0.0, 1.0))
}

fn approval_stage(
    success: bool,
    confidence: f32,
    status: StageStatus,
    started: Instant,
) -> StageResult {
    StageResult {
        success,
        confidence,
        status,
        error: None,
        duration_ms: elapsed_ms(started),
    }
}

fn retryable(error: &ExtractionError) -> bool {
    matches!(
        error,
        ExtractionError::Vendor { .. } | ExtractionError::Transport(_)
    )
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
