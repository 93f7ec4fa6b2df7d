//! Batch command - run the decision pipeline over many invoices.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use taxpilot_core::models::config::TaxpilotConfig;
use taxpilot_core::models::invoice::InvoiceStatus;
use taxpilot_core::pipeline::{Pipeline, PipelineResult};
use taxpilot_core::store::MemoryStore;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Ledger snapshot file (JSON)
    #[arg(required = true)]
    ledger: PathBuf,

    /// Invoices to process (default: every pending invoice in the ledger)
    #[arg(short, long = "invoice")]
    invoices: Vec<Uuid>,

    /// Acting user (default: the single owner of the selected invoices)
    #[arg(short, long)]
    user: Option<Uuid>,

    /// Reference date for invoice-age checks (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    as_of: Option<NaiveDate>,

    /// Write a per-invoice CSV report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the updated ledger back to the snapshot file
    #[arg(long)]
    save: bool,
}

/// One row of the CSV report.
#[derive(Serialize)]
struct ReportRow {
    invoice_id: Uuid,
    invoice_number: String,
    decision: &'static str,
    invoice_status: &'static str,
    pipeline_status: &'static str,
    aggregate_confidence: f32,
    extraction_confidence: f32,
    categorization_confidence: f32,
    validation_confidence: f32,
    processing_time_ms: u64,
    errors: String,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Load configuration
    let config = if let Some(path) = config_path {
        TaxpilotConfig::from_file(std::path::Path::new(path))?
    } else {
        TaxpilotConfig::default()
    };

    let store = Arc::new(super::load_ledger(&args.ledger)?);

    // Explicit --invoice flags win; otherwise take every pending invoice.
    let ids: Vec<Uuid> = if args.invoices.is_empty() {
        store
            .snapshot()?
            .invoices
            .iter()
            .filter(|invoice| invoice.status == InvoiceStatus::Pending)
            .map(|invoice| invoice.id)
            .collect()
    } else {
        args.invoices.clone()
    };

    if ids.is_empty() {
        anyhow::bail!("No pending invoices in {}", args.ledger.display());
    }

    println!(
        "{} Found {} invoice(s) to process",
        style("ℹ").blue(),
        ids.len()
    );

    let user_id = super::resolve_user(store.as_ref(), &ids, args.user).await?;
    info!("Processing batch of {} as user {}", ids.len(), user_id);

    let mut pipeline = Pipeline::new(store.clone(), config)?;
    if let Some(as_of) = args.as_of {
        pipeline = pipeline.with_reference_date(as_of);
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Processing {} invoice(s)...", ids.len()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let outcome = pipeline.process_batch(&ids, user_id).await?;

    pb.finish_and_clear();

    if let Some(report_path) = &args.report {
        write_report(report_path, store.as_ref(), &outcome.results).await?;
        println!(
            "{} Report written to {}",
            style("✓").green(),
            report_path.display()
        );
    }

    // Print summary
    let summary = &outcome.summary;
    println!();
    println!(
        "{} Processed {} invoice(s) in {:?}",
        style("✓").green(),
        summary.total,
        start.elapsed()
    );
    println!(
        "   {} auto-approved, {} need review, {} rejected",
        style(summary.auto_approved).green(),
        style(summary.needs_review).yellow(),
        style(summary.rejected).red()
    );
    println!(
        "   {} completed, {} partial, {} failed",
        summary.completed, summary.partial, summary.failed
    );
    println!(
        "   Average confidence: {:.0}%",
        summary.average_confidence * 100.0
    );

    let failed: Vec<&PipelineResult> = outcome.results.iter().filter(|r| !r.success).collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed invoices:").red());
        for result in &failed {
            let reason = result
                .errors
                .first()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error");
            println!("  - {}: {}", result.invoice_id, reason);
        }
    }

    if args.save {
        store.save(&args.ledger)?;
        println!(
            "{} Ledger updated: {}",
            style("✓").green(),
            args.ledger.display()
        );
    }

    Ok(())
}

async fn write_report(
    path: &PathBuf,
    store: &MemoryStore,
    results: &[PipelineResult],
) -> anyhow::Result<()> {
    use taxpilot_core::store::InvoiceStore;

    let mut wtr = csv::Writer::from_path(path)?;

    for result in results {
        let invoice_number = match store.invoice(result.invoice_id).await {
            Ok(invoice) => invoice.invoice_number.unwrap_or_default(),
            Err(_) => String::new(),
        };

        let errors = result
            .errors
            .iter()
            .map(|e| format!("[{}] {}", e.stage, e.message))
            .collect::<Vec<_>>()
            .join("; ");

        wtr.serialize(ReportRow {
            invoice_id: result.invoice_id,
            invoice_number,
            decision: result.final_decision.as_str(),
            invoice_status: result.final_status.as_str(),
            pipeline_status: result.pipeline_status.as_str(),
            aggregate_confidence: result.aggregate_confidence,
            extraction_confidence: result.stages.extraction.confidence,
            categorization_confidence: result.stages.categorization.confidence,
            validation_confidence: result.stages.validation.confidence,
            processing_time_ms: result.processing_time_ms,
            errors,
        })?;
    }

    wtr.flush()?;
    Ok(())
}
