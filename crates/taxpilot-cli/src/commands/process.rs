//! Process command - run the decision pipeline for a single invoice.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use clap::Args;
use console::style;
use tracing::{debug, info};
use uuid::Uuid;

use taxpilot_core::extract::confidence_label;
use taxpilot_core::models::config::TaxpilotConfig;
use taxpilot_core::pipeline::{FinalDecision, Pipeline, PipelineResult, StageResult, StageStatus};
use taxpilot_core::store::{InvoiceStore, MemoryStore};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Ledger snapshot file (JSON)
    #[arg(required = true)]
    ledger: PathBuf,

    /// Invoice to process
    #[arg(short, long)]
    invoice: Uuid,

    /// Acting user (default: the owner of the invoice's client)
    #[arg(short, long)]
    user: Option<Uuid>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Reference date for invoice-age checks (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    as_of: Option<NaiveDate>,

    /// Write the updated ledger back to the snapshot file
    #[arg(long)]
    save: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text report
    Text,
    /// JSON output
    Json,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Load configuration
    let config = if let Some(path) = config_path {
        TaxpilotConfig::from_file(std::path::Path::new(path))?
    } else {
        TaxpilotConfig::default()
    };

    let store = Arc::new(super::load_ledger(&args.ledger)?);
    let user_id = super::resolve_user(store.as_ref(), &[args.invoice], args.user).await?;

    info!("Processing invoice {} as user {}", args.invoice, user_id);

    let mut pipeline = Pipeline::new(store.clone(), config)?;
    if let Some(as_of) = args.as_of {
        pipeline = pipeline.with_reference_date(as_of);
    }

    let result = pipeline.process(args.invoice, user_id).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_report(store.as_ref(), &result).await?,
    }

    if args.save {
        store.save(&args.ledger)?;
        println!(
            "{} Ledger updated: {}",
            style("✓").green(),
            args.ledger.display()
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

async fn print_report(store: &MemoryStore, result: &PipelineResult) -> anyhow::Result<()> {
    println!();
    print_stage("extraction", &result.stages.extraction);
    print_stage("categorization", &result.stages.categorization);
    print_stage("validation", &result.stages.validation);
    print_stage("approval", &result.stages.approval);
    println!();

    let decision = match result.final_decision {
        FinalDecision::AutoApproved => style("auto_approved").green(),
        FinalDecision::NeedsReview => style("needs_review").yellow(),
        _ => style(result.final_decision.as_str()).red(),
    };
    println!(
        "Decision: {} (aggregate confidence {:.0}%)",
        decision,
        result.aggregate_confidence * 100.0
    );
    println!(
        "Confidence: {}",
        styled_label(confidence_label(result.aggregate_confidence))
    );
    println!("Invoice status: {}", result.final_status);

    if !result.errors.is_empty() {
        println!();
        println!("{}", style("Errors:").red());
        for error in &result.errors {
            println!("  - [{}] {}", error.stage, error.message);
        }
    }

    let invoice = store.invoice(result.invoice_id).await?;
    if let Some(notes) = &invoice.review_notes {
        println!();
        for line in notes.lines() {
            println!("  {}", line);
        }
    }

    // Approved invoices land in the client's monthly rollup; echo it back.
    if result.final_decision == FinalDecision::AutoApproved {
        if let Some(date) = invoice.invoice_date {
            let summary = store
                .monthly_summary(invoice.client_id, date.year(), date.month())
                .await?;
            if let Some(summary) = summary {
                println!();
                println!(
                    "{} {:04}-{:02} rollup: {} invoice(s) approved, ₹{} GST",
                    style("ℹ").blue(),
                    summary.year,
                    summary.month,
                    summary.invoices_approved,
                    summary.gst_amount
                );
            }
        }
    }

    Ok(())
}

fn styled_label(label: &'static str) -> console::StyledObject<&'static str> {
    match label {
        "Very High" | "High" => style(label).green(),
        "Medium" => style(label).yellow(),
        _ => style(label).red(),
    }
}

fn print_stage(name: &str, stage: &StageResult) {
    let mark = if stage.status == StageStatus::Skipped {
        style("-").dim()
    } else if stage.success {
        style("✓").green()
    } else {
        style("✗").red()
    };

    let mut line = format!("{} {:<15} {}", mark, name, stage.status);
    if stage.status != StageStatus::Skipped && stage.status != StageStatus::Pending {
        line.push_str(&format!(" ({:.0}%)", stage.confidence * 100.0));
    }
    if let Some(error) = &stage.error {
        line.push_str(&format!(" - {}", error));
    }
    println!("{}", line);
}
