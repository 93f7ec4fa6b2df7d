//! Status command - show how far an invoice has moved through the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Datelike;
use clap::Args;
use console::style;
use uuid::Uuid;

use taxpilot_core::models::config::TaxpilotConfig;
use taxpilot_core::models::invoice::InvoiceStatus;
use taxpilot_core::pipeline::{Pipeline, PipelineSnapshot, StageSnapshot};
use taxpilot_core::store::{InvoiceStore, MemoryStore};

/// Arguments for the status command.
#[derive(Args)]
pub struct StatusArgs {
    /// Ledger snapshot file (JSON)
    #[arg(required = true)]
    ledger: PathBuf,

    /// Invoice to inspect
    #[arg(short, long)]
    invoice: Uuid,

    /// Acting user (default: the owner of the invoice's client)
    #[arg(short, long)]
    user: Option<Uuid>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: super::process::OutputFormat,
}

pub async fn run(args: StatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    // Load configuration
    let config = if let Some(path) = config_path {
        TaxpilotConfig::from_file(std::path::Path::new(path))?
    } else {
        TaxpilotConfig::default()
    };

    let store = Arc::new(super::load_ledger(&args.ledger)?);
    let user_id = super::resolve_user(store.as_ref(), &[args.invoice], args.user).await?;

    let pipeline = Pipeline::new(store.clone(), config)?;
    let snapshot = pipeline.status(args.invoice, user_id).await?;

    match args.format {
        super::process::OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        super::process::OutputFormat::Text => print_snapshot(store.as_ref(), &snapshot).await?,
    }

    Ok(())
}

async fn print_snapshot(store: &MemoryStore, snapshot: &PipelineSnapshot) -> anyhow::Result<()> {
    let number = snapshot.invoice_number.as_deref().unwrap_or("(no number)");
    let status = match snapshot.status {
        InvoiceStatus::Approved => style(snapshot.status.as_str()).green(),
        InvoiceStatus::Rejected => style(snapshot.status.as_str()).red(),
        InvoiceStatus::Review => style(snapshot.status.as_str()).yellow(),
        InvoiceStatus::Pending => style(snapshot.status.as_str()).dim(),
    };

    println!();
    match snapshot.confidence_score {
        Some(score) => println!("Invoice {} ({}, {:.0}% confidence)", number, status, score * 100.0),
        None => println!("Invoice {} ({})", number, status),
    }
    println!();

    print_stage("extraction", &snapshot.extraction);
    print_stage("categorization", &snapshot.categorization);
    print_stage("validation", &snapshot.validation);

    if snapshot.approval.completed {
        let when = snapshot
            .approval
            .approved_at
            .map(|at| at.format(" at %Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        println!("{} {:<15} approved{}", style("✓").green(), "approval", when);
    } else {
        println!("{} {:<15} not approved", style("-").dim(), "approval");
    }

    // Approved invoices show up in the client's monthly rollup.
    if snapshot.status == InvoiceStatus::Approved {
        let invoice = store.invoice(snapshot.invoice_id).await?;
        if let Some(date) = invoice.invoice_date {
            if let Some(summary) = store
                .monthly_summary(invoice.client_id, date.year(), date.month())
                .await?
            {
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

fn print_stage(name: &str, stage: &StageSnapshot) {
    if stage.completed {
        let confidence = stage
            .confidence
            .map(|c| format!(" ({:.0}%)", c * 100.0))
            .unwrap_or_default();
        println!("{} {:<15} completed{}", style("✓").green(), name, confidence);
    } else {
        println!("{} {:<15} not run", style("-").dim(), name);
    }
}
