//! End-to-end tests for the taxpilot binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::NaiveDate;
use predicates::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use taxpilot_core::{Client, ExtractedFields, Invoice, InvoiceStatus, MemoryStore, ScoredField};

const AS_OF: &str = "2025-08-21";

fn recorded_fields(invoice: &Invoice, confidence: f32) -> ExtractedFields {
    let mut fields = ExtractedFields {
        invoice_number: invoice.invoice_number.clone(),
        invoice_date: invoice.invoice_date,
        vendor_name: invoice.vendor_name.clone(),
        vendor_gstin: invoice.vendor_gstin.clone(),
        hsn_code: invoice.hsn_code.clone(),
        description: Some("Laptop computers".to_string()),
        total_amount: Some(invoice.total_amount),
        taxable_amount: invoice.taxable_amount,
        gst_amount: Some(invoice.gst_amount),
        cgst_amount: Some(invoice.cgst_amount),
        sgst_amount: Some(invoice.sgst_amount),
        ..Default::default()
    };
    for field in ScoredField::all() {
        fields.confidence.insert(field, confidence);
    }
    fields
}

fn invoice_with(
    client_id: Uuid,
    number: &str,
    date: (i32, u32, u32),
    taxable: i64,
    recorded: bool,
) -> Invoice {
    let gst = taxable * 18 / 100;
    let mut invoice = Invoice::new(Uuid::new_v4(), client_id, Decimal::from(taxable + gst));
    invoice.invoice_number = Some(number.to_string());
    invoice.invoice_date = NaiveDate::from_ymd_opt(date.0, date.1, date.2);
    invoice.vendor_name = Some("Acme Traders".to_string());
    invoice.vendor_gstin = Some("27AAPFU0939F1ZV".to_string());
    invoice.hsn_code = Some("8471".to_string());
    invoice.taxable_amount = Some(Decimal::from(taxable));
    invoice.gst_amount = Decimal::from(gst);
    invoice.cgst_amount = Decimal::from(gst / 2);
    invoice.sgst_amount = Decimal::from(gst / 2);
    invoice.document_uri = Some(format!("uploads/{}.pdf", number.to_lowercase()));
    if recorded {
        invoice.extracted = Some(recorded_fields(&invoice, 0.98));
    }
    invoice
}

fn sample_client(owner_id: Uuid) -> Client {
    Client {
        id: Uuid::new_v4(),
        owner_id,
        name: "Menon & Associates".to_string(),
        gstin: Some("27AABCU9603R1ZN".to_string()),
        state: Some("Maharashtra".to_string()),
    }
}

/// One client, one fully recorded invoice ready to auto-approve.
fn write_ledger(dir: &Path) -> (PathBuf, Uuid) {
    let store = MemoryStore::new();
    let client = sample_client(Uuid::new_v4());
    let invoice = invoice_with(client.id, "INV-2025-0042", (2025, 8, 1), 1000, true);
    let invoice_id = invoice.id;

    store.upsert_client(client).unwrap();
    store.upsert_invoice(invoice).unwrap();

    let path = dir.join("ledger.json");
    store.save(&path).unwrap();
    (path, invoice_id)
}

fn taxpilot() -> Command {
    Command::cargo_bin("taxpilot").unwrap()
}

#[test]
fn test_process_reports_decision() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, invoice_id) = write_ledger(dir.path());

    taxpilot()
        .args([
            "process",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
            "--as-of",
            AS_OF,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Decision: auto_approved"))
        .stdout(predicate::str::contains("Invoice status: approved"))
        .stdout(predicate::str::contains("rollup: 1 invoice(s) approved"));
}

#[test]
fn test_process_save_persists_decision() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, invoice_id) = write_ledger(dir.path());

    taxpilot()
        .args([
            "process",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
            "--as-of",
            AS_OF,
            "--save",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ledger updated"));

    let reloaded = MemoryStore::load(&ledger).unwrap();
    let snapshot = reloaded.snapshot().unwrap();
    assert_eq!(snapshot.invoices.len(), 1);
    assert_eq!(snapshot.invoices[0].status, InvoiceStatus::Approved);
    assert!(snapshot.invoices[0].review_notes.is_some());
}

#[test]
fn test_process_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, invoice_id) = write_ledger(dir.path());

    taxpilot()
        .args([
            "process",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
            "--as-of",
            AS_OF,
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"final_decision\": \"auto_approved\""))
        .stdout(predicate::str::contains("\"aggregate_confidence\": 0.98"));
}

#[test]
fn test_missing_ledger_fails() {
    taxpilot()
        .args([
            "process",
            "no-such-ledger.json",
            "--invoice",
            &Uuid::new_v4().to_string(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Ledger file not found"));
}

#[test]
fn test_batch_processes_all_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let client = sample_client(Uuid::new_v4());
    let first = invoice_with(client.id, "INV-2025-0042", (2025, 8, 1), 1000, true);
    let second = invoice_with(client.id, "INV-2025-0057", (2025, 8, 10), 2000, true);

    store.upsert_client(client).unwrap();
    store.upsert_invoice(first).unwrap();
    store.upsert_invoice(second).unwrap();

    let ledger = dir.path().join("ledger.json");
    store.save(&ledger).unwrap();
    let report = dir.path().join("report.csv");

    taxpilot()
        .args([
            "batch",
            ledger.to_str().unwrap(),
            "--as-of",
            AS_OF,
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 invoice(s)"))
        .stdout(predicate::str::contains("2 auto-approved, 0 need review, 0 rejected"));

    let csv = std::fs::read_to_string(&report).unwrap();
    assert!(csv.starts_with("invoice_id,invoice_number,decision"));
    assert_eq!(csv.matches("auto_approved").count(), 2);
}

#[test]
fn test_batch_requires_user_across_owners() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let first_client = sample_client(Uuid::new_v4());
    let second_client = sample_client(Uuid::new_v4());
    let first = invoice_with(first_client.id, "INV-2025-0042", (2025, 8, 1), 1000, true);
    let second = invoice_with(second_client.id, "INV-2025-0057", (2025, 8, 10), 2000, true);

    store.upsert_client(first_client).unwrap();
    store.upsert_client(second_client).unwrap();
    store.upsert_invoice(first).unwrap();
    store.upsert_invoice(second).unwrap();

    let ledger = dir.path().join("ledger.json");
    store.save(&ledger).unwrap();

    taxpilot()
        .args(["batch", ledger.to_str().unwrap(), "--as-of", AS_OF])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --user"));
}

#[test]
fn test_status_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let client = sample_client(Uuid::new_v4());
    let invoice = invoice_with(client.id, "INV-2025-0042", (2025, 8, 1), 1000, false);
    let invoice_id = invoice.id;

    store.upsert_client(client).unwrap();
    store.upsert_invoice(invoice).unwrap();

    let ledger = dir.path().join("ledger.json");
    store.save(&ledger).unwrap();

    taxpilot()
        .args([
            "status",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoice INV-2025-0042 (pending)"))
        .stdout(predicate::str::contains("not run"))
        .stdout(predicate::str::contains("not approved"));
}

#[test]
fn test_status_after_saved_run() {
    let dir = tempfile::tempdir().unwrap();
    let (ledger, invoice_id) = write_ledger(dir.path());

    taxpilot()
        .args([
            "process",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
            "--as-of",
            AS_OF,
            "--save",
        ])
        .assert()
        .success();

    taxpilot()
        .args([
            "status",
            ledger.to_str().unwrap(),
            "--invoice",
            &invoice_id.to_string(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("approved"))
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_config_path_prints_location() {
    taxpilot()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file:"));
}
