//! Core library for GST invoice decision automation.
//!
//! This crate provides:
//! - Extraction confidence scoring over vendor-supplied field guesses
//! - HSN/SAC categorization with GST rate resolution
//! - GST compliance validation (GSTIN, tax splits, rates, duplicates)
//! - A decision pipeline that approves, queues, or rejects invoices
//! - Approval workflows and a pluggable invoice store

pub mod categorize;
pub mod error;
pub mod extract;
pub mod gst;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod validate;

pub use error::{ExtractionError, Result, StoreError, TaxpilotError};
pub use models::config::TaxpilotConfig;
pub use models::invoice::{Client, ExtractedFields, Invoice, InvoiceStatus, ScoredField};
pub use categorize::{CategorizationResult, InMemoryRateTable, RateTable, Resolver};
pub use extract::{ConfidenceReport, DocumentRef, ExtractionService, RemoteExtractor, score_fields};
pub use pipeline::{BatchOutcome, FinalDecision, Pipeline, PipelineResult, PipelineStatus};
pub use store::{InvoiceStore, MemoryStore, SYSTEM_ACTOR};
pub use validate::{ValidationResult, ValidationStatus, Validator};
