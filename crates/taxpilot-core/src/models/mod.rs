//! Data models for invoices, clients, and pipeline configuration.

pub mod config;
pub mod invoice;

pub use config::{
    ExtractorConfig, FieldWeights, PipelineConfig, RuleWeights, ScoringConfig, TaxpilotConfig,
    ValidationConfig,
};
pub use invoice::{Client, ExtractedFields, Invoice, InvoiceStatus, ScoredField};
