//! Configuration structures for the decision pipeline.

use serde::{Deserialize, Serialize};

/// Main configuration for the taxpilot pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxpilotConfig {
    /// Orchestrator behavior and decision thresholds.
    pub pipeline: PipelineConfig,

    /// Extraction confidence scoring weights and tiers.
    pub scoring: ScoringConfig,

    /// Compliance validation weights, penalties and thresholds.
    pub validation: ValidationConfig,

    /// Extraction service connection.
    pub extractor: ExtractorConfig,
}

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Skip the extraction stage (requires recorded fields).
    pub skip_extraction: bool,

    /// Skip the categorization stage.
    pub skip_categorization: bool,

    /// Skip the validation stage.
    pub skip_validation: bool,

    /// Aggregate confidence at or above which an invoice auto-approves.
    pub auto_approve_threshold: f32,

    /// Aggregate confidence at or above which an invoice goes to review.
    pub review_threshold: f32,

    /// Retry the extraction call on vendor errors.
    pub retry_on_error: bool,

    /// Additional extraction attempts after the first failure.
    pub max_retries: u32,

    /// Largest accepted batch.
    pub max_batch_size: usize,

    /// Invoices processed concurrently within a batch.
    pub batch_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_extraction: false,
            skip_categorization: false,
            skip_validation: false,
            auto_approve_threshold: 0.95,
            review_threshold: 0.80,
            retry_on_error: true,
            max_retries: 2,
            max_batch_size: 50,
            batch_workers: 4,
        }
    }
}

/// Per-field weights for the extraction confidence score.
///
/// The defaults sum to 1.0; the weighted average stays in [0, 1] as long as
/// that holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub vendor_gstin: f32,
    pub total_amount: f32,
    pub gst_amount: f32,
    pub hsn_code: f32,
    pub vendor_name: f32,
    pub invoice_number: f32,
    pub invoice_date: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            vendor_gstin: 0.20,
            total_amount: 0.30,
            gst_amount: 0.25,
            hsn_code: 0.15,
            vendor_name: 0.05,
            invoice_number: 0.03,
            invoice_date: 0.02,
        }
    }
}

/// Extraction confidence scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Field weights for the weighted average.
    pub weights: FieldWeights,

    /// Weighted score at or above which the tier is auto-approve.
    pub auto_approve_threshold: f32,

    /// Weighted score below which the tier is reject.
    pub reject_threshold: f32,

    /// Critical fields (GSTIN, total, GST) below this force the review tier.
    pub critical_field_floor: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            auto_approve_threshold: 0.95,
            reject_threshold: 0.80,
            critical_field_floor: 0.80,
        }
    }
}

/// Per-rule weights for the compliance score.
///
/// The defaults sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    pub amount_calculation: f32,
    pub gstin_format: f32,
    pub tax_split_correct: f32,
    pub gst_rate_valid: f32,
    pub date_valid: f32,
    pub hsn_rate_consistent: f32,
    pub duplicate_check: f32,
    pub state_code_valid: f32,
    pub invoice_number_format: f32,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            amount_calculation: 0.25,
            gstin_format: 0.20,
            tax_split_correct: 0.20,
            gst_rate_valid: 0.10,
            date_valid: 0.08,
            hsn_rate_consistent: 0.07,
            duplicate_check: 0.05,
            state_code_valid: 0.03,
            invoice_number_format: 0.02,
        }
    }
}

/// Compliance validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Rule weights for the weighted score.
    pub weights: RuleWeights,

    /// Weighted score at or above which validation passes.
    pub pass_threshold: f32,

    /// Weighted score at or above which validation asks for review.
    pub review_threshold: f32,

    /// Score subtracted per major violation.
    pub major_penalty: f32,

    /// Score subtracted per minor violation.
    pub minor_penalty: f32,

    /// Allowed distance from a canonical GST rate, in percentage points.
    pub rate_tolerance: f32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            weights: RuleWeights::default(),
            pass_threshold: 0.95,
            review_threshold: 0.80,
            major_penalty: 0.15,
            minor_penalty: 0.05,
            rate_tolerance: 0.5,
        }
    }
}

/// Extraction service connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Extraction endpoint URL. When unset, recorded fields are used.
    pub endpoint: Option<String>,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: "TAXPILOT_EXTRACT_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

impl TaxpilotConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}
