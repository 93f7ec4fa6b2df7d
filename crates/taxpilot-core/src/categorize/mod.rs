//! HSN/SAC categorization and GST rate resolution.
//!
//! Maps a classification code (and optionally a free-text description) to a
//! GST rate through a tiered fallback chain: exact code, code prefix,
//! description keywords, default rate. Each tier stamps its own confidence.

mod strategy;
pub mod table;

pub use strategy::{CodePrefix, DescriptionKeyword, ExactCode, ResolveStrategy, TierMatch};
pub use table::{InMemoryRateTable, RateEntry, RateTable};

use lazy_static::lazy_static;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::confidence::round2;

lazy_static! {
    /// Rate applied when nothing matches. 18% covers the widest band of
    /// goods and services under GST.
    pub static ref DEFAULT_RATE: Decimal = Decimal::from(18);
}

/// How a classification code was matched against the rate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryMatch {
    Exact,
    Partial,
    Default,
    Unknown,
}

impl CategoryMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryMatch::Exact => "exact",
            CategoryMatch::Partial => "partial",
            CategoryMatch::Default => "default",
            CategoryMatch::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CategoryMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categorization verdict for one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationResult {
    /// Normalized code the categorization applies to.
    pub hsn_code: Option<String>,

    /// Category label from the matched table entry.
    pub category: Option<String>,

    /// Entry description, or a note about how the match was made.
    pub description: Option<String>,

    /// Applied GST rate in percent.
    pub gst_rate: Decimal,

    /// Whether the matched category is GST-exempt.
    #[serde(default)]
    pub is_exempt: bool,

    /// Reason for the exemption, when exempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemption_reason: Option<String>,

    /// Tier confidence in this categorization.
    pub confidence_score: f32,

    /// Which tier matched.
    pub match_type: CategoryMatch,

    /// True when the default rate was applied without a table hit.
    #[serde(default)]
    pub fallback_used: bool,
}

/// Review status derived from a categorization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationStatus {
    Categorized,
    NeedsReview,
    Unknown,
}

impl CategorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorizationStatus::Categorized => "categorized",
            CategorizationStatus::NeedsReview => "needs_review",
            CategorizationStatus::Unknown => "unknown",
        }
    }
}

/// Scored categorization with component confidences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationScoring {
    /// Overall score after tier floors and caps.
    pub overall_score: f32,

    /// Raw tier confidence.
    pub categorization_confidence: f32,

    /// Confidence that the code itself is a real classification.
    pub hsn_validity: f32,

    /// Confidence in the applied rate.
    pub tax_rate_confidence: f32,

    /// Whether the categorization stands or needs a human.
    pub status: CategorizationStatus,

    /// Human-readable summary.
    pub reason: String,
}

/// Ordered resolution chain over a rate table.
pub struct Resolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl Resolver {
    /// Standard chain: exact code, then code prefix, then description keywords.
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(ExactCode),
            Box::new(CodePrefix),
            Box::new(DescriptionKeyword),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve a classification code to a category and GST rate.
    ///
    /// Never fails: an absent or unmatched code falls back to the default
    /// rate with `fallback_used` set, so categorization cannot abort a
    /// pipeline run.
    pub fn resolve(
        &self,
        table: &dyn RateTable,
        hsn_code: Option<&str>,
        amount: Option<Decimal>,
        description: Option<&str>,
    ) -> CategorizationResult {
        let Some(code) = normalize_code(hsn_code) else {
            debug!(?amount, "no classification code, applying default rate");
            return CategorizationResult {
                hsn_code: None,
                category: Some("Unknown".to_string()),
                description: Some("No HSN code provided".to_string()),
                gst_rate: *DEFAULT_RATE,
                is_exempt: false,
                exemption_reason: None,
                confidence_score: 0.3,
                match_type: CategoryMatch::Default,
                fallback_used: true,
            };
        };

        for strategy in &self.strategies {
            if let Some(hit) = strategy.attempt(table, &code, description) {
                debug!(code = %code, tier = strategy.name(), ?amount, "classification resolved");
                // The exact tier reports the table's own code; later tiers
                // keep the code as extracted.
                let resolved_code = match hit.match_type {
                    CategoryMatch::Exact => hit.entry.hsn_code.clone(),
                    _ => code.clone(),
                };
                return CategorizationResult {
                    hsn_code: Some(resolved_code),
                    category: Some(hit.entry.category),
                    description: hit.note.or(Some(hit.entry.description)),
                    gst_rate: hit.entry.gst_rate,
                    is_exempt: hit.entry.is_exempt,
                    exemption_reason: hit.entry.exemption_reason,
                    confidence_score: hit.confidence,
                    match_type: hit.match_type,
                    fallback_used: false,
                };
            }
        }

        debug!(code = %code, ?amount, "classification unmatched, applying default rate");
        CategorizationResult {
            hsn_code: Some(code),
            category: Some("Unclassified".to_string()),
            description: Some("HSN code not found in rate table - using default rate".to_string()),
            gst_rate: *DEFAULT_RATE,
            is_exempt: false,
            exemption_reason: None,
            confidence_score: 0.40,
            match_type: CategoryMatch::Default,
            fallback_used: true,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim, strip inner whitespace, and uppercase a raw code.
fn normalize_code(code: Option<&str>) -> Option<String> {
    let code = code?.trim();
    if code.is_empty() {
        return None;
    }
    let normalized: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    Some(normalized.to_uppercase())
}

/// Score a categorization result and derive its review status.
///
/// Tier floors and caps: exact matches score at least 0.90, partial matches
/// at least 0.70, and defaulted results at most 0.50.
pub fn categorization_score(result: &CategorizationResult) -> CategorizationScoring {
    let mut overall = result.confidence_score;
    match result.match_type {
        CategoryMatch::Exact => overall = overall.max(0.90),
        CategoryMatch::Partial => overall = overall.max(0.70),
        CategoryMatch::Default => overall = overall.min(0.50),
        CategoryMatch::Unknown => {}
    }

    let hsn_validity = if result.hsn_code.is_some() && !result.fallback_used {
        0.9
    } else {
        0.4
    };
    let tax_rate_confidence = if result.match_type == CategoryMatch::Exact {
        0.95
    } else {
        0.60
    };

    let code = result.hsn_code.as_deref().unwrap_or("none");
    let (status, reason) = if result.fallback_used || overall < 0.70 {
        (
            CategorizationStatus::NeedsReview,
            format!(
                "HSN code not found in rate table - defaulting to {}% GST (most common rate). Admin review recommended.",
                result.gst_rate
            ),
        )
    } else if result.is_exempt {
        (
            CategorizationStatus::Categorized,
            format!(
                "HSN {} is exempt from GST. Reason: {}",
                code,
                result.exemption_reason.as_deref().unwrap_or("Standard exemption")
            ),
        )
    } else if result.match_type == CategoryMatch::Partial {
        (
            CategorizationStatus::NeedsReview,
            format!(
                "Partial match for HSN {} - applied {}% GST based on similar category. Please verify.",
                code, result.gst_rate
            ),
        )
    } else {
        (
            CategorizationStatus::Categorized,
            format!(
                "HSN {} categorized as {} with {}% GST",
                code,
                result.category.as_deref().unwrap_or("Unknown"),
                result.gst_rate
            ),
        )
    };

    CategorizationScoring {
        overall_score: round2(overall),
        categorization_confidence: result.confidence_score,
        hsn_validity,
        tax_rate_confidence,
        status,
        reason,
    }
}

/// Display label for a categorization score.
pub fn categorization_label(score: f32) -> &'static str {
    if score >= 0.90 {
        "Exact Match"
    } else if score >= 0.75 {
        "Partial Match"
    } else if score >= 0.60 {
        "Probable"
    } else if score >= 0.40 {
        "Default Applied"
    } else {
        "Unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolve(code: Option<&str>, description: Option<&str>) -> CategorizationResult {
        let table = InMemoryRateTable::builtin();
        Resolver::new().resolve(&table, code, Some(Decimal::from(1000)), description)
    }

    #[test]
    fn test_missing_code_defaults_with_low_confidence() {
        let result = resolve(None, None);

        assert_eq!(result.hsn_code, None);
        assert_eq!(result.category.as_deref(), Some("Unknown"));
        assert_eq!(result.gst_rate, Decimal::from(18));
        assert_eq!(result.confidence_score, 0.3);
        assert_eq!(result.match_type, CategoryMatch::Default);
        assert!(result.fallback_used);

        // Whitespace-only behaves like missing
        let result = resolve(Some("   "), None);
        assert!(result.fallback_used);
        assert_eq!(result.hsn_code, None);
    }

    #[test]
    fn test_exact_match_wins_first() {
        let result = resolve(Some(" 8471 "), Some("office laptops"));

        assert_eq!(result.hsn_code.as_deref(), Some("8471"));
        assert_eq!(result.category.as_deref(), Some("Electronics"));
        assert_eq!(result.confidence_score, 0.95);
        assert_eq!(result.match_type, CategoryMatch::Exact);
        assert!(!result.fallback_used);
    }

    #[test]
    fn test_prefix_match_keeps_extracted_code() {
        let result = resolve(Some("10063000"), None);

        assert_eq!(result.hsn_code.as_deref(), Some("10063000"));
        assert_eq!(result.category.as_deref(), Some("Food Grains"));
        assert_eq!(result.confidence_score, 0.75);
        assert_eq!(result.match_type, CategoryMatch::Partial);
        assert!(result.description.unwrap().starts_with("Similar to:"));
    }

    #[test]
    fn test_keyword_match_when_code_unknown() {
        let result = resolve(Some("4242"), Some("quarterly IT consulting retainer"));

        assert_eq!(result.hsn_code.as_deref(), Some("4242"));
        assert_eq!(result.category.as_deref(), Some("Professional Services"));
        assert_eq!(result.confidence_score, 0.60);
        assert_eq!(result.match_type, CategoryMatch::Partial);
    }

    #[test]
    fn test_unmatched_code_falls_back_to_default_rate() {
        let result = resolve(Some("4242"), None);

        assert_eq!(result.hsn_code.as_deref(), Some("4242"));
        assert_eq!(result.category.as_deref(), Some("Unclassified"));
        assert_eq!(result.gst_rate, Decimal::from(18));
        assert_eq!(result.confidence_score, 0.40);
        assert!(result.fallback_used);
    }

    #[test]
    fn test_scoring_exact_match_is_categorized() {
        let result = resolve(Some("8471"), None);
        let scoring = categorization_score(&result);

        assert_eq!(scoring.overall_score, 0.95);
        assert_eq!(scoring.hsn_validity, 0.9);
        assert_eq!(scoring.tax_rate_confidence, 0.95);
        assert_eq!(scoring.status, CategorizationStatus::Categorized);
        assert_eq!(
            scoring.reason,
            "HSN 8471 categorized as Electronics with 18% GST"
        );
    }

    #[test]
    fn test_scoring_partial_match_needs_review() {
        let result = resolve(Some("10063000"), None);
        let scoring = categorization_score(&result);

        assert_eq!(scoring.overall_score, 0.75);
        assert_eq!(scoring.status, CategorizationStatus::NeedsReview);
        assert!(scoring.reason.starts_with("Partial match for HSN 10063000"));
    }

    #[test]
    fn test_scoring_keyword_match_floored_to_partial() {
        let result = resolve(Some("4242"), Some("quarterly IT consulting retainer"));
        let scoring = categorization_score(&result);

        // 0.60 tier confidence raised to the partial floor
        assert_eq!(scoring.overall_score, 0.70);
        assert_eq!(scoring.status, CategorizationStatus::NeedsReview);
    }

    #[test]
    fn test_scoring_fallback_needs_review() {
        let result = resolve(Some("4242"), None);
        let scoring = categorization_score(&result);

        assert_eq!(scoring.overall_score, 0.40);
        assert_eq!(scoring.hsn_validity, 0.4);
        assert_eq!(scoring.status, CategorizationStatus::NeedsReview);
        assert!(scoring.reason.contains("defaulting to 18% GST"));
    }

    #[test]
    fn test_scoring_exempt_exact_match_stays_categorized() {
        let result = resolve(Some("0401"), None);
        let scoring = categorization_score(&result);

        assert_eq!(scoring.status, CategorizationStatus::Categorized);
        assert_eq!(
            scoring.reason,
            "HSN 0401 is exempt from GST. Reason: Fresh milk is nil-rated"
        );
    }

    #[test]
    fn test_categorization_labels() {
        assert_eq!(categorization_label(0.95), "Exact Match");
        assert_eq!(categorization_label(0.75), "Partial Match");
        assert_eq!(categorization_label(0.60), "Probable");
        assert_eq!(categorization_label(0.40), "Default Applied");
        assert_eq!(categorization_label(0.30), "Unknown");
    }
}
