//! Resolution tiers for classification lookup.

use super::CategoryMatch;
use super::table::{RateEntry, RateTable};

/// A successful tier resolution.
#[derive(Debug, Clone)]
pub struct TierMatch {
    /// Table row the tier landed on.
    pub entry: RateEntry,

    /// Tier-assigned confidence.
    pub confidence: f32,

    /// How the entry was matched.
    pub match_type: CategoryMatch,

    /// Tier-specific note replacing the entry description, if any.
    pub note: Option<String>,
}

/// One tier of the resolution chain.
///
/// Tiers are tried in order; the first one returning a match wins.
pub trait ResolveStrategy: Send + Sync {
    /// Tier name for logging.
    fn name(&self) -> &'static str;

    /// Attempt to resolve the normalized code against the table.
    fn attempt(
        &self,
        table: &dyn RateTable,
        code: &str,
        description: Option<&str>,
    ) -> Option<TierMatch>;
}

/// Exact match on the full code.
pub struct ExactCode;

impl ResolveStrategy for ExactCode {
    fn name(&self) -> &'static str {
        "exact_code"
    }

    fn attempt(
        &self,
        table: &dyn RateTable,
        code: &str,
        _description: Option<&str>,
    ) -> Option<TierMatch> {
        table.exact(code).map(|entry| TierMatch {
            entry,
            confidence: 0.95,
            match_type: CategoryMatch::Exact,
            note: None,
        })
    }
}

/// Match on the first four characters of the code.
pub struct CodePrefix;

impl ResolveStrategy for CodePrefix {
    fn name(&self) -> &'static str {
        "code_prefix"
    }

    fn attempt(
        &self,
        table: &dyn RateTable,
        code: &str,
        _description: Option<&str>,
    ) -> Option<TierMatch> {
        let prefix = code.get(..4)?;
        let entry = table.by_prefix(prefix)?;
        let note = format!("Similar to: {}", entry.description);
        Some(TierMatch {
            entry,
            confidence: 0.75,
            match_type: CategoryMatch::Partial,
            note: Some(note),
        })
    }
}

/// Keyword search over the free-text description.
pub struct DescriptionKeyword;

impl ResolveStrategy for DescriptionKeyword {
    fn name(&self) -> &'static str {
        "description_keyword"
    }

    fn attempt(
        &self,
        table: &dyn RateTable,
        _code: &str,
        description: Option<&str>,
    ) -> Option<TierMatch> {
        let keywords = keywords_of(description?);
        if keywords.is_empty() {
            return None;
        }
        let entry = table.by_keywords(&keywords)?;
        let note = format!("Matched by description: {}", entry.description);
        Some(TierMatch {
            entry,
            confidence: 0.60,
            match_type: CategoryMatch::Partial,
            note: Some(note),
        })
    }
}

/// Lowercased tokens longer than three characters.
fn keywords_of(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| word.len() > 3)
        .map(str::to_string)
        .collect()
}
