//! HSN/SAC classification tables.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the classification table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    /// HSN or SAC code, 2 to 8 digits.
    pub hsn_code: String,

    /// Goods or services category label.
    pub category: String,

    /// Human-readable description, searched by the keyword tier.
    pub description: String,

    /// GST rate in percent.
    pub gst_rate: Decimal,

    /// Whether the category is exempt from GST.
    #[serde(default)]
    pub is_exempt: bool,

    /// Reason for the exemption, when exempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemption_reason: Option<String>,
}

/// Lookup interface for the classification table.
///
/// Implementations that can fail mid-query report a miss instead of
/// aborting; categorization treats every miss as "not found" and moves
/// to the next tier.
pub trait RateTable: Send + Sync {
    /// Exact match on the full code.
    fn exact(&self, code: &str) -> Option<RateEntry>;

    /// First entry, in code order, whose code starts with the prefix.
    fn by_prefix(&self, prefix: &str) -> Option<RateEntry>;

    /// First entry, in code order, whose description contains any keyword.
    fn by_keywords(&self, keywords: &[String]) -> Option<RateEntry>;
}

/// In-memory classification table backed by an ordered map.
pub struct InMemoryRateTable {
    entries: BTreeMap<String, RateEntry>,
}

impl InMemoryRateTable {
    /// Empty table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Table seeded with common HSN/SAC chapters and their GST rates.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for entry in builtin_entries() {
            table.insert(entry);
        }
        table
    }

    /// Load a table from a JSON file holding an array of entries.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<RateEntry> = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<RateEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Insert an entry, replacing any existing entry with the same code.
    pub fn insert(&mut self, entry: RateEntry) {
        self.entries.insert(entry.hsn_code.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryRateTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTable for InMemoryRateTable {
    fn exact(&self, code: &str) -> Option<RateEntry> {
        self.entries.get(code).cloned()
    }

    fn by_prefix(&self, prefix: &str) -> Option<RateEntry> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(code, _)| code.starts_with(prefix))
            .map(|(_, entry)| entry.clone())
            .next()
    }

    fn by_keywords(&self, keywords: &[String]) -> Option<RateEntry> {
        if keywords.is_empty() {
            return None;
        }
        self.entries
            .values()
            .find(|entry| {
                let haystack = entry.description.to_lowercase();
                keywords.iter().any(|keyword| haystack.contains(keyword.as_str()))
            })
            .cloned()
    }
}

fn entry(code: &str, category: &str, description: &str, rate: Decimal) -> RateEntry {
    RateEntry {
        hsn_code: code.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        gst_rate: rate,
        is_exempt: false,
        exemption_reason: None,
    }
}

fn exempt(code: &str, category: &str, description: &str, reason: &str) -> RateEntry {
    RateEntry {
        hsn_code: code.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        gst_rate: Decimal::ZERO,
        is_exempt: true,
        exemption_reason: Some(reason.to_string()),
    }
}

fn builtin_entries() -> Vec<RateEntry> {
    vec![
        exempt(
            "0401",
            "Dairy Products",
            "Milk and cream, not concentrated nor sweetened",
            "Fresh milk is nil-rated",
        ),
        entry(
            "1006",
            "Food Grains",
            "Rice, husked, semi-milled or wholly milled",
            Decimal::from(5),
        ),
        entry(
            "3004",
            "Pharmaceuticals",
            "Medicaments for therapeutic or prophylactic uses",
            Decimal::from(12),
        ),
        entry(
            "7102",
            "Precious Stones",
            "Diamonds, whether or not worked",
            Decimal::new(25, 2),
        ),
        entry(
            "7108",
            "Precious Metals",
            "Gold in unwrought or semi-manufactured forms",
            Decimal::from(3),
        ),
        entry(
            "8471",
            "Electronics",
            "Automatic data processing machines and units thereof",
            Decimal::from(18),
        ),
        entry(
            "84713010",
            "Electronics",
            "Portable computers weighing not more than 10 kg",
            Decimal::from(18),
        ),
        entry(
            "8517",
            "Telecom Equipment",
            "Telephones for cellular networks, including smartphones",
            Decimal::from(18),
        ),
        entry(
            "8703",
            "Automobiles",
            "Motor cars and other vehicles for the transport of persons",
            Decimal::from(28),
        ),
        entry(
            "9954",
            "Construction Services",
            "Construction services of buildings and civil engineering works",
            Decimal::from(18),
        ),
        entry(
            "9983",
            "Professional Services",
            "Information technology consulting and support services",
            Decimal::from(18),
        ),
        exempt(
            "9992",
            "Education Services",
            "Education services provided by a school or institution",
            "Education services are exempt under notification 12/2017",
        ),
    ]
}
