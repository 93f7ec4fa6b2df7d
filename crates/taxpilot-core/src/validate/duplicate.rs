//! Tiered duplicate detection over candidate invoices.
//!
//! Candidates are pre-fetched by the caller (same client, same vendor
//! GSTIN, not rejected, excluding the invoice under review) so detection
//! itself is a pure function and symmetric in the defining fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Candidate invoice sharing client and vendor with the one under review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub id: Uuid,

    pub invoice_number: Option<String>,

    pub invoice_date: Option<NaiveDate>,

    pub total_amount: Decimal,

    pub vendor_name: Option<String>,
}

/// How strongly a candidate matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Fuzzy,
    Partial,
    None,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::Partial => "partial",
            MatchKind::None => "none",
        }
    }
}

/// Outcome of the duplicate check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCheckResult {
    /// True only for exact and fuzzy matches.
    pub is_duplicate: bool,

    /// Confidence that the invoice is unique (1.0 = no duplicate concern).
    pub confidence: f32,

    /// Matched invoice for exact and fuzzy tiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_invoice: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_invoice_number: Option<String>,

    pub match_type: MatchKind,

    pub reason: String,

    /// Near-miss candidates surfaced by the partial tier.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<DuplicateCandidate>,
}

impl DuplicateCheckResult {
    /// No duplicate concern.
    pub fn clean() -> Self {
        Self {
            is_duplicate: false,
            confidence: 1.0,
            matched_invoice: None,
            matched_invoice_number: None,
            match_type: MatchKind::None,
            reason: "No duplicates found".to_string(),
            candidates: Vec::new(),
        }
    }

    /// The candidate store could not be queried; scored neutrally low so a
    /// broken history lookup never auto-approves by itself.
    pub fn unavailable() -> Self {
        Self {
            is_duplicate: false,
            confidence: 0.5,
            matched_invoice: None,
            matched_invoice_number: None,
            match_type: MatchKind::None,
            reason: "Failed to check for duplicates".to_string(),
            candidates: Vec::new(),
        }
    }
}

/// Detect duplicates among pre-fetched candidates.
///
/// Tiers, first hit wins:
/// 1. Exact: same invoice number and date, amount within ±1.
/// 2. Fuzzy: same invoice number, amount within ±10, date within ±7 days.
/// 3. Partial: amount within ±100, date within ±30 days. Not flagged as a
///    duplicate; the candidates are returned for review instead.
pub fn detect(
    invoice_number: Option<&str>,
    invoice_date: Option<NaiveDate>,
    total_amount: Decimal,
    candidates: &[DuplicateCandidate],
) -> DuplicateCheckResult {
    if candidates.is_empty() {
        return DuplicateCheckResult::clean();
    }

    for candidate in candidates {
        if !same_number(invoice_number, candidate) || !same_date(invoice_date, candidate) {
            continue;
        }
        let amount_diff = (candidate.total_amount - total_amount).abs();
        if amount_diff <= Decimal::ONE {
            return DuplicateCheckResult {
                is_duplicate: true,
                confidence: 1.0,
                matched_invoice: Some(candidate.id),
                matched_invoice_number: candidate.invoice_number.clone(),
                match_type: MatchKind::Exact,
                reason: format!(
                    "Exact duplicate found: Invoice #{} already exists (ID: {})",
                    candidate.invoice_number.as_deref().unwrap_or("?"),
                    candidate.id
                ),
                candidates: Vec::new(),
            };
        }
    }

    for candidate in candidates {
        if !same_number(invoice_number, candidate) {
            continue;
        }
        let Some(days) = days_apart(invoice_date, candidate.invoice_date) else {
            continue;
        };
        let amount_diff = (candidate.total_amount - total_amount).abs();
        if amount_diff <= Decimal::TEN && days <= 7 {
            return DuplicateCheckResult {
                is_duplicate: true,
                confidence: 0.85,
                matched_invoice: Some(candidate.id),
                matched_invoice_number: candidate.invoice_number.clone(),
                match_type: MatchKind::Fuzzy,
                reason: format!(
                    "Potential duplicate: Similar invoice #{} within ±7 days and ±₹{:.2}",
                    candidate.invoice_number.as_deref().unwrap_or("?"),
                    amount_diff
                ),
                candidates: Vec::new(),
            };
        }
    }

    let similar: Vec<DuplicateCandidate> = candidates
        .iter()
        .filter(|candidate| {
            let amount_diff = (candidate.total_amount - total_amount).abs();
            match days_apart(invoice_date, candidate.invoice_date) {
                Some(days) => amount_diff <= Decimal::ONE_HUNDRED && days <= 30,
                None => false,
            }
        })
        .take(5)
        .cloned()
        .collect();

    if !similar.is_empty() {
        return DuplicateCheckResult {
            is_duplicate: false,
            confidence: 0.70,
            matched_invoice: None,
            matched_invoice_number: None,
            match_type: MatchKind::Partial,
            reason: format!(
                "Found {} similar invoice(s) from same vendor within 30 days",
                similar.len()
            ),
            candidates: similar,
        };
    }

    DuplicateCheckResult::clean()
}

fn same_number(invoice_number: Option<&str>, candidate: &DuplicateCandidate) -> bool {
    match (invoice_number, candidate.invoice_number.as_deref()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn same_date(invoice_date: Option<NaiveDate>, candidate: &DuplicateCandidate) -> bool {
    match (invoice_date, candidate.invoice_date) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn days_apart(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some((a - b).num_days().abs()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(number: &str, date: (i32, u32, u32), amount: i64) -> DuplicateCandidate {
        DuplicateCandidate {
            id: Uuid::new_v4(),
            invoice_number: Some(number.to_string()),
            invoice_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            total_amount: Decimal::from(amount),
            vendor_name: Some("Acme Supplies".to_string()),
        }
    }

    #[test]
    fn test_exact_duplicate() {
        let existing = candidate("INV-2025-001", (2025, 7, 1), 1180);
        let result = detect(
            Some("INV-2025-001"),
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[existing.clone()],
        );

        assert!(result.is_duplicate);
        assert_eq!(result.match_type, MatchKind::Exact);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.matched_invoice, Some(existing.id));
    }

    #[test]
    fn test_exact_match_is_symmetric() {
        // Two invoices identical in the defining fields flag each other
        // regardless of which one is under review.
        let a = candidate("INV-2025-001", (2025, 7, 1), 1180);
        let b = candidate("INV-2025-001", (2025, 7, 1), 1181);

        let a_vs_b = detect(
            a.invoice_number.as_deref(),
            a.invoice_date,
            a.total_amount,
            &[b.clone()],
        );
        let b_vs_a = detect(
            b.invoice_number.as_deref(),
            b.invoice_date,
            b.total_amount,
            &[a],
        );

        assert_eq!(a_vs_b.match_type, MatchKind::Exact);
        assert_eq!(b_vs_a.match_type, MatchKind::Exact);
    }

    #[test]
    fn test_fuzzy_duplicate_on_near_date_and_amount() {
        let existing = candidate("INV-2025-001", (2025, 7, 4), 1185);
        let result = detect(
            Some("INV-2025-001"),
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[existing],
        );

        assert!(result.is_duplicate);
        assert_eq!(result.match_type, MatchKind::Fuzzy);
        assert_eq!(result.confidence, 0.85);
    }

    #[test]
    fn test_partial_match_is_not_flagged() {
        let existing = candidate("INV-2025-099", (2025, 7, 10), 1250);
        let result = detect(
            Some("INV-2025-001"),
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[existing],
        );

        assert!(!result.is_duplicate);
        assert_eq!(result.match_type, MatchKind::Partial);
        assert_eq!(result.confidence, 0.70);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_unrelated_candidates_are_clean() {
        let existing = candidate("INV-2024-500", (2025, 1, 1), 9000);
        let result = detect(
            Some("INV-2025-001"),
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[existing],
        );

        assert!(!result.is_duplicate);
        assert_eq!(result.match_type, MatchKind::None);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_missing_invoice_number_skips_number_tiers() {
        let existing = candidate("INV-2025-001", (2025, 7, 1), 1180);
        let result = detect(
            None,
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[existing],
        );

        // Still surfaces a partial match on amount and date proximity
        assert!(!result.is_duplicate);
        assert_eq!(result.match_type, MatchKind::Partial);
    }

    #[test]
    fn test_no_candidates() {
        let result = detect(
            Some("INV-2025-001"),
            NaiveDate::from_ymd_opt(2025, 7, 1),
            Decimal::from(1180),
            &[],
        );
        assert_eq!(result.match_type, MatchKind::None);
        assert_eq!(result.confidence, 1.0);
    }
}
