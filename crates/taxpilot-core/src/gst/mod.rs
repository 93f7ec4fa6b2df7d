//! GST domain rules: canonical rates, tax-split arithmetic, fiscal year.

pub mod gstin;

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use rust_decimal::Decimal;

lazy_static! {
    /// Canonical GST rate slabs, in percent.
    pub static ref STANDARD_RATES: [Decimal; 7] = [
        Decimal::ZERO,
        Decimal::new(25, 2),
        Decimal::new(3, 0),
        Decimal::new(5, 0),
        Decimal::new(12, 0),
        Decimal::new(18, 0),
        Decimal::new(28, 0),
    ];
}

/// The canonical rate closest to the given effective rate.
pub fn nearest_standard_rate(rate: Decimal) -> Decimal {
    let mut best = STANDARD_RATES[0];
    let mut best_distance = (rate - best).abs();

    for candidate in STANDARD_RATES.iter().skip(1) {
        let distance = (rate - candidate).abs();
        if distance < best_distance {
            best = *candidate;
            best_distance = distance;
        }
    }

    best
}

/// Effective tax rate in percent, zero when there is no taxable base.
pub fn effective_rate(gst_amount: Decimal, taxable_amount: Decimal) -> Decimal {
    if taxable_amount > Decimal::ZERO {
        gst_amount / taxable_amount * Decimal::new(100, 0)
    } else {
        Decimal::ZERO
    }
}

/// Expected tax components for a taxable amount at a given rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GstSplit {
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

impl GstSplit {
    /// Combined tax across all components.
    pub fn total(&self) -> Decimal {
        self.cgst + self.sgst + self.igst
    }
}

/// Compute the expected split of `taxable × rate / 100`.
///
/// Inter-state supplies carry the whole tax as IGST; intra-state supplies
/// split it evenly between CGST and SGST.
pub fn expected_split(taxable: Decimal, rate_percent: Decimal, inter_state: bool) -> GstSplit {
    let total = taxable * rate_percent / Decimal::new(100, 0);

    if inter_state {
        GstSplit {
            cgst: Decimal::ZERO,
            sgst: Decimal::ZERO,
            igst: total,
        }
    } else {
        let half = total / Decimal::new(2, 0);
        GstSplit {
            cgst: half,
            sgst: half,
            igst: Decimal::ZERO,
        }
    }
}

/// The Indian fiscal year containing `today`: April 1 through March 31.
pub fn fiscal_year(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_year = if today.month() >= 4 {
        today.year()
    } else {
        today.year() - 1
    };

    let start = NaiveDate::from_ymd_opt(start_year, 4, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(start_year + 1, 3, 31).unwrap();
    (start, end)
}

/// Whether a date falls inside the fiscal year containing `today`.
pub fn in_current_fiscal_year(date: NaiveDate, today: NaiveDate) -> bool {
    let (start, end) = fiscal_year(today);
    date >= start && date <= end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_intra_state_split_halves_the_tax() {
        let split = expected_split(Decimal::new(1000, 0), Decimal::new(18, 0), false);
        assert_eq!(split.cgst, Decimal::new(90, 0));
        assert_eq!(split.sgst, Decimal::new(90, 0));
        assert_eq!(split.igst, Decimal::ZERO);
        assert_eq!(split.total(), Decimal::new(180, 0));
    }

    #[test]
    fn test_inter_state_split_is_all_igst() {
        let split = expected_split(Decimal::new(1000, 0), Decimal::new(18, 0), true);
        assert_eq!(split.cgst, Decimal::ZERO);
        assert_eq!(split.sgst, Decimal::ZERO);
        assert_eq!(split.igst, Decimal::new(180, 0));
    }

    #[test]
    fn test_effective_rate() {
        assert_eq!(
            effective_rate(Decimal::new(180, 0), Decimal::new(1000, 0)),
            Decimal::new(18, 0)
        );
        assert_eq!(
            effective_rate(Decimal::new(180, 0), Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_nearest_standard_rate() {
        assert_eq!(nearest_standard_rate(Decimal::new(179, 1)), Decimal::new(18, 0));
        assert_eq!(nearest_standard_rate(Decimal::new(26, 2)), Decimal::new(25, 2));
        assert_eq!(nearest_standard_rate(Decimal::new(40, 0)), Decimal::new(28, 0));
    }

    #[test]
    fn test_fiscal_year_bounds() {
        let (start, end) = fiscal_year(date(2025, 8, 21));
        assert_eq!(start, date(2025, 4, 1));
        assert_eq!(end, date(2026, 3, 31));

        let (start, end) = fiscal_year(date(2026, 2, 10));
        assert_eq!(start, date(2025, 4, 1));
        assert_eq!(end, date(2026, 3, 31));
    }

    #[test]
    fn test_in_current_fiscal_year() {
        let today = date(2025, 8, 21);
        assert!(in_current_fiscal_year(date(2025, 4, 1), today));
        assert!(in_current_fiscal_year(date(2026, 3, 31), today));
        assert!(!in_current_fiscal_year(date(2025, 3, 31), today));
    }
}
