//! Common regex patterns for invoice number checks.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // PREFIX-YYYY-NNNN style, with - or / separators allowed
    pub static ref INVOICE_NUMBER_STANDARD: Regex = Regex::new(
        r"(?i)^[A-Z]{2,5}[-/]?\d{4}[-/]?\d{3,6}$"
    ).unwrap();

    // Letters, digits, and separators only
    pub static ref INVOICE_NUMBER_ALNUM: Regex = Regex::new(
        r"(?i)^[A-Z0-9/-]+$"
    ).unwrap();
}
