//! GSTIN (Goods and Services Tax Identification Number) validation.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Structural pattern for a 15-character GSTIN:
    /// state code, PAN (5 letters, 4 digits, 1 letter), entity number,
    /// the literal 'Z', and a check character.
    pub static ref GSTIN_PATTERN: Regex =
        Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$").unwrap();
}

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// GST state codes. Code 28 was retired when Andhra Pradesh was
/// re-registered under 37 and is deliberately absent.
pub const STATE_CODES: [(&str, &str); 37] = [
    ("01", "Jammu & Kashmir"),
    ("02", "Himachal Pradesh"),
    ("03", "Punjab"),
    ("04", "Chandigarh"),
    ("05", "Uttarakhand"),
    ("06", "Haryana"),
    ("07", "Delhi"),
    ("08", "Rajasthan"),
    ("09", "Uttar Pradesh"),
    ("10", "Bihar"),
    ("11", "Sikkim"),
    ("12", "Arunachal Pradesh"),
    ("13", "Nagaland"),
    ("14", "Manipur"),
    ("15", "Mizoram"),
    ("16", "Tripura"),
    ("17", "Meghalaya"),
    ("18", "Assam"),
    ("19", "West Bengal"),
    ("20", "Jharkhand"),
    ("21", "Odisha"),
    ("22", "Chhattisgarh"),
    ("23", "Madhya Pradesh"),
    ("24", "Gujarat"),
    ("25", "Daman & Diu"),
    ("26", "Dadra & Nagar Haveli"),
    ("27", "Maharashtra"),
    ("29", "Karnataka"),
    ("30", "Goa"),
    ("31", "Lakshadweep"),
    ("32", "Kerala"),
    ("33", "Tamil Nadu"),
    ("34", "Puducherry"),
    ("35", "Andaman & Nicobar Islands"),
    ("36", "Telangana"),
    ("37", "Andhra Pradesh"),
    ("38", "Ladakh"),
];

/// Resolve a two-digit state code to its state name.
pub fn state_name(code: &str) -> Option<&'static str> {
    STATE_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// The state-code prefix of a GSTIN, if it has one.
pub fn state_code(gstin: &str) -> Option<&str> {
    let prefix = gstin.get(..2)?;
    if prefix.chars().all(|c| c.is_ascii_digit()) {
        Some(prefix)
    } else {
        None
    }
}

/// Check whether a GSTIN matches the structural pattern.
pub fn is_well_formed(gstin: &str) -> bool {
    GSTIN_PATTERN.is_match(gstin)
}

fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        _ => None,
    }
}

/// Compute the check character for the first 14 characters of a GSTIN.
///
/// Algorithm (base-36 weighted):
/// 1. Map each character to its alphabet value (0-9, A=10 .. Z=35)
/// 2. Multiply by 1 or 2, alternating by position (even index ⇒ 1)
/// 3. Sum `product div 36 + product mod 36` over all 14 positions
/// 4. Check character = `alphabet[(36 - sum mod 36) mod 36]`
pub fn check_character(payload: &str) -> Option<char> {
    if payload.len() < 14 || !payload.is_ascii() {
        return None;
    }

    let mut sum: u32 = 0;
    for (i, c) in payload.chars().take(14).enumerate() {
        let value = char_value(c)?;
        let factor = if i % 2 == 0 { 1 } else { 2 };
        let product = value * factor;
        sum += product / 36 + product % 36;
    }

    let check = (36 - sum % 36) % 36;
    Some(ALPHABET[check as usize] as char)
}

/// Validate the GSTIN check character against the first 14 characters.
pub fn checksum_valid(gstin: &str) -> bool {
    if gstin.len() != 15 || !gstin.is_ascii() {
        return false;
    }

    match check_character(gstin) {
        Some(expected) => gstin.as_bytes()[14] as char == expected,
        None => false,
    }
}

/// Normalize a raw GSTIN candidate: trim, uppercase, and keep it only if
/// it is exactly 15 alphanumeric characters.
pub fn normalize(raw: &str) -> Option<String> {
    let cleaned = raw.trim().to_uppercase();
    let valid = cleaned.len() == 15
        && cleaned
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    valid.then_some(cleaned)
}
