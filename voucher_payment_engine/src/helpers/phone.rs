//! Ghana MSISDN handling.
//!
//! Buyers type their number however they like ("0241234567", "+233 24 123 4567", "233241234567") but the ledger,
//! the payment provider and the SMS gateway all want the canonical international form. Everything is normalized to
//! `233XXXXXXXXX` at the edge, so equality on the `phone` column is exact string equality.

use crate::db_types::ConversionError;

/// Normalizes a Ghanaian phone number to the canonical `233XXXXXXXXX` form.
///
/// Accepts local (`0XXXXXXXXX`), international (`233XXXXXXXXX` or `+233XXXXXXXXX`) and bare nine-digit subscriber
/// numbers. Spaces, dashes and a leading `+` are ignored.
pub fn normalize_msisdn(raw: &str) -> Result<String, ConversionError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let canonical = match digits.len() {
        9 => format!("233{digits}"),
        10 if digits.starts_with('0') => format!("233{}", &digits[1..]),
        12 if digits.starts_with("233") => digits,
        _ => {
            return Err(ConversionError(format!("'{raw}' is not a valid Ghanaian phone number")));
        },
    };
    // The subscriber part never starts with 0.
    if canonical.as_bytes()[3] == b'0' {
        return Err(ConversionError(format!("'{raw}' is not a valid Ghanaian phone number")));
    }
    Ok(canonical)
}

/// The local display form of a canonical number, e.g. `233241234567` becomes `0241234567`. Falls back to the input
/// unchanged if it is not in canonical form.
pub fn display_local(msisdn: &str) -> String {
    match msisdn.strip_prefix("233") {
        Some(rest) if rest.len() == 9 => format!("0{rest}"),
        _ => msisdn.to_string(),
    }
}
