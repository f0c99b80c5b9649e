//! Address shape validation and display formatting.
//!
//! Every address in the system is stored and compared in lowercase form. The
//! checksum casing wallets hand back is never relied on for equality, so
//! normalization happens once at each boundary (login payloads, cookie values,
//! provider account lists) and everything downstream assumes lowercase.

use regex::Regex;

use crate::error::VoteError;

/// `0x` followed by exactly 40 hex characters.
pub fn is_valid_address(input: &str) -> bool {
    let shape = Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap();

    shape.is_match(input)
}

/// Trims, validates and lowercases an address.
///
/// Idempotent: normalizing an already-normalized address returns it unchanged.
pub fn normalize(input: &str) -> Result<String, VoteError> {
    let trimmed = input.trim();

    if !is_valid_address(trimmed) {
        return Err(VoteError::InvalidAddress);
    }

    Ok(trimmed.to_lowercase())
}

/// First 6 and last 4 characters joined by an ellipsis, for display only.
/// Input too short to abbreviate comes back unchanged.
pub fn format_short(address: &str) -> String {
    if address.len() < 10 {
        return address.to_string();
    }

    match (address.get(..6), address.get(address.len() - 4..)) {
        (Some(head), Some(tail)) => format!("{head}...{tail}"),
        _ => address.to_string(),
    }
}

/// Vote share as a string with exactly one decimal digit.
///
/// A zero total yields `"0.0"` rather than dividing by zero.
pub fn percentage(count: u64, total: u64) -> String {
    if total == 0 {
        return "0.0".to_string();
    }

    format!("{:.1}", (count as f64 / total as f64) * 100.0)
}
