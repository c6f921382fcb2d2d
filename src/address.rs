//! Account address normalization.
//!
//! Every address that reaches the store or is used as a map key goes through
//! [`normalize_address`], so `0xABC…` and `0xabc…` always name the same wallet.

use crate::error::{LedgerError, LedgerResult};
use alloy::primitives::Address;
use std::str::FromStr;

/// Validate an account address and return its lower-case `0x` form.
///
/// # Errors
///
/// Returns a decoding error if `raw` is not a 20-byte hex address.
///
/// ```
/// use oracle_ledger_sync::address::normalize_address;
///
/// let addr = normalize_address(" 0x8cFc184c877154a8F9ffE0fe75649dbe5e2DBEbf ").unwrap();
/// assert_eq!(addr, "0x8cfc184c877154a8f9ffe0fe75649dbe5e2dbebf");
/// ```
pub fn normalize_address(raw: &str) -> LedgerResult<String> {
    let trimmed = raw.trim();
    let parsed = Address::from_str(trimmed).map_err(|e| {
        LedgerError::decoding(format!("Invalid address: {trimmed}"), Some(Box::new(e)))
    })?;
    Ok(format_address(parsed))
}

/// Lower-case `0x` rendering of an already parsed address.
#[must_use]
pub fn format_address(address: Address) -> String {
    address.to_string().to_lowercase()
}

/// Case-insensitive comparison of two address strings.
#[must_use]
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
