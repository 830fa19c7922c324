//! Content hashes for snapshots.
//!
//! Only economic content is hashed. Generated ids and timestamps never reach
//! the digest, so two builds of the same input agree on the hash.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

/// Decimal places kept for weights before hashing.
pub const WEIGHT_HASH_DP: u32 = 10;

/// Canonical text of a decimal: trailing zeros removed, `-0` folded to `0`.
fn canonical(value: Decimal) -> String {
    let normalized = value.normalize();
    if normalized.is_zero() {
        "0".to_string()
    } else {
        normalized.to_string()
    }
}

/// Hashes `(ticker, weight)` pairs in the order given (position order).
pub fn universe_hash<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (&'a str, Decimal)>,
{
    let mut hasher = Sha256::new();
    for (ticker, weight) in rows {
        hasher.update(ticker.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical(weight.round_dp(WEIGHT_HASH_DP)).as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Hashes `(ticker, close, mic)` rows after sorting them by ticker then mic.
pub fn price_hash<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = (&'a str, Decimal, &'a str)>,
{
    let mut rows: Vec<(&str, Decimal, &str)> = rows.into_iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.2.cmp(b.2)));

    let mut hasher = Sha256::new();
    for (ticker, close, mic) in rows {
        hasher.update(ticker.as_bytes());
        hasher.update(b"|");
        hasher.update(canonical(close).as_bytes());
        hasher.update(b"|");
        hasher.update(mic.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn universe_hash_is_lowercase_hex_sha256() {
        let hash = universe_hash([("AAPL", dec!(0.6)), ("MSFT", dec!(0.4))]);
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn weights_equal_after_rounding_hash_equal() {
        let a = universe_hash([("AAPL", dec!(0.123456789012))]);
        let b = universe_hash([("AAPL", dec!(0.12345678901))]);
        assert_eq!(a, b);
    }

    #[test]
    fn trailing_zeros_do_not_change_hash() {
        let a = price_hash([("AAPL", dec!(187.10), "XNAS")]);
        let b = price_hash([("AAPL", dec!(187.1), "XNAS")]);
        assert_eq!(a, b);
    }

    #[test]
    fn price_hash_ignores_input_order() {
        let a = price_hash([("AAPL", dec!(1), "XNAS"), ("MSFT", dec!(2), "XNAS")]);
        let b = price_hash([("MSFT", dec!(2), "XNAS"), ("AAPL", dec!(1), "XNAS")]);
        assert_eq!(a, b);
    }

    #[test]
    fn price_hash_covers_venue() {
        let a = price_hash([("AAPL", dec!(1), "XNAS")]);
        let b = price_hash([("AAPL", dec!(1), "BATS")]);
        assert_ne!(a, b);
    }
}
