//! Fixed-point money handling
//!
//! The settlement token carries six decimal places, so one whole unit of
//! display currency equals 1,000,000 smallest units. All conversions happen
//! at the edges:
//! - Human-entered price strings are parsed into smallest units on the way in
//! - Smallest units are divided back out only for display
//!
//! CRITICAL: All money values are i64 (smallest settlement units)
//!
//! Parsing works on the decimal string itself rather than going through
//! binary floating point. `f64` cannot represent values like 0.29 exactly,
//! and flooring the product `0.29 * 1_000_000` yields 289_999 instead of
//! 290_000. String parsing gives the mathematical floor for every input.

use thiserror::Error;

/// Smallest units per whole display unit (six decimal places)
pub const UNITS_PER_WHOLE: i64 = 1_000_000;

/// Number of decimal places carried by the settlement token
pub const DECIMALS: usize = 6;

/// Errors that can occur while parsing a money amount
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Amount is empty")]
    Empty,

    #[error("Amount must not be negative: {input}")]
    Negative { input: String },

    #[error("Amount is not a decimal number: {input}")]
    Malformed { input: String },

    #[error("Amount out of range: {input}")]
    OutOfRange { input: String },
}

/// Parse a human-entered amount string into smallest settlement units.
///
/// Accepts non-negative decimal strings like `"19.99"`, `"30"`, or `".5"`.
/// Digits beyond the sixth decimal place are truncated, which equals the
/// mathematical floor for non-negative values.
///
/// # Arguments
/// * `input` - Decimal string, leading/trailing whitespace tolerated
///
/// # Returns
/// - Ok(units) with `floor(value * 1_000_000)`
/// - Err if the string is empty, negative, malformed, or overflows i64
///
/// # Example
/// ```
/// use substream_core_rs::core::money::to_smallest_unit;
///
/// assert_eq!(to_smallest_unit("19.99").unwrap(), 19_990_000);
/// assert_eq!(to_smallest_unit("30").unwrap(), 30_000_000);
/// assert_eq!(to_smallest_unit("0.29").unwrap(), 290_000);
/// ```
pub fn to_smallest_unit(input: &str) -> Result<i64, MoneyError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(MoneyError::Empty);
    }

    if trimmed.starts_with('-') {
        return Err(MoneyError::Negative {
            input: trimmed.to_string(),
        });
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };

    // "." alone carries no digits
    if whole.is_empty() && frac.is_empty() {
        return Err(MoneyError::Malformed {
            input: trimmed.to_string(),
        });
    }

    // A second '.' ends up inside `frac` and fails the digit check
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::Malformed {
            input: trimmed.to_string(),
        });
    }

    let whole_units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| MoneyError::OutOfRange {
            input: trimmed.to_string(),
        })?
    };

    let scaled_whole = whole_units
        .checked_mul(UNITS_PER_WHOLE)
        .ok_or_else(|| MoneyError::OutOfRange {
            input: trimmed.to_string(),
        })?;

    // Keep at most six fractional digits, truncating the rest (floor)
    let kept: String = frac.chars().take(DECIMALS).collect();
    let frac_units: i64 = if kept.is_empty() {
        0
    } else {
        let parsed: i64 = kept.parse().map_err(|_| MoneyError::OutOfRange {
            input: trimmed.to_string(),
        })?;
        parsed * 10_i64.pow((DECIMALS - kept.len()) as u32)
    };

    scaled_whole
        .checked_add(frac_units)
        .ok_or_else(|| MoneyError::OutOfRange {
            input: trimmed.to_string(),
        })
}

/// Convert smallest settlement units back to a display value.
///
/// # Example
/// ```
/// use substream_core_rs::core::money::from_smallest_unit;
///
/// assert_eq!(from_smallest_unit(19_990_000), 19.99);
/// ```
pub fn from_smallest_unit(units: i64) -> f64 {
    units as f64 / UNITS_PER_WHOLE as f64
}

/// Render smallest settlement units as a USDC display string.
///
/// Trailing fractional zeros are trimmed, matching how the dashboards
/// render token amounts: `19_990_000` becomes `"19.99 USDC"` and
/// `20_000_000` becomes `"20 USDC"`.
pub fn format_usdc(units: i64) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    let whole = abs / UNITS_PER_WHOLE as u64;
    let frac = abs % UNITS_PER_WHOLE as u64;

    if frac == 0 {
        return format!("{}{} USDC", sign, whole);
    }

    let padded = format!("{:06}", frac);
    let trimmed = padded.trim_end_matches('0');
    format!("{}{}.{} USDC", sign, whole, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_number() {
        assert_eq!(to_smallest_unit("30").unwrap(), 30_000_000);
    }

    #[test]
    fn test_parse_two_decimals() {
        assert_eq!(to_smallest_unit("19.99").unwrap(), 19_990_000);
    }

    #[test]
    fn test_parse_avoids_float_misfloor() {
        // 0.29 is not representable in binary floating point;
        // floor(0.29_f64 * 1e6) would give 289_999
        assert_eq!(to_smallest_unit("0.29").unwrap(), 290_000);
    }

    #[test]
    fn test_parse_truncates_beyond_six_decimals() {
        assert_eq!(to_smallest_unit("0.1234567").unwrap(), 123_456);
        assert_eq!(to_smallest_unit("1.9999999").unwrap(), 1_999_999);
    }

    #[test]
    fn test_parse_bare_fraction_and_trailing_dot() {
        assert_eq!(to_smallest_unit(".5").unwrap(), 500_000);
        assert_eq!(to_smallest_unit("1.").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(to_smallest_unit("0").unwrap(), 0);
        assert_eq!(to_smallest_unit("0.000000").unwrap(), 0);
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert_eq!(to_smallest_unit("  12.5 ").unwrap(), 12_500_000);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(to_smallest_unit(""), Err(MoneyError::Empty));
        assert_eq!(to_smallest_unit("   "), Err(MoneyError::Empty));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert_eq!(
            to_smallest_unit("-1"),
            Err(MoneyError::Negative {
                input: "-1".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            to_smallest_unit("abc"),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            to_smallest_unit("1.2.3"),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            to_smallest_unit("12,50"),
            Err(MoneyError::Malformed { .. })
        ));
        assert!(matches!(
            to_smallest_unit("."),
            Err(MoneyError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(matches!(
            to_smallest_unit("99999999999999999999"),
            Err(MoneyError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_from_smallest_unit() {
        assert_eq!(from_smallest_unit(19_990_000), 19.99);
        assert_eq!(from_smallest_unit(0), 0.0);
    }

    #[test]
    fn test_format_usdc_trims_trailing_zeros() {
        assert_eq!(format_usdc(19_990_000), "19.99 USDC");
        assert_eq!(format_usdc(20_000_000), "20 USDC");
        assert_eq!(format_usdc(500_000), "0.5 USDC");
        assert_eq!(format_usdc(1), "0.000001 USDC");
    }

    #[test]
    fn test_format_usdc_negative() {
        assert_eq!(format_usdc(-1_500_000), "-1.5 USDC");
    }

    #[test]
    fn test_round_trip_to_six_places() {
        for input in ["19.99", "0.29", "30", "0.000001", "123456.654321"] {
            let units = to_smallest_unit(input).unwrap();
            let back = from_smallest_unit(units);
            let reparsed = to_smallest_unit(&format!("{:.6}", back)).unwrap();
            assert_eq!(units, reparsed, "round trip failed for {}", input);
        }
    }
}
