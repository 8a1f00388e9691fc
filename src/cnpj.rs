//! CNPJ normalization, validation and formatting.
//!
//! A CNPJ is the 14-digit Brazilian registry number for legal entities; the
//! last two digits are check digits computed with the Receita Federal mod-11
//! algorithm. Everything here is a pure function over strings.

use std::fmt;

/// Error returned when formatting a value that is not a 14-digit CNPJ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength(pub usize);

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CNPJ must have 14 digits, got {}", self.0)
    }
}

impl std::error::Error for InvalidLength {}

/// Strips every non-digit character from the input.
pub fn clean(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates a CNPJ using the official check-digit algorithm.
///
/// Accepts formatted or unformatted input. Returns false for anything that
/// is not exactly 14 digits after cleaning, for repeated-digit sequences
/// (e.g. `11111111111111`), and for mismatched check digits.
pub fn validate(raw: &str) -> bool {
    let digits = clean(raw);

    if digits.len() != 14 {
        return false;
    }

    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();

    // Known-invalid sequences: all digits identical
    if nums.iter().all(|&d| d == nums[0]) {
        return false;
    }

    check_digit(&nums[..12]) == nums[12] && check_digit(&nums[..13]) == nums[13]
}

/// Computes a mod-11 check digit over the given prefix.
///
/// Weights cycle 2..=9 starting from the rightmost digit; a remainder below
/// 2 maps to 0, anything else to `11 - remainder`.
fn check_digit(prefix: &[u32]) -> u32 {
    let mut weight = 2u32;
    let mut sum = 0u32;

    for &digit in prefix.iter().rev() {
        sum += digit * weight;
        weight = if weight == 9 { 2 } else { weight + 1 };
    }

    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Formats a CNPJ as `NN.NNN.NNN/NNNN-NN`.
///
/// Cleans the input first; fails if the result is not exactly 14 digits.
pub fn format(raw: &str) -> Result<String, InvalidLength> {
    let digits = clean(raw);

    if digits.len() != 14 {
        return Err(InvalidLength(digits.len()));
    }

    Ok(std::format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    ))
}
