//! Bit-level view of hex digests and the proof-of-work predicate.

use crate::constants::BITS_PER_HEX_DIGIT;
use crate::difficulty::Difficulty;
use thiserror::Error;

const NIBBLES: [&str; 16] = [
    "0000", "0001", "0010", "0011", "0100", "0101", "0110", "0111", "1000", "1001", "1010",
    "1011", "1100", "1101", "1110", "1111",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("invalid hex digit {digit:?} at position {index}")]
    InvalidDigit { index: usize, digit: char },
}

/// Exact binary expansion of a hex string, four bits per hex digit.
pub fn hex_to_binary(hex: &str) -> Result<String, HexError> {
    let mut out = String::with_capacity(hex.len() * BITS_PER_HEX_DIGIT);
    for (index, digit) in hex.chars().enumerate() {
        let nibble = digit
            .to_digit(16)
            .ok_or(HexError::InvalidDigit { index, digit })?;
        out.push_str(NIBBLES[nibble as usize]);
    }
    Ok(out)
}

/// Number of leading zero bits in the binary expansion of `hex`.
pub fn leading_zero_bits(hex: &str) -> Result<u32, HexError> {
    let mut total = 0u32;
    for (index, digit) in hex.chars().enumerate() {
        let nibble = digit
            .to_digit(16)
            .ok_or(HexError::InvalidDigit { index, digit })?;
        if nibble == 0 {
            total += BITS_PER_HEX_DIGIT as u32;
        } else {
            // A nibble occupies the low four bits of a u32.
            total += nibble.leading_zeros() - (u32::BITS - BITS_PER_HEX_DIGIT as u32);
            break;
        }
    }
    Ok(total)
}

/// Proof-of-work predicate: the expansion of `hash` begins with at least
/// `difficulty` zero bits. Malformed hex never satisfies it.
pub fn meets_difficulty(hash: &str, difficulty: Difficulty) -> bool {
    let Ok(bits) = hex_to_binary(hash) else {
        return false;
    };
    let wanted = difficulty.get() as usize;
    bits.len() >= wanted && bits.bytes().take(wanted).all(|b| b == b'0')
}
