//! Conversion between text and '0'/'1' bit strings
//!
//! Each character is carried as one byte (its code point truncated to 8 bits),
//! most significant bit first.

use crate::error::{LinkError, Result};

/// Encode every character of `text` as exactly 8 bits, MSB first
pub fn bytes_to_bitstring(text: &str) -> String {
    let mut bits = String::with_capacity(text.chars().count() * 8);
    for c in text.chars() {
        let byte = c as u32 as u8;
        for shift in (0..8).rev() {
            bits.push(if (byte >> shift) & 1 == 1 { '1' } else { '0' });
        }
    }
    bits
}

/// Decode a bit string produced by [`bytes_to_bitstring`]
///
/// Lengths that are not a multiple of 8 are rejected rather than truncated.
/// Each byte maps to the character with the same code point.
pub fn bitstring_to_bytes(bits: &str) -> Result<String> {
    let raw = bits.as_bytes();
    if raw.len() % 8 != 0 {
        return Err(LinkError::MalformedLength(raw.len()));
    }

    let mut text = String::with_capacity(raw.len() / 8);
    for chunk in raw.chunks(8) {
        let mut byte = 0u8;
        for &b in chunk {
            byte <<= 1;
            match b {
                b'1' => byte |= 1,
                b'0' => {}
                other => return Err(LinkError::InvalidBit(other as char)),
            }
        }
        text.push(byte as char);
    }
    Ok(text)
}
