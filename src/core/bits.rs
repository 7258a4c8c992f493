// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-width two's-complement bit-string conversions
//!
//! Hardware-level values are carried through the simulator as fixed-width
//! unsigned integers; this module converts them to and from MSB-first
//! `'0'`/`'1'` strings at the trace and loader boundaries. Arithmetic
//! overflow keeps the low bits; negative values take their two's-complement
//! form at the requested width.

/// Render a 32-bit word as a 32-character bit string, MSB first
///
/// # Example
/// ```
/// use mipsim::core::bits;
///
/// assert_eq!(bits::word_to_bits(5), "00000000000000000000000000000101");
/// ```
#[inline]
pub fn word_to_bits(value: u32) -> String {
    to_bits(u64::from(value), 32)
}

/// Render the low `width` bits of a value, MSB first
///
/// # Arguments
///
/// * `value` - The value to render; bits above `width` are discarded
/// * `width` - Number of output characters (1-64)
pub fn to_bits(value: u64, width: u32) -> String {
    debug_assert!((1..=64).contains(&width));
    (0..width)
        .rev()
        .map(|bit| if value >> bit & 1 == 1 { '1' } else { '0' })
        .collect()
}

/// Parse a 32-character binary string into a word
///
/// Returns `None` unless the input is exactly 32 characters drawn from
/// `{'0', '1'}`.
///
/// # Example
/// ```
/// use mipsim::core::bits;
///
/// let word = bits::parse_word("00000000000000000000000000000101");
/// assert_eq!(word, Some(5));
/// assert_eq!(bits::parse_word("101"), None);
/// ```
pub fn parse_word(text: &str) -> Option<u32> {
    if text.len() != 32 {
        return None;
    }
    let mut value: u32 = 0;
    for ch in text.chars() {
        value = match ch {
            '0' => value << 1,
            '1' => value << 1 | 1,
            _ => return None,
        };
    }
    Some(value)
}

/// Encode a signed integer as a `width`-bit two's-complement string
///
/// Values outside the representable range keep their low `width` bits,
/// mirroring overflow behavior in fixed-width hardware.
///
/// # Example
/// ```
/// use mipsim::core::bits;
///
/// assert_eq!(bits::encode_signed(-1, 4), "1111");
/// assert_eq!(bits::encode_signed(5, 8), "00000101");
/// ```
pub fn encode_signed(value: i64, width: u32) -> String {
    to_bits(value as u64, width)
}

/// Decode a two's-complement bit string into a signed integer
///
/// The string's length is its width; widths up to 63 bits are supported.
///
/// # Example
/// ```
/// use mipsim::core::bits;
///
/// assert_eq!(bits::decode_signed("1111"), -1);
/// assert_eq!(bits::decode_signed("0101"), 5);
/// ```
pub fn decode_signed(text: &str) -> i64 {
    let width = text.len() as u32;
    debug_assert!((1..=63).contains(&width));
    let raw = decode_unsigned(text);
    if raw >> (width - 1) & 1 == 1 {
        raw as i64 - (1i64 << width)
    } else {
        raw as i64
    }
}

/// Decode a bit string as an unsigned integer
#[inline]
pub fn decode_unsigned(text: &str) -> u64 {
    text.chars()
        .fold(0, |acc, ch| acc << 1 | u64::from(ch == '1'))
}

/// Sign-extend a 16-bit immediate to 32 bits
#[inline(always)]
pub fn sign_extend16(imm: u16) -> u32 {
    imm as i16 as i32 as u32
}

/// Reinterpret a 32-bit word as a signed integer
#[inline(always)]
pub fn as_signed(value: u32) -> i32 {
    value as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_word_to_bits_width() {
        assert_eq!(word_to_bits(0).len(), 32);
        assert_eq!(word_to_bits(u32::MAX).len(), 32);
        assert_eq!(word_to_bits(u32::MAX), "1".repeat(32));
    }

    #[test]
    fn test_parse_word_rejects_bad_input() {
        assert_eq!(parse_word(""), None);
        assert_eq!(parse_word(&"0".repeat(31)), None);
        assert_eq!(parse_word(&"0".repeat(33)), None);
        assert_eq!(parse_word(&format!("{}2", "0".repeat(31))), None);
        assert_eq!(parse_word(&format!("{} ", "0".repeat(31))), None);
    }

    #[test]
    fn test_encode_signed_negative() {
        assert_eq!(encode_signed(-5, 32), "11111111111111111111111111111011");
        assert_eq!(encode_signed(-8, 4), "1000");
    }

    #[test]
    fn test_encode_signed_truncates_overflow() {
        // 2^32 + 1 keeps the low 32 bits
        assert_eq!(
            encode_signed((1i64 << 32) + 1, 32),
            "00000000000000000000000000000001"
        );
    }

    #[test]
    fn test_sign_extend16() {
        assert_eq!(sign_extend16(5), 5);
        assert_eq!(sign_extend16(0xFFFF), 0xFFFF_FFFF);
        assert_eq!(sign_extend16(0x8000), 0xFFFF_8000);
        assert_eq!(sign_extend16(0x7FFF), 0x0000_7FFF);
    }

    proptest! {
        #[test]
        fn prop_word_round_trip(value: u32) {
            prop_assert_eq!(parse_word(&word_to_bits(value)), Some(value));
        }

        #[test]
        fn prop_sign_extension_round_trip(width in 1u32..=32, raw: i64) {
            // Clamp into [-2^(w-1), 2^(w-1))
            let bound = 1i64 << (width - 1);
            let value = raw.rem_euclid(2 * bound) - bound;
            prop_assert_eq!(decode_signed(&encode_signed(value, width)), value);
        }

        #[test]
        fn prop_encoded_width(value: i64, width in 1u32..=64) {
            prop_assert_eq!(encode_signed(value, width).len(), width as usize);
        }
    }
}
