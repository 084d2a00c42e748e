//! Binary codec primitives for program blobs.
//!
//! All multi-byte integers are little-endian.
//!
//! # Formats
//!
//! - `E_n(x)`: fixed-width, `n` bytes little-endian ([`decode_fixed`] / [`encode_fixed`])
//! - `E(x)`: variable-length natural number ([`decode_natural`] / [`encode_natural`]).
//!   The number of leading one bits in the first byte gives the count `l` of trailing
//!   little-endian bytes; the remaining low bits of the first byte hold `x / 2^(8l)`.
//!   A first byte of `0xFF` is followed by a full 8-byte value.
//! - Bit sequences: packed eight per byte, least-significant bit first ([`unpack_bits`] /
//!   [`pack_bits`]).
//!
//! Decoding functions take `&mut &[u8]` and advance the slice past the consumed bytes.

use pvm_derive::Error;

/// Errors that can occur during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before expected data was read.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },
    /// Fixed-width integers wider than 8 bytes are not representable.
    #[error("fixed-width integer of {0} bytes exceeds 8")]
    WidthTooLarge(usize),
    /// A decoded length does not fit the platform's `usize`.
    #[error("length {0} overflows usize")]
    LengthOverflow(u64),
}

/// Reads exactly `n` bytes from the input, advancing the slice.
pub fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof {
            needed: n,
            available: input.len(),
        });
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

/// Decodes `E_n`: an `n`-byte little-endian unsigned integer (`n <= 8`).
pub fn decode_fixed(input: &mut &[u8], n: usize) -> Result<u64, DecodeError> {
    if n > 8 {
        return Err(DecodeError::WidthTooLarge(n));
    }
    let bytes = read_bytes(input, n)?;
    Ok(le_value(bytes))
}

/// Interprets up to 8 bytes as a little-endian unsigned integer.
pub fn le_value(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i))
}

/// Decodes `E`: the variable-length natural number encoding.
pub fn decode_natural(input: &mut &[u8]) -> Result<u64, DecodeError> {
    let first = read_bytes(input, 1)?[0];
    if first == 0xFF {
        return decode_fixed(input, 8);
    }
    let len = first.leading_ones() as usize;
    let high = (first & (0xFF >> len)) as u64;
    let low = decode_fixed(input, len)?;
    Ok(low | high << (8 * len))
}

/// Decodes `E` and converts the result to a length.
pub fn decode_length(input: &mut &[u8]) -> Result<usize, DecodeError> {
    let value = decode_natural(input)?;
    usize::try_from(value).map_err(|_| DecodeError::LengthOverflow(value))
}

/// Appends `E_n(value)`, truncating `value` to its low `n` bytes.
pub fn encode_fixed(out: &mut Vec<u8>, value: u64, n: usize) {
    out.extend_from_slice(&value.to_le_bytes()[..n.min(8)]);
    out.extend(std::iter::repeat_n(0, n.saturating_sub(8)));
}

/// Appends `E(value)`.
pub fn encode_natural(out: &mut Vec<u8>, value: u64) {
    let len = (0..8).find(|&l| value < 1u64 << (7 * (l + 1))).unwrap_or(8);
    if len == 8 {
        out.push(0xFF);
        encode_fixed(out, value, 8);
        return;
    }
    let prefix = !(0xFFu8 >> len);
    out.push(prefix | (value >> (8 * len)) as u8);
    encode_fixed(out, value, len);
}

/// Unpacks `count` bits from `bytes`, least-significant bit of each byte first.
pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| bytes.get(i / 8).is_some_and(|b| (b >> (i % 8)) & 1 == 1))
        .collect()
}

/// Packs `bits` eight per byte, least-significant bit first.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, _) in bits.iter().enumerate().filter(|(_, bit)| **bit) {
        out[i / 8] |= 1 << (i % 8);
    }
    out
}
