//! Conversions between the unsigned register representation and its signed views.
//!
//! Registers always hold an unsigned 64-bit word. Instructions that need two's-complement
//! semantics convert at the point of use with the functions below; `width` is a byte count in
//! `{1, 2, 4, 8}`.

/// Interprets the low `width` bytes of `value` as a two's-complement number.
///
/// Equivalent to `value − 2^(8·width)` when `value ≥ 2^(8·width−1)`, `value` otherwise.
#[inline(always)]
pub const fn to_signed(width: u32, value: u64) -> i64 {
    let bits = 8 * width;
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Maps a signed number back into `[0, 2^(8·width))`.
#[inline(always)]
pub const fn to_unsigned(width: u32, value: i64) -> u64 {
    let bits = 8 * width;
    if bits >= 64 {
        return value as u64;
    }
    (value as u64) & ((1u64 << bits) - 1)
}

/// Sign-extends the low `width` bytes of `value` to a full 64-bit word (`X_n`).
///
/// A zero width yields zero.
#[inline(always)]
pub const fn sign_extend(width: u32, value: u64) -> u64 {
    if width == 0 {
        return 0;
    }
    to_signed(width, value) as u64
}

/// Truncates to 32 bits and sign-extends, the result convention of every 32-bit instruction.
#[inline(always)]
pub const fn x4(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}
