//! Pure arithmetic behind the register instructions.
//!
//! Every binary function takes its operands in encoding order: `(ωA, ωB)` for three-register
//! forms and `(ωB, νX)` for register-immediate forms. The `*_alt` variants swap the roles so
//! the immediate is the shifted or rotated value. 32-bit results go through [`x4`].

use crate::pvm::sign::{to_signed, x4};

pub type BinaryOp = fn(u64, u64) -> u64;
pub type UnaryOp = fn(u64) -> u64;
pub type Compare = fn(u64, u64) -> bool;

#[inline(always)]
fn s32(v: u64) -> i32 {
    v as u32 as i32
}

#[inline(always)]
fn s64(v: u64) -> i64 {
    to_signed(8, v)
}

#[inline(always)]
fn flag(b: bool) -> u64 {
    b as u64
}

// ==================== 32-bit ====================

pub fn add_32(a: u64, b: u64) -> u64 {
    x4(a.wrapping_add(b))
}

pub fn sub_32(a: u64, b: u64) -> u64 {
    x4(a.wrapping_sub(b))
}

pub fn mul_32(a: u64, b: u64) -> u64 {
    x4(a.wrapping_mul(b))
}

pub fn div_u_32(a: u64, b: u64) -> u64 {
    match b as u32 {
        0 => u64::MAX,
        d => x4(((a as u32) / d) as u64),
    }
}

pub fn div_s_32(a: u64, b: u64) -> u64 {
    match s32(b) {
        0 => u64::MAX,
        d => s32(a).wrapping_div(d) as i64 as u64,
    }
}

pub fn rem_u_32(a: u64, b: u64) -> u64 {
    match b as u32 {
        0 => x4(a),
        d => x4(((a as u32) % d) as u64),
    }
}

pub fn rem_s_32(a: u64, b: u64) -> u64 {
    match s32(b) {
        0 => x4(a),
        d => s32(a).wrapping_rem(d) as i64 as u64,
    }
}

pub fn shlo_l_32(a: u64, b: u64) -> u64 {
    x4(((a as u32) << (b % 32)) as u64)
}

pub fn shlo_r_32(a: u64, b: u64) -> u64 {
    x4(((a as u32) >> (b % 32)) as u64)
}

pub fn shar_r_32(a: u64, b: u64) -> u64 {
    (s32(a) >> (b % 32)) as i64 as u64
}

pub fn rot_l_32(a: u64, b: u64) -> u64 {
    x4((a as u32).rotate_left((b % 32) as u32) as u64)
}

pub fn rot_r_32(a: u64, b: u64) -> u64 {
    x4((a as u32).rotate_right((b % 32) as u32) as u64)
}

pub fn neg_add_32(b: u64, x: u64) -> u64 {
    x4(x.wrapping_sub(b))
}

pub fn shlo_l_alt_32(b: u64, x: u64) -> u64 {
    shlo_l_32(x, b)
}

pub fn shlo_r_alt_32(b: u64, x: u64) -> u64 {
    shlo_r_32(x, b)
}

pub fn shar_r_alt_32(b: u64, x: u64) -> u64 {
    shar_r_32(x, b)
}

pub fn rot_r_alt_32(b: u64, x: u64) -> u64 {
    rot_r_32(x, b)
}

// ==================== 64-bit ====================

pub fn add_64(a: u64, b: u64) -> u64 {
    a.wrapping_add(b)
}

pub fn sub_64(a: u64, b: u64) -> u64 {
    a.wrapping_sub(b)
}

pub fn mul_64(a: u64, b: u64) -> u64 {
    a.wrapping_mul(b)
}

pub fn div_u_64(a: u64, b: u64) -> u64 {
    a.checked_div(b).unwrap_or(u64::MAX)
}

pub fn div_s_64(a: u64, b: u64) -> u64 {
    match s64(b) {
        0 => u64::MAX,
        d => s64(a).wrapping_div(d) as u64,
    }
}

pub fn rem_u_64(a: u64, b: u64) -> u64 {
    a.checked_rem(b).unwrap_or(a)
}

pub fn rem_s_64(a: u64, b: u64) -> u64 {
    match s64(b) {
        0 => a,
        d => s64(a).wrapping_rem(d) as u64,
    }
}

pub fn shlo_l_64(a: u64, b: u64) -> u64 {
    a << (b % 64)
}

pub fn shlo_r_64(a: u64, b: u64) -> u64 {
    a >> (b % 64)
}

pub fn shar_r_64(a: u64, b: u64) -> u64 {
    (s64(a) >> (b % 64)) as u64
}

pub fn rot_l_64(a: u64, b: u64) -> u64 {
    a.rotate_left((b % 64) as u32)
}

pub fn rot_r_64(a: u64, b: u64) -> u64 {
    a.rotate_right((b % 64) as u32)
}

pub fn neg_add_64(b: u64, x: u64) -> u64 {
    x.wrapping_sub(b)
}

pub fn shlo_l_alt_64(b: u64, x: u64) -> u64 {
    shlo_l_64(x, b)
}

pub fn shlo_r_alt_64(b: u64, x: u64) -> u64 {
    shlo_r_64(x, b)
}

pub fn shar_r_alt_64(b: u64, x: u64) -> u64 {
    shar_r_64(x, b)
}

pub fn rot_r_alt_64(b: u64, x: u64) -> u64 {
    rot_r_64(x, b)
}

pub fn mul_upper_s_s(a: u64, b: u64) -> u64 {
    ((s64(a) as i128 * s64(b) as i128) >> 64) as u64
}

pub fn mul_upper_u_u(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

pub fn mul_upper_s_u(a: u64, b: u64) -> u64 {
    ((s64(a) as i128 * b as i128) >> 64) as u64
}

// ==================== Bitwise and comparison ====================

pub fn and(a: u64, b: u64) -> u64 {
    a & b
}

pub fn xor(a: u64, b: u64) -> u64 {
    a ^ b
}

pub fn or(a: u64, b: u64) -> u64 {
    a | b
}

pub fn and_inv(a: u64, b: u64) -> u64 {
    a & !b
}

pub fn or_inv(a: u64, b: u64) -> u64 {
    a | !b
}

pub fn xnor(a: u64, b: u64) -> u64 {
    !(a ^ b)
}

pub fn max(a: u64, b: u64) -> u64 {
    s64(a).max(s64(b)) as u64
}

pub fn max_u(a: u64, b: u64) -> u64 {
    a.max(b)
}

pub fn min(a: u64, b: u64) -> u64 {
    s64(a).min(s64(b)) as u64
}

pub fn min_u(a: u64, b: u64) -> u64 {
    a.min(b)
}

pub fn set_lt_u(a: u64, b: u64) -> u64 {
    flag(a < b)
}

pub fn set_lt_s(a: u64, b: u64) -> u64 {
    flag(s64(a) < s64(b))
}

pub fn set_gt_u(a: u64, b: u64) -> u64 {
    flag(a > b)
}

pub fn set_gt_s(a: u64, b: u64) -> u64 {
    flag(s64(a) > s64(b))
}

// ==================== Unary ====================

pub fn identity(a: u64) -> u64 {
    a
}

pub fn count_set_bits_64(a: u64) -> u64 {
    a.count_ones() as u64
}

pub fn count_set_bits_32(a: u64) -> u64 {
    (a as u32).count_ones() as u64
}

pub fn leading_zero_bits_64(a: u64) -> u64 {
    a.leading_zeros() as u64
}

pub fn leading_zero_bits_32(a: u64) -> u64 {
    (a as u32).leading_zeros() as u64
}

pub fn trailing_zero_bits_64(a: u64) -> u64 {
    a.trailing_zeros() as u64
}

pub fn trailing_zero_bits_32(a: u64) -> u64 {
    (a as u32).trailing_zeros() as u64
}

pub fn sign_extend_8(a: u64) -> u64 {
    a as u8 as i8 as i64 as u64
}

pub fn sign_extend_16(a: u64) -> u64 {
    a as u16 as i16 as i64 as u64
}

pub fn zero_extend_16(a: u64) -> u64 {
    a as u16 as u64
}

pub fn reverse_bytes(a: u64) -> u64 {
    a.swap_bytes()
}

// ==================== Branch conditions ====================

pub fn eq(a: u64, b: u64) -> bool {
    a == b
}

pub fn ne(a: u64, b: u64) -> bool {
    a != b
}

pub fn lt_u(a: u64, b: u64) -> bool {
    a < b
}

pub fn le_u(a: u64, b: u64) -> bool {
    a <= b
}

pub fn ge_u(a: u64, b: u64) -> bool {
    a >= b
}

pub fn gt_u(a: u64, b: u64) -> bool {
    a > b
}

pub fn lt_s(a: u64, b: u64) -> bool {
    s64(a) < s64(b)
}

pub fn le_s(a: u64, b: u64) -> bool {
    s64(a) <= s64(b)
}

pub fn ge_s(a: u64, b: u64) -> bool {
    s64(a) >= s64(b)
}

pub fn gt_s(a: u64, b: u64) -> bool {
    s64(a) > s64(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG1: u64 = u64::MAX;

    #[test]
    fn thirty_two_bit_results_are_sign_extended() {
        assert_eq!(add_32(0x7FFF_FFFF, 1), 0xFFFF_FFFF_8000_0000);
        assert_eq!(add_32(0xFFFF_FFFF_0000_0001, 1), 2);
        assert_eq!(sub_32(0, 1), NEG1);
        assert_eq!(mul_32(0x1_0000, 0x1_0000), 0);
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(div_u_32(7, 0), NEG1);
        assert_eq!(div_s_32(7, 0), NEG1);
        assert_eq!(div_u_64(7, 0), NEG1);
        assert_eq!(div_s_64(7, 0), NEG1);
        // high half ignored for 32-bit forms
        assert_eq!(div_u_32(7, 0x1_0000_0000), NEG1);
    }

    #[test]
    fn remainder_by_zero_returns_dividend() {
        assert_eq!(rem_u_64(9, 0), 9);
        assert_eq!(rem_s_64(NEG1, 0), NEG1);
        assert_eq!(rem_u_32(0x1_8000_0000, 0), 0xFFFF_FFFF_8000_0000);
        assert_eq!(rem_s_32(5, 0), 5);
    }

    #[test]
    fn signed_overflow_division() {
        let min64 = i64::MIN as u64;
        assert_eq!(div_s_64(min64, NEG1), min64);
        assert_eq!(rem_s_64(min64, NEG1), 0);
        let min32 = i32::MIN as i64 as u64;
        assert_eq!(div_s_32(min32, NEG1), min32);
        assert_eq!(rem_s_32(min32, NEG1), 0);
    }

    #[test]
    fn signed_remainder_takes_dividend_sign() {
        assert_eq!(rem_s_64((-7i64) as u64, 3), (-1i64) as u64);
        assert_eq!(rem_s_64(7, (-3i64) as u64), 1);
        assert_eq!(div_s_64((-7i64) as u64, 2), (-3i64) as u64);
    }

    #[test]
    fn shifts_mask_their_amount() {
        assert_eq!(shlo_l_64(1, 65), 2);
        assert_eq!(shlo_l_32(1, 33), 2);
        assert_eq!(shlo_l_32(1, 31), 0xFFFF_FFFF_8000_0000);
        assert_eq!(shar_r_64(NEG1 << 4, 4), NEG1);
        assert_eq!(shar_r_32(0x8000_0000, 31), NEG1);
        assert_eq!(shlo_r_32(0xFFFF_FFFF_FFFF_FFFF, 28), 0xF);
    }

    #[test]
    fn alt_forms_swap_operands() {
        // register holds the shift amount, immediate is shifted
        assert_eq!(shlo_l_alt_64(3, 1), 8);
        assert_eq!(shlo_r_alt_32(4, 0x100), 0x10);
        assert_eq!(neg_add_64(3, 10), 7);
        assert_eq!(neg_add_32(10, 3), x4((-7i64) as u64));
        assert_eq!(rot_r_alt_64(1, 1), 1 << 63);
    }

    #[test]
    fn rotates() {
        assert_eq!(rot_l_64(1 << 63, 1), 1);
        assert_eq!(rot_r_32(1, 1), 0xFFFF_FFFF_8000_0000);
        assert_eq!(rot_l_32(0x8000_0000, 1), 1);
    }

    #[test]
    fn mul_upper_variants() {
        assert_eq!(mul_upper_u_u(NEG1, NEG1), NEG1 - 1);
        assert_eq!(mul_upper_s_s(NEG1, NEG1), 0);
        assert_eq!(mul_upper_s_u(NEG1, 2), NEG1);
        assert_eq!(mul_upper_u_u(1 << 32, 1 << 32), 1);
    }

    #[test]
    fn bitwise_and_min_max() {
        assert_eq!(and_inv(0b1100, 0b1010), 0b0100);
        assert_eq!(or_inv(0, NEG1), 0);
        assert_eq!(xnor(0, 0), NEG1);
        assert_eq!(max(NEG1, 1), 1);
        assert_eq!(max_u(NEG1, 1), NEG1);
        assert_eq!(min(NEG1, 1), NEG1);
        assert_eq!(min_u(NEG1, 1), 1);
    }

    #[test]
    fn comparisons() {
        assert_eq!(set_lt_u(1, NEG1), 1);
        assert_eq!(set_lt_s(1, NEG1), 0);
        assert_eq!(set_gt_s(1, NEG1), 1);
        assert!(ge_s(0, NEG1));
        assert!(!ge_u(0, NEG1));
    }

    #[test]
    fn unary_ops() {
        assert_eq!(count_set_bits_64(NEG1), 64);
        assert_eq!(count_set_bits_32(NEG1), 32);
        assert_eq!(leading_zero_bits_64(1), 63);
        assert_eq!(leading_zero_bits_32(1), 31);
        assert_eq!(trailing_zero_bits_64(0), 64);
        assert_eq!(trailing_zero_bits_32(0), 32);
        assert_eq!(sign_extend_8(0x80), 0xFFFF_FFFF_FFFF_FF80);
        assert_eq!(sign_extend_16(0x1_7FFF), 0x7FFF);
        assert_eq!(zero_extend_16(NEG1), 0xFFFF);
        assert_eq!(reverse_bytes(0x0102_0304_0506_0708), 0x0807_0605_0403_0201);
    }
}
