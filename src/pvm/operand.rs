//! Argument decoding for every [`ArgFamily`].
//!
//! Decoders are total: any byte slice, including an empty one, yields an [`Args`] value.
//! Immediates read `min(4, available)` bytes (8 for the extended form) and are sign-extended
//! to 64 bits from the width actually encoded; missing bytes read as zero. Register nibbles
//! are clamped to the last register. Jump offsets are resolved against the instruction's own
//! address at decode time, so [`Args`] carries absolute targets.

use crate::pvm::isa::ArgFamily;
use crate::pvm::sign::sign_extend;
use crate::pvm::vm::registers::Reg;
use crate::types::encoding::le_value;

/// Decoded argument record of one instruction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Args {
    NoArgs,
    OneImm { vx: u64 },
    OneRegExtImm { ra: Reg, vx: u64 },
    TwoImm { vx: u64, vy: u64 },
    OneOffset { target: u32 },
    OneRegOneImm { ra: Reg, vx: u64 },
    OneRegTwoImm { ra: Reg, vx: u64, vy: u64 },
    OneRegImmOffset { ra: Reg, vx: u64, target: u32 },
    TwoReg { rd: Reg, ra: Reg },
    TwoRegOneImm { ra: Reg, rb: Reg, vx: u64 },
    TwoRegOneOffset { ra: Reg, rb: Reg, target: u32 },
    TwoRegTwoImm { ra: Reg, rb: Reg, vx: u64, vy: u64 },
    ThreeReg { ra: Reg, rb: Reg, rd: Reg },
}

/// Cursor over an instruction's argument bytes that reads zeros past the end.
struct ArgReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ArgReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Number of argument bytes the instruction actually carries.
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn byte(&self, at: usize) -> u8 {
        self.bytes.get(at).copied().unwrap_or(0)
    }

    /// Low nibble of byte `at` as a register.
    fn reg_lo(&self, at: usize) -> Reg {
        Reg::clamped(self.byte(at) & 0x0F)
    }

    /// High nibble of byte `at` as a register.
    fn reg_hi(&self, at: usize) -> Reg {
        Reg::clamped(self.byte(at) >> 4)
    }

    /// Reads `width` bytes at `at` little-endian, without sign extension.
    fn raw(&self, at: usize, width: usize) -> u64 {
        let start = at.min(self.bytes.len());
        let end = at.saturating_add(width).min(self.bytes.len());
        le_value(&self.bytes[start..end])
    }

    /// Reads a `width`-byte immediate and sign-extends it to 64 bits.
    fn imm(&self, at: usize, width: usize) -> u64 {
        sign_extend(width as u32, self.raw(at, width))
    }

    /// Width of a trailing immediate that starts at `at` and runs to the end, capped at 4.
    fn tail_width(&self, at: usize) -> usize {
        self.len().saturating_sub(at).min(4)
    }
}

/// Resolves a signed offset relative to `pc` into an absolute 32-bit target.
#[inline(always)]
fn offset_target(pc: u32, offset: u64) -> u32 {
    pc.wrapping_add(offset as u32)
}

/// Decodes `bytes` (the argument bytes following the opcode at `pc`) as `family`.
pub fn decode(family: ArgFamily, bytes: &[u8], pc: u32) -> Args {
    let r = ArgReader::new(bytes);
    match family {
        ArgFamily::NoArgs => Args::NoArgs,
        ArgFamily::OneImm => Args::OneImm {
            vx: r.imm(0, r.tail_width(0)),
        },
        ArgFamily::OneRegExtImm => Args::OneRegExtImm {
            ra: r.reg_lo(0),
            vx: r.raw(1, 8),
        },
        ArgFamily::TwoImm => {
            let lx = (r.byte(0) % 8).min(4) as usize;
            let ly = r.tail_width(1 + lx);
            Args::TwoImm {
                vx: r.imm(1, lx),
                vy: r.imm(1 + lx, ly),
            }
        }
        ArgFamily::OneOffset => Args::OneOffset {
            target: offset_target(pc, r.imm(0, r.tail_width(0))),
        },
        ArgFamily::OneRegOneImm => Args::OneRegOneImm {
            ra: r.reg_lo(0),
            vx: r.imm(1, r.tail_width(1)),
        },
        ArgFamily::OneRegTwoImm => {
            let lx = ((r.byte(0) >> 4) % 8).min(4) as usize;
            let ly = r.tail_width(1 + lx);
            Args::OneRegTwoImm {
                ra: r.reg_lo(0),
                vx: r.imm(1, lx),
                vy: r.imm(1 + lx, ly),
            }
        }
        ArgFamily::OneRegImmOffset => {
            let lx = ((r.byte(0) >> 4) % 8).min(4) as usize;
            let ly = r.tail_width(1 + lx);
            Args::OneRegImmOffset {
                ra: r.reg_lo(0),
                vx: r.imm(1, lx),
                target: offset_target(pc, r.imm(1 + lx, ly)),
            }
        }
        ArgFamily::TwoReg => Args::TwoReg {
            rd: r.reg_lo(0),
            ra: r.reg_hi(0),
        },
        ArgFamily::TwoRegOneImm => Args::TwoRegOneImm {
            ra: r.reg_lo(0),
            rb: r.reg_hi(0),
            vx: r.imm(1, r.tail_width(1)),
        },
        ArgFamily::TwoRegOneOffset => Args::TwoRegOneOffset {
            ra: r.reg_lo(0),
            rb: r.reg_hi(0),
            target: offset_target(pc, r.imm(1, r.tail_width(1))),
        },
        ArgFamily::TwoRegTwoImm => {
            let lx = (r.byte(1) % 8).min(4) as usize;
            let ly = r.tail_width(2 + lx);
            Args::TwoRegTwoImm {
                ra: r.reg_lo(0),
                rb: r.reg_hi(0),
                vx: r.imm(2, lx),
                vy: r.imm(2 + lx, ly),
            }
        }
        ArgFamily::ThreeReg => Args::ThreeReg {
            ra: r.reg_lo(0),
            rb: r.reg_hi(0),
            rd: Reg::clamped(r.byte(1)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(i: u8) -> Reg {
        Reg::clamped(i)
    }

    #[test]
    fn empty_input_decodes_to_zeros() {
        assert_eq!(decode(ArgFamily::OneImm, &[], 0), Args::OneImm { vx: 0 });
        assert_eq!(
            decode(ArgFamily::ThreeReg, &[], 0),
            Args::ThreeReg {
                ra: reg(0),
                rb: reg(0),
                rd: reg(0)
            }
        );
        assert_eq!(decode(ArgFamily::OneOffset, &[], 7), Args::OneOffset { target: 7 });
        assert_eq!(
            decode(ArgFamily::TwoImm, &[], 0),
            Args::TwoImm { vx: 0, vy: 0 }
        );
    }

    #[test]
    fn registers_clamp_to_twelve() {
        assert_eq!(
            decode(ArgFamily::TwoReg, &[0xFF], 0),
            Args::TwoReg {
                rd: reg(12),
                ra: reg(12)
            }
        );
        assert_eq!(
            decode(ArgFamily::ThreeReg, &[0x21, 200], 0),
            Args::ThreeReg {
                ra: reg(1),
                rb: reg(2),
                rd: reg(12)
            }
        );
    }

    #[test]
    fn immediates_sign_extend_from_encoded_width() {
        assert_eq!(
            decode(ArgFamily::OneRegOneImm, &[0x08, 0xF6], 0),
            Args::OneRegOneImm {
                ra: reg(8),
                vx: 0xFFFF_FFFF_FFFF_FFF6
            }
        );
        assert_eq!(
            decode(ArgFamily::OneRegOneImm, &[0x07, 0xF6, 0x00], 0),
            Args::OneRegOneImm { ra: reg(7), vx: 0xF6 }
        );
        // only four bytes are read even if more are present
        assert_eq!(
            decode(ArgFamily::OneImm, &[1, 0, 0, 0, 0xFF], 0),
            Args::OneImm { vx: 1 }
        );
    }

    #[test]
    fn extended_immediate_is_not_sign_extended() {
        let mut bytes = vec![0x03];
        bytes.extend_from_slice(&0x8000_0000_0000_0001u64.to_le_bytes());
        assert_eq!(
            decode(ArgFamily::OneRegExtImm, &bytes, 0),
            Args::OneRegExtImm {
                ra: reg(3),
                vx: 0x8000_0000_0000_0001
            }
        );
        // short input pads with zeros
        assert_eq!(
            decode(ArgFamily::OneRegExtImm, &[0x01, 0xFF], 0),
            Args::OneRegExtImm { ra: reg(1), vx: 0xFF }
        );
    }

    #[test]
    fn two_immediates_split_by_first_byte() {
        // lx = 3, then one byte of vy
        assert_eq!(
            decode(ArgFamily::TwoImm, &[0x03, 0x00, 0x00, 0x02, 0x2A], 0),
            Args::TwoImm {
                vx: 0x2_0000,
                vy: 0x2A
            }
        );
        // lx field above 4 is capped
        assert_eq!(
            decode(ArgFamily::TwoImm, &[0x07, 1, 0, 0, 0, 5], 0),
            Args::TwoImm { vx: 1, vy: 5 }
        );
    }

    #[test]
    fn offsets_are_relative_to_pc() {
        assert_eq!(
            decode(ArgFamily::OneOffset, &[0xFD], 10),
            Args::OneOffset { target: 7 }
        );
        assert_eq!(
            decode(ArgFamily::TwoRegOneOffset, &[0x87, 0x04], 6),
            Args::TwoRegOneOffset {
                ra: reg(7),
                rb: reg(8),
                target: 10
            }
        );
        // lx = 1 (high nibble), vx = 0, offset -3
        assert_eq!(
            decode(ArgFamily::OneRegImmOffset, &[0x17, 0x00, 0xFD], 10),
            Args::OneRegImmOffset {
                ra: reg(7),
                vx: 0,
                target: 7
            }
        );
    }

    #[test]
    fn negative_offset_wraps_below_zero() {
        assert_eq!(
            decode(ArgFamily::OneOffset, &[0xFF], 0),
            Args::OneOffset { target: u32::MAX }
        );
    }

    #[test]
    fn two_reg_two_imm_layout() {
        assert_eq!(
            decode(ArgFamily::TwoRegTwoImm, &[0x21, 0x01, 0x05, 0x10], 0),
            Args::TwoRegTwoImm {
                ra: reg(1),
                rb: reg(2),
                vx: 5,
                vy: 0x10
            }
        );
    }
}
