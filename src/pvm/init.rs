//! Program blob initialization: memory zones and the initial register file.
//!
//! # Blob layout
//!
//! ```text
//! E3(|o|) ++ E3(|w|) ++ E2(z) ++ E3(s) ++ o ++ w ++ E4(|c|) ++ c
//! ```
//!
//! `o` is read-only data, `w` read-write data, `z` the number of extra heap pages after `w`,
//! `s` the stack size and `c` a code blob (see [`program`](super::program)).
//!
//! # Address space
//!
//! ```text
//! 0                      reserved (Zz)
//! Zz                     read-only data        Read,  P(|o|)
//! 2Zz + Z(|o|)           read-write data+heap  Write, P(|w|) + z·Zp
//! 2^32 − 2Zz − Zi − P(s) stack                 Write, P(s)
//! 2^32 − Zz − Zi         arguments             Read,  P(|a|)
//! ```
//!
//! Everything between the zones is unmapped.

use crate::pvm::constants::{
    HALT_ADDRESS, INPUT_SIZE, PAGE_SIZE, REGISTER_COUNT, ZONE_SIZE, page_align, zone_align,
};
use crate::pvm::errors::PvmError;
use crate::pvm::program::ParsedProgram;
use crate::pvm::vm::context::ExecutionContext;
use crate::pvm::vm::gas::Gas;
use crate::pvm::vm::memory::{Heap, Memory, PageAccess};
use crate::pvm::vm::registers::Registers;
use crate::types::encoding::{decode_fixed, encode_fixed, read_bytes};
use crate::warn;

const ADDRESS_SPACE: u64 = 1 << 32;

/// Start of the read-only data zone.
pub const RO_START: u32 = ZONE_SIZE;
/// One past the top of the stack.
pub const STACK_END: u32 = (ADDRESS_SPACE - 2 * ZONE_SIZE as u64 - INPUT_SIZE as u64) as u32;
/// Start of the argument zone.
pub const ARGS_START: u32 = (ADDRESS_SPACE - ZONE_SIZE as u64 - INPUT_SIZE as u64) as u32;

/// Decoded program blob, before any memory is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBlob<'a> {
    pub ro_data: &'a [u8],
    pub rw_data: &'a [u8],
    /// Extra heap pages following the read-write data.
    pub heap_pages: u16,
    pub stack_size: u32,
    /// Code blob.
    pub code: &'a [u8],
}

impl<'a> ProgramBlob<'a> {
    /// Splits a program blob into its parts. Trailing bytes after the code are rejected.
    pub fn decode(blob: &'a [u8]) -> Result<Self, PvmError> {
        let mut input = blob;
        let ro_len = decode_fixed(&mut input, 3)? as usize;
        let rw_len = decode_fixed(&mut input, 3)? as usize;
        let heap_pages = decode_fixed(&mut input, 2)? as u16;
        let stack_size = decode_fixed(&mut input, 3)? as u32;
        let ro_data = read_bytes(&mut input, ro_len)?;
        let rw_data = read_bytes(&mut input, rw_len)?;
        let code_len = decode_fixed(&mut input, 4)? as usize;
        let code = read_bytes(&mut input, code_len)?;
        if !input.is_empty() {
            return Err(PvmError::TrailingBytes(input.len()));
        }
        Ok(Self {
            ro_data,
            rw_data,
            heap_pages,
            stack_size,
            code,
        })
    }

    /// Bytes of address space the zones need: `5Zz + Z(|o|) + Z(|w| + z·Zp) + Z(s) + Zi`.
    pub fn required_address_space(&self) -> u64 {
        5 * ZONE_SIZE as u64
            + zone_align(self.ro_data.len() as u64)
            + zone_align(self.rw_data.len() as u64 + self.heap_pages as u64 * PAGE_SIZE as u64)
            + zone_align(self.stack_size as u64)
            + INPUT_SIZE as u64
    }

    /// Encodes the blob back into its byte form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_fixed(&mut out, self.ro_data.len() as u64, 3);
        encode_fixed(&mut out, self.rw_data.len() as u64, 3);
        encode_fixed(&mut out, self.heap_pages as u64, 2);
        encode_fixed(&mut out, self.stack_size as u64, 3);
        out.extend_from_slice(self.ro_data);
        out.extend_from_slice(self.rw_data);
        encode_fixed(&mut out, self.code.len() as u64, 4);
        out.extend_from_slice(self.code);
        out
    }
}

/// Program ready to run: parsed code plus initial registers and memory.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    pub program: ParsedProgram,
    pub registers: Registers,
    pub memory: Memory,
}

impl ProgramImage {
    /// Builds the execution context for a run starting at `ip` with `gas`.
    pub fn into_context(self, ip: u32, gas: Gas) -> (ParsedProgram, ExecutionContext) {
        let ctx = ExecutionContext::new(ip, gas, self.registers, self.memory);
        (self.program, ctx)
    }
}

/// Decodes `blob`, lays out its memory zones and writes `args` into the argument zone.
pub fn initialize(blob: &[u8], args: &[u8]) -> Result<ProgramImage, PvmError> {
    let result = build_image(blob, args);
    if let Err(err) = &result {
        warn!("rejected program blob: {err}");
    }
    result
}

fn build_image(blob: &[u8], args: &[u8]) -> Result<ProgramImage, PvmError> {
    let parts = ProgramBlob::decode(blob)?;
    let required = parts.required_address_space();
    if required > ADDRESS_SPACE {
        return Err(PvmError::AddressSpaceOverflow { required });
    }
    if args.len() > INPUT_SIZE as usize {
        return Err(PvmError::ArgumentTooLarge {
            len: args.len(),
            max: INPUT_SIZE as usize,
        });
    }
    let program = ParsedProgram::from_blob(parts.code)?;

    // every bound below fits in u32 once the address space check passed
    let ro_len = parts.ro_data.len() as u64;
    let rw_len = parts.rw_data.len() as u64;
    let rw_start = (2 * ZONE_SIZE as u64 + zone_align(ro_len)) as u32;
    let heap_start =
        (rw_start as u64 + page_align(rw_len) + parts.heap_pages as u64 * PAGE_SIZE as u64) as u32;
    let stack_start = (STACK_END as u64 - page_align(parts.stack_size as u64)) as u32;

    let mut memory = Memory::new();
    memory.map_range(RO_START, page_align(ro_len) as usize, PageAccess::Read);
    memory.map_range(rw_start, (heap_start - rw_start) as usize, PageAccess::Write);
    memory.map_range(stack_start, (STACK_END - stack_start) as usize, PageAccess::Write);
    memory.map_range(ARGS_START, page_align(args.len() as u64) as usize, PageAccess::Read);

    let seeded = [
        (RO_START, parts.ro_data),
        (rw_start, parts.rw_data),
        (ARGS_START, args),
    ];
    for (address, bytes) in seeded {
        memory.fill(address, bytes)?;
    }
    memory.set_heap(Heap {
        start: heap_start,
        pointer: heap_start,
        end: heap_start,
    });

    let mut regs = [0u64; REGISTER_COUNT];
    regs[0] = HALT_ADDRESS as u64;
    regs[1] = STACK_END as u64;
    regs[7] = ARGS_START as u64;
    regs[8] = args.len() as u64;

    Ok(ProgramImage {
        program,
        registers: Registers::from_array(regs),
        memory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pvm::isa::Instruction;
    use crate::utils::test_utils::utils::ProgramBuilder;

    fn code_blob() -> Vec<u8> {
        ProgramBuilder::new()
            .instr(Instruction::Trap, &[])
            .build()
            .to_blob()
    }

    fn blob(ro: &[u8], rw: &[u8], heap_pages: u16, stack: u32) -> Vec<u8> {
        let code = code_blob();
        ProgramBlob {
            ro_data: ro,
            rw_data: rw,
            heap_pages,
            stack_size: stack,
            code: &code,
        }
        .encode()
    }

    #[test]
    fn zone_constants() {
        assert_eq!(STACK_END, 0xFEFE_0000);
        assert_eq!(ARGS_START, 0xFEFF_0000);
    }

    #[test]
    fn registers_follow_calling_convention() {
        let image = initialize(&blob(&[], &[], 0, 0), b"hello").unwrap();
        let regs = image.registers.as_array();
        assert_eq!(regs[0], 0xFFFF_0000);
        assert_eq!(regs[1], 0xFEFE_0000);
        assert_eq!(regs[7], 0xFEFF_0000);
        assert_eq!(regs[8], 5);
        assert!(regs[2..7].iter().chain(&regs[9..]).all(|&r| r == 0));
    }

    #[test]
    fn zones_are_mapped_with_contents() {
        let image = initialize(&blob(b"ro", b"rw", 2, 100), b"args").unwrap();
        let mem = &image.memory;

        assert_eq!(mem.read_vec(RO_START, 2).unwrap(), b"ro".to_vec());
        assert!(mem.can_read(RO_START, PAGE_SIZE as usize));
        assert!(!mem.can_write(RO_START, 1));
        assert!(!mem.can_read(RO_START + PAGE_SIZE, 1));

        let rw_start = 2 * ZONE_SIZE + ZONE_SIZE;
        assert_eq!(mem.read_vec(rw_start, 2).unwrap(), b"rw".to_vec());
        assert!(mem.can_write(rw_start, 3 * PAGE_SIZE as usize));
        assert!(!mem.can_read(rw_start + 3 * PAGE_SIZE, 1));
        assert_eq!(
            mem.heap(),
            Heap {
                start: rw_start + 3 * PAGE_SIZE,
                pointer: rw_start + 3 * PAGE_SIZE,
                end: rw_start + 3 * PAGE_SIZE,
            }
        );

        assert!(mem.can_write(STACK_END - PAGE_SIZE, PAGE_SIZE as usize));
        assert!(!mem.can_read(STACK_END - PAGE_SIZE - 1, 1));
        assert!(!mem.can_read(STACK_END, 1));

        assert_eq!(mem.read_vec(ARGS_START, 4).unwrap(), b"args".to_vec());
        assert!(!mem.can_write(ARGS_START, 1));
        assert_eq!(mem.mapped_pages(), 1 + 3 + 1 + 1);
    }

    #[test]
    fn empty_sections_map_nothing() {
        let image = initialize(&blob(&[], &[], 0, 0), &[]).unwrap();
        assert_eq!(image.memory.mapped_pages(), 0);
    }

    #[test]
    fn address_space_requirement() {
        let code = code_blob();
        let parts = ProgramBlob {
            ro_data: &[1],
            rw_data: &[],
            heap_pages: 4,
            stack_size: ZONE_SIZE + 1,
            code: &code,
        };
        let expected = 5 * ZONE_SIZE as u64
            + ZONE_SIZE as u64
            + ZONE_SIZE as u64
            + 2 * ZONE_SIZE as u64
            + INPUT_SIZE as u64;
        assert_eq!(parts.required_address_space(), expected);
        // the largest encodable layout still fits
        let largest = ProgramBlob {
            ro_data: &[],
            rw_data: &[],
            heap_pages: u16::MAX,
            stack_size: 0xFF_FFFF,
            code: &code,
        };
        assert!(largest.required_address_space() <= ADDRESS_SPACE);
    }

    #[test]
    fn rejects_oversized_arguments() {
        let args = vec![0u8; INPUT_SIZE as usize + 1];
        assert_eq!(
            initialize(&blob(&[], &[], 0, 0), &args).map(|_| ()),
            Err(PvmError::ArgumentTooLarge {
                len: INPUT_SIZE as usize + 1,
                max: INPUT_SIZE as usize
            })
        );
    }

    #[test]
    fn rejects_truncated_and_trailing_input() {
        let good = blob(b"ro", &[], 0, 0);
        assert!(matches!(
            initialize(&good[..good.len() - 1], &[]),
            Err(PvmError::Decode(_))
        ));
        let mut long = good.clone();
        long.push(0);
        assert_eq!(
            initialize(&long, &[]).map(|_| ()),
            Err(PvmError::TrailingBytes(1))
        );
    }

    #[test]
    fn rejects_invalid_code() {
        let parts = ProgramBlob {
            ro_data: &[],
            rw_data: &[],
            heap_pages: 0,
            stack_size: 0,
            code: &[0, 0, 0],
        };
        assert_eq!(
            initialize(&parts.encode(), &[]).map(|_| ()),
            Err(PvmError::EmptyCode)
        );
    }
}
