//! Program representation, code-blob codec and the parsed instruction index.
//!
//! [`Program`] holds the raw code, the instruction-boundary mask and the jump table.
//! [`ParsedProgram`] is derived from it once and caches, per instruction, the opcode, the
//! argument length (`skip`), the decoded arguments and the gas cost, plus the set of basic
//! block beginnings that branches and jumps may target. Both are immutable after
//! construction and can be shared between concurrent invocations.
//!
//! # Code blob
//!
//! ```text
//! E(|j|) ++ E1(z) ++ E(|c|) ++ E_z(j_0) ++ … ++ E_z(j_{|j|-1}) ++ c ++ pack(k)
//! ```
//!
//! `z` is the jump-table entry width in bytes and `pack(k)` the boundary mask, eight flags per
//! byte, least-significant bit first.

use crate::pvm::errors::PvmError;
use crate::pvm::isa::Instruction;
use crate::pvm::operand::{Args, decode};
use crate::pvm::vm::gas::{Gas, GasTable};
use crate::types::encoding::{
    decode_fixed, decode_length, encode_fixed, encode_natural, pack_bits, read_bytes,
    unpack_bits,
};

/// Raw program: code bytes, instruction-boundary mask and jump table.
///
/// Invariant: the code is non-empty, the mask has one flag per code byte, and byte 0 is a
/// boundary naming a registered instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program {
    code: Vec<u8>,
    mask: Vec<bool>,
    jump_table: Vec<u32>,
}

impl Program {
    /// Builds a program, rejecting code that does not start with a valid instruction.
    pub fn new(code: Vec<u8>, mask: Vec<bool>, jump_table: Vec<u32>) -> Result<Self, PvmError> {
        if code.is_empty() {
            return Err(PvmError::EmptyCode);
        }
        if mask.len() != code.len() {
            return Err(PvmError::MaskLengthMismatch {
                mask: mask.len(),
                code: code.len(),
            });
        }
        if !mask[0] {
            return Err(PvmError::FirstByteNotBoundary);
        }
        if Instruction::from_opcode(code[0]).is_none() {
            return Err(PvmError::InvalidFirstInstruction(code[0]));
        }
        Ok(Self {
            code,
            mask,
            jump_table,
        })
    }

    /// Decodes a code blob.
    ///
    /// Bytes after the packed mask are rejected.
    pub fn from_blob(blob: &[u8]) -> Result<Self, PvmError> {
        let mut input = blob;
        let table_len = decode_length(&mut input)?;
        let width = read_bytes(&mut input, 1)?[0];
        let code_len = decode_length(&mut input)?;
        if table_len > 0 && !(1..=4).contains(&width) {
            return Err(PvmError::InvalidJumpTableWidth(width));
        }

        let jump_table = (0..table_len)
            .map(|_| decode_fixed(&mut input, width as usize).map(|v| v as u32))
            .collect::<Result<Vec<_>, _>>()?;
        let code = read_bytes(&mut input, code_len)?.to_vec();
        let packed = read_bytes(&mut input, code_len.div_ceil(8))?;
        let mask = unpack_bits(packed, code_len);

        if !input.is_empty() {
            return Err(PvmError::TrailingBytes(input.len()));
        }
        Self::new(code, mask, jump_table)
    }

    /// Encodes the program as a code blob, using the narrowest jump-table width that fits.
    pub fn to_blob(&self) -> Vec<u8> {
        let width = self
            .jump_table
            .iter()
            .map(|&t| (4 - t.leading_zeros() / 8).max(1) as u8)
            .max()
            .unwrap_or(0);

        let mut out = Vec::with_capacity(self.code.len() * 2);
        encode_natural(&mut out, self.jump_table.len() as u64);
        out.push(width);
        encode_natural(&mut out, self.code.len() as u64);
        for &target in &self.jump_table {
            encode_fixed(&mut out, target as u64, width as usize);
        }
        out.extend_from_slice(&self.code);
        out.extend(pack_bits(&self.mask));
        out
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn jump_table(&self) -> &[u32] {
        &self.jump_table
    }
}

/// One decoded instruction of a [`ParsedProgram`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ParsedInstruction {
    /// Raw opcode byte.
    pub opcode: u8,
    /// Registered instruction, `None` if the opcode is unknown.
    pub instruction: Option<Instruction>,
    /// Number of argument bytes following the opcode.
    pub skip: u32,
    /// Gas charged for executing this instruction.
    pub gas: Gas,
    /// Arguments, with jump offsets already resolved to absolute targets.
    pub args: Args,
}

/// Program plus its per-instruction index.
#[derive(Clone, Debug)]
pub struct ParsedProgram {
    program: Program,
    /// Indexed by code offset; `Some` exactly at instruction boundaries.
    instructions: Vec<Option<ParsedInstruction>>,
    block_beginnings: Vec<bool>,
}

impl ParsedProgram {
    /// Indexes `program` with the default gas table.
    pub fn parse(program: Program) -> Self {
        Self::parse_with_gas_table(program, &GasTable::default())
    }

    /// Indexes `program`, charging instructions according to `gas_table`.
    pub fn parse_with_gas_table(program: Program, gas_table: &GasTable) -> Self {
        let code = &program.code;
        let boundaries: Vec<usize> = program
            .mask
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect();

        let mut instructions = vec![None; code.len()];
        // one past the end is a beginning when the last instruction terminates
        let mut block_beginnings = vec![false; code.len() + 1];
        block_beginnings[0] = true;

        for (n, &ix) in boundaries.iter().enumerate() {
            let next = boundaries.get(n + 1).copied().unwrap_or(code.len());
            let skip = next - ix - 1;
            let opcode = code[ix];
            let instruction = Instruction::from_opcode(opcode);
            let (gas, args) = match instruction {
                Some(instr) => (
                    gas_table.cost(instr),
                    decode(instr.family(), &code[ix + 1..next], ix as u32),
                ),
                None => (0, Args::NoArgs),
            };

            if instruction.is_some_and(Instruction::is_block_terminator) {
                block_beginnings[next] = true;
            }
            instructions[ix] = Some(ParsedInstruction {
                opcode,
                instruction,
                skip: skip as u32,
                gas,
                args,
            });
        }

        Self {
            program,
            instructions,
            block_beginnings,
        }
    }

    /// Decodes a code blob and indexes it with the default gas table.
    pub fn from_blob(blob: &[u8]) -> Result<Self, PvmError> {
        Ok(Self::parse(Program::from_blob(blob)?))
    }

    /// Returns the instruction starting at `ip`, if `ip` is an instruction boundary.
    #[inline(always)]
    pub fn instruction_at(&self, ip: u32) -> Option<&ParsedInstruction> {
        self.instructions.get(ip as usize)?.as_ref()
    }

    /// Argument length of the instruction at `ip`.
    pub fn skip(&self, ip: u32) -> Option<u32> {
        self.instruction_at(ip).map(|p| p.skip)
    }

    /// True if `ip` is a legal branch or jump target.
    #[inline(always)]
    pub fn is_block_beginning(&self, ip: u32) -> bool {
        self.block_beginnings
            .get(ip as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn jump_table(&self) -> &[u32] {
        &self.program.jump_table
    }
}
