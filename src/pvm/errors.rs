use crate::pvm::vm::memory::MemoryFault;
use crate::types::encoding::DecodeError;
use pvm_derive::Error;

/// Errors raised while loading a program or setting up an execution context.
///
/// Nothing in here is produced by a running machine: execution outcomes are
/// [`ExitReason`](crate::pvm::vm::ExitReason) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PvmError {
    /// Byte that does not name a registered instruction.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    /// Program has no code bytes at all.
    #[error("program code is empty")]
    EmptyCode,
    /// Instruction mask and code disagree on length.
    #[error("instruction mask covers {mask} bytes but code has {code}")]
    MaskLengthMismatch { mask: usize, code: usize },
    /// Byte 0 is not marked as an instruction boundary.
    #[error("code does not start on an instruction boundary")]
    FirstByteNotBoundary,
    /// Byte 0 is a boundary but names no registered instruction.
    #[error("first instruction has unknown opcode {0}")]
    InvalidFirstInstruction(u8),
    /// Jump table entry width outside `1..=4`.
    #[error("jump table entry width {0} is not in 1..=4")]
    InvalidJumpTableWidth(u8),
    /// Code blob or program blob ended early.
    #[error("malformed blob: {0}")]
    Decode(#[from] DecodeError),
    /// Bytes remain after the declared end of a blob.
    #[error("{0} trailing bytes after blob")]
    TrailingBytes(usize),
    /// Memory zones of a program blob do not fit the 32-bit address space.
    #[error("memory layout needs {required} bytes of address space")]
    AddressSpaceOverflow { required: u64 },
    /// Argument buffer does not fit the argument zone.
    #[error("argument of {len} bytes exceeds the {max}-byte input zone")]
    ArgumentTooLarge { len: usize, max: usize },
    /// Seeding an initial memory zone touched an unmapped page.
    #[error("initial memory layout: {0}")]
    Memory(#[from] MemoryFault),
    /// Register index outside the register file.
    #[error("register index {index} out of bounds ({available} registers)")]
    InvalidRegisterIndex { index: u8, available: usize },
}
