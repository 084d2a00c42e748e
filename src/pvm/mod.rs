//! Deterministic register machine for executing untrusted service code.
//!
//! Two conforming implementations must produce bit-identical state for identical inputs, so
//! every operation here is total and uses wrapping integer arithmetic. Nothing performs I/O or
//! blocks; gas is the only bound on execution.
//!
//! # Architecture
//!
//! - **Registers**: 13 unsigned 64-bit words; signedness is a view applied per instruction
//! - **Memory**: sparse 32-bit address space in 16 KiB pages, each `None`, `Read` or `Write`,
//!   plus a bump-allocated heap
//! - **Program**: code bytes, an instruction-boundary mask and a jump table for dynamic jumps;
//!   parsed once into an immutable index that can be shared across invocations
//! - **Execution model**: evaluators produce a list of state changes that a single apply step
//!   commits, so a faulting instruction leaves no partial effects
//! - **Control flow**: branches may only target basic-block beginnings; dynamic jumps resolve
//!   through the jump table, and the sentinel address `2^32 − 2^16` halts
//! - **Gas metering**: a fixed cost per opcode, charged before the instruction's effects, plus
//!   a trap surcharge for panics on unknown code and for page faults
//!
//! # Exits
//!
//! A run ends with an [`ExitReason`](vm::ExitReason): `Halt`, `Panic` and `OutOfGas` are
//! final; `PageFault` and `HostCall` suspend the machine and hand control to the caller.
//!
//! # Modules
//!
//! - [`constants`]: protocol constants and alignment helpers
//! - [`errors`]: load-time error type
//! - [`init`]: program blob decoding and the initial memory/register layout
//! - [`invocation`]: host-call servicing and argument invocation
//! - [`isa`]: instruction set definition and opcode mappings
//! - [`operand`]: argument decoders for every instruction family
//! - [`program`]: code blob codec and the parsed instruction index
//! - [`sign`]: signed views of unsigned words
//! - [`vm`]: interpreter, registers, memory and gas

pub mod constants;
pub mod errors;
pub mod init;
pub mod invocation;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod operand;
pub mod program;
pub mod sign;
pub mod vm;
