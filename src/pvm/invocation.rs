//! Invocation layers on top of the basic loop.
//!
//! [`invoke_with_host_calls`] services `ecalli` traps through a caller-supplied
//! [`HostCallExecutor`] and resumes. [`invoke_with_arguments`] additionally initializes a
//! program blob and turns the final state into an [`ArgumentOutcome`]. Refine, accumulate and
//! on-transfer differ only in the executor they pass.

use crate::pvm::init::initialize;
use crate::pvm::program::ParsedProgram;
use crate::pvm::vm::context::ExecutionContext;
use crate::pvm::vm::gas::Gas;
use crate::pvm::vm::registers::Reg;
use crate::pvm::vm::{ExitReason, run};
use crate::{error, info};

/// Services host calls on behalf of a running program.
///
/// `X` is a caller-defined accumulator threaded through every call. The executor may mutate
/// registers, memory, gas and the accumulator. Returning `None` resumes the program; returning
/// an exit stops it. An executor must validate memory access itself and never return
/// [`ExitReason::PageFault`].
pub trait HostCallExecutor<X> {
    fn execute(&mut self, id: u64, ctx: &mut ExecutionContext, out: &mut X) -> Option<ExitReason>;
}

impl<X, F> HostCallExecutor<X> for F
where
    F: FnMut(u64, &mut ExecutionContext, &mut X) -> Option<ExitReason>,
{
    fn execute(&mut self, id: u64, ctx: &mut ExecutionContext, out: &mut X) -> Option<ExitReason> {
        self(id, ctx, out)
    }
}

/// Runs `program`, handing every host call to `executor` and resuming after it.
///
/// The instruction pointer is moved past the `ecalli` before the executor runs.
///
/// # Panics
///
/// If the executor returns [`ExitReason::PageFault`].
pub fn invoke_with_host_calls<X, H>(
    program: &ParsedProgram,
    ctx: &mut ExecutionContext,
    executor: &mut H,
    out: &mut X,
) -> ExitReason
where
    H: HostCallExecutor<X> + ?Sized,
{
    loop {
        let id = match run(program, ctx) {
            ExitReason::HostCall(id) => id,
            exit => return exit,
        };
        let skip = program.skip(ctx.ip).unwrap_or(0);
        ctx.ip = ctx.ip.wrapping_add(skip + 1);

        match executor.execute(id, ctx, out) {
            None => {}
            Some(ExitReason::PageFault(address)) => {
                error!("host call {id} returned a page fault at {address:#x}");
                panic!("host call {id} returned a page fault at {address:#x}");
            }
            Some(exit) => return exit,
        }
    }
}

/// Result value of an argument invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvocationResult {
    /// Halted; the bytes at `[r7, r7 + r8)`, or empty if that range is unreadable.
    Output(Vec<u8>),
    Panic,
    OutOfGas,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArgumentOutcome {
    /// Gas consumed, never more than the gas supplied.
    pub gas_used: Gas,
    pub result: InvocationResult,
}

/// Initializes `blob` with `args` and runs it from `ip` with `gas`, servicing host calls.
///
/// A blob that fails to initialize yields [`InvocationResult::Panic`] with no gas used.
pub fn invoke_with_arguments<X, H>(
    blob: &[u8],
    ip: u32,
    gas: Gas,
    args: &[u8],
    executor: &mut H,
    out: &mut X,
) -> ArgumentOutcome
where
    H: HostCallExecutor<X> + ?Sized,
{
    let Ok(image) = initialize(blob, args) else {
        return ArgumentOutcome {
            gas_used: 0,
            result: InvocationResult::Panic,
        };
    };
    let (program, mut ctx) = image.into_context(ip, gas);
    let exit = invoke_with_host_calls(&program, &mut ctx, executor, out);
    let gas_used = gas - ctx.gas.max(0);
    info!("argument invocation finished: {exit}, gas used {gas_used}");

    let result = match exit {
        ExitReason::OutOfGas => InvocationResult::OutOfGas,
        ExitReason::Halt => InvocationResult::Output(halt_output(&ctx)),
        _ => InvocationResult::Panic,
    };
    ArgumentOutcome { gas_used, result }
}

/// Reads `[r7, r7 + r8)`, or nothing if the range is not readable.
fn halt_output(ctx: &ExecutionContext) -> Vec<u8> {
    let address = ctx.registers[Reg::clamped(7)];
    let len = ctx.registers[Reg::clamped(8)];
    let (Ok(address), Ok(len)) = (u32::try_from(address), usize::try_from(len)) else {
        return Vec::new();
    };
    if !ctx.memory.can_read(address, len) {
        return Vec::new();
    }
    ctx.memory.read_vec(address, len).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pvm::isa::Instruction;
    use crate::pvm::vm::single_step;
    use crate::utils::test_utils::utils::ProgramBuilder;

    fn no_host_calls(_: u64, _: &mut ExecutionContext, _: &mut ()) -> Option<ExitReason> {
        Some(ExitReason::Panic)
    }

    fn invoke(builder: &ProgramBuilder, gas: Gas, args: &[u8]) -> ArgumentOutcome {
        let blob = builder.program_blob();
        invoke_with_arguments(&blob, 0, gas, args, &mut no_host_calls, &mut ())
    }

    #[test]
    fn halt_returns_argument_buffer() {
        let mut builder = ProgramBuilder::new();
        builder.instr(Instruction::JumpInd, &[0x00]);
        let outcome = invoke(&builder, 100, b"hello");
        assert_eq!(outcome.result, InvocationResult::Output(b"hello".to_vec()));
        assert_eq!(outcome.gas_used, 1);
    }

    #[test]
    fn unreadable_output_is_empty() {
        let mut builder = ProgramBuilder::new();
        builder
            .instr(Instruction::LoadImm, &[0x07, 0x10])
            .instr(Instruction::JumpInd, &[0x00]);
        let outcome = invoke(&builder, 100, b"abc");
        assert_eq!(outcome.result, InvocationResult::Output(Vec::new()));
        assert_eq!(outcome.gas_used, 2);
    }

    fn halt_with_output(builder: &mut ProgramBuilder, address: [u8; 3], len: u8) {
        builder
            .instr(Instruction::LoadImm, &[0x07, address[0], address[1], address[2]])
            .instr(Instruction::LoadImm, &[0x08, len])
            .instr(Instruction::JumpInd, &[0x00]);
    }

    #[test]
    fn data_sections_are_loaded() {
        let blob_for = |address| {
            let mut builder = ProgramBuilder::new();
            halt_with_output(&mut builder, address, 2);
            builder.program_blob_with(b"ro", b"rw", 1)
        };
        let output = |blob: Vec<u8>| {
            invoke_with_arguments(&blob, 0, 100, &[], &mut no_host_calls, &mut ()).result
        };
        // read-only data at 0x10000, read-write data one zone later
        assert_eq!(output(blob_for([0x00, 0x00, 0x01])), InvocationResult::Output(b"ro".to_vec()));
        assert_eq!(output(blob_for([0x00, 0x00, 0x03])), InvocationResult::Output(b"rw".to_vec()));
    }

    #[test]
    fn heap_grows_after_padding_pages() {
        let mut builder = ProgramBuilder::new();
        builder
            .instr(Instruction::LoadImm, &[0x02, 4])
            .instr(Instruction::Sbrk, &[0x23])
            .instr(Instruction::StoreImmIndU32, &[0x03, b'h', b'e', b'a', b'p'])
            .instr(Instruction::MoveReg, &[0x37])
            .instr(Instruction::LoadImm, &[0x08, 4])
            .instr(Instruction::JumpInd, &[0x00]);
        let blob = builder.program_blob_with(b"ro", b"rw", 1);
        let outcome = invoke_with_arguments(&blob, 0, 100, &[], &mut no_host_calls, &mut ());
        assert_eq!(outcome.result, InvocationResult::Output(b"heap".to_vec()));
        assert_eq!(outcome.gas_used, 6);

        // the allocation starts after the data page and the padding page
        let (program, mut ctx) = initialize(&blob, &[]).unwrap().into_context(0, 100);
        assert_eq!(single_step(&program, &mut ctx), None);
        assert_eq!(single_step(&program, &mut ctx), None);
        assert_eq!(ctx.registers.get(3).unwrap(), 0x3_8000);
    }

    #[test]
    fn malformed_blob_panics_without_gas() {
        let outcome = invoke_with_arguments(&[1, 2, 3], 0, 100, &[], &mut no_host_calls, &mut ());
        assert_eq!(outcome.result, InvocationResult::Panic);
        assert_eq!(outcome.gas_used, 0);
    }

    #[test]
    fn trailing_blob_bytes_are_rejected() {
        let mut builder = ProgramBuilder::new();
        builder.instr(Instruction::JumpInd, &[0x00]);
        let mut blob = builder.program_blob();
        blob.push(0);
        let outcome = invoke_with_arguments(&blob, 0, 100, &[], &mut no_host_calls, &mut ());
        assert_eq!(outcome.result, InvocationResult::Panic);
        assert_eq!(outcome.gas_used, 0);
    }

    #[test]
    fn trap_panics() {
        let mut builder = ProgramBuilder::new();
        builder.instr(Instruction::Trap, &[]);
        let outcome = invoke(&builder, 100, &[]);
        assert_eq!(outcome.result, InvocationResult::Panic);
        assert_eq!(outcome.gas_used, 1);
    }

    #[test]
    fn endless_loop_uses_all_gas() {
        let mut builder = ProgramBuilder::new();
        builder.instr(Instruction::Jump, &[0]);
        let outcome = invoke(&builder, 25, &[]);
        assert_eq!(outcome.result, InvocationResult::OutOfGas);
        assert_eq!(outcome.gas_used, 25);
    }

    #[test]
    fn host_calls_thread_the_accumulator() {
        let mut builder = ProgramBuilder::new();
        builder
            .instr(Instruction::Ecalli, &[1])
            .instr(Instruction::Ecalli, &[2])
            .instr(Instruction::JumpInd, &[0x00]);
        let blob = builder.program_blob();
        let mut seen = Vec::new();
        let mut executor = |id: u64, ctx: &mut ExecutionContext, seen: &mut Vec<u64>| -> Option<ExitReason> {
            seen.push(id);
            ctx.gas -= 10;
            None
        };
        let outcome = invoke_with_arguments(&blob, 0, 100, &[], &mut executor, &mut seen);
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(outcome.result, InvocationResult::Output(Vec::new()));
        assert_eq!(outcome.gas_used, 23);
    }

    #[test]
    fn overdrawn_gas_is_capped_at_supply() {
        let mut builder = ProgramBuilder::new();
        builder
            .instr(Instruction::Ecalli, &[1])
            .instr(Instruction::JumpInd, &[0x00]);
        let blob = builder.program_blob();
        let mut executor = |_: u64, ctx: &mut ExecutionContext, _: &mut ()| -> Option<ExitReason> {
            ctx.gas -= 1_000;
            None
        };
        let outcome = invoke_with_arguments(&blob, 0, 10, &[], &mut executor, &mut ());
        assert_eq!(outcome.result, InvocationResult::OutOfGas);
        assert_eq!(outcome.gas_used, 10);
    }

    #[test]
    fn executor_can_stop_the_program() {
        let mut builder = ProgramBuilder::new();
        builder
            .instr(Instruction::Ecalli, &[9])
            .instr(Instruction::JumpInd, &[0x00]);
        let outcome = invoke(&builder, 100, &[]);
        assert_eq!(outcome.result, InvocationResult::Panic);
        assert_eq!(outcome.gas_used, 1);
    }
}
