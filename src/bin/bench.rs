//! Interpreter benchmark binary.
//!
//! Measures execution time for a handful of hand-assembled loops.
//! Run with: `cargo run --release --bin bench [seconds]`

use std::env;
use std::time::{Duration, Instant};

use jam_pvm::pvm::constants::{HALT_ADDRESS, PAGE_SIZE};
use jam_pvm::pvm::invocation::invoke_with_host_calls;
use jam_pvm::pvm::isa::Instruction;
use jam_pvm::pvm::program::{ParsedProgram, Program};
use jam_pvm::pvm::vm::context::ExecutionContext;
use jam_pvm::pvm::vm::gas::Gas;
use jam_pvm::pvm::vm::memory::{Memory, PageAccess};
use jam_pvm::pvm::vm::registers::Registers;
use jam_pvm::pvm::vm::{ExitReason, run};

const GAS: Gas = 1 << 40;
const DATA: u32 = 0x2_0000;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    gas_used: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations.max(1) as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        // every benchmarked instruction costs one unit of gas
        let ns_per_instr = if self.gas_used > 0 {
            format!("{:>8.1}", ns_per_op as f64 / self.gas_used as f64)
        } else {
            "       -".to_string()
        };
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} gas  {} ns/instr",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            self.gas_used,
            ns_per_instr,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_gas = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_gas = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        gas_used: last_gas,
    }
}

// ---------------------------------------------------------------------------
// Program assembly
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Code {
    code: Vec<u8>,
    mask: Vec<bool>,
}

impl Code {
    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn op(&mut self, instr: Instruction, args: &[u8]) -> &mut Self {
        self.code.push(instr.opcode());
        self.mask.push(true);
        self.code.extend_from_slice(args);
        self.mask.extend(std::iter::repeat_n(false, args.len()));
        self
    }

    /// `r7 = n`, followed by a fallthrough so the loop body starts a new block.
    fn counter(&mut self, n: u32) -> u32 {
        let mut args = vec![0x07];
        args.extend_from_slice(&n.to_le_bytes());
        self.op(Instruction::LoadImm, &args);
        self.op(Instruction::Fallthrough, &[]);
        self.here()
    }

    /// `r7 -= 1; if r7 != 0 goto top; halt`.
    fn close_loop(&mut self, top: u32) -> ParsedProgram {
        self.op(Instruction::AddImm64, &[0x77, 0xFF]);
        let back = (top as i64 - self.here() as i64) as i8 as u8;
        self.op(Instruction::BranchNeImm, &[0x17, 0x00, back]);
        self.op(Instruction::JumpInd, &[0x00]);
        let program = Program::new(self.code.clone(), self.mask.clone(), Vec::new())
            .expect("benchmark program");
        ParsedProgram::parse(program)
    }
}

fn regs(lo: u8, hi: u8) -> u8 {
    lo | hi << 4
}

fn tight_loop(n: u32) -> ParsedProgram {
    let mut code = Code::default();
    let top = code.counter(n);
    code.close_loop(top)
}

fn arithmetic_mix(n: u32) -> ParsedProgram {
    let mut code = Code::default();
    code.op(Instruction::LoadImm, &[0x02, 1])
        .op(Instruction::LoadImm, &[0x03, 2])
        .op(Instruction::LoadImm, &[0x04, 3]);
    let top = code.counter(n);
    code.op(Instruction::Add64, &[regs(2, 3), 5])
        .op(Instruction::Mul64, &[regs(5, 4), 6])
        .op(Instruction::Sub64, &[regs(6, 2), 8])
        .op(Instruction::DivU64, &[regs(8, 3), 9])
        .op(Instruction::RemU64, &[regs(9, 4), 10])
        .op(Instruction::ShloLImm64, &[regs(2, 10), 1])
        .op(Instruction::ShloRImm64, &[regs(3, 6), 2])
        .op(Instruction::AddImm64, &[regs(4, 8), 1]);
    code.close_loop(top)
}

fn memory_loop(n: u32) -> ParsedProgram {
    let mut code = Code::default();
    code.op(Instruction::LoadImm, &[0x01, 0x00, 0x00, 0x02])
        .op(Instruction::LoadImm, &[0x02, 42]);
    let top = code.counter(n);
    code.op(Instruction::StoreIndU64, &[regs(2, 1), 0])
        .op(Instruction::LoadIndU64, &[regs(3, 1), 0]);
    code.close_loop(top)
}

fn host_call_loop(n: u32) -> ParsedProgram {
    let mut code = Code::default();
    let top = code.counter(n);
    code.op(Instruction::Ecalli, &[0]);
    code.close_loop(top)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn fresh_context(memory: &Memory) -> ExecutionContext {
    let mut registers = Registers::new();
    registers
        .set(0, HALT_ADDRESS as u64)
        .expect("register 0 exists");
    ExecutionContext::new(0, GAS, registers, memory.clone())
}

fn execute(program: &ParsedProgram, memory: &Memory) -> u64 {
    let mut ctx = fresh_context(memory);
    let exit = run(program, &mut ctx);
    assert_eq!(exit, ExitReason::Halt);
    (GAS - ctx.gas) as u64
}

fn execute_with_host_calls(program: &ParsedProgram, memory: &Memory) -> u64 {
    let mut ctx = fresh_context(memory);
    let mut calls = 0u64;
    let mut executor = |_: u64, _: &mut ExecutionContext, calls: &mut u64| -> Option<ExitReason> {
        *calls += 1;
        None
    };
    let exit = invoke_with_host_calls(program, &mut ctx, &mut executor, &mut calls);
    assert_eq!(exit, ExitReason::Halt);
    (GAS - ctx.gas) as u64
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let seconds = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let min = Duration::from_secs(seconds);

    println!("PVM Benchmarks (each runs for >= {seconds}s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}  {:>10}",
        "benchmark", "iters", "avg time", "gas/run", "ns/instr"
    );
    println!("  {}", "-".repeat(82));

    let empty = Memory::new();
    let mut data = Memory::new();
    data.set_access(DATA / PAGE_SIZE, PageAccess::Write);

    let tight = tight_loop(100_000);
    bench("tight_loop(100K)", min, || execute(&tight, &empty)).print();

    let arith = arithmetic_mix(10_000);
    bench("arithmetic_mix(10K)", min, || execute(&arith, &empty)).print();

    let mem = memory_loop(5_000);
    bench("mem_load_store(5K)", min, || execute(&mem, &data)).print();

    let host = host_call_loop(10_000);
    bench("host_calls(10K)", min, || execute_with_host_calls(&host, &empty)).print();

    println!();
}
