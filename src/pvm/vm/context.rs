use super::gas::Gas;
use super::memory::Memory;
use super::registers::Registers;

/// Mutable machine state of one invocation.
///
/// Owned by a single invocation. `Clone` deep-copies registers and every mapped page, which is
/// how callers take checkpoints they can roll back to.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    /// Instruction pointer: byte offset into the program code.
    pub ip: u32,
    /// Remaining gas.
    pub gas: Gas,
    pub registers: Registers,
    pub memory: Memory,
}

impl ExecutionContext {
    pub fn new(ip: u32, gas: Gas, registers: Registers, memory: Memory) -> Self {
        Self {
            ip,
            gas,
            registers,
            memory,
        }
    }
}
