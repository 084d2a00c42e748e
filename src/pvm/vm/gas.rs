use crate::pvm::isa::Instruction;

/// Gas counter. Signed, because a step may overdraw it before the loop checks.
pub type Gas = i64;

/// Per-opcode gas costs.
///
/// Backed by a flat array indexed by opcode so lookups are branch-free. Entries for
/// unregistered opcodes are never consulted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GasTable {
    costs: [Gas; 256],
}

impl Default for GasTable {
    /// Every instruction at its declared base cost.
    fn default() -> Self {
        let mut costs = [0; 256];
        for instr in Instruction::ALL {
            costs[instr.opcode() as usize] = instr.base_gas() as Gas;
        }
        Self { costs }
    }
}

impl GasTable {
    /// Returns the cost of `instr`.
    #[inline(always)]
    pub fn cost(&self, instr: Instruction) -> Gas {
        self.costs[instr.opcode() as usize]
    }

    /// Overrides the cost of `instr`.
    pub fn set(&mut self, instr: Instruction, cost: Gas) -> &mut Self {
        self.costs[instr.opcode() as usize] = cost;
        self
    }
}
