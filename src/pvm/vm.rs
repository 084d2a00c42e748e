//! Core interpreter.
//!
//! Execution is split in two phases per instruction. An evaluator reads the current context
//! and returns a short list of [`Mod`]s (register writes, stores, pointer overrides, exits)
//! without touching anything; [`single_step`] then charges gas, advances the instruction
//! pointer and applies the mods in order, stopping at the first exit. Every exit leaves the
//! pointer on the exiting instruction unless that instruction set it explicitly. Memory faults
//! are raised while applying, so a faulting store never changes memory.

pub mod alu;
pub mod context;
pub mod gas;
pub mod memory;
pub mod registers;

use crate::pvm::constants::{HALT_ADDRESS, JUMP_ALIGNMENT, TRAP_COST, ZONE_SIZE};
use crate::pvm::isa::Instruction;
use crate::pvm::operand::Args;
use crate::pvm::program::ParsedProgram;
use crate::pvm::sign::sign_extend;
use alu::{BinaryOp, Compare, UnaryOp};
use context::ExecutionContext;
use registers::Reg;
use smallvec::{SmallVec, smallvec};
use std::fmt;

/// Why the machine stopped.
///
/// `Halt`, `Panic` and `OutOfGas` are terminal. `PageFault` and `HostCall` suspend the machine
/// and leave the decision to resume with the caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ExitReason {
    /// Regular termination through a dynamic jump to [`HALT_ADDRESS`].
    Halt,
    /// Illegal instruction, illegal jump target or access to reserved low memory.
    Panic,
    /// Gas ran out.
    OutOfGas,
    /// Access to an inaccessible page; carries the page-aligned address.
    PageFault(u32),
    /// `ecalli` trap; carries the host-call identifier.
    HostCall(u64),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Halt => f.write_str("halt"),
            ExitReason::Panic => f.write_str("panic"),
            ExitReason::OutOfGas => f.write_str("out of gas"),
            ExitReason::PageFault(address) => write!(f, "page fault at {address:#x}"),
            ExitReason::HostCall(id) => write!(f, "host call {id}"),
        }
    }
}

/// State change produced by an evaluator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Mod {
    Reg(Reg, u64),
    /// Store of the low `len` bytes of `bytes`.
    Store { address: u32, bytes: [u8; 8], len: u8 },
    /// Heap allocation of `size` bytes, old pointer written to `rd`.
    Sbrk { rd: Reg, size: u64 },
    Ip(u32),
    /// A load hit an unreadable page.
    Fault(u32),
    Exit(ExitReason),
}

type Mods = SmallVec<[Mod; 2]>;

/// Dispatches a decoded instruction to its evaluator.
///
/// Each line reads `Variant => handler(Family { fields }; extra, ...)`: the listed fields are
/// bound from the [`Args`] record and passed positionally, followed by the extras.
macro_rules! exec_pvm {
    (
        step = $step:ident,
        instr = $instr:ident,
        args = $args:ident,
        { $( $variant:ident => $handler:ident ( $family:ident { $( $field:ident ),* } $( ; $( $extra:expr ),+ )? ) ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => match $args {
                    Args::$family { $( $field, )* .. } => $step.$handler( $( $field, )* $( $( $extra ),+ )? ),
                    _ => $step.exit(ExitReason::Panic),
                },
            )*
        }
    }};
}

/// Read-only view of the machine while one instruction is evaluated.
struct Step<'a> {
    program: &'a ParsedProgram,
    ctx: &'a ExecutionContext,
}

impl Step<'_> {
    #[inline(always)]
    fn reg(&self, r: Reg) -> u64 {
        self.ctx.registers[r]
    }

    #[inline(always)]
    fn exit(&self, reason: ExitReason) -> Mods {
        smallvec![Mod::Exit(reason)]
    }

    fn eval(&self, instr: Instruction, args: Args) -> Mods {
        use alu::*;
        exec_pvm! {
            step = self,
            instr = instr,
            args = args,
            {
                Trap => op_trap(NoArgs {}),
                Fallthrough => op_fallthrough(NoArgs {}),
                Ecalli => op_ecalli(OneImm { vx }),
                LoadImm64 => op_load_imm(OneRegExtImm { ra, vx }),

                StoreImmU8 => op_store_imm(TwoImm { vx, vy }; 1),
                StoreImmU16 => op_store_imm(TwoImm { vx, vy }; 2),
                StoreImmU32 => op_store_imm(TwoImm { vx, vy }; 4),
                StoreImmU64 => op_store_imm(TwoImm { vx, vy }; 8),

                Jump => op_jump(OneOffset { target }),

                JumpInd => op_jump_ind(OneRegOneImm { ra, vx }),
                LoadImm => op_load_imm(OneRegOneImm { ra, vx }),
                LoadU8 => op_load(OneRegOneImm { ra, vx }; 1, false),
                LoadI8 => op_load(OneRegOneImm { ra, vx }; 1, true),
                LoadU16 => op_load(OneRegOneImm { ra, vx }; 2, false),
                LoadI16 => op_load(OneRegOneImm { ra, vx }; 2, true),
                LoadU32 => op_load(OneRegOneImm { ra, vx }; 4, false),
                LoadI32 => op_load(OneRegOneImm { ra, vx }; 4, true),
                LoadU64 => op_load(OneRegOneImm { ra, vx }; 8, false),
                StoreU8 => op_store(OneRegOneImm { ra, vx }; 1),
                StoreU16 => op_store(OneRegOneImm { ra, vx }; 2),
                StoreU32 => op_store(OneRegOneImm { ra, vx }; 4),
                StoreU64 => op_store(OneRegOneImm { ra, vx }; 8),

                StoreImmIndU8 => op_store_imm_ind(OneRegTwoImm { ra, vx, vy }; 1),
                StoreImmIndU16 => op_store_imm_ind(OneRegTwoImm { ra, vx, vy }; 2),
                StoreImmIndU32 => op_store_imm_ind(OneRegTwoImm { ra, vx, vy }; 4),
                StoreImmIndU64 => op_store_imm_ind(OneRegTwoImm { ra, vx, vy }; 8),

                LoadImmJump => op_load_imm_jump(OneRegImmOffset { ra, vx, target }),
                BranchEqImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; eq),
                BranchNeImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; ne),
                BranchLtUImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; lt_u),
                BranchLeUImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; le_u),
                BranchGeUImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; ge_u),
                BranchGtUImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; gt_u),
                BranchLtSImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; lt_s),
                BranchLeSImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; le_s),
                BranchGeSImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; ge_s),
                BranchGtSImm => op_branch_imm(OneRegImmOffset { ra, vx, target }; gt_s),

                MoveReg => op_unary(TwoReg { rd, ra }; identity),
                Sbrk => op_sbrk(TwoReg { rd, ra }),
                CountSetBits64 => op_unary(TwoReg { rd, ra }; count_set_bits_64),
                CountSetBits32 => op_unary(TwoReg { rd, ra }; count_set_bits_32),
                LeadingZeroBits64 => op_unary(TwoReg { rd, ra }; leading_zero_bits_64),
                LeadingZeroBits32 => op_unary(TwoReg { rd, ra }; leading_zero_bits_32),
                TrailingZeroBits64 => op_unary(TwoReg { rd, ra }; trailing_zero_bits_64),
                TrailingZeroBits32 => op_unary(TwoReg { rd, ra }; trailing_zero_bits_32),
                SignExtend8 => op_unary(TwoReg { rd, ra }; sign_extend_8),
                SignExtend16 => op_unary(TwoReg { rd, ra }; sign_extend_16),
                ZeroExtend16 => op_unary(TwoReg { rd, ra }; zero_extend_16),
                ReverseBytes => op_unary(TwoReg { rd, ra }; reverse_bytes),

                StoreIndU8 => op_store_ind(TwoRegOneImm { ra, rb, vx }; 1),
                StoreIndU16 => op_store_ind(TwoRegOneImm { ra, rb, vx }; 2),
                StoreIndU32 => op_store_ind(TwoRegOneImm { ra, rb, vx }; 4),
                StoreIndU64 => op_store_ind(TwoRegOneImm { ra, rb, vx }; 8),
                LoadIndU8 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 1, false),
                LoadIndI8 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 1, true),
                LoadIndU16 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 2, false),
                LoadIndI16 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 2, true),
                LoadIndU32 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 4, false),
                LoadIndI32 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 4, true),
                LoadIndU64 => op_load_ind(TwoRegOneImm { ra, rb, vx }; 8, false),

                AddImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; add_32),
                AndImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; and),
                XorImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; xor),
                OrImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; or),
                MulImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; mul_32),
                SetLtUImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; set_lt_u),
                SetLtSImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; set_lt_s),
                ShloLImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_l_32),
                ShloRImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_r_32),
                SharRImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shar_r_32),
                NegAddImm32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; neg_add_32),
                SetGtUImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; set_gt_u),
                SetGtSImm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; set_gt_s),
                ShloLImmAlt32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_l_alt_32),
                ShloRImmAlt32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_r_alt_32),
                SharRImmAlt32 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shar_r_alt_32),
                CmovIzImm => op_cmov_imm(TwoRegOneImm { ra, rb, vx }; true),
                CmovNzImm => op_cmov_imm(TwoRegOneImm { ra, rb, vx }; false),
                AddImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; add_64),
                MulImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; mul_64),
                ShloLImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_l_64),
                ShloRImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_r_64),
                SharRImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shar_r_64),
                NegAddImm64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; neg_add_64),
                ShloLImmAlt64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_l_alt_64),
                ShloRImmAlt64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shlo_r_alt_64),
                SharRImmAlt64 => op_alu_imm(TwoRegOneImm { ra, rb, vx }; shar_r_alt_64),
                RotR64Imm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; rot_r_64),
                RotR64ImmAlt => op_alu_imm(TwoRegOneImm { ra, rb, vx }; rot_r_alt_64),
                RotR32Imm => op_alu_imm(TwoRegOneImm { ra, rb, vx }; rot_r_32),
                RotR32ImmAlt => op_alu_imm(TwoRegOneImm { ra, rb, vx }; rot_r_alt_32),

                BranchEq => op_branch(TwoRegOneOffset { ra, rb, target }; eq),
                BranchNe => op_branch(TwoRegOneOffset { ra, rb, target }; ne),
                BranchLtU => op_branch(TwoRegOneOffset { ra, rb, target }; lt_u),
                BranchLtS => op_branch(TwoRegOneOffset { ra, rb, target }; lt_s),
                BranchGeU => op_branch(TwoRegOneOffset { ra, rb, target }; ge_u),
                BranchGeS => op_branch(TwoRegOneOffset { ra, rb, target }; ge_s),

                LoadImmJumpInd => op_load_imm_jump_ind(TwoRegTwoImm { ra, rb, vx, vy }),

                Add32 => op_alu(ThreeReg { ra, rb, rd }; add_32),
                Sub32 => op_alu(ThreeReg { ra, rb, rd }; sub_32),
                Mul32 => op_alu(ThreeReg { ra, rb, rd }; mul_32),
                DivU32 => op_alu(ThreeReg { ra, rb, rd }; div_u_32),
                DivS32 => op_alu(ThreeReg { ra, rb, rd }; div_s_32),
                RemU32 => op_alu(ThreeReg { ra, rb, rd }; rem_u_32),
                RemS32 => op_alu(ThreeReg { ra, rb, rd }; rem_s_32),
                ShloL32 => op_alu(ThreeReg { ra, rb, rd }; shlo_l_32),
                ShloR32 => op_alu(ThreeReg { ra, rb, rd }; shlo_r_32),
                SharR32 => op_alu(ThreeReg { ra, rb, rd }; shar_r_32),
                Add64 => op_alu(ThreeReg { ra, rb, rd }; add_64),
                Sub64 => op_alu(ThreeReg { ra, rb, rd }; sub_64),
                Mul64 => op_alu(ThreeReg { ra, rb, rd }; mul_64),
                DivU64 => op_alu(ThreeReg { ra, rb, rd }; div_u_64),
                DivS64 => op_alu(ThreeReg { ra, rb, rd }; div_s_64),
                RemU64 => op_alu(ThreeReg { ra, rb, rd }; rem_u_64),
                RemS64 => op_alu(ThreeReg { ra, rb, rd }; rem_s_64),
                ShloL64 => op_alu(ThreeReg { ra, rb, rd }; shlo_l_64),
                ShloR64 => op_alu(ThreeReg { ra, rb, rd }; shlo_r_64),
                SharR64 => op_alu(ThreeReg { ra, rb, rd }; shar_r_64),
                And => op_alu(ThreeReg { ra, rb, rd }; and),
                Xor => op_alu(ThreeReg { ra, rb, rd }; xor),
                Or => op_alu(ThreeReg { ra, rb, rd }; or),
                MulUpperSS => op_alu(ThreeReg { ra, rb, rd }; mul_upper_s_s),
                MulUpperUU => op_alu(ThreeReg { ra, rb, rd }; mul_upper_u_u),
                MulUpperSU => op_alu(ThreeReg { ra, rb, rd }; mul_upper_s_u),
                SetLtU => op_alu(ThreeReg { ra, rb, rd }; set_lt_u),
                SetLtS => op_alu(ThreeReg { ra, rb, rd }; set_lt_s),
                CmovIz => op_cmov(ThreeReg { ra, rb, rd }; true),
                CmovNz => op_cmov(ThreeReg { ra, rb, rd }; false),
                RotL64 => op_alu(ThreeReg { ra, rb, rd }; rot_l_64),
                RotL32 => op_alu(ThreeReg { ra, rb, rd }; rot_l_32),
                RotR64 => op_alu(ThreeReg { ra, rb, rd }; rot_r_64),
                RotR32 => op_alu(ThreeReg { ra, rb, rd }; rot_r_32),
                AndInv => op_alu(ThreeReg { ra, rb, rd }; and_inv),
                OrInv => op_alu(ThreeReg { ra, rb, rd }; or_inv),
                Xnor => op_alu(ThreeReg { ra, rb, rd }; xnor),
                Max => op_alu(ThreeReg { ra, rb, rd }; max),
                MaxU => op_alu(ThreeReg { ra, rb, rd }; max_u),
                Min => op_alu(ThreeReg { ra, rb, rd }; min),
                MinU => op_alu(ThreeReg { ra, rb, rd }; min_u),
            }
        }
    }

    // ==================== Control flow helpers ====================

    /// Conditional static branch: no-op if not taken, panics unless the target starts a block.
    fn branch(&self, target: u32, taken: bool) -> Option<Mod> {
        if !taken {
            return None;
        }
        Some(if self.program.is_block_beginning(target) {
            Mod::Ip(target)
        } else {
            Mod::Exit(ExitReason::Panic)
        })
    }

    /// Dynamic jump through the jump table.
    fn djump(&self, address: u32) -> Mod {
        if address == HALT_ADDRESS {
            return Mod::Exit(ExitReason::Halt);
        }
        let table = self.program.jump_table();
        if address == 0
            || address % JUMP_ALIGNMENT != 0
            || address as u64 > table.len() as u64 * JUMP_ALIGNMENT as u64
        {
            return Mod::Exit(ExitReason::Panic);
        }
        match table.get((address / JUMP_ALIGNMENT - 1) as usize) {
            Some(&target) if self.program.is_block_beginning(target) => Mod::Ip(target),
            _ => Mod::Exit(ExitReason::Panic),
        }
    }

    /// Loads `width` bytes into `rd`, zero- or sign-extended.
    fn load(&self, rd: Reg, address: u32, width: usize, signed: bool) -> Mods {
        let mut buf = [0u8; 8];
        if let Err(fault) = self.ctx.memory.read(address, &mut buf[..width]) {
            return smallvec![Mod::Fault(fault.address)];
        }
        let value = u64::from_le_bytes(buf);
        let value = if signed {
            sign_extend(width as u32, value)
        } else {
            value
        };
        smallvec![Mod::Reg(rd, value)]
    }

    fn store(address: u64, value: u64, width: usize) -> Mods {
        smallvec![Mod::Store {
            address: address as u32,
            bytes: value.to_le_bytes(),
            len: width as u8,
        }]
    }

    // ==================== Handlers ====================

    fn op_trap(&self) -> Mods {
        self.exit(ExitReason::Panic)
    }

    fn op_fallthrough(&self) -> Mods {
        Mods::new()
    }

    fn op_ecalli(&self, vx: u64) -> Mods {
        self.exit(ExitReason::HostCall(vx))
    }

    fn op_load_imm(&self, ra: Reg, vx: u64) -> Mods {
        smallvec![Mod::Reg(ra, vx)]
    }

    fn op_store_imm(&self, vx: u64, vy: u64, width: usize) -> Mods {
        Self::store(vx, vy, width)
    }

    fn op_jump(&self, target: u32) -> Mods {
        self.branch(target, true).into_iter().collect()
    }

    fn op_jump_ind(&self, ra: Reg, vx: u64) -> Mods {
        smallvec![self.djump(self.reg(ra).wrapping_add(vx) as u32)]
    }

    fn op_load(&self, ra: Reg, vx: u64, width: usize, signed: bool) -> Mods {
        self.load(ra, vx as u32, width, signed)
    }

    fn op_store(&self, ra: Reg, vx: u64, width: usize) -> Mods {
        Self::store(vx, self.reg(ra), width)
    }

    fn op_store_imm_ind(&self, ra: Reg, vx: u64, vy: u64, width: usize) -> Mods {
        Self::store(self.reg(ra).wrapping_add(vx), vy, width)
    }

    fn op_load_imm_jump(&self, ra: Reg, vx: u64, target: u32) -> Mods {
        let mut mods: Mods = smallvec![Mod::Reg(ra, vx)];
        mods.extend(self.branch(target, true));
        mods
    }

    fn op_branch_imm(&self, ra: Reg, vx: u64, target: u32, cond: Compare) -> Mods {
        self.branch(target, cond(self.reg(ra), vx))
            .into_iter()
            .collect()
    }

    fn op_unary(&self, rd: Reg, ra: Reg, f: UnaryOp) -> Mods {
        smallvec![Mod::Reg(rd, f(self.reg(ra)))]
    }

    fn op_sbrk(&self, rd: Reg, ra: Reg) -> Mods {
        smallvec![Mod::Sbrk {
            rd,
            size: self.reg(ra),
        }]
    }

    fn op_store_ind(&self, ra: Reg, rb: Reg, vx: u64, width: usize) -> Mods {
        Self::store(self.reg(rb).wrapping_add(vx), self.reg(ra), width)
    }

    fn op_load_ind(&self, ra: Reg, rb: Reg, vx: u64, width: usize, signed: bool) -> Mods {
        self.load(ra, self.reg(rb).wrapping_add(vx) as u32, width, signed)
    }

    fn op_alu_imm(&self, ra: Reg, rb: Reg, vx: u64, f: BinaryOp) -> Mods {
        smallvec![Mod::Reg(ra, f(self.reg(rb), vx))]
    }

    fn op_cmov_imm(&self, ra: Reg, rb: Reg, vx: u64, if_zero: bool) -> Mods {
        if (self.reg(rb) == 0) == if_zero {
            smallvec![Mod::Reg(ra, vx)]
        } else {
            Mods::new()
        }
    }

    fn op_branch(&self, ra: Reg, rb: Reg, target: u32, cond: Compare) -> Mods {
        self.branch(target, cond(self.reg(ra), self.reg(rb)))
            .into_iter()
            .collect()
    }

    fn op_load_imm_jump_ind(&self, ra: Reg, rb: Reg, vx: u64, vy: u64) -> Mods {
        // rb is read before ra is written, they may be the same register
        let address = self.reg(rb).wrapping_add(vy) as u32;
        smallvec![Mod::Reg(ra, vx), self.djump(address)]
    }

    fn op_alu(&self, ra: Reg, rb: Reg, rd: Reg, f: BinaryOp) -> Mods {
        smallvec![Mod::Reg(rd, f(self.reg(ra), self.reg(rb)))]
    }

    fn op_cmov(&self, ra: Reg, rb: Reg, rd: Reg, if_zero: bool) -> Mods {
        if (self.reg(rb) == 0) == if_zero {
            smallvec![Mod::Reg(rd, self.reg(ra))]
        } else {
            Mods::new()
        }
    }
}

/// Turns a memory fault at `address` into an exit.
///
/// Faults in the reserved low zone panic. Any other fault rewinds the instruction pointer to
/// the faulting instruction and charges the trap surcharge once.
fn page_fault(ctx: &mut ExecutionContext, ip: u32, address: u32) -> ExitReason {
    ctx.ip = ip;
    if address < ZONE_SIZE {
        return ExitReason::Panic;
    }
    ctx.gas -= TRAP_COST;
    ExitReason::PageFault(address)
}

/// Commits `mods` in order. An exit leaves the instruction pointer on the current instruction
/// unless a mod before it set the pointer explicitly.
fn apply(ctx: &mut ExecutionContext, ip: u32, mods: Mods) -> Option<ExitReason> {
    let mut ip_set = false;
    for m in mods {
        match m {
            Mod::Reg(r, value) => ctx.registers[r] = value,
            Mod::Store {
                address,
                bytes,
                len,
            } => {
                if let Err(fault) = ctx.memory.write(address, &bytes[..len as usize]) {
                    return Some(page_fault(ctx, ip, fault.address));
                }
            }
            Mod::Sbrk { rd, size } => {
                let pointer = u32::try_from(size)
                    .ok()
                    .and_then(|size| ctx.memory.sbrk(size));
                ctx.registers[rd] = pointer.map_or(0, u64::from);
            }
            Mod::Ip(target) => {
                ctx.ip = target;
                ip_set = true;
            }
            Mod::Fault(address) => return Some(page_fault(ctx, ip, address)),
            Mod::Exit(reason) => {
                if !ip_set {
                    ctx.ip = ip;
                }
                return Some(reason);
            }
        }
    }
    None
}

/// Executes exactly one instruction.
///
/// Returns `None` if the machine can keep running. An instruction pointer that is not an
/// instruction boundary, or an unknown opcode, costs [`TRAP_COST`] and panics.
pub fn single_step(program: &ParsedProgram, ctx: &mut ExecutionContext) -> Option<ExitReason> {
    let ip = ctx.ip;
    let Some((instr, parsed)) = program
        .instruction_at(ip)
        .and_then(|p| p.instruction.map(|instr| (instr, p)))
    else {
        ctx.gas -= TRAP_COST;
        return Some(ExitReason::Panic);
    };

    let mods = Step { program, ctx }.eval(instr, parsed.args);
    ctx.gas -= parsed.gas;
    ctx.ip = ip.wrapping_add(parsed.skip + 1);
    apply(ctx, ip, mods)
}

/// Runs until an exit, stepping while gas is strictly positive.
pub fn run(program: &ParsedProgram, ctx: &mut ExecutionContext) -> ExitReason {
    while ctx.gas > 0 {
        if let Some(exit) = single_step(program, ctx) {
            return exit;
        }
    }
    ExitReason::OutOfGas
}
