//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the canonical
//! instruction list and invokes a callback macro for code generation, so the opcode table,
//! the static checks and any future tooling all derive from one definition.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - Per-instruction mnemonic, argument family, base gas and block-terminator flag
//!
//! # Encoding
//!
//! An instruction is one opcode byte followed by its argument bytes. The argument length
//! (`skip`) is not stored in the instruction: it is the distance to the next instruction
//! boundary in the program's bitmask. How the argument bytes are split into registers,
//! immediates and offsets depends on the instruction's [`ArgFamily`], see
//! [`operand`](super::operand).

use crate::pvm::errors::PvmError;

/// Layout of an instruction's argument bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ArgFamily {
    /// No arguments.
    NoArgs,
    /// One immediate.
    OneImm,
    /// One register and one 8-byte immediate.
    OneRegExtImm,
    /// Two immediates.
    TwoImm,
    /// One jump offset.
    OneOffset,
    /// One register and one immediate.
    OneRegOneImm,
    /// One register and two immediates.
    OneRegTwoImm,
    /// One register, one immediate and one jump offset.
    OneRegImmOffset,
    /// Two registers.
    TwoReg,
    /// Two registers and one immediate.
    TwoRegOneImm,
    /// Two registers and one jump offset.
    TwoRegOneOffset,
    /// Two registers and two immediates.
    TwoRegTwoImm,
    /// Three registers.
    ThreeReg,
}

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each entry reads `Name = opcode, "mnemonic" => Family, gas, terminates_block`.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // No arguments
            // =========================
            /// trap ; panic
            Trap = 0, "trap" => NoArgs, 1, true,
            /// fallthrough ; ends a basic block without jumping
            Fallthrough = 1, "fallthrough" => NoArgs, 1, true,
            // =========================
            // Host calls and wide immediates
            // =========================
            /// ecalli id ; suspend with a host call
            Ecalli = 10, "ecalli" => OneImm, 1, false,
            /// load_imm_64 ra, imm64 ; ra = imm64
            LoadImm64 = 20, "load_imm_64" => OneRegExtImm, 1, false,
            // =========================
            // Stores of immediates to immediate addresses
            // =========================
            /// store_imm_u8 addr, imm ; mem[addr] = imm
            StoreImmU8 = 30, "store_imm_u8" => TwoImm, 1, false,
            /// store_imm_u16 addr, imm
            StoreImmU16 = 31, "store_imm_u16" => TwoImm, 1, false,
            /// store_imm_u32 addr, imm
            StoreImmU32 = 32, "store_imm_u32" => TwoImm, 1, false,
            /// store_imm_u64 addr, imm
            StoreImmU64 = 33, "store_imm_u64" => TwoImm, 1, false,
            // =========================
            // Jumps
            // =========================
            /// jump offset ; pc = pc + offset
            Jump = 40, "jump" => OneOffset, 1, true,
            /// jump_ind ra, imm ; dynamic jump to ra + imm
            JumpInd = 50, "jump_ind" => OneRegOneImm, 1, true,
            // =========================
            // Loads and stores with immediate addresses
            // =========================
            /// load_imm ra, imm ; ra = imm
            LoadImm = 51, "load_imm" => OneRegOneImm, 1, false,
            /// load_u8 ra, addr ; ra = mem[addr]
            LoadU8 = 52, "load_u8" => OneRegOneImm, 1, false,
            /// load_i8 ra, addr
            LoadI8 = 53, "load_i8" => OneRegOneImm, 1, false,
            /// load_u16 ra, addr
            LoadU16 = 54, "load_u16" => OneRegOneImm, 1, false,
            /// load_i16 ra, addr
            LoadI16 = 55, "load_i16" => OneRegOneImm, 1, false,
            /// load_u32 ra, addr
            LoadU32 = 56, "load_u32" => OneRegOneImm, 1, false,
            /// load_i32 ra, addr
            LoadI32 = 57, "load_i32" => OneRegOneImm, 1, false,
            /// load_u64 ra, addr
            LoadU64 = 58, "load_u64" => OneRegOneImm, 1, false,
            /// store_u8 ra, addr ; mem[addr] = ra
            StoreU8 = 59, "store_u8" => OneRegOneImm, 1, false,
            /// store_u16 ra, addr
            StoreU16 = 60, "store_u16" => OneRegOneImm, 1, false,
            /// store_u32 ra, addr
            StoreU32 = 61, "store_u32" => OneRegOneImm, 1, false,
            /// store_u64 ra, addr
            StoreU64 = 62, "store_u64" => OneRegOneImm, 1, false,
            // =========================
            // Stores of immediates to register-relative addresses
            // =========================
            /// store_imm_ind_u8 ra, off, imm ; mem[ra + off] = imm
            StoreImmIndU8 = 70, "store_imm_ind_u8" => OneRegTwoImm, 1, false,
            /// store_imm_ind_u16 ra, off, imm
            StoreImmIndU16 = 71, "store_imm_ind_u16" => OneRegTwoImm, 1, false,
            /// store_imm_ind_u32 ra, off, imm
            StoreImmIndU32 = 72, "store_imm_ind_u32" => OneRegTwoImm, 1, false,
            /// store_imm_ind_u64 ra, off, imm
            StoreImmIndU64 = 73, "store_imm_ind_u64" => OneRegTwoImm, 1, false,
            // =========================
            // Branches against immediates
            // =========================
            /// load_imm_jump ra, imm, offset ; ra = imm, jump
            LoadImmJump = 80, "load_imm_jump" => OneRegImmOffset, 1, true,
            /// branch_eq_imm ra, imm, offset
            BranchEqImm = 81, "branch_eq_imm" => OneRegImmOffset, 1, true,
            /// branch_ne_imm ra, imm, offset
            BranchNeImm = 82, "branch_ne_imm" => OneRegImmOffset, 1, true,
            /// branch_lt_u_imm ra, imm, offset
            BranchLtUImm = 83, "branch_lt_u_imm" => OneRegImmOffset, 1, true,
            /// branch_le_u_imm ra, imm, offset
            BranchLeUImm = 84, "branch_le_u_imm" => OneRegImmOffset, 1, true,
            /// branch_ge_u_imm ra, imm, offset
            BranchGeUImm = 85, "branch_ge_u_imm" => OneRegImmOffset, 1, true,
            /// branch_gt_u_imm ra, imm, offset
            BranchGtUImm = 86, "branch_gt_u_imm" => OneRegImmOffset, 1, true,
            /// branch_lt_s_imm ra, imm, offset
            BranchLtSImm = 87, "branch_lt_s_imm" => OneRegImmOffset, 1, true,
            /// branch_le_s_imm ra, imm, offset
            BranchLeSImm = 88, "branch_le_s_imm" => OneRegImmOffset, 1, true,
            /// branch_ge_s_imm ra, imm, offset
            BranchGeSImm = 89, "branch_ge_s_imm" => OneRegImmOffset, 1, true,
            /// branch_gt_s_imm ra, imm, offset
            BranchGtSImm = 90, "branch_gt_s_imm" => OneRegImmOffset, 1, true,
            // =========================
            // Two registers
            // =========================
            /// move_reg rd, ra ; rd = ra
            MoveReg = 100, "move_reg" => TwoReg, 1, false,
            /// sbrk rd, ra ; rd = heap allocation of ra bytes
            Sbrk = 101, "sbrk" => TwoReg, 1, false,
            /// count_set_bits_64 rd, ra
            CountSetBits64 = 102, "count_set_bits_64" => TwoReg, 1, false,
            /// count_set_bits_32 rd, ra
            CountSetBits32 = 103, "count_set_bits_32" => TwoReg, 1, false,
            /// leading_zero_bits_64 rd, ra
            LeadingZeroBits64 = 104, "leading_zero_bits_64" => TwoReg, 1, false,
            /// leading_zero_bits_32 rd, ra
            LeadingZeroBits32 = 105, "leading_zero_bits_32" => TwoReg, 1, false,
            /// trailing_zero_bits_64 rd, ra
            TrailingZeroBits64 = 106, "trailing_zero_bits_64" => TwoReg, 1, false,
            /// trailing_zero_bits_32 rd, ra
            TrailingZeroBits32 = 107, "trailing_zero_bits_32" => TwoReg, 1, false,
            /// sign_extend_8 rd, ra
            SignExtend8 = 108, "sign_extend_8" => TwoReg, 1, false,
            /// sign_extend_16 rd, ra
            SignExtend16 = 109, "sign_extend_16" => TwoReg, 1, false,
            /// zero_extend_16 rd, ra
            ZeroExtend16 = 110, "zero_extend_16" => TwoReg, 1, false,
            /// reverse_bytes rd, ra
            ReverseBytes = 111, "reverse_bytes" => TwoReg, 1, false,
            // =========================
            // Two registers and one immediate
            // =========================
            /// store_ind_u8 ra, rb, off ; mem[rb + off] = ra
            StoreIndU8 = 120, "store_ind_u8" => TwoRegOneImm, 1, false,
            /// store_ind_u16 ra, rb, off
            StoreIndU16 = 121, "store_ind_u16" => TwoRegOneImm, 1, false,
            /// store_ind_u32 ra, rb, off
            StoreIndU32 = 122, "store_ind_u32" => TwoRegOneImm, 1, false,
            /// store_ind_u64 ra, rb, off
            StoreIndU64 = 123, "store_ind_u64" => TwoRegOneImm, 1, false,
            /// load_ind_u8 ra, rb, off ; ra = mem[rb + off]
            LoadIndU8 = 124, "load_ind_u8" => TwoRegOneImm, 1, false,
            /// load_ind_i8 ra, rb, off
            LoadIndI8 = 125, "load_ind_i8" => TwoRegOneImm, 1, false,
            /// load_ind_u16 ra, rb, off
            LoadIndU16 = 126, "load_ind_u16" => TwoRegOneImm, 1, false,
            /// load_ind_i16 ra, rb, off
            LoadIndI16 = 127, "load_ind_i16" => TwoRegOneImm, 1, false,
            /// load_ind_u32 ra, rb, off
            LoadIndU32 = 128, "load_ind_u32" => TwoRegOneImm, 1, false,
            /// load_ind_i32 ra, rb, off
            LoadIndI32 = 129, "load_ind_i32" => TwoRegOneImm, 1, false,
            /// load_ind_u64 ra, rb, off
            LoadIndU64 = 130, "load_ind_u64" => TwoRegOneImm, 1, false,
            /// add_imm_32 ra, rb, imm ; ra = rb + imm
            AddImm32 = 131, "add_imm_32" => TwoRegOneImm, 1, false,
            /// and_imm ra, rb, imm
            AndImm = 132, "and_imm" => TwoRegOneImm, 1, false,
            /// xor_imm ra, rb, imm
            XorImm = 133, "xor_imm" => TwoRegOneImm, 1, false,
            /// or_imm ra, rb, imm
            OrImm = 134, "or_imm" => TwoRegOneImm, 1, false,
            /// mul_imm_32 ra, rb, imm
            MulImm32 = 135, "mul_imm_32" => TwoRegOneImm, 1, false,
            /// set_lt_u_imm ra, rb, imm ; ra = rb < imm
            SetLtUImm = 136, "set_lt_u_imm" => TwoRegOneImm, 1, false,
            /// set_lt_s_imm ra, rb, imm
            SetLtSImm = 137, "set_lt_s_imm" => TwoRegOneImm, 1, false,
            /// shlo_l_imm_32 ra, rb, imm ; ra = rb << imm
            ShloLImm32 = 138, "shlo_l_imm_32" => TwoRegOneImm, 1, false,
            /// shlo_r_imm_32 ra, rb, imm ; ra = rb >> imm (logical)
            ShloRImm32 = 139, "shlo_r_imm_32" => TwoRegOneImm, 1, false,
            /// shar_r_imm_32 ra, rb, imm ; ra = rb >> imm (arithmetic)
            SharRImm32 = 140, "shar_r_imm_32" => TwoRegOneImm, 1, false,
            /// neg_add_imm_32 ra, rb, imm ; ra = imm - rb
            NegAddImm32 = 141, "neg_add_imm_32" => TwoRegOneImm, 1, false,
            /// set_gt_u_imm ra, rb, imm ; ra = rb > imm
            SetGtUImm = 142, "set_gt_u_imm" => TwoRegOneImm, 1, false,
            /// set_gt_s_imm ra, rb, imm
            SetGtSImm = 143, "set_gt_s_imm" => TwoRegOneImm, 1, false,
            /// shlo_l_imm_alt_32 ra, rb, imm ; ra = imm << rb
            ShloLImmAlt32 = 144, "shlo_l_imm_alt_32" => TwoRegOneImm, 1, false,
            /// shlo_r_imm_alt_32 ra, rb, imm ; ra = imm >> rb
            ShloRImmAlt32 = 145, "shlo_r_imm_alt_32" => TwoRegOneImm, 1, false,
            /// shar_r_imm_alt_32 ra, rb, imm
            SharRImmAlt32 = 146, "shar_r_imm_alt_32" => TwoRegOneImm, 1, false,
            /// cmov_iz_imm ra, rb, imm ; ra = imm if rb == 0
            CmovIzImm = 147, "cmov_iz_imm" => TwoRegOneImm, 1, false,
            /// cmov_nz_imm ra, rb, imm ; ra = imm if rb != 0
            CmovNzImm = 148, "cmov_nz_imm" => TwoRegOneImm, 1, false,
            /// add_imm_64 ra, rb, imm
            AddImm64 = 149, "add_imm_64" => TwoRegOneImm, 1, false,
            /// mul_imm_64 ra, rb, imm
            MulImm64 = 150, "mul_imm_64" => TwoRegOneImm, 1, false,
            /// shlo_l_imm_64 ra, rb, imm
            ShloLImm64 = 151, "shlo_l_imm_64" => TwoRegOneImm, 1, false,
            /// shlo_r_imm_64 ra, rb, imm
            ShloRImm64 = 152, "shlo_r_imm_64" => TwoRegOneImm, 1, false,
            /// shar_r_imm_64 ra, rb, imm
            SharRImm64 = 153, "shar_r_imm_64" => TwoRegOneImm, 1, false,
            /// neg_add_imm_64 ra, rb, imm
            NegAddImm64 = 154, "neg_add_imm_64" => TwoRegOneImm, 1, false,
            /// shlo_l_imm_alt_64 ra, rb, imm
            ShloLImmAlt64 = 155, "shlo_l_imm_alt_64" => TwoRegOneImm, 1, false,
            /// shlo_r_imm_alt_64 ra, rb, imm
            ShloRImmAlt64 = 156, "shlo_r_imm_alt_64" => TwoRegOneImm, 1, false,
            /// shar_r_imm_alt_64 ra, rb, imm
            SharRImmAlt64 = 157, "shar_r_imm_alt_64" => TwoRegOneImm, 1, false,
            /// rot_r_64_imm ra, rb, imm
            RotR64Imm = 158, "rot_r_64_imm" => TwoRegOneImm, 1, false,
            /// rot_r_64_imm_alt ra, rb, imm
            RotR64ImmAlt = 159, "rot_r_64_imm_alt" => TwoRegOneImm, 1, false,
            /// rot_r_32_imm ra, rb, imm
            RotR32Imm = 160, "rot_r_32_imm" => TwoRegOneImm, 1, false,
            /// rot_r_32_imm_alt ra, rb, imm
            RotR32ImmAlt = 161, "rot_r_32_imm_alt" => TwoRegOneImm, 1, false,
            // =========================
            // Branches between registers
            // =========================
            /// branch_eq ra, rb, offset
            BranchEq = 170, "branch_eq" => TwoRegOneOffset, 1, true,
            /// branch_ne ra, rb, offset
            BranchNe = 171, "branch_ne" => TwoRegOneOffset, 1, true,
            /// branch_lt_u ra, rb, offset
            BranchLtU = 172, "branch_lt_u" => TwoRegOneOffset, 1, true,
            /// branch_lt_s ra, rb, offset
            BranchLtS = 173, "branch_lt_s" => TwoRegOneOffset, 1, true,
            /// branch_ge_u ra, rb, offset
            BranchGeU = 174, "branch_ge_u" => TwoRegOneOffset, 1, true,
            /// branch_ge_s ra, rb, offset
            BranchGeS = 175, "branch_ge_s" => TwoRegOneOffset, 1, true,
            // =========================
            // Two registers and two immediates
            // =========================
            /// load_imm_jump_ind ra, rb, imm, off ; ra = imm, dynamic jump to rb + off
            LoadImmJumpInd = 180, "load_imm_jump_ind" => TwoRegTwoImm, 1, true,
            // =========================
            // Three registers
            // =========================
            /// add_32 rd, ra, rb
            Add32 = 190, "add_32" => ThreeReg, 1, false,
            /// sub_32 rd, ra, rb
            Sub32 = 191, "sub_32" => ThreeReg, 1, false,
            /// mul_32 rd, ra, rb
            Mul32 = 192, "mul_32" => ThreeReg, 1, false,
            /// div_u_32 rd, ra, rb
            DivU32 = 193, "div_u_32" => ThreeReg, 1, false,
            /// div_s_32 rd, ra, rb
            DivS32 = 194, "div_s_32" => ThreeReg, 1, false,
            /// rem_u_32 rd, ra, rb
            RemU32 = 195, "rem_u_32" => ThreeReg, 1, false,
            /// rem_s_32 rd, ra, rb
            RemS32 = 196, "rem_s_32" => ThreeReg, 1, false,
            /// shlo_l_32 rd, ra, rb
            ShloL32 = 197, "shlo_l_32" => ThreeReg, 1, false,
            /// shlo_r_32 rd, ra, rb
            ShloR32 = 198, "shlo_r_32" => ThreeReg, 1, false,
            /// shar_r_32 rd, ra, rb
            SharR32 = 199, "shar_r_32" => ThreeReg, 1, false,
            /// add_64 rd, ra, rb
            Add64 = 200, "add_64" => ThreeReg, 1, false,
            /// sub_64 rd, ra, rb
            Sub64 = 201, "sub_64" => ThreeReg, 1, false,
            /// mul_64 rd, ra, rb
            Mul64 = 202, "mul_64" => ThreeReg, 1, false,
            /// div_u_64 rd, ra, rb
            DivU64 = 203, "div_u_64" => ThreeReg, 1, false,
            /// div_s_64 rd, ra, rb
            DivS64 = 204, "div_s_64" => ThreeReg, 1, false,
            /// rem_u_64 rd, ra, rb
            RemU64 = 205, "rem_u_64" => ThreeReg, 1, false,
            /// rem_s_64 rd, ra, rb
            RemS64 = 206, "rem_s_64" => ThreeReg, 1, false,
            /// shlo_l_64 rd, ra, rb
            ShloL64 = 207, "shlo_l_64" => ThreeReg, 1, false,
            /// shlo_r_64 rd, ra, rb
            ShloR64 = 208, "shlo_r_64" => ThreeReg, 1, false,
            /// shar_r_64 rd, ra, rb
            SharR64 = 209, "shar_r_64" => ThreeReg, 1, false,
            /// and rd, ra, rb
            And = 210, "and" => ThreeReg, 1, false,
            /// xor rd, ra, rb
            Xor = 211, "xor" => ThreeReg, 1, false,
            /// or rd, ra, rb
            Or = 212, "or" => ThreeReg, 1, false,
            /// mul_upper_s_s rd, ra, rb ; high 64 bits of signed × signed
            MulUpperSS = 213, "mul_upper_s_s" => ThreeReg, 1, false,
            /// mul_upper_u_u rd, ra, rb ; high 64 bits of unsigned × unsigned
            MulUpperUU = 214, "mul_upper_u_u" => ThreeReg, 1, false,
            /// mul_upper_s_u rd, ra, rb ; high 64 bits of signed × unsigned
            MulUpperSU = 215, "mul_upper_s_u" => ThreeReg, 1, false,
            /// set_lt_u rd, ra, rb
            SetLtU = 216, "set_lt_u" => ThreeReg, 1, false,
            /// set_lt_s rd, ra, rb
            SetLtS = 217, "set_lt_s" => ThreeReg, 1, false,
            /// cmov_iz rd, ra, rb ; rd = ra if rb == 0
            CmovIz = 218, "cmov_iz" => ThreeReg, 1, false,
            /// cmov_nz rd, ra, rb ; rd = ra if rb != 0
            CmovNz = 219, "cmov_nz" => ThreeReg, 1, false,
            /// rot_l_64 rd, ra, rb
            RotL64 = 220, "rot_l_64" => ThreeReg, 1, false,
            /// rot_l_32 rd, ra, rb
            RotL32 = 221, "rot_l_32" => ThreeReg, 1, false,
            /// rot_r_64 rd, ra, rb
            RotR64 = 222, "rot_r_64" => ThreeReg, 1, false,
            /// rot_r_32 rd, ra, rb
            RotR32 = 223, "rot_r_32" => ThreeReg, 1, false,
            /// and_inv rd, ra, rb ; rd = ra & !rb
            AndInv = 224, "and_inv" => ThreeReg, 1, false,
            /// or_inv rd, ra, rb ; rd = ra | !rb
            OrInv = 225, "or_inv" => ThreeReg, 1, false,
            /// xnor rd, ra, rb ; rd = !(ra ^ rb)
            Xnor = 226, "xnor" => ThreeReg, 1, false,
            /// max rd, ra, rb (signed)
            Max = 227, "max" => ThreeReg, 1, false,
            /// max_u rd, ra, rb
            MaxU = 228, "max_u" => ThreeReg, 1, false,
            /// min rd, ra, rb (signed)
            Min = 229, "min" => ThreeReg, 1, false,
            /// min_u rd, ra, rb
            MinU = 230, "min_u" => ThreeReg, 1, false,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $family:ident, $gas:expr, $terminator:literal
        ),* $(,)?
    ) => {
        /// A registered machine instruction, discriminant = opcode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        /// `REGISTERED[opcode]` is true iff the byte names an instruction.
        const REGISTERED: [Option<Instruction>; 256] = {
            let mut table = [None; 256];
            $( table[$opcode] = Some(Instruction::$name); )*
            table
        };

        impl TryFrom<u8> for Instruction {
            type Error = PvmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                REGISTERED[value as usize].ok_or(PvmError::UnknownOpcode(value))
            }
        }

        impl Instruction {
            /// Every registered instruction in opcode order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Looks up an opcode without allocating an error.
            #[inline(always)]
            pub const fn from_opcode(opcode: u8) -> Option<Instruction> {
                REGISTERED[opcode as usize]
            }

            /// Returns the opcode byte.
            pub const fn opcode(self) -> u8 {
                self as u8
            }

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns the layout of this instruction's argument bytes.
            pub const fn family(self) -> ArgFamily {
                match self {
                    $( Instruction::$name => ArgFamily::$family, )*
                }
            }

            /// Returns the base gas cost for this instruction.
            pub const fn base_gas(self) -> u64 {
                match self {
                    $( Instruction::$name => $gas, )*
                }
            }

            /// True if the instruction ends a basic block.
            pub const fn is_block_terminator(self) -> bool {
                match self {
                    $( Instruction::$name => $terminator, )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}
