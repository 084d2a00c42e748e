//! Test utilities for building machine programs by hand.

#[cfg(test)]
pub mod utils {
    use crate::pvm::init::ProgramBlob;
    use crate::pvm::isa::Instruction;
    use crate::pvm::program::{ParsedProgram, Program};

    /// Packs two register indices into one argument byte: `lo` in the low nibble.
    pub fn regs(lo: u8, hi: u8) -> u8 {
        lo | hi << 4
    }

    /// Assembles code bytes and the matching boundary mask one instruction at a time.
    #[derive(Default)]
    pub struct ProgramBuilder {
        code: Vec<u8>,
        mask: Vec<bool>,
        jump_table: Vec<u32>,
    }

    impl ProgramBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Appends `instr` followed by its raw argument bytes.
        pub fn instr(&mut self, instr: Instruction, args: &[u8]) -> &mut Self {
            self.raw(instr.opcode(), args)
        }

        /// Appends any opcode byte, registered or not.
        pub fn raw(&mut self, opcode: u8, args: &[u8]) -> &mut Self {
            self.code.push(opcode);
            self.mask.push(true);
            self.code.extend_from_slice(args);
            self.mask.extend(std::iter::repeat_n(false, args.len()));
            self
        }

        pub fn jump_table(&mut self, targets: &[u32]) -> &mut Self {
            self.jump_table = targets.to_vec();
            self
        }

        pub fn build(&self) -> Program {
            Program::new(self.code.clone(), self.mask.clone(), self.jump_table.clone())
                .expect("builder produced an invalid program")
        }

        pub fn parse(&self) -> ParsedProgram {
            ParsedProgram::parse(self.build())
        }

        /// Wraps the code in a program blob with no data sections and a one-page stack.
        pub fn program_blob(&self) -> Vec<u8> {
            self.program_blob_with(&[], &[], 0)
        }

        pub fn program_blob_with(&self, ro_data: &[u8], rw_data: &[u8], heap_pages: u16) -> Vec<u8> {
            let code = self.build().to_blob();
            ProgramBlob {
                ro_data,
                rw_data,
                heap_pages,
                stack_size: 1 << 14,
                code: &code,
            }
            .encode()
        }
    }
}
