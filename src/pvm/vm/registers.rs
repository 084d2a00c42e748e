use crate::pvm::constants::REGISTER_COUNT;
use crate::pvm::errors::PvmError;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Register identifier, always below [`REGISTER_COUNT`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Reg(u8);

impl Reg {
    /// Builds a register id, mapping anything above the last register onto it.
    #[inline(always)]
    pub const fn clamped(index: u8) -> Self {
        let last = (REGISTER_COUNT - 1) as u8;
        Reg(if index > last { last } else { index })
    }

    /// Builds a register id, rejecting out-of-range indices.
    pub fn new(index: u8) -> Result<Self, PvmError> {
        if (index as usize) < REGISTER_COUNT {
            Ok(Reg(index))
        } else {
            Err(PvmError::InvalidRegisterIndex {
                index,
                available: REGISTER_COUNT,
            })
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Register file: 13 unsigned 64-bit words.
///
/// Values are always stored unsigned; signed instructions reinterpret them with
/// [`to_signed`](crate::pvm::sign::to_signed).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Registers {
    regs: [u64; REGISTER_COUNT],
}

impl Registers {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a register file from explicit values.
    pub fn from_array(regs: [u64; REGISTER_COUNT]) -> Self {
        Self { regs }
    }

    /// Returns the value in register `idx`.
    ///
    /// Returns [`PvmError::InvalidRegisterIndex`] if `idx` is out of bounds.
    pub fn get(&self, idx: u8) -> Result<u64, PvmError> {
        Ok(self[Reg::new(idx)?])
    }

    /// Stores `value` into register `idx`.
    ///
    /// Returns [`PvmError::InvalidRegisterIndex`] if `idx` is out of bounds.
    pub fn set(&mut self, idx: u8, value: u64) -> Result<(), PvmError> {
        self[Reg::new(idx)?] = value;
        Ok(())
    }

    pub fn as_array(&self) -> &[u64; REGISTER_COUNT] {
        &self.regs
    }
}

impl Index<Reg> for Registers {
    type Output = u64;

    #[inline(always)]
    fn index(&self, reg: Reg) -> &u64 {
        &self.regs[reg.index()]
    }
}

impl IndexMut<Reg> for Registers {
    #[inline(always)]
    fn index_mut(&mut self, reg: Reg) -> &mut u64 {
        &mut self.regs[reg.index()]
    }
}
