//! Protocol constants of the machine.

use crate::pvm::vm::gas::Gas;

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 13;

/// Page size (`Zp`): the granularity of memory access control.
pub const PAGE_SIZE: u32 = 1 << 14;

/// Zone size (`Zz`): gap between memory zones. Accesses below it panic instead of faulting.
pub const ZONE_SIZE: u32 = 1 << 16;

/// Input size (`Zi`): size of the argument zone and of the instruction gap.
pub const INPUT_SIZE: u32 = 1 << 24;

/// Dynamic jump alignment (`ZA`).
pub const JUMP_ALIGNMENT: u32 = 2;

/// Dynamic jump address that halts the machine.
pub const HALT_ADDRESS: u32 = u32::MAX - ZONE_SIZE + 1;

/// Number of addressable pages.
pub const PAGE_COUNT: u32 = (1u64 << 32).div_ceil(PAGE_SIZE as u64) as u32;

/// Gas charged for a trap (unknown opcode, invalid pointer, page fault surcharge).
pub const TRAP_COST: Gas = 1;

/// Rounds `size` up to a whole number of pages (`P(x)`).
pub const fn page_align(size: u64) -> u64 {
    size.div_ceil(PAGE_SIZE as u64) * PAGE_SIZE as u64
}

/// Rounds `size` up to a whole number of zones (`Z(x)`).
pub const fn zone_align(size: u64) -> u64 {
    size.div_ceil(ZONE_SIZE as u64) * ZONE_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_address_value() {
        assert_eq!(HALT_ADDRESS, 0xFFFF_0000);
        assert_eq!(PAGE_COUNT, 1 << 18);
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(page_align(0), 0);
        assert_eq!(page_align(1), PAGE_SIZE as u64);
        assert_eq!(page_align(PAGE_SIZE as u64), PAGE_SIZE as u64);
        assert_eq!(zone_align(ZONE_SIZE as u64 + 1), 2 * ZONE_SIZE as u64);
    }
}
