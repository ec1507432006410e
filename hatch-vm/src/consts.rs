//! VM parameters.

pub use hatch_asm::{MEMORY_SIZE, PROGRAM_CEILING, RESERVED_CELLS};

/// Register count of the machine.
pub const VM_REGISTER_COUNT: usize = 6;

/// Primary accumulator.
pub const REG_A: usize = 0;

/// Secondary operand register.
pub const REG_B: usize = 1;

/// Unused register; mirrored for layout completeness.
pub const REG_C: usize = 2;

/// The program counter.
pub const REG_INST: usize = 3;

/// Function return handover.
pub const REG_F: usize = 4;

/// Offset register for aggregate indexing.
pub const REG_O: usize = 5;
