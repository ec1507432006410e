//! Atomic types of the Hatch virtual machine instruction set.
//!
//! Every instruction is two bytes: a leading byte carrying the addressing
//! flags and a 5-bit opcode, and an operand byte. The same definitions are
//! shared by the bytecode emitter and the interpreter so the two can never
//! disagree on the wire format.

#![warn(missing_docs)]

mod instruction;
mod opcode;
mod registers;

#[cfg(test)]
mod encoding_tests;

pub use instruction::{AddressFlags, Instruction, InvalidOpcodeError};
pub use opcode::Opcode;
pub use registers::{mov_operand, unpack_mov_operand, InvalidRegisterError, RegisterId};

/// Size of an encoded instruction, in bytes.
pub const INSTRUCTION_LEN: usize = 2;

/// Total addressable memory of the machine, in bytes.
pub const MEMORY_SIZE: usize = 256;

/// Number of cells at the top of memory reserved for register mirroring.
pub const RESERVED_CELLS: usize = 16;

/// Highest address (exclusive) a program image may occupy; the cells above
/// are reserved for the register file.
pub const PROGRAM_CEILING: usize = MEMORY_SIZE - RESERVED_CELLS;
