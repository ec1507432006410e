//! Runtime interpreter error implementation.

use thiserror::Error;

/// Faults that abort execution.
///
/// Every variant is terminal: the machine offers no recovery path, so the
/// interpreter surfaces the fault and leaves the partial output log in
/// place for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The leading byte at the program counter did not decode.
    #[error("undefined opcode byte 0x{byte:02x} at address {address}")]
    UndefinedOpcode {
        /// The raw leading byte.
        byte: u8,
        /// Address it was fetched from.
        address: u8,
    },

    /// An instruction fetch ran past the end of memory.
    #[error("instruction fetch out of bounds at address {address}")]
    FetchOutOfBounds {
        /// The program counter at the faulting fetch.
        address: usize,
    },

    /// `PUSH` or `DUP` found no contiguous run of free cells.
    #[error("out of memory: no contiguous run of {cells} free cells")]
    OutOfMemory {
        /// Cells requested.
        cells: usize,
    },

    /// `DIV` with a zero divisor.
    #[error("division by zero at address {address}")]
    DivisionByZero {
        /// Address of the faulting instruction.
        address: u8,
    },

    /// A stack-relative operand addressed below the bottom of the data
    /// stack, or a pop emptied it.
    #[error("data stack underflow")]
    DataStackUnderflow,

    /// `RET` with no caller recorded.
    #[error("call stack underflow")]
    CallStackUnderflow,

    /// A `MOV` operand nibble named no register.
    #[error("invalid register pair in MOV operand 0x{operand:02x}")]
    InvalidMovOperand {
        /// The raw operand byte.
        operand: u8,
    },

    /// The loaded image does not leave room for the register file.
    #[error("image of {0} bytes exceeds the {ceiling}-byte program region", ceiling = crate::consts::PROGRAM_CEILING)]
    ImageTooLarge(usize),
}
