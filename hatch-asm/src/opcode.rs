/// Opcode representation for the Hatch VM.
///
/// The opcode occupies the low five bits of the leading instruction byte;
/// the remaining bits carry the addressing flags (see
/// [`AddressFlags`](crate::AddressFlags)). Unless noted otherwise, the
/// operand byte is interpreted through the flags: an immediate, a memory
/// address to dereference, or a 1-based data-stack offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    NOP = 0x00,

    /// Loads the operand into register `A`.
    ///
    /// | Operation | `A ← operand` |
    /// | Syntax    | `LDA operand` |
    LDA = 0x01,

    /// Loads the operand into register `B`.
    ///
    /// | Operation | `B ← operand` |
    /// | Syntax    | `LDB operand` |
    LDB = 0x02,

    /// Releases stack-held memory.
    ///
    /// With no flags, pops `operand` entries from the data stack and
    /// releases the scalar cell each one points at. With the memory flag,
    /// pops a single entry addressing a length-prefixed aggregate and
    /// releases all `length + 1` cells.
    FREE = 0x03,

    /// Appends the value of register `B` to the output log.
    PRB = 0x04,

    /// Wrapping addition.
    ///
    /// | Operation | `A ← (A + B) mod 256` |
    ADD = 0x05,

    /// Halts execution.
    HLT = 0x06,

    /// Appends the resolved operand to the output log as an integer.
    PRX = 0x07,

    /// Unconditional jump.
    ///
    /// | Operation | `INST ← operand` |
    JMP = 0x08,

    /// Stores register `A` at the effective address.
    STA = 0x09,

    /// Stores register `B` at the effective address.
    STB = 0x0a,

    /// Increments the byte at the effective address, wrapping.
    INC = 0x0b,

    /// Decrements the byte at the effective address, wrapping.
    DEC = 0x0c,

    /// Register-to-register move.
    ///
    /// The operand packs two register indices: the high nibble selects the
    /// destination, the low nibble the source (see
    /// [`mov_operand`](crate::mov_operand)).
    MOV = 0x0d,

    /// Compares `A` against `B` and latches all six condition flags
    /// (EQ, NE, GT, LT, GE, LE) for the conditional jumps.
    CMP = 0x0e,

    /// Jumps to the operand if the EQ flag is set.
    JE = 0x0f,

    /// Wrapping subtraction.
    ///
    /// | Operation | `A ← (A − B) mod 256` |
    NEG = 0x10,

    /// Calls a function: pushes the (already advanced) instruction pointer
    /// onto the call stack and jumps to the resolved operand.
    CALL = 0x11,

    /// Returns from a function: pops the call stack into `INST`, restores
    /// `A` and `B` from the two `SAVE`d data-stack cells, and — when the
    /// stack flag is clear — loads `F` with the operand (the literal-return
    /// shortcut).
    RET = 0x12,

    /// Reserves `operand` contiguous free cells in the runtime region and
    /// pushes the starting address onto the data stack.
    PUSH = 0x13,

    /// Drops `operand` entries from the data stack without releasing the
    /// memory they address.
    POP = 0x14,

    /// Pushes the current values of `A`, then `B`, onto the data stack.
    SAVE = 0x15,

    /// Jumps to the operand if the NE flag is set.
    JNE = 0x16,

    /// Jumps to the operand if the GT flag is set.
    JG = 0x17,

    /// Jumps to the operand if the LT flag is set.
    JL = 0x18,

    /// Jumps to the operand if the GE flag is set.
    JGE = 0x19,

    /// Jumps to the operand if the LE flag is set.
    JLE = 0x1a,

    /// Loads the offset register `O` with the resolved operand. `O` is
    /// added to every stack-relative and memory-relative effective address.
    OFF = 0x1b,

    /// Wrapping multiplication.
    ///
    /// | Operation | `A ← (A × B) mod 256` |
    MUL = 0x1c,

    /// Truncating division.
    ///
    /// | Operation | `A ← A ÷ B` |
    ///
    /// Division by zero is a runtime fault.
    DIV = 0x1d,

    /// Appends the resolved operand to the output log as a character.
    PRC = 0x1e,

    /// Duplicates the length-prefixed aggregate addressed by the stack
    /// entry at `top − operand` into a fresh allocation and pushes the new
    /// address.
    DUP = 0x1f,
}

impl Opcode {
    /// Bit mask selecting the opcode out of the leading instruction byte.
    pub const MASK: u8 = 0b0001_1111;

    /// Decodes the low five bits of a raw leading byte.
    pub const fn from_low_bits(byte: u8) -> Self {
        use Opcode::*;
        match byte & Self::MASK {
            0x00 => NOP,
            0x01 => LDA,
            0x02 => LDB,
            0x03 => FREE,
            0x04 => PRB,
            0x05 => ADD,
            0x06 => HLT,
            0x07 => PRX,
            0x08 => JMP,
            0x09 => STA,
            0x0a => STB,
            0x0b => INC,
            0x0c => DEC,
            0x0d => MOV,
            0x0e => CMP,
            0x0f => JE,
            0x10 => NEG,
            0x11 => CALL,
            0x12 => RET,
            0x13 => PUSH,
            0x14 => POP,
            0x15 => SAVE,
            0x16 => JNE,
            0x17 => JG,
            0x18 => JL,
            0x19 => JGE,
            0x1a => JLE,
            0x1b => OFF,
            0x1c => MUL,
            0x1d => DIV,
            0x1e => PRC,
            _ => DUP,
        }
    }
}
