use crate::Opcode;

use core::fmt;

use thiserror::Error;

bitflags::bitflags! {
    /// Addressing flags carried in the top bits of the leading instruction
    /// byte.
    ///
    /// Exactly one interpretation of the operand applies:
    ///
    /// * `MEM` — the operand is a memory address; the effective address is
    ///   `operand + O`.
    /// * `STACK` — the operand is a 1-based offset from the top of the data
    ///   stack; the effective address is `stack[top − operand] + O`.
    /// * neither — the operand is an immediate.
    ///
    /// The third bit is reserved and must be clear; an instruction with it
    /// set does not decode.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AddressFlags: u8 {
        /// Operand addresses memory directly.
        const MEM = 0b1000_0000;
        /// Operand is a data-stack offset.
        const STACK = 0b0100_0000;
    }
}

/// The leading byte did not decode to a known instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("undefined opcode byte 0x{0:02x}")]
pub struct InvalidOpcodeError(pub u8);

/// A decoded instruction: a 5-bit opcode, its addressing flags, and the
/// 8-bit operand.
///
/// Instructions are encoded as two consecutive bytes; a program image is a
/// flat sequence of such pairs followed by the data section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    op: Opcode,
    flags: AddressFlags,
    operand: u8,
}

impl Instruction {
    /// Size of an encoded instruction in bytes.
    pub const LEN: usize = crate::INSTRUCTION_LEN;

    /// Bit reserved for future addressing modes; set means undecodable.
    const RESERVED_BIT: u8 = 0b0010_0000;

    /// A new instruction with an immediate operand.
    pub const fn new(op: Opcode, operand: u8) -> Self {
        Self {
            op,
            flags: AddressFlags::empty(),
            operand,
        }
    }

    /// A new instruction with explicit addressing flags.
    pub const fn with_flags(op: Opcode, flags: AddressFlags, operand: u8) -> Self {
        Self { op, flags, operand }
    }

    /// The opcode.
    pub const fn op(&self) -> Opcode {
        self.op
    }

    /// The addressing flags.
    pub const fn flags(&self) -> AddressFlags {
        self.flags
    }

    /// The raw operand byte.
    pub const fn operand(&self) -> u8 {
        self.operand
    }

    /// Encodes to the two-byte wire representation.
    pub const fn to_bytes(self) -> [u8; Self::LEN] {
        [self.op as u8 | self.flags.bits(), self.operand]
    }

    /// Decodes an instruction from its leading and operand bytes.
    ///
    /// Fails if the reserved bit of the leading byte is set.
    pub fn from_bytes(lead: u8, operand: u8) -> Result<Self, InvalidOpcodeError> {
        if lead & Self::RESERVED_BIT != 0 {
            return Err(InvalidOpcodeError(lead));
        }

        let flags = AddressFlags::from_bits_truncate(lead);
        let op = Opcode::from_low_bits(lead);

        Ok(Self { op, flags, operand })
    }

    /// Decodes every aligned instruction pair of a byte slice, stopping at
    /// the first byte that does not decode. Used by the disassembler; the
    /// undecodable tail is typically the data section.
    pub fn decode_prefix(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::LEN)
            .map(|pair| Self::from_bytes(pair[0], pair[1]))
            .take_while(Result::is_ok)
            .collect::<Result<_, _>>()
            .unwrap_or_default()
    }
}

impl fmt::Display for Instruction {
    /// Renders in listing syntax: `$n` for stack-relative operands, `[n]`
    /// for memory operands, a bare number for immediates.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mem = self.flags.contains(AddressFlags::MEM);
        let stack = self.flags.contains(AddressFlags::STACK);
        match (mem, stack) {
            (true, true) => write!(f, "{} [${}]", self.op, self.operand),
            (true, false) => write!(f, "{} [{}]", self.op, self.operand),
            (false, true) => write!(f, "{} ${}", self.op, self.operand),
            (false, false) => write!(f, "{} {}", self.op, self.operand),
        }
    }
}

impl From<Instruction> for [u8; Instruction::LEN] {
    fn from(instruction: Instruction) -> Self {
        instruction.to_bytes()
    }
}

impl FromIterator<Instruction> for Vec<u8> {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Instruction>,
    {
        iter.into_iter()
            .flat_map(Instruction::to_bytes)
            .collect()
    }
}
