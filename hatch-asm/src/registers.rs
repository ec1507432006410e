use crate::MEMORY_SIZE;

use thiserror::Error;

/// A nibble did not name a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid register index {0}")]
pub struct InvalidRegisterError(pub u8);

/// Register identifiers of the machine.
///
/// Each register is mirrored into the reserved top cells of memory at
/// address `255 − index`, so ordinary memory-addressed instructions can
/// read and write the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RegisterId {
    /// Primary accumulator; implicit left operand of the ALU.
    A = 0,
    /// Secondary operand register.
    B = 1,
    /// Unused by the current emitter; kept for the mirror layout.
    C = 2,
    /// The program counter.
    Inst = 3,
    /// Function-return handover register.
    F = 4,
    /// Offset register, added to aggregate-relative effective addresses.
    O = 5,
}

impl RegisterId {
    /// The memory address this register is mirrored at.
    pub const fn mirror_address(self) -> u8 {
        (MEMORY_SIZE - 1) as u8 - self as u8
    }

    /// The register mirrored at `address`, if any.
    pub const fn from_mirror_address(address: u8) -> Option<Self> {
        match address {
            255 => Some(Self::A),
            254 => Some(Self::B),
            253 => Some(Self::C),
            252 => Some(Self::Inst),
            251 => Some(Self::F),
            250 => Some(Self::O),
            _ => None,
        }
    }
}

impl TryFrom<u8> for RegisterId {
    type Error = InvalidRegisterError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::A),
            1 => Ok(Self::B),
            2 => Ok(Self::C),
            3 => Ok(Self::Inst),
            4 => Ok(Self::F),
            5 => Ok(Self::O),
            _ => Err(InvalidRegisterError(index)),
        }
    }
}

/// Packs a `MOV` operand: destination register in the high nibble, source
/// register in the low nibble.
pub const fn mov_operand(dst: RegisterId, src: RegisterId) -> u8 {
    ((dst as u8) << 4) | src as u8
}

/// Splits a `MOV` operand back into `(destination, source)`.
pub fn unpack_mov_operand(operand: u8) -> Result<(RegisterId, RegisterId), InvalidRegisterError> {
    let dst = RegisterId::try_from(operand >> 4)?;
    let src = RegisterId::try_from(operand & 0x0f)?;
    Ok((dst, src))
}
