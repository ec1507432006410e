use super::Interpreter;
use crate::consts::*;
use crate::error::RuntimeError;
use crate::state::Output;

use hatch_asm::AddressFlags;

impl Interpreter {
    /// `PRX`: appends the resolved operand to the output log as an
    /// integer.
    pub(crate) fn print_int(
        &mut self,
        flags: AddressFlags,
        operand: u8,
    ) -> Result<(), RuntimeError> {
        let value = self.resolve_read(flags, operand)?;
        self.output.push(Output::Int(value));
        Ok(())
    }

    /// `PRB`: appends the value of register `B`.
    pub(crate) fn print_b(&mut self) {
        self.output.push(Output::Int(self.registers[REG_B]));
    }

    /// `PRC`: appends the resolved operand as a character byte.
    pub(crate) fn print_char(
        &mut self,
        flags: AddressFlags,
        operand: u8,
    ) -> Result<(), RuntimeError> {
        let value = self.resolve_read(flags, operand)?;
        self.output.push(Output::Char(value));
        Ok(())
    }
}
