use super::Interpreter;
use crate::consts::*;
use crate::error::RuntimeError;
use crate::state::CompareFlags;

use hatch_asm::AddressFlags;

impl Interpreter {
    pub(crate) fn jump(&mut self, target: u8) {
        self.registers[REG_INST] = target;
    }

    /// Conditional jump: taken iff `flag` was latched by the last `CMP`.
    pub(crate) fn branch(
        &mut self,
        flag: CompareFlags,
        flags: AddressFlags,
        operand: u8,
    ) -> Result<(), RuntimeError> {
        if self.compare.contains(flag) {
            let target = self.resolve_read(flags, operand)?;
            self.jump(target);
        }
        Ok(())
    }

    pub(crate) fn latch_compare(&mut self) {
        self.compare = CompareFlags::from_pair(self.registers[REG_A], self.registers[REG_B]);
    }

    /// `CALL`: the program counter has already advanced past the call
    /// instruction, so its current value is the return address.
    pub(crate) fn call(&mut self, flags: AddressFlags, operand: u8) -> Result<(), RuntimeError> {
        let target = self.resolve_read(flags, operand)?;
        self.call_stack.push(self.registers[REG_INST]);
        self.jump(target);
        Ok(())
    }

    /// `RET`: pops the return address, restores `A` and `B` from the two
    /// `SAVE`d data-stack cells, and loads `F` with the operand when the
    /// stack flag is clear (the literal-return shortcut).
    pub(crate) fn ret(&mut self, flags: AddressFlags, operand: u8) -> Result<(), RuntimeError> {
        let return_to = self
            .call_stack
            .pop()
            .ok_or(RuntimeError::CallStackUnderflow)?;

        if !flags.contains(AddressFlags::STACK) {
            self.registers[REG_F] = operand;
        }

        let b = self
            .data_stack
            .pop()
            .ok_or(RuntimeError::DataStackUnderflow)?;
        let a = self
            .data_stack
            .pop()
            .ok_or(RuntimeError::DataStackUnderflow)?;
        self.registers[REG_B] = b;
        self.registers[REG_A] = a;

        self.jump(return_to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::*;
    use crate::Interpreter;

    use hatch_asm::AddressFlags;

    #[test]
    fn save_then_ret_restores_registers() {
        let mut vm = Interpreter::new();
        vm.set_ab(13, 74);
        vm.save();
        vm.set_ab(0, 0);
        vm.call_stack.push(42);

        vm.ret(AddressFlags::empty(), 7).unwrap();

        assert_eq!(13, vm.registers()[REG_A]);
        assert_eq!(74, vm.registers()[REG_B]);
        assert_eq!(7, vm.registers()[REG_F]);
        assert_eq!(42, vm.registers()[REG_INST]);
    }

    #[test]
    fn stack_flagged_ret_preserves_f() {
        let mut vm = Interpreter::new();
        vm.registers[REG_F] = 99;
        vm.save();
        vm.call_stack.push(0);

        vm.ret(AddressFlags::STACK, 0).unwrap();

        assert_eq!(99, vm.registers()[REG_F]);
    }

    #[test]
    fn ret_without_caller_faults() {
        let mut vm = Interpreter::new();
        vm.save();
        assert!(vm.ret(AddressFlags::empty(), 0).is_err());
    }
}
