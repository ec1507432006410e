use super::Interpreter;
use crate::consts::*;
use crate::error::RuntimeError;
use crate::state::{CompareFlags, ExecuteState};

use hatch_asm::{unpack_mov_operand, Instruction, Opcode, MEMORY_SIZE};

use tracing::trace;

impl Interpreter {
    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self) -> Result<ExecuteState, RuntimeError> {
        let pc = self.registers[REG_INST] as usize;
        if pc + 1 >= MEMORY_SIZE {
            return Err(RuntimeError::FetchOutOfBounds { address: pc });
        }

        let lead = self.mem_read(pc as u8);
        let operand = self.mem_read(pc as u8 + 1);
        let instruction = Instruction::from_bytes(lead, operand).map_err(|invalid| {
            RuntimeError::UndefinedOpcode {
                byte: invalid.0,
                address: pc as u8,
            }
        })?;

        // The counter advances before dispatch so CALL records the right
        // return address and jumps overwrite a final value.
        self.registers[REG_INST] = (pc as u8).wrapping_add(Instruction::LEN as u8);

        trace!(
            pc,
            %instruction,
            a = self.registers[REG_A],
            b = self.registers[REG_B],
            f = self.registers[REG_F],
            o = self.registers[REG_O],
            stack_depth = self.data_stack.len(),
            "cycle"
        );

        self.execute(instruction)
    }

    fn execute(&mut self, instruction: Instruction) -> Result<ExecuteState, RuntimeError> {
        let flags = instruction.flags();
        let operand = instruction.operand();

        match instruction.op() {
            Opcode::NOP => {}

            Opcode::LDA => {
                self.registers[REG_A] = self.resolve_read(flags, operand)?;
            }

            Opcode::LDB => {
                self.registers[REG_B] = self.resolve_read(flags, operand)?;
            }

            Opcode::FREE => self.free(flags, operand)?,

            Opcode::PRB => self.print_b(),

            Opcode::ADD => self.alu_wrapping(u8::wrapping_add),

            Opcode::HLT => return Ok(ExecuteState::Halt),

            Opcode::PRX => self.print_int(flags, operand)?,

            Opcode::JMP => {
                let target = self.resolve_read(flags, operand)?;
                self.jump(target);
            }

            Opcode::STA => {
                let address = self.effective_address(flags, operand)?;
                self.mem_write(address, self.registers[REG_A]);
            }

            Opcode::STB => {
                let address = self.effective_address(flags, operand)?;
                self.mem_write(address, self.registers[REG_B]);
            }

            Opcode::INC => {
                let address = self.effective_address(flags, operand)?;
                self.mem_write(address, self.mem_read(address).wrapping_add(1));
            }

            Opcode::DEC => {
                let address = self.effective_address(flags, operand)?;
                self.mem_write(address, self.mem_read(address).wrapping_sub(1));
            }

            Opcode::MOV => {
                let (dst, src) = unpack_mov_operand(operand)
                    .map_err(|_| RuntimeError::InvalidMovOperand { operand })?;
                self.registers[dst as usize] = self.registers[src as usize];
            }

            Opcode::CMP => self.latch_compare(),

            Opcode::JE => self.branch(CompareFlags::EQ, flags, operand)?,
            Opcode::JNE => self.branch(CompareFlags::NE, flags, operand)?,
            Opcode::JG => self.branch(CompareFlags::GT, flags, operand)?,
            Opcode::JL => self.branch(CompareFlags::LT, flags, operand)?,
            Opcode::JGE => self.branch(CompareFlags::GE, flags, operand)?,
            Opcode::JLE => self.branch(CompareFlags::LE, flags, operand)?,

            Opcode::NEG => self.alu_wrapping(u8::wrapping_sub),

            Opcode::CALL => self.call(flags, operand)?,

            Opcode::RET => self.ret(flags, operand)?,

            Opcode::PUSH => self.stack_push(operand)?,

            Opcode::POP => self.stack_pop(operand)?,

            Opcode::SAVE => self.save(),

            Opcode::OFF => {
                self.registers[REG_O] = self.resolve_read(flags, operand)?;
            }

            Opcode::MUL => self.alu_wrapping(u8::wrapping_mul),

            Opcode::DIV => self.alu_div()?,

            Opcode::PRC => self.print_char(flags, operand)?,

            Opcode::DUP => self.dup(operand)?,
        }

        Ok(ExecuteState::Proceed)
    }
}

#[cfg(test)]
mod tests {
    use crate::state::Output;
    use crate::Interpreter;

    use hatch_asm::{AddressFlags, Instruction, Opcode};

    fn assemble(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().copied().collect()
    }

    #[test]
    fn bare_halt_program_produces_no_output() {
        let image = assemble(&[Instruction::new(Opcode::HLT, 0)]);
        let output = Interpreter::run_image(&image).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn add_wraps_and_prints_through_b() {
        let image = assemble(&[
            Instruction::new(Opcode::LDA, 200),
            Instruction::new(Opcode::LDB, 100),
            Instruction::new(Opcode::ADD, 0),
            // Move the sum where PRB can see it.
            Instruction::new(Opcode::MOV, hatch_asm::mov_operand(
                hatch_asm::RegisterId::B,
                hatch_asm::RegisterId::A,
            )),
            Instruction::new(Opcode::PRB, 0),
            Instruction::new(Opcode::HLT, 0),
        ]);

        let output = Interpreter::run_image(&image).unwrap();
        assert_eq!(vec![Output::Int(44)], output);
    }

    #[test]
    fn stack_cells_round_trip_through_push_sta_lda() {
        let image = assemble(&[
            Instruction::new(Opcode::PUSH, 1),
            Instruction::new(Opcode::LDA, 77),
            Instruction::with_flags(Opcode::STA, AddressFlags::STACK, 1),
            Instruction::new(Opcode::LDA, 0),
            Instruction::with_flags(Opcode::LDA, AddressFlags::STACK, 1),
            Instruction::with_flags(Opcode::PRX, AddressFlags::STACK, 1),
            Instruction::new(Opcode::FREE, 1),
            Instruction::new(Opcode::HLT, 0),
        ]);

        let mut vm = Interpreter::new();
        vm.load(&image).unwrap();
        vm.run().unwrap();

        assert_eq!(&[Output::Int(77)], vm.output());
        assert!(vm.data_stack().is_empty());
        assert!(vm.runtime_region_is_clear());
    }

    #[test]
    fn dup_copies_a_length_prefixed_aggregate() {
        // Build [2, 9, 8] on the stack by hand, then duplicate it.
        let image = assemble(&[
            Instruction::new(Opcode::PUSH, 3),
            Instruction::new(Opcode::LDA, 2),
            Instruction::with_flags(Opcode::STA, AddressFlags::STACK, 1),
            Instruction::new(Opcode::OFF, 1),
            Instruction::new(Opcode::LDA, 9),
            Instruction::with_flags(Opcode::STA, AddressFlags::STACK, 1),
            Instruction::new(Opcode::OFF, 2),
            Instruction::new(Opcode::LDA, 8),
            Instruction::with_flags(Opcode::STA, AddressFlags::STACK, 1),
            Instruction::new(Opcode::OFF, 0),
            Instruction::new(Opcode::DUP, 1),
            Instruction::new(Opcode::OFF, 2),
            Instruction::with_flags(Opcode::PRX, AddressFlags::STACK, 1),
            Instruction::new(Opcode::OFF, 0),
            Instruction::new(Opcode::HLT, 0),
        ]);

        let mut vm = Interpreter::new();
        vm.load(&image).unwrap();
        vm.run().unwrap();

        assert_eq!(&[Output::Int(8)], vm.output());
        assert_eq!(2, vm.data_stack().len());
        let copy = vm.data_stack()[1];
        assert_eq!(2, vm.memory()[copy as usize]);
        assert_eq!(9, vm.memory()[copy as usize + 1]);
    }

    #[test]
    fn undefined_reserved_bit_faults() {
        let image = vec![0b0010_0001, 0, 0b0000_0110, 0];
        assert!(Interpreter::run_image(&image).is_err());
    }
}
