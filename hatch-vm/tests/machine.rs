//! Machine-level properties over hand-assembled programs.

use hatch_asm::{mov_operand, Instruction, Opcode, RegisterId};
use hatch_vm::{Interpreter, Output};

use quickcheck_macros::quickcheck;

fn assemble(instructions: &[Instruction]) -> Vec<u8> {
    instructions.iter().copied().collect()
}

/// `LDA a; LDB b; <op>; MOV B<-A; PRB; HLT`
fn binary_op_program(op: Opcode, a: u8, b: u8) -> Vec<u8> {
    assemble(&[
        Instruction::new(Opcode::LDA, a),
        Instruction::new(Opcode::LDB, b),
        Instruction::new(op, 0),
        Instruction::new(
            Opcode::MOV,
            mov_operand(RegisterId::B, RegisterId::A),
        ),
        Instruction::new(Opcode::PRB, 0),
        Instruction::new(Opcode::HLT, 0),
    ])
}

#[quickcheck]
fn add_wraps_modulo_256(a: u8, b: u8) -> bool {
    let output = Interpreter::run_image(&binary_op_program(Opcode::ADD, a, b)).unwrap();
    output == vec![Output::Int(a.wrapping_add(b))]
}

#[quickcheck]
fn neg_wraps_modulo_256(a: u8, b: u8) -> bool {
    let output = Interpreter::run_image(&binary_op_program(Opcode::NEG, a, b)).unwrap();
    output == vec![Output::Int(a.wrapping_sub(b))]
}

#[quickcheck]
fn mul_wraps_modulo_256(a: u8, b: u8) -> bool {
    let output = Interpreter::run_image(&binary_op_program(Opcode::MUL, a, b)).unwrap();
    output == vec![Output::Int(a.wrapping_mul(b))]
}

#[quickcheck]
fn div_truncates(a: u8, b: u8) -> bool {
    let result = Interpreter::run_image(&binary_op_program(Opcode::DIV, a, b));
    match b {
        0 => result.is_err(),
        _ => result.unwrap() == vec![Output::Int(a / b)],
    }
}

#[quickcheck]
fn push_then_free_restores_the_memory_map(cells: u8) -> bool {
    let cells = cells % 50 + 1;

    let mut program: Vec<Instruction> = (0..cells)
        .map(|_| Instruction::new(Opcode::PUSH, 1))
        .collect();
    program.push(Instruction::new(Opcode::FREE, cells));
    program.push(Instruction::new(Opcode::HLT, 0));

    let mut vm = Interpreter::new();
    vm.load(&assemble(&program)).unwrap();
    vm.run().unwrap();

    vm.data_stack().is_empty() && vm.runtime_region_is_clear()
}

#[quickcheck]
fn comparisons_latch_all_six_flags(a: u8, b: u8) -> bool {
    // Conditionally jump over a PRX for each flag; the printed mask must
    // match the arithmetic relation.
    let mut program = vec![
        Instruction::new(Opcode::LDA, a),
        Instruction::new(Opcode::LDB, b),
        Instruction::new(Opcode::CMP, 0),
    ];
    let jumps = [
        Opcode::JE,
        Opcode::JNE,
        Opcode::JG,
        Opcode::JL,
        Opcode::JGE,
        Opcode::JLE,
    ];
    for (index, jump) in jumps.iter().enumerate() {
        let base = (program.len() as u8 + 2) * 2;
        program.push(Instruction::new(*jump, base));
        program.push(Instruction::new(Opcode::PRX, index as u8));
    }
    program.push(Instruction::new(Opcode::HLT, 0));

    let output = Interpreter::run_image(&assemble(&program)).unwrap();

    // A taken jump skips the marker, so the log holds the *unsatisfied*
    // relations.
    let expected: Vec<Output> = [
        a != b,
        a == b,
        a <= b,
        a >= b,
        a < b,
        a > b,
    ]
    .iter()
    .enumerate()
    .filter(|(_, &unsatisfied)| unsatisfied)
    .map(|(index, _)| Output::Int(index as u8))
    .collect();

    output == expected
}
