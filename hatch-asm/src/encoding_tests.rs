use crate::{
    mov_operand, unpack_mov_operand, AddressFlags, Instruction, Opcode, RegisterId,
};

use rstest::rstest;
use strum::IntoEnumIterator;

#[test]
fn opcode_discriminants_survive_low_bit_decode() {
    for op in Opcode::iter() {
        assert_eq!(op, Opcode::from_low_bits(op as u8));
    }
}

#[test]
fn opcode_decode_ignores_flag_bits() {
    let lead = Opcode::STA as u8 | AddressFlags::STACK.bits();
    assert_eq!(Opcode::STA, Opcode::from_low_bits(lead));
}

#[rstest]
#[case(AddressFlags::empty(), "LDA 7")]
#[case(AddressFlags::STACK, "LDA $7")]
#[case(AddressFlags::MEM, "LDA [7]")]
fn listing_syntax_reflects_flags(#[case] flags: AddressFlags, #[case] rendered: &str) {
    let inst = Instruction::with_flags(Opcode::LDA, flags, 7);
    assert_eq!(rendered, inst.to_string());

    let [lead, operand] = inst.to_bytes();
    assert_eq!(inst, Instruction::from_bytes(lead, operand).unwrap());
}

#[test]
fn reserved_bit_does_not_decode() {
    let lead = Opcode::LDA as u8 | 0b0010_0000;
    assert!(Instruction::from_bytes(lead, 0).is_err());
}

#[test]
fn mov_operand_round_trip() {
    let operand = mov_operand(RegisterId::O, RegisterId::A);
    assert_eq!(0x50, operand);
    assert_eq!(
        (RegisterId::O, RegisterId::A),
        unpack_mov_operand(operand).unwrap()
    );
}

#[test]
fn register_mirror_addresses_fill_the_top_cells() {
    for reg in RegisterId::iter() {
        let address = reg.mirror_address();
        assert!(address >= 250);
        assert_eq!(Some(reg), RegisterId::from_mirror_address(address));
    }
    assert_eq!(None, RegisterId::from_mirror_address(249));
}
