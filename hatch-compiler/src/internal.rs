//! The internal-builtin registry: a static table built once, consulted by
//! the checker for signatures and by the emitter for lowering.

use hatch_asm::Opcode;

/// One internal builtin. Every builtin takes a single scalar argument and
/// returns `void`; lowering is a single print opcode over the argument.
#[derive(Debug, Clone, Copy)]
pub struct InternalFunction {
    /// The reserved name, e.g. `__internal_print`.
    pub name: &'static str,
    /// Declared parameter type name.
    pub param_type: &'static str,
    /// The opcode the call lowers to.
    pub opcode: Opcode,
}

/// The full registry.
pub const INTERNAL_FUNCTIONS: &[InternalFunction] = &[
    InternalFunction {
        name: "__internal_print",
        param_type: "int",
        opcode: Opcode::PRX,
    },
    InternalFunction {
        name: "__internal_print_char",
        param_type: "char",
        opcode: Opcode::PRC,
    },
];

/// Looks a builtin up by its reserved name.
pub fn internal_function(name: &str) -> Option<&'static InternalFunction> {
    INTERNAL_FUNCTIONS.iter().find(|f| f.name == name)
}
