//! Compiler for the Hatch language: lexer, recursive-descent parser with
//! import loading, constant folding, type checking with namespace groups
//! and reachability analysis, and a bytecode emitter targeting the
//! 256-byte Hatch virtual machine.
//!
//! The pipeline is a pure function from source text to a linked program
//! image; diagnostics accumulate across a pass and abort the pipeline at
//! the pass boundary.

#![warn(missing_docs)]

mod ast;
mod check;
mod diag;
mod emit;
mod internal;
mod lexer;
mod loader;
mod parser;
mod token;
mod types;

pub use ast::{
    dump_module, BinaryOp, Expr, ExprKind, FunctionDecl, LetDecl, LiteralKind, Module, Param,
    Stmt, StmtKind, StructDecl,
};
pub use diag::{CompileError, Diagnostic, Diagnostics};
pub use emit::CompiledProgram;
pub use loader::{FsLoader, MemoryLoader, ModuleLoader};
pub use token::Span;

use tracing::debug;

/// Parses a source file (following its imports through `loader`) without
/// checking or emitting. Used for `--debug` AST dumps.
pub fn parse_program(
    source: &str,
    filename: &str,
    loader: &dyn ModuleLoader,
) -> Result<Module, CompileError> {
    let mut diags = Diagnostics::new();
    let module = parser::parse_source(source, filename, true, loader, &mut diags);
    if diags.has_errors() {
        return Err((&diags).into());
    }
    Ok(module)
}

/// Compiles a source file to a linked program image.
pub fn compile(
    source: &str,
    filename: &str,
    loader: &dyn ModuleLoader,
) -> Result<CompiledProgram, CompileError> {
    let mut diags = Diagnostics::new();
    let mut module = parser::parse_source(source, filename, true, loader, &mut diags);
    if diags.has_errors() {
        return Err((&diags).into());
    }
    debug!(file = filename, "parsed");

    ast::fold_module(&mut module);

    let reachable = check::check_module(&mut module, &mut diags)?;
    debug!(reachable = reachable.len(), "checked");

    emit::emit_module(&module, &reachable)
}

#[cfg(test)]
mod tests {
    use super::*;

    use hatch_asm::{AddressFlags, Opcode};

    fn io_loader() -> MemoryLoader {
        let mut loader = MemoryLoader::new();
        loader.insert(
            "io",
            "function void print(int n) { __internal_print(n); }\n\
             function void print(char c) { __internal_print_char(c); }",
        );
        loader
    }

    fn build(source: &str) -> CompiledProgram {
        compile(source, "main.hatch", &io_loader()).expect("compilation should succeed")
    }

    fn contains_pair(image: &[u8], lead: u8, operand: u8) -> bool {
        image
            .chunks_exact(2)
            .any(|pair| pair == [lead, operand])
    }

    #[test]
    fn empty_main_is_a_bare_halt() {
        let program = build("function void main() {}");
        assert_eq!(vec![Opcode::HLT as u8, 0], program.image);
        assert_eq!(2, program.data_start);
    }

    #[test]
    fn compilation_is_deterministic() {
        let source = "import io;\n\
                      function int double(int n) { return n + n; }\n\
                      function void main() {\n\
                          let int[4] a = [1, 2, 3, 4];\n\
                          io.print(double(a[2]));\n\
                      }";
        let first = build(source);
        let second = build(source);
        assert_eq!(first.image, second.image);
        assert_eq!(first.function_addresses, second.function_addresses);
    }

    #[test]
    fn three_literal_elements_construct_inline() {
        let program = build("function void main() { let int[3] a = [1, 2, 3]; }");
        assert_eq!(program.data_start, program.image.len());
    }

    #[test]
    fn four_literal_elements_copy_from_data() {
        let program = build("function void main() { let int[4] a = [1, 2, 3, 4]; }");
        assert_eq!(4, program.image.len() - program.data_start);
        assert_eq!(&[1, 2, 3, 4], &program.image[program.data_start..]);
    }

    #[test]
    fn mixed_elements_always_construct_inline() {
        let program = build(
            "function void main() {\n\
                 let int x = 9;\n\
                 let int[5] a = [1, x, 3, 4, 5];\n\
             }",
        );
        assert_eq!(program.data_start, program.image.len());
    }

    #[test]
    fn identical_literal_arrays_share_one_data_entry() {
        let program = build(
            "function void main() {\n\
                 let int[4] a = [7, 8, 9, 10];\n\
                 let int[4] b = [7, 8, 9, 10];\n\
             }",
        );
        assert_eq!(4, program.image.len() - program.data_start);
    }

    #[test]
    fn increment_assignment_peepholes_to_inc() {
        let program = build(
            "function void main() {\n\
                 let int x = 0;\n\
                 x = x + 1;\n\
                 x = x - 1;\n\
             }",
        );
        let inc = Opcode::INC as u8 | AddressFlags::STACK.bits();
        let dec = Opcode::DEC as u8 | AddressFlags::STACK.bits();
        assert!(contains_pair(&program.image, inc, 1));
        assert!(contains_pair(&program.image, dec, 1));
    }

    #[test]
    fn main_entry_is_address_zero() {
        let program = build(
            "import io;\n\
             function void main() { io.print(1); }",
        );
        assert_eq!(Some(&0), program.function_addresses.get("main"));
        // The print overload was emitted after main's HLT.
        assert!(program.function_addresses.len() > 1);
    }

    #[test]
    fn oversized_programs_fail_to_link() {
        let mut body = String::new();
        for index in 0..60 {
            body.push_str(&format!("let int x{index} = {index}; "));
        }
        let source = format!("function void main() {{ {body} }}");
        let result = compile(&source, "main.hatch", &io_loader());
        assert!(matches!(
            result,
            Err(CompileError::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn diagnostics_render_with_carets() {
        let result = compile(
            "function void main() { let int x = y; }",
            "main.hatch",
            &io_loader(),
        );
        let Err(CompileError::Reported(rendered)) = result else {
            panic!("expected reported diagnostics");
        };
        assert!(rendered.contains("main.hatch:1:"));
        assert!(rendered.contains('^'));
        assert!(rendered.contains("undefined variable 'y'"));
    }
}
