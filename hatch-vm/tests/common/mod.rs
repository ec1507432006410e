#![allow(dead_code)]

use std::path::PathBuf;

use hatch_compiler::{compile, CompiledProgram, FsLoader};
use hatch_vm::{Interpreter, Output};

/// Compiles a source string against the repository's `lib/` modules.
pub fn build(source: &str) -> CompiledProgram {
    let lib = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../lib");
    let loader = FsLoader::with_roots(vec![lib]);
    compile(source, "main.hatch", &loader).expect("compilation should succeed")
}

/// Compiles and runs a source string, returning the output log.
pub fn run(source: &str) -> Vec<Output> {
    let program = build(source);
    Interpreter::run_image(&program.image).expect("execution should succeed")
}

/// Compiles and runs, returning the halted machine for state assertions.
pub fn run_machine(source: &str) -> Interpreter {
    let program = build(source);
    let mut vm = Interpreter::new();
    vm.load(&program.image).expect("image should fit");
    vm.run().expect("execution should succeed");
    vm
}

pub fn ints(values: &[u8]) -> Vec<Output> {
    values.iter().copied().map(Output::Int).collect()
}

pub fn chars(text: &str) -> Vec<Output> {
    text.bytes().map(Output::Char).collect()
}
