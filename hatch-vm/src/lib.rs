//! Interpreter for the Hatch virtual machine.
//!
//! The machine executes a flat two-byte-per-instruction image inside a
//! single 256-byte address space shared by the program, the runtime data
//! region, and the memory-mirrored register file. Program output is an
//! ordered log of integers and characters collected from the print
//! opcodes; tests and the CLI compare or render that log.

#![warn(missing_docs)]

pub mod consts;
mod error;
mod interpreter;
mod state;

pub use error::RuntimeError;
pub use interpreter::Interpreter;
pub use state::{output_text, CompareFlags, ExecuteState, Output};
