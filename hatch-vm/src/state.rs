//! Execution state and observable output of the machine.

use core::fmt;

use itertools::Itertools;

bitflags::bitflags! {
    /// Condition flags latched by `CMP` and consumed by the conditional
    /// jumps. All six are recomputed on every comparison.
    pub struct CompareFlags: u8 {
        /// `A == B`
        const EQ = 0b0000_0001;
        /// `A != B`
        const NE = 0b0000_0010;
        /// `A > B`
        const GT = 0b0000_0100;
        /// `A < B`
        const LT = 0b0000_1000;
        /// `A >= B`
        const GE = 0b0001_0000;
        /// `A <= B`
        const LE = 0b0010_0000;
    }
}

impl CompareFlags {
    /// The full flag set for a pair of register values.
    pub fn from_pair(a: u8, b: u8) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::EQ, a == b);
        flags.set(Self::NE, a != b);
        flags.set(Self::GT, a > b);
        flags.set(Self::LT, a < b);
        flags.set(Self::GE, a >= b);
        flags.set(Self::LE, a <= b);
        flags
    }
}

/// Resulting state of a single instruction execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecuteState {
    /// The machine should proceed with the next fetch.
    #[default]
    Proceed,
    /// A `HLT` instruction was reached.
    Halt,
}

impl ExecuteState {
    /// Whether execution should continue.
    pub const fn should_continue(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}

/// One entry of the output log.
///
/// `PRX` and `PRB` append integers, `PRC` appends characters. The ordered
/// log is the program's observable behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    /// An integer emitted by `PRX` or `PRB`.
    Int(u8),
    /// A character byte emitted by `PRC`.
    Char(u8),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Char(byte) => write!(f, "{}", *byte as char),
        }
    }
}

/// Renders an output log the way the CLI prints it: integers separated by
/// newlines, character runs verbatim.
pub fn output_text(log: &[Output]) -> String {
    log.iter()
        .map(|entry| match entry {
            Output::Int(value) => format!("{value}\n"),
            Output::Char(byte) => (*byte as char).to_string(),
        })
        .join("")
}
