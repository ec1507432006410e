//! Line-oriented diagnostics and terminal pipeline errors.

use crate::token::Span;

use core::fmt;

use thiserror::Error;

/// A single source-anchored diagnostic.
///
/// Rendered as the offending line, a caret under the offending column, and
/// the message:
///
/// ```text
/// main.hatch:3:  let int x = ;
///               ^
/// Expected expression
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Location the diagnostic is anchored at.
    pub span: Span,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}:{}:  {}",
            self.span.file, self.span.line, self.span.line_text
        )?;
        writeln!(f, "{}^", " ".repeat(self.span.column as usize))?;
        writeln!(f, "{}", self.message)
    }
}

/// Collects diagnostics across parsing and checking; the pipeline aborts
/// after a pass if any were recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn report(&mut self, span: Span, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            span,
            message: message.into(),
        });
    }

    /// Whether anything was recorded.
    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    /// The recorded diagnostics.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Terminal compilation failures.
#[derive(Debug, Error)]
pub enum CompileError {
    /// One or more diagnostics were reported; the rendered text carries
    /// them all.
    #[error("compilation failed:\n{0}")]
    Reported(String),

    /// The linked image does not fit the program region.
    #[error("image too large: {size} bytes exceeds the {limit}-byte program region")]
    ImageTooLarge {
        /// Linked image size.
        size: usize,
        /// The program region ceiling.
        limit: usize,
    },

    /// A linked operand fell outside the byte range.
    #[error("operand out of range 0..=255: {value}")]
    OperandOutOfRange {
        /// The resolved value.
        value: i64,
    },

    /// A call or function-value placeholder had no emitted body to bind
    /// to.
    #[error("unresolved function reference `{name}`")]
    UnresolvedFunction {
        /// Mangled name of the missing function.
        name: String,
    },

    /// No `main` function was declared in the main file.
    #[error("no main function found")]
    NoMainFunction,

    /// An `import` did not resolve to a file on the library path.
    #[error("could not find module `{module}`")]
    ModuleNotFound {
        /// Dotted module path as written.
        module: String,
    },

    /// The emitter met a node shape the checker should have rejected.
    #[error("internal emitter error: {0}")]
    Internal(String),
}

impl From<&Diagnostics> for CompileError {
    fn from(diags: &Diagnostics) -> Self {
        Self::Reported(diags.to_string())
    }
}
