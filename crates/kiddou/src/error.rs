//! Error reporting for every phase of the pipeline.
//!
//! Static errors (scanner, parser, checker) accumulate in the [`ErrorHandler`]
//! and are flushed in a batch; runtime errors are reported immediately and set
//! a separate flag. The two-tier split is what lets the CLI map outcomes to
//! exit codes (65 for compile-time errors, 75 for runtime errors).

use std::fmt;

use strum::{Display, IntoStaticStr};

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Runtime error kinds raised while evaluating a Kiddou program.
///
/// The string representation is the exception name used in reports
/// (e.g. `Division` -> "DivisionException").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum ExcKind {
    /// An operation was applied to values of the wrong type.
    #[strum(serialize = "TypeException")]
    Type,
    /// Integer division or modulus by zero, or floor division of a
    /// non-finite value.
    #[strum(serialize = "DivisionException")]
    Division,
    /// A variable was read or written that is not defined.
    #[strum(serialize = "NameException")]
    Name,
    /// An immutable binding was reassigned.
    #[strum(serialize = "ImmutableException")]
    Immutable,
    /// An undefined attribute was read or written.
    #[strum(serialize = "AttributeException")]
    Attribute,
    /// A list element outside the valid range was written.
    #[strum(serialize = "IndexOutOfBoundsException")]
    IndexOutOfBounds,
}

/// A runtime error in flight.
///
/// Raised deep inside evaluation without location information; the
/// interpreter attaches the innermost expression's line on the way out via
/// [`RunError::with_line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunError {
    pub kind: ExcKind,
    pub message: String,
    pub line: Option<u32>,
}

impl RunError {
    pub fn new(kind: ExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Type, message)
    }

    pub fn division(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Division, message)
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Name, message)
    }

    pub fn immutable(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Immutable, message)
    }

    pub fn attribute(message: impl Into<String>) -> Self {
        Self::new(ExcKind::Attribute, message)
    }

    pub fn index_out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ExcKind::IndexOutOfBounds, message)
    }

    /// Attaches a source line if none has been attached yet.
    ///
    /// Errors keep the line of the innermost expression that raised them,
    /// so only the first caller wins.
    pub fn with_line(mut self, line: u32) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    /// Converts into a reportable [`KiddouError`], prefixing the message
    /// with the exception name.
    pub fn into_kiddou_error(self) -> KiddouError {
        KiddouError {
            message: format!("{}: {}", self.kind, self.message),
            line: self.line.unwrap_or(0),
            col: None,
            text: None,
        }
    }
}

/// A Kiddou error, static or runtime, ready to be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KiddouError {
    pub message: String,
    pub line: u32,
    pub col: Option<u32>,
    pub text: Option<String>,
}

impl KiddouError {
    pub(crate) fn new(message: impl Into<String>, line: u32, col: Option<u32>) -> Self {
        Self {
            message: message.into(),
            line,
            col,
            text: None,
        }
    }
}

impl fmt::Display for KiddouError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: \"{}\" on line {}", self.message, self.line)?;
        if let Some(col) = self.col {
            write!(f, ", column {col}")?;
        }
        if let Some(text) = &self.text {
            write!(f, " at {text}")?;
        }
        Ok(())
    }
}

/// A handler for Kiddou errors.
///
/// Static errors accumulate until [`ErrorHandler::flush`] prints them to
/// stderr; runtime errors are printed as they happen.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    errors: Vec<KiddouError>,
    had_runtime_error: bool,
}

impl ErrorHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff this handler has static errors to report.
    #[must_use]
    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns true iff a runtime error was reported since the last flush.
    #[must_use]
    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// The static errors accumulated so far, in report order.
    #[must_use]
    pub fn errors(&self) -> &[KiddouError] {
        &self.errors
    }

    /// Reports a static error to the handler.
    pub fn error(&mut self, error: KiddouError) {
        self.errors.push(error);
    }

    /// Reports a runtime error: printed immediately, aborts evaluation.
    pub fn runtime_error(&mut self, error: &KiddouError) {
        print_error(error);
        self.had_runtime_error = true;
    }

    /// Prints out all accumulated errors and resets the handler.
    pub fn flush(&mut self) {
        for error in &self.errors {
            print_error(error);
        }
        self.errors.clear();
        self.had_runtime_error = false;
    }
}

/// Prints one error to stderr in the canonical report format.
fn print_error(error: &KiddouError) {
    eprintln!("{error}");
}
