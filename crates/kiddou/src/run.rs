//! The main Kiddou pipeline: scan, parse, check, interpret.

use crate::check::Checker;
use crate::error::{ErrorHandler, KiddouError};
use crate::interp::Interpreter;
use crate::io::PrintWriter;
use crate::parse::Parser;
use crate::scan::Scanner;

/// The main Kiddou program, which reads and executes code.
///
/// Interpreter state persists across [`Kiddou::run`] calls: a binding made
/// by one call is visible to the next. The REPL relies on this; file mode
/// simply runs once.
///
/// ```
/// use kiddou::{CollectStringPrint, Kiddou};
///
/// let mut kiddou = Kiddou::new();
/// let mut output = CollectStringPrint::new();
/// kiddou.run("run print(1 + 2)", &mut output);
/// assert_eq!(output.output(), "3\n");
/// ```
#[derive(Default)]
pub struct Kiddou {
    handler: ErrorHandler,
    interpreter: Interpreter,
}

impl Kiddou {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs some source text.
    ///
    /// Each phase gates the next: scan errors stop before parsing, parse
    /// errors before checking, check errors before evaluation. Static
    /// errors accumulate in the handler until [`Kiddou::flush_errors`];
    /// a runtime error is reported immediately and aborts the program.
    pub fn run(&mut self, source: &str, writer: &mut impl PrintWriter) {
        let tokens = Scanner::new(source).scan_tokens(&mut self.handler);
        if self.handler.has_error() {
            return;
        }

        let stmts = Parser::new(tokens, &mut self.handler).parse();
        if self.handler.has_error() {
            return;
        }

        Checker::new(&mut self.handler).check(&stmts, self.interpreter.globals());
        if self.handler.has_error() {
            return;
        }

        if let Err(error) = self.interpreter.interpret(&stmts, writer) {
            self.handler.runtime_error(&error);
        }
    }

    /// Returns true iff static errors are waiting to be flushed.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.handler.has_error()
    }

    /// Returns true iff a runtime error occurred since the last flush.
    #[must_use]
    pub fn had_runtime_error(&self) -> bool {
        self.handler.had_runtime_error()
    }

    /// The accumulated static errors, in report order.
    #[must_use]
    pub fn errors(&self) -> &[KiddouError] {
        self.handler.errors()
    }

    /// Prints accumulated errors to stderr and resets both error flags.
    pub fn flush_errors(&mut self) {
        self.handler.flush();
    }
}
