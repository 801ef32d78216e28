//! Built-in bindings present in the root environment before any user code
//! runs.

use std::rc::Rc;

use crate::env::Environment;
use crate::error::RunResult;
use crate::io::PrintWriter;
use crate::value::Value;

/// A built-in function.
///
/// Builtins are dispatched by tag rather than boxed closures so the value
/// type stays `Clone` and comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Print,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Self::Print => "print",
        }
    }

    /// Invokes the builtin with already-evaluated arguments.
    pub fn call(self, args: &[Value], writer: &mut impl PrintWriter) -> RunResult<Value> {
        match self {
            Self::Print => {
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        writer.stdout_push(' ');
                    }
                    writer.stdout_write(&arg.stringify());
                }
                writer.stdout_push('\n');
                Ok(Value::Undef)
            }
        }
    }
}

/// Installs the pervasive bindings into the root environment's captured
/// scope, where lookups find them but attribute access does not.
pub(crate) fn install(globals: &Environment) {
    globals.bind_captured(Rc::from("inf"), Value::Float(f64::INFINITY), false);
    globals.bind_captured(Rc::from("nan"), Value::Float(f64::NAN), false);
    globals.bind_captured(Rc::from("print"), Value::Builtin(Builtin::Print), false);
}
