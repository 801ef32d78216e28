//! Runtime values: a closed tagged sum.
//!
//! Capability sets are carried by construction rather than inheritance:
//! blocks and modules are the Objects (attribute access), lists are the
//! Containers (index access), and builtins and blocks are the Callables.
//! Values are cheaply cloneable; compound values share state through `Rc`,
//! so mutating a list through one alias is visible through every alias.

use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use num_bigint::BigInt;

use crate::ast::BlockBody;
use crate::env::EnvRef;
use crate::error::{RunError, RunResult};
use crate::pervasives::Builtin;

/// A value in the Kiddou language.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    /// Absence of a value; propagates through most operators.
    Undef,
    Bool(bool),
    /// Arbitrary-precision integer.
    Int(BigInt),
    Float(f64),
    Str(Rc<str>),
    /// An ordered list of values, mutable in place through any alias.
    List(Rc<RefCell<Vec<Value>>>),
    /// A built-in function installed by the pervasives.
    Builtin(Builtin),
    /// A user-defined block: a function that is also an object.
    Block(Rc<BlockValue>),
    /// A module wrapping an environment; the top-level program is `this`.
    Module(Rc<ModuleValue>),
}

/// A block value: the deferred body, the environment captured at
/// construction, and the environment left by the most recent completed
/// invocation (the attribute store).
#[derive(Debug)]
pub(crate) struct BlockValue {
    pub body: Rc<BlockBody>,
    pub captured: EnvRef,
    pub invoked: RefCell<Option<EnvRef>>,
}

impl BlockValue {
    pub fn new(body: Rc<BlockBody>, captured: EnvRef) -> Self {
        Self {
            body,
            captured,
            invoked: RefCell::new(None),
        }
    }

    /// Reads an attribute from the most recent invocation's bindings.
    pub fn get_attr(&self, name: &str) -> RunResult<Value> {
        self.invoked
            .borrow()
            .as_ref()
            .and_then(|env| env.get_local(name))
            .ok_or_else(|| undefined_attribute(name))
    }

    /// Overwrites an existing attribute; creation is forbidden.
    pub fn set_attr(&self, name: &str, val: Value) -> RunResult<()> {
        match self.invoked.borrow().as_ref() {
            Some(env) => env.overwrite_local(name, val).map_err(|e| name_to_attribute(e, name)),
            None => Err(undefined_attribute(name)),
        }
    }
}

/// A module inside a Kiddou program, usually representing an input file.
#[derive(Debug)]
pub(crate) struct ModuleValue {
    pub env: EnvRef,
    pub name: Option<Rc<str>>,
}

impl ModuleValue {
    pub fn get_attr(&self, name: &str) -> RunResult<Value> {
        self.env.get_local(name).ok_or_else(|| undefined_attribute(name))
    }

    pub fn set_attr(&self, name: &str, val: Value) -> RunResult<()> {
        self.env.overwrite_local(name, val).map_err(|e| name_to_attribute(e, name))
    }
}

fn undefined_attribute(name: &str) -> RunError {
    RunError::attribute(format!("undefined attribute: {name}"))
}

/// Attribute stores report unknown names as attribute errors, not name
/// errors; immutability errors pass through unchanged.
fn name_to_attribute(err: RunError, name: &str) -> RunError {
    if err.kind == crate::error::ExcKind::Name {
        undefined_attribute(name)
    } else {
        err
    }
}

impl Value {
    /// The value's type tag, as used in error reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undef => "Undef",
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Str(_) => "String",
            Self::List(_) => "List",
            Self::Builtin(_) => "Func",
            Self::Block(_) => "Block",
            Self::Module(_) => "Module",
        }
    }

    /// The canonical textual form, as used by `print`.
    pub fn stringify(&self) -> String {
        match self {
            Self::Undef => "undef".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => float_repr(*f),
            Self::Str(s) => s.to_string(),
            Self::List(items) => {
                let mut out = String::from("[");
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&item.stringify());
                }
                out.push(']');
                out
            }
            Self::Builtin(builtin) => format!("{{Func: {}}}", builtin.name()),
            Self::Block(_) => "{Block}".to_owned(),
            Self::Module(module) => match &module.name {
                Some(name) => format!("{{Module: {name}}}"),
                None => "{Module}".to_owned(),
            },
        }
    }

    /// Falsey is Undef or Bool(false); everything else is truthy,
    /// including 0 and the empty string.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Self::Undef | Self::Bool(false))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsey()
    }

    /// Equality by underlying value; `None` when either side is Undef
    /// (Undef propagates through `==` and `!=`).
    ///
    /// Primitives of different kinds compare unequal; compound values
    /// compare by identity.
    pub fn eq_value(&self, other: &Self) -> Option<bool> {
        match (self, other) {
            (Self::Undef, _) | (_, Self::Undef) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a == b),
            (Self::Int(a), Self::Int(b)) => Some(a == b),
            (Self::Float(a), Self::Float(b)) => Some(a == b),
            (Self::Str(a), Self::Str(b)) => Some(a == b),
            (Self::List(a), Self::List(b)) => Some(Rc::ptr_eq(a, b)),
            (Self::Builtin(a), Self::Builtin(b)) => Some(a == b),
            (Self::Block(a), Self::Block(b)) => Some(Rc::ptr_eq(a, b)),
            (Self::Module(a), Self::Module(b)) => Some(Rc::ptr_eq(a, b)),
            _ => Some(false),
        }
    }
}

/// Reads a list element; reads are forgiving, out-of-range yields Undef.
///
/// Negative indices are out of range.
pub(crate) fn list_get(items: &RefCell<Vec<Value>>, index: &Value) -> RunResult<Value> {
    let idx = require_int_index(index)?;
    let items = items.borrow();
    match usize::try_from(idx) {
        Ok(i) if i < items.len() => Ok(items[i].clone()),
        _ => Ok(Value::Undef),
    }
}

/// Writes a list element in place; writes are strict, out-of-range is an
/// error.
pub(crate) fn list_set(items: &RefCell<Vec<Value>>, index: &Value, val: Value) -> RunResult<()> {
    let idx = require_int_index(index)?;
    let mut items = items.borrow_mut();
    let len = items.len();
    match usize::try_from(idx) {
        Ok(i) if i < len => {
            items[i] = val;
            Ok(())
        }
        _ => {
            // negative indices report their one's complement, mirroring the
            // report produced for them historically
            let shown = if idx < 0 { -idx - 1 } else { idx };
            Err(RunError::index_out_of_bounds(format!("{shown}>={len}")))
        }
    }
}

fn require_int_index(index: &Value) -> RunResult<i64> {
    match index {
        Value::Int(i) => Ok(num_traits::ToPrimitive::to_i64(i).unwrap_or(-1)),
        other => Err(RunError::type_error(format!(
            "List index should be Int, was {}",
            other.type_name()
        ))),
    }
}

/// Returns a string representation of a float.
///
/// Uses the `ryu` crate, which produces the shortest decimal representation
/// that round-trips through `f64` parsing. Key behaviors:
/// - Special values: `inf`, `-inf`, `nan` (lowercase)
/// - Always includes a decimal point or exponent notation
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() {
            "-inf".to_owned()
        } else {
            "inf".to_owned()
        };
    }

    let mut buffer = ryu::Buffer::new();
    let s = buffer.format(f);

    // ryu emits "1e20"; normalize positive exponents to "1e+20"
    if let Some(e_pos) = s.find('e') {
        let (mantissa, exp_part) = s.split_at(e_pos);
        let exp = &exp_part[1..];
        if exp.starts_with('-') {
            return s.to_owned();
        }
        let mut out = String::with_capacity(s.len() + 1);
        let _ = write!(out, "{mantissa}e+{exp}");
        return out;
    }
    s.to_owned()
}
