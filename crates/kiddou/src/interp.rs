//! Tree-walking evaluator.
//!
//! Holds the current environment and walks statements and expressions
//! directly. Operator dispatch is an exhaustive match on the tag; the typed
//! arithmetic rules live in free functions at the bottom of the module.
//! Undef propagates through every strict operator instead of raising.
//!
//! Block invocation swaps the current environment for a fresh frame seeded
//! from the block's captured environment and restores it on every exit path;
//! the finished frame is kept on the block value as its attribute store.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use ahash::AHashSet;
use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{FromPrimitive, Pow, Signed, ToPrimitive, Zero};

use crate::ast::{BinaryOp, BlockBody, Constant, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::env::{Environment, EnvRef};
use crate::error::{KiddouError, RunError, RunResult};
use crate::io::PrintWriter;
use crate::pervasives;
use crate::value::{self, BlockValue, ModuleValue, Value};

/// An interpreter for evaluating a program.
///
/// The globals persist for the interpreter's lifetime, which is what lets a
/// REPL accumulate bindings across lines.
pub(crate) struct Interpreter {
    globals: EnvRef,
    env: EnvRef,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter with the pervasives installed and `this`
    /// bound to the top-level module.
    pub fn new() -> Self {
        let globals: EnvRef = Rc::new(Environment::new());
        pervasives::install(&globals);
        let module = ModuleValue {
            env: globals.clone(),
            name: None,
        };
        globals.bind_captured(Rc::from("this"), Value::Module(Rc::new(module)), false);
        Self {
            env: globals.clone(),
            globals,
        }
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Executes statements in order. The first runtime error aborts and is
    /// returned with its source line attached.
    pub fn interpret(&mut self, stmts: &[Stmt], writer: &mut impl PrintWriter) -> Result<(), KiddouError> {
        for stmt in stmts {
            self.execute(stmt, writer).map_err(RunError::into_kiddou_error)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt, writer: &mut impl PrintWriter) -> RunResult<()> {
        self.execute_kind(stmt, writer).map_err(|e| e.with_line(stmt.line_start))
    }

    fn execute_kind(&mut self, stmt: &Stmt, writer: &mut impl PrintWriter) -> RunResult<()> {
        match &stmt.kind {
            StmtKind::Con { name, expr } => {
                let val = self.evaluate(expr, writer)?;
                self.env.bind(name.clone(), val, false);
                Ok(())
            }
            StmtKind::Run {
                receiver,
                expr,
                reassign,
            } => {
                let val = self.evaluate(expr, writer)?;
                match receiver {
                    None => Ok(()),
                    Some(target) => self.assign(target, val, *reassign, writer),
                }
            }
        }
    }

    fn assign(&mut self, target: &Expr, val: Value, reassign: bool, writer: &mut impl PrintWriter) -> RunResult<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                if reassign {
                    self.env.overwrite(name, val)
                } else {
                    // a new mutable binding; shadowing is permitted
                    self.env.bind(name.clone(), val, true);
                    Ok(())
                }
            }
            ExprKind::Attribute { object, name } => {
                let object_val = self.evaluate(object, writer)?;
                match &object_val {
                    Value::Module(module) => module.set_attr(name, val),
                    Value::Block(block) => block.set_attr(name, val),
                    other => Err(RunError::type_error(format!(
                        "can only assign attributes on objects, found <{}>",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Index { container, index } => {
                let container_val = self.evaluate(container, writer)?;
                let index_val = self.evaluate(index, writer)?;
                match &container_val {
                    Value::List(items) => value::list_set(items, &index_val, val),
                    other => Err(RunError::type_error(format!(
                        "can only index into containers, found <{}>",
                        other.type_name()
                    ))),
                }
            }
            // the parser only produces the three receiver forms
            _ => Err(RunError::type_error("invalid assignment target")),
        }
    }

    fn evaluate(&mut self, expr: &Expr, writer: &mut impl PrintWriter) -> RunResult<Value> {
        self.evaluate_kind(expr, writer).map_err(|e| e.with_line(expr.line))
    }

    fn evaluate_kind(&mut self, expr: &Expr, writer: &mut impl PrintWriter) -> RunResult<Value> {
        match &expr.kind {
            ExprKind::Literal(constant) => Ok(constant_value(constant)),
            ExprKind::Variable(name) => self.env.get(name),
            ExprKind::Unary { op, operand } => {
                let val = self.evaluate(operand, writer)?;
                evaluate_unary(*op, val)
            }
            ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right, writer),
            ExprKind::Call { callee, args } => {
                let callee_val = self.evaluate(callee, writer)?;
                let mut arg_vals = Vec::with_capacity(args.len());
                for arg in args {
                    arg_vals.push(self.evaluate(arg, writer)?);
                }
                match &callee_val {
                    Value::Builtin(builtin) => builtin.call(&arg_vals, writer),
                    Value::Block(block) => {
                        let block = block.clone();
                        self.call_block(&block, writer)
                    }
                    other => Err(RunError::type_error(format!(
                        "can only make calls to functions, found <{}>",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Index { container, index } => {
                let container_val = self.evaluate(container, writer)?;
                match &container_val {
                    Value::List(items) => {
                        let index_val = self.evaluate(index, writer)?;
                        value::list_get(items, &index_val)
                    }
                    other => Err(RunError::type_error(format!(
                        "can only index into containers, found <{}>",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Attribute { object, name } => {
                let object_val = self.evaluate(object, writer)?;
                match &object_val {
                    Value::Module(module) => module.get_attr(name),
                    Value::Block(block) => block.get_attr(name),
                    other => Err(RunError::type_error(format!(
                        "can only access attributes on objects, found <{}>",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Block { body, .. } => {
                let captured = Rc::new(self.env.copy_retain(&body.dependent_names.borrow()));
                Ok(Value::Block(Rc::new(BlockValue::new(body.clone(), captured))))
            }
            ExprKind::Sequence { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate(element, writer)?);
                }
                Ok(Value::List(Rc::new(RefCell::new(items))))
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        writer: &mut impl PrintWriter,
    ) -> RunResult<Value> {
        match op {
            // short-circuit: the right side is evaluated only when needed
            BinaryOp::And => {
                let left_val = self.evaluate(left, writer)?;
                if left_val.is_falsey() {
                    Ok(left_val)
                } else {
                    self.evaluate(right, writer)
                }
            }
            BinaryOp::Or => {
                let left_val = self.evaluate(left, writer)?;
                if left_val.is_truthy() {
                    Ok(left_val)
                } else {
                    self.evaluate(right, writer)
                }
            }
            // piecewise: left if defined, else right
            BinaryOp::Piece => {
                let left_val = self.evaluate(left, writer)?;
                if matches!(left_val, Value::Undef) {
                    self.evaluate(right, writer)
                } else {
                    Ok(left_val)
                }
            }
            // domain: the right side is the guard and is evaluated first
            BinaryOp::Domain => {
                let guard = self.evaluate(right, writer)?;
                if guard.is_falsey() {
                    Ok(Value::Undef)
                } else {
                    self.evaluate(left, writer)
                }
            }
            BinaryOp::Add => self.strict_binary(left, right, writer, add),
            BinaryOp::Subtract => self.strict_binary(left, right, writer, subtract),
            BinaryOp::Multiply => self.strict_binary(left, right, writer, multiply),
            BinaryOp::Divide => self.strict_binary(left, right, writer, divide),
            BinaryOp::IDivide => self.strict_binary(left, right, writer, idivide),
            BinaryOp::Modulus => self.strict_binary(left, right, writer, modulus),
            BinaryOp::Power => self.strict_binary(left, right, writer, power),
            BinaryOp::Equal => self.strict_binary(left, right, writer, equal),
            BinaryOp::NotEqual => self.strict_binary(left, right, writer, not_equal),
            BinaryOp::Less => self.strict_binary(left, right, writer, less),
            BinaryOp::LessEqual => self.strict_binary(left, right, writer, less_equal),
            BinaryOp::Greater => self.strict_binary(left, right, writer, greater),
            BinaryOp::GreaterEqual => self.strict_binary(left, right, writer, greater_equal),
        }
    }

    /// Evaluates both operands and applies `op`, except that an Undef on
    /// either side short-cuts to Undef (propagation, not an error).
    fn strict_binary(
        &mut self,
        left: &Expr,
        right: &Expr,
        writer: &mut impl PrintWriter,
        op: fn(Value, Value) -> RunResult<Value>,
    ) -> RunResult<Value> {
        let left_val = self.evaluate(left, writer)?;
        let right_val = self.evaluate(right, writer)?;
        if matches!(left_val, Value::Undef) || matches!(right_val, Value::Undef) {
            return Ok(Value::Undef);
        }
        op(left_val, right_val)
    }

    /// Invokes a block: a fresh frame is seeded from the originally captured
    /// environment with `this` bound to the block itself, the body runs, and
    /// the frame is retained as the block's attribute store whether the body
    /// completed or failed.
    fn call_block(&mut self, block: &Rc<BlockValue>, writer: &mut impl PrintWriter) -> RunResult<Value> {
        let frame: EnvRef = Rc::new(block.captured.copy_retain(&AHashSet::new()));
        frame.bind_captured(Rc::from("this"), Value::Block(block.clone()), false);

        // installed up front so `this.x` inside the body reads the bindings
        // made so far; re-entrant calls re-seed their own fresh frame
        *block.invoked.borrow_mut() = Some(frame.clone());

        let saved = std::mem::replace(&mut self.env, frame.clone());
        let result = self.run_block_body(&block.body, writer);
        self.env = saved;

        // dropping the `this` binding breaks the block -> frame -> block
        // reference cycle; it was never visible as an attribute
        frame.remove_captured("this");
        *block.invoked.borrow_mut() = Some(frame);
        result
    }

    fn run_block_body(&mut self, body: &BlockBody, writer: &mut impl PrintWriter) -> RunResult<Value> {
        for stmt in &body.stmts {
            self.execute(stmt, writer)?;
        }
        match &body.tail {
            Some(tail) => self.evaluate(tail, writer),
            None => Ok(Value::Undef),
        }
    }
}

fn constant_value(constant: &Constant) -> Value {
    match constant {
        Constant::Undef => Value::Undef,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(i.clone()),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::Str(s.clone()),
    }
}

fn evaluate_unary(op: UnaryOp, val: Value) -> RunResult<Value> {
    if matches!(val, Value::Undef) {
        return Ok(Value::Undef);
    }
    match op {
        UnaryOp::Negate => match val {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(type_exception(op.symbol(), &[&other])),
        },
        UnaryOp::Not => match val {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(type_exception(op.symbol(), &[&other])),
        },
    }
}

//// Typed arithmetic and comparison rules.

fn type_exception(operator: &str, values: &[&Value]) -> RunError {
    let type_strings: Vec<String> = values.iter().map(|v| format!("<{}>", v.type_name())).collect();
    RunError::type_error(format!(
        "'{operator}' operation not defined for types: {}",
        type_strings.join(", ")
    ))
}

/// Numeric view of a value: Int and Float only.
fn as_f64(val: &Value) -> Option<f64> {
    match val {
        Value::Int(i) => Some(i.to_f64().unwrap_or(f64::NAN)),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn add(left: Value, right: Value) -> RunResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Str(a), Value::Str(b)) => {
            let mut joined = a.to_string();
            joined.push_str(&b);
            Ok(Value::Str(Rc::from(joined)))
        }
        (left, right) => match (as_f64(&left), as_f64(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(a + b)),
            _ => Err(type_exception("+", &[&left, &right])),
        },
    }
}

fn subtract(left: Value, right: Value) -> RunResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
        (left, right) => match (as_f64(&left), as_f64(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(a - b)),
            _ => Err(type_exception("-", &[&left, &right])),
        },
    }
}

fn multiply(left: Value, right: Value) -> RunResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
        (left, right) => match (as_f64(&left), as_f64(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(a * b)),
            _ => Err(type_exception("*", &[&left, &right])),
        },
    }
}

/// `/` is always float division. Division by zero does not raise: a 0 or
/// NaN numerator gives NaN, anything else an infinity with the numerator's
/// sign.
fn divide(left: Value, right: Value) -> RunResult<Value> {
    match (as_f64(&left), as_f64(&right)) {
        (Some(a), Some(b)) => Ok(Value::Float(divide_float(a, b))),
        _ => Err(type_exception("/", &[&left, &right])),
    }
}

fn divide_float(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        if a == 0.0 || a.is_nan() {
            f64::NAN
        } else {
            f64::INFINITY.copysign(a)
        }
    } else {
        a / b
    }
}

/// `//` is floor division to Int. Division by zero raises, as does a
/// non-finite numerator (the floor has no integer value).
fn idivide(left: Value, right: Value) -> RunResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if b.is_zero() {
            return Err(RunError::division("cannot integer divide by 0"));
        }
        return Ok(Value::Int(a.div_floor(b)));
    }
    match (as_f64(&left), as_f64(&right)) {
        (Some(a), Some(b)) => {
            if b == 0.0 {
                return Err(RunError::division("cannot integer divide by 0"));
            }
            let quotient = (a / b).floor();
            BigInt::from_f64(quotient).map(Value::Int).ok_or_else(|| {
                RunError::division(format!("cannot integer divide into {}", left.stringify()))
            })
        }
        _ => Err(type_exception("//", &[&left, &right])),
    }
}

/// `%` is floored modulo: the result takes the divisor's sign. Int % 0
/// raises; float % 0 follows the `/` channel (NaN or signed infinity).
fn modulus(left: Value, right: Value) -> RunResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if b.is_zero() {
            return Err(RunError::division("cannot integer divide by 0"));
        }
        return Ok(Value::Int(a.mod_floor(b)));
    }
    match (as_f64(&left), as_f64(&right)) {
        (Some(a), Some(b)) => {
            if b == 0.0 {
                let result = if a == 0.0 || a.is_nan() {
                    f64::NAN
                } else {
                    f64::INFINITY.copysign(a)
                };
                return Ok(Value::Float(result));
            }
            let rem = a % b;
            let result = if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                rem + b
            } else {
                rem
            };
            Ok(Value::Float(result))
        }
        _ => Err(type_exception("%", &[&left, &right])),
    }
}

/// `^`: Int bases with non-negative Int exponents stay Int (and may be
/// large); everything else goes through float exponentiation, where invalid
/// combinations yield NaN rather than an error.
fn power(left: Value, right: Value) -> RunResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if !b.is_negative() {
            if let Some(exponent) = b.to_u32() {
                return Ok(Value::Int(Pow::pow(a, exponent)));
            }
        }
    }
    match (as_f64(&left), as_f64(&right)) {
        (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
        _ => Err(type_exception("^", &[&left, &right])),
    }
}

fn equal(left: Value, right: Value) -> RunResult<Value> {
    Ok(left.eq_value(&right).map_or(Value::Undef, Value::Bool))
}

fn not_equal(left: Value, right: Value) -> RunResult<Value> {
    Ok(left.eq_value(&right).map_or(Value::Undef, |eq| Value::Bool(!eq)))
}

fn compare_values(left: Value, right: Value, symbol: &str, test: fn(Ordering) -> bool) -> RunResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        return Ok(Value::Bool(test(a.cmp(b))));
    }
    match (as_f64(&left), as_f64(&right)) {
        // NaN compares false under every ordering
        (Some(a), Some(b)) => Ok(Value::Bool(a.partial_cmp(&b).is_some_and(test))),
        _ => Err(type_exception(symbol, &[&left, &right])),
    }
}

fn less(left: Value, right: Value) -> RunResult<Value> {
    compare_values(left, right, "<", Ordering::is_lt)
}

fn less_equal(left: Value, right: Value) -> RunResult<Value> {
    compare_values(left, right, "<=", Ordering::is_le)
}

fn greater(left: Value, right: Value) -> RunResult<Value> {
    compare_values(left, right, ">", Ordering::is_gt)
}

fn greater_equal(left: Value, right: Value) -> RunResult<Value> {
    compare_values(left, right, ">=", Ordering::is_ge)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ExcKind;

    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    fn float_of(result: RunResult<Value>) -> f64 {
        match result.unwrap() {
            Value::Float(f) => f,
            other => panic!("expected a float, got {other:?}"),
        }
    }

    #[test]
    fn division_by_zero_channels() {
        assert!(float_of(divide(int(0), int(0))).is_nan());
        assert!(float_of(divide(Value::Float(f64::NAN), int(0))).is_nan());
        assert_eq!(float_of(divide(int(3), int(0))), f64::INFINITY);
        assert_eq!(float_of(divide(int(-3), Value::Float(0.0))), f64::NEG_INFINITY);
    }

    #[test]
    fn floor_division_rounds_down() {
        let Value::Int(q) = idivide(int(-7), int(2)).unwrap() else {
            panic!("expected int");
        };
        assert_eq!(q, BigInt::from(-4));
        let Value::Int(q) = idivide(Value::Float(7.5), int(2)).unwrap() else {
            panic!("expected int");
        };
        assert_eq!(q, BigInt::from(3));
    }

    #[test]
    fn floor_division_error_cases() {
        assert_eq!(idivide(int(1), int(0)).unwrap_err().kind, ExcKind::Division);
        let err = idivide(Value::Float(f64::INFINITY), int(2)).unwrap_err();
        assert_eq!(err.kind, ExcKind::Division);
        assert_eq!(err.message, "cannot integer divide into inf");
    }

    #[test]
    fn modulus_takes_divisor_sign() {
        let Value::Int(m) = modulus(int(-7), int(3)).unwrap() else {
            panic!("expected int");
        };
        assert_eq!(m, BigInt::from(2));
        assert_eq!(float_of(modulus(Value::Float(-7.0), Value::Float(3.0))), 2.0);
        assert_eq!(float_of(modulus(Value::Float(7.0), Value::Float(-3.0))), -2.0);
    }

    #[test]
    fn modulus_by_zero() {
        assert_eq!(modulus(int(1), int(0)).unwrap_err().kind, ExcKind::Division);
        assert!(float_of(modulus(Value::Float(0.0), Value::Float(0.0))).is_nan());
        assert_eq!(
            float_of(modulus(Value::Float(2.0), Value::Float(0.0))),
            f64::INFINITY
        );
    }

    #[test]
    fn power_stays_int_when_it_can() {
        let Value::Int(p) = power(int(2), int(100)).unwrap() else {
            panic!("expected int");
        };
        assert_eq!(p, BigInt::from(2).pow(100u32));
    }

    #[test]
    fn power_falls_back_to_float() {
        assert_eq!(float_of(power(int(2), int(-1))), 0.5);
        // a complex result is NaN, not an error
        assert!(float_of(power(Value::Float(-2.0), Value::Float(0.5))).is_nan());
    }

    #[test]
    fn string_concatenation() {
        let Value::Str(s) = add(Value::Str(Rc::from("ab")), Value::Str(Rc::from("cd"))).unwrap() else {
            panic!("expected string");
        };
        assert_eq!(&*s, "abcd");
    }

    #[test]
    fn mixed_string_and_number_is_a_type_error() {
        let err = add(Value::Str(Rc::from("a")), int(1)).unwrap_err();
        assert_eq!(err.kind, ExcKind::Type);
        assert_eq!(
            err.message,
            "'+' operation not defined for types: <String>, <Int>"
        );
    }

    #[test]
    fn comparisons_are_numeric_only() {
        let err = less(Value::Str(Rc::from("a")), Value::Str(Rc::from("b"))).unwrap_err();
        assert_eq!(err.kind, ExcKind::Type);
        let Value::Bool(b) = less(int(1), Value::Float(1.5)).unwrap() else {
            panic!("expected bool");
        };
        assert!(b);
    }

    #[test]
    fn nan_comparisons_are_false() {
        let Value::Bool(b) = less(Value::Float(f64::NAN), Value::Float(1.0)).unwrap() else {
            panic!("expected bool");
        };
        assert!(!b);
    }

    #[test]
    fn unary_rules() {
        assert!(matches!(
            evaluate_unary(UnaryOp::Negate, Value::Undef).unwrap(),
            Value::Undef
        ));
        let err = evaluate_unary(UnaryOp::Not, int(1)).unwrap_err();
        assert_eq!(err.message, "'!' operation not defined for types: <Int>");
    }
}
