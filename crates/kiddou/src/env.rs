//! Runtime environments: name → shared reference cells.
//!
//! An environment is a pair of maps. `captured` holds cells inherited from an
//! outer scope; `locals` holds cells introduced here, in binding order. Cells
//! are shared (`Rc<RefCell<..>>`), so a closure that retains a cell observes
//! mutations made through any other holder of the same cell.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;

use crate::error::{RunError, RunResult};
use crate::value::Value;

/// A single binding: the current value plus its mutability flag.
#[derive(Debug)]
pub(crate) struct Reference {
    pub val: Value,
    pub mutable: bool,
}

/// A shared, mutable reference cell.
pub(crate) type Binding = Rc<RefCell<Reference>>;

type CapturedMap = ahash::AHashMap<Rc<str>, Binding>;
type LocalMap = indexmap::IndexMap<Rc<str>, Binding, ahash::RandomState>;

/// An environment for variables in a Kiddou program.
#[derive(Debug, Default)]
pub(crate) struct Environment {
    captured: RefCell<CapturedMap>,
    locals: RefCell<LocalMap>,
}

/// Environments are shared between the interpreter, modules, and blocks.
pub(crate) type EnvRef = Rc<Environment>;

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names inherited from the outer scope.
    pub fn captured_keys(&self) -> Vec<Rc<str>> {
        self.captured.borrow().keys().cloned().collect()
    }

    /// Names introduced in this environment, in binding order.
    pub fn local_keys(&self) -> Vec<Rc<str>> {
        self.locals.borrow().keys().cloned().collect()
    }

    /// Binds the given name to the given value in this environment.
    ///
    /// Rebinding an existing name installs a fresh cell; closures holding
    /// the old cell are unaffected.
    pub fn bind(&self, name: Rc<str>, val: Value, mutable: bool) {
        self.locals
            .borrow_mut()
            .insert(name, Rc::new(RefCell::new(Reference { val, mutable })));
    }

    /// Binds a name into the captured scope.
    ///
    /// Used for pervasives and for `this`, which are visible to lookups but
    /// are not attributes (attribute access reads locals only).
    pub fn bind_captured(&self, name: Rc<str>, val: Value, mutable: bool) {
        self.captured
            .borrow_mut()
            .insert(name, Rc::new(RefCell::new(Reference { val, mutable })));
    }

    /// Removes a name from the captured scope, returning whether it existed.
    pub fn remove_captured(&self, name: &str) -> bool {
        self.captured.borrow_mut().remove(name).is_some()
    }

    /// Overwrites the given name in the first scope that contains it,
    /// locals then captured.
    ///
    /// This produces an error if the name is unset or the current binding is
    /// immutable.
    pub fn overwrite(&self, name: &str, val: Value) -> RunResult<()> {
        let cell = {
            let locals = self.locals.borrow();
            match locals.get(name) {
                Some(cell) => cell.clone(),
                None => {
                    let captured = self.captured.borrow();
                    captured
                        .get(name)
                        .cloned()
                        .ok_or_else(|| RunError::name(format!("undefined variable: {name}.")))?
                }
            }
        };
        overwrite_cell(&cell, name, val)
    }

    /// Overwrites a name in this environment's locals only.
    ///
    /// This is the attribute-store write path: a name absent from locals is
    /// an unknown attribute, even if it is visible through `captured`.
    pub fn overwrite_local(&self, name: &str, val: Value) -> RunResult<()> {
        let cell = {
            let locals = self.locals.borrow();
            locals
                .get(name)
                .cloned()
                .ok_or_else(|| RunError::name(format!("undefined variable: {name}.")))?
        };
        overwrite_cell(&cell, name, val)
    }

    /// Gets the current value for the given name, locals then captured.
    pub fn get(&self, name: &str) -> RunResult<Value> {
        if let Some(cell) = self.locals.borrow().get(name) {
            return Ok(cell.borrow().val.clone());
        }
        if let Some(cell) = self.captured.borrow().get(name) {
            return Ok(cell.borrow().val.clone());
        }
        Err(RunError::name(format!("undefined variable: {name}.")))
    }

    /// Gets the current value for a name in this environment's locals only.
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.locals.borrow().get(name).map(|cell| cell.borrow().val.clone())
    }

    /// Produces a child environment retaining the named locals.
    ///
    /// The child's captured map is this environment's entire captured map
    /// plus the cells of `names` found in this environment's locals; its
    /// locals start empty. Retention is monotone: copies of copies keep
    /// every previously retained name.
    pub fn copy_retain(&self, names: &AHashSet<Rc<str>>) -> Self {
        let mut captured = self.captured.borrow().clone();
        let locals = self.locals.borrow();
        for name in names {
            if let Some(cell) = locals.get(name) {
                captured.insert(name.clone(), cell.clone());
            }
        }
        Self {
            captured: RefCell::new(captured),
            locals: RefCell::new(LocalMap::default()),
        }
    }
}

fn overwrite_cell(cell: &Binding, name: &str, val: Value) -> RunResult<()> {
    let mut reference = cell.borrow_mut();
    if !reference.mutable {
        return Err(RunError::immutable(format!("immutable variable: {name}.")));
    }
    reference.val = val;
    Ok(())
}
