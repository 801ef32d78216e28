//! Semantic checker: name visibility and closure capture sets.
//!
//! The checker walks the statement list once. Each statement reports the
//! names it uses and may declare one name into the current scope. Blocks
//! open an inner scope; the used-names that escape a block, intersected
//! with the capturable enclosing scopes, become the block's
//! `dependent_names` — exactly what the interpreter retains when the block
//! value is constructed. Pervasives live in the non-capturable root scope,
//! so they are never captured.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;

use crate::ast::{Expr, ExprKind, Stmt, StmtKind};
use crate::env::Environment;
use crate::error::{ErrorHandler, KiddouError};

/// One link in the chain of visible-name scopes.
struct VisibleNames<'p> {
    parent: Option<&'p VisibleNames<'p>>,
    names: RefCell<AHashSet<Rc<str>>>,
    /// Whether names resolved in this scope can be captured by a block.
    /// False only for the root scope holding the pervasives and `this`.
    capturable: bool,
}

impl<'p> VisibleNames<'p> {
    fn new(names: AHashSet<Rc<str>>, capturable: bool) -> Self {
        Self {
            parent: None,
            names: RefCell::new(names),
            capturable,
        }
    }

    fn child(parent: &'p VisibleNames<'p>, names: AHashSet<Rc<str>>) -> Self {
        Self {
            parent: Some(parent),
            names: RefCell::new(names),
            capturable: true,
        }
    }

    fn declare(&self, name: Rc<str>) {
        self.names.borrow_mut().insert(name);
    }

    fn is_visible(&self, name: &str) -> bool {
        if self.names.borrow().contains(name) {
            return true;
        }
        self.parent.is_some_and(|parent| parent.is_visible(name))
    }

    /// Whether the nearest scope that resolves `name` allows capture.
    fn resolves_capturable(&self, name: &str) -> bool {
        if self.names.borrow().contains(name) {
            return self.capturable;
        }
        self.parent.is_some_and(|parent| parent.resolves_capturable(name))
    }
}

/// A semantic checker for a statement list.
pub(crate) struct Checker<'a> {
    handler: &'a mut ErrorHandler,
}

impl<'a> Checker<'a> {
    pub fn new(handler: &'a mut ErrorHandler) -> Self {
        Self { handler }
    }

    /// Checks some Kiddou statements against the given root environment.
    /// This also populates each block's dependent-name set.
    pub fn check(&mut self, stmts: &[Stmt], globals: &Environment) {
        let root = VisibleNames::new(globals.captured_keys().into_iter().collect(), false);
        let module = VisibleNames::child(&root, globals.local_keys().into_iter().collect());

        for stmt in stmts {
            let _ = self.check_stmt(stmt, &module);
        }
    }

    /// Checks a statement, returning the set of names it uses. Declared
    /// names are added to `scope` as a side effect.
    fn check_stmt(&mut self, stmt: &Stmt, scope: &VisibleNames<'_>) -> AHashSet<Rc<str>> {
        match &stmt.kind {
            StmtKind::Con { name, expr } => {
                let used = self.check_expr(expr, scope);
                scope.declare(name.clone());
                used
            }
            StmtKind::Run {
                receiver,
                expr,
                reassign,
            } => {
                let mut used = self.check_expr(expr, scope);
                match receiver {
                    None => {}
                    Some(target) => match &target.kind {
                        ExprKind::Variable(name) => {
                            if *reassign {
                                // requires visibility; records a use, does not declare
                                if !scope.is_visible(name) {
                                    self.report_undefined(name, stmt.line_start);
                                }
                                used.insert(name.clone());
                            } else {
                                scope.declare(name.clone());
                            }
                        }
                        ExprKind::Attribute { object, name: _ } => {
                            if !reassign {
                                self.error("Attribute creation not allowed.", stmt.line_start);
                            }
                            used.extend(self.check_expr(object, scope));
                        }
                        ExprKind::Index { container, index } => {
                            if !reassign {
                                self.error("Index creation not allowed.", stmt.line_start);
                            }
                            used.extend(self.check_expr(container, scope));
                            used.extend(self.check_expr(index, scope));
                        }
                        // the parser only produces the three receiver forms
                        _ => {}
                    },
                }
                used
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr, scope: &VisibleNames<'_>) -> AHashSet<Rc<str>> {
        match &expr.kind {
            ExprKind::Literal(_) => AHashSet::new(),
            ExprKind::Variable(name) => {
                if !scope.is_visible(name) {
                    self.report_undefined(name, expr.line);
                }
                let mut used = AHashSet::new();
                used.insert(name.clone());
                used
            }
            ExprKind::Unary { operand, .. } => self.check_expr(operand, scope),
            ExprKind::Binary { left, right, .. } => {
                let mut used = self.check_expr(left, scope);
                used.extend(self.check_expr(right, scope));
                used
            }
            ExprKind::Call { callee, args } => {
                let mut used = self.check_expr(callee, scope);
                for arg in args {
                    used.extend(self.check_expr(arg, scope));
                }
                used
            }
            ExprKind::Index { container, index } => {
                let mut used = self.check_expr(container, scope);
                used.extend(self.check_expr(index, scope));
                used
            }
            // the attribute name is resolved at runtime, only the object is
            // checked
            ExprKind::Attribute { object, .. } => self.check_expr(object, scope),
            ExprKind::Block { body, is_eager } => {
                if *is_eager {
                    self.error("Block constructor may not use '[...]'.", expr.line);
                }

                let mut inner_names = AHashSet::new();
                inner_names.insert(Rc::from("this"));
                let inner = VisibleNames::child(scope, inner_names);

                let mut used = AHashSet::new();
                for stmt in &body.stmts {
                    used.extend(self.check_stmt(stmt, &inner));
                }
                if let Some(tail) = &body.tail {
                    used.extend(self.check_expr(tail, &inner));
                }

                // names introduced within the block do not leak out
                let declared = inner.names.borrow();
                let free: AHashSet<Rc<str>> = used.into_iter().filter(|n| !declared.contains(n)).collect();

                let dependent: AHashSet<Rc<str>> = free
                    .iter()
                    .filter(|n| scope.resolves_capturable(n))
                    .cloned()
                    .collect();
                *body.dependent_names.borrow_mut() = dependent;

                free
            }
            ExprKind::Sequence { elements, is_eager } => {
                if !is_eager {
                    self.error("Sequence constructor may not use '{...}'.", expr.line);
                }
                let mut used = AHashSet::new();
                for element in elements {
                    used.extend(self.check_expr(element, scope));
                }
                used
            }
        }
    }

    fn report_undefined(&mut self, name: &str, line: u32) {
        self.error(format!("undefined variable: {name}."), line);
    }

    fn error(&mut self, message: impl Into<String>, line: u32) {
        self.handler.error(KiddouError::new(message, line, None));
    }
}
