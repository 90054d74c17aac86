#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use porter_ast::{Expr, ExprKind};

use crate::error::PassResult;
use crate::visit::{Analysis, Context, Rewrite, TermVisitor};

/// Collects every logical variable not bound by an enclosing binder.
#[derive(Default)]
pub struct FreeVars {
    pub vars: BTreeSet<String>,
}

impl TermVisitor for FreeVars {
    type Mode = Analysis;

    fn var(&mut self, cx: &mut Context, node: &Expr) -> PassResult<()> {
        if let Some(name) = node.as_var() {
            if !cx.in_scope(name) {
                self.vars.insert(name.to_string());
            }
        }
        Ok(())
    }
}

pub fn free_vars(expr: &Expr) -> PassResult<BTreeSet<String>> {
    let mut fv = FreeVars::default();
    fv.visit_expr(&mut Context::new(), expr)?;
    Ok(fv.vars)
}

/// Turns one logical variable into a non-logical constant of the same name, e.g. once an
/// enclosing loop has fixed its value.
pub struct BindVar<'a> {
    bound: &'a str,
}

impl<'a> BindVar<'a> {
    pub fn new(bound: &'a str) -> Self {
        Self { bound }
    }
}

impl TermVisitor for BindVar<'_> {
    type Mode = Rewrite;

    fn var(&mut self, _cx: &mut Context, node: &Expr) -> PassResult<Expr> {
        if node.as_var() == Some(self.bound) {
            Ok(Expr {
                pos: node.pos.clone(),
                sort: node.sort.clone(),
                kind: ExprKind::Constant(self.bound.to_string()),
            })
        } else {
            Ok(node.clone())
        }
    }
}

pub fn bind_var(expr: &Expr, var: &str) -> PassResult<Expr> {
    BindVar::new(var).visit_expr(&mut Context::new(), expr)
}
