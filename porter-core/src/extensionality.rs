#![forbid(unsafe_code)]

//! Decides which relations and functions can be stored directly as maps.
//!
//! A symbol is extensional unless it is defined by a function definition, some
//! full-domain initialization of it assigns a non-constant, or some update of it is
//! indexed by a free logical variable without being such an initialization.

use std::collections::BTreeMap;
use std::fmt;

use porter_ast::{Action, ActionKind, Expr, ExprKind, FunctionDefinition, Program};
use serde::Serialize;
use tracing::debug;

use crate::error::PassResult;
use crate::visit::{Analysis, Context, TermVisitor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// Defined by a function definition.
    Derived,
    /// Initialized over its whole domain to something other than a constant.
    NonConstantInit,
    /// Updated at a set of points indexed by a free logical variable.
    NonPointUpdate,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Violation::Derived => "derived",
            Violation::NonConstantInit => "non_constant_init",
            Violation::NonPointUpdate => "non_point_update",
        };
        f.write_str(s)
    }
}

/// Symbols that need a derived representation, each with the first violation seen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NonExtensionals {
    symbols: BTreeMap<String, Violation>,
}

impl NonExtensionals {
    pub fn is_extensional(&self, symbol: &str) -> bool {
        !self.symbols.contains_key(symbol)
    }

    pub fn violation(&self, symbol: &str) -> Option<Violation> {
        self.symbols.get(symbol).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn record(&mut self, symbol: &str, violation: Violation) {
        if !self.symbols.contains_key(symbol) {
            debug!(symbol, %violation, "symbol is not extensional");
            self.symbols.insert(symbol.to_string(), violation);
        }
    }
}

/// Accumulates [`NonExtensionals`] over every assignment it visits.
#[derive(Default)]
pub struct ExtensionalityClassifier {
    found: NonExtensionals,
}

impl ExtensionalityClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_result(self) -> NonExtensionals {
        self.found
    }

    fn classify_update(&mut self, cx: &Context, relsym: &str, args: &[Expr], rhs: &Expr) {
        let is_free = |e: &Expr| e.as_var().is_some_and(|v| !cx.in_scope(v));
        if !args.is_empty() && args.iter().all(is_free) {
            if !matches!(rhs.kind, ExprKind::Constant(_)) {
                self.found.record(relsym, Violation::NonConstantInit);
            }
        } else if args.iter().any(is_free) {
            self.found.record(relsym, Violation::NonPointUpdate);
        }
    }
}

impl TermVisitor for ExtensionalityClassifier {
    type Mode = Analysis;

    fn finish_assign(
        &mut self,
        cx: &mut Context,
        node: &Action,
        _lhs: (),
        _rhs: (),
    ) -> PassResult<()> {
        if let ActionKind::Assign { lhs, rhs } = &node.kind {
            if let ExprKind::Apply { relsym, args } = &lhs.kind {
                self.classify_update(cx, relsym, args, rhs);
            }
        }
        Ok(())
    }

    fn finish_logical_assign(
        &mut self,
        cx: &mut Context,
        node: &Action,
        _args: Vec<()>,
        _rhs: (),
    ) -> PassResult<()> {
        if let ActionKind::LogicalAssign { relsym, args, rhs } = &node.kind {
            self.classify_update(cx, relsym, args, rhs);
        }
        Ok(())
    }

    fn begin_function_def(
        &mut self,
        _cx: &mut Context,
        name: &str,
        _def: &FunctionDefinition,
    ) -> PassResult<Option<()>> {
        self.found.record(name, Violation::Derived);
        Ok(Some(()))
    }
}

pub fn non_extensionals(prog: &Program, max_depth: usize) -> PassResult<NonExtensionals> {
    let mut classifier = ExtensionalityClassifier::new();
    let mut cx = Context::with_max_depth(max_depth);
    classifier.visit_program(&mut cx, prog)?;
    let found = classifier.into_result();
    debug!(count = found.len(), "classified extensionality");
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use porter_ast::{Binding, Sort};

    fn classify(act: Action) -> NonExtensionals {
        let mut c = ExtensionalityClassifier::new();
        c.visit_action(&mut Context::new(), &act).unwrap();
        c.into_result()
    }

    #[test]
    fn full_domain_init_to_constant_is_extensional() {
        let act = Action::assign(
            Expr::apply("f", vec![Expr::var("X")]),
            Expr::constant("false"),
        );
        assert!(classify(act).is_extensional("f"));
    }

    #[test]
    fn full_domain_init_to_expression_is_not() {
        let act = Action::assign(
            Expr::apply("f", vec![Expr::var("X")]),
            Expr::apply("g", vec![Expr::var("X")]),
        );
        assert_eq!(
            classify(act).violation("f"),
            Some(Violation::NonConstantInit)
        );
    }

    #[test]
    fn partially_indexed_update_is_not() {
        let act = Action::assign(
            Expr::apply("f", vec![Expr::constant("x"), Expr::var("Y")]),
            Expr::constant("false"),
        );
        assert_eq!(classify(act).violation("f"), Some(Violation::NonPointUpdate));
    }

    #[test]
    fn let_bound_variable_is_a_point() {
        let act = Action::new(ActionKind::Let {
            vars: vec![Binding::new("Y", Sort::int_sort())],
            body: Box::new(Action::assign(
                Expr::apply("f", vec![Expr::constant("x"), Expr::var("Y")]),
                Expr::constant("1"),
            )),
        });
        assert!(classify(act).is_extensional("f"));
    }

    #[test]
    fn first_violation_is_kept() {
        let act = Action::sequence(vec![
            Action::assign(
                Expr::apply("f", vec![Expr::constant("a"), Expr::var("Y")]),
                Expr::constant("0"),
            ),
            Action::assign(
                Expr::apply("f", vec![Expr::var("X"), Expr::var("Y")]),
                Expr::var("Z"),
            ),
        ]);
        assert_eq!(classify(act).violation("f"), Some(Violation::NonPointUpdate));
    }
}
