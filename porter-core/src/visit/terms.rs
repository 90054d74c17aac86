#![forbid(unsafe_code)]

use porter_ast::{
    Action, ActionDefinition, ActionKind, Binding, Expr, ExprKind, FunctionDefinition, Program,
    Sort, names,
};

use super::{Analysis, Context, Rewrite, Strict};
use crate::error::{PassError, PassResult};

pub type ExprOut<V> = <<V as TermVisitor>::Mode as TermMode>::Expr;
pub type ActionOut<V> = <<V as TermVisitor>::Mode as TermMode>::Action;
type ActionDefOut<V> = <<V as TermVisitor>::Mode as TermMode>::ActionDef;
type FunctionDefOut<V> = <<V as TermVisitor>::Mode as TermMode>::FunctionDef;

/// Results of visiting an expression's children, handed to its finish hook.
#[derive(Debug)]
pub enum ExprParts<E> {
    Leaf,
    Apply { args: Vec<E> },
    BinOp { lhs: E, rhs: E },
    UnOp { expr: E },
    FieldAccess { record: E },
    Ite { test: E, then: E, els: E },
    Exists { body: E },
    Forall { body: E },
    Some { fmla: E },
    Native { args: Vec<E> },
}

impl<E> ExprParts<E> {
    fn name(&self) -> &'static str {
        match self {
            ExprParts::Leaf => "leaf",
            ExprParts::Apply { .. } => "Apply",
            ExprParts::BinOp { .. } => "BinOp",
            ExprParts::UnOp { .. } => "UnOp",
            ExprParts::FieldAccess { .. } => "FieldAccess",
            ExprParts::Ite { .. } => "Ite",
            ExprParts::Exists { .. } => "Exists",
            ExprParts::Forall { .. } => "Forall",
            ExprParts::Some { .. } => "Some",
            ExprParts::Native { .. } => "NativeExpr",
        }
    }
}

/// Results of visiting an action's children, handed to its finish hook.
#[derive(Debug)]
pub enum ActionParts<E, A> {
    /// `assert`, `assume`, `requires` and `ensures`.
    Predicate { pred: E },
    Assign { lhs: E, rhs: E },
    LogicalAssign { args: Vec<E>, rhs: E },
    Call { app: E },
    Debug { args: Vec<Binding<E>> },
    Havoc { modifies: Vec<E> },
    If { test: E, then: A, els: Option<A> },
    Init { body: A },
    Let { body: A },
    Native { args: Vec<E> },
    Sequence { stmts: Vec<A> },
    While { test: E, decreases: Option<E>, body: A },
}

impl<E, A> ActionParts<E, A> {
    fn name(&self) -> &'static str {
        match self {
            ActionParts::Predicate { .. } => "predicate",
            ActionParts::Assign { .. } => "Assign",
            ActionParts::LogicalAssign { .. } => "LogicalAssign",
            ActionParts::Call { .. } => "Call",
            ActionParts::Debug { .. } => "Debug",
            ActionParts::Havoc { .. } => "Havoc",
            ActionParts::If { .. } => "If",
            ActionParts::Init { .. } => "Init",
            ActionParts::Let { .. } => "Let",
            ActionParts::Native { .. } => "NativeAction",
            ActionParts::Sequence { .. } => "Sequence",
            ActionParts::While { .. } => "While",
        }
    }
}

/// What the default finish hooks of a [`TermVisitor`] produce.
pub trait TermMode: Sized {
    type Expr;
    type Action;
    type ActionDef;
    type FunctionDef;

    fn finish_expr<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &Expr,
        parts: ExprParts<Self::Expr>,
    ) -> PassResult<Self::Expr>;

    fn finish_action<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &Action,
        parts: ActionParts<Self::Expr, Self::Action>,
    ) -> PassResult<Self::Action>;

    fn finish_action_def<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &ActionDefinition,
        body: Self::Action,
    ) -> PassResult<Self::ActionDef>;

    fn finish_function_def<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &FunctionDefinition,
        body: Self::Expr,
    ) -> PassResult<Self::FunctionDef>;
}

impl<E, A> TermMode for Strict<E, A> {
    type Expr = E;
    type Action = A;
    type ActionDef = ();
    type FunctionDef = ();

    fn finish_expr<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        node: &Expr,
        _parts: ExprParts<E>,
    ) -> PassResult<E> {
        Err(PassError::Unimplemented {
            node: node.kind_name(),
        })
    }

    fn finish_action<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        node: &Action,
        _parts: ActionParts<E, A>,
    ) -> PassResult<A> {
        Err(PassError::Unimplemented {
            node: node.kind_name(),
        })
    }

    fn finish_action_def<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &ActionDefinition,
        _body: A,
    ) -> PassResult<()> {
        Err(PassError::Unimplemented {
            node: "ActionDefinition",
        })
    }

    fn finish_function_def<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &FunctionDefinition,
        _body: E,
    ) -> PassResult<()> {
        Err(PassError::Unimplemented {
            node: "FunctionDefinition",
        })
    }
}

impl TermMode for Analysis {
    type Expr = ();
    type Action = ();
    type ActionDef = ();
    type FunctionDef = ();

    fn finish_expr<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &Expr,
        _parts: ExprParts<()>,
    ) -> PassResult<()> {
        Ok(())
    }

    fn finish_action<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &Action,
        _parts: ActionParts<(), ()>,
    ) -> PassResult<()> {
        Ok(())
    }

    fn finish_action_def<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &ActionDefinition,
        _body: (),
    ) -> PassResult<()> {
        Ok(())
    }

    fn finish_function_def<V: TermVisitor<Mode = Self>>(
        _v: &mut V,
        _cx: &mut Context,
        _node: &FunctionDefinition,
        _body: (),
    ) -> PassResult<()> {
        Ok(())
    }
}

fn rewrite_bindings<V: TermVisitor>(
    v: &mut V,
    cx: &mut Context,
    vars: &[Binding<Sort>],
) -> PassResult<Vec<Binding<Sort>>> {
    vars.iter()
        .map(|b| Ok(Binding::new(b.name.clone(), v.rewrite_sort(cx, &b.decl)?)))
        .collect()
}

fn rewrite_annotation<V: TermVisitor>(
    v: &mut V,
    cx: &mut Context,
    sort: &Option<Sort>,
) -> PassResult<Option<Sort>> {
    sort.as_ref().map(|s| v.rewrite_sort(cx, s)).transpose()
}

impl TermMode for Rewrite {
    type Expr = Expr;
    type Action = Action;
    type ActionDef = ActionDefinition;
    type FunctionDef = FunctionDefinition;

    fn finish_expr<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &Expr,
        parts: ExprParts<Expr>,
    ) -> PassResult<Expr> {
        let kind = match (&node.kind, parts) {
            (ExprKind::Constant(_) | ExprKind::Var(_), ExprParts::Leaf) => node.kind.clone(),
            (ExprKind::Apply { relsym, .. }, ExprParts::Apply { args }) => ExprKind::Apply {
                relsym: relsym.clone(),
                args,
            },
            (ExprKind::BinOp { op, .. }, ExprParts::BinOp { lhs, rhs }) => ExprKind::BinOp {
                lhs: Box::new(lhs),
                op: *op,
                rhs: Box::new(rhs),
            },
            (ExprKind::UnOp { op, .. }, ExprParts::UnOp { expr }) => ExprKind::UnOp {
                op: *op,
                expr: Box::new(expr),
            },
            (ExprKind::FieldAccess { field, .. }, ExprParts::FieldAccess { record }) => {
                ExprKind::FieldAccess {
                    record: Box::new(record),
                    field: field.clone(),
                }
            }
            (ExprKind::Ite { .. }, ExprParts::Ite { test, then, els }) => ExprKind::Ite {
                test: Box::new(test),
                then: Box::new(then),
                els: Box::new(els),
            },
            (ExprKind::Exists { vars, .. }, ExprParts::Exists { body }) => ExprKind::Exists {
                vars: rewrite_bindings(v, cx, vars)?,
                body: Box::new(body),
            },
            (ExprKind::Forall { vars, .. }, ExprParts::Forall { body }) => ExprKind::Forall {
                vars: rewrite_bindings(v, cx, vars)?,
                body: Box::new(body),
            },
            (ExprKind::Some { vars, strategy, .. }, ExprParts::Some { fmla }) => ExprKind::Some {
                vars: rewrite_bindings(v, cx, vars)?,
                fmla: Box::new(fmla),
                strategy: *strategy,
            },
            (ExprKind::Native { lang, fmt, .. }, ExprParts::Native { args }) => ExprKind::Native {
                lang: lang.clone(),
                fmt: fmt.clone(),
                args,
            },
            (_, parts) => {
                return Err(PassError::invariant(format!(
                    "{} node rebuilt from {} parts",
                    node.kind_name(),
                    parts.name()
                )));
            }
        };
        Ok(Expr {
            pos: node.pos.clone(),
            sort: rewrite_annotation(v, cx, &node.sort)?,
            kind,
        })
    }

    fn finish_action<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &Action,
        parts: ActionParts<Expr, Action>,
    ) -> PassResult<Action> {
        let kind = match (&node.kind, parts) {
            (ActionKind::Assert(_), ActionParts::Predicate { pred }) => ActionKind::Assert(pred),
            (ActionKind::Assume(_), ActionParts::Predicate { pred }) => ActionKind::Assume(pred),
            (ActionKind::Requires(_), ActionParts::Predicate { pred }) => {
                ActionKind::Requires(pred)
            }
            (ActionKind::Ensures(_), ActionParts::Predicate { pred }) => ActionKind::Ensures(pred),
            (ActionKind::Assign { .. }, ActionParts::Assign { lhs, rhs }) => {
                ActionKind::Assign { lhs, rhs }
            }
            (
                ActionKind::LogicalAssign { relsym, .. },
                ActionParts::LogicalAssign { args, rhs },
            ) => ActionKind::LogicalAssign {
                relsym: relsym.clone(),
                args,
                rhs,
            },
            (ActionKind::Call(_), ActionParts::Call { app }) => ActionKind::Call(app),
            (ActionKind::Debug { msg, .. }, ActionParts::Debug { args }) => ActionKind::Debug {
                msg: msg.clone(),
                args,
            },
            (ActionKind::Havoc(_), ActionParts::Havoc { modifies }) => ActionKind::Havoc(modifies),
            (ActionKind::If { .. }, ActionParts::If { test, then, els }) => ActionKind::If {
                test,
                then: Box::new(then),
                els: els.map(Box::new),
            },
            (ActionKind::Init { params, .. }, ActionParts::Init { body }) => ActionKind::Init {
                params: rewrite_bindings(v, cx, params)?,
                body: Box::new(body),
            },
            (ActionKind::Let { vars, .. }, ActionParts::Let { body }) => ActionKind::Let {
                vars: rewrite_bindings(v, cx, vars)?,
                body: Box::new(body),
            },
            (ActionKind::Native { lang, fmt, .. }, ActionParts::Native { args }) => {
                ActionKind::Native {
                    lang: lang.clone(),
                    fmt: fmt.clone(),
                    args,
                }
            }
            (ActionKind::Sequence(_), ActionParts::Sequence { stmts }) => {
                ActionKind::Sequence(stmts)
            }
            (
                ActionKind::While { .. },
                ActionParts::While {
                    test,
                    decreases,
                    body,
                },
            ) => ActionKind::While {
                test,
                decreases,
                body: Box::new(body),
            },
            (_, parts) => {
                return Err(PassError::invariant(format!(
                    "{} action rebuilt from {} parts",
                    node.kind_name(),
                    parts.name()
                )));
            }
        };
        Ok(Action {
            pos: node.pos.clone(),
            sort: rewrite_annotation(v, cx, &node.sort)?,
            kind,
        })
    }

    fn finish_action_def<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &ActionDefinition,
        body: Action,
    ) -> PassResult<ActionDefinition> {
        Ok(ActionDefinition {
            pos: node.pos.clone(),
            kind: node.kind,
            formal_params: rewrite_bindings(v, cx, &node.formal_params)?,
            formal_returns: rewrite_bindings(v, cx, &node.formal_returns)?,
            body,
        })
    }

    fn finish_function_def<V: TermVisitor<Mode = Self>>(
        v: &mut V,
        cx: &mut Context,
        node: &FunctionDefinition,
        body: Expr,
    ) -> PassResult<FunctionDefinition> {
        Ok(FunctionDefinition {
            pos: node.pos.clone(),
            formal_params: rewrite_bindings(v, cx, &node.formal_params)?,
            body,
        })
    }
}

/// Everything a program-level traversal produced, in program order.
pub struct Visited<M: TermMode> {
    pub inits: Vec<M::Action>,
    pub actions: Vec<Binding<M::ActionDef>>,
    pub functions: Vec<Binding<M::FunctionDef>>,
    pub conjectures: Vec<Binding<M::Expr>>,
}

/// Rewrites a whole program: its sort table and individuals through
/// [`TermVisitor::rewrite_sort`] and every definition through the visitor's hooks.
pub fn rewrite_program<V: TermVisitor<Mode = Rewrite>>(
    v: &mut V,
    cx: &mut Context,
    prog: &Program,
) -> PassResult<Program> {
    let visited = v.visit_program(cx, prog)?;
    let mut sorts = std::collections::BTreeMap::new();
    for (name, sort) in &prog.sorts {
        sorts.insert(name.clone(), v.rewrite_sort(cx, sort)?);
    }
    let individuals = rewrite_bindings(v, cx, &prog.individuals)?;
    Ok(Program {
        sorts,
        individuals,
        inits: visited.inits,
        actions: visited.actions,
        functions: visited.functions,
        conjectures: visited.conjectures,
    })
}

/// A traversal over expressions, actions and programs.
///
/// Every `begin_*` hook defaults to `Ok(None)`. Every `finish_*` hook, and the `constant`
/// and `var` leaf hooks, default to whatever [`TermVisitor::Mode`] does. Binder finish hooks
/// run while the binder's names are still in scope.
pub trait TermVisitor: Sized {
    type Mode: TermMode;

    /// Applied to sort annotations and binder sorts by rewriting visitors.
    fn rewrite_sort(&mut self, _cx: &mut Context, sort: &Sort) -> PassResult<Sort> {
        Ok(sort.clone())
    }

    // Leaves

    fn constant(&mut self, cx: &mut Context, node: &Expr) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Leaf)
    }

    fn var(&mut self, cx: &mut Context, node: &Expr) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Leaf)
    }

    // Expressions

    fn begin_apply(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_apply(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        args: Vec<ExprOut<Self>>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Apply { args })
    }

    fn begin_binop(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_binop(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        lhs: ExprOut<Self>,
        rhs: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::BinOp { lhs, rhs })
    }

    fn begin_unop(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_unop(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        expr: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::UnOp { expr })
    }

    fn begin_field_access(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_field_access(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        record: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::FieldAccess { record })
    }

    fn begin_ite(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_ite(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        test: ExprOut<Self>,
        then: ExprOut<Self>,
        els: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Ite { test, then, els })
    }

    fn begin_exists(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_exists(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        body: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Exists { body })
    }

    fn begin_forall(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_forall(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        body: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Forall { body })
    }

    fn begin_some(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_some(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        fmla: ExprOut<Self>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Some { fmla })
    }

    fn begin_native_expr(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<ExprOut<Self>>> {
        Ok(None)
    }

    fn finish_native_expr(
        &mut self,
        cx: &mut Context,
        node: &Expr,
        args: Vec<ExprOut<Self>>,
    ) -> PassResult<ExprOut<Self>> {
        Self::Mode::finish_expr(self, cx, node, ExprParts::Native { args })
    }

    // Actions

    fn begin_predicate(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    /// Shared by `assert`, `assume`, `requires` and `ensures`.
    fn finish_predicate(
        &mut self,
        cx: &mut Context,
        node: &Action,
        pred: ExprOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Predicate { pred })
    }

    fn begin_assign(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_assign(
        &mut self,
        cx: &mut Context,
        node: &Action,
        lhs: ExprOut<Self>,
        rhs: ExprOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Assign { lhs, rhs })
    }

    fn begin_logical_assign(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_logical_assign(
        &mut self,
        cx: &mut Context,
        node: &Action,
        args: Vec<ExprOut<Self>>,
        rhs: ExprOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::LogicalAssign { args, rhs })
    }

    fn begin_call(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_call(
        &mut self,
        cx: &mut Context,
        node: &Action,
        app: ExprOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Call { app })
    }

    fn begin_debug(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_debug(
        &mut self,
        cx: &mut Context,
        node: &Action,
        args: Vec<Binding<ExprOut<Self>>>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Debug { args })
    }

    fn begin_havoc(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_havoc(
        &mut self,
        cx: &mut Context,
        node: &Action,
        modifies: Vec<ExprOut<Self>>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Havoc { modifies })
    }

    fn begin_if(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_if(
        &mut self,
        cx: &mut Context,
        node: &Action,
        test: ExprOut<Self>,
        then: ActionOut<Self>,
        els: Option<ActionOut<Self>>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::If { test, then, els })
    }

    fn begin_init(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_init(
        &mut self,
        cx: &mut Context,
        node: &Action,
        body: ActionOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Init { body })
    }

    fn begin_let(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_let(
        &mut self,
        cx: &mut Context,
        node: &Action,
        body: ActionOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Let { body })
    }

    fn begin_native_action(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_native_action(
        &mut self,
        cx: &mut Context,
        node: &Action,
        args: Vec<ExprOut<Self>>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Native { args })
    }

    fn begin_sequence(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_sequence(
        &mut self,
        cx: &mut Context,
        node: &Action,
        stmts: Vec<ActionOut<Self>>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(self, cx, node, ActionParts::Sequence { stmts })
    }

    fn begin_while(
        &mut self,
        _cx: &mut Context,
        _node: &Action,
    ) -> PassResult<Option<ActionOut<Self>>> {
        Ok(None)
    }

    fn finish_while(
        &mut self,
        cx: &mut Context,
        node: &Action,
        test: ExprOut<Self>,
        decreases: Option<ExprOut<Self>>,
        body: ActionOut<Self>,
    ) -> PassResult<ActionOut<Self>> {
        Self::Mode::finish_action(
            self,
            cx,
            node,
            ActionParts::While {
                test,
                decreases,
                body,
            },
        )
    }

    // Definitions

    fn begin_program(&mut self, _cx: &mut Context, _prog: &Program) -> PassResult<()> {
        Ok(())
    }

    fn begin_action_def(
        &mut self,
        _cx: &mut Context,
        _name: &str,
        _def: &ActionDefinition,
    ) -> PassResult<Option<ActionDefOut<Self>>> {
        Ok(None)
    }

    fn finish_action_def(
        &mut self,
        cx: &mut Context,
        _name: &str,
        def: &ActionDefinition,
        body: ActionOut<Self>,
    ) -> PassResult<ActionDefOut<Self>> {
        Self::Mode::finish_action_def(self, cx, def, body)
    }

    fn begin_function_def(
        &mut self,
        _cx: &mut Context,
        _name: &str,
        _def: &FunctionDefinition,
    ) -> PassResult<Option<FunctionDefOut<Self>>> {
        Ok(None)
    }

    fn finish_function_def(
        &mut self,
        cx: &mut Context,
        _name: &str,
        def: &FunctionDefinition,
        body: ExprOut<Self>,
    ) -> PassResult<FunctionDefOut<Self>> {
        Self::Mode::finish_function_def(self, cx, def, body)
    }

    // Dispatch

    fn visit_exprs(&mut self, cx: &mut Context, exprs: &[Expr]) -> PassResult<Vec<ExprOut<Self>>> {
        exprs.iter().map(|e| self.visit_expr(cx, e)).collect()
    }

    fn visit_expr(&mut self, cx: &mut Context, node: &Expr) -> PassResult<ExprOut<Self>> {
        let mut frame = cx.descend()?;
        let cx: &mut Context = &mut frame;

        match &node.kind {
            ExprKind::Constant(_) => self.constant(cx, node),
            ExprKind::Var(_) => self.var(cx, node),
            ExprKind::Apply { args, .. } => {
                if let Some(out) = self.begin_apply(cx, node)? {
                    return Ok(out);
                }
                let args = self.visit_exprs(cx, args)?;
                self.finish_apply(cx, node, args)
            }
            ExprKind::BinOp { lhs, rhs, .. } => {
                if let Some(out) = self.begin_binop(cx, node)? {
                    return Ok(out);
                }
                let lhs = self.visit_expr(cx, lhs)?;
                let rhs = self.visit_expr(cx, rhs)?;
                self.finish_binop(cx, node, lhs, rhs)
            }
            ExprKind::UnOp { expr, .. } => {
                if let Some(out) = self.begin_unop(cx, node)? {
                    return Ok(out);
                }
                let expr = self.visit_expr(cx, expr)?;
                self.finish_unop(cx, node, expr)
            }
            ExprKind::FieldAccess { record, .. } => {
                if let Some(out) = self.begin_field_access(cx, node)? {
                    return Ok(out);
                }
                let record = self.visit_expr(cx, record)?;
                self.finish_field_access(cx, node, record)
            }
            ExprKind::Ite { test, then, els } => {
                if let Some(out) = self.begin_ite(cx, node)? {
                    return Ok(out);
                }
                let test = self.visit_expr(cx, test)?;
                let then = self.visit_expr(cx, then)?;
                let els = self.visit_expr(cx, els)?;
                self.finish_ite(cx, node, test, then, els)
            }
            ExprKind::Exists { vars, body } => {
                if let Some(out) = self.begin_exists(cx, node)? {
                    return Ok(out);
                }
                let mut scope = cx.enter(names(vars));
                let body = self.visit_expr(&mut scope, body)?;
                self.finish_exists(&mut scope, node, body)
            }
            ExprKind::Forall { vars, body } => {
                if let Some(out) = self.begin_forall(cx, node)? {
                    return Ok(out);
                }
                let mut scope = cx.enter(names(vars));
                let body = self.visit_expr(&mut scope, body)?;
                self.finish_forall(&mut scope, node, body)
            }
            ExprKind::Some { vars, fmla, .. } => {
                if let Some(out) = self.begin_some(cx, node)? {
                    return Ok(out);
                }
                let mut scope = cx.enter(names(vars));
                let fmla = self.visit_expr(&mut scope, fmla)?;
                self.finish_some(&mut scope, node, fmla)
            }
            ExprKind::Native { args, .. } => {
                if let Some(out) = self.begin_native_expr(cx, node)? {
                    return Ok(out);
                }
                let args = self.visit_exprs(cx, args)?;
                self.finish_native_expr(cx, node, args)
            }
        }
    }

    fn visit_action(&mut self, cx: &mut Context, node: &Action) -> PassResult<ActionOut<Self>> {
        let mut frame = cx.descend()?;
        let cx: &mut Context = &mut frame;

        match &node.kind {
            ActionKind::Assert(pred)
            | ActionKind::Assume(pred)
            | ActionKind::Requires(pred)
            | ActionKind::Ensures(pred) => {
                if let Some(out) = self.begin_predicate(cx, node)? {
                    return Ok(out);
                }
                let pred = self.visit_expr(cx, pred)?;
                self.finish_predicate(cx, node, pred)
            }
            ActionKind::Assign { lhs, rhs } => {
                if let Some(out) = self.begin_assign(cx, node)? {
                    return Ok(out);
                }
                let lhs = self.visit_expr(cx, lhs)?;
                let rhs = self.visit_expr(cx, rhs)?;
                self.finish_assign(cx, node, lhs, rhs)
            }
            ActionKind::LogicalAssign { args, rhs, .. } => {
                if let Some(out) = self.begin_logical_assign(cx, node)? {
                    return Ok(out);
                }
                let args = self.visit_exprs(cx, args)?;
                let rhs = self.visit_expr(cx, rhs)?;
                self.finish_logical_assign(cx, node, args, rhs)
            }
            ActionKind::Call(app) => {
                if let Some(out) = self.begin_call(cx, node)? {
                    return Ok(out);
                }
                let app = self.visit_expr(cx, app)?;
                self.finish_call(cx, node, app)
            }
            ActionKind::Debug { args, .. } => {
                if let Some(out) = self.begin_debug(cx, node)? {
                    return Ok(out);
                }
                let args = args
                    .iter()
                    .map(|b| Ok(Binding::new(b.name.clone(), self.visit_expr(cx, &b.decl)?)))
                    .collect::<PassResult<Vec<_>>>()?;
                self.finish_debug(cx, node, args)
            }
            ActionKind::Havoc(modifies) => {
                if let Some(out) = self.begin_havoc(cx, node)? {
                    return Ok(out);
                }
                let modifies = self.visit_exprs(cx, modifies)?;
                self.finish_havoc(cx, node, modifies)
            }
            ActionKind::If { test, then, els } => {
                if let Some(out) = self.begin_if(cx, node)? {
                    return Ok(out);
                }
                let test = self.visit_expr(cx, test)?;
                let then = self.visit_action(cx, then)?;
                let els = match els {
                    Some(els) => Some(self.visit_action(cx, els)?),
                    None => None,
                };
                self.finish_if(cx, node, test, then, els)
            }
            ActionKind::Init { params, body } => {
                if let Some(out) = self.begin_init(cx, node)? {
                    return Ok(out);
                }
                let mut scope = cx.enter(names(params));
                let body = self.visit_action(&mut scope, body)?;
                self.finish_init(&mut scope, node, body)
            }
            ActionKind::Let { vars, body } => {
                if let Some(out) = self.begin_let(cx, node)? {
                    return Ok(out);
                }
                let mut scope = cx.enter(names(vars));
                let body = self.visit_action(&mut scope, body)?;
                self.finish_let(&mut scope, node, body)
            }
            ActionKind::Native { args, .. } => {
                if let Some(out) = self.begin_native_action(cx, node)? {
                    return Ok(out);
                }
                let args = self.visit_exprs(cx, args)?;
                self.finish_native_action(cx, node, args)
            }
            ActionKind::Sequence(stmts) => {
                if let Some(out) = self.begin_sequence(cx, node)? {
                    return Ok(out);
                }
                let stmts = stmts
                    .iter()
                    .map(|s| self.visit_action(cx, s))
                    .collect::<PassResult<Vec<_>>>()?;
                self.finish_sequence(cx, node, stmts)
            }
            ActionKind::While {
                test,
                decreases,
                body,
            } => {
                if let Some(out) = self.begin_while(cx, node)? {
                    return Ok(out);
                }
                let test = self.visit_expr(cx, test)?;
                let decreases = match decreases {
                    Some(d) => Some(self.visit_expr(cx, d)?),
                    None => None,
                };
                let body = self.visit_action(cx, body)?;
                self.finish_while(cx, node, test, decreases, body)
            }
        }
    }

    fn visit_action_def(
        &mut self,
        cx: &mut Context,
        name: &str,
        def: &ActionDefinition,
    ) -> PassResult<ActionDefOut<Self>> {
        if let Some(out) = self.begin_action_def(cx, name, def)? {
            return Ok(out);
        }
        let mut scope =
            cx.enter(names(&def.formal_params).chain(names(&def.formal_returns)));
        let body = self.visit_action(&mut scope, &def.body)?;
        self.finish_action_def(&mut scope, name, def, body)
    }

    fn visit_function_def(
        &mut self,
        cx: &mut Context,
        name: &str,
        def: &FunctionDefinition,
    ) -> PassResult<FunctionDefOut<Self>> {
        if let Some(out) = self.begin_function_def(cx, name, def)? {
            return Ok(out);
        }
        let mut scope = cx.enter(names(&def.formal_params));
        let body = self.visit_expr(&mut scope, &def.body)?;
        self.finish_function_def(&mut scope, name, def, body)
    }

    /// Visits initializers, action definitions, function definitions and conjectures, in
    /// that order, after loading the program's sort table and individuals into `cx`.
    fn visit_program(
        &mut self,
        cx: &mut Context,
        prog: &Program,
    ) -> PassResult<Visited<Self::Mode>> {
        self.begin_program(cx, prog)?;
        cx.load_program(prog);

        let inits = prog
            .inits
            .iter()
            .map(|a| self.visit_action(cx, a))
            .collect::<PassResult<Vec<_>>>()?;

        let mut actions = Vec::with_capacity(prog.actions.len());
        for binding in &prog.actions {
            let out = self.visit_action_def(cx, &binding.name, &binding.decl)?;
            actions.push(Binding::new(binding.name.clone(), out));
        }

        let mut functions = Vec::with_capacity(prog.functions.len());
        for binding in &prog.functions {
            let out = self.visit_function_def(cx, &binding.name, &binding.decl)?;
            functions.push(Binding::new(binding.name.clone(), out));
        }

        let mut conjectures = Vec::with_capacity(prog.conjectures.len());
        for binding in &prog.conjectures {
            let out = self.visit_expr(cx, &binding.decl)?;
            conjectures.push(Binding::new(binding.name.clone(), out));
        }

        Ok(Visited {
            inits,
            actions,
            functions,
            conjectures,
        })
    }
}
