#![forbid(unsafe_code)]

//! Finite iteration plans for quantified variables.
//!
//! Target code cannot range over a symbolic domain, so every variable bound by `exists`,
//! `forall` or `some` must be given either a closed numeric interval, a relation whose
//! current contents it can be drawn from, or an intrinsically finite sort.

use std::cmp::Ordering;

use porter_ast::{BinOp, Binding, Expr, ExprKind, Program, SomeStrategy, Sort, UnaryOp, names};
use serde::Serialize;
use tracing::debug;

use crate::error::{PassError, PassResult};
use crate::visit::{Analysis, Context, Strict, TermVisitor};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Polarity {
    Forall,
    Exists,
}

impl Polarity {
    pub fn flip(self) -> Self {
        match self {
            Polarity::Forall => Polarity::Exists,
            Polarity::Exists => Polarity::Forall,
        }
    }
}

/// Rewrites `a > b` as `b < a` and `a >= b` as `b <= a`. Other expressions are returned as is.
pub fn le_order(expr: &Expr) -> Expr {
    match &expr.kind {
        ExprKind::BinOp { lhs, op, rhs } if matches!(op, BinOp::Gt | BinOp::Ge) => {
            let op = if *op == BinOp::Gt { BinOp::Lt } else { BinOp::Le };
            Expr {
                pos: expr.pos.clone(),
                sort: expr.sort.clone(),
                kind: ExprKind::BinOp {
                    lhs: rhs.clone(),
                    op,
                    rhs: lhs.clone(),
                },
            }
        }
        _ => expr.clone(),
    }
}

/// Collects the subformulas of a quantifier body that can bound `var` under `polarity`.
///
/// Every expression kind is handled in a begin hook, so the strict finish defaults are
/// never reached.
pub struct BoundExprs<'a> {
    var: &'a str,
    polarity: Polarity,
}

impl<'a> BoundExprs<'a> {
    pub fn new(var: &'a str, polarity: Polarity) -> Self {
        Self { var, polarity }
    }

    fn flipped(&self) -> BoundExprs<'a> {
        BoundExprs {
            var: self.var,
            polarity: self.polarity.flip(),
        }
    }
}

impl TermVisitor for BoundExprs<'_> {
    type Mode = Strict<Vec<Expr>>;

    fn constant(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Vec<Expr>> {
        Ok(Vec::new())
    }

    fn var(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Vec<Expr>> {
        Ok(Vec::new())
    }

    fn begin_apply(&mut self, _cx: &mut Context, node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        let ExprKind::Apply { args, .. } = &node.kind else {
            return Ok(Some(Vec::new()));
        };
        if args.iter().any(|a| a.as_var() == Some(self.var)) {
            Ok(Some(vec![node.clone()]))
        } else {
            Ok(Some(Vec::new()))
        }
    }

    fn begin_binop(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        let ExprKind::BinOp { lhs, op, rhs } = &node.kind else {
            return Ok(Some(Vec::new()));
        };
        let found = match (op, self.polarity) {
            (BinOp::And, Polarity::Exists) | (BinOp::Or, Polarity::Forall) => {
                let mut found = self.visit_expr(cx, lhs)?;
                found.extend(self.visit_expr(cx, rhs)?);
                found
            }
            (BinOp::Implies, Polarity::Forall) => {
                let mut found = self.flipped().visit_expr(cx, lhs)?;
                found.extend(self.visit_expr(cx, rhs)?);
                found
            }
            (op, _) if op.is_ordering() => vec![le_order(node)],
            _ => Vec::new(),
        };
        Ok(Some(found))
    }

    fn begin_unop(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        match &node.kind {
            ExprKind::UnOp {
                op: UnaryOp::Not,
                expr,
            } => Ok(Some(self.flipped().visit_expr(cx, expr)?)),
            _ => Ok(Some(Vec::new())),
        }
    }

    fn begin_field_access(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }

    fn begin_ite(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }

    fn begin_exists(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }

    fn begin_forall(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }

    fn begin_some(&mut self, _cx: &mut Context, _node: &Expr) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }

    fn begin_native_expr(
        &mut self,
        _cx: &mut Context,
        _node: &Expr,
    ) -> PassResult<Option<Vec<Expr>>> {
        Ok(Some(Vec::new()))
    }
}

/// One end of a numeric interval.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Bound {
    Lit(i64),
    /// A program constant or outer variable, shifted by `offset`.
    Sym { name: String, offset: i64 },
}

impl Bound {
    fn sym(name: &str, offset: i64) -> Self {
        Bound::Sym {
            name: name.to_string(),
            offset,
        }
    }
}

// Literals are preferred over symbols; two symbols are ordered by name so the choice
// does not depend on the order candidates are seen in.
fn preference(a: &Bound, b: &Bound, tighter: Ordering) -> Ordering {
    match (a, b) {
        (Bound::Lit(x), Bound::Lit(y)) => {
            if tighter == Ordering::Greater {
                x.cmp(y)
            } else {
                y.cmp(x)
            }
        }
        (Bound::Lit(_), Bound::Sym { .. }) => Ordering::Greater,
        (Bound::Sym { .. }, Bound::Lit(_)) => Ordering::Less,
        (
            Bound::Sym {
                name: n1,
                offset: o1,
            },
            Bound::Sym {
                name: n2,
                offset: o2,
            },
        ) => n2.cmp(n1).then(if tighter == Ordering::Greater {
            o1.cmp(o2)
        } else {
            o2.cmp(o1)
        }),
    }
}

fn tighter(a: Option<Bound>, b: Option<Bound>, direction: Ordering) -> Option<Bound> {
    match (a, b) {
        (None, b) => b,
        (a, None) => a,
        (Some(a), Some(b)) => {
            if preference(&a, &b, direction) == Ordering::Less {
                Some(b)
            } else {
                Some(a)
            }
        }
    }
}

/// `lo..=hi`; `None` leaves that side unbounded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NumericInterval {
    pub lo: Option<Bound>,
    pub hi: Option<Bound>,
}

impl NumericInterval {
    pub fn new(lo: Option<Bound>, hi: Option<Bound>) -> Self {
        Self { lo, hi }
    }

    /// The interval a declared sort allows: a bounded number seeds its bounds, every other
    /// sort is unbounded.
    pub fn from_sort(sort: &Sort) -> Self {
        match sort {
            Sort::Number { lo, hi, .. } => Self {
                lo: lo.map(Bound::Lit),
                hi: hi.map(Bound::Lit),
            },
            _ => Self::default(),
        }
    }

    /// Intersection: the larger lower bound and the smaller upper bound.
    pub fn meet(self, other: NumericInterval) -> NumericInterval {
        NumericInterval {
            lo: tighter(self.lo, other.lo, Ordering::Greater),
            hi: tighter(self.hi, other.hi, Ordering::Less),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lo.is_some() && self.hi.is_some()
    }
}

/// Where an application candidate lets a variable be drawn from.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppSource {
    pub relsym: String,
    pub app: Expr,
    /// One entry per argument: the variable iterated at that position, or `None` when the
    /// argument is already bound.
    pub var_args: Vec<Option<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum BoundPlan {
    Interval(NumericInterval),
    /// Iterate the union of the projections of every source onto the variable.
    AppIteration(Vec<AppSource>),
    /// Enumerate a finite sort.
    Domain(Sort),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VarBounds {
    pub var: String,
    pub plan: BoundPlan,
}

/// The bound candidates for one variable of a quantifier body.
pub fn bound_exprs(
    cx: &mut Context,
    var: &str,
    polarity: Polarity,
    body: &Expr,
) -> PassResult<Vec<Expr>> {
    BoundExprs::new(var, polarity).visit_expr(cx, body)
}

fn resolve_sort(cx: &Context, sort: &Sort) -> Sort {
    match sort {
        Sort::Uninterpreted(name) => cx.sort_named(name).cloned().unwrap_or_else(|| sort.clone()),
        _ => sort.clone(),
    }
}

fn is_finite_sort(sort: &Sort) -> bool {
    match sort {
        Sort::Bool | Sort::BitVec(_) | Sort::Enum { .. } => true,
        Sort::Number { lo, hi, .. } => lo.is_some() && hi.is_some(),
        _ => false,
    }
}

/// Reads the other side of a comparison as a bound. `outer` holds the names visible outside
/// the quantifier.
fn bound_from_side(side: &Expr, outer: &Context, offset: i64) -> Option<Bound> {
    if let Some(n) = side.as_int() {
        return n.checked_add(offset).map(Bound::Lit);
    }
    match &side.kind {
        ExprKind::Constant(name) if outer.in_scope(name) || numeric_individual(outer, name) => {
            Some(Bound::sym(name, offset))
        }
        ExprKind::Var(name) if outer.in_scope(name) => Some(Bound::sym(name, offset)),
        _ => None,
    }
}

/// Whether a global could bound a number. Undeclared names are given the benefit of the doubt.
fn numeric_individual(cx: &Context, name: &str) -> bool {
    cx.individual(name)
        .is_none_or(|sort| resolve_sort(cx, sort).is_numeric())
}

fn interval_from_candidate(var: &str, cand: &Expr, outer: &Context) -> Option<NumericInterval> {
    let ExprKind::BinOp { lhs, op, rhs } = &cand.kind else {
        return None;
    };
    let strict = match op {
        BinOp::Lt => true,
        BinOp::Le => false,
        _ => return None,
    };
    if lhs.as_var() == Some(var) {
        let hi = bound_from_side(rhs, outer, if strict { -1 } else { 0 })?;
        Some(NumericInterval::new(None, Some(hi)))
    } else if rhs.as_var() == Some(var) {
        let lo = bound_from_side(lhs, outer, if strict { 1 } else { 0 })?;
        Some(NumericInterval::new(Some(lo), None))
    } else {
        None
    }
}

fn source_from_candidate(var: &str, cand: &Expr) -> Option<AppSource> {
    let ExprKind::Apply { relsym, args } = &cand.kind else {
        return None;
    };
    let var_args = args
        .iter()
        .map(|a| a.as_var().filter(|n| *n == var).map(str::to_string))
        .collect();
    Some(AppSource {
        relsym: relsym.clone(),
        app: cand.clone(),
        var_args,
    })
}

/// Plans every variable bound by a quantifier. `fmla` must be an `exists`, `forall` or
/// `some` expression; `cx` describes the scope the quantifier appears in.
pub fn bounds_for_quantifier(cx: &mut Context, fmla: &Expr) -> PassResult<Vec<VarBounds>> {
    let (vars, body, polarity) = match &fmla.kind {
        ExprKind::Exists { vars, body } => (vars, body, Polarity::Exists),
        ExprKind::Forall { vars, body } => (vars, body, Polarity::Forall),
        ExprKind::Some { vars, fmla, .. } => (vars, fmla, Polarity::Exists),
        _ => {
            return Err(PassError::invariant(format!(
                "bounds requested for non-quantifier {}",
                fmla.kind_name()
            )));
        }
    };

    let outer = cx.clone();
    let mut scope = cx.enter(names(vars));
    let mut out: Vec<VarBounds> = Vec::with_capacity(vars.len());

    for Binding { name, decl } in vars {
        if out.iter().any(|vb| &vb.var == name) {
            continue;
        }
        let sort = resolve_sort(&scope, decl);
        let candidates = bound_exprs(&mut scope, name, polarity, body)?;

        let mut interval = NumericInterval::from_sort(&sort);
        let mut sources = Vec::new();
        for cand in &candidates {
            if let Some(found) = interval_from_candidate(name, cand, &outer) {
                interval = interval.meet(found);
            } else if let Some(src) = source_from_candidate(name, cand) {
                sources.push(src);
            }
        }

        let plan = if interval.is_finite() {
            BoundPlan::Interval(interval)
        } else if !sources.is_empty() {
            BoundPlan::AppIteration(sources)
        } else if is_finite_sort(&sort) {
            BoundPlan::Domain(sort)
        } else {
            return Err(PassError::UnboundedVariable {
                var: name.clone(),
                formula: fmla.to_string(),
            });
        };
        debug!(var = %name, ?plan, "bounded quantified variable");
        out.push(VarBounds {
            var: name.clone(),
            plan,
        });
    }
    Ok(out)
}

/// How generated code combines the iterations of one quantifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Reduction {
    Any,
    All,
    First(SomeStrategy),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantifierPlan {
    pub formula: String,
    pub reduction: Reduction,
    /// Outermost first; codegen nests the last variable innermost.
    pub vars: Vec<VarBounds>,
}

pub fn plan_quantifier(cx: &mut Context, fmla: &Expr) -> PassResult<QuantifierPlan> {
    let reduction = match &fmla.kind {
        ExprKind::Exists { .. } => Reduction::Any,
        ExprKind::Forall { .. } => Reduction::All,
        ExprKind::Some { strategy, .. } => Reduction::First(*strategy),
        _ => {
            return Err(PassError::invariant(format!(
                "cannot plan {} as a quantifier",
                fmla.kind_name()
            )));
        }
    };
    let vars = bounds_for_quantifier(cx, fmla)?;
    Ok(QuantifierPlan {
        formula: fmla.to_string(),
        reduction,
        vars,
    })
}

#[derive(Default)]
struct QuantifierPlans {
    plans: Vec<QuantifierPlan>,
}

impl QuantifierPlans {
    // Begin hooks run before the binder's frame is opened, so `cx` is the enclosing scope.
    fn record(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<()>> {
        self.plans.push(plan_quantifier(cx, node)?);
        Ok(None)
    }
}

impl TermVisitor for QuantifierPlans {
    type Mode = Analysis;

    fn begin_exists(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<()>> {
        self.record(cx, node)
    }

    fn begin_forall(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<()>> {
        self.record(cx, node)
    }

    fn begin_some(&mut self, cx: &mut Context, node: &Expr) -> PassResult<Option<()>> {
        self.record(cx, node)
    }
}

/// A plan for every quantifier in the program, outer quantifiers before the ones they enclose.
pub fn plan_program_quantifiers(
    prog: &Program,
    max_depth: usize,
) -> PassResult<Vec<QuantifierPlan>> {
    let mut planner = QuantifierPlans::default();
    let mut cx = Context::with_max_depth(max_depth);
    planner.visit_program(&mut cx, prog)?;
    debug!(count = planner.plans.len(), "planned quantifiers");
    Ok(planner.plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(n: i64) -> Option<Bound> {
        Some(Bound::Lit(n))
    }

    fn le(a: Expr, b: Expr) -> Expr {
        Expr::binop(a, BinOp::Le, b)
    }

    #[test]
    fn gt_is_reordered() {
        let e = Expr::binop(Expr::var("X"), BinOp::Gt, Expr::constant("3"));
        assert_eq!(
            le_order(&e),
            Expr::binop(Expr::constant("3"), BinOp::Lt, Expr::var("X"))
        );
    }

    #[test]
    fn conjunction_is_not_informative_under_forall() {
        let body = Expr::binop(
            le(Expr::constant("0"), Expr::var("X")),
            BinOp::And,
            le(Expr::var("X"), Expr::constant("10")),
        );
        let mut cx = Context::new();
        assert!(
            bound_exprs(&mut cx, "X", Polarity::Forall, &body)
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            bound_exprs(&mut cx, "X", Polarity::Exists, &body)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn implication_flips_antecedent() {
        // forall X. (X < 5) -> p(X): the antecedent is read under exists polarity.
        let body = Expr::binop(
            Expr::binop(Expr::var("X"), BinOp::Lt, Expr::constant("5")),
            BinOp::Implies,
            Expr::apply("p", vec![Expr::var("X")]),
        );
        let mut cx = Context::new();
        let found = bound_exprs(&mut cx, "X", Polarity::Forall, &body).unwrap();
        assert_eq!(found.len(), 2);
        assert!(matches!(found[1].kind, ExprKind::Apply { .. }));
    }

    #[test]
    fn negation_flips_polarity() {
        // ~(A | B) under exists behaves like a disjunction under forall.
        let body = Expr::not(Expr::binop(
            le(Expr::var("X"), Expr::constant("1")),
            BinOp::Or,
            le(Expr::var("X"), Expr::constant("2")),
        ));
        let mut cx = Context::new();
        assert_eq!(
            bound_exprs(&mut cx, "X", Polarity::Exists, &body)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn strict_comparisons_shift_by_one() {
        let cx = Context::new();
        let hi = Expr::binop(Expr::var("X"), BinOp::Lt, Expr::constant("10"));
        let lo = Expr::binop(Expr::constant("2"), BinOp::Lt, Expr::var("X"));
        assert_eq!(
            interval_from_candidate("X", &hi, &cx),
            Some(NumericInterval::new(None, lit(9)))
        );
        assert_eq!(
            interval_from_candidate("X", &lo, &cx),
            Some(NumericInterval::new(lit(3), None))
        );
    }

    #[test]
    fn symbolic_bound_from_program_constant() {
        let cx = Context::new();
        let cand = Expr::binop(Expr::var("I"), BinOp::Lt, Expr::constant("len"));
        assert_eq!(
            interval_from_candidate("I", &cand, &cx),
            Some(NumericInterval::new(None, Some(Bound::sym("len", -1))))
        );
    }

    #[test]
    fn only_numeric_individuals_bound() {
        let mut cx = Context::new();
        cx.load_program(&Program {
            sorts: [(
                "idx".to_string(),
                Sort::Number {
                    name: "idx".into(),
                    lo: Some(0),
                    hi: Some(7),
                },
            )]
            .into(),
            individuals: vec![
                Binding::new("last", Sort::Uninterpreted("idx".into())),
                Binding::new("leader", Sort::Uninterpreted("node".into())),
            ],
            ..Program::default()
        });
        let below = |c: &str| Expr::binop(Expr::var("I"), BinOp::Le, Expr::constant(c));
        assert_eq!(
            interval_from_candidate("I", &below("last"), &cx),
            Some(NumericInterval::new(None, Some(Bound::sym("last", 0))))
        );
        assert_eq!(interval_from_candidate("I", &below("leader"), &cx), None);
    }

    #[test]
    fn meet_prefers_literals_and_tightest() {
        let a = NumericInterval::new(lit(0), Some(Bound::sym("n", 0)));
        let b = NumericInterval::new(lit(3), lit(10));
        assert_eq!(a.clone().meet(b.clone()), NumericInterval::new(lit(3), lit(10)));
        assert_eq!(b.meet(a), NumericInterval::new(lit(3), lit(10)));
    }

    #[test]
    fn app_candidate_marks_iterated_positions() {
        let app = Expr::apply("link", vec![Expr::var("X"), Expr::constant("y")]);
        let src = source_from_candidate("X", &app).unwrap();
        assert_eq!(src.relsym, "link");
        assert_eq!(src.var_args, vec![Some("X".to_string()), None]);
    }
}
