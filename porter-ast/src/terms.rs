#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Binding, Position, Sort};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
    Implies,
    Iff,
}

impl BinOp {
    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "=",
            BinOp::Ne => "~=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Implies => "->",
            BinOp::Iff => "<->",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Which witness a `some` expression should pick when several satisfy its formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SomeStrategy {
    Arbitrary,
    Minimise,
    Maximise,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    /// Filled in by sort propagation; `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    pub kind: ExprKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A non-logical symbol: a literal, a program constant or an in-scope local.
    Constant(String),
    /// A logical variable.
    Var(String),
    Apply {
        relsym: String,
        args: Vec<Expr>,
    },
    BinOp {
        lhs: Box<Expr>,
        op: BinOp,
        rhs: Box<Expr>,
    },
    UnOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    FieldAccess {
        record: Box<Expr>,
        field: String,
    },
    Ite {
        test: Box<Expr>,
        then: Box<Expr>,
        els: Box<Expr>,
    },
    Exists {
        vars: Vec<Binding<Sort>>,
        body: Box<Expr>,
    },
    Forall {
        vars: Vec<Binding<Sort>>,
        body: Box<Expr>,
    },
    Some {
        vars: Vec<Binding<Sort>>,
        fmla: Box<Expr>,
        strategy: SomeStrategy,
    },
    Native {
        lang: String,
        fmt: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            pos: None,
            sort: None,
            kind,
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn constant(rep: impl Into<String>) -> Self {
        Self::new(ExprKind::Constant(rep.into()))
    }

    pub fn var(rep: impl Into<String>) -> Self {
        Self::new(ExprKind::Var(rep.into()))
    }

    pub fn apply(relsym: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Apply {
            relsym: relsym.into(),
            args,
        })
    }

    pub fn binop(lhs: Expr, op: BinOp, rhs: Expr) -> Self {
        Self::new(ExprKind::BinOp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    }

    pub fn not(expr: Expr) -> Self {
        Self::new(ExprKind::UnOp {
            op: UnaryOp::Not,
            expr: Box::new(expr),
        })
    }

    pub fn exists(vars: Vec<Binding<Sort>>, body: Expr) -> Self {
        Self::new(ExprKind::Exists {
            vars,
            body: Box::new(body),
        })
    }

    pub fn forall(vars: Vec<Binding<Sort>>, body: Expr) -> Self {
        Self::new(ExprKind::Forall {
            vars,
            body: Box::new(body),
        })
    }

    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Constant(rep) => Some(rep),
            _ => None,
        }
    }

    /// The integer value of a numeric literal.
    pub fn as_int(&self) -> Option<i64> {
        self.as_constant().and_then(|rep| rep.parse().ok())
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Constant(_) => "Constant",
            ExprKind::Var(_) => "Var",
            ExprKind::Apply { .. } => "Apply",
            ExprKind::BinOp { .. } => "BinOp",
            ExprKind::UnOp { .. } => "UnOp",
            ExprKind::FieldAccess { .. } => "FieldAccess",
            ExprKind::Ite { .. } => "Ite",
            ExprKind::Exists { .. } => "Exists",
            ExprKind::Forall { .. } => "Forall",
            ExprKind::Some { .. } => "Some",
            ExprKind::Native { .. } => "NativeExpr",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    pub kind: ActionKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Assert(Expr),
    Assume(Expr),
    Requires(Expr),
    Ensures(Expr),
    Assign {
        lhs: Expr,
        rhs: Expr,
    },
    /// `relsym(args) := rhs` where some argument is a logical variable, i.e. an update of
    /// every point the variables range over.
    LogicalAssign {
        relsym: String,
        args: Vec<Expr>,
        rhs: Expr,
    },
    /// A procedure call; the expression is an application.
    Call(Expr),
    Debug {
        msg: String,
        args: Vec<Binding<Expr>>,
    },
    Havoc(Vec<Expr>),
    If {
        test: Expr,
        then: Box<Action>,
        els: Option<Box<Action>>,
    },
    Init {
        params: Vec<Binding<Sort>>,
        body: Box<Action>,
    },
    Let {
        vars: Vec<Binding<Sort>>,
        body: Box<Action>,
    },
    Native {
        lang: String,
        fmt: String,
        args: Vec<Expr>,
    },
    Sequence(Vec<Action>),
    While {
        test: Expr,
        decreases: Option<Expr>,
        body: Box<Action>,
    },
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            pos: None,
            sort: None,
            kind,
        }
    }

    pub fn at(mut self, pos: Position) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::new(ActionKind::Assign { lhs, rhs })
    }

    pub fn sequence(stmts: Vec<Action>) -> Self {
        Self::new(ActionKind::Sequence(stmts))
    }

    /// Lifts `r(.., X, ..) := e` into a logical assignment when the left side applies a
    /// relation to at least one logical variable. Any other action is returned unchanged.
    pub fn lift_logical_assign(self) -> Action {
        let Action { pos, sort, kind } = self;
        let kind = match kind {
            ActionKind::Assign { lhs, rhs } => match lhs.kind {
                ExprKind::Apply { relsym, args } if args.iter().any(|a| a.as_var().is_some()) => {
                    ActionKind::LogicalAssign { relsym, args, rhs }
                }
                kind => ActionKind::Assign {
                    lhs: Expr {
                        pos: lhs.pos,
                        sort: lhs.sort,
                        kind,
                    },
                    rhs,
                },
            },
            other => other,
        };
        Action { pos, sort, kind }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ActionKind::Assert(_) => "Assert",
            ActionKind::Assume(_) => "Assume",
            ActionKind::Requires(_) => "Requires",
            ActionKind::Ensures(_) => "Ensures",
            ActionKind::Assign { .. } => "Assign",
            ActionKind::LogicalAssign { .. } => "LogicalAssign",
            ActionKind::Call(_) => "Call",
            ActionKind::Debug { .. } => "Debug",
            ActionKind::Havoc(_) => "Havoc",
            ActionKind::If { .. } => "If",
            ActionKind::Init { .. } => "Init",
            ActionKind::Let { .. } => "Let",
            ActionKind::Native { .. } => "NativeAction",
            ActionKind::Sequence(_) => "Sequence",
            ActionKind::While { .. } => "While",
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_vars(f: &mut fmt::Formatter<'_>, vars: &[Binding<Sort>]) -> fmt::Result {
    for (i, v) in vars.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}:{}", v.name, v.decl.display())?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Constant(rep) | ExprKind::Var(rep) => write!(f, "{rep}"),
            ExprKind::Apply { relsym, args } => {
                write!(f, "{relsym}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::BinOp { lhs, op, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::UnOp { op, expr } => match op {
                UnaryOp::Not => write!(f, "~{expr}"),
                UnaryOp::Neg => write!(f, "-{expr}"),
            },
            ExprKind::FieldAccess { record, field } => write!(f, "{record}.{field}"),
            ExprKind::Ite { test, then, els } => write!(f, "({then} if {test} else {els})"),
            ExprKind::Exists { vars, body } => {
                write!(f, "exists ")?;
                write_vars(f, vars)?;
                write!(f, ". {body}")
            }
            ExprKind::Forall { vars, body } => {
                write!(f, "forall ")?;
                write_vars(f, vars)?;
                write!(f, ". {body}")
            }
            ExprKind::Some { vars, fmla, .. } => {
                write!(f, "some ")?;
                write_vars(f, vars)?;
                write!(f, ". {fmla}")
            }
            ExprKind::Native { fmt: code, args, .. } => {
                write!(f, "<<<{code}>>>(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_assign_with_logical_var() {
        let act = Action::assign(
            Expr::apply("link", vec![Expr::constant("x"), Expr::var("Y")]),
            Expr::constant("false"),
        )
        .lift_logical_assign();
        match act.kind {
            ActionKind::LogicalAssign { relsym, args, rhs } => {
                assert_eq!(relsym, "link");
                assert_eq!(args.len(), 2);
                assert_eq!(rhs, Expr::constant("false"));
            }
            other => panic!("expected a logical assignment, got {other:?}"),
        }
    }

    #[test]
    fn point_assign_is_not_lifted() {
        let act = Action::assign(
            Expr::apply("link", vec![Expr::constant("x"), Expr::constant("y")]),
            Expr::constant("true"),
        );
        assert_eq!(act.clone().lift_logical_assign(), act);
    }

    #[test]
    fn display_is_readable() {
        let e = Expr::forall(
            vec![Binding::new("X", Sort::nat_sort())],
            Expr::binop(Expr::var("X"), BinOp::Le, Expr::constant("10")),
        );
        assert_eq!(e.to_string(), "forall X:nat[0..]. (X <= 10)");
    }
}
