#![forbid(unsafe_code)]

//! Builds a [`Program`] from a type-checked module handed over by the front end.

use std::collections::BTreeMap;

use porter_ast::{
    Action, ActionDefKind, ActionDefinition, ActionKind, Binding, Expr, ExprKind,
    FunctionDefinition, Position, Program, Sort,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PassError, PassResult};
use crate::reinterpret::reinterpret_program;
use crate::visit::{Context, Rewrite, TermVisitor};

/// A named action as the front end checked it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckedAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    #[serde(default)]
    pub formal_params: Vec<Binding<Sort>>,
    #[serde(default)]
    pub formal_returns: Vec<Binding<Sort>>,
    pub body: Action,
}

/// An algebraic definition `lhs = rhs`, where `lhs` applies the defined symbol to its
/// parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    pub lhs: Expr,
    pub rhs: Expr,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckedModule {
    #[serde(default)]
    pub sorts: BTreeMap<String, Sort>,
    /// Record sorts and their field accessors, in declaration order.
    #[serde(default)]
    pub sort_destructors: BTreeMap<String, Vec<Binding<Sort>>>,
    /// Declared foreign types; each value is a `Native` sort.
    #[serde(default)]
    pub native_types: BTreeMap<String, Sort>,
    #[serde(default)]
    pub symbols: Vec<Binding<Sort>>,
    #[serde(default)]
    pub initializers: Vec<Action>,
    #[serde(default)]
    pub actions: Vec<Binding<CheckedAction>>,
    #[serde(default)]
    pub definitions: Vec<Definition>,
    #[serde(default)]
    pub conjectures: Vec<Binding<Expr>>,
}

impl CheckedModule {
    /// Parses a module without a nesting limit; deep formulas grow the stack on demand.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut de = serde_json::Deserializer::from_str(text);
        de.disable_recursion_limit();
        let module = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(module)
    }
}

/// Lifts `r(.., X, ..) := e` into logical assignments throughout an action tree.
struct LiftLogicalAssigns;

impl TermVisitor for LiftLogicalAssigns {
    type Mode = Rewrite;

    fn finish_assign(
        &mut self,
        _cx: &mut Context,
        node: &Action,
        lhs: Expr,
        rhs: Expr,
    ) -> PassResult<Action> {
        Ok(Action {
            pos: node.pos.clone(),
            sort: node.sort.clone(),
            kind: ActionKind::Assign { lhs, rhs },
        }
        .lift_logical_assign())
    }
}

fn lift_assigns(cx: &mut Context, act: &Action) -> PassResult<Action> {
    LiftLogicalAssigns.visit_action(cx, act)
}

fn function_def(defn: &Definition) -> PassResult<Option<Binding<FunctionDefinition>>> {
    let ExprKind::Apply { relsym, args } = &defn.lhs.kind else {
        return Err(PassError::invariant(format!(
            "definition left side `{}` is not an application",
            defn.lhs
        )));
    };
    if relsym == "<" {
        return Ok(None);
    }

    let mut formal_params = Vec::with_capacity(args.len());
    for arg in args {
        match &arg.kind {
            ExprKind::Constant(rep) | ExprKind::Var(rep) => {
                let sort = arg.sort.clone().unwrap_or(Sort::Top);
                formal_params.push(Binding::new(rep.clone(), sort));
            }
            _ => {
                return Err(PassError::invariant(format!(
                    "parameter `{arg}` of definition `{relsym}` is not a variable or constant"
                )));
            }
        }
    }

    // Native bodies cannot be sort-checked by the front end; they take the defined range.
    let mut body = defn.rhs.clone();
    if matches!(body.kind, ExprKind::Native { .. }) && matches!(body.sort, None | Some(Sort::Top)) {
        body.sort = defn.lhs.sort.clone();
    }

    Ok(Some(Binding::new(
        relsym.clone(),
        FunctionDefinition {
            pos: defn.pos.clone(),
            formal_params,
            body,
        },
    )))
}

/// Turns a checked module into a [`Program`]: record and native sorts are resolved, action
/// kinds follow their names, logical assignments are lifted and definitions become
/// function definitions.
pub fn assemble_program(module: &CheckedModule, max_depth: usize) -> PassResult<Program> {
    let mut sorts = BTreeMap::new();
    let mut remap = BTreeMap::new();
    for (name, sort) in module.sorts.iter().chain(&module.native_types) {
        let sort = match module.sort_destructors.get(name) {
            Some(fields) => Sort::Record {
                name: name.clone(),
                fields: fields.clone(),
            },
            None => sort.clone(),
        };
        if matches!(sort, Sort::Record { .. } | Sort::Native { .. }) {
            remap.insert(name.clone(), sort.clone());
        }
        sorts.insert(name.clone(), sort);
    }
    for (name, fields) in &module.sort_destructors {
        if !sorts.contains_key(name) {
            let record = Sort::Record {
                name: name.clone(),
                fields: fields.clone(),
            };
            remap.insert(name.clone(), record.clone());
            sorts.insert(name.clone(), record);
        }
    }

    let mut cx = Context::with_max_depth(max_depth);
    let inits = module
        .initializers
        .iter()
        .map(|a| lift_assigns(&mut cx, a))
        .collect::<PassResult<Vec<_>>>()?;

    let mut actions = Vec::with_capacity(module.actions.len());
    for Binding { name, decl } in &module.actions {
        let kind = ActionDefKind::from_name(name);
        debug!(action = %name, ?kind, "assembling action");
        actions.push(Binding::new(
            name.clone(),
            ActionDefinition {
                pos: decl.pos.clone(),
                kind,
                formal_params: decl.formal_params.clone(),
                formal_returns: decl.formal_returns.clone(),
                body: lift_assigns(&mut cx, &decl.body)?,
            },
        ));
    }

    let mut functions = Vec::new();
    for defn in &module.definitions {
        if let Some(f) = function_def(defn)? {
            functions.push(f);
        }
    }

    let prog = Program {
        sorts,
        individuals: module.symbols.clone(),
        inits,
        actions,
        functions,
        conjectures: module.conjectures.clone(),
    };
    let prog = reinterpret_program(&prog, &remap, max_depth)?;
    info!(
        sorts = prog.sorts.len(),
        actions = prog.actions.len(),
        functions = prog.functions.len(),
        "assembled program"
    );
    Ok(prog)
}
