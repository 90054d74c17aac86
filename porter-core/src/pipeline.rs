#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use porter_ast::{Program, Sort};
use tracing::info;

use crate::bounds::{QuantifierPlan, plan_program_quantifiers};
use crate::config::PorterConfig;
use crate::error::{PassError, PassResult};
use crate::extensionality::{NonExtensionals, non_extensionals};
use crate::native::retarget_natives;
use crate::reinterpret::rewrite_program_sorts;
use crate::visit::{Context, Rewrite, SortVisitor};

/// Fails on the first uninterpreted sort name that the program does not declare.
struct ClosedSorts {
    known: BTreeSet<String>,
}

impl SortVisitor for ClosedSorts {
    type Mode = Rewrite;

    fn uninterpreted(&mut self, node: &Sort) -> PassResult<Sort> {
        match node {
            Sort::Uninterpreted(name) if !self.known.contains(name) => Err(PassError::invariant(
                format!("sort `{name}` is not declared in the sort table"),
            )),
            _ => Ok(node.clone()),
        }
    }
}

/// Checks that every sort name referenced anywhere in `prog` resolves.
pub fn check_sorts_closed(prog: &Program, max_depth: usize) -> PassResult<()> {
    let builtins = Context::new();
    let known = prog
        .sorts
        .keys()
        .chain(builtins.sorts().keys())
        .cloned()
        .collect();
    rewrite_program_sorts(prog, ClosedSorts { known }, max_depth)?;
    Ok(())
}

/// The program as handed to codegen, with what the passes learned about it.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub program: Program,
    /// Native fragments and native sorts retargeted for the configured backend.
    pub natives: usize,
    pub non_extensionals: NonExtensionals,
    max_depth: usize,
}

impl Analysis {
    /// Iteration plans for every quantifier in the program.
    pub fn quantifier_plans(&self) -> PassResult<Vec<QuantifierPlan>> {
        plan_program_quantifiers(&self.program, self.max_depth)
    }
}

/// Runs every pass over `program` for the configured target.
pub fn run_pipeline(program: Program, config: &PorterConfig) -> PassResult<Analysis> {
    let depth = config.max_depth;

    check_sorts_closed(&program, depth)?;
    info!(sorts = program.sorts.len(), "sort table is closed");

    let table = config.remap_table(&config.target);
    let (program, natives) = retarget_natives(&program, &table, depth)?;
    info!(target = %config.target, natives, "rewrote native splices");

    let non_extensionals = non_extensionals(&program, depth)?;
    info!(
        non_extensional = non_extensionals.len(),
        "classified extensionality"
    );

    Ok(Analysis {
        program,
        natives,
        non_extensionals,
        max_depth: depth,
    })
}
