#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use porter_ast::{Program, Sort};
use tracing::warn;

use crate::error::PassResult;
use crate::visit::{Context, Rewrite, SortVisitor, TermVisitor, rewrite_program};

/// Replaces `Uninterpreted(name)` by the sort `name` is mapped to, recursively.
///
/// A name reached again while its own replacement is being expanded is left
/// uninterpreted.
pub struct ReinterpretUninterps<'a> {
    mapping: &'a BTreeMap<String, Sort>,
    expanding: Vec<String>,
}

impl<'a> ReinterpretUninterps<'a> {
    pub fn new(mapping: &'a BTreeMap<String, Sort>) -> Self {
        Self {
            mapping,
            expanding: Vec::new(),
        }
    }
}

impl SortVisitor for ReinterpretUninterps<'_> {
    type Mode = Rewrite;

    fn uninterpreted(&mut self, node: &Sort) -> PassResult<Sort> {
        let Sort::Uninterpreted(name) = node else {
            return Ok(node.clone());
        };
        let mapping = self.mapping;
        let Some(target) = mapping.get(name) else {
            return Ok(node.clone());
        };
        if self.expanding.iter().any(|n| n == name) {
            warn!(sort = %name, "cyclic sort reinterpretation, leaving it uninterpreted");
            return Ok(node.clone());
        }
        self.expanding.push(name.clone());
        let out = self.visit_sort(target);
        self.expanding.pop();
        out
    }
}

/// Lifts a rewriting sort visitor over a whole program: the sort table, individuals,
/// definition signatures, binder sorts and node annotations.
pub struct SortsOverTerms<S> {
    sorts: S,
}

impl<S: SortVisitor<Mode = Rewrite>> SortsOverTerms<S> {
    pub fn new(sorts: S) -> Self {
        Self { sorts }
    }
}

impl<S: SortVisitor<Mode = Rewrite>> TermVisitor for SortsOverTerms<S> {
    type Mode = Rewrite;

    fn rewrite_sort(&mut self, _cx: &mut Context, sort: &Sort) -> PassResult<Sort> {
        self.sorts.visit_sort(sort)
    }
}

pub fn rewrite_program_sorts<S: SortVisitor<Mode = Rewrite>>(
    prog: &Program,
    sorts: S,
    max_depth: usize,
) -> PassResult<Program> {
    let mut over = SortsOverTerms::new(sorts);
    rewrite_program(&mut over, &mut Context::with_max_depth(max_depth), prog)
}

pub fn reinterpret_program(
    prog: &Program,
    mapping: &BTreeMap<String, Sort>,
    max_depth: usize,
) -> PassResult<Program> {
    rewrite_program_sorts(prog, ReinterpretUninterps::new(mapping), max_depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use porter_ast::Binding;

    #[test]
    fn nested_names_are_reinterpreted() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "pt".to_string(),
            Sort::Record {
                name: "pt".into(),
                fields: vec![Binding::new("x", Sort::Uninterpreted("coord".into()))],
            },
        );
        mapping.insert("coord".to_string(), Sort::int_sort());
        let out = ReinterpretUninterps::new(&mapping)
            .visit_sort(&Sort::function(
                vec![Sort::Uninterpreted("pt".into())],
                Sort::Bool,
            ))
            .unwrap();
        assert_eq!(
            out,
            Sort::function(
                vec![Sort::Record {
                    name: "pt".into(),
                    fields: vec![Binding::new("x", Sort::int_sort())],
                }],
                Sort::Bool
            )
        );
    }

    #[test]
    fn cycles_are_cut() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "list".to_string(),
            Sort::Record {
                name: "list".into(),
                fields: vec![Binding::new("next", Sort::Uninterpreted("list".into()))],
            },
        );
        let out = ReinterpretUninterps::new(&mapping)
            .visit_sort(&Sort::Uninterpreted("list".into()))
            .unwrap();
        assert_eq!(out, mapping["list"]);
    }
}
