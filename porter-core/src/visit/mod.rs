#![forbid(unsafe_code)]

//! The traversal engine every pass is built on.
//!
//! [`TermVisitor`] walks expressions, actions and whole programs, [`SortVisitor`] walks sorts.
//! Both dispatch exhaustively over their algebra and call a `begin_*` hook before descending
//! into a node's children (returning `Some` short-circuits the subtree) and a `finish_*` hook
//! with the children's results afterwards. What the default `finish_*` hooks do is chosen by
//! the visitor's mode:
//!
//! - [`Strict`]: every default fails with [`PassError::Unimplemented`](crate::PassError).
//! - [`Analysis`]: every default is a no-op returning `()`.
//! - [`Rewrite`]: every default rebuilds an equivalent node from the children's results.
//!
//! Lexical scope and recursion depth live in an explicit [`Context`] threaded through every
//! hook rather than on the visitor itself.

mod sorts;
mod terms;

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use porter_ast::{Action, Binding, Program, Sort};

use crate::error::{PassError, PassResult};

pub use sorts::{SortMode, SortOut, SortParts, SortVisitor};
pub use terms::{
    ActionOut, ActionParts, ExprOut, ExprParts, TermMode, TermVisitor, Visited, rewrite_program,
};

pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Failing defaults: every unhandled node kind is an error.
pub struct Strict<E, A = ()>(PhantomData<fn() -> (E, A)>);

/// No-op defaults producing `()`.
pub struct Analysis;

/// Reconstructing defaults producing the same algebra.
pub struct Rewrite;

/// Traversal state threaded through every hook.
#[derive(Clone, Debug)]
pub struct Context {
    scopes: Vec<Vec<String>>,
    sorts: BTreeMap<String, Sort>,
    individuals: Vec<Binding<Sort>>,
    initializers: Vec<Action>,
    depth: usize,
    max_depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        let mut sorts = BTreeMap::new();
        // Sub-programs and standalone formulas are analysed without a full sort table.
        sorts.insert("int".to_string(), Sort::int_sort());
        sorts.insert("nat".to_string(), Sort::nat_sort());
        sorts.insert("bool".to_string(), Sort::Bool);
        Self {
            scopes: Vec::new(),
            sorts,
            individuals: Vec::new(),
            initializers: Vec::new(),
            depth: 0,
            max_depth,
        }
    }

    /// Makes the program's sort table, individuals and initializers visible to hooks.
    pub fn load_program(&mut self, prog: &Program) {
        for (name, sort) in &prog.sorts {
            self.sorts.insert(name.clone(), sort.clone());
        }
        self.individuals = prog.individuals.clone();
        self.initializers = prog.inits.clone();
    }

    pub fn in_scope(&self, name: &str) -> bool {
        self.scopes
            .iter()
            .rev()
            .any(|frame| frame.iter().any(|n| n == name))
    }

    /// Number of binder frames currently open.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn sort_named(&self, name: &str) -> Option<&Sort> {
        self.sorts.get(name)
    }

    pub fn sorts(&self) -> &BTreeMap<String, Sort> {
        &self.sorts
    }

    /// The declared sort of a global individual.
    pub fn individual(&self, name: &str) -> Option<&Sort> {
        self.individuals
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.decl)
    }

    pub fn initializers(&self) -> &[Action] {
        &self.initializers
    }

    /// Opens a binder frame holding `names`; the frame closes when the guard drops.
    pub fn enter<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Frame<'_> {
        let saved_scopes = self.scopes.len();
        let saved_depth = self.depth;
        self.scopes
            .push(names.into_iter().map(str::to_string).collect());
        Frame {
            cx: self,
            saved_scopes,
            saved_depth,
        }
    }

    /// Steps one level deeper into the tree.
    pub fn descend(&mut self) -> PassResult<Frame<'_>> {
        if self.depth >= self.max_depth {
            return Err(PassError::RecursionLimit {
                limit: self.max_depth,
            });
        }
        let saved_scopes = self.scopes.len();
        let saved_depth = self.depth;
        self.depth += 1;
        Ok(Frame {
            cx: self,
            saved_scopes,
            saved_depth,
        })
    }
}

/// Restores the scope stack and depth of the [`Context`] it was opened on when dropped,
/// whichever way the traversal leaves.
pub struct Frame<'a> {
    cx: &'a mut Context,
    saved_scopes: usize,
    saved_depth: usize,
}

impl Deref for Frame<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.cx
    }
}

impl DerefMut for Frame<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.cx
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.cx.scopes.truncate(self.saved_scopes);
        self.cx.depth = self.saved_depth;
    }
}
