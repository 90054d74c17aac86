#![forbid(unsafe_code)]

mod program;
mod sorts;
mod terms;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use program::{ActionDefKind, ActionDefinition, FunctionDefinition, Program};
pub use sorts::Sort;
pub use terms::{Action, ActionKind, BinOp, Expr, ExprKind, SomeStrategy, UnaryOp};

/// Where a node came from in the specification source.
///
/// `reference` points at the enclosing position a node was instantiated from (e.g. a module
/// instantiation), so the same fragment can be reported against both sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub filename: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Box<Position>>,
}

impl Position {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Position) -> Self {
        self.reference = Some(Box::new(reference));
        self
    }

    /// The position the text was originally written at.
    pub fn origin(&self) -> &Position {
        match &self.reference {
            Some(r) => r.origin(),
            None => self,
        }
    }

    /// The last path component of `filename`.
    pub fn file_name(&self) -> &str {
        self.filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.filename.as_str())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.line)
    }
}

/// A name paired with a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding<T> {
    pub name: String,
    pub decl: T,
}

impl<T> Binding<T> {
    pub fn new(name: impl Into<String>, decl: T) -> Self {
        Self {
            name: name.into(),
            decl,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Binding<U> {
        Binding {
            name: self.name,
            decl: f(self.decl),
        }
    }
}

pub fn names<T>(bindings: &[Binding<T>]) -> impl Iterator<Item = &str> {
    bindings.iter().map(|b| b.name.as_str())
}
