#![forbid(unsafe_code)]

use miette::Diagnostic;
use thiserror::Error;

/// A fatal failure inside a pass. Every pass either completes over the whole program or
/// aborts with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum PassError {
    #[error("no visitor hook implemented for {node} nodes")]
    #[diagnostic(
        code(porter::visit::unimplemented),
        help("override the finish hook for this node kind in the pass")
    )]
    Unimplemented { node: &'static str },

    #[error("no native remapping for {file}:{line} (target `{target}`)")]
    #[diagnostic(
        code(porter::native::missing_mapping),
        help("add a [[targets.{target}.splices]] entry for this file and line")
    )]
    MissingSplice {
        target: String,
        file: String,
        line: u32,
    },

    #[error("cannot bound variable `{var}` in `{formula}`")]
    #[diagnostic(
        code(porter::bounds::unbounded),
        help("compare the variable against a literal or a relation it ranges over")
    )]
    UnboundedVariable { var: String, formula: String },

    #[error("internal invariant violated: {message}")]
    #[diagnostic(code(porter::invariant))]
    Invariant { message: String },

    #[error("traversal exceeded the maximum depth of {limit}")]
    #[diagnostic(
        code(porter::visit::recursion_limit),
        help("raise `max_depth` in porter.toml")
    )]
    RecursionLimit { limit: usize },

    #[error("no native remap table for target `{target}`")]
    #[diagnostic(code(porter::native::unknown_target))]
    UnknownTarget { target: String },
}

impl PassError {
    pub fn invariant(message: impl Into<String>) -> Self {
        PassError::Invariant {
            message: message.into(),
        }
    }
}

pub type PassResult<T> = Result<T, PassError>;
