#![forbid(unsafe_code)]

mod assemble;
mod error;
mod freevars;
mod pipeline;
mod reinterpret;
pub mod bounds;
pub mod config;
pub mod extensionality;
pub mod native;
pub mod visit;

pub use assemble::{CheckedAction, CheckedModule, Definition, assemble_program};
pub use bounds::{
    BoundPlan, NumericInterval, Polarity, QuantifierPlan, Reduction, VarBounds,
    bounds_for_quantifier, plan_program_quantifiers, plan_quantifier,
};
pub use config::{ConfigError, PorterConfig};
pub use error::{PassError, PassResult};
pub use extensionality::{NonExtensionals, Violation, non_extensionals};
pub use freevars::{BindVar, FreeVars, bind_var, free_vars};
pub use native::{NativeRewriter, RemapTable, retarget_natives, rewrite_natives};
pub use pipeline::{Analysis, check_sorts_closed, run_pipeline};
pub use reinterpret::{ReinterpretUninterps, SortsOverTerms, reinterpret_program};
