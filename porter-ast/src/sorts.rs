#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{Binding, Position};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sort {
    Uninterpreted(String),
    Bool,
    /// `None` on either side means unbounded in that direction.
    Number {
        name: String,
        lo: Option<i64>,
        hi: Option<i64>,
    },
    BitVec(u32),
    Enum {
        name: String,
        discriminants: Vec<String>,
    },
    Function {
        domain: Vec<Sort>,
        range: Box<Sort>,
    },
    Record {
        name: String,
        fields: Vec<Binding<Sort>>,
    },
    /// A foreign type. `args` parametrize the template (e.g. a container's element type).
    Native {
        position: Position,
        fmt: String,
        args: Vec<Sort>,
    },
    /// Unknown or unit.
    Top,
}

impl Sort {
    pub fn int_sort() -> Self {
        Sort::Number {
            name: "int".to_string(),
            lo: None,
            hi: None,
        }
    }

    pub fn nat_sort() -> Self {
        Sort::Number {
            name: "nat".to_string(),
            lo: Some(0),
            hi: None,
        }
    }

    pub fn function(domain: Vec<Sort>, range: Sort) -> Self {
        Sort::Function {
            domain,
            range: Box::new(range),
        }
    }

    /// The canonical printable name, if the sort has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Sort::Uninterpreted(name)
            | Sort::Number { name, .. }
            | Sort::Enum { name, .. }
            | Sort::Record { name, .. } => Some(name.as_str()),
            Sort::Bool => Some("bool"),
            Sort::BitVec(_) | Sort::Function { .. } | Sort::Native { .. } | Sort::Top => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Sort::Number { .. })
    }

    pub fn display(&self) -> String {
        match self {
            Sort::Uninterpreted(name) => name.clone(),
            Sort::Bool => "bool".to_string(),
            Sort::Number { name, lo, hi } => match (lo, hi) {
                (None, None) => name.clone(),
                _ => {
                    let lo_s = lo.map(|v| v.to_string()).unwrap_or_default();
                    let hi_s = hi.map(|v| v.to_string()).unwrap_or_default();
                    format!("{name}[{lo_s}..{hi_s}]")
                }
            },
            Sort::BitVec(width) => format!("bv[{width}]"),
            Sort::Enum { name, .. } => name.clone(),
            Sort::Function { domain, range } => {
                let dom_s = domain
                    .iter()
                    .map(|d| d.display())
                    .collect::<Vec<_>>()
                    .join(" * ");
                format!("{dom_s} -> {}", range.display())
            }
            Sort::Record { name, .. } => name.clone(),
            Sort::Native { fmt, args, .. } => {
                if args.is_empty() {
                    format!("<<<{fmt}>>>")
                } else {
                    let args_s = args
                        .iter()
                        .map(|a| a.display())
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("<<<{fmt}>>>[{args_s}]")
                }
            }
            Sort::Top => "top".to_string(),
        }
    }
}
