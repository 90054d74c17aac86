#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Action, Binding, Expr, Position, Sort};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionDefKind {
    #[default]
    Normal,
    Exported,
    Imported,
}

impl ActionDefKind {
    /// Classifies a checked action name: `ext:` prefixes are exported, `imp` prefixes
    /// are imported.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("ext:") {
            ActionDefKind::Exported
        } else if name.starts_with("imp") {
            ActionDefKind::Imported
        } else {
            ActionDefKind::Normal
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    #[serde(default)]
    pub kind: ActionDefKind,
    #[serde(default)]
    pub formal_params: Vec<Binding<Sort>>,
    #[serde(default)]
    pub formal_returns: Vec<Binding<Sort>>,
    pub body: Action,
}

impl ActionDefinition {
    /// The function sort from parameter sorts to the (first) return sort.
    pub fn sort(&self) -> Sort {
        let domain = self.formal_params.iter().map(|b| b.decl.clone()).collect();
        let range = self
            .formal_returns
            .first()
            .map(|b| b.decl.clone())
            .unwrap_or(Sort::Top);
        Sort::function(domain, range)
    }
}

/// `f(params) = body`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<Position>,
    #[serde(default)]
    pub formal_params: Vec<Binding<Sort>>,
    pub body: Expr,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Declared sorts by name. Every named sort reachable from the program is in here.
    #[serde(default)]
    pub sorts: BTreeMap<String, Sort>,
    #[serde(default)]
    pub individuals: Vec<Binding<Sort>>,
    #[serde(default)]
    pub inits: Vec<Action>,
    #[serde(default)]
    pub actions: Vec<Binding<ActionDefinition>>,
    #[serde(default)]
    pub functions: Vec<Binding<FunctionDefinition>>,
    #[serde(default)]
    pub conjectures: Vec<Binding<Expr>>,
}

impl Program {
    pub fn individual(&self, name: &str) -> Option<&Sort> {
        self.individuals
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.decl)
    }

    pub fn action(&self, name: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|b| b.name == name).map(|b| &b.decl)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.decl)
    }
}
