//! Variable definitions and qualified naming.
//!
//! Every named quantity in a model is a [`Variable`] keyed by a scope-qualified name.
//! Global variables use an empty scope (`:GDP`), variables inside a group use the
//! group name as scope (`banks:Reserves`) and literal constants are keyed by their
//! value (`constant:0.05`).

use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope used for literal constants.
pub const CONSTANT_SCOPE: &str = "constant";

/// The role a variable plays in the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    /// State variable advanced by integration.
    Stock,
    /// Instantaneous rate, recomputed on every evaluation pass.
    Flow,
    /// Literal value that never changes.
    Constant,
    /// Externally tunable value that is fixed during a run.
    Parameter,
}

impl VariableKind {
    /// Whether the value of this kind of variable may change while stepping.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, VariableKind::Stock | VariableKind::Flow)
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableKind::Stock => write!(f, "stock"),
            VariableKind::Flow => write!(f, "flow"),
            VariableKind::Constant => write!(f, "constant"),
            VariableKind::Parameter => write!(f, "parameter"),
        }
    }
}

/// A named quantity held by the [`VariableStore`](crate::store::VariableStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Scope-qualified name, unique within a store.
    pub name: String,
    pub kind: VariableKind,
    /// Current value.
    pub value: FloatValue,
    /// Initial-condition expression, resolved when the model is loaded.
    ///
    /// Either a literal (`100`), a reference to another variable (`Loans`) or a
    /// scaled reference (`-0.5*Loans`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
}

impl Variable {
    pub fn new(name: &str, kind: VariableKind, value: FloatValue) -> Self {
        Self {
            name: normalise_name(name),
            kind,
            value,
            init: None,
        }
    }

    pub fn stock(name: &str, initial: FloatValue) -> Self {
        Self::new(name, VariableKind::Stock, initial)
    }

    pub fn flow(name: &str) -> Self {
        Self::new(name, VariableKind::Flow, 0.0)
    }

    pub fn parameter(name: &str, value: FloatValue) -> Self {
        Self::new(name, VariableKind::Parameter, value)
    }

    /// A literal constant keyed by its value, e.g. `constant:0.05`.
    pub fn constant(value: FloatValue) -> Self {
        Self {
            name: constant_name(value),
            kind: VariableKind::Constant,
            value,
            init: None,
        }
    }

    /// Attach an initial-condition expression.
    pub fn with_init(mut self, init: impl Into<String>) -> Self {
        self.init = Some(init.into());
        self
    }

    /// The name without its scope.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }
}

/// Qualify `name` with `scope`.
pub fn qualified_name(scope: &str, name: &str) -> String {
    format!("{}:{}", scope, name)
}

/// Key used for a literal constant.
pub fn constant_name(value: FloatValue) -> String {
    qualified_name(CONSTANT_SCOPE, &value.to_string())
}

/// Treat an unqualified name as global, leaving qualified names untouched.
pub fn normalise_name(name: &str) -> String {
    let name = name.trim();
    if name.contains(':') {
        name.to_string()
    } else {
        qualified_name("", name)
    }
}

/// Strip the scope from a qualified name.
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Scope of a qualified name (empty for globals).
pub fn scope_of(name: &str) -> &str {
    name.rsplit_once(':').map(|(scope, _)| scope).unwrap_or("")
}
