//! The assembled model.

use crate::errors::SimResult;
use crate::godley::{BalanceReport, GodleyTable};
use crate::graph::{ModelGraph, Node, NodeKind, Wire};
use crate::order::EvalPlan;
use crate::store::VariableStore;
use crate::FloatValue;
use petgraph::dot::Dot;
use petgraph::Graph;
use serde::{Deserialize, Serialize};

use super::types::ModelItem;

/// A block diagram together with its variables and Godley tables.
///
/// Godley tables are already installed: each stock column is backed by an integral
/// in `graph` and the table is kept for balance checks and enumeration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    graph: ModelGraph,
    variables: VariableStore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    godley_tables: Vec<GodleyTable>,
}

impl Model {
    pub(crate) fn from_parts(
        graph: ModelGraph,
        variables: VariableStore,
        godley_tables: Vec<GodleyTable>,
    ) -> Self {
        Self {
            graph,
            variables,
            godley_tables,
        }
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn godley_tables(&self) -> &[GodleyTable] {
        &self.godley_tables
    }

    pub fn godley_table(&self, index: usize) -> Option<&GodleyTable> {
        self.godley_tables.get(index)
    }

    /// Compute the evaluation plan for the current structure.
    pub fn plan(&self) -> SimResult<EvalPlan> {
        EvalPlan::new(&self.graph, &self.variables)
    }

    /// Balance of every Godley table using `values`, indexed by store slot.
    pub fn balances(&self, values: &[FloatValue]) -> SimResult<Vec<BalanceReport>> {
        self.godley_tables
            .iter()
            .map(|table| BalanceReport::from_values(table, &self.variables, values))
            .collect()
    }

    /// Graph nodes in declaration order.
    pub fn items(&self) -> Vec<ModelItem<'_>> {
        self.graph
            .nodes()
            .map(|(index, node)| {
                let table = match node.kind {
                    NodeKind::GodleyIcon { table } => self.godley_tables.get(table),
                    _ => None,
                };
                ModelItem::new(index, node, table)
            })
            .collect()
    }

    /// Create a diagram of the model graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &Graph<Node, Wire>> {
        self.graph.as_dot()
    }
}
