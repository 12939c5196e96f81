//! Model builder for assembling models in code.

use crate::errors::{SimError, SimResult};
use crate::godley::{install, GodleyTable};
use crate::graph::ModelGraph;
use crate::operation::OperationType;
use crate::order::EvalPlan;
use crate::store::VariableStore;
use crate::variable::Variable;
use crate::FloatValue;
use petgraph::graph::NodeIndex;
use tracing::debug;

use super::runtime::Model;

/// Tolerance on the net coefficient of a flow across a Godley row.
const ROW_TOLERANCE: FloatValue = 1e-10;

/// Build a model from variables, wiring and Godley tables.
///
/// Node-creating methods return the new node's index so that later calls can wire
/// into it. Wiring errors are collected and reported by [`ModelBuilder::build`],
/// which keeps construction code free of intermediate `?`s.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    graph: ModelGraph,
    variables: VariableStore,
    godley_tables: Vec<GodleyTable>,
    errors: Vec<SimError>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable.
    pub fn with_variable(&mut self, variable: Variable) -> &mut Self {
        if let Err(e) = self.variables.register(variable) {
            self.errors.push(e);
        }
        self
    }

    pub fn with_variables(&mut self, variables: impl IntoIterator<Item = Variable>) -> &mut Self {
        for variable in variables {
            self.with_variable(variable);
        }
        self
    }

    /// Add a Godley table. Tables are installed into the graph by `build`.
    pub fn with_godley_table(&mut self, table: GodleyTable) -> &mut Self {
        self.godley_tables.push(table);
        self
    }

    /// Add an operation fed by `inputs`, in port order.
    ///
    /// Inputs may be fewer than the arity; the remaining ports can be wired later
    /// with [`ModelBuilder::connect`].
    pub fn operation(&mut self, op: OperationType, inputs: &[NodeIndex]) -> NodeIndex {
        let node = self.graph.add_operation(op);
        for (port, input) in inputs.iter().enumerate() {
            self.connect(*input, node, port);
        }
        node
    }

    pub fn constant(&mut self, value: FloatValue) -> NodeIndex {
        self.graph.add_operation(OperationType::Constant(value))
    }

    pub fn time(&mut self) -> NodeIndex {
        self.graph.add_operation(OperationType::Time)
    }

    /// A literal constant stored as a `constant:<value>` variable.
    pub fn constant_variable(&mut self, value: FloatValue) -> NodeIndex {
        let slot = self.variables.constant(value);
        let name = self.variables.at(slot).name.clone();
        self.graph.add_variable(&name)
    }

    /// A read-only reference to a variable.
    pub fn variable(&mut self, name: &str) -> NodeIndex {
        self.graph.add_variable(name)
    }

    /// Define the flow or auxiliary `name` as the output of `source`.
    pub fn define(&mut self, name: &str, source: NodeIndex) -> NodeIndex {
        let node = self.graph.add_defining_variable(name);
        self.connect(source, node, 0);
        node
    }

    /// Accumulate `input` into `stock`.
    pub fn integral(&mut self, stock: &str, input: NodeIndex) -> NodeIndex {
        let node = self.graph.add_integral(stock);
        self.connect(input, node, 0);
        node
    }

    /// Wire the output of `from` into input `port` of `to`.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex, port: usize) -> &mut Self {
        if let Err(e) = self.graph.wire(from, to, port) {
            self.errors.push(e);
        }
        self
    }

    /// Direct access to the graph being built.
    pub fn graph_mut(&mut self) -> &mut ModelGraph {
        &mut self.graph
    }

    /// Install the Godley tables and check the structure.
    ///
    /// Returns the first wiring error, if any. Fails if a Godley row does not
    /// balance, a table references an unknown flow, or the graph cannot be
    /// ordered for evaluation.
    pub fn build(&self) -> SimResult<Model> {
        if let Some(e) = self.errors.first() {
            return Err(e.clone());
        }

        let mut graph = self.graph.clone();
        let mut variables = self.variables.clone();
        let mut tables = self.godley_tables.clone();

        for index in 0..tables.len() {
            tables[index].derive_equity()?;
            tables[index].validate_rows(ROW_TOLERANCE)?;
            let (installed, rest) = tables.split_at(index);
            install(&rest[0], index, installed, &mut graph, &mut variables)?;
        }

        let plan = EvalPlan::new(&graph, &variables)?;
        debug!(
            nodes = graph.node_count(),
            wires = graph.wire_count(),
            variables = variables.len(),
            godley_tables = tables.len(),
            evaluated = plan.order().len(),
            "Built model"
        );

        Ok(Model::from_parts(graph, variables, tables))
    }
}
