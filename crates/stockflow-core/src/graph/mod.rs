//! The model graph.
//!
//! A block diagram stored as an arena of typed nodes joined by wires. Nodes are
//! referenced by stable [`NodeIndex`] values and never removed, so indices double as
//! declaration order.
//!
//! Every node has at most one output port (index 0). Input ports accept a single
//! wire each, while an output may fan out to any number of inputs. Cycles are only
//! allowed when they pass through an [`NodeKind::Integral`], whose output is its
//! accumulated state rather than a function of its current input.

mod validation;

pub use petgraph::graph::NodeIndex;
pub use validation::find_unbroken_cycle;

use crate::errors::{SimError, SimResult};
use crate::operation::OperationType;
use crate::variable::normalise_name;
use petgraph::dot::{Config, Dot};
use petgraph::graph::EdgeIndex;
use petgraph::visit::{EdgeRef, IntoNodeReferences};
use petgraph::{Direction, Graph};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a node computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A stateless operation.
    Operation(OperationType),
    /// A reference to a variable in the store.
    ///
    /// A defining node has one input and writes the value it receives into the
    /// store. Other nodes for the same name only read it.
    Variable { name: String, defining: bool },
    /// Accumulates its input into the named stock variable.
    Integral { stock: String },
    /// Marks a Godley table in the diagram. Has no ports.
    GodleyIcon { table: usize },
}

impl NodeKind {
    pub fn is_integral(&self) -> bool {
        matches!(self, NodeKind::Integral { .. })
    }

    pub fn is_godley_icon(&self) -> bool {
        matches!(self, NodeKind::GodleyIcon { .. })
    }

    /// Whether the node is computed by an evaluation pass.
    pub fn is_evaluated(&self) -> bool {
        matches!(self, NodeKind::Operation(_) | NodeKind::Variable { .. })
    }

    pub fn num_inputs(&self) -> usize {
        match self {
            NodeKind::Operation(op) => op.arity(),
            NodeKind::Variable { defining, .. } => usize::from(*defining),
            NodeKind::Integral { .. } => 1,
            NodeKind::GodleyIcon { .. } => 0,
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            NodeKind::GodleyIcon { .. } => 0,
            _ => 1,
        }
    }

    /// Name of the kind, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Operation(op) => op.name(),
            NodeKind::Variable { .. } => "variable",
            NodeKind::Integral { .. } => "integrate",
            NodeKind::GodleyIcon { .. } => "godley",
        }
    }

    /// Variable name for variable and integral nodes.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            NodeKind::Variable { name, .. } => Some(name),
            NodeKind::Integral { stock } => Some(stock),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Operation(op) => write!(f, "{}", op),
            NodeKind::Variable { name, .. } => write!(f, "{}", name),
            NodeKind::Integral { stock } => write!(f, "∫ {}", stock),
            NodeKind::GodleyIcon { table } => write!(f, "godley #{}", table),
        }
    }
}

/// A graph node. Its ports are fixed by its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
}

/// An output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputPort {
    pub node: NodeIndex,
    pub port: usize,
}

impl OutputPort {
    /// The (only) output of `node`.
    pub fn of(node: NodeIndex) -> Self {
        Self { node, port: 0 }
    }
}

/// An input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputPort {
    pub node: NodeIndex,
    pub port: usize,
}

impl InputPort {
    pub fn new(node: NodeIndex, port: usize) -> Self {
        Self { node, port }
    }
}

/// A connection between an output port and an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub from_port: usize,
    pub to_port: usize,
}

/// Directed graph of nodes and wires.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelGraph {
    graph: Graph<Node, Wire>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node of the given kind. Its arity follows from the kind.
    pub fn add_node(&mut self, kind: NodeKind) -> NodeIndex {
        let kind = match kind {
            NodeKind::Variable { name, defining } => NodeKind::Variable {
                name: normalise_name(&name),
                defining,
            },
            NodeKind::Integral { stock } => NodeKind::Integral {
                stock: normalise_name(&stock),
            },
            kind => kind,
        };
        self.graph.add_node(Node { kind })
    }

    pub fn add_operation(&mut self, op: OperationType) -> NodeIndex {
        self.add_node(NodeKind::Operation(op))
    }

    /// Add a read-only reference to a variable.
    pub fn add_variable(&mut self, name: &str) -> NodeIndex {
        self.add_node(NodeKind::Variable {
            name: name.to_string(),
            defining: false,
        })
    }

    /// Add the node whose input defines a variable.
    pub fn add_defining_variable(&mut self, name: &str) -> NodeIndex {
        self.add_node(NodeKind::Variable {
            name: name.to_string(),
            defining: true,
        })
    }

    pub fn add_integral(&mut self, stock: &str) -> NodeIndex {
        self.add_node(NodeKind::Integral {
            stock: stock.to_string(),
        })
    }

    pub fn add_godley_icon(&mut self, table: usize) -> NodeIndex {
        self.add_node(NodeKind::GodleyIcon { table })
    }

    /// Wire an output port to an input port.
    ///
    /// Fails if either port does not exist, if the input is already wired, or if
    /// the wire would close a cycle that contains no integral.
    pub fn connect(&mut self, from: OutputPort, to: InputPort) -> SimResult<EdgeIndex> {
        let from_node = self.checked_node(from.node)?;
        if from.port >= from_node.kind.num_outputs() {
            return Err(SimError::InvalidPort {
                node: from.node.index(),
                port: from.port,
                direction: "output",
            });
        }
        let to_node = self.checked_node(to.node)?;
        if to.port >= to_node.kind.num_inputs() {
            return Err(SimError::InvalidPort {
                node: to.node.index(),
                port: to.port,
                direction: "input",
            });
        }
        if self.source_of(to.node, to.port).is_some() {
            return Err(SimError::InputAlreadyConnected {
                node: to.node.index(),
                port: to.port,
            });
        }
        if !from_node.kind.is_integral()
            && (from.node == to.node || self.reaches_without_integration(to.node, from.node))
        {
            return Err(SimError::CycleWithoutIntegration {
                from: from.node.index(),
                to: to.node.index(),
            });
        }

        Ok(self.graph.add_edge(
            from.node,
            to.node,
            Wire {
                from_port: from.port,
                to_port: to.port,
            },
        ))
    }

    /// Convenience for wiring `from`'s output into input `port` of `to`.
    pub fn wire(&mut self, from: NodeIndex, to: NodeIndex, port: usize) -> SimResult<EdgeIndex> {
        self.connect(OutputPort::of(from), InputPort::new(to, port))
    }

    fn checked_node(&self, index: NodeIndex) -> SimResult<&Node> {
        self.graph.node_weight(index).ok_or(SimError::InvalidPort {
            node: index.index(),
            port: 0,
            direction: "node",
        })
    }

    fn reaches_without_integration(&self, start: NodeIndex, target: NodeIndex) -> bool {
        let mut stack = vec![start];
        let mut visited = vec![false; self.graph.node_count()];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if std::mem::replace(&mut visited[node.index()], true) {
                continue;
            }
            if self.graph[node].kind.is_integral() {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(node, Direction::Outgoing));
        }
        false
    }

    /// Node feeding input `port` of `node`, if wired.
    pub fn source_of(&self, node: NodeIndex, port: usize) -> Option<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|edge| edge.weight().to_port == port)
            .map(|edge| edge.source())
    }

    /// Sources of every input port of `node`, in port order.
    pub fn inputs_of(&self, node: NodeIndex) -> Vec<Option<NodeIndex>> {
        let mut inputs = vec![None; self.graph[node].kind.num_inputs()];
        for edge in self.graph.edges_directed(node, Direction::Incoming) {
            if let Some(slot) = inputs.get_mut(edge.weight().to_port) {
                *slot = Some(edge.source());
            }
        }
        inputs
    }

    /// Nodes fed by `node`'s output.
    pub fn consumers_of(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Direction::Outgoing)
    }

    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(index)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.graph.node_references()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn wire_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Wires as `(source, wire, target)` triples.
    pub fn wires(&self) -> impl Iterator<Item = (NodeIndex, &Wire, NodeIndex)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source(), edge.weight(), edge.target()))
    }

    /// The node defining a variable, if any.
    pub fn defining_node(&self, name: &str) -> Option<NodeIndex> {
        let name = normalise_name(name);
        self.nodes().find_map(|(index, node)| match &node.kind {
            NodeKind::Variable {
                name: n,
                defining: true,
            } if *n == name => Some(index),
            _ => None,
        })
    }

    /// The integral accumulating a stock, if any.
    pub fn integral_for(&self, stock: &str) -> Option<NodeIndex> {
        let stock = normalise_name(stock);
        self.nodes().find_map(|(index, node)| match &node.kind {
            NodeKind::Integral { stock: s } if *s == stock => Some(index),
            _ => None,
        })
    }

    /// A node whose output carries the value of `name`: its defining node, its
    /// integral or an existing read-only reference.
    pub fn value_source(&self, name: &str) -> Option<NodeIndex> {
        let name = normalise_name(name);
        self.defining_node(&name)
            .or_else(|| self.integral_for(&name))
            .or_else(|| {
                self.nodes().find_map(|(index, node)| match &node.kind {
                    NodeKind::Variable { name: n, .. } if *n == name => Some(index),
                    _ => None,
                })
            })
    }

    pub fn is_godley_backed(&self, index: NodeIndex) -> bool {
        self.node(index)
            .map(|node| node.kind.is_godley_icon())
            .unwrap_or(false)
    }

    pub(crate) fn inner(&self) -> &Graph<Node, Wire> {
        &self.graph
    }

    /// Graphviz rendering of the diagram. Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &Graph<Node, Wire>> {
        Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| format!("label = \"{}\"", edge.weight().to_port),
            &|_, (_, node)| {
                let label = node.kind.to_string();
                let escaped = label.replace('\\', "\\\\").replace('"', "\\\"");
                format!("label = \"{}\"", escaped)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_follow_kind() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Constant(1.0));
        let add = graph.add_operation(OperationType::Add);
        assert!(graph.wire(a, add, 0).is_ok());
        assert!(matches!(
            graph.wire(a, add, 2),
            Err(SimError::InvalidPort {
                direction: "input",
                ..
            })
        ));
        let icon = graph.add_godley_icon(0);
        assert!(matches!(
            graph.wire(icon, add, 1),
            Err(SimError::InvalidPort {
                direction: "output",
                ..
            })
        ));
    }

    #[test]
    fn input_accepts_one_wire() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Constant(1.0));
        let b = graph.add_operation(OperationType::Constant(2.0));
        let neg = graph.add_operation(OperationType::Negate);
        graph.wire(a, neg, 0).unwrap();
        assert_eq!(
            graph.wire(b, neg, 0),
            Err(SimError::InputAlreadyConnected {
                node: neg.index(),
                port: 0
            })
        );
    }

    #[test]
    fn outputs_fan_out() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Constant(1.0));
        let mul = graph.add_operation(OperationType::Multiply);
        graph.wire(a, mul, 0).unwrap();
        graph.wire(a, mul, 1).unwrap();
        assert_eq!(graph.inputs_of(mul), vec![Some(a), Some(a)]);
        assert_eq!(graph.consumers_of(a).count(), 2);
    }

    #[test]
    fn cycle_without_integral_is_rejected() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Negate);
        let b = graph.add_operation(OperationType::Negate);
        let c = graph.add_operation(OperationType::Negate);
        graph.wire(a, b, 0).unwrap();
        graph.wire(b, c, 0).unwrap();
        assert_eq!(
            graph.wire(c, a, 0),
            Err(SimError::CycleWithoutIntegration {
                from: c.index(),
                to: a.index()
            })
        );
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Add);
        assert!(matches!(
            graph.wire(a, a, 0),
            Err(SimError::CycleWithoutIntegration { .. })
        ));
    }

    #[test]
    fn cycle_through_integral_is_allowed() {
        let mut graph = ModelGraph::new();
        let integral = graph.add_integral("K");
        let rate = graph.add_operation(OperationType::Constant(0.1));
        let mul = graph.add_operation(OperationType::Multiply);
        graph.wire(integral, mul, 0).unwrap();
        graph.wire(rate, mul, 1).unwrap();
        assert!(graph.wire(mul, integral, 0).is_ok());
        assert_eq!(find_unbroken_cycle(&graph), None);
    }

    #[test]
    fn lookups_by_variable_name() {
        let mut graph = ModelGraph::new();
        let read = graph.add_variable("Loans");
        let def = graph.add_defining_variable("Lending");
        let int = graph.add_integral(":Loans");
        assert_eq!(graph.defining_node(":Lending"), Some(def));
        assert_eq!(graph.integral_for("Loans"), Some(int));
        assert_eq!(graph.value_source("Loans"), Some(int));
        assert_eq!(graph.value_source("Lending"), Some(def));
        assert_eq!(graph.node(read).unwrap().kind.variable_name(), Some(":Loans"));
    }

    #[test]
    fn dot() {
        let mut graph = ModelGraph::new();
        let a = graph.add_operation(OperationType::Constant(2.0));
        let neg = graph.add_operation(OperationType::Negate);
        graph.wire(a, neg, 0).unwrap();

        let exp = r#"digraph {
    0 [ label = "constant(2)"]
    1 [ label = "negate"]
    0 -> 1 [ label = "0"]
}
"#;
        assert_eq!(format!("{:?}", graph.as_dot()), exp);
    }
}
