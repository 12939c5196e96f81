//! Evaluation order.
//!
//! An [`EvalPlan`] is a linear schedule for every evaluated node of a [`ModelGraph`],
//! computed once per structural change. Integral outputs are leaves: they expose the
//! current stock value, so feedback loops through an integral impose no ordering.
//!
//! Ties between independent nodes are broken by declaration order, making the plan
//! and every trajectory computed from it reproducible.

use crate::config::DivisionPolicy;
use crate::errors::{SimError, SimResult};
use crate::graph::{ModelGraph, NodeKind};
use crate::operation::{EvalContext, OperationType};
use crate::store::VariableStore;
use crate::variable::VariableKind;
use crate::{FloatValue, Time};
use nalgebra::DVector;
use petgraph::graph::NodeIndex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum StepKind {
    Operation {
        op: OperationType,
        inputs: Vec<usize>,
    },
    /// Writes its input into the store.
    Define { slot: usize, input: usize },
    /// Reads the current value of a variable.
    Read { slot: usize },
}

#[derive(Debug, Clone)]
struct PlanStep {
    node: usize,
    kind: StepKind,
}

/// An integral and the stock it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegralStage {
    pub node: NodeIndex,
    pub stock_slot: usize,
    /// Node supplying the derivative. Unwired integrals hold their value.
    pub input: Option<NodeIndex>,
}

/// Deterministic evaluation schedule of a model graph.
#[derive(Debug, Clone)]
pub struct EvalPlan {
    steps: Vec<PlanStep>,
    integrals: Vec<IntegralStage>,
    node_count: usize,
}

impl EvalPlan {
    /// Build the plan for `graph`, resolving variable names against `store`.
    ///
    /// Fails if an evaluated node has an unwired input, a variable is defined
    /// twice, a referenced variable is unknown or a cycle is not broken by an
    /// integral.
    pub fn new(graph: &ModelGraph, store: &VariableStore) -> SimResult<Self> {
        let node_count = graph.node_count();
        let mut kinds: Vec<Option<StepKind>> = vec![None; node_count];
        let mut integrals = Vec::new();
        let mut definitions: HashMap<&str, NodeIndex> = HashMap::new();
        let mut referenced: HashSet<usize> = HashSet::new();

        for (index, node) in graph.nodes() {
            let inputs = graph.inputs_of(index);
            if node.kind.is_evaluated() {
                if let Some(port) = inputs.iter().position(Option::is_none) {
                    return Err(SimError::DanglingInput {
                        node: index.index(),
                        port,
                        kind: node.kind.type_name().to_string(),
                    });
                }
            }
            let inputs: Vec<usize> = inputs.iter().flatten().map(|n| n.index()).collect();

            let kind = match &node.kind {
                NodeKind::Operation(op) => Some(StepKind::Operation {
                    op: op.clone(),
                    inputs,
                }),
                NodeKind::Variable { name, defining } => {
                    let slot = store.slot(name)?;
                    referenced.insert(slot);
                    if *defining {
                        if let Some(first) = definitions.insert(name, index) {
                            return Err(SimError::DuplicateDefinition {
                                name: name.clone(),
                                first: first.index(),
                                second: index.index(),
                            });
                        }
                        Some(StepKind::Define {
                            slot,
                            input: inputs[0],
                        })
                    } else {
                        Some(StepKind::Read { slot })
                    }
                }
                NodeKind::Integral { stock } => {
                    let stock_slot = store.slot(stock)?;
                    referenced.insert(stock_slot);
                    if let Some(first) = definitions.insert(stock, index) {
                        return Err(SimError::DuplicateDefinition {
                            name: stock.clone(),
                            first: first.index(),
                            second: index.index(),
                        });
                    }
                    integrals.push(IntegralStage {
                        node: index,
                        stock_slot,
                        input: graph.source_of(index, 0),
                    });
                    None
                }
                NodeKind::GodleyIcon { .. } => None,
            };
            kinds[index.index()] = kind;
        }

        // Dependencies between evaluated nodes. Integrals are leaves, and a read of
        // a defined variable waits for the node defining it.
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut in_degree = vec![0usize; node_count];
        for (index, node) in graph.nodes() {
            if !node.kind.is_evaluated() {
                continue;
            }
            let mut sources: Vec<usize> = graph
                .inputs_of(index)
                .into_iter()
                .flatten()
                .filter(|source| {
                    graph
                        .node(*source)
                        .map(|n| n.kind.is_evaluated())
                        .unwrap_or(false)
                })
                .map(|source| source.index())
                .collect();
            if let NodeKind::Variable {
                name,
                defining: false,
            } = &node.kind
            {
                if let Some(definition) = definitions.get(name.as_str()) {
                    if graph.node(*definition).map(|n| n.kind.is_evaluated()) == Some(true) {
                        sources.push(definition.index());
                    }
                }
            }
            sources.sort_unstable();
            sources.dedup();
            in_degree[index.index()] = sources.len();
            for source in sources {
                dependents[source].push(index.index());
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = kinds
            .iter()
            .enumerate()
            .filter(|(i, kind)| kind.is_some() && in_degree[*i] == 0)
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut steps = Vec::with_capacity(node_count);
        while let Some(Reverse(node)) = ready.pop() {
            if let Some(kind) = kinds[node].take() {
                steps.push(PlanStep { node, kind });
            }
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        let stuck: Vec<usize> = kinds
            .iter()
            .enumerate()
            .filter_map(|(i, kind)| kind.as_ref().map(|_| i))
            .collect();
        if !stuck.is_empty() {
            return Err(SimError::CyclicGraph { nodes: stuck });
        }

        for (slot, variable) in store.iter().enumerate() {
            let unused = matches!(variable.kind, VariableKind::Flow | VariableKind::Parameter)
                && !referenced.contains(&slot);
            if unused {
                warn!(variable = %variable.name, "Variable is not referenced by any node");
            }
        }

        debug!(
            steps = steps.len(),
            integrals = integrals.len(),
            "Built evaluation plan"
        );

        Ok(Self {
            steps,
            integrals,
            node_count,
        })
    }

    /// Evaluated nodes in the order they are computed.
    pub fn order(&self) -> Vec<NodeIndex> {
        self.steps.iter().map(|s| NodeIndex::new(s.node)).collect()
    }

    pub fn integrals(&self) -> &[IntegralStage] {
        &self.integrals
    }

    /// Number of stocks advanced by integration.
    pub fn dimension(&self) -> usize {
        self.integrals.len()
    }

    /// Current stock values, in integral order.
    pub fn state(&self, values: &[FloatValue]) -> DVector<FloatValue> {
        DVector::from_iterator(
            self.integrals.len(),
            self.integrals.iter().map(|i| values[i.stock_slot]),
        )
    }

    /// Overwrite stock values with `state`, given in integral order.
    pub fn write_state(&self, values: &mut [FloatValue], state: &[FloatValue]) {
        for (integral, value) in self.integrals.iter().zip(state) {
            values[integral.stock_slot] = *value;
        }
    }

    /// Run one evaluation pass over `values` at time `t`.
    ///
    /// Defined variables are written into `values` as they are computed. Returns
    /// the derivative of every stock, in integral order.
    pub fn evaluate(
        &self,
        values: &mut [FloatValue],
        t: Time,
        division: DivisionPolicy,
    ) -> SimResult<Vec<FloatValue>> {
        let ctx = EvalContext { t, division };
        let mut outputs = vec![0.0; self.node_count];
        for integral in &self.integrals {
            outputs[integral.node.index()] = values[integral.stock_slot];
        }

        let mut scratch = Vec::new();
        for step in &self.steps {
            outputs[step.node] = match &step.kind {
                StepKind::Operation { op, inputs } => {
                    scratch.clear();
                    scratch.extend(inputs.iter().map(|i| outputs[*i]));
                    op.evaluate(step.node, &scratch, &ctx)?
                }
                StepKind::Define { slot, input } => {
                    values[*slot] = outputs[*input];
                    outputs[*input]
                }
                StepKind::Read { slot } => values[*slot],
            };
        }

        Ok(self
            .integrals
            .iter()
            .map(|i| i.input.map(|n| outputs[n.index()]).unwrap_or(0.0))
            .collect())
    }
}
