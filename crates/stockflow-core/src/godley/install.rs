use super::GodleyTable;
use crate::errors::{SimError, SimResult};
use crate::graph::ModelGraph;
use crate::operation::OperationType;
use crate::store::VariableStore;
use crate::variable::{Variable, VariableKind};
use crate::FloatValue;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;
use tracing::debug;

/// Tolerance on the net coefficients of a column shared between tables.
const COLUMN_TOLERANCE: FloatValue = 1e-10;

/// Wire `table` into the model.
///
/// For each stock column: registers the stock if the store does not know it yet,
/// records the column's initial value as the stock's initial condition, adds an
/// integral for the stock and feeds it a linear combination of the column's net
/// flows. A stock shared with one of the `installed` tables keeps the integral
/// that table created, and its column here must carry the same net flows.
/// A `GodleyIcon` node is added last.
///
/// `table` should already have its derived equity filled in.
pub fn install(
    table: &GodleyTable,
    table_index: usize,
    installed: &[GodleyTable],
    graph: &mut ModelGraph,
    store: &mut VariableStore,
) -> SimResult<NodeIndex> {
    let mut flow_sources: HashMap<String, NodeIndex> = HashMap::new();

    for col in 1..table.cols() {
        let Some(stock) = table.stock_at(col) else {
            continue;
        };
        let initial = table.initial_value(col).trim();

        match store.variable_mut(&stock) {
            Ok(variable) => {
                if variable.kind != VariableKind::Stock {
                    return Err(SimError::DuplicateVariable(stock));
                }
                if !initial.is_empty() && variable.init.is_none() {
                    variable.init = Some(initial.to_string());
                }
            }
            Err(_) => {
                let mut variable = Variable::stock(&stock, 0.0);
                if !initial.is_empty() {
                    variable = variable.with_init(initial);
                }
                store.register(variable)?;
            }
        }

        let shared = installed
            .iter()
            .find_map(|other| other.column(&stock).map(|other_col| (other, other_col)));
        if let Some((other, other_col)) = shared {
            if !table.column_matches(col, other, other_col, COLUMN_TOLERANCE)? {
                return Err(SimError::InconsistentGodleyColumn {
                    table: table.name().to_string(),
                    stock,
                    first_table: other.name().to_string(),
                });
            }
            debug!(
                table = table.name(),
                stock = %stock,
                first_table = other.name(),
                "Stock already integrated"
            );
            continue;
        }
        let integral = graph.add_integral(&stock);

        let terms = table.column_terms(col)?;
        if terms.is_empty() {
            continue;
        }
        let combination = graph.add_operation(OperationType::LinearCombination(
            terms.iter().map(|t| t.coef).collect(),
        ));
        for (port, term) in terms.iter().enumerate() {
            let source = if term.is_literal() {
                graph.add_operation(OperationType::Constant(1.0))
            } else {
                flow_source(&term.name, graph, store, &mut flow_sources)?
            };
            graph.wire(source, combination, port)?;
        }
        graph.wire(combination, integral, 0)?;
    }

    debug!(
        table = table.name(),
        rows = table.rows(),
        cols = table.cols(),
        "Installed Godley table"
    );
    Ok(graph.add_godley_icon(table_index))
}

/// A node carrying the value of flow `name`, reusing existing nodes.
fn flow_source(
    name: &str,
    graph: &mut ModelGraph,
    store: &VariableStore,
    cache: &mut HashMap<String, NodeIndex>,
) -> SimResult<NodeIndex> {
    if let Some(node) = cache.get(name) {
        return Ok(*node);
    }
    let slot = store.slot(name)?;
    let qualified = store.at(slot).name.clone();
    let node = match graph.value_source(&qualified) {
        Some(node) => node,
        None => graph.add_variable(&qualified),
    };
    cache.insert(name.to_string(), node);
    Ok(node)
}
