use super::ModelGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::{
    depth_first_search, Control, DfsEvent, EdgeFiltered, EdgeRef, IntoNeighbors,
    IntoNodeIdentifiers, Visitable,
};

/// Find a wire closing a cycle that no integral breaks.
///
/// Wires leaving an integral carry accumulated state, so they are dropped before
/// searching for back edges. A self-referential node is never acceptable.
/// Returns the `(from, to)` nodes of the first back edge found.
pub fn find_unbroken_cycle(graph: &ModelGraph) -> Option<(NodeIndex, NodeIndex)> {
    let inner = graph.inner();
    let filtered = EdgeFiltered::from_fn(inner, |edge| !inner[edge.source()].kind.is_integral());
    find_back_edge(&filtered)
}

fn find_back_edge<G>(g: G) -> Option<(G::NodeId, G::NodeId)>
where
    G: IntoNodeIdentifiers + IntoNeighbors + Visitable,
{
    match depth_first_search(g, g.node_identifiers(), |event| match event {
        DfsEvent::BackEdge(u, v) => Control::Break((u, v)),
        _ => Control::Continue,
    }) {
        Control::Break(edge) => Some(edge),
        _ => None,
    }
}
