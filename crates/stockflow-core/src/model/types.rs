use crate::godley::GodleyTable;
use crate::graph::{Node, NodeKind};
use petgraph::graph::NodeIndex;

/// A graph node as seen by hosts enumerating a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelItem<'a> {
    pub index: NodeIndex,
    pub node: &'a Node,
    table: Option<&'a GodleyTable>,
}

impl<'a> ModelItem<'a> {
    pub(crate) fn new(index: NodeIndex, node: &'a Node, table: Option<&'a GodleyTable>) -> Self {
        Self { index, node, table }
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.node.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.node.kind.type_name()
    }

    pub fn is_godley_backed(&self) -> bool {
        self.table.is_some()
    }

    /// The table behind a Godley icon, or `None` for any other item.
    pub fn godley_icon_cast(&self) -> Option<&'a GodleyTable> {
        self.table
    }
}
