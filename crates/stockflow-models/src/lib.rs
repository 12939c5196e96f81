//! Reference models for the stock-flow engine.
//!
//! Each model is assembled in code through [`ModelBuilder`] from a parameters struct
//! with sensible defaults.
//!
//! # Models
//!
//! - `growth`: exponential growth of a single stock
//! - `goodwin`: the Goodwin growth cycle
//! - `monetary`: a single bank balance sheet kept in a Godley table
//! - `endogenous_money`: banks and firms sharing deposits and loans

pub mod endogenous_money;
pub mod goodwin;
pub mod growth;
pub mod monetary;

pub use endogenous_money::{EndogenousMoneyModel, EndogenousMoneyParameters};
pub use goodwin::{GoodwinModel, GoodwinParameters};
pub use growth::{GrowthModel, GrowthParameters};
pub use monetary::{MonetaryModel, MonetaryParameters};

use stockflow_core::graph::NodeIndex;
use stockflow_core::model::ModelBuilder;
use stockflow_core::operation::OperationType;

/// Define `flow` as `lhs <op> rhs`, where both operands are variables.
pub(crate) fn define_binary(
    builder: &mut ModelBuilder,
    flow: &str,
    op: OperationType,
    lhs: &str,
    rhs: &str,
) -> NodeIndex {
    let lhs = builder.variable(lhs);
    let rhs = builder.variable(rhs);
    let value = builder.operation(op, &[lhs, rhs]);
    builder.define(flow, value)
}
