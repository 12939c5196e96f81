//! A model is a block diagram of operations, variables and integrals, plus the
//! Godley tables layered on top of it.
//!
//! Models are assembled with a [`ModelBuilder`], which plays the role of a file
//! loader: it registers variables, wires the graph and installs Godley tables.
//! The resulting [`Model`] is structurally fixed. Only variable values change
//! once it is handed to a [`Session`](crate::simulation::Session).

mod builder;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

pub use builder::ModelBuilder;
pub use runtime::Model;
pub use types::ModelItem;
