//! Core of a stock-flow consistent system dynamics engine.
//!
//! Models are block diagrams of operations, variables and integrals held in a
//! [`graph::ModelGraph`], with Godley tables layered on top as double-entry
//! ledgers. A [`simulation::Session`] advances a loaded model through time while
//! keeping every table balanced.
//!
//! # Module Organisation
//!
//! - `store`, `variable`: named quantities and their values
//! - `graph`, `operation`: the block diagram and its operator table
//! - `order`: evaluation order, with integrals breaking feedback loops
//! - `godley`: double-entry tables, balance checks and graph installation
//! - `integrator`: Euler, Runge-Kutta and adaptive stepping
//! - `simulation`: the session controller

pub mod config;
pub mod errors;
pub mod flow_coef;
pub mod godley;
pub mod graph;
pub mod integrator;
pub mod model;
pub mod operation;
pub mod order;
pub mod simulation;
pub mod store;
pub mod variable;

pub type FloatValue = f64;
pub type Time = f64;

pub use config::{DivisionPolicy, DriftPolicy, IntegrationMethod, SimulationConfig};
pub use errors::{SimError, SimResult};
pub use godley::{AssetClass, BalanceReport, GodleyTable};
pub use model::{Model, ModelBuilder, ModelItem};
pub use operation::OperationType;
pub use simulation::{RunState, Session, SimulationState};
pub use store::VariableStore;
pub use variable::{Variable, VariableKind};
