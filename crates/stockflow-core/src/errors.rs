use crate::{FloatValue, Time};
use thiserror::Error;

/// Error type for invalid models and failed simulation steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("No variable named '{0}' has been registered")]
    NotFound(String),
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),
    #[error("Variable '{name}' is defined by more than one wire (nodes {first} and {second})")]
    DuplicateDefinition {
        name: String,
        first: usize,
        second: usize,
    },
    #[error("Input port {port} of node {node} ({kind}) is not connected")]
    DanglingInput {
        node: usize,
        port: usize,
        kind: String,
    },
    #[error("Input port {port} of node {node} is already connected")]
    InputAlreadyConnected { node: usize, port: usize },
    #[error("Node {node} has no {direction} port {port}")]
    InvalidPort {
        node: usize,
        port: usize,
        direction: &'static str,
    },
    #[error("The model graph contains a cycle that is not broken by an integral (nodes {nodes:?})")]
    CyclicGraph { nodes: Vec<usize> },
    #[error("Connecting node {from} to node {to} would create a cycle with no integral on it")]
    CycleWithoutIntegration { from: usize, to: usize },
    #[error("Division by zero in node {node}")]
    DivisionByZero { node: usize },
    #[error("Node {node} ({kind}) produced a non-finite value {value} at t={t}")]
    NonFiniteValue {
        node: usize,
        kind: String,
        value: FloatValue,
        t: Time,
    },
    #[error("Godley table '{table}' is unbalanced at load: assets={assets}, liabilities + equity={liabilities_and_equity}, residual={residual}")]
    UnbalancedInitialConditions {
        table: String,
        assets: FloatValue,
        liabilities_and_equity: FloatValue,
        residual: FloatValue,
    },
    #[error("Godley table '{table}' row {row} ('{label}') does not balance for flow '{flow}' (net coefficient {net})")]
    UnbalancedFlowRow {
        table: String,
        row: usize,
        label: String,
        flow: String,
        net: FloatValue,
    },
    #[error("Godley table '{table}' drifted out of balance at t={t}: residual={residual} exceeds tolerance {tolerance}")]
    AccountingDrift {
        table: String,
        t: Time,
        residual: FloatValue,
        tolerance: FloatValue,
    },
    #[error("Stock '{stock}' in Godley table '{table}' has different flows than in table '{first_table}'")]
    InconsistentGodleyColumn {
        table: String,
        stock: String,
        first_table: String,
    },
    #[error("Cannot parse flow coefficient '{0}'")]
    InvalidFlowCoefficient(String),
    #[error("Initial condition of '{0}' depends on itself")]
    CircularInitialCondition(String),
    #[error("Integration failed at t={t}: {details}")]
    Integration { t: Time, details: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("No model has been loaded")]
    NoModelLoaded,
}

impl SimError {
    /// Structural errors describe an invalid model rather than a failed step.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SimError::NotFound(_)
                | SimError::DuplicateVariable(_)
                | SimError::DuplicateDefinition { .. }
                | SimError::DanglingInput { .. }
                | SimError::InputAlreadyConnected { .. }
                | SimError::InvalidPort { .. }
                | SimError::CyclicGraph { .. }
                | SimError::CycleWithoutIntegration { .. }
                | SimError::UnbalancedInitialConditions { .. }
                | SimError::UnbalancedFlowRow { .. }
                | SimError::InconsistentGodleyColumn { .. }
                | SimError::InvalidFlowCoefficient(_)
                | SimError::CircularInitialCondition(_)
        )
    }
}

/// Convenience type for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
