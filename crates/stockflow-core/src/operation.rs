//! The operator table.
//!
//! Operation kinds form a closed set. Each kind has a fixed arity and an evaluation
//! function looked up by kind, so adding a kind means adding a variant and a table
//! entry rather than a new type.

use crate::config::DivisionPolicy;
use crate::errors::{SimError, SimResult};
use crate::{FloatValue, Time};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of every node kind the engine understands, including `integrate`.
pub const OPERATION_NAMES: &[&str] = &[
    "constant",
    "time",
    "negate",
    "abs",
    "exp",
    "ln",
    "sqrt",
    "sin",
    "cos",
    "add",
    "subtract",
    "multiply",
    "divide",
    "pow",
    "min",
    "max",
    "linear_combination",
    "integrate",
];

/// Stateless operation kinds.
///
/// `integrate` is not a variant here: integrals own state and are represented by
/// [`NodeKind::Integral`](crate::graph::NodeKind::Integral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Constant(FloatValue),
    Time,
    Negate,
    Abs,
    Exp,
    Ln,
    Sqrt,
    Sin,
    Cos,
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    Min,
    Max,
    /// `Σ coefficients[i] * inputs[i]`, summed in port order.
    LinearCombination(Vec<FloatValue>),
}

type UnaryFn = fn(FloatValue) -> FloatValue;
type BinaryFn = fn(FloatValue, FloatValue) -> FloatValue;

/// Inputs shared by every evaluation within one pass.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    pub t: Time,
    pub division: DivisionPolicy,
}

impl OperationType {
    /// Look up a parameterless kind by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "time" => OperationType::Time,
            "negate" => OperationType::Negate,
            "abs" => OperationType::Abs,
            "exp" => OperationType::Exp,
            "ln" => OperationType::Ln,
            "sqrt" => OperationType::Sqrt,
            "sin" => OperationType::Sin,
            "cos" => OperationType::Cos,
            "add" => OperationType::Add,
            "subtract" => OperationType::Subtract,
            "multiply" => OperationType::Multiply,
            "divide" => OperationType::Divide,
            "pow" => OperationType::Pow,
            "min" => OperationType::Min,
            "max" => OperationType::Max,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationType::Constant(_) => "constant",
            OperationType::Time => "time",
            OperationType::Negate => "negate",
            OperationType::Abs => "abs",
            OperationType::Exp => "exp",
            OperationType::Ln => "ln",
            OperationType::Sqrt => "sqrt",
            OperationType::Sin => "sin",
            OperationType::Cos => "cos",
            OperationType::Add => "add",
            OperationType::Subtract => "subtract",
            OperationType::Multiply => "multiply",
            OperationType::Divide => "divide",
            OperationType::Pow => "pow",
            OperationType::Min => "min",
            OperationType::Max => "max",
            OperationType::LinearCombination(_) => "linear_combination",
        }
    }

    /// Number of input ports.
    pub fn arity(&self) -> usize {
        match self {
            OperationType::Constant(_) | OperationType::Time => 0,
            OperationType::LinearCombination(coefficients) => coefficients.len(),
            op if op.unary().is_some() => 1,
            _ => 2,
        }
    }

    fn unary(&self) -> Option<UnaryFn> {
        let f: UnaryFn = match self {
            OperationType::Negate => |x| -x,
            OperationType::Abs => FloatValue::abs,
            OperationType::Exp => FloatValue::exp,
            OperationType::Ln => FloatValue::ln,
            OperationType::Sqrt => FloatValue::sqrt,
            OperationType::Sin => FloatValue::sin,
            OperationType::Cos => FloatValue::cos,
            _ => return None,
        };
        Some(f)
    }

    fn binary(&self) -> Option<BinaryFn> {
        let f: BinaryFn = match self {
            OperationType::Add => |a, b| a + b,
            OperationType::Subtract => |a, b| a - b,
            OperationType::Multiply => |a, b| a * b,
            OperationType::Divide => |a, b| a / b,
            OperationType::Pow => FloatValue::powf,
            OperationType::Min => FloatValue::min,
            OperationType::Max => FloatValue::max,
            _ => return None,
        };
        Some(f)
    }

    /// Evaluate the operation for node `node`.
    ///
    /// A non-finite result computed from finite inputs is an error; non-finite
    /// inputs propagate unchanged so the error is reported once, where it arose.
    pub fn evaluate(
        &self,
        node: usize,
        inputs: &[FloatValue],
        ctx: &EvalContext,
    ) -> SimResult<FloatValue> {
        debug_assert_eq!(inputs.len(), self.arity());

        let value = match self {
            OperationType::Constant(value) => *value,
            OperationType::Time => ctx.t,
            OperationType::LinearCombination(coefficients) => coefficients
                .iter()
                .zip(inputs)
                .map(|(coef, input)| coef * input)
                .sum(),
            OperationType::Divide => {
                if inputs[1] == 0.0 {
                    match ctx.division {
                        DivisionPolicy::Error => return Err(SimError::DivisionByZero { node }),
                        DivisionPolicy::Ieee => return Ok(inputs[0] / inputs[1]),
                    }
                }
                inputs[0] / inputs[1]
            }
            op => match (op.unary(), op.binary()) {
                (Some(f), _) => f(inputs[0]),
                (_, Some(f)) => f(inputs[0], inputs[1]),
                _ => unreachable!("every operation kind is nullary, unary or binary"),
            },
        };

        if !value.is_finite() && inputs.iter().all(|x| x.is_finite()) {
            return Err(SimError::NonFiniteValue {
                node,
                kind: self.name().to_string(),
                value,
                t: ctx.t,
            });
        }
        Ok(value)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Constant(value) => write!(f, "constant({})", value),
            OperationType::LinearCombination(coefficients) => {
                write!(f, "linear_combination({:?})", coefficients)
            }
            op => write!(f, "{}", op.name()),
        }
    }
}
