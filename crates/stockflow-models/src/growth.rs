//! Exponential growth
//!
//! A single stock growing at a constant rate:
//!
//! $$ \frac{dK}{dt} = g K $$

use serde::{Deserialize, Serialize};
use stockflow_core::errors::SimResult;
use stockflow_core::model::{Model, ModelBuilder};
use stockflow_core::operation::OperationType;
use stockflow_core::variable::Variable;
use stockflow_core::FloatValue;

use crate::define_binary;

/// Parameters for the growth model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthParameters {
    /// Initial value of the stock
    pub initial: FloatValue,
    /// Growth rate
    /// unit: 1 / yr
    pub rate: FloatValue,
}

impl Default for GrowthParameters {
    fn default() -> Self {
        Self {
            initial: 100.0,
            rate: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrowthModel {
    pub parameters: GrowthParameters,
}

impl GrowthModel {
    pub fn from_parameters(parameters: GrowthParameters) -> Self {
        Self { parameters }
    }

    pub fn build(&self) -> SimResult<Model> {
        let mut builder = ModelBuilder::new();
        builder
            .with_variable(Variable::stock("K", self.parameters.initial))
            .with_variable(Variable::flow("Growth"))
            .with_variable(Variable::parameter("g", self.parameters.rate));

        let growth = define_binary(&mut builder, "Growth", OperationType::Multiply, "g", "K");
        builder.integral("K", growth);
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build() {
        let model = GrowthModel::default().build().unwrap();
        let keys: Vec<&str> = model.variables().keys().collect();
        assert_eq!(keys, vec![":K", ":Growth", ":g"]);
        assert_eq!(model.plan().unwrap().dimension(), 1);
    }
}
