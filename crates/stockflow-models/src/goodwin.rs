//! Goodwin growth cycle
//!
//! Output is produced from capital at a fixed capital-output ratio, employment follows
//! output through labour productivity, and the wage rate responds to the employment rate
//! through a linear Phillips curve. All profit is invested:
//!
//! $$ Y = K / v, \quad L = Y / a, \quad \lambda = L / N $$
//!
//! $$ \frac{dK}{dt} = (Y - w L) - \delta K $$
//!
//! $$ \frac{da}{dt} = \alpha a, \quad \frac{dN}{dt} = \beta N $$
//!
//! $$ \frac{dw}{dt} = w (\rho \lambda - \gamma) $$
//!
//! The employment rate and wage share cycle around their equilibrium rather than settle.

use serde::{Deserialize, Serialize};
use stockflow_core::errors::SimResult;
use stockflow_core::model::{Model, ModelBuilder};
use stockflow_core::operation::OperationType;
use stockflow_core::variable::Variable;
use stockflow_core::FloatValue;

use crate::define_binary;

/// Parameters for the Goodwin model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoodwinParameters {
    /// Initial capital stock
    pub capital: FloatValue,
    /// Initial labour productivity
    pub productivity: FloatValue,
    /// Initial population
    pub population: FloatValue,
    /// Initial wage rate
    pub wage: FloatValue,
    /// Capital-output ratio
    pub v: FloatValue,
    /// Productivity growth rate
    /// unit: 1 / yr
    pub alpha: FloatValue,
    /// Population growth rate
    /// unit: 1 / yr
    pub beta: FloatValue,
    /// Depreciation rate
    /// unit: 1 / yr
    pub delta: FloatValue,
    /// Phillips curve intercept
    pub gamma: FloatValue,
    /// Phillips curve slope
    pub rho: FloatValue,
}

impl Default for GoodwinParameters {
    fn default() -> Self {
        Self {
            capital: 300.0,
            productivity: 1.0,
            population: 110.0,
            wage: 0.85,
            v: 3.0,
            alpha: 0.02,
            beta: 0.01,
            delta: 0.01,
            gamma: 4.8,
            rho: 5.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoodwinModel {
    pub parameters: GoodwinParameters,
}

impl GoodwinModel {
    pub fn from_parameters(parameters: GoodwinParameters) -> Self {
        Self { parameters }
    }

    pub fn build(&self) -> SimResult<Model> {
        let p = &self.parameters;
        let mut builder = ModelBuilder::new();
        builder.with_variables([
            Variable::stock("K", p.capital),
            Variable::stock("a", p.productivity),
            Variable::stock("N", p.population),
            Variable::stock("w", p.wage),
            Variable::flow("Y"),
            Variable::flow("L"),
            Variable::flow("lambda"),
            Variable::flow("Wages"),
            Variable::flow("Profit"),
            Variable::flow("Depreciation"),
            Variable::flow("NetInvestment"),
            Variable::flow("ProductivityGrowth"),
            Variable::flow("PopulationGrowth"),
            Variable::flow("Bargaining"),
            Variable::flow("WageGrowth"),
            Variable::parameter("v", p.v),
            Variable::parameter("alpha", p.alpha),
            Variable::parameter("beta", p.beta),
            Variable::parameter("delta", p.delta),
            Variable::parameter("gamma", p.gamma),
            Variable::parameter("rho", p.rho),
        ]);

        define_binary(&mut builder, "Y", OperationType::Divide, "K", "v");
        define_binary(&mut builder, "L", OperationType::Divide, "Y", "a");
        define_binary(&mut builder, "lambda", OperationType::Divide, "L", "N");
        define_binary(&mut builder, "Wages", OperationType::Multiply, "w", "L");
        define_binary(&mut builder, "Profit", OperationType::Subtract, "Y", "Wages");
        define_binary(&mut builder, "Depreciation", OperationType::Multiply, "delta", "K");
        let net_investment = define_binary(
            &mut builder,
            "NetInvestment",
            OperationType::Subtract,
            "Profit",
            "Depreciation",
        );
        builder.integral("K", net_investment);

        let productivity_growth = define_binary(
            &mut builder,
            "ProductivityGrowth",
            OperationType::Multiply,
            "alpha",
            "a",
        );
        builder.integral("a", productivity_growth);

        let population_growth =
            define_binary(&mut builder, "PopulationGrowth", OperationType::Multiply, "beta", "N");
        builder.integral("N", population_growth);

        // Phillips curve
        let rho = builder.variable("rho");
        let lambda = builder.variable("lambda");
        let pressure = builder.operation(OperationType::Multiply, &[rho, lambda]);
        let gamma = builder.variable("gamma");
        let bargaining = builder.operation(OperationType::Subtract, &[pressure, gamma]);
        builder.define("Bargaining", bargaining);
        let wage_growth =
            define_binary(&mut builder, "WageGrowth", OperationType::Multiply, "w", "Bargaining");
        builder.integral("w", wage_growth);

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stockflow_core::config::SimulationConfig;
    use stockflow_core::simulation::Session;

    #[test]
    fn initial_state() {
        let mut session = Session::default();
        session.load(GoodwinModel::default().build().unwrap()).unwrap();

        assert_relative_eq!(session.value("Y").unwrap(), 100.0);
        assert_relative_eq!(session.value("lambda").unwrap(), 100.0 / 110.0);
        assert_relative_eq!(session.value("Profit").unwrap(), 15.0, epsilon = 1e-12);
        assert_relative_eq!(session.value("NetInvestment").unwrap(), 12.0, epsilon = 1e-12);
        assert!(session.value("WageGrowth").unwrap() < 0.0);
    }

    #[test]
    fn employment_cycles() {
        let mut session = Session::new(SimulationConfig::default().with_step_size(0.1)).unwrap();
        session.load(GoodwinModel::default().build().unwrap()).unwrap();

        let mut lambdas = Vec::new();
        for _ in 0..500 {
            session.step().unwrap();
            lambdas.push(session.value("lambda").unwrap());
        }
        let max = lambdas.iter().cloned().fold(f64::MIN, f64::max);
        let min = lambdas.iter().cloned().fold(f64::MAX, f64::min);
        assert!(max > 0.96);
        assert!(min < 0.96);
        assert!(lambdas.iter().all(|l| l.is_finite() && *l > 0.0));
    }
}
