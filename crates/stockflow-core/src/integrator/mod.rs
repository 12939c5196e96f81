//! Numerical integration of stocks.
//!
//! The integrator advances every integral by one step using an [`EvalPlan`] as the
//! right-hand side. It never writes to the variable store: callers receive the new
//! stock state and decide whether to commit it.

mod system;

use crate::config::{DivisionPolicy, IntegrationMethod, SimulationConfig};
use crate::errors::{SimError, SimResult};
use crate::order::EvalPlan;
use crate::{FloatValue, Time};
use nalgebra::DVector;
use ode_solvers::{Dopri5, Rk4};
use std::cell::RefCell;
use std::fmt;
use system::{FlowSystem, State};
use tracing::warn;

/// Advances stocks with a configurable scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct Integrator {
    method: IntegrationMethod,
    min_step_size: Time,
    relative_tolerance: FloatValue,
    absolute_tolerance: FloatValue,
    division: DivisionPolicy,
}

impl Integrator {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            method: config.method,
            min_step_size: config.min_step_size,
            relative_tolerance: config.relative_tolerance,
            absolute_tolerance: config.absolute_tolerance,
            division: config.division_policy,
        }
    }

    pub fn method(&self) -> IntegrationMethod {
        self.method
    }

    /// Integrate the stocks of `plan` from `t` to `t + dt`.
    ///
    /// `committed` holds the current store values and is only read. The returned
    /// state is in integral order (see [`EvalPlan::integrals`]).
    pub fn advance(
        &self,
        plan: &EvalPlan,
        committed: &[FloatValue],
        t: Time,
        dt: Time,
    ) -> SimResult<DVector<FloatValue>> {
        let y0 = plan.state(committed);
        if plan.dimension() == 0 {
            return Ok(y0);
        }

        let y1 = match self.method {
            IntegrationMethod::Euler => self.euler(plan, committed, t, dt, y0.clone())?,
            IntegrationMethod::RungeKutta4 => self.rk4(plan, committed, t, dt, y0.clone())?,
            IntegrationMethod::Adaptive => self.adaptive(plan, committed, t, dt, y0.clone())?,
        };

        for (i, (before, after)) in y0.iter().zip(y1.iter()).enumerate() {
            if !after.is_finite() && before.is_finite() {
                return Err(SimError::NonFiniteValue {
                    node: plan.integrals()[i].node.index(),
                    kind: "integrate".to_string(),
                    value: *after,
                    t: t + dt,
                });
            }
        }
        Ok(y1)
    }

    fn euler(
        &self,
        plan: &EvalPlan,
        committed: &[FloatValue],
        t: Time,
        dt: Time,
        y: State,
    ) -> SimResult<State> {
        let error = RefCell::new(None);
        let system = FlowSystem::new(plan, committed, t, self.division, &error);
        let dy = system.derivatives(0.0, &y)?;
        Ok(y + dy * dt)
    }

    /// A single classical Runge-Kutta step of size `dt`.
    fn rk4(
        &self,
        plan: &EvalPlan,
        committed: &[FloatValue],
        t: Time,
        dt: Time,
        y: State,
    ) -> SimResult<State> {
        let error = RefCell::new(None);
        let system = FlowSystem::new(plan, committed, t, self.division, &error);
        let mut solver = Rk4::new(system, 0.0, y, dt, dt);
        let outcome = solver.integrate();
        if let Some(e) = error.take() {
            return Err(e);
        }
        outcome.map_err(|e| SimError::Integration {
            t,
            details: format!("{:?}", e),
        })?;
        last_state(solver.results().get().1, t)
    }

    /// Dormand-Prince with error control. Falls back to fixed Runge-Kutta
    /// sub-steps of the minimum step size when the adaptive scheme gives up.
    fn adaptive(
        &self,
        plan: &EvalPlan,
        committed: &[FloatValue],
        t: Time,
        dt: Time,
        y: State,
    ) -> SimResult<State> {
        let error = RefCell::new(None);
        let system = FlowSystem::new(plan, committed, t, self.division, &error);
        let mut solver = Dopri5::new(
            system,
            0.0,
            dt,
            0.0,
            y.clone(),
            self.relative_tolerance,
            self.absolute_tolerance,
        );
        let outcome = solver.integrate();
        if let Some(e) = error.take() {
            return Err(e);
        }
        match outcome {
            Ok(_) => last_state(solver.results().get().1, t),
            Err(e) => self.fail_over(plan, committed, t, dt, y, e),
        }
    }

    /// Cover `[t, t + dt]` with fixed Runge-Kutta sub-steps of at most the minimum
    /// step size, after the adaptive scheme gave up with `reason`.
    fn fail_over(
        &self,
        plan: &EvalPlan,
        committed: &[FloatValue],
        t: Time,
        dt: Time,
        y: State,
        reason: impl fmt::Debug,
    ) -> SimResult<State> {
        let substeps = (dt / self.min_step_size).ceil().max(1.0) as usize;
        warn!(
            t = t,
            error = ?reason,
            min_step_size = self.min_step_size,
            substeps = substeps,
            "Adaptive integration failed; falling back to the minimum step size"
        );
        let h = dt / substeps as Time;
        let mut y = y;
        for i in 0..substeps {
            y = self.rk4(plan, committed, t + i as Time * h, h, y)?;
        }
        Ok(y)
    }
}

fn last_state(states: &[State], t: Time) -> SimResult<State> {
    states.last().cloned().ok_or(SimError::Integration {
        t,
        details: "solver produced no output".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModelGraph;
    use crate::operation::OperationType;
    use crate::store::VariableStore;
    use crate::variable::Variable;
    use approx::assert_relative_eq;

    /// dK/dt = 0.5 * K
    fn growth() -> (EvalPlan, VariableStore) {
        let mut store = VariableStore::new();
        store.register(Variable::stock("K", 1.0)).unwrap();
        let mut graph = ModelGraph::new();
        let k = graph.add_integral("K");
        let rate = graph.add_operation(OperationType::Constant(0.5));
        let mul = graph.add_operation(OperationType::Multiply);
        graph.wire(k, mul, 0).unwrap();
        graph.wire(rate, mul, 1).unwrap();
        graph.wire(mul, k, 0).unwrap();
        (EvalPlan::new(&graph, &store).unwrap(), store)
    }

    fn integrator(method: IntegrationMethod) -> Integrator {
        Integrator::from_config(&SimulationConfig::default().with_method(method))
    }

    #[test]
    fn euler_step() {
        let (plan, store) = growth();
        let y = integrator(IntegrationMethod::Euler)
            .advance(&plan, &store.snapshot(), 0.0, 0.1)
            .unwrap();
        assert_relative_eq!(y[0], 1.05);
    }

    #[test]
    fn rk4_step() {
        let (plan, store) = growth();
        let y = integrator(IntegrationMethod::RungeKutta4)
            .advance(&plan, &store.snapshot(), 0.0, 0.1)
            .unwrap();
        // Exact RK4 polynomial for a linear ODE: 1 + h + h^2/2 + h^3/6 + h^4/24, h = 0.05
        let h: f64 = 0.05;
        let expected = 1.0 + h + h.powi(2) / 2.0 + h.powi(3) / 6.0 + h.powi(4) / 24.0;
        assert_relative_eq!(y[0], expected, epsilon = 1e-14);
    }

    #[test]
    fn adaptive_step_is_accurate() {
        let (plan, store) = growth();
        let y = integrator(IntegrationMethod::Adaptive)
            .advance(&plan, &store.snapshot(), 0.0, 0.1)
            .unwrap();
        assert_relative_eq!(y[0], (0.05f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn committed_values_are_untouched() {
        let (plan, store) = growth();
        let committed = store.snapshot();
        integrator(IntegrationMethod::RungeKutta4)
            .advance(&plan, &committed, 0.0, 0.1)
            .unwrap();
        assert_eq!(committed, store.snapshot());
    }

    #[test]
    fn evaluation_errors_abort_the_step() {
        let mut store = VariableStore::new();
        store.register(Variable::stock("S", 1.0)).unwrap();
        let mut graph = ModelGraph::new();
        let s = graph.add_integral("S");
        let zero = graph.add_operation(OperationType::Constant(0.0));
        let div = graph.add_operation(OperationType::Divide);
        graph.wire(s, div, 0).unwrap();
        graph.wire(zero, div, 1).unwrap();
        graph.wire(div, s, 0).unwrap();
        let plan = EvalPlan::new(&graph, &store).unwrap();

        for method in [
            IntegrationMethod::Euler,
            IntegrationMethod::RungeKutta4,
            IntegrationMethod::Adaptive,
        ] {
            assert_eq!(
                integrator(method).advance(&plan, &store.snapshot(), 0.0, 0.1),
                Err(SimError::DivisionByZero { node: div.index() })
            );
        }
    }

    #[test]
    fn failover_takes_minimum_steps() {
        let (plan, store) = growth();
        let mut config =
            SimulationConfig::default().with_method(IntegrationMethod::Adaptive);
        config.min_step_size = 0.03;
        let adaptive = Integrator::from_config(&config);
        let rk4 = integrator(IntegrationMethod::RungeKutta4);

        let committed = store.snapshot();
        let y0 = plan.state(&committed);
        let y = adaptive
            .fail_over(&plan, &committed, 0.0, 0.1, y0.clone(), "step size too small")
            .unwrap();

        // ceil(0.1 / 0.03) = 4 sub-steps
        let h = 0.1 / 4.0;
        let mut expected = y0;
        for i in 0..4 {
            expected = rk4
                .rk4(&plan, &committed, i as f64 * h, h, expected)
                .unwrap();
        }
        assert_eq!(y, expected);
        assert_relative_eq!(y[0], (0.05f64).exp(), max_relative = 1e-9);
    }

    #[test]
    fn failover_propagates_evaluation_errors() {
        let mut store = VariableStore::new();
        store.register(Variable::stock("S", 1.0)).unwrap();
        let mut graph = ModelGraph::new();
        let s = graph.add_integral("S");
        let zero = graph.add_operation(OperationType::Constant(0.0));
        let div = graph.add_operation(OperationType::Divide);
        graph.wire(s, div, 0).unwrap();
        graph.wire(zero, div, 1).unwrap();
        graph.wire(div, s, 0).unwrap();
        let plan = EvalPlan::new(&graph, &store).unwrap();

        let committed = store.snapshot();
        assert_eq!(
            integrator(IntegrationMethod::Adaptive).fail_over(
                &plan,
                &committed,
                0.0,
                0.1,
                plan.state(&committed),
                "step size too small"
            ),
            Err(SimError::DivisionByZero { node: div.index() })
        );
    }
}
