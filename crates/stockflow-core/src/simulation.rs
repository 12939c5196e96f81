//! The simulation controller.
//!
//! A [`Session`] owns a loaded [`Model`], its evaluation plan and the simulation
//! state. It is the only thing that mutates variable values once a model is loaded,
//! and it does so one whole step at a time: a step either commits every stock, flow
//! and auxiliary value for the new time or leaves the store untouched.

use crate::config::{DriftPolicy, SimulationConfig};
use crate::errors::{SimError, SimResult};
use crate::godley::BalanceReport;
use crate::graph::find_unbroken_cycle;
use crate::integrator::Integrator;
use crate::model::{Model, ModelItem};
use crate::order::EvalPlan;
use crate::store::VariableStore;
use crate::{FloatValue, Time};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Run/pause state of a session.
///
/// The state only tells a driving loop whether to keep calling `step()`. A manual
/// `step()` is performed in any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Time and run state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub t: Time,
    pub step_size: Time,
    pub run_state: RunState,
    /// Steps completed since load or reset.
    pub steps: usize,
    /// Steps per reporting epoch.
    pub n_steps: usize,
}

impl SimulationState {
    fn new(config: &SimulationConfig) -> Self {
        Self {
            t: 0.0,
            step_size: config.step_size,
            run_state: RunState::Stopped,
            steps: 0,
            n_steps: config.n_steps,
        }
    }
}

#[derive(Debug)]
struct Loaded {
    model: Model,
    plan: EvalPlan,
    /// Values right after load, used by `reset`.
    initial: Vec<FloatValue>,
}

/// A simulation session driving one model at a time.
#[derive(Debug)]
pub struct Session {
    config: SimulationConfig,
    integrator: Integrator,
    state: SimulationState,
    loaded: Option<Loaded>,
    last_drift: Vec<BalanceReport>,
}

impl Default for Session {
    fn default() -> Self {
        let config = SimulationConfig::default();
        Self {
            integrator: Integrator::from_config(&config),
            state: SimulationState::new(&config),
            config,
            loaded: None,
            last_drift: vec![],
        }
    }
}

impl Session {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Self {
            integrator: Integrator::from_config(&config),
            state: SimulationState::new(&config),
            config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration. Time and values are kept; the new step size
    /// applies from the next step.
    pub fn configure(&mut self, config: SimulationConfig) -> SimResult<()> {
        config.validate()?;
        self.integrator = Integrator::from_config(&config);
        self.state.step_size = config.step_size;
        self.state.n_steps = config.n_steps;
        self.config = config;
        Ok(())
    }

    /// Install `model`, replacing any previous one.
    ///
    /// Resolves initial conditions, builds the evaluation plan, evaluates every
    /// auxiliary at t=0 and checks that every Godley table balances. On error the
    /// previous session is left in place.
    pub fn load(&mut self, mut model: Model) -> SimResult<()> {
        // Deserialised models never went through the wiring checks
        if let Some((from, to)) = find_unbroken_cycle(model.graph()) {
            return Err(SimError::CycleWithoutIntegration {
                from: from.index(),
                to: to.index(),
            });
        }
        model.variables_mut().resolve_initial_values()?;
        let plan = model.plan()?;

        let mut values = model.variables().snapshot();
        plan.evaluate(&mut values, 0.0, self.config.division_policy)?;
        let balances = model.balances(&values)?;
        for report in &balances {
            report.check_initial(self.config.initial_balance_tolerance)?;
        }
        model.variables_mut().restore(&values);

        debug!(
            variables = model.variables().len(),
            stocks = plan.dimension(),
            godley_tables = model.godley_tables().len(),
            "Loaded model"
        );

        self.loaded = Some(Loaded {
            model,
            plan,
            initial: values,
        });
        self.state = SimulationState::new(&self.config);
        self.last_drift = balances;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn loaded(&self) -> SimResult<&Loaded> {
        self.loaded.as_ref().ok_or(SimError::NoModelLoaded)
    }

    /// Advance one step and return the new time.
    ///
    /// Numeric errors, and drift under [`DriftPolicy::Fail`], abort the step with no
    /// state change.
    pub fn step(&mut self) -> SimResult<Time> {
        let loaded = self.loaded.as_mut().ok_or(SimError::NoModelLoaded)?;
        let t = self.state.t;
        let dt = self.state.step_size;
        let t_next = t + dt;

        let mut values = loaded.model.variables().snapshot();
        let stocks = self.integrator.advance(&loaded.plan, &values, t, dt)?;
        loaded.plan.write_state(&mut values, stocks.as_slice());
        loaded
            .plan
            .evaluate(&mut values, t_next, self.config.division_policy)?;

        let balances = loaded.model.balances(&values)?;
        let tolerance = self.config.drift_tolerance;
        match self.config.drift_policy {
            DriftPolicy::Ignore => {}
            DriftPolicy::Warn => {
                for report in balances.iter().filter(|r| !r.is_balanced(tolerance)) {
                    warn!(
                        table = %report.table,
                        t = t_next,
                        residual = report.residual(),
                        tolerance = tolerance,
                        "Godley table drifted out of balance"
                    );
                }
            }
            DriftPolicy::Fail => {
                for report in &balances {
                    report.check_drift(t_next, tolerance)?;
                }
            }
        }

        loaded.model.variables_mut().restore(&values);
        self.last_drift = balances;
        self.state.t = t_next;
        self.state.steps += 1;
        Ok(t_next)
    }

    /// Perform one epoch of `n_steps` steps.
    pub fn run_epoch(&mut self) -> SimResult<Time> {
        for _ in 0..self.state.n_steps {
            self.step()?;
        }
        Ok(self.state.t)
    }

    /// Set whether a driving loop should keep stepping.
    pub fn running(&mut self, running: bool) {
        self.state.run_state = if running {
            RunState::Running
        } else {
            RunState::Paused
        };
    }

    pub fn is_running(&self) -> bool {
        self.state.run_state == RunState::Running
    }

    /// Steps per reporting epoch. Does not change the step size, and is kept
    /// across `load` and `reset`.
    pub fn set_n_steps(&mut self, n_steps: usize) -> SimResult<()> {
        if n_steps == 0 {
            return Err(SimError::Config("n_steps must be at least 1".to_string()));
        }
        self.config.n_steps = n_steps;
        self.state.n_steps = n_steps;
        Ok(())
    }

    pub fn n_steps(&self) -> usize {
        self.state.n_steps
    }

    /// Completed epochs.
    pub fn epoch(&self) -> usize {
        self.state.steps / self.state.n_steps
    }

    /// Current simulation time.
    pub fn t(&self) -> Time {
        self.state.t
    }

    pub fn step_size(&self) -> Time {
        self.state.step_size
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Return to t=0 with the values the model had right after loading.
    pub fn reset(&mut self) -> SimResult<()> {
        let loaded = self.loaded.as_mut().ok_or(SimError::NoModelLoaded)?;
        loaded.model.variables_mut().restore(&loaded.initial);
        self.last_drift = loaded.model.balances(&loaded.initial)?;
        self.state = SimulationState::new(&self.config);
        Ok(())
    }

    /// Re-check every Godley table against the current values.
    pub fn check_accounting(&self) -> SimResult<Vec<BalanceReport>> {
        let loaded = self.loaded()?;
        let balances = loaded
            .model
            .balances(&loaded.model.variables().snapshot())?;
        for report in &balances {
            report.check_drift(self.state.t, self.config.drift_tolerance)?;
        }
        Ok(balances)
    }

    /// Balance reports computed by the most recent step (or load).
    pub fn last_drift(&self) -> &[BalanceReport] {
        &self.last_drift
    }

    /// Current value of a variable.
    pub fn value(&self, name: &str) -> SimResult<FloatValue> {
        self.loaded()?.model.variables().get(name)
    }

    /// Overwrite a variable between steps, e.g. to tweak a parameter.
    pub fn set_value(&mut self, name: &str, value: FloatValue) -> SimResult<()> {
        let loaded = self.loaded.as_mut().ok_or(SimError::NoModelLoaded)?;
        loaded.model.variables_mut().set(name, value)
    }

    pub fn variables(&self) -> SimResult<&VariableStore> {
        Ok(self.loaded()?.model.variables())
    }

    pub fn model(&self) -> Option<&Model> {
        self.loaded.as_ref().map(|l| &l.model)
    }

    pub fn plan(&self) -> Option<&EvalPlan> {
        self.loaded.as_ref().map(|l| &l.plan)
    }

    /// Graph nodes of the loaded model, in declaration order.
    pub fn items(&self) -> SimResult<Vec<ModelItem<'_>>> {
        Ok(self.loaded()?.model.items())
    }
}
