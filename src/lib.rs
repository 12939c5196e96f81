//! Stock-flow consistent system dynamics with Godley table accounting.
//!
//! This crate is the entry point for embedding hosts. It re-exports the engine in
//! [`core`] and the reference models in [`models`], and wraps a [`Session`] in an
//! [`Engine`] that adds enumeration helpers and a cooperative run loop.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use stockflow::models::MonetaryModel;
//! use stockflow::Engine;
//!
//! let mut engine = Engine::default();
//! engine.load(MonetaryModel::default().build()?)?;
//! engine.running(true);
//! engine.run_until(10.0, &AtomicBool::new(false))?;
//! for (name, value) in engine.variable_values()? {
//!     println!("{name} = {value}");
//! }
//! # Ok::<(), stockflow::core::SimError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub use stockflow_core as core;
pub use stockflow_models as models;

pub use stockflow_core::{
    FloatValue, Model, ModelBuilder, ModelItem, SimError, SimResult, SimulationConfig, Time,
};
use stockflow_core::Session;

/// Version of the engine as `major.minor.patch`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Values of every variable at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub t: Time,
    pub values: Vec<(String, FloatValue)>,
}

/// A simulation session with host-facing helpers.
#[derive(Debug, Default)]
pub struct Engine {
    session: Session,
}

impl Engine {
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        Ok(Self {
            session: Session::new(config)?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn load(&mut self, model: Model) -> SimResult<()> {
        self.session.load(model)
    }

    pub fn step(&mut self) -> SimResult<Time> {
        self.session.step()
    }

    pub fn t(&self) -> Time {
        self.session.t()
    }

    pub fn running(&mut self, running: bool) {
        self.session.running(running)
    }

    pub fn n_steps(&mut self, n_steps: usize) -> SimResult<()> {
        self.session.set_n_steps(n_steps)
    }

    pub fn value(&self, name: &str) -> SimResult<FloatValue> {
        self.session.value(name)
    }

    /// Qualified name and current value of every variable, in declaration order.
    pub fn variable_values(&self) -> SimResult<Vec<(String, FloatValue)>> {
        Ok(self
            .session
            .variables()?
            .iter()
            .map(|v| (v.name.clone(), v.value))
            .collect())
    }

    pub fn snapshot(&self) -> SimResult<Snapshot> {
        Ok(Snapshot {
            t: self.t(),
            values: self.variable_values()?,
        })
    }

    pub fn items(&self) -> SimResult<Vec<ModelItem<'_>>> {
        self.session.items()
    }

    /// Step while the session is running, `t` is short of `t_max` and `stop` is unset.
    ///
    /// The flags are checked between steps, never during one. Returns the time reached.
    pub fn run_until(&mut self, t_max: Time, stop: &AtomicBool) -> SimResult<Time> {
        let half_step = 0.5 * self.session.step_size();
        let mut steps = 0usize;
        while self.session.is_running()
            && !stop.load(Ordering::Relaxed)
            && self.session.t() + half_step < t_max
        {
            self.session.step()?;
            steps += 1;
        }
        debug!(steps, t = self.session.t(), "Run finished");
        Ok(self.session.t())
    }
}
