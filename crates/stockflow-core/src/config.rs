//! Simulation configuration.
//!
//! Numerical defaults live here rather than in the engine so that hosts can tune
//! them per run, typically from a TOML document:
//!
//! ```toml
//! step_size = 0.01
//! method = "rk4"
//! drift_policy = "warn"
//! ```

use crate::errors::{SimError, SimResult};
use crate::{FloatValue, Time};
use serde::{Deserialize, Serialize};

/// Numerical scheme used to advance stocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Explicit first-order forward Euler.
    Euler,
    /// Classical fixed-step 4th-order Runge-Kutta.
    #[default]
    #[serde(rename = "rk4")]
    RungeKutta4,
    /// Dormand-Prince 5(4) with error control inside each step.
    Adaptive,
}

/// What to do when a Godley table drifts out of balance during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    Ignore,
    /// Log a warning and keep going.
    #[default]
    Warn,
    /// Reject the step.
    Fail,
}

/// Behaviour of `divide` when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionPolicy {
    /// Abort the step with `DivisionByZero`.
    #[default]
    Error,
    /// Follow IEEE-754 and let infinities propagate.
    Ieee,
}

/// Settings for a simulation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Time advanced by a single `step()`.
    pub step_size: Time,
    pub method: IntegrationMethod,
    /// Smallest sub-step the adaptive scheme falls back to.
    pub min_step_size: Time,
    pub relative_tolerance: FloatValue,
    pub absolute_tolerance: FloatValue,
    /// Allowed residual of `assets - (liabilities + equity)` at load.
    pub initial_balance_tolerance: FloatValue,
    /// Allowed residual after each step.
    pub drift_tolerance: FloatValue,
    pub drift_policy: DriftPolicy,
    pub division_policy: DivisionPolicy,
    /// Number of steps making up one reporting epoch.
    pub n_steps: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            method: IntegrationMethod::default(),
            min_step_size: 1e-6,
            relative_tolerance: 1e-6,
            absolute_tolerance: 1e-9,
            initial_balance_tolerance: 1e-10,
            drift_tolerance: 1e-8,
            drift_policy: DriftPolicy::default(),
            division_policy: DivisionPolicy::default(),
            n_steps: 1,
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> SimResult<Self> {
        let config: SimulationConfig =
            toml::from_str(text).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SimResult<String> {
        toml::to_string(self).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn with_step_size(mut self, step_size: Time) -> Self {
        self.step_size = step_size;
        self
    }

    pub fn with_method(mut self, method: IntegrationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_drift_policy(mut self, policy: DriftPolicy) -> Self {
        self.drift_policy = policy;
        self
    }

    pub fn with_division_policy(mut self, policy: DivisionPolicy) -> Self {
        self.division_policy = policy;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(SimError::Config(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            )));
        }
        if !(self.min_step_size > 0.0 && self.min_step_size <= self.step_size) {
            return Err(SimError::Config(format!(
                "min_step_size must be in (0, step_size], got {}",
                self.min_step_size
            )));
        }
        let tolerances = [
            ("relative_tolerance", self.relative_tolerance),
            ("absolute_tolerance", self.absolute_tolerance),
            ("initial_balance_tolerance", self.initial_balance_tolerance),
            ("drift_tolerance", self.drift_tolerance),
        ];
        for (name, value) in tolerances {
            if !(value >= 0.0) {
                return Err(SimError::Config(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.n_steps == 0 {
            return Err(SimError::Config("n_steps must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.method, IntegrationMethod::RungeKutta4);
        assert_eq!(config.drift_policy, DriftPolicy::Warn);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
step_size = 0.1
method = "euler"
division_policy = "ieee"
"#,
        )
        .unwrap();
        assert_eq!(config.step_size, 0.1);
        assert_eq!(config.method, IntegrationMethod::Euler);
        assert_eq!(config.division_policy, DivisionPolicy::Ieee);
        assert_eq!(config.drift_tolerance, 1e-8);
    }

    #[test]
    fn method_names() {
        let config = SimulationConfig::from_toml_str(r#"method = "rk4""#).unwrap();
        assert_eq!(config.method, IntegrationMethod::RungeKutta4);
        let config = SimulationConfig::from_toml_str(r#"method = "adaptive""#).unwrap();
        assert_eq!(config.method, IntegrationMethod::Adaptive);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            SimulationConfig::from_toml_str("step_size = -1.0"),
            Err(SimError::Config(_))
        ));
        assert!(matches!(
            SimulationConfig::from_toml_str("n_steps = 0"),
            Err(SimError::Config(_))
        ));
        assert!(matches!(
            SimulationConfig::from_toml_str("unknown = 1"),
            Err(SimError::Config(_))
        ));
        assert!(matches!(
            SimulationConfig::from_toml_str("step_size = 0.01\nmin_step_size = 0.1"),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn toml_round_trip() {
        let config = SimulationConfig::default().with_method(IntegrationMethod::Adaptive);
        let text = config.to_toml_string().unwrap();
        assert_eq!(SimulationConfig::from_toml_str(&text).unwrap(), config);
    }
}
