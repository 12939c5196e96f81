use crate::config::DivisionPolicy;
use crate::errors::SimError;
use crate::order::EvalPlan;
use crate::{FloatValue, Time};
use nalgebra::DVector;
use ode_solvers::System;
use std::cell::RefCell;

pub(crate) type State = DVector<FloatValue>;

/// Right-hand side of the stock ODE.
///
/// Solvers integrate over local time `[0, dt]`; `t0` shifts it back to model time.
/// Every stage evaluates on a private copy of the committed values, so perturbed
/// stock states never reach the variable store.
pub(crate) struct FlowSystem<'a> {
    plan: &'a EvalPlan,
    committed: &'a [FloatValue],
    scratch: RefCell<Vec<FloatValue>>,
    t0: Time,
    division: DivisionPolicy,
    error: &'a RefCell<Option<SimError>>,
}

impl<'a> FlowSystem<'a> {
    pub(crate) fn new(
        plan: &'a EvalPlan,
        committed: &'a [FloatValue],
        t0: Time,
        division: DivisionPolicy,
        error: &'a RefCell<Option<SimError>>,
    ) -> Self {
        Self {
            plan,
            committed,
            scratch: RefCell::new(committed.to_vec()),
            t0,
            division,
            error,
        }
    }

    /// Derivatives at local time `x` and state `y`.
    pub(crate) fn derivatives(&self, x: Time, y: &State) -> Result<State, SimError> {
        let mut scratch = self.scratch.borrow_mut();
        scratch.copy_from_slice(self.committed);
        self.plan.write_state(&mut scratch, y.as_slice());
        let dy = self.plan.evaluate(&mut scratch, self.t0 + x, self.division)?;
        Ok(DVector::from_vec(dy))
    }
}

impl System<Time, State> for FlowSystem<'_> {
    fn system(&self, x: Time, y: &State, dy: &mut State) {
        if self.error.borrow().is_some() {
            dy.fill(0.0);
            return;
        }
        match self.derivatives(x, y) {
            Ok(value) => dy.copy_from(&value),
            Err(e) => {
                dy.fill(0.0);
                *self.error.borrow_mut() = Some(e);
            }
        }
    }

    fn solout(&mut self, _x: Time, _y: &State, _dy: &State) -> bool {
        self.error.borrow().is_some()
    }
}
