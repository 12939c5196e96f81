//! The variable store.
//!
//! Holds every named quantity of a model keyed by its qualified name. Lookups are
//! O(1) through a name index, enumeration follows declaration order, and writes are
//! visible to the next read immediately.

use crate::errors::{SimError, SimResult};
use crate::flow_coef::parse_terms;
use crate::variable::{normalise_name, Variable, VariableKind};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from qualified variable name to [`Variable`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableStore {
    variables: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl TryFrom<Vec<Variable>> for VariableStore {
    type Error = SimError;

    fn try_from(variables: Vec<Variable>) -> Result<Self, Self::Error> {
        let mut store = VariableStore::new();
        for variable in variables {
            store.register(variable)?;
        }
        Ok(store)
    }
}

impl From<VariableStore> for Vec<Variable> {
    fn from(store: VariableStore) -> Self {
        store.variables
    }
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new variable, returning its slot.
    ///
    /// Fails if a variable with the same qualified name already exists.
    pub fn register(&mut self, mut variable: Variable) -> SimResult<usize> {
        variable.name = normalise_name(&variable.name);
        if self.index.contains_key(&variable.name) {
            return Err(SimError::DuplicateVariable(variable.name));
        }
        let slot = self.variables.len();
        self.index.insert(variable.name.clone(), slot);
        self.variables.push(variable);
        Ok(slot)
    }

    /// Register a literal constant, reusing an existing one with the same value.
    pub fn constant(&mut self, value: FloatValue) -> usize {
        let variable = Variable::constant(value);
        match self.index.get(&variable.name) {
            Some(slot) => *slot,
            None => {
                let slot = self.variables.len();
                self.index.insert(variable.name.clone(), slot);
                self.variables.push(variable);
                slot
            }
        }
    }

    /// Slot of a variable, accepting unqualified names as globals.
    pub fn slot(&self, name: &str) -> SimResult<usize> {
        self.index
            .get(name)
            .or_else(|| self.index.get(&normalise_name(name)))
            .copied()
            .ok_or_else(|| SimError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_ok()
    }

    /// Current value of a variable.
    pub fn get(&self, name: &str) -> SimResult<FloatValue> {
        Ok(self.variables[self.slot(name)?].value)
    }

    /// Overwrite the value of a variable.
    pub fn set(&mut self, name: &str, value: FloatValue) -> SimResult<()> {
        let slot = self.slot(name)?;
        self.variables[slot].value = value;
        Ok(())
    }

    pub fn variable(&self, name: &str) -> SimResult<&Variable> {
        Ok(&self.variables[self.slot(name)?])
    }

    pub fn variable_mut(&mut self, name: &str) -> SimResult<&mut Variable> {
        let slot = self.slot(name)?;
        Ok(&mut self.variables[slot])
    }

    pub fn at(&self, slot: usize) -> &Variable {
        &self.variables[slot]
    }

    pub fn value_at(&self, slot: usize) -> FloatValue {
        self.variables[slot].value
    }

    pub fn set_at(&mut self, slot: usize, value: FloatValue) {
        self.variables[slot].value = value;
    }

    /// Qualified names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Variables of a given kind in declaration order.
    pub fn of_kind(&self, kind: VariableKind) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(move |v| v.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Copy of every value, indexed by slot.
    pub fn snapshot(&self) -> Vec<FloatValue> {
        self.variables.iter().map(|v| v.value).collect()
    }

    /// Restore values previously taken with [`VariableStore::snapshot`].
    pub fn restore(&mut self, values: &[FloatValue]) {
        debug_assert_eq!(values.len(), self.variables.len());
        for (variable, value) in self.variables.iter_mut().zip(values) {
            variable.value = *value;
        }
    }

    /// Evaluate every initial-condition expression and store the result.
    ///
    /// References are resolved recursively, so an initial condition may refer to a
    /// variable declared later. Self-referencing chains are rejected.
    pub fn resolve_initial_values(&mut self) -> SimResult<()> {
        let mut resolved: Vec<Option<FloatValue>> = vec![None; self.variables.len()];
        let mut in_progress = vec![false; self.variables.len()];
        for slot in 0..self.variables.len() {
            self.resolve_slot(slot, &mut resolved, &mut in_progress)?;
        }
        for (variable, value) in self.variables.iter_mut().zip(resolved) {
            if let Some(value) = value {
                variable.value = value;
            }
        }
        Ok(())
    }

    fn resolve_slot(
        &self,
        slot: usize,
        resolved: &mut Vec<Option<FloatValue>>,
        in_progress: &mut Vec<bool>,
    ) -> SimResult<FloatValue> {
        if let Some(value) = resolved[slot] {
            return Ok(value);
        }
        let variable = &self.variables[slot];
        let Some(init) = variable.init.as_deref() else {
            return Ok(variable.value);
        };
        if in_progress[slot] {
            return Err(SimError::CircularInitialCondition(variable.name.clone()));
        }
        in_progress[slot] = true;

        let mut value = 0.0;
        for term in parse_terms(init)? {
            if term.is_literal() {
                value += term.coef;
            } else {
                let referenced = self.slot(&term.name)?;
                value += term.coef * self.resolve_slot(referenced, resolved, in_progress)?;
            }
        }

        in_progress[slot] = false;
        resolved[slot] = Some(value);
        Ok(value)
    }
}
