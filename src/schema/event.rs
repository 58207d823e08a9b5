use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::state::{StateAccess, Value, MIN_RESPONSIBILITY, RESPONSIBILITY_KEY};

/// How an event combines its conditions.
///
/// Authored as a free-form string. Only the exact spellings `AND` and `OR`
/// are recognized; anything else, including other casings, is kept verbatim
/// as `Unrecognized` so it can be reported instead of silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Logic {
    And,
    Or,
    Unrecognized(String),
}

impl From<String> for Logic {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "AND" => Self::And,
            "OR" => Self::Or,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl From<Logic> for String {
    fn from(logic: Logic) -> Self {
        match logic {
            Logic::And => "AND".to_string(),
            Logic::Or => "OR".to_string(),
            Logic::Unrecognized(tag) => tag,
        }
    }
}

/// Whether an event's effects run one at a time in list order, or without
/// ordering guarantees between each other. Exact spellings `Sequential` and
/// `Concurrent` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionMode {
    Sequential,
    Concurrent,
    Unrecognized(String),
}

impl From<String> for ExecutionMode {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "Sequential" => Self::Sequential,
            "Concurrent" => Self::Concurrent,
            _ => Self::Unrecognized(tag),
        }
    }
}

impl From<ExecutionMode> for String {
    fn from(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Sequential => "Sequential".to_string(),
            ExecutionMode::Concurrent => "Concurrent".to_string(),
            ExecutionMode::Unrecognized(tag) => tag,
        }
    }
}

/// A host-defined predicate over player/world state. Must not mutate state.
pub trait Condition: fmt::Debug + Send + Sync {
    fn evaluate(&self, state: &dyn StateAccess) -> bool;
}

/// A host-defined change to player/world state, applied when an event fires.
pub trait Effect: fmt::Debug + Send + Sync {
    fn apply(&self, state: &mut dyn StateAccess);
}

/// A conditional rule: when its conditions hold under `logic`, its effects
/// are applied according to `mode`.
#[derive(Debug, Clone)]
pub struct EventLine {
    pub id: String,
    pub logic: Logic,
    pub mode: ExecutionMode,
    pub conditions: Vec<Arc<dyn Condition>>,
    pub effects: Vec<Arc<dyn Effect>>,
}

impl EventLine {
    pub fn new(id: &str, logic: Logic, mode: ExecutionMode) -> Self {
        Self {
            id: id.to_string(),
            logic,
            mode,
            conditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn when(mut self, condition: impl Condition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    pub fn then(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }
}

// Data-driven condition and effect descriptions, as written in a content
// package. The store compiles them into trait objects at load time; `Host`
// entries resolve against bindings the host registered on the builder.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionDef {
    Flag { key: String },
    Equals { key: String, value: Value },
    AtLeast { key: String, value: i64 },
    AtMost { key: String, value: i64 },
    Not(Box<ConditionDef>),
    Host(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EffectDef {
    Set { key: String, value: Value },
    Add { key: String, amount: i64 },
    Toggle { key: String },
    Host(String),
}

/// True when the variable is present and truthy.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagSet {
    pub key: String,
}

impl Condition for FlagSet {
    fn evaluate(&self, state: &dyn StateAccess) -> bool {
        state
            .get_variable(&self.key)
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEquals {
    pub key: String,
    pub value: Value,
}

impl Condition for VariableEquals {
    fn evaluate(&self, state: &dyn StateAccess) -> bool {
        state.get_variable(&self.key).as_ref() == Some(&self.value)
    }
}

/// Numeric comparison; unset or non-numeric variables compare as 0.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableCompare {
    pub key: String,
    pub threshold: i64,
    pub at_least: bool,
}

impl Condition for VariableCompare {
    fn evaluate(&self, state: &dyn StateAccess) -> bool {
        let current = state
            .get_variable(&self.key)
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        if self.at_least {
            current >= self.threshold
        } else {
            current <= self.threshold
        }
    }
}

#[derive(Debug, Clone)]
pub struct Negate(pub Arc<dyn Condition>);

impl Condition for Negate {
    fn evaluate(&self, state: &dyn StateAccess) -> bool {
        !self.0.evaluate(state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetVariable {
    pub key: String,
    pub value: Value,
}

impl Effect for SetVariable {
    fn apply(&self, state: &mut dyn StateAccess) {
        state.set_variable(&self.key, self.value.clone());
    }
}

/// Adds to an integer variable, treating unset or non-numeric values as 0.
/// Responsibility never drops below [`MIN_RESPONSIBILITY`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddToVariable {
    pub key: String,
    pub amount: i64,
}

impl Effect for AddToVariable {
    fn apply(&self, state: &mut dyn StateAccess) {
        let current = state
            .get_variable(&self.key)
            .and_then(|v| v.as_int())
            .unwrap_or(0);
        let mut updated = current.saturating_add(self.amount);
        if self.key == RESPONSIBILITY_KEY {
            updated = updated.max(MIN_RESPONSIBILITY);
        }
        state.set_variable(&self.key, Value::Int(updated));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleFlag {
    pub key: String,
}

impl Effect for ToggleFlag {
    fn apply(&self, state: &mut dyn StateAccess) {
        let current = state
            .get_variable(&self.key)
            .map(|v| v.is_truthy())
            .unwrap_or(false);
        state.set_variable(&self.key, Value::Bool(!current));
    }
}

/// Wraps a closure as a [`Condition`], for hosts and tests.
pub struct FnCondition<F> {
    name: String,
    f: F,
}

impl<F> FnCondition<F>
where
    F: Fn(&dyn StateAccess) -> bool + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition").field("name", &self.name).finish()
    }
}

impl<F> Condition for FnCondition<F>
where
    F: Fn(&dyn StateAccess) -> bool + Send + Sync,
{
    fn evaluate(&self, state: &dyn StateAccess) -> bool {
        (self.f)(state)
    }
}

/// Wraps a closure as an [`Effect`], for hosts and tests.
pub struct FnEffect<F> {
    name: String,
    f: F,
}

impl<F> FnEffect<F>
where
    F: Fn(&mut dyn StateAccess) + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnEffect<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEffect").field("name", &self.name).finish()
    }
}

impl<F> Effect for FnEffect<F>
where
    F: Fn(&mut dyn StateAccess) + Send + Sync,
{
    fn apply(&self, state: &mut dyn StateAccess) {
        (self.f)(state)
    }
}
