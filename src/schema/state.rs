use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Variable consulted by choice gates.
pub const RESPONSIBILITY_KEY: &str = "responsibility";

/// Lowest responsibility a player can have. Choice validation checks that
/// every choice has a line open at this score.
pub const MIN_RESPONSIBILITY: i64 = 0;

/// A dynamic value stored in player/world state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Truthiness used by flag conditions: `false`, `0`, `0.0` and the
    /// empty string are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Float(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Player/world state as seen by the interpreter. Provided by the host.
///
/// Conditions read through it, effects write through it, and choice gates
/// consult [`StateAccess::responsibility`].
pub trait StateAccess {
    fn get_variable(&self, key: &str) -> Option<Value>;

    fn set_variable(&mut self, key: &str, value: Value);

    /// The responsibility score, floored at [`MIN_RESPONSIBILITY`]. Unset or
    /// non-numeric values read as the floor.
    fn responsibility(&self) -> i64 {
        self.get_variable(RESPONSIBILITY_KEY)
            .and_then(|v| v.as_int())
            .unwrap_or(MIN_RESPONSIBILITY)
            .max(MIN_RESPONSIBILITY)
    }
}

/// In-memory variable table. Serializable so it can be saved alongside a
/// session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    vars: FxHashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.vars.insert(key.to_string(), value);
        self
    }

    pub fn with_responsibility(self, score: i64) -> Self {
        self.with(RESPONSIBILITY_KEY, Value::Int(score))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables sorted by key, for stable display.
    pub fn sorted(&self) -> Vec<(&str, &Value)> {
        let mut entries: Vec<_> = self.vars.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl StateAccess for VariableStore {
    fn get_variable(&self, key: &str) -> Option<Value> {
        self.vars.get(key).cloned()
    }

    fn set_variable(&mut self, key: &str, value: Value) {
        self.vars.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responsibility_defaults_to_zero() {
        let state = VariableStore::new();
        assert_eq!(state.responsibility(), 0);
    }

    #[test]
    fn responsibility_reads_variable() {
        let state = VariableStore::new().with_responsibility(4);
        assert_eq!(state.responsibility(), 4);
    }

    #[test]
    fn responsibility_ignores_non_numeric() {
        let state = VariableStore::new().with(RESPONSIBILITY_KEY, Value::String("high".into()));
        assert_eq!(state.responsibility(), 0);
    }

    #[test]
    fn responsibility_floored_at_minimum() {
        let state = VariableStore::new().with(RESPONSIBILITY_KEY, Value::Int(-4));
        assert_eq!(state.responsibility(), MIN_RESPONSIBILITY);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(-2).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("yes".into()).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }

    #[test]
    fn set_and_get() {
        let mut state = VariableStore::new();
        state.set_variable("met_keeper", Value::Bool(true));
        assert_eq!(state.get_variable("met_keeper"), Some(Value::Bool(true)));
        assert_eq!(state.get_variable("missing"), None);
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn sorted_is_stable() {
        let state = VariableStore::new()
            .with("b", Value::Int(2))
            .with("a", Value::Int(1));
        let keys: Vec<_> = state.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn ron_round_trip() {
        let state = VariableStore::new()
            .with_responsibility(3)
            .with("name", Value::String("Ida".into()));
        let serialized = ron::to_string(&state).unwrap();
        let back: VariableStore = ron::from_str(&serialized).unwrap();
        assert_eq!(back, state);
    }
}
