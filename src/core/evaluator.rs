/// Event evaluator: combines conditions and applies effects.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::core::error::NarrativeError;
use crate::schema::event::{EventLine, ExecutionMode, Logic};
use crate::schema::state::StateAccess;

/// What `apply` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub fired: bool,
    /// Indices into the event's effects, in the order they were applied.
    pub applied: Vec<usize>,
}

/// Where an evaluator is in its concurrent-order sequence. Saved with a
/// session so a resumed game shuffles exactly as an uninterrupted one would.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleState {
    pub seed: u64,
    /// Concurrent events applied so far.
    pub draws: u64,
}

/// Evaluates events against host state.
///
/// Concurrent-mode effects run on the calling thread. Each concurrent event
/// draws its order from an RNG derived from the seed and the number of
/// earlier draws, so a replay with the same seed applies them identically.
#[derive(Debug, Clone, Default)]
pub struct EventEvaluator {
    shuffle: ShuffleState,
}

impl EventEvaluator {
    pub fn new(seed: u64) -> Self {
        Self::resume(ShuffleState { seed, draws: 0 })
    }

    /// Continue from a saved position.
    pub fn resume(shuffle: ShuffleState) -> Self {
        Self { shuffle }
    }

    pub fn shuffle_state(&self) -> ShuffleState {
        self.shuffle
    }

    fn next_rng(&mut self) -> StdRng {
        let ShuffleState { seed, draws } = self.shuffle;
        self.shuffle.draws = draws.wrapping_add(1);
        // Mix the draw count so (seed, n + 1) and (seed + 1, n) differ.
        StdRng::seed_from_u64(seed ^ draws.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Combine the event's conditions under its logic tag. `AND` stops at
    /// the first false condition, `OR` at the first true one. Never touches
    /// state.
    pub fn evaluate(event: &EventLine, state: &dyn StateAccess) -> Result<bool, NarrativeError> {
        let result = match &event.logic {
            Logic::And => event.conditions.iter().all(|c| c.evaluate(state)),
            Logic::Or => event.conditions.iter().any(|c| c.evaluate(state)),
            Logic::Unrecognized(tag) => {
                tracing::warn!(event = %event.id, logic = %tag, "unrecognized event logic");
                return Err(NarrativeError::InvalidLogic(tag.clone()));
            }
        };
        tracing::debug!(event = %event.id, result, "event evaluated");
        Ok(result)
    }

    /// Apply the event's effects if, and only if, it evaluates true. Tags
    /// are checked before anything runs, so a bad tag never leaves effects
    /// half-applied.
    pub fn apply(
        &mut self,
        event: &EventLine,
        state: &mut dyn StateAccess,
    ) -> Result<EventReport, NarrativeError> {
        if let ExecutionMode::Unrecognized(tag) = &event.mode {
            tracing::warn!(event = %event.id, mode = %tag, "unrecognized execution mode");
            return Err(NarrativeError::InvalidExecutionMode(tag.clone()));
        }

        if !Self::evaluate(event, &*state)? {
            return Ok(EventReport {
                fired: false,
                applied: Vec::new(),
            });
        }

        let mut order: Vec<usize> = (0..event.effects.len()).collect();
        if event.mode == ExecutionMode::Concurrent {
            order.shuffle(&mut self.next_rng());
        }

        for &index in &order {
            event.effects[index].apply(state);
        }

        tracing::debug!(event = %event.id, mode = ?event.mode, effects = order.len(), "event applied");
        Ok(EventReport {
            fired: true,
            applied: order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::event::{FnCondition, FnEffect, SetVariable};
    use crate::schema::state::{Value, VariableStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn constant(value: bool, calls: Arc<AtomicUsize>) -> FnCondition<impl Fn(&dyn StateAccess) -> bool + Send + Sync> {
        FnCondition::new("constant", move |_: &dyn StateAccess| {
            calls.fetch_add(1, Ordering::SeqCst);
            value
        })
    }

    fn event_with(logic: Logic, values: &[bool]) -> (EventLine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut event = EventLine::new("e", logic, ExecutionMode::Sequential);
        for &v in values {
            event = event.when(constant(v, calls.clone()));
        }
        (event, calls)
    }

    fn appender(tag: &'static str) -> FnEffect<impl Fn(&mut dyn StateAccess) + Send + Sync> {
        FnEffect::new(tag, move |s: &mut dyn StateAccess| {
            let mut log = match s.get_variable("log") {
                Some(Value::String(log)) => log,
                _ => String::new(),
            };
            log.push_str(tag);
            s.set_variable("log", Value::String(log));
        })
    }

    #[test]
    fn and_or_truth() {
        let state = VariableStore::new();
        let (and, _) = event_with(Logic::And, &[true, false]);
        assert!(!EventEvaluator::evaluate(&and, &state).unwrap());
        let (or, _) = event_with(Logic::Or, &[false, true]);
        assert!(EventEvaluator::evaluate(&or, &state).unwrap());
    }

    #[test]
    fn vacuous_cases() {
        let state = VariableStore::new();
        let (and, _) = event_with(Logic::And, &[]);
        assert!(EventEvaluator::evaluate(&and, &state).unwrap());
        let (or, _) = event_with(Logic::Or, &[]);
        assert!(!EventEvaluator::evaluate(&or, &state).unwrap());
    }

    #[test]
    fn and_short_circuits_on_false() {
        let (and, calls) = event_with(Logic::And, &[false, true, true]);
        EventEvaluator::evaluate(&and, &VariableStore::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn or_short_circuits_on_true() {
        let (or, calls) = event_with(Logic::Or, &[false, true, false]);
        EventEvaluator::evaluate(&or, &VariableStore::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unrecognized_logic_is_error() {
        let (event, _) = event_with(Logic::Unrecognized("NAND".into()), &[true]);
        assert!(matches!(
            EventEvaluator::evaluate(&event, &VariableStore::new()),
            Err(NarrativeError::InvalidLogic(tag)) if tag == "NAND"
        ));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let (event, _) = event_with(Logic::Or, &[false, true]);
        let state = VariableStore::new().with_responsibility(2);
        let first = EventEvaluator::evaluate(&event, &state).unwrap();
        let second = EventEvaluator::evaluate(&event, &state).unwrap();
        assert_eq!(first, second);
        assert_eq!(state, VariableStore::new().with_responsibility(2));
    }

    #[test]
    fn sequential_applies_in_order() {
        let event = EventLine::new("e", Logic::And, ExecutionMode::Sequential)
            .then(appender("a"))
            .then(appender("b"))
            .then(appender("c"));
        let mut state = VariableStore::new();
        let report = EventEvaluator::default().apply(&event, &mut state).unwrap();
        assert!(report.fired);
        assert_eq!(report.applied, vec![0, 1, 2]);
        assert_eq!(state.get_variable("log"), Some(Value::String("abc".into())));
    }

    #[test]
    fn false_event_applies_nothing() {
        let (event, _) = event_with(Logic::And, &[true, false]);
        let event = event.then(SetVariable {
            key: "touched".into(),
            value: Value::Bool(true),
        });
        let mut state = VariableStore::new();
        let report = EventEvaluator::default().apply(&event, &mut state).unwrap();
        assert!(!report.fired);
        assert!(report.applied.is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn unrecognized_mode_applies_nothing() {
        let event = EventLine::new("e", Logic::And, ExecutionMode::Unrecognized("Parallel".into()))
            .then(appender("a"));
        let mut state = VariableStore::new();
        let result = EventEvaluator::default().apply(&event, &mut state);
        assert!(matches!(result, Err(NarrativeError::InvalidExecutionMode(_))));
        assert!(state.is_empty());
    }

    #[test]
    fn concurrent_applies_every_effect_once() {
        let mut event = EventLine::new("e", Logic::And, ExecutionMode::Concurrent);
        for key in ["a", "b", "c", "d", "e"] {
            event = event.then(SetVariable {
                key: key.into(),
                value: Value::Int(1),
            });
        }
        let mut state = VariableStore::new();
        let report = EventEvaluator::new(7).apply(&event, &mut state).unwrap();
        let mut applied = report.applied.clone();
        applied.sort_unstable();
        assert_eq!(applied, vec![0, 1, 2, 3, 4]);
        assert_eq!(state.len(), 5);
    }

    #[test]
    fn concurrent_order_replays_with_seed() {
        let mut event = EventLine::new("e", Logic::And, ExecutionMode::Concurrent);
        for tag in ["a", "b", "c", "d", "e", "f"] {
            event = event.then(appender(tag));
        }
        let run = |seed| {
            let mut state = VariableStore::new();
            EventEvaluator::new(seed).apply(&event, &mut state).unwrap();
            state.get_variable("log")
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn resumed_evaluator_continues_sequence() {
        let mut event = EventLine::new("e", Logic::And, ExecutionMode::Concurrent);
        for tag in ["a", "b", "c", "d", "e", "f"] {
            event = event.then(appender(tag));
        }
        let mut state = VariableStore::new();

        let mut continuous = EventEvaluator::new(5);
        continuous.apply(&event, &mut state).unwrap();
        let expected = continuous.apply(&event, &mut state).unwrap().applied;

        let mut first = EventEvaluator::new(5);
        first.apply(&event, &mut state).unwrap();
        let saved = first.shuffle_state();
        assert_eq!(saved, ShuffleState { seed: 5, draws: 1 });

        let mut resumed = EventEvaluator::resume(saved);
        assert_eq!(resumed.apply(&event, &mut state).unwrap().applied, expected);
    }

    #[test]
    fn sequential_events_do_not_draw() {
        let event = EventLine::new("e", Logic::And, ExecutionMode::Sequential).then(appender("a"));
        let mut evaluator = EventEvaluator::new(9);
        evaluator.apply(&event, &mut VariableStore::new()).unwrap();
        assert_eq!(evaluator.shuffle_state().draws, 0);
    }
}
