/// Choice resolver: responsibility gating and outcome resolution.

use serde::{Deserialize, Serialize};

use crate::core::error::NarrativeError;
use crate::schema::choice::{Choice, ChoiceLine, Classification};
use crate::schema::state::{StateAccess, MIN_RESPONSIBILITY};

/// A selectable line, with its index in the choice's authored order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailableLine<'a> {
    pub index: usize,
    pub line: &'a ChoiceLine,
}

/// The consequence of selecting a choice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOutcome {
    pub next: String,
    pub tutorial_skip: Option<usize>,
    pub classification: Classification,
}

/// Host overrides of `responsibility()` are floored here too, so the
/// validated minimum always holds.
fn responsibility_of(state: &dyn StateAccess) -> i64 {
    state.responsibility().max(MIN_RESPONSIBILITY)
}

/// Lines the player may select, in authored order. A line is gated out when
/// its minimum responsibility exceeds the player's.
pub fn available_lines<'a>(choice: &'a Choice, state: &dyn StateAccess) -> Vec<AvailableLine<'a>> {
    let responsibility = responsibility_of(state);
    choice
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.is_open_to(responsibility))
        .map(|(index, line)| AvailableLine { index, line })
        .collect()
}

/// Resolve a selection, re-checking the gate against current state so a
/// stale listing cannot select a line that has since closed.
pub fn resolve(
    choice: &Choice,
    selected: usize,
    state: &dyn StateAccess,
) -> Result<ChoiceOutcome, NarrativeError> {
    let responsibility = responsibility_of(state);
    let line = choice
        .lines
        .get(selected)
        .filter(|line| line.is_open_to(responsibility))
        .ok_or_else(|| {
            tracing::warn!(choice = %choice.id, selected, responsibility, "rejected choice selection");
            NarrativeError::InvalidSelection {
                choice: choice.id.clone(),
                index: selected,
            }
        })?;

    let outcome = ChoiceOutcome {
        next: line.next.clone(),
        tutorial_skip: line.tutorial_skip_index(),
        classification: line.classification.clone(),
    };
    tracing::debug!(
        choice = %choice.id,
        selected,
        next = %outcome.next,
        classification = %outcome.classification.as_str(),
        "choice resolved"
    );
    Ok(outcome)
}
