/// Narrative session: the host-facing driver.
///
/// The host enters a node by id, renders what comes back, and reports the
/// player's input. Cross-entity jumps are handed back as
/// `Step::Transition` for the host to re-enter, so side effects between
/// nodes (scene loads, camera moves) stay under its control.

use serde::{Deserialize, Serialize};

use crate::core::choice::{self, AvailableLine, ChoiceOutcome};
use crate::core::cursor::{Advance, DialogueCursor};
use crate::core::error::{NarrativeError, NodeKind};
use crate::core::evaluator::{EventEvaluator, EventReport, ShuffleState};
use crate::core::store::{NarrativeStore, Node};
use crate::schema::choice::Choice;
use crate::schema::dialogue::DialogueLine;
use crate::schema::state::StateAccess;

/// What the host should present or act on next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<'a> {
    /// Show a dialogue line, then call `advance`.
    Line {
        dialogue: &'a str,
        index: usize,
        line: &'a DialogueLine,
    },
    /// Present the open options, then call `choose` with one of their indices.
    Choice {
        choice: &'a Choice,
        options: Vec<AvailableLine<'a>>,
    },
    /// An event was evaluated; effects ran if it fired.
    Event { event: &'a str, report: EventReport },
    /// The current dialogue ended at its terminal sentinel.
    Completed,
    /// The current dialogue points outside itself; enter the target next.
    Transition(&'a str),
}

/// Persisted position, enough to resume without replaying side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub node: Option<String>,
    pub line: Option<usize>,
    /// Concurrent-order position. `None` keeps the restoring session's seed.
    #[serde(default)]
    pub shuffle: Option<ShuffleState>,
}

#[derive(Debug, Clone)]
enum Position<'a> {
    Idle,
    Dialogue(DialogueCursor<'a>),
    Choice(&'a Choice),
}

/// One playthrough over a shared store. Several sessions may read the same
/// store at once; each owns its own position and state.
pub struct NarrativeSession<'a, S: StateAccess> {
    store: &'a NarrativeStore,
    state: S,
    evaluator: EventEvaluator,
    position: Position<'a>,
}

impl<'a, S: StateAccess> NarrativeSession<'a, S> {
    pub fn new(store: &'a NarrativeStore, state: S) -> Self {
        Self {
            store,
            state,
            evaluator: EventEvaluator::default(),
            position: Position::Idle,
        }
    }

    /// Seed for the order of concurrent-mode effects.
    pub fn seed(mut self, seed: u64) -> Self {
        self.evaluator = EventEvaluator::new(seed);
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.position, Position::Idle)
    }

    /// Enter any node by id. Abandons whatever was in progress.
    pub fn enter(&mut self, id: &str) -> Result<Step<'a>, NarrativeError> {
        if !self.is_idle() {
            tracing::debug!(id, "abandoning current node");
        }
        self.position = Position::Idle;

        match self.store.resolve(id)? {
            Node::Dialogue(dialogue) => {
                let cursor = DialogueCursor::start(dialogue)?;
                let step = line_step(&cursor);
                self.position = Position::Dialogue(cursor);
                step
            }
            Node::Choice(choice) => {
                self.position = Position::Choice(choice);
                Ok(Step::Choice {
                    choice,
                    options: choice::available_lines(choice, &self.state),
                })
            }
            Node::Event(event) => {
                let report = self.evaluator.apply(event, &mut self.state)?;
                Ok(Step::Event {
                    event: &event.id,
                    report,
                })
            }
        }
    }

    /// Move past the current dialogue line.
    pub fn advance(&mut self) -> Result<Step<'a>, NarrativeError> {
        let Position::Dialogue(cursor) = &mut self.position else {
            return Err(NarrativeError::InvalidState(
                "advance called outside a dialogue".to_string(),
            ));
        };

        match cursor.advance()? {
            Advance::Line { index, line } => Ok(Step::Line {
                dialogue: &cursor.dialogue().id,
                index,
                line,
            }),
            Advance::Completed => {
                self.position = Position::Idle;
                Ok(Step::Completed)
            }
            Advance::ExternalTransition(target) => {
                self.position = Position::Idle;
                Ok(Step::Transition(target))
            }
        }
    }

    /// Select an option of the current choice by its authored index.
    pub fn choose(&mut self, index: usize) -> Result<ChoiceOutcome, NarrativeError> {
        let Position::Choice(current) = self.position else {
            return Err(NarrativeError::InvalidState(
                "choose called outside a choice".to_string(),
            ));
        };
        let outcome = choice::resolve(current, index, &self.state)?;
        self.position = Position::Idle;
        Ok(outcome)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (node, line) = match &self.position {
            Position::Idle => (None, None),
            Position::Dialogue(cursor) => (Some(cursor.dialogue().id.clone()), cursor.index()),
            Position::Choice(choice) => (Some(choice.id.clone()), None),
        };
        SessionSnapshot {
            node,
            line,
            shuffle: Some(self.evaluator.shuffle_state()),
        }
    }

    /// Restore a snapshot and return the step to re-present, if any.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> Result<Option<Step<'a>>, NarrativeError> {
        if let Some(shuffle) = snapshot.shuffle {
            self.evaluator = EventEvaluator::resume(shuffle);
        }

        let Some(id) = &snapshot.node else {
            self.position = Position::Idle;
            return Ok(None);
        };

        match (self.store.resolve(id)?, snapshot.line) {
            (Node::Dialogue(dialogue), Some(line)) => {
                let cursor = DialogueCursor::resume(dialogue, line)?;
                let step = line_step(&cursor)?;
                self.position = Position::Dialogue(cursor);
                Ok(Some(step))
            }
            (Node::Choice(choice), None) => {
                self.position = Position::Choice(choice);
                Ok(Some(Step::Choice {
                    choice,
                    options: choice::available_lines(choice, &self.state),
                }))
            }
            (node, _) => Err(NarrativeError::InvalidState(format!(
                "snapshot of {} '{}' cannot be resumed{}",
                node.kind(),
                id,
                if node.kind() == NodeKind::Dialogue {
                    " without a line index"
                } else {
                    ""
                }
            ))),
        }
    }
}

fn line_step<'a>(cursor: &DialogueCursor<'a>) -> Result<Step<'a>, NarrativeError> {
    let (Some(index), Some(line)) = (cursor.index(), cursor.current()) else {
        return Err(NarrativeError::InvalidState(format!(
            "dialogue '{}' already completed",
            cursor.dialogue().id
        )));
    };
    Ok(Step::Line {
        dialogue: &cursor.dialogue().id,
        index,
        line,
    })
}
