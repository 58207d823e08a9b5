/// Dialogue cursor: sequential traversal of one dialogue's lines.

use crate::core::error::NarrativeError;
use crate::schema::dialogue::{Dialogue, DialogueLine, Next};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    AtLine(usize),
    /// Absorbing: every further `advance` fails with `InvalidState`.
    Completed,
}

/// What an `advance` produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance<'a> {
    /// Moved to another line of the same dialogue.
    Line { index: usize, line: &'a DialogueLine },
    /// Reached the terminal sentinel.
    Completed,
    /// `next` names content outside this dialogue. The cursor is done; the
    /// host re-enters the store with the target.
    ExternalTransition(&'a str),
}

/// A position within a dialogue. Borrows the dialogue, never copies it, so
/// any number of cursors can walk the same loaded content independently.
#[derive(Debug, Clone)]
pub struct DialogueCursor<'a> {
    dialogue: &'a Dialogue,
    state: CursorState,
}

impl<'a> DialogueCursor<'a> {
    /// Start at the dialogue's entry line.
    pub fn start(dialogue: &'a Dialogue) -> Result<Self, NarrativeError> {
        let entry = dialogue.entry_index().ok_or_else(|| {
            NarrativeError::InvalidState(format!("dialogue '{}' has no entry line", dialogue.id))
        })?;
        tracing::debug!(dialogue = %dialogue.id, entry, "cursor started");
        Ok(Self {
            dialogue,
            state: CursorState::AtLine(entry),
        })
    }

    /// Resume at a persisted line index without replaying earlier lines.
    pub fn resume(dialogue: &'a Dialogue, index: usize) -> Result<Self, NarrativeError> {
        let mut cursor = Self {
            dialogue,
            state: CursorState::Completed,
        };
        cursor.set_current_line_index(index)?;
        Ok(cursor)
    }

    pub fn set_current_line_index(&mut self, index: usize) -> Result<(), NarrativeError> {
        if index >= self.dialogue.lines.len() {
            return Err(NarrativeError::InvalidState(format!(
                "line {} out of range for dialogue '{}' ({} lines)",
                index,
                self.dialogue.id,
                self.dialogue.lines.len()
            )));
        }
        tracing::debug!(dialogue = %self.dialogue.id, index, "cursor positioned");
        self.state = CursorState::AtLine(index);
        Ok(())
    }

    pub fn dialogue(&self) -> &'a Dialogue {
        self.dialogue
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            CursorState::AtLine(i) => Some(i),
            CursorState::Completed => None,
        }
    }

    pub fn current(&self) -> Option<&'a DialogueLine> {
        self.index().map(|i| &self.dialogue.lines[i])
    }

    pub fn is_completed(&self) -> bool {
        self.state == CursorState::Completed
    }

    /// Follow the current line's `next`.
    pub fn advance(&mut self) -> Result<Advance<'a>, NarrativeError> {
        let CursorState::AtLine(index) = self.state else {
            return Err(NarrativeError::InvalidState(format!(
                "dialogue '{}' already completed",
                self.dialogue.id
            )));
        };

        let dialogue = self.dialogue;
        let advance = match dialogue.classify(&dialogue.lines[index].next) {
            Next::Line(next) => {
                self.state = CursorState::AtLine(next);
                Advance::Line {
                    index: next,
                    line: &dialogue.lines[next],
                }
            }
            Next::Terminal => {
                self.state = CursorState::Completed;
                Advance::Completed
            }
            Next::External(target) => {
                self.state = CursorState::Completed;
                Advance::ExternalTransition(target)
            }
        };

        tracing::debug!(dialogue = %dialogue.id, from = index, to = %advance_target(&advance), "cursor advanced");
        Ok(advance)
    }
}

fn advance_target(advance: &Advance<'_>) -> String {
    match advance {
        Advance::Line { index, .. } => format!("line {}", index),
        Advance::Completed => "completed".to_string(),
        Advance::ExternalTransition(target) => format!("external '{}'", target),
    }
}
