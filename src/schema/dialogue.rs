use serde::{Deserialize, Serialize};

/// Sentinel `next` value that ends a dialogue and hands control back to
/// the host. An empty `next` is treated the same way.
pub const TERMINAL: &str = "END";

/// A single spoken or narrated line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Addressable key other lines may use as their `next`. When absent the
    /// line is addressed by its index rendered as a string.
    #[serde(default)]
    pub key: Option<String>,
    pub speaker: String,
    /// Raw script text, possibly containing `[...]` markup.
    pub text: String,
    /// Text-effect tag for the presentation layer (e.g. "shake", "typewriter").
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub cutscene: Option<String>,
    #[serde(default)]
    pub next: String,
}

/// Where a line's `next` points, as seen from inside its dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next<'a> {
    /// Another line of the same dialogue.
    Line(usize),
    /// The dialogue ends here.
    Terminal,
    /// Content outside this dialogue; the host re-enters the store with it.
    External(&'a str),
}

/// An ordered, linked sequence of lines forming one conversation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialogue {
    pub id: String,
    /// Key of the entry line. Defaults to the first line.
    #[serde(default)]
    pub entry: Option<String>,
    pub lines: Vec<DialogueLine>,
}

impl Dialogue {
    pub fn new(id: &str, lines: Vec<DialogueLine>) -> Self {
        Self {
            id: id.to_string(),
            entry: None,
            lines,
        }
    }

    /// Index of the line whose addressable key is `key`.
    pub fn line_index(&self, key: &str) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .position(|(i, line)| match &line.key {
                Some(k) => k == key,
                None => key.parse::<usize>().ok() == Some(i),
            })
    }

    /// Index of the designated entry line, or `None` if the dialogue is
    /// empty or names an entry key it does not contain.
    pub fn entry_index(&self) -> Option<usize> {
        match &self.entry {
            Some(key) => self.line_index(key),
            None if self.lines.is_empty() => None,
            None => Some(0),
        }
    }

    /// Classify a raw `next` string against this dialogue's line keys.
    pub fn classify<'a>(&self, next: &'a str) -> Next<'a> {
        if is_terminal(next) {
            return Next::Terminal;
        }
        match self.line_index(next) {
            Some(index) => Next::Line(index),
            None => Next::External(next),
        }
    }
}

pub fn is_terminal(next: &str) -> bool {
    next.is_empty() || next == TERMINAL
}
