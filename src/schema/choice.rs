use serde::{Deserialize, Serialize};

/// Designer-defined classification of a choice line. Open-ended: "good" and
/// "bad" are conventional, anything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(pub String);

impl Classification {
    pub fn new(tag: &str) -> Self {
        Self(tag.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_good(&self) -> bool {
        self.0.eq_ignore_ascii_case("good")
    }

    pub fn is_bad(&self) -> bool {
        self.0.eq_ignore_ascii_case("bad")
    }

    pub fn is_neutral(&self) -> bool {
        !self.is_good() && !self.is_bad()
    }
}

fn no_skip() -> i32 {
    -1
}

/// A selectable branch option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceLine {
    pub text: String,
    pub next: String,
    #[serde(default)]
    pub classification: Classification,
    /// Tutorial step to skip to, `-1` for none.
    #[serde(default = "no_skip")]
    pub tutorial_skip: i32,
    /// Minimum responsibility required to select this line.
    #[serde(default)]
    pub min_responsibility: i64,
}

impl ChoiceLine {
    pub fn new(text: &str, next: &str) -> Self {
        Self {
            text: text.to_string(),
            next: next.to_string(),
            classification: Classification::default(),
            tutorial_skip: no_skip(),
            min_responsibility: 0,
        }
    }

    pub fn tutorial_skip_index(&self) -> Option<usize> {
        usize::try_from(self.tutorial_skip).ok()
    }

    pub fn is_open_to(&self, responsibility: i64) -> bool {
        self.min_responsibility <= responsibility
    }
}

/// A set of options presented at a decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub lines: Vec<ChoiceLine>,
}

impl Choice {
    pub fn new(id: &str, lines: Vec<ChoiceLine>) -> Self {
        Self {
            id: id.to_string(),
            lines,
        }
    }
}
