//! Inline highlight markup: `[word]` in script text becomes a highlighted span.
//!
//! One level of brackets, scanned left to right. Every completed pair
//! rebuilds the whole string, and scanning resumes in the rebuilt text just
//! past the inserted closing tag. An unmatched `[` is left as-is.

pub const HIGHLIGHT_OPEN: &str = "<highlight>";
pub const HIGHLIGHT_CLOSE: &str = "</highlight>";

/// A piece of formatted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Highlight(String),
}

/// Tag pair wrapped around highlighted spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighter {
    open: String,
    close: String,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE)
    }
}

impl Highlighter {
    /// Use a custom tag pair, e.g. `<color=#ffcc00>` / `</color>`.
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    pub fn format(&self, text: &str) -> String {
        let mut out = text.to_string();
        let mut open: Option<usize> = None;
        let mut i = 0;

        // '[' and ']' are ASCII, so byte positions are always char boundaries.
        while i < out.len() {
            match out.as_bytes()[i] {
                b'[' => open = Some(i),
                b']' => {
                    if let Some(start) = open.take() {
                        let inner = &out[start + 1..i];
                        let resume = start + self.open.len() + inner.len() + self.close.len();
                        out = format!(
                            "{}{}{}{}{}",
                            &out[..start],
                            self.open,
                            inner,
                            self.close,
                            &out[i + 1..]
                        );
                        i = resume;
                        continue;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        out
    }

    /// Render segments with this highlighter's tags.
    pub fn render(&self, segments: &[Segment]) -> String {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Plain(s) => out.push_str(s),
                Segment::Highlight(s) => {
                    out.push_str(&self.open);
                    out.push_str(s);
                    out.push_str(&self.close);
                }
            }
        }
        out
    }
}

/// Format with the default `<highlight>` tags.
pub fn format(text: &str) -> String {
    Highlighter::default().format(text)
}

/// Split text into plain and highlighted segments, using the same pairing
/// rules as [`format`]. Empty plain segments are omitted.
pub fn segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Option<usize> = None;
    let mut cursor = 0;

    for (i, byte) in text.bytes().enumerate() {
        match byte {
            b'[' => open = Some(i),
            b']' => {
                if let Some(start) = open.take() {
                    if start > cursor {
                        segments.push(Segment::Plain(text[cursor..start].to_string()));
                    }
                    segments.push(Segment::Highlight(text[start + 1..i].to_string()));
                    cursor = i + 1;
                }
            }
            _ => {}
        }
    }

    if cursor < text.len() {
        segments.push(Segment::Plain(text[cursor..].to_string()));
    }
    segments
}

/// Text with markup brackets removed, for length checks and typewriter effects.
pub fn plain_text(text: &str) -> String {
    segments(text)
        .into_iter()
        .map(|s| match s {
            Segment::Plain(s) | Segment::Highlight(s) => s,
        })
        .collect()
}
