//! WASM bindings for narrative-graph: powers the browser package previewer.

use wasm_bindgen::prelude::*;

use narrative_graph::core::markup;
use narrative_graph::core::session::{NarrativeSession, SessionSnapshot, Step};
use narrative_graph::core::store::{NarrativePackage, NarrativeStore};
use narrative_graph::schema::state::{StateAccess, Value, VariableStore};

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct OptionView {
    index: usize,
    text: String,
    classification: String,
}

#[derive(serde::Serialize, Default)]
struct StepView {
    kind: &'static str,
    node: Option<String>,
    index: Option<usize>,
    speaker: Option<String>,
    text: Option<String>,
    effect: Option<String>,
    image: Option<String>,
    sound: Option<String>,
    cutscene: Option<String>,
    options: Vec<OptionView>,
    fired: Option<bool>,
    applied: Vec<usize>,
    target: Option<String>,
}

#[derive(serde::Serialize)]
struct OutcomeView {
    next: String,
    tutorial_skip: Option<usize>,
    classification: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SaveData {
    snapshot: SessionSnapshot,
    state: VariableStore,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------
fn step_view(step: &Step<'_>) -> StepView {
    match step {
        Step::Line {
            dialogue,
            index,
            line,
        } => StepView {
            kind: "line",
            node: Some(dialogue.to_string()),
            index: Some(*index),
            speaker: Some(line.speaker.clone()),
            text: Some(markup::format(&line.text)),
            effect: Some(line.effect.clone()),
            image: line.image.clone(),
            sound: line.sound.clone(),
            cutscene: line.cutscene.clone(),
            ..StepView::default()
        },
        Step::Choice { choice, options } => StepView {
            kind: "choice",
            node: Some(choice.id.clone()),
            options: options
                .iter()
                .map(|o| OptionView {
                    index: o.index,
                    text: markup::format(&o.line.text),
                    classification: o.line.classification.as_str().to_string(),
                })
                .collect(),
            ..StepView::default()
        },
        Step::Event { event, report } => StepView {
            kind: "event",
            node: Some(event.to_string()),
            fired: Some(report.fired),
            applied: report.applied.clone(),
            ..StepView::default()
        },
        Step::Completed => StepView {
            kind: "completed",
            ..StepView::default()
        },
        Step::Transition(target) => StepView {
            kind: "transition",
            target: Some(target.to_string()),
            ..StepView::default()
        },
    }
}

fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::Float(f);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("JSON error: {e}")))
}

fn js_err(e: narrative_graph::NarrativeError) -> JsError {
    JsError::new(&e.to_string())
}

/// Format `[...]` markup with the default highlight tags.
#[wasm_bindgen]
pub fn format_markup(text: &str) -> String {
    markup::format(text)
}

/// Validate a RON package; returns a JSON array of issue strings.
#[wasm_bindgen]
pub fn validate_package(package_ron: &str) -> Result<String, JsError> {
    let package = NarrativePackage::parse_ron(package_ron).map_err(js_err)?;
    let store = NarrativeStore::builder()
        .strict(false)
        .with_package(package)
        .build()
        .map_err(js_err)?;
    let issues: Vec<String> = store.validate().iter().map(|i| i.to_string()).collect();
    to_json(&issues)
}

// ---------------------------------------------------------------------------
// NarrativePreview: the main exported struct
// ---------------------------------------------------------------------------
//
// A session borrows its store, which cannot cross the JS boundary, so each
// call rebuilds one from the saved snapshot and state. The snapshot carries
// the concurrent-order position, so rebuilding does not reset it.
#[wasm_bindgen]
pub struct NarrativePreview {
    store: NarrativeStore,
    state: VariableStore,
    snapshot: SessionSnapshot,
    seed: u64,
}

#[wasm_bindgen]
impl NarrativePreview {
    /// Load a RON package. Fails if the package does not validate.
    #[wasm_bindgen(constructor)]
    pub fn new(package_ron: &str, seed: u64) -> Result<NarrativePreview, JsError> {
        let package = NarrativePackage::parse_ron(package_ron)
            .map_err(|e| JsError::new(&format!("Package parse error: {e}")))?;
        let store = NarrativeStore::builder()
            .with_package(package)
            .build()
            .map_err(|e| JsError::new(&format!("Package load error: {e}")))?;

        Ok(NarrativePreview {
            store,
            state: VariableStore::new(),
            snapshot: SessionSnapshot::default(),
            seed,
        })
    }

    /// Enter a node by id. Returns a JSON step.
    pub fn enter(&mut self, id: &str) -> Result<String, JsError> {
        self.with_session(|session| session.enter(id).map(|step| step_view(&step)))
            .and_then(|view| to_json(&view))
    }

    /// Advance the current dialogue. Returns a JSON step.
    pub fn advance(&mut self) -> Result<String, JsError> {
        self.with_session(|session| session.advance().map(|step| step_view(&step)))
            .and_then(|view| to_json(&view))
    }

    /// Select an option of the current choice. Returns a JSON outcome.
    pub fn choose(&mut self, index: usize) -> Result<String, JsError> {
        let outcome = self.with_session(|session| session.choose(index))?;
        to_json(&OutcomeView {
            next: outcome.next,
            tutorial_skip: outcome.tutorial_skip,
            classification: outcome.classification.as_str().to_string(),
        })
    }

    /// Set a state variable; the value is parsed as int, float, bool or string.
    pub fn set_variable(&mut self, key: &str, value: &str) {
        self.state.set_variable(key, parse_value(value));
    }

    /// Current state as a JSON object of display strings.
    pub fn state_json(&self) -> Result<String, JsError> {
        let vars: Vec<(String, String)> = self
            .state
            .sorted()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        to_json(&vars)
    }

    /// Serialize position and state for local storage.
    pub fn save(&self) -> Result<String, JsError> {
        to_json(&SaveData {
            snapshot: self.snapshot.clone(),
            state: self.state.clone(),
        })
    }

    /// Restore from `save` output. Returns the JSON step to re-present, or
    /// `null` when the save was idle.
    pub fn load(&mut self, save: &str) -> Result<String, JsError> {
        let data: SaveData =
            serde_json::from_str(save).map_err(|e| JsError::new(&format!("Save parse error: {e}")))?;
        self.state = data.state;
        self.snapshot = SessionSnapshot {
            shuffle: data.snapshot.shuffle,
            ..SessionSnapshot::default()
        };
        let snapshot = data.snapshot;
        let view = self.with_session(|session| {
            session
                .restore(&snapshot)
                .map(|step| step.as_ref().map(step_view))
        })?;
        to_json(&view)
    }
}

impl NarrativePreview {
    fn with_session<T>(
        &mut self,
        op: impl FnOnce(&mut NarrativeSession<'_, VariableStore>) -> Result<T, narrative_graph::NarrativeError>,
    ) -> Result<T, JsError> {
        let state = std::mem::take(&mut self.state);
        let mut session = NarrativeSession::new(&self.store, state).seed(self.seed);
        let restored = session.restore(&self.snapshot);
        let result = restored.and_then(|_| op(&mut session));
        self.snapshot = session.snapshot();
        self.state = session.into_state();
        result.map_err(js_err)
    }
}
