/// Narrative store: owns every dialogue, choice and event of a loaded
/// package, resolves identifiers, and validates cross-references.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{NarrativeError, NodeKind};
use crate::schema::choice::Choice;
use crate::schema::dialogue::{Dialogue, DialogueLine, Next};
use crate::schema::state::MIN_RESPONSIBILITY;
use crate::schema::event::{
    AddToVariable, Condition, ConditionDef, Effect, EffectDef, EventLine, ExecutionMode,
    FlagSet, Logic, Negate, SetVariable, ToggleFlag, VariableCompare, VariableEquals,
};

// Package file shape. Ids are map keys in the file and copied onto the
// records on load.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Dialogue")]
pub struct RonDialogue {
    #[serde(default)]
    pub entry: Option<String>,
    pub lines: Vec<DialogueLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Choice")]
pub struct RonChoice {
    pub lines: Vec<crate::schema::choice::ChoiceLine>,
}

fn sequential() -> ExecutionMode {
    ExecutionMode::Sequential
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Event")]
pub struct RonEvent {
    pub logic: Logic,
    #[serde(default = "sequential")]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    #[serde(default)]
    pub results: Vec<EffectDef>,
}

/// A serialized collection of narrative content, keyed by identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrativePackage {
    #[serde(default)]
    pub dialogues: HashMap<String, RonDialogue>,
    #[serde(default)]
    pub choices: HashMap<String, RonChoice>,
    #[serde(default)]
    pub events: HashMap<String, RonEvent>,
}

impl NarrativePackage {
    pub fn load_from_ron(path: &Path) -> Result<NarrativePackage, NarrativeError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<NarrativePackage, NarrativeError> {
        Ok(ron::from_str(input)?)
    }

    /// Merge another package into this one. Entries from `other` override
    /// entries in `self` with the same id and kind.
    pub fn merge(&mut self, other: NarrativePackage) {
        self.dialogues.extend(other.dialogues);
        self.choices.extend(other.choices);
        self.events.extend(other.events);
    }
}

/// Named conditions and effects supplied by the host, referenced from
/// packages as `Host("name")`.
#[derive(Debug, Clone, Default)]
pub struct HostBindings {
    conditions: FxHashMap<String, Arc<dyn Condition>>,
    effects: FxHashMap<String, Arc<dyn Effect>>,
}

impl HostBindings {
    pub fn condition(&self, name: &str) -> Option<Arc<dyn Condition>> {
        self.conditions.get(name).cloned()
    }

    pub fn effect(&self, name: &str) -> Option<Arc<dyn Effect>> {
        self.effects.get(name).cloned()
    }

    fn compile_condition(&self, def: &ConditionDef) -> Result<Arc<dyn Condition>, NarrativeError> {
        let compiled: Arc<dyn Condition> = match def {
            ConditionDef::Flag { key } => Arc::new(FlagSet { key: key.clone() }),
            ConditionDef::Equals { key, value } => Arc::new(VariableEquals {
                key: key.clone(),
                value: value.clone(),
            }),
            ConditionDef::AtLeast { key, value } => Arc::new(VariableCompare {
                key: key.clone(),
                threshold: *value,
                at_least: true,
            }),
            ConditionDef::AtMost { key, value } => Arc::new(VariableCompare {
                key: key.clone(),
                threshold: *value,
                at_least: false,
            }),
            ConditionDef::Not(inner) => Arc::new(Negate(self.compile_condition(inner)?)),
            ConditionDef::Host(name) => self
                .condition(name)
                .ok_or_else(|| NarrativeError::UnknownHostBinding(name.clone()))?,
        };
        Ok(compiled)
    }

    fn compile_effect(&self, def: &EffectDef) -> Result<Arc<dyn Effect>, NarrativeError> {
        let compiled: Arc<dyn Effect> = match def {
            EffectDef::Set { key, value } => Arc::new(SetVariable {
                key: key.clone(),
                value: value.clone(),
            }),
            EffectDef::Add { key, amount } => Arc::new(AddToVariable {
                key: key.clone(),
                amount: *amount,
            }),
            EffectDef::Toggle { key } => Arc::new(ToggleFlag { key: key.clone() }),
            EffectDef::Host(name) => self
                .effect(name)
                .ok_or_else(|| NarrativeError::UnknownHostBinding(name.clone()))?,
        };
        Ok(compiled)
    }
}

/// A resolved node, borrowed from the store.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Dialogue(&'a Dialogue),
    Choice(&'a Choice),
    Event(&'a EventLine),
}

impl Node<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Dialogue(_) => NodeKind::Dialogue,
            Self::Choice(_) => NodeKind::Choice,
            Self::Event(_) => NodeKind::Event,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// A `next` that names neither a line of its dialogue, the terminal
    /// sentinel, nor any id in the store.
    DanglingNext(String),
    /// No line of the choice is selectable at the minimum responsibility.
    UnreachableChoice,
    /// Line not reachable from the dialogue's entry line.
    UnreachableLine(usize),
    UnknownEntry(String),
    DuplicateLineKey(String),
    /// Same id used by more than one kind of node.
    DuplicateId(Vec<NodeKind>),
    Empty,
    UnrecognizedLogic(String),
    UnrecognizedMode(String),
    InvalidTutorialSkip(i32),
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnreachableLine(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One problem found by [`NarrativeStore::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: NodeKind,
    pub id: String,
    /// Line index within the node, when the issue is line-specific.
    pub line: Option<usize>,
    pub issue: IssueKind,
}

impl ValidationIssue {
    pub fn severity(&self) -> Severity {
        self.issue.severity()
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.id)?;
        if let Some(line) = self.line {
            write!(f, " line {}", line)?;
        }
        match &self.issue {
            IssueKind::DanglingNext(target) => {
                write!(f, ": next '{}' does not resolve", target)
            }
            IssueKind::UnreachableChoice => {
                write!(f, ": no line is selectable at responsibility {}", MIN_RESPONSIBILITY)
            }
            IssueKind::UnreachableLine(index) => {
                write!(f, ": line {} is unreachable from the entry line", index)
            }
            IssueKind::UnknownEntry(key) => write!(f, ": entry '{}' is not a line key", key),
            IssueKind::DuplicateLineKey(key) => write!(f, ": line key '{}' is used twice", key),
            IssueKind::DuplicateId(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                write!(f, ": id shared by {}", names.join(", "))
            }
            IssueKind::Empty => write!(f, ": has no lines"),
            IssueKind::UnrecognizedLogic(tag) => write!(f, ": unrecognized logic '{}'", tag),
            IssueKind::UnrecognizedMode(tag) => {
                write!(f, ": unrecognized execution mode '{}'", tag)
            }
            IssueKind::InvalidTutorialSkip(skip) => {
                write!(f, ": tutorial skip {} is below -1", skip)
            }
        }
    }
}

/// Holds all loaded narrative content. Read-only during play; lookups from
/// several threads are fine, reloading is not.
#[derive(Debug, Clone, Default)]
pub struct NarrativeStore {
    dialogues: FxHashMap<String, Dialogue>,
    choices: FxHashMap<String, Choice>,
    events: FxHashMap<String, EventLine>,
}

/// Builder for constructing a `NarrativeStore`.
pub struct NarrativeStoreBuilder {
    package_dirs: Vec<PathBuf>,
    package_files: Vec<PathBuf>,
    /// Directly provided packages (for testing without files).
    packages: Vec<NarrativePackage>,
    bindings: HostBindings,
    strict: bool,
}

impl NarrativeStore {
    pub fn builder() -> NarrativeStoreBuilder {
        NarrativeStoreBuilder {
            package_dirs: Vec::new(),
            package_files: Vec::new(),
            packages: Vec::new(),
            bindings: HostBindings::default(),
            strict: true,
        }
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_dialogue(&self, id: &str) -> Result<&Dialogue, NarrativeError> {
        self.dialogues
            .get(id)
            .ok_or_else(|| NarrativeError::not_found(NodeKind::Dialogue, id))
    }

    pub fn get_choice(&self, id: &str) -> Result<&Choice, NarrativeError> {
        self.choices
            .get(id)
            .ok_or_else(|| NarrativeError::not_found(NodeKind::Choice, id))
    }

    pub fn get_event(&self, id: &str) -> Result<&EventLine, NarrativeError> {
        self.events
            .get(id)
            .ok_or_else(|| NarrativeError::not_found(NodeKind::Event, id))
    }

    /// Resolve an id of any kind. Dialogues win over choices, choices over
    /// events; validation reports ids shared between kinds.
    pub fn resolve(&self, id: &str) -> Result<Node<'_>, NarrativeError> {
        let node = if let Some(d) = self.dialogues.get(id) {
            Node::Dialogue(d)
        } else if let Some(c) = self.choices.get(id) {
            Node::Choice(c)
        } else if let Some(e) = self.events.get(id) {
            Node::Event(e)
        } else {
            tracing::warn!(id, "unresolved narrative id");
            return Err(NarrativeError::not_found(NodeKind::Any, id));
        };
        tracing::debug!(id, kind = %node.kind(), "resolved node");
        Ok(node)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dialogues.contains_key(id)
            || self.choices.contains_key(id)
            || self.events.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.dialogues.len() + self.choices.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace a dialogue under its own id.
    pub fn insert_dialogue(&mut self, dialogue: Dialogue) {
        self.dialogues.insert(dialogue.id.clone(), dialogue);
    }

    pub fn insert_choice(&mut self, choice: Choice) {
        self.choices.insert(choice.id.clone(), choice);
    }

    pub fn insert_event(&mut self, event: EventLine) {
        self.events.insert(event.id.clone(), event);
    }

    /// Add a package's content, compiling event conditions and effects
    /// against `bindings`. Later entries replace earlier ones with the same id.
    pub fn load_package(
        &mut self,
        package: NarrativePackage,
        bindings: &HostBindings,
    ) -> Result<(), NarrativeError> {
        for (id, raw) in package.dialogues {
            tracing::debug!(id = %id, lines = raw.lines.len(), "loading dialogue");
            self.insert_dialogue(Dialogue {
                id,
                entry: raw.entry,
                lines: raw.lines,
            });
        }

        for (id, raw) in package.choices {
            tracing::debug!(id = %id, lines = raw.lines.len(), "loading choice");
            self.insert_choice(Choice { id, lines: raw.lines });
        }

        for (id, raw) in package.events {
            let conditions = raw
                .conditions
                .iter()
                .map(|def| bindings.compile_condition(def))
                .collect::<Result<Vec<_>, _>>()?;
            let effects = raw
                .results
                .iter()
                .map(|def| bindings.compile_effect(def))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(id = %id, conditions = conditions.len(), effects = effects.len(), "loading event");
            self.insert_event(EventLine {
                id,
                logic: raw.logic,
                mode: raw.mode,
                conditions,
                effects,
            });
        }

        Ok(())
    }

    /// Check every cross-reference and tag. Never fails; returns all issues
    /// found, ordered by kind then id.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for id in sorted_keys(&self.dialogues) {
            self.validate_dialogue(&self.dialogues[id], &mut issues);
        }
        for id in sorted_keys(&self.choices) {
            self.validate_choice(&self.choices[id], &mut issues);
        }
        for id in sorted_keys(&self.events) {
            validate_event(&self.events[id], &mut issues);
        }

        let mut all_ids: Vec<&str> = self
            .dialogues
            .keys()
            .chain(self.choices.keys())
            .chain(self.events.keys())
            .map(String::as_str)
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        all_ids.sort_unstable();
        for id in all_ids {
            let mut kinds = Vec::new();
            if self.dialogues.contains_key(id) {
                kinds.push(NodeKind::Dialogue);
            }
            if self.choices.contains_key(id) {
                kinds.push(NodeKind::Choice);
            }
            if self.events.contains_key(id) {
                kinds.push(NodeKind::Event);
            }
            if kinds.len() > 1 {
                issues.push(ValidationIssue {
                    kind: NodeKind::Any,
                    id: id.to_string(),
                    line: None,
                    issue: IssueKind::DuplicateId(kinds),
                });
            }
        }

        for issue in &issues {
            tracing::warn!(severity = ?issue.severity(), "{}", issue);
        }
        issues
    }

    fn validate_dialogue(&self, dialogue: &Dialogue, issues: &mut Vec<ValidationIssue>) {
        let issue = |line: Option<usize>, issue: IssueKind| ValidationIssue {
            kind: NodeKind::Dialogue,
            id: dialogue.id.clone(),
            line,
            issue,
        };

        if dialogue.lines.is_empty() {
            issues.push(issue(None, IssueKind::Empty));
            return;
        }

        let mut seen = FxHashSet::default();
        for (i, line) in dialogue.lines.iter().enumerate() {
            if let Some(key) = &line.key {
                if !seen.insert(key.as_str()) {
                    issues.push(issue(Some(i), IssueKind::DuplicateLineKey(key.clone())));
                }
            }
            if let Next::External(target) = dialogue.classify(&line.next) {
                if !self.contains(target) {
                    issues.push(issue(Some(i), IssueKind::DanglingNext(target.to_string())));
                }
            }
        }

        let Some(entry) = dialogue.entry_index() else {
            let key = dialogue.entry.clone().unwrap_or_default();
            issues.push(issue(None, IssueKind::UnknownEntry(key)));
            return;
        };

        let mut reached = vec![false; dialogue.lines.len()];
        let mut queue = VecDeque::from([entry]);
        while let Some(index) = queue.pop_front() {
            if std::mem::replace(&mut reached[index], true) {
                continue;
            }
            if let Next::Line(next) = dialogue.classify(&dialogue.lines[index].next) {
                queue.push_back(next);
            }
        }
        for (index, _) in reached.iter().enumerate().filter(|(_, r)| !**r) {
            issues.push(issue(Some(index), IssueKind::UnreachableLine(index)));
        }
    }

    fn validate_choice(&self, choice: &Choice, issues: &mut Vec<ValidationIssue>) {
        let issue = |line: Option<usize>, issue: IssueKind| ValidationIssue {
            kind: NodeKind::Choice,
            id: choice.id.clone(),
            line,
            issue,
        };

        if choice.lines.is_empty() {
            issues.push(issue(None, IssueKind::Empty));
            return;
        }

        for (i, line) in choice.lines.iter().enumerate() {
            if !crate::schema::dialogue::is_terminal(&line.next) && !self.contains(&line.next) {
                issues.push(issue(Some(i), IssueKind::DanglingNext(line.next.clone())));
            }
            if line.tutorial_skip < -1 {
                issues.push(issue(Some(i), IssueKind::InvalidTutorialSkip(line.tutorial_skip)));
            }
        }

        if !choice.lines.iter().any(|line| line.is_open_to(MIN_RESPONSIBILITY)) {
            issues.push(issue(None, IssueKind::UnreachableChoice));
        }
    }

    /// All ids, sorted, for listing tools.
    pub fn ids(&self) -> Vec<(&str, NodeKind)> {
        let mut ids: Vec<_> = self
            .dialogues
            .keys()
            .map(|k| (k.as_str(), NodeKind::Dialogue))
            .chain(self.choices.keys().map(|k| (k.as_str(), NodeKind::Choice)))
            .chain(self.events.keys().map(|k| (k.as_str(), NodeKind::Event)))
            .collect();
        ids.sort_by(|a, b| a.0.cmp(b.0));
        ids
    }
}

fn validate_event(event: &EventLine, issues: &mut Vec<ValidationIssue>) {
    if let Logic::Unrecognized(tag) = &event.logic {
        issues.push(ValidationIssue {
            kind: NodeKind::Event,
            id: event.id.clone(),
            line: None,
            issue: IssueKind::UnrecognizedLogic(tag.clone()),
        });
    }
    if let ExecutionMode::Unrecognized(tag) = &event.mode {
        issues.push(ValidationIssue {
            kind: NodeKind::Event,
            id: event.id.clone(),
            line: None,
            issue: IssueKind::UnrecognizedMode(tag.clone()),
        });
    }
}

fn sorted_keys<V>(map: &FxHashMap<String, V>) -> Vec<&String> {
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort_unstable();
    keys
}

impl NarrativeStoreBuilder {
    /// Load every `.ron` file in `path`, in file-name order.
    pub fn package_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_dirs.push(path.into());
        self
    }

    pub fn package_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_files.push(path.into());
        self
    }

    /// Provide a package directly (for testing without files).
    pub fn with_package(mut self, package: NarrativePackage) -> Self {
        self.packages.push(package);
        self
    }

    pub fn with_condition(mut self, name: &str, condition: Arc<dyn Condition>) -> Self {
        self.bindings.conditions.insert(name.to_string(), condition);
        self
    }

    pub fn with_effect(mut self, name: &str, effect: Arc<dyn Effect>) -> Self {
        self.bindings.effects.insert(name.to_string(), effect);
        self
    }

    /// When set (the default), `build` fails if validation reports any
    /// error-severity issue.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> Result<NarrativeStore, NarrativeError> {
        let mut package = NarrativePackage::default();

        for dir in &self.package_dirs {
            for path in ron_files_in(dir)? {
                tracing::debug!(path = %path.display(), "loading package file");
                package.merge(NarrativePackage::load_from_ron(&path)?);
            }
        }
        for path in &self.package_files {
            tracing::debug!(path = %path.display(), "loading package file");
            package.merge(NarrativePackage::load_from_ron(path)?);
        }
        for direct in self.packages {
            package.merge(direct);
        }

        let mut store = NarrativeStore::new();
        store.load_package(package, &self.bindings)?;

        let issues = store.validate();
        if self.strict && issues.iter().any(|i| i.severity() == Severity::Error) {
            return Err(NarrativeError::InvalidPackage(issues));
        }

        tracing::debug!(nodes = store.len(), issues = issues.len(), "narrative store ready");
        Ok(store)
    }
}

/// All .ron files directly inside `dir`, sorted by path.
fn ron_files_in(dir: &Path) -> Result<Vec<PathBuf>, NarrativeError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::choice::ChoiceLine;
    use crate::schema::state::{StateAccess, Value, VariableStore};

    const PACKAGE: &str = r#"(
        dialogues: {
            "intro": Dialogue(
                lines: [
                    (key: Some("a"), speaker: "Keeper", text: "The [lamp] is out.", next: "b"),
                    (key: Some("b"), speaker: "Mara", text: "Then we light it.", next: "fork"),
                ],
            ),
        },
        choices: {
            "fork": Choice(
                lines: [
                    (text: "Climb the tower", next: "END", classification: "good"),
                    (text: "Blame the keeper", next: "intro", classification: "bad", min_responsibility: 2),
                ],
            ),
        },
        events: {
            "light_lamp": Event(
                logic: "AND",
                conditions: [Flag(key: "has_oil")],
                results: [Set(key: "lamp_lit", value: Bool(true)), Add(key: "responsibility", amount: 1)],
            ),
        },
    )"#;

    fn store() -> NarrativeStore {
        NarrativeStore::builder()
            .with_package(NarrativePackage::parse_ron(PACKAGE).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn loads_all_kinds() {
        let store = store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get_dialogue("intro").unwrap().lines.len(), 2);
        assert_eq!(store.get_choice("fork").unwrap().lines.len(), 2);
        let event = store.get_event("light_lamp").unwrap();
        assert_eq!(event.logic, Logic::And);
        assert_eq!(event.mode, ExecutionMode::Sequential);
        assert_eq!(event.effects.len(), 2);
    }

    #[test]
    fn ids_copied_from_keys() {
        let store = store();
        assert_eq!(store.get_dialogue("intro").unwrap().id, "intro");
        assert_eq!(store.get_choice("fork").unwrap().id, "fork");
    }

    #[test]
    fn text_preserved_verbatim() {
        let store = store();
        assert_eq!(
            store.get_dialogue("intro").unwrap().lines[0].text,
            "The [lamp] is out."
        );
    }

    #[test]
    fn missing_ids_are_not_found() {
        let store = store();
        assert!(matches!(
            store.get_dialogue("nope"),
            Err(NarrativeError::NotFound { kind: NodeKind::Dialogue, .. })
        ));
        assert!(matches!(
            store.get_choice("intro"),
            Err(NarrativeError::NotFound { kind: NodeKind::Choice, .. })
        ));
        assert!(matches!(
            store.get_event("fork"),
            Err(NarrativeError::NotFound { kind: NodeKind::Event, .. })
        ));
        assert!(matches!(
            store.resolve("nope"),
            Err(NarrativeError::NotFound { kind: NodeKind::Any, .. })
        ));
    }

    #[test]
    fn resolve_by_kind() {
        let store = store();
        assert!(matches!(store.resolve("intro").unwrap(), Node::Dialogue(_)));
        assert!(matches!(store.resolve("fork").unwrap(), Node::Choice(_)));
        assert!(matches!(store.resolve("light_lamp").unwrap(), Node::Event(_)));
    }

    #[test]
    fn valid_package_has_no_issues() {
        assert!(store().validate().is_empty());
    }

    #[test]
    fn dangling_choice_next_reported() {
        let mut store = store();
        store.insert_choice(Choice::new(
            "broken",
            vec![ChoiceLine::new("Go", "missing_dialogue")],
        ));
        let issues = store.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "broken");
        assert_eq!(
            issues[0].issue,
            IssueKind::DanglingNext("missing_dialogue".to_string())
        );
        assert_eq!(issues[0].severity(), Severity::Error);
    }

    #[test]
    fn gated_only_choice_reported() {
        let mut store = store();
        let mut line = ChoiceLine::new("Only the brave", "END");
        line.min_responsibility = 1;
        store.insert_choice(Choice::new("locked", vec![line]));
        let issues = store.validate();
        assert!(issues
            .iter()
            .any(|i| i.id == "locked" && i.issue == IssueKind::UnreachableChoice));
    }

    #[test]
    fn unreachable_line_is_warning() {
        let mut store = store();
        let mut d = store.get_dialogue("intro").unwrap().clone();
        d.id = "orphaned".to_string();
        d.lines[0].next = "END".to_string();
        store.insert_dialogue(d);
        let issues = store.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue, IssueKind::UnreachableLine(1));
        assert_eq!(issues[0].severity(), Severity::Warning);
    }

    #[test]
    fn unrecognized_tags_reported() {
        let mut store = store();
        store.insert_event(EventLine::new(
            "odd",
            Logic::Unrecognized("XOR".into()),
            ExecutionMode::Unrecognized("Parallel".into()),
        ));
        let kinds: Vec<_> = store.validate().into_iter().map(|i| i.issue).collect();
        assert!(kinds.contains(&IssueKind::UnrecognizedLogic("XOR".into())));
        assert!(kinds.contains(&IssueKind::UnrecognizedMode("Parallel".into())));
    }

    #[test]
    fn shared_id_reported() {
        let mut store = store();
        store.insert_choice(Choice::new("intro", vec![ChoiceLine::new("Go", "END")]));
        let issues = store.validate();
        assert!(issues.iter().any(|i| i.id == "intro"
            && i.issue == IssueKind::DuplicateId(vec![NodeKind::Dialogue, NodeKind::Choice])));
    }

    #[test]
    fn strict_build_rejects_invalid_package() {
        let bad = r#"(choices: { "c": Choice(lines: [(text: "x", next: "nowhere")]) })"#;
        let result = NarrativeStore::builder()
            .with_package(NarrativePackage::parse_ron(bad).unwrap())
            .build();
        match result {
            Err(NarrativeError::InvalidPackage(issues)) => assert_eq!(issues.len(), 1),
            other => panic!("expected InvalidPackage, got {:?}", other),
        }
    }

    #[test]
    fn lenient_build_keeps_invalid_package() {
        let bad = r#"(choices: { "c": Choice(lines: [(text: "x", next: "nowhere")]) })"#;
        let store = NarrativeStore::builder()
            .strict(false)
            .with_package(NarrativePackage::parse_ron(bad).unwrap())
            .build()
            .unwrap();
        assert!(store.get_choice("c").is_ok());
    }

    #[test]
    fn host_binding_resolved() {
        let pkg = r#"(events: { "e": Event(logic: "OR", conditions: [Host("is_night")], results: [Host("ring_bell")]) })"#;
        let store = NarrativeStore::builder()
            .with_condition(
                "is_night",
                Arc::new(crate::schema::event::FnCondition::new(
                    "is_night",
                    |s: &dyn StateAccess| s.get_variable("hour").and_then(|v| v.as_int()) == Some(23),
                )),
            )
            .with_effect(
                "ring_bell",
                Arc::new(crate::schema::event::FnEffect::new(
                    "ring_bell",
                    |s: &mut dyn StateAccess| s.set_variable("bell", Value::Bool(true)),
                )),
            )
            .with_package(NarrativePackage::parse_ron(pkg).unwrap())
            .build()
            .unwrap();
        let event = store.get_event("e").unwrap();
        let mut state = VariableStore::new().with("hour", Value::Int(23));
        assert!(event.conditions[0].evaluate(&state));
        event.effects[0].apply(&mut state);
        assert_eq!(state.get_variable("bell"), Some(Value::Bool(true)));
    }

    #[test]
    fn unknown_host_binding_fails_load() {
        let pkg = r#"(events: { "e": Event(logic: "AND", conditions: [Not(Host("ghost"))]) })"#;
        let result = NarrativeStore::builder()
            .with_package(NarrativePackage::parse_ron(pkg).unwrap())
            .build();
        assert!(matches!(result, Err(NarrativeError::UnknownHostBinding(name)) if name == "ghost"));
    }

    #[test]
    fn merge_precedence() {
        let mut base = NarrativePackage::parse_ron(PACKAGE).unwrap();
        let override_pkg = NarrativePackage::parse_ron(
            r#"(choices: { "fork": Choice(lines: [(text: "Only way", next: "END")]) })"#,
        )
        .unwrap();
        base.merge(override_pkg);
        assert_eq!(base.choices["fork"].lines.len(), 1);
        assert!(base.dialogues.contains_key("intro"));
    }

    #[test]
    fn issue_display() {
        let issue = ValidationIssue {
            kind: NodeKind::Choice,
            id: "fork".into(),
            line: Some(1),
            issue: IssueKind::DanglingNext("gone".into()),
        };
        assert_eq!(issue.to_string(), "choice 'fork' line 1: next 'gone' does not resolve");
    }

    #[test]
    fn ids_sorted() {
        let store = store();
        let ids: Vec<_> = store.ids().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["fork", "intro", "light_lamp"]);
    }

    #[test]
    fn lowercase_logic_rejected_when_strict() {
        let pkg = r#"(events: { "e": Event(logic: "and", mode: "sequential") })"#;
        match NarrativeStore::builder()
            .with_package(NarrativePackage::parse_ron(pkg).unwrap())
            .build()
        {
            Err(NarrativeError::InvalidPackage(issues)) => {
                let kinds: Vec<_> = issues.into_iter().map(|i| i.issue).collect();
                assert_eq!(
                    kinds,
                    vec![
                        IssueKind::UnrecognizedLogic("and".into()),
                        IssueKind::UnrecognizedMode("sequential".into()),
                    ]
                );
            }
            other => panic!("expected InvalidPackage, got {:?}", other),
        }
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn store_is_shareable_across_threads() {
        assert_send_sync::<NarrativeStore>();
        assert_send_sync::<EventLine>();

        let store = store();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    assert!(store.resolve("intro").is_ok());
                    assert_eq!(store.get_choice("fork").unwrap().lines.len(), 2);
                });
            }
        });
    }
}
