//! Wire representation of a hierarchical document.
//!
//! A [`Document`] is what the server returns from a poll and what the client
//! pushes after a write. It mirrors the local tree element for element, plus the
//! markers that carry intent across the wire: `remove`, `change` and `empty`.
//!
//! The three-state value survives the round trip: an element with
//! `empty: true` holds an explicitly empty value, an element with neither text
//! nor the marker holds no value at all.

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    path::{Path, Step},
};

fn is_false(value: &bool) -> bool {
    !*value
}

/// A full snapshot: the ordered top-level elements below the root anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One element of a [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub empty: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub remove: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub change: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builds an element addressed by `step`.
    pub fn from_step(step: &Step) -> Self {
        Self {
            name: step.name().to_string(),
            id: step.id().map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_value(mut self, value: Option<&str>) -> Self {
        self.set_value(value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Marks this element for removal.
    pub fn removed(mut self) -> Self {
        self.remove = true;
        self
    }

    /// Marks this element's value as a delta.
    pub fn changed(mut self) -> Self {
        self.change = true;
        self
    }

    /// The element's value: `None` when unset, `Some("")` when explicitly empty.
    ///
    /// Zero-length text without the `empty` marker counts as unset.
    pub fn value(&self) -> Option<&str> {
        if self.empty {
            return Some("");
        }
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Stores a three-state value, keeping `text` and `empty` consistent.
    pub fn set_value(&mut self, value: Option<&str>) {
        match value {
            None => {
                self.text = None;
                self.empty = false;
            }
            Some("") => {
                self.text = None;
                self.empty = true;
            }
            Some(text) => {
                self.text = Some(text.to_string());
                self.empty = false;
            }
        }
    }

    /// The `(name, id)` step addressing this element.
    pub fn step(&self) -> Step {
        Step::from_parts(&self.name, self.id.as_deref())
    }

    fn matches(&self, step: &Step) -> bool {
        self.name == step.name() && self.id.as_deref() == step.id()
    }
}

fn find_in<'a>(elements: &'a [Element], path: &[Step]) -> Option<&'a Element> {
    let (first, rest) = path.split_first()?;
    let element = elements.iter().find(|e| e.matches(first))?;
    if rest.is_empty() {
        Some(element)
    } else {
        find_in(&element.children, rest)
    }
}

fn find_or_insert<'a>(elements: &'a mut Vec<Element>, path: &[Step]) -> Option<&'a mut Element> {
    let (first, rest) = path.split_first()?;
    let index = match elements.iter().position(|e| e.matches(first)) {
        Some(index) => index,
        None => {
            elements.push(Element::from_step(first));
            elements.len() - 1
        }
    };
    let element = &mut elements[index];
    if rest.is_empty() {
        Some(element)
    } else {
        find_or_insert(&mut element.children, rest)
    }
}

/// Adds `delta` to `current` when both are numbers; otherwise the delta wins.
fn apply_delta(current: Option<&str>, delta: &str) -> String {
    let current = current.unwrap_or("0").trim();
    let delta = delta.trim();
    if let (Ok(a), Ok(b)) = (current.parse::<i64>(), delta.parse::<i64>()) {
        return a.saturating_add(b).to_string();
    }
    match (current.parse::<f64>(), delta.parse::<f64>()) {
        (Ok(a), Ok(b)) => (a + b).to_string(),
        _ => delta.to_string(),
    }
}

/// What [`Document::merge_with`] did to the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub changed: bool,
    /// Paths deleted by remove markers, in document order.
    pub removed: Vec<Path>,
    /// Paths of elements the merge had to create.
    pub created: Vec<Path>,
    /// Missing elements the merge declined to create.
    pub skipped: Vec<Path>,
}

fn merge_into(
    target: &mut Vec<Element>,
    incoming: &Element,
    parent: &Path,
    stale: &dyn Fn(&Path) -> bool,
    report: &mut MergeReport,
) {
    let step = incoming.step();
    let path = parent.clone().push(step.clone());
    let position = target.iter().position(|e| e.matches(&step));

    if incoming.remove {
        if let Some(index) = position {
            target.remove(index);
            report.changed = true;
            report.removed.push(path);
        }
        return;
    }

    let index = match position {
        Some(index) => index,
        None if stale(&path) => {
            report.skipped.push(path);
            return;
        }
        None => {
            target.push(Element::from_step(&step));
            report.changed = true;
            report.created.push(path.clone());
            target.len() - 1
        }
    };
    let element = &mut target[index];

    if incoming.change {
        if let Some(delta) = incoming.value() {
            let next = apply_delta(element.value(), delta);
            if element.value() != Some(next.as_str()) {
                element.set_value(Some(&next));
                report.changed = true;
            }
        }
    } else if let Some(value) = incoming.value()
        && element.value() != Some(value)
    {
        element.set_value(Some(value));
        report.changed = true;
    }

    for child in &incoming.children {
        merge_into(&mut element.children, child, &path, stale, report);
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Finds the element at `path`.
    pub fn find(&self, path: &Path) -> Option<&Element> {
        find_in(&self.elements, path.steps())
    }

    /// Finds the element at `path`, appending any missing elements on the way.
    ///
    /// Returns `None` only for the empty path.
    pub fn element_at_mut(&mut self, path: &Path) -> Option<&mut Element> {
        find_or_insert(&mut self.elements, path.steps())
    }

    /// Folds a pushed document into this one.
    ///
    /// Elements are matched by name and id. A `remove` marker deletes the
    /// matching subtree, a `change` marker adds its value to the current one
    /// and any other present value replaces the current one. Unset values leave
    /// the target alone. Returns whether anything changed.
    pub fn merge(&mut self, incoming: &Document) -> bool {
        self.merge_with(incoming, |_| false).changed
    }

    /// Like [`merge`](Self::merge), but refuses to create any missing element
    /// whose path `stale` accepts, together with everything below it.
    pub fn merge_with(
        &mut self,
        incoming: &Document,
        stale: impl Fn(&Path) -> bool,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        let root = Path::new();
        for element in &incoming.elements {
            merge_into(&mut self.elements, element, &root, &stale, &mut report);
        }
        report
    }

    /// Serializes the document as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
