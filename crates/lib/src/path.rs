//! Path types for addressing nodes in the synchronized tree.
//!
//! A path is one or more steps separated by dots. A step is an element name,
//! optionally followed by an id in parentheses:
//!
//! ```text
//! ScoreBoard.Team(1).Skater(Some Skater name).Number
//! ```
//!
//! Names are alphanumeric (underscores are accepted as well). Ids may contain any
//! character except parentheses, including dots and spaces. An id-less step and
//! a step with an empty id (`Team()`) are different steps.
//!
//! # Core Types
//!
//! - [`Step`] - one `(name, id)` unit of a path
//! - [`Path`] - an ordered list of steps
//!
//! # Usage
//!
//! ```rust
//! use treesync::path::{Path, Step};
//!
//! let path = Path::parse("Team(1).Score")?;
//! assert_eq!(path.steps(), &[Step::with_id("Team", "1")?, Step::named("Score")?]);
//! assert_eq!(path.to_string(), "Team(1).Score");
//!
//! // Malformed input is rejected by `parse`...
//! assert!(Path::parse("Team(1").is_err());
//! // ...while `parse_lenient` skips what it cannot read.
//! assert_eq!(Path::parse_lenient("Team(1).$.Score").to_string(), "Team(1).Score");
//! # Ok::<(), treesync::path::PathError>(())
//! ```

use std::{fmt, ops::Deref, str::FromStr};

use thiserror::Error;

/// Error type for path parsing and step validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    /// The path string does not follow the step grammar.
    #[error("Malformed path '{path}' at byte {position}: {reason}")]
    Malformed {
        path: String,
        position: usize,
        reason: &'static str,
    },

    /// A step name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("Invalid element name '{name}'")]
    InvalidName { name: String },

    /// A step id contains a parenthesis.
    #[error("Invalid id '{id}': ids cannot contain parentheses")]
    InvalidId { id: String },
}

impl PathError {
    /// Check if this error came from parsing a full path string.
    pub fn is_malformed(&self) -> bool {
        matches!(self, PathError::Malformed { .. })
    }

    /// Check if this error came from validating a single step.
    pub fn is_invalid_step(&self) -> bool {
        matches!(
            self,
            PathError::InvalidName { .. } | PathError::InvalidId { .. }
        )
    }
}

impl From<PathError> for crate::Error {
    fn from(err: PathError) -> Self {
        crate::Error::Path(err)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_id_char(c: char) -> bool {
    c != '(' && c != ')'
}

/// One `(name, id)` unit of a parsed path.
///
/// Two steps are equal only when both the name and the id match exactly;
/// `None` never equals `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    name: String,
    id: Option<String>,
}

impl Step {
    /// Creates a validated step.
    pub fn new(name: impl Into<String>, id: Option<String>) -> Result<Self, PathError> {
        let name = name.into();
        if name.is_empty() || !name.chars().all(is_name_char) {
            return Err(PathError::InvalidName { name });
        }
        if let Some(id) = &id
            && !id.chars().all(is_id_char)
        {
            return Err(PathError::InvalidId { id: id.clone() });
        }
        Ok(Self { name, id })
    }

    /// Creates a validated step without an id.
    pub fn named(name: impl Into<String>) -> Result<Self, PathError> {
        Self::new(name, None)
    }

    /// Creates a validated step carrying an id.
    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Result<Self, PathError> {
        Self::new(name, Some(id.into()))
    }

    /// Builds a step from parts received from the server, which are trusted as-is.
    pub(crate) fn from_parts(name: &str, id: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            id: id.map(str::to_string),
        }
    }

    /// The element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id, if the step carries one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}({id})", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Step {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = Path::parse(s)?;
        match <[Step; 1]>::try_from(path.steps) {
            Ok([step]) => Ok(step),
            Err(_) => Err(PathError::Malformed {
                path: s.to_string(),
                position: 0,
                reason: "expected exactly one step",
            }),
        }
    }
}

/// An ordered list of steps identifying a node relative to a starting node.
///
/// The empty path refers to the starting node itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Creates a path from already validated steps.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Appends a step, builder style.
    pub fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends all steps of `other`.
    pub fn join(mut self, other: &Path) -> Self {
        self.steps.extend(other.steps.iter().cloned());
        self
    }

    /// The steps of this path, first step first.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The path without its last step, or `None` for the empty path.
    pub fn parent(&self) -> Option<Path> {
        let (_, rest) = self.steps.split_last()?;
        Some(Path::from_steps(rest.to_vec()))
    }

    /// The last step, or `None` for the empty path.
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Parses a path string, rejecting anything outside the grammar.
    ///
    /// The empty string parses to the empty path.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let malformed = |position: usize, reason: &'static str| PathError::Malformed {
            path: input.to_string(),
            position,
            reason,
        };

        let mut steps = Vec::new();
        if input.is_empty() {
            return Ok(Self { steps });
        }

        let mut chars = input.char_indices().peekable();
        loop {
            let start = chars.peek().map_or(input.len(), |&(i, _)| i);
            let mut name_end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !is_name_char(c) {
                    break;
                }
                name_end = i + c.len_utf8();
                chars.next();
            }
            if name_end == start {
                return Err(malformed(start, "expected an element name"));
            }
            let name = &input[start..name_end];

            let mut id = None;
            if let Some(&(open, '(')) = chars.peek() {
                chars.next();
                let id_start = open + 1;
                let mut closed = None;
                for (i, c) in chars.by_ref() {
                    match c {
                        ')' => {
                            closed = Some(i);
                            break;
                        }
                        '(' => return Err(malformed(i, "nested '(' inside an id")),
                        _ => {}
                    }
                }
                let close = closed.ok_or_else(|| malformed(open, "unterminated id"))?;
                id = Some(input[id_start..close].to_string());
            }

            steps.push(Step {
                name: name.to_string(),
                id,
            });

            match chars.next() {
                None => break,
                Some((_, '.')) => {
                    if chars.peek().is_none() {
                        return Err(malformed(input.len(), "trailing '.'"));
                    }
                }
                Some((i, _)) => return Err(malformed(i, "expected '.' between steps")),
            }
        }

        Ok(Self { steps })
    }

    /// Parses a path string, silently skipping text that does not form a step.
    ///
    /// Every maximal run of name characters becomes a step; a directly following
    /// `(...)` without nested parentheses becomes its id. Everything else is
    /// dropped. Hosts that want malformed input reported should use [`Path::parse`].
    pub fn parse_lenient(input: &str) -> Self {
        let mut steps = Vec::new();
        let bytes: Vec<(usize, char)> = input.char_indices().collect();
        let mut pos = 0;

        while pos < bytes.len() {
            let (start, c) = bytes[pos];
            if !is_name_char(c) {
                pos += 1;
                continue;
            }
            let mut end = pos;
            while end < bytes.len() && is_name_char(bytes[end].1) {
                end += 1;
            }
            let name_end = bytes.get(end).map_or(input.len(), |&(i, _)| i);
            let name = input[start..name_end].to_string();
            pos = end;

            let mut id = None;
            if let Some(&(open, '(')) = bytes.get(pos) {
                let close = bytes[pos + 1..]
                    .iter()
                    .take_while(|&&(_, c)| c != '(')
                    .find(|&&(_, c)| c == ')');
                if let Some(&(close, _)) = close {
                    id = Some(input[open + 1..close].to_string());
                    pos = bytes
                        .iter()
                        .position(|&(i, _)| i == close)
                        .map_or(bytes.len(), |p| p + 1);
                }
            }

            steps.push(Step { name, id });
        }

        Self { steps }
    }
}

impl Deref for Path {
    type Target = [Step];

    fn deref(&self) -> &Self::Target {
        &self.steps
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Path::parse(s)
    }
}

impl From<Step> for Path {
    fn from(step: Step) -> Self {
        Path { steps: vec![step] }
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
