//! Failure records with chained and aggregated causes.
//!
//! Errors live in an arena owned by the [`FailureRecord`] and refer to their
//! causes by [`ErrorId`]. Identity comparisons (is this error its own cause?)
//! are id comparisons.

/// Position of an error inside its owning [`FailureRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorId(usize);

impl ErrorId {
    /// Id of the error at `index` in an arena handed to
    /// [`FailureRecord::from_parts`], which checks the range.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// What caused an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    Single(ErrorId),
    /// Several errors reported together, in order.
    Aggregate(Vec<ErrorId>),
}

/// One error in a failure chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNode {
    /// Kind name rendered in `Caused by:` lines.
    pub kind: String,
    pub message_lines: Vec<String>,
    pub stack_trace: Vec<String>,
    pub cause: Option<Cause>,
}

impl ErrorNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message_lines: Vec::new(),
            stack_trace: Vec::new(),
            cause: None,
        }
    }

    /// Split `message` into physical lines.
    pub fn with_message(mut self, message: &str) -> Self {
        self.message_lines = message.lines().map(str::to_string).collect();
        self
    }

    pub fn with_stack_trace<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_trace = frames.into_iter().map(Into::into).collect();
        self
    }
}

/// A test failure: the root error plus every error reachable through causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    errors: Vec<ErrorNode>,
    root: ErrorId,
}

impl FailureRecord {
    pub fn new(root: ErrorNode) -> Self {
        Self {
            errors: vec![root],
            root: ErrorId(0),
        }
    }

    /// Build a record from an externally supplied arena.
    ///
    /// Every referenced id must be in range.
    pub fn from_parts(errors: Vec<ErrorNode>, root: usize) -> Result<Self, String> {
        if root >= errors.len() {
            return Err(format!(
                "failure root {root} out of range ({} errors)",
                errors.len()
            ));
        }
        for (index, error) in errors.iter().enumerate() {
            let referenced: Vec<ErrorId> = match &error.cause {
                None => Vec::new(),
                Some(Cause::Single(id)) => vec![*id],
                Some(Cause::Aggregate(ids)) => ids.clone(),
            };
            if let Some(bad) = referenced.iter().find(|id| id.0 >= errors.len()) {
                return Err(format!(
                    "error {index} refers to missing cause {}",
                    bad.0
                ));
            }
        }
        Ok(Self {
            errors,
            root: ErrorId(root),
        })
    }

    /// Convenience for a failure with a single message and no cause.
    pub fn message(kind: impl Into<String>, message: &str) -> Self {
        Self::new(ErrorNode::new(kind).with_message(message))
    }

    pub fn push(&mut self, error: ErrorNode) -> ErrorId {
        self.errors.push(error);
        ErrorId(self.errors.len() - 1)
    }

    pub fn set_cause(&mut self, of: ErrorId, cause: Cause) {
        self.errors[of.0].cause = Some(cause);
    }

    pub fn root(&self) -> ErrorId {
        self.root
    }

    pub fn error(&self, id: ErrorId) -> &ErrorNode {
        &self.errors[id.0]
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
