// SPDX-License-Identifier: MIT

//! Typed error handling for ruleflow-rs
//!
//! Parse errors carry the offending fragment and its position in the source
//! text. Evaluation failures (a rule that does not hold) are not errors; they
//! are recorded as diagnostics. Only structural problems end up here.

use super::value::ValueKind;
use thiserror::Error;

/// Top-level error type for ruleflow-rs
#[derive(Debug, Error)]
pub enum RuleflowError {
    /// Rule or workflow text could not be compiled
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A rule could not be evaluated against a value
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// A workflow step or action could not be executed
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Configuration errors (invalid env vars, invalid config values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rule in a rule set failed to compile
    #[error("Rule for field '{field}' is invalid: {source}")]
    Rule {
        field: String,
        #[source]
        source: ParseError,
    },

    /// An instruction of a workflow step failed to compile
    #[error("Instruction of step '{step}' is invalid: {source}")]
    Instruction {
        step: String,
        #[source]
        source: ParseError,
    },

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

impl RuleflowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A compile-time error with the offending substring and its byte position
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at position {position} near '{fragment}'")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub fragment: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, fragment: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            fragment: fragment.into(),
            position,
        }
    }
}

/// What went wrong while compiling
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("empty input")]
    Empty,

    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },

    #[error("unterminated quoted literal")]
    UnterminatedQuote,

    #[error("unknown modifier '{0}'")]
    UnknownModifier(String),

    #[error("missing argument for modifier '{0}'")]
    MissingArgument(String),

    #[error("invalid argument '{argument}' for modifier '{modifier}': {reason}")]
    InvalidArgument {
        modifier: String,
        argument: String,
        reason: String,
    },

    #[error("modifier '{0}' given more than once")]
    DuplicateModifier(String),

    #[error("unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("action '{action}' expects {expected} parameters, found {found}")]
    Arity {
        action: String,
        expected: String,
        found: usize,
    },

    #[error("parameter {index} of action '{action}' must be an action")]
    ExpectedAction { action: String, index: usize },

    #[error("workflow chain has more than three parts")]
    ChainTooLong,

    #[error("nesting depth exceeds limit of {0}")]
    TooDeep(usize),
}

/// Errors raised while evaluating a compiled rule
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The modifier cannot be applied to this category of value
    #[error("modifier '{modifier}' cannot be applied to a value of kind {kind}")]
    WrongValueKind { modifier: String, kind: ValueKind },

    /// `indb` was used but no lookup collaborator was configured
    #[error("modifier '{0}' requires a lookup but none is configured")]
    LookupUnavailable(String),

    /// The lookup collaborator itself failed
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("nesting depth exceeds limit of {0}")]
    TooDeep(usize),
}

/// Errors raised while executing workflow steps
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// No handler registered for an action kind
    #[error("no handler registered for action '{0}'")]
    NoHandler(String),

    /// The target value does not have the shape the action needs
    #[error("action '{action}' cannot use target: {reason}")]
    InvalidTarget { action: String, reason: String },

    /// An action handler failed
    #[error("action '{action}' failed: {message}")]
    Action { action: String, message: String },

    /// A rule used inside an action could not be evaluated
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("nesting depth exceeds limit of {0}")]
    TooDeep(usize),
}

impl WorkflowError {
    pub fn action(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Action {
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn invalid_target(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
