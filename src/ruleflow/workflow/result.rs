// SPDX-License-Identifier: MIT

//! Outcome of running an action or a step

use crate::rdk::error::WorkflowError;
use crate::rdk::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    #[default]
    New,
    Pending,
    Active,
    Complete,
    Fail,
    /// Nothing ran; left out of cascade aggregation
    NoAction,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultKind::New => "New",
            ResultKind::Pending => "Pending",
            ResultKind::Active => "Active",
            ResultKind::Complete => "Complete",
            ResultKind::Fail => "Fail",
            ResultKind::NoAction => "NoAction",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowResult {
    pub kind: ResultKind,
    /// Value produced by the action, if any (`GET`, `Today`, `LIST`, ...)
    pub value: Option<Value>,
    /// Why the action failed
    pub failure: Option<String>,
}

impl WorkflowResult {
    pub fn complete() -> Self {
        Self {
            kind: ResultKind::Complete,
            ..Default::default()
        }
    }

    pub fn complete_with(value: Value) -> Self {
        Self {
            kind: ResultKind::Complete,
            value: Some(value),
            failure: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Fail,
            value: None,
            failure: Some(reason.into()),
        }
    }

    pub fn no_action() -> Self {
        Self {
            kind: ResultKind::NoAction,
            ..Default::default()
        }
    }

    pub fn from_bool(passed: bool, reason: impl FnOnce() -> String) -> Self {
        if passed {
            Self::complete()
        } else {
            Self::fail(reason())
        }
    }

    /// Fail result describing an execution error
    pub fn from_error(error: &WorkflowError) -> Self {
        Self::fail(error.to_string())
    }

    pub fn is_complete(&self) -> bool {
        self.kind == ResultKind::Complete
    }

    pub fn is_fail(&self) -> bool {
        self.kind == ResultKind::Fail
    }

    /// Swap Complete and Fail; other kinds are unchanged
    pub fn negated(self) -> Self {
        match self.kind {
            ResultKind::Complete => Self {
                kind: ResultKind::Fail,
                value: self.value,
                failure: Some("negated result".to_string()),
            },
            ResultKind::Fail => Self {
                kind: ResultKind::Complete,
                value: self.value,
                failure: None,
            },
            _ => self,
        }
    }
}
