// SPDX-License-Identifier: MIT

//! YAML schema types for workflow and rule definitions

use crate::rdk::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a parent step's result follows from its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadePolicy {
    /// Fails if any child failed
    #[default]
    #[serde(alias = "AnyOneFailsParent")]
    AnyOneFails,
    /// Completes if any child completed
    #[serde(alias = "AnyOneCompletesParent")]
    AnyOneCompletes,
    /// Completes only if every child completed
    #[serde(alias = "AllMustCompleteParent")]
    AllMustComplete,
    /// Completes only if every child failed
    #[serde(alias = "AllMustFailParent")]
    AllMustFail,
}

impl fmt::Display for CascadePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CascadePolicy::AnyOneFails => "any_one_fails",
            CascadePolicy::AnyOneCompletes => "any_one_completes",
            CascadePolicy::AllMustComplete => "all_must_complete",
            CascadePolicy::AllMustFail => "all_must_fail",
        };
        write!(f, "{}", name)
    }
}

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Engine settings for this workflow; environment settings apply otherwise
    pub config: Option<EngineConfig>,
    /// Root of the step tree
    pub step: StepDefinition,
}

/// A step in a workflow definition
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StepDefinition {
    pub name: String,
    /// Shorthand for a single instruction
    pub instruction: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Position among siblings; lower runs first
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub cascade: CascadePolicy,
    #[serde(default)]
    pub children: Vec<StepDefinition>,
}

impl StepDefinition {
    /// `instruction` followed by `instructions`
    pub fn all_instructions(&self) -> impl Iterator<Item = &str> {
        self.instruction
            .iter()
            .chain(self.instructions.iter())
            .map(String::as_str)
    }
}
