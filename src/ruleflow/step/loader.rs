// SPDX-License-Identifier: MIT

//! Definition loader - YAML file loading and parsing
//!
//! Loads workflow and rule set definitions. Compiling them is left to
//! [`StepBuilder`](super::builder::StepBuilder) and
//! [`RuleSet::compile`](crate::ruleflow::ruleset::RuleSet::compile).

use super::types::WorkflowDefinition;
use crate::rdk::error::RuleflowError;
use crate::ruleflow::ruleset::RuleSetDefinition;
use std::fs;
use std::path::Path;

/// Loads workflow and rule set definitions from YAML files
pub struct DefinitionLoader;

impl DefinitionLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, RuleflowError> {
        let path = path.as_ref();
        log::debug!("Loading workflow from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_workflow(&content)
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_workflow(content: &str) -> Result<WorkflowDefinition, RuleflowError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        if let Some(config) = &def.config {
            config.validate()?;
        }
        Ok(def)
    }

    /// Load a rule set definition from a YAML file
    pub fn load_rule_set<P: AsRef<Path>>(&self, path: P) -> Result<RuleSetDefinition, RuleflowError> {
        let path = path.as_ref();
        log::debug!("Loading rule set from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_rule_set(&content)
    }

    /// Parse a rule set definition from a YAML string
    pub fn parse_rule_set(content: &str) -> Result<RuleSetDefinition, RuleflowError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

impl Default for DefinitionLoader {
    fn default() -> Self {
        Self::new()
    }
}
