// SPDX-License-Identifier: MIT

//! Step builder - compiles step definitions into executable step trees

use super::executor::Step;
use super::loader::DefinitionLoader;
use super::types::{StepDefinition, WorkflowDefinition};
use crate::rdk::config::EngineConfig;
use crate::rdk::error::{ParseError, ParseErrorKind, RuleflowError};
use crate::ruleflow::workflow::WorkflowParser;
use std::path::Path;

/// Compiles [`StepDefinition`] trees with one engine configuration
pub struct StepBuilder {
    parser: WorkflowParser,
    max_depth: usize,
}

impl StepBuilder {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            parser: WorkflowParser::new(config),
            max_depth: config.max_depth,
        }
    }

    /// Compile a step and its children
    ///
    /// Every instruction in the tree is compiled before anything runs, so a
    /// bad instruction anywhere rejects the whole tree.
    pub fn build(&self, def: &StepDefinition) -> Result<Step, RuleflowError> {
        self.build_at(def, 0)
    }

    fn build_at(&self, def: &StepDefinition, depth: usize) -> Result<Step, RuleflowError> {
        if depth > self.max_depth {
            return Err(RuleflowError::Instruction {
                step: def.name.clone(),
                source: ParseError::new(ParseErrorKind::TooDeep(self.max_depth), &def.name, 0),
            });
        }

        let mut step = Step::new(&def.name)
            .with_order(def.order)
            .with_cascade(def.cascade);

        for source in def.all_instructions() {
            let instruction = self
                .parser
                .parse(source)
                .map_err(|source| RuleflowError::Instruction {
                    step: def.name.clone(),
                    source,
                })?;
            step = step.with_instruction(instruction);
        }

        for child in &def.children {
            step = step.with_child(self.build_at(child, depth + 1)?);
        }

        Ok(step)
    }

    /// Compile the root step of a workflow definition
    pub fn build_workflow(&self, def: &WorkflowDefinition) -> Result<Step, RuleflowError> {
        let step = self.build(&def.step)?;
        log::info!("Compiled workflow '{}' (root step '{}')", def.name, step.name);
        Ok(step)
    }
}

impl Default for StepBuilder {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// A compiled workflow with the configuration it runs under
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    pub name: String,
    pub config: EngineConfig,
    pub root: Step,
}

impl CompiledWorkflow {
    /// Compile a definition; its own `config:` block wins over `fallback`
    pub fn compile(def: &WorkflowDefinition, fallback: &EngineConfig) -> Result<Self, RuleflowError> {
        let config = def.config.clone().unwrap_or_else(|| fallback.clone());
        config.validate()?;
        let root = StepBuilder::new(&config).build_workflow(def)?;
        Ok(Self {
            name: def.name.clone(),
            config,
            root,
        })
    }

    /// Load and compile a workflow file
    pub fn load<P: AsRef<Path>>(path: P, fallback: &EngineConfig) -> Result<Self, RuleflowError> {
        let def = DefinitionLoader::new().load_workflow(path)?;
        Self::compile(&def, fallback)
    }
}
