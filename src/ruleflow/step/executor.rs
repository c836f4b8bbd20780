// SPDX-License-Identifier: MIT

//! Step tree execution
//!
//! A step runs its instructions in order against the context's target. A
//! failing instruction ends the step. When the instructions complete, the
//! children run in ascending execution order and the step's result becomes
//! the cascade of theirs.

use super::types::CascadePolicy;
use crate::rdk::error::{ParseError, WorkflowError};
use crate::ruleflow::workflow::translate::describe_instruction;
use crate::ruleflow::workflow::{
    ExecutionContext, Instruction, ResultKind, WorkflowParser, WorkflowResult,
};
use once_cell::sync::Lazy;
use std::fmt;

static DEFAULT_PARSER: Lazy<WorkflowParser> = Lazy::new(WorkflowParser::default);

/// A node of the workflow tree; owns its children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    pub name: String,
    pub execution_order: i32,
    pub instructions: Vec<Instruction>,
    pub children: Vec<Step>,
    pub cascade: CascadePolicy,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Step with one instruction compiled with the default configuration
    pub fn compile(name: impl Into<String>, instruction: &str) -> Result<Self, ParseError> {
        let instruction = DEFAULT_PARSER.parse(instruction)?;
        Ok(Self::new(name).with_instruction(instruction))
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_cascade(mut self, cascade: CascadePolicy) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn with_child(mut self, child: Step) -> Self {
        self.children.push(child);
        self
    }

    /// Run the step tree against the context's target
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<WorkflowResult, WorkflowError> {
        self.execute_at(ctx, 0)
    }

    fn execute_at(
        &self,
        ctx: &mut ExecutionContext,
        depth: usize,
    ) -> Result<WorkflowResult, WorkflowError> {
        let max_depth = ctx.config().max_depth;
        if depth > max_depth {
            return Err(WorkflowError::TooDeep(max_depth));
        }

        ctx.enter(&self.name);
        let result = self.run_tree(ctx, depth);
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                log::error!("Step '{}' failed: {}", self.name, err);
                ctx.leave(&WorkflowResult::from_error(&err));
                return Err(err);
            }
        };
        ctx.leave(&result);

        log::info!("Step '{}' -> {}", self.name, result.kind);
        Ok(result)
    }

    fn run_tree(
        &self,
        ctx: &mut ExecutionContext,
        depth: usize,
    ) -> Result<WorkflowResult, WorkflowError> {
        let own = if self.instructions.is_empty() {
            WorkflowResult::no_action()
        } else {
            self.run_instructions(ctx)?
        };
        if self.children.is_empty() {
            return Ok(own);
        }
        // a step that did nothing itself still hands over to its children
        let own = if own.kind == ResultKind::NoAction {
            WorkflowResult::complete()
        } else {
            own
        };

        if !own.is_complete() || ctx.is_halted() {
            return Ok(own);
        }

        let mut ordered: Vec<&Step> = self.children.iter().collect();
        ordered.sort_by_key(|child| child.execution_order);

        let mut kinds = Vec::with_capacity(ordered.len());
        for child in ordered {
            if ctx.is_halted() {
                log::debug!("Run halted before step '{}'", child.name);
                break;
            }
            kinds.push(child.execute_at(ctx, depth + 1)?.kind);
        }

        let overall = determine_overall_result(self.cascade, &kinds);
        log::debug!(
            "Step '{}' cascade {} over {:?} -> {}",
            self.name,
            self.cascade,
            kinds,
            overall
        );
        Ok(match overall {
            ResultKind::Fail => WorkflowResult {
                kind: ResultKind::Fail,
                value: own.value,
                failure: Some(format!("children did not satisfy {}", self.cascade)),
            },
            kind => WorkflowResult { kind, ..own },
        })
    }

    fn run_instructions(&self, ctx: &mut ExecutionContext) -> Result<WorkflowResult, WorkflowError> {
        let mut last: Option<WorkflowResult> = None;

        for instruction in &self.instructions {
            let result = match instruction {
                Instruction::Action(action) => ctx.run_action(action, 0)?,
                Instruction::Test {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let test = ctx.run_action(condition, 0)?;
                    match (test.kind, else_branch) {
                        (ResultKind::Complete, _) => ctx.run_action(then_branch, 0)?,
                        (ResultKind::Fail, Some(else_branch)) => ctx.run_action(else_branch, 0)?,
                        _ => test,
                    }
                }
            };

            if result.is_fail() {
                return Ok(result);
            }
            if result.kind != ResultKind::NoAction {
                last = Some(result);
            }
            if ctx.is_halted() {
                break;
            }
        }

        Ok(last.unwrap_or_else(WorkflowResult::no_action))
    }

    /// Human-readable rendering of the step tree
    pub fn wordify(&self) -> StepTranslation {
        let mut children: Vec<&Step> = self.children.iter().collect();
        children.sort_by_key(|child| child.execution_order);
        StepTranslation {
            name: self.name.clone(),
            cascade: self.cascade,
            lines: self.instructions.iter().map(describe_instruction).collect(),
            children: children.into_iter().map(Step::wordify).collect(),
        }
    }
}

/// Combine child results under a cascade policy
///
/// Only Complete and Fail count. With nothing to count the parent completes.
pub fn determine_overall_result(policy: CascadePolicy, children: &[ResultKind]) -> ResultKind {
    let counted: Vec<ResultKind> = children
        .iter()
        .copied()
        .filter(|k| matches!(k, ResultKind::Complete | ResultKind::Fail))
        .collect();
    if counted.is_empty() {
        return ResultKind::Complete;
    }

    let completes = |k: &ResultKind| *k == ResultKind::Complete;
    let fails = |k: &ResultKind| *k == ResultKind::Fail;
    let passed = match policy {
        CascadePolicy::AnyOneFails => !counted.iter().any(fails),
        CascadePolicy::AnyOneCompletes => counted.iter().any(completes),
        CascadePolicy::AllMustComplete => counted.iter().all(completes),
        CascadePolicy::AllMustFail => counted.iter().all(fails),
    };
    if passed {
        ResultKind::Complete
    } else {
        ResultKind::Fail
    }
}

/// Readable form of a step and its children
#[derive(Debug, Clone, PartialEq)]
pub struct StepTranslation {
    pub name: String,
    pub cascade: CascadePolicy,
    pub lines: Vec<String>,
    pub children: Vec<StepTranslation>,
}

impl StepTranslation {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        if self.children.is_empty() {
            writeln!(f, "{}{}:", pad, self.name)?;
        } else {
            writeln!(f, "{}{} ({}):", pad, self.name, self.cascade)?;
        }
        for line in &self.lines {
            writeln!(f, "{}  - {}", pad, line)?;
        }
        for child in &self.children {
            child.write_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for StepTranslation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
