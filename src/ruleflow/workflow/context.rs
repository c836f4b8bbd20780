// SPDX-License-Identifier: MIT

//! Per-run workflow state and the view handed to action handlers

use super::ast::{Param, WorkflowAction};
use super::registry::ActionRegistry;
use super::result::WorkflowResult;
use crate::rdk::config::EngineConfig;
use crate::rdk::error::WorkflowError;
use crate::rdk::value::Value;
use crate::ruleflow::expression::Evaluator;
use chrono::NaiveDate;

/// Result recorded for one executed step
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Step names from the root, joined with `/`
    pub path: String,
    pub result: WorkflowResult,
}

/// Mutable state of one workflow run
///
/// Compiled steps and actions stay untouched; everything a run changes lives
/// here.
pub struct ExecutionContext {
    target: Value,
    registry: ActionRegistry,
    evaluator: Evaluator,
    today: NaiveDate,
    halted: bool,
    path: Vec<String>,
    trace: Vec<TraceEntry>,
}

impl ExecutionContext {
    pub fn new(target: Value, registry: ActionRegistry) -> Self {
        Self {
            target,
            registry,
            evaluator: Evaluator::default(),
            today: chrono::Local::now().date_naive(),
            halted: false,
            path: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Fix the date the calendar actions count from
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn target(&self) -> &Value {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut Value {
        &mut self.target
    }

    pub fn into_target(self) -> Value {
        self.target
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &EngineConfig {
        self.evaluator.config()
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Stop the run after the current action
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub(crate) fn enter(&mut self, step: &str) {
        self.path.push(step.to_string());
    }

    pub(crate) fn leave(&mut self, result: &WorkflowResult) {
        self.trace.push(TraceEntry {
            path: self.path.join("/"),
            result: result.clone(),
        });
        self.path.pop();
    }

    /// Run one action through its registered handler and apply its negation
    pub fn run_action(
        &mut self,
        action: &WorkflowAction,
        depth: usize,
    ) -> Result<WorkflowResult, WorkflowError> {
        let max_depth = self.config().max_depth;
        if depth > max_depth {
            return Err(WorkflowError::TooDeep(max_depth));
        }

        let handler = self
            .registry
            .get(action.kind)
            .ok_or_else(|| WorkflowError::NoHandler(action.kind.name().to_string()))?;

        let raw = {
            let mut call = ActionCall {
                action,
                ctx: self,
                depth,
            };
            handler.execute(&mut call)?
        };
        let result = action.read_result(raw);

        log::debug!("Action '{}' -> {}", action.source, result.kind);
        Ok(result)
    }
}

/// What a handler sees while executing one action
pub struct ActionCall<'a> {
    action: &'a WorkflowAction,
    ctx: &'a mut ExecutionContext,
    depth: usize,
}

impl<'a> ActionCall<'a> {
    pub fn action(&self) -> &WorkflowAction {
        self.action
    }

    pub fn name(&self) -> &str {
        self.action.kind.name()
    }

    pub fn params(&self) -> &[Param] {
        &self.action.params
    }

    pub fn len(&self) -> usize {
        self.action.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.action.params.is_empty()
    }

    pub fn target(&self) -> &Value {
        self.ctx.target()
    }

    pub fn target_mut(&mut self) -> &mut Value {
        self.ctx.target_mut()
    }

    pub fn today(&self) -> NaiveDate {
        self.ctx.today()
    }

    pub fn config(&self) -> &EngineConfig {
        self.ctx.config()
    }

    pub fn halt(&mut self) {
        self.ctx.halt();
    }

    fn param(&self, index: usize) -> Result<&'a Param, WorkflowError> {
        self.action.params.get(index).ok_or_else(|| {
            WorkflowError::action(self.name(), format!("missing parameter {}", index))
        })
    }

    /// Resolve parameter `index` to a value
    ///
    /// Rules resolve to whether the target passes them; nested actions to the
    /// value they produced, or to whether they completed.
    pub fn value(&mut self, index: usize) -> Result<Value, WorkflowError> {
        match self.param(index)? {
            Param::Literal(value) => Ok(value.clone()),
            Param::Reference { object, property } => Ok(self.resolve_reference(object, property)),
            Param::Rule(expr) => {
                let evaluation = self.ctx.evaluator().evaluate(expr, self.ctx.target())?;
                Ok(Value::Bool(evaluation.passed))
            }
            Param::Action(nested) => {
                let depth = self.depth + 1;
                let result = self.ctx.run_action(nested, depth)?;
                Ok(match result.value {
                    Some(value) => value,
                    None => Value::Bool(result.is_complete()),
                })
            }
        }
    }

    pub fn values(&mut self) -> Result<Vec<Value>, WorkflowError> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }

    /// Run parameter `index` as a condition or branch against the target
    pub fn run(&mut self, index: usize) -> Result<WorkflowResult, WorkflowError> {
        let param = self.param(index)?;
        match param {
            Param::Action(nested) => {
                let depth = self.depth + 1;
                self.ctx.run_action(nested, depth)
            }
            Param::Rule(expr) => {
                let evaluation = self.ctx.evaluator().evaluate(expr, self.ctx.target())?;
                Ok(WorkflowResult::from_bool(evaluation.passed, || {
                    evaluation.validation_messages(false)
                }))
            }
            _ => {
                let value = self.value(index)?;
                Ok(WorkflowResult::from_bool(value.is_truthy(), || {
                    format!("{} is not true", param)
                }))
            }
        }
    }

    /// Run parameter `index` with `target` standing in for the current target
    ///
    /// Returns the result and the stand-in after the action ran.
    pub fn run_with_target(
        &mut self,
        index: usize,
        target: Value,
    ) -> Result<(WorkflowResult, Value), WorkflowError> {
        let saved = std::mem::replace(self.ctx.target_mut(), target);
        let result = self.run(index);
        let used = std::mem::replace(self.ctx.target_mut(), saved);
        result.map(|r| (r, used))
    }

    fn resolve_reference(&self, object: &str, property: &str) -> Value {
        let target = self.ctx.target();
        target
            .get_path(&format!("{}.{}", object, property))
            .or_else(|| target.get_path(property))
            .cloned()
            .unwrap_or_default()
    }
}
