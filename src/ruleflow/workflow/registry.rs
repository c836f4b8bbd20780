// SPDX-License-Identifier: MIT

use super::ast::{ActionKind, WorkflowAction};
use super::builtins;
use super::context::ActionCall;
use super::result::WorkflowResult;
use super::translate;
use crate::rdk::error::WorkflowError;
use crate::rdk::value::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Executes one kind of action
pub trait ActionHandler: Send + Sync {
    fn execute(&self, call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError>;

    /// Human-readable phrase for the action, without negation
    fn translate(&self, action: &WorkflowAction) -> String {
        translate::describe(action)
    }
}

/// Handler over a plain `(target, params) -> result` function
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut Value, &[Value]) -> WorkflowResult + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&mut Value, &[Value]) -> WorkflowResult + Send + Sync,
{
    fn execute(&self, call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
        let params = call.values()?;
        Ok((self.func)(call.target_mut(), &params))
    }
}

/// Handlers by action kind; clones share registrations
#[derive(Clone)]
pub struct ActionRegistry {
    handlers: Arc<RwLock<HashMap<ActionKind, Arc<dyn ActionHandler>>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry with every built-in action; external actions stay unbound
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtins::register_all(&registry);
        registry
    }

    pub fn register(&self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(kind, handler).is_some() {
            log::debug!("Replaced handler for action '{}'", kind);
        }
    }

    pub fn register_fn<F>(&self, kind: ActionKind, func: F)
    where
        F: Fn(&mut Value, &[Value]) -> WorkflowResult + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(FnHandler::new(func)));
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        handlers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.get(kind).is_some()
    }

    /// Translate an action through its handler, prefixing `NOT ` when negative
    pub fn translate(&self, action: &WorkflowAction) -> String {
        let phrase = match self.get(action.kind) {
            Some(handler) => handler.translate(action),
            None => translate::describe(action),
        };
        if action.negative {
            format!("NOT {}", phrase)
        } else {
            phrase
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
