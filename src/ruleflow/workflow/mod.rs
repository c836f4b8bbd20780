// SPDX-License-Identifier: MIT

//! Workflow instructions: `test=>then=>else` chains of named actions

pub mod ast;
mod builtins;
pub mod calendar;
pub mod context;
pub mod parser;
pub mod registry;
pub mod result;
pub mod translate;

pub use ast::{ActionKind, Instruction, Param, WorkflowAction};
pub use context::{ActionCall, ExecutionContext, TraceEntry};
pub use parser::WorkflowParser;
pub use registry::{ActionHandler, ActionRegistry, FnHandler};
pub use result::{ResultKind, WorkflowResult};
