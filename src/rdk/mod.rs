// SPDX-License-Identifier: MIT

//! Rule development kit: errors, runtime values and configuration shared by
//! the expression and workflow engines.

pub mod config;
pub mod error;
pub mod value;

pub use config::{EngineConfig, OrSemantics};
pub use error::{EvalError, ParseError, ParseErrorKind, RuleflowError, WorkflowError};
pub use value::{compare_loose, equals_loose, Value, ValueKind};
