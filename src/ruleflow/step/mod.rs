// SPDX-License-Identifier: MIT

//! Step trees: named groups of workflow instructions with ordered children

pub mod builder;
pub mod executor;
pub mod loader;
pub mod types;

pub use builder::{CompiledWorkflow, StepBuilder};
pub use executor::{determine_overall_result, Step, StepTranslation};
pub use loader::DefinitionLoader;
pub use types::{CascadePolicy, StepDefinition, WorkflowDefinition};
