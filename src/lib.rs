// SPDX-License-Identifier: MIT

//! Rule and workflow engine
//!
//! - [`rdk`] holds the shared values, errors and configuration.
//! - [`ruleflow`] compiles and runs bracket rules, workflow instructions and step trees.

pub mod rdk;
pub mod ruleflow;
