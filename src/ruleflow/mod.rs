// SPDX-License-Identifier: MIT

pub mod expression;
pub mod ruleset;
pub mod step;
pub mod workflow;
