// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Loaded from the `config:` block of a workflow file or from environment
//! variables (`.env` is honoured by the binary):
//! - `RULEFLOW_MAX_DEPTH` - maximum nesting depth for groups, nested actions and steps
//! - `RULEFLOW_OR_SEMANTICS` - `legacy` or `conventional`
//! - `RULEFLOW_FISCAL_YEAR_END` - month (1-12) the fiscal year ends in

use super::error::RuleflowError;
use serde::{Deserialize, Serialize};

pub const ENV_MAX_DEPTH: &str = "RULEFLOW_MAX_DEPTH";
pub const ENV_OR_SEMANTICS: &str = "RULEFLOW_OR_SEMANTICS";
pub const ENV_FISCAL_YEAR_END: &str = "RULEFLOW_FISCAL_YEAR_END";

/// How an OR-joined expression group resolves
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrSemantics {
    /// The group passes when at least one member is false
    #[default]
    #[serde(alias = "legacy")]
    LegacyAnyFalse,
    /// The group passes when at least one member is true
    Conventional,
}

impl std::str::FromStr for OrSemantics {
    type Err = RuleflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "legacy_any_false" => Ok(OrSemantics::LegacyAnyFalse),
            "conventional" => Ok(OrSemantics::Conventional),
            other => Err(RuleflowError::config(format!(
                "unknown OR semantics '{}', expected 'legacy' or 'conventional'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub max_depth: usize,
    pub or_semantics: OrSemantics,
    pub fiscal_year_end_month: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            or_semantics: OrSemantics::default(),
            fiscal_year_end_month: 6,
        }
    }
}

impl EngineConfig {
    /// Build a config from defaults overridden by environment variables
    pub fn from_env() -> Result<Self, RuleflowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, RuleflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            config.max_depth = raw.trim().parse().map_err(|_| {
                RuleflowError::config(format!("{} must be a number, got '{}'", ENV_MAX_DEPTH, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_OR_SEMANTICS) {
            config.or_semantics = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_FISCAL_YEAR_END) {
            config.fiscal_year_end_month = raw.trim().parse().map_err(|_| {
                RuleflowError::config(format!(
                    "{} must be a month number, got '{}'",
                    ENV_FISCAL_YEAR_END, raw
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RuleflowError> {
        if self.max_depth == 0 {
            return Err(RuleflowError::config("max_depth must be at least 1"));
        }
        if !(1..=12).contains(&self.fiscal_year_end_month) {
            return Err(RuleflowError::config(format!(
                "fiscal_year_end_month must be between 1 and 12, got {}",
                self.fiscal_year_end_month
            )));
        }
        Ok(())
    }
}
