// SPDX-License-Identifier: MIT

//! Field rule sets
//!
//! A rule set attaches one expression to each field of an object value:
//!
//! ```yaml
//! name: customer
//! rules:
//!   - field: email
//!     rule: "[|r|e]"
//!   - field: address.postcode
//!     rule: "[|mx(8)]"
//! ```

use super::expression::{format_messages, Evaluation, Evaluator, Expression, ExpressionParser};
use crate::rdk::config::EngineConfig;
use crate::rdk::error::{EvalError, RuleflowError};
use crate::rdk::value::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RuleSetDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<FieldRuleDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldRuleDef {
    /// Dotted path into the validated object
    pub field: String,
    pub rule: String,
}

#[derive(Debug, Clone)]
struct FieldRule {
    field: String,
    expression: Expression,
}

/// Compiled rule set
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn compile(def: &RuleSetDefinition, config: &EngineConfig) -> Result<Self, RuleflowError> {
        let parser = ExpressionParser::new(config);
        let rules = def
            .rules
            .iter()
            .map(|r| {
                parser
                    .compile(&r.rule)
                    .map(|expression| FieldRule {
                        field: r.field.clone(),
                        expression,
                    })
                    .map_err(|source| RuleflowError::Rule {
                        field: r.field.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Compiled rule set '{}' with {} rules", def.name, rules.len());
        Ok(Self {
            name: def.name.clone(),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Test every field rule; missing fields are tested as null
    pub fn validate(&self, evaluator: &Evaluator, value: &Value) -> Result<RuleSetReport, EvalError> {
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let field_value = value.get_path(&rule.field).cloned().unwrap_or_default();
            let evaluation = evaluator.evaluate(&rule.expression, &field_value)?;
            outcomes.push(FieldOutcome {
                field: rule.field.clone(),
                evaluation,
            });
        }

        let report = RuleSetReport {
            name: self.name.clone(),
            outcomes,
        };
        if !report.is_valid() {
            log::info!(
                "Rule set '{}' rejected fields: {}",
                self.name,
                report.failed_fields().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(report)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldOutcome {
    pub field: String,
    pub evaluation: Evaluation,
}

/// Per-field results of validating one value
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSetReport {
    pub name: String,
    pub outcomes: Vec<FieldOutcome>,
}

impl RuleSetReport {
    pub fn is_valid(&self) -> bool {
        self.outcomes.iter().all(|o| o.evaluation.passed)
    }

    pub fn failed_fields(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.evaluation.passed)
            .map(|o| o.field.as_str())
    }

    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.outcomes.iter().find(|o| o.field == field)
    }

    pub fn validation_messages(&self, html: bool) -> String {
        let messages: Vec<String> = self
            .outcomes
            .iter()
            .flat_map(|o| {
                o.evaluation
                    .diagnostics
                    .iter()
                    .filter(|d| !d.passed)
                    .map(move |d| format!("{}: {}", o.field, d.message))
            })
            .collect();
        format_messages(messages.iter().map(String::as_str), html)
    }
}
