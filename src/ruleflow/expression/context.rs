// SPDX-License-Identifier: MIT

//! Per-evaluation state: diagnostics and the value under test

use crate::rdk::value::Value;
use std::fmt;

/// Which check a value failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    OperandMismatch,
    NotUppercase,
    NotLowercase,
    ExceedsMax,
    BelowMin,
    InvalidEmail,
    NotInList,
    NotInLookup,
    Required,
    NotRoundedUp,
    NotRoundedDown,
    OutOfRange,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::OperandMismatch => "OperandMismatch",
            FailureKind::NotUppercase => "NotUppercase",
            FailureKind::NotLowercase => "NotLowercase",
            FailureKind::ExceedsMax => "ExceedsMax",
            FailureKind::BelowMin => "BelowMin",
            FailureKind::InvalidEmail => "InvalidEmail",
            FailureKind::NotInList => "NotInList",
            FailureKind::NotInLookup => "NotInLookup",
            FailureKind::Required => "Required",
            FailureKind::NotRoundedUp => "NotRoundedUp",
            FailureKind::NotRoundedDown => "NotRoundedDown",
            FailureKind::OutOfRange => "OutOfRange",
        };
        write!(f, "{}", name)
    }
}

/// Describes which rule failed and for what value
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub kind: FailureKind,
    /// Source text of the failing rule
    pub rule: String,
    /// The offending value, as text
    pub value: String,
}

/// One diagnostic entry recorded while testing a value
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub passed: bool,
    pub message: String,
    pub failure: Option<RuleFailure>,
}

impl ValidationResult {
    pub fn failed(kind: FailureKind, rule: &str, value: &Value, detail: &str) -> Self {
        let shown = value.to_text();
        Self {
            passed: false,
            message: format!("{}: {} - {} (value: '{}')", rule, kind, detail, shown),
            failure: Some(RuleFailure {
                kind,
                rule: rule.to_string(),
                value: shown,
            }),
        }
    }
}

/// Mutable state threaded through one evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    value: Value,
    diagnostics: Vec<ValidationResult>,
}

impl EvaluationContext {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            diagnostics: Vec::new(),
        }
    }

    /// The value under test, including any forced rewrites so far
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn record(&mut self, result: ValidationResult) {
        self.diagnostics.push(result);
    }

    pub fn diagnostics(&self) -> &[ValidationResult] {
        &self.diagnostics
    }

    /// Position to roll back to with [`truncate`](Self::truncate)
    pub fn mark(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.diagnostics.truncate(mark);
    }

    pub fn finish(self, passed: bool) -> Evaluation {
        Evaluation {
            passed,
            value: self.value,
            diagnostics: self.diagnostics,
        }
    }
}

/// Outcome of testing one value against a compiled expression
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub passed: bool,
    /// The value after forced modifiers were applied
    pub value: Value,
    pub diagnostics: Vec<ValidationResult>,
}

impl Evaluation {
    pub fn failures(&self) -> impl Iterator<Item = &RuleFailure> {
        self.diagnostics.iter().filter_map(|d| d.failure.as_ref())
    }

    pub fn has_failure(&self, kind: FailureKind) -> bool {
        self.failures().any(|f| f.kind == kind)
    }

    /// Render the failure messages for display
    pub fn validation_messages(&self, html: bool) -> String {
        format_messages(
            self.diagnostics
                .iter()
                .filter(|d| !d.passed)
                .map(|d| d.message.as_str()),
            html,
        )
    }
}

/// Join messages as plain lines or as an HTML list
pub fn format_messages<'a, I>(messages: I, html: bool) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let messages: Vec<&str> = messages.into_iter().collect();
    if !html {
        return messages.join("\n");
    }
    if messages.is_empty() {
        return String::new();
    }
    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape_html(m)))
        .collect();
    format!("<ul>{}</ul>", items)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_message() {
        let result = ValidationResult::failed(
            FailureKind::ExceedsMax,
            "[|mx(3)]",
            &Value::text("abcd"),
            "length 4 exceeds maximum 3",
        );
        assert!(!result.passed);
        assert_eq!(
            result.message,
            "[|mx(3)]: ExceedsMax - length 4 exceeds maximum 3 (value: 'abcd')"
        );
        assert_eq!(result.failure.unwrap().value, "abcd");
    }

    #[test]
    fn test_mark_and_truncate() {
        let mut ctx = EvaluationContext::new(Value::Null);
        ctx.record(ValidationResult::failed(
            FailureKind::Required,
            "[|r]",
            &Value::Null,
            "a value is required",
        ));
        let mark = ctx.mark();
        ctx.record(ValidationResult::failed(
            FailureKind::Required,
            "[|r]",
            &Value::Null,
            "a value is required",
        ));
        ctx.truncate(mark);
        assert_eq!(ctx.diagnostics().len(), 1);
    }

    #[test]
    fn test_plain_and_html_messages() {
        let evaluation = Evaluation {
            passed: false,
            value: Value::Null,
            diagnostics: vec![
                ValidationResult::failed(FailureKind::Required, "[|r]", &Value::Null, "required"),
                ValidationResult::failed(
                    FailureKind::OperandMismatch,
                    r#"[<"5"]"#,
                    &Value::Integer(7),
                    "7 < 5 does not hold",
                ),
            ],
        };

        let plain = evaluation.validation_messages(false);
        assert_eq!(plain.lines().count(), 2);

        let html = evaluation.validation_messages(true);
        assert!(html.starts_with("<ul><li>"));
        assert!(html.contains("&lt;&quot;5&quot;"));
        assert_eq!(html.matches("<li>").count(), 2);
    }

    #[test]
    fn test_empty_messages() {
        let evaluation = EvaluationContext::new(Value::Null).finish(true);
        assert_eq!(evaluation.validation_messages(true), "");
        assert_eq!(evaluation.validation_messages(false), "");
    }
}
