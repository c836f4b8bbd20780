// SPDX-License-Identifier: MIT

//! Built-in action handlers
//!
//! Comparisons with one parameter test the target; with two they test the
//! first parameter against the second. External actions (`ATTACH`, `EMAIL`,
//! `WAIT`, `WF`, `ZIP`, `GOTO`) have no built-in handler.

use super::ast::ActionKind;
use super::calendar;
use super::context::ActionCall;
use super::registry::{ActionHandler, ActionRegistry};
use super::result::WorkflowResult;
use crate::rdk::error::WorkflowError;
use crate::rdk::value::{compare_loose, equals_loose, Value};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

type BuiltinFn = fn(&mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError>;

struct Builtin(BuiltinFn);

impl ActionHandler for Builtin {
    fn execute(&self, call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
        (self.0)(call)
    }
}

pub(super) fn register_all(registry: &ActionRegistry) {
    let table: &[(ActionKind, BuiltinFn)] = &[
        (ActionKind::Gt, gt),
        (ActionKind::Lt, lt),
        (ActionKind::Eq, eq),
        (ActionKind::Gte, gte),
        (ActionKind::Lte, lte),
        (ActionKind::Bw, between),
        (ActionKind::Len, length),
        (ActionKind::In, one_of),
        (ActionKind::Check, check),
        (ActionKind::Set, set),
        (ActionKind::Get, get),
        (ActionKind::List, list),
        (ActionKind::Each, each),
        (ActionKind::ConvertTo, convert_to),
        (ActionKind::Ifttt, ifttt),
        (ActionKind::Switch, switch),
        (ActionKind::End, end),
        (ActionKind::Today, today),
        (ActionKind::Eom, calendar_date),
        (ActionKind::Eoq, calendar_date),
        (ActionKind::Eofy, calendar_date),
        (ActionKind::Fwdom, calendar_date),
        (ActionKind::Fwdoq, calendar_date),
        (ActionKind::Fwdofy, calendar_date),
        (ActionKind::Lwdom, calendar_date),
        (ActionKind::Lwdoq, calendar_date),
        (ActionKind::Lwdofy, calendar_date),
    ];
    for (kind, func) in table {
        registry.register(*kind, Arc::new(Builtin(*func)));
    }
}

/// Left and right side of a comparison
fn operands(call: &mut ActionCall<'_>) -> Result<(Value, Value), WorkflowError> {
    if call.len() == 2 {
        Ok((call.value(0)?, call.value(1)?))
    } else {
        Ok((call.target().clone(), call.value(0)?))
    }
}

fn compare(
    call: &mut ActionCall<'_>,
    holds: fn(Ordering) -> bool,
    verb: &str,
) -> Result<WorkflowResult, WorkflowError> {
    let (left, right) = operands(call)?;
    let ordering = compare_loose(&left, &right, false);
    Ok(WorkflowResult::from_bool(holds(ordering), || {
        format!("'{}' {} '{}' does not hold", left, verb, right)
    }))
}

fn gt(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    compare(call, Ordering::is_gt, ">")
}

fn lt(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    compare(call, Ordering::is_lt, "<")
}

fn eq(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    compare(call, Ordering::is_eq, "=")
}

fn gte(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    compare(call, Ordering::is_ge, ">=")
}

fn lte(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    compare(call, Ordering::is_le, "<=")
}

fn between(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let (subject, first) = if call.len() == 3 {
        (call.value(0)?, 1)
    } else {
        (call.target().clone(), 0)
    };
    let low = call.value(first)?;
    let high = call.value(first + 1)?;
    let inside = compare_loose(&subject, &low, false).is_ge()
        && compare_loose(&subject, &high, false).is_le();
    Ok(WorkflowResult::from_bool(inside, || {
        format!("'{}' is not between '{}' and '{}'", subject, low, high)
    }))
}

fn length_of(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Text(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Object(map) => map.len(),
        other => other.to_text().chars().count(),
    }
}

fn number_param(call: &mut ActionCall<'_>, index: usize) -> Result<f64, WorkflowError> {
    let value = call.value(index)?;
    value
        .as_f64()
        .ok_or_else(|| WorkflowError::action(call.name(), format!("'{}' is not a number", value)))
}

fn length(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let len = length_of(call.target());
    let min = number_param(call, 0)?;
    let max = if call.len() == 2 {
        number_param(call, 1)?
    } else {
        min
    };

    let ok = (len as f64) >= min && (len as f64) <= max;
    let result = if ok {
        WorkflowResult::complete_with(Value::Integer(len as i64))
    } else {
        WorkflowResult::fail(format!("length {} outside {}..={}", len, min, max))
    };
    Ok(result)
}

fn one_of(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let mut candidates = Vec::new();
    for value in call.values()? {
        match value {
            Value::List(items) => candidates.extend(items),
            other => candidates.push(other),
        }
    }
    let target = call.target();
    let found = candidates.iter().any(|c| equals_loose(target, c, false));
    Ok(WorkflowResult::from_bool(found, || {
        format!("'{}' is not in the list", target)
    }))
}

fn check(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let result = call.run(0)?;
    Ok(WorkflowResult {
        value: None,
        ..result
    })
}

/// Write `value` at a dotted path, creating objects over nulls on the way
fn set_path(target: &mut Value, parts: &[&str], value: Value) -> Result<(), String> {
    if target.is_null() {
        *target = Value::Object(BTreeMap::new());
    }
    let kind = target.kind();
    let Value::Object(map) = target else {
        return Err(format!("cannot set '{}' on a {}", parts.join("."), kind));
    };
    match parts {
        [] => Err("empty property name".to_string()),
        [last] => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        [first, rest @ ..] => set_path(map.entry(first.to_string()).or_default(), rest, value),
    }
}

fn set(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    if call.len() == 2 {
        let property = call.value(0)?.to_text();
        let parts: Vec<&str> = property.split('.').filter(|p| !p.is_empty()).collect();
        let value = call.value(1)?;
        set_path(call.target_mut(), &parts, value.clone())
            .map_err(|reason| WorkflowError::invalid_target("SET", reason))?;
        Ok(WorkflowResult::complete_with(value))
    } else {
        let value = call.value(0)?;
        *call.target_mut() = value.clone();
        Ok(WorkflowResult::complete_with(value))
    }
}

fn get(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let property = call.value(0)?.to_text();
    Ok(match call.target().get_path(&property) {
        Some(value) => WorkflowResult::complete_with(value.clone()),
        None => WorkflowResult::fail(format!("no property '{}'", property)),
    })
}

fn list(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    Ok(WorkflowResult::complete_with(Value::List(call.values()?)))
}

fn each(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let items = match call.target().clone() {
        Value::List(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(WorkflowError::invalid_target(
                "EACH",
                format!("expected a list, found {}", other.kind()),
            ))
        }
    };

    let mut updated = Vec::with_capacity(items.len());
    let mut failures = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let (result, item) = call.run_with_target(0, item)?;
        if result.is_fail() {
            failures.push(format!(
                "item {}: {}",
                index,
                result.failure.unwrap_or_default()
            ));
        }
        updated.push(item);
    }
    *call.target_mut() = Value::List(updated);

    Ok(if failures.is_empty() {
        WorkflowResult::complete()
    } else {
        WorkflowResult::fail(failures.join("; "))
    })
}

fn convert(value: &Value, kind: &str) -> Option<Value> {
    match kind {
        "text" | "string" => Some(Value::Text(value.to_text())),
        "integer" | "int" => match value {
            Value::Integer(i) => Some(Value::Integer(*i)),
            Value::Bool(b) => Some(Value::Integer(i64::from(*b))),
            other => other
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Value::Integer(f as i64)),
        },
        "decimal" | "number" => value.as_f64().map(Value::Decimal),
        "bool" | "boolean" => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Text(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
            Value::Text(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
            Value::Integer(i) => Some(Value::Bool(*i != 0)),
            _ => None,
        },
        "date" => value.as_date().map(Value::Date),
        _ => None,
    }
}

fn convert_to(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let kind = call.value(0)?.to_text().to_ascii_lowercase();
    if !matches!(
        kind.as_str(),
        "text" | "string" | "integer" | "int" | "decimal" | "number" | "bool" | "boolean" | "date"
    ) {
        return Err(WorkflowError::action(
            "CONVERTTO",
            format!("unknown conversion '{}'", kind),
        ));
    }

    let converted = if call.target().is_null() {
        Some(Value::Null)
    } else {
        convert(call.target(), &kind)
    };
    Ok(match converted {
        Some(value) => {
            *call.target_mut() = value.clone();
            WorkflowResult::complete_with(value)
        }
        None => WorkflowResult::fail(format!("cannot convert '{}' to {}", call.target(), kind)),
    })
}

fn ifttt(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let condition = call.run(0)?;
    if condition.is_complete() {
        call.run(1)
    } else if call.len() == 3 {
        call.run(2)
    } else {
        Ok(condition)
    }
}

fn switch(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let count = call.len();
    for case in (0..count.saturating_sub(1)).step_by(2) {
        let expected = call.value(case)?;
        if equals_loose(call.target(), &expected, false) {
            return call.run(case + 1);
        }
    }
    if count % 2 == 1 {
        return call.run(count - 1);
    }
    Ok(WorkflowResult::no_action())
}

fn end(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    call.halt();
    Ok(WorkflowResult::complete())
}

fn today(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    Ok(WorkflowResult::complete_with(Value::Date(call.today())))
}

fn calendar_date(call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
    let base: NaiveDate = if call.is_empty() {
        call.today()
    } else {
        let value = call.value(0)?;
        value.as_date().ok_or_else(|| {
            WorkflowError::action(call.name(), format!("'{}' is not a date", value))
        })?
    };
    let fy_end = call.config().fiscal_year_end_month;

    let date = match call.action().kind {
        ActionKind::Eom => calendar::end_of_month(base),
        ActionKind::Eoq => calendar::end_of_quarter(base),
        ActionKind::Eofy => calendar::end_of_fiscal_year(base, fy_end),
        ActionKind::Fwdom => calendar::first_working_day_of_month(base),
        ActionKind::Fwdoq => calendar::first_working_day_of_quarter(base),
        ActionKind::Fwdofy => calendar::first_working_day_of_fiscal_year(base, fy_end),
        ActionKind::Lwdom => calendar::last_working_day_of_month(base),
        ActionKind::Lwdoq => calendar::last_working_day_of_quarter(base),
        ActionKind::Lwdofy => calendar::last_working_day_of_fiscal_year(base, fy_end),
        other => {
            return Err(WorkflowError::action(
                other.name(),
                "not a calendar action",
            ))
        }
    };
    Ok(WorkflowResult::complete_with(Value::Date(date)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdk::config::EngineConfig;
    use crate::ruleflow::expression::Evaluator;
    use crate::ruleflow::workflow::ast::{Instruction, WorkflowAction};
    use crate::ruleflow::workflow::context::ExecutionContext;
    use crate::ruleflow::workflow::parser::WorkflowParser;
    use serde_json::json;

    fn action(source: &str) -> WorkflowAction {
        match WorkflowParser::default().parse(source).unwrap() {
            Instruction::Action(action) => action,
            other => panic!("expected action, got {:?}", other),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context(target: Value) -> ExecutionContext {
        ExecutionContext::new(target, ActionRegistry::with_builtins()).with_today(date(2024, 5, 15))
    }

    fn run(target: Value, source: &str) -> (WorkflowResult, Value) {
        let mut ctx = context(target);
        let result = ctx.run_action(&action(source), 0).unwrap();
        (result, ctx.into_target())
    }

    #[test]
    fn test_comparisons_against_target() {
        assert!(run(Value::Integer(10), "gt(5)").0.is_complete());
        assert!(run(Value::Integer(3), "gt(5)").0.is_fail());
        assert!(run(Value::text("5"), "eq(5)").0.is_complete());
        assert!(run(Value::Integer(5), "gte(5)").0.is_complete());
        assert!(run(Value::Integer(5), "lt(5)").0.is_fail());
        assert!(run(Value::Null, "lte(2, 3)").0.is_complete());
    }

    #[test]
    fn test_between() {
        assert!(run(Value::Integer(5), "bw(1, 10)").0.is_complete());
        assert!(run(Value::Integer(11), "bw(1, 10)").0.is_fail());
        assert!(run(Value::Null, "bw(2024-03-01, 2024-01-01, 2024-12-31)")
            .0
            .is_complete());
    }

    #[test]
    fn test_length() {
        let (result, _) = run(Value::text("hello"), "len(5)");
        assert_eq!(result.value, Some(Value::Integer(5)));
        assert!(run(Value::text("hello"), "len(1, 4)").0.is_fail());
    }

    #[test]
    fn test_in_flattens_lists() {
        assert!(run(Value::text("b"), "in(a, b, c)").0.is_complete());
        assert!(run(Value::text("b"), "in(LIST(a, b))").0.is_complete());
        assert!(run(Value::text("z"), "in(a, b)").0.is_fail());
    }

    #[test]
    fn test_check_with_rule_and_literal() {
        assert!(run(Value::Integer(7), r#"CHECK([>"5"])"#).0.is_complete());
        assert!(run(Value::Integer(3), r#"CHECK([>"5"])"#).0.is_fail());
        assert!(run(Value::Null, "CHECK(false)").0.is_fail());
        assert!(run(Value::Null, "!CHECK(false)").0.is_complete());
    }

    #[test]
    fn test_set_and_get() {
        let (result, target) = run(Value::Integer(10), "SET(1)");
        assert!(result.is_complete());
        assert_eq!(target, Value::Integer(1));

        let (_, target) = run(Value::Null, "SET(order.total, 12.5)");
        assert_eq!(target, Value::from_json(&json!({"order": {"total": 12.5}})));

        let (result, _) = run(Value::from_json(&json!({"name": "Ada"})), "GET(name)");
        assert_eq!(result.value, Some(Value::text("Ada")));
        assert!(run(Value::Null, "GET(name)").0.is_fail());
    }

    #[test]
    fn test_set_on_scalar_is_invalid_target() {
        let mut ctx = context(Value::Integer(3));
        let err = ctx.run_action(&action("SET(a, 1)"), 0).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTarget { .. }));
    }

    #[test]
    fn test_each_updates_every_item() {
        let target = Value::from_json(&json!([1, 20, 3]));
        let (result, target) = run(target, "EACH(IFTTT(gt(10), SET(10)))");
        assert!(result.is_fail());
        assert_eq!(target, Value::from_json(&json!([1, 10, 3])));

        let (result, target) = run(Value::from_json(&json!([1, 2])), "EACH(SET(0))");
        assert!(result.is_complete());
        assert_eq!(target, Value::from_json(&json!([0, 0])));
    }

    #[test]
    fn test_convert_to() {
        let (result, target) = run(Value::text("42"), "CONVERTTO(integer)");
        assert!(result.is_complete());
        assert_eq!(target, Value::Integer(42));

        assert!(run(Value::text("abc"), "CONVERTTO(date)").0.is_fail());

        let mut ctx = context(Value::Null);
        assert!(ctx.run_action(&action("CONVERTTO(blob)"), 0).is_err());
    }

    #[test]
    fn test_ifttt() {
        let (_, target) = run(Value::Integer(10), r#"IFTTT(gt(5), SET("big"), SET("small"))"#);
        assert_eq!(target, Value::text("big"));
        let (_, target) = run(Value::Integer(1), r#"IFTTT(gt(5), SET("big"), SET("small"))"#);
        assert_eq!(target, Value::text("small"));
        let (result, target) = run(Value::Integer(1), r#"IFTTT(gt(5), SET("big"))"#);
        assert!(result.is_fail());
        assert_eq!(target, Value::Integer(1));
    }

    #[test]
    fn test_switch() {
        let source = r#"SWITCH("a", SET(1), "b", SET(2), SET(3))"#;
        assert_eq!(run(Value::text("b"), source).1, Value::Integer(2));
        assert_eq!(run(Value::text("q"), source).1, Value::Integer(3));
        let (result, _) = run(Value::text("q"), r#"SWITCH("a", SET(1))"#);
        assert_eq!(result, WorkflowResult::no_action());
    }

    #[test]
    fn test_end_halts() {
        let mut ctx = context(Value::Null);
        assert!(ctx.run_action(&action("END"), 0).unwrap().is_complete());
        assert!(ctx.is_halted());
    }

    #[test]
    fn test_calendar_actions() {
        let (result, _) = run(Value::Null, "Today()");
        assert_eq!(result.value, Some(Value::Date(date(2024, 5, 15))));
        let (result, _) = run(Value::Null, "EOM");
        assert_eq!(result.value, Some(Value::Date(date(2024, 5, 31))));
        let (result, _) = run(Value::Null, "EOQ(2024-08-02)");
        assert_eq!(result.value, Some(Value::Date(date(2024, 9, 30))));
        let (result, _) = run(Value::Null, "LWDOM(2024-06-01)");
        assert_eq!(result.value, Some(Value::Date(date(2024, 6, 28))));
        let (_, target) = run(Value::Null, "SET(EOFY())");
        assert_eq!(target, Value::Date(date(2024, 6, 30)));
    }

    #[test]
    fn test_fiscal_year_end_comes_from_config() {
        let evaluator = Evaluator::new(EngineConfig {
            fiscal_year_end_month: 3,
            ..Default::default()
        });
        let mut ctx = context(Value::Null).with_evaluator(evaluator);
        let result = ctx.run_action(&action("EOFY"), 0).unwrap();
        assert_eq!(result.value, Some(Value::Date(date(2025, 3, 31))));
    }

    #[test]
    fn test_calendar_rejects_non_dates() {
        let mut ctx = context(Value::Null);
        assert!(ctx.run_action(&action("EOM(soon)"), 0).is_err());
    }
}
