//! Integration tests for rule evaluation and workflow execution
//!
//! These tests drive the public API end to end with mock handlers and lookups.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use ruleflow_rs::rdk::{EngineConfig, EvalError, OrSemantics, ParseErrorKind, Value, WorkflowError};
use ruleflow_rs::ruleflow::expression::{
    compile, ColumnRef, Evaluator, Expression, ExpressionParser, FailureKind, Lookup,
};
use ruleflow_rs::ruleflow::ruleset::RuleSet;
use ruleflow_rs::ruleflow::step::{
    determine_overall_result, CascadePolicy, CompiledWorkflow, DefinitionLoader, Step,
};
use ruleflow_rs::ruleflow::workflow::{
    ActionCall, ActionHandler, ActionKind, ActionRegistry, ExecutionContext, Instruction,
    ResultKind, WorkflowAction, WorkflowParser, WorkflowResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Components
// ============================================================================

/// Mock mail handler that records recipients instead of sending
#[derive(Default)]
struct MockMailer {
    sent: Mutex<Vec<String>>,
}

impl ActionHandler for MockMailer {
    fn execute(&self, call: &mut ActionCall<'_>) -> Result<WorkflowResult, WorkflowError> {
        let params = call.values()?;
        let recipient = params
            .first()
            .map(Value::to_text)
            .ok_or_else(|| WorkflowError::action("EMAIL", "missing recipient"))?;
        let subject = params.get(1).map(Value::to_text).unwrap_or_default();
        self.sent
            .lock()
            .unwrap()
            .push(format!("{} <{}>", recipient, subject));
        Ok(WorkflowResult::complete())
    }

    fn translate(&self, action: &WorkflowAction) -> String {
        format!("send mail ({} parameters)", action.params.len())
    }
}

/// Mock lookup that counts how often it is consulted
struct CountingLookup {
    known: Vec<&'static str>,
    calls: AtomicUsize,
}

impl Lookup for CountingLookup {
    fn contains(&self, column: &ColumnRef, value: &Value) -> Result<bool, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if column.table != "Users" {
            return Err(format!("no table {}", column.table));
        }
        Ok(self.known.iter().any(|k| *k == value.to_text()))
    }
}

static SHARED_RULE: Lazy<Expression> = Lazy::new(|| compile(r#"[>="18"|r]"#).unwrap());

fn context(target: Value) -> ExecutionContext {
    ExecutionContext::new(target, ActionRegistry::with_builtins())
        .with_today(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap())
}

fn single_action(source: &str) -> WorkflowAction {
    match WorkflowParser::default().parse(source).unwrap() {
        Instruction::Action(action) => action,
        other => panic!("expected a single action, got {:?}", other),
    }
}

// ============================================================================
// Expression Tests
// ============================================================================

#[test]
fn test_equals_scenario() {
    let expr = compile(r#"[="5"]"#).unwrap();
    let evaluator = Evaluator::shared();

    assert!(evaluator.evaluate(&expr, &Value::text("5")).unwrap().passed);

    let evaluation = evaluator.evaluate(&expr, &Value::text("6")).unwrap();
    assert!(!evaluation.passed);
    assert!(evaluation.has_failure(FailureKind::OperandMismatch));
}

#[test]
fn test_max_length_scenario() {
    let expr = compile("[|mx(10)]").unwrap();
    let evaluator = Evaluator::shared();

    let evaluation = evaluator
        .evaluate(&expr, &Value::text("abcdefghijk"))
        .unwrap();
    assert!(!evaluation.passed);
    assert!(evaluation.has_failure(FailureKind::ExceedsMax));
    assert!(evaluation.validation_messages(false).contains("ExceedsMax"));

    let evaluation = evaluator.evaluate(&expr, &Value::text("abcde")).unwrap();
    assert!(evaluation.passed);
    assert!(evaluation.diagnostics.is_empty());
}

#[test]
fn test_leaf_requires_operand_and_every_modifier() {
    let expr = compile(r#"[>"3"|mx(10)|r]"#).unwrap();
    let evaluator = Evaluator::shared();

    assert!(evaluator.evaluate(&expr, &Value::Integer(7)).unwrap().passed);
    // operand fails, modifiers hold
    assert!(!evaluator.evaluate(&expr, &Value::Integer(2)).unwrap().passed);
    // operand holds, max fails
    let evaluation = evaluator.evaluate(&expr, &Value::Integer(12)).unwrap();
    assert!(!evaluation.passed);
    assert!(evaluation.has_failure(FailureKind::ExceedsMax));
    assert!(!evaluation.has_failure(FailureKind::OperandMismatch));
}

#[test]
fn test_or_group_polarity() {
    let source = r#"[>"1"]||[<"10"]"#;
    let value = Value::Integer(5);

    // both members hold: the compatible reading fails the group
    let legacy = Evaluator::shared();
    let expr = compile(source).unwrap();
    assert!(!legacy.evaluate(&expr, &value).unwrap().passed);
    assert!(legacy.evaluate(&expr, &Value::Integer(20)).unwrap().passed);

    let config = EngineConfig {
        or_semantics: OrSemantics::Conventional,
        ..Default::default()
    };
    let conventional = Evaluator::new(config.clone());
    let expr = ExpressionParser::new(&config).compile(source).unwrap();
    assert!(conventional.evaluate(&expr, &value).unwrap().passed);
}

#[test]
fn test_and_group_needs_all_members() {
    let expr = compile(r#"[>"1"]&&[<"10"]"#).unwrap();
    let evaluator = Evaluator::shared();
    assert!(evaluator.evaluate(&expr, &Value::Integer(5)).unwrap().passed);
    assert!(!evaluator.evaluate(&expr, &Value::Integer(50)).unwrap().passed);
}

#[test]
fn test_compile_is_deterministic() {
    let source = r#"[>="5"|mx(10)|in(a, b)]&&[!="x"-f]"#;
    assert_eq!(compile(source).unwrap(), compile(source).unwrap());

    let instruction = r#"gt(5)=>SET(total, GET(order.total))=>!END()"#;
    let parser = WorkflowParser::default();
    assert_eq!(parser.parse(instruction).unwrap(), parser.parse(instruction).unwrap());
}

#[test]
fn test_parse_error_reports_position() {
    let err = compile(r#"[="5"|zz]"#).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnknownModifier("zz".to_string()));
    assert!(err.position > 0);

    let err = compile("[|mx]").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::MissingArgument("mx".to_string()));
}

#[test]
fn test_wrong_value_kind_is_an_error() {
    let expr = compile("[|u]").unwrap();
    let err = Evaluator::shared()
        .evaluate(&expr, &Value::Integer(3))
        .unwrap_err();
    assert!(matches!(err, EvalError::WrongValueKind { .. }));
}

#[test]
fn test_shared_tree_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let age = 10 + i * 2;
                let evaluation = Evaluator::shared()
                    .evaluate(&SHARED_RULE, &Value::Integer(age))
                    .unwrap();
                (age, evaluation.passed, evaluation.diagnostics.len())
            })
        })
        .collect();

    for handle in handles {
        let (age, passed, diagnostics) = handle.join().unwrap();
        assert_eq!(passed, age >= 18, "age {}", age);
        assert_eq!(diagnostics, usize::from(!passed));
    }
}

#[test]
fn test_indb_uses_lookup() {
    let lookup = Arc::new(CountingLookup {
        known: vec!["ann@example.com"],
        calls: AtomicUsize::new(0),
    });
    let evaluator = Evaluator::new(EngineConfig::default()).with_lookup(lookup.clone());
    let expr = compile("[|indb(Users.Email)]").unwrap();

    assert!(evaluator.evaluate(&expr, &Value::text("ann@example.com")).unwrap().passed);
    let evaluation = evaluator.evaluate(&expr, &Value::text("bob@example.com")).unwrap();
    assert!(evaluation.has_failure(FailureKind::NotInLookup));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

    let err = Evaluator::shared()
        .evaluate(&expr, &Value::text("ann@example.com"))
        .unwrap_err();
    assert_eq!(err, EvalError::LookupUnavailable("indb".to_string()));
}

// ============================================================================
// Workflow Tests
// ============================================================================

#[test]
fn test_test_then_scenario() {
    let step = Step::compile("root", "gt(5)=>SET(1)").unwrap();
    let mut ctx = context(Value::Integer(10));

    let result = step.execute(&mut ctx).unwrap();
    assert_eq!(result.kind, ResultKind::Complete);
    assert_eq!(result.value, Some(Value::Integer(1)));
    assert_eq!(ctx.into_target(), Value::Integer(1));
}

#[test]
fn test_negation_law() {
    let registry = ActionRegistry::with_builtins();
    registry.register_fn(ActionKind::Wait, |_, _| WorkflowResult::complete());
    let mut ctx = ExecutionContext::new(Value::Null, registry.clone());

    assert!(ctx.run_action(&single_action("WAIT(1)"), 0).unwrap().is_complete());
    assert!(ctx.run_action(&single_action("!WAIT(1)"), 0).unwrap().is_fail());
    // one stored flag: the second marker toggles it back
    assert!(ctx.run_action(&single_action("!!WAIT(1)"), 0).unwrap().is_complete());

    registry.register_fn(ActionKind::Wait, |_, _| WorkflowResult::fail("timed out"));
    let result = ctx.run_action(&single_action("!WAIT(1)"), 0).unwrap();
    assert!(result.is_complete());
    assert!(result.failure.is_none());

    assert_eq!(registry.translate(&single_action("!gt(5)")), "NOT value is greater than 5");
}

#[test]
fn test_cascade_scenarios() {
    let failing = || Step::compile("a", "CHECK(false)").unwrap();
    let completing = || Step::compile("b", "CHECK(true)").unwrap();
    let parent = |policy| {
        Step::new("parent")
            .with_cascade(policy)
            .with_child(failing().with_order(1))
            .with_child(completing().with_order(2))
    };
    let run = |policy| parent(policy).execute(&mut context(Value::Null)).unwrap().kind;

    assert_eq!(run(CascadePolicy::AnyOneCompletes), ResultKind::Complete);
    assert_eq!(run(CascadePolicy::AllMustFail), ResultKind::Fail);
    // {Fail, Complete} tells these two apart
    assert_eq!(run(CascadePolicy::AllMustComplete), ResultKind::Fail);
    assert_eq!(run(CascadePolicy::AnyOneFails), ResultKind::Fail);

    let both_complete = [ResultKind::Complete, ResultKind::Complete];
    assert_eq!(
        determine_overall_result(CascadePolicy::AllMustComplete, &both_complete),
        ResultKind::Complete
    );
    assert_eq!(
        determine_overall_result(CascadePolicy::AnyOneFails, &both_complete),
        ResultKind::Complete
    );
}

#[test]
fn test_step_tree_is_reusable() {
    let step = Step::compile("root", r#"gte(18)=>SET("adult")=>SET("minor")"#).unwrap();
    let before = step.clone();

    let mut adult = context(Value::Integer(30));
    step.execute(&mut adult).unwrap();
    let mut minor = context(Value::Integer(12));
    step.execute(&mut minor).unwrap();

    assert_eq!(adult.into_target(), Value::text("adult"));
    assert_eq!(minor.into_target(), Value::text("minor"));
    assert_eq!(step, before);
}

#[test]
fn test_yaml_workflow_end_to_end() {
    let yaml = r#"
name: order-routing
step:
  name: root
  cascade: all_must_complete
  children:
    - name: notify
      order: 2
      instruction: 'EMAIL("ops@example.com", [order|order.id])'
    - name: priority
      order: 1
      instruction: 'gt([order|order.total], 100)=>SET(priority, "high")=>SET(priority, "normal")'
    - name: due
      order: 3
      instructions:
        - 'SET(due, EOM())'
"#;
    let def = DefinitionLoader::parse_workflow(yaml).unwrap();
    let workflow = CompiledWorkflow::compile(&def, &EngineConfig::default()).unwrap();

    let mailer = Arc::new(MockMailer::default());
    let registry = ActionRegistry::with_builtins();
    registry.register(ActionKind::Email, mailer.clone());

    let target = Value::from_json(&json!({"order": {"id": "A-17", "total": 250}}));
    let mut ctx = ExecutionContext::new(target, registry.clone())
        .with_today(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    let result = workflow.root.execute(&mut ctx).unwrap();
    assert!(result.is_complete(), "{:?}", result);

    let paths: Vec<&str> = ctx.trace().iter().map(|t| t.path.as_str()).collect();
    assert_eq!(paths, vec!["root/priority", "root/notify", "root/due", "root"]);

    assert_eq!(*mailer.sent.lock().unwrap(), vec!["ops@example.com <A-17>".to_string()]);
    assert_eq!(
        ctx.target().get_path("priority"),
        Some(&Value::text("high"))
    );
    assert_eq!(
        ctx.target().get_path("due"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
    );

    let notify = &workflow.root.children[0];
    let Instruction::Action(email) = &notify.instructions[0] else {
        panic!("expected a plain action");
    };
    assert_eq!(registry.translate(email), "send mail (2 parameters)");
}

#[test]
fn test_unhandled_external_action_propagates() {
    let step = Step::compile("archive", "ZIP(reports)").unwrap();
    let mut ctx = context(Value::Null);
    let err = step.execute(&mut ctx).unwrap_err();
    assert_eq!(err, WorkflowError::NoHandler("ZIP".to_string()));
}

#[test]
fn test_rule_set_validation() {
    let yaml = r#"
name: signup
rules:
  - field: name
    rule: "[|r|mx(10)]"
  - field: email
    rule: "[|e]"
  - field: age
    rule: '[>="18"]'
"#;
    let def = DefinitionLoader::parse_rule_set(yaml).unwrap();
    let rules = RuleSet::compile(&def, &EngineConfig::default()).unwrap();

    let good = Value::from_json(&json!({"name": "Ann", "email": "ann@example.com", "age": 30}));
    assert!(rules.validate(Evaluator::shared(), &good).unwrap().is_valid());

    let bad = Value::from_json(&json!({"name": "Maximilian-Alexander", "email": "nope", "age": 12}));
    let report = rules.validate(Evaluator::shared(), &bad).unwrap();
    assert_eq!(report.failed_fields().collect::<Vec<_>>(), vec!["name", "email", "age"]);
    assert!(report.validation_messages(true).starts_with("<ul>"));
}
