// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ruleflow_rs::rdk::{EngineConfig, RuleflowError, Value};
use ruleflow_rs::ruleflow::expression::{Evaluator, ExpressionParser};
use ruleflow_rs::ruleflow::ruleset::RuleSet;
use ruleflow_rs::ruleflow::step::{CompiledWorkflow, DefinitionLoader};
use ruleflow_rs::ruleflow::workflow::translate::describe_instruction;
use ruleflow_rs::ruleflow::workflow::{ActionRegistry, ExecutionContext, WorkflowParser};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Test a value against a bracket rule
    Check {
        /// Rule text, e.g. `[>="5"|mx(10)]`
        #[arg(short, long)]
        rule: String,

        /// Value to test (JSON, or a plain literal)
        #[arg(short, long)]
        value: String,

        /// Render failure messages as an HTML list
        #[arg(long)]
        html: bool,
    },
    /// Compile a workflow instruction and print its reading
    Parse {
        /// Instruction text, e.g. `gt(5)=>SET(1)`
        #[arg(short, long)]
        instruction: String,
    },
    /// Run a workflow file against a target
    Run {
        /// Path to the workflow file
        #[arg(short, long)]
        file: String,

        /// Target value (JSON, or a plain literal)
        #[arg(short, long, default_value = "null")]
        target: String,
    },
    /// Validate an object against a rule set file
    Validate {
        /// Path to the rule set file
        #[arg(short, long)]
        file: String,

        /// Object to validate, as JSON
        #[arg(short, long)]
        input: String,
    },
}

/// JSON when it parses, a literal otherwise
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::parse_literal(raw),
    }
}

/// JSON object input for rule set validation
fn parse_object(raw: &str) -> Result<Value, RuleflowError> {
    let json: serde_json::Value = serde_json::from_str(raw)?;
    match Value::from_json(&json) {
        value @ Value::Object(_) => Ok(value),
        other => Err(RuleflowError::other(format!(
            "--input must be a JSON object, got {}",
            other.kind()
        ))),
    }
}

fn main() -> Result<(), RuleflowError> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;

    match args.command {
        Commands::Check { rule, value, html } => {
            let expr = ExpressionParser::new(&config).compile(&rule)?;
            let value = parse_value(&value);
            let evaluation = Evaluator::new(config).evaluate(&expr, &value)?;

            if evaluation.passed {
                println!("PASS");
            } else {
                println!("FAIL");
                println!("{}", evaluation.validation_messages(html));
            }
            if evaluation.value != value {
                println!("Value: {}", evaluation.value);
            }
        }
        Commands::Parse { instruction } => {
            let compiled = WorkflowParser::new(&config).parse(&instruction)?;
            println!("{}", describe_instruction(&compiled));
            log::debug!("{:#?}", compiled);
        }
        Commands::Run { file, target } => {
            let workflow = CompiledWorkflow::load(&file, &config)?;
            log::info!("Running workflow: {}", workflow.name);

            let mut ctx = ExecutionContext::new(parse_value(&target), ActionRegistry::with_builtins())
                .with_evaluator(Evaluator::new(workflow.config.clone()));
            let result = workflow.root.execute(&mut ctx)?;

            for entry in ctx.trace() {
                println!("{}: {}", entry.path, entry.result.kind);
            }
            println!("Result: {}", result.kind);
            if let Some(failure) = &result.failure {
                println!("Failure: {}", failure);
            }
            println!(
                "Target: {}",
                serde_json::to_string_pretty(&ctx.into_target().to_json())?
            );
        }
        Commands::Validate { file, input } => {
            let def = DefinitionLoader::new().load_rule_set(&file)?;
            let rules = RuleSet::compile(&def, &config)?;
            let input = parse_object(&input)?;

            let report = rules.validate(&Evaluator::new(config), &input)?;
            if report.is_valid() {
                println!("'{}': valid", report.name);
            } else {
                println!("'{}': invalid", report.name);
                println!("{}", report.validation_messages(false));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_falls_back_to_literal() {
        assert_eq!(parse_value("42"), Value::Integer(42));
        assert_eq!(parse_value("hello"), Value::text("hello"));
        assert_eq!(parse_value(r#""quoted""#), Value::text("quoted"));
    }

    #[test]
    fn test_parse_object_rejects_scalars() {
        assert!(matches!(parse_object(r#"{"age": 30}"#), Ok(Value::Object(_))));
        let err = parse_object("[1, 2]").unwrap_err();
        assert!(matches!(err, RuleflowError::Other(_)));
        assert_eq!(err.to_string(), "--input must be a JSON object, got list");
        assert!(matches!(parse_object("{"), Err(RuleflowError::Json(_))));
    }
}
