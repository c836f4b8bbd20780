// SPDX-License-Identifier: MIT

//! Human-readable phrases for actions and instructions

use super::ast::{ActionKind, Instruction, Param, WorkflowAction};

fn param(action: &WorkflowAction, index: usize) -> String {
    match action.params.get(index) {
        Some(Param::Action(nested)) => phrase(nested),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn all_params(action: &WorkflowAction) -> String {
    (0..action.params.len())
        .map(|i| param(action, i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn comparison(action: &WorkflowAction, verb: &str) -> String {
    if action.params.len() == 2 {
        format!("{} {} {}", param(action, 0), verb, param(action, 1))
    } else {
        format!("value {} {}", verb, param(action, 0))
    }
}

/// Phrase for a nested action, negation included
fn phrase(action: &WorkflowAction) -> String {
    if action.negative {
        format!("NOT {}", describe(action))
    } else {
        describe(action)
    }
}

/// Default phrase for an action, without its own negation
pub fn describe(action: &WorkflowAction) -> String {
    use ActionKind::*;
    let n = action.params.len();
    match action.kind {
        Gt => comparison(action, "is greater than"),
        Lt => comparison(action, "is less than"),
        Eq => comparison(action, "equals"),
        Gte => comparison(action, "is at least"),
        Lte => comparison(action, "is at most"),
        Bw if n == 3 => format!(
            "{} is between {} and {}",
            param(action, 0),
            param(action, 1),
            param(action, 2)
        ),
        Bw => format!("value is between {} and {}", param(action, 0), param(action, 1)),
        Len if n == 2 => format!(
            "length is between {} and {}",
            param(action, 0),
            param(action, 1)
        ),
        Len => format!("length is {}", param(action, 0)),
        In => format!("value is one of {}", all_params(action)),
        Check => format!("check {}", param(action, 0)),
        Set if n == 2 => format!("set {} to {}", param(action, 0), param(action, 1)),
        Set => format!("set value to {}", param(action, 0)),
        Get => format!("get {}", param(action, 0)),
        List => format!("list of {}", all_params(action)),
        Each => format!("for each item: {}", param(action, 0)),
        ConvertTo => format!("convert value to {}", param(action, 0)),
        Ifttt if n == 3 => format!(
            "if {} then {} otherwise {}",
            param(action, 0),
            param(action, 1),
            param(action, 2)
        ),
        Ifttt => format!("if {} then {}", param(action, 0), param(action, 1)),
        Switch => {
            let mut cases: Vec<String> = (0..n / 2)
                .map(|i| format!("when {}: {}", param(action, 2 * i), param(action, 2 * i + 1)))
                .collect();
            if n % 2 == 1 {
                cases.push(format!("otherwise: {}", param(action, n - 1)));
            }
            format!("switch on value ({})", cases.join("; "))
        }
        End => "end the workflow".to_string(),
        Today => "today".to_string(),
        Eom | Eoq | Eofy | Fwdom | Fwdoq | Fwdofy | Lwdom | Lwdoq | Lwdofy => {
            let label = match action.kind {
                Eom => "end of month",
                Eoq => "end of quarter",
                Eofy => "end of fiscal year",
                Fwdom => "first working day of month",
                Fwdoq => "first working day of quarter",
                Fwdofy => "first working day of fiscal year",
                Lwdom => "last working day of month",
                Lwdoq => "last working day of quarter",
                _ => "last working day of fiscal year",
            };
            if n == 1 {
                format!("{} of {}", label, param(action, 0))
            } else {
                label.to_string()
            }
        }
        Attach | Email | Wait | Wf | Zip | Goto => {
            format!("{}({})", action.kind.name(), all_params(action))
        }
    }
}

/// Phrase for a whole instruction
pub fn describe_instruction(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Action(action) => phrase(action),
        Instruction::Test {
            condition,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(else_branch) => format!(
                "if {} then {} otherwise {}",
                phrase(condition),
                phrase(then_branch),
                phrase(else_branch)
            ),
            None => format!("if {} then {}", phrase(condition), phrase(then_branch)),
        },
    }
}
