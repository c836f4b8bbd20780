// SPDX-License-Identifier: MIT

//! Compiled workflow instructions

use super::result::WorkflowResult;
use crate::rdk::value::Value;
use crate::ruleflow::expression::Expression;
use std::fmt;

macro_rules! action_kinds {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Every action a workflow instruction can name
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ActionKind {
            $($variant),*
        }

        impl ActionKind {
            pub const ALL: &'static [ActionKind] = &[$(ActionKind::$variant),*];

            /// Canonical spelling
            pub fn name(self) -> &'static str {
                match self {
                    $(ActionKind::$variant => $name),*
                }
            }
        }
    };
}

action_kinds! {
    Gt => "gt",
    Lt => "lt",
    Eq => "eq",
    Gte => "gte",
    Lte => "lte",
    Bw => "bw",
    Len => "len",
    In => "in",
    Check => "CHECK",
    Set => "SET",
    Get => "GET",
    List => "LIST",
    Each => "EACH",
    ConvertTo => "CONVERTTO",
    Ifttt => "IFTTT",
    Switch => "SWITCH",
    End => "END",
    Today => "Today",
    Eom => "EOM",
    Eoq => "EOQ",
    Eofy => "EOFY",
    Fwdom => "FWDOM",
    Fwdoq => "FWDOQ",
    Fwdofy => "FWDOFY",
    Lwdom => "LWDOM",
    Lwdoq => "LWDOQ",
    Lwdofy => "LWDOFY",
    Attach => "ATTACH",
    Email => "EMAIL",
    Wait => "WAIT",
    Wf => "WF",
    Zip => "ZIP",
    Goto => "GOTO",
}

impl ActionKind {
    /// Resolve an action name case-insensitively
    pub fn from_name(name: &str) -> Option<ActionKind> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Allowed parameter count as (minimum, maximum)
    pub fn arity(self) -> (usize, Option<usize>) {
        use ActionKind::*;
        match self {
            Gt | Lt | Eq | Gte | Lte | Len => (1, Some(2)),
            Bw => (2, Some(3)),
            In => (1, None),
            Check | Get | Each | ConvertTo => (1, Some(1)),
            Set => (1, Some(2)),
            List => (0, None),
            Ifttt => (2, Some(3)),
            Switch => (2, None),
            End | Today => (0, Some(0)),
            Eom | Eoq | Eofy | Fwdom | Fwdoq | Fwdofy | Lwdom | Lwdoq | Lwdofy => (0, Some(1)),
            Attach | Email | Wait | Wf | Zip | Goto => (0, None),
        }
    }

    /// Indexes of parameters that must be actions, given the parameter count
    pub fn action_params(self, count: usize) -> Vec<usize> {
        match self {
            ActionKind::Each => vec![0],
            ActionKind::Ifttt => (1..count).collect(),
            ActionKind::Switch => {
                let mut indexes: Vec<usize> = (1..count).step_by(2).collect();
                if count % 2 == 1 {
                    indexes.push(count - 1);
                }
                indexes
            }
            _ => Vec::new(),
        }
    }

    /// Actions that depend on systems outside the engine
    pub fn is_external(self) -> bool {
        use ActionKind::*;
        matches!(self, Attach | Email | Wait | Wf | Zip | Goto)
    }

    pub(crate) fn describe_arity(self) -> String {
        match self.arity() {
            (min, Some(max)) if min == max => min.to_string(),
            (min, Some(max)) => format!("{}-{}", min, max),
            (min, None) => format!("at least {}", min),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One parameter of an action
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(Value),
    /// `[target|object.property]`
    Reference { object: String, property: String },
    /// Bracket expression tested against the target
    Rule(Expression),
    /// Nested action run against the target
    Action(WorkflowAction),
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Literal(Value::Text(s)) => write!(f, "\"{}\"", s),
            Param::Literal(v) => write!(f, "{}", v),
            Param::Reference { object, property } => write!(f, "{}.{}", object, property),
            Param::Rule(expr) => write!(f, "{}", expr.source),
            Param::Action(action) => write!(f, "{}", action.source),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowAction {
    pub kind: ActionKind,
    /// Name as written in the source
    pub name: String,
    pub params: Vec<Param>,
    /// Written with a leading `!`
    pub negative: bool,
    /// Condition of a `test=>then=>else` chain
    pub is_test_action: bool,
    pub source: String,
}

impl WorkflowAction {
    pub fn new(kind: ActionKind, params: Vec<Param>) -> Self {
        let rendered: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        Self {
            kind,
            name: kind.name().to_string(),
            source: format!("{}({})", kind.name(), rendered.join(",")),
            params,
            negative: false,
            is_test_action: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negative = !self.negative;
        self.source = format!("!{}", self.source);
        self
    }

    /// The handler's result as seen by callers: Complete and Fail swap when negative
    pub fn read_result(&self, raw: WorkflowResult) -> WorkflowResult {
        if self.negative {
            raw.negated()
        } else {
            raw
        }
    }
}

/// One compiled workflow instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Action(WorkflowAction),
    /// `condition=>then` or `condition=>then=>else`
    Test {
        condition: WorkflowAction,
        then_branch: WorkflowAction,
        else_branch: Option<WorkflowAction>,
    },
}

impl Instruction {
    /// Flat action list: the condition first, then its branches
    pub fn actions(&self) -> Vec<&WorkflowAction> {
        match self {
            Instruction::Action(action) => vec![action],
            Instruction::Test {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut actions = vec![condition, then_branch];
                actions.extend(else_branch.iter());
                actions
            }
        }
    }
}
