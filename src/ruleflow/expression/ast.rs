// SPDX-License-Identifier: MIT

//! Compiled expression tree
//!
//! The tree is immutable once compiled. Diagnostics produced while testing a
//! value live in an [`EvaluationContext`](super::context::EvaluationContext),
//! so one tree can be shared and evaluated from several threads.

use crate::rdk::value::Value;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Byte range of a node in its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Base comparison of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    /// =
    #[default]
    Equals,
    /// >
    GreaterThan,
    /// <
    LessThan,
    /// >=
    GreaterOrEqual,
    /// <=
    LessOrEqual,
    /// != or <>
    NotEqual,
    /// No comparison, always passes
    None,
}

impl Operand {
    pub fn from_symbol(symbol: &str) -> Option<Operand> {
        match symbol {
            "=" => Some(Operand::Equals),
            ">" => Some(Operand::GreaterThan),
            "<" => Some(Operand::LessThan),
            ">=" => Some(Operand::GreaterOrEqual),
            "<=" => Some(Operand::LessOrEqual),
            "!=" | "<>" => Some(Operand::NotEqual),
            _ => None,
        }
    }

    /// Map a three-way comparison of value against target to pass/fail
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Operand::Equals => ordering == Equal,
            Operand::GreaterThan => ordering == Greater,
            Operand::LessThan => ordering == Less,
            Operand::GreaterOrEqual => ordering != Less,
            Operand::LessOrEqual => ordering != Greater,
            Operand::NotEqual => ordering != Equal,
            Operand::None => true,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Equals => write!(f, "="),
            Operand::GreaterThan => write!(f, ">"),
            Operand::LessThan => write!(f, "<"),
            Operand::GreaterOrEqual => write!(f, ">="),
            Operand::LessOrEqual => write!(f, "<="),
            Operand::NotEqual => write!(f, "!="),
            Operand::None => write!(f, ""),
        }
    }
}

/// How members of a group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    And,
    Or,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::And => write!(f, "&&"),
            JoinKind::Or => write!(f, "||"),
        }
    }
}

/// Set of active modifiers, one bit per modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ModifierFlags(u16);

impl ModifierFlags {
    pub const UPPERCASE: Self = Self(0x0001);
    pub const LOWERCASE: Self = Self(0x0002);
    pub const CASE_INSENSITIVE: Self = Self(0x0004);
    pub const MAX: Self = Self(0x0008);
    pub const MIN: Self = Self(0x0010);
    pub const REQUIRED: Self = Self(0x0020);
    pub const EMAIL: Self = Self(0x0040);
    pub const IN: Self = Self(0x0080);
    pub const IN_DB: Self = Self(0x0100);
    pub const ROUND_UP: Self = Self(0x0200);
    pub const ROUND_DOWN: Self = Self(0x0400);
    pub const BETWEEN: Self = Self(0x0800);

    pub const NONE: Self = Self(0);

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }
}

impl BitOr for ModifierFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModifierFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Member of an `in(...)` list
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// Plain value compared against the value under test
    Value(Value),
    /// `column.value`: field `column` of an object value must equal `value`
    Field { column: String, value: Value },
}

/// `table.column` argument of `indb(...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// An active modifier with its typed parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Uppercase,
    Lowercase,
    CaseInsensitive,
    Max(f64),
    Min(f64),
    Email,
    In(Vec<Member>),
    InDb(Vec<ColumnRef>),
    Required,
    RoundUp(u32),
    RoundDown(u32),
    Between(Value, Value),
}

impl Modifier {
    /// Source code of the modifier (`u`, `mx`, `indb`, ...)
    pub fn code(&self) -> &'static str {
        match self {
            Modifier::Uppercase => "u",
            Modifier::Lowercase => "l",
            Modifier::CaseInsensitive => "i",
            Modifier::Max(_) => "mx",
            Modifier::Min(_) => "mn",
            Modifier::Email => "e",
            Modifier::In(_) => "in",
            Modifier::InDb(_) => "indb",
            Modifier::Required => "r",
            Modifier::RoundUp(_) => "ru",
            Modifier::RoundDown(_) => "rd",
            Modifier::Between(_, _) => "b",
        }
    }

    pub fn flag(&self) -> ModifierFlags {
        match self {
            Modifier::Uppercase => ModifierFlags::UPPERCASE,
            Modifier::Lowercase => ModifierFlags::LOWERCASE,
            Modifier::CaseInsensitive => ModifierFlags::CASE_INSENSITIVE,
            Modifier::Max(_) => ModifierFlags::MAX,
            Modifier::Min(_) => ModifierFlags::MIN,
            Modifier::Email => ModifierFlags::EMAIL,
            Modifier::In(_) => ModifierFlags::IN,
            Modifier::InDb(_) => ModifierFlags::IN_DB,
            Modifier::Required => ModifierFlags::REQUIRED,
            Modifier::RoundUp(_) => ModifierFlags::ROUND_UP,
            Modifier::RoundDown(_) => ModifierFlags::ROUND_DOWN,
            Modifier::Between(_, _) => ModifierFlags::BETWEEN,
        }
    }

    /// Position in the fixed application order
    pub fn rank(&self) -> u8 {
        match self {
            Modifier::Uppercase => 0,
            Modifier::Lowercase => 1,
            Modifier::CaseInsensitive => 2,
            Modifier::Max(_) => 3,
            Modifier::Min(_) => 4,
            Modifier::Email => 5,
            Modifier::In(_) => 6,
            Modifier::InDb(_) => 7,
            Modifier::Required => 8,
            Modifier::RoundUp(_) => 9,
            Modifier::RoundDown(_) => 10,
            Modifier::Between(_, _) => 11,
        }
    }
}

/// Left-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Target {
    /// No target given; only modifiers apply
    #[default]
    None,
    /// `this`: the value under test
    This,
    Literal(Value),
}

/// Trailing `-x` flags of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpressionFlags {
    /// `-f`: modifiers rewrite the value instead of only checking it
    pub force: bool,
}

/// A compiled rule: either a leaf comparison or a node with child groups
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    /// Source text the node was compiled from
    pub source: String,
    pub span: Span,
    pub target: Target,
    pub operand: Operand,
    /// Active modifiers in application order
    pub modifiers: Vec<Modifier>,
    pub modifier_flags: ModifierFlags,
    pub flags: ExpressionFlags,
    /// When non-empty, the node's own operand and modifiers are ignored
    pub groups: Vec<ExpressionGroup>,
}

impl Expression {
    pub fn is_leaf(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn has_modifier(&self, flag: ModifierFlags) -> bool {
        self.modifier_flags.contains(flag)
    }

    /// Node that only combines child groups
    pub fn with_groups(source: impl Into<String>, span: Span, groups: Vec<ExpressionGroup>) -> Self {
        Self {
            source: source.into(),
            span,
            operand: Operand::None,
            groups,
            ..Default::default()
        }
    }
}

/// AND/OR-joined list of expressions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpressionGroup {
    pub join: JoinKind,
    pub members: Vec<Expression>,
}

impl ExpressionGroup {
    pub fn new(join: JoinKind, members: Vec<Expression>) -> Self {
        Self { join, members }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_operand_symbols() {
        assert_eq!(Operand::from_symbol("="), Some(Operand::Equals));
        assert_eq!(Operand::from_symbol(">="), Some(Operand::GreaterOrEqual));
        assert_eq!(Operand::from_symbol("<>"), Some(Operand::NotEqual));
        assert_eq!(Operand::from_symbol("!="), Some(Operand::NotEqual));
        assert_eq!(Operand::from_symbol("=="), None);
    }

    #[test]
    fn test_operand_holds() {
        assert!(Operand::Equals.holds(Ordering::Equal));
        assert!(!Operand::Equals.holds(Ordering::Less));
        assert!(Operand::GreaterThan.holds(Ordering::Greater));
        assert!(Operand::GreaterOrEqual.holds(Ordering::Equal));
        assert!(!Operand::LessOrEqual.holds(Ordering::Greater));
        assert!(Operand::NotEqual.holds(Ordering::Less));
        assert!(Operand::None.holds(Ordering::Less));
    }

    #[test]
    fn test_modifier_flags() {
        let mut flags = ModifierFlags::NONE;
        assert!(flags.is_empty());
        flags |= ModifierFlags::MAX;
        flags |= ModifierFlags::REQUIRED;
        assert!(flags.contains(ModifierFlags::MAX));
        assert!(flags.contains(ModifierFlags::MAX | ModifierFlags::REQUIRED));
        assert!(!flags.contains(ModifierFlags::EMAIL));
        assert_eq!(flags.bits(), 0x0028);
    }

    #[test]
    fn test_modifier_rank_follows_application_order() {
        let mut mods = vec![
            Modifier::Required,
            Modifier::Max(3.0),
            Modifier::Uppercase,
            Modifier::Email,
        ];
        mods.sort_by_key(Modifier::rank);
        let codes: Vec<&str> = mods.iter().map(Modifier::code).collect();
        assert_eq!(codes, vec!["u", "mx", "e", "r"]);
    }
}
