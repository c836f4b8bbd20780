// SPDX-License-Identifier: MIT

//! Modifier checks
//!
//! Each check inspects the category of the value under test. With the force
//! flag set, checks that can repair the value rewrite it in the context and
//! pass; otherwise a failure is recorded. Null values are only rejected by
//! `Required`.

use super::ast::{Member, Modifier};
use super::context::{EvaluationContext, FailureKind, ValidationResult};
use super::lookup::Lookup;
use crate::rdk::error::EvalError;
use crate::rdk::value::{equals_loose, Value, ValueKind};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

/// Everything a modifier check needs besides the value
pub(crate) struct ModifierEnv<'a> {
    pub rule: &'a str,
    pub force: bool,
    pub case_insensitive: bool,
    pub lookup: Option<&'a dyn Lookup>,
}

impl ModifierEnv<'_> {
    fn fail(&self, ctx: &mut EvaluationContext, kind: FailureKind, detail: &str) -> bool {
        let result = ValidationResult::failed(kind, self.rule, ctx.value(), detail);
        ctx.record(result);
        false
    }
}

fn wrong_kind(modifier: &Modifier, kind: ValueKind) -> EvalError {
    EvalError::WrongValueKind {
        modifier: modifier.code().to_string(),
        kind,
    }
}

/// Number with the integer/decimal shape of `like`
fn number_like(like: &Value, n: f64) -> Value {
    if matches!(like, Value::Integer(_)) && n.fract() == 0.0 {
        Value::Integer(n as i64)
    } else {
        Value::Decimal(n)
    }
}

/// Float noise allowed on `scaled`; grows with its magnitude
fn rounding_tolerance(scaled: f64) -> f64 {
    f64::EPSILON * scaled.abs().max(1.0) * 4.0
}

/// Whether `n` carries no more than `digits` decimals
fn has_decimals_within(n: f64, digits: u32) -> bool {
    let scaled = n * 10f64.powi(digits as i32);
    (scaled - scaled.round()).abs() <= rounding_tolerance(scaled)
}

fn round_directed(n: f64, digits: u32, up: bool) -> f64 {
    let factor = 10f64.powi(digits as i32);
    let scaled = n * factor;
    let nearest = scaled.round();
    // binary noise such as 1.25 * 100 = 125.00000000000001
    if (scaled - nearest).abs() <= rounding_tolerance(scaled) {
        return nearest / factor;
    }
    let rounded = if up { scaled.ceil() } else { scaled.floor() };
    rounded / factor
}

/// Apply one modifier to the value held by `ctx`
pub(crate) fn apply(
    modifier: &Modifier,
    env: &ModifierEnv<'_>,
    ctx: &mut EvaluationContext,
) -> Result<bool, EvalError> {
    if ctx.value().is_null() && !matches!(modifier, Modifier::Required) {
        return Ok(true);
    }

    match modifier {
        Modifier::Uppercase | Modifier::Lowercase => {
            let upper = matches!(modifier, Modifier::Uppercase);
            let text = match ctx.value() {
                Value::Text(s) => s.clone(),
                other => return Err(wrong_kind(modifier, other.kind())),
            };
            let converted = if upper {
                text.to_uppercase()
            } else {
                text.to_lowercase()
            };
            if converted == text {
                Ok(true)
            } else if env.force {
                *ctx.value_mut() = Value::Text(converted);
                Ok(true)
            } else if upper {
                Ok(env.fail(ctx, FailureKind::NotUppercase, "text is not upper case"))
            } else {
                Ok(env.fail(ctx, FailureKind::NotLowercase, "text is not lower case"))
            }
        }

        Modifier::CaseInsensitive => Ok(true),

        Modifier::Max(limit) | Modifier::Min(limit) => {
            let is_max = matches!(modifier, Modifier::Max(_));
            let limit = *limit;
            let within = |n: f64| if is_max { n <= limit } else { n >= limit };

            match ctx.value().clone() {
                Value::Text(s) => {
                    let len = s.chars().count();
                    if within(len as f64) {
                        Ok(true)
                    } else if env.force && is_max {
                        let keep = limit.max(0.0).floor() as usize;
                        *ctx.value_mut() = Value::Text(s.chars().take(keep).collect());
                        Ok(true)
                    } else if is_max {
                        let detail = format!("length {} exceeds maximum {}", len, limit);
                        Ok(env.fail(ctx, FailureKind::ExceedsMax, &detail))
                    } else {
                        let detail = format!("length {} is below minimum {}", len, limit);
                        Ok(env.fail(ctx, FailureKind::BelowMin, &detail))
                    }
                }
                Value::List(items) => {
                    let count = items.len();
                    if within(count as f64) {
                        Ok(true)
                    } else if env.force && is_max {
                        let keep = limit.max(0.0).floor() as usize;
                        *ctx.value_mut() = Value::List(items.into_iter().take(keep).collect());
                        Ok(true)
                    } else if is_max {
                        let detail = format!("{} items exceed maximum {}", count, limit);
                        Ok(env.fail(ctx, FailureKind::ExceedsMax, &detail))
                    } else {
                        let detail = format!("{} items are below minimum {}", count, limit);
                        Ok(env.fail(ctx, FailureKind::BelowMin, &detail))
                    }
                }
                number @ (Value::Integer(_) | Value::Decimal(_)) => {
                    let n = number.as_f64().unwrap_or_default();
                    if within(n) {
                        Ok(true)
                    } else if env.force {
                        *ctx.value_mut() = number_like(&number, limit);
                        Ok(true)
                    } else if is_max {
                        let detail = format!("{} exceeds maximum {}", n, limit);
                        Ok(env.fail(ctx, FailureKind::ExceedsMax, &detail))
                    } else {
                        let detail = format!("{} is below minimum {}", n, limit);
                        Ok(env.fail(ctx, FailureKind::BelowMin, &detail))
                    }
                }
                other => Err(wrong_kind(modifier, other.kind())),
            }
        }

        Modifier::Email => match ctx.value() {
            Value::Text(s) if s.trim().is_empty() => Ok(true),
            Value::Text(s) if EMAIL_PATTERN.is_match(s.trim()) => Ok(true),
            Value::Text(_) => Ok(env.fail(
                ctx,
                FailureKind::InvalidEmail,
                "not a valid email address",
            )),
            other => Err(wrong_kind(modifier, other.kind())),
        },

        Modifier::In(members) => {
            let value = ctx.value();
            let found = members.iter().any(|member| match member {
                Member::Value(candidate) => equals_loose(value, candidate, env.case_insensitive),
                Member::Field { column, value: expected } => match value {
                    Value::Object(map) => map
                        .get(column)
                        .is_some_and(|v| equals_loose(v, expected, env.case_insensitive)),
                    _ => false,
                },
            });
            if found {
                Ok(true)
            } else {
                let listed: Vec<String> = members
                    .iter()
                    .map(|m| match m {
                        Member::Value(v) => v.to_text(),
                        Member::Field { column, value } => format!("{}.{}", column, value),
                    })
                    .collect();
                let detail = format!("not one of {}", listed.join(", "));
                Ok(env.fail(ctx, FailureKind::NotInList, &detail))
            }
        }

        Modifier::InDb(columns) => {
            let lookup = env
                .lookup
                .ok_or_else(|| EvalError::LookupUnavailable(modifier.code().to_string()))?;
            for column in columns {
                if lookup.contains(column, ctx.value()).map_err(EvalError::Lookup)? {
                    return Ok(true);
                }
            }
            let listed: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let detail = format!("not found in {}", listed.join(", "));
            Ok(env.fail(ctx, FailureKind::NotInLookup, &detail))
        }

        Modifier::Required => {
            let present = match ctx.value() {
                Value::Null => false,
                Value::Text(s) => !s.trim().is_empty(),
                Value::List(items) => !items.is_empty(),
                _ => true,
            };
            if present {
                Ok(true)
            } else {
                Ok(env.fail(ctx, FailureKind::Required, "a value is required"))
            }
        }

        Modifier::RoundUp(digits) | Modifier::RoundDown(digits) => {
            let up = matches!(modifier, Modifier::RoundUp(_));
            let n = match ctx.value() {
                Value::Integer(_) => return Ok(true),
                Value::Decimal(f) => *f,
                Value::Text(s) => match s.trim().parse::<f64>() {
                    Ok(f) if f.is_finite() => f,
                    _ => return Err(wrong_kind(modifier, ValueKind::Text)),
                },
                other => return Err(wrong_kind(modifier, other.kind())),
            };
            if has_decimals_within(n, *digits) {
                Ok(true)
            } else if env.force {
                *ctx.value_mut() = Value::Decimal(round_directed(n, *digits, up));
                Ok(true)
            } else if up {
                let detail = format!("{} has more than {} decimals", n, digits);
                Ok(env.fail(ctx, FailureKind::NotRoundedUp, &detail))
            } else {
                let detail = format!("{} has more than {} decimals", n, digits);
                Ok(env.fail(ctx, FailureKind::NotRoundedDown, &detail))
            }
        }

        Modifier::Between(low, high) => {
            let value = ctx.value().clone();
            let date_bounds = !low.is_number() && low.as_date().is_some();

            let in_range = if date_bounds {
                let d = value
                    .as_date()
                    .ok_or_else(|| wrong_kind(modifier, value.kind()))?;
                let (lo, hi) = (low.as_date(), high.as_date());
                lo.is_some_and(|lo| d >= lo) && hi.is_some_and(|hi| d <= hi)
            } else {
                let (lo, hi) = (
                    low.as_f64().unwrap_or(f64::NEG_INFINITY),
                    high.as_f64().unwrap_or(f64::INFINITY),
                );
                let n = match &value {
                    Value::Text(s) => s.chars().count() as f64,
                    Value::List(items) => items.len() as f64,
                    Value::Integer(_) | Value::Decimal(_) => value.as_f64().unwrap_or_default(),
                    other => return Err(wrong_kind(modifier, other.kind())),
                };
                if n >= lo && n <= hi {
                    true
                } else if env.force && value.is_number() {
                    *ctx.value_mut() = number_like(&value, n.clamp(lo, hi));
                    return Ok(true);
                } else {
                    false
                }
            };

            if in_range {
                Ok(true)
            } else {
                let detail = format!("not between {} and {}", low, high);
                Ok(env.fail(ctx, FailureKind::OutOfRange, &detail))
            }
        }
    }
}
