//! Expression evaluation.
//!
//! Evaluation is pure: it reads the [`FlagTable`] and the host facts and
//! never mutates either. Only assignments, executed by the engine, change
//! flags.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{BinOp, Builtin, Expression, Segment, UnaryOp};
use crate::error::RuntimeError;
use crate::host::{Component, HostFacts};
use crate::value::Value;
use crate::version::{self, Version};

/// Run-scoped variables. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagTable {
    vars: BTreeMap<String, Value>,
}

impl FlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(&name.to_lowercase())
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_lowercase(), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order, with lowercased names.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Evaluates `expr` against `flags` and `host`.
pub fn evaluate(
    expr: &Expression,
    flags: &FlagTable,
    host: &dyn HostFacts,
) -> Result<Value, RuntimeError> {
    match expr {
        Expression::Bool(b) => Ok(Value::Bool(*b)),
        Expression::Int(n) => Ok(Value::Int(*n)),
        Expression::String(s) => Ok(Value::Str(s.clone())),
        Expression::Interpolated(segments) => interpolate(segments, flags).map(Value::Str),
        Expression::Variable(name) => flags
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::undefined_variable(name)),
        Expression::Unary { op, operand } => {
            let value = evaluate(operand, flags, host)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(n)) => n
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::type_mismatch("Integer overflow in negation")),
                (UnaryOp::Not, other) => Err(RuntimeError::type_mismatch(format!(
                    "'not' expects Bool, got {}",
                    other.kind()
                ))),
                (UnaryOp::Neg, other) => Err(RuntimeError::type_mismatch(format!(
                    "Unary '-' expects Int, got {}",
                    other.kind()
                ))),
            }
        }
        Expression::Binary { op: BinOp::And, left, right } => {
            if !expect_bool(evaluate(left, flags, host)?, "and")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(evaluate(right, flags, host)?, "and")?))
        }
        Expression::Binary { op: BinOp::Or, left, right } => {
            if expect_bool(evaluate(left, flags, host)?, "or")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(evaluate(right, flags, host)?, "or")?))
        }
        Expression::Binary { op, left, right } => {
            let left = evaluate(left, flags, host)?;
            let right = evaluate(right, flags, host)?;
            apply_binary(*op, left, right)
        }
        Expression::Call { function, args } => {
            let values = args
                .iter()
                .map(|arg| evaluate(arg, flags, host))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, values, host)
        }
    }
}

/// Evaluates a condition, which must produce a `Bool`.
pub fn evaluate_condition(
    expr: &Expression,
    flags: &FlagTable,
    host: &dyn HostFacts,
) -> Result<bool, RuntimeError> {
    let value = evaluate(expr, flags, host)?;
    value.as_bool().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("Condition must be Bool, got {}", value.kind()))
    })
}

/// Evaluates an expression and renders it as text for directives and pages.
pub fn evaluate_text(
    expr: &Expression,
    flags: &FlagTable,
    host: &dyn HostFacts,
) -> Result<String, RuntimeError> {
    match evaluate(expr, flags, host)? {
        Value::Str(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn interpolate(segments: &[Segment], flags: &FlagTable) -> Result<String, RuntimeError> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Variable(name) => {
                let value = flags
                    .get(name)
                    .ok_or_else(|| RuntimeError::undefined_variable(name))?;
                out.push_str(&value.to_string());
            }
        }
    }
    Ok(out)
}

fn expect_bool(value: Value, op: &str) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("'{}' expects Bool operands, got {}", op, value.kind()))
    })
}

/// Applies a binary operator to two evaluated operands.
pub(crate) fn apply_binary(op: BinOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let mismatch = |left: &Value, right: &Value| {
        RuntimeError::type_mismatch(format!(
            "Cannot apply '{}' to {} and {}",
            op.symbol(),
            left.kind(),
            right.kind()
        ))
    };

    match op {
        BinOp::Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::type_mismatch("Integer overflow in '+'")),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            _ => Err(mismatch(&left, &right)),
        },
        BinOp::Sub => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_sub(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::type_mismatch("Integer overflow in '-'")),
            _ => Err(mismatch(&left, &right)),
        },
        BinOp::Eq | BinOp::NotEq => {
            if left.kind() != right.kind() {
                return Err(mismatch(&left, &right));
            }
            let equal = left == right;
            Ok(Value::Bool(if op == BinOp::Eq { equal } else { !equal }))
        }
        BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            let ordering = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::Version(a), Value::Version(b)) => version::compare(a, b),
                _ => return Err(mismatch(&left, &right)),
            };
            let result = match op {
                BinOp::Lt => ordering == Ordering::Less,
                BinOp::LtEq => ordering != Ordering::Greater,
                BinOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinOp::And | BinOp::Or => {
            let a = expect_bool(left, op.symbol())?;
            let b = expect_bool(right, op.symbol())?;
            Ok(Value::Bool(if op == BinOp::And { a && b } else { a || b }))
        }
    }
}

fn call(function: Builtin, args: Vec<Value>, host: &dyn HostFacts) -> Result<Value, RuntimeError> {
    let first = args.first().ok_or_else(|| {
        RuntimeError::type_mismatch(format!("{} expects an argument", function.name()))
    })?;
    let component = match function {
        Builtin::CompareGameVersion => Some(Component::Game),
        Builtin::CompareScriptExtenderVersion => Some(Component::ScriptExtender),
        Builtin::CompareGraphicsExtenderVersion => Some(Component::GraphicsExtender),
        Builtin::CompareWryeBashVersion => Some(Component::WryeBash),
        _ => None,
    };
    if let Some(component) = component {
        let wanted = version_arg(function, first)?;
        let installed = host
            .installed_version(component)
            .and_then(|v| Version::parse(&v));
        let result = match installed {
            Some(installed) => match version::compare(&installed, &wanted) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            },
            None => -1,
        };
        return Ok(Value::Int(result));
    }

    match function {
        Builtin::DataFileExists => {
            for arg in &args {
                let path = arg.as_str().ok_or_else(|| {
                    RuntimeError::type_mismatch(format!(
                        "DataFileExists expects String paths, got {}",
                        arg.kind()
                    ))
                })?;
                if !host.data_file_exists(path) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Builtin::GetPluginLoadOrder => {
            let plugin = string_arg(function, first)?;
            let fallback = match args.get(1) {
                Some(Value::Int(n)) => *n,
                Some(other) => {
                    return Err(RuntimeError::type_mismatch(format!(
                        "GetPluginLoadOrder fallback must be Int, got {}",
                        other.kind()
                    )))
                }
                None => -1,
            };
            Ok(Value::Int(host.plugin_load_order(plugin).unwrap_or(fallback)))
        }
        Builtin::GetPluginStatus => {
            Ok(Value::Int(host.plugin_status(string_arg(function, first)?)))
        }
        Builtin::GetFilename => Ok(Value::Str(host.file_name(string_arg(function, first)?))),
        Builtin::GetFolder => Ok(Value::Str(host.folder_name(string_arg(function, first)?))),
        Builtin::Version => version_arg(function, first).map(Value::Version),
        Builtin::Len => match first {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(RuntimeError::type_mismatch(format!(
                "len expects String, got {}",
                other.kind()
            ))),
        },
        Builtin::Str => Ok(Value::Str(first.to_string())),
        Builtin::Int => match first {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
                RuntimeError::type_mismatch(format!("Cannot convert '{}' to Int", s))
            }),
            other => Err(RuntimeError::type_mismatch(format!(
                "int expects String or Int, got {}",
                other.kind()
            ))),
        },
        _ => Err(RuntimeError::type_mismatch(format!(
            "{} cannot be called here",
            function.name()
        ))),
    }
}

fn string_arg(function: Builtin, value: &Value) -> Result<&str, RuntimeError> {
    value.as_str().ok_or_else(|| {
        RuntimeError::type_mismatch(format!(
            "{} expects a String, got {}",
            function.name(),
            value.kind()
        ))
    })
}

fn version_arg(function: Builtin, value: &Value) -> Result<Version, RuntimeError> {
    match value {
        Value::Version(v) => Ok(v.clone()),
        Value::Str(s) => s.parse(),
        other => Err(RuntimeError::type_mismatch(format!(
            "{} expects a version string, got {}",
            function.name(),
            other.kind()
        ))),
    }
}
