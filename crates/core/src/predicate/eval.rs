//! Tree-walking evaluator for parsed predicates.
//!
//! Each node evaluates to a `serde_json::Value`. The only names in scope are
//! the caller's bindings and names assigned earlier in the same program.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use super::parser::{CompareOp, Expr, Program, Stmt};
use super::PredicateError;
use crate::Fields;

/// Evaluation scope: caller bindings plus local assignments.
struct Scope<'a> {
    bindings: &'a Fields,
    locals: BTreeMap<String, Value>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.bindings.get(name))
    }
}

/// Run `program` against `bindings` and return the value of its last
/// statement, or `null` for an empty program.
pub fn eval_program(program: &Program, bindings: &Fields) -> Result<Value, PredicateError> {
    let mut scope = Scope {
        bindings,
        locals: BTreeMap::new(),
    };
    let mut last = Value::Null;
    for stmt in &program.statements {
        last = match stmt {
            Stmt::Assign { name, value } => {
                let v = eval_expr(value, &scope)?;
                scope.locals.insert(name.clone(), v.clone());
                v
            }
            Stmt::Expr(expr) => eval_expr(expr, &scope)?,
        };
    }
    Ok(last)
}

/// Dynamic-language truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "record",
    }
}

fn eval_expr(expr: &Expr, scope: &Scope<'_>) -> Result<Value, PredicateError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::Name { name, line } => {
            scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| PredicateError::UnknownName {
                    name: name.clone(),
                    line: *line,
                })
        }

        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| eval_expr(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }

        Expr::Attr {
            target,
            field,
            line,
        } => {
            let target_val = eval_expr(target, scope)?;
            match target_val {
                Value::Object(mut map) => map.remove(field).ok_or_else(|| {
                    PredicateError::type_error(*line, format!("record has no field '{}'", field))
                }),
                other => Err(PredicateError::type_error(
                    *line,
                    format!("cannot read field '{}' of {}", field, type_name(&other)),
                )),
            }
        }

        Expr::Index {
            target,
            index,
            line,
        } => {
            let target_val = eval_expr(target, scope)?;
            let index_val = eval_expr(index, scope)?;
            eval_index(target_val, &index_val, *line)
        }

        Expr::Not(operand) => {
            let v = eval_expr(operand, scope)?;
            Ok(Value::Bool(!is_truthy(&v)))
        }

        // `and`/`or` short-circuit and yield the deciding operand.
        Expr::And(left, right) => {
            let left_val = eval_expr(left, scope)?;
            if !is_truthy(&left_val) {
                return Ok(left_val);
            }
            eval_expr(right, scope)
        }

        Expr::Or(left, right) => {
            let left_val = eval_expr(left, scope)?;
            if is_truthy(&left_val) {
                return Ok(left_val);
            }
            eval_expr(right, scope)
        }

        Expr::Compare {
            op,
            left,
            right,
            line,
        } => {
            let left_val = eval_expr(left, scope)?;
            let right_val = eval_expr(right, scope)?;
            compare(*op, &left_val, &right_val, *line).map(Value::Bool)
        }
    }
}

fn eval_index(target: Value, index: &Value, line: u32) -> Result<Value, PredicateError> {
    match (target, index) {
        (Value::Array(mut items), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| {
                PredicateError::type_error(line, "list index must be an integer")
            })?;
            let len = items.len() as i64;
            let resolved = if i < 0 { len + i } else { i };
            if resolved < 0 || resolved >= len {
                return Err(PredicateError::type_error(
                    line,
                    format!("list index {} out of range for length {}", i, len),
                ));
            }
            Ok(items.swap_remove(resolved as usize))
        }
        (Value::Object(mut map), Value::String(key)) => map.remove(key).ok_or_else(|| {
            PredicateError::type_error(line, format!("record has no field '{}'", key))
        }),
        (target, index) => Err(PredicateError::type_error(
            line,
            format!(
                "cannot index {} with {}",
                type_name(&target),
                type_name(index)
            ),
        )),
    }
}

/// Equality with numeric widening; booleans never equal numbers.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value, op: CompareOp, line: u32) -> Result<Ordering, PredicateError> {
    let ord = match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ord.ok_or_else(|| {
        PredicateError::type_error(
            line,
            format!(
                "'{}' not supported between {} and {}",
                op.symbol(),
                type_name(left),
                type_name(right)
            ),
        )
    })
}

fn contains(container: &Value, item: &Value, line: u32) -> Result<bool, PredicateError> {
    match (container, item) {
        (Value::Array(items), _) => Ok(items.iter().any(|x| values_equal(x, item))),
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(PredicateError::type_error(
            line,
            format!(
                "'in' not supported between {} and {}",
                type_name(item),
                type_name(container)
            ),
        )),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value, line: u32) -> Result<bool, PredicateError> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::Neq => Ok(!values_equal(left, right)),
        CompareOp::Lt => Ok(ordering(left, right, op, line)? == Ordering::Less),
        CompareOp::Lte => Ok(ordering(left, right, op, line)? != Ordering::Greater),
        CompareOp::Gt => Ok(ordering(left, right, op, line)? == Ordering::Greater),
        CompareOp::Gte => Ok(ordering(left, right, op, line)? != Ordering::Less),
        CompareOp::In => contains(right, left, line),
        CompareOp::NotIn => contains(right, left, line).map(|found| !found),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
