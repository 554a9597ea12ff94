use std::collections::HashMap;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::error::ExpressionError;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::parser::ALLOWED_ATTRIBUTES;

/// Evaluate a parsed expression against the three top-level bindings the
/// sandbox exposes (spec §4.2). `deadline` bounds the entire evaluation,
/// including comprehension and aggregator iteration — exceeding it aborts
/// with `ExpressionError::Timeout` rather than running unbounded work.
pub fn eval(expr: &Expr, body: &Value, headers: &Value, context: &Value, deadline: Instant) -> Result<Value, ExpressionError> {
    let mut locals: HashMap<String, Value> = HashMap::new();
    eval_inner(expr, body, headers, context, &mut locals, deadline)
}

fn check_deadline(deadline: Instant) -> Result<(), ExpressionError> {
    if Instant::now() > deadline {
        Err(ExpressionError::Timeout)
    } else {
        Ok(())
    }
}

fn eval_inner(
    expr: &Expr,
    body: &Value,
    headers: &Value,
    context: &Value,
    locals: &mut HashMap<String, Value>,
    deadline: Instant,
) -> Result<Value, ExpressionError> {
    check_deadline(deadline)?;
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => {
            if let Some(v) = locals.get(name) {
                return Ok(v.clone());
            }
            match name.as_str() {
                "body" => Ok(body.clone()),
                "headers" => Ok(headers.clone()),
                "context" => Ok(context.clone()),
                other => Err(ExpressionError::Evaluation(format!("unbound name: {other}"))),
            }
        }
        Expr::Attribute(target, attr) => {
            let value = eval_inner(target, body, headers, context, locals, deadline)?;
            eval_attribute(&value, attr)
        }
        Expr::Index(target, index) => {
            let value = eval_inner(target, body, headers, context, locals, deadline)?;
            let index = eval_inner(index, body, headers, context, locals, deadline)?;
            eval_index(&value, &index)
        }
        Expr::Unary(op, operand) => {
            let value = eval_inner(operand, body, headers, context, locals, deadline)?;
            eval_unary(*op, &value)
        }
        Expr::Binary(lhs, op, rhs) => {
            // `and`/`or` short-circuit: the right side must not be
            // evaluated (and therefore must not be deadline-checked) unless
            // required.
            match op {
                BinaryOp::And => {
                    let left = eval_inner(lhs, body, headers, context, locals, deadline)?;
                    if !truthy(&left) {
                        return Ok(left);
                    }
                    eval_inner(rhs, body, headers, context, locals, deadline)
                }
                BinaryOp::Or => {
                    let left = eval_inner(lhs, body, headers, context, locals, deadline)?;
                    if truthy(&left) {
                        return Ok(left);
                    }
                    eval_inner(rhs, body, headers, context, locals, deadline)
                }
                _ => {
                    let left = eval_inner(lhs, body, headers, context, locals, deadline)?;
                    let right = eval_inner(rhs, body, headers, context, locals, deadline)?;
                    eval_binary(*op, &left, &right)
                }
            }
        }
        Expr::Ternary {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = eval_inner(cond, body, headers, context, locals, deadline)?;
            if truthy(&cond) {
                eval_inner(then_branch, body, headers, context, locals, deadline)
            } else {
                eval_inner(else_branch, body, headers, context, locals, deadline)
            }
        }
        Expr::Call { callee, args } => eval_call(callee, args, body, headers, context, locals, deadline),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_inner(item, body, headers, context, locals, deadline)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Set(items) => {
            // JSON has no set type; a set literal evaluates to a
            // deduplicated array, preserving first-occurrence order.
            let mut values: Vec<Value> = Vec::new();
            for item in items {
                let value = eval_inner(item, body, headers, context, locals, deadline)?;
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            Ok(Value::Array(values))
        }
        Expr::Dict(entries) => {
            let mut map = Map::new();
            for (key_expr, value_expr) in entries {
                let key = eval_inner(key_expr, body, headers, context, locals, deadline)?;
                let value = eval_inner(value_expr, body, headers, context, locals, deadline)?;
                let key = match key {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        Expr::Comprehension {
            element,
            target,
            iter,
            condition,
        } => {
            let iterable = eval_inner(iter, body, headers, context, locals, deadline)?;
            let items = as_iterable(&iterable)?;
            let mut results = Vec::new();
            let previous = locals.remove(target);
            for item in items {
                check_deadline(deadline)?;
                locals.insert(target.clone(), item);
                let include = match condition {
                    Some(cond) => truthy(&eval_inner(cond, body, headers, context, locals, deadline)?),
                    None => true,
                };
                if include {
                    results.push(eval_inner(element, body, headers, context, locals, deadline)?);
                }
            }
            locals.remove(target);
            if let Some(previous) = previous {
                locals.insert(target.clone(), previous);
            }
            Ok(Value::Array(results))
        }
    }
}

fn eval_attribute(_value: &Value, attr: &str) -> Result<Value, ExpressionError> {
    // Every whitelisted attribute is a method (spec §4.2); bare attribute
    // access not immediately followed by a call is meaningless here. The
    // `Call` case in `eval_call` intercepts `Expr::Attribute` callees
    // before this is ever reached in that context.
    if !ALLOWED_ATTRIBUTES.contains(&attr) {
        return Err(ExpressionError::Security(format!("attribute not allowed: {attr}")));
    }
    Err(ExpressionError::Evaluation(format!("'{attr}' must be called, e.g. body.{attr}(...)")))
}

fn as_string(value: &Value) -> Result<String, ExpressionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(ExpressionError::Evaluation(format!("expected a string, found {other}"))),
    }
}

fn eval_call(
    callee: &Expr,
    args: &[Expr],
    body: &Value,
    headers: &Value,
    context: &Value,
    locals: &mut HashMap<String, Value>,
    deadline: Instant,
) -> Result<Value, ExpressionError> {
    let mut arg_values = Vec::with_capacity(args.len());
    for arg in args {
        arg_values.push(eval_inner(arg, body, headers, context, locals, deadline)?);
    }

    if let Expr::Attribute(receiver, method) = callee {
        let receiver = eval_inner(receiver, body, headers, context, locals, deadline)?;
        return eval_method(&receiver, method, &arg_values);
    }

    let Expr::Ident(name) = callee else {
        return Err(ExpressionError::Security("call target must be a bare function name or method".to_string()));
    };

    match name.as_str() {
        "len" => eval_len(&arg_values),
        "sum" => eval_sum(&arg_values, deadline),
        "min" => eval_minmax(&arg_values, true, deadline),
        "max" => eval_minmax(&arg_values, false, deadline),
        "any" => eval_any_all(&arg_values, true, deadline),
        "all" => eval_any_all(&arg_values, false, deadline),
        "range" => eval_range(&arg_values),
        other => Err(ExpressionError::Security(format!("function not allowed: {other}"))),
    }
}

fn eval_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    if !ALLOWED_ATTRIBUTES.contains(&method) {
        return Err(ExpressionError::Security(format!("attribute not allowed: {method}")));
    }
    match method {
        "startswith" => {
            let s = as_string(receiver)?;
            let prefix = args.first().map(as_string).transpose()?.unwrap_or_default();
            Ok(Value::Bool(s.starts_with(&prefix)))
        }
        "endswith" => {
            let s = as_string(receiver)?;
            let suffix = args.first().map(as_string).transpose()?.unwrap_or_default();
            Ok(Value::Bool(s.ends_with(&suffix)))
        }
        "lower" => Ok(Value::String(as_string(receiver)?.to_lowercase())),
        "upper" => Ok(Value::String(as_string(receiver)?.to_uppercase())),
        "strip" => Ok(Value::String(as_string(receiver)?.trim().to_string())),
        "split" => {
            let s = as_string(receiver)?;
            let sep = args.first().map(as_string).transpose()?;
            let parts: Vec<Value> = match sep {
                Some(sep) if !sep.is_empty() => s.split(&sep as &str).map(|p| Value::String(p.to_string())).collect(),
                _ => s.split_whitespace().map(|p| Value::String(p.to_string())).collect(),
            };
            Ok(Value::Array(parts))
        }
        "get" => {
            let map = receiver
                .as_object()
                .ok_or_else(|| ExpressionError::Evaluation("get() requires an object".to_string()))?;
            let key = args
                .first()
                .map(as_string)
                .transpose()?
                .ok_or_else(|| ExpressionError::Evaluation("get() requires a key argument".to_string()))?;
            Ok(map.get(&key).cloned().unwrap_or(args.get(1).cloned().unwrap_or(Value::Null)))
        }
        other => Err(ExpressionError::Security(format!("attribute not allowed: {other}"))),
    }
}

fn as_iterable(value: &Value) -> Result<Vec<Value>, ExpressionError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(map) => Ok(map.keys().map(|k| Value::String(k.clone())).collect()),
        other => Err(ExpressionError::Evaluation(format!("value is not iterable: {other}"))),
    }
}

fn as_number(value: &Value) -> Result<f64, ExpressionError> {
    value.as_f64().ok_or_else(|| ExpressionError::Evaluation(format!("expected a number, found {value}")))
}

fn eval_len(args: &[Value]) -> Result<Value, ExpressionError> {
    let value = args.first().ok_or_else(|| ExpressionError::Evaluation("len() requires one argument".to_string()))?;
    let count = match value {
        Value::Array(items) => items.len(),
        Value::String(s) => s.chars().count(),
        Value::Object(map) => map.len(),
        other => return Err(ExpressionError::Evaluation(format!("len() does not accept {other}"))),
    };
    Ok(Value::Number(count.into()))
}

fn eval_sum(args: &[Value], deadline: Instant) -> Result<Value, ExpressionError> {
    let items = args.first().map(as_iterable).transpose()?.unwrap_or_default();
    let mut total = 0.0;
    for item in &items {
        check_deadline(deadline)?;
        total += as_number(item)?;
    }
    to_json_number(total)
}

fn eval_minmax(args: &[Value], want_min: bool, deadline: Instant) -> Result<Value, ExpressionError> {
    let items = args.first().map(as_iterable).transpose()?.unwrap_or_default();
    let mut best: Option<f64> = None;
    for item in &items {
        check_deadline(deadline)?;
        let n = as_number(item)?;
        best = Some(match best {
            None => n,
            Some(current) if want_min => current.min(n),
            Some(current) => current.max(n),
        });
    }
    match best {
        Some(n) => to_json_number(n),
        None => Err(ExpressionError::Evaluation("min()/max() requires a non-empty iterable".to_string())),
    }
}

fn eval_any_all(args: &[Value], want_any: bool, deadline: Instant) -> Result<Value, ExpressionError> {
    let items = args.first().map(as_iterable).transpose()?.unwrap_or_default();
    for item in &items {
        check_deadline(deadline)?;
        let truth = truthy(item);
        if want_any && truth {
            return Ok(Value::Bool(true));
        }
        if !want_any && !truth {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(!want_any))
}

fn eval_range(args: &[Value]) -> Result<Value, ExpressionError> {
    let (start, stop, step) = match args.len() {
        1 => (0i64, as_number(&args[0])? as i64, 1i64),
        2 => (as_number(&args[0])? as i64, as_number(&args[1])? as i64, 1i64),
        3 => (as_number(&args[0])? as i64, as_number(&args[1])? as i64, as_number(&args[2])? as i64),
        _ => return Err(ExpressionError::Evaluation("range() takes 1 to 3 arguments".to_string())),
    };
    if step == 0 {
        return Err(ExpressionError::Evaluation("range() step must not be zero".to_string()));
    }
    let mut values = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        values.push(Value::Number(i.into()));
        i += step;
    }
    Ok(Value::Array(values))
}

fn to_json_number(n: f64) -> Result<Value, ExpressionError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::Evaluation("result is not a finite number".to_string()))
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn eval_unary(op: UnaryOp, value: &Value) -> Result<Value, ExpressionError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!truthy(value))),
        UnaryOp::Neg => to_json_number(-as_number(value)?),
        UnaryOp::Pos => to_json_number(as_number(value)?),
    }
}

fn eval_index(value: &Value, index: &Value) -> Result<Value, ExpressionError> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| ExpressionError::Evaluation("array index must be an integer".to_string()))?;
            let resolved = if i < 0 { items.len() as i64 + i } else { i };
            if resolved < 0 {
                return Err(ExpressionError::Evaluation("array index out of range".to_string()));
            }
            Ok(items.get(resolved as usize).cloned().unwrap_or(Value::Null))
        }
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => {
            let i = n.as_i64().ok_or_else(|| ExpressionError::Evaluation("string index must be an integer".to_string()))?;
            let chars: Vec<char> = s.chars().collect();
            let resolved = if i < 0 { chars.len() as i64 + i } else { i };
            if resolved < 0 {
                return Err(ExpressionError::Evaluation("string index out of range".to_string()));
            }
            Ok(chars.get(resolved as usize).map(|c| Value::String(c.to_string())).unwrap_or(Value::Null))
        }
        _ => Err(ExpressionError::Evaluation("value does not support indexing with the given key".to_string())),
    }
}

fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                let mut combined = a.clone();
                combined.extend(b.clone());
                Ok(Value::Array(combined))
            }
            _ => to_json_number(as_number(left)? + as_number(right)?),
        },
        BinaryOp::Sub => to_json_number(as_number(left)? - as_number(right)?),
        BinaryOp::Mul => to_json_number(as_number(left)? * as_number(right)?),
        BinaryOp::Div => {
            let rhs = as_number(right)?;
            if rhs == 0.0 {
                return Err(ExpressionError::Evaluation("division by zero".to_string()));
            }
            to_json_number(as_number(left)? / rhs)
        }
        BinaryOp::FloorDiv => {
            let rhs = as_number(right)?;
            if rhs == 0.0 {
                return Err(ExpressionError::Evaluation("division by zero".to_string()));
            }
            to_json_number((as_number(left)? / rhs).floor())
        }
        BinaryOp::Mod => {
            let rhs = as_number(right)?;
            if rhs == 0.0 {
                return Err(ExpressionError::Evaluation("modulo by zero".to_string()));
            }
            to_json_number(as_number(left)?.rem_euclid(rhs))
        }
        BinaryOp::Pow => to_json_number(as_number(left)?.powf(as_number(right)?)),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => Ok(Value::Bool(left != right)),
        BinaryOp::Lt => compare(left, right).map(|o| Value::Bool(o.is_lt())),
        BinaryOp::LtE => compare(left, right).map(|o| Value::Bool(o.is_le())),
        BinaryOp::Gt => compare(left, right).map(|o| Value::Bool(o.is_gt())),
        BinaryOp::GtE => compare(left, right).map(|o| Value::Bool(o.is_ge())),
        BinaryOp::In => Ok(Value::Bool(membership(right, left)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!membership(right, left)?)),
        BinaryOp::Is => Ok(Value::Bool(matches!((left, right), (Value::Null, Value::Null)))),
        BinaryOp::IsNot => Ok(Value::Bool(!matches!((left, right), (Value::Null, Value::Null)))),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit operators are handled in eval_inner"),
    }
}

fn compare(left: &Value, right: &Value) -> Result<std::cmp::Ordering, ExpressionError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => as_number(left)?
            .partial_cmp(&as_number(right)?)
            .ok_or_else(|| ExpressionError::Evaluation("values are not comparable".to_string())),
    }
}

fn membership(container: &Value, needle: &Value) -> Result<bool, ExpressionError> {
    match container {
        Value::Array(items) => Ok(items.contains(needle)),
        Value::String(s) => Ok(as_string(needle).map(|n| s.contains(&n)).unwrap_or(false)),
        Value::Object(map) => Ok(as_string(needle).map(|n| map.contains_key(&n)).unwrap_or(false)),
        other => Err(ExpressionError::Evaluation(format!("'in' not supported on {other}"))),
    }
}
