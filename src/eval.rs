//! Reference evaluation of template expressions over JSON rendering contexts.

use serde_json::{Map, Value};

use crate::error::EvalError;
use crate::expression::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::helpers::{is_truthy, number_value, to_js_string, to_number};

/// Rendering context plus the loop locals currently in scope.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    context: &'a Value,
    locals: Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a Value) -> Self {
        Self {
            context,
            locals: Vec::new(),
        }
    }

    pub fn context(&self) -> &'a Value {
        self.context
    }

    pub fn with_locals(&self, locals: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut scope = self.clone();
        scope.locals.extend(locals);
        scope
    }

    pub fn lookup(&self, name: &str) -> Value {
        if let Some((_, v)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return v.clone();
        }
        match name {
            "undefined" => Value::Null,
            "NaN" => number_value(f64::NAN),
            "Infinity" => number_value(f64::INFINITY),
            _ => self.context.get(name).cloned().unwrap_or(Value::Null),
        }
    }
}

pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(number_value(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Template {
            quasis,
            expressions,
        } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(e) = expressions.get(i) {
                    out.push_str(&to_js_string(&evaluate(e, scope)?));
                }
            }
            Ok(Value::String(out))
        }
        Expr::Ident(name) => Ok(scope.lookup(name)),
        Expr::Member { object, property } => {
            let object = evaluate(object, scope)?;
            let property = evaluate(property, scope)?;
            member(&object, &property)
        }
        Expr::Unary { op, argument } => {
            let value = evaluate(argument, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                UnaryOp::Neg => Ok(number_value(-to_number(&value))),
                UnaryOp::Plus => Ok(number_value(to_number(&value))),
                UnaryOp::TypeOf => Ok(Value::String(type_of(&value).to_string())),
                UnaryOp::Void => Ok(Value::Null),
                UnaryOp::Other(op) => Err(EvalError::Unsupported(format!("operator `{}`", op))),
            }
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            binary(*op, &left, &right)
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate(left, scope)?;
            let short_circuits = match op {
                LogicalOp::And => !is_truthy(&left),
                LogicalOp::Or => is_truthy(&left),
                LogicalOp::Coalesce => !left.is_null(),
            };
            if short_circuits {
                Ok(left)
            } else {
                evaluate(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if is_truthy(&evaluate(test, scope)?) {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Array(items) => items
            .iter()
            .map(|e| evaluate(e, scope))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(props) => {
            let mut map = Map::new();
            for (key, e) in props {
                map.insert(key.clone(), evaluate(e, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Sequence(items) => {
            let mut last = Value::Null;
            for e in items {
                last = evaluate(e, scope)?;
            }
            Ok(last)
        }
        Expr::Call { .. } => Err(EvalError::Unsupported("function call".to_string())),
        Expr::Arrow { .. } => Err(EvalError::Unsupported("arrow function".to_string())),
        Expr::Assign { .. } => Err(EvalError::Unsupported("assignment".to_string())),
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    }
}

fn member(object: &Value, property: &Value) -> Result<Value, EvalError> {
    let key = to_js_string(property);
    match object {
        Value::Null => Err(EvalError::TypeError(format!(
            "cannot read property `{}` of null",
            key
        ))),
        Value::Array(items) => {
            if key == "length" {
                return Ok(Value::from(items.len()));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null))
        }
        Value::String(s) => {
            if key == "length" {
                return Ok(Value::from(s.encode_utf16().count()));
            }
            Ok(key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null))
        }
        Value::Object(map) => Ok(map.get(&key).cloned().unwrap_or(Value::Null)),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Null),
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => false,
        _ => left == right,
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(_) | Value::Number(_), _) | (_, Value::Bool(_) | Value::Number(_)) => {
            to_number(left) == to_number(right)
        }
        _ => strict_equals(left, right),
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use std::cmp::Ordering;
    let result = match op {
        BinaryOp::Add => {
            let stringy =
                |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
            if stringy(left) || stringy(right) {
                Value::String(format!("{}{}", to_js_string(left), to_js_string(right)))
            } else {
                number_value(to_number(left) + to_number(right))
            }
        }
        BinaryOp::Sub => number_value(to_number(left) - to_number(right)),
        BinaryOp::Mul => number_value(to_number(left) * to_number(right)),
        BinaryOp::Div => number_value(to_number(left) / to_number(right)),
        BinaryOp::Rem => number_value(to_number(left) % to_number(right)),
        BinaryOp::Pow => number_value(to_number(left).powf(to_number(right))),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_equals(left, right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Other(op) => {
            return Err(EvalError::Unsupported(format!("operator `{}`", op)));
        }
    };
    Ok(result)
}
