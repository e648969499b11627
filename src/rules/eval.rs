//! Rule interpreter.
//!
//! A rule is a JSON value. Objects with exactly one key are operations
//! (`{"operator": [args...]}`); arrays evaluate element-wise; everything else
//! is a literal.

use serde_json::Value;

use crate::error::RuleError;

use super::coerce::{compare, is_truthy, loose_eq, number, strict_eq, to_number, to_text};
use super::VariableSource;

/// Nesting limit for a single rule.
pub const MAX_RULE_DEPTH: usize = 64;

/// Evaluate `rule` against `vars`.
pub fn evaluate(rule: &Value, vars: &dyn VariableSource) -> Result<Value, RuleError> {
    Evaluator { vars }.eval(rule, 0)
}

struct Evaluator<'a> {
    vars: &'a dyn VariableSource,
}

fn invalid(operator: &str, reason: impl Into<String>) -> RuleError {
    RuleError::InvalidArgument {
        operator: operator.to_string(),
        reason: reason.into(),
    }
}

impl Evaluator<'_> {
    fn eval(&self, rule: &Value, depth: usize) -> Result<Value, RuleError> {
        if depth > MAX_RULE_DEPTH {
            return Err(RuleError::MalformedOperation {
                reason: format!("rule nesting exceeds {MAX_RULE_DEPTH} levels"),
            });
        }

        match rule {
            Value::Object(map) if map.len() == 1 => {
                let Some((operator, args)) = map.iter().next() else {
                    return Ok(Value::Null);
                };
                let args = match args {
                    Value::Array(items) => items.as_slice(),
                    single => std::slice::from_ref(single),
                };
                self.apply(operator, args, depth + 1)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.eval(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            literal => Ok(literal.clone()),
        }
    }

    fn eval_all(&self, args: &[Value], depth: usize) -> Result<Vec<Value>, RuleError> {
        args.iter().map(|arg| self.eval(arg, depth)).collect()
    }

    fn eval_arg(&self, args: &[Value], index: usize, depth: usize) -> Result<Value, RuleError> {
        args.get(index).map_or(Ok(Value::Null), |arg| self.eval(arg, depth))
    }

    fn apply(&self, operator: &str, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        match operator {
            "var" => self.var(args, depth),
            "missing" => self.missing(args, depth),
            "if" | "?:" => self.conditional(args, depth),
            "and" => self.and(args, depth),
            "or" => self.or(args, depth),
            "!" => Ok(Value::Bool(!is_truthy(&self.eval_arg(args, 0, depth)?))),
            "!!" => Ok(Value::Bool(is_truthy(&self.eval_arg(args, 0, depth)?))),
            "==" | "!=" | "===" | "!==" => {
                let a = self.eval_arg(args, 0, depth)?;
                let b = self.eval_arg(args, 1, depth)?;
                let equal = match operator {
                    "==" | "!=" => loose_eq(&a, &b),
                    _ => strict_eq(&a, &b),
                };
                Ok(Value::Bool(if operator.starts_with('!') { !equal } else { equal }))
            }
            "<" | "<=" | ">" | ">=" => self.ordering(operator, args, depth),
            "+" | "*" | "-" | "/" | "%" | "min" | "max" => self.arithmetic(operator, args, depth),
            "cat" => {
                let values = self.eval_all(args, depth)?;
                Ok(Value::String(values.iter().map(to_text).collect()))
            }
            "in" => {
                let needle = self.eval_arg(args, 0, depth)?;
                let haystack = self.eval_arg(args, 1, depth)?;
                let found = match &haystack {
                    Value::String(s) => s.contains(to_text(&needle).as_str()),
                    Value::Array(items) => items.iter().any(|item| strict_eq(item, &needle)),
                    _ => false,
                };
                Ok(Value::Bool(found))
            }
            other => Err(RuleError::UnknownOperator {
                operator: other.to_string(),
            }),
        }
    }

    fn var(&self, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let path = self.eval_arg(args, 0, depth)?;
        let key = match &path {
            Value::String(s) => s.clone(),
            Value::Number(_) => to_text(&path),
            Value::Null => return Ok(Value::Null),
            other => return Err(invalid("var", format!("variable name must be a string, got {other}"))),
        };

        match lookup(self.vars, &key) {
            Some(value) if !value.is_null() => Ok(value),
            _ => self.eval_arg(args, 1, depth),
        }
    }

    fn missing(&self, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let evaluated = self.eval_all(args, depth)?;
        let keys: Vec<Value> = match evaluated.as_slice() {
            [Value::Array(keys)] => keys.clone(),
            _ => evaluated,
        };
        let absent = keys
            .into_iter()
            .filter(|key| {
                let name = to_text(key);
                match lookup(self.vars, &name) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                }
            })
            .collect();
        Ok(Value::Array(absent))
    }

    fn conditional(&self, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let mut i = 0;
        while i + 1 < args.len() {
            if is_truthy(&self.eval(&args[i], depth)?) {
                return self.eval(&args[i + 1], depth);
            }
            i += 2;
        }
        if i < args.len() {
            return self.eval(&args[i], depth);
        }
        Ok(Value::Null)
    }

    fn and(&self, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let mut last = Value::Null;
        for arg in args {
            last = self.eval(arg, depth)?;
            if !is_truthy(&last) {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn or(&self, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let mut last = Value::Null;
        for arg in args {
            last = self.eval(arg, depth)?;
            if is_truthy(&last) {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn ordering(&self, operator: &str, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        use std::cmp::Ordering;

        if args.len() < 2 {
            return Err(invalid(operator, "expects at least two arguments"));
        }
        let holds = |a: &Value, b: &Value| -> bool {
            match compare(a, b) {
                None => false,
                Some(order) => match operator {
                    "<" => order == Ordering::Less,
                    "<=" => order != Ordering::Greater,
                    ">" => order == Ordering::Greater,
                    _ => order != Ordering::Less,
                },
            }
        };

        let a = self.eval(&args[0], depth)?;
        let b = self.eval(&args[1], depth)?;
        // Three-argument `<`/`<=` is a range check: a < b < c.
        if args.len() >= 3 && matches!(operator, "<" | "<=") {
            let c = self.eval(&args[2], depth)?;
            return Ok(Value::Bool(holds(&a, &b) && holds(&b, &c)));
        }
        Ok(Value::Bool(holds(&a, &b)))
    }

    fn arithmetic(&self, operator: &str, args: &[Value], depth: usize) -> Result<Value, RuleError> {
        let values: Vec<f64> = self.eval_all(args, depth)?.iter().map(to_number).collect();
        let result = match (operator, values.as_slice()) {
            ("+", vs) => vs.iter().sum(),
            ("*", []) => return Err(invalid("*", "expects at least one argument")),
            ("*", vs) => vs.iter().product(),
            ("-", [a]) => -a,
            ("-", [a, b]) => a - b,
            ("/", [a, b]) => a / b,
            ("%", [a, b]) => a % b,
            ("min" | "max", []) => return Ok(Value::Null),
            ("min", vs) => vs.iter().copied().fold(f64::INFINITY, f64::min),
            ("max", vs) => vs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            (op, vs) => {
                return Err(invalid(op, format!("unsupported argument count {}", vs.len())));
            }
        };
        Ok(number(result))
    }
}

/// Resolve a variable: the flat key first, then a dotted path into map or
/// list values.
fn lookup(vars: &dyn VariableSource, key: &str) -> Option<Value> {
    if let Some(value) = vars.resolve(key) {
        return Some(value);
    }
    let mut segments = key.split('.');
    let head = segments.next()?;
    if head.len() == key.len() {
        return None;
    }
    let mut current = vars.resolve(head)?;
    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(current)
}
