use std::borrow::Cow;
use std::collections::HashMap;

use regex::Regex;
use sig_lang::Builtin;
use sig_lang::ast::{BinOp, Expr};

use super::context::RuleContext;
use super::value::{Value, values_equal};

/// Runtime failure while evaluating a compiled rule. The evaluator turns
/// every variant into a `false` result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown name `{0}`")]
    UnknownName(String),
    #[error("{target} has no attribute `{name}`")]
    UnknownAttribute { target: String, name: String },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid regex `{pattern}`: {message}")]
    BadRegex { pattern: String, message: String },
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
}

impl EvalError {
    /// Missing names and attributes are expected for sparse events.
    pub fn is_lookup(&self) -> bool {
        matches!(
            self,
            EvalError::UnknownName(_) | EvalError::UnknownAttribute { .. }
        )
    }
}

pub(crate) type EvalResult<T> = Result<T, EvalError>;

/// Tree-walking evaluator over one rule context.
pub(crate) struct Evaluator<'a> {
    pub ctx: &'a RuleContext,
    /// Patterns precompiled from string literals.
    pub regexes: &'a HashMap<String, Regex>,
}

impl Evaluator<'_> {
    pub fn eval(&self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::StringLit(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Name(name) => self
                .ctx
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownName(name.clone())),
            Expr::Attr { target, name } => {
                let base = self.eval(target)?;
                attribute(&base, target, name)
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(mismatch(format!("cannot negate {}", other.type_name()))),
            },
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.truthy())),
            Expr::BinOp { op, left, right } => self.eval_binop(*op, left, right),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let target = self.eval(expr)?;
                let mut found = false;
                for item in list {
                    if values_equal(&target, &self.eval(item)?) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Bool(found != *negated))
            }
            Expr::Member {
                expr,
                container,
                negated,
            } => {
                let needle = self.eval(expr)?;
                let haystack = self.eval(container)?;
                Ok(Value::Bool(contains(&haystack, &needle)? != *negated))
            }
            Expr::Call {
                receiver,
                name,
                args,
            } => {
                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(r) = receiver {
                    values.push(self.eval(r)?);
                }
                for a in args {
                    values.push(self.eval(a)?);
                }
                self.call(name, values)
            }
            _ => Err(mismatch("unsupported expression".to_string())),
        }
    }

    fn eval_binop(&self, op: BinOp, left: &Expr, right: &Expr) -> EvalResult<Value> {
        match op {
            BinOp::And => {
                let lv = self.eval(left)?;
                if !lv.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            BinOp::Or => {
                let lv = self.eval(left)?;
                if lv.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            _ if op.is_comparison() => {
                let lv = self.eval(left)?;
                let rv = self.eval(right)?;
                compare(op, &lv, &rv).map(Value::Bool)
            }
            _ => {
                let lv = self.eval(left)?;
                let rv = self.eval(right)?;
                arithmetic(op, lv, rv)
            }
        }
    }

    fn call(&self, name: &str, args: Vec<Value>) -> EvalResult<Value> {
        let builtin =
            Builtin::from_name(name).ok_or_else(|| EvalError::UnknownFunction(name.into()))?;
        if args.len() != builtin.arity() {
            return Err(mismatch(format!(
                "`{name}` takes {} argument(s), got {}",
                builtin.arity(),
                args.len()
            )));
        }
        let mut args = args.into_iter();
        let first = args.next().unwrap_or(Value::Bool(false));
        let second = args.next();

        match builtin {
            Builtin::Lower => Ok(Value::Str(as_str(&first, name)?.to_lowercase())),
            Builtin::Upper => Ok(Value::Str(as_str(&first, name)?.to_uppercase())),
            Builtin::Len => match &first {
                Value::Str(s) => Ok(Value::int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::int(items.len() as i64)),
                other => Err(mismatch(format!("len() of {}", other.type_name()))),
            },
            Builtin::StartsWith => {
                let prefix = second_str(&second, name)?;
                Ok(Value::Bool(as_str(&first, name)?.starts_with(prefix)))
            }
            Builtin::EndsWith => {
                let suffix = second_str(&second, name)?;
                Ok(Value::Bool(as_str(&first, name)?.ends_with(suffix)))
            }
            Builtin::Contains => {
                let needle = second.unwrap_or(Value::Bool(false));
                contains(&first, &needle).map(Value::Bool)
            }
            Builtin::Matches => {
                let pattern = second_str(&second, name)?;
                let hay = as_str(&first, name)?;
                let re = self.regex(pattern)?;
                Ok(Value::Bool(re.is_match(hay)))
            }
        }
    }

    fn regex(&self, pattern: &str) -> EvalResult<Cow<'_, Regex>> {
        if let Some(re) = self.regexes.get(pattern) {
            return Ok(Cow::Borrowed(re));
        }
        Regex::new(pattern)
            .map(Cow::Owned)
            .map_err(|e| EvalError::BadRegex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }
}

fn mismatch(msg: String) -> EvalError {
    EvalError::TypeMismatch(msg)
}

fn attribute(base: &Value, target: &Expr, name: &str) -> EvalResult<Value> {
    let describe = || target.dotted_path().unwrap_or_else(|| base.type_name().to_string());
    match base {
        Value::Object(fields) => fields
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownAttribute {
                target: describe(),
                name: name.to_string(),
            }),
        _ => Err(EvalError::UnknownAttribute {
            target: describe(),
            name: name.to_string(),
        }),
    }
}

fn as_str<'v>(v: &'v Value, func: &str) -> EvalResult<&'v str> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(mismatch(format!(
            "`{func}` expects a string, got {}",
            other.type_name()
        ))),
    }
}

fn second_str<'v>(v: &'v Option<Value>, func: &str) -> EvalResult<&'v str> {
    match v {
        Some(v) => as_str(v, func),
        None => Err(mismatch(format!("`{func}` is missing an argument"))),
    }
}

/// `needle in haystack`: list membership or substring test.
fn contains(haystack: &Value, needle: &Value) -> EvalResult<bool> {
    match (haystack, needle) {
        (Value::List(items), _) => Ok(items.iter().any(|i| values_equal(i, needle))),
        (Value::Str(h), Value::Str(n)) => Ok(h.contains(n.as_str())),
        (h, n) => Err(mismatch(format!(
            "cannot test {} in {}",
            n.type_name(),
            h.type_name()
        ))),
    }
}

fn compare(op: BinOp, lv: &Value, rv: &Value) -> EvalResult<bool> {
    match op {
        BinOp::Eq => return Ok(values_equal(lv, rv)),
        BinOp::Ne => return Ok(!values_equal(lv, rv)),
        _ => {}
    }
    let ord = match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => a
            .partial_cmp(b)
            .ok_or_else(|| mismatch("NaN comparison".to_string()))?,
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            return Err(mismatch(format!(
                "cannot order {} and {}",
                lv.type_name(),
                rv.type_name()
            )));
        }
    };
    Ok(match op {
        BinOp::Lt => ord.is_lt(),
        BinOp::Gt => ord.is_gt(),
        BinOp::Le => ord.is_le(),
        BinOp::Ge => ord.is_ge(),
        _ => false,
    })
}

fn arithmetic(op: BinOp, lv: Value, rv: Value) -> EvalResult<Value> {
    let (a, b) = match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => (a, b),
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => return Ok(Value::Str(a + &b)),
        (l, r) => {
            return Err(mismatch(format!(
                "unsupported operands for `{}`: {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            )));
        }
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            // Result takes the sign of the divisor.
            a - b * (a / b).floor()
        }
        _ => return Err(mismatch(format!("`{}` is not arithmetic", op.symbol()))),
    };
    Ok(Value::Number(result))
}
