use crate::RULE_NAMESPACES;
use crate::ast::Expr;

// ---------------------------------------------------------------------------
// Builtins
// ---------------------------------------------------------------------------

/// Functions a rule may call, in function form `f(x, ...)` or method form
/// `x.f(...)`. In method form the receiver is the first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Lower,
    Upper,
    Len,
    StartsWith,
    EndsWith,
    Contains,
    Matches,
}

pub const BUILTINS: [Builtin; 7] = [
    Builtin::Lower,
    Builtin::Upper,
    Builtin::Len,
    Builtin::StartsWith,
    Builtin::EndsWith,
    Builtin::Contains,
    Builtin::Matches,
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Lower => "lower",
            Builtin::Upper => "upper",
            Builtin::Len => "len",
            Builtin::StartsWith => "startswith",
            Builtin::EndsWith => "endswith",
            Builtin::Contains => "contains",
            Builtin::Matches => "matches",
        }
    }

    /// Total argument count, receiver included.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Lower | Builtin::Upper | Builtin::Len => 1,
            Builtin::StartsWith | Builtin::EndsWith | Builtin::Contains | Builtin::Matches => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Static error found in a parsed rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckError {
    #[error("unknown name `{0}`, expected one of evt, dev, component, service")]
    UnknownName(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Check free names and builtin calls of a parsed rule.
/// Returns an empty Vec when the rule is well-formed.
pub fn check_rule(expr: &Expr) -> Vec<CheckError> {
    let mut errors = Vec::new();
    walk(expr, &mut errors);
    errors
}

fn walk(expr: &Expr, errors: &mut Vec<CheckError>) {
    match expr {
        Expr::Number(_) | Expr::StringLit(_) | Expr::Bool(_) => {}
        Expr::Name(name) => {
            if !RULE_NAMESPACES.contains(&name.as_str()) {
                errors.push(CheckError::UnknownName(name.clone()));
            }
        }
        Expr::Attr { target, .. } => walk(target, errors),
        Expr::BinOp { left, right, .. } => {
            walk(left, errors);
            walk(right, errors);
        }
        Expr::Neg(inner) | Expr::Not(inner) => walk(inner, errors),
        Expr::Call {
            receiver,
            name,
            args,
        } => {
            let got = args.len() + usize::from(receiver.is_some());
            match Builtin::from_name(name) {
                None => errors.push(CheckError::UnknownFunction(name.clone())),
                Some(b) if b.arity() != got => errors.push(CheckError::Arity {
                    name: name.clone(),
                    expected: b.arity(),
                    got,
                }),
                Some(_) => {}
            }
            if let Some(r) = receiver {
                walk(r, errors);
            }
            for a in args {
                walk(a, errors);
            }
        }
        Expr::InList { expr, list, .. } => {
            walk(expr, errors);
            for item in list {
                walk(item, errors);
            }
        }
        Expr::Member {
            expr, container, ..
        } => {
            walk(expr, errors);
            walk(container, errors);
        }
    }
}
