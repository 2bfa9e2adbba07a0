use std::collections::HashMap;

use regex::Regex;
use sig_lang::ast::Expr;
use sig_lang::{Builtin, CheckError, check_rule, parse_rule};

use super::context::RuleContext;
use super::eval::{EvalError, Evaluator};

/// Why a rule source could not be compiled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Parse(String),
    #[error("{}", join_check_errors(.0))]
    Check(Vec<CheckError>),
    #[error("invalid regex `{pattern}`: {message}")]
    Regex { pattern: String, message: String },
    #[error("rule api version {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

fn join_check_errors(errors: &[CheckError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A parsed and checked rule, ready to evaluate against any context.
#[derive(Debug)]
pub struct CompiledRule {
    source: String,
    expr: Expr,
    regexes: HashMap<String, Regex>,
}

impl CompiledRule {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate and apply truthiness to the result.
    pub fn evaluate(&self, ctx: &RuleContext) -> Result<bool, EvalError> {
        let ev = Evaluator {
            ctx,
            regexes: &self.regexes,
        };
        ev.eval(&self.expr).map(|v| v.truthy())
    }
}

/// Turns rule source text into a [`CompiledRule`].
pub trait RuleCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<CompiledRule, CompileError>;
}

/// Compiler for the `sig_lang` expression language.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprCompiler;

impl RuleCompiler for ExprCompiler {
    fn compile(&self, source: &str) -> Result<CompiledRule, CompileError> {
        let expr = parse_rule(source).map_err(|e| CompileError::Parse(e.to_string()))?;
        let errors = check_rule(&expr);
        if !errors.is_empty() {
            return Err(CompileError::Check(errors));
        }
        let mut regexes = HashMap::new();
        collect_literal_patterns(&expr, &mut regexes)?;
        Ok(CompiledRule {
            source: source.to_string(),
            expr,
            regexes,
        })
    }
}

/// Precompile `matches` patterns given as string literals.
fn collect_literal_patterns(
    expr: &Expr,
    out: &mut HashMap<String, Regex>,
) -> Result<(), CompileError> {
    match expr {
        Expr::Call {
            receiver,
            name,
            args,
        } => {
            if Builtin::from_name(name) == Some(Builtin::Matches) {
                let pattern_arg = if receiver.is_some() {
                    args.first()
                } else {
                    args.get(1)
                };
                if let Some(Expr::StringLit(p)) = pattern_arg
                    && !out.contains_key(p)
                {
                    let re = Regex::new(p).map_err(|e| CompileError::Regex {
                        pattern: p.clone(),
                        message: e.to_string(),
                    })?;
                    out.insert(p.clone(), re);
                }
            }
            if let Some(r) = receiver {
                collect_literal_patterns(r, out)?;
            }
            for a in args {
                collect_literal_patterns(a, out)?;
            }
        }
        Expr::Attr { target, .. } => collect_literal_patterns(target, out)?,
        Expr::BinOp { left, right, .. } => {
            collect_literal_patterns(left, out)?;
            collect_literal_patterns(right, out)?;
        }
        Expr::Neg(inner) | Expr::Not(inner) => collect_literal_patterns(inner, out)?,
        Expr::InList { expr, list, .. } => {
            collect_literal_patterns(expr, out)?;
            for item in list {
                collect_literal_patterns(item, out)?;
            }
        }
        Expr::Member {
            expr, container, ..
        } => {
            collect_literal_patterns(expr, out)?;
            collect_literal_patterns(container, out)?;
        }
        _ => {}
    }
    Ok(())
}
