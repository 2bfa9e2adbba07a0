mod cache;
mod compile;
mod context;
mod eval;
mod evaluator;
mod value;

pub use cache::{CachedRule, LruRuleCache, MapRuleCache, RuleCache};
pub use compile::{CompileError, CompiledRule, ExprCompiler, RuleCompiler};
pub use context::RuleContext;
pub use eval::EvalError;
pub use evaluator::RuleEvaluator;
pub use value::Value;

#[cfg(test)]
mod tests;
