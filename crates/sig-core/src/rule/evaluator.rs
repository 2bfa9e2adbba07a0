use std::sync::Arc;

use sig_lang::RULE_API_VERSION;

use super::cache::{CachedRule, LruRuleCache, RuleCache};
use super::compile::{CompileError, CompiledRule, ExprCompiler, RuleCompiler};
use super::context::RuleContext;
use crate::model::Rule;

/// Compiles, caches and evaluates trigger rules.
///
/// Evaluation never fails: rules that do not compile, and rules that raise
/// an error against a particular event, evaluate to `false`.
pub struct RuleEvaluator {
    cache: Arc<dyn RuleCache>,
    compiler: Arc<dyn RuleCompiler>,
}

impl RuleEvaluator {
    pub fn new(cache: Arc<dyn RuleCache>, compiler: Arc<dyn RuleCompiler>) -> Self {
        Self { cache, compiler }
    }

    /// Production setup: LRU cache of `capacity` rules over [`ExprCompiler`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(
            Arc::new(LruRuleCache::new(capacity)),
            Arc::new(ExprCompiler),
        )
    }

    pub fn cache(&self) -> &dyn RuleCache {
        self.cache.as_ref()
    }

    /// Cached compile. `None` means the source is invalid.
    pub fn compiled(&self, source: &str) -> Option<Arc<CompiledRule>> {
        if let Some(cached) = self.cache.get(source) {
            return match cached {
                CachedRule::Compiled(rule) => Some(rule),
                CachedRule::Invalid => None,
            };
        }

        // Compile outside any cache lock; a concurrent compile of the same
        // source just overwrites an equivalent entry.
        match self.compiler.compile(source) {
            Ok(rule) => {
                let rule = Arc::new(rule);
                self.cache
                    .insert(source.to_string(), CachedRule::Compiled(Arc::clone(&rule)));
                sig_debug!(conf, rule = source, "rule compiled");
                Some(rule)
            }
            Err(e) => {
                sig_warn!(conf, rule = source, error = %e, "invalid trigger rule");
                self.cache.insert(source.to_string(), CachedRule::Invalid);
                None
            }
        }
    }

    /// Evaluate a trigger's rule. A rule written for another language
    /// revision is invalid and evaluates to `false`.
    pub fn evaluate_rule(&self, rule: &Rule, ctx: &RuleContext) -> bool {
        if rule.api_version == RULE_API_VERSION {
            return self.evaluate(&rule.source, ctx);
        }
        let key = format!("v{}:{}", rule.api_version, rule.source);
        if self.cache.get(&key).is_none() {
            let e = CompileError::UnsupportedVersion {
                found: rule.api_version,
                supported: RULE_API_VERSION,
            };
            sig_warn!(conf, rule = %rule.source, error = %e, "invalid trigger rule");
            self.cache.insert(key, CachedRule::Invalid);
        }
        false
    }

    pub fn evaluate(&self, source: &str, ctx: &RuleContext) -> bool {
        let Some(rule) = self.compiled(source) else {
            return false;
        };
        match rule.evaluate(ctx) {
            Ok(matched) => matched,
            Err(e) if e.is_lookup() => {
                sig_debug!(pipe, rule = source, error = %e, "rule lookup failed");
                false
            }
            Err(e) => {
                sig_warn!(pipe, rule = source, error = %e, "rule evaluation failed");
                false
            }
        }
    }
}
