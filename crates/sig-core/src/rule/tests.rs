use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::model::{
    DETAIL_DEVICE_GROUPS, DETAIL_DEVICE_PRODUCTION_STATE, Event, EventActor, EventDetail,
    EventSeverity, EventStatus, EventSummary, ModelElementType, Rule,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct CountingCompiler {
    calls: AtomicUsize,
}

impl CountingCompiler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RuleCompiler for CountingCompiler {
    fn compile(&self, source: &str) -> Result<CompiledRule, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExprCompiler.compile(source)
    }
}

fn evaluator_with(compiler: Arc<CountingCompiler>) -> RuleEvaluator {
    RuleEvaluator::new(Arc::new(MapRuleCache::new()), compiler)
}

fn sample_summary() -> EventSummary {
    EventSummary {
        uuid: "evt-1".into(),
        occurrences: vec![Event {
            uuid: "occ-1".into(),
            summary: Some("Disk /var is 95% full".into()),
            message: Some("threshold exceeded".into()),
            event_class: Some("/Perf/Filesystem".into()),
            agent: Some("zenperfsnmp".into()),
            severity: EventSeverity::Critical,
            syslog_priority: Some(2),
            actor: Some(EventActor {
                element_type_id: Some(ModelElementType::Device),
                element_identifier: Some("web01.example.com".into()),
                element_uuid: Some("dev-uuid".into()),
                element_sub_type_id: Some(ModelElementType::Component),
                element_sub_identifier: Some("/var".into()),
                element_sub_uuid: Some("comp-uuid".into()),
            }),
            details: vec![
                EventDetail {
                    name: DETAIL_DEVICE_PRODUCTION_STATE.into(),
                    values: vec!["1000".into()],
                },
                EventDetail {
                    name: DETAIL_DEVICE_GROUPS.into(),
                    values: vec!["/Linux".into(), "/Web".into()],
                },
            ],
            created_time: 1_700_000_000_000,
            ..Default::default()
        }],
        status: EventStatus::New,
        count: 4,
        current_user_name: None,
        cleared_by_event_uuid: None,
    }
}

fn eval(src: &str) -> bool {
    let ev = RuleEvaluator::with_capacity(16);
    ev.evaluate(src, &RuleContext::build(&sample_summary()))
}

// ---------------------------------------------------------------------------
// Cache behaviour
// ---------------------------------------------------------------------------

#[test]
fn invalid_rule_is_false_and_not_recompiled() {
    let compiler = CountingCompiler::new();
    let ev = evaluator_with(Arc::clone(&compiler));
    let ctx = RuleContext::build(&sample_summary());

    assert!(!ev.evaluate("evt.severity ==", &ctx));
    assert_eq!(compiler.calls(), 1);
    assert!(!ev.evaluate("evt.severity ==", &ctx));
    assert_eq!(compiler.calls(), 1);
    assert!(matches!(
        ev.cache().get("evt.severity =="),
        Some(CachedRule::Invalid)
    ));
}

#[test]
fn valid_rule_compiled_once() {
    let compiler = CountingCompiler::new();
    let ev = evaluator_with(Arc::clone(&compiler));
    let ctx = RuleContext::build(&sample_summary());

    for _ in 0..5 {
        assert!(ev.evaluate("evt.severity == 'critical'", &ctx));
    }
    assert_eq!(compiler.calls(), 1);
    assert_eq!(ev.cache().len(), 1);
}

#[test]
fn unknown_namespace_is_invalid() {
    let compiler = CountingCompiler::new();
    let ev = evaluator_with(Arc::clone(&compiler));
    let ctx = RuleContext::build(&sample_summary());
    assert!(!ev.evaluate("elem.name == 'web01'", &ctx));
    assert!(matches!(ev.cache().get("elem.name == 'web01'"), Some(CachedRule::Invalid)));
}

#[test]
fn bad_literal_regex_is_compile_error() {
    let err = ExprCompiler.compile("evt.summary.matches('(')").unwrap_err();
    assert!(matches!(err, CompileError::Regex { .. }));
}

#[test]
fn lru_capacity_bounds_cache() {
    let ev = RuleEvaluator::with_capacity(2);
    let ctx = RuleContext::build(&sample_summary());
    ev.evaluate("evt.count > 1", &ctx);
    ev.evaluate("evt.count > 2", &ctx);
    ev.evaluate("evt.count > 3", &ctx);
    assert_eq!(ev.cache().len(), 2);
}

#[test]
fn deeply_nested_rule_is_invalid_not_fatal() {
    let compiler = CountingCompiler::new();
    let ev = evaluator_with(Arc::clone(&compiler));
    let ctx = RuleContext::build(&sample_summary());

    let nested = format!("{}true{}", "(".repeat(3_000), ")".repeat(3_000));
    assert!(!ev.evaluate(&nested, &ctx));
    assert!(!ev.evaluate(&nested, &ctx));
    assert_eq!(compiler.calls(), 1);
    assert!(matches!(ev.cache().get(&nested), Some(CachedRule::Invalid)));

    let chain = format!("{}True", "True and ".repeat(1_000));
    assert!(!ev.evaluate(&chain, &ctx));
    assert!(ev.evaluate("((evt.count > 1))", &ctx));
}

#[test]
fn rule_from_other_api_version_is_invalid() {
    let compiler = CountingCompiler::new();
    let ev = evaluator_with(Arc::clone(&compiler));
    let ctx = RuleContext::build(&sample_summary());
    let current = Rule {
        api_version: sig_lang::RULE_API_VERSION,
        source: "evt.severity == 'critical'".into(),
    };
    let newer = Rule {
        api_version: sig_lang::RULE_API_VERSION + 1,
        ..current.clone()
    };

    assert!(!ev.evaluate_rule(&newer, &ctx));
    assert!(!ev.evaluate_rule(&newer, &ctx));
    assert_eq!(compiler.calls(), 0);
    assert!(ev.evaluate_rule(&current, &ctx));
    assert_eq!(compiler.calls(), 1);
    // one entry per version of the same text
    assert_eq!(ev.cache().len(), 2);
}

#[test]
fn concurrent_first_use_of_a_rule() {
    let compiler = CountingCompiler::new();
    let ev = RuleEvaluator::new(Arc::new(LruRuleCache::new(8)), compiler.clone());
    let ctx = RuleContext::build(&sample_summary());
    let threads = 8;

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..50 {
                    assert!(ev.evaluate("evt.severity == 'critical' and evt.count > 1", &ctx));
                }
            });
        }
    });

    let compiles = compiler.calls();
    assert!((1..=threads).contains(&compiles), "{compiles} compiles");
    assert_eq!(ev.cache().len(), 1);
    assert!(ev.evaluate("evt.severity == 'critical' and evt.count > 1", &ctx));
    assert_eq!(compiler.calls(), compiles);
}

// ---------------------------------------------------------------------------
// Evaluation errors degrade to false
// ---------------------------------------------------------------------------

#[test]
fn unknown_attribute_is_false() {
    assert!(!eval("evt.no_such_field == 'x'"));
    assert!(!eval("not evt.no_such_field"));
}

#[test]
fn type_errors_are_false() {
    assert!(!eval("evt.summary > 3"));
    assert!(!eval("-evt.summary"));
    assert!(!eval("evt.count + 'x' == 'x'"));
}

#[test]
fn division_by_zero_is_false() {
    assert!(!eval("evt.count / 0 > 1"));
    assert!(!eval("evt.count % 0 == 0"));
}

#[test]
fn dynamic_bad_regex_is_false() {
    assert!(!eval("evt.summary.matches(evt.summary + '(')"));
}

#[test]
fn eval_error_classification() {
    let rule = ExprCompiler.compile("evt.nope").unwrap();
    let err = rule
        .evaluate(&RuleContext::build(&sample_summary()))
        .unwrap_err();
    assert!(err.is_lookup());
    assert!(!EvalError::DivisionByZero.is_lookup());
}

// ---------------------------------------------------------------------------
// Language semantics
// ---------------------------------------------------------------------------

#[test]
fn comparisons_and_boolean_operators() {
    assert!(eval("evt.severity == 'critical' and evt.count >= 4"));
    assert!(eval("evt.count < 2 or evt.agent == 'zenperfsnmp'"));
    assert!(eval("not evt.count < 2"));
    assert!(eval("evt.agent != 'zenping' && !False"));
    assert!(!eval("evt.count == 4 and evt.severity == 'clear'"));
}

#[test]
fn short_circuit_skips_failing_branch() {
    assert!(eval("evt.count > 0 or evt.no_such_field"));
    assert!(!eval("evt.count < 0 and evt.no_such_field"));
}

#[test]
fn truthiness_of_bare_values() {
    assert!(eval("evt.summary"));
    assert!(!eval("evt.monitor"));
    assert!(eval("dev.groups"));
    assert!(!eval("dev.systems"));
    assert!(!eval("evt.nt_event_code"));
}

#[test]
fn membership_tests() {
    assert!(eval("evt.severity in ('error', 'critical')"));
    assert!(eval("evt.severity not in ['info', 'debug']"));
    assert!(eval("'/Linux' in dev.groups"));
    assert!(!eval("'/Windows' in dev.groups"));
    assert!(eval("'95%' in evt.summary"));
    assert!(eval("'/Windows' not in dev.groups"));
    assert!(eval("dev.production_state in (1000, 500)"));
}

#[test]
fn builtin_string_functions() {
    assert!(eval("evt.summary.startswith('Disk')"));
    assert!(eval("startswith(evt.summary, 'Disk')"));
    assert!(eval("evt.summary.lower().endswith('full')"));
    assert!(eval("upper(evt.agent) == 'ZENPERFSNMP'"));
    assert!(eval("contains(evt.message, 'exceeded')"));
    assert!(eval("dev.groups.contains('/Web')"));
    assert!(eval("len(dev.groups) == 2"));
    assert!(eval("len(evt.agent) == 11"));
    assert!(eval("evt.summary.matches('^Disk /\\\\w+')"));
}

#[test]
fn arithmetic_and_concatenation() {
    assert!(eval("evt.count * 2 + 1 == 9"));
    assert!(eval("evt.count % 3 == 1"));
    assert!(eval("-1 % 3 == 2"));
    assert!(eval("evt.agent + '/' + dev.name == 'zenperfsnmp/web01.example.com'"));
}

#[test]
fn identity_namespaces() {
    assert!(eval("dev.name == 'web01.example.com' and component.name == '/var'"));
    assert!(eval("service.name == ''"));
    assert!(eval("dev.production_state >= 1000"));
}

#[test]
fn mixed_type_equality_is_false_not_error() {
    assert!(!eval("evt.count == '4'"));
    assert!(eval("evt.count != '4'"));
}
