use super::expr::MAX_NESTING;
use super::{MAX_EXPR_DEPTH, parse_rule};
use crate::ast::*;

fn attr(root: &str, name: &str) -> Expr {
    Expr::Attr {
        target: Box::new(Expr::Name(root.into())),
        name: name.into(),
    }
}

fn s(v: &str) -> Expr {
    Expr::StringLit(v.into())
}

// -----------------------------------------------------------------------
// Literals and names
// -----------------------------------------------------------------------

#[test]
fn parse_bool_literals() {
    assert_eq!(parse_rule("True").unwrap(), Expr::Bool(true));
    assert_eq!(parse_rule("false").unwrap(), Expr::Bool(false));
}

#[test]
fn parse_attribute_chain() {
    let expr = parse_rule("evt.summary").unwrap();
    assert_eq!(expr, attr("evt", "summary"));
    assert_eq!(expr.dotted_path().as_deref(), Some("evt.summary"));
    assert_eq!(expr.root_name(), Some("evt"));
}

#[test]
fn parse_surrounding_whitespace_and_comments() {
    let expr = parse_rule("  # only critical\n  evt.severity == 'critical'  \n").unwrap();
    assert!(matches!(expr, Expr::BinOp { op: BinOp::Eq, .. }));
}

// -----------------------------------------------------------------------
// Comparisons and boolean operators
// -----------------------------------------------------------------------

#[test]
fn parse_comparison() {
    let expr = parse_rule("evt.count >= 3").unwrap();
    assert_eq!(
        expr,
        Expr::BinOp {
            op: BinOp::Ge,
            left: Box::new(attr("evt", "count")),
            right: Box::new(Expr::Number(3.0)),
        }
    );
}

#[test]
fn parse_and_binds_tighter_than_or() {
    let expr = parse_rule("evt.agent == 'a' or evt.agent == 'b' and evt.count > 1").unwrap();
    match expr {
        Expr::BinOp {
            op: BinOp::Or,
            right,
            ..
        } => assert!(matches!(*right, Expr::BinOp { op: BinOp::And, .. })),
        other => panic!("expected Or at top, got {other:?}"),
    }
}

#[test]
fn parse_symbolic_boolean_operators() {
    let word = parse_rule("not evt.monitor == 'x' and True").unwrap();
    let sym = parse_rule("!evt.monitor == 'x' && True").unwrap();
    assert_eq!(word, sym);
}

#[test]
fn parse_bang_equals_is_not_negation() {
    let expr = parse_rule("evt.agent != 'zenping'").unwrap();
    assert!(matches!(expr, Expr::BinOp { op: BinOp::Ne, .. }));
}

#[test]
fn parse_arithmetic_precedence() {
    let expr = parse_rule("evt.count * 2 + 1 > 5").unwrap();
    let Expr::BinOp {
        op: BinOp::Gt,
        left,
        ..
    } = expr
    else {
        panic!("expected comparison");
    };
    assert!(matches!(*left, Expr::BinOp { op: BinOp::Add, .. }));
}

#[test]
fn parse_unary_minus() {
    let expr = parse_rule("-1 < evt.count").unwrap();
    let Expr::BinOp { left, .. } = expr else {
        panic!("expected comparison");
    };
    assert_eq!(*left, Expr::Neg(Box::new(Expr::Number(1.0))));
}

// -----------------------------------------------------------------------
// Membership
// -----------------------------------------------------------------------

#[test]
fn parse_in_literal_list() {
    let expr = parse_rule("evt.severity in ('error', 'critical',)").unwrap();
    assert_eq!(
        expr,
        Expr::InList {
            expr: Box::new(attr("evt", "severity")),
            list: vec![s("error"), s("critical")],
            negated: false,
        }
    );
}

#[test]
fn parse_not_in_bracket_list() {
    let expr = parse_rule("dev.production_state not in [300, 500]").unwrap();
    assert!(matches!(expr, Expr::InList { negated: true, ref list, .. } if list.len() == 2));
}

#[test]
fn parse_in_attribute_container() {
    let expr = parse_rule("'/Linux' in dev.groups").unwrap();
    assert_eq!(
        expr,
        Expr::Member {
            expr: Box::new(s("/Linux")),
            container: Box::new(attr("dev", "groups")),
            negated: false,
        }
    );
}

#[test]
fn parse_empty_list() {
    let expr = parse_rule("evt.agent in []").unwrap();
    assert!(matches!(expr, Expr::InList { ref list, .. } if list.is_empty()));
}

// -----------------------------------------------------------------------
// Calls
// -----------------------------------------------------------------------

#[test]
fn parse_method_call() {
    let expr = parse_rule("evt.summary.startswith('disk')").unwrap();
    assert_eq!(
        expr,
        Expr::Call {
            receiver: Some(Box::new(attr("evt", "summary"))),
            name: "startswith".into(),
            args: vec![s("disk")],
        }
    );
}

#[test]
fn parse_free_function_call() {
    let expr = parse_rule("len(dev.groups) > 0").unwrap();
    let Expr::BinOp { left, .. } = expr else {
        panic!("expected comparison");
    };
    assert_eq!(
        *left,
        Expr::Call {
            receiver: None,
            name: "len".into(),
            args: vec![attr("dev", "groups")],
        }
    );
}

#[test]
fn parse_call_chain() {
    let expr = parse_rule("evt.summary.lower().contains('fail')").unwrap();
    let Expr::Call { receiver, name, .. } = expr else {
        panic!("expected call");
    };
    assert_eq!(name, "contains");
    assert!(matches!(receiver.as_deref(), Some(Expr::Call { name, .. }) if name == "lower"));
}

// -----------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------

#[test]
fn parse_empty_rule_is_error() {
    assert!(parse_rule("").is_err());
    assert!(parse_rule("   \n").is_err());
}

#[test]
fn parse_trailing_input_is_error() {
    assert!(parse_rule("evt.count > 1 )").is_err());
    assert!(parse_rule("evt.count > 1 evt.count").is_err());
}

#[test]
fn parse_dangling_operator_is_error() {
    assert!(parse_rule("evt.count >").is_err());
    assert!(parse_rule("evt.agent == 'x' and").is_err());
}

#[test]
fn parse_unclosed_string_is_error() {
    let err = parse_rule("evt.summary == 'open").unwrap_err();
    assert!(err.to_string().contains("parse error"));
}

#[test]
fn parse_unclosed_list_is_error() {
    assert!(parse_rule("evt.agent in ('a', 'b'").is_err());
}

#[test]
fn parse_nesting_limit() {
    let depth = MAX_NESTING - 4;
    let ok = format!("{}true{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(parse_rule(&ok).unwrap(), Expr::Bool(true));

    let deep = format!("{}true{}", "(".repeat(3_000), ")".repeat(3_000));
    let err = parse_rule(&deep).unwrap_err();
    assert!(err.to_string().contains("nested too deeply"), "{err}");

    // the counter is released after a rejected rule
    assert_eq!(parse_rule(&ok).unwrap(), Expr::Bool(true));
}

#[test]
fn parse_deep_not_chain_is_error() {
    let rule = format!("{}evt.count", "not ".repeat(500));
    assert!(parse_rule(&rule).is_err());
    let rule = format!("{}evt.count", "!".repeat(500));
    assert!(parse_rule(&rule).is_err());
}

#[test]
fn parse_overlong_operator_chain_is_error() {
    let chain = |n: usize| format!("{}true", "true and ".repeat(n));
    assert!(parse_rule(&chain(MAX_EXPR_DEPTH - 2)).is_ok());
    let err = parse_rule(&chain(MAX_EXPR_DEPTH + 10)).unwrap_err();
    assert!(err.to_string().contains("depth"), "{err}");
}
