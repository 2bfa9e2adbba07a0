use std::cell::Cell;

use winnow::combinator::{alt, cut_err, fail, opt, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::literal;

use crate::ast::*;
use crate::parse_utils::{ident, kw, number_literal, quoted_string, ws_skip};

// ---------------------------------------------------------------------------
// Public entry: full expression
// ---------------------------------------------------------------------------

pub(crate) fn parse_expr(input: &mut &str) -> ModalResult<Expr> {
    let _nesting = Nesting::enter(input)?;
    or_expr.parse_next(input)
}

// ---------------------------------------------------------------------------
// Nesting limit
// ---------------------------------------------------------------------------

/// Deepest allowed stack of brackets, call arguments and `not` prefixes.
pub(crate) const MAX_NESTING: usize = 64;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// One level of sub-expression nesting, released on drop.
struct Nesting;

impl Nesting {
    fn enter(input: &mut &str) -> ModalResult<Self> {
        let depth = NESTING.with(|d| {
            d.set(d.get() + 1);
            d.get()
        });
        let guard = Nesting;
        if depth > MAX_NESTING {
            let too_deep: ModalResult<()> = cut_err(fail)
                .context(StrContext::Label("expression nested too deeply"))
                .parse_next(input);
            too_deep?;
        }
        Ok(guard)
    }
}

impl Drop for Nesting {
    fn drop(&mut self) {
        NESTING.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

// ---------------------------------------------------------------------------
// Precedence levels (lowest to highest)
// ---------------------------------------------------------------------------

/// `or_expr = and_expr { ("||" | "or") and_expr }`
fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = and_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(alt((literal("||").void(), kw("or"))))
            .parse_next(input)?
            .is_some()
        {
            ws_skip.parse_next(input)?;
            let right = cut_err(and_expr).parse_next(input)?;
            left = Expr::BinOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `and_expr = not_expr { ("&&" | "and") not_expr }`
fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = not_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        if opt(alt((literal("&&").void(), kw("and"))))
            .parse_next(input)?
            .is_some()
        {
            ws_skip.parse_next(input)?;
            let right = cut_err(not_expr).parse_next(input)?;
            left = Expr::BinOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `not_expr = ("not" | "!") not_expr | cmp_expr`
fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    if opt(alt((kw("not"), bang))).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let _nesting = Nesting::enter(input)?;
        let inner = cut_err(not_expr).parse_next(input)?;
        return Ok(Expr::Not(Box::new(inner)));
    }
    cmp_expr.parse_next(input)
}

/// A lone `!` (not the first half of `!=`).
fn bang(input: &mut &str) -> ModalResult<()> {
    if input.starts_with('!') && !input.starts_with("!=") {
        *input = &input[1..];
        Ok(())
    } else {
        Err(ErrMode::Backtrack(ContextError::new()))
    }
}

/// `cmp_expr = add_expr [cmp_op add_expr | ["not"] "in" container]`
fn cmp_expr(input: &mut &str) -> ModalResult<Expr> {
    let left = add_expr.parse_next(input)?;
    ws_skip.parse_next(input)?;

    // Try "not in"
    if opt((kw("not"), ws_skip, kw("in")))
        .parse_next(input)?
        .is_some()
    {
        ws_skip.parse_next(input)?;
        return membership(left, true, input);
    }

    // Try "in"
    if opt(kw("in")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        return membership(left, false, input);
    }

    // Try cmp_op
    if let Some(op) = opt(cmp_op).parse_next(input)? {
        ws_skip.parse_next(input)?;
        let right = cut_err(add_expr).parse_next(input)?;
        return Ok(Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        });
    }

    Ok(left)
}

/// Right-hand side of `in`: a literal list, or any additive expression
/// (list-valued attribute, string).
fn membership(left: Expr, negated: bool, input: &mut &str) -> ModalResult<Expr> {
    if let Some(list) = opt(literal_list).parse_next(input)? {
        return Ok(Expr::InList {
            expr: Box::new(left),
            list,
            negated,
        });
    }
    let container = cut_err(add_expr)
        .context(StrContext::Expected(StrContextValue::Description(
            "list or string after `in`",
        )))
        .parse_next(input)?;
    Ok(Expr::Member {
        expr: Box::new(left),
        container: Box::new(container),
        negated,
    })
}

/// `( e1, e2, ... )` or `[ e1, e2, ... ]`, trailing comma allowed.
fn literal_list(input: &mut &str) -> ModalResult<Vec<Expr>> {
    let close = alt((literal("(").value(")"), literal("[").value("]"))).parse_next(input)?;
    ws_skip.parse_next(input)?;
    let mut items = Vec::new();
    loop {
        if opt(literal(close)).parse_next(input)?.is_some() {
            return Ok(items);
        }
        let item = cut_err(parse_expr).parse_next(input)?;
        items.push(item);
        ws_skip.parse_next(input)?;
        if opt(literal(",")).parse_next(input)?.is_some() {
            ws_skip.parse_next(input)?;
            continue;
        }
        cut_err(literal(close))
            .context(StrContext::Expected(StrContextValue::Description(
                "closing bracket of list",
            )))
            .parse_next(input)?;
        return Ok(items);
    }
}

fn cmp_op(input: &mut &str) -> ModalResult<BinOp> {
    alt((
        literal("==").value(BinOp::Eq),
        literal("!=").value(BinOp::Ne),
        literal("<=").value(BinOp::Le),
        literal(">=").value(BinOp::Ge),
        literal("<").value(BinOp::Lt),
        literal(">").value(BinOp::Gt),
    ))
    .parse_next(input)
}

/// `add_expr = mul_expr { ("+" | "-") mul_expr }`
fn add_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = mul_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("+").value(BinOp::Add),
            literal("-").value(BinOp::Sub),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(mul_expr).parse_next(input)?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `mul_expr = unary_expr { ("*" | "/" | "%") unary_expr }`
fn mul_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut left = unary_expr.parse_next(input)?;
    loop {
        ws_skip.parse_next(input)?;
        let op = opt(alt((
            literal("*").value(BinOp::Mul),
            literal("/").value(BinOp::Div),
            literal("%").value(BinOp::Mod),
        )))
        .parse_next(input)?;
        if let Some(op) = op {
            ws_skip.parse_next(input)?;
            let right = cut_err(unary_expr).parse_next(input)?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        } else {
            break;
        }
    }
    Ok(left)
}

/// `unary_expr = ["-"] postfix_expr`
fn unary_expr(input: &mut &str) -> ModalResult<Expr> {
    if opt(literal("-")).parse_next(input)?.is_some() {
        ws_skip.parse_next(input)?;
        let inner = cut_err(postfix_expr).parse_next(input)?;
        Ok(Expr::Neg(Box::new(inner)))
    } else {
        postfix_expr.parse_next(input)
    }
}

/// `postfix_expr = primary { "." ident [ "(" args ")" ] }`
fn postfix_expr(input: &mut &str) -> ModalResult<Expr> {
    let mut expr = primary.parse_next(input)?;
    loop {
        let saved = *input;
        ws_skip.parse_next(input)?;
        if opt(literal(".")).parse_next(input)?.is_none() {
            *input = saved;
            break;
        }
        ws_skip.parse_next(input)?;
        let name = cut_err(ident)
            .context(StrContext::Expected(StrContextValue::Description(
                "attribute name after `.`",
            )))
            .parse_next(input)?
            .to_string();
        let after_name = *input;
        ws_skip.parse_next(input)?;
        if opt(literal("(")).parse_next(input)?.is_some() {
            let args = call_args.parse_next(input)?;
            expr = Expr::Call {
                receiver: Some(Box::new(expr)),
                name,
                args,
            };
        } else {
            *input = after_name;
            expr = Expr::Attr {
                target: Box::new(expr),
                name,
            };
        }
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

fn primary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        // Number literal
        number_literal.map(Expr::Number),
        // String literal
        quoted_string.map(Expr::StringLit),
        // Boolean literals (keyword-checked)
        alt((kw("true"), kw("True"))).map(|_| Expr::Bool(true)),
        alt((kw("false"), kw("False"))).map(|_| Expr::Bool(false)),
        // Parenthesized expression
        paren_expr,
        // Ident-based: name or function call
        ident_primary,
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "expression",
    )))
    .parse_next(input)
}

fn paren_expr(input: &mut &str) -> ModalResult<Expr> {
    literal("(").parse_next(input)?;
    ws_skip.parse_next(input)?;
    let inner = cut_err(parse_expr).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(literal(")")).parse_next(input)?;
    Ok(inner)
}

/// Parse an ident-based primary: builtin call or bare name.
fn ident_primary(input: &mut &str) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    let after_name = *input;
    ws_skip.parse_next(input)?;

    if opt(literal("(")).parse_next(input)?.is_some() {
        let args = call_args.parse_next(input)?;
        return Ok(Expr::Call {
            receiver: None,
            name: name.to_string(),
            args,
        });
    }

    *input = after_name;
    Ok(Expr::Name(name.to_string()))
}

/// Arguments after an opening `(`, through the closing `)`.
fn call_args(input: &mut &str) -> ModalResult<Vec<Expr>> {
    ws_skip.parse_next(input)?;

    // Empty args?
    if opt(literal(")")).parse_next(input)?.is_some() {
        return Ok(vec![]);
    }

    let args: Vec<Expr> =
        separated(1.., (ws_skip, parse_expr).map(|(_, e)| e), literal(",")).parse_next(input)?;
    ws_skip.parse_next(input)?;
    cut_err(literal(")")).parse_next(input)?;
    Ok(args)
}
