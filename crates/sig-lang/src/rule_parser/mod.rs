use winnow::prelude::*;

mod expr;

use crate::ast::Expr;
use crate::parse_utils::ws_skip;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Deepest expression tree accepted, counting operator chains such as
/// `a and b and c`.
pub const MAX_EXPR_DEPTH: usize = 256;

/// Parse trigger rule source: a single expression, optionally surrounded by
/// whitespace and `#` comments. Trailing input is an error, as is nesting
/// beyond [`MAX_EXPR_DEPTH`].
pub fn parse_rule(input: &str) -> anyhow::Result<Expr> {
    if input.trim().is_empty() {
        anyhow::bail!("parse error: empty rule");
    }
    let expr = rule_source
        .parse(input)
        .map_err(|e| anyhow::anyhow!("parse error: {e}"))?;
    let depth = expr_depth(&expr);
    if depth > MAX_EXPR_DEPTH {
        anyhow::bail!("parse error: expression depth {depth} exceeds {MAX_EXPR_DEPTH}");
    }
    Ok(expr)
}

/// Height of the expression tree, walked without recursion.
fn expr_depth(root: &Expr) -> usize {
    let mut max = 0;
    let mut stack = vec![(root, 1usize)];
    while let Some((expr, depth)) = stack.pop() {
        max = max.max(depth);
        let next = depth + 1;
        match expr {
            Expr::Attr { target, .. } => stack.push((target.as_ref(), next)),
            Expr::BinOp { left, right, .. } => {
                stack.push((left.as_ref(), next));
                stack.push((right.as_ref(), next));
            }
            Expr::Neg(inner) | Expr::Not(inner) => stack.push((inner.as_ref(), next)),
            Expr::Call { receiver, args, .. } => {
                stack.extend(receiver.iter().map(|r| (r.as_ref(), next)));
                stack.extend(args.iter().map(|a| (a, next)));
            }
            Expr::InList { expr, list, .. } => {
                stack.push((expr.as_ref(), next));
                stack.extend(list.iter().map(|e| (e, next)));
            }
            Expr::Member {
                expr, container, ..
            } => {
                stack.push((expr.as_ref(), next));
                stack.push((container.as_ref(), next));
            }
            _ => {}
        }
    }
    max
}

fn rule_source(input: &mut &str) -> ModalResult<Expr> {
    ws_skip.parse_next(input)?;
    let expr = expr::parse_expr.parse_next(input)?;
    ws_skip.parse_next(input)?;
    Ok(expr)
}
