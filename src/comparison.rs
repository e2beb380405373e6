// src/comparison.rs
use std::cmp::Ordering;

use crate::context::{forward_context, EvalContext};
use crate::sestring::{BinaryOp, Expr};
use crate::Evaluator;

pub fn cmp_ints<F>(a: i32, b: i32, pred_on_ord: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    pred_on_ord(a.cmp(&b))
}

/// Evaluates a comparison. Ordering operators compare signed integers;
/// equality compares the produced string forms byte for byte.
pub fn evaluate(
    ev: &Evaluator,
    ctx: &mut dyn EvalContext,
    op: BinaryOp,
    lhs: Expr<'_>,
    rhs: Expr<'_>,
) -> Option<bool> {
    let pred: fn(Ordering) -> bool = match op {
        BinaryOp::Equal => return Some(EqualityMatcher::run(ev, ctx, lhs, rhs)),
        BinaryOp::NotEqual => return Some(!EqualityMatcher::run(ev, ctx, lhs, rhs)),
        BinaryOp::GreaterOrEqual => |o| o != Ordering::Less,
        BinaryOp::Greater => |o| o == Ordering::Greater,
        BinaryOp::LessOrEqual => |o| o != Ordering::Greater,
        BinaryOp::Less => |o| o == Ordering::Less,
    };
    let a = ev.resolve_int(ctx, lhs)?;
    let b = ev.resolve_int(ctx, rhs)?;
    Some(cmp_ints(a, b, pred))
}

/// Captures the first thing the left operand produces, then evaluates the
/// right operand through the same matcher and compares each of its outputs
/// against the capture. The last comparison wins.
struct EqualityMatcher<'a> {
    ev: &'a Evaluator,
    inner: &'a mut dyn EvalContext,
    rhs: Expr<'a>,
    captured: Option<Vec<u8>>,
    equals: bool,
}

impl<'a> EqualityMatcher<'a> {
    fn run(ev: &'a Evaluator, inner: &'a mut dyn EvalContext, lhs: Expr<'_>, rhs: Expr<'a>) -> bool {
        let mut matcher = EqualityMatcher {
            ev,
            inner,
            rhs,
            captured: None,
            equals: false,
        };
        ev.resolve_string_expression(&mut matcher, lhs);
        matcher.equals
    }
}

impl EvalContext for EqualityMatcher<'_> {
    forward_context!(
        prefer_char_output,
        language,
        try_get_placeholder_num,
        try_get_placeholder_str,
        update_placeholder,
        try_get_local_num,
        try_get_local_str,
        try_get_global_num,
        try_get_global_str,
        handle_payload,
        produce_error,
    );

    fn produce_bytes(&mut self, value: &[u8]) {
        if let Some(captured) = &self.captured {
            self.equals = captured.as_slice() == value;
            return;
        }
        self.captured = Some(value.to_vec());
        let (ev, rhs) = (self.ev, self.rhs);
        ev.resolve_string_expression(self, rhs);
    }

    fn produce_chars(&mut self, value: &str) {
        self.produce_bytes(value.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BasicContext, LocalParam};
    use crate::functions::Registry;
    use crate::sestring::Expression;
    use pretty_assertions::assert_eq;

    fn compare(ctx: &mut BasicContext, op: BinaryOp, lhs: Expression, rhs: Expression) -> Option<bool> {
        let ev = Evaluator::new(Registry::with_builtins());
        let (l, r) = (lhs.encode(), rhs.encode());
        evaluate(&ev, ctx, op, Expr::new(&l), Expr::new(&r))
    }

    #[test]
    fn ordering_is_signed() {
        let mut ctx = BasicContext::new().with_params(vec![LocalParam::Signed(-1)]);
        let lt = compare(&mut ctx, BinaryOp::Less, Expression::local_num(1), Expression::Integer(0));
        assert_eq!(lt, Some(true));
        let ge = compare(
            &mut ctx,
            BinaryOp::GreaterOrEqual,
            Expression::Integer(3),
            Expression::Integer(3),
        );
        assert_eq!(ge, Some(true));
    }

    #[test]
    fn ordering_fails_on_unresolvable_operand() {
        let mut ctx = BasicContext::new();
        let r = compare(&mut ctx, BinaryOp::Greater, Expression::local_num(4), Expression::Integer(0));
        assert_eq!(r, None);
    }

    #[test]
    fn equality_compares_string_forms() {
        let mut ctx = BasicContext::new().with_params(vec![LocalParam::Text("abc".into())]);
        let eq = compare(&mut ctx, BinaryOp::Equal, Expression::local_str(1), Expression::text("abc"));
        assert_eq!(eq, Some(true));
        let ne = compare(&mut ctx, BinaryOp::NotEqual, Expression::local_str(1), Expression::text("abd"));
        assert_eq!(ne, Some(true));
        // numbers compare by their decimal text
        let num = compare(&mut ctx, BinaryOp::Equal, Expression::Integer(12), Expression::text("12"));
        assert_eq!(num, Some(true));
        assert!(ctx.output().is_empty());
    }

    #[test]
    fn empty_left_operand_is_unequal() {
        let mut ctx = BasicContext::new();
        let eq = compare(&mut ctx, BinaryOp::Equal, Expression::text(""), Expression::text(""));
        assert_eq!(eq, Some(false));
    }
}
