use tracing::debug;

use super::Macro;
use crate::context::EvalContext;
use crate::sestring::{MacroCode, Payload};
use crate::Evaluator;

/// `If(condition, then, else)`. A condition that does not resolve counts as
/// false.
pub struct If;

impl Macro for If {
    fn code(&self) -> MacroCode {
        MacroCode::If
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some([condition, then, otherwise]) = payload.args::<3>() else {
            return false;
        };
        let branch = if ev.resolve_bool(ctx, condition) == Some(true) {
            then
        } else {
            otherwise
        };
        ev.resolve_string_expression(ctx, branch)
    }
}

/// `Switch(selector, branch0, branch1, ...)`. The selector picks a branch by
/// 0-based position; an unresolvable selector picks the first branch.
pub struct Switch;

impl Macro for Switch {
    fn code(&self) -> MacroCode {
        MacroCode::Switch
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let mut exprs = payload.expressions();
        let Some(selector) = exprs.next() else {
            return false;
        };
        let selected = ev.resolve_uint(ctx, selector).unwrap_or_else(|| {
            debug!("switch selector did not resolve, using the first branch");
            0
        });
        // 0-based: selector 2 is the third branch
        match exprs.nth(selected as usize) {
            Some(branch) => ev.resolve_string_expression(ctx, branch),
            None => {
                debug!(selected, "switch selector past the last branch");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::context::{BasicContext, LocalParam};
    use crate::encode::SeStringBuilder;
    use crate::functions::Registry;
    use crate::sestring::{BinaryOp, Expression};

    use super::*;

    fn render(ctx: &mut BasicContext, code: MacroCode, args: &[Expression]) -> (bool, String) {
        let ev = Evaluator::new(Registry::with_builtins());
        let s = SeStringBuilder::new().push_macro(code, args).build();
        let ok = ev.resolve_string(ctx, s.as_se_str());
        (ok, ctx.text())
    }

    #[test]
    fn if_selects_branch() {
        let cond = Expression::binary(
            BinaryOp::GreaterOrEqual,
            Expression::local_num(1),
            Expression::Integer(5),
        );
        let args = [cond, Expression::text("big"), Expression::text("small")];

        let mut ctx = BasicContext::new().with_params(vec![LocalParam::Number(7)]);
        assert_eq!(render(&mut ctx, MacroCode::If, &args), (true, "big".to_string()));

        let mut ctx = BasicContext::new().with_params(vec![LocalParam::Number(3)]);
        assert_eq!(render(&mut ctx, MacroCode::If, &args), (true, "small".to_string()));
    }

    #[test]
    fn if_with_unresolvable_condition_takes_else() {
        let args = [Expression::local_num(4), Expression::text("a"), Expression::text("b")];
        let mut ctx = BasicContext::new();
        assert_eq!(render(&mut ctx, MacroCode::If, &args), (true, "b".to_string()));
    }

    #[test]
    fn if_needs_three_arguments() {
        let args = [Expression::Integer(1), Expression::text("a")];
        let mut ctx = BasicContext::new();
        assert_eq!(render(&mut ctx, MacroCode::If, &args), (false, String::new()));
    }

    // Selectors are 0-based: 0, 1 and 2 pick distinct branches. There is no
    // 1-based shift where 0 and 1 both land on the first branch.
    #[test]
    fn switch_by_position() {
        let branches = |sel: Expression| {
            vec![
                sel,
                Expression::text("zero"),
                Expression::text("one"),
                Expression::text("two"),
            ]
        };
        for (sel, expected) in [(0, "zero"), (1, "one"), (2, "two")] {
            let mut ctx = BasicContext::new();
            assert_eq!(
                render(&mut ctx, MacroCode::Switch, &branches(Expression::Integer(sel))),
                (true, expected.to_string())
            );
        }
        let mut ctx = BasicContext::new();
        assert_eq!(
            render(&mut ctx, MacroCode::Switch, &branches(Expression::local_num(1))),
            (true, "zero".to_string())
        );
        let mut ctx = BasicContext::new();
        assert_eq!(
            render(&mut ctx, MacroCode::Switch, &branches(Expression::Integer(3))),
            (false, String::new())
        );
    }
}
