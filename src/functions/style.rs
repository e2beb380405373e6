use tracing::debug;

use super::Macro;
use crate::context::EvalContext;
use crate::sestring::{MacroCode, Payload};
use crate::sources::UiColor;
use crate::Evaluator;

fn draw_icon(ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
    let Some(icon) = payload.args::<1>().and_then(|[e]| ev.resolve_uint(ctx, e)) else {
        return false;
    };
    ctx.draw_icon(icon);
    true
}

pub struct Icon;

impl Macro for Icon {
    fn code(&self) -> MacroCode {
        MacroCode::Icon
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        draw_icon(ev, ctx, payload)
    }
}

pub struct Icon2;

impl Macro for Icon2 {
    fn code(&self) -> MacroCode {
        MacroCode::Icon2
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        draw_icon(ev, ctx, payload)
    }
}

#[derive(Clone, Copy)]
enum ColorTarget {
    Fore,
    Border,
}

impl ColorTarget {
    fn push(self, ctx: &mut dyn EvalContext, argb: u32) {
        match self {
            ColorTarget::Fore => ctx.push_fore_color(argb),
            ColorTarget::Border => ctx.push_border_color(argb),
        }
    }

    fn pop(self, ctx: &mut dyn EvalContext) {
        match self {
            ColorTarget::Fore => ctx.pop_fore_color(),
            ColorTarget::Border => ctx.pop_border_color(),
        }
    }

    /// The stack-color placeholder pops; any other value pushes it as an
    /// opaque color. An unresolvable value is ignored.
    fn apply_value(self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some([value]) = payload.args::<1>() else {
            return false;
        };
        if value.is_stack_color() {
            self.pop(ctx);
        } else if let Some(rgb) = ev.resolve_uint(ctx, value) {
            self.push(ctx, rgb | 0xFF00_0000);
        }
        true
    }

    /// Row 0 pops; other rows push the row's color converted from RGBA to
    /// ARGB. A missing row is ignored.
    fn apply_row(
        self,
        ev: &Evaluator,
        ctx: &mut dyn EvalContext,
        payload: &Payload<'_>,
        pick: fn(&UiColor) -> u32,
    ) -> bool {
        let Some(row) = payload.args::<1>().and_then(|[e]| ev.resolve_uint(ctx, e)) else {
            return false;
        };
        if row == 0 {
            self.pop(ctx);
            return true;
        }
        match ev.sheets().ui_color(row) {
            Some(color) => self.push(ctx, pick(&color).rotate_right(8)),
            None => debug!(row, "no UI color row"),
        }
        true
    }
}

pub struct Color;

impl Macro for Color {
    fn code(&self) -> MacroCode {
        MacroCode::Color
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        ColorTarget::Fore.apply_value(ev, ctx, payload)
    }
}

pub struct EdgeColor;

impl Macro for EdgeColor {
    fn code(&self) -> MacroCode {
        MacroCode::EdgeColor
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        ColorTarget::Border.apply_value(ev, ctx, payload)
    }
}

pub struct ColorType;

impl Macro for ColorType {
    fn code(&self) -> MacroCode {
        MacroCode::ColorType
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        ColorTarget::Fore.apply_row(ev, ctx, payload, |c| c.foreground)
    }
}

pub struct EdgeColorType;

impl Macro for EdgeColorType {
    fn code(&self) -> MacroCode {
        MacroCode::EdgeColorType
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        ColorTarget::Border.apply_row(ev, ctx, payload, |c| c.glow)
    }
}

fn toggle(ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>, set: fn(&mut dyn EvalContext, bool)) -> bool {
    let Some(enable) = payload.args::<1>().and_then(|[e]| ev.resolve_bool(ctx, e)) else {
        return false;
    };
    set(ctx, enable);
    true
}

pub struct Bold;

impl Macro for Bold {
    fn code(&self) -> MacroCode {
        MacroCode::Bold
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        toggle(ev, ctx, payload, |ctx, on| ctx.set_bold(on))
    }
}

pub struct Italic;

impl Macro for Italic {
    fn code(&self) -> MacroCode {
        MacroCode::Italic
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        toggle(ev, ctx, payload, |ctx, on| ctx.set_italic(on))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::context::BasicContext;
    use crate::encode::SeStringBuilder;
    use crate::functions::Registry;
    use crate::sestring::{marker, Expression};
    use crate::sources::MemorySheets;

    use super::*;

    fn evaluator() -> Evaluator {
        let mut sheets = MemorySheets::new();
        sheets.insert_ui_color(
            5,
            UiColor {
                foreground: 0x1122_33FF,
                glow: 0xAABB_CC80,
            },
        );
        Evaluator::new(Registry::with_builtins()).with_sheets(Arc::new(sheets))
    }

    fn run(ev: &Evaluator, builder: &SeStringBuilder) -> (bool, BasicContext) {
        let mut ctx = BasicContext::new();
        let ok = ev.resolve_string(&mut ctx, builder.build().as_se_str());
        (ok, ctx)
    }

    #[test]
    fn color_push_and_pop() {
        let ev = evaluator();
        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::Color, &[Expression::Integer(0x00FF_0000)])
            .push_macro(MacroCode::EdgeColor, &[Expression::Integer(0x10)])
            .push_macro(MacroCode::Color, &[Expression::Integer(0x0000_FF00)])
            .push_macro(MacroCode::Color, &[Expression::Placeholder(marker::STACK_COLOR)]);
        let (ok, ctx) = run(&ev, &b);
        assert!(ok);
        assert_eq!(ctx.fore_colors(), &[0xFFFF_0000]);
        assert_eq!(ctx.border_colors(), &[0xFF00_0010]);
    }

    #[test]
    fn color_without_argument_fails() {
        let ev = evaluator();
        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::Color, &[]);
        let (ok, ctx) = run(&ev, &b);
        assert!(!ok);
        assert!(ctx.fore_colors().is_empty());
    }

    #[test]
    fn color_rows_reorder_channels() {
        let ev = evaluator();
        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::ColorType, &[Expression::Integer(5)])
            .push_macro(MacroCode::EdgeColorType, &[Expression::Integer(5)])
            .push_macro(MacroCode::ColorType, &[Expression::Integer(9)]);
        let (ok, ctx) = run(&ev, &b);
        assert!(ok);
        assert_eq!(ctx.fore_colors(), &[0xFF11_2233]);
        assert_eq!(ctx.border_colors(), &[0x80AA_BBCC]);

        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::ColorType, &[Expression::Integer(5)])
            .push_macro(MacroCode::ColorType, &[Expression::Integer(0)]);
        let (_, ctx) = run(&ev, &b);
        assert!(ctx.fore_colors().is_empty());
    }

    #[test]
    fn bold_italic_and_icons() {
        let ev = evaluator();
        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::Bold, &[Expression::Integer(1)])
            .push_macro(MacroCode::Italic, &[Expression::Integer(1)])
            .push_macro(MacroCode::Italic, &[Expression::Integer(0)])
            .push_macro(MacroCode::Icon, &[Expression::Integer(61)])
            .push_macro(MacroCode::Icon2, &[Expression::Integer(300)]);
        let (ok, ctx) = run(&ev, &b);
        assert!(ok);
        assert!(ctx.is_bold());
        assert!(!ctx.is_italic());
        assert_eq!(ctx.icons(), &[61, 300]);

        let mut b = SeStringBuilder::new();
        b.push_macro(MacroCode::Bold, &[]);
        let (ok, ctx) = run(&ev, &b);
        assert!(!ok);
        assert!(!ctx.is_bold());
    }
}
