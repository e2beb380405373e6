// src/expression.rs
use chrono::{Datelike, Timelike};
use tracing::debug;

use crate::comparison;
use crate::context::{EvalContext, PayloadAction, StrParam};
use crate::format::produce_decimal;
use crate::format::produce_str;
use crate::sestring::{marker, Expr, ParamKind, Payload, SeStr};
use crate::sources::GlobalParam;
use crate::Evaluator;

const OFF_MAIN_THREAD: &str = "Global parameters may only be used from the main thread.";

impl Evaluator {
    /// Evaluates every payload of `value` into `ctx`. Keeps going after a
    /// failed payload; the result is true only if all of them succeeded.
    pub fn resolve_string(&self, ctx: &mut dyn EvalContext, value: SeStr<'_>) -> bool {
        let Some(_guard) = self.enter(ctx) else {
            return false;
        };
        let mut ok = true;
        for payload in value.payloads() {
            ok &= self.resolve_string_payload(ctx, &payload);
        }
        ok
    }

    /// Evaluates one payload. The context sees every payload first, invalid
    /// ones included; an invalid payload it does not handle fails.
    pub fn resolve_string_payload(&self, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        match ctx.handle_payload(payload) {
            PayloadAction::Handled => return true,
            PayloadAction::Replace(value) => return self.produce_param(ctx, value),
            PayloadAction::Default => {}
        }
        match *payload {
            Payload::Text(text) => {
                ctx.produce_bytes(text);
                true
            }
            Payload::Macro { code, .. } => self.dispatch_macro(ctx, code, payload),
            Payload::Invalid(bytes) => {
                debug!(byte = ?bytes, "skipping invalid payload");
                false
            }
        }
    }

    /// Produces the string form of an expression into `ctx`.
    pub fn resolve_string_expression(&self, ctx: &mut dyn EvalContext, expr: Expr<'_>) -> bool {
        let Some(_guard) = self.enter(ctx) else {
            return false;
        };
        if let Some(value) = expr.as_string() {
            return self.resolve_string(ctx, value);
        }
        if let Some(kind) = expr.as_placeholder() {
            if let Some(value) = ctx.try_get_placeholder_str(kind) {
                return self.produce_param(ctx, value);
            }
        }
        if let Some((kind, operand)) = expr.as_parameter() {
            let Some(index) = self.parameter_index(ctx, operand) else {
                return false;
            };
            return match kind {
                ParamKind::LocalNumber => match ctx.try_get_local_num(index) {
                    Some(v) => {
                        produce_decimal(ctx, v as i32);
                        true
                    }
                    None => false,
                },
                ParamKind::LocalString => match ctx.try_get_local_str(index) {
                    Some(value) => self.produce_param(ctx, value),
                    None => false,
                },
                ParamKind::GlobalNumber => {
                    let value = ctx
                        .try_get_global_num(index)
                        .or_else(|| self.global_num_default(ctx, index));
                    match value {
                        Some(v) => {
                            produce_decimal(ctx, v as i32);
                            true
                        }
                        None => false,
                    }
                }
                ParamKind::GlobalString => {
                    ctx.try_get_global_str(index)
                        .is_some_and(|value| self.produce_param(ctx, value))
                        || self.produce_global_str_default(ctx, index)
                }
            };
        }
        match self.resolve_uint(ctx, expr) {
            Some(v) => {
                produce_decimal(ctx, v as i32);
                true
            }
            None => false,
        }
    }

    pub fn resolve_uint(&self, ctx: &mut dyn EvalContext, expr: Expr<'_>) -> Option<u32> {
        if let Some(v) = expr.as_uint() {
            return Some(v);
        }
        let _guard = self.enter(ctx)?;
        if let Some(kind) = expr.as_placeholder() {
            return ctx
                .try_get_placeholder_num(kind)
                .or_else(|| self.placeholder_default(kind));
        }
        if let Some((kind, operand)) = expr.as_parameter() {
            let index = self.parameter_index(ctx, operand)?;
            return match kind {
                ParamKind::LocalNumber => ctx.try_get_local_num(index),
                ParamKind::GlobalNumber => ctx
                    .try_get_global_num(index)
                    .or_else(|| self.global_num_default(ctx, index)),
                ParamKind::LocalString | ParamKind::GlobalString => {
                    debug!(kind = kind.name(), "string parameter used as a number");
                    None
                }
            };
        }
        if let Some((op, lhs, rhs)) = expr.as_binary() {
            return comparison::evaluate(self, ctx, op, lhs, rhs).map(u32::from);
        }
        None
    }

    pub fn resolve_int(&self, ctx: &mut dyn EvalContext, expr: Expr<'_>) -> Option<i32> {
        self.resolve_uint(ctx, expr).map(|v| v as i32)
    }

    pub fn resolve_bool(&self, ctx: &mut dyn EvalContext, expr: Expr<'_>) -> Option<bool> {
        self.resolve_uint(ctx, expr).map(|v| v != 0)
    }

    /// Emits a context-supplied string value into `ctx`.
    pub fn produce_param(&self, ctx: &mut dyn EvalContext, value: StrParam) -> bool {
        match value {
            StrParam::Text(text) => {
                produce_str(ctx, &text);
                true
            }
            StrParam::SeString(s) => ctx.produce_se_string(self, s.as_se_str()),
            StrParam::Expression(bytes) => self.resolve_string_expression(ctx, Expr::new(&bytes)),
        }
    }

    // 1-based operand to 0-based index
    fn parameter_index(&self, ctx: &mut dyn EvalContext, operand: Expr<'_>) -> Option<u32> {
        match self.resolve_uint(ctx, operand)? {
            0 => {
                debug!("parameter index 0 is not valid");
                None
            }
            i => Some(i - 1),
        }
    }

    /// Date/time placeholders read the clock when the context has no value.
    fn placeholder_default(&self, kind: u8) -> Option<u32> {
        let now = self.clock().now_local();
        Some(match kind {
            marker::MILLISECOND => now.timestamp_subsec_millis(),
            marker::SECOND => now.second(),
            marker::MINUTE => now.minute(),
            marker::HOUR => now.hour(),
            marker::DAY => now.day(),
            marker::WEEKDAY => now.weekday().num_days_from_sunday(),
            marker::MONTH => now.month(),
            marker::YEAR => now.year() as u32,
            _ => return None,
        })
    }

    fn global_param(&self, ctx: &mut dyn EvalContext, index: u32) -> Option<GlobalParam> {
        if !self.is_main_thread() {
            debug!(index, "global parameter requested off the main thread");
            ctx.produce_error(OFF_MAIN_THREAD);
            return None;
        }
        let param = self.globals().get(index);
        if param.is_none() {
            debug!(index, len = self.globals().len(), "global parameter out of range");
        }
        param
    }

    fn global_num_default(&self, ctx: &mut dyn EvalContext, index: u32) -> Option<u32> {
        let kind = match self.global_param(ctx, index)? {
            GlobalParam::Integer(v) => return Some(v as u32),
            GlobalParam::NarrowString(_) => "Utf8String",
            GlobalParam::WideString(_) => "string",
            GlobalParam::Uninitialized => "uninitialized",
        };
        ctx.produce_error(&format!(
            "Requested a number; {kind} global parameter at {index}."
        ));
        None
    }

    fn produce_global_str_default(&self, ctx: &mut dyn EvalContext, index: u32) -> bool {
        match self.global_param(ctx, index) {
            Some(GlobalParam::Integer(v)) => {
                produce_decimal(ctx, v);
                true
            }
            Some(GlobalParam::NarrowString(s)) => self.resolve_string(ctx, s.as_se_str()),
            Some(GlobalParam::WideString(s)) => {
                self.resolve_string(ctx, SeStr::new(s.as_bytes()))
            }
            Some(GlobalParam::Uninitialized) | None => false,
        }
    }
}
