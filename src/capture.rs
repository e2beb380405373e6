// src/capture.rs
//! Snapshotting an evaluated string so it no longer depends on the context.
//!
//! *Flatten* evaluates everything down to plain text. *Freeze* keeps macro
//! envelopes but replaces each argument by its current value, so styling and
//! structure survive while parameters and placeholders are baked in.

use tracing::debug;

use crate::context::{forward_context, EvalContext, PayloadAction};
use crate::encode::{encode_payload, encode_string, encode_uint};
use crate::sestring::{Expr, MacroCode, Payload, SeStr};
use crate::Evaluator;

struct FlattenCapture<'a> {
    inner: &'a mut dyn EvalContext,
    out: &'a mut Vec<u8>,
}

impl EvalContext for FlattenCapture<'_> {
    forward_context!(
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

    fn prefer_char_output(&self) -> bool {
        false
    }

    fn produce_bytes(&mut self, value: &[u8]) {
        self.out.extend_from_slice(value);
    }

    fn produce_chars(&mut self, value: &str) {
        self.out.extend_from_slice(value.as_bytes());
    }
}

struct FreezeCapture<'a> {
    ev: &'a Evaluator,
    inner: &'a mut dyn EvalContext,
    out: Vec<u8>,
}

impl FreezeCapture<'_> {
    fn write_macro(&mut self, code: u8, payload: &Payload<'_>) {
        let mut body = Vec::with_capacity(payload.body().len());
        for expr in payload.expressions() {
            self.write_expression(expr, &mut body);
        }
        encode_payload(&mut self.out, code, &body);
    }

    fn write_expression(&mut self, expr: Expr<'_>, body: &mut Vec<u8>) {
        if expr.is_stack_color() {
            body.push(expr.as_bytes()[0]);
            return;
        }
        if let Some((op, lhs, rhs)) = expr.as_binary() {
            body.push(op as u8);
            self.write_expression(lhs, body);
            self.write_expression(rhs, body);
            return;
        }
        let ev = self.ev;
        if let Some(v) = ev.resolve_uint(self, expr) {
            encode_uint(body, v);
            return;
        }
        let saved = std::mem::take(&mut self.out);
        if !ev.resolve_string_expression(self, expr) {
            debug!(expr = %expr, "argument did not resolve while freezing");
        }
        let captured = std::mem::replace(&mut self.out, saved);
        encode_string(body, &captured);
    }
}

impl EvalContext for FreezeCapture<'_> {
    forward_context!(
        language,
        try_get_placeholder_num,
        try_get_placeholder_str,
        update_placeholder,
        try_get_local_num,
        try_get_local_str,
        try_get_global_num,
        try_get_global_str,
        produce_error,
    );

    fn prefer_char_output(&self) -> bool {
        false
    }

    fn handle_payload(&mut self, payload: &Payload<'_>) -> PayloadAction {
        match *payload {
            Payload::Text(text) => {
                self.out.extend_from_slice(text);
                PayloadAction::Handled
            }
            // reported, then left to fail like any other invalid payload
            Payload::Invalid(_) => {
                self.inner.produce_error("Invalid payload detected.");
                PayloadAction::Default
            }
            Payload::Macro { code, .. } => match MacroCode::from_u8(code) {
                // time setters update the placeholders the rest of the string reads
                Some(MacroCode::SetTime | MacroCode::SetResetTime) => {
                    self.inner.handle_payload(payload)
                }
                _ => {
                    self.write_macro(code, payload);
                    PayloadAction::Handled
                }
            },
        }
    }

    fn produce_bytes(&mut self, value: &[u8]) {
        self.out.extend_from_slice(value);
    }

    fn produce_chars(&mut self, value: &str) {
        self.out.extend_from_slice(value.as_bytes());
    }
}

impl Evaluator {
    /// Evaluates `value` to plain bytes, appending to `out`.
    pub fn capture_parameters_into(
        &self,
        ctx: &mut dyn EvalContext,
        value: SeStr<'_>,
        out: &mut Vec<u8>,
    ) -> bool {
        let mut capture = FlattenCapture { inner: ctx, out };
        self.resolve_string(&mut capture, value)
    }

    pub fn capture_parameters(&self, ctx: &mut dyn EvalContext, value: SeStr<'_>) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len());
        self.capture_parameters_into(ctx, value, &mut out);
        out
    }

    /// Re-encodes `value` with every macro argument replaced by its current
    /// value, appending to `out`.
    pub fn freeze_parameters_into(
        &self,
        ctx: &mut dyn EvalContext,
        value: SeStr<'_>,
        out: &mut Vec<u8>,
    ) -> bool {
        let mut capture = FreezeCapture {
            ev: self,
            inner: ctx,
            out: std::mem::take(out),
        };
        let ok = self.resolve_string(&mut capture, value);
        *out = capture.out;
        ok
    }

    pub fn freeze_parameters(&self, ctx: &mut dyn EvalContext, value: SeStr<'_>) -> Vec<u8> {
        let mut out = Vec::with_capacity(value.len());
        self.freeze_parameters_into(ctx, value, &mut out);
        out
    }
}
