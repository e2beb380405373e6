// src/scopes.rs
//! Context wrappers used while evaluating nested strings.

use crate::context::{forward_context, EvalContext, StrParam};
use crate::parser::expression_len;
use crate::sestring::Expr;
use crate::Evaluator;

/// Supplies local parameters from an encoded expression list and forwards
/// everything else to the wrapped context.
pub(crate) struct ParameterScope<'a> {
    ev: &'a Evaluator,
    inner: &'a mut dyn EvalContext,
    params: &'a [u8],
}

impl<'a> ParameterScope<'a> {
    pub fn new(ev: &'a Evaluator, inner: &'a mut dyn EvalContext, params: &'a [u8]) -> Self {
        Self { ev, inner, params }
    }

    // 0-based; fails if any expression up to `index` is undecodable
    fn param(&self, index: u32) -> Option<Expr<'a>> {
        let mut rest = self.params;
        for _ in 0..index {
            let len = expression_len(rest).ok()?;
            rest = &rest[len..];
        }
        let len = expression_len(rest).ok()?;
        Some(Expr::new(&rest[..len]))
    }
}

impl EvalContext for ParameterScope<'_> {
    forward_context!(
        prefer_char_output,
        language,
        try_get_placeholder_num,
        try_get_placeholder_str,
        update_placeholder,
        try_get_global_num,
        try_get_global_str,
        handle_payload,
        produce_new_line,
        produce_error,
        styles,
    );

    fn try_get_local_num(&mut self, index: u32) -> Option<u32> {
        let expr = self.param(index)?;
        let ev = self.ev;
        ev.resolve_uint(self, expr)
    }

    fn try_get_local_str(&mut self, index: u32) -> Option<StrParam> {
        self.param(index)
            .map(|expr| StrParam::Expression(expr.as_bytes().to_vec()))
    }

    fn produce_bytes(&mut self, value: &[u8]) {
        self.inner.produce_bytes(value)
    }

    fn produce_chars(&mut self, value: &str) {
        self.inner.produce_chars(value)
    }
}

/// Collects produced output into a buffer instead of the wrapped context.
/// Styling and icons inside the collected string are dropped.
pub(crate) struct StringCollector<'a> {
    inner: &'a mut dyn EvalContext,
    buf: Vec<u8>,
}

impl<'a> StringCollector<'a> {
    pub fn new(inner: &'a mut dyn EvalContext) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// The string form of `expr`, or `None` if it did not resolve.
    pub fn collect(ev: &Evaluator, inner: &mut dyn EvalContext, expr: Expr<'_>) -> Option<Vec<u8>> {
        let mut collector = StringCollector::new(inner);
        ev.resolve_string_expression(&mut collector, expr)
            .then_some(collector.buf)
    }
}

impl EvalContext for StringCollector<'_> {
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
        self.buf.extend_from_slice(value);
    }

    fn produce_chars(&mut self, value: &str) {
        self.buf.extend_from_slice(value.as_bytes());
    }
}
