// src/encode.rs
//! Writers for the expression and payload wire formats.

use crate::sestring::{
    marker, Expression, MacroCode, Payload, SeStr, SeString, END_BYTE, START_BYTE,
};

/// Exact encoded size of an integer expression.
pub fn uint_len(value: u32) -> usize {
    if value < 0xCF {
        1
    } else {
        1 + value.to_be_bytes().iter().filter(|b| **b != 0).count()
    }
}

/// Appends the integer encoding of `value`: a single `value + 1` byte for
/// small values, otherwise a mask marker followed by the non-zero bytes
/// big-endian.
pub fn encode_uint(out: &mut Vec<u8>, value: u32) {
    if value < 0xCF {
        out.push(value as u8 + 1);
        return;
    }
    let bytes = value.to_be_bytes();
    let mask = bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b != 0)
        .fold(0u8, |m, (i, _)| m | (1 << (3 - i)));
    out.push((0xF0 | mask) - 1);
    out.extend(bytes.iter().filter(|b| **b != 0));
}

/// Appends a string literal expression.
pub fn encode_string(out: &mut Vec<u8>, body: &[u8]) {
    out.push(marker::STRING);
    encode_uint(out, u32::try_from(body.len()).unwrap_or(u32::MAX));
    out.extend_from_slice(body);
}

/// Appends a macro envelope around an already encoded body.
pub fn encode_payload(out: &mut Vec<u8>, code: u8, body: &[u8]) {
    out.push(START_BYTE);
    out.push(code);
    encode_uint(out, u32::try_from(body.len()).unwrap_or(u32::MAX));
    out.extend_from_slice(body);
    out.push(END_BYTE);
}

pub fn payload_len(body_len: usize) -> usize {
    3 + uint_len(u32::try_from(body_len).unwrap_or(u32::MAX)) + body_len
}

impl Expression {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Expression::Integer(v) => encode_uint(out, *v),
            Expression::Placeholder(b) => out.push(*b),
            Expression::Parameter(kind, index) => {
                out.push(*kind as u8);
                index.encode_into(out);
            }
            Expression::Binary(op, lhs, rhs) => {
                out.push(*op as u8);
                lhs.encode_into(out);
                rhs.encode_into(out);
            }
            Expression::String(s) => encode_string(out, s.as_bytes()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.max_encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Exact size of [`Expression::encode`].
    pub fn encoded_len(&self) -> usize {
        match self {
            Expression::Integer(v) => uint_len(*v),
            Expression::Placeholder(_) => 1,
            Expression::Parameter(_, index) => 1 + index.encoded_len(),
            Expression::Binary(_, lhs, rhs) => 1 + lhs.encoded_len() + rhs.encoded_len(),
            Expression::String(s) => 1 + uint_len(s.len() as u32) + s.len(),
        }
    }

    /// Upper bound on the encoded size that needs no inspection of integer
    /// values.
    pub fn max_encoded_len(&self) -> usize {
        match self {
            Expression::Integer(_) => 5,
            Expression::Placeholder(_) => 1,
            Expression::Parameter(_, index) => 1 + index.max_encoded_len(),
            Expression::Binary(_, lhs, rhs) => {
                1 + lhs.max_encoded_len() + rhs.max_encoded_len()
            }
            Expression::String(s) => 6 + s.len(),
        }
    }
}

/// Incremental writer for styled strings.
#[derive(Debug, Default, Clone)]
pub struct SeStringBuilder {
    buf: Vec<u8>,
}

impl SeStringBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&mut self, text: &str) -> &mut Self {
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn push_macro(&mut self, code: MacroCode, args: &[Expression]) -> &mut Self {
        let mut body = Vec::with_capacity(args.iter().map(Expression::max_encoded_len).sum());
        for arg in args {
            arg.encode_into(&mut body);
        }
        self.push_raw_macro(code as u8, &body)
    }

    pub fn push_raw_macro(&mut self, code: u8, body: &[u8]) -> &mut Self {
        self.buf.reserve(payload_len(body.len()));
        encode_payload(&mut self.buf, code, body);
        self
    }

    pub fn push_payload(&mut self, payload: &Payload<'_>) -> &mut Self {
        self.push_bytes(payload.envelope())
    }

    pub fn push_se_str(&mut self, value: SeStr<'_>) -> &mut Self {
        self.push_bytes(value.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn build(&self) -> SeString {
        SeString::from(self.buf.clone())
    }

    pub fn into_se_string(self) -> SeString {
        SeString::from(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sestring::BinaryOp;
    use pretty_assertions::assert_eq;

    fn enc(v: u32) -> Vec<u8> {
        let mut out = Vec::new();
        encode_uint(&mut out, v);
        out
    }

    #[test]
    fn integer_encodings() {
        assert_eq!(enc(0), vec![0x01]);
        assert_eq!(enc(0xCE), vec![0xCF]);
        assert_eq!(enc(0xCF), vec![0xF0, 0xCF]);
        assert_eq!(enc(0x0100), vec![0xF1, 0x01]);
        assert_eq!(enc(0x0101), vec![0xF2, 0x01, 0x01]);
        assert_eq!(enc(0x1234_5678), vec![0xFE, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(enc(u32::MAX), vec![0xFE, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn exact_lengths() {
        for v in [0, 1, 0xCE, 0xCF, 0x100, 0x10000, 0x1000000, 0x01020304, u32::MAX] {
            assert_eq!(uint_len(v), enc(v).len(), "value {v:#x}");
        }
    }

    #[test]
    fn nested_expression_encoding() {
        let expr = Expression::binary(
            BinaryOp::Equal,
            Expression::local_str(1),
            Expression::text("hi"),
        );
        assert_eq!(expr.encode(), vec![0xE4, 0xEA, 0x02, 0xFF, 0x03, b'h', b'i']);
        assert_eq!(expr.encoded_len(), 7);
        assert!(expr.max_encoded_len() >= 7);
    }

    #[test]
    fn builder_wraps_macros() {
        let s = SeStringBuilder::new()
            .push_text("a")
            .push_macro(MacroCode::Num, &[Expression::Integer(5)])
            .build();
        assert_eq!(s.as_bytes(), &[b'a', 0x02, 0x20, 0x02, 0x06, 0x03]);
    }
}
