// src/parser.rs
use thiserror::Error;

use crate::sestring::{
    marker, BinaryOp, Expr, Expression, ParamKind, Payload, SeString, END_BYTE, START_BYTE,
};

/// Nesting limit for parameter and comparison operands while measuring or
/// decoding an expression.
pub const MAX_EXPRESSION_NESTING: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("input ended inside an expression")]
    Truncated,
    #[error("unknown expression marker 0x{0:02X}")]
    UnknownMarker(u8),
    #[error("zero byte inside a packed integer")]
    ZeroIntegerByte,
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("{0} trailing bytes after expression")]
    TrailingBytes(usize),
    #[error("string length does not fit a signed 32-bit integer")]
    NegativeLength,
}

/// Decodes an integer expression at the start of `span`.
pub fn decode_uint_checked(span: &[u8]) -> Result<(u32, usize), ParseError> {
    let first = *span.first().ok_or(ParseError::Truncated)?;
    match first {
        0x01..=0xCF => Ok((u32::from(first) - 1, 1)),
        0xF0..=0xFE => {
            if span.len() < 2 {
                return Err(ParseError::Truncated);
            }
            let mask = first.wrapping_add(1) & 0x0F;
            let mut value = 0u32;
            let mut len = 1;
            for shift in [24u32, 16, 8, 0] {
                if mask & (1 << (shift / 8)) == 0 {
                    continue;
                }
                let byte = *span.get(len).ok_or(ParseError::Truncated)?;
                if byte == 0 {
                    return Err(ParseError::ZeroIntegerByte);
                }
                value |= u32::from(byte) << shift;
                len += 1;
            }
            Ok((value, len))
        }
        other => Err(ParseError::UnknownMarker(other)),
    }
}

/// Returns the value and consumed length of the integer at the start of `span`.
pub fn decode_uint(span: &[u8]) -> Option<(u32, usize)> {
    decode_uint_checked(span).ok()
}

fn string_bounds(span: &[u8]) -> Result<(usize, usize), ParseError> {
    if span.first() != Some(&marker::STRING) {
        return Err(span
            .first()
            .map_or(ParseError::Truncated, |b| ParseError::UnknownMarker(*b)));
    }
    if span.len() < 2 {
        return Err(ParseError::Truncated);
    }
    let (len, n) = decode_uint_checked(&span[1..])?;
    if len > i32::MAX as u32 {
        return Err(ParseError::NegativeLength);
    }
    let start = 1 + n;
    let end = start
        .checked_add(len as usize)
        .ok_or(ParseError::Truncated)?;
    if end > span.len() {
        return Err(ParseError::Truncated);
    }
    Ok((start, end))
}

/// Decodes a string literal, returning the body and the total consumed length.
pub fn decode_string(span: &[u8]) -> Option<(&[u8], usize)> {
    let (start, end) = string_bounds(span).ok()?;
    Some((&span[start..end], end))
}

pub fn decode_placeholder(span: &[u8]) -> Option<u8> {
    span.first().copied().filter(|b| marker::is_placeholder(*b))
}

/// Decodes a parameter expression: the kind and the operand span.
pub fn decode_parameter(span: &[u8]) -> Option<(ParamKind, &[u8], usize)> {
    let kind = ParamKind::from_marker(*span.first()?)?;
    let len = expression_len_at(&span[1..], 1).ok()?;
    Some((kind, &span[1..1 + len], 1 + len))
}

/// Decodes a comparison expression: the operator and both operand spans.
pub fn decode_binary(span: &[u8]) -> Option<(BinaryOp, &[u8], &[u8], usize)> {
    let op = BinaryOp::from_marker(*span.first()?)?;
    let lhs_len = expression_len_at(&span[1..], 1).ok()?;
    let rest = &span[1 + lhs_len..];
    let rhs_len = expression_len_at(rest, 1).ok()?;
    Some((op, &span[1..1 + lhs_len], &rest[..rhs_len], 1 + lhs_len + rhs_len))
}

/// Byte length of the expression at the start of `span`.
pub fn expression_len(span: &[u8]) -> Result<usize, ParseError> {
    expression_len_at(span, 0)
}

fn expression_len_at(span: &[u8], depth: usize) -> Result<usize, ParseError> {
    if depth > MAX_EXPRESSION_NESTING {
        return Err(ParseError::TooDeep);
    }
    let first = *span.first().ok_or(ParseError::Truncated)?;
    match first {
        0x01..=0xCF | 0xF0..=0xFE => decode_uint_checked(span).map(|(_, n)| n),
        marker::STRING => string_bounds(span).map(|(_, end)| end),
        b if marker::is_placeholder(b) => Ok(1),
        b if ParamKind::from_marker(b).is_some() => {
            Ok(1 + expression_len_at(&span[1..], depth + 1)?)
        }
        b if BinaryOp::from_marker(b).is_some() => {
            let lhs = expression_len_at(&span[1..], depth + 1)?;
            let rhs = expression_len_at(&span[1 + lhs..], depth + 1)?;
            Ok(1 + lhs + rhs)
        }
        other => Err(ParseError::UnknownMarker(other)),
    }
}

/// Cursor over an encoded byte sequence. Yields payloads of a string, or the
/// expressions of a macro body.
pub struct Parser<'a> {
    s: &'a [u8],
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a [u8]) -> Self {
        Self { s, i: 0 }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.s[self.i.min(self.s.len())..]
    }

    pub fn position(&self) -> usize {
        self.i
    }

    fn peek_byte(&self) -> Option<u8> {
        self.s.get(self.i).copied()
    }

    /// Splits off the next payload. Malformed input never stops iteration;
    /// it comes out as one-byte invalid payloads.
    pub fn next_payload(&mut self) -> Option<Payload<'a>> {
        let rest = self.remaining();
        let first = self.peek_byte()?;
        if first == 0 {
            self.i += 1;
            return Some(Payload::Invalid(&rest[..1]));
        }
        if first != START_BYTE {
            let len = rest
                .iter()
                .position(|b| *b == START_BYTE || *b == 0)
                .unwrap_or(rest.len());
            self.i += len;
            return Some(Payload::Text(&rest[..len]));
        }
        match Self::macro_bounds(rest) {
            Some((code, body_start, end)) => {
                self.i += end;
                Some(Payload::Macro {
                    code,
                    body: &rest[body_start..end - 1],
                    envelope: &rest[..end],
                })
            }
            None => {
                self.i += 1;
                Some(Payload::Invalid(&rest[..1]))
            }
        }
    }

    // (code, body start, envelope end) of a well-formed macro envelope
    fn macro_bounds(rest: &[u8]) -> Option<(u8, usize, usize)> {
        let code = *rest.get(1)?;
        let (body_len, n) = decode_uint(rest.get(2..)?)?;
        if body_len > i32::MAX as u32 {
            return None;
        }
        let body_start = 2 + n;
        let end = body_start.checked_add(body_len as usize)?.checked_add(1)?;
        if end > rest.len() || rest[end - 1] != END_BYTE {
            return None;
        }
        Some((code, body_start, end))
    }

    /// Splits off the next expression of a macro body. An undecodable byte is
    /// yielded on its own so iteration can continue past it.
    pub fn next_expression(&mut self) -> Option<Expr<'a>> {
        if self.eof() {
            return None;
        }
        let rest = self.remaining();
        let len = expression_len(rest).unwrap_or(1);
        self.i += len;
        Some(Expr::new(&rest[..len]))
    }

    /// Decodes one owned expression and advances past it.
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_expression_at(0)
    }

    fn parse_expression_at(&mut self, depth: usize) -> Result<Expression, ParseError> {
        if depth > MAX_EXPRESSION_NESTING {
            return Err(ParseError::TooDeep);
        }
        let rest = self.remaining();
        let first = self.peek_byte().ok_or(ParseError::Truncated)?;
        match first {
            0x01..=0xCF | 0xF0..=0xFE => {
                let (v, n) = decode_uint_checked(rest)?;
                self.i += n;
                Ok(Expression::Integer(v))
            }
            marker::STRING => {
                let (start, end) = string_bounds(rest)?;
                self.i += end;
                Ok(Expression::String(SeString::from(&rest[start..end])))
            }
            b if marker::is_placeholder(b) => {
                self.i += 1;
                Ok(Expression::Placeholder(b))
            }
            b => {
                if let Some(kind) = ParamKind::from_marker(b) {
                    self.i += 1;
                    let operand = self.parse_expression_at(depth + 1)?;
                    return Ok(Expression::Parameter(kind, Box::new(operand)));
                }
                if let Some(op) = BinaryOp::from_marker(b) {
                    self.i += 1;
                    let lhs = self.parse_expression_at(depth + 1)?;
                    let rhs = self.parse_expression_at(depth + 1)?;
                    return Ok(Expression::Binary(op, Box::new(lhs), Box::new(rhs)));
                }
                Err(ParseError::UnknownMarker(b))
            }
        }
    }
}

/// Decodes exactly one expression covering all of `bytes`.
pub fn parse_expression(bytes: &[u8]) -> Result<Expression, ParseError> {
    let mut p = Parser::new(bytes);
    let expr = p.parse_expression()?;
    if !p.eof() {
        return Err(ParseError::TrailingBytes(bytes.len() - p.position()));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_byte_integers() {
        assert_eq!(decode_uint(&[0x01]), Some((0, 1)));
        assert_eq!(decode_uint(&[0xCF]), Some((0xCE, 1)));
        assert_eq!(decode_uint(&[0x00]), None);
    }

    #[test]
    fn packed_integers() {
        assert_eq!(decode_uint(&[0xF0, 0xCF]), Some((0xCF, 2)));
        // mask 2: only bits 8..15 follow
        assert_eq!(decode_uint(&[0xF1, 0x01]), Some((0x0100, 2)));
        assert_eq!(decode_uint(&[0xF2, 0x01, 0x01]), Some((0x0101, 3)));
        assert_eq!(
            decode_uint(&[0xFE, 0x12, 0x34, 0x56, 0x78]),
            Some((0x1234_5678, 5))
        );
        // 0x01000000 only carries its top byte
        assert_eq!(decode_uint(&[0xF7, 0x01]), Some((0x0100_0000, 2)));
    }

    #[test]
    fn packed_integer_failures() {
        assert_eq!(decode_uint_checked(&[0xF0]), Err(ParseError::Truncated));
        assert_eq!(decode_uint_checked(&[0xF2, 0x01]), Err(ParseError::Truncated));
        assert_eq!(
            decode_uint_checked(&[0xF0, 0x00]),
            Err(ParseError::ZeroIntegerByte)
        );
        assert_eq!(
            decode_uint_checked(&[0xD0]),
            Err(ParseError::UnknownMarker(0xD0))
        );
    }

    #[test]
    fn string_literal() {
        let bytes = [0xFF, 0x04, b'a', b'b', b'c', 0x09];
        assert_eq!(decode_string(&bytes), Some((&b"abc"[..], 5)));
        assert_eq!(decode_string(&[0xFF, 0x05, b'a']), None);
        assert_eq!(decode_string(&[0xFF]), None);
    }

    #[test]
    fn nested_lengths() {
        // lnum(1) >= 5
        let bytes = [0xE0, 0xE8, 0x02, 0x06];
        assert_eq!(expression_len(&bytes), Ok(4));
        let (op, lhs, rhs, len) = decode_binary(&bytes).unwrap();
        assert_eq!(op, BinaryOp::GreaterOrEqual);
        assert_eq!(lhs, &[0xE8, 0x02][..]);
        assert_eq!(rhs, &[0x06][..]);
        assert_eq!(len, 4);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let mut bytes = vec![0xE8; MAX_EXPRESSION_NESTING + 2];
        bytes.push(0x02);
        assert_eq!(expression_len(&bytes), Err(ParseError::TooDeep));
    }

    #[test]
    fn payload_split() {
        let bytes = b"ab\x02\x10\x01\x03cd";
        let mut p = Parser::new(bytes);
        assert_eq!(p.next_payload(), Some(Payload::Text(b"ab")));
        assert_eq!(
            p.next_payload(),
            Some(Payload::Macro {
                code: 0x10,
                body: &[],
                envelope: &bytes[2..6],
            })
        );
        assert_eq!(p.next_payload(), Some(Payload::Text(b"cd")));
        assert_eq!(p.next_payload(), None);
    }

    #[test]
    fn malformed_envelope_is_one_invalid_byte() {
        // declared body length runs past the end
        let bytes = [0x02, 0x20, 0x05, 0x02, 0x03];
        let mut p = Parser::new(&bytes);
        assert_eq!(p.next_payload(), Some(Payload::Invalid(&[0x02])));
        assert_eq!(p.next_payload(), Some(Payload::Text(&[0x20, 0x05])));
    }

    #[test]
    fn trailing_bytes_are_reported() {
        assert_eq!(parse_expression(&[0x02, 0x02]), Err(ParseError::TrailingBytes(1)));
    }
}
