// src/sestring.rs
//! Borrowed and owned views over encoded styled strings.
//!
//! A styled string is a sequence of payloads: runs of UTF-8 text and macro
//! envelopes `0x02, code, length, body, 0x03`. Macro bodies are sequences of
//! expressions.

use std::fmt;

use itertools::Itertools;
use serde::Deserialize;

use crate::parser::{self, Parser};

pub const START_BYTE: u8 = 0x02;
pub const END_BYTE: u8 = 0x03;

/// Expression marker bytes.
pub mod marker {
    pub const MILLISECOND: u8 = 0xD8;
    pub const SECOND: u8 = 0xD9;
    pub const MINUTE: u8 = 0xDA;
    pub const HOUR: u8 = 0xDB;
    pub const DAY: u8 = 0xDC;
    pub const WEEKDAY: u8 = 0xDD;
    pub const MONTH: u8 = 0xDE;
    pub const YEAR: u8 = 0xDF;
    pub const STACK_COLOR: u8 = 0xEC;
    pub const STRING: u8 = 0xFF;

    pub const fn is_placeholder(b: u8) -> bool {
        matches!(b, 0xD0..=0xDF | STACK_COLOR)
    }

    pub(crate) fn placeholder_name(b: u8) -> Option<&'static str> {
        Some(match b {
            MILLISECOND => "millisecond",
            SECOND => "second",
            MINUTE => "minute",
            HOUR => "hour",
            DAY => "day",
            WEEKDAY => "weekday",
            MONTH => "month",
            YEAR => "year",
            STACK_COLOR => "stackcolor",
            _ => return None,
        })
    }
}

macro_rules! macro_codes {
    ($($name:ident = $value:literal,)*) => {
        /// Known macro codes.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum MacroCode {
            $($name = $value,)*
        }

        impl MacroCode {
            pub const ALL: &'static [MacroCode] = &[$(MacroCode::$name,)*];

            pub fn from_u8(code: u8) -> Option<Self> {
                match code {
                    $($value => Some(MacroCode::$name),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(MacroCode::$name => stringify!($name),)*
                }
            }
        }
    };
}

macro_codes! {
    SetResetTime = 0x06,
    SetTime = 0x07,
    If = 0x08,
    Switch = 0x09,
    PcName = 0x0A,
    IfPcGender = 0x0B,
    IfPcName = 0x0C,
    Josa = 0x0D,
    Josaro = 0x0E,
    IfSelf = 0x0F,
    NewLine = 0x10,
    Wait = 0x11,
    Icon = 0x12,
    Color = 0x13,
    EdgeColor = 0x14,
    ShadowColor = 0x15,
    SoftHyphen = 0x16,
    Key = 0x17,
    Scale = 0x18,
    Bold = 0x19,
    Italic = 0x1A,
    Edge = 0x1B,
    Shadow = 0x1C,
    NonBreakingSpace = 0x1D,
    Icon2 = 0x1E,
    Hyphen = 0x1F,
    Num = 0x20,
    Hex = 0x21,
    Kilo = 0x22,
    Byte = 0x23,
    Sec = 0x24,
    Time = 0x25,
    Float = 0x26,
    Link = 0x27,
    Sheet = 0x28,
    String = 0x29,
    Caps = 0x2A,
    Head = 0x2B,
    Split = 0x2C,
    HeadAll = 0x2D,
    Fixed = 0x2E,
    Lower = 0x2F,
    JaNoun = 0x30,
    EnNoun = 0x31,
    DeNoun = 0x32,
    FrNoun = 0x33,
    ChNoun = 0x34,
    LowerHead = 0x40,
    ColorType = 0x48,
    EdgeColorType = 0x49,
    Digit = 0x50,
    Ordinal = 0x51,
    Sound = 0x60,
    LevelPos = 0x61,
}

impl TryFrom<u8> for MacroCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        MacroCode::from_u8(code).ok_or(code)
    }
}

/// Parameter reference kinds. The operand is a 1-based index.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    LocalNumber = 0xE8,
    GlobalNumber = 0xE9,
    LocalString = 0xEA,
    GlobalString = 0xEB,
}

impl ParamKind {
    pub fn from_marker(b: u8) -> Option<Self> {
        match b {
            0xE8 => Some(Self::LocalNumber),
            0xE9 => Some(Self::GlobalNumber),
            0xEA => Some(Self::LocalString),
            0xEB => Some(Self::GlobalString),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LocalNumber => "lnum",
            Self::GlobalNumber => "gnum",
            Self::LocalString => "lstr",
            Self::GlobalString => "gstr",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    GreaterOrEqual = 0xE0,
    Greater = 0xE1,
    LessOrEqual = 0xE2,
    Less = 0xE3,
    Equal = 0xE4,
    NotEqual = 0xE5,
}

impl BinaryOp {
    pub fn from_marker(b: u8) -> Option<Self> {
        match b {
            0xE0 => Some(Self::GreaterOrEqual),
            0xE1 => Some(Self::Greater),
            0xE2 => Some(Self::LessOrEqual),
            0xE3 => Some(Self::Less),
            0xE4 => Some(Self::Equal),
            0xE5 => Some(Self::NotEqual),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::Less => "<",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// Borrowed encoded string.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeStr<'a>(&'a [u8]);

impl<'a> SeStr<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn payloads(&self) -> Payloads<'a> {
        Payloads {
            parser: Parser::new(self.0),
        }
    }

    pub fn to_se_string(&self) -> SeString {
        SeString(self.0.to_vec())
    }
}

impl<'a> From<&'a [u8]> for SeStr<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }
}

impl<'a> From<&'a str> for SeStr<'a> {
    fn from(text: &'a str) -> Self {
        Self(text.as_bytes())
    }
}

/// Owned encoded string.
///
/// Deserializes from plain text, an array of bytes, or `{"hex": ".."}`.
#[derive(Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "SeStringRepr")]
pub struct SeString(Vec<u8>);

#[derive(Deserialize)]
#[serde(untagged)]
enum SeStringRepr {
    Text(String),
    Bytes(Vec<u8>),
    Encoded { hex: String },
}

impl TryFrom<SeStringRepr> for SeString {
    type Error = String;

    fn try_from(repr: SeStringRepr) -> Result<Self, Self::Error> {
        match repr {
            SeStringRepr::Text(s) => Ok(SeString::text(&s)),
            SeStringRepr::Bytes(b) => Ok(SeString(b)),
            SeStringRepr::Encoded { hex } => SeString::from_hex(&hex).map_err(|e| e.to_string()),
        }
    }
}

impl SeString {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps raw text. Bytes `0x00` and `0x02` inside `text` are not escaped.
    pub fn text(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }

    pub fn from_hex(input: &str) -> crate::errors::Result<Self> {
        crate::engine::parse_hex(input).map(Self)
    }

    pub fn as_se_str(&self) -> SeStr<'_> {
        SeStr(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn payloads(&self) -> Payloads<'_> {
        self.as_se_str().payloads()
    }
}

impl From<Vec<u8>> for SeString {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for SeString {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for SeString {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

pub struct Payloads<'a> {
    parser: Parser<'a>,
}

impl<'a> Iterator for Payloads<'a> {
    type Item = Payload<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_payload()
    }
}

/// One element of a styled string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    Text(&'a [u8]),
    Macro {
        code: u8,
        body: &'a [u8],
        envelope: &'a [u8],
    },
    /// A stray `0x00` byte or the first byte of a malformed envelope.
    Invalid(&'a [u8]),
}

impl<'a> Payload<'a> {
    pub fn envelope(&self) -> &'a [u8] {
        match *self {
            Payload::Text(b) | Payload::Invalid(b) => b,
            Payload::Macro { envelope, .. } => envelope,
        }
    }

    pub fn body(&self) -> &'a [u8] {
        match *self {
            Payload::Text(b) | Payload::Invalid(b) => b,
            Payload::Macro { body, .. } => body,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Payload::Text(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Payload::Invalid(_))
    }

    pub fn code(&self) -> Option<u8> {
        match *self {
            Payload::Macro { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn macro_code(&self) -> Option<MacroCode> {
        self.code().and_then(MacroCode::from_u8)
    }

    /// Expressions of a macro body; empty for text and invalid payloads.
    pub fn expressions(&self) -> Expressions<'a> {
        let body = match *self {
            Payload::Macro { body, .. } => body,
            _ => &[],
        };
        Expressions {
            parser: Parser::new(body),
        }
    }

    /// The first `N` expressions, or `None` when the body holds fewer.
    pub fn args<const N: usize>(&self) -> Option<[Expr<'a>; N]> {
        let mut out = [Expr::default(); N];
        let mut it = self.expressions();
        for slot in out.iter_mut() {
            *slot = it.next()?;
        }
        Some(out)
    }
}

pub struct Expressions<'a> {
    parser: Parser<'a>,
}

impl<'a> Expressions<'a> {
    /// Body bytes not yet consumed.
    pub fn remainder(&self) -> &'a [u8] {
        self.parser.remaining()
    }
}

impl<'a> Iterator for Expressions<'a> {
    type Item = Expr<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next_expression()
    }
}

/// Borrowed view of one encoded expression.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Expr<'a>(&'a [u8]);

impl<'a> Expr<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    pub fn first_byte(&self) -> Option<u8> {
        self.0.first().copied()
    }

    pub fn as_uint(&self) -> Option<u32> {
        parser::decode_uint(self.0).map(|(v, _)| v)
    }

    pub fn as_string(&self) -> Option<SeStr<'a>> {
        parser::decode_string(self.0).map(|(body, _)| SeStr(body))
    }

    pub fn as_placeholder(&self) -> Option<u8> {
        parser::decode_placeholder(self.0)
    }

    pub fn as_parameter(&self) -> Option<(ParamKind, Expr<'a>)> {
        parser::decode_parameter(self.0).map(|(kind, operand, _)| (kind, Expr(operand)))
    }

    pub fn as_binary(&self) -> Option<(BinaryOp, Expr<'a>, Expr<'a>)> {
        parser::decode_binary(self.0).map(|(op, lhs, rhs, _)| (op, Expr(lhs), Expr(rhs)))
    }

    pub fn is_stack_color(&self) -> bool {
        self.as_placeholder() == Some(marker::STACK_COLOR)
    }

    pub fn to_expression(&self) -> Result<Expression, parser::ParseError> {
        parser::parse_expression(self.0)
    }
}

/// Owned expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Integer(u32),
    Placeholder(u8),
    Parameter(ParamKind, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    String(SeString),
}

impl Expression {
    pub fn signed(value: i32) -> Self {
        Expression::Integer(value as u32)
    }

    pub fn text(text: &str) -> Self {
        Expression::String(SeString::text(text))
    }

    pub fn param(kind: ParamKind, index: u32) -> Self {
        Expression::Parameter(kind, Box::new(Expression::Integer(index)))
    }

    pub fn local_num(index: u32) -> Self {
        Self::param(ParamKind::LocalNumber, index)
    }

    pub fn local_str(index: u32) -> Self {
        Self::param(ParamKind::LocalString, index)
    }

    pub fn global_num(index: u32) -> Self {
        Self::param(ParamKind::GlobalNumber, index)
    }

    pub fn global_str(index: u32) -> Self {
        Self::param(ParamKind::GlobalString, index)
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(v) => write!(f, "{v}"),
            Expression::Placeholder(b) => match marker::placeholder_name(*b) {
                Some(name) => f.write_str(name),
                None => write!(f, "placeholder(0x{b:02X})"),
            },
            Expression::Parameter(kind, index) => write!(f, "{}({index})", kind.name()),
            Expression::Binary(op, lhs, rhs) => write!(f, "[{lhs} {} {rhs}]", op.symbol()),
            Expression::String(s) => write!(f, "\"{s}\""),
        }
    }
}

impl fmt::Display for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_expression() {
            Ok(expr) => write!(f, "{expr}"),
            Err(_) => write!(f, "<{:02X}>", self.0.iter().format(" ")),
        }
    }
}

impl fmt::Debug for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({self})")
    }
}

impl fmt::Display for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Payload::Text(b) => f.write_str(&String::from_utf8_lossy(b)),
            Payload::Invalid(b) => write!(f, "<invalid {:02X}>", b.iter().format(" ")),
            Payload::Macro { code, .. } => {
                let name = MacroCode::from_u8(code)
                    .map_or_else(|| format!("0x{code:02X}"), |c| c.name().to_string());
                write!(f, "<{name}({})>", self.expressions().format(", "))
            }
        }
    }
}

impl fmt::Display for SeStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.payloads().try_for_each(|p| write!(f, "{p}"))
    }
}

impl fmt::Debug for SeStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeStr({:?})", self.to_string())
    }
}

impl fmt::Display for SeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_se_str().fmt(f)
    }
}

impl fmt::Debug for SeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeString({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn macro_codes_round_trip_through_u8() {
        for code in MacroCode::ALL {
            assert_eq!(MacroCode::from_u8(*code as u8), Some(*code));
        }
        assert_eq!(MacroCode::from_u8(0x05), None);
        assert_eq!(MacroCode::try_from(0x61), Ok(MacroCode::LevelPos));
    }

    #[test]
    fn args_require_enough_expressions() {
        let bytes = [0x02, 0x08, 0x03, 0x02, 0x03, 0x03];
        let payload = SeStr::new(&bytes).payloads().next().unwrap();
        let [a, b] = payload.args::<2>().unwrap();
        assert_eq!(a.as_uint(), Some(1));
        assert_eq!(b.as_uint(), Some(2));
        assert!(payload.args::<3>().is_none());
    }

    #[test]
    fn display_of_nested_macro() {
        // If(lnum(1) == 2, "a", "b")
        let bytes = [
            0x02, 0x08, 0x0B, 0xE4, 0xE8, 0x02, 0x03, 0xFF, 0x02, b'a', 0xFF, 0x02, b'b', 0x03,
        ];
        let s = SeStr::new(&bytes);
        assert_eq!(s.to_string(), "<If([lnum(1) == 2], \"a\", \"b\")>");
    }

    #[test]
    fn undecodable_expression_is_one_byte() {
        let bytes = [0x02, 0x20, 0x03, 0x00, 0x05, 0x03];
        let payload = SeStr::new(&bytes).payloads().next().unwrap();
        let exprs: Vec<_> = payload.expressions().map(|e| e.as_bytes().to_vec()).collect();
        assert_eq!(exprs, vec![vec![0x00], vec![0x05]]);
    }
}
