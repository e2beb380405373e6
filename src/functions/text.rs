use super::Macro;
use crate::context::EvalContext;
use crate::format::{byte_size, produce_decimal, produce_digits, produce_str, DigitBuf};
use crate::scopes::StringCollector;
use crate::sestring::{MacroCode, Payload};
use crate::Evaluator;

pub struct NewLine;

impl Macro for NewLine {
    fn code(&self) -> MacroCode {
        MacroCode::NewLine
    }

    fn call(&self, _ev: &Evaluator, ctx: &mut dyn EvalContext, _payload: &Payload<'_>) -> bool {
        ctx.produce_new_line();
        true
    }
}

pub struct SoftHyphen;

impl Macro for SoftHyphen {
    fn code(&self) -> MacroCode {
        MacroCode::SoftHyphen
    }

    fn call(&self, _ev: &Evaluator, ctx: &mut dyn EvalContext, _payload: &Payload<'_>) -> bool {
        produce_str(ctx, "\u{AD}");
        true
    }
}

pub struct NonBreakingSpace;

impl Macro for NonBreakingSpace {
    fn code(&self) -> MacroCode {
        MacroCode::NonBreakingSpace
    }

    fn call(&self, _ev: &Evaluator, ctx: &mut dyn EvalContext, _payload: &Payload<'_>) -> bool {
        produce_str(ctx, "\u{A0}");
        true
    }
}

pub struct Hyphen;

impl Macro for Hyphen {
    fn code(&self) -> MacroCode {
        MacroCode::Hyphen
    }

    fn call(&self, _ev: &Evaluator, ctx: &mut dyn EvalContext, _payload: &Payload<'_>) -> bool {
        produce_str(ctx, "-");
        true
    }
}

/// Signed decimal; `0` when the argument is missing or unresolvable.
pub struct Num;

impl Macro for Num {
    fn code(&self) -> MacroCode {
        MacroCode::Num
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let value = payload
            .args::<1>()
            .and_then(|[v]| ev.resolve_int(ctx, v))
            .unwrap_or(0);
        produce_decimal(ctx, value);
        true
    }
}

pub struct Hex;

impl Macro for Hex {
    fn code(&self) -> MacroCode {
        MacroCode::Hex
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let value = payload
            .args::<1>()
            .and_then(|[v]| ev.resolve_uint(ctx, v))
            .unwrap_or(0);
        produce_digits(ctx, &DigitBuf::hex8(value));
        true
    }
}

/// `Kilo(value, separator)`: decimal with the separator expression
/// evaluated between groups of three digits.
pub struct Kilo;

impl Macro for Kilo {
    fn code(&self) -> MacroCode {
        MacroCode::Kilo
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let resolved = payload
            .args::<2>()
            .and_then(|[v, sep]| Some((ev.resolve_int(ctx, v)?, sep)));
        let Some((value, separator)) = resolved else {
            produce_str(ctx, "0");
            return true;
        };
        if value < 0 {
            produce_str(ctx, "-");
        }
        // the magnitude is unsigned so i32::MIN needs no special case
        let digits = DigitBuf::unsigned(value.unsigned_abs(), 0);
        let digits = digits.as_str();
        let head = match digits.len() % 3 {
            0 => 3,
            n => n,
        };
        produce_str(ctx, &digits[..head]);
        let mut rest = &digits[head..];
        while !rest.is_empty() {
            ev.resolve_string_expression(ctx, separator);
            produce_str(ctx, &rest[..3]);
            rest = &rest[3..];
        }
        true
    }
}

/// Byte count with a binary `K`/`M`/`G` suffix.
pub struct Byte;

impl Macro for Byte {
    fn code(&self) -> MacroCode {
        MacroCode::Byte
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some(value) = payload.args::<1>().and_then(|[v]| ev.resolve_int(ctx, v)) else {
            return false;
        };
        produce_str(ctx, &byte_size(value));
        true
    }
}

/// Two-digit zero-padded number; `00` when unresolvable.
pub struct Sec;

impl Macro for Sec {
    fn code(&self) -> MacroCode {
        MacroCode::Sec
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let value = payload
            .args::<1>()
            .and_then(|[v]| ev.resolve_uint(ctx, v))
            .unwrap_or(0);
        produce_digits(ctx, &DigitBuf::unsigned(value, 2));
        true
    }
}

/// `Float(value, radix, separator)`: fixed-point number `value / radix`.
/// The fraction gets one digit per factor of ten in the radix.
/// A radix of zero or below fails without output.
pub struct Float;

impl Float {
    fn split(value: i32, radix: i32) -> Option<(i32, i32)> {
        if radix <= 0 {
            return None;
        }
        let integer = value.checked_div_euclid(radix)?;
        let fraction = value.checked_rem_euclid(radix)?;
        Some((integer, fraction))
    }
}

impl Macro for Float {
    fn code(&self) -> MacroCode {
        MacroCode::Float
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        let Some([value, radix, separator]) = payload.args::<3>() else {
            return false;
        };
        let (Some(value), Some(radix)) = (ev.resolve_int(ctx, value), ev.resolve_int(ctx, radix))
        else {
            return false;
        };
        let Some((integer, mut fraction)) = Self::split(value, radix) else {
            return false;
        };
        produce_decimal(ctx, integer);
        ev.resolve_string_expression(ctx, separator);

        let mut digits = [0u8; 10];
        let mut start = digits.len();
        let mut r = radix;
        while r > 1 {
            start -= 1;
            digits[start] = b'0' + (fraction % 10) as u8;
            fraction /= 10;
            r /= 10;
        }
        ctx.produce_bytes(&digits[start..]);
        true
    }
}

/// `String(expr)`: the string form of one expression.
pub struct StringMacro;

impl Macro for StringMacro {
    fn code(&self) -> MacroCode {
        MacroCode::String
    }

    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
        payload
            .args::<1>()
            .is_some_and(|[s]| ev.resolve_string_expression(ctx, s))
    }
}

#[derive(Clone, Copy)]
enum Case {
    Upper,
    Lower,
    UpperFirst,
    LowerFirst,
    UpperWords,
}

impl Case {
    fn apply(self, text: &str) -> String {
        match self {
            Case::Upper => text.to_uppercase(),
            Case::Lower => text.to_lowercase(),
            Case::UpperFirst => map_first(text, char::to_uppercase),
            Case::LowerFirst => map_first(text, char::to_lowercase),
            Case::UpperWords => {
                let mut out = String::with_capacity(text.len());
                let mut at_word_start = true;
                for c in text.chars() {
                    if at_word_start && c.is_alphabetic() {
                        out.extend(c.to_uppercase());
                    } else {
                        out.push(c);
                    }
                    at_word_start = c.is_whitespace();
                }
                out
            }
        }
    }

    // byte-wise ASCII fallback for output that is not valid UTF-8
    fn apply_ascii(self, mut bytes: Vec<u8>) -> Vec<u8> {
        match self {
            Case::Upper => bytes.make_ascii_uppercase(),
            Case::Lower => bytes.make_ascii_lowercase(),
            Case::UpperFirst => {
                if let Some(b) = bytes.first_mut() {
                    b.make_ascii_uppercase();
                }
            }
            Case::LowerFirst => {
                if let Some(b) = bytes.first_mut() {
                    b.make_ascii_lowercase();
                }
            }
            Case::UpperWords => {
                let mut at_word_start = true;
                for b in bytes.iter_mut() {
                    if at_word_start {
                        b.make_ascii_uppercase();
                    }
                    at_word_start = b.is_ascii_whitespace();
                }
            }
        }
        bytes
    }
}

fn map_first<I, F>(text: &str, f: F) -> String
where
    I: Iterator<Item = char>,
    F: Fn(char) -> I,
{
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => f(first).chain(chars).collect(),
        None => String::new(),
    }
}

fn produce_cased(ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>, case: Case) -> bool {
    let Some([arg]) = payload.args::<1>() else {
        return false;
    };
    let Some(collected) = StringCollector::collect(ev, ctx, arg) else {
        return false;
    };
    match String::from_utf8(collected) {
        Ok(text) => produce_str(ctx, &case.apply(&text)),
        Err(e) => ctx.produce_bytes(&case.apply_ascii(e.into_bytes())),
    }
    true
}

macro_rules! case_macro {
    ($name:ident, $case:expr) => {
        pub struct $name;

        impl Macro for $name {
            fn code(&self) -> MacroCode {
                MacroCode::$name
            }

            fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool {
                produce_cased(ev, ctx, payload, $case)
            }
        }
    };
}

case_macro!(Caps, Case::Upper);
case_macro!(Lower, Case::Lower);
case_macro!(Head, Case::UpperFirst);
case_macro!(LowerHead, Case::LowerFirst);
case_macro!(HeadAll, Case::UpperWords);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::context::{BasicContext, LocalParam};
    use crate::encode::SeStringBuilder;
    use crate::functions::Registry;
    use crate::sestring::Expression;

    use super::*;

    fn render(code: MacroCode, args: &[Expression]) -> (bool, String) {
        let ev = Evaluator::new(Registry::with_builtins());
        let s = SeStringBuilder::new().push_macro(code, args).build();
        let mut ctx = BasicContext::new();
        let ok = ev.resolve_string(&mut ctx, s.as_se_str());
        (ok, ctx.text())
    }

    fn text(code: MacroCode, args: &[Expression]) -> String {
        render(code, args).1
    }

    #[test]
    fn fixed_glyphs() {
        assert_eq!(text(MacroCode::NewLine, &[]), "\n");
        assert_eq!(text(MacroCode::SoftHyphen, &[]), "\u{AD}");
        assert_eq!(text(MacroCode::NonBreakingSpace, &[]), "\u{A0}");
        assert_eq!(text(MacroCode::Hyphen, &[]), "-");
    }

    #[test]
    fn glyphs_as_bytes() {
        let ev = Evaluator::new(Registry::with_builtins());
        let s = SeStringBuilder::new()
            .push_macro(MacroCode::SoftHyphen, &[])
            .build();
        let mut ctx = BasicContext::new().with_byte_output(true);
        assert!(ev.resolve_string(&mut ctx, s.as_se_str()));
        assert_eq!(ctx.output(), &[0xC2, 0xAD]);
    }

    #[test]
    fn numbers() {
        assert_eq!(text(MacroCode::Num, &[Expression::signed(-12)]), "-12");
        assert_eq!(text(MacroCode::Num, &[]), "0");
        assert_eq!(text(MacroCode::Hex, &[Expression::Integer(255)]), "0x000000FF");
        assert_eq!(text(MacroCode::Hex, &[Expression::local_num(1)]), "0x00000000");
        assert_eq!(text(MacroCode::Sec, &[Expression::Integer(5)]), "05");
        assert_eq!(text(MacroCode::Sec, &[]), "00");
        assert_eq!(text(MacroCode::Byte, &[Expression::Integer(2048)]), "2.0K");
    }

    #[test]
    fn kilo_groups_digits() {
        let sep = Expression::text(",");
        assert_eq!(
            text(MacroCode::Kilo, &[Expression::Integer(1_234_567), sep.clone()]),
            "1,234,567"
        );
        assert_eq!(text(MacroCode::Kilo, &[Expression::Integer(999), sep.clone()]), "999");
        assert_eq!(text(MacroCode::Kilo, &[Expression::Integer(0), sep.clone()]), "0");
        assert_eq!(
            text(MacroCode::Kilo, &[Expression::signed(-1000), sep.clone()]),
            "-1,000"
        );
        assert_eq!(
            text(MacroCode::Kilo, &[Expression::signed(i32::MIN), sep]),
            "-2,147,483,648"
        );
        assert_eq!(text(MacroCode::Kilo, &[Expression::Integer(5)]), "0");
    }

    #[test]
    fn float_fixed_point() {
        let dot = Expression::text(".");
        assert_eq!(
            render(MacroCode::Float, &[Expression::Integer(1234), Expression::Integer(100), dot.clone()]),
            (true, "12.34".to_string())
        );
        assert_eq!(
            text(MacroCode::Float, &[Expression::Integer(1205), Expression::Integer(100), dot.clone()]),
            "12.05"
        );
        // floor division keeps the fraction positive
        assert_eq!(
            text(MacroCode::Float, &[Expression::signed(-5), Expression::Integer(10), dot]),
            "-1.5"
        );
    }

    #[test]
    fn float_rejects_non_positive_radix() {
        let dot = Expression::text(".");
        for radix in [Expression::Integer(0), Expression::signed(-10)] {
            assert_eq!(
                render(MacroCode::Float, &[Expression::Integer(5), radix, dot.clone()]),
                (false, String::new())
            );
        }
    }

    #[test]
    fn string_macro() {
        let ev = Evaluator::new(Registry::with_builtins());
        let s = SeStringBuilder::new()
            .push_macro(MacroCode::String, &[Expression::local_str(1)])
            .build();
        let mut ctx = BasicContext::new().with_params(vec![LocalParam::Text("hello".into())]);
        assert!(ev.resolve_string(&mut ctx, s.as_se_str()));
        assert_eq!(ctx.text(), "hello");
    }

    #[test]
    fn case_transforms() {
        let arg = || vec![Expression::text("hello wORLD")];
        assert_eq!(text(MacroCode::Caps, &arg()), "HELLO WORLD");
        assert_eq!(text(MacroCode::Lower, &arg()), "hello world");
        assert_eq!(text(MacroCode::Head, &arg()), "Hello wORLD");
        assert_eq!(text(MacroCode::HeadAll, &arg()), "Hello WORLD");
        assert_eq!(text(MacroCode::LowerHead, &[Expression::text("ABC")]), "aBC");
        assert_eq!(render(MacroCode::Caps, &[]), (false, String::new()));
    }
}
