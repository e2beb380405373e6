// src/format.rs
//! Number formatting into fixed buffers, and output helpers that honor a
//! context's char/byte preference.

use crate::context::EvalContext;

/// Right-aligned ASCII digits in a stack buffer.
pub(crate) struct DigitBuf {
    buf: [u8; 16],
    start: usize,
}

impl DigitBuf {
    fn empty() -> Self {
        Self {
            buf: [0; 16],
            start: 16,
        }
    }

    fn push_front(&mut self, b: u8) {
        self.start -= 1;
        self.buf[self.start] = b;
    }

    /// Decimal digits, zero-padded to at least `min_width`.
    pub fn unsigned(mut value: u32, min_width: usize) -> Self {
        let mut out = Self::empty();
        loop {
            out.push_front(b'0' + (value % 10) as u8);
            value /= 10;
            if value == 0 {
                break;
            }
        }
        while out.len() < min_width.min(10) {
            out.push_front(b'0');
        }
        out
    }

    pub fn signed(value: i32) -> Self {
        let mut out = Self::unsigned(value.unsigned_abs(), 0);
        if value < 0 {
            out.push_front(b'-');
        }
        out
    }

    /// `0x` followed by eight uppercase hex digits.
    pub fn hex8(value: u32) -> Self {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = Self::empty();
        for i in 0..8 {
            out.push_front(DIGITS[((value >> (i * 4)) & 0xF) as usize]);
        }
        out.push_front(b'x');
        out.push_front(b'0');
        out
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

/// Emits `text` through whichever channel the context prefers.
pub(crate) fn produce_str(ctx: &mut dyn EvalContext, text: &str) {
    if ctx.prefer_char_output() {
        ctx.produce_chars(text);
    } else {
        ctx.produce_bytes(text.as_bytes());
    }
}

pub(crate) fn produce_digits(ctx: &mut dyn EvalContext, digits: &DigitBuf) {
    produce_str(ctx, digits.as_str());
}

pub(crate) fn produce_decimal(ctx: &mut dyn EvalContext, value: i32) {
    produce_digits(ctx, &DigitBuf::signed(value));
}

/// Human-readable byte count: up to three divisions by 1024, one decimal,
/// then a `K`/`M`/`G` suffix.
pub(crate) fn byte_size(value: i32) -> String {
    const UNITS: &[u8; 4] = b" KMG";
    let mut v = f64::from(value);
    let mut unit = 0;
    while v >= 1024.0 && unit < 3 {
        v /= 1024.0;
        unit += 1;
    }
    let mut out = format!("{v:.1}");
    if unit > 0 {
        out.push(char::from(UNITS[unit]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decimal_digits() {
        assert_eq!(DigitBuf::unsigned(0, 0).as_str(), "0");
        assert_eq!(DigitBuf::unsigned(7, 2).as_str(), "07");
        assert_eq!(DigitBuf::unsigned(123, 2).as_str(), "123");
        assert_eq!(DigitBuf::unsigned(u32::MAX, 0).as_str(), "4294967295");
        assert_eq!(DigitBuf::signed(-42).as_str(), "-42");
        assert_eq!(DigitBuf::signed(i32::MIN).as_str(), "-2147483648");
    }

    #[test]
    fn hex_digits() {
        assert_eq!(DigitBuf::hex8(0).as_str(), "0x00000000");
        assert_eq!(DigitBuf::hex8(0xABCDEF).as_str(), "0x00ABCDEF");
        assert_eq!(DigitBuf::hex8(u32::MAX).as_str(), "0xFFFFFFFF");
    }

    #[test]
    fn byte_sizes() {
        assert_eq!(byte_size(0), "0.0");
        assert_eq!(byte_size(1023), "1023.0");
        assert_eq!(byte_size(1536), "1.5K");
        assert_eq!(byte_size(3 * 1024 * 1024), "3.0M");
    }
}
