use itertools::Itertools;

use crate::errors::Result;
use crate::sestring::{MacroCode, Payload, SeStr};

/// =========================
/// Public API (hex)
/// =========================

/// Parses hex digits into bytes. Whitespace, `-` and `:` separators and an
/// optional `0x` prefix are ignored.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != ':')
        .collect::<String>();
    Ok(hex::decode(digits)?)
}

/// Uppercase hex digits, no separators.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// =========================
/// Public API (inspection)
/// =========================

/// One line per payload: kind, code and decoded arguments.
pub fn dump(value: SeStr<'_>) -> String {
    value.payloads().map(|p| dump_payload(&p)).join("\n")
}

fn dump_payload(payload: &Payload<'_>) -> String {
    match *payload {
        Payload::Text(text) => format!("text {:?}", String::from_utf8_lossy(text)),
        Payload::Invalid(bytes) => format!("invalid {}", to_hex(bytes)),
        Payload::Macro { code, .. } => {
            let name = MacroCode::from_u8(code).map_or("?", MacroCode::name);
            let args = payload.expressions().map(|e| e.to_string()).join(", ");
            format!("macro {name}(0x{code:02X}) [{args}]")
        }
    }
}
