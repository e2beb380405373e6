// src/context.rs
//! Evaluation context: what the host supplies to and receives from the
//! evaluator. Every capability has a neutral default so hosts implement only
//! what they support.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sestring::{marker, Payload, SeStr, SeString};
use crate::Evaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Japanese,
    #[default]
    English,
    German,
    French,
    ChineseSimplified,
    Korean,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ja" | "japanese" => Ok(Language::Japanese),
            "en" | "english" => Ok(Language::English),
            "de" | "german" => Ok(Language::German),
            "fr" | "french" => Ok(Language::French),
            "chs" | "zh" | "chinesesimplified" => Ok(Language::ChineseSimplified),
            "ko" | "korean" => Ok(Language::Korean),
            other => Err(format!("unknown language '{other}'")),
        }
    }
}

/// Evaluation knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Limit on nested evaluation calls before evaluation fails.
    pub max_depth: usize,
    /// Row of the `Addon` sheet holding the map position template.
    pub level_pos_template_row: u32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            level_pos_template_row: 1637,
        }
    }
}

/// A string-valued answer from a context. The evaluator produces it into the
/// context that asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrParam {
    Text(String),
    /// Evaluated as a styled string.
    SeString(SeString),
    /// One encoded expression, resolved as a string expression.
    Expression(Vec<u8>),
}

/// Outcome of [`EvalContext::handle_payload`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PayloadAction {
    /// Not intercepted; the evaluator handles the payload.
    #[default]
    Default,
    /// The context handled the payload itself.
    Handled,
    /// The payload is replaced by this value.
    Replace(StrParam),
}

pub trait AsDynContext {
    fn as_dyn_context(&mut self) -> &mut dyn EvalContext;
}

impl<T: EvalContext> AsDynContext for T {
    fn as_dyn_context(&mut self) -> &mut dyn EvalContext {
        self
    }
}

pub trait EvalContext: AsDynContext {
    /// Whether textual output goes through `produce_chars` (true) or
    /// `produce_bytes` (false).
    fn prefer_char_output(&self) -> bool {
        true
    }

    fn language(&self) -> Language {
        Language::English
    }

    fn try_get_placeholder_num(&mut self, _kind: u8) -> Option<u32> {
        None
    }

    fn try_get_placeholder_str(&mut self, _kind: u8) -> Option<StrParam> {
        None
    }

    fn update_placeholder(&mut self, _kind: u8, _value: u32) {}

    /// `index` is 0-based.
    fn try_get_local_num(&mut self, _index: u32) -> Option<u32> {
        None
    }

    fn try_get_local_str(&mut self, _index: u32) -> Option<StrParam> {
        None
    }

    fn try_get_global_num(&mut self, _index: u32) -> Option<u32> {
        None
    }

    fn try_get_global_str(&mut self, _index: u32) -> Option<StrParam> {
        None
    }

    fn handle_payload(&mut self, _payload: &Payload<'_>) -> PayloadAction {
        PayloadAction::Default
    }

    fn produce_bytes(&mut self, _value: &[u8]) {}

    fn produce_chars(&mut self, _value: &str) {}

    /// Emits a nested styled string. Evaluates it against this context unless
    /// overridden.
    fn produce_se_string(&mut self, ev: &Evaluator, value: SeStr<'_>) -> bool {
        ev.resolve_string(self.as_dyn_context(), value)
    }

    fn produce_new_line(&mut self) {
        if self.prefer_char_output() {
            self.produce_chars("\n");
        } else {
            self.produce_bytes(b"\n");
        }
    }

    fn produce_error(&mut self, _message: &str) {}

    /// Colors are ARGB.
    fn push_fore_color(&mut self, _argb: u32) {}

    fn pop_fore_color(&mut self) {}

    fn push_border_color(&mut self, _argb: u32) {}

    fn pop_border_color(&mut self) {}

    fn set_bold(&mut self, _enable: bool) {}

    fn set_italic(&mut self, _enable: bool) {}

    fn draw_icon(&mut self, _icon_id: u32) {}
}

/// Implements the named `EvalContext` methods by delegating to `self.inner`.
macro_rules! forward_context {
    ($($method:ident),* $(,)?) => {
        $(forward_context!(@one $method);)*
    };
    (@one prefer_char_output) => {
        fn prefer_char_output(&self) -> bool {
            self.inner.prefer_char_output()
        }
    };
    (@one language) => {
        fn language(&self) -> $crate::context::Language {
            self.inner.language()
        }
    };
    (@one try_get_placeholder_num) => {
        fn try_get_placeholder_num(&mut self, kind: u8) -> Option<u32> {
            self.inner.try_get_placeholder_num(kind)
        }
    };
    (@one try_get_placeholder_str) => {
        fn try_get_placeholder_str(&mut self, kind: u8) -> Option<$crate::context::StrParam> {
            self.inner.try_get_placeholder_str(kind)
        }
    };
    (@one update_placeholder) => {
        fn update_placeholder(&mut self, kind: u8, value: u32) {
            self.inner.update_placeholder(kind, value)
        }
    };
    (@one try_get_local_num) => {
        fn try_get_local_num(&mut self, index: u32) -> Option<u32> {
            self.inner.try_get_local_num(index)
        }
    };
    (@one try_get_local_str) => {
        fn try_get_local_str(&mut self, index: u32) -> Option<$crate::context::StrParam> {
            self.inner.try_get_local_str(index)
        }
    };
    (@one try_get_global_num) => {
        fn try_get_global_num(&mut self, index: u32) -> Option<u32> {
            self.inner.try_get_global_num(index)
        }
    };
    (@one try_get_global_str) => {
        fn try_get_global_str(&mut self, index: u32) -> Option<$crate::context::StrParam> {
            self.inner.try_get_global_str(index)
        }
    };
    (@one handle_payload) => {
        fn handle_payload(
            &mut self,
            payload: &$crate::sestring::Payload<'_>,
        ) -> $crate::context::PayloadAction {
            self.inner.handle_payload(payload)
        }
    };
    (@one produce_new_line) => {
        fn produce_new_line(&mut self) {
            self.inner.produce_new_line()
        }
    };
    (@one produce_error) => {
        fn produce_error(&mut self, message: &str) {
            self.inner.produce_error(message)
        }
    };
    (@one styles) => {
        fn push_fore_color(&mut self, argb: u32) {
            self.inner.push_fore_color(argb)
        }
        fn pop_fore_color(&mut self) {
            self.inner.pop_fore_color()
        }
        fn push_border_color(&mut self, argb: u32) {
            self.inner.push_border_color(argb)
        }
        fn pop_border_color(&mut self) {
            self.inner.pop_border_color()
        }
        fn set_bold(&mut self, enable: bool) {
            self.inner.set_bold(enable)
        }
        fn set_italic(&mut self, enable: bool) {
            self.inner.set_italic(enable)
        }
        fn draw_icon(&mut self, icon_id: u32) {
            self.inner.draw_icon(icon_id)
        }
    };
}

pub(crate) use forward_context;

/// A local parameter held by [`BasicContext`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LocalParam {
    Number(u32),
    Signed(i32),
    Text(String),
    #[serde(skip)]
    SeString(SeString),
}

/// Self-contained context that records everything produced into it.
#[derive(Debug, Clone, Default)]
pub struct BasicContext {
    language: Language,
    prefer_bytes: bool,
    locals: Vec<LocalParam>,
    // one slot per placeholder byte 0xD0..=0xDF
    placeholders: [Option<u32>; 16],
    fore_colors: Vec<u32>,
    border_colors: Vec<u32>,
    bold: bool,
    italic: bool,
    icons: Vec<u32>,
    output: Vec<u8>,
    errors: Vec<String>,
}

impl BasicContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_params(mut self, params: Vec<LocalParam>) -> Self {
        self.locals = params;
        self
    }

    pub fn with_byte_output(mut self, enable: bool) -> Self {
        self.prefer_bytes = enable;
        self
    }

    pub fn push_param(&mut self, param: LocalParam) {
        self.locals.push(param);
    }

    pub fn set_placeholder(&mut self, kind: u8, value: u32) {
        if let Some(slot) = Self::slot(kind) {
            self.placeholders[slot] = Some(value);
        }
    }

    pub fn placeholder(&self, kind: u8) -> Option<u32> {
        Self::slot(kind).and_then(|i| self.placeholders[i])
    }

    fn slot(kind: u8) -> Option<usize> {
        match kind {
            0xD0..=0xDF => Some(usize::from(kind - 0xD0)),
            _ => None,
        }
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn fore_colors(&self) -> &[u32] {
        &self.fore_colors
    }

    pub fn border_colors(&self) -> &[u32] {
        &self.border_colors
    }

    pub fn is_bold(&self) -> bool {
        self.bold
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }

    pub fn icons(&self) -> &[u32] {
        &self.icons
    }
}

impl EvalContext for BasicContext {
    fn prefer_char_output(&self) -> bool {
        !self.prefer_bytes
    }

    fn language(&self) -> Language {
        self.language
    }

    fn try_get_placeholder_num(&mut self, kind: u8) -> Option<u32> {
        if kind == marker::STACK_COLOR {
            return None;
        }
        self.placeholder(kind)
    }

    fn update_placeholder(&mut self, kind: u8, value: u32) {
        self.set_placeholder(kind, value);
    }

    fn try_get_local_num(&mut self, index: u32) -> Option<u32> {
        match self.locals.get(index as usize)? {
            LocalParam::Number(v) => Some(*v),
            LocalParam::Signed(v) => Some(*v as u32),
            LocalParam::Text(_) | LocalParam::SeString(_) => None,
        }
    }

    fn try_get_local_str(&mut self, index: u32) -> Option<StrParam> {
        Some(match self.locals.get(index as usize)? {
            LocalParam::Number(v) => StrParam::Text(v.to_string()),
            LocalParam::Signed(v) => StrParam::Text(v.to_string()),
            LocalParam::Text(s) => StrParam::Text(s.clone()),
            LocalParam::SeString(s) => StrParam::SeString(s.clone()),
        })
    }

    fn produce_bytes(&mut self, value: &[u8]) {
        self.output.extend_from_slice(value);
    }

    fn produce_chars(&mut self, value: &str) {
        self.output.extend_from_slice(value.as_bytes());
    }

    fn produce_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn push_fore_color(&mut self, argb: u32) {
        self.fore_colors.push(argb);
    }

    fn pop_fore_color(&mut self) {
        self.fore_colors.pop();
    }

    fn push_border_color(&mut self, argb: u32) {
        self.border_colors.push(argb);
    }

    fn pop_border_color(&mut self) {
        self.border_colors.pop();
    }

    fn set_bold(&mut self, enable: bool) {
        self.bold = enable;
    }

    fn set_italic(&mut self, enable: bool) {
        self.italic = enable;
    }

    fn draw_icon(&mut self, icon_id: u32) {
        self.icons.push(icon_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn params_deserialize_untagged() {
        let params: Vec<LocalParam> = serde_json::from_str(r#"[3, -1, "abc"]"#).unwrap();
        assert_eq!(
            params,
            vec![
                LocalParam::Number(3),
                LocalParam::Signed(-1),
                LocalParam::Text("abc".into())
            ]
        );
    }

    #[test]
    fn local_lookups_are_zero_based() {
        let mut ctx = BasicContext::new()
            .with_params(vec![LocalParam::Number(7), LocalParam::Text("x".into())]);
        assert_eq!(ctx.try_get_local_num(0), Some(7));
        assert_eq!(ctx.try_get_local_num(1), None);
        assert_eq!(ctx.try_get_local_str(1), Some(StrParam::Text("x".into())));
        assert_eq!(ctx.try_get_local_str(2), None);
    }

    #[test]
    fn placeholder_slots() {
        let mut ctx = BasicContext::new();
        assert_eq!(ctx.try_get_placeholder_num(marker::HOUR), None);
        ctx.update_placeholder(marker::HOUR, 13);
        assert_eq!(ctx.try_get_placeholder_num(marker::HOUR), Some(13));
        ctx.update_placeholder(marker::STACK_COLOR, 1);
        assert_eq!(ctx.try_get_placeholder_num(marker::STACK_COLOR), None);
    }

    #[test]
    fn language_names() {
        assert_eq!("de".parse::<Language>(), Ok(Language::German));
        assert!("xx".parse::<Language>().is_err());
    }
}
