use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::context::EvalContext;
use crate::sestring::{MacroCode, Payload};
use crate::Evaluator;

pub mod conditional;
pub mod lookup;
pub mod style;
pub mod text;
pub mod time;

/// Trait for pluggable macro handlers used by the evaluator.
pub trait Macro: Send + Sync {
    fn code(&self) -> MacroCode;
    /// Expands `payload` into `ctx`. Returns false when the macro could not
    /// be evaluated; partial output may remain.
    fn call(&self, ev: &Evaluator, ctx: &mut dyn EvalContext, payload: &Payload<'_>) -> bool;
}

/// Thread-safe macro registry keyed by code byte.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<u8, Arc<dyn Macro>>>,
}

impl Registry {
    pub fn with_builtins() -> Self {
        let builtins: Vec<Arc<dyn Macro>> = vec![
            Arc::new(time::SetResetTime),
            Arc::new(time::SetTime),
            Arc::new(conditional::If),
            Arc::new(conditional::Switch),
            Arc::new(text::NewLine),
            Arc::new(style::Icon),
            Arc::new(style::Icon2),
            Arc::new(style::Color),
            Arc::new(style::EdgeColor),
            Arc::new(text::SoftHyphen),
            Arc::new(style::Bold),
            Arc::new(style::Italic),
            Arc::new(text::NonBreakingSpace),
            Arc::new(text::Hyphen),
            Arc::new(text::Num),
            Arc::new(text::Hex),
            Arc::new(text::Kilo),
            Arc::new(text::Byte),
            Arc::new(text::Sec),
            Arc::new(text::Float),
            Arc::new(lookup::Sheet),
            Arc::new(text::StringMacro),
            Arc::new(text::Caps),
            Arc::new(text::Head),
            Arc::new(text::HeadAll),
            Arc::new(text::Lower),
            Arc::new(text::LowerHead),
            Arc::new(style::ColorType),
            Arc::new(style::EdgeColorType),
            Arc::new(lookup::LevelPos),
        ];
        let map = builtins
            .into_iter()
            .map(|m| (m.code() as u8, m))
            .collect::<HashMap<_, _>>();
        Self {
            inner: Arc::new(map),
        }
    }

    /// Adds or replaces the handler for the macro's code.
    pub fn register<M: Macro + 'static>(&mut self, m: M) {
        let map = Arc::make_mut(&mut self.inner);
        map.insert(m.code() as u8, Arc::new(m));
    }

    pub fn get(&self, code: u8) -> Option<Arc<dyn Macro>> {
        self.inner.get(&code).cloned()
    }

    pub fn contains(&self, code: u8) -> bool {
        self.inner.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Evaluator {
    pub(crate) fn dispatch_macro(&self, ctx: &mut dyn EvalContext, code: u8, payload: &Payload<'_>) -> bool {
        let Some(handler) = self.registry().get(code) else {
            debug!(code, "no handler for macro");
            return false;
        };
        trace!(name = handler.code().name(), "expanding macro");
        let ok = handler.call(self, ctx, payload);
        if !ok {
            debug!(name = handler.code().name(), "macro failed");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BasicContext;
    use crate::encode::SeStringBuilder;
    use crate::format::produce_str;
    use crate::sestring::SeStr;
    use pretty_assertions::assert_eq;

    struct Shout;

    impl Macro for Shout {
        fn code(&self) -> MacroCode {
            MacroCode::PcName
        }

        fn call(&self, _ev: &Evaluator, ctx: &mut dyn EvalContext, _payload: &Payload<'_>) -> bool {
            produce_str(ctx, "HEY");
            true
        }
    }

    #[test]
    fn builtins_cover_distinct_codes() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.len(), 30);
        assert!(registry.contains(MacroCode::If as u8));
        assert!(!registry.contains(MacroCode::PcName as u8));
    }

    #[test]
    fn registered_macro_is_dispatched() {
        let mut registry = Registry::with_builtins();
        registry.register(Shout);
        let ev = Evaluator::new(registry);
        let s = SeStringBuilder::new()
            .push_macro(MacroCode::PcName, &[])
            .build();
        let mut ctx = BasicContext::new();
        assert!(ev.resolve_string(&mut ctx, s.as_se_str()));
        assert_eq!(ctx.text(), "HEY");
    }

    #[test]
    fn unknown_code_fails_without_output() {
        let ev = Evaluator::new(Registry::with_builtins());
        let mut ctx = BasicContext::new();
        let bytes = [b'a', 0x02, 0x0A, 0x01, 0x03, b'b'];
        assert!(!ev.resolve_string(&mut ctx, SeStr::new(&bytes)));
        assert_eq!(ctx.text(), "ab");
    }
}
