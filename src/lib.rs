pub mod capture;
pub mod context;
pub mod encode;
pub mod engine; // hex/dump helpers shared by the CLI and tests
pub mod errors;
pub mod functions; // macro plugin model
pub mod parser;
pub mod sestring;
pub mod sources;
mod comparison;
mod expression;
mod format;
mod scopes;

use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use tracing::debug;

use context::{BasicContext, EvalContext, EvalOptions};
use errors::{EvalError, Result};
use functions::Registry;
use sestring::SeStr;
use sources::{Clock, GlobalParameters, MemoryGlobals, MemorySheets, SheetSource, SystemClock};

/// Evaluates encoded styled strings against an [`EvalContext`].
///
/// Holds the macro registry and the host data sources. The thread that
/// builds the evaluator is treated as the main thread for global parameter
/// access.
pub struct Evaluator {
    options: EvalOptions,
    registry: Registry,
    sheets: Arc<dyn SheetSource>,
    globals: Arc<dyn GlobalParameters>,
    clock: Arc<dyn Clock>,
    main_thread: ThreadId,
}

impl Evaluator {
    pub fn new(registry: Registry) -> Self {
        Self {
            options: EvalOptions::default(),
            registry,
            sheets: Arc::new(MemorySheets::default()),
            globals: Arc::new(MemoryGlobals::default()),
            clock: Arc::new(SystemClock),
            main_thread: thread::current().id(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sheets(mut self, sheets: Arc<dyn SheetSource>) -> Self {
        self.sheets = sheets;
        self
    }

    pub fn with_globals(mut self, globals: Arc<dyn GlobalParameters>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_main_thread(mut self, id: ThreadId) -> Self {
        self.main_thread = id;
        self
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sheets(&self) -> &dyn SheetSource {
        self.sheets.as_ref()
    }

    pub fn globals(&self) -> &dyn GlobalParameters {
        self.globals.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    /// Counts one level of nested evaluation. Fails once the configured
    /// depth is reached.
    pub(crate) fn enter(&self, ctx: &mut dyn EvalContext) -> Option<DepthGuard> {
        let guard = DepthGuard::enter(self.options.max_depth);
        if guard.is_none() {
            debug!(max_depth = self.options.max_depth, "evaluation depth exceeded");
            ctx.produce_error("Evaluation nested too deeply.");
        }
        guard
    }
}

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub(crate) struct DepthGuard(());

impl DepthGuard {
    fn enter(limit: usize) -> Option<Self> {
        DEPTH.with(|d| {
            let current = d.get();
            if current >= limit {
                return None;
            }
            d.set(current + 1);
            Some(DepthGuard(()))
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Convenience: evaluate with the built-in registry and an empty context,
/// returning the produced text.
pub fn evaluate(bytes: &[u8]) -> Result<String> {
    let ev = Evaluator::new(Registry::with_builtins());
    let mut ctx = BasicContext::new();
    if ev.resolve_string(&mut ctx, SeStr::new(bytes)) {
        Ok(ctx.text())
    } else {
        Err(EvalError::Unresolved(format!("{}", SeStr::new(bytes))))
    }
}

/// Like [`evaluate`] but keeps whatever was produced even when some payload
/// failed.
pub fn evaluate_lossy(bytes: &[u8]) -> String {
    let ev = Evaluator::new(Registry::with_builtins());
    let mut ctx = BasicContext::new();
    ev.resolve_string(&mut ctx, SeStr::new(bytes));
    ctx.text()
}

pub use context::{LocalParam, PayloadAction, StrParam};
pub use encode::SeStringBuilder;
pub use engine::{dump, parse_hex};
pub use sestring::{Expr, Expression, MacroCode, Payload, SeString};
