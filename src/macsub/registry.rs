//! The registry that turns a symbol's opaque `Payload::Macro` handle back
//! into an actual Rust callback, and the `ava_mss_done`/`ava_mss_again`
//! contract that callback participates in.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Diagnostics;
use crate::parse::ast::{Statement, Unit};
use crate::value::Value;

use super::context::MacsubContext;
use super::node::SemNode;

/// What one invocation of a macro's substitution callback returns:
/// either a finished semantic node, or a replacement statement that
/// expansion should restart from the top (step 1: a fresh expander pass,
/// then candidate selection again).
pub enum SubstOutcome {
    /// `ava_mss_done`: substitution is complete.
    Done(Box<dyn SemNode>),
    /// `ava_mss_again`: retry expansion with this statement in place of
    /// the one just dispatched.
    Again(Statement),
}

/// What a macro's substitution callback is invoked with: the full
/// statement it was chosen against, the unit whose symbol won the
/// candidate search, and that symbol's userdata.
pub struct MacroInvocation<'a> {
    pub statement: &'a Statement,
    pub provoking: &'a Unit,
    pub userdata: Option<&'a Value>,
}

/// A macro substitution callback. `consumed_rest` is an out-parameter:
/// the callback sets it to `true` to mean it absorbed every statement
/// following this one in the enclosing block or substitution (e.g. a
/// control macro that consumes its own body statements rather than
/// leaving them to be substituted independently).
pub type MacroFn =
    fn(&MacsubContext, MacroInvocation, &mut Diagnostics, consumed_rest: &mut bool) -> SubstOutcome;

/// Maps a symbol's opaque `handle` (from `Payload::Macro`) to the actual
/// callback it names, so dispatch can call real macro bodies instead of
/// only the engine's generic per-kind templates. Handle `0` is reserved
/// and never registered: it means "no custom substitution; fall back to
/// the generic template for this macro's kind" (see `expand::dispatch`).
#[derive(Clone, Default)]
pub struct MacroRegistry {
    callbacks: Rc<RefCell<HashMap<u32, MacroFn>>>,
}

impl MacroRegistry {
    pub fn new() -> MacroRegistry {
        MacroRegistry::default()
    }

    /// Register `callback` under `handle`. Panics on handle `0` (reserved)
    /// or on registering the same handle twice, both of which are driver
    /// bugs rather than recoverable conditions.
    pub fn register(&self, handle: u32, callback: MacroFn) {
        assert_ne!(handle, 0, "handle 0 is reserved for the generic fallback template");
        let mut callbacks = self.callbacks.borrow_mut();
        assert!(
            callbacks.insert(handle, callback).is_none(),
            "handle {handle} registered twice"
        );
    }

    /// The callback registered under `handle`, or `None` for handle `0`
    /// or an unregistered handle (both fall back to the generic template).
    pub fn get(&self, handle: u32) -> Option<MacroFn> {
        if handle == 0 {
            return None;
        }
        self.callbacks.borrow().get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;
    use crate::macsub::node::ErrorNode;
    use crate::symtab::SymbolTable;
    use std::path::PathBuf;

    fn done_with_error(
        _ctx: &MacsubContext,
        invocation: MacroInvocation,
        _diags: &mut Diagnostics,
        consumed_rest: &mut bool,
    ) -> SubstOutcome {
        *consumed_rest = true;
        SubstOutcome::Done(Box::new(ErrorNode { span: invocation.provoking.span.clone() }))
    }

    #[test]
    fn registered_handle_is_retrievable_and_honors_consumed_rest() {
        let registry = MacroRegistry::new();
        registry.register(7, done_with_error);
        let callback = registry.get(7).expect("handle 7 registered");
        let ctx = MacsubContext::root(SymbolTable::new_root(), "t.ava");
        let unit = Unit::new(
            crate::parse::ast::UnitKind::Bareword("m".to_string()),
            SourceSpan::point(PathBuf::from("t.ava"), 0, 0, 0),
        );
        let statement = vec![unit.clone()];
        let mut diags = Diagnostics::new();
        let mut consumed_rest = false;
        let invocation = MacroInvocation { statement: &statement, provoking: &unit, userdata: None };
        match callback(&ctx, invocation, &mut diags, &mut consumed_rest) {
            SubstOutcome::Done(_) => {}
            SubstOutcome::Again(_) => panic!("expected Done"),
        }
        assert!(consumed_rest);
    }

    #[test]
    fn handle_zero_is_never_registered() {
        let registry = MacroRegistry::new();
        assert!(registry.get(0).is_none());
    }
}
