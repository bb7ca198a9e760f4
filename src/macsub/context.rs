//! Macro substitution context: the symbol table scope, varscope, gensym,
//! and panic flag threaded through expansion of one compilation unit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::symtab::SymbolTable;
use crate::varscope::Varscope;

use super::gensym::Gensym;
use super::registry::MacroRegistry;
#[cfg(test)]
use super::registry::SubstOutcome;

/// Shared, scoped panic flag. Set when a macro decides a diagnostic would
/// otherwise cascade; every later expansion in the same context (and any
/// `push_minor` copy of it) short-circuits to a silent error node until a
/// fresh `push_major` starts a new scope.
#[derive(Debug, Clone, Default)]
struct PanicFlag(Rc<Cell<bool>>);

impl PanicFlag {
    fn new() -> PanicFlag {
        PanicFlag(Rc::new(Cell::new(false)))
    }

    fn get(&self) -> bool {
        self.0.get()
    }

    fn set(&self) {
        self.0.set(true);
    }
}

/// One macro substitution scope: the symbol table scope it expands
/// against, the varscope it records captures into, its gensym generator,
/// its dotted name prefix, and its nesting level.
#[derive(Clone)]
pub struct MacsubContext {
    symtab: Rc<SymbolTable>,
    varscope: Varscope,
    gensym: Rc<RefCell<Gensym>>,
    panic: PanicFlag,
    prefix: String,
    nesting_level: u32,
    registry: MacroRegistry,
}

impl MacsubContext {
    /// A root context with an empty macro registry (every macro dispatch
    /// falls back to the engine's generic per-kind template). Use
    /// [`MacsubContext::root_with_registry`] to wire in real callbacks.
    pub fn root(symtab: Rc<SymbolTable>, file_name: &str) -> MacsubContext {
        MacsubContext::root_with_registry(symtab, file_name, MacroRegistry::new())
    }

    pub fn root_with_registry(
        symtab: Rc<SymbolTable>,
        file_name: &str,
        registry: MacroRegistry,
    ) -> MacsubContext {
        MacsubContext {
            symtab,
            varscope: Varscope::new(),
            gensym: Rc::new(RefCell::new(Gensym::new(file_name))),
            panic: PanicFlag::new(),
            prefix: String::new(),
            nesting_level: 0,
            registry,
        }
    }

    pub fn symtab(&self) -> &Rc<SymbolTable> {
        &self.symtab
    }

    /// The macro callback registry shared across this whole compilation
    /// (not reset by `push_major`/`push_minor`: intrinsic macros are the
    /// same regardless of nesting or namespace).
    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn varscope(&self) -> &Varscope {
        &self.varscope
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn nesting_level(&self) -> u32 {
        self.nesting_level
    }

    pub fn is_panicking(&self) -> bool {
        self.panic.get()
    }

    /// Enter panic mode: every later expansion sharing this context's
    /// panic flag (including `push_minor` copies) short-circuits to a
    /// silent error node.
    pub fn enter_panic(&self) {
        self.panic.set();
    }

    pub fn gensym_next(&self) -> String {
        self.gensym.borrow_mut().next()
    }

    pub fn gensym_next_generation(&self) {
        self.gensym.borrow_mut().next_generation();
    }

    /// A new symbol table child scope with a fresh map, a fresh varscope,
    /// and an augmented prefix; nesting level increments. Used for
    /// function bodies — a fresh panic scope too, since a nested function
    /// body's failures must not poison its enclosing statement.
    pub fn push_major(&self, prefix_suffix: &str) -> MacsubContext {
        MacsubContext {
            symtab: self.symtab.child_fresh_map(),
            varscope: Varscope::new(),
            gensym: self.gensym.clone(),
            panic: PanicFlag::new(),
            prefix: format!("{}{}", self.prefix, prefix_suffix),
            nesting_level: self.nesting_level + 1,
            registry: self.registry.clone(),
        }
    }

    /// A copy of this context with an augmented prefix but the same
    /// symbol table scope, varscope, and panic flag. Used for namespaces.
    pub fn push_minor(&self, prefix_suffix: &str) -> MacsubContext {
        MacsubContext {
            symtab: self.symtab.child_same_map(),
            varscope: self.varscope.clone(),
            gensym: self.gensym.clone(),
            panic: self.panic.clone(),
            prefix: format!("{}{}", self.prefix, prefix_suffix),
            nesting_level: self.nesting_level,
            registry: self.registry.clone(),
        }
    }

    /// A fully-qualified name for `name` under this context's prefix.
    pub fn qualify(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_major_increments_nesting_and_resets_panic() {
        let root = MacsubContext::root(SymbolTable::new_root(), "a.ava");
        root.enter_panic();
        let child = root.push_major("fn$");
        assert_eq!(child.nesting_level(), 1);
        assert!(!child.is_panicking());
        assert!(root.is_panicking());
    }

    #[test]
    fn push_minor_shares_panic_flag_and_symtab() {
        let root = MacsubContext::root(SymbolTable::new_root(), "a.ava");
        let minor = root.push_minor("ns.");
        assert_eq!(minor.nesting_level(), 0);
        assert_eq!(minor.qualify("x"), "ns.x");
        root.enter_panic();
        assert!(minor.is_panicking());
    }

    #[test]
    fn push_major_and_push_minor_share_the_same_registry() {
        let registry = MacroRegistry::new();
        registry.register(9, |_ctx, invocation, _diags, consumed_rest| {
            *consumed_rest = false;
            SubstOutcome::Done(Box::new(crate::macsub::node::ErrorNode {
                span: invocation.provoking.span.clone(),
            }))
        });
        let root = MacsubContext::root_with_registry(SymbolTable::new_root(), "a.ava", registry);
        assert!(root.push_major("fn$").registry().get(9).is_some());
        assert!(root.push_minor("ns.").registry().get(9).is_some());
    }

    #[test]
    fn gensym_advances_across_the_shared_generator() {
        let root = MacsubContext::root(SymbolTable::new_root(), "a.ava");
        let a = root.gensym_next();
        let b = root.gensym_next();
        assert_ne!(a, b);
    }
}
