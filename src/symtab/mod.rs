//! Scoped symbol table: a cons-list of scopes, each holding a shared,
//! mutable name map and an immutable import list.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    GlobalVariable,
    LocalVariable,
    GlobalFunction,
    LocalFunction,
    ControlMacro,
    FunctionMacro,
    OperatorMacro,
    ExpanderMacro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Internal,
    Public,
}

/// Kind-specific data carried by a [`Symbol`]. Macro payloads reference a
/// substitution callback by a small integer handle rather than a boxed
/// closure, so `Symbol` stays `Clone`/`Debug`-friendly; the macsub context
/// resolves the handle back to the actual Rust callback at dispatch time.
#[derive(Debug, Clone)]
pub enum Payload {
    Variable {
        mutable: bool,
        constexpr: Option<Value>,
    },
    Function {
        arity_min: u32,
        arity_max: Option<u32>,
    },
    Macro {
        precedence: i32,
        handle: u32,
        userdata: Option<Value>,
    },
}

/// A published symbol. Immutable once inserted into a scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub nesting_level: u32,
    pub visibility: Visibility,
    pub full_name: String,
    pub payload: Payload,
}

impl Symbol {
    pub fn precedence(&self) -> Option<i32> {
        match &self.payload {
            Payload::Macro { precedence, .. } => Some(*precedence),
            _ => None,
        }
    }

    pub fn is_macro(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::ControlMacro
                | SymbolKind::FunctionMacro
                | SymbolKind::OperatorMacro
                | SymbolKind::ExpanderMacro
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Strong,
    Weak,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub old_prefix: String,
    pub new_prefix: String,
    pub strength: Strength,
}

/// The result of a scoped lookup: unbound, a single unambiguous symbol, or
/// more than one match (callers decide whether that is an error in their
/// context). Every ambiguous match is kept, not just the first two, so a
/// caller can render a complete diagnostic.
#[derive(Debug, Clone)]
pub enum Lookup {
    Unbound,
    Found(Symbol),
    Ambiguous(Vec<Symbol>),
}

impl Lookup {
    fn from_matches(matches: Vec<Symbol>) -> Lookup {
        match matches.len() {
            0 => Lookup::Unbound,
            1 => Lookup::Found(matches.into_iter().next().unwrap()),
            _ => Lookup::Ambiguous(matches),
        }
    }

    pub fn is_bound(&self) -> bool {
        !matches!(self, Lookup::Unbound)
    }
}

type NameMap = Rc<RefCell<HashMap<String, Symbol>>>;

/// One scope in the cons-list. Child scopes share the parent's name map by
/// reference — siblings see each other's insertions — and add their own
/// import list on top.
pub struct SymbolTable {
    parent: Option<Rc<SymbolTable>>,
    map: NameMap,
    imports: Vec<Import>,
}

impl SymbolTable {
    pub fn new_root() -> Rc<SymbolTable> {
        Rc::new(SymbolTable {
            parent: None,
            map: Rc::new(RefCell::new(HashMap::new())),
            imports: Vec::new(),
        })
    }

    /// A child scope that shares this scope's map (new insertions are
    /// visible to both) but starts with its own import list. Used for
    /// "push minor" (a namespace).
    pub fn child_same_map(self: &Rc<Self>) -> Rc<SymbolTable> {
        Rc::new(SymbolTable {
            parent: Some(self.clone()),
            map: self.map.clone(),
            imports: Vec::new(),
        })
    }

    /// A child scope with a fresh map of its own. Used for "push major"
    /// (a function body).
    pub fn child_fresh_map(self: &Rc<Self>) -> Rc<SymbolTable> {
        Rc::new(SymbolTable {
            parent: Some(self.clone()),
            map: Rc::new(RefCell::new(HashMap::new())),
            imports: Vec::new(),
        })
    }

    pub fn define(&self, symbol: Symbol) {
        self.map.borrow_mut().insert(symbol.full_name.clone(), symbol);
    }

    /// Add an import, deduplicating exact-triple repeats within this
    /// scope's own import list (the "importing the same triple the parent
    /// already has is a no-op" rule, applied at the per-scope granularity
    /// this model uses).
    pub fn import(
        self: &Rc<Self>,
        old_prefix: String,
        new_prefix: String,
        strength: Strength,
    ) -> Rc<SymbolTable> {
        let mut imports = self.imports.clone();
        let dup = imports.iter().any(|i| {
            i.old_prefix == old_prefix && i.new_prefix == new_prefix && i.strength == strength
        });
        if !dup {
            imports.push(Import {
                old_prefix,
                new_prefix,
                strength,
            });
        }
        Rc::new(SymbolTable {
            parent: self.parent.clone(),
            map: self.map.clone(),
            imports,
        })
    }

    /// Absolutize `old_prefix` by looking it up as if it were a symbol
    /// name, accepting any matching symbol whose full name is prefixed by
    /// the candidate. Returns the absolutized prefix on a single match, or
    /// the full [`Lookup`] (so zero/ambiguous can be reported) otherwise.
    pub fn absolutize(&self, candidate: &str) -> Result<String, Lookup> {
        let mut matches = Vec::new();
        for scope in self.scope_chain() {
            for (name, sym) in scope.map.borrow().iter() {
                if name.starts_with(candidate) {
                    matches.push(sym.clone());
                }
            }
        }
        match matches.len() {
            1 => Ok(candidate.to_string()),
            0 => Err(Lookup::Unbound),
            _ => Err(Lookup::Ambiguous(matches)),
        }
    }

    fn scope_chain(&self) -> Vec<&SymbolTable> {
        let mut out = Vec::new();
        let mut cur = Some(self);
        while let Some(s) = cur {
            out.push(s);
            cur = s.parent.as_deref();
        }
        out
    }

    /// The scoped lookup algorithm: innermost scope to root, strong
    /// imports (and direct matches) before weak, returning as soon as a
    /// scope yields any match.
    pub fn lookup(&self, key: &str) -> Lookup {
        for scope in self.scope_chain() {
            let mut matches: Vec<Symbol> = Vec::new();
            for strength in [Strength::Strong, Strength::Weak] {
                matches.clear();
                if let Some(sym) = scope.map.borrow().get(key) {
                    matches.push(sym.clone());
                }
                for import in scope.imports.iter().filter(|i| i.strength == strength) {
                    if let Some(rest) = key.strip_prefix(import.new_prefix.as_str()) {
                        let rewritten = format!("{}{}", import.old_prefix, rest);
                        if let Some(sym) = scope.map.borrow().get(&rewritten) {
                            matches.push(sym.clone());
                        }
                    }
                }
                if strength == Strength::Strong && !matches.is_empty() {
                    return Lookup::from_matches(matches);
                }
            }
            if !matches.is_empty() {
                return Lookup::from_matches(matches);
            }
        }
        Lookup::Unbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_symbol(name: &str) -> Symbol {
        Symbol {
            kind: SymbolKind::GlobalVariable,
            nesting_level: 0,
            visibility: Visibility::Public,
            full_name: name.to_string(),
            payload: Payload::Variable {
                mutable: true,
                constexpr: None,
            },
        }
    }

    #[test]
    fn defines_are_visible_to_sibling_scopes_sharing_a_map() {
        let root = SymbolTable::new_root();
        let a = root.child_same_map();
        let b = root.child_same_map();
        a.define(var_symbol("x"));
        assert!(b.lookup("x").is_bound());
    }

    #[test]
    fn fresh_map_scope_does_not_see_sibling_inserts() {
        let root = SymbolTable::new_root();
        let a = root.child_fresh_map();
        let b = root.child_fresh_map();
        a.define(var_symbol("x"));
        assert!(!b.lookup("x").is_bound());
    }

    #[test]
    fn import_rewrites_prefix_for_lookup() {
        let root = SymbolTable::new_root();
        root.define(var_symbol("pkg.thing"));
        let scope = root.child_same_map().import("pkg.".to_string(), "p.".to_string(), Strength::Strong);
        assert!(matches!(scope.lookup("p.thing"), Lookup::Found(_)));
    }

    #[test]
    fn duplicate_import_is_not_added_twice() {
        let root = SymbolTable::new_root();
        let scope = root
            .child_same_map()
            .import("a.".to_string(), "b.".to_string(), Strength::Strong)
            .import("a.".to_string(), "b.".to_string(), Strength::Strong);
        assert_eq!(scope.imports.len(), 1);
    }

    #[test]
    fn ambiguous_lookup_keeps_all_matches() {
        let root = SymbolTable::new_root();
        root.define(var_symbol("a.x"));
        root.define(var_symbol("b.x"));
        let scope = root
            .child_same_map()
            .import("a.".to_string(), "p.".to_string(), Strength::Weak)
            .import("b.".to_string(), "p.".to_string(), Strength::Weak);
        match scope.lookup("p.x") {
            Lookup::Ambiguous(matches) => assert_eq!(matches.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }
}
