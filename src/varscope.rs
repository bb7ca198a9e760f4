//! Per-function closure capture tracker.
//!
//! Each function body gets one [`Varscope`]: an ordered list of locals it
//! owns, an ordered list of symbols it references but does not own
//! (captures), and the set of child scopes it references (nested closures).
//! `ref_scope` edges are resolved to a fixed point with a work-list, since a
//! capture discovered on a child after the edge was recorded must still
//! propagate to every ancestor that reaches it.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// An opaque identity for a symbol as far as varscope bookkeeping is
/// concerned — the symbol table's fully-qualified name is the natural
/// choice, since it is unique within a compilation.
pub type SymbolId = String;

struct VarscopeData {
    owned: Vec<SymbolId>,
    owned_set: HashSet<SymbolId>,
    captures: Vec<SymbolId>,
    capture_set: HashSet<SymbolId>,
    children: Vec<Varscope>,
    /// Reverse edges of `children`: every scope that has recorded a
    /// `ref_scope` edge into this one. Lets a capture discovered here
    /// after the edge was recorded still climb back out to `self`.
    parents: Vec<Varscope>,
}

/// A per-function scope, shared by reference so `ref_scope` edges can be
/// recorded from either endpoint without needing mutable access to both at
/// once.
#[derive(Clone)]
pub struct Varscope(Rc<RefCell<VarscopeData>>);

impl Varscope {
    pub fn new() -> Varscope {
        Varscope(Rc::new(RefCell::new(VarscopeData {
            owned: Vec::new(),
            owned_set: HashSet::new(),
            captures: Vec::new(),
            capture_set: HashSet::new(),
            children: Vec::new(),
            parents: Vec::new(),
        })))
    }

    pub fn put_local(&self, sym: SymbolId) {
        let mut d = self.0.borrow_mut();
        if d.owned_set.insert(sym.clone()) {
            d.owned.push(sym);
        }
    }

    /// Reference `sym` from this scope. If not owned, it becomes a capture
    /// (appended once, in first-reference order) and is propagated up
    /// through every recorded `ref_scope` edge into this scope.
    pub fn ref_var(&self, sym: &SymbolId) {
        if self.add_capture(sym) {
            self.propagate_up(sym);
        }
    }

    /// Add `sym` as a capture of `self` alone, with no propagation.
    /// Returns whether it was newly added (not owned, not already present).
    fn add_capture(&self, sym: &SymbolId) -> bool {
        let mut d = self.0.borrow_mut();
        if d.owned_set.contains(sym) {
            return false;
        }
        if d.capture_set.insert(sym.clone()) {
            d.captures.push(sym.clone());
            true
        } else {
            false
        }
    }

    /// Push a capture just discovered on `self` up through every recorded
    /// `ref_scope` edge into `self`, transitively, to a fixed point. A
    /// work-list over ancestor scopes: each ancestor that gains the
    /// capture for the first time re-queues its own parents, so a chain
    /// of edges recorded before the capture was known still carries it
    /// all the way out.
    fn propagate_up(&self, sym: &SymbolId) {
        let mut worklist: Vec<Varscope> = self.0.borrow().parents.clone();
        while let Some(parent) = worklist.pop() {
            if parent.add_capture(sym) {
                worklist.extend(parent.0.borrow().parents.clone());
            }
        }
    }

    /// Record that `self` references child scope `to`. Any capture `to`
    /// has, now or later, that `self` does not own becomes a capture of
    /// `self` too: existing captures are pulled in immediately below, and
    /// the reverse edge recorded here means a capture `to` discovers later
    /// reaches `self` (and beyond) via `propagate_up`.
    pub fn ref_scope(&self, to: &Varscope) {
        let already_linked = self
            .0
            .borrow()
            .children
            .iter()
            .any(|c| Rc::ptr_eq(&c.0, &to.0));
        if !already_linked {
            self.0.borrow_mut().children.push(to.clone());
            to.0.borrow_mut().parents.push(self.clone());
        }
        let existing = to.0.borrow().captures.clone();
        for cap in &existing {
            if self.add_capture(cap) {
                self.propagate_up(cap);
            }
        }
    }

    pub fn owned_locals(&self) -> Vec<SymbolId> {
        self.0.borrow().owned.clone()
    }

    pub fn captures(&self) -> Vec<SymbolId> {
        self.0.borrow().captures.clone()
    }

    /// Register index: captures first (insertion order), then owned
    /// locals (insertion order). Adding a capture shifts local indices by
    /// one, since captures are prepended in register space.
    pub fn get_index(&self, sym: &SymbolId) -> Option<usize> {
        let d = self.0.borrow();
        if let Some(i) = d.captures.iter().position(|s| s == sym) {
            return Some(i);
        }
        d.owned
            .iter()
            .position(|s| s == sym)
            .map(|i| i + d.captures.len())
    }
}

impl Default for Varscope {
    fn default() -> Self {
        Varscope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unowned_reference_becomes_a_capture() {
        let scope = Varscope::new();
        scope.put_local("local".to_string());
        scope.ref_var(&"local".to_string());
        scope.ref_var(&"outer".to_string());
        assert_eq!(scope.captures(), vec!["outer".to_string()]);
    }

    #[test]
    fn get_index_places_captures_before_locals() {
        let scope = Varscope::new();
        scope.put_local("a".to_string());
        scope.put_local("b".to_string());
        scope.ref_var(&"cap".to_string());
        assert_eq!(scope.get_index(&"cap".to_string()), Some(0));
        assert_eq!(scope.get_index(&"a".to_string()), Some(1));
        assert_eq!(scope.get_index(&"b".to_string()), Some(2));
    }

    #[test]
    fn ref_scope_propagates_childs_capture_to_parent() {
        let parent = Varscope::new();
        let child = Varscope::new();
        child.put_local("child_local".to_string());
        child.ref_var(&"grandparent_var".to_string());
        parent.ref_scope(&child);
        assert!(parent.captures().contains(&"grandparent_var".to_string()));
        assert!(!parent.captures().contains(&"child_local".to_string()));
    }

    #[test]
    fn capture_added_after_ref_scope_still_propagates() {
        let parent = Varscope::new();
        let child = Varscope::new();
        parent.ref_scope(&child);
        child.ref_var(&"late_capture".to_string());
        assert!(parent.captures().contains(&"late_capture".to_string()));
    }

    #[test]
    fn capture_propagates_transitively_through_multiple_ref_scope_levels() {
        let grandparent = Varscope::new();
        let parent = Varscope::new();
        let child = Varscope::new();
        grandparent.ref_scope(&parent);
        parent.ref_scope(&child);
        child.ref_var(&"deep_capture".to_string());
        assert!(parent.captures().contains(&"deep_capture".to_string()));
        assert!(grandparent.captures().contains(&"deep_capture".to_string()));
    }
}
