//! Statement expansion: expander splicing, best-macro-candidate
//! selection, and dispatch to a macro's real substitution callback (or,
//! absent one, the engine's generic per-kind template).
//!
//! Real user-defined macro *bodies* are registered by an embedding
//! driver (see [`super::registry::MacroRegistry`]), not built into this
//! core — what lives here is the dispatch mechanics the registry hooks
//! into: precedence comparison, associativity tie-break, the
//! `ava_mss_done`/`ava_mss_again` retry contract with its `consumed_rest`
//! out-parameter, and generic fallback shapes (binary split for
//! operators, rest-as-arguments for control/function macros) for symbols
//! whose handle has no registered callback.

use crate::error::{CompileError, Diagnostics, ErrorCode};
use crate::parse::ast::{Statement, Unit, UnitKind};
use crate::symtab::{Lookup, Payload, Symbol, SymbolKind};
use crate::value::Value;

use super::context::MacsubContext;
use super::node::{CallNode, ErrorNode, LiteralNode, ListNode, SemNode, SeqNode, SpreadNode, VarRefNode};
use super::registry::{MacroFn, MacroInvocation, SubstOutcome};

const STRING_PSEUDOMACRO_PRECEDENCE: i32 = 20;
const CONTROL_MACRO_PRECEDENCE: i32 = -1;

/// Expand one statement to its semantic form. Never fails: unresolvable
/// or malformed input becomes an [`ErrorNode`], with diagnostics recorded
/// in `diags`. Equivalent to [`substitute_sequence`] on a single
/// statement with no following statements, so a winning macro here can
/// never report `consumed_rest`.
pub fn substitute_statement(
    ctx: &MacsubContext,
    statement: Statement,
    diags: &mut Diagnostics,
) -> Box<dyn SemNode> {
    substitute_statement_with_rest(ctx, statement, &[], diags).0
}

/// Expand a whole block/substitution's statement list in order, letting
/// a macro consume statements beyond its own via `consumed_rest`.
pub fn substitute_sequence(
    ctx: &MacsubContext,
    statements: Vec<Statement>,
    diags: &mut Diagnostics,
) -> Vec<Box<dyn SemNode>> {
    let mut nodes = Vec::with_capacity(statements.len());
    let mut i = 0;
    while i < statements.len() {
        let statement = statements[i].clone();
        let following = &statements[i + 1..];
        let (node, consumed_extra) = substitute_statement_with_rest(ctx, statement, following, diags);
        nodes.push(node);
        i += 1 + consumed_extra;
    }
    nodes
}

/// The shared implementation: returns the semantic node plus how many of
/// `following_statements` a winning macro reported as consumed.
fn substitute_statement_with_rest(
    ctx: &MacsubContext,
    statement: Statement,
    following_statements: &[Statement],
    diags: &mut Diagnostics,
) -> (Box<dyn SemNode>, usize) {
    if ctx.is_panicking() {
        return (Box::new(ErrorNode { span: statement_span(&statement) }), 0);
    }

    let statement = run_expanders(ctx, statement, diags);
    if statement.is_empty() {
        return (Box::new(ErrorNode { span: statement_span(&[]) }), 0);
    }

    if statement.len() == 1 {
        let unit = statement.into_iter().next().unwrap();
        let control_name = match &unit.kind {
            UnitKind::Bareword(name) if is_control_macro(ctx, name) => Some(name.clone()),
            _ => None,
        };
        let Some(name) = control_name else {
            return (unit_to_node(ctx, unit, diags), 0);
        };
        // A lone control-macro reference still dispatches (with an empty
        // argument list if no callback consumes more) rather than falling
        // through to unit_to_node.
        let sym = match ctx.symtab().lookup(&ctx.qualify(&name)) {
            Lookup::Found(sym) => sym,
            _ => unreachable!("is_control_macro just confirmed a bound control-macro symbol"),
        };
        let (handle, userdata) = macro_payload(&sym);
        let candidate = Candidate { precedence: CONTROL_MACRO_PRECEDENCE, kind: CandidateKind::Control, name, handle, userdata };
        return dispatch(ctx, vec![unit], 0, candidate, following_statements, diags);
    }

    match best_candidate(ctx, &statement) {
        Some((idx, candidate)) => dispatch(ctx, statement, idx, candidate, following_statements, diags),
        None => {
            let span = statement_span(&statement);
            let mut units = statement.into_iter();
            let callee = unit_to_node(ctx, units.next().unwrap(), diags);
            let args = units.map(|u| unit_to_node(ctx, u, diags)).collect();
            (Box::new(CallNode { span, callee, args }), 0)
        }
    }
}

fn macro_payload(sym: &Symbol) -> (u32, Option<Value>) {
    match &sym.payload {
        Payload::Macro { handle, userdata, .. } => (*handle, userdata.clone()),
        _ => (0, None),
    }
}

fn statement_span(statement: &[Unit]) -> crate::error::SourceSpan {
    let mut spans = statement.iter().map(|u| u.span.clone());
    let first = match spans.next() {
        Some(s) => s,
        None => {
            return crate::error::SourceSpan::point(std::path::PathBuf::from("<macsub>"), 0, 0, 0)
        }
    };
    spans.fold(first, |acc, s| acc.merge(&s))
}

/// Run expander expansion to a fixed point: every `$$name` unit is looked
/// up as an expander-macro symbol and spliced away. Unresolved/ambiguous
/// names are diagnostics that remove just that unit; errors never halt
/// the pass.
fn run_expanders(ctx: &MacsubContext, mut statement: Statement, diags: &mut Diagnostics) -> Statement {
    loop {
        let pos = statement
            .iter()
            .position(|u| matches!(u.kind, UnitKind::Expander(_)));
        let Some(pos) = pos else { break };
        let name = match &statement[pos].kind {
            UnitKind::Expander(n) => n.clone(),
            _ => unreachable!(),
        };
        let qualified = ctx.qualify(&name);
        match ctx.symtab().lookup(&qualified) {
            Lookup::Found(sym) if sym.kind == SymbolKind::ExpanderMacro => {
                // No concrete expander body is modeled here: resolving
                // successfully removes the unit and expansion restarts,
                // matching the `ava_mss_again` splice-and-retry contract
                // with an empty replacement.
                statement.remove(pos);
            }
            Lookup::Found(_) => {
                diags.push(CompileError::new(
                    ErrorCode::Macsub(5201),
                    statement[pos].span.clone(),
                    format!("`{name}` is not an expander macro"),
                ));
                statement.remove(pos);
            }
            Lookup::Unbound => {
                diags.push(CompileError::new(
                    ErrorCode::Macsub(5202),
                    statement[pos].span.clone(),
                    format!("unresolved expander `{name}`"),
                ));
                statement.remove(pos);
            }
            Lookup::Ambiguous(_) => {
                diags.push(CompileError::new(
                    ErrorCode::Macsub(5203),
                    statement[pos].span.clone(),
                    format!("ambiguous expander `{name}`"),
                ));
                statement.remove(pos);
            }
        }
    }
    statement
}

#[derive(Debug, Clone, Copy)]
enum CandidateKind {
    StringPseudomacro,
    Operator,
    Control,
    Function,
}

#[derive(Debug, Clone)]
struct Candidate {
    precedence: i32,
    kind: CandidateKind,
    name: String,
    /// The winning symbol's macro handle (0 if the candidate is a string
    /// pseudomacro, which has no backing symbol).
    handle: u32,
    userdata: Option<Value>,
}

fn is_control_macro(ctx: &MacsubContext, name: &str) -> bool {
    matches!(
        ctx.symtab().lookup(&ctx.qualify(name)),
        Lookup::Found(sym) if sym.kind == SymbolKind::ControlMacro
    )
}

/// Find the best macro candidate per the precedence/position rules:
/// lowest precedence wins; ties broken by position (odd precedence →
/// leftmost, even precedence → rightmost).
fn best_candidate(ctx: &MacsubContext, statement: &Statement) -> Option<(usize, Candidate)> {
    let mut best: Option<(usize, Candidate)> = None;
    for (i, unit) in statement.iter().enumerate() {
        let candidate = match &unit.kind {
            UnitKind::LString(_) | UnitKind::RString(_) | UnitKind::LRString(_) => {
                Some(Candidate {
                    precedence: STRING_PSEUDOMACRO_PRECEDENCE,
                    kind: CandidateKind::StringPseudomacro,
                    name: unit.literal_text().unwrap_or_default().to_string(),
                    handle: 0,
                    userdata: None,
                })
            }
            UnitKind::Bareword(name) => {
                match ctx.symtab().lookup(&ctx.qualify(name)) {
                    Lookup::Found(sym) => {
                        let (handle, userdata) = macro_payload(&sym);
                        match sym.kind {
                            SymbolKind::OperatorMacro => Some(Candidate {
                                precedence: sym.precedence().unwrap_or(0),
                                kind: CandidateKind::Operator,
                                name: name.clone(),
                                handle,
                                userdata,
                            }),
                            SymbolKind::ControlMacro if i == 0 => Some(Candidate {
                                precedence: CONTROL_MACRO_PRECEDENCE,
                                kind: CandidateKind::Control,
                                name: name.clone(),
                                handle,
                                userdata,
                            }),
                            SymbolKind::FunctionMacro if i == 0 => Some(Candidate {
                                precedence: i32::MAX,
                                kind: CandidateKind::Function,
                                name: name.clone(),
                                handle,
                                userdata,
                            }),
                            _ => None,
                        }
                    }
                    _ => None,
                }
            }
            _ => None,
        };
        let Some(candidate) = candidate else { continue };
        best = Some(match best.take() {
            None => (i, candidate),
            Some((bi, bc)) => {
                if candidate.precedence < bc.precedence {
                    (i, candidate)
                } else if candidate.precedence > bc.precedence {
                    (bi, bc)
                } else if bc.precedence % 2 != 0 {
                    (bi, bc) // odd precedence: leftmost (already held) wins
                } else {
                    (i, candidate) // even precedence: rightmost wins
                }
            }
        });
    }
    best
}

/// Dispatch the winning candidate: if its symbol has a registered
/// substitution callback, invoke it under the `ava_mss_done`/
/// `ava_mss_again` retry contract; otherwise fall back to the engine's
/// generic per-kind template. Returns how many of `following_statements`
/// were reported consumed.
fn dispatch(
    ctx: &MacsubContext,
    statement: Statement,
    idx: usize,
    candidate: Candidate,
    following_statements: &[Statement],
    diags: &mut Diagnostics,
) -> (Box<dyn SemNode>, usize) {
    if candidate.handle != 0 {
        if let Some(callback) = ctx.registry().get(candidate.handle) {
            return invoke_registered(ctx, statement, idx, candidate, callback, following_statements, diags);
        }
    }
    let node = match candidate.kind {
        CandidateKind::StringPseudomacro | CandidateKind::Operator => {
            dispatch_binary_split(ctx, statement, idx, &candidate.name, diags)
        }
        CandidateKind::Control | CandidateKind::Function => {
            let provoking = statement[idx].clone();
            let rest: Vec<Unit> = statement
                .into_iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, u)| u)
                .collect();
            dispatch_rest_as_args(ctx, &provoking, &rest, diags)
        }
    };
    (node, 0)
}

/// `ava_mss_done` finishes the substitution outright; `ava_mss_again`
/// hands back a replacement statement and restarts expansion from step
/// 1 (a fresh expander pass, then candidate selection again) against it.
/// `consumed_rest` (set by the callback) means the callback has already
/// absorbed every statement in `following_statements` into its own
/// result, so the caller must not substitute them again.
fn invoke_registered(
    ctx: &MacsubContext,
    statement: Statement,
    idx: usize,
    candidate: Candidate,
    callback: MacroFn,
    following_statements: &[Statement],
    diags: &mut Diagnostics,
) -> (Box<dyn SemNode>, usize) {
    let provoking = statement[idx].clone();
    let mut consumed_rest = false;
    let invocation = MacroInvocation {
        statement: &statement,
        provoking: &provoking,
        userdata: candidate.userdata.as_ref(),
    };
    match callback(ctx, invocation, diags, &mut consumed_rest) {
        SubstOutcome::Done(node) => (node, if consumed_rest { following_statements.len() } else { 0 }),
        SubstOutcome::Again(replacement) => {
            if consumed_rest {
                let (node, _) = substitute_statement_with_rest(ctx, replacement, &[], diags);
                (node, following_statements.len())
            } else {
                substitute_statement_with_rest(ctx, replacement, following_statements, diags)
            }
        }
    }
}

fn dispatch_rest_as_args(
    ctx: &MacsubContext,
    provoking: &Unit,
    rest: &[Unit],
    diags: &mut Diagnostics,
) -> Box<dyn SemNode> {
    let name = match &provoking.kind {
        UnitKind::Bareword(n) => n.clone(),
        other => format!("{other:?}"),
    };
    let span = provoking.span.clone();
    let args = rest
        .iter()
        .cloned()
        .map(|u| unit_to_node(ctx, u, diags))
        .collect();
    Box::new(CallNode {
        span: span.clone(),
        callee: Box::new(VarRefNode {
            span,
            name,
            register: crate::pcode::Register { class: crate::pcode::RegClass::V, index: 0 },
        }),
        args,
    })
}

/// The generic operator-macro shape: split the statement around the
/// provoking unit and recursively substitute each side, matching
/// `a * b + c * d` → `+(*(a,b), *(c,d))`.
fn dispatch_binary_split(
    ctx: &MacsubContext,
    statement: Statement,
    idx: usize,
    operator_name: &str,
    diags: &mut Diagnostics,
) -> Box<dyn SemNode> {
    let span = statement_span(&statement);
    let (left, rest) = statement.split_at(idx);
    let right = &rest[1..];

    let left_node = if left.is_empty() {
        diags.push(CompileError::new(
            ErrorCode::Macsub(5204),
            span.clone(),
            format!("`{operator_name}` is missing its left operand"),
        ));
        Box::new(ErrorNode { span: span.clone() }) as Box<dyn SemNode>
    } else {
        substitute_statement(ctx, left.to_vec(), diags)
    };
    let right_node = if right.is_empty() {
        diags.push(CompileError::new(
            ErrorCode::Macsub(5205),
            span.clone(),
            format!("`{operator_name}` is missing its right operand"),
        ));
        Box::new(ErrorNode { span: span.clone() }) as Box<dyn SemNode>
    } else {
        substitute_statement(ctx, right.to_vec(), diags)
    };

    Box::new(CallNode {
        span: span.clone(),
        callee: Box::new(VarRefNode {
            span,
            name: operator_name.to_string(),
            register: crate::pcode::Register { class: crate::pcode::RegClass::V, index: 0 },
        }),
        args: vec![left_node, right_node],
    })
}

/// Convert a single unit (outside of macro-candidate position) to its
/// semantic form.
fn unit_to_node(ctx: &MacsubContext, unit: Unit, diags: &mut Diagnostics) -> Box<dyn SemNode> {
    let span = unit.span.clone();
    match unit.kind {
        UnitKind::Bareword(name) => resolve_bareword(ctx, span, name),
        UnitKind::AString(s) | UnitKind::Verbatim(s) | UnitKind::LString(s) | UnitKind::RString(s)
        | UnitKind::LRString(s) => Box::new(LiteralNode { span, value: Value::of_string_str(&s) }),
        UnitKind::Substitution(stmts) => {
            // Transparent grouping: same symbol scope and varscope as the
            // enclosing context.
            let statements = substitute_sequence(ctx, stmts, diags);
            Box::new(SeqNode { span, statements })
        }
        UnitKind::Block(stmts) => {
            // A block is the structural unit function bodies are built
            // from: it gets its own symbol scope and its own varscope, and
            // links back into the enclosing varscope so captures it makes
            // (now or discovered later) propagate out to it.
            let child = ctx.push_major("block$");
            let statements = substitute_sequence(&child, stmts, diags);
            ctx.varscope().ref_scope(child.varscope());
            Box::new(SeqNode { span, statements })
        }
        UnitKind::Semiliteral(units) => {
            let elements = units.into_iter().map(|u| unit_to_node(ctx, u, diags)).collect();
            Box::new(ListNode { span, elements })
        }
        UnitKind::Expander(name) => {
            diags.push(CompileError::new(
                ErrorCode::Macsub(5206),
                span.clone(),
                format!("expander `{name}` left unresolved in argument position"),
            ));
            Box::new(ErrorNode { span })
        }
        UnitKind::Spread(inner) => {
            let inner_unit = (*inner).clone();
            let inner_node = unit_to_node(ctx, inner_unit, diags);
            Box::new(SpreadNode { span, inner: inner_node })
        }
    }
}

fn resolve_bareword(ctx: &MacsubContext, span: crate::error::SourceSpan, name: String) -> Box<dyn SemNode> {
    match ctx.symtab().lookup(&ctx.qualify(&name)) {
        Lookup::Found(sym)
            if matches!(sym.kind, SymbolKind::LocalVariable | SymbolKind::GlobalVariable) =>
        {
            ctx.varscope().ref_var(&sym.full_name);
            let index = ctx.varscope().get_index(&sym.full_name).unwrap_or(0);
            Box::new(VarRefNode {
                span,
                name,
                register: crate::pcode::Register { class: crate::pcode::RegClass::V, index: index as u32 },
            })
        }
        _ => Box::new(LiteralNode { span, value: Value::of_string_str(&name) }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::{Payload, Strength, Symbol, SymbolTable, Visibility};
    use std::path::PathBuf;

    fn unit(kind: UnitKind) -> Unit {
        Unit::new(kind, crate::error::SourceSpan::point(PathBuf::from("t.ava"), 0, 0, 0))
    }

    fn operator(name: &str, precedence: i32) -> Symbol {
        Symbol {
            kind: SymbolKind::OperatorMacro,
            nesting_level: 0,
            visibility: Visibility::Public,
            full_name: name.to_string(),
            payload: Payload::Macro { precedence, handle: 0, userdata: None },
        }
    }

    fn ctx_with(symbols: &[Symbol]) -> MacsubContext {
        let root = SymbolTable::new_root();
        for s in symbols {
            root.define(s.clone());
        }
        MacsubContext::root(root, "t.ava")
    }

    #[test]
    fn two_barewords_with_no_macro_build_a_call_node() {
        let ctx = ctx_with(&[]);
        let mut diags = Diagnostics::new();
        let stmt = vec![
            unit(UnitKind::Bareword("foo".to_string())),
            unit(UnitKind::Bareword("bar".to_string())),
        ];
        let node = substitute_statement(&ctx, stmt, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(node.get_funname(), Some("foo"));
    }

    #[test]
    fn operator_precedence_nests_the_lower_precedence_operator_outermost() {
        let ctx = ctx_with(&[operator("+", 10), operator("*", 20)]);
        let mut diags = Diagnostics::new();
        let stmt = vec![
            unit(UnitKind::Bareword("a".to_string())),
            unit(UnitKind::Bareword("*".to_string())),
            unit(UnitKind::Bareword("b".to_string())),
            unit(UnitKind::Bareword("+".to_string())),
            unit(UnitKind::Bareword("c".to_string())),
            unit(UnitKind::Bareword("*".to_string())),
            unit(UnitKind::Bareword("d".to_string())),
        ];
        let node = substitute_statement(&ctx, stmt, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(node.get_funname(), Some("+"));
    }

    #[test]
    fn unresolved_expander_is_diagnosed_and_removed() {
        let ctx = ctx_with(&[]);
        let mut diags = Diagnostics::new();
        let stmt = vec![
            unit(UnitKind::Expander("missing".to_string())),
            unit(UnitKind::Bareword("x".to_string())),
        ];
        let node = substitute_statement(&ctx, stmt, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(node.get_funname(), Some("x"));
    }

    fn literal_callback(
        _ctx: &MacsubContext,
        invocation: MacroInvocation,
        _diags: &mut Diagnostics,
        consumed_rest: &mut bool,
    ) -> SubstOutcome {
        *consumed_rest = false;
        SubstOutcome::Done(Box::new(LiteralNode {
            span: invocation.provoking.span.clone(),
            value: Value::of_string_str("called"),
        }))
    }

    #[test]
    fn registered_operator_macro_callback_runs_instead_of_the_generic_binary_split() {
        let root = SymbolTable::new_root();
        root.define(Symbol {
            kind: SymbolKind::OperatorMacro,
            nesting_level: 0,
            visibility: Visibility::Public,
            full_name: "@@".to_string(),
            payload: Payload::Macro { precedence: 10, handle: 42, userdata: None },
        });
        let registry = crate::macsub::registry::MacroRegistry::new();
        registry.register(42, literal_callback);
        let ctx = MacsubContext::root_with_registry(root, "t.ava", registry);
        let mut diags = Diagnostics::new();
        let stmt = vec![
            unit(UnitKind::Bareword("a".to_string())),
            unit(UnitKind::Bareword("@@".to_string())),
            unit(UnitKind::Bareword("b".to_string())),
        ];
        let node = substitute_statement(&ctx, stmt, &mut diags);
        assert_eq!(node.get_constexpr(), Some(Value::of_string_str("called")));
    }

    fn consuming_callback(
        _ctx: &MacsubContext,
        invocation: MacroInvocation,
        _diags: &mut Diagnostics,
        consumed_rest: &mut bool,
    ) -> SubstOutcome {
        *consumed_rest = true;
        SubstOutcome::Done(Box::new(LiteralNode {
            span: invocation.provoking.span.clone(),
            value: Value::of_string_str("swallowed"),
        }))
    }

    #[test]
    fn consumed_rest_skips_following_statements_in_a_sequence() {
        let root = SymbolTable::new_root();
        root.define(Symbol {
            kind: SymbolKind::ControlMacro,
            nesting_level: 0,
            visibility: Visibility::Public,
            full_name: "ctl".to_string(),
            payload: Payload::Macro { precedence: 0, handle: 7, userdata: None },
        });
        let registry = crate::macsub::registry::MacroRegistry::new();
        registry.register(7, consuming_callback);
        let ctx = MacsubContext::root_with_registry(root, "t.ava", registry);
        let mut diags = Diagnostics::new();
        let statements = vec![
            vec![unit(UnitKind::Bareword("ctl".to_string()))],
            vec![unit(UnitKind::Bareword("never_reached".to_string()))],
        ];
        let nodes = substitute_sequence(&ctx, statements, &mut diags);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].get_constexpr(), Some(Value::of_string_str("swallowed")));
    }

    #[test]
    fn block_unit_pushes_a_major_scope_and_propagates_its_captures_to_the_parent() {
        let root = SymbolTable::new_root();
        root.define(Symbol {
            kind: SymbolKind::LocalVariable,
            nesting_level: 0,
            visibility: Visibility::Public,
            full_name: "x".to_string(),
            payload: Payload::Variable { mutable: false, constexpr: None },
        });
        let ctx = MacsubContext::root(root, "t.ava");
        let mut diags = Diagnostics::new();
        let block = unit(UnitKind::Block(vec![vec![unit(UnitKind::Bareword("x".to_string()))]]));
        unit_to_node(&ctx, block, &mut diags);
        assert!(ctx.varscope().captures().contains(&"x".to_string()));
    }
}
