//! Semantic AST: the macro substitution engine's output, consumed by the
//! (external) code generator. Every node implements [`SemNode`]; an
//! operation a node does not support returns its default (a diagnosed
//! "operation not supported" error at the call site, not a panic).

use crate::error::{CompileError, ErrorCode, SourceSpan};
use crate::value::Value;

use super::codegen::CodegenState;
use crate::pcode::Register;

/// An lvalue: something `cg_define`/assignment can target. Concrete shape
/// is left to the node that produces it — a register to store into here,
/// a global slot elsewhere — so this core only fixes the common case
/// semantic nodes need (a destination register).
#[derive(Debug, Clone)]
pub struct Lvalue {
    pub target: Register,
}

/// The shared vtable every semantic node implements. Default
/// implementations diagnose "operation not supported" rather than
/// panicking, matching the "missing operation is a semantic error"
/// design.
pub trait SemNode: std::fmt::Debug {
    fn span(&self) -> &SourceSpan;

    fn to_string_repr(&self) -> Option<String> {
        None
    }

    fn to_lvalue(&self) -> Result<Lvalue, CompileError> {
        Err(unsupported(self.span(), "to_lvalue"))
    }

    /// Run after substitution completes, for nodes that need a chance to
    /// validate themselves against the finished tree (e.g. closures
    /// checking their captures). Default: no-op.
    fn postprocess(&mut self) {}

    fn get_constexpr(&self) -> Option<Value> {
        None
    }

    /// Like `get_constexpr`, but for a node standing for a *spread* of
    /// values (e.g. a constant list to be spliced as arguments).
    fn get_constexpr_spread(&self) -> Option<Vec<Value>> {
        None
    }

    /// The bare function name this node names, for call-site macro
    /// dispatch that needs to know what it is calling without fully
    /// evaluating it.
    fn get_funname(&self) -> Option<&str> {
        None
    }

    /// Emit setup code (reference-counted: repeat calls before a matching
    /// `cg_tear_down` only increment a use count and must not re-run side
    /// effects).
    fn cg_set_up(&self, _cg: &mut CodegenState) -> Result<(), CompileError> {
        Ok(())
    }

    /// Emit code that evaluates this node to a single register and
    /// returns it.
    fn cg_evaluate(&self, _cg: &mut CodegenState) -> Result<Register, CompileError> {
        Err(unsupported(self.span(), "cg_evaluate"))
    }

    /// Emit code that evaluates this node as a spread (zero or more
    /// registers, e.g. for call argument splicing).
    fn cg_spread(&self, cg: &mut CodegenState) -> Result<Vec<Register>, CompileError> {
        Ok(vec![self.cg_evaluate(cg)?])
    }

    /// Emit code that evaluates this node purely for side effects,
    /// discarding any result.
    fn cg_discard(&self, cg: &mut CodegenState) -> Result<(), CompileError> {
        self.cg_evaluate(cg).map(|_| ())
    }

    /// Force a lazily-produced value to materialize (default: a no-op,
    /// since most nodes are already strict).
    fn cg_force(&self, _cg: &mut CodegenState) -> Result<(), CompileError> {
        Ok(())
    }

    /// Emit code that defines (binds) this node as an lvalue to the value
    /// already evaluated into `value`.
    fn cg_define(&self, _cg: &mut CodegenState, _value: Register) -> Result<(), CompileError> {
        Err(unsupported(self.span(), "cg_define"))
    }

    /// The matching decrement/teardown for `cg_set_up`.
    fn cg_tear_down(&self, _cg: &mut CodegenState) -> Result<(), CompileError> {
        Ok(())
    }
}

fn unsupported(span: &SourceSpan, op: &str) -> CompileError {
    CompileError::new(
        ErrorCode::Macsub(5210),
        span.clone(),
        format!("operation `{op}` is not supported on this node"),
    )
}

/// A semantic node standing in for a failed substitution. Participates in
/// the tree without propagating further diagnostics: every operation is a
/// silent no-op (or a constant-zero-arity success) rather than the
/// default "unsupported" diagnostic.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub span: SourceSpan,
}

impl SemNode for ErrorNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn to_lvalue(&self) -> Result<Lvalue, CompileError> {
        Ok(Lvalue {
            target: Register { class: crate::pcode::RegClass::D, index: 0 },
        })
    }

    fn cg_evaluate(&self, cg: &mut CodegenState) -> Result<Register, CompileError> {
        Ok(cg.alloc(crate::pcode::RegClass::D))
    }

    fn cg_define(&self, _cg: &mut CodegenState, _value: Register) -> Result<(), CompileError> {
        Ok(())
    }
}

/// A compile-time constant value (the result of folding a literal unit).
#[derive(Debug, Clone)]
pub struct LiteralNode {
    pub span: SourceSpan,
    pub value: Value,
}

impl SemNode for LiteralNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn to_string_repr(&self) -> Option<String> {
        Some(self.value.to_ava_string().to_string_lossy())
    }

    fn get_constexpr(&self) -> Option<Value> {
        Some(self.value.clone())
    }

    fn cg_evaluate(&self, cg: &mut CodegenState) -> Result<Register, CompileError> {
        let reg = cg.alloc(crate::pcode::RegClass::D);
        cg.emit(
            "ldimm-s",
            vec![
                crate::pcode::Atom::Reg(reg),
                crate::pcode::Atom::Str(self.value.to_ava_string().to_string_lossy()),
            ],
        );
        Ok(reg)
    }
}

/// A reference to a variable register bound in the enclosing function's
/// varscope.
#[derive(Debug, Clone)]
pub struct VarRefNode {
    pub span: SourceSpan,
    pub name: String,
    pub register: Register,
}

impl SemNode for VarRefNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn to_string_repr(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn get_funname(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn to_lvalue(&self) -> Result<Lvalue, CompileError> {
        Ok(Lvalue { target: self.register })
    }

    fn cg_evaluate(&self, cg: &mut CodegenState) -> Result<Register, CompileError> {
        let dest = cg.alloc(crate::pcode::RegClass::D);
        cg.emit(
            "mov",
            vec![
                crate::pcode::Atom::Reg(dest),
                crate::pcode::Atom::Reg(self.register),
            ],
        );
        Ok(dest)
    }

    fn cg_define(&self, cg: &mut CodegenState, value: Register) -> Result<(), CompileError> {
        cg.emit(
            "mov",
            vec![
                crate::pcode::Atom::Reg(self.register),
                crate::pcode::Atom::Reg(value),
            ],
        );
        Ok(())
    }
}

/// A non-macro statement: a call construction handed to the code
/// generator unevaluated, per "the whole statement becomes a non-macro
/// statement node" when no macro candidate is found.
#[derive(Debug)]
pub struct CallNode {
    pub span: SourceSpan,
    pub callee: Box<dyn SemNode>,
    pub args: Vec<Box<dyn SemNode>>,
}

impl SemNode for CallNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn get_funname(&self) -> Option<&str> {
        self.callee.get_funname()
    }

    fn cg_evaluate(&self, cg: &mut CodegenState) -> Result<Register, CompileError> {
        let mut arg_regs = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            for r in arg.cg_spread(cg)? {
                arg_regs.push(r);
            }
        }
        // Note the base index before pushing any argument register so the
        // range `(base, arg_regs.len())` is well-formed even when there
        // are zero arguments (no push at all, an empty range).
        let base = Register { class: crate::pcode::RegClass::P, index: cg.height(crate::pcode::RegClass::P) };
        for r in &arg_regs {
            let slot = cg.alloc(crate::pcode::RegClass::P);
            cg.emit(
                "mov",
                vec![crate::pcode::Atom::Reg(slot), crate::pcode::Atom::Reg(*r)],
            );
        }
        // A bound-function call (`call-d`): the callee is evaluated like
        // any other value rather than resolved against the global table,
        // since this node has no access to one — global-index resolution
        // for statically-known callees is the real code generator's job.
        let callee_reg = self.callee.cg_evaluate(cg)?;
        let dest = cg.alloc(crate::pcode::RegClass::D);
        cg.emit(
            "call-d",
            vec![
                crate::pcode::Atom::Reg(dest),
                crate::pcode::Atom::Reg(callee_reg),
                crate::pcode::Atom::Reg(base),
                crate::pcode::Atom::Int(arg_regs.len() as i64),
            ],
        );
        if !arg_regs.is_empty() {
            cg.free(crate::pcode::RegClass::P, arg_regs.len() as u32);
        }
        Ok(dest)
    }
}

/// A parenthesized sequence of statements (`( a; b; c )`): all but the
/// last are evaluated for effect only, the last is the value.
#[derive(Debug)]
pub struct SeqNode {
    pub span: SourceSpan,
    pub statements: Vec<Box<dyn SemNode>>,
}

impl SemNode for SeqNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn get_funname(&self) -> Option<&str> {
        self.statements.last().and_then(|n| n.get_funname())
    }

    fn cg_evaluate(&self, cg: &mut CodegenState) -> Result<Register, CompileError> {
        let (last, init) = match self.statements.split_last() {
            Some(pair) => pair,
            None => return Ok(cg.alloc(crate::pcode::RegClass::D)),
        };
        for stmt in init {
            stmt.cg_discard(cg)?;
        }
        last.cg_evaluate(cg)
    }
}

/// A bracketed literal-list construction (`[a b c]`). Codegen for list
/// assembly is the collaborating code generator's concern; this node only
/// supports constant folding.
#[derive(Debug)]
pub struct ListNode {
    pub span: SourceSpan,
    pub elements: Vec<Box<dyn SemNode>>,
}

impl SemNode for ListNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn get_constexpr_spread(&self) -> Option<Vec<Value>> {
        self.elements.iter().map(|e| e.get_constexpr()).collect()
    }
}

/// `\*x`: wraps any unit to mark it as a spread at its use site. Only
/// meaningful in spread position (`cg_spread`); evaluating it to a single
/// register is unsupported.
#[derive(Debug)]
pub struct SpreadNode {
    pub span: SourceSpan,
    pub inner: Box<dyn SemNode>,
}

impl SemNode for SpreadNode {
    fn span(&self) -> &SourceSpan {
        &self.span
    }

    fn cg_spread(&self, cg: &mut CodegenState) -> Result<Vec<Register>, CompileError> {
        self.inner.cg_spread(cg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn span() -> SourceSpan {
        SourceSpan::point(PathBuf::from("t.ava"), 0, 0, 0)
    }

    #[test]
    fn error_node_to_lvalue_never_fails() {
        let n = ErrorNode { span: span() };
        assert!(n.to_lvalue().is_ok());
    }

    #[test]
    fn default_node_operations_report_unsupported() {
        #[derive(Debug)]
        struct Bare(SourceSpan);
        impl SemNode for Bare {
            fn span(&self) -> &SourceSpan {
                &self.0
            }
        }
        let n = Bare(span());
        let err = n.to_lvalue().unwrap_err();
        assert_eq!(err.code, ErrorCode::Macsub(5210));
    }

    #[test]
    fn literal_node_evaluates_to_a_register() {
        let n = LiteralNode {
            span: span(),
            value: Value::of_string_str("x"),
        };
        let mut cg = CodegenState::new();
        let reg = n.cg_evaluate(&mut cg).unwrap();
        assert_eq!(reg.class, crate::pcode::RegClass::D);
    }
}
