//! Macro substitution: turns a parsed statement (a non-empty unit list)
//! into a semantic AST node — expander splicing, then best-candidate
//! selection among operator/control/function macros by precedence and
//! associativity, then the winning macro's own substitution shape (a
//! registered callback's, or the engine's generic per-kind template).

pub mod codegen;
pub mod context;
pub mod expand;
pub mod gensym;
pub mod node;
pub mod registry;

pub use context::MacsubContext;
pub use expand::{substitute_sequence, substitute_statement};
pub use gensym::Gensym;
pub use node::{CallNode, ErrorNode, LiteralNode, Lvalue, ListNode, SemNode, SeqNode, SpreadNode, VarRefNode};
pub use registry::{MacroFn, MacroInvocation, MacroRegistry, SubstOutcome};
