//! `ava_core`: the front-end of the Avalanche bootstrap compiler — value
//! and string model, lexer and simplified-AST parser, macro substitution
//! engine, symbol table, per-function capture tracker, and the P-code/
//! X-code validator that turns generated P-code into a register-renamed,
//! flow-graphed, liveness-checked form.
//!
//! Code generation proper (semantic AST → P-code) is an external
//! collaborator's responsibility; this crate supplies the AST vtable and
//! a small register allocator ([`macsub::codegen`]) that a generator
//! plugs into, and validates whatever P-code results.

pub mod env;
pub mod error;
pub mod macsub;
pub mod parse;
pub mod pcode;
pub mod symtab;
pub mod value;
pub mod varscope;
pub mod xcode;

pub use error::{CompileError, Diagnostics, ErrorCode, SourceSpan};
pub use pcode::{Atom, PCode, RegClass, Register};
