//! Integration coverage for the testable end-to-end scenarios: parsing,
//! operator-precedence macro expansion through the full substitution
//! engine, the compilation environment's error paths, and P-code textual
//! round-tripping. Cyclic-dependency detection itself is covered where
//! the loading stack lives, in `env.rs`'s own test module.

use std::path::Path;

use ava_core::env::{CompilationEnvironment, CoreConfig, MemorySourceReader};
use ava_core::error::ErrorCode;
use ava_core::macsub::MacsubContext;
use ava_core::parse;
use ava_core::pcode::text;
use ava_core::symtab::{Payload, SymbolKind, SymbolTable, Visibility};

fn define_operator(root: &std::rc::Rc<SymbolTable>, name: &str, precedence: i32) {
    root.define(ava_core::symtab::Symbol {
        kind: SymbolKind::OperatorMacro,
        nesting_level: 0,
        visibility: Visibility::Public,
        full_name: name.to_string(),
        payload: Payload::Macro { precedence, handle: 0, userdata: None },
    });
}

#[test]
fn parse_empty_yields_no_statements_and_no_diagnostics() {
    let (stmts, diags) = parse::parse("t.ava", "");
    assert!(stmts.is_empty());
    assert!(diags.is_empty());
}

#[test]
fn operator_precedence_expands_through_the_full_substitution_pipeline() {
    let (stmts, diags) = parse::parse("t.ava", "a * b + c * d");
    assert!(diags.is_empty(), "{diags:?}");
    assert_eq!(stmts.len(), 1);

    let root = SymbolTable::new_root();
    define_operator(&root, "+", 10);
    define_operator(&root, "*", 20);
    let ctx = MacsubContext::root(root, "t.ava");

    let mut macsub_diags = ava_core::error::Diagnostics::new();
    let node = ava_core::macsub::substitute_statement(&ctx, stmts.into_iter().next().unwrap(), &mut macsub_diags);
    assert!(macsub_diags.is_empty(), "{macsub_diags:?}");
    // The outer node is the lowest-precedence operator: `+`.
    assert_eq!(node.get_funname(), Some("+"));
}

#[test]
fn sequential_compiles_of_the_same_filename_are_not_mistaken_for_a_cycle() {
    // The loading-stack cycle check (spec end-to-end scenario 6) only
    // fires while a filename's own compilation is still in progress;
    // recursive import-driven re-entry is the import macro's concern
    // (external to this core), so this checks the non-cyclic case the
    // core itself is responsible for: the stack is popped on completion,
    // so compiling the same filename again afterward is unaffected.
    let reader = MemorySourceReader::new().with_source("a.ava", "foo bar");
    let env = CompilationEnvironment::new(CoreConfig::default(), reader);
    let first = env.compile_file(Path::new("a.ava"));
    let second = env.compile_file(Path::new("a.ava"));
    assert!(first.errors.is_empty());
    assert!(second.errors.is_empty());
}

#[test]
fn missing_source_leaves_no_pcode_and_reports_io_error() {
    let env = CompilationEnvironment::new(CoreConfig::default(), MemorySourceReader::new());
    let output = env.compile_file(Path::new("nowhere.ava"));
    assert!(output.pcode.is_none());
    assert!(output.errors.iter().any(|e| e.code == ErrorCode::Io(5902)));
}

#[test]
fn pcode_text_round_trips_a_function_body() {
    let src = r#"(defun v0 {
  (push d 1)
  (ldimm-i d0 42)
  (ret d0)
})"#;
    let atoms = text::parse(src).expect("parses");
    let serialized = text::serialize(&atoms);
    let reparsed = text::parse(&serialized).expect("reparses");
    assert_eq!(atoms, reparsed);
}
