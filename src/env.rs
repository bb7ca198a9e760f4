//! Compilation environment: the driver that turns a source file into
//! P-code and validated X-code, per the compile_file algorithm. Source
//! reading and code generation are both injected, so callers can serve
//! sources from disk, memory, or a virtual file system (and, for tests,
//! from a closure that simulates a cycle), and can plug in a real
//! generator that turns substituted nodes into P-code.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::error::{CompileError, Diagnostics, ErrorCode, SourceSpan};
use crate::macsub::{substitute_sequence, MacsubContext, SemNode};
use crate::parse;
use crate::pcode::PCode;
use crate::symtab::SymbolTable;
use crate::xcode::{self, XFunction};

/// Injected source reader. Returns the concatenated sources that make up
/// one compilation unit's filename, in the order `read_source` would
/// alternate `(filename, text)` pairs — here just `(filename, text)`
/// itself, since this core does not model multi-file module bundling.
pub trait SourceReader {
    fn read_source(&self, filename: &Path) -> Result<String, String>;
}

/// A reader backed by an in-memory map, primarily for tests and
/// embedding scenarios that do not want filesystem access.
#[derive(Debug, Default, Clone)]
pub struct MemorySourceReader {
    sources: HashMap<PathBuf, String>,
}

impl MemorySourceReader {
    pub fn new() -> MemorySourceReader {
        MemorySourceReader::default()
    }

    pub fn with_source(mut self, filename: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.sources.insert(filename.into(), text.into());
        self
    }
}

impl SourceReader for MemorySourceReader {
    fn read_source(&self, filename: &Path) -> Result<String, String> {
        self.sources
            .get(filename)
            .cloned()
            .ok_or_else(|| format!("no source registered for {}", filename.display()))
    }
}

/// A reader backed by the real filesystem.
#[derive(Debug, Default, Clone)]
pub struct FsSourceReader;

impl SourceReader for FsSourceReader {
    fn read_source(&self, filename: &Path) -> Result<String, String> {
        std::fs::read_to_string(filename).map_err(|e| e.to_string())
    }
}

/// Injected code generator: turns a compilation unit's substituted and
/// postprocessed semantic nodes into P-code. A concrete front-end
/// supplies the real instruction-emitting walk here; this core only
/// defines the seam and the no-op default.
pub trait CodeGenerator {
    fn generate(&self, nodes: &[Box<dyn SemNode>]) -> PCode;
}

/// The generator used when none is injected: produces empty P-code, so
/// `compile_file` still runs X-code validation (against zero functions)
/// rather than skip the step outright.
#[derive(Debug, Default, Clone)]
pub struct NoopCodeGenerator;

impl CodeGenerator for NoopCodeGenerator {
    fn generate(&self, _nodes: &[Box<dyn SemNode>]) -> PCode {
        PCode::default()
    }
}

/// Configuration for one [`CompilationEnvironment`], loaded the way the
/// embedding driver loads any other TOML config: a `package_prefix`
/// prepended to top-level symbol names.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub package_prefix: String,
}

impl CoreConfig {
    pub fn from_toml(text: &str) -> Result<CoreConfig, toml::de::Error> {
        toml::from_str(text)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig { package_prefix: String::new() }
    }
}

/// Everything `compile_file` produces, with partial results retained even
/// when `errors` is non-empty — per "any error occurring at any step
/// leaves partial outputs in place for downstream inspection."
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub pcode: Option<PCode>,
    pub xcode: Vec<XFunction>,
    pub errors: Diagnostics,
}

/// The compilation environment: package prefix, injected source reader
/// and code generator, and the loading-module stack used for cycle
/// detection. `G` defaults to [`NoopCodeGenerator`] so existing callers
/// that only care about parsing/substitution/validation keep using
/// `CompilationEnvironment::new` unchanged.
pub struct CompilationEnvironment<R: SourceReader, G: CodeGenerator = NoopCodeGenerator> {
    pub config: CoreConfig,
    reader: R,
    codegen: G,
    loading: RefCell<Vec<PathBuf>>,
    root_symtab: Rc<SymbolTable>,
}

impl<R: SourceReader> CompilationEnvironment<R, NoopCodeGenerator> {
    pub fn new(config: CoreConfig, reader: R) -> Self {
        CompilationEnvironment::with_codegen(config, reader, NoopCodeGenerator)
    }
}

impl<R: SourceReader, G: CodeGenerator> CompilationEnvironment<R, G> {
    pub fn with_codegen(config: CoreConfig, reader: R, codegen: G) -> Self {
        CompilationEnvironment {
            config,
            reader,
            codegen,
            loading: RefCell::new(Vec::new()),
            root_symtab: SymbolTable::new_root(),
        }
    }

    /// Factory for a fresh macro context rooted at this environment's
    /// symbol table, prefixed by `package_prefix`.
    fn new_macsub(&self, filename: &Path) -> MacsubContext {
        MacsubContext::root(self.root_symtab.clone(), filename.to_string_lossy().as_ref())
            .push_minor(&self.config.package_prefix)
    }

    #[instrument(skip(self), fields(filename = %filename.display()))]
    pub fn compile_file(&self, filename: &Path) -> CompileOutput {
        let mut errors = Diagnostics::new();

        // Step 1: cyclic dependency detection via the loading stack.
        if self.loading.borrow().iter().any(|p| p == filename) {
            errors.push(CompileError::new(
                ErrorCode::Io(5901),
                pseudo_span(filename),
                format!("cyclic dependency loading {}", filename.display()),
            ));
            return CompileOutput { pcode: None, xcode: Vec::new(), errors };
        }
        self.loading.borrow_mut().push(filename.to_path_buf());
        let output = self.compile_file_inner(filename, errors);
        self.loading.borrow_mut().pop();
        output
    }

    fn compile_file_inner(&self, filename: &Path, mut errors: Diagnostics) -> CompileOutput {
        // Step 2: read source.
        let source = match self.reader.read_source(filename) {
            Ok(s) => s,
            Err(message) => {
                errors.push(CompileError::new(
                    ErrorCode::Io(5902),
                    pseudo_span(filename),
                    format!("cannot read module source {}: {message}", filename.display()),
                ));
                return CompileOutput { pcode: None, xcode: Vec::new(), errors };
            }
        };

        // Step 3: parse into the shared root statement list.
        let (statements, parse_diags) = parse::parse_path(filename, &source);
        errors.extend(parse_diags);

        // Step 4: macro substitution. The root statement list is one
        // sequence, so a macro that consumes statements following it
        // (`consumed_rest`) sees them here too, not just inside a block.
        let ctx = self.new_macsub(filename);
        let mut nodes: Vec<Box<dyn SemNode>> = substitute_sequence(&ctx, statements, &mut errors);
        debug!(statement_count = nodes.len(), "substituted root statements");

        // Step 5: postprocess. This core's nodes are stateless for
        // postprocessing purposes; a concrete node with captures/closures
        // to finalize would override `postprocess` and this loop would
        // still drive it.
        for node in nodes.iter_mut() {
            node_postprocess(node.as_mut());
        }

        if !errors.is_empty() {
            return CompileOutput { pcode: None, xcode: Vec::new(), errors };
        }

        // Step 6: code generation, via the injected generator.
        let pcode = self.codegen.generate(&nodes);

        // Step 7: build and validate X-code from the P-code.
        let mut xfns = Vec::with_capacity(pcode.executables.len());
        for exe in &pcode.executables {
            let (xfn, diags) = xcode::validate_function(exe);
            errors.extend(diags);
            if let Some(xfn) = xfn {
                xfns.push(xfn);
            }
        }
        errors.extend(xcode::validate_globals(&pcode));

        CompileOutput { pcode: Some(pcode), xcode: xfns, errors }
    }
}

fn node_postprocess(node: &mut dyn SemNode) {
    node.postprocess();
}

fn pseudo_span(filename: &Path) -> SourceSpan {
    SourceSpan::point(filename.to_path_buf(), 0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_dependency_is_reported_without_recursing() {
        struct CyclicReader;
        impl SourceReader for CyclicReader {
            fn read_source(&self, _filename: &Path) -> Result<String, String> {
                Ok(String::new())
            }
        }
        let env = CompilationEnvironment::new(CoreConfig::default(), CyclicReader);
        env.loading.borrow_mut().push(PathBuf::from("a.ava"));
        let output = env.compile_file(Path::new("a.ava"));
        assert!(output
            .errors
            .iter()
            .any(|e| e.code == ErrorCode::Io(5901)));
    }

    #[test]
    fn missing_source_reports_cannot_read() {
        let env = CompilationEnvironment::new(CoreConfig::default(), MemorySourceReader::new());
        let output = env.compile_file(Path::new("missing.ava"));
        assert!(output.errors.iter().any(|e| e.code == ErrorCode::Io(5902)));
    }

    #[test]
    fn empty_source_compiles_with_no_errors() {
        let reader = MemorySourceReader::new().with_source("empty.ava", "");
        let env = CompilationEnvironment::new(CoreConfig::default(), reader);
        let output = env.compile_file(Path::new("empty.ava"));
        assert!(output.errors.is_empty());
        assert!(output.pcode.is_some());
    }
}
