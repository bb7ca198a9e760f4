//! P-code validator / X-code builder: six passes over one function's P-code
//! body that together produce the validated, register-renamed form the
//! interpreter/codegen backend consumes, or a list of diagnostics if the
//! body is malformed. See the module-level passes below; each corresponds
//! to one of the validator's stages (block identification, flow graph,
//! register renaming, phi propagation, use-before-init, and — at the
//! whole-program level — global cross-reference checking).

pub mod bitset;

use std::collections::HashSet;
use std::path::PathBuf;

use bitset::RegSet;

use crate::error::{CompileError, Diagnostics, ErrorCode, SourceSpan};
use crate::pcode::{self, Atom, Executable, PCode, RegClass, Register};

fn class_index(c: RegClass) -> usize {
    match c {
        RegClass::V => 0,
        RegClass::D => 1,
        RegClass::I => 2,
        RegClass::L => 3,
        RegClass::P => 4,
        RegClass::F => 5,
    }
}

const NUM_CLASSES: usize = 6;

/// P-code carries no source spans of its own (those live on the AST that
/// generated it); validator diagnostics anchor to the statement's ordinal
/// position in the function body instead.
fn pseudo_span(stmt_index: usize) -> SourceSpan {
    SourceSpan::point(PathBuf::from("<pcode>"), stmt_index as u32, 0, 0)
}

fn xcode_error(code: u32, stmt_index: usize, message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorCode::Xcode(code), pseudo_span(stmt_index), message.into())
}

/// One register operand after pass 3 renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenamedReg {
    pub class: RegClass,
    /// Its stack position as written in the source P-code (`i2` → 2).
    pub position: u32,
    /// Its function-wide unique id after renaming, valid as an index into
    /// an [`XFunction`]'s phi bitsets once offset by the class base.
    pub global: usize,
}

#[derive(Debug, Clone)]
pub struct RenamedInstr {
    pub mnemonic: String,
    pub reads: Vec<RenamedReg>,
    pub writes: Vec<RenamedReg>,
    /// Registers consumed by a range-read (e.g. a call's argument window):
    /// read, then destroyed, so they drop out of `init` after use.
    pub range_consumed: Vec<RenamedReg>,
    pub terminal: bool,
    pub conditional: bool,
    pub jump_label: Option<String>,
    /// Filled in by pass 2; `[-1, -1]` until then.
    pub jump_targets: [i32; 2],
}

#[derive(Debug, Clone)]
pub struct Block {
    pub label: Option<String>,
    pub instrs: Vec<RenamedInstr>,
    pub successors: [i32; 2],
    pub iexist: RegSet,
    pub oexist: RegSet,
    pub iinit: RegSet,
    pub oinit: RegSet,
    pub effect: RegSet,
}

#[derive(Debug, Clone)]
pub struct XFunction {
    pub blocks: Vec<Block>,
    pub total_registers: usize,
    pub num_args: usize,
}

struct Renamer {
    counters: [usize; NUM_CLASSES],
    stacks: [Vec<usize>; NUM_CLASSES],
}

impl Renamer {
    fn new(num_vars: usize) -> Renamer {
        let mut counters = [0usize; NUM_CLASSES];
        let mut stacks: [Vec<usize>; NUM_CLASSES] =
            [Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        counters[class_index(RegClass::V)] = num_vars;
        stacks[class_index(RegClass::V)] = (0..num_vars).collect();
        Renamer { counters, stacks }
    }

    fn height(&self, class: RegClass) -> usize {
        self.stacks[class_index(class)].len()
    }

    fn push(&mut self, class: RegClass, count: u32) {
        let idx = class_index(class);
        for _ in 0..count {
            let id = self.counters[idx];
            self.counters[idx] += 1;
            self.stacks[idx].push(id);
        }
    }

    fn pop(&mut self, class: RegClass, count: u32) {
        let idx = class_index(class);
        for _ in 0..count {
            self.stacks[idx].pop();
        }
    }

    /// Resolve a stack-addressed register to its renamed (class-local)
    /// global id, or `None` if `position` is out of bounds.
    fn resolve(&self, class: RegClass, position: u32) -> Option<usize> {
        self.stacks[class_index(class)].get(position as usize).copied()
    }

    /// Class-local ids currently visible on each class's stack — the
    /// "live at this point" snapshot used for `iexist`/`oexist`.
    fn snapshot(&self) -> [Vec<usize>; NUM_CLASSES] {
        self.stacks.clone()
    }
}

fn extract_str_operand(atom: &Atom, index: usize) -> Option<String> {
    match atom.as_list()?.get(index)? {
        Atom::Str(s) | Atom::Bareword(s) => Some(s.clone()),
        _ => None,
    }
}

fn extract_int_operand(atom: &Atom, index: usize) -> Option<i64> {
    match atom.as_list()?.get(index)? {
        Atom::Int(n) => Some(*n),
        _ => None,
    }
}

fn extract_reg_operand(atom: &Atom, index: usize) -> Option<Register> {
    match atom.as_list()?.get(index)? {
        Atom::Reg(r) => Some(*r),
        _ => None,
    }
}

struct RawBlock {
    label: Option<String>,
    instrs: Vec<RenamedInstr>,
    entry: [Vec<usize>; NUM_CLASSES],
    exit: [Vec<usize>; NUM_CLASSES],
}

/// Passes 1 + 3: walk the body tracking per-class stack heights (pass 1)
/// and assigning each push a fresh renamed id (pass 3) in the same
/// left-to-right sweep, since pass 3 needs exactly the height bookkeeping
/// pass 1 already computes.
fn identify_blocks_and_rename(
    exe: &Executable,
    diags: &mut Diagnostics,
) -> (Vec<RawBlock>, Renamer) {
    let mut renamer = Renamer::new(exe.num_vars);
    let mut raw_blocks = Vec::new();
    let mut seen_labels: HashSet<String> = HashSet::new();
    let mut current_label: Option<String> = Some(String::new());
    let mut current_instrs: Vec<RenamedInstr> = Vec::new();
    let mut entry_snap = renamer.snapshot();

    for (stmt_index, atom) in exe.body.iter().enumerate() {
        let Some(mnemonic) = atom.mnemonic() else {
            diags.push(xcode_error(5400, stmt_index, "malformed P-code statement"));
            continue;
        };

        if mnemonic == "label" {
            let name = extract_str_operand(atom, 1).unwrap_or_default();
            if !seen_labels.insert(name.clone()) {
                diags.push(xcode_error(5401, stmt_index, format!("duplicate label `{name}`")));
            }
            if current_instrs.is_empty() {
                current_label = Some(name);
            } else {
                let exit_snap = renamer.snapshot();
                raw_blocks.push(RawBlock {
                    label: current_label.take(),
                    instrs: std::mem::take(&mut current_instrs),
                    entry: entry_snap.clone(),
                    exit: exit_snap.clone(),
                });
                entry_snap = exit_snap;
                current_label = Some(name);
            }
            continue;
        }

        if mnemonic == "push" || mnemonic == "pop" {
            let class = extract_str_operand(atom, 1)
                .and_then(|s| s.chars().next())
                .and_then(RegClass::from_letter);
            let count = extract_int_operand(atom, 2);
            match (class, count) {
                (Some(class), Some(count)) if count >= 0 => {
                    if mnemonic == "push" {
                        renamer.push(class, count as u32);
                    } else if (count as usize) <= renamer.height(class) {
                        renamer.pop(class, count as u32);
                    } else {
                        diags.push(xcode_error(
                            5402,
                            stmt_index,
                            format!("pop underflows `{}` register stack", class.letter()),
                        ));
                    }
                    current_instrs.push(RenamedInstr {
                        mnemonic: mnemonic.to_string(),
                        reads: Vec::new(),
                        writes: Vec::new(),
                        range_consumed: Vec::new(),
                        terminal: false,
                        conditional: false,
                        jump_label: None,
                        jump_targets: [-1, -1],
                    });
                }
                _ => diags.push(xcode_error(5403, stmt_index, format!("malformed `{mnemonic}` instruction"))),
            }
            continue;
        }

        let Some(desc) = pcode::instr_desc(mnemonic) else {
            diags.push(xcode_error(5404, stmt_index, format!("unknown mnemonic `{mnemonic}`")));
            continue;
        };

        let resolve_one = |op_index: usize, diags: &mut Diagnostics| -> Option<RenamedReg> {
            let reg = extract_reg_operand(atom, op_index + 1)?;
            match renamer.resolve(reg.class, reg.index) {
                Some(global) => Some(RenamedReg { class: reg.class, position: reg.index, global }),
                None => {
                    diags.push(xcode_error(
                        5405,
                        stmt_index,
                        format!("access to out-of-range register `{reg}`"),
                    ));
                    None
                }
            }
        };

        let writes: Vec<RenamedReg> = desc.reg_writes.iter().filter_map(|&i| resolve_one(i, diags)).collect();
        let mut reads: Vec<RenamedReg> = desc.reg_reads.iter().filter_map(|&i| resolve_one(i, diags)).collect();
        let mut range_consumed = Vec::new();
        if let Some((base_op, count_op)) = desc.range_read {
            let base = extract_reg_operand(atom, base_op + 1);
            let count = extract_int_operand(atom, count_op + 1);
            if let (Some(base), Some(count)) = (base, count) {
                if count >= 0 && (base.index as i64 + count) as usize <= renamer.height(base.class) {
                    for offset in 0..count as u32 {
                        if let Some(global) = renamer.resolve(base.class, base.index + offset) {
                            let rr = RenamedReg { class: base.class, position: base.index + offset, global };
                            reads.push(rr);
                            range_consumed.push(rr);
                        }
                    }
                } else {
                    diags.push(xcode_error(
                        5406,
                        stmt_index,
                        format!("range read `{}{}..+{count}` exceeds register stack", base.class.letter(), base.index),
                    ));
                }
            } else {
                diags.push(xcode_error(5407, stmt_index, "malformed range-read operands"));
            }
        }

        let jump_label = desc.jump_operand.and_then(|op| extract_str_operand(atom, op + 1));

        current_instrs.push(RenamedInstr {
            mnemonic: mnemonic.to_string(),
            reads,
            writes,
            range_consumed,
            terminal: desc.terminal,
            conditional: desc.conditional,
            jump_label,
            jump_targets: [-1, -1],
        });

        if desc.terminal {
            let exit_snap = renamer.snapshot();
            raw_blocks.push(RawBlock {
                label: current_label.take(),
                instrs: std::mem::take(&mut current_instrs),
                entry: entry_snap.clone(),
                exit: exit_snap.clone(),
            });
            entry_snap = exit_snap;
            current_label = None;
        }
    }

    if !current_instrs.is_empty() || raw_blocks.is_empty() {
        let exit_snap = renamer.snapshot();
        raw_blocks.push(RawBlock {
            label: current_label.take(),
            instrs: current_instrs,
            entry: entry_snap,
            exit: exit_snap,
        });
    }

    for class in RegClass::all() {
        if class != RegClass::V && renamer.height(class) != 0 {
            diags.push(xcode_error(
                5408,
                exe.body.len(),
                format!("unbalanced push/pop on `{}` register class at function end", class.letter()),
            ));
        }
    }

    (raw_blocks, renamer)
}

/// Pass 2: number blocks in source order, resolve jump-label operands to
/// block indices, and assign one or two successor indices per block.
fn build_flow_graph(raw_blocks: &mut [RawBlock], diags: &mut Diagnostics) -> Vec<[i32; 2]> {
    let mut label_to_index = std::collections::HashMap::new();
    for (i, b) in raw_blocks.iter().enumerate() {
        if let Some(label) = &b.label {
            label_to_index.insert(label.clone(), i as i32);
        }
    }

    let mut successors = Vec::with_capacity(raw_blocks.len());
    let last = raw_blocks.len();
    for (i, block) in raw_blocks.iter_mut().enumerate() {
        let fallthrough = if i + 1 < last { i as i32 + 1 } else { -1 };
        let succ = match block.instrs.last_mut() {
            Some(instr) if instr.terminal => {
                let target = if let Some(label) = &instr.jump_label {
                    match label_to_index.get(label) {
                        Some(&idx) => idx,
                        None => {
                            diags.push(xcode_error(5409, i, format!("jump to undefined label `{label}`")));
                            -1
                        }
                    }
                } else {
                    -1
                };
                let succ = if instr.conditional {
                    [target, fallthrough]
                } else if instr.jump_label.is_some() {
                    [target, -1]
                } else {
                    [-1, -1]
                };
                instr.jump_targets = succ;
                succ
            }
            _ => [fallthrough, -1],
        };
        successors.push(succ);
    }
    successors
}

fn to_regset(len: usize, class_base: &[usize; NUM_CLASSES], ids: &[Vec<usize>; NUM_CLASSES]) -> RegSet {
    let mut set = RegSet::new(len);
    for (class_idx, positions) in ids.iter().enumerate() {
        for &local in positions {
            set.set(class_base[class_idx] + local);
        }
    }
    set
}

/// Runs all six... five per-function passes (pass 6 is whole-program, see
/// [`validate_globals`]) and returns the validated [`XFunction`], or `None`
/// if the body could not be renamed at all.
pub fn validate_function(exe: &Executable) -> (Option<XFunction>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let (mut raw_blocks, renamer) = identify_blocks_and_rename(exe, &mut diags);
    let successors = build_flow_graph(&mut raw_blocks, &mut diags);

    let mut class_base = [0usize; NUM_CLASSES];
    let mut total = 0usize;
    for (idx, class) in RegClass::all().iter().enumerate() {
        class_base[idx] = total;
        total += renamer.counters[class_index(*class)];
    }

    let mut blocks: Vec<Block> = raw_blocks
        .into_iter()
        .zip(successors)
        .map(|(raw, succ)| {
            let iexist = to_regset(total, &class_base, &raw.entry);
            let oexist = to_regset(total, &class_base, &raw.exit);
            let mut effect = RegSet::new(total);
            for instr in &raw.instrs {
                for w in instr.writes.iter().chain(instr.range_consumed.iter()) {
                    effect.set(class_base[class_index(w.class)] + w.global);
                }
            }
            for i in 0..total {
                if iexist.get(i) && !oexist.get(i) {
                    effect.set(i);
                }
            }
            Block {
                label: raw.label,
                instrs: raw.instrs,
                successors: succ,
                iexist,
                oexist,
                iinit: RegSet::new(total),
                oinit: RegSet::new(total),
                effect,
            }
        })
        .collect();

    for (i, block) in blocks.iter_mut().enumerate() {
        block.iinit = if i == 0 {
            let mut set = RegSet::new(total);
            for j in 0..exe.num_args {
                set.set(class_base[class_index(RegClass::V)] + j);
            }
            set
        } else {
            block.iexist.clone()
        };
        block.oinit = block.iinit.union(&block.effect).intersection(&block.oexist);
    }

    propagate_phi(&mut blocks);
    check_use_before_init(&blocks, &exe.var_names, &class_base, &mut diags);

    let xfunction = XFunction { blocks, total_registers: total, num_args: exe.num_args };
    (Some(xfunction), diags)
}

/// Pass 4: conservative (intersection) dataflow fixed point.
fn propagate_phi(blocks: &mut [Block]) {
    loop {
        let mut changed = false;
        for i in 0..blocks.len() {
            for succ in blocks[i].successors {
                if succ < 0 {
                    continue;
                }
                let oinit = blocks[i].oinit.clone();
                let s = &mut blocks[succ as usize];
                if s.iinit.intersect_with(&oinit) {
                    changed = true;
                    s.oinit = s.iinit.union(&s.effect).intersection(&s.oexist);
                }
            }
        }
        if !changed {
            break;
        }
    }
}

fn reg_display(class_base: &[usize; NUM_CLASSES], reg: &RenamedReg, var_names: &[String]) -> String {
    if reg.class == RegClass::V {
        if let Some(name) = var_names.get(reg.position as usize) {
            return name.clone();
        }
    }
    format!("{}{}", reg.class.letter(), reg.position)
}

/// Pass 5: walk each block maintaining a running `init` set, reporting any
/// read of a register not yet known-initialized.
fn check_use_before_init(
    blocks: &[Block],
    var_names: &[String],
    class_base: &[usize; NUM_CLASSES],
    diags: &mut Diagnostics,
) {
    for (block_index, block) in blocks.iter().enumerate() {
        let mut init = block.iinit.clone();
        for instr in &block.instrs {
            for r in &instr.reads {
                let abs = class_base[class_index(r.class)] + r.global;
                if !init.get(abs) {
                    diags.push(xcode_error(
                        5410,
                        block_index,
                        format!("use of possibly-uninitialized register `{}`", reg_display(class_base, r, var_names)),
                    ));
                }
            }
            for r in &instr.range_consumed {
                init.clear_bit(class_base[class_index(r.class)] + r.global);
            }
            for w in &instr.writes {
                init.set(class_base[class_index(w.class)] + w.global);
            }
        }
    }
}

/// Pass 6: whole-program cross-reference validation of every global
/// declaration and every instruction that refers to one.
///
/// Recognized global forms: `(var "name")`, `(fun "name" arity_min
/// arity_max exe_index)` (arity_max of `-1` means unbounded), `(import
/// "name")`, and `(init fun_index)`.
pub fn validate_globals(pcode: &PCode) -> Diagnostics {
    let mut diags = Diagnostics::new();

    enum GlobalKind {
        Variable,
        Function { arity_min: i64, arity_max: Option<i64> },
        Import,
    }

    let mut entries = Vec::with_capacity(pcode.globals.len());
    for g in &pcode.globals {
        let kind = match g.mnemonic() {
            Some("var") => GlobalKind::Variable,
            Some("import") => GlobalKind::Import,
            Some("fun") => {
                let min = extract_int_operand(g, 2).unwrap_or(0);
                let max = extract_int_operand(g, 3).filter(|&n| n >= 0);
                GlobalKind::Function { arity_min: min, arity_max: max }
            }
            _ => GlobalKind::Import,
        };
        entries.push(kind);
    }

    for (i, g) in pcode.globals.iter().enumerate() {
        if g.mnemonic() == Some("init") {
            let Some(idx) = extract_int_operand(g, 1) else {
                diags.push(xcode_error(5420, i, "malformed `init` global"));
                continue;
            };
            match entries.get(idx as usize) {
                Some(GlobalKind::Function { arity_min, arity_max }) => {
                    if *arity_min != 1 || *arity_max != Some(1) {
                        diags.push(xcode_error(
                            5421,
                            i,
                            "`init` global must reference a function of exactly one argument",
                        ));
                    }
                }
                Some(_) => diags.push(xcode_error(5422, i, "`init` global must reference a function")),
                None => diags.push(xcode_error(5423, i, format!("`init` global index {idx} out of range"))),
            }
        }
    }

    for exe in &pcode.executables {
        'exe: for (stmt_index, atom) in exe.body.iter().enumerate() {
            let Some(mnemonic) = atom.mnemonic() else { continue };
            match mnemonic {
                "ld-glob" | "st-glob" => {
                    let Some(idx) = extract_int_operand(atom, 1) else { continue };
                    match entries.get(idx as usize) {
                        Some(GlobalKind::Function { .. }) => {
                            diags.push(xcode_error(
                                5424,
                                stmt_index,
                                format!("`{mnemonic}` targets global {idx}, which is a function, not a variable"),
                            ));
                            break 'exe;
                        }
                        Some(_) => {}
                        None => {
                            diags.push(xcode_error(5425, stmt_index, format!("global index {idx} out of range")));
                            break 'exe;
                        }
                    }
                }
                "call-s" => {
                    let idx = extract_int_operand(atom, 2);
                    let argc = extract_int_operand(atom, 4);
                    let Some(idx) = idx else { continue };
                    match entries.get(idx as usize) {
                        Some(GlobalKind::Function { arity_min, arity_max }) => {
                            if let Some(argc) = argc {
                                let within_max = arity_max.map(|max| argc <= max).unwrap_or(true);
                                if argc < *arity_min || !within_max {
                                    diags.push(xcode_error(
                                        5426,
                                        stmt_index,
                                        format!("call to global {idx} passes {argc} arguments, expected {arity_min}..{arity_max:?}"),
                                    ));
                                    break 'exe;
                                }
                            }
                        }
                        Some(GlobalKind::Variable) => {
                            diags.push(xcode_error(
                                5427,
                                stmt_index,
                                format!("`call-s` targets global {idx}, which is a variable, not a function"),
                            ));
                            break 'exe;
                        }
                        Some(GlobalKind::Import) => {}
                        None => {
                            diags.push(xcode_error(5428, stmt_index, format!("global index {idx} out of range")));
                            break 'exe;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcode::Atom;

    fn reg(class: RegClass, index: u32) -> Atom {
        Atom::Reg(Register { class, index })
    }

    fn instr(mnemonic: &str, operands: Vec<Atom>) -> Atom {
        let mut items = vec![Atom::Bareword(mnemonic.to_string())];
        items.extend(operands);
        Atom::List(items)
    }

    fn exe(num_args: usize, num_vars: usize, body: Vec<Atom>) -> Executable {
        Executable { num_args, num_vars, body, var_names: Vec::new() }
    }

    #[test]
    fn use_before_init_reports_the_unpushed_register() {
        let exe = exe(
            0,
            0,
            vec![
                instr("push", vec![Atom::Bareword("d".to_string()), Atom::Int(1)]),
                instr("throw", vec![reg(RegClass::D, 0)]),
            ],
        );
        let (_, diags) = validate_function(&exe);
        let msgs: Vec<_> = diags.iter().map(|e| e.message.clone()).collect();
        assert!(msgs.iter().any(|m| m.contains("d0")), "expected a d0 diagnostic, got {msgs:?}");
    }

    #[test]
    fn initialized_register_produces_no_diagnostic() {
        // v-class registers for declared vars pre-exist (no push needed),
        // so a write-then-read of v0 alone leaves every class balanced.
        let exe = exe(
            1,
            1,
            vec![
                instr("ld-glob", vec![Atom::Int(0), reg(RegClass::V, 0)]),
                instr("ret", vec![reg(RegClass::V, 0)]),
            ],
        );
        let (xfn, diags) = validate_function(&exe);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let xfn = xfn.unwrap();
        assert_eq!(xfn.blocks.len(), 1);
    }

    #[test]
    fn jump_to_unknown_label_is_diagnosed() {
        let exe = exe(0, 0, vec![instr("jump", vec![Atom::Bareword("nowhere".to_string())])]);
        let (_, diags) = validate_function(&exe);
        assert!(diags.iter().any(|e| e.code == ErrorCode::Xcode(5409)));
    }

    #[test]
    fn conditional_jump_has_branch_and_fallthrough_successors() {
        // block0: push/ldimm-i/jump-if (branches to "target", falls through
        // to block1); block1: pop/ret-void; block2 (labeled "target"):
        // ret-void. Distinguishing fallthrough (block1) from the branch
        // target (block2) requires a block between the branch and its
        // label, unlike the trivial case where both coincide.
        let exe = exe(
            0,
            0,
            vec![
                instr("push", vec![Atom::Bareword("i".to_string()), Atom::Int(1)]),
                instr("ldimm-i", vec![reg(RegClass::I, 0), Atom::Int(1)]),
                instr("jump-if", vec![reg(RegClass::I, 0), Atom::Bareword("target".to_string())]),
                instr("pop", vec![Atom::Bareword("i".to_string()), Atom::Int(1)]),
                instr("ret-void", vec![]),
                instr("label", vec![Atom::Bareword("target".to_string())]),
                instr("ret-void", vec![]),
            ],
        );
        let (xfn, diags) = validate_function(&exe);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        let xfn = xfn.unwrap();
        assert_eq!(xfn.blocks.len(), 3);
        assert_eq!(xfn.blocks[0].successors, [2, 1]);
    }

    #[test]
    fn init_global_requires_single_argument_function() {
        let pcode = PCode {
            globals: vec![
                instr("fun", vec![Atom::Str("setup".to_string()), Atom::Int(2), Atom::Int(2), Atom::Int(0)]),
                instr("init", vec![Atom::Int(0)]),
            ],
            executables: vec![exe(2, 2, vec![])],
        };
        let diags = validate_globals(&pcode);
        assert!(diags.iter().any(|e| e.code == ErrorCode::Xcode(5421)));
    }

    #[test]
    fn call_site_arity_mismatch_is_diagnosed() {
        let pcode = PCode {
            globals: vec![instr(
                "fun",
                vec![Atom::Str("f".to_string()), Atom::Int(1), Atom::Int(1), Atom::Int(0)],
            )],
            executables: vec![exe(
                0,
                0,
                vec![instr(
                    "call-s",
                    vec![reg(RegClass::D, 0), Atom::Int(0), reg(RegClass::P, 0), Atom::Int(2)],
                )],
            )],
        };
        let diags = validate_globals(&pcode);
        assert!(diags.iter().any(|e| e.code == ErrorCode::Xcode(5426)));
    }
}
