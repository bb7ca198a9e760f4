//! Declarative instruction-family schema. Each entry describes one
//! mnemonic's operand shape — which positions read registers, which write
//! them, whether the instruction terminates a block, and whether it
//! carries a jump-label operand — so parsing, serializing, and (most of)
//! validation derive from the table instead of being hand-written per
//! mnemonic, per the schema-from-generator design note this core follows.

/// Operand-position metadata for one mnemonic.
#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    /// Ends its basic block (return, unconditional jump, throw, or a
    /// conditional jump).
    pub terminal: bool,
    /// A terminal with two successors (branch): operand `jump_operand`
    /// names the jump target, fall-through is the next block.
    pub conditional: bool,
    /// Operand index (after the mnemonic) holding a jump-label, if any.
    pub jump_operand: Option<usize>,
    /// Operand indices that are register writes.
    pub reg_writes: &'static [usize],
    /// Operand indices that are plain register reads.
    pub reg_reads: &'static [usize],
    /// `(base_operand, count_operand)` for a range-read, e.g. a call's
    /// parameter window — every register in `[base, base+count)` of the
    /// `p` class is read and then consumed (destroyed) by the call.
    pub range_read: Option<(usize, usize)>,
}

const TABLE: &[InstrDesc] = &[
    InstrDesc {
        mnemonic: "push",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "pop",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "ldimm-i",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "ldimm-s",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[],
        range_read: None,
    },
    // Operand 0 of both ld-glob and st-glob is the global reference (a
    // global-table index); operand 1 is the register moved to/from it.
    InstrDesc {
        mnemonic: "ld-glob",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[1],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "st-glob",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[1],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "mov",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[1],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "call-s",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[],
        range_read: Some((2, 3)),
    },
    InstrDesc {
        mnemonic: "call-d",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[1],
        range_read: Some((2, 3)),
    },
    InstrDesc {
        mnemonic: "jump",
        terminal: true,
        conditional: false,
        jump_operand: Some(0),
        reg_writes: &[],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "jump-if",
        terminal: true,
        conditional: true,
        jump_operand: Some(1),
        reg_writes: &[],
        reg_reads: &[0],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "ret",
        terminal: true,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[0],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "ret-void",
        terminal: true,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "throw",
        terminal: true,
        conditional: false,
        jump_operand: None,
        reg_writes: &[],
        reg_reads: &[0],
        range_read: None,
    },
    InstrDesc {
        mnemonic: "reflect-regs",
        terminal: false,
        conditional: false,
        jump_operand: None,
        reg_writes: &[0],
        reg_reads: &[],
        range_read: None,
    },
];

pub fn instr_desc(mnemonic: &str) -> Option<&'static InstrDesc> {
    TABLE.iter().find(|d| d.mnemonic == mnemonic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_terminal_with_two_successors_is_marked_conditional() {
        for d in TABLE {
            if d.conditional {
                assert!(d.terminal, "{} is conditional but not terminal", d.mnemonic);
            }
        }
    }

    #[test]
    fn known_mnemonics_resolve() {
        assert!(instr_desc("jump").is_some());
        assert!(instr_desc("nonexistent-mnemonic").is_none());
    }
}
