//! A small, self-contained register allocator used by [`super::node::SemNode`]
//! code-gen methods to emit P-code. Stack-discipline allocation only — one
//! `push`/`pop` pair per class, matching the calling convention the X-code
//! validator's pass 1 expects.

use crate::pcode::{Atom, RegClass, Register};

#[derive(Debug, Default)]
pub struct CodegenState {
    pub body: Vec<Atom>,
    heights: [u32; 6],
}

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

impl CodegenState {
    pub fn new() -> CodegenState {
        CodegenState::default()
    }

    /// Push one fresh register of `class` and return it.
    pub fn alloc(&mut self, class: RegClass) -> Register {
        let idx = class_index(class);
        self.body.push(Atom::List(vec![
            Atom::Bareword("push".to_string()),
            Atom::Bareword(class.letter().to_string()),
            Atom::Int(1),
        ]));
        let position = self.heights[idx];
        self.heights[idx] += 1;
        Register { class, index: position }
    }

    /// Pop the most recently allocated register(s) of `class`.
    pub fn free(&mut self, class: RegClass, count: u32) {
        let idx = class_index(class);
        self.heights[idx] = self.heights[idx].saturating_sub(count);
        self.body.push(Atom::List(vec![
            Atom::Bareword("pop".to_string()),
            Atom::Bareword(class.letter().to_string()),
            Atom::Int(count as i64),
        ]));
    }

    pub fn emit(&mut self, mnemonic: &str, operands: Vec<Atom>) {
        let mut items = vec![Atom::Bareword(mnemonic.to_string())];
        items.extend(operands);
        self.body.push(Atom::List(items));
    }

    pub fn height(&self, class: RegClass) -> u32 {
        self.heights[class_index(class)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_leaves_height_at_zero() {
        let mut cg = CodegenState::new();
        cg.alloc(RegClass::D);
        cg.alloc(RegClass::D);
        cg.free(RegClass::D, 2);
        assert_eq!(cg.height(RegClass::D), 0);
        assert_eq!(cg.body.len(), 3);
    }
}
