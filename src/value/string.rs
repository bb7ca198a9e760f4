//! Immutable byte-sequence strings: inline ("ASCII-9"), flat, and rope
//! ("twine") representations, plus the chunk-iteration substrate used for
//! hashing and comparison.
//!
//! # Representations
//!
//! - **Inline**: up to 9 bytes, each in `0x01..=0x7F`, packed 7 bits apiece
//!   into a `u64` with bit 0 reserved as a tag (always 1). A packed byte of
//!   0 is impossible for a valid inline payload, so it doubles as an
//!   end-of-string sentinel on unpack — no separate length field needed in
//!   the packed word itself (we still cache one for O(1) `len()`).
//! - **Flat**: a contiguous immutable byte buffer, for strings short enough
//!   that a single allocation beats a tree.
//! - **Rope**: a balanced concatenation tree of two `AvaString` subtrees,
//!   each node tagging its own length and depth.
//!
//! Concatenation and slicing collapse to the smallest adequate
//! representation: see [`AvaString::concat`] and [`AvaString::slice`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Below this length, concatenation/slicing materializes a flat buffer
/// instead of building/keeping a rope node.
const FLAT_THRESHOLD: usize = 256;

/// Maximum payload length of the inline representation.
const INLINE_MAX: usize = 9;

/// Bit 0 of the packed word: always set for an inline string.
const INLINE_TAG: u64 = 1;

fn pack_inline(bytes: &[u8]) -> Option<(u64, u8)> {
    if bytes.len() > INLINE_MAX {
        return None;
    }
    let mut word = INLINE_TAG;
    for (i, &b) in bytes.iter().enumerate() {
        if b == 0 || b > 0x7F {
            return None;
        }
        word |= (b as u64) << (1 + 7 * i);
    }
    Some((word, bytes.len() as u8))
}

fn unpack_inline(word: u64, len: u8) -> [u8; INLINE_MAX] {
    let mut out = [0u8; INLINE_MAX];
    for (i, slot) in out.iter_mut().enumerate().take(len as usize) {
        *slot = ((word >> (1 + 7 * i)) & 0x7F) as u8;
    }
    out
}

#[derive(Debug)]
struct RopeNode {
    left: AvaString,
    right: AvaString,
    length: usize,
    depth: u32,
}

#[derive(Clone, Debug)]
enum Repr {
    Inline(u64, u8),
    Flat(Arc<[u8]>),
    Rope(Arc<RopeNode>),
}

/// An immutable byte-sequence string value.
#[derive(Clone, Debug)]
pub struct AvaString(Repr);

impl AvaString {
    pub fn empty() -> Self {
        AvaString(Repr::Inline(INLINE_TAG, 0))
    }

    /// Build the smallest adequate representation for `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if let Some((word, len)) = pack_inline(bytes) {
            AvaString(Repr::Inline(word, len))
        } else {
            AvaString(Repr::Flat(Arc::from(bytes)))
        }
    }

    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    pub fn len(&self) -> usize {
        match &self.0 {
            Repr::Inline(_, len) => *len as usize,
            Repr::Flat(buf) => buf.len(),
            Repr::Rope(node) => node.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tree depth; always 0 for inline/flat forms.
    fn depth(&self) -> u32 {
        match &self.0 {
            Repr::Rope(node) => node.depth,
            _ => 0,
        }
    }

    /// Materialize the whole string. Only the entry point that genuinely
    /// needs the bytes contiguous (e.g. handing a value to an external
    /// collaborator) should call this; internal operations use chunk
    /// iteration instead.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.chunks() {
            out.extend_from_slice(chunk.as_slice());
        }
        out
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.to_vec()).into_owned()
    }

    /// Concatenate two strings, collapsing to inline/flat when possible and
    /// rebalancing the rope so depth stays `O(log length)`.
    pub fn concat(a: &AvaString, b: &AvaString) -> AvaString {
        if a.is_empty() {
            return b.clone();
        }
        if b.is_empty() {
            return a.clone();
        }

        let combined_len = a.len() + b.len();

        if combined_len <= INLINE_MAX {
            let mut bytes = Vec::with_capacity(combined_len);
            bytes.extend_from_slice(&a.to_vec());
            bytes.extend_from_slice(&b.to_vec());
            if let Some((word, len)) = pack_inline(&bytes) {
                return AvaString(Repr::Inline(word, len));
            }
        }

        if combined_len <= FLAT_THRESHOLD {
            let mut bytes = Vec::with_capacity(combined_len);
            bytes.extend_from_slice(&a.to_vec());
            bytes.extend_from_slice(&b.to_vec());
            return AvaString(Repr::Flat(Arc::from(bytes.as_slice())));
        }

        let depth = 1 + a.depth().max(b.depth());
        let node = RopeNode {
            left: a.clone(),
            right: b.clone(),
            length: combined_len,
            depth,
        };
        AvaString(Repr::Rope(Arc::new(node))).rebalance()
    }

    /// Rotate so the tree stays within an AVL-like depth bound. Only the
    /// node at the root of `self` is checked/rotated; concatenation always
    /// builds one new node at a time, so a single check suffices (the
    /// children were already balanced rope or non-rope strings).
    fn rebalance(self) -> AvaString {
        let node = match self.0 {
            Repr::Rope(node) => node,
            other => return AvaString(other),
        };

        let balance = node.left.depth() as i64 - node.right.depth() as i64;
        if balance.abs() <= 1 {
            return AvaString(Repr::Rope(node));
        }

        // Heavier side is too deep: rotate so its subtree is split across
        // the new root, shrinking overall depth by one.
        if balance > 1 {
            // Left-heavy: rotate right.
            if let Repr::Rope(left) = &node.left.0 {
                let new_right = AvaString::concat(&left.right, &node.right);
                let new_root = AvaString::concat(&left.left, &new_right);
                return new_root;
            }
        } else if let Repr::Rope(right) = &node.right.0 {
            let new_left = AvaString::concat(&node.left, &right.left);
            let new_root = AvaString::concat(&new_left, &right.right);
            return new_root;
        }
        AvaString(Repr::Rope(node))
    }

    /// Clamp `begin..end` to `[0, len]` and `begin <= end`.
    fn clamp_range(&self, begin: usize, end: usize) -> (usize, usize) {
        let len = self.len();
        let begin = begin.min(len);
        let end = end.clamp(begin, len);
        (begin, end)
    }

    /// Slice `[begin, end)`, reusing interior rope subtrees and only
    /// rebuilding the boundary subtrees.
    pub fn slice(&self, begin: usize, end: usize) -> AvaString {
        let (begin, end) = self.clamp_range(begin, end);
        let new_len = end - begin;
        if new_len == 0 {
            return AvaString::empty();
        }
        if new_len == self.len() && begin == 0 {
            return self.clone();
        }

        match &self.0 {
            Repr::Inline(word, len) => {
                let bytes = unpack_inline(*word, *len);
                AvaString::from_bytes(&bytes[begin..end])
            }
            Repr::Flat(buf) => {
                if new_len <= INLINE_MAX {
                    AvaString::from_bytes(&buf[begin..end])
                } else {
                    AvaString(Repr::Flat(Arc::from(&buf[begin..end])))
                }
            }
            Repr::Rope(node) => {
                let left_len = node.left.len();
                let result = if end <= left_len {
                    node.left.slice(begin, end)
                } else if begin >= left_len {
                    node.right.slice(begin - left_len, end - left_len)
                } else {
                    let left_part = node.left.slice(begin, left_len);
                    let right_part = node.right.slice(0, end - left_len);
                    AvaString::concat(&left_part, &right_part)
                };
                if new_len <= INLINE_MAX {
                    AvaString::from_bytes(&result.to_vec())
                } else {
                    result
                }
            }
        }
    }

    /// The universal access primitive: an iterator over byte chunks in
    /// left-to-right order. Inline and flat strings yield a single
    /// ("singleton") chunk.
    pub fn chunks(&self) -> ChunkIter<'_> {
        ChunkIter {
            stack: vec![ChunkFrame::Whole(self)],
        }
    }

    /// Lexicographic comparison over unsigned bytes without materializing
    /// either side, via paired chunk iteration. A proper prefix orders
    /// first.
    pub fn strcmp(&self, other: &AvaString) -> Ordering {
        let mut a = self.chunks();
        let mut b = other.chunks();
        let mut abuf: Chunk<'_> = Chunk::Borrowed(&[]);
        let mut bbuf: Chunk<'_> = Chunk::Borrowed(&[]);
        let mut apos = 0usize;
        let mut bpos = 0usize;
        loop {
            if apos >= abuf.as_slice().len() {
                apos = 0;
                abuf = a.next().unwrap_or(Chunk::Borrowed(&[]));
            }
            if bpos >= bbuf.as_slice().len() {
                bpos = 0;
                bbuf = b.next().unwrap_or(Chunk::Borrowed(&[]));
            }
            let aslice = &abuf.as_slice()[apos..];
            let bslice = &bbuf.as_slice()[bpos..];
            match (aslice.is_empty(), bslice.is_empty()) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                (false, false) => {}
            }
            let n = aslice.len().min(bslice.len());
            match aslice[..n].cmp(&bslice[..n]) {
                Ordering::Equal => {
                    apos += n;
                    bpos += n;
                }
                other => return other,
            }
        }
    }
}

impl PartialEq for AvaString {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.strcmp(other) == Ordering::Equal
    }
}
impl Eq for AvaString {}

impl PartialOrd for AvaString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.strcmp(other))
    }
}
impl Ord for AvaString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.strcmp(other)
    }
}

impl fmt::Display for AvaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(&String::from_utf8_lossy(chunk.as_slice()))?;
        }
        Ok(())
    }
}

enum ChunkFrame<'a> {
    Whole(&'a AvaString),
    Node(&'a RopeNode),
}

/// A single chunk of string content. Flat/rope leaves borrow directly from
/// the arena-backed buffer; the inline representation has no buffer to
/// borrow from, so it carries its (small, `Copy`) payload by value.
pub enum Chunk<'a> {
    Borrowed(&'a [u8]),
    Inline([u8; INLINE_MAX], u8),
}

impl<'a> Chunk<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Chunk::Borrowed(b) => b,
            Chunk::Inline(buf, len) => &buf[..*len as usize],
        }
    }
}

/// Iterator state returned by [`AvaString::chunks`].
pub struct ChunkIter<'a> {
    stack: Vec<ChunkFrame<'a>>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                ChunkFrame::Whole(s) => match &s.0 {
                    Repr::Inline(word, len) => {
                        return Some(Chunk::Inline(unpack_inline(*word, *len), *len));
                    }
                    Repr::Flat(buf) => return Some(Chunk::Borrowed(&buf[..])),
                    Repr::Rope(node) => {
                        self.stack.push(ChunkFrame::Node(node));
                        continue;
                    }
                },
                ChunkFrame::Node(node) => {
                    self.stack.push(ChunkFrame::Whole(&node.right));
                    self.stack.push(ChunkFrame::Whole(&node.left));
                }
            }
        }
        None
    }
}

#[cfg(test)]
impl AvaString {
    /// Render the rope structure as indented text, for asserting
    /// rebalancing invariants in tests.
    pub fn debug_tree(&self) -> String {
        fn go(s: &AvaString, indent: usize, out: &mut String) {
            match &s.0 {
                Repr::Inline(_, len) => {
                    out.push_str(&" ".repeat(indent));
                    out.push_str(&format!("inline(len={len})\n"));
                }
                Repr::Flat(buf) => {
                    out.push_str(&" ".repeat(indent));
                    out.push_str(&format!("flat(len={})\n", buf.len()));
                }
                Repr::Rope(node) => {
                    out.push_str(&" ".repeat(indent));
                    out.push_str(&format!(
                        "rope(len={}, depth={})\n",
                        node.length, node.depth
                    ));
                    go(&node.left, indent + 2, out);
                    go(&node.right, indent + 2, out);
                }
            }
        }
        let mut out = String::new();
        go(self, 0, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_roundtrip() {
        let s = AvaString::from_str("abcdefghi");
        assert_eq!(s.len(), 9);
        assert_eq!(s.to_string_lossy(), "abcdefghi");
    }

    #[test]
    fn concat_length_and_bytes() {
        let a = AvaString::from_str("hello ");
        let b = AvaString::from_str("world, this is a longer string to force a flat buffer");
        let c = AvaString::concat(&a, &b);
        assert_eq!(c.len(), a.len() + b.len());
        let mut expected = a.to_vec();
        expected.extend(b.to_vec());
        assert_eq!(c.to_vec(), expected);
    }

    #[test]
    fn concat_builds_rope_and_rebalances() {
        let mut s = AvaString::from_str("x");
        for _ in 0..20 {
            let chunk = AvaString::from_bytes(&vec![b'y'; 300]);
            s = AvaString::concat(&s, &chunk);
        }
        // ceil(log2(length)) + O(1): generous bound, just checks no
        // degenerate linear chain formed.
        let bound = (s.len() as f64).log2().ceil() as u32 + 8;
        assert!(s.depth() <= bound, "depth {} exceeded bound {}", s.depth(), bound);
    }

    #[test]
    fn slice_length_and_prefix() {
        let s = AvaString::from_str("0123456789abcdef");
        let sub = s.slice(3, 7);
        assert_eq!(sub.len(), 4);
        assert_eq!(sub.to_string_lossy(), "3456");
    }

    #[test]
    fn strcmp_prefix_orders_first() {
        let a = AvaString::from_str("ab");
        let b = AvaString::from_str("abc");
        assert_eq!(a.strcmp(&b), Ordering::Less);
        assert_eq!(b.strcmp(&a), Ordering::Greater);
        assert_eq!(a.strcmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn strcmp_is_unsigned_byte_order() {
        let a = AvaString::from_bytes(&[0x7f]);
        let b = AvaString::from_bytes(&[0x41]);
        assert_eq!(a.strcmp(&b), Ordering::Greater);
    }

    #[test]
    fn equal_strings_hash_equal_via_bytes() {
        let a = AvaString::from_str("same content");
        let rope_piece_a = AvaString::from_str("same ");
        let rope_piece_b = AvaString::from_str("content");
        let b = AvaString::concat(&rope_piece_a, &rope_piece_b);
        assert_eq!(a, b);
        assert_eq!(a.to_vec(), b.to_vec());
    }
}
