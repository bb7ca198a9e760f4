//! Compact indexing ranges: a singular endpoint or a `~`-separated range,
//! with negative indices counting from the end and a sentinel "end" value
//! meaning one past the last element.
//!
//! Two internal forms, chosen transparently by [`Interval::new`]/[`Interval::range`]:
//! a compact form when both endpoints fit in a 32-bit signed lane (with
//! "end" encoded as that lane's sign-bit pattern, `i32::MIN`, mirroring the
//! original bootstrap's use of `INT32_MIN` as the reserved sentinel), and a
//! wide heap form otherwise.

use std::fmt;

/// One endpoint of an interval: a concrete signed index, or "end" (one past
/// the last element).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Index(i64),
    End,
}

impl Endpoint {
    /// Resolve against a concrete sequence length, producing a clamped
    /// absolute index in `0..=len`. Negative indices count from the end.
    pub fn resolve(self, len: usize) -> usize {
        match self {
            Endpoint::End => len,
            Endpoint::Index(i) if i >= 0 => (i as usize).min(len),
            Endpoint::Index(i) => {
                let from_end = (-i) as usize;
                len.saturating_sub(from_end)
            }
        }
    }

    fn to_compact_lane(self) -> Option<i32> {
        match self {
            Endpoint::End => Some(i32::MIN),
            Endpoint::Index(i) => {
                if i == i32::MIN as i64 {
                    // Collides with the "end" sentinel; must use the wide form.
                    None
                } else {
                    i32::try_from(i).ok()
                }
            }
        }
    }

    fn from_compact_lane(lane: i32) -> Endpoint {
        if lane == i32::MIN {
            Endpoint::End
        } else {
            Endpoint::Index(lane as i64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Repr {
    Compact(i32, i32),
    Wide(i64, Endpoint),
}

/// A half-open range `[begin, end)` over a sequence, or a singular index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval(Repr);

impl Interval {
    /// A singular interval naming one element.
    pub fn singular(index: Endpoint) -> Interval {
        Interval::range(index, bump(index))
    }

    /// A `~`-separated half-open range.
    pub fn range(begin: Endpoint, end: Endpoint) -> Interval {
        match (begin.to_compact_lane(), end) {
            (Some(b), e) => match e.to_compact_lane() {
                Some(en) => Interval(Repr::Compact(b, en)),
                None => Interval(Repr::Wide(b as i64, e)),
            },
            (None, e) => {
                let b = match begin {
                    Endpoint::Index(i) => i,
                    Endpoint::End => unreachable!("End always has a compact lane"),
                };
                Interval(Repr::Wide(b, e))
            }
        }
    }

    pub fn begin(&self) -> Endpoint {
        match self.0 {
            Repr::Compact(b, _) => Endpoint::from_compact_lane(b),
            Repr::Wide(b, _) => Endpoint::Index(b),
        }
    }

    pub fn end(&self) -> Endpoint {
        match self.0 {
            Repr::Compact(_, e) => Endpoint::from_compact_lane(e),
            Repr::Wide(_, e) => e,
        }
    }

    /// Resolve against a concrete length, returning a clamped `(begin, end)`
    /// pair with `begin <= end`.
    pub fn resolve(&self, len: usize) -> (usize, usize) {
        let begin = self.begin().resolve(len);
        let end = self.end().resolve(len).max(begin);
        (begin, end)
    }
}

fn bump(e: Endpoint) -> Endpoint {
    match e {
        Endpoint::End => Endpoint::End,
        Endpoint::Index(i) if i == -1 => Endpoint::End,
        Endpoint::Index(i) => Endpoint::Index(i + 1),
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn fmt_endpoint(e: Endpoint, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match e {
                Endpoint::End => write!(f, ""),
                Endpoint::Index(i) => write!(f, "{i}"),
            }
        }
        fmt_endpoint(self.begin(), f)?;
        write!(f, "~")?;
        fmt_endpoint(self.end(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_roundtrip() {
        let iv = Interval::range(Endpoint::Index(2), Endpoint::Index(5));
        assert_eq!(iv.begin(), Endpoint::Index(2));
        assert_eq!(iv.end(), Endpoint::Index(5));
        assert_eq!(iv.resolve(10), (2, 5));
    }

    #[test]
    fn end_sentinel_resolves_to_length() {
        let iv = Interval::range(Endpoint::Index(0), Endpoint::End);
        assert_eq!(iv.resolve(7), (0, 7));
    }

    #[test]
    fn negative_indices_count_from_end() {
        let iv = Interval::range(Endpoint::Index(-3), Endpoint::End);
        assert_eq!(iv.resolve(10), (7, 10));
    }

    #[test]
    fn wide_form_used_when_out_of_i32_range() {
        let big = i64::from(i32::MAX) + 100;
        let iv = Interval::range(Endpoint::Index(0), Endpoint::Index(big));
        assert!(matches!(iv.0, Repr::Wide(..)));
        assert_eq!(iv.end(), Endpoint::Index(big));
    }

    #[test]
    fn i32_min_index_forces_wide_form_to_avoid_sentinel_collision() {
        let iv = Interval::range(Endpoint::Index(0), Endpoint::Index(i32::MIN as i64));
        assert!(matches!(iv.0, Repr::Wide(..)));
        assert_eq!(iv.end(), Endpoint::Index(i32::MIN as i64));
    }
}
