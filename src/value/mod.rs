//! The immutable value model: a 2-word record (an attribute chain pointer
//! plus an uninterpreted datum) dispatched dynamically by walking the chain
//! for a requested capability tag, and its string/hashing substrate.

pub mod hashing;
pub mod interval;
pub mod list;
pub mod map;
pub mod string;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub use list::List;
pub use map::Map;
pub use string::AvaString;

/// Identifies one capability in a value's attribute chain. The first
/// attribute is always the value's "type trait" (its primary
/// interpretation); further attributes extend it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrTag(pub &'static str);

/// A capability table. One `'static` singleton per semantic type, per the
/// "interned pointer to a trait table" design: extending a value's
/// attribute chain is composing more of these, never mutating one.
pub trait TypeTrait: Send + Sync + fmt::Debug {
    fn tag(&self) -> AttrTag;

    /// Stringify `datum` under this trait's interpretation. Every value can
    /// be coerced to a string this way; strict equality and hashing are
    /// defined in terms of the result.
    fn to_ava_string(&self, datum: &Datum) -> AvaString;
}

/// The uninterpreted payload word. Which variant is meaningful is decided
/// entirely by the value's type trait.
#[derive(Clone, Debug)]
pub enum Datum {
    Unit,
    UInt(u64),
    Int(i64),
    Real(f64),
    Str(AvaString),
    List(List),
    Map(Map),
    Interval(interval::Interval),
    /// A raw pointer to an opaque external value (e.g. a P-code handle).
    Pointer(Arc<dyn std::any::Any + Send + Sync>),
}

/// An immutable value: an attribute chain plus a datum.
#[derive(Clone)]
pub struct Value {
    chain: Arc<[&'static dyn TypeTrait]>,
    datum: Datum,
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.type_trait().tag().0)
            .field("string", &self.to_ava_string().to_string_lossy())
            .finish()
    }
}

impl Value {
    pub fn new(chain: Arc<[&'static dyn TypeTrait]>, datum: Datum) -> Value {
        Value { chain, datum }
    }

    pub fn type_trait(&self) -> &'static dyn TypeTrait {
        self.chain[0]
    }

    /// Walk the attribute chain looking for `tag`, innermost (primary)
    /// first.
    pub fn attribute(&self, tag: AttrTag) -> Option<&'static dyn TypeTrait> {
        self.chain.iter().copied().find(|t| t.tag() == tag)
    }

    pub fn datum(&self) -> &Datum {
        &self.datum
    }

    pub fn to_ava_string(&self) -> AvaString {
        self.type_trait().to_ava_string(&self.datum)
    }

    /// Strict equality: two values are equal iff they stringify to the same
    /// bytes.
    pub fn equal(&self, other: &Value) -> bool {
        self.strcmp(other) == Ordering::Equal
    }

    pub fn strcmp(&self, other: &Value) -> Ordering {
        self.to_ava_string().strcmp(&other.to_ava_string())
    }

    pub fn hash(&self) -> u64 {
        hashing::hash_string(&self.to_ava_string())
    }

    pub fn of_string(s: AvaString) -> Value {
        Value::new(Arc::from([STRING_TRAIT.as_ref()]), Datum::Str(s))
    }

    pub fn of_string_str(s: &str) -> Value {
        Value::of_string(AvaString::from_str(s))
    }

    pub fn of_integer(i: i64) -> Value {
        Value::new(Arc::from([INTEGER_TRAIT.as_ref()]), Datum::Int(i))
    }

    pub fn of_uinteger(u: u64) -> Value {
        Value::new(Arc::from([INTEGER_TRAIT.as_ref()]), Datum::UInt(u))
    }

    pub fn of_real(r: f64) -> Value {
        Value::new(Arc::from([REAL_TRAIT.as_ref()]), Datum::Real(r))
    }

    pub fn of_list(l: List) -> Value {
        Value::new(Arc::from([LIST_TRAIT.as_ref()]), Datum::List(l))
    }

    pub fn of_map(m: Map) -> Value {
        Value::new(Arc::from([MAP_TRAIT.as_ref()]), Datum::Map(m))
    }

    /// Decodes the value's string form as an integer per the integer
    /// string grammar. `None` if the datum is already a numeric type and
    /// can be read off directly without a parse.
    pub fn as_integer(&self) -> Result<i64, IntegerFormatError> {
        match &self.datum {
            Datum::Int(i) => Ok(*i),
            Datum::UInt(u) => Ok(*u as i64),
            _ => parse_integer(&self.to_ava_string().to_string_lossy()),
        }
    }

    pub fn as_real(&self, default_if_blank: f64) -> Result<f64, RealFormatError> {
        match &self.datum {
            Datum::Real(r) => Ok(*r),
            Datum::Int(i) => Ok(*i as f64),
            Datum::UInt(u) => Ok(*u as f64),
            _ => parse_real(&self.to_ava_string().to_string_lossy(), default_if_blank),
        }
    }
}

// ============================================================================
// Type trait singletons
// ============================================================================

#[derive(Debug)]
struct StringTrait;
impl TypeTrait for StringTrait {
    fn tag(&self) -> AttrTag {
        AttrTag("string")
    }
    fn to_ava_string(&self, datum: &Datum) -> AvaString {
        match datum {
            Datum::Str(s) => s.clone(),
            _ => AvaString::empty(),
        }
    }
}
static STRING_TRAIT_INSTANCE: StringTrait = StringTrait;
static STRING_TRAIT: &StringTrait = &STRING_TRAIT_INSTANCE;

#[derive(Debug)]
struct IntegerTrait;
impl TypeTrait for IntegerTrait {
    fn tag(&self) -> AttrTag {
        AttrTag("integer")
    }
    fn to_ava_string(&self, datum: &Datum) -> AvaString {
        match datum {
            Datum::Int(i) => AvaString::from_str(&i.to_string()),
            Datum::UInt(u) => AvaString::from_str(&u.to_string()),
            _ => AvaString::empty(),
        }
    }
}
static INTEGER_TRAIT_INSTANCE: IntegerTrait = IntegerTrait;
static INTEGER_TRAIT: &IntegerTrait = &INTEGER_TRAIT_INSTANCE;

#[derive(Debug)]
struct RealTrait;
impl TypeTrait for RealTrait {
    fn tag(&self) -> AttrTag {
        AttrTag("real")
    }
    fn to_ava_string(&self, datum: &Datum) -> AvaString {
        match datum {
            Datum::Real(r) => AvaString::from_str(&format_real(*r)),
            _ => AvaString::empty(),
        }
    }
}
static REAL_TRAIT_INSTANCE: RealTrait = RealTrait;
static REAL_TRAIT: &RealTrait = &REAL_TRAIT_INSTANCE;

#[derive(Debug)]
struct ListTrait;
impl TypeTrait for ListTrait {
    fn tag(&self) -> AttrTag {
        AttrTag("list")
    }
    fn to_ava_string(&self, datum: &Datum) -> AvaString {
        match datum {
            Datum::List(l) => {
                let mut result = AvaString::empty();
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        result = AvaString::concat(&result, &AvaString::from_str(" "));
                    }
                    result = AvaString::concat(&result, &v.to_ava_string());
                }
                result
            }
            _ => AvaString::empty(),
        }
    }
}
static LIST_TRAIT_INSTANCE: ListTrait = ListTrait;
static LIST_TRAIT: &ListTrait = &LIST_TRAIT_INSTANCE;

#[derive(Debug)]
struct MapTrait;
impl TypeTrait for MapTrait {
    fn tag(&self) -> AttrTag {
        AttrTag("map")
    }
    fn to_ava_string(&self, datum: &Datum) -> AvaString {
        match datum {
            Datum::Map(m) => {
                let mut result = AvaString::empty();
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        result = AvaString::concat(&result, &AvaString::from_str(" "));
                    }
                    result = AvaString::concat(&result, &k.to_ava_string());
                    result = AvaString::concat(&result, &AvaString::from_str(" "));
                    result = AvaString::concat(&result, &v.to_ava_string());
                }
                result
            }
            _ => AvaString::empty(),
        }
    }
}
static MAP_TRAIT_INSTANCE: MapTrait = MapTrait;
static MAP_TRAIT: &MapTrait = &MAP_TRAIT_INSTANCE;

fn format_real(r: f64) -> String {
    if r.is_nan() {
        "NaN".to_string()
    } else if r.is_infinite() {
        if r > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else {
        format!("{r}")
    }
}

// ============================================================================
// Integer / real parsing (spec 4.1)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerFormatError(pub String);

impl fmt::Display for IntegerFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid integer: {}", self.0)
    }
}
impl std::error::Error for IntegerFormatError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealFormatError(pub String);

impl fmt::Display for RealFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid real: {}", self.0)
    }
}
impl std::error::Error for RealFormatError {}

const MAX_INTEGER_TOKEN_LEN: usize = 65;

/// Parse the integer string grammar:
/// `(true|false|on|off|yes|no|null) | [+-]?(0?b[01]+|0?o[0-7]+|0?x[0-9a-f]+|[0-9]+)`,
/// case-insensitive, with surrounding whitespace ignored and a 65-character
/// cap applied *after* trimming. Overflow beyond the 64-bit unsigned range
/// is a format error; overflow into the opposite sign (an unsigned value
/// that doesn't fit `i64` but fits `u64`) is accepted to ease unsigned
/// interop, and this is deliberate — see DESIGN.md's note on the Open
/// Question about overflow policy.
pub fn parse_integer(s: &str) -> Result<i64, IntegerFormatError> {
    let trimmed = s.trim();
    if trimmed.len() > MAX_INTEGER_TOKEN_LEN {
        return Err(IntegerFormatError(s.to_string()));
    }
    let lower = trimmed.to_ascii_lowercase();
    match lower.as_str() {
        "true" | "on" | "yes" => return Ok(1),
        "false" | "off" | "no" | "null" => return Ok(0),
        _ => {}
    }

    let (negative, rest) = match lower.as_bytes().first() {
        Some(b'-') => (true, &lower[1..]),
        Some(b'+') => (false, &lower[1..]),
        _ => (false, lower.as_str()),
    };
    if rest.is_empty() {
        return Err(IntegerFormatError(s.to_string()));
    }

    let (radix, digits) = if let Some(d) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix('b')) {
        (2, d)
    } else if let Some(d) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix('o')) {
        (8, d)
    } else if let Some(d) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix('x')) {
        (16, d)
    } else {
        (10, rest)
    };

    if digits.is_empty() {
        return Err(IntegerFormatError(s.to_string()));
    }

    let value = u64::from_str_radix(digits, radix).map_err(|_| IntegerFormatError(s.to_string()))?;

    if negative {
        // Wrapping negate: a u64 magnitude that doesn't fit i64 wraps into
        // the negative range, matching the "overflow into the opposite
        // sign is accepted" policy.
        Ok((value as i64).wrapping_neg())
    } else {
        Ok(value as i64)
    }
}

/// Fast inline path for pure `-?[0-9]+` decimal tokens short enough to have
/// been stored as an inline string (spec 4.1's "fast inline path"). Falls
/// back to `None` (caller retries with [`parse_integer`]) on anything that
/// isn't plain decimal.
pub fn parse_integer_fast_decimal(bytes: &[u8]) -> Option<i64> {
    if bytes.is_empty() || bytes.len() > 9 {
        return None;
    }
    let (negative, digits) = match bytes[0] {
        b'-' => (true, &bytes[1..]),
        _ => (false, bytes),
    };
    if digits.is_empty() || !digits.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut value: i64 = 0;
    for &b in digits {
        value = value * 10 + (b - b'0') as i64;
    }
    Some(if negative { -value } else { value })
}

/// Parse the real string grammar: whatever `strtod` accepts, plus
/// `NaN`/`Infinity`/`-Infinity` (case-insensitive) and comma as an
/// alternate decimal separator. Falls back to integer parsing on failure;
/// still failing is a format error. A blank (whitespace-only) string
/// returns `default_if_blank`.
pub fn parse_real(s: &str, default_if_blank: f64) -> Result<f64, RealFormatError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(default_if_blank);
    }
    let normalized = trimmed.replace(',', ".");
    match normalized.to_ascii_lowercase().as_str() {
        "nan" => return Ok(f64::NAN),
        "infinity" | "+infinity" => return Ok(f64::INFINITY),
        "-infinity" => return Ok(f64::NEG_INFINITY),
        _ => {}
    }
    if let Ok(r) = normalized.parse::<f64>() {
        return Ok(r);
    }
    if let Ok(i) = parse_integer(trimmed) {
        return Ok(i as f64);
    }
    Err(RealFormatError(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equality_is_string_equality() {
        let a = Value::of_integer(42);
        let b = Value::of_string_str("42");
        assert!(a.equal(&b));
    }

    #[test]
    fn truthy_and_falsey_literals() {
        assert_eq!(parse_integer("Yes").unwrap(), 1);
        assert_eq!(parse_integer("OFF").unwrap(), 0);
        assert_eq!(parse_integer("null").unwrap(), 0);
    }

    #[test]
    fn radix_prefixes() {
        assert_eq!(parse_integer("0xFF").unwrap(), 255);
        assert_eq!(parse_integer("0b101").unwrap(), 5);
        assert_eq!(parse_integer("0o17").unwrap(), 15);
        assert_eq!(parse_integer("-0x10").unwrap(), -16);
    }

    #[test]
    fn token_too_long_is_format_error() {
        let s = "1".repeat(66);
        assert!(parse_integer(&s).is_err());
    }

    #[test]
    fn real_accepts_comma_decimal_and_special_values() {
        assert_eq!(parse_real("3,5", 0.0).unwrap(), 3.5);
        assert!(parse_real("NaN", 0.0).unwrap().is_nan());
        assert_eq!(parse_real("Infinity", 0.0).unwrap(), f64::INFINITY);
    }

    #[test]
    fn real_falls_back_to_integer_then_default() {
        assert_eq!(parse_real("42", 0.0).unwrap(), 42.0);
        assert_eq!(parse_real("   ", 9.5).unwrap(), 9.5);
        assert!(parse_real("not-a-number", 0.0).is_err());
    }

    #[test]
    fn fast_decimal_path_matches_general_parser() {
        assert_eq!(parse_integer_fast_decimal(b"123"), Some(123));
        assert_eq!(parse_integer_fast_decimal(b"-45"), Some(-45));
        assert_eq!(parse_integer_fast_decimal(b"0x10"), None);
    }
}
