//! Literal values seen by the code generator and the rules used to classify them.
//!
//! Every literal the tree builder hands to code generation (parameter names, default
//! values, anything that ends up in the constants module) is a [`ConstantValue`]. This
//! module answers the questions code generation asks about those literals:
//!
//! - are two literals the *same* constant? ([`compare_constants`])
//! - may a literal be shared between uses without copying? ([`is_mutable`])
//! - which fast paths apply to it? ([`is_iterable_constant`], [`is_number_constant`],
//!   [`is_index_constant`])
//!
//! Equality here is deliberately not Python's `==`. A NaN float equals another NaN float,
//! `0.0` and `-0.0` are different constants, and `1` never equals `True` or `1.0`: two
//! literals are only interchangeable when emitting one in place of the other cannot change
//! the program.

use std::{
    fmt::{self, Write},
    hash::{Hash, Hasher},
};

use ahash::AHashMap;
use num_bigint::BigInt;

use crate::py_hash::constant_hash;

/// Hash bucket used for constants that have no native hash.
///
/// Lists, dicts, sets, ranges and anything containing them all land here. Collisions are
/// expected and resolved by [`compare_constants`].
pub const FALLBACK_HASH_BUCKET: u64 = 55;

/// A literal value produced by the tree builder.
///
/// Containers hold their elements by value; a constant is built once and never mutated
/// afterwards. Dict entries and set members keep their construction order, which only
/// matters for emission order, never for equality.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ConstantValue {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Complex { real: f64, imag: f64 },
    Str(String),
    Bytes(Vec<u8>),
    /// `range(start, stop, step)`.
    Range { start: i64, stop: i64, step: i64 },
    Tuple(Vec<ConstantValue>),
    List(Vec<ConstantValue>),
    Dict(Vec<(ConstantValue, ConstantValue)>),
    Set(Vec<ConstantValue>),
    FrozenSet(Vec<ConstantValue>),
    /// The `...` singleton.
    Ellipsis,
    /// A literal of a kind this layer has no rules for, carrying its runtime type name.
    ///
    /// The tree builder must never produce one; [`is_mutable`] treats it as a fatal
    /// internal error.
    Unclassified(String),
}

impl ConstantValue {
    /// Creates an integer constant.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Int(BigInt::from(value))
    }

    /// Creates a string constant.
    #[must_use]
    pub fn str(value: &str) -> Self {
        Self::Str(value.to_owned())
    }

    /// Creates a tuple constant from its elements.
    #[must_use]
    pub fn tuple(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    /// Creates a `range(start, stop)` constant with step 1.
    #[must_use]
    pub fn range(start: i64, stop: i64) -> Self {
        Self::Range { start, stop, step: 1 }
    }

    /// Returns the Python type name of this constant, as used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Complex { .. } => "complex",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::Range { .. } => "range",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::FrozenSet(_) => "frozenset",
            Self::Ellipsis => "ellipsis",
            Self::Unclassified(name) => name,
        }
    }

    /// Returns the elements of a sequence-like constant, as unpacking would see them.
    ///
    /// Tuples and lists yield their elements, strings their characters and ranges their
    /// integers. Returns `None` for constants that cannot be unpacked positionally.
    #[must_use]
    pub fn unpack_items(&self) -> Option<Vec<Self>> {
        match self {
            Self::Tuple(items) | Self::List(items) => Some(items.clone()),
            Self::Str(s) => Some(s.chars().map(|c| Self::Str(c.to_string())).collect()),
            Self::Bytes(b) => Some(b.iter().map(|&byte| Self::int(i64::from(byte))).collect()),
            Self::Range { start, stop, step } => Some(range_items(*start, *stop, *step).map(Self::int).collect()),
            _ => None,
        }
    }
}

/// Iterates the integers of `range(start, stop, step)`. A zero step yields nothing.
fn range_items(start: i64, stop: i64, step: i64) -> impl Iterator<Item = i64> {
    let mut next = Some(start);
    std::iter::from_fn(move || {
        let current = next?;
        let more = match step.signum() {
            1 => current < stop,
            -1 => current > stop,
            _ => false,
        };
        if !more {
            return None;
        }
        next = current.checked_add(step);
        Some(current)
    })
}

/// Structural equality between constants, as used for deduplication.
///
/// Constants of different runtime kinds are never equal. Floats (and both complex
/// components) compare NaN equal to NaN and keep `0.0` apart from `-0.0`. Dicts and sets
/// fall back to pairwise scans so that NaN-bearing members, which defeat hash lookups,
/// are still matched. Ranges compare by their canonical text, so `range(0, 3)` equals
/// `range(0, 3, 1)` but not `range(1, 1)` versus `range(2, 2)`.
#[must_use]
pub fn compare_constants(a: &ConstantValue, b: &ConstantValue) -> bool {
    use ConstantValue as C;

    match (a, b) {
        (C::None, C::None) | (C::Ellipsis, C::Ellipsis) => true,
        (C::Bool(x), C::Bool(y)) => x == y,
        (C::Int(x), C::Int(y)) => x == y,
        (C::Float(x), C::Float(y)) => compare_floats(*x, *y),
        (
            C::Complex {
                real: real_a,
                imag: imag_a,
            },
            C::Complex {
                real: real_b,
                imag: imag_b,
            },
        ) => compare_floats(*imag_a, *imag_b) && compare_floats(*real_a, *real_b),
        (C::Str(x), C::Str(y)) => x == y,
        (C::Bytes(x), C::Bytes(y)) => x == y,
        (C::Range { .. }, C::Range { .. }) => a.to_string() == b.to_string(),
        (C::Tuple(x), C::Tuple(y)) | (C::List(x), C::List(y)) => compare_sequences(x, y),
        (C::Dict(x), C::Dict(y)) => compare_dicts(x, y),
        (C::Set(x), C::Set(y)) | (C::FrozenSet(x), C::FrozenSet(y)) => compare_sets(x, y),
        (C::Unclassified(x), C::Unclassified(y)) => x == y,
        _ => false,
    }
}

/// NaN equals NaN, and the sign bit distinguishes otherwise-equal zeros.
fn compare_floats(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_sign_negative() != b.is_sign_negative() {
        return false;
    }
    a == b
}

fn compare_sequences(a: &[ConstantValue], b: &[ConstantValue]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(ea, eb)| compare_constants(ea, eb))
}

/// Quadratic on purpose: a NaN key or value hashes but never looks itself up.
///
/// Entries pair up one to one, so `{nan: 1, nan: 2}` never equals `{nan: 1, nan: 1}`.
fn compare_dicts(a: &[(ConstantValue, ConstantValue)], b: &[(ConstantValue, ConstantValue)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|(key_a, value_a)| {
        claim(&mut used, 0..b.len(), |index| {
            let (key_b, value_b) = &b[index];
            compare_constants(key_a, key_b) && compare_constants(value_a, value_b)
        })
    })
}

/// Hash bucket first, then a full structural scan of `b` for anything the bucket missed.
///
/// Members pair up one to one, as distinct NaN objects may share a set.
fn compare_sets(a: &[ConstantValue], b: &[ConstantValue]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut buckets: AHashMap<u64, Vec<usize>> = AHashMap::new();
    for (index, eb) in b.iter().enumerate() {
        buckets.entry(bucket_of(eb)).or_default().push(index);
    }
    let mut used = vec![false; b.len()];
    a.iter().all(|ea| {
        let bucket = buckets.get(&bucket_of(ea)).map(Vec::as_slice).unwrap_or_default();
        claim(&mut used, bucket.iter().copied(), |index| compare_constants(ea, &b[index]))
            || claim(&mut used, 0..b.len(), |index| compare_constants(ea, &b[index]))
    })
}

/// Marks the first unused candidate accepted by `matches` as used.
fn claim(used: &mut [bool], candidates: impl IntoIterator<Item = usize>, matches: impl Fn(usize) -> bool) -> bool {
    let found = candidates.into_iter().find(|&index| !used[index] && matches(index));
    if let Some(index) = found {
        used[index] = true;
    }
    found.is_some()
}

fn bucket_of(constant: &ConstantValue) -> u64 {
    constant_hash(constant).unwrap_or(FALLBACK_HASH_BUCKET)
}

/// Returns whether a constant may be mutated by the code that receives it.
///
/// Mutable constants cannot be shared between uses and must be copied on every use. Lists,
/// dicts and sets are mutable, scalars, strings and ranges are not, and tuples and
/// frozensets are mutable iff any element is. The ellipsis singleton counts as mutable so
/// that it is never folded into a cached container.
///
/// # Panics
///
/// Panics on [`ConstantValue::Unclassified`]. Guessing the mutability of an unknown kind
/// could hand out a shared object that later gets modified, so compilation must stop.
#[must_use]
pub fn is_mutable(constant: &ConstantValue) -> bool {
    use ConstantValue as C;

    match constant {
        C::None | C::Bool(_) | C::Int(_) | C::Float(_) | C::Complex { .. } | C::Str(_) | C::Bytes(_) | C::Range { .. } => {
            false
        }
        C::List(_) | C::Dict(_) | C::Set(_) => true,
        C::Tuple(items) | C::FrozenSet(items) => items.iter().any(is_mutable),
        C::Ellipsis => true,
        C::Unclassified(type_name) => {
            panic!("constant of unclassified kind '{type_name}' reached the constant classifier")
        }
    }
}

/// Returns whether iterating the constant at compile time is supported.
#[must_use]
pub fn is_iterable_constant(constant: &ConstantValue) -> bool {
    matches!(
        constant,
        ConstantValue::Str(_)
            | ConstantValue::Bytes(_)
            | ConstantValue::List(_)
            | ConstantValue::Tuple(_)
            | ConstantValue::Set(_)
            | ConstantValue::FrozenSet(_)
            | ConstantValue::Dict(_)
            | ConstantValue::Range { .. }
    )
}

/// Returns whether the constant is a real number (complex is excluded).
#[must_use]
pub fn is_number_constant(constant: &ConstantValue) -> bool {
    matches!(
        constant,
        ConstantValue::Int(_) | ConstantValue::Float(_) | ConstantValue::Bool(_)
    )
}

/// Returns whether the constant can be used directly as a sequence index.
#[must_use]
pub fn is_index_constant(constant: &ConstantValue) -> bool {
    matches!(constant, ConstantValue::Int(_) | ConstantValue::Bool(_))
}

impl PartialEq for ConstantValue {
    fn eq(&self, other: &Self) -> bool {
        compare_constants(self, other)
    }
}

/// A constant usable as a hash-map key.
///
/// The hash is computed once at construction; constants without a native hash use
/// [`FALLBACK_HASH_BUCKET`]. Equality is [`compare_constants`], so values sharing the
/// fallback bucket are still told apart (or merged) correctly.
#[derive(Debug, Clone)]
pub struct HashableConstant {
    constant: ConstantValue,
    hash: u64,
}

impl HashableConstant {
    /// Wraps a constant, hashing it eagerly.
    #[must_use]
    pub fn new(constant: ConstantValue) -> Self {
        let hash = bucket_of(&constant);
        Self { constant, hash }
    }

    /// Returns the wrapped constant.
    #[must_use]
    pub fn constant(&self) -> &ConstantValue {
        &self.constant
    }

    /// Unwraps the constant.
    #[must_use]
    pub fn into_constant(self) -> ConstantValue {
        self.constant
    }

    /// Returns the precomputed hash key.
    #[must_use]
    pub fn hash_key(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for HashableConstant {
    fn eq(&self, other: &Self) -> bool {
        compare_constants(&self.constant, &other.constant)
    }
}

impl Eq for HashableConstant {}

impl Hash for HashableConstant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Formats the constant the way Python's `repr()` would.
///
/// This is the canonical text form used for range equality and for naming constants in
/// emitted code.
impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&float_repr(*v)),
            Self::Complex { real, imag } => complex_repr(f, *real, *imag),
            Self::Str(s) => string_repr(f, s),
            Self::Bytes(b) => bytes_repr(f, b),
            Self::Range { start, stop, step } => {
                if *step == 1 {
                    write!(f, "range({start}, {stop})")
                } else {
                    write!(f, "range({start}, {stop}, {step})")
                }
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::List(items) => {
                f.write_char('[')?;
                write_items(f, items)?;
                f.write_char(']')
            }
            Self::Dict(entries) => {
                f.write_char('{')?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_char('}')
            }
            Self::Set(items) if items.is_empty() => f.write_str("set()"),
            Self::Set(items) => {
                f.write_char('{')?;
                write_items(f, items)?;
                f.write_char('}')
            }
            Self::FrozenSet(items) if items.is_empty() => f.write_str("frozenset()"),
            Self::FrozenSet(items) => {
                f.write_str("frozenset({")?;
                write_items(f, items)?;
                f.write_str("})")
            }
            Self::Ellipsis => f.write_str("Ellipsis"),
            Self::Unclassified(type_name) => write!(f, "<{type_name} object>"),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[ConstantValue]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Returns a string representation of a float matching CPython's `repr()` behavior.
///
/// `ryu` produces the shortest round-tripping digits; the exponent and integral forms are
/// then adjusted to CPython's spelling (`1e+20`, `3.0`).
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }

    let mut buffer = ryu::Buffer::new();
    let s = buffer.format(value);
    if let Some(e_pos) = s.find('e') {
        let (mantissa, exp_part) = s.split_at(e_pos);
        let exp = &exp_part[1..];
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exp),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }
    if s.contains('.') { s.to_owned() } else { format!("{s}.0") }
}

fn complex_repr(f: &mut fmt::Formatter<'_>, real: f64, imag: f64) -> fmt::Result {
    let imag_text = float_repr(imag);
    let imag_text = imag_text.strip_suffix(".0").unwrap_or(&imag_text);
    if real == 0.0 && !real.is_sign_negative() {
        return write!(f, "{imag_text}j");
    }
    let real_text = float_repr(real);
    let real_text = real_text.strip_suffix(".0").unwrap_or(&real_text);
    if imag_text.starts_with('-') {
        write!(f, "({real_text}{imag_text}j)")
    } else {
        write!(f, "({real_text}+{imag_text}j)")
    }
}

/// Single quotes unless the text contains a single quote and no double quote.
fn string_repr(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if (c as u32) < 0x20 || c as u32 == 0x7f => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

fn bytes_repr(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("b'")?;
    for &byte in bytes {
        match byte {
            b'\\' => f.write_str("\\\\")?,
            b'\'' => f.write_str("\\'")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7e => f.write_char(char::from(byte))?,
            _ => write!(f, "\\x{byte:02x}")?,
        }
    }
    f.write_char('\'')
}
