//! Deterministic hashing of constants, compatible with CPython under `PYTHONHASHSEED=0`.
//!
//! Constant deduplication keys must be identical across runs so that emitted code is
//! reproducible. Text and bytes use SipHash-1-3 with a zeroed key, numbers reduce modulo the
//! Mersenne prime `2^61 - 1`, tuples mix element hashes with the xxHash lanes and frozensets
//! combine shuffled member hashes order-independently.
//!
//! CPython gives `1`, `1.0` and `True` one hash. Constant equality never crosses kinds, so
//! such shared hashes only cost a collision and never merge distinct constants.

use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use crate::constants::ConstantValue;

/// `2^61 - 1`; `2^61` is congruent to 1 modulo it, so powers of two reduce by rotation.
const MODULUS: u64 = (1 << 61) - 1;
const MODULUS_BITS: i32 = 61;

const NONE_HASH: u64 = 0xFCA8_6420;
/// Any fixed value works for the ellipsis; it only has to be stable.
const ELLIPSIS_HASH: u64 = 0x0E11_195E;
const INFINITY_HASH: i64 = 314_159;
const IMAG_MULTIPLIER: i64 = 1_000_003;

/// Computes the deduplication hash of a constant.
///
/// Returns `None` for constants CPython refuses to hash (lists, dicts, sets and anything
/// containing them) and for ranges, whose native hash is not stable between equal objects.
/// Callers substitute the fixed fallback bucket.
#[must_use]
pub(crate) fn constant_hash(constant: &ConstantValue) -> Option<u64> {
    let hash = match constant {
        ConstantValue::None => NONE_HASH,
        ConstantValue::Ellipsis => ELLIPSIS_HASH,
        ConstantValue::Bool(b) => u64::from(*b),
        ConstantValue::Int(i) => finish(int_hash(i)),
        ConstantValue::Float(f) => finish(float_hash(*f)),
        ConstantValue::Complex { real, imag } => {
            finish(float_hash(*real).wrapping_add(IMAG_MULTIPLIER.wrapping_mul(float_hash(*imag))))
        }
        ConstantValue::Str(s) => bytes_hash(s.as_bytes()),
        ConstantValue::Bytes(b) => bytes_hash(b),
        ConstantValue::Tuple(items) => tuple_hash(&member_hashes(items)?),
        ConstantValue::FrozenSet(items) => frozenset_hash(&member_hashes(items)?),
        ConstantValue::Range { .. }
        | ConstantValue::List(_)
        | ConstantValue::Dict(_)
        | ConstantValue::Set(_)
        | ConstantValue::Unclassified(_) => return None,
    };
    Some(hash)
}

fn member_hashes(items: &[ConstantValue]) -> Option<Vec<u64>> {
    items.iter().map(constant_hash).collect()
}

/// Applies CPython's reserved-value rule (`-1` signals an error, so it becomes `-2`) and
/// reinterprets the bits.
fn finish(signed: i64) -> u64 {
    let hash = if signed == -1 { -2 } else { signed };
    u64::from_ne_bytes(hash.to_ne_bytes())
}

/// `n mod MODULUS`, keeping the sign of `n`.
fn int_hash(value: &BigInt) -> i64 {
    let reduced = (value.magnitude() % MODULUS).to_i64().unwrap_or_default();
    if value.sign() == Sign::Minus { -reduced } else { reduced }
}

/// `x mod MODULUS` for the exact rational value of `x`, with CPython's special values and
/// the reserved `-1` already replaced, as complex hashing combines the parts afterwards.
///
/// A finite double is `mantissa * 2^exponent` with an integral mantissa, and `2^k` reduces
/// to `2^(k mod 61)`, so the hash is one 128-bit multiplication. Integral doubles therefore
/// hash like the equal integer.
fn float_hash(value: f64) -> i64 {
    if value.is_nan() {
        return 0;
    }
    if value.is_infinite() {
        return if value > 0.0 { INFINITY_HASH } else { -INFINITY_HASH };
    }

    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), biased - 1075)
    };

    let shift = exponent.rem_euclid(MODULUS_BITS) as u32;
    let reduced = (u128::from(mantissa) << shift) % u128::from(MODULUS);
    let magnitude = reduced as i64;
    match if value.is_sign_negative() { -magnitude } else { magnitude } {
        -1 => -2,
        hash => hash,
    }
}

fn bytes_hash(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    finish(i64::from_ne_bytes(SipHash13::digest(bytes).to_ne_bytes()))
}

/// Combines element hashes with the xxHash-style lanes of `tuplehash`.
fn tuple_hash(lanes: &[u64]) -> u64 {
    const PRIME_1: u64 = 11_400_714_785_074_694_791;
    const PRIME_2: u64 = 14_029_467_366_897_019_727;
    const PRIME_5: u64 = 2_870_177_450_012_600_261;
    const LENGTH_SALT: u64 = 3_527_539;

    let acc = lanes.iter().fold(PRIME_5, |acc, &lane| {
        acc.wrapping_add(lane.wrapping_mul(PRIME_2))
            .rotate_left(31)
            .wrapping_mul(PRIME_1)
    });
    let acc = acc.wrapping_add(lanes.len() as u64 ^ (PRIME_5 ^ LENGTH_SALT));
    if acc == u64::MAX { 1_546_275_796 } else { acc }
}

/// Combines member hashes independently of their order, like `frozenset_hash`.
fn frozenset_hash(lanes: &[u64]) -> u64 {
    let shuffle = |h: u64| ((h ^ 89_869_747) ^ (h << 16)).wrapping_mul(3_644_798_167);

    let mut hash = lanes.iter().fold(0, |acc, &lane| acc ^ shuffle(lane));
    hash ^= (lanes.len() as u64 + 1).wrapping_mul(1_927_868_237);
    hash ^= (hash >> 11) ^ (hash >> 25);
    hash = hash.wrapping_mul(69_069).wrapping_add(907_133_923);
    if hash == u64::MAX { 590_923_713 } else { hash }
}

/// SipHash-1-3 keyed with zeros: one compression round per block, three finalization rounds.
struct SipHash13 {
    v: [u64; 4],
}

impl SipHash13 {
    fn digest(bytes: &[u8]) -> u64 {
        let mut state = Self {
            v: [
                0x736f_6d65_7073_6575,
                0x646f_7261_6e64_6f6d,
                0x6c79_6765_6e65_7261,
                0x7465_6462_7974_6573,
            ],
        };

        let mut blocks = bytes.chunks_exact(8);
        for block in &mut blocks {
            let mut word = [0_u8; 8];
            word.copy_from_slice(block);
            state.compress(u64::from_le_bytes(word));
        }
        let tail = blocks
            .remainder()
            .iter()
            .enumerate()
            .fold((bytes.len() as u64) << 56, |tail, (index, &byte)| {
                tail | (u64::from(byte) << (index * 8))
            });
        state.compress(tail);

        state.v[2] ^= 0xff;
        for _ in 0..3 {
            state.round();
        }
        state.v.iter().fold(0, |acc, v| acc ^ v)
    }

    fn compress(&mut self, message: u64) {
        self.v[3] ^= message;
        self.round();
        self.v[0] ^= message;
    }

    fn round(&mut self) {
        let [v0, v1, v2, v3] = &mut self.v;
        *v0 = v0.wrapping_add(*v1);
        *v1 = v1.rotate_left(13) ^ *v0;
        *v0 = v0.rotate_left(32);
        *v2 = v2.wrapping_add(*v3);
        *v3 = v3.rotate_left(16) ^ *v2;
        *v0 = v0.wrapping_add(*v3);
        *v3 = v3.rotate_left(21) ^ *v0;
        *v2 = v2.wrapping_add(*v1);
        *v1 = v1.rotate_left(17) ^ *v2;
        *v2 = v2.rotate_left(32);
    }
}
