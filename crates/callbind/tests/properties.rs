//! Property tests for constant equality, hashing and deduplication.
//!
//! Key properties:
//!
//! 1. Structural equality is reflexive, symmetric and transitive, NaN included.
//! 2. Reordering set and dict members changes neither equality nor the hash key.
//! 3. The table hands out one code name per equivalence class, and distinct names otherwise.

use callbind::{ConstantTable, ConstantValue as C, HashableConstant, compare_constants, is_mutable};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_float() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(0.0),
        Just(-0.0),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        -1.0e6..1.0e6f64,
    ]
}

fn arb_leaf() -> impl Strategy<Value = C> {
    prop_oneof![
        Just(C::None),
        Just(C::Ellipsis),
        any::<bool>().prop_map(C::Bool),
        (-1000i64..1000).prop_map(C::int),
        arb_float().prop_map(C::Float),
        (arb_float(), arb_float()).prop_map(|(real, imag)| C::Complex { real, imag }),
        "[a-c ]{0,3}".prop_map(|s| C::str(&s)),
        prop::collection::vec(any::<u8>(), 0..3).prop_map(C::Bytes),
        (-3i64..3, -3i64..3, prop::sample::select(&[-2i64, -1, 1, 2][..]))
            .prop_map(|(start, stop, step)| C::Range { start, stop, step }),
    ]
}

fn is_nan(constant: &C) -> bool {
    matches!(constant, C::Float(f) if f.is_nan())
}

/// Literal sets and dicts never hold equal members twice. Separate NaN objects are
/// separate members, so NaN may repeat.
fn distinct(items: Vec<C>) -> Vec<C> {
    let mut out: Vec<C> = Vec::new();
    for item in items {
        if is_nan(&item) || !out.iter().any(|existing| compare_constants(existing, &item)) {
            out.push(item);
        }
    }
    out
}

fn distinct_keys(entries: Vec<(C, C)>) -> Vec<(C, C)> {
    let mut out: Vec<(C, C)> = Vec::new();
    for (key, value) in entries {
        if is_nan(&key) || !out.iter().any(|(existing, _)| compare_constants(existing, &key)) {
            out.push((key, value));
        }
    }
    out
}

/// Set members and dict keys, biased towards NaN so repeats actually show up.
fn arb_member() -> impl Strategy<Value = C> {
    prop_oneof![
        2 => arb_leaf(),
        1 => Just(C::Float(f64::NAN)),
        1 => (-2i64..2).prop_map(|n| C::Float(n as f64)),
    ]
}

fn arb_constant() -> impl Strategy<Value = C> {
    arb_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(C::Tuple),
            prop::collection::vec(inner.clone(), 0..4).prop_map(C::List),
            prop::collection::vec((arb_member(), inner), 0..4).prop_map(|entries| C::Dict(distinct_keys(entries))),
            prop::collection::vec(arb_member(), 0..4).prop_map(|items| C::Set(distinct(items))),
            prop::collection::vec(arb_member(), 0..4).prop_map(|items| C::FrozenSet(distinct(items))),
        ]
    })
}

/// Reverses the member order of every set and dict, recursively.
fn reorder(constant: &C) -> C {
    match constant {
        C::Tuple(items) => C::Tuple(items.iter().map(reorder).collect()),
        C::List(items) => C::List(items.iter().map(reorder).collect()),
        C::Set(items) => C::Set(items.iter().rev().map(reorder).collect()),
        C::FrozenSet(items) => C::FrozenSet(items.iter().rev().map(reorder).collect()),
        C::Dict(entries) => C::Dict(
            entries
                .iter()
                .rev()
                .map(|(key, value)| (reorder(key), reorder(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn equality_is_reflexive(a in arb_constant()) {
        prop_assert!(compare_constants(&a, &a));
        prop_assert!(compare_constants(&a, &a.clone()));
    }

    #[test]
    fn equality_is_symmetric(a in arb_constant(), b in arb_constant()) {
        prop_assert_eq!(compare_constants(&a, &b), compare_constants(&b, &a));
    }

    #[test]
    fn sets_with_repeated_nan_compare_symmetrically(
        a in prop::collection::vec(arb_member(), 0..4),
        b in prop::collection::vec(arb_member(), 0..4),
    ) {
        let (a, b) = (C::Set(distinct(a)), C::Set(distinct(b)));
        prop_assert_eq!(compare_constants(&a, &b), compare_constants(&b, &a));
        prop_assert_eq!(HashableConstant::new(a.clone()) == HashableConstant::new(b.clone()), compare_constants(&a, &b));
    }

    #[test]
    fn member_order_does_not_matter(a in arb_constant()) {
        let b = reorder(&a);
        prop_assert!(compare_constants(&a, &b));
        prop_assert_eq!(
            HashableConstant::new(a.clone()).hash_key(),
            HashableConstant::new(b.clone()).hash_key()
        );
        prop_assert_eq!(is_mutable(&a), is_mutable(&b));
    }

    #[test]
    fn equal_constants_have_equal_hash_keys(a in arb_constant(), b in arb_constant()) {
        if compare_constants(&a, &b) {
            prop_assert_eq!(HashableConstant::new(a).hash_key(), HashableConstant::new(b).hash_key());
        }
    }

    #[test]
    fn wrapper_equality_is_transitive(a in arb_constant(), c in arb_constant()) {
        let wrapped_a = HashableConstant::new(a.clone());
        let wrapped_b = HashableConstant::new(reorder(&a));
        let wrapped_c = HashableConstant::new(c.clone());
        prop_assert!(wrapped_a == wrapped_b);
        prop_assert_eq!(wrapped_b == wrapped_c, wrapped_a == wrapped_c);
        prop_assert_eq!(wrapped_a == wrapped_c, compare_constants(&a, &c));
    }

    #[test]
    fn table_names_follow_equality(a in arb_constant(), b in arb_constant()) {
        let mut table = ConstantTable::new();
        let first = table.get_or_insert(&a);
        let again = table.get_or_insert(&reorder(&a));
        prop_assert_eq!(&first.code, &again.code);
        prop_assert!(!again.inserted);

        let other = table.get_or_insert(&b);
        prop_assert_eq!(first.code == other.code, compare_constants(&a, &b));
    }
}
