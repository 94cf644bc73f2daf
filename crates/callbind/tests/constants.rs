//! Tests for constant classification, structural equality and hashable keys.

use std::collections::HashSet;

use callbind::{
    ConstantValue as C, FALLBACK_HASH_BUCKET, HashableConstant, compare_constants, is_index_constant,
    is_iterable_constant, is_mutable, is_number_constant,
};

fn one_of_each() -> Vec<C> {
    vec![
        C::None,
        C::Bool(true),
        C::int(42),
        C::Float(1.5),
        C::Float(f64::NAN),
        C::Complex {
            real: f64::NAN,
            imag: 2.0,
        },
        C::Complex {
            real: 1.0,
            imag: f64::NAN,
        },
        C::str("text"),
        C::Bytes(b"raw".to_vec()),
        C::range(0, 10),
        C::tuple([C::int(1), C::Float(f64::NAN)]),
        C::List(vec![C::int(1)]),
        C::Dict(vec![(C::str("k"), C::Float(f64::NAN))]),
        C::Set(vec![C::Float(f64::NAN), C::int(3)]),
        C::FrozenSet(vec![C::str("a")]),
        C::Ellipsis,
    ]
}

#[test]
fn every_constant_equals_itself() {
    for value in one_of_each() {
        assert!(compare_constants(&value, &value), "{value} should equal itself");
        assert!(compare_constants(&value, &value.clone()), "{value} should equal its copy");
    }
}

#[test]
fn nan_equals_nan_but_signed_zeros_differ() {
    assert!(compare_constants(&C::Float(f64::NAN), &C::Float(-f64::NAN)));
    assert!(!compare_constants(&C::Float(0.0), &C::Float(-0.0)));
    assert!(compare_constants(&C::Float(-0.0), &C::Float(-0.0)));
    assert!(!compare_constants(
        &C::Complex { real: 0.0, imag: 1.0 },
        &C::Complex { real: -0.0, imag: 1.0 }
    ));
}

#[test]
fn different_kinds_never_compare_equal() {
    assert!(!compare_constants(&C::int(1), &C::Bool(true)));
    assert!(!compare_constants(&C::int(1), &C::Float(1.0)));
    assert!(!compare_constants(&C::tuple([]), &C::List(vec![])));
    assert!(!compare_constants(&C::Set(vec![]), &C::FrozenSet(vec![])));
    assert!(!compare_constants(&C::str("a"), &C::Bytes(b"a".to_vec())));
}

#[test]
fn sequences_compare_by_length_then_elements() {
    let a = C::tuple([C::int(1), C::int(2)]);
    assert!(compare_constants(&a, &C::tuple([C::int(1), C::int(2)])));
    assert!(!compare_constants(&a, &C::tuple([C::int(2), C::int(1)])));
    assert!(!compare_constants(&a, &C::tuple([C::int(1)])));
}

#[test]
fn dicts_ignore_entry_order_and_tolerate_nan() {
    let a = C::Dict(vec![(C::str("x"), C::Float(f64::NAN)), (C::Float(f64::NAN), C::int(1))]);
    let b = C::Dict(vec![(C::Float(f64::NAN), C::int(1)), (C::str("x"), C::Float(f64::NAN))]);
    assert!(compare_constants(&a, &b));

    let c = C::Dict(vec![(C::Float(f64::NAN), C::int(2)), (C::str("x"), C::Float(f64::NAN))]);
    assert!(!compare_constants(&a, &c));
}

#[test]
fn sets_with_nan_members_in_different_order_are_equal() {
    let a = C::Set(vec![C::Float(f64::NAN), C::str("b"), C::int(1)]);
    let b = C::Set(vec![C::int(1), C::Float(f64::NAN), C::str("b")]);
    assert!(compare_constants(&a, &b));

    let only_nans_a = C::FrozenSet(vec![C::Float(f64::NAN), C::Complex { real: f64::NAN, imag: 0.0 }]);
    let only_nans_b = C::FrozenSet(vec![C::Complex { real: f64::NAN, imag: 0.0 }, C::Float(f64::NAN)]);
    assert!(compare_constants(&only_nans_a, &only_nans_b));
}

#[test]
fn repeated_nan_members_must_pair_up_one_to_one() {
    let nan = || C::Float(f64::NAN);
    let two_nans = C::Set(vec![nan(), nan()]);
    let nan_and_one = C::Set(vec![nan(), C::Float(1.0)]);
    assert!(!compare_constants(&two_nans, &nan_and_one));
    assert!(!compare_constants(&nan_and_one, &two_nans));
    assert!(compare_constants(&two_nans, &C::Set(vec![nan(), nan()])));
    assert!(HashableConstant::new(two_nans) != HashableConstant::new(nan_and_one));

    let distinct_values = C::Dict(vec![(nan(), C::int(1)), (nan(), C::int(2))]);
    let same_values = C::Dict(vec![(nan(), C::int(1)), (nan(), C::int(1))]);
    assert!(!compare_constants(&distinct_values, &same_values));
    assert!(!compare_constants(&same_values, &distinct_values));
    assert!(compare_constants(
        &distinct_values,
        &C::Dict(vec![(nan(), C::int(2)), (nan(), C::int(1))])
    ));
}

#[test]
fn ranges_compare_by_canonical_text() {
    assert!(compare_constants(
        &C::range(0, 3),
        &C::Range {
            start: 0,
            stop: 3,
            step: 1
        }
    ));
    assert!(!compare_constants(&C::range(1, 1), &C::range(2, 2)));
    assert!(!compare_constants(
        &C::range(0, 4),
        &C::Range {
            start: 0,
            stop: 4,
            step: 2
        }
    ));
}

#[test]
fn mutability_classification() {
    assert!(!is_mutable(&C::tuple([])));
    assert!(is_mutable(&C::tuple([C::Dict(vec![])])));
    assert!(is_mutable(&C::List(vec![])));
    assert!(!is_mutable(&C::range(0, 5)));
    assert!(!is_mutable(&C::str("s")));
    assert!(!is_mutable(&C::Complex { real: 1.0, imag: 1.0 }));
    assert!(is_mutable(&C::Set(vec![])));
    assert!(!is_mutable(&C::FrozenSet(vec![C::int(1)])));
    assert!(is_mutable(&C::Ellipsis));
    assert!(is_mutable(&C::tuple([C::int(1), C::tuple([C::List(vec![])])])));
}

#[test]
#[should_panic(expected = "unclassified kind 'module'")]
fn mutability_of_unclassified_kind_is_fatal() {
    let _ = is_mutable(&C::Unclassified("module".to_owned()));
}

#[test]
#[should_panic(expected = "unclassified kind")]
fn unclassified_element_inside_tuple_is_fatal() {
    let _ = is_mutable(&C::tuple([C::int(1), C::Unclassified("function".to_owned())]));
}

#[test]
fn kind_predicates() {
    assert!(is_iterable_constant(&C::range(0, 2)));
    assert!(is_iterable_constant(&C::str("")));
    assert!(!is_iterable_constant(&C::int(1)));
    assert!(!is_iterable_constant(&C::None));

    assert!(is_number_constant(&C::Float(0.5)));
    assert!(is_number_constant(&C::Bool(false)));
    assert!(!is_number_constant(&C::Complex { real: 0.0, imag: 1.0 }));

    assert!(is_index_constant(&C::int(-1)));
    assert!(is_index_constant(&C::Bool(true)));
    assert!(!is_index_constant(&C::Float(1.0)));
}

#[test]
fn unhashable_constants_use_fallback_bucket() {
    for value in [
        C::List(vec![C::int(1)]),
        C::Dict(vec![]),
        C::Set(vec![]),
        C::range(0, 10),
        C::tuple([C::List(vec![])]),
    ] {
        assert_eq!(HashableConstant::new(value).hash_key(), FALLBACK_HASH_BUCKET);
    }
    assert_ne!(HashableConstant::new(C::str("x")).hash_key(), FALLBACK_HASH_BUCKET);
}

#[test]
fn hashable_wrappers_deduplicate_structurally() {
    let mut seen = HashSet::new();
    assert!(seen.insert(HashableConstant::new(C::List(vec![C::int(1)]))));
    assert!(seen.insert(HashableConstant::new(C::List(vec![C::int(2)]))));
    assert!(seen.insert(HashableConstant::new(C::range(0, 3))));
    assert!(!seen.insert(HashableConstant::new(C::List(vec![C::int(1)]))));
    assert!(!seen.insert(HashableConstant::new(C::Range {
        start: 0,
        stop: 3,
        step: 1
    })));
    assert!(seen.insert(HashableConstant::new(C::Float(f64::NAN))));
    assert!(!seen.insert(HashableConstant::new(C::Float(f64::NAN))));
    assert!(seen.insert(HashableConstant::new(C::Float(0.0))));
    assert!(seen.insert(HashableConstant::new(C::Float(-0.0))));
    assert_eq!(seen.len(), 6);
}

#[test]
fn equal_constants_share_hash_keys() {
    let a = HashableConstant::new(C::FrozenSet(vec![C::int(1), C::str("two"), C::Float(3.5)]));
    let b = HashableConstant::new(C::FrozenSet(vec![C::Float(3.5), C::int(1), C::str("two")]));
    assert_eq!(a, b);
    assert_eq!(a.hash_key(), b.hash_key());

    let c = HashableConstant::new(C::tuple([C::Float(f64::NAN)]));
    let d = HashableConstant::new(C::tuple([C::Float(f64::NAN)]));
    assert_eq!(c, d);
    assert_eq!(c.hash_key(), d.hash_key());
}

#[test]
fn repr_text() {
    assert_eq!(C::Complex { real: 0.0, imag: 1.0 }.to_string(), "1j");
    assert_eq!(C::Complex { real: 1.0, imag: -2.5 }.to_string(), "(1-2.5j)");
    assert_eq!(C::Bytes(b"a'\n".to_vec()).to_string(), "b'a\\'\\n'");
    assert_eq!(C::FrozenSet(vec![]).to_string(), "frozenset()");
    assert_eq!(
        C::Range {
            start: 5,
            stop: 0,
            step: -1
        }
        .to_string(),
        "range(5, 0, -1)"
    );
}
