//! Property tests for the grammar primitives
//!
//! Namespaces are drawn from a small pool so that generated wildcards
//! overlap often. `##other` wildcards always exclude the same non-empty
//! target namespace.

use proptest::prelude::*;
use std::collections::BTreeSet;

use xmlschema_compiler::validators::{
    BitVector, NamespaceConstraint, NamespaceWildcard, WildcardCompat,
};

const TARGET: &str = "urn:t";
const POOL: [&str; 4] = ["", TARGET, "urn:a", "urn:b"];

fn namespace() -> impl Strategy<Value = String> {
    prop::sample::select(POOL.to_vec()).prop_map(String::from)
}

fn constraint() -> impl Strategy<Value = NamespaceConstraint> {
    prop_oneof![
        Just(NamespaceConstraint::Any),
        Just(NamespaceConstraint::Other(TARGET.to_string())),
        prop::collection::btree_set(namespace(), 0..4).prop_map(NamespaceConstraint::Set),
    ]
}

fn compat() -> impl Strategy<Value = WildcardCompat> {
    prop_oneof![Just(WildcardCompat::Standard), Just(WildcardCompat::Legacy)]
}

fn wildcard() -> impl Strategy<Value = NamespaceWildcard> {
    (constraint(), compat()).prop_map(|(c, m)| NamespaceWildcard::new(c, TARGET).with_compat(m))
}

fn same_mode_pair() -> impl Strategy<Value = (NamespaceWildcard, NamespaceWildcard)> {
    (constraint(), constraint(), compat()).prop_map(|(a, b, m)| {
        (
            NamespaceWildcard::new(a, TARGET).with_compat(m),
            NamespaceWildcard::new(b, TARGET).with_compat(m),
        )
    })
}

fn indices() -> impl Strategy<Value = BTreeSet<usize>> {
    prop::collection::btree_set(0usize..512, 0..32)
}

proptest! {
    #[test]
    fn intersection_is_subset_of_both(a in wildcard(), b in wildcard()) {
        if let Ok(i) = a.intersection(&b) {
            prop_assert!(i.is_subset(&a), "{} not within {}", i, a);
            prop_assert!(i.is_subset(&b), "{} not within {}", i, b);
        }
    }

    #[test]
    fn intersection_admits_only_common_namespaces((a, b) in same_mode_pair()) {
        if let Ok(i) = a.intersection(&b) {
            for ns in POOL {
                if i.allows(ns) {
                    prop_assert!(a.allows(ns) && b.allows(ns), "{:?} admitted by {}", ns, i);
                }
            }
        }
    }

    #[test]
    fn union_admits_both_operands((a, b) in same_mode_pair()) {
        if let Ok(u) = a.union(&b) {
            for ns in POOL {
                if a.allows(ns) || b.allows(ns) {
                    prop_assert!(u.allows(ns), "{:?} rejected by {}", ns, u);
                }
            }
        }
    }

    #[test]
    fn union_and_intersection_are_commutative(a in wildcard(), b in wildcard()) {
        prop_assert_eq!(
            a.union(&b).ok().map(|w| w.constraint().clone()),
            b.union(&a).ok().map(|w| w.constraint().clone())
        );
        prop_assert_eq!(
            a.intersection(&b).ok().map(|w| w.constraint().clone()),
            b.intersection(&a).ok().map(|w| w.constraint().clone())
        );
    }

    #[test]
    fn or_is_set_union(a in indices(), b in indices()) {
        let mut left: BitVector = a.iter().copied().collect();
        let right: BitVector = b.iter().copied().collect();
        left.or(&right);

        let expected: Vec<usize> = a.union(&b).copied().collect();
        prop_assert_eq!(left.iter_ones().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn and_is_set_intersection(a in indices(), b in indices()) {
        let mut left: BitVector = a.iter().copied().collect();
        let right: BitVector = b.iter().copied().collect();
        left.and(&right);

        let expected: Vec<usize> = a.intersection(&b).copied().collect();
        prop_assert_eq!(left.iter_ones().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn equality_ignores_capacity(bits in indices(), extra in 0usize..4096) {
        let max = bits.iter().max().copied().unwrap_or(0);
        let mut wide = BitVector::with_len(max + 1 + extra);
        for &i in &bits {
            wide.set(i);
        }
        let narrow: BitVector = bits.iter().copied().collect();
        prop_assert_eq!(wide, narrow);
    }

    #[test]
    fn next_set_walks_in_order(bits in indices()) {
        let vector: BitVector = bits.iter().copied().collect();
        let mut walked = Vec::new();
        let mut cursor = None;
        while let Some(i) = vector.next_set(cursor) {
            walked.push(i);
            cursor = Some(i);
        }
        prop_assert_eq!(walked, bits.into_iter().collect::<Vec<_>>());
    }
}
