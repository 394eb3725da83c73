use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Checks every structural invariant and returns the height of the tree.
fn validate_tree<K: Ord + std::fmt::Debug, V>(t: &AvlTree<K, V>) -> usize {
    fn walk<K: Ord + std::fmt::Debug, V>(
        t: &AvlTree<K, V>,
        id: Option<NodeId>,
        parent: Option<NodeId>,
        lower: Option<&K>,
        upper: Option<&K>,
        count: &mut usize,
    ) -> u8 {
        let Some(id) = id else { return 0 };
        let node = &t.nodes[id.0];
        *count += 1;

        assert_eq!(node.parent, parent, "parent link of {:?}", node.key);
        if let Some(lower) = lower {
            assert!(*lower < node.key, "{:?} not above {:?}", node.key, lower);
        }
        if let Some(upper) = upper {
            assert!(node.key < *upper, "{:?} not below {:?}", node.key, upper);
        }

        let lh = walk(t, node.left, Some(id), lower, Some(&node.key), count);
        let rh = walk(t, node.right, Some(id), Some(&node.key), upper, count);
        assert!(
            lh.abs_diff(rh) <= 1,
            "skew {} at {:?}",
            i32::from(rh) - i32::from(lh),
            node.key
        );
        assert_eq!(node.height, 1 + lh.max(rh), "cached height of {:?}", node.key);
        node.height
    }

    let mut count = 0usize;
    let height = walk(t, t.root, None, None, None, &mut count);
    assert_eq!(count, t.len, "reachable node count must match len");
    assert_eq!(t.nodes.len(), t.len, "arena live slots must match len");
    assert_eq!(t.height(), usize::from(height));
    usize::from(height)
}

fn height_bound(n: usize) -> usize {
    (1.44 * ((n + 2) as f64).log2()).ceil() as usize
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    Insert(#[proptest(strategy = "0u16..512")] u16, u32),
    Remove(#[proptest(strategy = "0u16..512")] u16),
    Get(#[proptest(strategy = "0u16..512")] u16),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=2000)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_reject(ops in ops_strategy()) {
        let mut t: AvlTree<u16, u32> = AvlTree::new();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let got = t.insert(key, value);
                    if m.contains_key(&key) {
                        prop_assert_eq!(got, Err(AvlError::DuplicateKey));
                    } else {
                        prop_assert_eq!(got, Ok(None));
                        m.insert(key, value);
                    }
                }
                Op::Remove(key) => {
                    let got = t.remove(&key);
                    match m.remove(&key) {
                        Some(v) => prop_assert_eq!(got, Ok(v)),
                        None => prop_assert_eq!(got, Err(AvlError::KeyNotFound)),
                    }
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key).copied(), m.get(&key).copied());
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        let height = validate_tree(&t);
        prop_assert!(height <= height_bound(t.len()));
        let got: Vec<(u16, u32)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_equivalence_overwrite(ops in ops_strategy()) {
        let config = Config::default()
            .with_initial_capacity(1)
            .with_duplicate_policy(DuplicatePolicy::Overwrite);
        let mut t: AvlTree<u16, u32> = AvlTree::with_config(config).unwrap();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    prop_assert_eq!(t.insert(key, value), Ok(m.insert(key, value)));
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.remove(&key).ok(), m.remove(&key));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key).copied(), m.get(&key).copied());
                }
            }
        }

        validate_tree(&t);
        let got: Vec<(u16, u32)> = t.iter().rev().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u16, u32)> = m.into_iter().rev().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_remove_all_in_any_order(
        keys in prop::collection::btree_set(any::<i32>(), 0..300)
            .prop_map(|s| s.into_iter().collect::<Vec<_>>())
            .prop_shuffle(),
        order in any::<prop::sample::Index>(),
    ) {
        let mut t: AvlTree<i32, ()> = AvlTree::new();
        for &k in &keys {
            prop_assert_eq!(t.insert(k, ()), Ok(None));
        }
        validate_tree(&t);
        prop_assert_eq!(t.iter().count(), keys.len());

        let mut removal = keys.clone();
        if !removal.is_empty() {
            let pivot = order.index(removal.len());
            removal.rotate_left(pivot);
        }
        for k in removal {
            prop_assert_eq!(t.remove(&k), Ok(()));
            validate_tree(&t);
        }

        prop_assert!(t.is_empty());
        prop_assert!(t.root.is_none());
        let stats = t.arena_stats();
        prop_assert_eq!(stats.live, 0);
        prop_assert_eq!(stats.free, keys.len());
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u8> = (1..=7).collect();

    for_each_permutation(&keys, |perm| {
        let mut t: AvlTree<u8, u8> = AvlTree::new();
        for &k in &perm {
            assert_eq!(t.insert(k, k), Ok(None));
            validate_tree(&t);
        }
        assert!(t.height() <= 4);
        let got: Vec<u8> = t.keys().copied().collect();
        assert_eq!(got, keys);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<u8> = (1..=7).collect();

    // Insert in a fixed order, then remove in all permutations.
    let mut base: AvlTree<u8, u8> = AvlTree::new();
    for &k in &[4, 2, 6, 1, 3, 5, 7] {
        base.insert(k, k * 2).unwrap();
    }
    assert_eq!(base.height(), 3);

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        let mut left: BTreeMap<u8, u8> = keys.iter().map(|&k| (k, k * 2)).collect();

        for k in perm {
            assert_eq!(t.remove(&k).ok(), left.remove(&k));
            assert_eq!(t.len(), left.len());
            validate_tree(&t);
            let got: Vec<u8> = t.keys().copied().collect();
            let expected: Vec<u8> = left.keys().copied().collect();
            assert_eq!(got, expected);
        }
        assert_eq!(t.len(), 0);
        assert!(t.root.is_none());
        assert_eq!(t.arena_stats().free, keys.len());
    });
}

#[test]
fn ascending_and_descending_builds_stay_within_bound() {
    for n in [3usize, 31, 127, 1000, 4096] {
        let mut up: AvlTree<usize, ()> = AvlTree::new();
        let mut down: AvlTree<usize, ()> = AvlTree::new();
        for k in 0..n {
            up.insert(k, ()).unwrap();
            down.insert(n - k, ()).unwrap();
        }
        assert!(validate_tree(&up) <= height_bound(n));
        assert!(validate_tree(&down) <= height_bound(n));
    }
}
