use super::*;

use crate::node::NodeId;
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::HashMap;
use std::sync::Arc;

/// Structural invariants that must hold after every operation.
fn validate_tree<V>(m: &CompositeMap<V>, allow_empty: bool) {
    let arena = m.arena();
    let ids = arena.descendants();
    assert_eq!(ids.len(), arena.live(), "every live node must be reachable");
    assert!(arena.root().parent.is_none(), "root has no parent link");

    let mut valued = 0usize;
    for id in ids {
        let node = &arena[id];
        if node.value.is_some() {
            valued += 1;
        }
        if id == NodeId::ROOT {
            continue;
        }

        let (key, parent) = node
            .parent
            .as_ref()
            .expect("non-root node must link to its parent");
        assert_eq!(
            arena.child(*parent, key),
            Some(id),
            "parent link must match the parent's child edge"
        );
        if !allow_empty {
            assert!(!node.is_empty(), "empty node {id:?} survived pruning");
        }
    }
    assert_eq!(valued, m.len(), "valued node count must match len");
}

/// Model key for a raw sequence under `mode`.
fn canonical(mode: KeyMode, keys: &[Key]) -> Vec<Key> {
    match mode {
        KeyMode::Position => keys.to_vec(),
        KeyMode::Value => {
            let mut out = keys.to_vec();
            out.sort_by(Key::total_cmp);
            out.dedup();
            out
        }
    }
}

#[derive(Clone, Copy, Debug, Arbitrary)]
enum ModeChoice {
    Position,
    Value,
}

impl From<ModeChoice> for KeyMode {
    fn from(m: ModeChoice) -> Self {
        match m {
            ModeChoice::Position => KeyMode::Position,
            ModeChoice::Value => KeyMode::Value,
        }
    }
}

#[derive(Clone, Copy, Debug, Arbitrary)]
enum PolicyChoice {
    Never,
    OnDelete,
    EveryDelete(#[proptest(strategy = "1u32..5")] u32),
}

impl From<PolicyChoice> for CleanupPolicy {
    fn from(p: PolicyChoice) -> Self {
        match p {
            PolicyChoice::Never => CleanupPolicy::Never,
            PolicyChoice::OnDelete => CleanupPolicy::OnDelete,
            PolicyChoice::EveryDelete(n) => CleanupPolicy::EveryDelete(n),
        }
    }
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Vec<Key>, u64),
    Remove(Vec<Key>),
    Get(Vec<Key>),
    Cleanup,
}

fn atom_strategy() -> impl Strategy<Value = Key> + Clone {
    // A small domain so paths share prefixes and collide often.
    prop_oneof![
        (0i64..4).prop_map(Key::from),
        "[ab]".prop_map(Key::from),
        any::<bool>().prop_map(Key::from),
        Just(Key::Null),
        prop_oneof![Just(0.5f64), Just(-0.0f64), Just(0.0f64)].prop_map(Key::from),
    ]
}

fn path_strategy() -> impl Strategy<Value = Vec<Key>> + Clone {
    prop::collection::vec(atom_strategy(), 0..=4)
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let path = path_strategy();
    let op = prop_oneof![
        45 => (path.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        30 => path.clone().prop_map(Op::Remove),
        23 => path.clone().prop_map(Op::Get),
        2 => Just(Op::Cleanup),
    ];
    prop::collection::vec(op, 0..=400)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(
        mode in any::<ModeChoice>(),
        policy in any::<PolicyChoice>(),
        ops in ops_strategy(),
    ) {
        let mode = KeyMode::from(mode);
        let policy = CleanupPolicy::from(policy);
        let mut t: CompositeMap<u64> = CompositeMap::with_config(Config { mode, cleanup: policy });
        let mut m: HashMap<Vec<Key>, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(keys, value) => {
                    let old_t = t.insert(&keys, value).unwrap();
                    let old_m = m.insert(canonical(mode, &keys), value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(keys) => {
                    let old_t = t.remove(&keys).unwrap();
                    let old_m = m.remove(&canonical(mode, &keys));
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Get(keys) => {
                    let got_t = t.get(&keys).unwrap().copied();
                    let got_m = m.get(&canonical(mode, &keys)).copied();
                    prop_assert_eq!(got_t, got_m);
                    prop_assert_eq!(t.contains_key(&keys).unwrap(), got_m.is_some());
                }
                Op::Cleanup => {
                    t.cleanup();
                    validate_tree(&t, false);
                }
            }

            prop_assert_eq!(t.len(), m.len());
            validate_tree(&t, policy != CleanupPolicy::OnDelete);
        }

        let got: HashMap<Vec<Key>, u64> = t.iter().map(|(k, v)| (k, *v)).collect();
        prop_assert_eq!(got, m);
    }

    #[test]
    fn prop_value_mode_ignores_order(
        keys in prop::collection::vec(atom_strategy(), 0..=6),
        seed in any::<u64>(),
    ) {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut t: CompositeMap<u8> = CompositeMap::by_value();
        t.insert(&keys, 1).unwrap();

        let mut shuffled = keys.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(t.get(&shuffled).unwrap(), Some(&1));
        prop_assert_eq!(t.len(), 1);
    }

    #[test]
    fn prop_remove_after_insert_restores_root(
        paths in prop::collection::vec(path_strategy(), 1..20),
    ) {
        let mut t: CompositeMap<usize> = CompositeMap::by_position();
        for (i, p) in paths.iter().enumerate() {
            t.insert(p, i).unwrap();
        }
        for p in &paths {
            t.remove(p).unwrap();
        }
        prop_assert!(t.is_empty());
        prop_assert_eq!(t.node_count(), 1);
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
fn exhaustive_ref_order_is_stable() {
    let objs: Vec<Arc<u32>> = (0..4).map(Arc::new).collect();
    let refs: Vec<Key> = objs.iter().map(Key::by_ref).collect();

    let mut t: CompositeMap<u32> = CompositeMap::by_value();
    // First sight fixes the order: objs[2] before objs[0] before the rest.
    t.insert(keys![&objs[2], &objs[0], &objs[1], &objs[3]], 7).unwrap();
    let expected = keys![&objs[2], &objs[0], &objs[1], &objs[3]];

    for_each_permutation(&refs, |perm| {
        assert_eq!(t.get(&perm).unwrap(), Some(&7));
        let with_prims: Vec<Key> = perm.iter().cloned().chain(keys!["p", 1]).collect();
        t.insert(&with_prims, 8).unwrap();
    });

    let mut paths: Vec<Vec<Key>> = t.keys().collect();
    paths.sort_by_key(|p| p.len());
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0], expected);
    assert_eq!(paths[1][..2], keys![1, "p"][..]);
    assert_eq!(paths[1][2..], expected[..]);
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys: Vec<Vec<Key>> = vec![
        keys!["a"],
        keys!["b"],
        keys!["a", "b"],
        keys!["a", "b", "c"],
        keys!["b", "a"],
        keys![],
    ];

    let mut base: CompositeMap<usize> = CompositeMap::by_position();
    for (i, k) in keys.iter().enumerate() {
        base.insert(k, i).unwrap();
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base.clone();
        for k in perm {
            assert!(t.remove(&k).unwrap().is_some());
            validate_tree(&t, false);
        }
        assert!(t.is_empty());
        assert_eq!(t.node_count(), 1);
    });
}

#[test]
fn test_randomized_insert_remove_get() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(2);
    for mode in [KeyMode::Position, KeyMode::Value] {
        let mut t: CompositeMap<u64> = CompositeMap::with_config(Config {
            mode,
            cleanup: CleanupPolicy::EveryDelete(16),
        });
        let mut m: HashMap<Vec<Key>, u64> = HashMap::new();

        for _ in 0..20_000 {
            let op = rng.gen_range(0..100);
            let len = rng.gen_range(0..6);
            let keys: Vec<Key> = (0..len)
                .map(|_| match rng.gen_range(0..3) {
                    0 => Key::from(rng.gen_range(0..8i64)),
                    1 => Key::from(["x", "y", "z"][rng.gen_range(0..3)]),
                    _ => Key::from(rng.gen::<bool>()),
                })
                .collect();

            match op {
                0..=49 => {
                    let v: u64 = rng.gen();
                    assert_eq!(t.insert(&keys, v).unwrap(), m.insert(canonical(mode, &keys), v));
                }
                50..=74 => {
                    assert_eq!(t.remove(&keys).unwrap(), m.remove(&canonical(mode, &keys)));
                }
                _ => {
                    assert_eq!(
                        t.get(&keys).unwrap().copied(),
                        m.get(&canonical(mode, &keys)).copied()
                    );
                }
            }
        }

        assert_eq!(t.len(), m.len());
        validate_tree(&t, true);
        t.cleanup();
        validate_tree(&t, false);
        let got: HashMap<Vec<Key>, u64> = t.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(got, m);
    }
}
