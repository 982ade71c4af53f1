#![cfg(test)]

// Property tests for KeyArray kept inside the crate so the model can be
// checked against internal state after every operation.

use crate::error::KeyArrayError;
use crate::key_array::{KeyArray, Placement};
use proptest::prelude::*;
use std::collections::BTreeMap;

// Key-selecting ops carry a raw index that is reduced modulo the number of
// live keys, so shrinking moves towards the lowest keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(i32),
    Remove(usize),
    RemoveAbsent(usize),
    Mutate(usize, i32),
    Swap(usize, usize),
    IterMut,
    Step,
    Switch,
    EnableGrowth,
    DisableGrowth(bool),
    ToggleQueue,
    DrainQueue,
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => any::<i32>().prop_map(Op::Insert),
        4 => any::<usize>().prop_map(Op::Remove),
        1 => (0usize..64).prop_map(Op::RemoveAbsent),
        2 => (any::<usize>(), -100i32..100).prop_map(|(i, d)| Op::Mutate(i, d)),
        1 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
        1 => Just(Op::IterMut),
        1 => Just(Op::Step),
        1 => Just(Op::Switch),
        1 => Just(Op::EnableGrowth),
        1 => any::<bool>().prop_map(Op::DisableGrowth),
        1 => Just(Op::ToggleQueue),
        1 => Just(Op::DrainQueue),
        1 => Just(Op::Clear),
    ]
}

// Reference model: live entries, the free-key stack, the fresh watermark,
// the range length and the queued values.
struct Model {
    live: BTreeMap<usize, i32>,
    freed: Vec<usize>,
    fresh: usize,
    len: usize,
    growth: bool,
    queue_on: bool,
    queue: Vec<i32>,
}

impl Model {
    fn nth_key(&self, raw: usize) -> Option<usize> {
        if self.live.is_empty() {
            return None;
        }
        self.live.keys().nth(raw % self.live.len()).copied()
    }

    fn is_full(&self) -> bool {
        self.freed.is_empty() && self.fresh == self.len
    }
}

// Property: state-machine equivalence against the model.
// Invariants exercised across random operation sequences:
// - A released key is reissued before any fresh key, most recent first.
// - Values survive any number of growth cycles, manual switches and
//   in-place edits made while a migration is running.
// - With growth off and the queue on, a full range never fails an insert.
// - With growth and queue off, inserts fail exactly when the range is full.
// - `len`/`is_empty`/`contains_key`/`iter` agree with the model after each op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(cap in 1usize..=4, ops in proptest::collection::vec(arb_op(), 1..120)) {
        let mut sut: KeyArray<i32> = KeyArray::with_capacity(cap).unwrap();
        let mut model = Model {
            live: BTreeMap::new(),
            freed: Vec::new(),
            fresh: 0,
            len: cap,
            growth: false,
            queue_on: false,
            queue: Vec::new(),
        };

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let res = sut.insert(v);
                    if model.is_full() {
                        if model.growth {
                            model.len *= 2;
                        } else if model.queue_on {
                            prop_assert_eq!(res, Ok(Placement::Queued));
                            model.queue.push(v);
                            continue;
                        } else {
                            prop_assert_eq!(res, Err(KeyArrayError::Exhausted));
                            continue;
                        }
                    }
                    let expected = match model.freed.pop() {
                        Some(k) => k,
                        None => {
                            model.fresh += 1;
                            model.fresh - 1
                        }
                    };
                    prop_assert_eq!(res, Ok(Placement::Key(expected)));
                    model.live.insert(expected, v);
                }
                Op::Remove(raw) => {
                    if let Some(k) = model.nth_key(raw) {
                        let v = model.live.remove(&k).unwrap();
                        prop_assert_eq!(sut.remove(k), Ok(v));
                        model.freed.push(k);
                    }
                }
                Op::RemoveAbsent(k) => {
                    if !model.live.contains_key(&k) {
                        prop_assert_eq!(sut.remove(k), Err(KeyArrayError::InvalidKey { key: k }));
                    }
                }
                Op::Mutate(raw, d) => {
                    if let Some(k) = model.nth_key(raw) {
                        let v = sut.get_mut(k).expect("live key resolves");
                        *v = v.saturating_add(d);
                        let m = model.live.get_mut(&k).unwrap();
                        *m = m.saturating_add(d);
                    }
                }
                Op::Swap(ra, rb) => {
                    if let (Some(a), Some(b)) = (model.nth_key(ra), model.nth_key(rb)) {
                        sut.swap(a, b).expect("both keys live");
                        let (va, vb) = (model.live[&a], model.live[&b]);
                        model.live.insert(a, vb);
                        model.live.insert(b, va);
                    }
                }
                Op::IterMut => {
                    for (_, v) in sut.iter_mut() {
                        *v = v.wrapping_add(1);
                    }
                    for v in model.live.values_mut() {
                        *v = v.wrapping_add(1);
                    }
                }
                Op::Step => sut.continue_copy_step(),
                Op::Switch => {
                    let ready = model.growth && !sut.is_resizing();
                    let res = sut.switch_to_resized();
                    if ready {
                        prop_assert_eq!(res, Ok(()));
                        model.len *= 2;
                    } else {
                        prop_assert_eq!(res, Err(KeyArrayError::NotReady));
                    }
                }
                Op::EnableGrowth => {
                    prop_assert_eq!(sut.enable_growth(), Ok(()));
                    model.growth = true;
                }
                Op::DisableGrowth(purge) => {
                    sut.disable_growth(purge);
                    model.growth = false;
                }
                Op::ToggleQueue => {
                    if model.queue_on {
                        sut.disable_queue();
                    } else {
                        sut.enable_queue();
                    }
                    model.queue_on = !model.queue_on;
                }
                Op::DrainQueue => {
                    let drained: Vec<i32> = sut.queue_mut().drain().collect();
                    prop_assert_eq!(drained, std::mem::take(&mut model.queue));
                }
                Op::Clear => {
                    sut.clear();
                    model.live.clear();
                    model.freed.clear();
                    model.fresh = 0;
                    model.queue.clear();
                }
            }

            // Post-conditions after each op
            prop_assert_eq!(sut.len(), model.live.len());
            prop_assert_eq!(sut.is_empty(), model.live.is_empty());
            prop_assert_eq!(sut.capacity(), model.len);
            prop_assert_eq!(sut.is_growth_enabled(), model.growth);
            let seen: Vec<(usize, i32)> = sut.iter().map(|(k, v)| (k, *v)).collect();
            let expected: Vec<(usize, i32)> = model.live.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(seen, expected);
            for &k in &model.freed {
                prop_assert!(!sut.contains_key(k));
            }
            let queued: Vec<i32> = sut.queue().iter().copied().collect();
            prop_assert_eq!(&queued, &model.queue);
        }
    }
}

// Property: exhaustion is deterministic. With no fallback exactly
// `high - low + 1` inserts succeed on a fresh container and the next fails.
proptest! {
    #[test]
    fn prop_exhaustion_at_range_size(low in 0usize..1000, len in 1usize..64) {
        let mut sut: KeyArray<usize> = KeyArray::with_range(low, low + len - 1).unwrap();
        for i in 0..len {
            prop_assert_eq!(sut.insert(i), Ok(Placement::Key(low + i)));
        }
        prop_assert_eq!(sut.insert(len), Err(KeyArrayError::Exhausted));
        prop_assert_eq!(sut.len(), len);
    }
}
