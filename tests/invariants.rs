use cpm::{AttributeBag, GroupData, MemoryBag, PropValue};
use proptest::prelude::*;
use std::collections::HashSet;

const KEYS: &[&str] = &["alpha", "Beta", "gamma", "delta", "_hidden", "eps"];
const GROUPS: &[&str] = &["", "Lighting", "Shading", "misc"];

#[derive(Debug, Clone)]
enum Op {
    Regroup { key: usize, group: usize },
    Rename { key: usize, to: usize },
    Remove { key: usize },
    Add { key: usize },
    RemoveGroup { group: usize },
    Verify,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..KEYS.len(), 0..GROUPS.len()).prop_map(|(key, group)| Op::Regroup { key, group }),
        (0..KEYS.len(), 0..KEYS.len()).prop_map(|(key, to)| Op::Rename { key, to }),
        (0..KEYS.len()).prop_map(|key| Op::Remove { key }),
        (0..KEYS.len()).prop_map(|key| Op::Add { key }),
        (0..GROUPS.len()).prop_map(|group| Op::RemoveGroup { group }),
        Just(Op::Verify),
    ]
}

/// Every classified key, in store order.
fn classified(data: &GroupData) -> Vec<String> {
    data.groups()
        .flat_map(|(_, props)| props.iter().cloned())
        .chain(data.ungrouped().iter().cloned())
        .collect()
}

fn apply(data: &mut GroupData, bag: &mut MemoryBag, op: &Op) {
    match *op {
        Op::Regroup { key, group } => data.update_property_group(KEYS[key], GROUPS[group]),
        Op::Rename { key, to } => {
            if data
                .update_property_name(&*bag, KEYS[key], KEYS[to])
                .is_ok()
                && key != to
                && let Ok(value) = bag.remove(KEYS[key])
            {
                let _ = bag.set(KEYS[to], value);
            }
        }
        Op::Remove { key } => {
            let _ = bag.remove(KEYS[key]);
        }
        Op::Add { key } => {
            let _ = bag.set(KEYS[key], PropValue::Int(key as i64));
        }
        Op::RemoveGroup { group } => {
            data.remove_group(GROUPS[group]);
        }
        Op::Verify => data.verify(&*bag),
    }
}

proptest! {
    #[test]
    fn a_key_is_classified_at_most_once(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut bag = MemoryBag::new(1, "Cube")
            .with("alpha", PropValue::Int(0))
            .with("Beta", PropValue::Int(1));
        let mut data = GroupData::new();
        data.verify(&bag);

        for op in &ops {
            apply(&mut data, &mut bag, op);
            let keys = classified(&data);
            let unique: HashSet<&String> = keys.iter().collect();
            prop_assert_eq!(unique.len(), keys.len(), "after {:?}: {:?}", op, keys);
            prop_assert!(data.groups().all(|(_, props)| !props.is_empty()));
        }
    }

    #[test]
    fn verify_matches_bag_and_is_idempotent(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut bag = MemoryBag::new(1, "Cube");
        let mut data = GroupData::new();
        for op in &ops {
            apply(&mut data, &mut bag, op);
        }

        data.verify(&bag);
        let once = data.clone();
        data.verify(&bag);
        prop_assert_eq!(&data, &once);

        let mut expected: Vec<String> = bag
            .keys()
            .into_iter()
            .filter(|k| !k.starts_with('_'))
            .collect();
        let mut keys = classified(&data);
        expected.sort();
        keys.sort();
        prop_assert_eq!(keys, expected);
    }

    #[test]
    fn serialized_store_loads_back_equal(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let mut bag = MemoryBag::new(1, "Cube");
        let mut data = GroupData::new();
        for op in &ops {
            apply(&mut data, &mut bag, op);
        }

        let json = data.to_json().expect("serialize");
        let back = GroupData::from_json(&json).expect("parse");
        prop_assert_eq!(back, data);
    }
}
