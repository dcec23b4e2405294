use std::collections::HashMap;

use proptest::prelude::*;

use nomina::search::RecencyCache;

#[derive(Debug, Clone)]
enum Op {
    Get(u8),
    Set(u8, u32),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0u8..24).prop_map(Op::Get),
            (0u8..24, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
        ],
        0..200,
    )
}

proptest! {
    #[test]
    fn test_cache_never_exceeds_capacity(capacity in 1usize..16, ops in arb_ops()) {
        let cache = RecencyCache::new(capacity);
        for op in ops {
            match op {
                Op::Get(k) => {
                    let _ = cache.get(&k);
                }
                Op::Set(k, v) => cache.set(k, v),
            }
            prop_assert!(cache.len() <= capacity);
        }
    }

    #[test]
    fn test_cache_hits_return_latest_value(capacity in 1usize..16, ops in arb_ops()) {
        let cache = RecencyCache::new(capacity);
        let mut latest: HashMap<u8, u32> = HashMap::new();
        for op in ops {
            match op {
                Op::Get(k) => {
                    if let Some(value) = cache.get(&k) {
                        prop_assert_eq!(Some(&value), latest.get(&k));
                    }
                }
                Op::Set(k, v) => {
                    cache.set(k, v);
                    latest.insert(k, v);
                }
            }
        }
        let stats = cache.stats();
        prop_assert_eq!(stats.entries, cache.len());
        prop_assert_eq!(stats.capacity, capacity);
    }

    #[test]
    fn test_most_recent_key_survives(capacity in 1usize..16, keys in prop::collection::vec(0u8..64, 1..100)) {
        let cache = RecencyCache::new(capacity);
        for key in &keys {
            cache.set(*key, u32::from(*key));
        }
        let last = *keys.last().unwrap();
        prop_assert_eq!(cache.get(&last), Some(u32::from(last)));
    }
}
