//! Property tests for the window budget invariants.

use std::sync::Arc;
use std::time::Duration;

use gatekeeper::ratelimit::{
    AdmissionResult, BudgetPolicy, ClientIdentity, CounterStore, InMemoryCounterStore, ManualClock,
    RequestCost, WindowAccounting, WindowKey,
};
use proptest::prelude::*;

fn key() -> WindowKey {
    WindowKey::for_identity("prop", &ClientIdentity::credential("client"))
}

fn limit_and_costs() -> impl Strategy<Value = (u64, Vec<u64>)> {
    (1u64..=50).prop_flat_map(|limit| (Just(limit), prop::collection::vec(1..=limit, 1..80)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Granted cost within one window never exceeds the limit, and the stored
    /// count always equals what was granted.
    #[test]
    fn granted_cost_is_bounded((limit, costs) in limit_and_costs()) {
        let (granted, stored) = tokio_test::block_on(async {
            let store = Arc::new(InMemoryCounterStore::new());
            let accounting = WindowAccounting::new(store.clone());
            let policy = BudgetPolicy::new(limit, 3600).unwrap();
            let key = key();

            let mut granted = 0;
            for units in &costs {
                let result = accounting
                    .charge_and_check(&key, RequestCost::new(*units).unwrap(), &policy)
                    .await
                    .unwrap();
                if let AdmissionResult::Allowed { count, .. } = result {
                    granted += units;
                    assert_eq!(count, granted);
                }
            }
            (granted, store.get(&key).await.unwrap().unwrap_or(0))
        });

        prop_assert!(granted <= limit);
        prop_assert_eq!(granted, stored);
    }

    /// The same bound holds when charges race on a multi-threaded runtime.
    #[test]
    fn concurrent_granted_cost_is_bounded((limit, costs) in limit_and_costs()) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let (granted, stored) = runtime.block_on(async {
            let store = Arc::new(InMemoryCounterStore::new());
            let accounting = WindowAccounting::new(store.clone());
            let policy = BudgetPolicy::new(limit, 3600).unwrap();

            let tasks: Vec<_> = costs
                .iter()
                .map(move |&units| {
                    let accounting = accounting.clone();
                    tokio::spawn(async move {
                        let result = accounting
                            .charge_and_check(&key(), RequestCost::new(units).unwrap(), &policy)
                            .await
                            .unwrap();
                        if result.is_allowed() { units } else { 0 }
                    })
                })
                .collect();

            let granted: u64 = futures::future::join_all(tasks)
                .await
                .into_iter()
                .map(|joined| joined.unwrap())
                .sum();
            (granted, store.get(&key()).await.unwrap().unwrap_or(0))
        });

        prop_assert!(granted <= limit);
        prop_assert_eq!(granted, stored);
    }

    /// After expiry the next charge starts a fresh window holding exactly its cost.
    #[test]
    fn expiry_resets_to_single_charge(
        (limit, first, second) in (1u64..=20).prop_flat_map(|limit| (Just(limit), 1..=limit, 1..=limit))
    ) {
        let result = tokio_test::block_on(async {
            let clock = ManualClock::default();
            let store = Arc::new(InMemoryCounterStore::with_clock(Arc::new(clock.clone())));
            let accounting = WindowAccounting::new(store.clone());
            let policy = BudgetPolicy::new(limit, 30).unwrap();

            accounting
                .charge_and_check(&key(), RequestCost::new(first).unwrap(), &policy)
                .await
                .unwrap();
            clock.advance(Duration::from_secs(30));
            accounting
                .charge_and_check(&key(), RequestCost::new(second).unwrap(), &policy)
                .await
                .unwrap()
        });

        prop_assert_eq!(result, AdmissionResult::Allowed { count: second, limit });
    }

    /// Retry hints stay within the window.
    #[test]
    fn retry_after_within_window(
        (window, elapsed) in (1u64..=600).prop_flat_map(|window| (Just(window), 0..window))
    ) {
        let result = tokio_test::block_on(async {
            let clock = ManualClock::default();
            let store = Arc::new(InMemoryCounterStore::with_clock(Arc::new(clock.clone())));
            let accounting = WindowAccounting::new(store);
            let policy = BudgetPolicy::new(1, window).unwrap();
            let one = RequestCost::new(1).unwrap();

            accounting.charge_and_check(&key(), one, &policy).await.unwrap();
            clock.advance(Duration::from_secs(elapsed));
            accounting.charge_and_check(&key(), one, &policy).await.unwrap()
        });

        prop_assert_eq!(result.retry_after_seconds(), Some(window - elapsed));
    }
}
