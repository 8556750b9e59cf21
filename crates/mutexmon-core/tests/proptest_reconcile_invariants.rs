//! Property-based invariant tests for snapshot reconciliation.
//!
//! ## Invariants
//!
//! 1. Client set equality: after apply, active pids == {owner > 0 in snapshot}
//! 2. Lifecycle balance: replaying created/destroyed events reproduces the set
//! 3. Idempotence: applying the same snapshot twice is quiet the second time
//! 4. Message uniqueness: one event per change per mutex name
//! 5. Lock state: every active pid gets exactly one lock update per apply

use std::collections::{BTreeSet, HashMap};

use mutexmon_core::{ClientEvent, MutexState, Pid, Reconciler, Snapshot};
use proptest::prelude::*;

// ── Strategies ────────────────────────────────────────────────────────────

fn arb_mutex(name: String) -> impl Strategy<Value = MutexState> {
    (-1i64..6, any::<bool>(), prop::sample::select(vec!["", "A", "B", "C"])).prop_map(
        move |(owner, locked, message)| {
            MutexState::new(name.clone())
                .with_owner(owner)
                .with_locked(locked)
                .with_message(message)
        },
    )
}

/// Snapshots over a small fixed name pool so names recur across applies.
fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::sample::subsequence(vec!["m0", "m1", "m2", "m3", "m4"], 0..=5)
        .prop_flat_map(|names| {
            names
                .into_iter()
                .map(|n| arb_mutex(n.to_string()))
                .collect::<Vec<_>>()
        })
        .prop_map(Snapshot::new)
}

fn arb_sequence() -> impl Strategy<Value = Vec<Snapshot>> {
    prop::collection::vec(arb_snapshot(), 1..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn active_set_matches_snapshot_owners(seq in arb_sequence()) {
        let mut rec = Reconciler::new();
        for snapshot in seq {
            let expected: BTreeSet<Pid> = snapshot
                .iter()
                .filter(|m| m.owner > 0)
                .map(|m| m.owner)
                .collect();
            let result = rec.apply(snapshot).unwrap();
            prop_assert_eq!(&result.active_pids, &expected);
            prop_assert_eq!(rec.active_pids(), &expected);
        }
    }

    #[test]
    fn lifecycle_events_replay_to_active_set(seq in arb_sequence()) {
        let mut rec = Reconciler::new();
        let mut nodes: BTreeSet<Pid> = BTreeSet::new();
        for snapshot in seq {
            let result = rec.apply(snapshot).unwrap();
            for event in &result.client_events {
                match *event {
                    ClientEvent::Created { pid } => prop_assert!(nodes.insert(pid), "duplicate node {}", pid),
                    ClientEvent::Destroyed { pid } => prop_assert!(nodes.remove(&pid), "orphan destroy {}", pid),
                    ClientEvent::LockStateUpdated { pid, .. } => prop_assert!(nodes.contains(&pid)),
                }
            }
            prop_assert_eq!(&nodes, rec.active_pids());
        }
    }

    #[test]
    fn reapply_is_quiet(seq in arb_sequence()) {
        let mut rec = Reconciler::new();
        for snapshot in seq {
            rec.apply(snapshot.clone()).unwrap();
            let again = rec.apply(snapshot).unwrap();
            prop_assert!(again.is_quiet());
            prop_assert!(again.messages.is_empty());
        }
    }

    #[test]
    fn messages_fire_once_per_change(seq in arb_sequence()) {
        let mut rec = Reconciler::new();
        let mut model: HashMap<String, String> = HashMap::new();
        for snapshot in seq {
            let mut expected = Vec::new();
            for m in &snapshot {
                if !m.last_message.is_empty() && model.get(&m.name) != Some(&m.last_message) {
                    model.insert(m.name.clone(), m.last_message.clone());
                    expected.push((m.name.clone(), m.last_message.clone()));
                }
            }
            let result = rec.apply(snapshot).unwrap();
            let fired: Vec<_> = result
                .messages
                .into_iter()
                .map(|e| (e.mutex, e.message))
                .collect();
            prop_assert_eq!(fired, expected);
        }
    }

    #[test]
    fn one_lock_update_per_active_pid(snapshot in arb_snapshot()) {
        let mut rec = Reconciler::new();
        let result = rec.apply(snapshot.clone()).unwrap();
        let updates: Vec<(Pid, bool)> = result
            .client_events
            .iter()
            .filter_map(|e| match *e {
                ClientEvent::LockStateUpdated { pid, locked } => Some((pid, locked)),
                _ => None,
            })
            .collect();
        prop_assert_eq!(updates.len(), result.active_pids.len());
        for (pid, locked) in updates {
            prop_assert_eq!(locked, snapshot.is_pid_locked(pid));
        }
    }
}
