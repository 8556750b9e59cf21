#![forbid(unsafe_code)]

//! Snapshot reconciliation.
//!
//! [`Reconciler`] holds the last applied snapshot and the last message seen
//! per mutex name. Applying a new snapshot yields the client lifecycle diff
//! and the message events that have not fired before.
//!
//! # Invariants
//!
//! - After `apply`, the active pid set equals exactly the set of `owner > 0`
//!   values in the applied snapshot.
//! - A pid produces one `Created` when it appears and one `Destroyed` when it
//!   disappears; nothing in between.
//! - A message fires once per change per mutex name. Re-applying a snapshot
//!   whose messages are unchanged fires nothing, whatever else changed.
//! - A rejected snapshot leaves every piece of state untouched.

use std::collections::{BTreeSet, HashMap};

use crate::snapshot::{MutexState, Pid, Snapshot, SnapshotFormatError};

/// Lifecycle change for a client node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    Created { pid: Pid },
    Destroyed { pid: Pid },
    /// Emitted for every active pid on every apply.
    LockStateUpdated { pid: Pid, locked: bool },
}

impl ClientEvent {
    pub fn pid(&self) -> Pid {
        match *self {
            Self::Created { pid } | Self::Destroyed { pid } | Self::LockStateUpdated { pid, .. } => {
                pid
            }
        }
    }
}

/// A mutex's `last_message` changed to a new non-empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub mutex: String,
    pub owner: Pid,
    pub message: String,
}

/// Everything one apply derived from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub active_pids: BTreeSet<Pid>,
    /// Created (ascending pid), then destroyed, then lock updates.
    pub client_events: Vec<ClientEvent>,
    /// In snapshot order.
    pub messages: Vec<MessageEvent>,
}

impl ReconcileResult {
    pub fn created(&self) -> impl Iterator<Item = Pid> + '_ {
        self.client_events.iter().filter_map(|e| match *e {
            ClientEvent::Created { pid } => Some(pid),
            _ => None,
        })
    }

    pub fn destroyed(&self) -> impl Iterator<Item = Pid> + '_ {
        self.client_events.iter().filter_map(|e| match *e {
            ClientEvent::Destroyed { pid } => Some(pid),
            _ => None,
        })
    }

    /// True when the client set did not change and no message fired.
    pub fn is_quiet(&self) -> bool {
        self.messages.is_empty()
            && self
                .client_events
                .iter()
                .all(|e| matches!(e, ClientEvent::LockStateUpdated { .. }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciler {
    previous: Snapshot,
    active: BTreeSet<Pid>,
    last_message_by_name: HashMap<String, String>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `snapshot` against the previous one and adopt it.
    ///
    /// All-or-nothing: validation runs before any state is touched.
    pub fn apply(&mut self, snapshot: Snapshot) -> Result<ReconcileResult, SnapshotFormatError> {
        snapshot.validate()?;

        let active = snapshot.active_pids();
        let locked: BTreeSet<Pid> = snapshot
            .iter()
            .filter(|m| m.locked)
            .filter_map(MutexState::owner_pid)
            .collect();

        let mut client_events = Vec::with_capacity(active.len() * 2);
        client_events.extend(
            active
                .difference(&self.active)
                .map(|&pid| ClientEvent::Created { pid }),
        );
        client_events.extend(
            self.active
                .difference(&active)
                .map(|&pid| ClientEvent::Destroyed { pid }),
        );
        client_events.extend(active.iter().map(|&pid| ClientEvent::LockStateUpdated {
            pid,
            locked: locked.contains(&pid),
        }));

        let mut messages = Vec::new();
        for mutex in &snapshot {
            if mutex.last_message.is_empty() {
                continue;
            }
            let changed = self
                .last_message_by_name
                .get(&mutex.name)
                .is_none_or(|last| *last != mutex.last_message);
            if changed {
                self.last_message_by_name
                    .insert(mutex.name.clone(), mutex.last_message.clone());
                messages.push(MessageEvent {
                    mutex: mutex.name.clone(),
                    owner: mutex.owner,
                    message: mutex.last_message.clone(),
                });
            }
        }

        tracing::trace!(
            mutexes = snapshot.len(),
            active = active.len(),
            messages = messages.len(),
            "snapshot reconciled"
        );

        self.active = active.clone();
        self.previous = snapshot;

        Ok(ReconcileResult {
            active_pids: active,
            client_events,
            messages,
        })
    }

    pub fn active_pids(&self) -> &BTreeSet<Pid> {
        &self.active
    }

    pub fn is_active(&self, pid: Pid) -> bool {
        self.active.contains(&pid)
    }

    pub fn last_message(&self, mutex: &str) -> Option<&str> {
        self.last_message_by_name.get(mutex).map(String::as_str)
    }

    pub fn previous_snapshot(&self) -> &Snapshot {
        &self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(entries: Vec<MutexState>) -> Snapshot {
        Snapshot::new(entries)
    }

    #[test]
    fn first_apply_creates_every_owner() {
        let mut rec = Reconciler::new();
        let result = rec
            .apply(snap(vec![
                MutexState::new("a").with_owner(20).with_locked(true),
                MutexState::new("b").with_owner(10),
                MutexState::new("c"),
            ]))
            .expect("apply");

        assert_eq!(
            result.client_events,
            vec![
                ClientEvent::Created { pid: 10 },
                ClientEvent::Created { pid: 20 },
                ClientEvent::LockStateUpdated {
                    pid: 10,
                    locked: false
                },
                ClientEvent::LockStateUpdated {
                    pid: 20,
                    locked: true
                },
            ]
        );
        assert!(result.messages.is_empty());
        assert!(rec.is_active(10) && rec.is_active(20));
    }

    #[test]
    fn same_snapshot_twice_is_quiet() {
        let mut rec = Reconciler::new();
        let s = snap(vec![
            MutexState::new("a").with_owner(1).with_message("hi"),
            MutexState::new("b").with_owner(2).with_locked(true),
        ]);
        let first = rec.apply(s.clone()).expect("apply");
        assert!(!first.is_quiet());
        let second = rec.apply(s).expect("apply");
        assert!(second.is_quiet());
        assert_eq!(second.created().count() + second.destroyed().count(), 0);
        assert!(second.messages.is_empty());
    }

    #[test]
    fn message_sequence_fires_once_per_change() {
        let mut rec = Reconciler::new();
        let mut fired = Vec::new();
        for msg in ["", "A", "A", "B"] {
            let result = rec
                .apply(snap(vec![MutexState::new("m").with_owner(5).with_message(msg)]))
                .expect("apply");
            fired.extend(result.messages.into_iter().map(|m| m.message));
        }
        assert_eq!(fired, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(rec.last_message("m"), Some("B"));
    }

    #[test]
    fn unchanged_message_does_not_refire_when_other_fields_change() {
        let mut rec = Reconciler::new();
        rec.apply(snap(vec![MutexState::new("m").with_owner(5).with_message("A")]))
            .expect("apply");
        let result = rec
            .apply(snap(vec![
                MutexState::new("m")
                    .with_owner(6)
                    .with_locked(true)
                    .with_message("A"),
            ]))
            .expect("apply");
        assert!(result.messages.is_empty());
    }

    #[test]
    fn message_cleared_then_repeated_does_not_refire() {
        // An empty message is never recorded, so the last non-empty value
        // stays the comparison point.
        let mut rec = Reconciler::new();
        let mut count = 0;
        for msg in ["A", "", "A"] {
            count += rec
                .apply(snap(vec![MutexState::new("m").with_owner(5).with_message(msg)]))
                .expect("apply")
                .messages
                .len();
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn messages_follow_snapshot_order() {
        let mut rec = Reconciler::new();
        let result = rec
            .apply(snap(vec![
                MutexState::new("z").with_owner(2).with_message("second-name"),
                MutexState::new("a").with_owner(1).with_message("first-name"),
            ]))
            .expect("apply");
        let order: Vec<_> = result.messages.iter().map(|m| m.mutex.as_str()).collect();
        assert_eq!(order, vec!["z", "a"]);
        assert_eq!(result.messages[0].owner, 2);
    }

    #[test]
    fn vanished_pid_is_destroyed_exactly_once() {
        let mut rec = Reconciler::new();
        rec.apply(snap(vec![MutexState::new("a").with_owner(9)]))
            .expect("apply");

        let gone = rec.apply(snap(vec![MutexState::new("a")])).expect("apply");
        assert_eq!(gone.client_events, vec![ClientEvent::Destroyed { pid: 9 }]);

        let still_gone = rec.apply(snap(vec![MutexState::new("a")])).expect("apply");
        assert!(still_gone.client_events.is_empty());

        let back = rec
            .apply(snap(vec![MutexState::new("a").with_owner(9)]))
            .expect("apply");
        assert_eq!(back.created().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn unowned_message_still_recorded() {
        let mut rec = Reconciler::new();
        let result = rec
            .apply(snap(vec![MutexState::new("a").with_owner(-1).with_message("orphan")]))
            .expect("apply");
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].owner, -1);
        assert!(rec.active_pids().is_empty());
    }

    #[test]
    fn rejected_snapshot_leaves_state_intact() {
        let mut rec = Reconciler::new();
        rec.apply(snap(vec![MutexState::new("a").with_owner(1).with_message("x")]))
            .expect("apply");
        let before = rec.clone();

        let bad = snap(vec![
            MutexState::new("b").with_owner(2).with_message("y"),
            MutexState::new("b").with_owner(3),
        ]);
        assert!(rec.apply(bad).is_err());
        assert_eq!(rec, before);
        assert_eq!(rec.last_message("b"), None);
    }
}
