#![forbid(unsafe_code)]

//! Typed view of the collector's `/mutexes` payload.
//!
//! The wire shape is `{ "mutexes": [ { "name", "locked", "owner",
//! "last_message" }, ... ] }`. Unknown fields are rejected at both levels so
//! a collector speaking a different dialect shows up as a format error
//! rather than as a silently empty display.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Process identifier of a mutex owner. Only values `> 0` name a process.
pub type Pid = i64;

/// Payload did not match the snapshot contract.
///
/// Any of these rejects the whole snapshot; nothing derived from it is applied.
#[derive(Debug, Error)]
pub enum SnapshotFormatError {
    #[error("malformed snapshot payload: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("mutex entry {index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate mutex name in snapshot: {name}")]
    DuplicateName { name: String },
}

/// State of one named mutex as reported by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MutexState {
    pub name: String,
    pub locked: bool,
    /// `0`, negative, absent, or `null` all mean unowned.
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: Pid,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_message: String,
}

impl MutexState {
    /// An unlocked, unowned mutex with no message.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locked: false,
            owner: 0,
            last_message: String::new(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Pid) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.last_message = message.into();
        self
    }

    /// The owning pid, if the mutex is owned at all.
    #[inline]
    pub fn owner_pid(&self) -> Option<Pid> {
        (self.owner > 0).then_some(self.owner)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One complete, atomically fetched listing of all mutex states.
///
/// Serializes to and from the wire envelope directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub mutexes: Vec<MutexState>,
}

impl Snapshot {
    pub fn new(mutexes: Vec<MutexState>) -> Self {
        Self { mutexes }
    }

    /// Decode and validate a JSON body.
    pub fn from_json_str(body: &str) -> Result<Self, SnapshotFormatError> {
        let snapshot: Self = serde_json::from_str(body)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Decode and validate an already-parsed JSON document.
    pub fn from_value(value: serde_json::Value) -> Result<Self, SnapshotFormatError> {
        let snapshot: Self = serde_json::from_value(value)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check the invariants serde cannot express: names are non-empty and
    /// unique within the snapshot.
    pub fn validate(&self) -> Result<(), SnapshotFormatError> {
        let mut seen = HashSet::with_capacity(self.mutexes.len());
        for (index, mutex) in self.mutexes.iter().enumerate() {
            if mutex.name.is_empty() {
                return Err(SnapshotFormatError::EmptyName { index });
            }
            if !seen.insert(mutex.name.as_str()) {
                return Err(SnapshotFormatError::DuplicateName {
                    name: mutex.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MutexState> {
        self.mutexes.iter()
    }

    pub fn len(&self) -> usize {
        self.mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutexes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MutexState> {
        self.mutexes.iter().find(|m| m.name == name)
    }

    /// Distinct owning pids (`owner > 0`), ascending.
    pub fn active_pids(&self) -> BTreeSet<Pid> {
        self.mutexes.iter().filter_map(MutexState::owner_pid).collect()
    }

    /// True iff some mutex owned by `pid` is currently locked.
    pub fn is_pid_locked(&self, pid: Pid) -> bool {
        pid > 0 && self.mutexes.iter().any(|m| m.owner == pid && m.locked)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a MutexState;
    type IntoIter = std::slice::Iter<'a, MutexState>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutexes.iter()
    }
}
