#![forbid(unsafe_code)]

//! The monitor's derived state and the three things that can happen to it:
//! a poll tick, a resize, and an indicator deadline.
//!
//! [`Monitor`] is the single owner of the reconciler, the live indicator set,
//! and the pid → node handle map. Every operation takes the renderer and the
//! current time explicitly; there is no ambient state.
//!
//! # Tick order
//!
//! 1. Reconcile the snapshot (rejected snapshot: stop here).
//! 2. Apply client events: create, destroy, lock state.
//! 3. Refresh the mutex list.
//! 4. Expire due indicators.
//! 5. Spawn one indicator per message event.
//! 6. Recompute every live layout and present.
//!
//! Client events go first so that a client whose first message arrives in
//! the snapshot that introduces it still gets its indicator.

use std::collections::{BTreeMap, BTreeSet};

use mutexmon_core::{
    ClientEvent, Indicator, IndicatorManager, MessageEvent, Pid, ReconcileResult, Reconciler,
    Snapshot, SpawnError, compute_indicator_layout,
};

use crate::config::MonitorConfig;
use crate::fetch::FetchError;
use crate::render::{NodeHandle, Renderer, Viewport};

/// What one poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Applied {
        created: usize,
        destroyed: usize,
        spawned: usize,
        dropped: usize,
    },
    /// Transport or decode failure; nothing changed.
    FetchFailed,
    /// Payload did not match the snapshot contract; nothing changed.
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub ticks: u64,
    pub applied: u64,
    pub fetch_failures: u64,
    pub rejected: u64,
    pub spawned: u64,
    pub dropped_unknown_client: u64,
    pub expired: u64,
    pub resizes: u64,
}

#[derive(Debug, Clone)]
pub struct Monitor {
    reconciler: Reconciler,
    indicators: IndicatorManager,
    nodes: BTreeMap<Pid, NodeHandle>,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            reconciler: Reconciler::new(),
            indicators: IndicatorManager::new(config.indicator_config()),
            nodes: BTreeMap::new(),
            stats: MonitorStats::default(),
        }
    }

    /// Handle one poll tick's fetch result.
    pub fn on_tick<R>(
        &mut self,
        fetched: Result<Snapshot, FetchError>,
        now_ms: u64,
        renderer: &mut R,
    ) -> TickOutcome
    where
        R: Renderer + ?Sized,
    {
        self.stats.ticks += 1;

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(FetchError::Format(error)) => {
                self.stats.rejected += 1;
                tracing::warn!(%error, "snapshot rejected; keeping last known state");
                return TickOutcome::Rejected;
            }
            Err(error) => {
                self.stats.fetch_failures += 1;
                tracing::warn!(%error, "snapshot fetch failed; keeping last known state");
                return TickOutcome::FetchFailed;
            }
        };

        let result = match self.reconciler.apply(snapshot) {
            Ok(result) => result,
            Err(error) => {
                self.stats.rejected += 1;
                tracing::warn!(%error, "snapshot rejected; keeping last known state");
                return TickOutcome::Rejected;
            }
        };
        self.stats.applied += 1;

        self.apply_client_events(&result, renderer);
        renderer.show_mutexes(self.reconciler.previous_snapshot());
        self.expire(now_ms, renderer);

        let mut spawned = 0;
        let mut dropped = 0;
        for event in &result.messages {
            match self.spawn(event, now_ms, renderer) {
                Ok(()) => spawned += 1,
                Err(SpawnError::UnknownClient { pid }) => {
                    dropped += 1;
                    self.stats.dropped_unknown_client += 1;
                    tracing::warn!(pid, mutex = %event.mutex, "no client node for message; dropped");
                }
            }
        }

        self.relayout(renderer);
        present(renderer);

        TickOutcome::Applied {
            created: result.created().count(),
            destroyed: result.destroyed().count(),
            spawned,
            dropped,
        }
    }

    /// Viewport changed: let the renderer reflow, then re-anchor indicators.
    pub fn on_resize<R>(&mut self, viewport: Viewport, now_ms: u64, renderer: &mut R)
    where
        R: Renderer + ?Sized,
    {
        self.stats.resizes += 1;
        tracing::debug!(width = viewport.width, height = viewport.height, "viewport resized");
        renderer.resize(viewport);
        self.expire(now_ms, renderer);
        self.relayout(renderer);
        present(renderer);
    }

    /// An indicator deadline passed between ticks.
    pub fn on_deadline<R>(&mut self, now_ms: u64, renderer: &mut R)
    where
        R: Renderer + ?Sized,
    {
        if self.expire(now_ms, renderer) > 0 {
            present(renderer);
        }
    }

    /// Recompute the layout of every live indicator whose client node exists.
    ///
    /// Indicators whose node is gone keep their last layout until they
    /// expire. Returns the number of indicators placed.
    pub fn relayout<R>(&mut self, renderer: &mut R) -> usize
    where
        R: Renderer + ?Sized,
    {
        let Some(server) = renderer.server_rect() else {
            return 0;
        };

        let mut placed = 0;
        for indicator in self.indicators.live_mut() {
            let Some(&node) = self.nodes.get(&indicator.pid) else {
                continue;
            };
            let Some(client) = renderer.client_rect(node) else {
                continue;
            };
            let layout = compute_indicator_layout(server, client);
            indicator.layout = Some(layout);
            renderer.place_anchor(indicator.anchor, &layout);
            placed += 1;
        }
        placed
    }

    pub fn active_pids(&self) -> &BTreeSet<Pid> {
        self.reconciler.active_pids()
    }

    pub fn node(&self, pid: Pid) -> Option<NodeHandle> {
        self.nodes.get(&pid).copied()
    }

    pub fn live_indicators(&self) -> &[Indicator] {
        self.indicators.live()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.indicators.next_expiry()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    fn apply_client_events<R>(&mut self, result: &ReconcileResult, renderer: &mut R)
    where
        R: Renderer + ?Sized,
    {
        for event in &result.client_events {
            match *event {
                ClientEvent::Created { pid } => {
                    if self.nodes.contains_key(&pid) {
                        continue;
                    }
                    let node = renderer.create_client_node(pid);
                    self.nodes.insert(pid, node);
                    tracing::debug!(pid, "client node created");
                }
                ClientEvent::Destroyed { pid } => {
                    if let Some(node) = self.nodes.remove(&pid) {
                        renderer.remove_client_node(node);
                        tracing::debug!(pid, "client node destroyed");
                    }
                }
                ClientEvent::LockStateUpdated { pid, locked } => {
                    if let Some(&node) = self.nodes.get(&pid) {
                        renderer.set_client_locked(node, locked);
                    }
                }
            }
        }
    }

    fn spawn<R>(&mut self, event: &MessageEvent, now_ms: u64, renderer: &mut R) -> Result<(), SpawnError>
    where
        R: Renderer + ?Sized,
    {
        let pid = event.owner;
        let indicator = self.indicators.spawn(
            pid,
            &event.message,
            now_ms,
            self.reconciler.active_pids(),
            |label| renderer.create_anchor(pid, label),
        )?;
        self.stats.spawned += 1;
        tracing::info!(pid, id = indicator.id.0, message = %event.message, "showing message");
        Ok(())
    }

    fn expire<R>(&mut self, now_ms: u64, renderer: &mut R) -> usize
    where
        R: Renderer + ?Sized,
    {
        let expired = self.indicators.expire(now_ms);
        for indicator in &expired {
            renderer.remove_anchor(indicator.anchor);
            tracing::trace!(pid = indicator.pid, id = indicator.id.0, "indicator expired");
        }
        self.stats.expired += expired.len() as u64;
        expired.len()
    }
}

fn present<R: Renderer + ?Sized>(renderer: &mut R) {
    if let Err(error) = renderer.present() {
        tracing::error!(%error, "renderer failed to present frame");
    }
}
