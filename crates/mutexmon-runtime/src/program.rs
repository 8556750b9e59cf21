#![forbid(unsafe_code)]

//! Serialized event loop.
//!
//! Poll ticks and resize notifications arrive from independent
//! subscriptions but are handled strictly one after another on the thread
//! that calls [`Program::run`]. The fetch happens inline on that thread, so
//! two fetches never overlap; ticks that pile up behind a slow fetch are
//! coalesced into one.
//!
//! Between messages the loop sleeps no longer than the next indicator
//! deadline, so indicators disappear on time even with a long poll interval.

use std::time::Duration;

use crate::clock::Clock;
use crate::fetch::SnapshotSource;
use crate::monitor::{Monitor, MonitorStats, TickOutcome};
use crate::render::{Renderer, Viewport};
use crate::subscription::{Inbox, Subscription, Wait};

/// Messages that drive the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Tick,
    Resize(Viewport),
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct ProgramConfig {
    /// Poll once before waiting for the first tick.
    pub tick_on_start: bool,
    /// Stop after this many poll ticks.
    pub max_ticks: Option<u64>,
}

/// Collapse a batch of queued messages.
///
/// Everything after a `Quit` is dropped. Runs of ticks become one tick,
/// runs of resizes keep only the latest viewport.
pub fn coalesce(batch: Vec<Msg>) -> Vec<Msg> {
    let mut out: Vec<Msg> = Vec::with_capacity(batch.len());
    for msg in batch {
        if msg == Msg::Quit {
            out.push(Msg::Quit);
            break;
        }
        let merged = match (out.last_mut(), msg) {
            (Some(Msg::Tick), Msg::Tick) => true,
            (Some(Msg::Resize(last)), Msg::Resize(next)) => {
                *last = next;
                true
            }
            _ => false,
        };
        if !merged {
            out.push(msg);
        }
    }
    out
}

pub struct Program<S, R, C> {
    monitor: Monitor,
    source: S,
    renderer: R,
    clock: C,
    config: ProgramConfig,
}

impl<S, R, C> Program<S, R, C>
where
    S: SnapshotSource,
    R: Renderer,
    C: Clock,
{
    pub fn new(monitor: Monitor, source: S, renderer: R, clock: C, config: ProgramConfig) -> Self {
        Self {
            monitor,
            source,
            renderer,
            clock,
            config,
        }
    }

    /// Run until a `Quit` message, the tick limit, or every subscription
    /// has finished.
    pub fn run(&mut self, subscriptions: Vec<Box<dyn Subscription>>) -> MonitorStats {
        let inbox = Inbox::start(subscriptions);

        if self.config.tick_on_start && !self.handle(Msg::Tick) {
            return self.finish(inbox);
        }

        loop {
            let first = match inbox.wait(self.wait_budget()) {
                Wait::Msg(msg) => msg,
                Wait::TimedOut => {
                    let now = self.clock.now_ms();
                    self.monitor.on_deadline(now, &mut self.renderer);
                    continue;
                }
                Wait::Closed => {
                    tracing::debug!("all subscriptions finished");
                    break;
                }
            };

            let mut batch = vec![first];
            batch.extend(inbox.pending());
            if coalesce(batch).into_iter().any(|msg| !self.handle(msg)) {
                break;
            }
        }

        self.finish(inbox)
    }

    /// Handle one message. Returns `false` when the loop should stop.
    pub fn handle(&mut self, msg: Msg) -> bool {
        let now = self.clock.now_ms();
        match msg {
            Msg::Tick => {
                let fetched = self.source.fetch();
                let outcome = self.monitor.on_tick(fetched, now, &mut self.renderer);
                if let TickOutcome::Applied {
                    created,
                    destroyed,
                    spawned,
                    ..
                } = outcome
                {
                    tracing::trace!(created, destroyed, spawned, "poll tick applied");
                }
                match self.config.max_ticks {
                    Some(max) => self.monitor.stats().ticks < max,
                    None => true,
                }
            }
            Msg::Resize(viewport) => {
                self.monitor.on_resize(viewport, now, &mut self.renderer);
                true
            }
            Msg::Quit => false,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn wait_budget(&self) -> Option<Duration> {
        let deadline = self.monitor.next_deadline()?;
        Some(Duration::from_millis(
            deadline.saturating_sub(self.clock.now_ms()),
        ))
    }

    fn finish(&self, mut inbox: Inbox) -> MonitorStats {
        inbox.shutdown();
        let stats = self.monitor.stats();
        tracing::debug!(
            ticks = stats.ticks,
            fetch_failures = stats.fetch_failures,
            rejected = stats.rejected,
            spawned = stats.spawned,
            "program finished"
        );
        stats
    }
}
