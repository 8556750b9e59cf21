#![forbid(unsafe_code)]

//! Trigger sources for the poll pipeline.
//!
//! A subscription runs on a worker thread of its own and pushes [`Msg`]s
//! into the program's inbox. Only the program thread reads the inbox, so
//! triggers from the poll ticker and from resize notifications are handled
//! one at a time no matter how they interleave.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::program::Msg;

pub type SubId = u64;

/// Sending side of the inbox, one clone per subscription.
#[derive(Debug, Clone)]
pub struct MsgSink {
    tx: mpsc::Sender<Msg>,
}

impl MsgSink {
    /// Returns `false` once the program has gone away.
    pub fn send(&self, msg: Msg) -> bool {
        self.tx.send(msg).is_ok()
    }
}

pub trait Subscription: Send {
    /// Two subscriptions with the same id are the same source; only the
    /// first one started runs.
    fn id(&self) -> SubId;

    /// Produce messages until `stop` fires or `sink` reports the program gone.
    fn run(&self, sink: MsgSink, stop: StopSignal);
}

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// One-way stop flag shared between the program and a worker.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    state: Arc<StopState>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self
            .state
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`, waking early on stop. Returns `true` if stopped.
    pub fn sleep(&self, timeout: Duration) -> bool {
        let guard = self
            .state
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .state
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    pub(crate) fn stop(&self) {
        let mut stopped = self
            .state
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.state.wake.notify_all();
    }
}

struct Worker {
    id: SubId,
    stop: StopSignal,
    handle: JoinHandle<()>,
}

/// What waiting on the inbox produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    Msg(Msg),
    TimedOut,
    Closed,
}

/// The program's message queue and the workers feeding it.
///
/// Only the workers hold senders, so the inbox reports [`Wait::Closed`] once
/// every source has finished and its messages have been read.
pub(crate) struct Inbox {
    rx: mpsc::Receiver<Msg>,
    workers: Vec<Worker>,
}

impl Inbox {
    pub(crate) fn start(subscriptions: Vec<Box<dyn Subscription>>) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut workers: Vec<Worker> = Vec::new();

        for sub in subscriptions {
            let id = sub.id();
            if workers.iter().any(|w| w.id == id) {
                tracing::debug!(sub_id = id, "subscription already running");
                continue;
            }

            let stop = StopSignal::default();
            let sink = MsgSink { tx: tx.clone() };
            let worker_stop = stop.clone();
            let spawned = thread::Builder::new()
                .name(format!("mutexmon-sub-{id:x}"))
                .spawn(move || sub.run(sink, worker_stop));

            match spawned {
                Ok(handle) => {
                    tracing::debug!(sub_id = id, "subscription started");
                    workers.push(Worker { id, stop, handle });
                }
                Err(error) => {
                    tracing::error!(sub_id = id, %error, "cannot start subscription thread");
                }
            }
        }

        Self { rx, workers }
    }

    /// Block for the next message, or at most `timeout` when given.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Wait {
        match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(msg) => Wait::Msg(msg),
                Err(RecvTimeoutError::Timeout) => Wait::TimedOut,
                Err(RecvTimeoutError::Disconnected) => Wait::Closed,
            },
            None => self.rx.recv().map_or(Wait::Closed, Wait::Msg),
        }
    }

    /// Messages already queued, without blocking.
    pub(crate) fn pending(&self) -> Vec<Msg> {
        self.rx.try_iter().collect()
    }

    /// Stop every worker, then join them.
    pub(crate) fn shutdown(&mut self) {
        for worker in &self.workers {
            worker.stop.stop();
        }
        for worker in self.workers.drain(..) {
            if worker.handle.join().is_err() {
                tracing::warn!(sub_id = worker.id, "subscription thread panicked");
            }
        }
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sends [`Msg::Tick`] at a fixed interval.
///
/// The interval never stretches: a failed or slow fetch does not push the
/// next tick back, it only gets coalesced with it.
#[derive(Debug, Clone)]
pub struct PollTicker {
    interval: Duration,
}

impl PollTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Subscription for PollTicker {
    fn id(&self) -> SubId {
        // One ticker per interval.
        u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX) | 1 << 63
    }

    fn run(&self, sink: MsgSink, stop: StopSignal) {
        while !stop.sleep(self.interval) {
            if !sink.send(Msg::Tick) {
                break;
            }
        }
    }
}

/// Sends a fixed list of messages as soon as it starts.
#[derive(Debug, Clone)]
pub struct ScriptedSubscription {
    id: SubId,
    script: Vec<Msg>,
}

impl ScriptedSubscription {
    pub fn new(id: SubId, script: Vec<Msg>) -> Self {
        Self { id, script }
    }
}

impl Subscription for ScriptedSubscription {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sink: MsgSink, _stop: StopSignal) {
        for &msg in &self.script {
            if !sink.send(msg) {
                return;
            }
        }
    }
}
