//! Resize and termination signals as program messages.
//!
//! `SIGWINCH` becomes [`Msg::Resize`] with the terminal size read through
//! `crossterm`; `SIGINT` and `SIGTERM` become [`Msg::Quit`], so the program
//! leaves the alternate screen through its normal shutdown path.

use std::time::Duration;

use mutexmon_runtime::{Msg, MsgSink, StopSignal, SubId, Subscription, Viewport};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::Signals;

const SIGNAL_SUB_ID: SubId = 0x5349_474E;

/// How often pending signals are checked.
const POLL: Duration = Duration::from_millis(50);

pub fn terminal_viewport() -> Option<Viewport> {
    match crossterm::terminal::size() {
        Ok((width, height)) => Some(Viewport::new(width, height)),
        Err(error) => {
            tracing::warn!(%error, "cannot read terminal size");
            None
        }
    }
}

/// Map one delivered signal to a message.
pub fn message_for(signal: i32, size: impl FnOnce() -> Option<Viewport>) -> Option<Msg> {
    match signal {
        SIGWINCH => size().map(Msg::Resize),
        SIGINT | SIGTERM => Some(Msg::Quit),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct SignalSubscription;

impl SignalSubscription {
    pub fn new() -> Self {
        Self
    }
}

impl Subscription for SignalSubscription {
    fn id(&self) -> SubId {
        SIGNAL_SUB_ID
    }

    fn run(&self, sink: MsgSink, stop: StopSignal) {
        let mut signals = match Signals::new([SIGINT, SIGTERM, SIGWINCH]) {
            Ok(signals) => signals,
            Err(error) => {
                tracing::error!(%error, "cannot install signal handlers");
                return;
            }
        };

        loop {
            for signal in signals.pending() {
                tracing::debug!(signal, "signal received");
                let Some(msg) = message_for(signal, terminal_viewport) else {
                    continue;
                };
                if !sink.send(msg) {
                    return;
                }
            }
            if stop.sleep(POLL) {
                break;
            }
        }
        signals.handle().close();
    }
}
