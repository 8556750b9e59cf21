//! Keyboard and terminal events while the full-screen view owns the terminal.
//!
//! The full-screen renderer puts the terminal in raw mode, so typed keys are
//! neither echoed nor turned into signals by the tty. This subscription reads
//! them through `crossterm` instead: Ctrl-C, `q` and Esc quit, and resize
//! events carry the new size.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use mutexmon_runtime::{Msg, MsgSink, StopSignal, SubId, Subscription, Viewport};

const INPUT_SUB_ID: SubId = 0x4B45_5953;

/// Upper bound on how long a stop request waits for the reader.
const POLL: Duration = Duration::from_millis(50);

/// Map one terminal event to a message.
pub fn message_for(event: &Event) -> Option<Msg> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Msg::Quit),
            KeyCode::Char('q') | KeyCode::Esc => Some(Msg::Quit),
            _ => None,
        },
        Event::Resize(width, height) => Some(Msg::Resize(Viewport::new(*width, *height))),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct InputSubscription;

impl InputSubscription {
    pub fn new() -> Self {
        Self
    }
}

impl Subscription for InputSubscription {
    fn id(&self) -> SubId {
        INPUT_SUB_ID
    }

    fn run(&self, sink: MsgSink, stop: StopSignal) {
        while !stop.is_stopped() {
            let ready = match event::poll(POLL) {
                Ok(ready) => ready,
                Err(error) => {
                    tracing::warn!(%error, "cannot poll terminal input");
                    return;
                }
            };
            if !ready {
                continue;
            }
            let event = match event::read() {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(%error, "cannot read terminal input");
                    return;
                }
            };
            tracing::trace!(?event, "terminal event");
            let Some(msg) = message_for(&event) else {
                continue;
            };
            if !sink.send(msg) {
                return;
            }
        }
    }
}
