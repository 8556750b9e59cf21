//! Line-oriented renderer for pipes, logs, and dumb terminals.
//!
//! Prints one line per client or message event, and the mutex table
//! whenever its contents change. Nothing is laid out, so indicators are
//! announced but never placed.

use std::collections::BTreeMap;
use std::io::{self, Write};

use mutexmon_core::{AnchorHandle, IndicatorLayout, MutexState, Pid, Rect, Snapshot};
use mutexmon_runtime::{NodeHandle, Renderer};
use unicode_width::UnicodeWidthStr;

use crate::screen::{lock_label, owner_label};

pub struct PlainRenderer<W: Write> {
    out: W,
    clients: BTreeMap<NodeHandle, (Pid, bool)>,
    last_table: Vec<MutexState>,
    next_handle: u64,
    /// First write failure since the last present.
    error: Option<io::Error>,
}

impl<W: Write> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            clients: BTreeMap::new(),
            last_table: Vec::new(),
            next_handle: 1,
            error: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(error) = writeln!(self.out, "{text}") {
            self.error = Some(error);
        }
    }
}

const NAME_COLUMNS: usize = 24;
const OWNER_COLUMNS: usize = 12;

/// Left-align `text` in at least `columns` terminal columns. Longer text is
/// kept whole.
fn pad(text: &str, columns: usize) -> String {
    let fill = columns.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

/// The mutex table as printed, header first.
pub fn mutex_table(mutexes: &[MutexState]) -> Vec<String> {
    let row = |name: &str, owner: &str, state: &str| {
        format!(
            "{} {} {state}",
            pad(name, NAME_COLUMNS),
            pad(owner, OWNER_COLUMNS)
        )
    };
    let mut lines = vec![row("MUTEX", "OWNER", "STATE")];
    lines.extend(
        mutexes
            .iter()
            .map(|m| row(&m.name, &owner_label(m), lock_label(m.locked))),
    );
    lines
}

impl<W: Write> Renderer for PlainRenderer<W> {
    fn create_client_node(&mut self, pid: Pid) -> NodeHandle {
        let node = NodeHandle(self.next());
        self.clients.insert(node, (pid, false));
        self.line(&format!("+ client PID {pid}"));
        node
    }

    fn remove_client_node(&mut self, node: NodeHandle) {
        if let Some((pid, _)) = self.clients.remove(&node) {
            self.line(&format!("- client PID {pid}"));
        }
    }

    fn set_client_locked(&mut self, node: NodeHandle, locked: bool) {
        let Some(entry) = self.clients.get_mut(&node) else {
            return;
        };
        if entry.1 == locked {
            return;
        }
        entry.1 = locked;
        let pid = entry.0;
        self.line(&format!("  client PID {pid} {}", lock_label(locked)));
    }

    fn create_anchor(&mut self, pid: Pid, label: &str) -> AnchorHandle {
        let anchor = AnchorHandle(self.next());
        self.line(&format!("  PID {pid} {label}"));
        anchor
    }

    fn remove_anchor(&mut self, _anchor: AnchorHandle) {}

    fn place_anchor(&mut self, _anchor: AnchorHandle, _layout: &IndicatorLayout) {}

    fn server_rect(&self) -> Option<Rect> {
        None
    }

    fn client_rect(&self, _node: NodeHandle) -> Option<Rect> {
        None
    }

    fn show_mutexes(&mut self, snapshot: &Snapshot) {
        let table: Vec<MutexState> = snapshot.iter().cloned().collect();
        if table == self.last_table {
            return;
        }
        for line in mutex_table(&table) {
            self.line(&line);
        }
        self.last_table = table;
    }

    fn present(&mut self) -> io::Result<()> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        self.out.flush()
    }
}
