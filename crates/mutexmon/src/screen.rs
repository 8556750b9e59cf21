//! Full-screen terminal renderer.
//!
//! Every frame is drawn into an in-memory [`Canvas`] and then written out row
//! by row with `crossterm`, so a frame is always complete: stray output (a
//! log line on stderr, a resize) is gone after the next present.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_4;
use std::io::{self, Stdout, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use mutexmon_core::{AnchorHandle, IndicatorLayout, MutexState, Pid, Rect, Snapshot};
use mutexmon_runtime::{NodeHandle, Renderer, Viewport};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::layout::{PANEL_WIDTH, ROW_UNITS, ScreenLayout, cell_at};

/// Arrow heads by octant, clockwise from +X (screen Y points down).
const HEADS: [char; 8] = ['→', '↘', '↓', '↙', '←', '↖', '↑', '↗'];
const TRAIL: char = '·';

/// "PID n" for an owned mutex, "None" otherwise.
pub fn owner_label(state: &MutexState) -> String {
    match state.owner_pid() {
        Some(pid) => format!("PID {pid}"),
        None => "None".to_string(),
    }
}

pub fn lock_label(locked: bool) -> &'static str {
    if locked { "LOCKED" } else { "UNLOCKED" }
}

/// Truncate `text` to at most `width` terminal columns, then pad it with
/// spaces to exactly `width`. Zero-width marks stay with their base glyph.
pub fn fit_width(text: &str, width: usize) -> String {
    let mut fitted = String::with_capacity(text.len().max(width));
    let mut used = 0;
    for ch in text.chars() {
        let Some(w) = ch.width() else { continue };
        if used + w > width {
            break;
        }
        fitted.push(ch);
        used += w;
    }
    fitted.extend(std::iter::repeat_n(' ', width - used));
    fitted
}

/// Fixed grid of terminal cells.
///
/// Each cell holds the text drawn in that column: one glyph plus any
/// combining marks. A wide glyph occupies its cell and leaves the next one
/// empty, so a row always spans exactly `width` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<String>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![" ".to_string(); usize::from(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            set_cell(cell, ' ');
        }
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        let (Ok(col), Ok(row)) = (u16::try_from(col), u16::try_from(row)) else {
            return None;
        };
        (col < self.width && row < self.height)
            .then(|| usize::from(row) * usize::from(self.width) + usize::from(col))
    }

    /// Claim the cell at `index` for new content, blanking the other half of
    /// any wide glyph it was part of.
    fn claim(&mut self, index: usize) {
        let col = index % usize::from(self.width);
        if self.cells[index].is_empty() && col > 0 {
            set_cell(&mut self.cells[index - 1], ' ');
        }
        if col + 1 < usize::from(self.width) && self.cells[index + 1].is_empty() {
            set_cell(&mut self.cells[index + 1], ' ');
        }
    }

    /// Out-of-range cells are ignored. A wide glyph that does not fit before
    /// the right edge becomes a blank; zero-width and control characters are
    /// dropped.
    pub fn put(&mut self, col: i32, row: i32, ch: char) {
        let Some(index) = self.index(col, row) else {
            return;
        };
        match ch.width() {
            Some(1) => {
                self.claim(index);
                set_cell(&mut self.cells[index], ch);
            }
            Some(2) => {
                self.claim(index);
                match self.index(col.saturating_add(1), row) {
                    Some(tail) => {
                        self.claim(tail);
                        set_cell(&mut self.cells[index], ch);
                        self.cells[tail].clear();
                    }
                    None => set_cell(&mut self.cells[index], ' '),
                }
            }
            _ => {}
        }
    }

    /// Write `text` starting at `col`, advancing by display width and
    /// clipped to the canvas.
    pub fn put_str(&mut self, col: i32, row: i32, text: &str) {
        let mut next = col;
        let mut last = None;
        for ch in text.chars() {
            match ch.width() {
                Some(0) => {
                    if let Some(index) = last.and_then(|c| self.index(c, row)) {
                        self.cells[index].push(ch);
                    }
                }
                Some(w) => {
                    self.put(next, row, ch);
                    last = Some(next);
                    next = next.saturating_add(i32::try_from(w).unwrap_or(i32::MAX));
                }
                None => {}
            }
        }
    }

    pub fn row(&self, row: u16) -> String {
        if row >= self.height {
            return String::new();
        }
        let start = usize::from(row) * usize::from(self.width);
        self.cells[start..start + usize::from(self.width)].concat()
    }

    /// Whole canvas, rows joined by newlines, trailing blanks trimmed.
    pub fn to_text(&self) -> String {
        (0..self.height)
            .map(|row| self.row(row).trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn set_cell(cell: &mut String, ch: char) {
    cell.clear();
    cell.push(ch);
}

#[derive(Debug, Clone, Copy)]
struct ClientNode {
    pid: Pid,
    locked: bool,
}

#[derive(Debug, Clone)]
struct Anchor {
    label: String,
    layout: Option<IndicatorLayout>,
}

pub struct TerminalRenderer<W: Write> {
    out: W,
    layout: ScreenLayout,
    canvas: Canvas,
    clients: BTreeMap<NodeHandle, ClientNode>,
    anchors: BTreeMap<AnchorHandle, Anchor>,
    mutexes: Vec<MutexState>,
    next_handle: u64,
    alternate: bool,
}

impl TerminalRenderer<Stdout> {
    /// Switch stdout to raw mode and the alternate screen, so typed keys
    /// are not echoed over the frame. Both are undone on drop.
    pub fn enter() -> io::Result<Self> {
        let (width, height) = crossterm::terminal::size()?;
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        if let Err(error) = execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All)) {
            let _ = terminal::disable_raw_mode();
            return Err(error);
        }
        tracing::debug!(width, height, "entered full-screen mode");
        let mut renderer = Self::new(out, Viewport::new(width, height));
        renderer.alternate = true;
        Ok(renderer)
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, viewport: Viewport) -> Self {
        Self {
            out,
            layout: ScreenLayout::new(viewport),
            canvas: Canvas::new(viewport.width, viewport.height),
            clients: BTreeMap::new(),
            anchors: BTreeMap::new(),
            mutexes: Vec::new(),
            next_handle: 1,
            alternate: false,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn layout(&self) -> ScreenLayout {
        self.layout
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn sorted_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.clients.values().map(|c| c.pid).collect();
        pids.sort_unstable();
        pids
    }

    fn draw(&mut self) {
        self.canvas.clear();

        if let Some(server) = self.layout.server_rect() {
            draw_node(&mut self.canvas, server, "SERVER", None, false);
        }

        let pids = self.sorted_pids();
        for client in self.clients.values() {
            let Some(index) = pids.iter().position(|&pid| pid == client.pid) else {
                continue;
            };
            let Some(rect) = self.layout.client_rect(index, pids.len()) else {
                continue;
            };
            let status = client.locked.then_some("LOCKED");
            draw_node(
                &mut self.canvas,
                rect,
                &format!("PID {}", client.pid),
                status,
                client.locked,
            );
        }

        for anchor in self.anchors.values() {
            if let Some(layout) = &anchor.layout {
                draw_indicator(&mut self.canvas, layout, &anchor.label);
            }
        }

        match self.layout.panel_left() {
            Some(left) => draw_panel(&mut self.canvas, left, &self.mutexes),
            None => draw_summary(&mut self.canvas, &self.mutexes),
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn create_client_node(&mut self, pid: Pid) -> NodeHandle {
        let node = NodeHandle(self.next());
        self.clients.insert(node, ClientNode { pid, locked: false });
        node
    }

    fn remove_client_node(&mut self, node: NodeHandle) {
        self.clients.remove(&node);
    }

    fn set_client_locked(&mut self, node: NodeHandle, locked: bool) {
        if let Some(client) = self.clients.get_mut(&node) {
            client.locked = locked;
        }
    }

    fn create_anchor(&mut self, _pid: Pid, label: &str) -> AnchorHandle {
        let anchor = AnchorHandle(self.next());
        self.anchors.insert(
            anchor,
            Anchor {
                label: label.to_string(),
                layout: None,
            },
        );
        anchor
    }

    fn remove_anchor(&mut self, anchor: AnchorHandle) {
        self.anchors.remove(&anchor);
    }

    fn place_anchor(&mut self, anchor: AnchorHandle, layout: &IndicatorLayout) {
        if let Some(entry) = self.anchors.get_mut(&anchor) {
            entry.layout = Some(*layout);
        }
    }

    fn server_rect(&self) -> Option<Rect> {
        self.layout.server_rect()
    }

    fn client_rect(&self, node: NodeHandle) -> Option<Rect> {
        let pid = self.clients.get(&node)?.pid;
        let pids = self.sorted_pids();
        let index = pids.iter().position(|&p| p == pid)?;
        self.layout.client_rect(index, pids.len())
    }

    fn show_mutexes(&mut self, snapshot: &Snapshot) {
        self.mutexes = snapshot.iter().cloned().collect();
    }

    fn resize(&mut self, viewport: Viewport) {
        self.layout = ScreenLayout::new(viewport);
        self.canvas = Canvas::new(viewport.width, viewport.height);
    }

    fn present(&mut self) -> io::Result<()> {
        self.draw();
        // Rows span exactly the viewport, so no row wraps.
        for row in 0..self.canvas.height() {
            queue!(self.out, MoveTo(0, row), Print(self.canvas.row(row)))?;
        }
        self.out.flush()
    }
}

impl<W: Write> Drop for TerminalRenderer<W> {
    fn drop(&mut self) {
        if self.alternate {
            let _ = execute!(self.out, Show, LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Inclusive cell span of a layout rectangle.
fn cell_box(rect: Rect) -> (i32, i32, i32, i32) {
    let left = rect.left.round() as i32;
    let right = (rect.left + rect.width).round() as i32 - 1;
    let top = (rect.top / ROW_UNITS).round() as i32;
    let bottom = ((rect.top + rect.height) / ROW_UNITS).round() as i32 - 1;
    (left, top, right, bottom)
}

fn draw_node(canvas: &mut Canvas, rect: Rect, label: &str, status: Option<&str>, heavy: bool) {
    let (left, top, right, bottom) = cell_box(rect);
    if right <= left || bottom <= top {
        return;
    }
    let [h, v, tl, tr, bl, br] = if heavy {
        ['═', '║', '╔', '╗', '╚', '╝']
    } else {
        ['─', '│', '╭', '╮', '╰', '╯']
    };

    for col in left + 1..right {
        canvas.put(col, top, h);
        canvas.put(col, bottom, h);
    }
    for row in top + 1..bottom {
        canvas.put(left, row, v);
        canvas.put(right, row, v);
    }
    canvas.put(left, top, tl);
    canvas.put(right, top, tr);
    canvas.put(left, bottom, bl);
    canvas.put(right, bottom, br);

    let middle = (top + bottom) / 2;
    put_centered(canvas, (left + right) / 2, middle, label);
    if let Some(status) = status.filter(|_| middle + 1 < bottom) {
        put_centered(canvas, (left + right) / 2, middle + 1, status);
    }
}

fn put_centered(canvas: &mut Canvas, center_col: i32, row: i32, text: &str) {
    let half = i32::try_from(text.width() / 2).unwrap_or(0);
    canvas.put_str(center_col - half, row, text);
}

fn head_for(angle: f64) -> char {
    let octant = (angle / FRAC_PI_4).round() as i64;
    HEADS[octant.rem_euclid(8) as usize]
}

fn draw_indicator(canvas: &mut Canvas, layout: &IndicatorLayout, label: &str) {
    let viewport = Viewport::new(canvas.width(), canvas.height());
    if !layout.is_degenerate() {
        let dx = (layout.anchor_end.x - layout.anchor_start.x).abs();
        let dy = (layout.anchor_end.y - layout.anchor_start.y).abs() / ROW_UNITS;
        let steps = dx.max(dy).ceil().max(1.0) as u32;
        for step in 0..steps {
            let p = layout.point_at(f64::from(step) / f64::from(steps));
            if let Some((col, row)) = cell_at(p.x, p.y, viewport) {
                canvas.put(i32::from(col), i32::from(row), TRAIL);
            }
        }
        let end = layout.anchor_end;
        if let Some((col, row)) = cell_at(end.x, end.y, viewport) {
            canvas.put(i32::from(col), i32::from(row), head_for(layout.angle));
        }
    }

    let mid = layout.point_at(0.5);
    if let Some((col, row)) = cell_at(mid.x, mid.y, viewport) {
        canvas.put_str(i32::from(col) + 1, i32::from(row), label);
    }
}

fn draw_panel(canvas: &mut Canvas, left: u16, mutexes: &[MutexState]) {
    let left = i32::from(left);
    for row in 0..i32::from(canvas.height()) {
        canvas.put(left, row, '│');
    }
    let text_col = left + 2;
    let text_width = usize::from(PANEL_WIDTH.saturating_sub(3));

    // Earlier rows may hold indicator labels that ran into the panel.
    for row in 0..i32::from(canvas.height()) {
        canvas.put_str(text_col - 1, row, &" ".repeat(text_width + 1));
    }

    canvas.put_str(text_col, 0, "MUTEXES");
    let mut row = 2;
    for mutex in mutexes {
        if row + 1 >= i32::from(canvas.height()) {
            break;
        }
        let state = lock_label(mutex.locked);
        let name_width = text_width.saturating_sub(state.len() + 1);
        let name = fit_width(&mutex.name, name_width);
        canvas.put_str(text_col, row, &format!("{name} {state}"));
        canvas.put_str(text_col, row + 1, &format!("  Owner: {}", owner_label(mutex)));
        row += 3;
    }
}

fn draw_summary(canvas: &mut Canvas, mutexes: &[MutexState]) {
    let Some(last) = canvas.height().checked_sub(1) else {
        return;
    };
    let locked = mutexes.iter().filter(|m| m.locked).count();
    canvas.put_str(
        0,
        i32::from(last),
        &format!("{} mutexes, {locked} locked", mutexes.len()),
    );
}
