//! Where nodes sit on screen.
//!
//! Layout works in its own units: one column is one unit wide and one row is
//! [`ROW_UNITS`] units tall. Terminal cells are roughly twice as tall as they
//! are wide, so a node whose width equals its height in layout units looks
//! round, and the circle geometry of the indicators matches what is drawn.
//!
//! The server sits centered in the upper part of the canvas. Clients sit in
//! one row below it, evenly spaced in ascending pid order. The mutex list
//! panel takes the right edge when the terminal is wide enough.

use mutexmon_core::{Pid, Rect};
use mutexmon_runtime::Viewport;

pub const ROW_UNITS: f64 = 2.0;

/// Server node side, in layout units.
pub const SERVER_SIZE: f64 = 12.0;
/// Client node side, in layout units.
pub const CLIENT_SIZE: f64 = 10.0;

pub const PANEL_WIDTH: u16 = 32;
/// The panel only appears when the canvas keeps at least this many columns.
const MIN_CANVAS_WIDTH: u16 = 40;
/// Vertical clearance between the server and the client row.
const MIN_GAP: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    viewport: Viewport,
}

impl ScreenLayout {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn has_panel(&self) -> bool {
        self.viewport.width >= MIN_CANVAS_WIDTH + PANEL_WIDTH
    }

    /// Columns available to the node diagram.
    pub fn canvas_width(&self) -> u16 {
        if self.has_panel() {
            self.viewport.width - PANEL_WIDTH
        } else {
            self.viewport.width
        }
    }

    /// First column of the mutex list panel, if there is room for it.
    pub fn panel_left(&self) -> Option<u16> {
        self.has_panel().then(|| self.canvas_width())
    }

    fn canvas_height_units(&self) -> f64 {
        f64::from(self.viewport.height) * ROW_UNITS
    }

    fn fits(&self) -> bool {
        f64::from(self.canvas_width()) >= SERVER_SIZE
            && self.canvas_height_units() >= SERVER_SIZE + CLIENT_SIZE + 2.0 * MIN_GAP
    }

    /// Bounds of the server node, or `None` when the canvas is too small to
    /// lay it out.
    pub fn server_rect(&self) -> Option<Rect> {
        if !self.fits() {
            return None;
        }
        let center_x = f64::from(self.canvas_width()) / 2.0;
        let center_y = (self.canvas_height_units() / 4.0).max(SERVER_SIZE / 2.0 + 1.0);
        Some(centered(center_x, center_y, SERVER_SIZE))
    }

    /// Bounds of the client at `index` among `count` clients.
    pub fn client_rect(&self, index: usize, count: usize) -> Option<Rect> {
        if index >= count || !self.fits() {
            return None;
        }
        let slot = f64::from(self.canvas_width()) / count as f64;
        let center_x = slot * (index as f64 + 0.5);
        let height = self.canvas_height_units();
        let center_y = (height * 3.0 / 4.0).min(height - CLIENT_SIZE / 2.0 - 1.0);
        Some(centered(center_x, center_y, CLIENT_SIZE))
    }

    /// Bounds of every client, `pids` taken in ascending order.
    pub fn client_rects(&self, pids: &[Pid]) -> Vec<(Pid, Rect)> {
        let mut sorted = pids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let count = sorted.len();
        sorted
            .into_iter()
            .enumerate()
            .filter_map(|(index, pid)| Some((pid, self.client_rect(index, count)?)))
            .collect()
    }
}

fn centered(center_x: f64, center_y: f64, size: f64) -> Rect {
    Rect::new(center_x - size / 2.0, center_y - size / 2.0, size, size)
}

/// Terminal cell (column, row) under a layout point, if it is on screen.
pub fn cell_at(x: f64, y: f64, viewport: Viewport) -> Option<(u16, u16)> {
    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return None;
    }
    let col = x.floor();
    let row = (y / ROW_UNITS).floor();
    if col >= f64::from(viewport.width) || row >= f64::from(viewport.height) {
        return None;
    }
    Some((col as u16, row as u16))
}
