#![forbid(unsafe_code)]

//! Renderer seam.
//!
//! The monitor never looks visual nodes up by name. It keeps an explicit
//! pid → [`NodeHandle`] map and talks to the renderer only through the
//! handles the renderer gave out. The renderer also owns node placement, so
//! it is the one that answers "where is this node on screen right now".

use std::collections::{BTreeMap, HashMap};

use mutexmon_core::{AnchorHandle, IndicatorLayout, Pid, Rect, Snapshot};

/// Opaque handle to a client node owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Visible area, in renderer units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

pub trait Renderer {
    fn create_client_node(&mut self, pid: Pid) -> NodeHandle;

    fn remove_client_node(&mut self, node: NodeHandle);

    fn set_client_locked(&mut self, node: NodeHandle, locked: bool);

    /// Create the visual element for one indicator.
    fn create_anchor(&mut self, pid: Pid, label: &str) -> AnchorHandle;

    fn remove_anchor(&mut self, anchor: AnchorHandle);

    fn place_anchor(&mut self, anchor: AnchorHandle, layout: &IndicatorLayout);

    /// Current bounds of the server node, if it is laid out.
    fn server_rect(&self) -> Option<Rect>;

    /// Current bounds of a client node, if it still exists.
    fn client_rect(&self, node: NodeHandle) -> Option<Rect>;

    /// Refresh the mutex list panel.
    fn show_mutexes(&mut self, _snapshot: &Snapshot) {}

    fn resize(&mut self, _viewport: Viewport) {}

    /// Flush pending changes to the output.
    fn present(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One recorded renderer call.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    CreateClient { pid: Pid, node: NodeHandle },
    RemoveClient { node: NodeHandle },
    SetLocked { node: NodeHandle, locked: bool },
    CreateAnchor { pid: Pid, label: String, anchor: AnchorHandle },
    RemoveAnchor { anchor: AnchorHandle },
    PlaceAnchor { anchor: AnchorHandle, layout: IndicatorLayout },
    ShowMutexes { count: usize },
    Resize(Viewport),
    Present,
}

/// Renderer that records every call and places nodes where it is told.
///
/// Client rectangles are configured per pid with [`set_client_rect`];
/// unconfigured pids get a default rectangle.
///
/// [`set_client_rect`]: RecordingRenderer::set_client_rect
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    pub calls: Vec<RenderCall>,
    server: Option<Rect>,
    rect_by_pid: HashMap<Pid, Rect>,
    default_client: Rect,
    nodes: BTreeMap<NodeHandle, (Pid, bool)>,
    anchors: BTreeMap<AnchorHandle, (String, Option<IndicatorLayout>)>,
    next_handle: u64,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            server: Some(Rect::new(100.0, 0.0, 40.0, 40.0)),
            rect_by_pid: HashMap::new(),
            default_client: Rect::new(0.0, 100.0, 20.0, 20.0),
            nodes: BTreeMap::new(),
            anchors: BTreeMap::new(),
            next_handle: 1,
        }
    }
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_server_rect(&mut self, rect: Option<Rect>) {
        self.server = rect;
    }

    pub fn set_client_rect(&mut self, pid: Pid, rect: Rect) {
        self.rect_by_pid.insert(pid, rect);
    }

    /// Pids with a live node, ascending, and whether each shows as locked.
    pub fn live_clients(&self) -> Vec<(Pid, bool)> {
        let mut clients: Vec<_> = self.nodes.values().copied().collect();
        clients.sort_unstable();
        clients
    }

    pub fn live_anchors(&self) -> Vec<AnchorHandle> {
        self.anchors.keys().copied().collect()
    }

    pub fn anchor_label(&self, anchor: AnchorHandle) -> Option<&str> {
        self.anchors.get(&anchor).map(|(label, _)| label.as_str())
    }

    pub fn anchor_layout(&self, anchor: AnchorHandle) -> Option<IndicatorLayout> {
        self.anchors.get(&anchor).and_then(|(_, layout)| *layout)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn next(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl Renderer for RecordingRenderer {
    fn create_client_node(&mut self, pid: Pid) -> NodeHandle {
        let node = NodeHandle(self.next());
        self.nodes.insert(node, (pid, false));
        self.calls.push(RenderCall::CreateClient { pid, node });
        node
    }

    fn remove_client_node(&mut self, node: NodeHandle) {
        self.nodes.remove(&node);
        self.calls.push(RenderCall::RemoveClient { node });
    }

    fn set_client_locked(&mut self, node: NodeHandle, locked: bool) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.1 = locked;
        }
        self.calls.push(RenderCall::SetLocked { node, locked });
    }

    fn create_anchor(&mut self, pid: Pid, label: &str) -> AnchorHandle {
        let anchor = AnchorHandle(self.next());
        self.anchors.insert(anchor, (label.to_string(), None));
        self.calls.push(RenderCall::CreateAnchor {
            pid,
            label: label.to_string(),
            anchor,
        });
        anchor
    }

    fn remove_anchor(&mut self, anchor: AnchorHandle) {
        self.anchors.remove(&anchor);
        self.calls.push(RenderCall::RemoveAnchor { anchor });
    }

    fn place_anchor(&mut self, anchor: AnchorHandle, layout: &IndicatorLayout) {
        if let Some(entry) = self.anchors.get_mut(&anchor) {
            entry.1 = Some(*layout);
        }
        self.calls.push(RenderCall::PlaceAnchor {
            anchor,
            layout: *layout,
        });
    }

    fn server_rect(&self) -> Option<Rect> {
        self.server
    }

    fn client_rect(&self, node: NodeHandle) -> Option<Rect> {
        let (pid, _) = self.nodes.get(&node)?;
        Some(
            self.rect_by_pid
                .get(pid)
                .copied()
                .unwrap_or(self.default_client),
        )
    }

    fn show_mutexes(&mut self, snapshot: &Snapshot) {
        self.calls.push(RenderCall::ShowMutexes {
            count: snapshot.len(),
        });
    }

    fn resize(&mut self, viewport: Viewport) {
        self.calls.push(RenderCall::Resize(viewport));
    }

    fn present(&mut self) -> std::io::Result<()> {
        self.calls.push(RenderCall::Present);
        Ok(())
    }
}
