#![forbid(unsafe_code)]

//! Lifecycle of in-flight message indicators.
//!
//! [`IndicatorManager`] exclusively owns the live set. Indicators are
//! created for message events whose owner has a live client node, carry a
//! renderer-owned anchor handle, and are removed once their age reaches the
//! configured time-to-live. Expiry is time-based only: losing the origin
//! client node mid-flight does not remove an indicator early.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::geometry::IndicatorLayout;
use crate::snapshot::Pid;

/// Glyph prefixed to every indicator label.
pub const ARROW_GLYPH: &str = "➔";
/// Marker appended when a message is cut to the display length.
pub const ELLIPSIS: &str = "...";

/// Opaque handle to the renderer element that draws one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorHandle(pub u64);

/// Indicator identity: its creation timestamp in milliseconds, made unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorConfig {
    pub ttl_ms: u64,
    /// Characters of the message kept before the ellipsis marker.
    pub label_max_chars: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 3000,
            label_max_chars: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("no client node for pid {pid}")]
    UnknownClient { pid: Pid },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub id: IndicatorId,
    pub pid: Pid,
    pub label: String,
    pub created_ms: u64,
    pub anchor: AnchorHandle,
    /// Last layout applied to the anchor; kept when the client node vanishes.
    pub layout: Option<IndicatorLayout>,
}

impl Indicator {
    pub fn age(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_ms)
    }
}

/// Display label for a message: arrow glyph, then at most `max_chars`
/// characters, then an ellipsis marker if anything was cut.
pub fn format_label(message: &str, max_chars: usize) -> String {
    let mut chars = message.char_indices();
    match chars.nth(max_chars) {
        Some((cut, _)) => format!("{ARROW_GLYPH} {}{ELLIPSIS}", &message[..cut]),
        None => format!("{ARROW_GLYPH} {message}"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorManager {
    config: IndicatorConfig,
    live: Vec<Indicator>,
    last_id: Option<u64>,
}

impl IndicatorManager {
    pub fn new(config: IndicatorConfig) -> Self {
        Self {
            config,
            live: Vec::new(),
            last_id: None,
        }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Create an indicator for `pid` if it has a live client node.
    ///
    /// `make_anchor` is only called once the pid check passes, so a rejected
    /// spawn leaves nothing behind in the renderer.
    pub fn spawn(
        &mut self,
        pid: Pid,
        message: &str,
        now_ms: u64,
        active_pids: &BTreeSet<Pid>,
        make_anchor: impl FnOnce(&str) -> AnchorHandle,
    ) -> Result<&Indicator, SpawnError> {
        if !active_pids.contains(&pid) {
            return Err(SpawnError::UnknownClient { pid });
        }

        let id = match self.last_id {
            Some(last) if last >= now_ms => last + 1,
            _ => now_ms,
        };
        self.last_id = Some(id);

        let label = format_label(message, self.config.label_max_chars);
        let anchor = make_anchor(&label);
        self.live.push(Indicator {
            id: IndicatorId(id),
            pid,
            label,
            created_ms: now_ms,
            anchor,
            layout: None,
        });
        let index = self.live.len() - 1;
        Ok(&self.live[index])
    }

    /// Remove every indicator whose age is at least the time-to-live.
    ///
    /// The caller owns destruction of the returned anchors. Calling this
    /// again at the same instant returns nothing.
    pub fn expire(&mut self, now_ms: u64) -> Vec<Indicator> {
        let ttl = self.config.ttl_ms;
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.live)
            .into_iter()
            .partition(|ind| ind.age(now_ms) >= ttl);
        self.live = kept;
        if !expired.is_empty() {
            tracing::trace!(expired = expired.len(), live = self.live.len(), "indicators expired");
        }
        expired
    }

    /// Earliest instant at which some live indicator expires.
    pub fn next_expiry(&self) -> Option<u64> {
        self.live
            .iter()
            .map(|ind| ind.created_ms.saturating_add(self.config.ttl_ms))
            .min()
    }

    pub fn live(&self) -> &[Indicator] {
        &self.live
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut Indicator> {
        self.live.iter_mut()
    }

    pub fn get(&self, id: IndicatorId) -> Option<&Indicator> {
        self.live.iter().find(|ind| ind.id == id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
