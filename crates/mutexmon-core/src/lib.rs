#![forbid(unsafe_code)]

//! Core: snapshot model, reconciliation, indicator lifecycle, and geometry.
//!
//! # Role in mutexmon
//! `mutexmon-core` is the pure half of the monitor. It never performs I/O.
//! The runtime (`mutexmon-runtime`) fetches snapshots and feeds them here,
//! then hands the derived events and layouts to a renderer.
//!
//! # Primary responsibilities
//! - **Snapshot**: typed, validated view of the collector's `/mutexes` payload.
//! - **Reconciler**: diffs consecutive snapshots into client lifecycle events
//!   and message events, without duplicates.
//! - **IndicatorManager**: owns the live set of in-flight message indicators
//!   and expires them after a fixed time-to-live.
//! - **Geometry**: edge-to-edge anchor points, length, and rotation of an
//!   indicator between two circular nodes.

pub mod geometry;
pub mod indicator;
pub mod reconcile;
pub mod snapshot;

pub use geometry::{IndicatorLayout, Point, Rect, compute_indicator_layout};
pub use indicator::{
    AnchorHandle, Indicator, IndicatorConfig, IndicatorId, IndicatorManager, SpawnError,
    format_label,
};
pub use reconcile::{ClientEvent, MessageEvent, ReconcileResult, Reconciler};
pub use snapshot::{MutexState, Pid, Snapshot, SnapshotFormatError};
