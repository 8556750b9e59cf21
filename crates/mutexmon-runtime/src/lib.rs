#![forbid(unsafe_code)]

//! mutexmon runtime
//!
//! Ties the pure core to the outside world: fetches snapshots from the
//! collector, owns the monitor state, and drives it from a serialized event
//! loop fed by a poll ticker and resize notifications.
//!
//! # Key Components
//!
//! - [`MonitorConfig`] - Tunables, loadable from TOML
//! - [`HttpFetcher`] - One `GET /mutexes` per poll tick
//! - [`Monitor`] - Reconciler, indicator set, and node handles in one place
//! - [`Renderer`] - Handle-based seam to whatever draws the picture
//! - [`Program`] - The single-threaded loop that handles every trigger
//! - [`PollTicker`] - Fixed-interval poll ticker

pub mod clock;
pub mod config;
pub mod fetch;
pub mod monitor;
pub mod program;
pub mod render;
pub mod subscription;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, MonitorConfig};
pub use fetch::{FetchError, HttpFetcher, ScriptedSource, SnapshotSource};
pub use monitor::{Monitor, MonitorStats, TickOutcome};
pub use program::{Msg, Program, ProgramConfig, coalesce};
pub use render::{NodeHandle, RecordingRenderer, RenderCall, Renderer, Viewport};
pub use subscription::{MsgSink, PollTicker, ScriptedSubscription, StopSignal, SubId, Subscription};
