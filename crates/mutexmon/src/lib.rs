#![forbid(unsafe_code)]

//! `mutexmon`: a terminal view of a mutex server.
//!
//! Polls the collector's `/mutexes` snapshot, keeps one node per client
//! process that owns a mutex, shows each new status message as an arrow from
//! the client to the server for a few seconds, and lists every mutex with
//! its owner and lock state.

pub mod cli;
pub mod error;
pub mod input;
pub mod layout;
pub mod logging;
pub mod plain;
pub mod screen;
#[cfg(unix)]
pub mod signals;

pub use cli::{Cli, run, run_from_env};
pub use error::{MonitorError, Result};
pub use layout::ScreenLayout;
pub use plain::PlainRenderer;
pub use screen::TerminalRenderer;
