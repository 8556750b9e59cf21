#![forbid(unsafe_code)]

//! Snapshot fetching.
//!
//! One call to [`SnapshotSource::fetch`] is one network read. Nothing here
//! retries: the poll ticker calls again on its next tick, and a failed fetch
//! leaves downstream state untouched.

use std::collections::VecDeque;

use mutexmon_core::{Snapshot, SnapshotFormatError};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use thiserror::Error;

use crate::config::MonitorConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("collector answered HTTP {status}")]
    Status { status: u16 },

    #[error("response body is not JSON: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Format(#[from] SnapshotFormatError),
}

impl FetchError {
    /// The payload arrived but did not match the snapshot contract.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Anything that can produce one snapshot per poll tick.
pub trait SnapshotSource {
    fn fetch(&mut self) -> Result<Snapshot, FetchError>;
}

/// `GET {endpoint}{path}` against the collector.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(config: &MonitorConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.snapshot_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpFetcher {
    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(FetchError::Decode)?;
        Ok(Snapshot::from_value(value)?)
    }
}

/// Replays a fixed script of fetch results.
///
/// Once the script runs out it keeps serving the last successful snapshot,
/// like a collector whose state stopped changing.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: VecDeque<Result<Snapshot, FetchError>>,
    last_good: Snapshot,
    fetches: usize,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Result<Snapshot, FetchError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last_good: Snapshot::default(),
            fetches: 0,
        }
    }

    pub fn push(&mut self, result: Result<Snapshot, FetchError>) {
        self.script.push_back(result);
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl SnapshotSource for ScriptedSource {
    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        self.fetches += 1;
        match self.script.pop_front() {
            Some(Ok(snapshot)) => {
                self.last_good = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(error)) => Err(error),
            None => Ok(self.last_good.clone()),
        }
    }
}
