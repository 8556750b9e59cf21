use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use mutexmon_runtime::{
    HttpFetcher, Monitor, MonitorConfig, MonitorStats, MonotonicClock, PollTicker, Program,
    ProgramConfig, Renderer, Subscription,
};

use crate::error::Result;
use crate::input::InputSubscription;
use crate::logging;
use crate::plain::PlainRenderer;
use crate::screen::TerminalRenderer;

#[derive(Debug, Parser)]
#[command(
    name = "mutexmon",
    about = "Watch a mutex server: who holds what, and what they last said",
    version
)]
pub struct Cli {
    /// Collector base URL.
    #[arg(long, env = "MUTEXMON_ENDPOINT")]
    pub endpoint: Option<String>,

    /// TOML file with monitor settings; flags override it.
    #[arg(long, env = "MUTEXMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Poll interval in milliseconds.
    #[arg(long = "poll-ms", env = "MUTEXMON_POLL_MS")]
    pub poll_ms: Option<u64>,

    /// How long a message indicator stays up, in milliseconds.
    #[arg(long = "ttl-ms", env = "MUTEXMON_TTL_MS")]
    pub ttl_ms: Option<u64>,

    /// Message characters shown before truncating with "...".
    #[arg(long = "label-chars", env = "MUTEXMON_LABEL_CHARS")]
    pub label_chars: Option<usize>,

    /// Print events line by line instead of drawing the full screen.
    #[arg(long, env = "MUTEXMON_PLAIN")]
    pub plain: bool,

    /// Write logs here instead of stderr.
    #[arg(long = "log-file", env = "MUTEXMON_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Exit after this many poll ticks.
    #[arg(long, env = "MUTEXMON_TICKS")]
    pub ticks: Option<u64>,
}

impl Cli {
    /// Defaults, then the config file, then flags and environment.
    pub fn resolve_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_toml_file(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(poll_ms) = self.poll_ms {
            config.poll_interval_ms = poll_ms;
        }
        if let Some(ttl_ms) = self.ttl_ms {
            config.indicator_ttl_ms = ttl_ms;
        }
        if let Some(label_chars) = self.label_chars {
            config.label_max_chars = label_chars;
        }
        Ok(config.validated()?)
    }

    fn program_config(&self) -> ProgramConfig {
        ProgramConfig {
            tick_on_start: true,
            max_ticks: self.ticks,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.resolve_config()?;
    logging::init(cli.log_file.as_deref())?;
    tracing::info!(
        url = %config.snapshot_url(),
        poll_ms = config.poll_interval_ms,
        ttl_ms = config.indicator_ttl_ms,
        "starting monitor"
    );

    let stats = if cli.plain {
        drive(&cli, &config, PlainRenderer::new(io::stdout()))?
    } else {
        drive(&cli, &config, TerminalRenderer::enter()?)?
    };

    if cli.plain {
        let mut out = io::stdout();
        writeln!(
            out,
            "{} ticks, {} applied, {} failed, {} rejected, {} messages",
            stats.ticks, stats.applied, stats.fetch_failures, stats.rejected, stats.spawned
        )?;
    }
    Ok(())
}

fn drive<R: Renderer>(cli: &Cli, config: &MonitorConfig, renderer: R) -> Result<MonitorStats> {
    let fetcher = HttpFetcher::new(config)?;
    let mut program = Program::new(
        Monitor::new(config),
        fetcher,
        renderer,
        MonotonicClock::new(),
        cli.program_config(),
    );
    Ok(program.run(subscriptions(config, !cli.plain)))
}

fn subscriptions(config: &MonitorConfig, full_screen: bool) -> Vec<Box<dyn Subscription>> {
    let mut subs: Vec<Box<dyn Subscription>> =
        vec![Box::new(PollTicker::new(config.poll_interval()))];
    if full_screen {
        subs.push(Box::new(InputSubscription::new()));
    }
    #[cfg(unix)]
    subs.push(Box::new(crate::signals::SignalSubscription::new()));
    subs
}
