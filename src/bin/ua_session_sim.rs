//! UA session simulator binary.
//!
//! Drives a full session lifecycle against the in-memory server and prints
//! every state transition.
//!
//! # Commands
//!
//! - `run` - connect, lose the connection N times, get invalidated, close
//! - `config` - print the effective configuration as TOML

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use ua_session::{
    SessionConfig, SessionError, SessionFsm, SessionStatus, SimulatedClient, Transition, VERSION,
};

#[derive(Parser)]
#[command(name = "ua-session-sim")]
#[command(version = VERSION)]
#[command(about = "Session lifecycle simulator", long_about = None)]
struct Cli {
    /// Config file (default: platform config dir, then environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconnect scenario
    Run {
        /// Simulated latency per exchange in milliseconds
        #[arg(short, long, default_value = "10")]
        latency_ms: u64,

        /// Number of connection losses
        #[arg(long, default_value = "2")]
        cycles: u32,

        /// Failed reactivations before each recovery succeeds
        #[arg(short, long, default_value = "1")]
        failed_reactivations: u32,

        /// Initial reactivation backoff in milliseconds
        #[arg(long, default_value = "100")]
        backoff_ms: u64,

        /// Give up if a step takes longer than this many seconds
        #[arg(long, default_value = "30")]
        step_timeout: u64,

        /// Print transitions and logs as JSON lines
        #[arg(long)]
        json: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Run {
            latency_ms,
            cycles,
            failed_reactivations,
            backoff_ms,
            step_timeout,
            json,
            verbose,
        } => {
            init_logging(verbose, json);

            let backoff = Duration::from_millis(backoff_ms);
            let reconnect = config.reconnect.clone().with_backoff(backoff, backoff * 16);
            let scenario = Scenario {
                config: config.with_reconnect(reconnect),
                latency: Duration::from_millis(latency_ms),
                cycles,
                failed_reactivations,
                step_timeout: Duration::from_secs(step_timeout),
                json,
            };

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(scenario.run())
        },
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "warn" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr);

    // stdout carries the transition stream, logs stay on stderr
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<SessionConfig> {
    if let Some(path) = path {
        return SessionConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()));
    }

    match SessionConfig::default_path() {
        Some(path) if path.exists() => SessionConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display())),
        _ => Ok(SessionConfig::from_env()),
    }
}

struct Scenario {
    config: SessionConfig,
    latency: Duration,
    cycles: u32,
    failed_reactivations: u32,
    step_timeout: Duration,
    json: bool,
}

impl Scenario {
    async fn run(self) -> anyhow::Result<()> {
        let client = Arc::new(SimulatedClient::from_config(&self.config).with_latency(self.latency));
        let fsm = SessionFsm::new(client.clone(), self.config.clone())?;
        let printer = tokio::spawn(print_transitions(fsm.transitions(), self.json));

        let session = tokio::time::timeout(self.step_timeout, fsm.connect())
            .await
            .context("connect timed out")??;
        tracing::info!("Connected as {}", session.id());

        for cycle in 1..=self.cycles {
            let before = fsm.status().transitions;
            client.script_reactivate(
                (0..self.failed_reactivations)
                    .map(|_| Err(SessionError::Transport("channel reset".to_string()))),
            );
            fsm.notify_connection_lost()?;
            let status = self.recovered(&fsm, before).await?;
            tracing::info!("Recovered from connection loss {} of {}", cycle, self.cycles);
            if !self.json {
                println!("-- connection loss {cycle} recovered ({} transitions)", status.transitions);
            }
        }

        let before = fsm.status().transitions;
        let Some(session) = fsm.status().session else {
            bail!("no active session to invalidate");
        };
        client.invalidate_session(&session);
        let status = self.recovered(&fsm, before).await?;
        if !self.json {
            println!("-- invalidation recovered ({} transitions)", status.transitions);
        }

        tokio::time::timeout(self.step_timeout, fsm.close())
            .await
            .context("close timed out")??;

        drop(fsm);
        printer.await?;

        if self.json {
            println!(
                "{}",
                json!({
                    "creates": client.create_count(),
                    "reactivations": client.reactivate_count(),
                    "closes": client.close_count(),
                    "open_sessions": client.open_sessions(),
                })
            );
        } else {
            println!(
                "creates: {}, reactivations: {}, closes: {}, open sessions: {}",
                client.create_count(),
                client.reactivate_count(),
                client.close_count(),
                client.open_sessions()
            );
        }
        Ok(())
    }

    /// Wait for the machine to be active again after transition `before`.
    async fn recovered(&self, fsm: &SessionFsm, before: u64) -> anyhow::Result<SessionStatus> {
        let mut rx = fsm.subscribe();
        let status = tokio::time::timeout(
            self.step_timeout,
            rx.wait_for(|s| s.transitions > before && (s.is_active() || s.state.is_idle())),
        )
        .await
        .context("recovery timed out")??
        .clone();

        if !status.is_active() {
            bail!("session ended in {} instead of recovering", status.state);
        }
        Ok(status)
    }
}

async fn print_transitions(mut rx: broadcast::Receiver<Transition>, as_json: bool) {
    loop {
        match rx.recv().await {
            Ok(t) if as_json => match serde_json::to_string(&t) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Cannot encode transition: {}", e),
            },
            Ok(t) => println!(
                "[{:>3}] {:<18} -> {:<18} {:<32} {}",
                t.transitions,
                t.from,
                t.to,
                t.event,
                t.session.unwrap_or_default()
            ),
            Err(RecvError::Lagged(missed)) if as_json => {
                println!("{}", json!({ "missed": missed }));
            },
            Err(RecvError::Lagged(missed)) => println!("      ... {} transition(s) missed", missed),
            Err(RecvError::Closed) => break,
        }
    }
}
