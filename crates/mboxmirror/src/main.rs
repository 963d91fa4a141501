//! mboxmirror - incremental IMAP to mbox mirror.
//!
//! Status and progress go to stdout; logs go to stderr.

mod cli;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mboxmirror_core::instrument::WIRE_TARGET;
use mboxmirror_core::{
    Account, BandwidthMonitor, Instrumentation, ProgressEvent, RenderOutcome, Renderer, RunMode,
    list_account, mirror_mailbox, spawn_worker,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.dump_protocol);

    match run(cli).await {
        Ok(RenderOutcome::Done) => ExitCode::SUCCESS,
        Ok(RenderOutcome::Failed(err)) => {
            debug!(error = ?err, "run failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("mboxmirror: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8, dump_protocol: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives = if dump_protocol {
        format!("{level},{WIRE_TARGET}=trace")
    } else {
        level.to_string()
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<RenderOutcome> {
    let account = Account::load(&cli.auth)
        .with_context(|| format!("loading credentials from {}", cli.auth.display()))?;
    let instrumentation = Instrumentation::none().with_dump(cli.dump_protocol);

    let (mode, args) = match cli.command {
        Command::List => {
            let (supervisor, rx) = spawn_worker(move |reporter| async move {
                list_account(&account, &instrumentation, &reporter).await
            });
            return render(supervisor, rx, None).await;
        }
        Command::Fetch(args) => (RunMode::Fetch, args),
        Command::Sync(args) => (RunMode::Sync, args),
    };

    let options = args.into_options(mode, cli.verbose, cli.output_dir);
    info!(mailbox = %options.mailbox, ?mode, "starting mirror");

    let monitor = Arc::new(BandwidthMonitor::new());
    let instrumentation = instrumentation.with_monitor(Arc::clone(&monitor));
    let (supervisor, rx) = spawn_worker(move |reporter| async move {
        mirror_mailbox(&account, &instrumentation, &options, &reporter).await?;
        Ok(())
    });
    render(supervisor, rx, Some(monitor)).await
}

async fn render(
    supervisor: JoinHandle<()>,
    rx: mpsc::Receiver<ProgressEvent>,
    monitor: Option<Arc<BandwidthMonitor>>,
) -> Result<RenderOutcome> {
    let mut renderer = Renderer::new(io::stdout());
    if let Some(monitor) = monitor {
        renderer = renderer.with_monitor(monitor);
    }

    let outcome = renderer.run(rx).await.context("writing status")?;
    supervisor.await.context("worker supervisor")?;
    Ok(outcome)
}
