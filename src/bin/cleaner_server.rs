//! Stdio JSON-RPC server for layout cleaning jobs
//!
//! Usage:
//!   cargo run --release --bin cleaner_server -- [--config <file>] [--threads <n>]

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use slcleaner::config::CleanerConfig;
use slcleaner::server::handlers::handle_run_complete;
use slcleaner::server::{dispatch_line, RunAsyncResult, ServerState};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Worker threads per batch, 0 for one per core
    #[clap(short, long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CleanerConfig::from_json_file(path)?,
        None => CleanerConfig::default(),
    };
    if let Some(threads) = args.threads {
        config.threads = (threads > 0).then_some(threads);
    }
    slcleaner::logging::init(&config.log_filter);

    info!(?config, "starting cleaner server");
    let mut state = ServerState::with_config(config);
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    // Channel for background batch results
    let (run_tx, run_rx): (Sender<RunAsyncResult>, Receiver<RunAsyncResult>) = mpsc::channel();

    for line in stdin.lock().lines() {
        // Check for a finished batch (non-blocking)
        if let Ok(result) = run_rx.try_recv() {
            let notification = handle_run_complete(&mut state, result);
            writeln!(stdout, "{}", notification)?;
            stdout.flush()?;
        }

        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "error reading stdin");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let response = dispatch_line(&mut state, &line, &run_tx);
        writeln!(stdout, "{}", response)?;
        stdout.flush()?;

        if state.shutdown_requested {
            break;
        }
    }

    // A batch still in flight reports before exit
    if state.running {
        if let Ok(result) = run_rx.recv() {
            let notification = handle_run_complete(&mut state, result);
            writeln!(stdout, "{}", notification)?;
            stdout.flush()?;
        }
    }

    info!("shutting down");
    Ok(())
}
