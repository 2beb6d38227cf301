//! CLI tool for cleaning job files without the server
//!
//! Usage:
//!   cargo run --release --bin clean_job -- <job_file> [options]
//!
//! Job files hold binary records back to back, or with `--text` one record
//! per line as whitespace separated integers (`#` starts a comment line).

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::error;

use slcleaner::config::{CleanerConfig, OutputKind};
use slcleaner::job::{run_jobs, JobRecord, JobResult};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Job file to clean
    #[clap(value_parser)]
    input: PathBuf,
    /// Read one whitespace separated record per line
    #[clap(long)]
    text: bool,
    /// JSON configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Emit per-row lines instead of polygons
    #[clap(long)]
    lines: bool,
    /// Passes per repair phase
    #[clap(long)]
    max_tries: Option<usize>,
    /// Worker threads, 0 for one per core
    #[clap(short, long)]
    threads: Option<usize>,
    /// Write results as JSON to this file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// Show summary stats only
    #[clap(long)]
    summary: bool,
}

fn read_records(args: &Args) -> Result<Vec<JobRecord>> {
    if args.text {
        let text = fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?;
        text.lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .map(|(n, l)| JobRecord::parse_text(l).with_context(|| format!("line {}", n + 1)))
            .collect()
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?;
        JobRecord::read_all(&mut BufReader::new(file))
            .with_context(|| format!("failed to read records from {}", args.input.display()))
    }
}

fn print_summary(results: &[&JobResult]) {
    println!("{:>8} {:>8} {:>8} {:>8} {:>10}", "layer", "datatype", "outputs", "fixed", "ms");
    for r in results {
        let fixed = r.report.as_ref().map_or(0, |report| report.total_fixed());
        println!(
            "{:>8} {:>8} {:>8} {:>8} {:>10.2}",
            r.layer,
            r.datatype,
            r.output.len(),
            fixed,
            r.elapsed_ms
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CleanerConfig::from_json_file(path)?,
        None => CleanerConfig::default(),
    };
    if args.lines {
        config.output = OutputKind::Lines;
    }
    if let Some(max_tries) = args.max_tries {
        config.max_tries = max_tries;
    }
    if let Some(threads) = args.threads {
        config.threads = (threads > 0).then_some(threads);
    }
    slcleaner::logging::init(&config.log_filter);

    let records = read_records(&args)?;
    let batch = run_jobs(&records, &config, &AtomicBool::new(false))?;
    let results: Vec<&JobResult> = batch.results.values().collect();

    if args.summary {
        print_summary(&results);
    } else {
        let json = serde_json::to_string_pretty(&results)?;
        match &args.output {
            Some(path) => fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => println!("{}", json),
        }
    }

    for failure in &batch.failures {
        error!(layer = failure.layer, datatype = failure.datatype, error = %failure.error, "job failed");
    }
    if !batch.failures.is_empty() {
        bail!("{} of {} jobs failed", batch.failures.len(), records.len());
    }
    Ok(())
}
