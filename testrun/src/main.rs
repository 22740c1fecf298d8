//! Incremental test runner.
//!
//! Runs the tests of compiled units through an external engine, skipping units
//! that are unchanged since a passing run (`<output-folder>/test.json`).

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use chrono::SecondsFormat;
use clap::{Args, Parser, Subcommand};
use testrun::core::filter::TestFilter;
use testrun::core::types::{Coverage, UnitId};
use testrun::exit_codes;
use testrun::io::artifacts::OutputFolder;
use testrun::io::config::{CONFIG_FILE, TestRunConfig, load_config, write_config};
use testrun::io::engine::CommandEngine;
use testrun::io::history::load_history;
use testrun::io::indented::Tee;
use testrun::logging;
use testrun::run::{RunSettings, run_invocation};

#[derive(Parser)]
#[command(
    name = "testrun",
    version,
    about = "Incremental test runner for compiled units"
)]
struct Cli {
    /// Log selection decisions and engine activity to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the tests of every unit (or the given units) that needs running.
    Run(RunArgs),
    /// Print the run history stored in the output folder.
    History {
        #[command(flatten)]
        location: Location,
    },
    /// Write a default `testrun.toml`.
    Init {
        /// Config file to create.
        #[arg(long, default_value = CONFIG_FILE)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct Location {
    /// Folder holding compiled artifacts and the history file.
    #[arg(long, default_value = "outputs")]
    output_folder: PathBuf,
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    location: Location,
    /// Only run tests whose name or full name matches this glob.
    #[arg(long)]
    pattern: Option<String>,
    /// Coverage collection mode (none, sources, tests, all).
    #[arg(long, default_value_t = Coverage::None)]
    coverage: Coverage,
    /// Run every unit and leave the history file untouched.
    #[arg(long)]
    no_history: bool,
    /// Toolchain identity to record instead of asking the engine.
    #[arg(long)]
    toolchain_version: Option<String>,
    /// Also write the report to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Units to consider (`a/B.class` or `a.B`); defaults to every artifact
    /// in the output folder.
    units: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}

fn run(command: Command) -> Result<i32> {
    match command {
        Command::Run(args) => cmd_run(args),
        Command::History { location } => cmd_history(&location),
        Command::Init { config, force } => cmd_init(&config, force),
    }
}

fn cmd_run(args: RunArgs) -> Result<i32> {
    let stopwatch = Instant::now();
    let config = load_config(&args.location.config)?;
    let output_folder = OutputFolder::new(&args.location.output_folder);

    let units = if args.units.is_empty() {
        output_folder.discover_units()?
    } else {
        args.units
            .iter()
            .map(|raw| UnitId::parse(raw).map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<_>>>()?
    };
    let filter = match &args.pattern {
        Some(raw) => TestFilter::parse(raw).map_err(|err| anyhow!(err))?,
        None => None,
    };
    let settings = RunSettings {
        history_path: output_folder.root().join(&config.history_file),
        use_history: !args.no_history,
        toolchain_version: args.toolchain_version.or(config.toolchain_version),
        filter,
        coverage: args.coverage,
        indent_width: config.indent_width,
    };
    let mut engine = CommandEngine::new(&config.engine);

    let stdout = io::stdout().lock();
    let outcome = match &args.log_file {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("create log file {}", path.display()))?;
            let sink = Tee::new(stdout, BufWriter::new(file));
            run_invocation(&settings, &units, &mut engine, &output_folder, &stopwatch, sink)?
        }
        None => run_invocation(&settings, &units, &mut engine, &output_folder, &stopwatch, stdout)?,
    };
    Ok(outcome.exit_code)
}

fn cmd_history(location: &Location) -> Result<i32> {
    let config = load_config(&location.config)?;
    let path = location.output_folder.join(&config.history_file);
    let record = load_history(&path)?;
    if record.is_empty() && record.toolchain_version.is_none() {
        println!("No run history at {}", path.display());
        return Ok(exit_codes::OK);
    }

    println!(
        "Toolchain version: {}",
        record.toolchain_version.as_deref().unwrap_or("unknown")
    );
    let rows: Vec<[String; 5]> = record
        .entries()
        .map(|entry| {
            [
                entry.relative_path.to_string(),
                entry
                    .last_modified
                    .map(|stamp| stamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                    .unwrap_or_else(|| "-".to_string()),
                entry.passed_test_count.to_string(),
                entry.skipped_test_count.to_string(),
                entry.failed_test_count.to_string(),
            ]
        })
        .collect();
    let header = ["Unit", "Last Modified", "Passed", "Skipped", "Failed"].map(str::to_string);
    let mut widths = header.clone().map(|cell| cell.len());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    for row in std::iter::once(&header).chain(&rows) {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
    Ok(exit_codes::OK)
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &TestRunConfig::default())?;
    println!("Wrote {}", path.display());
    Ok(exit_codes::OK)
}
