//! CLI entry point: wires the real `ptrace` front end to the core event
//! loop, then dumps the resulting file-record store as CSV and/or JSON
//! (spec §6). `clap` replaces the teacher's bare `env::args()` positional
//! parsing because this crate's surface is wider than the teacher's single
//! positional output path; `tracing`+`tracing-subscriber` replace its
//! `eprintln!` calls, matching the convention this domain uses repeatedly
//! (`mello29-shadow`, `cberner-fuser`, `rustfoundation-cargo-capslock`,
//! among others in the retrieval pack).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use imagetrace::event_loop::{Disposition, EventLoop};
use imagetrace::front_end::PtraceEventSource;
use imagetrace::model::GlobalState;
use imagetrace::{csv_dump, TracerError};

/// Observes a command's execution and synthesizes a reproducible record of
/// every file it touched.
#[derive(Parser, Debug)]
#[command(name = "imagetrace", version, about)]
struct Cli {
    /// Increase log verbosity; repeat for more (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write the final file-record store as CSV to this path (spec §6).
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Write the final file-record store as JSON to this path.
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Maximum shebang-chasing recursion depth before a warning is emitted
    /// and recursion stops (spec §4.7 P7).
    #[arg(long, default_value_t = 4, value_name = "N")]
    depth_limit: usize,

    /// The command to trace, and any arguments to it.
    #[arg(num_args = 1.., required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "imagetrace=warn",
        1 => "imagetrace=info",
        2 => "imagetrace=debug",
        _ => "imagetrace=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<i32, TracerError> {
    let initial_workdir = std::env::current_dir()
        .map_err(|e| TracerError::EventSource(format!("cannot read current directory: {e}")))?
        .to_string_lossy()
        .into_owned();
    let initial_env: Vec<(String, String)> = std::env::vars().collect();
    let initial_argv = cli.command.clone();

    let (mut source, root_pid) = PtraceEventSource::spawn(&cli.command)?;

    let global = GlobalState::with_shebang_depth_limit(
        initial_workdir,
        initial_env,
        initial_argv,
        cli.depth_limit,
    );
    let mut event_loop = EventLoop::new(global, cli.verbose > 0);
    event_loop.global.track_new_process(root_pid);

    let result = run_to_completion(&mut event_loop, &mut source);

    if let Some(path) = &cli.csv {
        csv_dump::write_csv(&event_loop.global, path)?;
        tracing::info!("wrote {}", path.display());
    }
    if let Some(path) = &cli.json {
        write_json(&event_loop.global, path)?;
        tracing::info!("wrote {}", path.display());
    }

    for nr in event_loop.global.syscall_warnings() {
        tracing::warn!("syscall {nr} produced at least one warning during the trace");
    }

    match result? {
        Some(Disposition::RootExited { code }) => Ok(code),
        Some(Disposition::RootSignalled { signal }) => Ok(128 + signal),
        None => Ok(0),
    }
}

/// Runs the event loop to completion. On a fatal `TracerError` (spec §7:
/// tracer-decode or protocol-violation conditions) the trace is no longer
/// trustworthy, so this best-effort `SIGINT`s every traced pid before
/// propagating the error, rather than leaving tracees stopped forever
/// under a tracer that just gave up on them (spec §5 "Cancellation").
fn run_to_completion(
    event_loop: &mut EventLoop,
    source: &mut PtraceEventSource,
) -> Result<Option<Disposition>, TracerError> {
    match event_loop.run(source) {
        Ok(disposition) => Ok(disposition),
        Err(err) => {
            event_loop.cancel();
            Err(err)
        }
    }
}

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    initial_workdir: &'a str,
    initial_argv: &'a [String],
    initial_env: &'a [(String, String)],
    syscall_warnings: Vec<i64>,
    files: Vec<&'a imagetrace::model::FileRecord>,
    non_file_records: Vec<&'a imagetrace::model::FileRecord>,
}

fn write_json(global: &GlobalState, path: &PathBuf) -> Result<(), TracerError> {
    let mut warnings: Vec<i64> = global.syscall_warnings().iter().copied().collect();
    warnings.sort_unstable();

    let report = JsonReport {
        initial_workdir: &global.initial_workdir,
        initial_argv: &global.initial_argv,
        initial_env: &global.initial_env,
        syscall_warnings: warnings,
        files: global.files_iter().collect(),
        non_file_records: global.non_file_records_iter().collect(),
    };

    let file = std::fs::File::create(path)
        .map_err(|e| TracerError::EventSource(format!("creating {}: {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &report)
        .map_err(|e| TracerError::EventSource(format!("writing {}: {e}", path.display())))
}
