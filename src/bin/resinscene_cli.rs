//! ResinScene CLI - dry-run and inspection tool
//!
//! Commands: stage, parse, run, cleanup
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when a job fails, 1 on bad input or I/O errors

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use resinscene_core::{
    Directives, HostConfig, JobRunner, PrintFileProcessor, PrintJob, Printer, SceneFileProcessor,
    SimulatedPrinter, TracingNotifier, resolve_pad_width,
};

#[derive(Parser)]
#[command(name = "resinscene-cli")]
#[command(about = "ResinScene CLI - scene file job interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to host configuration (JSON)
    #[arg(short, long, default_value = "resinscene.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a job archive into its working directory
    Stage {
        archive: PathBuf,
    },

    /// Classify every line of a command file
    Parse {
        command_file: PathBuf,
    },

    /// Stage and execute a job against the simulated printer
    Run {
        archive: PathBuf,

        /// Fixed exposure time, ignoring the file's delay markers
        #[arg(long)]
        exposure_ms: Option<u64>,

        /// Keep the working directory afterwards
        #[arg(long)]
        keep: bool,
    },

    /// Delete a job's working directory
    Cleanup {
        archive: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match HostConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load config: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };

    let processor = Arc::new(SceneFileProcessor::new(config, Arc::new(TracingNotifier)));

    match cli.command {
        Commands::Stage { archive } => stage(&processor, &archive),
        Commands::Parse { command_file } => parse(&command_file),
        Commands::Run { archive, exposure_ms, keep } => run(processor, &archive, exposure_ms, keep),
        Commands::Cleanup { archive } => match processor.cleanup_environment(&archive) {
            Ok(()) => emit(&serde_json::json!({ "success": true })),
            Err(e) => usage_failure(&e),
        },
    }
}

fn stage(processor: &SceneFileProcessor, archive: &Path) -> ExitCode {
    let dir = match processor.prepare_environment(archive) {
        Ok(d) => d,
        Err(e) => return job_failure(&e),
    };
    let command_file = match processor.stager().locate_command_file(&dir) {
        Ok(f) => f,
        Err(e) => return job_failure(&e),
    };
    let pad_width = match resolve_pad_width(&command_file, &processor.config().image_extension) {
        Ok(w) => w,
        Err(e) => return job_failure(&e),
    };

    emit(&serde_json::json!({
        "success": true,
        "workingDir": dir,
        "commandFile": command_file,
        "padWidth": pad_width,
    }))
}

fn parse(command_file: &Path) -> ExitCode {
    let file = match File::open(command_file) {
        Ok(f) => f,
        Err(e) => return usage_failure(&e),
    };

    let mut directives = vec![];
    for next in Directives::new(BufReader::new(file)) {
        match next {
            Ok((line, directive)) => directives.push(serde_json::json!({
                "line": line,
                "directive": directive,
            })),
            Err(e) => return usage_failure(&e),
        }
    }
    emit(&directives)
}

fn run(processor: Arc<SceneFileProcessor>, archive: &Path, exposure_ms: Option<u64>, keep: bool) -> ExitCode {
    if let Err(e) = processor.prepare_environment(archive) {
        return job_failure(&e);
    }

    let job = Arc::new(PrintJob::new(archive));
    if let Some(ms) = exposure_ms {
        job.override_exposure(ms);
    }
    let printer = Arc::new(SimulatedPrinter::new("simulator"));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => return usage_failure(&e),
    };
    let runner = JobRunner::new(processor.clone(), processor.config().max_concurrent_jobs);
    let worker_printer = printer.clone() as Arc<dyn Printer>;
    let submitted = runtime.block_on(async { runner.submit(Arc::clone(&job), worker_printer).await });
    let mut report = match submitted {
        Ok(r) => r,
        Err(e) => return job_failure(&e),
    };

    if report.status.is_in_progress() {
        printer.finish();
        report.status = printer.status();
    }

    if !keep {
        if let Err(e) = processor.cleanup_environment(archive) {
            tracing::warn!(error = %e, "couldn't remove working directory");
        }
    }

    let state = printer.state();
    let output = serde_json::json!({
        "success": !report.is_failed(),
        "report": report,
        "slicesShown": state.slices_shown,
        "motionCommands": state.commands_received,
    });
    let emitted = emit(&output);
    if report.is_failed() {
        ExitCode::from(2)
    } else {
        emitted
    }
}

fn emit(value: &impl serde::Serialize) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => usage_failure(&e),
    }
}

/// A job that couldn't be staged or run.
fn job_failure(e: &dyn std::fmt::Display) -> ExitCode {
    print_error(e);
    ExitCode::from(2)
}

/// Bad input, I/O outside a job, or output encoding.
fn usage_failure(e: &dyn std::fmt::Display) -> ExitCode {
    print_error(e);
    ExitCode::FAILURE
}

fn print_error(e: &dyn std::fmt::Display) {
    let output = serde_json::json!({
        "success": false,
        "error": e.to_string(),
    });
    println!("{}", output);
}
