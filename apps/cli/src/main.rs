mod config;

use anyhow::Result;
use clap::Parser;
use config::{Overrides, Settings};
use snapclone_host_virsh::Virsh;
use snapclone_replicator::{
    run_clone, CloneParams, CloneResult, FailedSnapshot, FailurePolicy, FailureStage,
};
use snapclone_report::{create_report_bundle, FailureEntry, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const EXIT_MISMATCH: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Clone the snapshot tree of one VM onto another VM that uses a copy of its disks"
)]
struct Args {
    /// Machine whose snapshots are copied
    source_vm_name: String,
    /// Machine that receives the snapshots
    target_vm_name: String,
    /// Do not print progress or result messages
    #[arg(long)]
    quiet: bool,
    /// Allow a target that already has snapshots
    #[arg(long)]
    force: bool,
    /// Rewrite every snapshot but define nothing on the target
    #[arg(long)]
    dry_run: bool,
    /// What to do with the rest of the tree when a snapshot fails: abort or continue
    #[arg(long)]
    on_error: Option<FailurePolicy>,
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,
    /// virsh binary
    #[arg(long)]
    virsh: Option<String>,
    /// libvirt connection URI
    #[arg(long)]
    connect: Option<String>,
    /// Per-call timeout for virsh, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Directory for rewritten snapshot documents
    #[arg(long)]
    transient_dir: Option<PathBuf>,
    /// Write a run report under <dir>/reports/<run id>/
    #[arg(long)]
    report_base: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.quiet);

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let settings = Settings::resolve(
        args.config.as_deref(),
        Overrides {
            virsh: args.virsh.clone(),
            connect: args.connect.clone(),
            timeout_secs: args.timeout_secs,
            transient_dir: args.transient_dir.clone(),
            on_error: args.on_error,
            report_base: args.report_base.clone(),
        },
    )?;

    let host = Virsh::new(settings.virsh_config());
    let params = CloneParams {
        source: args.source_vm_name.clone(),
        target: args.target_vm_name.clone(),
        force: args.force,
        settings: settings.replication_settings(args.dry_run),
    };
    let result = run_clone(&host, &params)?;

    for failure in &result.outcome.failed {
        eprintln!("{}", describe_failure(failure));
    }

    if let Some(base) = &settings.report_base {
        let report = create_report_bundle(base, &summarize(&params, &result))?;
        if !args.quiet {
            println!("report: {}", report.run_json.display());
        }
    }

    if !args.quiet {
        println!("{}", result_message(&result, &params.target));
    }

    if result.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_MISMATCH))
    }
}

fn summarize(params: &CloneParams, result: &CloneResult) -> RunSummary {
    RunSummary {
        source: params.source.clone(),
        target: params.target.clone(),
        dry_run: params.settings.dry_run,
        cloned: result.outcome.cloned.clone(),
        failed: result
            .outcome
            .failed
            .iter()
            .map(|failure| FailureEntry {
                snapshot: failure.snapshot.clone(),
                stage: failure.stage.to_string(),
                error: error_chain(&failure.error),
            })
            .collect(),
        verified: result.verified,
    }
}

fn result_message(result: &CloneResult, target: &str) -> String {
    match result.verified {
        Some(true) if result.succeeded() => "Snapshots cloned successfully".to_string(),
        Some(_) => "Snapshot trees differ after cloning".to_string(),
        None => format!(
            "Dry run: {} snapshot(s) rewritten, nothing defined on {}",
            result.outcome.cloned.len(),
            target
        ),
    }
}

fn describe_failure(failure: &FailedSnapshot) -> String {
    let error = error_chain(&failure.error);
    match failure.stage {
        FailureStage::Clone => format!(
            "skipped {} and its descendants: {}",
            failure.snapshot, error
        ),
        FailureStage::ChildDiscovery => format!(
            "cloned {} but could not list its children, descendants skipped: {}",
            failure.snapshot, error
        ),
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
