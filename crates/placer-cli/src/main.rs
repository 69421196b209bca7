// crates/placer-cli/src/main.rs
// ============================================================================
// Module: Placer CLI Entry Point
// Description: Command dispatcher for policy and revision workflows.
// Purpose: Provide the `placer` binary over the pipeline library.
// Dependencies: clap, placer-cli, placer-config, placer-core
// ============================================================================

//! ## Overview
//! The `placer` binary loads configuration, dispatches into the pipeline
//! library, and renders summaries. Exit code zero means the requested
//! workflow completed; claim-scoped failures are reported in the summary
//! without failing the process, while unrecoverable errors exit nonzero.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use placer_cli::ApplyOptions;
use placer_cli::apply_pipeline;
use placer_cli::reset_state;
use placer_cli::show_revision;
use placer_config::PlacerConfig;
use placer_core::RevisionQuery;

// ============================================================================
// SECTION: Command Line
// ============================================================================

/// Policy-driven workload placement engine.
#[derive(Debug, Parser)]
#[command(name = "placer", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Process the policy and reconcile state.
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Inspect persisted revisions.
    #[command(subcommand)]
    Revision(RevisionCommand),
}

/// Policy subcommands.
#[derive(Debug, Subcommand)]
enum PolicyCommand {
    /// Resolve claims, diff against the previous state, and apply changes.
    Apply {
        /// Plan only; execute nothing, persist nothing.
        #[arg(short = 'n', long)]
        noop: bool,
        /// Diff against the observed actual state, recreating instances
        /// that were removed behind the engine's back.
        #[arg(short = 'f', long)]
        full: bool,
        /// Save a revision even when there are no changes.
        #[arg(short = 'c', long)]
        newrevision: bool,
        /// Show verbose event output.
        #[arg(short = 'v', long)]
        verbose: bool,
        /// Execute the plan through the emulated executor.
        #[arg(short = 'e', long)]
        emulate: bool,
    },
    /// Delete all persisted state.
    Reset {
        /// Actually delete; without this flag nothing happens.
        #[arg(short = 'f', long)]
        force: bool,
    },
}

/// Revision subcommands.
#[derive(Debug, Subcommand)]
enum RevisionCommand {
    /// Print a revision.
    Show {
        /// Generation number or `latest`.
        #[arg(long, default_value = "latest")]
        gen: String,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PlacerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Policy(PolicyCommand::Apply {
            noop,
            full,
            newrevision,
            verbose,
            emulate,
        }) => run_apply(
            &config,
            &ApplyOptions {
                noop,
                full,
                newrevision,
                verbose,
                emulate,
            },
        ),
        Command::Policy(PolicyCommand::Reset {
            force,
        }) => run_reset(&config, force),
        Command::Revision(RevisionCommand::Show {
            gen,
        }) => run_show(&config, &gen),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Runs `policy apply` and prints the summary.
fn run_apply(config: &PlacerConfig, options: &ApplyOptions) -> Result<(), String> {
    let summary = apply_pipeline(config, options).map_err(|error| error.to_string())?;

    println!(
        "claims resolved: {}/{}",
        summary.claims_resolved, summary.claims_total
    );
    println!("planned actions: {}", summary.planned_actions);
    if summary.failed_actions > 0 {
        println!("failed actions: {}", summary.failed_actions);
    }
    match summary.revision {
        Some(generation) => println!("saved revision {generation}"),
        None => println!("no revision saved"),
    }

    if options.verbose {
        for event in &summary.events {
            println!("[{}] {}", event.level, event.message);
        }
    }

    if summary.failed_actions > 0 {
        return Err(format!("{} actions failed", summary.failed_actions));
    }
    Ok(())
}

/// Runs `policy reset` with its guard.
fn run_reset(config: &PlacerConfig, force: bool) -> Result<(), String> {
    let did_reset = reset_state(config, force).map_err(|error| error.to_string())?;
    if did_reset {
        println!("state deleted: {}", config.data.state_file.display());
    } else {
        println!(
            "this would erase {}; no action taken. use --force to delete",
            config.data.state_file.display()
        );
    }
    Ok(())
}

/// Runs `revision show`.
fn run_show(config: &PlacerConfig, gen: &str) -> Result<(), String> {
    let query: RevisionQuery = gen.parse()?;
    let revision = show_revision(config, query).map_err(|error| error.to_string())?;

    match revision {
        Some(revision) => {
            let rendered = serde_json::to_string_pretty(&revision)
                .map_err(|error| error.to_string())?;
            println!("{rendered}");
            Ok(())
        }
        None => Err(format!("revision '{gen}' not found")),
    }
}
