//! Apollo: endpoint messaging and schedule graphs.
//!
//! # Crate Structure
//!
//! - [`communication`]: the message catalogue exchanged between endpoints,
//!   response correlation, command and notification registries, and the
//!   processors that act on incoming messages.
//! - [`scheduling`]: schedule graphs, their builder, traversal, the
//!   structural verifier and schedule stores.
//! - [`core`]: errors, configuration, logging and report helpers.
//!
//! # Examples
//!
//! ```bash
//! # Check schedule documents, resolving sub-schedules from a store
//! apollo schedule verify nightly.json weekly.json --store schedules.db
//!
//! # Print a schedule in traversal order
//! apollo schedule show nightly.json
//!
//! # Persist documents
//! apollo schedule import nightly.json --store schedules.db
//! ```

pub mod communication;
pub mod core;
pub mod scheduling;

mod cli;

use crate::cli::{Cli, Command, ScheduleCli, ScheduleCommand};
use crate::core::{config::ApolloConfig, error::ApolloError, logging, time};
use crate::scheduling::{
    InMemoryScheduleStore, ScheduleDocument, ScheduleIntegrityFailure, ScheduleStorage,
    ScheduleVerifier, ScheduleVertex, SqliteScheduleStore, schedule_digest,
};

use clap::Parser;
use colored::Colorize;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub fn run() -> Result<(), ApolloError> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        // Version command - simple output for scripts/parsing
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let current_dir = std::env::current_dir()?;
    let config = ApolloConfig::load(cli.config.as_deref(), &current_dir)?;
    logging::init(cli.verbose, &config.logging);
    tracing::debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Command::Version => Ok(()),
        Command::Schedule(schedule_cli) => run_schedule_cli(&config, schedule_cli),
    }
}

fn run_schedule_cli(config: &ApolloConfig, cli: ScheduleCli) -> Result<(), ApolloError> {
    match cli.command {
        ScheduleCommand::Verify {
            files,
            store,
            format,
        } => {
            let format = parse_format(&format)?;
            let store = store.or_else(|| config.scheduling.store.clone());
            verify_schedules(&files, store.as_deref(), format)
        }
        ScheduleCommand::Show { file, format } => show_schedule(&file, parse_format(&format)?),
        ScheduleCommand::Import { files, store } => {
            let store = store
                .or_else(|| config.scheduling.store.clone())
                .ok_or_else(|| {
                    ApolloError::ConfigError(
                        "no schedule store given: pass --store or set [scheduling] store"
                            .to_string(),
                    )
                })?;
            import_schedules(&files, &store)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_format(format: &str) -> Result<OutputFormat, ApolloError> {
    match format {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(ApolloError::ValidationError(format!(
            "unknown output format '{other}' (expected 'text' or 'json')"
        ))),
    }
}

fn load_documents(files: &[PathBuf]) -> Result<Vec<(PathBuf, ScheduleDocument)>, ApolloError> {
    files
        .iter()
        .map(|path| Ok((path.clone(), ScheduleDocument::load(path)?)))
        .collect()
}

struct Verification {
    file: PathBuf,
    document: ScheduleDocument,
    failures: Vec<(ScheduleIntegrityFailure, ScheduleVertex)>,
}

fn verify_schedules(
    files: &[PathBuf],
    store_path: Option<&Path>,
    format: OutputFormat,
) -> Result<(), ApolloError> {
    let documents = load_documents(files)?;

    let mut store = InMemoryScheduleStore::new();
    if let Some(path) = store_path {
        let stored = SqliteScheduleStore::open(path)?;
        for (info, schedule) in stored.load_all()? {
            store.insert_with_information(info, schedule);
        }
    }
    // Documents on the command line shadow stored schedules with the same id.
    for (_, document) in &documents {
        store.insert_with_information(document.information.clone(), document.schedule.clone());
    }

    let verifier = ScheduleVerifier::new(&store as &dyn ScheduleStorage);
    let results: Vec<Verification> = documents
        .into_par_iter()
        .map(|(file, document)| {
            let failures = verifier.failures(&document.information.id, &document.schedule);
            Verification {
                file,
                document,
                failures,
            }
        })
        .collect();

    let invalid = results.iter().filter(|r| !r.failures.is_empty()).count();
    match format {
        OutputFormat::Text => print_verification_text(&results),
        OutputFormat::Json => {
            let status = if invalid == 0 { "ok" } else { "invalid" };
            let schedules: Vec<_> = results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.document.information.id,
                        "name": r.document.information.name,
                        "file": r.file.display().to_string(),
                        "valid": r.failures.is_empty(),
                        "failures": r.failures.iter().map(|(failure, vertex)| serde_json::json!({
                            "failure": failure,
                            "vertex": vertex.index(),
                            "kind": vertex.kind().name(),
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
            let report = time::report_envelope(
                "schedule.verify",
                status,
                serde_json::json!({ "schedules": schedules }),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if invalid > 0 {
        return Err(ApolloError::ValidationError(format!(
            "{invalid} of {} schedules failed verification",
            results.len()
        )));
    }
    Ok(())
}

fn print_verification_text(results: &[Verification]) {
    for result in results {
        let info = &result.document.information;
        if result.failures.is_empty() {
            println!("{} {} ({})", "✓".bright_green().bold(), info.name, info.id);
            continue;
        }
        println!(
            "{} {} ({}) {}",
            "✗".bright_red().bold(),
            info.name,
            info.id,
            result.file.display().to_string().dimmed()
        );
        for (failure, vertex) in &result.failures {
            println!("    {} {}: {}", "▸".bright_yellow(), vertex, failure);
        }
    }
}

fn show_schedule(file: &Path, format: OutputFormat) -> Result<(), ApolloError> {
    let document = ScheduleDocument::load(file)?;
    let schedule = &document.schedule;
    let digest = schedule_digest(schedule)?;
    let order = schedule.traversal_order();

    match format {
        OutputFormat::Text => {
            println!(
                "{} ({})",
                document.information.name.bright_white().bold(),
                document.information.id
            );
            if !document.information.summary.is_empty() {
                println!("  {}", document.information.summary);
            }
            println!("  digest {}", digest.dimmed());
            for vertex in order {
                let outbound = schedule.number_of_outbound_connections(vertex)?;
                println!("  {} {vertex} -> {outbound}", "▸".bright_cyan());
            }
        }
        OutputFormat::Json => {
            let vertices: Vec<_> = order
                .iter()
                .map(|vertex| serde_json::to_value(vertex))
                .collect::<Result<_, _>>()?;
            let report = time::report_envelope(
                "schedule.show",
                "ok",
                serde_json::json!({
                    "id": document.information.id,
                    "name": document.information.name,
                    "digest": digest,
                    "order": vertices,
                }),
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn import_schedules(files: &[PathBuf], store_path: &Path) -> Result<(), ApolloError> {
    let documents = load_documents(files)?;
    let store = SqliteScheduleStore::open(store_path)?;
    for (_, document) in &documents {
        store.put(&document.information, &document.schedule)?;
        tracing::info!(schedule = %document.information.id, store = %store_path.display(), "schedule imported");
        println!(
            "{} {} ({})",
            "imported".bright_green(),
            document.information.name,
            document.information.id
        );
    }
    Ok(())
}
