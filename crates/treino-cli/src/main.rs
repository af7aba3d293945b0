//! Treino CLI
//!
//! Command-line interface for Treino - workout groups and exercises, kept on
//! one device and mirrored to another.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use treino_core::sync::DirectoryLink;
use treino_core::{Config, Workouts};

mod commands;
mod output;

use commands::exercise::{ExerciseChanges, NewExercise};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "treino")]
#[command(about = "Treino - workout groups on your phone, mirrored to your watch")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage workout groups
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Manage exercises inside a group
    Exercise {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
    /// Act as the mirror device and show what it has received
    Mirror {
        /// Keep running and apply updates as they arrive
        #[arg(short, long)]
        watch: bool,
    },
    /// Push the whole collection to the mirror again
    Sync,
    /// Show status (counts, storage, sync)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// Create a new group
    #[command(alias = "create")]
    Add {
        /// Group name
        name: String,
        /// Suggested day, e.g. "Monday"
        #[arg(short, long)]
        day: Option<String>,
    },
    /// List all groups
    #[command(alias = "ls")]
    List,
    /// Show a group and its exercises
    Show {
        /// Group ID (full UUID or prefix)
        id: String,
    },
    /// Rename a group
    Rename {
        /// Group ID (full UUID or prefix)
        id: String,
        /// New name
        name: String,
        /// New suggested day (empty clears it)
        #[arg(short, long)]
        day: Option<String>,
    },
    /// Delete a group and its exercises
    #[command(alias = "rm")]
    Delete {
        /// Group ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ExerciseCommands {
    /// Add an exercise to a group
    #[command(alias = "create")]
    Add {
        /// Group ID (full UUID or prefix)
        group: String,
        #[command(flatten)]
        fields: NewExercise,
    },
    /// List the exercises of a group
    #[command(alias = "ls")]
    List {
        /// Group ID (full UUID or prefix)
        group: String,
    },
    /// Edit an exercise
    Edit {
        /// Group ID (full UUID or prefix)
        group: String,
        /// Exercise ID (full UUID or prefix)
        id: String,
        #[command(flatten)]
        changes: ExerciseChanges,
    },
    /// Delete an exercise
    #[command(alias = "rm")]
    Delete {
        /// Group ID (full UUID or prefix)
        group: String,
        /// Exercise ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Reorder exercises: move the given positions so they start at --to
    Move {
        /// Group ID (full UUID or prefix)
        group: String,
        /// Positions to move (1-based, as shown by `exercise list`)
        #[arg(required = true)]
        from: Vec<usize>,
        /// Position the moved exercises start at
        #[arg(short, long)]
        to: usize,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, mirror_dir, link_dir, sync_enabled, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config_file.as_ref();

    // Config commands work even when the stored config is broken
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    // The mirror never opens the authoritative store
    if let Commands::Mirror { watch } = cli.command {
        return commands::mirror::run(&config, watch, &output).await;
    }

    let link = Arc::new(DirectoryLink::new(&config.link_dir));
    let mut workouts = Workouts::open_with_config(&config, link)?;
    debug!("Opened {} workout groups", workouts.groups().len());

    match cli.command {
        Commands::Group { command } => handle_group_command(command, &mut workouts, &output),
        Commands::Exercise { command } => {
            handle_exercise_command(command, &mut workouts, &output)
        }
        Commands::Sync => commands::sync::push(&workouts, &config, &output),
        Commands::Status => commands::status::show(&workouts, &config, &output),
        Commands::Mirror { .. } | Commands::Config { .. } => Ok(()), // Handled above
    }
}

fn handle_group_command(
    command: GroupCommands,
    workouts: &mut Workouts,
    output: &Output,
) -> Result<()> {
    match command {
        GroupCommands::Add { name, day } => commands::group::add(workouts, name, day, output),
        GroupCommands::List => commands::group::list(workouts, output),
        GroupCommands::Show { id } => commands::group::show(workouts, id, output),
        GroupCommands::Rename { id, name, day } => {
            commands::group::rename(workouts, id, name, day, output)
        }
        GroupCommands::Delete { id, yes } => commands::group::delete(workouts, id, yes, output),
    }
}

fn handle_exercise_command(
    command: ExerciseCommands,
    workouts: &mut Workouts,
    output: &Output,
) -> Result<()> {
    match command {
        ExerciseCommands::Add { group, fields } => {
            commands::exercise::add(workouts, group, fields, output)
        }
        ExerciseCommands::List { group } => commands::exercise::list(workouts, group, output),
        ExerciseCommands::Edit { group, id, changes } => {
            commands::exercise::edit(workouts, group, id, changes, output)
        }
        ExerciseCommands::Delete { group, id, yes } => {
            commands::exercise::delete(workouts, group, id, yes, output)
        }
        ExerciseCommands::Move { group, from, to } => {
            commands::exercise::move_to(workouts, group, from, to, output)
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr unless a
/// log file is configured.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "treino_core={0},treino_cli={0}",
            config.log_level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore the error if a subscriber is already installed
    match config.log_file {
        Some(ref path) => match File::create(path) {
            Ok(file) => {
                let _ = builder.with_ansi(false).with_writer(file).try_init();
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {:?}: {}", path, e);
                let _ = builder.with_writer(std::io::stderr).try_init();
            }
        },
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
