//! Keepsake - local file version history.
//!
//! This is the main entry point for the keepsake CLI.

mod app;
mod commands;
mod config;

use app::App;
use clap::{Parser, Subcommand};
use commands::*;
use config::KeepsakeConfig;
use keepsake_util::log::{self, LogConfig, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keepsake")]
#[command(author, version, about = "Local file version history", long_about = None)]
struct Cli {
    /// Workspace directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the current content of a file as a new version
    Save {
        /// File to capture
        file: PathBuf,
        /// Note attached to the version
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the versions of a file, newest first
    Log {
        file: PathBuf,
    },
    /// Print the content of a version
    Show {
        file: PathBuf,
        /// Version ID
        id: String,
    },
    /// Show a line diff between a version and another version or the file on disk
    Diff {
        file: PathBuf,
        /// Old side
        id: String,
        /// New side (defaults to the file on disk)
        other: Option<String>,
    },
    /// Compare the line counts of two versions
    Compare {
        file: PathBuf,
        a: String,
        b: String,
    },
    /// Write a version back to disk
    Restore {
        file: PathBuf,
        /// Version ID
        id: String,
    },
    /// Delete a single version
    Rm {
        file: PathBuf,
        /// Version ID
        id: String,
    },
    /// Clear the history of a file, or of every file
    Clear {
        file: Option<PathBuf>,
        /// Clear the history of every file
        #[arg(long, conflicts_with = "file")]
        all: bool,
    },
    /// List files that have version history
    Files,
    /// Show retention statistics for a file
    Stats {
        file: PathBuf,
    },
    /// Export the whole history as JSON
    Export {
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the whole history with an exported file
    Import {
        /// Input file path
        input: PathBuf,
    },
    /// Watch the workspace for changes until Ctrl-C
    Watch {
        /// Poll interval in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,
        /// Save a version of every file that changed
        #[arg(long)]
        capture: bool,
    },
    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let (config, sources) = KeepsakeConfig::load(&root).await?;

    log::init(LogConfig {
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            config.log_level()
        },
        ..Default::default()
    });
    tracing::debug!(root = %root.display(), "Starting keepsake");

    let app = App::open(root, config, sources).await;

    match cli.command {
        Commands::Save { file, message } => handle_save(&app, &file, message).await,
        Commands::Log { file } => handle_log(&app, &file).await,
        Commands::Show { file, id } => handle_show(&app, &file, &id).await,
        Commands::Diff { file, id, other } => {
            handle_diff(&app, &file, &id, other.as_deref()).await
        }
        Commands::Compare { file, a, b } => handle_compare(&app, &file, &a, &b).await,
        Commands::Restore { file, id } => handle_restore(&app, &file, &id).await,
        Commands::Rm { file, id } => handle_rm(&app, &file, &id).await,
        Commands::Clear { file, all } => handle_clear(&app, file.as_deref(), all).await,
        Commands::Files => handle_files(&app).await,
        Commands::Stats { file } => handle_stats(&app, &file).await,
        Commands::Export { output } => handle_export(&app, output.as_deref()).await,
        Commands::Import { input } => handle_import(&app, &input).await,
        Commands::Watch { interval, capture } => handle_watch(&app, interval, capture).await,
        Commands::Config => show_config(&app),
    }
}

/// Print the merged configuration and where it came from.
fn show_config(app: &App) -> anyhow::Result<()> {
    let config = app.config();
    println!("Workspace: {}", app.root().display());
    if app.sources().is_empty() {
        println!("Sources: (defaults)");
    } else {
        println!("Sources:");
        for source in app.sources() {
            println!("  {}", source.display());
        }
    }
    println!("max_versions: {}", config.max_versions());
    println!("poll_interval_ms: {}", config.poll_interval().as_millis());
    println!("log_level: {}", config.log_level().as_str());
    println!("ignore: {}", config.ignored().join(", "));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_diff_second_version_is_optional() {
        let cli = Cli::try_parse_from(["keepsake", "diff", "a.txt", "ver_1"]).unwrap();
        match cli.command {
            Commands::Diff { other, .. } => assert!(other.is_none()),
            _ => panic!("expected diff"),
        }
    }

    #[test]
    fn test_clear_all_conflicts_with_file() {
        assert!(Cli::try_parse_from(["keepsake", "clear", "a.txt", "--all"]).is_err());
        assert!(Cli::try_parse_from(["keepsake", "clear", "--all"]).is_ok());
    }

    #[test]
    fn test_global_dir_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["keepsake", "files", "--dir", "/tmp/ws"]).unwrap();
        assert_eq!(cli.dir, Some(PathBuf::from("/tmp/ws")));
    }
}
