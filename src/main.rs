mod app;
mod config;
mod terminal;
mod theme;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "markstream", version, about = "Streams Markdown into the terminal glyph by glyph")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Markdown file to play back
    file: Option<PathBuf>,

    /// Keep watching the file and stream whatever gets appended
    #[arg(short, long)]
    follow: bool,

    /// Show the whole file at once instead of streaming it
    #[arg(short, long)]
    instant: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Write the log here instead of the cache directory
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the config file in $EDITOR (default: nvim)
    Config,
    /// Manage themes
    Themes {
        #[command(subcommand)]
        command: ThemeCommands,
    },
}

#[derive(Subcommand)]
enum ThemeCommands {
    /// List available themes
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.clone())?;

    if let Some(command) = cli.command {
        match command {
            Commands::Config => return config::open_config_in_editor(),
            Commands::Themes { command } => match command {
                ThemeCommands::List => {
                    let cfg = config::load_config()?;
                    let manager = theme::ThemeManager::load(&cfg)?;
                    for name in manager.theme_names() {
                        println!("{name}");
                    }
                    return Ok(());
                }
            },
        }
    }

    let file = cli
        .file
        .ok_or_else(|| anyhow::anyhow!("No file provided. Try `markstream <file.md>`."))?;

    let cfg = config::load_config()?;
    let options = app::RunOptions {
        follow: cli.follow,
        instant: cli.instant,
    };
    let result = app::run_app(file, cfg, options);
    if let Err(err) = &result {
        log::error!("{err:#}");
    }
    result
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn default_log_path() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("Could not determine cache directory")?;
    Ok(base.join("markstream").join("markstream.log"))
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(verbosity: u8, log_file: Option<PathBuf>) -> Result<()> {
    let path = match log_file {
        Some(path) => path,
        None => default_log_path()?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_for(verbosity))
        .chain(
            fern::log_file(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?,
        )
        .apply()
        .context("Failed to install logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from(["markstream", "-vv", "--follow", "notes.md"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.follow);
        assert!(!cli.instant);
        assert_eq!(cli.file, Some(PathBuf::from("notes.md")));
    }
}
