mod app_dir;
mod commands;
mod host;
mod preferences;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use preferences::AppPreferences;

/// Komanav - panel-by-panel reading for image-directory comics
#[derive(Parser, Debug)]
#[command(name = "komanav")]
#[command(version)]
#[command(about = "Navigate, inspect and export comic panels from detection metadata")]
pub struct Cli {
    /// Path to the preferences file (defaults to komanav.json next to the executable)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tracing filter directive, e.g. "debug" or "komanav_render=trace"
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print panel counts and padded pixel rects for every page
    Inspect {
        /// Directory of page images; metadata is looked up beside it
        document: PathBuf,
    },
    /// Walk forward through the panels and write each one as PNG
    Export {
        document: PathBuf,
        /// Output directory (defaults to the preferences' export_dir)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Page to start from
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
    /// Feed tap positions through the viewer and print the resulting events
    Replay {
        document: PathBuf,
        /// Comma-separated horizontal tap positions in [0, 1], e.g. 0.8,0.8,0.2
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        taps: Vec<f64>,
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
    /// Print the effective preferences as JSON
    Config {
        /// Also write them to the preferences file
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directive) => tracing_subscriber::EnvFilter::new(directive),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn run(cli: Cli) -> commands::CommandResult {
    let config_path = cli.config.unwrap_or_else(app_dir::preferences_path);
    let prefs = AppPreferences::load(&config_path);

    match cli.command {
        Command::Inspect { document } => commands::inspect(&document, &prefs),
        Command::Export {
            document,
            out,
            page,
        } => {
            let written = commands::export(&document, out.as_deref(), page, &prefs)?;
            println!("wrote {written} panel(s)");
            Ok(())
        }
        Command::Replay {
            document,
            taps,
            page,
        } => commands::replay(&document, &taps, page, &prefs),
        Command::Config { write } => {
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            if write && !prefs.save(&config_path) {
                return Err(format!("could not write {}", config_path.display()).into());
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_filter.as_deref());

    info!("Starting Komanav");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_does_not_error() {
        let err = Cli::try_parse_from(["komanav", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn export_defaults() {
        let cli = Cli::try_parse_from(["komanav", "export", "/books/vol1"]).unwrap();
        match cli.command {
            Command::Export { document, out, page } => {
                assert_eq!(document, PathBuf::from("/books/vol1"));
                assert!(out.is_none());
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn replay_parses_taps() {
        let cli = Cli::try_parse_from([
            "komanav",
            "--log-filter",
            "debug",
            "replay",
            "/books/vol1",
            "--taps",
            "0.8,0.2",
        ])
        .unwrap();
        assert_eq!(cli.log_filter.as_deref(), Some("debug"));
        match cli.command {
            Command::Replay { taps, page, .. } => {
                assert_eq!(taps, vec![0.8, 0.2]);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn page_zero_is_rejected() {
        assert!(Cli::try_parse_from(["komanav", "export", "/books/vol1", "--page", "0"]).is_err());
    }
}
