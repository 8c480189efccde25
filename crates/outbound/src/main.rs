// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound - cold-email draft pipeline and sender-account scheduler.
//!
//! This is the binary entry point.

mod commands;
mod serve;
mod stats;
mod wiring;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use outbound_config::{ConfigError, OutboundConfig};

/// Outbound - cold-email draft pipeline and sender-account scheduler.
#[derive(Parser, Debug)]
#[command(name = "outbound", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the XDG hierarchy.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the producer, send workers and scheduler until interrupted.
    Serve,
    /// Scan every identity inbox once.
    Scan {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show queue, identity and campaign statistics.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Import leads from a CSV file into the recipients table.
    ImportLeads {
        /// CSV file with an `email` column.
        path: PathBuf,
    },
    /// Validate the configuration and exit.
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<OutboundConfig, Vec<ConfigError>> {
    match path {
        Some(path) => outbound_config::load_and_validate_path(path),
        None => outbound_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            outbound_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            serve::init_tracing(&config.service.log_level);
            serve::run_serve(config).await
        }
        Some(Commands::Scan { json }) => {
            serve::init_tracing(&config.service.log_level);
            commands::run_scan(&config, json).await
        }
        Some(Commands::Stats { json, plain }) => commands::run_stats_command(&config, json, plain).await,
        Some(Commands::ImportLeads { path }) => commands::run_import(&config, &path).await,
        Some(Commands::CheckConfig) => commands::check_config(&config).map(|line| println!("{line}")),
        None => {
            println!("outbound: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("outbound: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_loads_config_defaults() {
        let config = outbound_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.service.name, "outbound");
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["outbound", "stats", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Stats { json: true, plain: false })));

        let cli = Cli::try_parse_from(["outbound", "import-leads", "leads.csv", "-c", "o.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("o.toml")));
        assert!(matches!(cli.command, Some(Commands::ImportLeads { .. })));

        let cli = Cli::try_parse_from(["outbound"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["outbound", "launch"]).is_err());
    }
}
