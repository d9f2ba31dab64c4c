//! ScanView CLI - command-line front end for the adaptive preset controller.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use scanview::Preset;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "scanview", version, about = "Adaptive performance presets for point-cloud tilesets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the quality preset table
    Presets {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the adaptive preset loop against a simulated renderer
    Simulate {
        /// How long to run, in seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,

        /// Frame rate to hold (overrides monitor.target_fps)
        #[arg(long)]
        target_fps: Option<f64>,

        /// Starting preset (overrides performance.preset)
        #[arg(long)]
        preset: Option<Preset>,

        /// Start with frustum culling disabled
        #[arg(long)]
        no_culling: bool,

        /// Simulated GPU throughput in points per second
        #[arg(long)]
        points_per_second: Option<f64>,
    },

    /// View and edit configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Presets { json } => commands::presets::run(json),
        Commands::Simulate {
            seconds,
            target_fps,
            preset,
            no_culling,
            points_per_second,
        } => commands::simulate::run(SimulateArgs {
            seconds,
            target_fps,
            preset,
            no_culling,
            points_per_second,
        }),
        Commands::Config(command) => commands::config::run(command),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from([
            "scanview",
            "simulate",
            "--seconds",
            "5",
            "--preset",
            "ultra",
            "--no-culling",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate {
                seconds,
                preset,
                no_culling,
                ..
            } => {
                assert_eq!(seconds, 5);
                assert_eq!(preset, Some(Preset::Ultra));
                assert!(no_culling);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_preset() {
        assert!(Cli::try_parse_from(["scanview", "simulate", "--preset", "cinematic"]).is_err());
    }

    #[test]
    fn test_parse_config_set() {
        let cli =
            Cli::try_parse_from(["scanview", "config", "set", "monitor.target_fps", "45"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands::Set { ref key, ref value })
                if key == "monitor.target_fps" && value == "45"
        ));
    }
}
