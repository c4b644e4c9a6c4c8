//! CLI argument parsing
//!
//! Uses clap for argument parsing with derive macros. Numeric observer flags
//! are optional so values from `observer.toml` apply when a flag is absent.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Terminal and web observer for KD agent event logs
#[derive(Parser, Debug)]
#[command(name = "kd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root containing `.kracked/` (default: current directory)
    #[arg(short = 'C', long, env = "KD_DIRECTORY", global = true)]
    pub directory: Option<PathBuf>,

    /// Event log path, absolute or relative to the project root
    #[arg(long, env = "KD_EVENTS", global = true)]
    pub events: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "KD_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Live terminal observer
    Observe(ObserveArgs),

    /// Web observer with a JSON API
    Web(WebArgs),

    /// Print one snapshot and exit
    Snapshot {
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Raw log lines considered
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_history: Option<u64>,

        /// Recent events included
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_events: Option<u64>,
    },

    /// Append one event to the log
    Emit(EmitArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ObserveArgs {
    /// Refresh interval in milliseconds [default: 1000]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Recent events shown [default: 12]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_events: Option<u64>,

    /// Raw log lines considered per refresh [default: 250]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_history: Option<u64>,

    /// Desktop notification when a delegated agent appears
    #[arg(short = 'N', long, default_value_t = false)]
    pub notify: bool,
}

#[derive(clap::Args, Debug, Default)]
pub struct WebArgs {
    /// First port to try [default: 4892]
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Further ports tried when the port is taken [default: 10]
    #[arg(long)]
    pub port_retries: Option<u16>,

    /// Open the observer in a browser
    #[arg(long, default_value_t = false)]
    pub open: bool,

    /// Server-side poll interval in milliseconds [default: 1200]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Raw log lines considered per poll [default: 1200]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_history: Option<u64>,

    /// Recent events served [default: 80]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_events: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct EmitArgs {
    /// Emitting tool or IDE
    #[arg(long)]
    pub source: String,

    #[arg(long)]
    pub agent_id: String,

    #[arg(long)]
    pub agent_name: String,

    #[arg(long)]
    pub role: String,

    /// Short state token: typing, reading, running, waiting, ...
    #[arg(long)]
    pub action: String,

    /// Agent or role list receiving delegated work
    #[arg(long)]
    pub target_agent_id: Option<String>,

    /// Workflow token such as /kd-dev-story
    #[arg(long)]
    pub task: Option<String>,

    #[arg(long)]
    pub message: Option<String>,
}

/// Generate shell completions and print to stdout
pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kd", &mut io::stdout());
}

/// Clamp a validated flag into `usize`
pub fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_observe_flags() {
        let cli = Cli::try_parse_from(["kd", "observe", "--interval", "250", "--max-events", "5"]).unwrap();
        let Commands::Observe(args) = cli.command else {
            panic!("expected observe");
        };
        assert_eq!(args.interval, Some(250));
        assert_eq!(args.max_events, Some(5));
        assert_eq!(args.max_history, None);
        assert!(!args.notify);
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(Cli::try_parse_from(["kd", "observe", "--interval", "0"]).is_err());
        assert!(Cli::try_parse_from(["kd", "web", "--max-history", "0"]).is_err());
        assert!(Cli::try_parse_from(["kd", "web", "--port", "0"]).is_err());
    }

    #[test]
    fn test_emit_requires_identity_fields() {
        assert!(Cli::try_parse_from(["kd", "emit", "--source", "cli"]).is_err());

        let cli = Cli::try_parse_from([
            "kd", "emit", "--source", "cli", "--agent-id", "main-agent", "--agent-name", "Amad",
            "--role", "Master Agent", "--action", "typing", "--task", "/kd-arch",
        ])
        .unwrap();
        let Commands::Emit(args) = cli.command else {
            panic!("expected emit");
        };
        assert_eq!(args.agent_id, "main-agent");
        assert_eq!(args.task.as_deref(), Some("/kd-arch"));
        assert_eq!(args.target_agent_id, None);
    }

    #[test]
    fn test_global_directory_flag() {
        let cli = Cli::try_parse_from(["kd", "snapshot", "-C", "/tmp/project", "--json"]).unwrap();
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp/project")));
        assert!(matches!(cli.command, Commands::Snapshot { json: true, .. }));
    }
}
