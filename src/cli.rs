use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::config::DEFAULT_ENV_PREFIX;

#[derive(Parser)]
#[command(name = "pgo")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Declarative provisioning of cluster groups, users, databases, schemas and privileges",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Explicit log level (error, warn, info, debug, trace); overrides -v and -q
    #[arg(long, global = true)]
    pub log_level: Option<log::LevelFilter>,

    /// Prefix for environment variables holding the connection details
    #[arg(long, global = true, default_value = DEFAULT_ENV_PREFIX)]
    pub env_prefix: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without changing anything
    Inspect(InspectArgs),

    /// Provision the cluster so it matches the definition
    Apply(ApplyArgs),

    /// Generate a password and its md5 role hash
    Password(PasswordArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct InspectArgs {
    /// Definition: inline JSON, a .json or .toml file, or - for stdin
    pub definition: String,

    /// Do not read the cluster; plan against an empty state
    #[arg(long)]
    pub no_current_state: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Definition: inline JSON, a .json or .toml file, or - for stdin
    pub definition: String,

    /// Do not execute any statement, just report what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct PasswordArgs {
    /// Role name the hash is salted with
    pub username: String,

    /// Use this password instead of generating one
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
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
    fn test_apply_flags() {
        let cli = Cli::parse_from(["pgo", "apply", "defs.json", "--dry-run", "-y"]);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.definition, "defs.json");
                assert!(args.dry_run);
                assert!(args.yes);
                assert_eq!(args.format, OutputFormat::Text);
            }
            _ => panic!("expected apply"),
        }
        assert_eq!(cli.env_prefix, "PGO_");
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "pgo",
            "inspect",
            "-",
            "--no-current-state",
            "--env-prefix",
            "STAGING_",
            "--log-level",
            "debug",
            "--format",
            "json",
        ]);
        assert_eq!(cli.env_prefix, "STAGING_");
        assert_eq!(cli.log_level, Some(log::LevelFilter::Debug));
        match cli.command {
            Command::Inspect(args) => {
                assert!(args.no_current_state);
                assert_eq!(args.format, OutputFormat::Json);
            }
            _ => panic!("expected inspect"),
        }
    }
}
