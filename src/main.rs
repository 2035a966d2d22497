mod cli;
mod commands;
mod config;
mod definition;
mod password;
mod progress;
mod transport;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use provision::ErrorCategory;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub env_prefix: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(match cli.log_level {
            Some(level) => level,
            None if cli.quiet => log::LevelFilter::Error,
            None => log_level,
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        quiet: cli.quiet,
        env_prefix: cli.env_prefix,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            let category = err
                .downcast_ref::<provision::Error>()
                .map(provision::Error::category);
            if let Some(category) = category {
                ui::hint(&format!("{}. {}", category.description(), category.advice()));
            }
            ExitCode::from(exit_code(category))
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Inspect(args) => commands::inspect::run(ctx, args),
        Command::Apply(args) => commands::apply::run(ctx, args),
        Command::Password(args) => commands::password::run(args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "pgo", &mut io::stdout());
            Ok(())
        }
    }
}

/// Process exit code for a failed run.
fn exit_code(category: Option<ErrorCategory>) -> u8 {
    match category {
        Some(ErrorCategory::Validation) => 2,
        Some(ErrorCategory::Dependency) => 3,
        Some(ErrorCategory::Connection | ErrorCategory::Introspection) => 4,
        Some(ErrorCategory::Execution) => 5,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_class() {
        assert_eq!(exit_code(Some(ErrorCategory::Validation)), 2);
        assert_eq!(exit_code(Some(ErrorCategory::Dependency)), 3);
        assert_eq!(exit_code(Some(ErrorCategory::Connection)), 4);
        assert_eq!(exit_code(Some(ErrorCategory::Introspection)), 4);
        assert_eq!(exit_code(Some(ErrorCategory::Execution)), 5);
        assert_eq!(exit_code(None), 1);
    }
}
