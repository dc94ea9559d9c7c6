// src/cli/args.rs
// CLI argument definitions using clap, following the teacher's
// CliArgs/OutputFormat convention (backend/src/cli/args.rs) scaled down to an
// operational tool rather than an interactive REPL.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// hinata-core administrative CLI
#[derive(Parser, Debug)]
#[command(name = "hinata")]
#[command(author)]
#[command(version)]
#[command(about = "Operational commands for the hinata-core personalization backend", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Output format for command results
    #[arg(long, default_value = "text", value_enum)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Creates tables and directories for a fresh deployment, then exits.
    Init,

    /// Runs one bounded pass of tier migration.
    Migrate {
        /// Maximum number of candidate observations examined in this pass.
        #[arg(long, default_value = "500")]
        batch_size: i64,
    },

    /// Writes a JSON snapshot of every user's warm-tier observations to
    /// `out_dir`. The cold tier is already durable on disk and is not
    /// duplicated.
    Backup {
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Recomputes normalized-weight and influence-weight invariants for
    /// every user with at least one observation and reports violations.
    VerifyInvariants,

    /// Rebuilds the vector and full-text indexes from the warm tier for
    /// every user. Use after restoring a backup or changing embedding
    /// dimensions.
    Reindex,

    /// Prints a user's current profile components.
    DumpProfile {
        user: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_migrate_with_default_batch_size() {
        let args = CliArgs::parse_from(["hinata", "migrate"]);
        match args.command {
            Command::Migrate { batch_size } => assert_eq!(batch_size, 500),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_dump_profile_user() {
        let args = CliArgs::parse_from(["hinata", "dump-profile", "user-1"]);
        match args.command {
            Command::DumpProfile { user } => assert_eq!(user, "user-1"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_json_output_format() {
        let args = CliArgs::parse_from(["hinata", "--output-format", "json", "init"]);
        assert_eq!(args.output_format, OutputFormat::Json);
    }
}
