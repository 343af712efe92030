//! Defines the command-line arguments and subcommands for the annotweave CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "annotweave",
    version,
    about = "Injects tool configuration into annotation literals without disturbing formatting."
)]
pub struct AnnotweaveArgs {
    /// Increase log output (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rewrite tool annotations in a source file or directory.
    Rewrite {
        /// A source file, or a directory searched recursively.
        #[arg(required = true)]
        path: PathBuf,
        /// The rewrite plan (YAML, or JSON with a `.json` extension).
        #[arg(long)]
        plan: PathBuf,
        /// What to do with rewritten documents.
        #[arg(long, value_enum, default_value_t = Mode::Diff)]
        mode: Mode,
    },
    /// Show the annotated functions of a source file.
    Ast {
        /// The source file to parse.
        #[arg(required = true)]
        file: PathBuf,
        /// Dump the full syntax tree as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Write rewritten documents back to disk.
    Write,
    /// Exit with status 1 when any document would change.
    Check,
    /// Print a line diff of every change.
    Diff,
}
