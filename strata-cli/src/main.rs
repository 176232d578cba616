// SPDX-License-Identifier: AGPL-3.0-or-later
//! Strata CLI
//!
//! Inspect and watch files through the domain-addressed virtual filesystem.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_vfs::MountConfig;

#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about = "Strata - domain-addressed virtual filesystem", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to strata.toml in the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serve a directory under a domain, e.g. `assets=./assets`
    #[arg(short, long = "mount", value_name = "DOMAIN=DIR", global = true, value_parser = commands::parse_mount)]
    mounts: Vec<MountConfig>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Display file contents
    Cat {
        /// File to display
        path: String,
    },

    /// Print content fingerprints
    #[command(alias = "fp")]
    Fingerprint {
        /// Files to fingerprint
        #[arg(required = true)]
        paths: Vec<String>,

        /// Hash whole files instead of a bounded prefix
        #[arg(short, long)]
        exact: bool,
    },

    /// Show file or directory information
    Stat {
        /// Path to inspect
        path: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how paths split into domain, parents, stem and extension
    Parts {
        /// Paths to decompose; nothing needs to exist
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Resolve a domain-less path to the first domain that has it
    Canonical {
        path: String,
    },

    /// List mounted backends
    Backends,

    /// Report files as they are created, changed or deleted
    Watch {
        /// Files to watch
        #[arg(required = true)]
        paths: Vec<String>,

        /// Milliseconds between polls
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    commands::init_logging(cli.verbose);

    let result = commands::open_vfs(cli.config.as_deref(), cli.mounts).and_then(|vfs| {
        match cli.command {
            Commands::Cat { path } => commands::cat(&vfs, &path),
            Commands::Fingerprint { paths, exact } => commands::fingerprint(&vfs, &paths, exact),
            Commands::Stat { path, json } => commands::stat(&vfs, &path, json),
            Commands::Parts { paths } => commands::parts(&paths),
            Commands::Canonical { path } => commands::canonical(&vfs, &path),
            Commands::Backends => commands::backends(&vfs),
            Commands::Watch { paths, interval_ms, count } => {
                commands::watch(&vfs, &paths, interval_ms, count)
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
