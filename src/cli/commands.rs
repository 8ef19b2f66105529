//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Modguard - state enforcement for MOD security appliances.
#[derive(Parser, Debug)]
#[command(name = "modguard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the node configuration file.
    #[arg(short, long, global = true, env = "MODGUARD_NODE_CONFIG")]
    pub node_config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a node configuration skeleton.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the node configuration.
    Validate,

    /// Check connectivity to the device.
    Ping,

    /// Show the currently booted build number.
    Version,

    /// Look up the management interface address.
    MgmtIp,

    /// Verify a command specification against the device without applying.
    Verify {
        /// Path to the command specification file.
        spec: PathBuf,
    },

    /// Enforce a command specification on the device.
    Configure {
        /// Path to the command specification file.
        spec: PathBuf,

        /// Plan only: report what would change, apply nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ensure licenses are loaded on the device.
    Licenses {
        /// Path to the license-load specification file.
        spec: PathBuf,

        /// Plan only: report what would change, apply nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ensure the appliance is registered.
    Register {
        /// Path to the registration specification file.
        spec: PathBuf,

        /// Plan only: report what would change, apply nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a vendor's pattern database has been downloaded.
    DbStatus {
        /// Vendor name (BASE, CLAM).
        vendor: String,
    },

    /// Check that pattern databases will not expire soon.
    DbExpiry {
        /// Vendor names (BASE, CLAM, or ALL).
        #[arg(required = true)]
        vendors: Vec<String>,

        /// Minimum days remaining before a database counts as expiring.
        #[arg(long, default_value = "0")]
        days: i64,
    },

    /// Upgrade the firmware to a target build.
    Upgrade {
        /// URL of the image for the appliance to fetch.
        #[arg(long)]
        image_url: String,

        /// Target build number.
        #[arg(long)]
        build: i64,

        /// Proceed even when the running build is not older than the target.
        #[arg(long)]
        force: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
