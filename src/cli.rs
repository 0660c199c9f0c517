//! CLI argument definitions for the pkgforge orchestrator.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::Parser;

/// Build and install third-party packages from a manifest.
#[derive(Parser, Debug)]
#[command(name = "pkgforge")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build and install third-party packages from a manifest.\n\n",
    "pkgforge reads a TOML manifest of package descriptions, downloads the ",
    "source archives into a cache, extracts them, runs each package's ",
    "configure/make/install sequence, deploys configuration files, runs ",
    "pre- and post-install scripts, and verifies the installation.\n\n",
    "Every stage is idempotent: re-running a manifest only performs the work ",
    "that is still missing. Point --host at a remote machine to perform every ",
    "step there over SSH instead of locally.",
))]
#[command(after_help = concat!(
    "DIRECTORY LAYOUT (beneath the project root):\n",
    "  externals/src_repo    downloaded archives\n",
    "  externals/src         extracted sources\n",
    "  externals/build       out-of-tree builds\n",
    "  externals/install     installed packages, one directory per package\n\n",
    "EXAMPLES:\n",
    "  Install everything in a manifest locally:\n",
    "    $ pkgforge packages.toml --project-root /work/project\n\n",
    "  Use the PROJECT_ROOT environment variable instead of the flag:\n",
    "    $ PROJECT_ROOT=/work/project pkgforge packages.toml\n\n",
    "  Install onto a remote host:\n",
    "    $ pkgforge packages.toml --host build02 --user ci --password secret\n",
))]
pub struct Cli {
    /// Path to the package manifest.
    #[arg(value_name = "MANIFEST")]
    pub manifest: Utf8PathBuf,

    /// Project root directory [default: the PROJECT_ROOT environment variable].
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<Utf8PathBuf>,

    /// Host to install onto; localhost/127.0.0.1 means this machine.
    #[arg(long, value_name = "HOST", default_value = "localhost")]
    pub host: String,

    /// SSH port for remote hosts.
    #[arg(long, value_name = "PORT", default_value_t = 22)]
    pub port: u16,

    /// SSH user name (required for remote hosts).
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,

    /// SSH password (required for remote hosts).
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}
