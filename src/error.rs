//! Error types for the package installation pipeline.
//!
//! Configuration problems (missing keys, unsupported archive suffixes,
//! unknown build types) are always fatal and never retried. Execution
//! failures abort the current batch. Transport failures are remote-only and
//! carry the SSH operation that failed.

use crate::download::DownloadError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or installing packages.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A mandatory package description key is absent.
    #[error("package description missing mandatory key \"{key}\"")]
    MissingKey {
        /// Name of the absent key.
        key: &'static str,
    },

    /// A package declares no way to prove it is installed.
    #[error(
        "package {name}: \"install_check_files\" and \"install_check_cmds\" cannot both be \
         empty; at least one installation check is required"
    )]
    NoInstallProof {
        /// Name of the offending package.
        name: String,
    },

    /// The package file name does not end in a recognised archive suffix.
    #[error(
        "file {file_name} is not a supported archive; supported suffixes are \
         .git, .zip, .tar, .tar.bz2, .tar.gz and .tar.xz"
    )]
    UnsupportedArchive {
        /// The unrecognised file name.
        file_name: String,
    },

    /// The package names a build type with no matching strategy.
    #[error("package {name}: build type \"{build_type}\" is not supported")]
    UnknownBuildType {
        /// Name of the offending package.
        name: String,
        /// The unrecognised build type.
        build_type: String,
    },

    /// A substitution tree contains a value outside the closed set of
    /// supported types (string, integer, boolean, list, map).
    #[error("value type \"{kind}\" is not supported in package configuration")]
    UnsupportedValue {
        /// The TOML type name of the rejected value.
        kind: &'static str,
    },

    /// The package manifest could not be read or parsed.
    #[error("invalid manifest at {path}: {reason}")]
    InvalidManifest {
        /// Path to the manifest file.
        path: Utf8PathBuf,
        /// Description of the parse or read failure.
        reason: String,
    },

    /// The `PROJECT_ROOT` environment variable is not set.
    #[error("PROJECT_ROOT environment variable is not set")]
    ProjectRootUnset,

    /// A remote host was requested without full credentials.
    #[error("remote host {host} requires --user and --password")]
    MissingCredentials {
        /// The remote host name.
        host: String,
    },

    /// A shelled-out command reported an error on stderr.
    #[error("command \"{command}\" failed: {stderr}")]
    Execution {
        /// The command line that was run.
        command: String,
        /// The captured (scrubbed) stderr text.
        stderr: String,
    },

    /// A pre- or post-install script reported an error.
    #[error("script {script} execution failed: {stderr}")]
    ScriptFailed {
        /// Path of the failing script.
        script: Utf8PathBuf,
        /// The captured stderr text.
        stderr: String,
    },

    /// A listed patch file does not exist.
    #[error("patch file {patch} does not exist")]
    PatchMissing {
        /// Path of the missing patch file.
        patch: Utf8PathBuf,
    },

    /// Patch application failed.
    #[error("patch {patch} failed to apply: {stderr}")]
    PatchFailed {
        /// Path of the failing patch file.
        patch: Utf8PathBuf,
        /// The captured stderr text.
        stderr: String,
    },

    /// A config-file source listed in the package description is absent.
    #[error("configuration file {path} does not exist")]
    ConfigFileMissing {
        /// Path of the missing source file.
        path: Utf8PathBuf,
    },

    /// Downloading a package archive failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// An SSH or SFTP operation failed at the transport level.
    #[error("remote {operation} failed: {message}")]
    Transport {
        /// The transport operation that failed.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// A local I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`InstallError`].
pub type Result<T> = std::result::Result<T, InstallError>;
