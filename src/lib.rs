//! pkgforge library.
//!
//! This crate provides the core functionality for downloading, building, and
//! installing third-party packages from declarative descriptions. It is used
//! by the `pkgforge` CLI binary and can be consumed programmatically for
//! testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`build`] - Build strategies (make, imake, cmake, distutils) and patches
//! - [`cli`] - Command-line argument definitions
//! - [`download`] - Archive download with mirror fallback and cache checks
//! - [`error`] - Semantic error types
//! - [`executor`] - The remote-transparency layer and its local backend
//! - [`extract`] - Suffix-dispatched archive extraction
//! - [`manifest`] - Manifest parsing and root-directory layout
//! - [`output`] - Progress reporting helpers
//! - [`pipeline`] - Download/extract/install stage orchestration
//! - [`remote`] - SSH/SFTP executor backend
//! - [`scripts`] - Pre/post-install scripts and config-file deployment
//! - [`spec`] - Package specification resolution
//! - [`substitute`] - Recursive `$TOKEN` substitution engine
//! - [`target`] - Local-versus-remote execution target selection
//! - [`verify`] - Installation verification

pub mod build;
pub mod cli;
pub mod download;
pub mod error;
pub mod executor;
pub mod extract;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod remote;
pub mod scripts;
pub mod spec;
pub mod substitute;
pub mod target;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
