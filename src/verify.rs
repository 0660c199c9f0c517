//! Installation verification.
//!
//! A package counts as installed only when every declared check passes:
//! each check file exists on the target and each check command prints the
//! expected stdout with no error on stderr. Any failure, including an
//! execution error, reads as "not installed"; verification never propagates
//! errors.

use crate::executor::Executor;
use crate::spec::PackageSpec;
use camino::Utf8Path;

/// Returns whether every installation check for `spec` passes on the target.
#[must_use]
pub fn is_package_installed(spec: &PackageSpec, executor: &dyn Executor) -> bool {
    for file in &spec.install_check_files {
        // join lets absolute entries stand alone and resolves relative ones
        // beneath the install root.
        let path = spec.install_root.join(file);
        match executor.exists(&path) {
            Ok(true) => {}
            Ok(false) | Err(_) => return false,
        }
    }

    for (command, expected) in &spec.install_check_cmds {
        let argv: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
        let output = match executor.run_command(&argv, Utf8Path::new("."), false) {
            Ok(output) => output,
            Err(_) => return false,
        };
        if !output.succeeded() || output.stdout.trim() != expected.trim() {
            return false;
        }
    }

    true
}
