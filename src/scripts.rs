//! Pre/post-install script execution and config-file deployment.
//!
//! Scripts and config-file templates are local configuration inputs. Each is
//! read on this machine, has both substitution passes applied to its
//! contents, and is then pushed to the execution target. Scripts run there
//! from a temporary copy that is removed afterwards; config files are written
//! to their destination and stay.

use crate::error::{InstallError, Result};
use crate::executor::Executor;
use crate::output::{finish_progress, start_progress, write_line};
use crate::spec::PackageSpec;
use crate::substitute::{env_bindings, substitute_text};
use camino::Utf8Path;
use std::io::Write;

/// Mode applied to temporary script copies on the target.
const SCRIPT_FILE_MODE: u32 = 0o755;
/// Mode applied to deployed config files.
const CONFIG_FILE_MODE: u32 = 0o644;

/// Runs the package's pre-install scripts from the extracted source tree.
///
/// # Errors
///
/// Returns [`InstallError::ScriptFailed`] for the first script that reports
/// an error on stderr, or a transport error. A script file that does not
/// exist locally is announced and skipped, not an error.
pub fn run_pre_install_scripts(
    spec: &PackageSpec,
    executor: &dyn Executor,
    stderr: &mut dyn Write,
) -> Result<()> {
    for script in &spec.pre_install_scripts {
        run_script(spec, executor, script, &spec.source_extracted_path, stderr)?;
    }
    Ok(())
}

/// Runs the package's post-install scripts from the install directory.
///
/// Falls back to the orchestrator's own working directory when the install
/// directory does not exist on the target (a strategy may legitimately
/// install nothing there, e.g. distutils).
///
/// # Errors
///
/// As [`run_pre_install_scripts`].
pub fn run_post_install_scripts(
    spec: &PackageSpec,
    executor: &dyn Executor,
    stderr: &mut dyn Write,
) -> Result<()> {
    if spec.post_install_scripts.is_empty() {
        return Ok(());
    }

    let fallback;
    let cwd: &Utf8Path = if executor.exists(&spec.install_path)? {
        &spec.install_path
    } else {
        let current = std::env::current_dir()?;
        fallback = camino::Utf8PathBuf::from_path_buf(current)
            .map_err(|p| std::io::Error::other(format!("non-UTF-8 working directory: {}", p.display())))?;
        &fallback
    };

    for script in &spec.post_install_scripts {
        run_script(spec, executor, script, cwd, stderr)?;
    }
    Ok(())
}

/// Runs one script: substitute its contents, stage a temp copy on the
/// target, execute it with `bash` from `cwd`, remove the copy.
fn run_script(
    spec: &PackageSpec,
    executor: &dyn Executor,
    script: &Utf8Path,
    cwd: &Utf8Path,
    stderr: &mut dyn Write,
) -> Result<()> {
    start_progress(stderr, "SCRIPT", script.as_str());
    if !script.as_std_path().exists() {
        finish_progress(stderr, "NOT FOUND");
        return Ok(());
    }

    let contents = std::fs::read_to_string(script.as_std_path())?;
    let resolved = resolve_contents(&contents, spec);

    let stem = script.file_name().unwrap_or("script");
    let staged = cwd.join(format!("{stem}-temp.sh"));
    executor.write_file(&staged, resolved.as_bytes(), SCRIPT_FILE_MODE)?;

    let argv = vec!["bash".to_owned(), staged.to_string()];
    let output = executor.run_command(&argv, cwd, false)?;
    executor.remove_file(&staged)?;

    if output.succeeded() {
        finish_progress(stderr, "PASSED");
        Ok(())
    } else {
        finish_progress(stderr, "FAILED");
        Err(InstallError::ScriptFailed {
            script: script.to_owned(),
            stderr: output.stderr,
        })
    }
}

/// Deploys the package's config-file templates to the target.
///
/// # Errors
///
/// Returns [`InstallError::ConfigFileMissing`] if a template is absent
/// locally, or a transport error while writing.
pub fn deploy_config_files(
    spec: &PackageSpec,
    executor: &dyn Executor,
    stderr: &mut dyn Write,
) -> Result<()> {
    for (source, dest) in &spec.config_files {
        if !source.as_std_path().exists() {
            return Err(InstallError::ConfigFileMissing {
                path: source.clone(),
            });
        }

        write_line(stderr, &format!("[COPY] {source} -> {dest}"));
        let contents = std::fs::read_to_string(source.as_std_path())?;
        let resolved = resolve_contents(&contents, spec);

        if let Some(parent) = dest.parent() {
            executor.mkdirs(parent, 0o755)?;
        }
        executor.write_file(dest, resolved.as_bytes(), CONFIG_FILE_MODE)?;
    }
    Ok(())
}

/// Applies the package pass and then the environment pass to file contents.
fn resolve_contents(contents: &str, spec: &PackageSpec) -> String {
    let once = substitute_text(contents, &spec.package_vars());
    substitute_text(&once, &env_bindings())
}
