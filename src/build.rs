//! Build strategies and patch application.
//!
//! A strategy is a fixed command sequence run on the execution target,
//! selected by the package's `build_type`. All strategies apply the package's
//! patches first. Each step must finish with empty scrubbed stderr before the
//! next runs; the first failure aborts.

use crate::error::{InstallError, Result};
use crate::executor::{CommandOutput, Executor};
use crate::spec::PackageSpec;
use camino::Utf8Path;

/// Mode applied to patch files pushed to the target.
const PATCH_FILE_MODE: u32 = 0o644;

/// Runs the build strategy named by the package's `build_type`.
///
/// # Errors
///
/// Returns [`InstallError::UnknownBuildType`] for an unrecognised type, a
/// patch error if a patch is missing or fails to apply, or an execution
/// error for the first failing build step.
pub fn run_build_strategy(spec: &PackageSpec, executor: &dyn Executor) -> Result<()> {
    match spec.build_type.as_str() {
        // imake differs from make only in where the build happens, which the
        // resolver already folded into build_path.
        "make" | "imake" => make_build(spec, executor, false),
        "cmake" => make_build(spec, executor, true),
        "distutils" => distutils_build(spec, executor),
        other => Err(InstallError::UnknownBuildType {
            name: spec.name.clone(),
            build_type: other.to_owned(),
        }),
    }
}

/// configure (or cmake), make, make install.
fn make_build(spec: &PackageSpec, executor: &dyn Executor, cmake: bool) -> Result<()> {
    apply_patches(spec, executor)?;
    executor.mkdirs(&spec.build_path, 0o755)?;

    let configure = if cmake {
        let mut argv = vec![
            "cmake".to_owned(),
            spec.source_extracted_path.to_string(),
            format!("-DCMAKE_INSTALL_PREFIX={}", spec.install_path),
        ];
        argv.extend(spec.configure_args.iter().cloned());
        argv
    } else {
        let program = if spec.configure_cmd.is_empty() {
            spec.source_extracted_path.join("configure").to_string()
        } else {
            spec.configure_cmd.clone()
        };
        let mut argv = vec![program, format!("--prefix={}", spec.install_path)];
        argv.extend(spec.configure_args.iter().cloned());
        argv
    };

    run_step(executor, &configure, &spec.build_path)?;
    run_step(executor, &["make".to_owned()], &spec.build_path)?;
    run_step(
        executor,
        &["make".to_owned(), "install".to_owned()],
        &spec.build_path,
    )?;
    Ok(())
}

/// `python3 setup.py install` inside the extracted source.
fn distutils_build(spec: &PackageSpec, executor: &dyn Executor) -> Result<()> {
    apply_patches(spec, executor)?;
    run_step(
        executor,
        &[
            "python3".to_owned(),
            "setup.py".to_owned(),
            "install".to_owned(),
        ],
        &spec.source_extracted_path,
    )
}

fn run_step(executor: &dyn Executor, argv: &[String], cwd: &Utf8Path) -> Result<()> {
    let output = executor.run_command(argv, cwd, false)?;
    check_step(argv, &output)
}

fn check_step(argv: &[String], output: &CommandOutput) -> Result<()> {
    if output.succeeded() {
        Ok(())
    } else {
        Err(InstallError::Execution {
            command: argv.join(" "),
            stderr: output.stderr.clone(),
        })
    }
}

/// Applies the package's patches in order from the source directory.
///
/// Patch files are local configuration inputs: each is read on this machine,
/// pushed to a temporary path inside the source tree on the target, applied
/// with `patch -p1`, and the temporary copy removed again.
fn apply_patches(spec: &PackageSpec, executor: &dyn Executor) -> Result<()> {
    for patch in &spec.patches {
        if !patch.as_std_path().exists() {
            return Err(InstallError::PatchMissing {
                patch: patch.clone(),
            });
        }

        let contents = std::fs::read(patch.as_std_path())?;
        let file_name = patch.file_name().unwrap_or("patch.diff");
        let staged = spec.source_extracted_path.join(file_name);
        executor.write_file(&staged, &contents, PATCH_FILE_MODE)?;

        let argv = vec![
            "patch".to_owned(),
            "-p1".to_owned(),
            format!("--input={staged}"),
        ];
        let output = executor.run_command(&argv, &spec.source_extracted_path, false)?;
        executor.remove_file(&staged)?;

        if !output.succeeded() {
            return Err(InstallError::PatchFailed {
                patch: patch.clone(),
                stderr: output.stderr,
            });
        }
        log::info!("applied patch {patch} to {}", spec.name);
    }
    Ok(())
}
