//! The remote-transparency layer.
//!
//! Every stage of the pipeline performs its filesystem and process work
//! through the [`Executor`] trait, never through raw `std::fs` or SSH
//! primitives. Two backends exist: [`LocalExecutor`] (direct syscalls and
//! `std::process`) and [`crate::remote::SshExecutor`] (SSH exec + SFTP),
//! selected from the [`ExecutionTarget`] by [`executor_for`]. No code above
//! this boundary may branch on local-versus-remote.

use crate::error::Result;
use crate::remote::SshExecutor;
use crate::target::ExecutionTarget;
use camino::Utf8Path;
use std::process::{Command, Stdio};

/// Captured output of a finished command.
///
/// `stderr` has already been scrubbed by [`scrub_benign_stderr`]: it is empty
/// unless the raw stderr text contained the case-insensitive substring
/// `error`. A command counts as failed exactly when `stderr` is non-empty;
/// exit codes are deliberately not consulted. This heuristic is brittle
/// (tools whose normal diagnostics mention "error" read as failures, tools
/// that fail silently read as successes) but is kept for compatibility with
/// the package descriptions this tool consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Scrubbed standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` if the command is considered to have succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// Blanks stderr text that does not look like an error report.
///
/// # Examples
///
/// ```
/// use pkgforge::executor::scrub_benign_stderr;
///
/// assert_eq!(scrub_benign_stderr("checking for gcc... yes"), "");
/// assert_eq!(
///     scrub_benign_stderr("configure: error: no C compiler"),
///     "configure: error: no C compiler"
/// );
/// ```
#[must_use]
pub fn scrub_benign_stderr(raw: &str) -> String {
    if raw.to_lowercase().contains("error") {
        raw.to_owned()
    } else {
        String::new()
    }
}

/// Uniform filesystem and process operations against an execution target.
///
/// Remote implementations open a fresh session per call; callers must not
/// assume any state is shared between operations.
pub trait Executor {
    /// Returns whether `path` exists on the target.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure; a missing path is `Ok(false)`.
    fn exists(&self, path: &Utf8Path) -> Result<bool>;

    /// Creates `path` and any missing intermediate directories with `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn mkdirs(&self, path: &Utf8Path, mode: u32) -> Result<()>;

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>>;

    /// Writes `data` to `path` with `mode`, creating or truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write_file(&self, path: &Utf8Path, data: &[u8], mode: u32) -> Result<()>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    fn remove_file(&self, path: &Utf8Path) -> Result<()>;

    /// Removes the directory tree rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be removed.
    fn remove_tree(&self, path: &Utf8Path) -> Result<()>;

    /// Returns the size of the file at `path`, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure.
    fn file_size(&self, path: &Utf8Path) -> Result<Option<u64>>;

    /// Runs `argv` with `cwd` as working directory, capturing output.
    ///
    /// With `background` set, the command is spawned detached and an empty
    /// output is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or the transport
    /// fails. A command that runs but reports an error on stderr is not an
    /// `Err`; it surfaces through [`CommandOutput::succeeded`].
    fn run_command(&self, argv: &[String], cwd: &Utf8Path, background: bool)
        -> Result<CommandOutput>;
}

/// Selects the executor backend for a target.
#[must_use]
pub fn executor_for(target: &ExecutionTarget) -> Box<dyn Executor> {
    match target {
        ExecutionTarget::Local => Box::new(LocalExecutor),
        ExecutionTarget::Remote(remote) => Box::new(SshExecutor::new(remote.clone())),
    }
}

/// Executes operations on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl Executor for LocalExecutor {
    fn exists(&self, path: &Utf8Path) -> Result<bool> {
        Ok(path.as_std_path().exists())
    }

    fn mkdirs(&self, path: &Utf8Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::DirBuilderExt;

        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path.as_std_path())?;
        Ok(())
    }

    fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path.as_std_path())?)
    }

    fn write_file(&self, path: &Utf8Path, data: &[u8], mode: u32) -> Result<()> {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path.as_std_path())?;
        file.write_all(data)?;
        Ok(())
    }

    fn remove_file(&self, path: &Utf8Path) -> Result<()> {
        std::fs::remove_file(path.as_std_path())?;
        Ok(())
    }

    fn remove_tree(&self, path: &Utf8Path) -> Result<()> {
        std::fs::remove_dir_all(path.as_std_path())?;
        Ok(())
    }

    fn file_size(&self, path: &Utf8Path) -> Result<Option<u64>> {
        match std::fs::metadata(path.as_std_path()) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn run_command(
        &self,
        argv: &[String],
        cwd: &Utf8Path,
        background: bool,
    ) -> Result<CommandOutput> {
        log::debug!("running {:?} in {cwd}", argv.join(" "));

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| std::io::Error::other("empty command line"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(cwd.as_std_path());

        if background {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            cmd.spawn()?;
            return Ok(CommandOutput::default());
        }

        cmd.stdin(Stdio::null());
        let output = cmd.output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = scrub_benign_stderr(&String::from_utf8_lossy(&output.stderr));

        log::debug!("command {:?} stdout:\n{stdout}", argv.join(" "));
        if !stderr.is_empty() {
            log::debug!("command {:?} stderr:\n{stderr}", argv.join(" "));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
