//! SSH/SFTP backend for the remote-transparency layer.
//!
//! Implements [`Executor`] against a remote host using `ssh2`. Each
//! operation opens a fresh TCP connection, handshakes, authenticates with a
//! password, performs its work, and drops the session. That is costly but
//! avoids session-affinity bugs in an infrequently-run installer; callers
//! must not rely on any state surviving between operations.
//!
//! Remote commands are executed on a pseudo-terminal as a compound
//! `cd <cwd>; <argv...>` line because SSH exec channels have no working
//! directory of their own. There is no timeout: a hung remote command blocks
//! the orchestrator indefinitely.

use crate::error::{InstallError, Result};
use crate::executor::{scrub_benign_stderr, CommandOutput, Executor};
use crate::target::RemoteHost;
use camino::{Utf8Path, Utf8PathBuf};
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::io::{Read, Write};
use std::net::TcpStream;

/// Executes operations on a remote host over SSH/SFTP.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    remote: RemoteHost,
}

impl SshExecutor {
    /// Creates an executor for the given host credentials.
    #[must_use]
    pub fn new(remote: RemoteHost) -> Self {
        Self { remote }
    }

    /// Opens, handshakes, and authenticates a fresh SSH session.
    fn session(&self) -> Result<Session> {
        let tcp = TcpStream::connect((self.remote.host.as_str(), self.remote.port))
            .map_err(|err| InstallError::Transport {
                operation: "connect",
                message: err.to_string(),
            })?;

        let mut session = Session::new().map_err(transport("session"))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(transport("handshake"))?;
        session
            .userauth_password(&self.remote.username, &self.remote.password)
            .map_err(transport("authenticate"))?;
        Ok(session)
    }

    fn sftp(&self) -> Result<Sftp> {
        self.session()?.sftp().map_err(transport("sftp"))
    }
}

/// Maps an `ssh2` error into a transport error for `operation`.
fn transport(operation: &'static str) -> impl Fn(ssh2::Error) -> InstallError {
    move |err| InstallError::Transport {
        operation,
        message: err.to_string(),
    }
}

/// Builds the compound command line sent over the exec channel.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use pkgforge::remote::remote_command_line;
///
/// let argv = vec!["make".to_owned(), "install".to_owned()];
/// let line = remote_command_line(&argv, Utf8Path::new("/opt/build/zlib-1.3"));
/// assert_eq!(line, "cd /opt/build/zlib-1.3; make install");
/// ```
#[must_use]
pub fn remote_command_line(argv: &[String], cwd: &Utf8Path) -> String {
    format!("cd {cwd}; {}", argv.join(" "))
}

impl Executor for SshExecutor {
    fn exists(&self, path: &Utf8Path) -> Result<bool> {
        let sftp = self.sftp()?;
        Ok(sftp.stat(path.as_std_path()).is_ok())
    }

    fn mkdirs(&self, path: &Utf8Path, mode: u32) -> Result<()> {
        let sftp = self.sftp()?;

        // SFTP has no recursive mkdir; create each missing segment in turn.
        let mut current = Utf8PathBuf::new();
        for component in path.components() {
            current.push(component);
            if current == "/" {
                continue;
            }
            if sftp.stat(current.as_std_path()).is_ok() {
                continue;
            }
            sftp.mkdir(current.as_std_path(), mode as i32)
                .map_err(transport("mkdir"))?;
        }
        Ok(())
    }

    fn read_file(&self, path: &Utf8Path) -> Result<Vec<u8>> {
        let sftp = self.sftp()?;
        let mut file = sftp.open(path.as_std_path()).map_err(transport("open"))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|err| InstallError::Transport {
                operation: "read",
                message: err.to_string(),
            })?;
        Ok(data)
    }

    fn write_file(&self, path: &Utf8Path, data: &[u8], mode: u32) -> Result<()> {
        let sftp = self.sftp()?;
        let mut file = sftp
            .open_mode(
                path.as_std_path(),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                mode as i32,
                OpenType::File,
            )
            .map_err(transport("create"))?;
        file.write_all(data).map_err(|err| InstallError::Transport {
            operation: "write",
            message: err.to_string(),
        })?;
        Ok(())
    }

    fn remove_file(&self, path: &Utf8Path) -> Result<()> {
        let sftp = self.sftp()?;
        sftp.unlink(path.as_std_path()).map_err(transport("unlink"))
    }

    fn remove_tree(&self, path: &Utf8Path) -> Result<()> {
        let sftp = self.sftp()?;
        remove_tree_inner(&sftp, path)
    }

    fn file_size(&self, path: &Utf8Path) -> Result<Option<u64>> {
        let sftp = self.sftp()?;
        match sftp.stat(path.as_std_path()) {
            Ok(stat) => Ok(stat.size),
            Err(_) => Ok(None),
        }
    }

    fn run_command(
        &self,
        argv: &[String],
        cwd: &Utf8Path,
        background: bool,
    ) -> Result<CommandOutput> {
        let session = self.session()?;
        let mut channel = session.channel_session().map_err(transport("channel"))?;
        channel
            .request_pty("xterm", None, None)
            .map_err(transport("pty"))?;

        let command_line = remote_command_line(argv, cwd);
        log::debug!("running remote command: {command_line}");
        channel.exec(&command_line).map_err(transport("exec"))?;

        if background {
            return Ok(CommandOutput::default());
        }

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|err| InstallError::Transport {
                operation: "read stdout",
                message: err.to_string(),
            })?;

        let mut stderr_raw = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr_raw)
            .map_err(|err| InstallError::Transport {
                operation: "read stderr",
                message: err.to_string(),
            })?;

        channel.wait_close().map_err(transport("close"))?;
        // The remote exit status is available here but deliberately unused;
        // failure classification is stderr-based for compatibility.
        let _ = channel.exit_status();

        Ok(CommandOutput {
            stdout,
            stderr: scrub_benign_stderr(&stderr_raw),
        })
    }
}

/// Depth-first removal via directory listing; the protocol has no atomic
/// recursive delete.
fn remove_tree_inner(sftp: &Sftp, path: &Utf8Path) -> Result<()> {
    let entries = sftp
        .readdir(path.as_std_path())
        .map_err(transport("readdir"))?;

    for (entry_path, stat) in entries {
        let entry = Utf8PathBuf::from_path_buf(entry_path).map_err(|p| {
            InstallError::Transport {
                operation: "readdir",
                message: format!("remote path is not valid UTF-8: {}", p.display()),
            }
        })?;

        if stat.is_dir() {
            remove_tree_inner(sftp, &entry)?;
        } else {
            sftp.unlink(entry.as_std_path()).map_err(transport("unlink"))?;
        }
    }

    sftp.rmdir(path.as_std_path()).map_err(transport("rmdir"))
}
