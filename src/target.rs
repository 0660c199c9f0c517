//! Execution target identity.
//!
//! An [`ExecutionTarget`] names the machine every filesystem and process
//! operation runs against: either the local host, or a remote host reached
//! over SSH. The target carries identity and credentials only; behaviour
//! lives behind the [`crate::executor::Executor`] trait.

use crate::error::{InstallError, Result};

/// Host strings that select the local execution backend.
pub const LOCALHOST_SENTINELS: &[&str] = &["localhost", "127.0.0.1"];

/// Credentials for a remote SSH host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

/// The machine a pipeline run operates on.
///
/// Constructed once per orchestrator invocation and passed by reference to
/// every stage. Holds no connection state; each remote operation opens and
/// closes its own session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// The local machine.
    Local,
    /// A remote host reached over SSH/SFTP.
    Remote(RemoteHost),
}

impl ExecutionTarget {
    /// Builds a target from a host string and optional credentials.
    ///
    /// `"localhost"` and `"127.0.0.1"` select the local backend and ignore
    /// the credentials. Any other host requires both a user and a password.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::MissingCredentials`] if a remote host is named
    /// without full credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use pkgforge::target::ExecutionTarget;
    ///
    /// let local = ExecutionTarget::from_host("localhost", 22, None, None)?;
    /// assert!(local.is_local());
    /// # Ok::<(), pkgforge::error::InstallError>(())
    /// ```
    pub fn from_host(
        host: &str,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        if LOCALHOST_SENTINELS.contains(&host) {
            return Ok(Self::Local);
        }

        match (username, password) {
            (Some(username), Some(password)) => Ok(Self::Remote(RemoteHost {
                host: host.to_owned(),
                port,
                username,
                password,
            })),
            _ => Err(InstallError::MissingCredentials {
                host: host.to_owned(),
            }),
        }
    }

    /// Returns `true` for the local backend.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::name("localhost")]
    #[case::loopback("127.0.0.1")]
    fn sentinel_hosts_select_local(#[case] host: &str) {
        let target = ExecutionTarget::from_host(host, 22, None, None)
            .expect("sentinel host should resolve");
        assert!(target.is_local());
    }

    #[test]
    fn remote_host_with_credentials_resolves() {
        let target = ExecutionTarget::from_host(
            "build-box.example.net",
            2222,
            Some("builder".to_owned()),
            Some("secret".to_owned()),
        )
        .expect("remote host with credentials should resolve");

        match target {
            ExecutionTarget::Remote(remote) => {
                assert_eq!(remote.host, "build-box.example.net");
                assert_eq!(remote.port, 2222);
                assert_eq!(remote.username, "builder");
            }
            ExecutionTarget::Local => panic!("expected remote target"),
        }
    }

    #[rstest]
    #[case::no_credentials(None, None)]
    #[case::user_only(Some("builder".to_owned()), None)]
    #[case::password_only(None, Some("secret".to_owned()))]
    fn remote_host_without_full_credentials_is_rejected(
        #[case] user: Option<String>,
        #[case] password: Option<String>,
    ) {
        let err = ExecutionTarget::from_host("build-box.example.net", 22, user, password)
            .expect_err("expected credential validation to fail");
        assert!(matches!(err, InstallError::MissingCredentials { host } if host == "build-box.example.net"));
    }
}
