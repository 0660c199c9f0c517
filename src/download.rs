//! Archive download with mirror fallback and cache validation.
//!
//! Dispatches on the archive suffix and the mirror URL scheme: `*.git`
//! packages are cloned with `git` through the executor, `ftp://` mirrors are
//! fetched with `wget` through the executor, and HTTP(S) mirrors are fetched
//! in-process over [`ArchiveFetcher`] and written to the target's cache
//! through the executor. A cache file already present on the target is
//! trusted on sight and no mirror is contacted; within a fetch attempt, a
//! file whose byte count matches the mirror's `Content-Length` is likewise
//! kept rather than fetched again.

use crate::error::Result;
use crate::executor::Executor;
use crate::spec::PackageSpec;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Mode applied to downloaded archive files.
const ARCHIVE_FILE_MODE: u32 = 0o644;

/// Upper bound for an entire HTTP exchange.
const HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors raised while fetching a package archive.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The server responded with an HTTP error or the exchange failed.
    #[error("download of {url} failed: {reason}")]
    HttpError {
        /// The URL that failed.
        url: String,
        /// Description of the failure.
        reason: String,
    },

    /// The server responded 404.
    #[error("{url} was not found on the server")]
    NotFound {
        /// The URL that was not found.
        url: String,
    },

    /// The downloaded byte count disagrees with the advertised length.
    #[error("download of {url} is incomplete: expected {expected} bytes, received {actual}")]
    SizeMismatch {
        /// The URL that was fetched.
        url: String,
        /// The advertised `Content-Length`.
        expected: u64,
        /// The number of bytes actually received.
        actual: u64,
    },

    /// Every mirror for a package failed.
    #[error("package {package}: all download mirrors failed")]
    AllMirrorsFailed {
        /// Name of the package that could not be fetched.
        package: String,
    },
}

/// A fetched archive body together with its advertised length.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    /// The archive bytes.
    pub data: Vec<u8>,
    /// The `Content-Length` the server advertised, if any.
    pub advertised_len: Option<u64>,
}

/// Retrieves archives over HTTP(S).
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveFetcher {
    /// Returns the `Content-Length` the mirror advertises for `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the request fails.
    fn content_length(&self, url: &str) -> std::result::Result<Option<u64>, DownloadError>;

    /// Fetches the whole body at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the request fails or the body cannot be
    /// read.
    fn fetch(&self, url: &str) -> std::result::Result<FetchedArchive, DownloadError>;
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

fn advertised_length(headers: &ureq::http::HeaderMap) -> Option<u64> {
    headers
        .get("content-length")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// [`ArchiveFetcher`] backed by `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl ArchiveFetcher for HttpFetcher {
    fn content_length(&self, url: &str) -> std::result::Result<Option<u64>, DownloadError> {
        let response = http_agent()
            .head(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;

        Ok(advertised_length(response.headers()))
    }

    fn fetch(&self, url: &str) -> std::result::Result<FetchedArchive, DownloadError> {
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;

        let advertised_len = advertised_length(response.headers());

        let mut data = Vec::new();
        std::io::copy(&mut response.into_body().as_reader(), &mut data).map_err(|e| {
            DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            }
        })?;

        Ok(FetchedArchive {
            data,
            advertised_len,
        })
    }
}

/// How a download stage concluded for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The cache already held a valid copy.
    AlreadyCached,
    /// The archive was fetched from a mirror.
    Downloaded,
}

/// Joins a mirror base URL and a file name with exactly one separator.
fn mirror_url(base: &str, file_name: &str) -> String {
    format!("{}/{file_name}", base.trim_end_matches('/'))
}

/// Fetches the package archive into the cache directory on the target.
///
/// An archive already present in the cache satisfies the stage outright; no
/// mirror is contacted. Otherwise mirrors are tried in order; an individual
/// mirror failure is logged and the next mirror is tried. Only when every
/// mirror has failed does the stage fail.
///
/// # Errors
///
/// Returns [`DownloadError::AllMirrorsFailed`] (wrapped in the crate error)
/// when no mirror produced the archive, or a transport error if the target
/// itself cannot be reached.
pub fn download_package(
    spec: &PackageSpec,
    executor: &dyn Executor,
    fetcher: &dyn ArchiveFetcher,
) -> Result<DownloadOutcome> {
    if spec.archive_exists(executor)? {
        return Ok(DownloadOutcome::AlreadyCached);
    }

    if spec.file_name.ends_with(".git") {
        return clone_repository(spec, executor);
    }

    for base in &spec.download_urls {
        let url = mirror_url(base, &spec.file_name);
        let attempt = if url.starts_with("ftp://") {
            wget_ftp_download(spec, executor, &url)
        } else {
            http_download(spec, executor, fetcher, &url)
        };

        match attempt {
            Ok(outcome) => return Ok(outcome),
            Err(err) => {
                log::warn!("mirror {base} failed for {}: {err}", spec.name);
            }
        }
    }

    Err(DownloadError::AllMirrorsFailed {
        package: spec.name.clone(),
    }
    .into())
}

/// Clones a `*.git` package into the cache directory on the target.
fn clone_repository(spec: &PackageSpec, executor: &dyn Executor) -> Result<DownloadOutcome> {
    for base in &spec.download_urls {
        let url = mirror_url(base, &spec.file_name);
        // Clone into <file_name> explicitly; git would otherwise strip the
        // .git suffix and the cache check would miss it.
        let argv = vec![
            "git".to_owned(),
            "clone".to_owned(),
            url.clone(),
            spec.file_name.clone(),
        ];
        let output = executor.run_command(&argv, &spec.cache_dir, false)?;
        if output.succeeded() && spec.archive_exists(executor)? {
            return Ok(DownloadOutcome::Downloaded);
        }
        log::warn!("git clone of {url} failed: {}", output.stderr);
    }

    Err(DownloadError::AllMirrorsFailed {
        package: spec.name.clone(),
    }
    .into())
}

/// Fetches an `ftp://` mirror by shelling out to `wget` on the target.
fn wget_ftp_download(
    spec: &PackageSpec,
    executor: &dyn Executor,
    url: &str,
) -> std::result::Result<DownloadOutcome, DownloadError> {
    let argv = vec![
        "wget".to_owned(),
        "-r".to_owned(),
        url.to_owned(),
        "--no-host-directories".to_owned(),
    ];
    let output = executor
        .run_command(&argv, &spec.cache_dir, false)
        .map_err(|err| DownloadError::HttpError {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;

    if output.succeeded() {
        Ok(DownloadOutcome::Downloaded)
    } else {
        Err(DownloadError::HttpError {
            url: url.to_owned(),
            reason: output.stderr,
        })
    }
}

/// Fetches an HTTP(S) mirror in-process and writes the archive to the target.
fn http_download(
    spec: &PackageSpec,
    executor: &dyn Executor,
    fetcher: &dyn ArchiveFetcher,
    url: &str,
) -> std::result::Result<DownloadOutcome, DownloadError> {
    let target_io = |err: crate::error::InstallError| DownloadError::HttpError {
        url: url.to_owned(),
        reason: err.to_string(),
    };

    // Size-only cache check: a cached file whose byte count matches the
    // mirror's Content-Length is trusted without hashing.
    let cached = executor
        .file_size(&spec.source_archive_path)
        .map_err(target_io)?;
    if let Some(cached_len) = cached {
        if fetcher.content_length(url)? == Some(cached_len) {
            return Ok(DownloadOutcome::AlreadyCached);
        }
    }

    let archive = fetcher.fetch(url)?;
    if let Some(expected) = archive.advertised_len {
        let actual = archive.data.len() as u64;
        if actual != expected {
            return Err(DownloadError::SizeMismatch {
                url: url.to_owned(),
                expected,
                actual,
            });
        }
    }

    executor
        .write_file(&spec.source_archive_path, &archive.data, ARCHIVE_FILE_MODE)
        .map_err(target_io)?;
    Ok(DownloadOutcome::Downloaded)
}
