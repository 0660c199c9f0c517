//! Stage orchestration over a batch of packages.
//!
//! The pipeline runs three synchronous stages in input order: download every
//! archive, extract every archive, then install every package. Each stage is
//! idempotent through its skip check, so re-running a partially completed
//! batch only performs the missing work. A failed post-install verification
//! is reported but does not abort the batch; every other error does.

use crate::build::run_build_strategy;
use crate::download::{download_package, ArchiveFetcher, DownloadOutcome, HttpFetcher};
use crate::error::Result;
use crate::executor::{executor_for, Executor};
use crate::extract::{extract_package, ExtractOutcome};
use crate::manifest::{RawPackage, RootLayout};
use crate::output::{finish_progress, start_progress, write_line, write_stage_header};
use crate::scripts::{deploy_config_files, run_post_install_scripts, run_pre_install_scripts};
use crate::spec::PackageSpec;
use crate::target::ExecutionTarget;
use crate::verify::is_package_installed;
use std::io::Write;

/// Runs the download, extract, and install stages over resolved packages.
pub struct Pipeline<'a> {
    specs: Vec<PackageSpec>,
    executor: &'a dyn Executor,
    fetcher: &'a dyn ArchiveFetcher,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over already-resolved package specifications.
    #[must_use]
    pub fn new(
        specs: Vec<PackageSpec>,
        executor: &'a dyn Executor,
        fetcher: &'a dyn ArchiveFetcher,
    ) -> Self {
        Self {
            specs,
            executor,
            fetcher,
        }
    }

    /// Fetches every package archive into the cache on the target.
    ///
    /// # Errors
    ///
    /// Returns the first download failure; exhausting a package's mirrors is
    /// fatal for the batch.
    pub fn download(&self, stderr: &mut dyn Write) -> Result<()> {
        write_stage_header(stderr, "DOWNLOADING PACKAGES");
        for spec in &self.specs {
            start_progress(stderr, "FILE", spec.source_archive_path.as_str());
            match download_package(spec, self.executor, self.fetcher) {
                Ok(DownloadOutcome::AlreadyCached) => finish_progress(stderr, "FOUND"),
                Ok(DownloadOutcome::Downloaded) => finish_progress(stderr, "DOWNLOADED"),
                Err(err) => {
                    finish_progress(stderr, "FAILED");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Unpacks every archive into the extraction root on the target.
    ///
    /// # Errors
    ///
    /// Returns the first extraction or configuration failure.
    pub fn extract(&self, stderr: &mut dyn Write) -> Result<()> {
        write_stage_header(stderr, "EXTRACTING PACKAGES");
        for spec in &self.specs {
            start_progress(stderr, "EXTRACTION", spec.source_extracted_path.as_str());
            match extract_package(spec, self.executor) {
                Ok(ExtractOutcome::AlreadyExtracted) => finish_progress(stderr, "CACHED"),
                Ok(ExtractOutcome::Extracted) => finish_progress(stderr, "DONE"),
                Err(err) => {
                    finish_progress(stderr, "FAILED");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Builds, installs, configures, and verifies every package.
    ///
    /// Already-installed packages are skipped wholesale. A verification
    /// failure after an otherwise clean installation is reported and the
    /// batch continues; any script, patch, or build failure aborts it.
    ///
    /// # Errors
    ///
    /// Returns the first script, patch, build, or transport failure.
    pub fn install(&self, stderr: &mut dyn Write) -> Result<()> {
        write_stage_header(stderr, "INSTALLING PACKAGES");
        for spec in &self.specs {
            self.install_spec(spec, stderr)?;
        }
        Ok(())
    }

    fn install_spec(&self, spec: &PackageSpec, stderr: &mut dyn Write) -> Result<()> {
        if is_package_installed(spec, self.executor) {
            write_line(stderr, &format!("[INSTALLED] {}", spec.name));
            return Ok(());
        }

        write_line(stderr, &format!("[INSTALLING] {}", spec.name));
        run_pre_install_scripts(spec, self.executor, stderr)?;
        run_build_strategy(spec, self.executor)?;
        deploy_config_files(spec, self.executor, stderr)?;
        run_post_install_scripts(spec, self.executor, stderr)?;

        if is_package_installed(spec, self.executor) {
            write_line(stderr, &format!("[SUCCESS] {} installed", spec.name));
        } else {
            // Reported, not fatal: later packages may not depend on this one.
            write_line(
                stderr,
                &format!("[FAILURE] {} installation could not be verified", spec.name),
            );
        }
        Ok(())
    }

    /// Runs all three stages in order.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<()> {
        self.download(stderr)?;
        self.extract(stderr)?;
        self.install(stderr)
    }
}

/// Resolves and installs a batch of package descriptions against a target.
///
/// # Errors
///
/// Returns the first resolution or stage failure.
pub fn install_many_packages(
    raws: &[RawPackage],
    roots: &RootLayout,
    target: &ExecutionTarget,
    stderr: &mut dyn Write,
) -> Result<()> {
    let executor = executor_for(target);
    let specs = raws
        .iter()
        .map(|raw| PackageSpec::resolve(raw, roots, executor.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let fetcher = HttpFetcher;
    Pipeline::new(specs, executor.as_ref(), &fetcher).run(stderr)
}

/// Convenience entry for a single package description.
///
/// # Errors
///
/// As [`install_many_packages`].
pub fn install_one_package(
    raw: &RawPackage,
    roots: &RootLayout,
    target: &ExecutionTarget,
    stderr: &mut dyn Write,
) -> Result<()> {
    install_many_packages(std::slice::from_ref(raw), roots, target, stderr)
}
